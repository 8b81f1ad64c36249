////////////////////////////////////////////////////////////////////////////////
// This file is part of "Ad Astra", an embeddable scripting programming       //
// language platform.                                                         //
//                                                                            //
// This work is proprietary software with source-available code.              //
//                                                                            //
// To copy, use, distribute, or contribute to this work, you must agree to    //
// the terms of the General License Agreement:                                //
//                                                                            //
// https://github.com/Eliah-Lakhin/ad-astra/blob/master/EULA.md               //
//                                                                            //
// The agreement grants a Basic Commercial License, allowing you to use       //
// this work in non-commercial and limited commercial products with a total   //
// gross revenue cap. To remove this commercial limit for one of your         //
// products, you must acquire a Full Commercial License.                      //
//                                                                            //
// If you contribute to the source code, documentation, or related materials, //
// you must grant me an exclusive license to these contributions.             //
// Contributions are governed by the "Contributions" section of the General   //
// License Agreement.                                                         //
//                                                                            //
// Copying the work in parts is strictly forbidden, except as permitted       //
// under the General License Agreement.                                       //
//                                                                            //
// If you do not or cannot agree to the terms of this Agreement,              //
// do not use this work.                                                      //
//                                                                            //
// This work is provided "as is", without any warranties, express or implied, //
// except where such disclaimers are legally invalid.                         //
//                                                                            //
// Copyright (c) 2024 Ilya Lakhin (Илья Александрович Лахин).                 //
// All rights reserved.                                                       //
////////////////////////////////////////////////////////////////////////////////

use compact_str::CompactString;
use log::trace;

use crate::{
    report::DISPATCH_LOG,
    runtime::{TypeMeta, CONSTRUCTOR_NAME},
    semantics::{
        config::ExpansionGuard,
        dispatch::fold_remainder,
        reflect::coerce_arguments,
        ReduceError,
        ReduceResult,
    },
    symbols::{DispatchKind, SymbolDefinition, SymbolEntry, SymbolTable},
    tree::{expect_assignable, Expr, ExprKind, MacroExpr},
};

impl SymbolDefinition {
    /// Creates a definition of a named value.
    ///
    /// A member access reduces to the value itself. A method call site with
    /// arguments applies the value: a function value is invoked, a macro is
    /// expanded, and a type candidate is constructed.
    pub fn variable(value: Expr) -> Self {
        Self::new(move |site, table, expected| match site.as_dispatch() {
            Some(node) if node.kind.target() == DispatchKind::METHOD => {
                apply_value(value.clone(), &node.arguments, table, expected)
            }

            _ => Ok(value.clone()),
        })
    }

    /// Creates a definition that expands the macro at every method call
    /// site. A member access reduces to the macro itself, so that the macro
    /// can be passed around and applied later.
    pub fn from_macro(macro_expr: Expr) -> ReduceResult<Self> {
        let ExprKind::Macro(..) = macro_expr.kind() else {
            return Err(ReduceError::Malformed {
                kind: macro_expr.name(),
                message: CompactString::new("expected Macro"),
            });
        };

        Ok(Self::variable(macro_expr))
    }

    /// Creates a definition of a binary operation that also accepts more
    /// than two operands.
    ///
    /// A call site with more than two arguments is [folded](fold_remainder)
    /// into nested call sites of the same symbol. A call site with exactly
    /// two arguments has its operands reduced, and the `operation` builds
    /// the result from them.
    pub fn variadic(operation: impl Fn(Expr, Expr) -> ReduceResult<Expr> + Send + Sync + 'static) -> Self {
        Self::new(move |site, table, _| {
            let Some(node) = site.as_dispatch() else {
                return Err(ReduceError::Malformed {
                    kind: site.name(),
                    message: CompactString::new("expected call site"),
                });
            };

            if let Some(folded) = fold_remainder(node) {
                return Ok(folded);
            }

            let [left, right] = node.arguments.as_slice() else {
                return Err(ReduceError::ArityMismatch {
                    expected: 2,
                    actual: node.arguments.len(),
                    context: "binary operation",
                });
            };

            let left = left.reduce_value(table, None)?;
            let right = right.reduce_value(table, None)?;

            operation(left, right)
        })
    }
}

impl MacroExpr {
    /// Substitutes the arguments into the body of this macro and reduces
    /// the body.
    ///
    /// Each parameter becomes a symbol of a child scope of the `table`.
    /// A reference to the parameter reduces the corresponding argument in
    /// the `table`, so the arguments never see the names introduced by the
    /// macro. An argument is reduced every time the body refers to it.
    pub fn expand(
        &self,
        arguments: &[Expr],
        table: &SymbolTable,
        expected: Option<&'static TypeMeta>,
    ) -> ReduceResult<Expr> {
        if arguments.len() != self.parameters.len() {
            return Err(ReduceError::ArityMismatch {
                expected: self.parameters.len(),
                actual: arguments.len(),
                context: "macro arguments",
            });
        }

        let _guard = ExpansionGuard::enter()?;

        let scope = table.child();

        for (parameter, argument) in self.parameters.iter().zip(arguments) {
            let ExprKind::AmbiguousParameter(node) = parameter.kind() else {
                return Err(ReduceError::Malformed {
                    kind: parameter.name(),
                    message: CompactString::new("expected AmbiguousParameter as macro parameter"),
                });
            };

            let caller = table.clone();
            let argument = argument.clone();
            let declared = node.ty;

            let definition = SymbolDefinition::new(move |site, scope, expected| {
                let value = argument.reduce(&caller, declared.or(expected))?;

                if let Some(declared) = declared {
                    if !value.is_reducible() {
                        let _ = expect_assignable(declared, &value, "macro argument")?;
                    }
                }

                match site.as_dispatch() {
                    Some(node) if node.kind.target() == DispatchKind::METHOD => {
                        apply_value(value, &node.arguments, scope, expected)
                    }

                    _ => Ok(value),
                }
            });

            scope.add(SymbolEntry::global(DispatchKind::NONE, node.name.clone()), definition)?;
        }

        trace!(
            target: DISPATCH_LOG,
            "Expanding a macro with {} arguments.",
            arguments.len(),
        );

        self.body.reduce(&scope, expected)
    }
}

/// Applies a reduced value to the call site arguments.
///
/// Macros are expanded, type candidates are constructed, and function
/// values are invoked. A value without arguments that is not a function
/// reduces to itself.
pub(super) fn apply_value(
    value: Expr,
    arguments: &[Expr],
    table: &SymbolTable,
    expected: Option<&'static TypeMeta>,
) -> ReduceResult<Expr> {
    match value.kind() {
        ExprKind::Macro(node) => return node.expand(arguments, table, expected),

        ExprKind::TypeCandidate(..) => {
            return Expr::dispatch(
                DispatchKind::CONSTRUCTOR,
                Some(value),
                CONSTRUCTOR_NAME,
                Vec::new(),
                arguments.to_vec(),
            )
            .reduce(table, expected)
        }

        ExprKind::Module(..) if arguments.is_empty() => return Ok(value),

        _ => (),
    }

    let signature = match value.is_reducible() {
        true => None,
        false => value.ty().and_then(|ty| ty.function_signature()),
    };

    match signature {
        Some((parameters, _)) => {
            let arguments = coerce_arguments(arguments, parameters, table)?;

            Expr::invoke(value, arguments)
        }

        None if arguments.is_empty() => Ok(value),

        None => Err(ReduceError::TypeMismatch {
            expected: None,
            actual: value.ty(),
            context: "applied value",
        }),
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        runtime::TypeMeta,
        semantics::ReduceError,
        symbols::{DispatchKind, SymbolDefinition, SymbolEntry, SymbolTable},
        tree::{BinaryOperator, Expr},
    };

    fn table() -> SymbolTable {
        let _ = SymbolTable::root();

        SymbolTable::new(Vec::new())
    }

    fn define_plus(table: &SymbolTable) {
        table
            .add(
                SymbolEntry::global(DispatchKind::METHOD, "add"),
                SymbolDefinition::variadic(|left, right| Expr::binary(BinaryOperator::Add, left, right)),
            )
            .unwrap();
    }

    #[test]
    fn test_macro_substitution() {
        let table = table();

        define_plus(&table);

        let a = Expr::ambiguous_parameter("a", None);
        let double = Expr::macro_expr(
            vec![a],
            Expr::list(vec![Expr::ident("add"), Expr::ident("a"), Expr::ident("a")]),
        )
        .unwrap();

        table
            .add(
                SymbolEntry::global(DispatchKind::NONE, "double"),
                SymbolDefinition::from_macro(double).unwrap(),
            )
            .unwrap();

        let x = Expr::parameter("x", TypeMeta::int32());

        table
            .add(
                SymbolEntry::global(DispatchKind::NONE, "x"),
                SymbolDefinition::variable(x),
            )
            .unwrap();

        let reduced = Expr::list(vec![Expr::ident("double"), Expr::ident("x")])
            .reduce(&table, None)
            .unwrap();

        assert_eq!(reduced.to_string(), "(Add (Parameter x Int32) (Parameter x Int32))");

        let error = Expr::list(vec![Expr::ident("double")]).reduce(&table, None).unwrap_err();

        assert!(matches!(error, ReduceError::ArityMismatch { expected: 1, actual: 0, .. }));
    }

    #[test]
    fn test_macro_hygiene() {
        let table = table();

        define_plus(&table);

        // The macro introduces its own "x", which must not capture the
        // caller's "x" passed as the argument.
        let a = Expr::ambiguous_parameter("a", None);
        let x = Expr::ambiguous_parameter("x", None);
        let shadow = Expr::macro_expr(
            vec![a, x],
            Expr::list(vec![Expr::ident("add"), Expr::ident("a"), Expr::ident("x")]),
        )
        .unwrap();

        table
            .add(
                SymbolEntry::global(DispatchKind::NONE, "shadow"),
                SymbolDefinition::from_macro(shadow).unwrap(),
            )
            .unwrap();

        table
            .add(
                SymbolEntry::global(DispatchKind::NONE, "x"),
                SymbolDefinition::literal(Expr::constant(1)),
            )
            .unwrap();

        let reduced = Expr::list(vec![Expr::ident("shadow"), Expr::ident("x"), Expr::constant(2)])
            .reduce(&table, None)
            .unwrap();

        assert_eq!(reduced.to_string(), "(Add (Constant Int32 1) (Constant Int32 2))");
    }

    #[test]
    fn test_function_variable_application() {
        let table = table();

        let n = Expr::parameter("n", TypeMeta::int32());
        let identity = Expr::lambda(vec![n.clone()], n).unwrap();

        table
            .add(
                SymbolEntry::global(DispatchKind::NONE, "identity"),
                SymbolDefinition::variable(identity),
            )
            .unwrap();

        let reduced = Expr::list(vec![Expr::ident("identity"), Expr::constant(7)])
            .reduce(&table, None)
            .unwrap();

        assert_eq!(reduced.name(), "Invoke");
        assert_eq!(reduced.ty(), Some(TypeMeta::int32()));

        let reference = Expr::ident("identity").reduce(&table, None).unwrap();

        assert_eq!(reference.name(), "Lambda");

        let error = Expr::list(vec![Expr::ident("identity"), Expr::constant("a")])
            .reduce(&table, None)
            .unwrap_err();

        assert!(matches!(error, ReduceError::TypeMismatch { .. }));
    }
}

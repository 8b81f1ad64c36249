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

use crate::{
    runtime::{TypeMeta, TypeShape, Value},
    semantics::{macros::apply_value, ReduceError, ReduceResult},
    symbols::{DispatchKind, SymbolDefinition, SymbolEntry, SymbolTable},
    tree::{AmbiguousLambdaExpr, DispatchExpr, Expr, ExprKind},
};

impl Expr {
    /// Reduces this expression in the scope of the symbol table.
    ///
    /// The `expected` type is a hint of the type the caller wants the result
    /// to have. It steers the lambda parameter inference and the overload
    /// selection, but the result is not required to match it.
    ///
    /// Executable expressions are returned as is. Macros, type candidates
    /// and modules reduce to themselves, because they are meaningful only
    /// as the heads or the receivers of call sites. Use
    /// [reduce_value](Self::reduce_value) to reduce an expression that must
    /// produce a runtime value.
    pub fn reduce(&self, table: &SymbolTable, expected: Option<&'static TypeMeta>) -> ReduceResult<Expr> {
        match self.kind() {
            ExprKind::Ident(node) => {
                Expr::dispatch(DispatchKind::MEMBER, None, node.name.clone(), Vec::new(), Vec::new())
                    .reduce(table, expected)
            }

            ExprKind::AmbiguousParameter(node) => {
                Expr::dispatch(DispatchKind::MEMBER, None, node.name.clone(), Vec::new(), Vec::new())
                    .reduce(table, expected)
            }

            ExprKind::Dispatch(node) => node.reduce(table, expected),

            ExprKind::List(node) => reduce_list(&node.elements, table, expected),

            ExprKind::Vector(node) => reduce_vector(&node.elements, table, expected),

            ExprKind::AmbiguousLambda(node) => node.fix(table, expected),

            ExprKind::Extension(node) => node.0.reduce(table, expected)?.reduce(table, expected),

            ExprKind::Macro(..) | ExprKind::TypeCandidate(..) | ExprKind::Module(..) => Ok(self.clone()),

            _ => Ok(self.clone()),
        }
    }

    /// Reduces this expression to an executable expression.
    ///
    /// A type candidate becomes a constant of the `Type` type. Macros and
    /// modules have no runtime value.
    pub fn reduce_value(
        &self,
        table: &SymbolTable,
        expected: Option<&'static TypeMeta>,
    ) -> ReduceResult<Expr> {
        let reduced = self.reduce(table, expected)?;

        match reduced.kind() {
            ExprKind::TypeCandidate(node) => Ok(Expr::constant(Value::Type(node.target))),

            _ if reduced.is_reducible() => Err(ReduceError::Malformed {
                kind: reduced.name(),
                message: CompactString::new("expression has no runtime value"),
            }),

            _ => Ok(reduced),
        }
    }

    /// Returns the call site node if this expression is a Dispatch.
    #[inline(always)]
    pub fn as_dispatch(&self) -> Option<&DispatchExpr> {
        match self.kind() {
            ExprKind::Dispatch(node) => Some(node),
            _ => None,
        }
    }
}

impl AmbiguousLambdaExpr {
    /// Fixes the parameter types of this lambda and reduces its body.
    ///
    /// Each parameter takes its explicitly declared type, or the type of the
    /// corresponding parameter of the `expected` function type. The
    /// parameters become variables visible in the body through a child
    /// scope of the `table`.
    pub fn fix(&self, table: &SymbolTable, expected: Option<&'static TypeMeta>) -> ReduceResult<Expr> {
        let signature = expected
            .and_then(|ty| ty.function_signature())
            .filter(|(parameters, _)| parameters.len() == self.parameters.len());

        let scope = table.child();
        let mut parameters = Vec::with_capacity(self.parameters.len());

        for (index, parameter) in self.parameters.iter().enumerate() {
            let ExprKind::AmbiguousParameter(node) = parameter.kind() else {
                return Err(ReduceError::Malformed {
                    kind: parameter.name(),
                    message: CompactString::new("expected AmbiguousParameter as lambda parameter"),
                });
            };

            let inferred = signature
                .map(|(types, _)| types[index])
                .filter(|ty| !ty.contains_generic_parameters());

            let Some(ty) = node.ty.or(inferred) else {
                return Err(ReduceError::CannotInfer {
                    name: node.name.clone(),
                });
            };

            let variable = Expr::parameter(node.name.clone(), ty);

            scope.add(
                SymbolEntry::global(DispatchKind::NONE, node.name.clone()),
                SymbolDefinition::variable(variable.clone()),
            )?;

            parameters.push(variable);
        }

        let ret = self.ret.or_else(|| {
            signature
                .map(|(_, ret)| ret)
                .filter(|ty| !ty.contains_generic_parameters())
        });

        let body = self.body.reduce_value(&scope, ret.filter(|ty| !ty.is_void()))?;

        match ret {
            Some(ret) => Expr::lambda_returning(parameters, body, ret),
            None => Expr::lambda(parameters, body),
        }
    }
}

fn reduce_list(
    elements: &[Expr],
    table: &SymbolTable,
    expected: Option<&'static TypeMeta>,
) -> ReduceResult<Expr> {
    let Some((head, arguments)) = elements.split_first() else {
        return Ok(Expr::constant(Value::Nil));
    };

    if let ExprKind::Ident(node) = head.kind() {
        return Expr::dispatch(
            DispatchKind::METHOD,
            None,
            node.name.clone(),
            Vec::new(),
            arguments.to_vec(),
        )
        .reduce(table, expected);
    }

    let head = head.reduce(table, None)?;

    apply_value(head, arguments, table, expected)
}

fn reduce_vector(
    elements: &[Expr],
    table: &SymbolTable,
    expected: Option<&'static TypeMeta>,
) -> ReduceResult<Expr> {
    let hint = expected.and_then(|ty| match ty.shape() {
        TypeShape::Array { element, rank: 1 } => Some(*element),
        _ => None,
    });

    let mut items = Vec::with_capacity(elements.len());

    for element in elements {
        items.push(element.reduce_value(table, hint)?);
    }

    let element = match hint {
        Some(element) => element,
        None => common_type(&items),
    };

    let items = items
        .into_iter()
        .map(|item| match item.is_nil_constant() {
            true => Expr::typed_constant(Value::Nil, element),
            false => Ok(item),
        })
        .collect::<ReduceResult<Vec<_>>>()?;

    Expr::new_array_init(element, items)
}

// The shared static type of the non-nil items, or Object.
fn common_type(items: &[Expr]) -> &'static TypeMeta {
    let mut common = None;

    for item in items {
        if item.is_nil_constant() {
            continue;
        }

        let Some(ty) = item.ty() else {
            return TypeMeta::object();
        };

        match common {
            None => common = Some(ty),
            Some(known) if known == ty => (),
            Some(_) => return TypeMeta::object(),
        }
    }

    match common {
        Some(ty) if !ty.is_void() => ty,
        _ => TypeMeta::object(),
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        runtime::{TypeMeta, Value},
        semantics::ReduceError,
        symbols::{DispatchKind, SymbolDefinition, SymbolEntry, SymbolTable},
        tree::{Expr, ExprKind},
    };

    fn table() -> SymbolTable {
        let _ = SymbolTable::root();

        SymbolTable::new(Vec::new())
    }

    #[test]
    fn test_ident_resolution() {
        let table = table();

        let x = Expr::parameter("x", TypeMeta::int32());

        table
            .add(
                SymbolEntry::global(DispatchKind::NONE, "x"),
                SymbolDefinition::variable(x.clone()),
            )
            .unwrap();

        let reduced = Expr::ident("x").reduce(&table, None).unwrap();

        assert!(reduced.ptr_eq(&x));
    }

    #[test]
    fn test_executable_nodes_are_kept() {
        let table = table();
        let constant = Expr::constant(5);

        assert!(constant.reduce(&table, None).unwrap().ptr_eq(&constant));
        assert_eq!(
            Expr::list(Vec::new()).reduce(&table, None).unwrap().to_string(),
            "(Constant Object nil)",
        );
    }

    #[test]
    fn test_vector_typing() {
        let table = table();

        let ints = Expr::vector(vec![Expr::constant(1), Expr::constant(2)])
            .reduce(&table, None)
            .unwrap();

        assert_eq!(ints.ty(), Some(TypeMeta::int32().array(1)));

        let mixed = Expr::vector(vec![Expr::constant(1), Expr::constant("a"), Expr::constant(Value::Nil)])
            .reduce(&table, None)
            .unwrap();

        assert_eq!(mixed.ty(), Some(TypeMeta::object().array(1)));

        let strings = Expr::vector(vec![Expr::constant(Value::Nil)])
            .reduce(&table, Some(TypeMeta::string().array(1)))
            .unwrap();

        assert_eq!(strings.ty(), Some(TypeMeta::string().array(1)));

        let empty = Expr::vector(Vec::new()).reduce(&table, None).unwrap();

        assert_eq!(empty.ty(), Some(TypeMeta::object().array(1)));
    }

    #[test]
    fn test_lambda_inference() {
        let table = table();

        let x = Expr::ambiguous_parameter("x", None);
        let lambda = Expr::ambiguous_lambda(vec![x], Expr::ident("x"), None).unwrap();

        assert!(matches!(
            lambda.reduce(&table, None),
            Err(ReduceError::CannotInfer { .. }),
        ));

        let expected = TypeMeta::function(&[TypeMeta::int32()], TypeMeta::object()).unwrap();

        let reduced = lambda.reduce(&table, Some(expected)).unwrap();

        assert_eq!(reduced.ty(), Some(expected));

        let ExprKind::Lambda(node) = reduced.kind() else {
            panic!("unexpected result {reduced}");
        };

        assert!(node.body.ptr_eq(&node.parameters[0]));

        let typed = Expr::ambiguous_lambda(
            vec![Expr::ambiguous_parameter("y", Some(TypeMeta::string()))],
            Expr::ident("y"),
            None,
        )
        .unwrap();

        assert_eq!(
            typed.reduce(&table, None).unwrap().ty(),
            TypeMeta::function(&[TypeMeta::string()], TypeMeta::string()),
        );
    }

    #[test]
    fn test_type_candidate_value() {
        let table = table();

        let candidate = Expr::type_candidate(TypeMeta::string());

        assert!(candidate.reduce(&table, None).unwrap().ptr_eq(&candidate));

        let value = candidate.reduce_value(&table, None).unwrap();

        assert_eq!(value.ty(), Some(TypeMeta::ty()));
    }
}

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

use log::{debug, trace};

use crate::{
    report::DISPATCH_LOG,
    runtime::TypeMeta,
    semantics::{
        closeness::suggest,
        config::reduce_config,
        reflect::reflect,
        ReduceError,
        ReduceResult,
    },
    symbols::{SymbolEntry, SymbolTable},
    tree::{DispatchExpr, Expr, ExprKind},
};

impl DispatchExpr {
    /// Resolves this call site in the scope of the symbol table.
    ///
    /// The resolution proceeds as follows:
    ///
    ///  1. The receiver is reduced. A module receiver redirects the lookup
    ///     into the module table, falling back to the `$missing` handler of
    ///     the module chain. A type candidate receiver makes the lookup
    ///     target the static wrapper type of the candidate.
    ///  2. The best [matching](SymbolTable::resolve_match) symbol of the
    ///     chain is invoked with the call site.
    ///  3. Otherwise, the members of the receiver type are searched.
    ///  4. Otherwise, the `$missing` handler of the chain is invoked.
    ///  5. Otherwise, the function fails with the Unresolved error that lists
    ///     similar visible names.
    ///
    /// The expression produced by a symbol definition is reduced further in
    /// the same scope, so definitions may emit other call sites.
    pub fn reduce(&self, table: &SymbolTable, expected: Option<&'static TypeMeta>) -> ReduceResult<Expr> {
        let receiver = match &self.receiver {
            None => None,
            Some(receiver) => Some(receiver.reduce(table, None)?),
        };

        if let Some(ExprKind::Module(module)) = receiver.as_ref().map(Expr::kind) {
            let redirected = Expr::dispatch(
                self.kind,
                None,
                self.name.clone(),
                self.type_arguments.clone(),
                self.arguments.clone(),
            );

            trace!(target: DISPATCH_LOG, "Redirecting '{}' into a module.", self.name);

            return redirect(&redirected, &module.table, table, expected);
        }

        let receiver_ty = match &receiver {
            None => None,

            Some(receiver) => match receiver.ty() {
                Some(ty) => Some(ty),

                None => {
                    return Err(ReduceError::Malformed {
                        kind: receiver.name(),
                        message: "call site receiver has no type".into(),
                    })
                }
            },
        };

        let site = Expr::dispatch(
            self.kind,
            receiver,
            self.name.clone(),
            self.type_arguments.clone(),
            self.arguments.clone(),
        );

        let query = SymbolEntry::new(self.kind.target(), receiver_ty, self.name.clone());

        if let Some(definition) = table.resolve_match(&query)? {
            trace!(target: DISPATCH_LOG, "Dispatching '{query}' through the symbol table.");

            return definition.invoke(&site, table, expected)?.reduce(table, expected);
        }

        let Some(node) = site.as_dispatch() else {
            return Ok(site);
        };

        if let Some(reflected) = reflect(node, table, expected)? {
            trace!(target: DISPATCH_LOG, "Dispatching '{query}' through the type members.");

            return Ok(reflected);
        }

        if let Some(missing) = table.try_resolve(&SymbolEntry::missing()) {
            debug!(target: DISPATCH_LOG, "Dispatching '{query}' through the missing handler.");

            return missing.invoke(&site, table, expected)?.reduce(table, expected);
        }

        Err(self.unresolved(table, receiver_ty))
    }

    fn unresolved(&self, table: &SymbolTable, receiver: Option<&'static TypeMeta>) -> ReduceError {
        let config = reduce_config();

        let mut names = table.visible_names();

        if let Some(receiver) = receiver {
            let members = match receiver.static_target() {
                Some(target) => target.member_names(),
                None => receiver.member_names(),
            };

            for name in members {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }

        debug!(
            target: DISPATCH_LOG,
            "Call site '{} {}' is unresolved.",
            self.kind,
            self.name,
        );

        ReduceError::Unresolved {
            kind: self.kind,
            receiver,
            name: self.name.clone(),
            suggestions: suggest(
                &self.name,
                names,
                config.max_suggestions,
                config.suggestion_threshold,
            ),
        }
    }
}

// Resolves a call site in a module table. The arguments still belong to
// the scope of the caller.
fn redirect(
    site: &Expr,
    module: &SymbolTable,
    table: &SymbolTable,
    expected: Option<&'static TypeMeta>,
) -> ReduceResult<Expr> {
    let Some(node) = site.as_dispatch() else {
        return site.reduce(table, expected);
    };

    let query = SymbolEntry::new(node.kind.target(), None, node.name.clone());

    if let Some(definition) = module.resolve_match(&query)? {
        return definition.invoke(site, table, expected)?.reduce(table, expected);
    }

    if let Some(missing) = module.try_resolve(&SymbolEntry::missing()) {
        debug!(target: DISPATCH_LOG, "Dispatching '{query}' through the module missing handler.");

        return missing.invoke(site, table, expected)?.reduce(table, expected);
    }

    Err(node.unresolved(module, None))
}

/// Folds a variadic call site into a chain of binary call sites nested to
/// the right.
///
/// For a call site `f(a, b, c)` returns `f(a, f(b, c))`. The nested call
/// site has the same kind, receiver and name, so its reduction re-enters
/// the dispatch of the same symbol. Returns None if the call site has two
/// arguments or less.
pub fn fold_remainder(site: &DispatchExpr) -> Option<Expr> {
    let (first, remainder) = site.arguments.split_first()?;

    if remainder.len() < 2 {
        return None;
    }

    let nested = Expr::dispatch(
        site.kind,
        site.receiver.clone(),
        site.name.clone(),
        site.type_arguments.clone(),
        remainder.to_vec(),
    );

    Some(Expr::dispatch(
        site.kind,
        site.receiver.clone(),
        site.name.clone(),
        site.type_arguments.clone(),
        vec![first.clone(), nested],
    ))
}

/// Folds a variadic call site into a chain of binary call sites nested to
/// the left.
///
/// For a call site `f(a, b, c)` returns `f(f(a, b), c)`. Operators that are
/// not associative, such as subtraction, fold this way. Returns None if the
/// call site has two arguments or less.
pub fn fold_leading(site: &DispatchExpr) -> Option<Expr> {
    let (last, leading) = site.arguments.split_last()?;

    if leading.len() < 2 {
        return None;
    }

    let nested = Expr::dispatch(
        site.kind,
        site.receiver.clone(),
        site.name.clone(),
        site.type_arguments.clone(),
        leading.to_vec(),
    );

    Some(Expr::dispatch(
        site.kind,
        site.receiver.clone(),
        site.name.clone(),
        site.type_arguments.clone(),
        vec![nested, last.clone()],
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use semver::Version;

    use crate::{
        runtime::{Domain, MethodDecl, TypeMeta, Value},
        semantics::{
            config::{reduce_config, set_reduce_config},
            fold_remainder,
            ReduceError,
        },
        symbols::{DispatchKind, SymbolDefinition, SymbolEntry, SymbolTable},
        tree::{BinaryOperator, Expr},
    };

    fn table() -> SymbolTable {
        let _ = SymbolTable::root();

        SymbolTable::new(Vec::new())
    }

    fn binary_plus(calls: Arc<AtomicUsize>) -> SymbolDefinition {
        SymbolDefinition::variadic(move |left, right| {
            let _ = calls.fetch_add(1, Ordering::SeqCst);

            Expr::binary(BinaryOperator::Add, left, right)
        })
    }

    #[test]
    fn test_variadic_fold() {
        let table = table();
        let calls = Arc::new(AtomicUsize::new(0));

        table
            .add(
                SymbolEntry::global(DispatchKind::METHOD, "+"),
                binary_plus(calls.clone()),
            )
            .unwrap();

        let arguments = vec![Expr::constant(1), Expr::constant(2), Expr::constant(3)];

        let variadic = Expr::dispatch(DispatchKind::METHOD, None, "+", Vec::new(), arguments.clone())
            .reduce(&table, None)
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let nested = Expr::dispatch(
            DispatchKind::METHOD,
            None,
            "+",
            Vec::new(),
            vec![
                arguments[0].clone(),
                Expr::dispatch(DispatchKind::METHOD, None, "+", Vec::new(), arguments[1..].to_vec()),
            ],
        )
        .reduce(&table, None)
        .unwrap();

        assert_eq!(variadic.to_string(), nested.to_string());
        assert_eq!(
            variadic.to_string(),
            "(Add (Constant Int32 1) (Add (Constant Int32 2) (Constant Int32 3)))",
        );
    }

    #[test]
    fn test_fold_remainder_shape() {
        let site = Expr::dispatch(
            DispatchKind::METHOD,
            None,
            "f",
            Vec::new(),
            vec![Expr::ident("a"), Expr::ident("b")],
        );

        assert!(fold_remainder(site.as_dispatch().unwrap()).is_none());

        let site = Expr::dispatch(
            DispatchKind::METHOD,
            None,
            "f",
            Vec::new(),
            vec![Expr::ident("a"), Expr::ident("b"), Expr::ident("c"), Expr::ident("d")],
        );

        let folded = fold_remainder(site.as_dispatch().unwrap()).unwrap();
        let folded = folded.as_dispatch().unwrap();

        assert_eq!(folded.arguments.len(), 2);
        assert_eq!(folded.arguments[1].as_dispatch().unwrap().arguments.len(), 3);
    }

    #[test]
    fn test_missing_fallback() {
        let parent = table();
        let table = parent.child();

        let site = Expr::dispatch(DispatchKind::MEMBER, None, "undefined", Vec::new(), Vec::new());

        match site.reduce(&table, None) {
            Err(ReduceError::Unresolved {
                kind,
                receiver,
                name,
                ..
            }) => {
                assert_eq!(kind, DispatchKind::MEMBER);
                assert!(receiver.is_none());
                assert_eq!(name, "undefined");
            }

            other => panic!("unexpected result {other:?}"),
        }

        parent
            .add(
                SymbolEntry::missing(),
                SymbolDefinition::new(|site, _, _| {
                    let name = site.as_dispatch().map(|node| node.name.clone()).unwrap_or_default();

                    Ok(Expr::constant(Value::from(name)))
                }),
            )
            .unwrap();

        let reduced = site.reduce(&table, None).unwrap();

        assert_eq!(reduced.to_string(), "(Constant String undefined)");
    }

    #[test]
    fn test_unresolved_suggestions() {
        let table = table();

        table
            .add(
                SymbolEntry::global(DispatchKind::MEMBER, "length"),
                SymbolDefinition::literal(Expr::constant(1)),
            )
            .unwrap();

        let error = Expr::ident("lenght").reduce(&table, None).unwrap_err();

        let ReduceError::Unresolved { suggestions, .. } = &error else {
            panic!("unexpected error {error}");
        };

        assert_eq!(suggestions[0], "length");
        assert!(error.to_string().contains("Did you mean 'length'"));
    }

    #[test]
    fn test_receiver_dispatch() {
        let assembly = Domain::get().define_assembly("dispatch_tests", Version::new(1, 0, 0));

        let point = assembly.build_type("Point").build();

        let _ = point.define_field("x", TypeMeta::int32(), false);

        let table = table();

        table
            .add(
                SymbolEntry::new(DispatchKind::MEMBER, Some(point), "norm"),
                SymbolDefinition::literal(Expr::constant(10)),
            )
            .unwrap();

        let receiver = Expr::parameter("p", point);

        let norm = Expr::dispatch(DispatchKind::MEMBER, Some(receiver.clone()), "norm", Vec::new(), Vec::new())
            .reduce(&table, None)
            .unwrap();

        assert_eq!(norm.to_string(), "(Constant Int32 10)");

        let x = Expr::dispatch(DispatchKind::MEMBER, Some(receiver.clone()), "x", Vec::new(), Vec::new())
            .reduce(&table, None)
            .unwrap();

        assert_eq!(x.ty(), Some(TypeMeta::int32()));

        let error = Expr::dispatch(DispatchKind::MEMBER, Some(receiver), "y", Vec::new(), Vec::new())
            .reduce(&table, None)
            .unwrap_err();

        assert!(matches!(error, ReduceError::Unresolved { receiver: Some(ty), .. } if ty == point));

        let _ = point.define_method(
            MethodDecl::function("origin", |_| Ok(Value::Nil)).returns(point),
        );

        let origin = Expr::dispatch(
            DispatchKind::METHOD,
            Some(Expr::type_candidate(point)),
            "origin",
            Vec::new(),
            Vec::new(),
        )
        .reduce(&table, None)
        .unwrap();

        assert_eq!(origin.ty(), Some(point));
    }

    #[test]
    fn test_module_receiver() {
        let table = table();
        let module = SymbolTable::module(Vec::new());

        module
            .add(
                SymbolEntry::global(DispatchKind::MEMBER, "answer"),
                SymbolDefinition::literal(Expr::constant(42)),
            )
            .unwrap();

        let reduced = Expr::dispatch(
            DispatchKind::MEMBER,
            Some(Expr::module(module)),
            "answer",
            Vec::new(),
            Vec::new(),
        )
        .reduce(&table, None)
        .unwrap();

        assert_eq!(reduced.to_string(), "(Constant Int32 42)");
    }

    #[test]
    fn test_module_missing_fallback() {
        let table = table();
        let module = SymbolTable::module(Vec::new());

        let site = Expr::dispatch(
            DispatchKind::MEMBER,
            Some(Expr::module(module.clone())),
            "undefined",
            Vec::new(),
            Vec::new(),
        );

        assert!(matches!(
            site.reduce(&table, None),
            Err(ReduceError::Unresolved { .. }),
        ));

        module
            .add(
                SymbolEntry::missing(),
                SymbolDefinition::literal(Expr::constant("fallback")),
            )
            .unwrap();

        let reduced = site.reduce(&table, None).unwrap();

        assert_eq!(reduced.to_string(), "(Constant String fallback)");

        assert!(matches!(
            Expr::dispatch(DispatchKind::MEMBER, None, "undefined", Vec::new(), Vec::new())
                .reduce(&table, None),
            Err(ReduceError::Unresolved { .. }),
        ));
    }

    #[test]
    fn test_expansion_limit() {
        let table = table();

        let body = Expr::list(vec![Expr::ident("loop")]);
        let looping = Expr::macro_expr(Vec::new(), body).unwrap();

        table
            .add(
                SymbolEntry::global(DispatchKind::NONE, "loop"),
                SymbolDefinition::from_macro(looping).unwrap(),
            )
            .unwrap();

        let previous = reduce_config();
        let mut config = previous;

        config.expansion_limit = 16;
        set_reduce_config(config);

        let result = Expr::list(vec![Expr::ident("loop")]).reduce(&table, None);

        set_reduce_config(previous);

        assert!(matches!(result, Err(ReduceError::ExpansionLimit { limit: 16 })));
    }
}

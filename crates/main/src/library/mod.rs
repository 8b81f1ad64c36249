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

//! The built-in symbols of the [Root](crate::symbols::SymbolTable::root)
//! table.
//!
//! The Root provides the operators, the special forms and the names of the
//! core types:
//!
//! | Symbols                               | Reduction                                     |
//! |---------------------------------------|-----------------------------------------------|
//! | `+` `*` `**` `&&` `\|\|`              | variadic, folded to the right                 |
//! | `-` `/` `%`                           | variadic, folded to the left; unary `-`       |
//! | `==` `!=` `<` `<=` `>` `>=` `??`      | binary                                        |
//! | `!`                                   | unary                                         |
//! | `=` `+=` `-=` `*=` `/=`               | assignment, compound assignment              |
//! | `let` `fn` `macro` `do` `if`          | variables, lambdas, macros, blocks, branches  |
//! | `.` `new` `throw` `is` `as` `cast`    | members, construction, exceptions, type tests |
//! | `Object` `Int32` `String` ...         | core type references                          |
//! | `true` `false` `nil`                  | constants                                     |
//!
//! The arithmetic operators promote mixed numeric operands to the wider
//! type (`Int32` < `Int64` < `Double`). If the left or the right operand
//! type declares a static method named `op_<Operator>` (e.g. `op_Add`) that
//! accepts the operands, the operator calls that method instead of the
//! built-in operation.
//!
//! The Root has no `$missing` entry, so a call site that does not resolve
//! otherwise fails with the Unresolved error.

mod forms;
mod operators;
mod types;

use compact_str::CompactString;
use log::debug;

use crate::{
    report::{system_panic, SYMBOLS_LOG},
    semantics::{ReduceError, ReduceResult},
    symbols::{SymbolDefinition, SymbolEntry, SymbolTable},
    tree::{DispatchExpr, Expr},
};

/// Creates a new table with the built-in symbols.
///
/// [SymbolTable::root] calls this function once to build the Root. Called
/// after the Root exists, the function returns a child table of the Root
/// with another copy of the built-in symbols.
pub fn build_root() -> SymbolTable {
    let table = SymbolTable::new(Vec::new());

    types::define_types(&table);
    operators::define_operators(&table);
    forms::define_forms(&table);

    debug!(
        target: SYMBOLS_LOG,
        "Built-in symbol table created with {} symbols.",
        table.len(),
    );

    table
}

fn define(table: &SymbolTable, entry: SymbolEntry, definition: SymbolDefinition) {
    if let Err(error) = table.add(entry, definition) {
        system_panic!("Built-in symbol definition failure. {error}");
    }
}

fn site_of(site: &Expr) -> ReduceResult<&DispatchExpr> {
    match site.as_dispatch() {
        Some(node) => Ok(node),

        None => Err(ReduceError::Malformed {
            kind: site.name(),
            message: CompactString::new("expected call site"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        runtime::{TypeMeta, Value},
        semantics::ReduceError,
        symbols::{DispatchKind, SymbolDefinition, SymbolEntry, SymbolTable},
        tree::Expr,
    };

    fn eval(expr: Expr) -> Value {
        let table = SymbolTable::new(vec![SymbolTable::root().clone()]);

        expr.reduce_value(&table, None).unwrap().evaluate().unwrap()
    }

    fn list(elements: Vec<Expr>) -> Expr {
        Expr::list(elements)
    }

    fn ident(name: &str) -> Expr {
        Expr::ident(name)
    }

    #[test]
    fn test_root_is_read_only() {
        let root = SymbolTable::root();

        assert!(root.is_read_only());

        assert!(matches!(
            root.add(
                SymbolEntry::global(DispatchKind::NONE, "extra"),
                SymbolDefinition::literal(Expr::constant(1)),
            ),
            Err(ReduceError::InvalidOperation { .. }),
        ));

        let child = SymbolTable::new(Vec::new());

        assert!(!child.is_read_only());
        assert!(child
            .add(
                SymbolEntry::global(DispatchKind::NONE, "extra"),
                SymbolDefinition::literal(Expr::constant(1)),
            )
            .is_ok());
    }

    #[test]
    fn test_arithmetic_folding() {
        let sum = list(vec![
            ident("+"),
            Expr::constant(1),
            Expr::constant(2),
            Expr::constant(3),
        ]);

        assert_eq!(eval(sum), Value::I32(6));

        let difference = list(vec![
            ident("-"),
            Expr::constant(10),
            Expr::constant(3),
            Expr::constant(2),
        ]);

        assert_eq!(eval(difference), Value::I32(5));

        let mixed = list(vec![ident("*"), Expr::constant(2), Expr::constant(1.5)]);

        assert_eq!(eval(mixed), Value::F64(3.0));

        let negation = list(vec![ident("-"), Expr::constant(4)]);

        assert_eq!(eval(negation), Value::I32(-4));

        let comparison = list(vec![ident("<"), Expr::constant(1), Expr::constant(2)]);

        assert_eq!(eval(comparison), Value::Bool(true));
    }

    #[test]
    fn test_let_and_compound_assignment() {
        // (let x 1 (+= x 5) (* x 2))
        let program = list(vec![
            ident("let"),
            ident("x"),
            Expr::constant(1),
            list(vec![ident("+="), ident("x"), Expr::constant(5)]),
            list(vec![ident("*"), ident("x"), Expr::constant(2)]),
        ]);

        assert_eq!(eval(program), Value::I32(12));
    }

    #[test]
    fn test_lambda_and_macro_forms() {
        // (let square (fn [(n Int32)] (* n n)) (square 9))
        let program = list(vec![
            ident("let"),
            ident("square"),
            list(vec![
                ident("fn"),
                Expr::vector(vec![list(vec![ident("n"), ident("Int32")])]),
                list(vec![ident("*"), ident("n"), ident("n")]),
            ]),
            list(vec![ident("square"), Expr::constant(9)]),
        ]);

        assert_eq!(eval(program), Value::I32(81));

        // (let twice (macro [x] (+ x x)) (twice "ab"))
        let program = list(vec![
            ident("let"),
            ident("twice"),
            list(vec![
                ident("macro"),
                Expr::vector(vec![ident("x")]),
                list(vec![ident("+"), ident("x"), ident("x")]),
            ]),
            list(vec![ident("twice"), Expr::constant("ab")]),
        ]);

        assert_eq!(eval(program), Value::from("abab"));
    }

    #[test]
    fn test_conditional_and_type_forms() {
        // (if (> 3 2) "more" "less")
        let program = list(vec![
            ident("if"),
            list(vec![ident(">"), Expr::constant(3), Expr::constant(2)]),
            Expr::constant("more"),
            Expr::constant("less"),
        ]);

        assert_eq!(eval(program), Value::from("more"));

        // (is "text" String)
        let program = list(vec![ident("is"), Expr::constant("text"), ident("String")]);

        assert_eq!(eval(program), Value::Bool(true));

        // (cast Int64 7)
        let program = list(vec![ident("cast"), ident("Int64"), Expr::constant(7)]);

        assert_eq!(eval(program), Value::I64(7));

        // (?? nil "fallback")
        let program = list(vec![
            ident("??"),
            list(vec![ident("as"), ident("nil"), ident("String")]),
            Expr::constant("fallback"),
        ]);

        assert_eq!(eval(program), Value::from("fallback"));

        let ty = ident("Int32").reduce(SymbolTable::root(), None).unwrap();

        assert_eq!(ty.to_string(), "(TypeCandidate Int32)");
        assert_eq!(ty.ty(), Some(TypeMeta::static_of(TypeMeta::int32())));
    }

    #[test]
    fn test_unresolved_operator() {
        let table = SymbolTable::new(vec![SymbolTable::root().clone()]);

        let error = list(vec![ident("+"), Expr::constant(true), Expr::constant(1)])
            .reduce(&table, None)
            .unwrap_err();

        assert!(matches!(error, ReduceError::TypeMismatch { .. }));

        let error = list(vec![ident("lett"), ident("x"), Expr::constant(1), ident("x")])
            .reduce(&table, None)
            .unwrap_err();

        let ReduceError::Unresolved { suggestions, .. } = error else {
            panic!("unexpected error {error}");
        };

        assert_eq!(suggestions.first().map(|name| name.as_str()), Some("let"));
    }
}

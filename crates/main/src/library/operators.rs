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

use compact_str::format_compact;

use crate::{
    library::{define, site_of},
    runtime::{select_overload, ArgumentShape, MethodMeta, OverloadResolution, TypeMeta},
    semantics::{fold_leading, ReduceError, ReduceResult},
    symbols::{DispatchKind, SymbolDefinition, SymbolEntry, SymbolTable},
    tree::{BinaryOperator, Expr, UnaryOperator},
};

pub(super) fn define_operators(table: &SymbolTable) {
    for (name, operator) in [
        ("+", BinaryOperator::Add),
        ("*", BinaryOperator::Multiply),
        ("**", BinaryOperator::Power),
        ("&&", BinaryOperator::AndAlso),
        ("||", BinaryOperator::OrElse),
    ] {
        define(
            table,
            SymbolEntry::global(DispatchKind::METHOD, name),
            SymbolDefinition::variadic(move |left, right| binary(operator, left, right)),
        );
    }

    for (name, operator) in [
        ("-", BinaryOperator::Subtract),
        ("/", BinaryOperator::Divide),
        ("%", BinaryOperator::Modulo),
    ] {
        define(table, SymbolEntry::global(DispatchKind::METHOD, name), leading(operator));
    }

    for (name, operator) in [
        ("==", BinaryOperator::Equal),
        ("!=", BinaryOperator::NotEqual),
        ("<", BinaryOperator::LessThan),
        ("<=", BinaryOperator::LessThanOrEqual),
        (">", BinaryOperator::GreaterThan),
        (">=", BinaryOperator::GreaterThanOrEqual),
        ("??", BinaryOperator::Coalesce),
    ] {
        define(table, SymbolEntry::global(DispatchKind::METHOD, name), fixed(operator));
    }

    define(
        table,
        SymbolEntry::global(DispatchKind::METHOD, "!"),
        SymbolDefinition::new(|site, table, _| {
            let node = site_of(site)?;

            let [operand] = node.arguments.as_slice() else {
                return Err(ReduceError::ArityMismatch {
                    expected: 1,
                    actual: node.arguments.len(),
                    context: "unary operation",
                });
            };

            unary(UnaryOperator::Not, operand.reduce_value(table, None)?)
        }),
    );

    define(table, SymbolEntry::global(DispatchKind::METHOD, "="), assignment());

    for (name, operation) in [("+=", "+"), ("-=", "-"), ("*=", "*"), ("/=", "/")] {
        define(
            table,
            SymbolEntry::global(DispatchKind::METHOD, name),
            compound(operation),
        );
    }
}

// A binary operator whose call sites with more than two arguments are folded
// to the left. The Subtract operator also accepts a single operand.
fn leading(operator: BinaryOperator) -> SymbolDefinition {
    SymbolDefinition::new(move |site, table, _| {
        let node = site_of(site)?;

        if let Some(folded) = fold_leading(node) {
            return Ok(folded);
        }

        match node.arguments.as_slice() {
            [operand] if operator == BinaryOperator::Subtract => {
                unary(UnaryOperator::Negate, operand.reduce_value(table, None)?)
            }

            [left, right] => binary(
                operator,
                left.reduce_value(table, None)?,
                right.reduce_value(table, None)?,
            ),

            arguments => Err(ReduceError::ArityMismatch {
                expected: 2,
                actual: arguments.len(),
                context: "binary operation",
            }),
        }
    })
}

fn fixed(operator: BinaryOperator) -> SymbolDefinition {
    SymbolDefinition::new(move |site, table, _| {
        let node = site_of(site)?;

        let [left, right] = node.arguments.as_slice() else {
            return Err(ReduceError::ArityMismatch {
                expected: 2,
                actual: node.arguments.len(),
                context: "binary operation",
            });
        };

        let left = left.reduce_value(table, None)?;
        let right = right.reduce_value(table, left.ty())?;

        binary(operator, left, right)
    })
}

fn assignment() -> SymbolDefinition {
    SymbolDefinition::new(|site, table, _| {
        let node = site_of(site)?;

        let [target, value] = node.arguments.as_slice() else {
            return Err(ReduceError::ArityMismatch {
                expected: 2,
                actual: node.arguments.len(),
                context: "assignment",
            });
        };

        let target = target.reduce_value(table, None)?;
        let value = value.reduce_value(table, target.ty())?;

        let value = match (target.ty(), value.ty()) {
            (Some(expected), Some(actual))
                if expected != actual && expected.is_numeric() && actual.is_numeric() =>
            {
                Expr::convert(value, expected)?
            }

            _ => value,
        };

        Expr::assign(target, value)
    })
}

// Desugars `(op= target value)` into `(= target (op target value))`.
fn compound(operation: &'static str) -> SymbolDefinition {
    SymbolDefinition::new(move |site, _, _| {
        let node = site_of(site)?;

        let [target, value] = node.arguments.as_slice() else {
            return Err(ReduceError::ArityMismatch {
                expected: 2,
                actual: node.arguments.len(),
                context: "compound assignment",
            });
        };

        let operation = Expr::dispatch(
            DispatchKind::METHOD,
            None,
            operation,
            Vec::new(),
            vec![target.clone(), value.clone()],
        );

        Ok(Expr::dispatch(
            DispatchKind::METHOD,
            None,
            "=",
            Vec::new(),
            vec![target.clone(), operation],
        ))
    })
}

pub(super) fn binary(operator: BinaryOperator, left: Expr, right: Expr) -> ReduceResult<Expr> {
    if let Some(method) = operator_method(operator.name(), &[&left, &right])? {
        return Expr::binary_with_method(operator, left, right, method);
    }

    let (left, right) = promote(operator, left, right)?;

    Expr::binary(operator, left, right)
}

fn unary(operator: UnaryOperator, operand: Expr) -> ReduceResult<Expr> {
    if let Some(method) = operator_method(operator.name(), &[&operand])? {
        return Expr::unary_with_method(operator, operand, method);
    }

    Expr::unary(operator, operand)
}

// Finds the static `op_<Operator>` method of the operand types that accepts
// the operands.
fn operator_method(operator: &str, operands: &[&Expr]) -> ReduceResult<Option<&'static MethodMeta>> {
    let name = format_compact!("op_{operator}");

    let mut candidates = Vec::<&'static MethodMeta>::new();
    let mut shapes = Vec::with_capacity(operands.len());

    for operand in operands {
        let Some(ty) = operand.ty() else {
            return Ok(None);
        };

        shapes.push(match operand.is_nil_constant() {
            true => ArgumentShape::Nil,
            false => ArgumentShape::Typed(ty),
        });

        if ty.is_numeric() || operand.is_nil_constant() {
            continue;
        }

        for method in ty.methods(&name) {
            if method.is_static()
                && method.parameters().len() == operands.len()
                && !candidates.iter().any(|known| std::ptr::eq(*known, method))
            {
                candidates.push(method);
            }
        }
    }

    if candidates.is_empty() {
        return Ok(None);
    }

    match select_overload(&candidates, &shapes, &[], None) {
        OverloadResolution::Selected(method) => Ok(Some(method)),
        OverloadResolution::NotFound => Ok(None),

        OverloadResolution::Ambiguous(candidates) => Err(ReduceError::AmbiguousMatch {
            subject: name,
            candidates: candidates.len(),
        }),
    }
}

// Converts the narrower numeric operand to the type of the wider one.
fn promote(operator: BinaryOperator, left: Expr, right: Expr) -> ReduceResult<(Expr, Expr)> {
    if !operator.is_arithmetic() && !operator.is_comparison() {
        return Ok((left, right));
    }

    let (Some(left_ty), Some(right_ty)) = (left.ty(), right.ty()) else {
        return Ok((left, right));
    };

    let (Some(left_rank), Some(right_rank)) = (numeric_rank(left_ty), numeric_rank(right_ty)) else {
        return Ok((left, right));
    };

    match left_rank.cmp(&right_rank) {
        std::cmp::Ordering::Less => Ok((Expr::convert(left, right_ty)?, right)),
        std::cmp::Ordering::Greater => Ok((left, Expr::convert(right, left_ty)?)),
        std::cmp::Ordering::Equal => Ok((left, right)),
    }
}

#[inline(always)]
fn numeric_rank(ty: &'static TypeMeta) -> Option<u8> {
    if ty == TypeMeta::int32() {
        return Some(0);
    }

    if ty == TypeMeta::int64() {
        return Some(1);
    }

    if ty == TypeMeta::double() {
        return Some(2);
    }

    None
}

#[cfg(test)]
mod tests {
    use semver::Version;

    use crate::{
        library::operators::binary,
        runtime::{Domain, MethodDecl, TypeMeta, Value},
        tree::{BinaryOperator, Expr},
    };

    #[test]
    fn test_operator_method() {
        let assembly = Domain::get().define_assembly("operator_tests", Version::new(1, 0, 0));

        let money = assembly.build_type("Money").build();

        let _ = money.define_method(
            MethodDecl::function("op_Add", |_| Ok(Value::from("added")))
                .parameter("left", money)
                .parameter("right", money)
                .returns(TypeMeta::string()),
        );

        let left = Expr::typed_constant(Value::Nil, money).unwrap();
        let right = Expr::parameter("right", money);

        let sum = binary(BinaryOperator::Add, left, right).unwrap();

        assert_eq!(sum.ty(), Some(TypeMeta::string()));

        let promoted = binary(BinaryOperator::Add, Expr::constant(1), Expr::constant(2i64)).unwrap();

        assert_eq!(promoted.ty(), Some(TypeMeta::int64()));
        assert_eq!(promoted.evaluate().unwrap(), Value::I64(3));
    }
}

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

use std::cmp::Ordering;

use compact_str::CompactString;

use crate::{
    runtime::{NumberCastCause, RuntimeError, RuntimeResult, TypeMeta, Value},
    tree::{BinaryOperator, UnaryOperator},
};

enum Numbers {
    I32(i32, i32),
    I64(i64, i64),
    F64(f64, f64),
}

impl Numbers {
    #[inline(always)]
    fn of(left: &Value, right: &Value) -> Option<Self> {
        match (left, right) {
            (Value::I32(left), Value::I32(right)) => Some(Self::I32(*left, *right)),
            (Value::I64(left), Value::I64(right)) => Some(Self::I64(*left, *right)),
            (Value::F64(left), Value::F64(right)) => Some(Self::F64(*left, *right)),
            _ => None,
        }
    }
}

/// Converts two numeric operands of distinct types to the wider of the
/// types: Int32, Int64 and Double in the ascending order.
pub(super) fn promote(left: Value, right: Value) -> (Value, Value) {
    let rank = |value: &Value| match value {
        Value::I32(..) => Some(0),
        Value::I64(..) => Some(1),
        Value::F64(..) => Some(2),
        _ => None,
    };

    let (Some(left_rank), Some(right_rank)) = (rank(&left), rank(&right)) else {
        return (left, right);
    };

    let target = match left_rank.max(right_rank) {
        0 => TypeMeta::int32(),
        1 => TypeMeta::int64(),
        _ => TypeMeta::double(),
    };

    let left = left.convert(target).unwrap_or(left);
    let right = right.convert(target).unwrap_or(right);

    (left, right)
}

/// Applies a binary operator to the operand values.
///
/// The short-circuit operators and the Coalesce operator are applied to the
/// already evaluated operands. The Assign operator is not applicable to
/// values.
pub(super) fn binary_value(operator: BinaryOperator, left: &Value, right: &Value) -> RuntimeResult<Value> {
    let undefined = || RuntimeError::UndefinedOperator {
        operator: operator.name(),
        operand: left.ty(),
    };

    match operator {
        BinaryOperator::Add => {
            if let (Value::Str(left), Value::Str(right)) = (left, right) {
                let mut result = CompactString::with_capacity(left.len() + right.len());

                result.push_str(left);
                result.push_str(right);

                return Ok(Value::Str(result));
            }

            arithmetic(operator, left, right).ok_or_else(undefined)?
        }

        BinaryOperator::Subtract
        | BinaryOperator::Multiply
        | BinaryOperator::Divide
        | BinaryOperator::Modulo
        | BinaryOperator::Power => arithmetic(operator, left, right).ok_or_else(undefined)?,

        BinaryOperator::And | BinaryOperator::Or | BinaryOperator::ExclusiveOr => {
            bitwise(operator, left, right).ok_or_else(undefined)
        }

        BinaryOperator::AndAlso => match (left, right) {
            (Value::Bool(left), Value::Bool(right)) => Ok(Value::Bool(*left && *right)),
            _ => Err(undefined()),
        },

        BinaryOperator::OrElse => match (left, right) {
            (Value::Bool(left), Value::Bool(right)) => Ok(Value::Bool(*left || *right)),
            _ => Err(undefined()),
        },

        BinaryOperator::LeftShift | BinaryOperator::RightShift => {
            let Value::I32(shift) = right else {
                return Err(undefined());
            };

            let shift = *shift as u32;
            let left_shift = operator == BinaryOperator::LeftShift;

            match left {
                Value::I32(value) if left_shift => Ok(Value::I32(value.wrapping_shl(shift))),
                Value::I32(value) => Ok(Value::I32(value.wrapping_shr(shift))),
                Value::I64(value) if left_shift => Ok(Value::I64(value.wrapping_shl(shift))),
                Value::I64(value) => Ok(Value::I64(value.wrapping_shr(shift))),
                _ => Err(undefined()),
            }
        }

        BinaryOperator::Equal => Ok(Value::Bool(left == right)),

        BinaryOperator::NotEqual => Ok(Value::Bool(left != right)),

        BinaryOperator::LessThan
        | BinaryOperator::LessThanOrEqual
        | BinaryOperator::GreaterThan
        | BinaryOperator::GreaterThanOrEqual => {
            let Some(ordering) = compare(left, right) else {
                return Err(undefined());
            };

            let result = match operator {
                BinaryOperator::LessThan => ordering == Ordering::Less,
                BinaryOperator::LessThanOrEqual => ordering != Ordering::Greater,
                BinaryOperator::GreaterThan => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };

            Ok(Value::Bool(result))
        }

        BinaryOperator::Coalesce => match left.is_nil() {
            true => Ok(right.clone()),
            false => Ok(left.clone()),
        },

        BinaryOperator::ArrayIndex => {
            let Some(array) = left.as_array() else {
                return match left.is_nil() {
                    true => Err(RuntimeError::NullReference {
                        operation: "array indexing",
                    }),
                    false => Err(undefined()),
                };
            };

            let Some(index) = right.as_i64() else {
                return Err(RuntimeError::TypeMismatch {
                    expected: TypeMeta::int32(),
                    actual: right.ty(),
                });
            };

            array.get(index)
        }

        BinaryOperator::Assign => Err(undefined()),
    }
}

/// Applies a unary operator that does not depend on a target type.
pub(super) fn unary_value(operator: UnaryOperator, operand: &Value) -> RuntimeResult<Value> {
    let undefined = || RuntimeError::UndefinedOperator {
        operator: operator.name(),
        operand: operand.ty(),
    };

    match (operator, operand) {
        (UnaryOperator::Negate, Value::I32(value)) => Ok(Value::I32(value.wrapping_neg())),
        (UnaryOperator::Negate, Value::I64(value)) => Ok(Value::I64(value.wrapping_neg())),
        (UnaryOperator::Negate, Value::F64(value)) => Ok(Value::F64(-value)),

        (UnaryOperator::UnaryPlus, Value::I32(..) | Value::I64(..) | Value::F64(..)) => {
            Ok(operand.clone())
        }

        (UnaryOperator::Not, Value::Bool(value)) => Ok(Value::Bool(!value)),
        (UnaryOperator::Not | UnaryOperator::OnesComplement, Value::I32(value)) => {
            Ok(Value::I32(!value))
        }
        (UnaryOperator::Not | UnaryOperator::OnesComplement, Value::I64(value)) => {
            Ok(Value::I64(!value))
        }

        (UnaryOperator::Increment, Value::I32(value)) => Ok(Value::I32(value.wrapping_add(1))),
        (UnaryOperator::Increment, Value::I64(value)) => Ok(Value::I64(value.wrapping_add(1))),
        (UnaryOperator::Increment, Value::F64(value)) => Ok(Value::F64(value + 1.0)),
        (UnaryOperator::Decrement, Value::I32(value)) => Ok(Value::I32(value.wrapping_sub(1))),
        (UnaryOperator::Decrement, Value::I64(value)) => Ok(Value::I64(value.wrapping_sub(1))),
        (UnaryOperator::Decrement, Value::F64(value)) => Ok(Value::F64(value - 1.0)),

        (UnaryOperator::IsTrue, Value::Bool(value)) => Ok(Value::Bool(*value)),
        (UnaryOperator::IsFalse, Value::Bool(value)) => Ok(Value::Bool(!value)),

        (UnaryOperator::ArrayLength, Value::Array(array)) => {
            let length = cast::i32(array.len()).map_err(|cause| RuntimeError::NumberCast {
                from: TypeMeta::int64(),
                to: TypeMeta::int32(),
                cause: NumberCastCause::from(cause),
            })?;

            Ok(Value::I32(length))
        }

        (UnaryOperator::ArrayLength, Value::Nil) => Err(RuntimeError::NullReference {
            operation: "array length",
        }),

        _ => Err(undefined()),
    }
}

fn arithmetic(operator: BinaryOperator, left: &Value, right: &Value) -> Option<RuntimeResult<Value>> {
    Some(match Numbers::of(left, right)? {
        Numbers::I32(left, right) => integral(
            operator,
            left,
            right,
            i32::wrapping_add,
            i32::wrapping_sub,
            i32::wrapping_mul,
            i32::wrapping_div,
            i32::wrapping_rem,
            i32::wrapping_pow,
            TypeMeta::int32(),
        )
        .map(Value::I32),

        Numbers::I64(left, right) => integral(
            operator,
            left,
            right,
            i64::wrapping_add,
            i64::wrapping_sub,
            i64::wrapping_mul,
            i64::wrapping_div,
            i64::wrapping_rem,
            i64::wrapping_pow,
            TypeMeta::int64(),
        )
        .map(Value::I64),

        Numbers::F64(left, right) => Ok(Value::F64(match operator {
            BinaryOperator::Add => left + right,
            BinaryOperator::Subtract => left - right,
            BinaryOperator::Multiply => left * right,
            BinaryOperator::Divide => left / right,
            BinaryOperator::Modulo => left % right,
            _ => left.powf(right),
        })),
    })
}

#[allow(clippy::too_many_arguments)]
fn integral<T: Copy + Default + PartialEq + TryInto<u32>>(
    operator: BinaryOperator,
    left: T,
    right: T,
    add: fn(T, T) -> T,
    subtract: fn(T, T) -> T,
    multiply: fn(T, T) -> T,
    divide: fn(T, T) -> T,
    remainder: fn(T, T) -> T,
    power: fn(T, u32) -> T,
    ty: &'static TypeMeta,
) -> RuntimeResult<T> {
    match operator {
        BinaryOperator::Add => Ok(add(left, right)),
        BinaryOperator::Subtract => Ok(subtract(left, right)),
        BinaryOperator::Multiply => Ok(multiply(left, right)),

        BinaryOperator::Divide | BinaryOperator::Modulo if right == T::default() => {
            Err(RuntimeError::DivisionByZero)
        }

        BinaryOperator::Divide => Ok(divide(left, right)),
        BinaryOperator::Modulo => Ok(remainder(left, right)),

        _ => match right.try_into() {
            Ok(exponent) => Ok(power(left, exponent)),

            Err(_) => Err(RuntimeError::NumberCast {
                from: ty,
                to: ty,
                cause: NumberCastCause::Underflow,
            }),
        },
    }
}

fn bitwise(operator: BinaryOperator, left: &Value, right: &Value) -> Option<Value> {
    macro_rules! apply {
        ($variant:ident, $left:expr, $right:expr) => {
            Value::$variant(match operator {
                BinaryOperator::And => $left & $right,
                BinaryOperator::Or => $left | $right,
                _ => $left ^ $right,
            })
        };
    }

    match (left, right) {
        (Value::Bool(left), Value::Bool(right)) => Some(apply!(Bool, *left, *right)),
        (Value::I32(left), Value::I32(right)) => Some(apply!(I32, *left, *right)),
        (Value::I64(left), Value::I64(right)) => Some(apply!(I64, *left, *right)),
        _ => None,
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::I32(left), Value::I32(right)) => Some(left.cmp(right)),
        (Value::I64(left), Value::I64(right)) => Some(left.cmp(right)),
        (Value::F64(left), Value::F64(right)) => left.partial_cmp(right),
        (Value::Char(left), Value::Char(right)) => Some(left.cmp(right)),
        (Value::Str(left), Value::Str(right)) => Some(left.cmp(right)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        interpret::ops::{binary_value, promote, unary_value},
        runtime::{RuntimeError, Value},
        tree::{BinaryOperator, UnaryOperator},
    };

    #[test]
    fn test_arithmetic() {
        let eval = |operator, left: i32, right: i32| {
            binary_value(operator, &Value::I32(left), &Value::I32(right)).unwrap()
        };

        assert_eq!(eval(BinaryOperator::Add, 2, 3), Value::I32(5));
        assert_eq!(eval(BinaryOperator::Subtract, 2, 3), Value::I32(-1));
        assert_eq!(eval(BinaryOperator::Multiply, 4, 3), Value::I32(12));
        assert_eq!(eval(BinaryOperator::Divide, 7, 2), Value::I32(3));
        assert_eq!(eval(BinaryOperator::Modulo, 7, 2), Value::I32(1));
        assert_eq!(eval(BinaryOperator::Power, 2, 10), Value::I32(1024));
        assert_eq!(eval(BinaryOperator::Add, i32::MAX, 1), Value::I32(i32::MIN));
        assert_eq!(eval(BinaryOperator::LessThan, 1, 2), Value::Bool(true));
        assert_eq!(eval(BinaryOperator::LeftShift, 1, 4), Value::I32(16));

        assert!(matches!(
            binary_value(BinaryOperator::Divide, &Value::I64(1), &Value::I64(0)),
            Err(RuntimeError::DivisionByZero),
        ));

        assert_eq!(
            binary_value(BinaryOperator::Divide, &Value::F64(1.0), &Value::F64(4.0)).unwrap(),
            Value::F64(0.25),
        );

        assert_eq!(
            binary_value(BinaryOperator::Add, &Value::from("ab"), &Value::from("cd")).unwrap(),
            Value::from("abcd"),
        );

        assert!(matches!(
            binary_value(BinaryOperator::Add, &Value::Bool(true), &Value::Bool(true)),
            Err(RuntimeError::UndefinedOperator { operator: "Add", .. }),
        ));
    }

    #[test]
    fn test_promotion() {
        let (left, right) = promote(Value::I32(1), Value::F64(0.5));

        assert_eq!(left, Value::F64(1.0));
        assert_eq!(right, Value::F64(0.5));

        let (left, right) = promote(Value::from("a"), Value::I32(1));

        assert_eq!(left, Value::from("a"));
        assert_eq!(right, Value::I32(1));
    }

    #[test]
    fn test_unary() {
        assert_eq!(unary_value(UnaryOperator::Negate, &Value::I32(3)).unwrap(), Value::I32(-3));
        assert_eq!(unary_value(UnaryOperator::Not, &Value::Bool(true)).unwrap(), Value::Bool(false));
        assert_eq!(unary_value(UnaryOperator::Increment, &Value::I64(1)).unwrap(), Value::I64(2));

        let array = Value::new_array(crate::runtime::TypeMeta::int32(), vec![Value::I32(1)]);

        assert_eq!(unary_value(UnaryOperator::ArrayLength, &array).unwrap(), Value::I32(1));
    }
}

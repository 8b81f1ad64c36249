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

use std::{
    error::Error as StdError,
    fmt::{Debug, Display, Formatter},
    result::Result as StdResult,
    sync::Arc,
};

use compact_str::CompactString;

use crate::runtime::{TypeMeta, Value};

/// A result of a runtime operation, which can either be a normal value or a
/// [RuntimeError].
pub type RuntimeResult<T> = StdResult<T, RuntimeError>;

/// An error that occurs while evaluating a reduced expression tree or while
/// invoking host members.
///
/// Script-level `throw` operations surface as [RuntimeError::Thrown], and
/// the try blocks of the interpreter catch every variant by converting it
/// to an exception [value](RuntimeError::to_exception).
#[derive(Clone)]
#[non_exhaustive]
pub enum RuntimeError {
    /// A member was accessed through a nil receiver.
    NullReference {
        /// A short description of the failed operation.
        operation: &'static str,
    },

    /// A value of an unexpected type was provided.
    TypeMismatch {
        expected: &'static TypeMeta,
        actual: &'static TypeMeta,
    },

    /// A value cannot be converted to the target type.
    InvalidCast {
        from: &'static TypeMeta,
        to: &'static TypeMeta,
    },

    /// A numeric value does not fit into the target numeric type.
    NumberCast {
        from: &'static TypeMeta,
        to: &'static TypeMeta,
        cause: NumberCastCause,
    },

    /// A function was called with the wrong number of arguments.
    ArityMismatch { parameters: usize, arguments: usize },

    /// An integer division or remainder by zero.
    DivisionByZero,

    /// An array index is out of the array bounds.
    OutOfBounds { index: i64, length: usize },

    /// A late-bound operation did not find a member of the receiver.
    UnknownMember {
        receiver: &'static TypeMeta,
        name: CompactString,
    },

    /// A late-bound operator is not applicable to the operand types.
    UndefinedOperator {
        operator: &'static str,
        operand: &'static TypeMeta,
    },

    /// A late-bound call matches several overloads equally well.
    AmbiguousCall {
        receiver: &'static TypeMeta,
        name: CompactString,
        candidates: usize,
    },

    /// A property without a getter was read.
    NotReadable { member: CompactString },

    /// A property without a setter, or a read-only location, was written.
    NotWritable { member: CompactString },

    /// A generic method definition was invoked without type arguments.
    OpenGeneric { method: CompactString },

    /// A parameter expression was evaluated outside of its scope.
    UnboundParameter { name: CompactString },

    /// An expression node that must be reduced before evaluation was
    /// evaluated.
    Unreduced { kind: &'static str },

    /// A value thrown by a script-level `throw` operation.
    Thrown { value: Value },

    /// The evaluation exceeded the maximum call depth.
    StackOverflow { limit: usize },

    /// An error raised by a native host function.
    Native {
        cause: Arc<dyn StdError + Send + Sync + 'static>,
    },
}

impl Debug for RuntimeError {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, formatter)
    }
}

impl Display for RuntimeError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NullReference { operation } => {
                formatter.write_fmt(format_args!("{operation} on a nil reference"))
            }

            Self::TypeMismatch { expected, actual } => formatter.write_fmt(format_args!(
                "expected '{expected}' value, but '{actual}' value provided"
            )),

            Self::InvalidCast { from, to } => {
                formatter.write_fmt(format_args!("cannot convert '{from}' to '{to}'"))
            }

            Self::NumberCast { from, to, cause } => match cause {
                NumberCastCause::Infinite => formatter.write_fmt(format_args!(
                    "cannot cast infinity value of {from} type to {to}"
                )),

                NumberCastCause::NAN => formatter.write_fmt(format_args!(
                    "cannot cast NaN value of {from} type to {to}"
                )),

                NumberCastCause::Overflow => formatter.write_fmt(format_args!(
                    "{from} value is too large for the range of {to} type"
                )),

                NumberCastCause::Underflow => formatter.write_fmt(format_args!(
                    "{from} value is too small for the range of {to} type"
                )),
            },

            Self::ArityMismatch {
                parameters,
                arguments,
            } => formatter.write_fmt(format_args!(
                "expected {parameters} arguments, but {arguments} provided"
            )),

            Self::DivisionByZero => formatter.write_str("division by zero"),

            Self::OutOfBounds { index, length } => {
                formatter.write_fmt(format_args!("index {index} out of 0..{length} bounds"))
            }

            Self::UnknownMember { receiver, name } => formatter.write_fmt(format_args!(
                "'{receiver}' does not have a member '{name}'"
            )),

            Self::UndefinedOperator { operator, operand } => formatter.write_fmt(format_args!(
                "operator '{operator}' is not defined for '{operand}'"
            )),

            Self::AmbiguousCall {
                receiver,
                name,
                candidates,
            } => formatter.write_fmt(format_args!(
                "call of '{receiver}.{name}' matches {candidates} overloads"
            )),

            Self::NotReadable { member } => {
                formatter.write_fmt(format_args!("'{member}' is write-only"))
            }

            Self::NotWritable { member } => {
                formatter.write_fmt(format_args!("'{member}' is read-only"))
            }

            Self::OpenGeneric { method } => formatter.write_fmt(format_args!(
                "cannot invoke open generic method '{method}'"
            )),

            Self::UnboundParameter { name } => formatter.write_fmt(format_args!(
                "parameter '{name}' is not bound in the current scope"
            )),

            Self::Unreduced { kind } => formatter.write_fmt(format_args!(
                "'{kind}' expression must be reduced before evaluation"
            )),

            Self::Thrown { value } => formatter.write_fmt(format_args!("thrown {value}")),

            Self::StackOverflow { limit } => {
                formatter.write_fmt(format_args!("call depth exceeds {limit}"))
            }

            Self::Native { cause } => Display::fmt(cause, formatter),
        }
    }
}

impl StdError for RuntimeError {
    #[inline]
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Native { cause } => Some(cause.as_ref()),
            _ => None,
        }
    }
}

impl RuntimeError {
    /// Wraps an arbitrary error raised by a native host function.
    #[inline(always)]
    pub fn native(cause: impl StdError + Send + Sync + 'static) -> Self {
        Self::Native {
            cause: Arc::new(cause),
        }
    }

    /// The type of the exception value that represents this error inside a
    /// catch block.
    pub fn exception_type(&self) -> &'static TypeMeta {
        match self {
            Self::Thrown { value } if !value.is_nil() => value.ty(),
            _ => TypeMeta::exception(),
        }
    }

    /// Converts this error to the value that a catch block receives.
    ///
    /// A thrown value is returned as is. Any other error is represented by
    /// an Exception object with the error message.
    pub fn to_exception(&self) -> Value {
        match self {
            Self::Thrown { value } if !value.is_nil() => value.clone(),
            _ => Value::exception(self.to_string()),
        }
    }
}

/// A type of the [RuntimeError::NumberCast] error.
///
/// This object describes the reason why the source numeric value cannot be
/// converted into the destination numeric value.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NumberCastCause {
    /// The target type does not support representation of infinite numbers.
    Infinite,

    /// The target type does not support representation of NaN numbers.
    NAN,

    /// The source numeric value is too large for the range of the target type.
    Overflow,

    /// The source numeric value is too small for the range of the target type.
    Underflow,
}

impl From<cast::Error> for NumberCastCause {
    #[inline]
    fn from(value: cast::Error) -> Self {
        match value {
            cast::Error::Infinite => Self::Infinite,
            cast::Error::NaN => Self::NAN,
            cast::Error::Overflow => Self::Overflow,
            cast::Error::Underflow => Self::Underflow,
        }
    }
}

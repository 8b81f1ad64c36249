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
};

use compact_str::CompactString;
use semver::Version;

use crate::semantics::ReduceError;

pub type SerialResult<T> = StdResult<T, SerialError>;

#[derive(Clone)]
#[non_exhaustive]
pub enum SerialError {
    /// The document refers to an assembly that is not defined in the
    /// [Domain](crate::runtime::Domain).
    AssemblyLoad { name: CompactString },

    /// The defined assembly is not compatible with the version the document
    /// was serialized against.
    AssemblyVersion {
        name: CompactString,
        expected: Version,
        found: Version,
    },

    /// A type or a member reference does not map back to a host entity.
    MemberResolution {
        /// The textual description of the reference.
        subject: CompactString,
        reason: &'static str,
    },

    /// Several overloads match a method reference equally well.
    AmbiguousMatch {
        subject: CompactString,
        candidates: usize,
    },

    /// A malformed canonical type name or method signature.
    Signature {
        text: CompactString,

        /// The byte offset of the error in the text.
        position: usize,
        message: &'static str,
    },

    /// The expression tree contains a node kind without a serialized form.
    UnsupportedNodeKind { kind: &'static str },

    /// A constant holds a value without a serialized form, such as an
    /// object instance or a function.
    UnsupportedConstant { ty: CompactString },

    /// The tree refers to a type that contains unbound generic parameters.
    UnsupportedType { ty: CompactString },

    /// The document format version is not supported by this implementation.
    UnsupportedVersion { found: u32, expected: u32 },

    /// A node refers to a missing entry of a document table.
    InvalidReference { table: &'static str, index: usize },

    /// The deserialized tree is not a valid expression.
    Reduce(ReduceError),

    /// The document text is not valid JSON or does not follow the document
    /// layout.
    Json { message: CompactString },
}

impl Debug for SerialError {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, formatter)
    }
}

impl Display for SerialError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AssemblyLoad { name } => {
                formatter.write_fmt(format_args!("assembly '{name}' is not loaded"))
            }

            Self::AssemblyVersion {
                name,
                expected,
                found,
            } => formatter.write_fmt(format_args!(
                "assembly '{name}' version {found} is not compatible with {expected}"
            )),

            Self::MemberResolution { subject, reason } => {
                formatter.write_fmt(format_args!("cannot resolve '{subject}': {reason}"))
            }

            Self::AmbiguousMatch {
                subject,
                candidates,
            } => formatter.write_fmt(format_args!(
                "'{subject}' matches {candidates} candidates equally well"
            )),

            Self::Signature {
                text,
                position,
                message,
            } => formatter.write_fmt(format_args!(
                "malformed signature '{text}' at {position}: {message}"
            )),

            Self::UnsupportedNodeKind { kind } => {
                formatter.write_fmt(format_args!("{kind} nodes cannot be serialized"))
            }

            Self::UnsupportedConstant { ty } => {
                formatter.write_fmt(format_args!("constant of type '{ty}' cannot be serialized"))
            }

            Self::UnsupportedType { ty } => formatter.write_fmt(format_args!(
                "type '{ty}' contains unbound generic parameters"
            )),

            Self::UnsupportedVersion { found, expected } => formatter.write_fmt(format_args!(
                "document format version {found} is not supported, expected {expected}"
            )),

            Self::InvalidReference { table, index } => {
                formatter.write_fmt(format_args!("invalid {table} reference #{index}"))
            }

            Self::Reduce(error) => Display::fmt(error, formatter),

            Self::Json { message } => formatter.write_fmt(format_args!("invalid document: {message}")),
        }
    }
}

impl StdError for SerialError {
    #[inline]
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Reduce(error) => Some(error),
            _ => None,
        }
    }
}

impl From<ReduceError> for SerialError {
    #[inline(always)]
    fn from(error: ReduceError) -> Self {
        Self::Reduce(error)
    }
}

impl From<serde_json::Error> for SerialError {
    #[inline(always)]
    fn from(error: serde_json::Error) -> Self {
        Self::Json {
            message: CompactString::new(error.to_string()),
        }
    }
}

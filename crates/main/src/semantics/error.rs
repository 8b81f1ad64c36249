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

use crate::{
    runtime::TypeMeta,
    symbols::{DispatchKind, SymbolEntry},
};

/// A result of a tree reduction or a symbol table operation, which can
/// either be a normal value or a [ReduceError].
pub type ReduceResult<T> = StdResult<T, ReduceError>;

/// An error that occurs during tree reduction, symbol table lookups, or the
/// construction of executable expressions.
///
/// All errors are local and synchronous. The only sanctioned recovery path
/// is the `$missing` handler of the symbol table, which substitutes a
/// fallback definition for a call site that does not resolve otherwise.
#[derive(Clone)]
#[non_exhaustive]
pub enum ReduceError {
    /// The exact [resolve](crate::symbols::SymbolTable::resolve) lookup did
    /// not find the entry in the entire chain.
    SymbolNotFound { entry: SymbolEntry },

    /// The local [get](crate::symbols::SymbolTable::get) lookup did not find
    /// the entry.
    KeyNotFound { entry: SymbolEntry },

    /// Several candidates match equally well.
    AmbiguousMatch {
        /// A description of the lookup.
        subject: CompactString,

        /// The number of the equally ranked candidates.
        candidates: usize,
    },

    /// An attempt to modify a read-only symbol table.
    InvalidOperation { operation: &'static str },

    /// The call site does not resolve through the symbol tables, the
    /// reflection fallback, or the `$missing` handler.
    Unresolved {
        kind: DispatchKind,
        receiver: Option<&'static TypeMeta>,
        name: CompactString,

        /// Similar names visible at the call site.
        suggestions: Vec<CompactString>,
    },

    /// An operand of an executable expression has an unexpected type, or
    /// is not executable.
    TypeMismatch {
        /// The type the operand should be convertible to. None if any
        /// executable operand is accepted.
        expected: Option<&'static TypeMeta>,

        /// The static type of the operand. None if the operand must be
        /// reduced first.
        actual: Option<&'static TypeMeta>,

        /// A short description of the operand.
        context: &'static str,
    },

    /// An invalid number of operands.
    ArityMismatch {
        expected: usize,
        actual: usize,
        context: &'static str,
    },

    /// An expression is structurally invalid.
    Malformed {
        /// The name of the node kind.
        kind: &'static str,
        message: CompactString,
    },

    /// The types of the lambda parameters cannot be inferred from the
    /// context.
    CannotInfer { name: CompactString },

    /// Macro expansion exceeded the configured
    /// [limit](crate::semantics::ReduceConfig::expansion_limit).
    ExpansionLimit { limit: usize },
}

impl Debug for ReduceError {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, formatter)
    }
}

impl Display for ReduceError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SymbolNotFound { entry } => {
                formatter.write_fmt(format_args!("symbol '{entry}' not found"))
            }

            Self::KeyNotFound { entry } => {
                formatter.write_fmt(format_args!("symbol table does not contain '{entry}'"))
            }

            Self::AmbiguousMatch {
                subject,
                candidates,
            } => formatter.write_fmt(format_args!(
                "'{subject}' matches {candidates} candidates equally well"
            )),

            Self::InvalidOperation { operation } => {
                formatter.write_fmt(format_args!("cannot {operation} a read-only symbol table"))
            }

            Self::Unresolved {
                kind,
                receiver,
                name,
                suggestions,
            } => {
                match receiver {
                    Some(receiver) => formatter.write_fmt(format_args!(
                        "{kind} '{name}' not found in '{receiver}'"
                    ))?,

                    None => formatter.write_fmt(format_args!("{kind} '{name}' not found"))?,
                }

                if suggestions.is_empty() {
                    return Ok(());
                }

                formatter.write_str(". Did you mean ")?;

                for (index, suggestion) in suggestions.iter().enumerate() {
                    if index > 0 {
                        formatter.write_str(", ")?;
                    }

                    formatter.write_fmt(format_args!("'{suggestion}'"))?;
                }

                formatter.write_str("?")
            }

            Self::TypeMismatch {
                expected,
                actual,
                context,
            } => match (expected, actual) {
                (Some(expected), Some(actual)) => formatter.write_fmt(format_args!(
                    "{context}: expected '{expected}', but '{actual}' provided"
                )),

                (None, Some(actual)) => formatter.write_fmt(format_args!(
                    "{context}: '{actual}' is not applicable"
                )),

                (_, None) => formatter.write_fmt(format_args!(
                    "{context}: expression must be reduced first"
                )),
            },

            Self::ArityMismatch {
                expected,
                actual,
                context,
            } => formatter.write_fmt(format_args!(
                "{context}: expected {expected} operands, but {actual} provided"
            )),

            Self::Malformed { kind, message } => {
                formatter.write_fmt(format_args!("malformed '{kind}' expression: {message}"))
            }

            Self::CannotInfer { name } => formatter.write_fmt(format_args!(
                "cannot infer the type of the parameter '{name}'"
            )),

            Self::ExpansionLimit { limit } => {
                formatter.write_fmt(format_args!("macro expansion depth exceeds {limit}"))
            }
        }
    }
}

impl StdError for ReduceError {}

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

//! Tree reduction and dispatch resolution.
//!
//! [Expr::reduce](crate::tree::Expr::reduce) turns a tree with reducible
//! nodes into an executable tree. Names and call sites are resolved through
//! the [symbol tables](crate::symbols): the engine looks up the best
//! matching [SymbolDefinition](crate::symbols::SymbolDefinition) for each
//! [Dispatch](crate::tree::DispatchExpr) node, and invokes it to produce a
//! lower-level expression. If no symbol matches, the engine falls back to
//! the members of the receiver type (fields, properties, overloaded methods
//! and constructors), then to the `$missing` handler of the table chain,
//! and finally reports the [Unresolved](ReduceError::Unresolved) error.
//!
//! Macros are expanded only when invoked, and the depth of nested
//! expansions is bounded by the [ReduceConfig] of the current thread.

mod closeness;
mod config;
mod dispatch;
mod error;
mod macros;
mod reduce;
mod reflect;

pub use crate::semantics::{
    closeness::Closeness,
    config::{reduce_config, set_reduce_config, ReduceConfig},
    dispatch::{fold_leading, fold_remainder},
    error::{ReduceError, ReduceResult},
};

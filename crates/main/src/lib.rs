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

//TODO check warnings regularly
#![allow(warnings)]

//! # Ad Astra Reduce Crate
//!
//! An embeddable engine that turns the symbolic expression trees of a
//! Lisp-like scripting dialect into typed executable expression trees, and
//! evaluates them against a registry of host types.
//!
//! The pipeline consists of the following stages:
//!
//! 1. A front end produces a [tree](crate::tree) of reducible nodes:
//!    identifiers, vectors, lists and dispatch call sites.
//! 2. [Expr::reduce](crate::tree::Expr::reduce) resolves the names and the
//!    call sites through the chain of [symbol tables](crate::symbols), and
//!    through the members of the host [types](crate::runtime::TypeMeta) when
//!    no symbol matches. The result is a well-typed executable tree.
//! 3. [Expr::evaluate](crate::tree::Expr::evaluate) runs the executable
//!    tree with the [interpreter](crate::interpret).
//!
//! Reduced and unreduced trees can be stored in portable
//! [documents](crate::serial::Document) and restored in another process that
//! defines compatible host assemblies.
//!
//! ## Quick Start
//!
//! ```
//! use ad_astra_reduce::{runtime::Value, symbols::SymbolTable, tree::Expr};
//!
//! // (let square (fn [(n Int32)] (* n n)) (square 5))
//! let program = Expr::list(vec![
//!     Expr::ident("let"),
//!     Expr::ident("square"),
//!     Expr::list(vec![
//!         Expr::ident("fn"),
//!         Expr::vector(vec![Expr::list(vec![Expr::ident("n"), Expr::ident("Int32")])]),
//!         Expr::list(vec![Expr::ident("*"), Expr::ident("n"), Expr::ident("n")]),
//!     ]),
//!     Expr::list(vec![Expr::ident("square"), Expr::constant(5)]),
//! ]);
//!
//! let table = SymbolTable::new(vec![SymbolTable::root().clone()]);
//!
//! let reduced = program.reduce_value(&table, None).unwrap();
//!
//! assert_eq!(reduced.evaluate().unwrap(), Value::I32(25));
//! ```
//!
//! ## Logging
//!
//! The crate reports its activity through the [log](https://docs.rs/log)
//! facade under the following targets: `ad-astra-reduce::$symbols`,
//! `ad-astra-reduce::$dispatch`, `ad-astra-reduce::$serial` and
//! `ad-astra-reduce::$interpret`.
//!
//! ## Copyright
//!
//! This work is proprietary software with source-available code.
//!
//! To copy, use, distribute, or contribute to this work, you must agree to the
//! terms and conditions of the
//! [General License Agreement](https://github.com/Eliah-Lakhin/ad-astra/blob/master/EULA.md).
//!
//! Copyright (c) 2024 Ilya Lakhin (Илья Александрович Лахин). All rights reserved.

pub mod interpret;
pub mod library;
mod report;
pub mod runtime;
pub mod semantics;
pub mod serial;
pub mod symbols;
mod sync;
pub mod tree;

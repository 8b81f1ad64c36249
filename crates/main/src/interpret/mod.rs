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

//! A tree-walking evaluator of the reduced expression trees.
//!
//! The entry point is [Expr::evaluate](crate::tree::Expr::evaluate). The
//! evaluator walks the executable nodes directly, keeping the variable
//! slots in a chain of scopes: a Lambda captures the scope it was created
//! in, so the function values share the variables with the enclosing code.
//!
//! Dynamic nodes are resolved at run time against the runtime types of the
//! values through the same overload scoring that the reduction uses for the
//! static types.
//!
//! Evaluation depth is bounded per OS thread (see [set_depth_limit]).
//! Exceeding the bound raises [StackOverflow](crate::runtime::RuntimeError::StackOverflow),
//! which, like the Unreduced error, is never caught by the script-level
//! try blocks.

mod closure;
mod dynamic;
mod engine;
mod frame;
mod ops;

pub use crate::interpret::engine::{depth_limit, set_depth_limit, DEFAULT_DEPTH_LIMIT};

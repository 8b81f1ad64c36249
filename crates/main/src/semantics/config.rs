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

use std::cell::Cell;

use crate::semantics::{closeness::Closeness, ReduceError, ReduceResult};

/// Reduction settings of the current OS thread.
///
/// ```rust
/// use ad_astra_reduce::semantics::{set_reduce_config, ReduceConfig};
///
/// let mut config = ReduceConfig::new();
///
/// config.expansion_limit = 32;
///
/// set_reduce_config(config);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct ReduceConfig {
    /// The maximum depth of nested macro expansions. A macro that expands
    /// to itself fails with the ExpansionLimit error instead of exhausting
    /// the native stack.
    pub expansion_limit: usize,

    /// The maximum number of "did you mean" suggestions in the Unresolved
    /// error.
    pub max_suggestions: usize,

    /// The minimum similarity of a visible name to the unresolved name for
    /// the name to be suggested.
    pub suggestion_threshold: Closeness,
}

impl Default for ReduceConfig {
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}

impl ReduceConfig {
    #[inline(always)]
    pub const fn new() -> Self {
        Self {
            expansion_limit: 256,
            max_suggestions: 3,
            suggestion_threshold: Closeness::half(),
        }
    }
}

thread_local! {
    static CONFIG: Cell<ReduceConfig> = const { Cell::new(ReduceConfig::new()) };
    static EXPANSION_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Sets the reduction settings of the current OS thread.
#[inline(always)]
pub fn set_reduce_config(config: ReduceConfig) {
    CONFIG.with(|current| current.set(config))
}

/// Returns the reduction settings of the current OS thread.
#[inline(always)]
pub fn reduce_config() -> ReduceConfig {
    CONFIG.with(Cell::get)
}

// Counts the nesting depth of macro expansions on the current thread.
pub(super) struct ExpansionGuard(());

impl Drop for ExpansionGuard {
    #[inline(always)]
    fn drop(&mut self) {
        EXPANSION_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

impl ExpansionGuard {
    pub(super) fn enter() -> ReduceResult<Self> {
        let limit = reduce_config().expansion_limit;

        EXPANSION_DEPTH.with(|depth| {
            let next = depth.get() + 1;

            if next > limit {
                return Err(ReduceError::ExpansionLimit { limit });
            }

            depth.set(next);

            Ok(Self(()))
        })
    }
}

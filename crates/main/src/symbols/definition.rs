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
    fmt::{Debug, Formatter},
    sync::Arc,
};

use crate::{runtime::TypeMeta, semantics::ReduceResult, symbols::SymbolTable, tree::Expr};

type DefinitionFn =
    dyn Fn(&Expr, &SymbolTable, Option<&'static TypeMeta>) -> ReduceResult<Expr> + Send + Sync;

/// A reduction function stored in a symbol table.
///
/// The function receives the call site (a Dispatch expression whose
/// receiver is already reduced), the symbol table in scope at the call
/// site, and the type the caller expects the result to have. It returns a
/// lower-level expression, which may be reducible on its own: the dispatch
/// engine reduces the result further in the same scope.
///
/// Cloning a definition clones a shared reference to the function.
#[derive(Clone)]
pub struct SymbolDefinition(Arc<DefinitionFn>);

impl Debug for SymbolDefinition {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_fmt(format_args!("SymbolDefinition({:p})", Arc::as_ptr(&self.0)))
    }
}

impl SymbolDefinition {
    #[inline(always)]
    pub fn new(
        function: impl Fn(&Expr, &SymbolTable, Option<&'static TypeMeta>) -> ReduceResult<Expr>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self(Arc::new(function))
    }

    /// Creates a definition that always reduces to the same expression,
    /// regardless of the call site.
    #[inline(always)]
    pub fn literal(expr: Expr) -> Self {
        Self::new(move |_, _, _| Ok(expr.clone()))
    }

    /// Reduces the call site.
    #[inline(always)]
    pub fn invoke(
        &self,
        call_site: &Expr,
        table: &SymbolTable,
        expected: Option<&'static TypeMeta>,
    ) -> ReduceResult<Expr> {
        (self.0)(call_site, table, expected)
    }

    /// Returns true if both handles refer to the same function.
    #[inline(always)]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

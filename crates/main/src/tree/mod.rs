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

//! The executable expression tree.
//!
//! An [Expr] is either executable (a typed node that the
//! [interpreter](crate::interpret) can evaluate), or reducible (a node that
//! must be [reduced](Expr::reduce) against a symbol table first, such as an
//! unresolved name, a dispatch call site, or a sequence literal produced by
//! the reader).
//!
//! Executable nodes are created through the validating builder functions of
//! the Expr type, so an executable tree is always well-typed.

mod build;
mod display;
mod nodes;

use std::{
    fmt::{Debug, Formatter},
    sync::Arc,
};

pub use crate::tree::nodes::{
    AmbiguousLambdaExpr,
    AmbiguousParameterExpr,
    BinaryExpr,
    BinaryOperator,
    BlockExpr,
    CallExpr,
    CatchBlock,
    ConditionalExpr,
    ConstantExpr,
    DebugInfoExpr,
    DefaultExpr,
    DispatchExpr,
    DynamicExpr,
    DynamicOperation,
    ExtensionExpr,
    ExtensionNode,
    IdentExpr,
    InvokeExpr,
    LambdaExpr,
    MacroExpr,
    MemberBinding,
    MemberExpr,
    MemberInitExpr,
    ModuleExpr,
    NewArrayExpr,
    NewArrayKind,
    NewExpr,
    ParameterExpr,
    RuntimeVariablesExpr,
    SequenceExpr,
    SwitchCase,
    SwitchExpr,
    TryExpr,
    TypeBinaryExpr,
    TypeBinaryOperator,
    TypeCandidateExpr,
    UnaryExpr,
    UnaryOperator,
};
pub(crate) use crate::tree::build::{binary_type, executable, expect_assignable};
use crate::runtime::TypeMeta;

/// A node of the expression tree.
///
/// Expressions are immutable, and cloning an Expr clones a shared
/// reference to the node.
#[derive(Clone)]
pub struct Expr(Arc<ExprKind>);

impl Debug for Expr {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self.0.as_ref(), formatter)
    }
}

/// The closed set of expression node kinds.
#[derive(Clone, Debug)]
pub enum ExprKind {
    Constant(ConstantExpr),
    Parameter(ParameterExpr),
    Lambda(LambdaExpr),
    Block(BlockExpr),
    Call(CallExpr),
    New(NewExpr),
    NewArray(NewArrayExpr),
    Member(MemberExpr),
    MemberInit(MemberInitExpr),
    Binary(BinaryExpr),
    Unary(UnaryExpr),
    Conditional(ConditionalExpr),
    Invoke(InvokeExpr),
    TypeBinary(TypeBinaryExpr),
    Default(DefaultExpr),
    Switch(SwitchExpr),
    Try(TryExpr),
    RuntimeVariables(RuntimeVariablesExpr),
    DebugInfo(DebugInfoExpr),
    Dynamic(DynamicExpr),
    Ident(IdentExpr),
    Dispatch(DispatchExpr),
    Macro(MacroExpr),
    AmbiguousLambda(AmbiguousLambdaExpr),
    AmbiguousParameter(AmbiguousParameterExpr),
    Vector(SequenceExpr),
    List(SequenceExpr),
    TypeCandidate(TypeCandidateExpr),
    Module(ModuleExpr),
    Extension(ExtensionExpr),
}

impl ExprKind {
    /// The name of the node kind. Binary and unary nodes are named by their
    /// operators.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Constant(..) => "Constant",
            Self::Parameter(..) => "Parameter",
            Self::Lambda(..) => "Lambda",
            Self::Block(..) => "Block",
            Self::Call(..) => "Call",
            Self::New(..) => "New",
            Self::NewArray(NewArrayExpr {
                kind: NewArrayKind::Init(..),
                ..
            }) => "NewArrayInit",
            Self::NewArray(..) => "NewArrayBounds",
            Self::Member(..) => "MemberAccess",
            Self::MemberInit(..) => "MemberInit",
            Self::Binary(binary) => binary.operator.name(),
            Self::Unary(unary) => unary.operator.name(),
            Self::Conditional(..) => "Conditional",
            Self::Invoke(..) => "Invoke",
            Self::TypeBinary(binary) => binary.operator.name(),
            Self::Default(..) => "Default",
            Self::Switch(..) => "Switch",
            Self::Try(..) => "Try",
            Self::RuntimeVariables(..) => "RuntimeVariables",
            Self::DebugInfo(..) => "DebugInfo",
            Self::Dynamic(..) => "Dynamic",
            Self::Ident(..) => "Ident",
            Self::Dispatch(..) => "Dispatch",
            Self::Macro(..) => "Macro",
            Self::AmbiguousLambda(..) => "AmbiguousLambda",
            Self::AmbiguousParameter(..) => "AmbiguousParameter",
            Self::Vector(..) => "Vector",
            Self::List(..) => "List",
            Self::TypeCandidate(..) => "TypeCandidate",
            Self::Module(..) => "Module",
            Self::Extension(..) => "Extension",
        }
    }

    /// Returns true if the node must be reduced before evaluation.
    #[inline(always)]
    pub fn is_reducible(&self) -> bool {
        matches!(
            self,
            Self::Ident(..)
                | Self::Dispatch(..)
                | Self::Macro(..)
                | Self::AmbiguousLambda(..)
                | Self::AmbiguousParameter(..)
                | Self::Vector(..)
                | Self::List(..)
                | Self::TypeCandidate(..)
                | Self::Module(..)
                | Self::Extension(..)
        )
    }
}

impl Expr {
    #[inline(always)]
    pub fn kind(&self) -> &ExprKind {
        self.0.as_ref()
    }

    #[inline(always)]
    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    #[inline(always)]
    pub fn is_reducible(&self) -> bool {
        self.0.is_reducible()
    }

    /// Returns true if both handles point to the same node.
    #[inline(always)]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// The static type of the expression value.
    ///
    /// Returns None for the reducible nodes whose type is not known before
    /// the reduction. A TypeCandidate node has the static wrapper type of
    /// its target.
    pub fn ty(&self) -> Option<&'static TypeMeta> {
        Some(match self.kind() {
            ExprKind::Constant(node) => node.ty,
            ExprKind::Parameter(node) => node.ty,
            ExprKind::Lambda(node) => node.ty,
            ExprKind::Block(node) => node.ty,
            ExprKind::Call(node) => node.method.ret(),
            ExprKind::New(node) => node.constructor.declaring(),
            ExprKind::NewArray(node) => node.ty,
            ExprKind::Member(node) => node.ty,
            ExprKind::MemberInit(node) => return node.new.ty(),
            ExprKind::Binary(node) => node.ty,
            ExprKind::Unary(node) => node.ty,
            ExprKind::Conditional(node) => node.ty,
            ExprKind::Invoke(node) => node.ty,
            ExprKind::TypeBinary(..) => TypeMeta::boolean(),
            ExprKind::Default(node) => node.ty,
            ExprKind::Switch(node) => node.ty,
            ExprKind::Try(node) => node.ty,
            ExprKind::RuntimeVariables(..) => TypeMeta::object().array(1),
            ExprKind::DebugInfo(..) => TypeMeta::void(),
            ExprKind::Dynamic(node) => node.ty,
            ExprKind::AmbiguousParameter(node) => return node.ty,
            ExprKind::TypeCandidate(node) => TypeMeta::static_of(node.target),
            _ => return None,
        })
    }

    /// Returns the parameter id if this expression is a Parameter or an
    /// AmbiguousParameter.
    #[inline(always)]
    pub fn parameter_id(&self) -> Option<usize> {
        match self.kind() {
            ExprKind::Parameter(node) => Some(node.id),
            ExprKind::AmbiguousParameter(node) => Some(node.id),
            _ => None,
        }
    }

    /// Returns true if this expression is a nil constant.
    #[inline(always)]
    pub fn is_nil_constant(&self) -> bool {
        matches!(self.kind(), ExprKind::Constant(node) if node.value.is_nil())
    }

    #[inline(always)]
    pub(crate) fn from_kind(kind: ExprKind) -> Self {
        Self(Arc::new(kind))
    }
}

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
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use compact_str::CompactString;

use crate::{
    runtime::{MemberMeta, MethodMeta, TypeMeta, Value},
    semantics::ReduceResult,
    symbols::{DispatchKind, SymbolTable},
    tree::Expr,
};

static NEXT_PARAMETER_ID: AtomicUsize = AtomicUsize::new(1);

#[inline(always)]
pub(super) fn next_parameter_id() -> usize {
    NEXT_PARAMETER_ID.fetch_add(1, Ordering::SeqCst)
}

/// A constant value of a declared type.
///
/// The declared type may be more general than the runtime type of the
/// value: an `Int32` constant declared as `Object`, or a nil constant
/// declared as `String`.
#[derive(Clone, Debug)]
pub struct ConstantExpr {
    pub value: Value,
    pub ty: &'static TypeMeta,
}

/// A named and typed variable slot.
///
/// Parameters have identity: two parameter expressions refer to the same
/// variable only if their ids are equal.
#[derive(Clone, Debug)]
pub struct ParameterExpr {
    pub id: usize,
    pub name: CompactString,
    pub ty: &'static TypeMeta,
}

#[derive(Clone, Debug)]
pub struct LambdaExpr {
    /// Parameter expressions.
    pub parameters: Vec<Expr>,
    pub body: Expr,

    /// The function type (``Fn`N[P1, ..., Ret]``).
    pub ty: &'static TypeMeta,
}

impl LambdaExpr {
    /// The return type of the lambda.
    #[inline(always)]
    pub fn ret(&self) -> &'static TypeMeta {
        match self.ty.function_signature() {
            Some((_, ret)) => ret,
            None => TypeMeta::object(),
        }
    }
}

/// A sequence of expressions with local variables. The value of the block
/// is the value of the last expression.
#[derive(Clone, Debug)]
pub struct BlockExpr {
    /// Parameter expressions of the block-local variables.
    pub variables: Vec<Expr>,
    pub expressions: Vec<Expr>,
    pub ty: &'static TypeMeta,
}

/// A method call.
#[derive(Clone, Debug)]
pub struct CallExpr {
    /// The receiver of an instance method. None for static methods.
    pub object: Option<Expr>,
    pub method: &'static MethodMeta,
    pub arguments: Vec<Expr>,

    /// True if the call is an extension method call whose first argument is
    /// the syntactic receiver.
    pub extension: bool,
}

/// An object construction.
#[derive(Clone, Debug)]
pub struct NewExpr {
    pub constructor: &'static MethodMeta,
    pub arguments: Vec<Expr>,

    /// The members initialized by the corresponding constructor arguments.
    /// Either empty, or of the same length as the arguments.
    pub members: Vec<MemberMeta>,
}

#[derive(Clone, Debug)]
pub enum NewArrayKind {
    /// An array initialized with the item values.
    Init(Vec<Expr>),

    /// An array of the specified lengths filled with the default values.
    Bounds(Vec<Expr>),
}

#[derive(Clone, Debug)]
pub struct NewArrayExpr {
    pub element: &'static TypeMeta,
    pub kind: NewArrayKind,
    pub ty: &'static TypeMeta,
}

/// A field or property access.
#[derive(Clone, Debug)]
pub struct MemberExpr {
    /// The receiver of an instance member. None for static members.
    pub object: Option<Expr>,
    pub member: MemberMeta,
    pub ty: &'static TypeMeta,
}

#[derive(Clone, Debug)]
pub struct MemberBinding {
    pub member: MemberMeta,
    pub value: Expr,
}

/// An object construction followed by member assignments.
#[derive(Clone, Debug)]
pub struct MemberInitExpr {
    /// A New expression.
    pub new: Expr,
    pub bindings: Vec<MemberBinding>,
}

/// The operators of the binary expression family.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    And,
    Or,
    ExclusiveOr,
    AndAlso,
    OrElse,
    LeftShift,
    RightShift,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Coalesce,
    ArrayIndex,
    Assign,
}

impl BinaryOperator {
    pub const ALL: [Self; 22] = [
        Self::Add,
        Self::Subtract,
        Self::Multiply,
        Self::Divide,
        Self::Modulo,
        Self::Power,
        Self::And,
        Self::Or,
        Self::ExclusiveOr,
        Self::AndAlso,
        Self::OrElse,
        Self::LeftShift,
        Self::RightShift,
        Self::Equal,
        Self::NotEqual,
        Self::LessThan,
        Self::LessThanOrEqual,
        Self::GreaterThan,
        Self::GreaterThanOrEqual,
        Self::Coalesce,
        Self::ArrayIndex,
        Self::Assign,
    ];

    /// The node kind name of this operator.
    pub fn name(self) -> &'static str {
        match self {
            Self::Add => "Add",
            Self::Subtract => "Subtract",
            Self::Multiply => "Multiply",
            Self::Divide => "Divide",
            Self::Modulo => "Modulo",
            Self::Power => "Power",
            Self::And => "And",
            Self::Or => "Or",
            Self::ExclusiveOr => "ExclusiveOr",
            Self::AndAlso => "AndAlso",
            Self::OrElse => "OrElse",
            Self::LeftShift => "LeftShift",
            Self::RightShift => "RightShift",
            Self::Equal => "Equal",
            Self::NotEqual => "NotEqual",
            Self::LessThan => "LessThan",
            Self::LessThanOrEqual => "LessThanOrEqual",
            Self::GreaterThan => "GreaterThan",
            Self::GreaterThanOrEqual => "GreaterThanOrEqual",
            Self::Coalesce => "Coalesce",
            Self::ArrayIndex => "ArrayIndex",
            Self::Assign => "Assign",
        }
    }

    #[inline(always)]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|operator| operator.name() == name)
    }

    #[inline(always)]
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Equal
                | Self::NotEqual
                | Self::LessThan
                | Self::LessThanOrEqual
                | Self::GreaterThan
                | Self::GreaterThanOrEqual
        )
    }

    #[inline(always)]
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Self::Add | Self::Subtract | Self::Multiply | Self::Divide | Self::Modulo | Self::Power
        )
    }
}

#[derive(Clone, Debug)]
pub struct BinaryExpr {
    pub operator: BinaryOperator,
    pub left: Expr,
    pub right: Expr,

    /// A user-defined implementation of the operator: a static method with
    /// two parameters.
    pub method: Option<&'static MethodMeta>,

    /// A conversion lambda applied to the left operand of the Coalesce
    /// operator when it is not nil.
    pub conversion: Option<Expr>,
    pub ty: &'static TypeMeta,
}

/// The operators of the unary expression family.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum UnaryOperator {
    Negate,
    UnaryPlus,
    Not,
    OnesComplement,
    Convert,
    TypeAs,
    ArrayLength,
    Throw,
    Increment,
    Decrement,
    IsTrue,
    IsFalse,
    Quote,
}

impl UnaryOperator {
    pub const ALL: [Self; 13] = [
        Self::Negate,
        Self::UnaryPlus,
        Self::Not,
        Self::OnesComplement,
        Self::Convert,
        Self::TypeAs,
        Self::ArrayLength,
        Self::Throw,
        Self::Increment,
        Self::Decrement,
        Self::IsTrue,
        Self::IsFalse,
        Self::Quote,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Negate => "Negate",
            Self::UnaryPlus => "UnaryPlus",
            Self::Not => "Not",
            Self::OnesComplement => "OnesComplement",
            Self::Convert => "Convert",
            Self::TypeAs => "TypeAs",
            Self::ArrayLength => "ArrayLength",
            Self::Throw => "Throw",
            Self::Increment => "Increment",
            Self::Decrement => "Decrement",
            Self::IsTrue => "IsTrue",
            Self::IsFalse => "IsFalse",
            Self::Quote => "Quote",
        }
    }

    #[inline(always)]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|operator| operator.name() == name)
    }

    /// Returns true if the result type of this operator is chosen by the
    /// expression author rather than inferred from the operand.
    #[inline(always)]
    pub fn has_explicit_type(self) -> bool {
        matches!(self, Self::Convert | Self::TypeAs | Self::Throw)
    }
}

#[derive(Clone, Debug)]
pub struct UnaryExpr {
    pub operator: UnaryOperator,
    pub operand: Expr,

    /// A user-defined implementation of the operator: a static method with
    /// one parameter.
    pub method: Option<&'static MethodMeta>,
    pub ty: &'static TypeMeta,
}

#[derive(Clone, Debug)]
pub struct ConditionalExpr {
    pub test: Expr,
    pub if_true: Expr,
    pub if_false: Expr,
    pub ty: &'static TypeMeta,
}

/// An invocation of a function-typed expression.
#[derive(Clone, Debug)]
pub struct InvokeExpr {
    pub function: Expr,
    pub arguments: Vec<Expr>,
    pub ty: &'static TypeMeta,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TypeBinaryOperator {
    /// True if the operand value is convertible to the target type.
    TypeIs,

    /// True if the runtime type of the operand value is exactly the target
    /// type.
    TypeEqual,
}

impl TypeBinaryOperator {
    #[inline(always)]
    pub fn name(self) -> &'static str {
        match self {
            Self::TypeIs => "TypeIs",
            Self::TypeEqual => "TypeEqual",
        }
    }

    #[inline(always)]
    pub fn from_name(name: &str) -> Option<Self> {
        [Self::TypeIs, Self::TypeEqual]
            .into_iter()
            .find(|operator| operator.name() == name)
    }
}

#[derive(Clone, Debug)]
pub struct TypeBinaryExpr {
    pub operator: TypeBinaryOperator,
    pub operand: Expr,
    pub target: &'static TypeMeta,
}

#[derive(Clone, Debug)]
pub struct DefaultExpr {
    pub ty: &'static TypeMeta,
}

#[derive(Clone, Debug)]
pub struct SwitchCase {
    pub tests: Vec<Expr>,
    pub body: Expr,
}

#[derive(Clone, Debug)]
pub struct SwitchExpr {
    pub value: Expr,
    pub cases: Vec<SwitchCase>,
    pub default: Option<Expr>,
    pub ty: &'static TypeMeta,
}

/// An exception handler of a Try expression.
#[derive(Clone, Debug)]
pub struct CatchBlock {
    /// The type of the exceptions this handler catches.
    pub test: &'static TypeMeta,

    /// A parameter that receives the caught exception.
    pub variable: Option<Expr>,

    /// A Boolean expression that must hold for the handler to run.
    pub filter: Option<Expr>,
    pub body: Expr,
}

#[derive(Clone, Debug)]
pub struct TryExpr {
    pub body: Expr,
    pub handlers: Vec<CatchBlock>,

    /// Runs after the body and the handlers, regardless of their outcome.
    pub finally: Option<Expr>,

    /// Runs only if the body fails and no handler catches the failure.
    pub fault: Option<Expr>,
    pub ty: &'static TypeMeta,
}

/// Evaluates to an `Object[]` snapshot of the current variable values.
#[derive(Clone, Debug)]
pub struct RuntimeVariablesExpr {
    pub variables: Vec<Expr>,
}

/// A source code location marker. Evaluates to nothing.
#[derive(Clone, Debug)]
pub struct DebugInfoExpr {
    pub document: CompactString,
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl DebugInfoExpr {
    /// Returns true if this marker clears the current location. Such
    /// markers have zero coordinates.
    #[inline(always)]
    pub fn is_clear(&self) -> bool {
        self.start_line == 0 && self.end_line == 0
    }
}

/// A late-bound operation resolved against runtime values.
///
/// The arguments of the [DynamicExpr] are laid out as follows:
///
/// | Operation      | Arguments                       |
/// |----------------|---------------------------------|
/// | GetMember      | receiver                        |
/// | SetMember      | receiver, value                 |
/// | GetIndex       | receiver, index                 |
/// | SetIndex       | receiver, index, value          |
/// | InvokeMember   | receiver, arguments...          |
/// | Invoke         | function, arguments...          |
/// | Unary          | operand                         |
/// | Binary         | left, right                     |
/// | Convert        | operand                         |
/// | CreateInstance | type value, arguments...        |
#[derive(Clone, Debug)]
pub enum DynamicOperation {
    GetMember {
        name: CompactString,
    },
    SetMember {
        name: CompactString,
    },
    GetIndex,
    SetIndex,
    InvokeMember {
        name: CompactString,
        type_arguments: Vec<&'static TypeMeta>,
    },
    Invoke,
    Unary {
        operator: UnaryOperator,
    },
    Binary {
        operator: BinaryOperator,
    },
    Convert {
        ty: &'static TypeMeta,
    },
    CreateInstance,
}

impl DynamicOperation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetMember { .. } => "GetMember",
            Self::SetMember { .. } => "SetMember",
            Self::GetIndex => "GetIndex",
            Self::SetIndex => "SetIndex",
            Self::InvokeMember { .. } => "InvokeMember",
            Self::Invoke => "Invoke",
            Self::Unary { .. } => "Unary",
            Self::Binary { .. } => "Binary",
            Self::Convert { .. } => "Convert",
            Self::CreateInstance => "CreateInstance",
        }
    }

    /// The minimum number of arguments the operation requires.
    pub fn min_arguments(&self) -> usize {
        match self {
            Self::GetMember { .. } => 1,
            Self::SetMember { .. } => 2,
            Self::GetIndex => 2,
            Self::SetIndex => 3,
            Self::InvokeMember { .. } => 1,
            Self::Invoke => 1,
            Self::Unary { .. } => 1,
            Self::Binary { .. } => 2,
            Self::Convert { .. } => 1,
            Self::CreateInstance => 1,
        }
    }

    /// Returns false if the operation accepts only the minimum number of
    /// arguments.
    pub fn is_variadic(&self) -> bool {
        matches!(
            self,
            Self::InvokeMember { .. } | Self::Invoke | Self::CreateInstance
        )
    }
}

#[derive(Clone, Debug)]
pub struct DynamicExpr {
    pub operation: DynamicOperation,
    pub arguments: Vec<Expr>,
    pub ty: &'static TypeMeta,
}

/// An unresolved name.
#[derive(Clone, Debug)]
pub struct IdentExpr {
    pub name: CompactString,
}

/// An unresolved call site: a member access, a method call, or a
/// constructor call to be resolved through the symbol tables.
#[derive(Clone, Debug)]
pub struct DispatchExpr {
    pub kind: DispatchKind,
    pub receiver: Option<Expr>,
    pub name: CompactString,
    pub type_arguments: Vec<&'static TypeMeta>,
    pub arguments: Vec<Expr>,
}

/// A macro: a parameterized tree that is substituted at each call site.
///
/// The body is carried unreduced, and is reduced only after the
/// substitution at the call site.
#[derive(Clone, Debug)]
pub struct MacroExpr {
    /// AmbiguousParameter expressions.
    pub parameters: Vec<Expr>,
    pub body: Expr,
}

/// A lambda whose parameter types are not fixed yet.
#[derive(Clone, Debug)]
pub struct AmbiguousLambdaExpr {
    /// AmbiguousParameter expressions.
    pub parameters: Vec<Expr>,
    pub body: Expr,

    /// An explicitly declared return type.
    pub ret: Option<&'static TypeMeta>,
}

/// A parameter of an AmbiguousLambda or a Macro, optionally typed.
#[derive(Clone, Debug)]
pub struct AmbiguousParameterExpr {
    pub id: usize,
    pub name: CompactString,
    pub ty: Option<&'static TypeMeta>,
}

/// The elements of a Vector or a List literal.
#[derive(Clone, Debug)]
pub struct SequenceExpr {
    pub elements: Vec<Expr>,
}

/// A reference to a type itself rather than to a value of the type.
#[derive(Clone, Debug)]
pub struct TypeCandidateExpr {
    pub target: &'static TypeMeta,
}

/// A reference to a module symbol table used as a namespace.
#[derive(Clone, Debug)]
pub struct ModuleExpr {
    pub table: SymbolTable,
}

/// A host-defined reducible node.
pub trait ExtensionNode: Send + Sync + 'static {
    /// The node kind name used in diagnostics and in the structural text.
    fn name(&self) -> &str;

    /// Reduces this node to a lower-level expression.
    fn reduce(&self, table: &SymbolTable, expected: Option<&'static TypeMeta>) -> ReduceResult<Expr>;
}

#[derive(Clone)]
pub struct ExtensionExpr(pub Arc<dyn ExtensionNode>);

impl Debug for ExtensionExpr {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_fmt(format_args!("Extension({})", self.0.name()))
    }
}

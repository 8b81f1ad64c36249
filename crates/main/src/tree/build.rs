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

use std::sync::Arc;

use compact_str::CompactString;

use crate::{
    runtime::{MemberMeta, MethodMeta, TypeMeta, TypeShape, Value, MAX_FUNCTION_ARITY},
    semantics::{ReduceError, ReduceResult},
    symbols::{DispatchKind, SymbolTable},
    tree::{
        nodes::next_parameter_id,
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
        Expr,
        ExprKind,
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
    },
};

impl Expr {
    /// Creates a constant of the value's runtime type.
    #[inline(always)]
    pub fn constant(value: impl Into<Value>) -> Self {
        let value = value.into();
        let ty = value.ty();

        Self::from_kind(ExprKind::Constant(ConstantExpr { value, ty }))
    }

    /// Creates a constant of the declared type.
    ///
    /// The value must be convertible to the declared type without a
    /// conversion: nil requires a reference type, and any other value
    /// requires a type its runtime type is assignable to.
    pub fn typed_constant(value: impl Into<Value>, ty: &'static TypeMeta) -> ReduceResult<Self> {
        let value = value.into();

        let accepted = match value.is_nil() {
            true => !ty.is_value_type(),
            false => ty.is_assignable_from(value.ty()),
        };

        if !accepted {
            return Err(ReduceError::TypeMismatch {
                expected: Some(ty),
                actual: Some(value.ty()),
                context: "constant",
            });
        }

        Ok(Self::from_kind(ExprKind::Constant(ConstantExpr { value, ty })))
    }

    /// Creates a new variable with a unique identity.
    #[inline(always)]
    pub fn parameter(name: impl Into<CompactString>, ty: &'static TypeMeta) -> Self {
        Self::from_kind(ExprKind::Parameter(ParameterExpr {
            id: next_parameter_id(),
            name: name.into(),
            ty,
        }))
    }

    /// Creates a lambda whose return type is the type of the body.
    pub fn lambda(parameters: Vec<Expr>, body: Expr) -> ReduceResult<Self> {
        let ret = executable(&body, "lambda body")?;

        Self::lambda_returning(parameters, body, ret)
    }

    /// Creates a lambda with the declared return type. A Void lambda
    /// discards the value of its body.
    pub fn lambda_returning(
        parameters: Vec<Expr>,
        body: Expr,
        ret: &'static TypeMeta,
    ) -> ReduceResult<Self> {
        if parameters.len() > MAX_FUNCTION_ARITY {
            return Err(ReduceError::ArityMismatch {
                expected: MAX_FUNCTION_ARITY,
                actual: parameters.len(),
                context: "lambda parameters",
            });
        }

        let parameter_types = parameter_types(&parameters, "lambda parameter")?;

        if !ret.is_void() {
            expect_assignable(ret, &body, "lambda body")?;
        } else {
            let _ = executable(&body, "lambda body")?;
        }

        let ty = match TypeMeta::function(&parameter_types, ret) {
            Some(ty) => ty,

            None => {
                return Err(ReduceError::ArityMismatch {
                    expected: MAX_FUNCTION_ARITY,
                    actual: parameter_types.len(),
                    context: "lambda parameters",
                })
            }
        };

        Ok(Self::from_kind(ExprKind::Lambda(LambdaExpr {
            parameters,
            body,
            ty,
        })))
    }

    /// Creates a block of expressions with the block-local variables.
    pub fn block(variables: Vec<Expr>, expressions: Vec<Expr>) -> ReduceResult<Self> {
        let _ = parameter_types(&variables, "block variable")?;

        let mut ty = TypeMeta::void();

        for expression in &expressions {
            ty = executable(expression, "block expression")?;
        }

        Ok(Self::from_kind(ExprKind::Block(BlockExpr {
            variables,
            expressions,
            ty,
        })))
    }

    /// Creates a call of a static method (`object` is None) or of an
    /// instance method.
    #[inline(always)]
    pub fn call(
        object: Option<Expr>,
        method: &'static MethodMeta,
        arguments: Vec<Expr>,
    ) -> ReduceResult<Self> {
        Self::make_call(object, method, arguments, false)
    }

    fn make_call(
        object: Option<Expr>,
        method: &'static MethodMeta,
        arguments: Vec<Expr>,
        extension: bool,
    ) -> ReduceResult<Self> {
        if method.is_constructor() {
            return Err(ReduceError::Malformed {
                kind: "Call",
                message: CompactString::new("constructors are called through New expressions"),
            });
        }

        check_closed(method)?;

        match (&object, method.is_static()) {
            (None, true) => (),

            (Some(object), false) => {
                expect_assignable(method.declaring(), object, "call receiver")?;
            }

            (None, false) => {
                return Err(ReduceError::Malformed {
                    kind: "Call",
                    message: CompactString::new("instance method call without receiver"),
                })
            }

            (Some(..), true) => {
                return Err(ReduceError::Malformed {
                    kind: "Call",
                    message: CompactString::new("static method call with receiver"),
                })
            }
        }

        check_arguments(method, &arguments, "call argument")?;

        Ok(Self::from_kind(ExprKind::Call(CallExpr {
            object,
            method,
            arguments,
            extension,
        })))
    }

    /// Creates a call of a static method whose first argument is the
    /// syntactic receiver of the call site.
    pub fn extension_call(method: &'static MethodMeta, arguments: Vec<Expr>) -> ReduceResult<Self> {
        if !method.is_static() || method.parameters().is_empty() {
            return Err(ReduceError::Malformed {
                kind: "Call",
                message: CompactString::new("extension method must be static with parameters"),
            });
        }

        Self::make_call(None, method, arguments, true)
    }

    /// Creates an object construction.
    #[inline(always)]
    pub fn new(constructor: &'static MethodMeta, arguments: Vec<Expr>) -> ReduceResult<Self> {
        Self::new_with_members(constructor, arguments, Vec::new())
    }

    /// Creates an object construction that reports the members initialized
    /// by each argument.
    pub fn new_with_members(
        constructor: &'static MethodMeta,
        arguments: Vec<Expr>,
        members: Vec<MemberMeta>,
    ) -> ReduceResult<Self> {
        if !constructor.is_constructor() {
            return Err(ReduceError::Malformed {
                kind: "New",
                message: CompactString::new("the method is not a constructor"),
            });
        }

        check_closed(constructor)?;
        check_arguments(constructor, &arguments, "constructor argument")?;

        if !members.is_empty() && members.len() != arguments.len() {
            return Err(ReduceError::ArityMismatch {
                expected: arguments.len(),
                actual: members.len(),
                context: "constructor members",
            });
        }

        Ok(Self::from_kind(ExprKind::New(NewExpr {
            constructor,
            arguments,
            members,
        })))
    }

    /// Creates a single-dimensional array initialized with the items.
    pub fn new_array_init(element: &'static TypeMeta, items: Vec<Expr>) -> ReduceResult<Self> {
        for item in &items {
            expect_assignable(element, item, "array item")?;
        }

        Ok(Self::from_kind(ExprKind::NewArray(NewArrayExpr {
            element,
            kind: NewArrayKind::Init(items),
            ty: element.array(1),
        })))
    }

    /// Creates an array with the dimension lengths.
    pub fn new_array_bounds(element: &'static TypeMeta, lengths: Vec<Expr>) -> ReduceResult<Self> {
        if lengths.is_empty() {
            return Err(ReduceError::ArityMismatch {
                expected: 1,
                actual: 0,
                context: "array bounds",
            });
        }

        for length in &lengths {
            let ty = executable(length, "array bound")?;

            if ty != TypeMeta::int32() && ty != TypeMeta::int64() {
                return Err(ReduceError::TypeMismatch {
                    expected: Some(TypeMeta::int32()),
                    actual: Some(ty),
                    context: "array bound",
                });
            }
        }

        let ty = element.array(lengths.len());

        Ok(Self::from_kind(ExprKind::NewArray(NewArrayExpr {
            element,
            kind: NewArrayKind::Bounds(lengths),
            ty,
        })))
    }

    /// Creates a field or property access.
    pub fn member(object: Option<Expr>, member: MemberMeta) -> ReduceResult<Self> {
        if let MemberMeta::Method(..) = member {
            return Err(ReduceError::Malformed {
                kind: "MemberAccess",
                message: CompactString::new("methods are accessed through Call expressions"),
            });
        }

        let ty = match (&object, member.is_static()) {
            (None, true) => member.ty(),

            (Some(object), false) => {
                let receiver = expect_assignable(member.declaring(), object, "member receiver")?;

                member.ty_on(receiver)
            }

            _ => {
                return Err(ReduceError::Malformed {
                    kind: "MemberAccess",
                    message: CompactString::new("receiver does not match the member staticness"),
                })
            }
        };

        Ok(Self::from_kind(ExprKind::Member(MemberExpr { object, member, ty })))
    }

    /// Creates an object construction followed by member assignments.
    pub fn member_init(new: Expr, bindings: Vec<MemberBinding>) -> ReduceResult<Self> {
        let ExprKind::New(..) = new.kind() else {
            return Err(ReduceError::Malformed {
                kind: "MemberInit",
                message: CompactString::new("expected New expression"),
            });
        };

        let ty = executable(&new, "member init")?;

        for binding in &bindings {
            if binding.member.is_static() || matches!(binding.member, MemberMeta::Method(..)) {
                return Err(ReduceError::Malformed {
                    kind: "MemberInit",
                    message: CompactString::new("expected instance field or property"),
                });
            }

            if ty.view_of(binding.member.declaring()).is_none() {
                return Err(ReduceError::TypeMismatch {
                    expected: Some(binding.member.declaring()),
                    actual: Some(ty),
                    context: "member binding",
                });
            }

            expect_assignable(binding.member.ty_on(ty), &binding.value, "member binding")?;
        }

        Ok(Self::from_kind(ExprKind::MemberInit(MemberInitExpr {
            new,
            bindings,
        })))
    }

    /// Creates a binary operation with the built-in semantics of the
    /// operator.
    pub fn binary(operator: BinaryOperator, left: Expr, right: Expr) -> ReduceResult<Self> {
        let left_ty = executable(&left, "left operand")?;
        let mut right_ty = executable(&right, "right operand")?;

        if right.is_nil_constant() && !left_ty.is_value_type() {
            right_ty = left_ty;
        }

        if operator == BinaryOperator::Assign {
            check_assignable_location(&left)?;
        }

        let Some(ty) = binary_type(operator, left_ty, right_ty) else {
            return Err(ReduceError::TypeMismatch {
                expected: Some(left_ty),
                actual: Some(right_ty),
                context: operator.name(),
            });
        };

        Ok(Self::from_kind(ExprKind::Binary(BinaryExpr {
            operator,
            left,
            right,
            method: None,
            conversion: None,
            ty,
        })))
    }

    /// Creates a binary operation implemented by a static method with two
    /// parameters.
    pub fn binary_with_method(
        operator: BinaryOperator,
        left: Expr,
        right: Expr,
        method: &'static MethodMeta,
    ) -> ReduceResult<Self> {
        if !method.is_static() || method.parameters().len() != 2 {
            return Err(ReduceError::Malformed {
                kind: operator.name(),
                message: CompactString::new("operator method must be static with two parameters"),
            });
        }

        check_closed(method)?;

        expect_assignable(method.parameters()[0].ty, &left, "left operand")?;
        expect_assignable(method.parameters()[1].ty, &right, "right operand")?;

        Ok(Self::from_kind(ExprKind::Binary(BinaryExpr {
            operator,
            left,
            right,
            method: Some(method),
            conversion: None,
            ty: method.ret(),
        })))
    }

    /// Creates a Coalesce operation that converts a non-nil left operand
    /// through the conversion lambda.
    pub fn coalesce_with_conversion(left: Expr, right: Expr, conversion: Expr) -> ReduceResult<Self> {
        if executable(&left, "left operand")?.is_value_type() {
            return Err(ReduceError::Malformed {
                kind: "Coalesce",
                message: CompactString::new("left operand must be of a reference type"),
            });
        }

        let ExprKind::Lambda(lambda) = conversion.kind() else {
            return Err(ReduceError::Malformed {
                kind: "Coalesce",
                message: CompactString::new("conversion must be a lambda"),
            });
        };

        let [parameter] = lambda.parameters.as_slice() else {
            return Err(ReduceError::ArityMismatch {
                expected: 1,
                actual: lambda.parameters.len(),
                context: "coalesce conversion",
            });
        };

        expect_assignable(parameter_type(parameter, "coalesce conversion")?, &left, "coalesce conversion")?;

        let ty = lambda.ret();

        expect_assignable(ty, &right, "right operand")?;

        Ok(Self::from_kind(ExprKind::Binary(BinaryExpr {
            operator: BinaryOperator::Coalesce,
            left,
            right,
            method: None,
            conversion: Some(conversion.clone()),
            ty,
        })))
    }

    /// Creates an assignment of the value to a variable, a field, a
    /// writable property, or an array item.
    #[inline(always)]
    pub fn assign(target: Expr, value: Expr) -> ReduceResult<Self> {
        Self::binary(BinaryOperator::Assign, target, value)
    }

    /// Creates a unary operation whose result type is inferred from the
    /// operand.
    pub fn unary(operator: UnaryOperator, operand: Expr) -> ReduceResult<Self> {
        if operator.has_explicit_type() {
            return Err(ReduceError::Malformed {
                kind: operator.name(),
                message: CompactString::new("operator requires an explicit type"),
            });
        }

        let operand_ty = executable(&operand, "operand")?;

        let Some(ty) = unary_type(operator, &operand, operand_ty) else {
            return Err(ReduceError::TypeMismatch {
                expected: None,
                actual: Some(operand_ty),
                context: operator.name(),
            });
        };

        Ok(Self::from_kind(ExprKind::Unary(UnaryExpr {
            operator,
            operand,
            method: None,
            ty,
        })))
    }

    /// Creates a Convert, TypeAs or Throw operation with the explicit result
    /// type.
    pub fn unary_typed(operator: UnaryOperator, operand: Expr, ty: &'static TypeMeta) -> ReduceResult<Self> {
        let _ = executable(&operand, "operand")?;

        match operator {
            UnaryOperator::Convert | UnaryOperator::Throw => (),

            UnaryOperator::TypeAs if !ty.is_value_type() => (),

            UnaryOperator::TypeAs => {
                return Err(ReduceError::TypeMismatch {
                    expected: Some(TypeMeta::object()),
                    actual: Some(ty),
                    context: "TypeAs",
                })
            }

            _ => return Self::unary(operator, operand),
        }

        Ok(Self::from_kind(ExprKind::Unary(UnaryExpr {
            operator,
            operand,
            method: None,
            ty,
        })))
    }

    /// Creates a unary operation implemented by a static method with one
    /// parameter.
    pub fn unary_with_method(
        operator: UnaryOperator,
        operand: Expr,
        method: &'static MethodMeta,
    ) -> ReduceResult<Self> {
        if !method.is_static() || method.parameters().len() != 1 {
            return Err(ReduceError::Malformed {
                kind: operator.name(),
                message: CompactString::new("operator method must be static with one parameter"),
            });
        }

        check_closed(method)?;

        expect_assignable(method.parameters()[0].ty, &operand, "operand")?;

        Ok(Self::from_kind(ExprKind::Unary(UnaryExpr {
            operator,
            operand,
            method: Some(method),
            ty: method.ret(),
        })))
    }

    #[inline(always)]
    pub fn convert(operand: Expr, ty: &'static TypeMeta) -> ReduceResult<Self> {
        Self::unary_typed(UnaryOperator::Convert, operand, ty)
    }

    #[inline(always)]
    pub fn throw(value: Expr) -> ReduceResult<Self> {
        Self::unary_typed(UnaryOperator::Throw, value, TypeMeta::void())
    }

    /// Creates a conditional expression. The branch types must be related,
    /// and the result type is the more general one.
    pub fn condition(test: Expr, if_true: Expr, if_false: Expr) -> ReduceResult<Self> {
        let true_ty = executable(&if_true, "true branch")?;
        let false_ty = executable(&if_false, "false branch")?;

        let ty = if true_ty.is_assignable_from(false_ty) || if_false.is_nil_constant() && !true_ty.is_value_type() {
            true_ty
        } else if false_ty.is_assignable_from(true_ty) || if_true.is_nil_constant() && !false_ty.is_value_type() {
            false_ty
        } else {
            return Err(ReduceError::TypeMismatch {
                expected: Some(true_ty),
                actual: Some(false_ty),
                context: "conditional branches",
            });
        };

        Self::condition_typed(test, if_true, if_false, ty)
    }

    /// Creates a conditional expression of the explicit type. Void
    /// conditionals accept branches of any type.
    pub fn condition_typed(
        test: Expr,
        if_true: Expr,
        if_false: Expr,
        ty: &'static TypeMeta,
    ) -> ReduceResult<Self> {
        expect_exact(TypeMeta::boolean(), &test, "condition test")?;

        if ty.is_void() {
            let _ = executable(&if_true, "true branch")?;
            let _ = executable(&if_false, "false branch")?;
        } else {
            expect_assignable(ty, &if_true, "true branch")?;
            expect_assignable(ty, &if_false, "false branch")?;
        }

        Ok(Self::from_kind(ExprKind::Conditional(ConditionalExpr {
            test,
            if_true,
            if_false,
            ty,
        })))
    }

    /// Creates an invocation of a function-typed expression.
    pub fn invoke(function: Expr, arguments: Vec<Expr>) -> ReduceResult<Self> {
        let function_ty = executable(&function, "invoked function")?;

        let Some((parameters, ret)) = function_ty.function_signature() else {
            return Err(ReduceError::TypeMismatch {
                expected: None,
                actual: Some(function_ty),
                context: "invoked function",
            });
        };

        if parameters.len() != arguments.len() {
            return Err(ReduceError::ArityMismatch {
                expected: parameters.len(),
                actual: arguments.len(),
                context: "invoke arguments",
            });
        }

        for (parameter, argument) in parameters.iter().zip(&arguments) {
            expect_assignable(parameter, argument, "invoke argument")?;
        }

        Ok(Self::from_kind(ExprKind::Invoke(InvokeExpr {
            function,
            arguments,
            ty: ret,
        })))
    }

    pub fn type_binary(
        operator: TypeBinaryOperator,
        operand: Expr,
        target: &'static TypeMeta,
    ) -> ReduceResult<Self> {
        let _ = executable(&operand, operator.name())?;

        Ok(Self::from_kind(ExprKind::TypeBinary(TypeBinaryExpr {
            operator,
            operand,
            target,
        })))
    }

    /// Creates an expression that evaluates to the default value of the
    /// type.
    #[inline(always)]
    pub fn default(ty: &'static TypeMeta) -> Self {
        Self::from_kind(ExprKind::Default(DefaultExpr { ty }))
    }

    /// Creates a switch over the value. The case bodies and the default
    /// body must be assignable to the type of the first body, unless that
    /// type is Void.
    pub fn switch(value: Expr, cases: Vec<SwitchCase>, default: Option<Expr>) -> ReduceResult<Self> {
        let value_ty = executable(&value, "switch value")?;

        let ty = match (cases.first(), &default) {
            (Some(case), _) => executable(&case.body, "switch case")?,
            (None, Some(default)) => executable(default, "switch default")?,
            (None, None) => TypeMeta::void(),
        };

        for case in &cases {
            if case.tests.is_empty() {
                return Err(ReduceError::Malformed {
                    kind: "Switch",
                    message: CompactString::new("switch case without tests"),
                });
            }

            for test in &case.tests {
                let test_ty = executable(test, "switch test")?;

                if binary_type(BinaryOperator::Equal, value_ty, test_ty).is_none() {
                    return Err(ReduceError::TypeMismatch {
                        expected: Some(value_ty),
                        actual: Some(test_ty),
                        context: "switch test",
                    });
                }
            }

            expect_branch(ty, &case.body, "switch case")?;
        }

        if let Some(default) = &default {
            expect_branch(ty, default, "switch default")?;
        }

        Ok(Self::from_kind(ExprKind::Switch(SwitchExpr {
            value,
            cases,
            default,
            ty,
        })))
    }

    /// Creates a protected block with exception handlers, and optional
    /// finally and fault blocks.
    pub fn try_catch(
        body: Expr,
        handlers: Vec<CatchBlock>,
        finally: Option<Expr>,
        fault: Option<Expr>,
    ) -> ReduceResult<Self> {
        let ty = executable(&body, "try body")?;

        if handlers.is_empty() && finally.is_none() && fault.is_none() {
            return Err(ReduceError::Malformed {
                kind: "Try",
                message: CompactString::new("try block without handlers"),
            });
        }

        for handler in &handlers {
            if let Some(variable) = &handler.variable {
                let variable_ty = parameter_type(variable, "catch variable")?;

                if !variable_ty.is_assignable_from(handler.test) {
                    return Err(ReduceError::TypeMismatch {
                        expected: Some(handler.test),
                        actual: Some(variable_ty),
                        context: "catch variable",
                    });
                }
            }

            if let Some(filter) = &handler.filter {
                expect_exact(TypeMeta::boolean(), filter, "catch filter")?;
            }

            expect_branch(ty, &handler.body, "catch body")?;
        }

        if let Some(finally) = &finally {
            let _ = executable(finally, "finally block")?;
        }

        if let Some(fault) = &fault {
            let _ = executable(fault, "fault block")?;
        }

        Ok(Self::from_kind(ExprKind::Try(TryExpr {
            body,
            handlers,
            finally,
            fault,
            ty,
        })))
    }

    pub fn runtime_variables(variables: Vec<Expr>) -> ReduceResult<Self> {
        let _ = parameter_types(&variables, "runtime variable")?;

        Ok(Self::from_kind(ExprKind::RuntimeVariables(RuntimeVariablesExpr {
            variables,
        })))
    }

    /// Creates a source location marker.
    pub fn debug_info(
        document: impl Into<CompactString>,
        start: (u32, u32),
        end: (u32, u32),
    ) -> ReduceResult<Self> {
        if start > end {
            return Err(ReduceError::Malformed {
                kind: "DebugInfo",
                message: CompactString::new("start position is after end position"),
            });
        }

        Ok(Self::from_kind(ExprKind::DebugInfo(DebugInfoExpr {
            document: document.into(),
            start_line: start.0,
            start_column: start.1,
            end_line: end.0,
            end_column: end.1,
        })))
    }

    /// Creates a late-bound operation. The result type is Object, except for
    /// the Convert operation whose result type is its target type.
    pub fn dynamic(operation: DynamicOperation, arguments: Vec<Expr>) -> ReduceResult<Self> {
        let minimum = operation.min_arguments();

        let arity_matches = match operation.is_variadic() {
            true => arguments.len() >= minimum,
            false => arguments.len() == minimum,
        };

        if !arity_matches {
            return Err(ReduceError::ArityMismatch {
                expected: minimum,
                actual: arguments.len(),
                context: operation.name(),
            });
        }

        for argument in &arguments {
            let _ = executable(argument, operation.name())?;
        }

        let ty = match &operation {
            DynamicOperation::Convert { ty } => *ty,
            _ => TypeMeta::object(),
        };

        Ok(Self::from_kind(ExprKind::Dynamic(DynamicExpr {
            operation,
            arguments,
            ty,
        })))
    }

    /// Creates an unresolved name.
    #[inline(always)]
    pub fn ident(name: impl Into<CompactString>) -> Self {
        Self::from_kind(ExprKind::Ident(IdentExpr { name: name.into() }))
    }

    /// Creates an unresolved call site.
    pub fn dispatch(
        kind: DispatchKind,
        receiver: Option<Expr>,
        name: impl Into<CompactString>,
        type_arguments: Vec<&'static TypeMeta>,
        arguments: Vec<Expr>,
    ) -> Self {
        Self::from_kind(ExprKind::Dispatch(DispatchExpr {
            kind,
            receiver,
            name: name.into(),
            type_arguments,
            arguments,
        }))
    }

    /// Creates a macro. The parameters must be AmbiguousParameter
    /// expressions with distinct names.
    pub fn macro_expr(parameters: Vec<Expr>, body: Expr) -> ReduceResult<Self> {
        check_ambiguous_parameters(&parameters, "macro parameter")?;

        Ok(Self::from_kind(ExprKind::Macro(MacroExpr { parameters, body })))
    }

    /// Creates a lambda whose parameter types are fixed later by the
    /// reduction. The parameters must be AmbiguousParameter expressions
    /// with distinct names.
    pub fn ambiguous_lambda(
        parameters: Vec<Expr>,
        body: Expr,
        ret: Option<&'static TypeMeta>,
    ) -> ReduceResult<Self> {
        check_ambiguous_parameters(&parameters, "lambda parameter")?;

        Ok(Self::from_kind(ExprKind::AmbiguousLambda(AmbiguousLambdaExpr {
            parameters,
            body,
            ret,
        })))
    }

    #[inline(always)]
    pub fn ambiguous_parameter(name: impl Into<CompactString>, ty: Option<&'static TypeMeta>) -> Self {
        Self::from_kind(ExprKind::AmbiguousParameter(AmbiguousParameterExpr {
            id: next_parameter_id(),
            name: name.into(),
            ty,
        }))
    }

    /// Creates a Vector literal (`[a b c]`).
    #[inline(always)]
    pub fn vector(elements: Vec<Expr>) -> Self {
        Self::from_kind(ExprKind::Vector(SequenceExpr { elements }))
    }

    /// Creates a List literal (`(f a b)`).
    #[inline(always)]
    pub fn list(elements: Vec<Expr>) -> Self {
        Self::from_kind(ExprKind::List(SequenceExpr { elements }))
    }

    /// Creates a reference to the type itself.
    #[inline(always)]
    pub fn type_candidate(target: &'static TypeMeta) -> Self {
        Self::from_kind(ExprKind::TypeCandidate(TypeCandidateExpr { target }))
    }

    /// Creates a reference to a module symbol table.
    #[inline(always)]
    pub fn module(table: SymbolTable) -> Self {
        Self::from_kind(ExprKind::Module(ModuleExpr { table }))
    }

    #[inline(always)]
    pub fn extension(node: impl ExtensionNode) -> Self {
        Self::from_kind(ExprKind::Extension(ExtensionExpr(Arc::new(node))))
    }
}

/// Computes the result type of a binary operator with the built-in
/// semantics, or returns None if the operator does not apply to the operand
/// types.
pub(crate) fn binary_type(
    operator: BinaryOperator,
    left: &'static TypeMeta,
    right: &'static TypeMeta,
) -> Option<&'static TypeMeta> {
    let boolean = TypeMeta::boolean();
    let same = left == right;
    let integral = left == TypeMeta::int32() || left == TypeMeta::int64();

    match operator {
        BinaryOperator::Add if same && left == TypeMeta::string() => Some(left),

        BinaryOperator::Add
        | BinaryOperator::Subtract
        | BinaryOperator::Multiply
        | BinaryOperator::Divide
        | BinaryOperator::Modulo
        | BinaryOperator::Power => (same && left.is_numeric()).then_some(left),

        BinaryOperator::And | BinaryOperator::Or | BinaryOperator::ExclusiveOr => {
            (same && (left == boolean || integral)).then_some(left)
        }

        BinaryOperator::AndAlso | BinaryOperator::OrElse => (same && left == boolean).then_some(boolean),

        BinaryOperator::LeftShift | BinaryOperator::RightShift => {
            (integral && right == TypeMeta::int32()).then_some(left)
        }

        BinaryOperator::Equal | BinaryOperator::NotEqual => {
            (same || left.is_assignable_from(right) || right.is_assignable_from(left)).then_some(boolean)
        }

        BinaryOperator::LessThan
        | BinaryOperator::LessThanOrEqual
        | BinaryOperator::GreaterThan
        | BinaryOperator::GreaterThanOrEqual => {
            let ordered = left.is_numeric() || left == TypeMeta::char() || left == TypeMeta::string();

            (same && ordered).then_some(boolean)
        }

        BinaryOperator::Coalesce => {
            if left.is_value_type() {
                return None;
            }

            if left.is_assignable_from(right) {
                return Some(left);
            }

            right.is_assignable_from(left).then_some(right)
        }

        BinaryOperator::ArrayIndex => match left.shape() {
            TypeShape::Array { element, rank: 1 }
                if right == TypeMeta::int32() || right == TypeMeta::int64() =>
            {
                Some(*element)
            }

            _ => None,
        },

        BinaryOperator::Assign => left.is_assignable_from(right).then_some(left),
    }
}

fn unary_type(
    operator: UnaryOperator,
    operand: &Expr,
    ty: &'static TypeMeta,
) -> Option<&'static TypeMeta> {
    let integral = ty == TypeMeta::int32() || ty == TypeMeta::int64();

    match operator {
        UnaryOperator::Negate
        | UnaryOperator::UnaryPlus
        | UnaryOperator::Increment
        | UnaryOperator::Decrement => ty.is_numeric().then_some(ty),

        UnaryOperator::Not => (ty == TypeMeta::boolean() || integral).then_some(ty),

        UnaryOperator::OnesComplement => integral.then_some(ty),

        UnaryOperator::ArrayLength => match ty.shape() {
            TypeShape::Array { rank: 1, .. } => Some(TypeMeta::int32()),
            _ => None,
        },

        UnaryOperator::IsTrue | UnaryOperator::IsFalse => (ty == TypeMeta::boolean()).then_some(ty),

        UnaryOperator::Quote => matches!(operand.kind(), ExprKind::Lambda(..)).then_some(ty),

        UnaryOperator::Convert | UnaryOperator::TypeAs | UnaryOperator::Throw => None,
    }
}

// Returns the static type of an executable expression.
pub(crate) fn executable(expr: &Expr, context: &'static str) -> ReduceResult<&'static TypeMeta> {
    if expr.is_reducible() {
        return Err(ReduceError::TypeMismatch {
            expected: None,
            actual: None,
            context,
        });
    }

    match expr.ty() {
        Some(ty) => Ok(ty),

        None => Err(ReduceError::TypeMismatch {
            expected: None,
            actual: None,
            context,
        }),
    }
}

// Checks that the expression value can be passed where the target type is
// expected, and returns the static type of the expression.
pub(crate) fn expect_assignable(
    target: &'static TypeMeta,
    expr: &Expr,
    context: &'static str,
) -> ReduceResult<&'static TypeMeta> {
    let actual = executable(expr, context)?;

    if target.is_assignable_from(actual) || expr.is_nil_constant() && !target.is_value_type() {
        return Ok(actual);
    }

    Err(ReduceError::TypeMismatch {
        expected: Some(target),
        actual: Some(actual),
        context,
    })
}

fn expect_exact(target: &'static TypeMeta, expr: &Expr, context: &'static str) -> ReduceResult<()> {
    let actual = executable(expr, context)?;

    if actual != target {
        return Err(ReduceError::TypeMismatch {
            expected: Some(target),
            actual: Some(actual),
            context,
        });
    }

    Ok(())
}

fn expect_branch(ty: &'static TypeMeta, expr: &Expr, context: &'static str) -> ReduceResult<()> {
    match ty.is_void() {
        true => executable(expr, context).map(|_| ()),
        false => expect_assignable(ty, expr, context).map(|_| ()),
    }
}

fn parameter_type(expr: &Expr, context: &'static str) -> ReduceResult<&'static TypeMeta> {
    match expr.kind() {
        ExprKind::Parameter(parameter) => Ok(parameter.ty),

        _ => Err(ReduceError::Malformed {
            kind: expr.name(),
            message: CompactString::from(format!("expected Parameter as {context}")),
        }),
    }
}

fn parameter_types(parameters: &[Expr], context: &'static str) -> ReduceResult<Vec<&'static TypeMeta>> {
    let mut types = Vec::with_capacity(parameters.len());

    for (index, parameter) in parameters.iter().enumerate() {
        types.push(parameter_type(parameter, context)?);

        let id = parameter.parameter_id();

        if parameters[..index].iter().any(|previous| previous.parameter_id() == id) {
            return Err(ReduceError::Malformed {
                kind: "Parameter",
                message: CompactString::from(format!("duplicate {context}")),
            });
        }
    }

    Ok(types)
}

fn check_ambiguous_parameters(parameters: &[Expr], context: &'static str) -> ReduceResult<()> {
    for (index, parameter) in parameters.iter().enumerate() {
        let ExprKind::AmbiguousParameter(node) = parameter.kind() else {
            return Err(ReduceError::Malformed {
                kind: parameter.name(),
                message: CompactString::from(format!("expected AmbiguousParameter as {context}")),
            });
        };

        let duplicate = parameters[..index].iter().any(|previous| match previous.kind() {
            ExprKind::AmbiguousParameter(previous) => previous.name == node.name,
            _ => false,
        });

        if duplicate {
            return Err(ReduceError::Malformed {
                kind: "AmbiguousParameter",
                message: CompactString::from(format!("duplicate {context} '{}'", node.name)),
            });
        }
    }

    Ok(())
}

fn check_closed(method: &'static MethodMeta) -> ReduceResult<()> {
    if method.is_generic_definition() {
        return Err(ReduceError::Malformed {
            kind: "Call",
            message: CompactString::from(format!(
                "generic method '{}' requires type arguments",
                method.signature()
            )),
        });
    }

    Ok(())
}

fn check_arguments(method: &'static MethodMeta, arguments: &[Expr], context: &'static str) -> ReduceResult<()> {
    if method.parameters().len() != arguments.len() {
        return Err(ReduceError::ArityMismatch {
            expected: method.parameters().len(),
            actual: arguments.len(),
            context,
        });
    }

    for (parameter, argument) in method.parameters().iter().zip(arguments) {
        expect_assignable(parameter.ty, argument, context)?;
    }

    Ok(())
}

fn check_assignable_location(target: &Expr) -> ReduceResult<()> {
    match target.kind() {
        ExprKind::Parameter(..) => Ok(()),

        ExprKind::Member(MemberExpr {
            member: MemberMeta::Field(..),
            ..
        }) => Ok(()),

        ExprKind::Member(MemberExpr {
            member: MemberMeta::Property(property),
            ..
        }) if property.is_writable() => Ok(()),

        ExprKind::Binary(BinaryExpr {
            operator: BinaryOperator::ArrayIndex,
            ..
        }) => Ok(()),

        _ => Err(ReduceError::Malformed {
            kind: "Assign",
            message: CompactString::from(format!("'{}' is not assignable", target.name())),
        }),
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        runtime::TypeMeta,
        semantics::ReduceError,
        tree::{BinaryOperator, Expr, UnaryOperator},
    };

    #[test]
    fn test_binary_typing() {
        let sum = Expr::binary(BinaryOperator::Add, Expr::constant(1), Expr::constant(2)).unwrap();

        assert_eq!(sum.ty(), Some(TypeMeta::int32()));

        let concat = Expr::binary(BinaryOperator::Add, Expr::constant("a"), Expr::constant("b")).unwrap();

        assert_eq!(concat.ty(), Some(TypeMeta::string()));

        let compare =
            Expr::binary(BinaryOperator::LessThan, Expr::constant(1.5), Expr::constant(2.5)).unwrap();

        assert_eq!(compare.ty(), Some(TypeMeta::boolean()));

        assert!(matches!(
            Expr::binary(BinaryOperator::Add, Expr::constant(1), Expr::constant(2i64)),
            Err(ReduceError::TypeMismatch { .. }),
        ));

        assert!(matches!(
            Expr::binary(BinaryOperator::AndAlso, Expr::constant(1), Expr::constant(true)),
            Err(ReduceError::TypeMismatch { .. }),
        ));
    }

    #[test]
    fn test_assign_requires_location() {
        let variable = Expr::parameter("x", TypeMeta::int32());

        assert!(Expr::assign(variable.clone(), Expr::constant(5)).is_ok());
        assert!(matches!(
            Expr::assign(Expr::constant(1), Expr::constant(5)),
            Err(ReduceError::Malformed { .. }),
        ));
        assert!(matches!(
            Expr::assign(variable, Expr::constant("text")),
            Err(ReduceError::TypeMismatch { .. }),
        ));

        let text = Expr::parameter("s", TypeMeta::string());

        assert!(Expr::assign(text, Expr::constant(crate::runtime::Value::Nil)).is_ok());
    }

    #[test]
    fn test_lambda_and_block_types() {
        let x = Expr::parameter("x", TypeMeta::int32());

        let body = Expr::binary(BinaryOperator::Multiply, x.clone(), x.clone()).unwrap();
        let square = Expr::lambda(vec![x.clone()], body).unwrap();

        assert_eq!(
            square.ty(),
            TypeMeta::function(&[TypeMeta::int32()], TypeMeta::int32()),
        );

        assert!(matches!(
            Expr::lambda(vec![x.clone(), x.clone()], Expr::constant(1)),
            Err(ReduceError::Malformed { .. }),
        ));

        let empty = Expr::block(Vec::new(), Vec::new()).unwrap();

        assert_eq!(empty.ty(), Some(TypeMeta::void()));

        assert!(Expr::block(vec![Expr::constant(1)], Vec::new()).is_err());
        assert!(Expr::block(Vec::new(), vec![Expr::ident("x")]).is_err());
    }

    #[test]
    fn test_conditional_typing() {
        let test = Expr::constant(true);

        let general = Expr::condition(
            test.clone(),
            Expr::constant("text"),
            Expr::typed_constant(1, TypeMeta::object()).unwrap(),
        )
        .unwrap();

        assert_eq!(general.ty(), Some(TypeMeta::object()));

        assert!(Expr::condition(Expr::constant(1), Expr::constant(1), Expr::constant(2)).is_err());
        assert!(Expr::condition(test, Expr::constant(1), Expr::constant("a")).is_err());
    }

    #[test]
    fn test_unary_typing() {
        assert_eq!(
            Expr::unary(UnaryOperator::Negate, Expr::constant(3.0)).unwrap().ty(),
            Some(TypeMeta::double()),
        );

        assert!(Expr::unary(UnaryOperator::Negate, Expr::constant("a")).is_err());
        assert!(Expr::unary(UnaryOperator::Convert, Expr::constant(1)).is_err());

        assert_eq!(
            Expr::convert(Expr::constant(1), TypeMeta::int64()).unwrap().ty(),
            Some(TypeMeta::int64()),
        );

        assert!(Expr::unary_typed(UnaryOperator::TypeAs, Expr::constant(1), TypeMeta::int32()).is_err());
    }
}

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

use std::{cell::Cell, sync::Arc};

use log::trace;

use crate::{
    interpret::{closure::Closure, dynamic::late_bind, frame::Frame, ops},
    report::INTERPRET_LOG,
    runtime::{MemberMeta, NumberCastCause, RuntimeError, RuntimeResult, TypeMeta, Value},
    tree::{
        BinaryExpr,
        BinaryOperator,
        Expr,
        ExprKind,
        NewArrayKind,
        TryExpr,
        TypeBinaryOperator,
        UnaryExpr,
        UnaryOperator,
    },
};

/// The default value of the [evaluation depth limit](set_depth_limit).
pub const DEFAULT_DEPTH_LIMIT: usize = 512;

thread_local! {
    static DEPTH_LIMIT: Cell<usize> = const { Cell::new(DEFAULT_DEPTH_LIMIT) };
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Sets the maximum nesting depth of expression evaluation on the current
/// OS thread.
///
/// Every nested expression, including the bodies of the invoked closures,
/// counts towards the depth. When the limit is exceeded, the evaluation
/// fails with [RuntimeError::StackOverflow] instead of exhausting the
/// native stack.
#[inline(always)]
pub fn set_depth_limit(limit: usize) {
    DEPTH_LIMIT.with(|current| current.set(limit))
}

/// Returns the evaluation depth limit of the current OS thread.
#[inline(always)]
pub fn depth_limit() -> usize {
    DEPTH_LIMIT.with(Cell::get)
}

struct DepthGuard(());

impl Drop for DepthGuard {
    #[inline(always)]
    fn drop(&mut self) {
        DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

impl DepthGuard {
    #[inline]
    fn enter() -> RuntimeResult<Self> {
        let limit = depth_limit();

        DEPTH.with(|depth| {
            let next = depth.get() + 1;

            if next > limit {
                return Err(RuntimeError::StackOverflow { limit });
            }

            depth.set(next);

            Ok(Self(()))
        })
    }
}

impl Expr {
    /// Evaluates this executable expression.
    ///
    /// The expression must be closed: every parameter it refers to must be
    /// declared by an enclosing Lambda or Block, or by a catch block of an
    /// enclosing Try. Reducible nodes fail with [RuntimeError::Unreduced].
    ///
    /// A Lambda evaluates to a function value that captures the variables
    /// of the enclosing scopes by reference.
    pub fn evaluate(&self) -> RuntimeResult<Value> {
        trace!(target: INTERPRET_LOG, "Evaluating {} expression.", self.name());

        self.eval(&Frame::root())
    }

    pub(super) fn eval(&self, frame: &Arc<Frame>) -> RuntimeResult<Value> {
        let _guard = DepthGuard::enter()?;

        match self.kind() {
            ExprKind::Constant(node) => Ok(node.value.clone()),

            ExprKind::Parameter(node) => frame.get(node.id, &node.name),

            ExprKind::Lambda(node) => Ok(Value::function(Closure::new(node.clone(), frame.clone()))),

            ExprKind::Block(node) => {
                let scope = frame.child();

                for variable in &node.variables {
                    declare(&scope, variable, None)?;
                }

                let mut last = Value::Nil;

                for expression in &node.expressions {
                    last = expression.eval(&scope)?;
                }

                match node.ty.is_void() {
                    true => Ok(Value::Nil),
                    false => Ok(last),
                }
            }

            ExprKind::Call(node) => {
                let object = match &node.object {
                    Some(object) => Some(object.eval(frame)?),
                    None => None,
                };

                let arguments = eval_all(&node.arguments, frame)?;

                node.method.invoke(object.as_ref(), &arguments)
            }

            ExprKind::New(node) => {
                let arguments = eval_all(&node.arguments, frame)?;

                node.constructor.invoke(None, &arguments)
            }

            ExprKind::NewArray(node) => match &node.kind {
                NewArrayKind::Init(items) => {
                    Ok(Value::new_array_of(node.ty, eval_all(items, frame)?))
                }

                NewArrayKind::Bounds(lengths) => {
                    let mut bounds = Vec::with_capacity(lengths.len());

                    for length in lengths {
                        let value = length.eval(frame)?;

                        let Some(length) = value.as_i64() else {
                            return Err(RuntimeError::TypeMismatch {
                                expected: TypeMeta::int32(),
                                actual: value.ty(),
                            });
                        };

                        let length = cast::usize(length).map_err(|cause| RuntimeError::NumberCast {
                            from: value.ty(),
                            to: TypeMeta::int32(),
                            cause: NumberCastCause::from(cause),
                        })?;

                        bounds.push(length);
                    }

                    Ok(new_bounded_array(node.element, &bounds))
                }
            },

            ExprKind::Member(node) => {
                let object = match &node.object {
                    Some(object) => Some(object.eval(frame)?),
                    None => None,
                };

                match node.member {
                    MemberMeta::Field(field) => field.get(object.as_ref()),
                    MemberMeta::Property(property) => property.get(object.as_ref()),

                    MemberMeta::Method(method) => Err(RuntimeError::NotReadable {
                        member: method.name().into(),
                    }),
                }
            }

            ExprKind::MemberInit(node) => {
                let object = node.new.eval(frame)?;

                for binding in &node.bindings {
                    let value = binding.value.eval(frame)?;

                    set_member(binding.member, Some(&object), value)?;
                }

                Ok(object)
            }

            ExprKind::Binary(node) => eval_binary(node, frame),

            ExprKind::Unary(node) => eval_unary(node, frame),

            ExprKind::Conditional(node) => match node.test.eval(frame)?.is_truthy() {
                true => node.if_true.eval(frame),
                false => node.if_false.eval(frame),
            },

            ExprKind::Invoke(node) => {
                let function = node.function.eval(frame)?;
                let arguments = eval_all(&node.arguments, frame)?;

                match &function {
                    Value::Function(function) => function.call(&arguments),

                    Value::Nil => Err(RuntimeError::NullReference {
                        operation: "function invocation",
                    }),

                    other => Err(RuntimeError::TypeMismatch {
                        expected: node.function.ty().unwrap_or(TypeMeta::object()),
                        actual: other.ty(),
                    }),
                }
            }

            ExprKind::TypeBinary(node) => {
                let value = node.operand.eval(frame)?;

                if value.is_nil() {
                    return Ok(Value::Bool(false));
                }

                Ok(Value::Bool(match node.operator {
                    TypeBinaryOperator::TypeIs => node.target.is_assignable_from(value.ty()),
                    TypeBinaryOperator::TypeEqual => value.ty() == node.target,
                }))
            }

            ExprKind::Default(node) => Ok(node.ty.default_value()),

            ExprKind::Switch(node) => {
                let value = node.value.eval(frame)?;

                for case in &node.cases {
                    for test in &case.tests {
                        let test = test.eval(frame)?;

                        if ops::binary_value(BinaryOperator::Equal, &value, &test)?.is_truthy() {
                            return case.body.eval(frame);
                        }
                    }
                }

                match &node.default {
                    Some(default) => default.eval(frame),
                    None => Ok(Value::Nil),
                }
            }

            ExprKind::Try(node) => eval_try(node, frame),

            ExprKind::RuntimeVariables(node) => {
                let mut values = Vec::with_capacity(node.variables.len());

                for variable in &node.variables {
                    values.push(variable.eval(frame)?);
                }

                Ok(Value::new_array(TypeMeta::object(), values))
            }

            ExprKind::DebugInfo(node) => {
                match node.is_clear() {
                    true => trace!(target: INTERPRET_LOG, "Clear location in {}.", node.document),

                    false => trace!(
                        target: INTERPRET_LOG,
                        "At {}:{}:{}.",
                        node.document,
                        node.start_line,
                        node.start_column,
                    ),
                }

                Ok(Value::Nil)
            }

            ExprKind::Dynamic(node) => {
                let arguments = eval_all(&node.arguments, frame)?;

                late_bind(&node.operation, arguments)
            }

            _ => Err(RuntimeError::Unreduced { kind: self.name() }),
        }
    }
}

#[inline]
fn eval_all(expressions: &[Expr], frame: &Arc<Frame>) -> RuntimeResult<Vec<Value>> {
    let mut values = Vec::with_capacity(expressions.len());

    for expression in expressions {
        values.push(expression.eval(frame)?);
    }

    Ok(values)
}

// Declares the variable in the frame, initialized with the value or with the
// default value of the variable type.
pub(super) fn declare(frame: &Frame, variable: &Expr, value: Option<Value>) -> RuntimeResult<()> {
    let ExprKind::Parameter(node) = variable.kind() else {
        return Err(RuntimeError::Unreduced {
            kind: variable.name(),
        });
    };

    frame.bind(node.id, value.unwrap_or_else(|| node.ty.default_value()));

    Ok(())
}

fn new_bounded_array(element: &'static TypeMeta, bounds: &[usize]) -> Value {
    let Some((length, rest)) = bounds.split_first() else {
        return element.default_value();
    };

    let items = match rest.is_empty() {
        true => vec![element.default_value(); *length],
        false => (0..*length).map(|_| new_bounded_array(element, rest)).collect(),
    };

    Value::new_array_of(element.array(bounds.len()), items)
}

fn set_member(member: MemberMeta, object: Option<&Value>, value: Value) -> RuntimeResult<()> {
    match member {
        MemberMeta::Field(field) => field.set(object, value),
        MemberMeta::Property(property) => property.set(object, value),

        MemberMeta::Method(method) => Err(RuntimeError::NotWritable {
            member: method.name().into(),
        }),
    }
}

fn assign(target: &Expr, value: Value, frame: &Arc<Frame>) -> RuntimeResult<()> {
    match target.kind() {
        ExprKind::Parameter(node) => frame.set(node.id, &node.name, value),

        ExprKind::Member(node) => {
            let object = match &node.object {
                Some(object) => Some(object.eval(frame)?),
                None => None,
            };

            set_member(node.member, object.as_ref(), value)
        }

        ExprKind::Binary(node) if node.operator == BinaryOperator::ArrayIndex => {
            let array = node.left.eval(frame)?;
            let index = node.right.eval(frame)?;

            let Some(array) = array.as_array() else {
                return Err(RuntimeError::NullReference {
                    operation: "array item assignment",
                });
            };

            let Some(index) = index.as_i64() else {
                return Err(RuntimeError::TypeMismatch {
                    expected: TypeMeta::int32(),
                    actual: index.ty(),
                });
            };

            array.set(index, value)
        }

        _ => Err(RuntimeError::NotWritable {
            member: target.name().into(),
        }),
    }
}

fn eval_binary(node: &BinaryExpr, frame: &Arc<Frame>) -> RuntimeResult<Value> {
    if let Some(method) = node.method {
        let left = node.left.eval(frame)?;
        let right = node.right.eval(frame)?;

        return method.invoke(None, &[left, right]);
    }

    match node.operator {
        BinaryOperator::AndAlso => match node.left.eval(frame)?.is_truthy() {
            true => Ok(Value::Bool(node.right.eval(frame)?.is_truthy())),
            false => Ok(Value::Bool(false)),
        },

        BinaryOperator::OrElse => match node.left.eval(frame)?.is_truthy() {
            true => Ok(Value::Bool(true)),
            false => Ok(Value::Bool(node.right.eval(frame)?.is_truthy())),
        },

        BinaryOperator::Coalesce => {
            let left = node.left.eval(frame)?;

            if left.is_nil() {
                return node.right.eval(frame);
            }

            let Some(conversion) = &node.conversion else {
                return Ok(left);
            };

            match conversion.eval(frame)? {
                Value::Function(function) => function.call(&[left]),

                other => Err(RuntimeError::TypeMismatch {
                    expected: conversion.ty().unwrap_or(TypeMeta::object()),
                    actual: other.ty(),
                }),
            }
        }

        BinaryOperator::Assign => {
            let value = node.right.eval(frame)?;

            assign(&node.left, value.clone(), frame)?;

            Ok(value)
        }

        operator => {
            let left = node.left.eval(frame)?;
            let right = node.right.eval(frame)?;

            ops::binary_value(operator, &left, &right)
        }
    }
}

fn eval_unary(node: &UnaryExpr, frame: &Arc<Frame>) -> RuntimeResult<Value> {
    let operand = node.operand.eval(frame)?;

    if let Some(method) = node.method {
        return method.invoke(None, &[operand]);
    }

    match node.operator {
        UnaryOperator::Convert => operand.convert(node.ty),

        UnaryOperator::TypeAs => match !operand.is_nil() && node.ty.is_assignable_from(operand.ty()) {
            true => Ok(operand),
            false => Ok(Value::Nil),
        },

        UnaryOperator::Throw => Err(RuntimeError::Thrown { value: operand }),

        // A quoted lambda evaluates to the function itself.
        UnaryOperator::Quote => Ok(operand),

        operator => ops::unary_value(operator, &operand),
    }
}

fn eval_try(node: &TryExpr, frame: &Arc<Frame>) -> RuntimeResult<Value> {
    let outcome = match node.body.eval(frame) {
        Ok(value) => Ok(value),
        Err(error) => catch(node, error, frame),
    };

    if let Some(finally) = &node.finally {
        let _ = finally.eval(frame)?;
    }

    outcome
}

fn catch(node: &TryExpr, error: RuntimeError, frame: &Arc<Frame>) -> RuntimeResult<Value> {
    let catchable = !matches!(
        error,
        RuntimeError::StackOverflow { .. } | RuntimeError::Unreduced { .. }
    );

    if catchable {
        let exception_type = error.exception_type();

        for handler in &node.handlers {
            if !handler.test.is_assignable_from(exception_type) {
                continue;
            }

            let scope = frame.child();

            if let Some(variable) = &handler.variable {
                declare(&scope, variable, Some(error.to_exception()))?;
            }

            if let Some(filter) = &handler.filter {
                if !filter.eval(&scope)?.is_truthy() {
                    continue;
                }
            }

            trace!(
                target: INTERPRET_LOG,
                "Caught {error} by {} handler.",
                handler.test,
            );

            return handler.body.eval(&scope);
        }
    }

    if let Some(fault) = &node.fault {
        let _ = fault.eval(frame)?;
    }

    Err(error)
}

#[cfg(test)]
mod tests {
    use semver::Version;

    use crate::{
        interpret::{set_depth_limit, DEFAULT_DEPTH_LIMIT},
        runtime::{Domain, MethodDecl, RuntimeError, TypeMeta, Value},
        tree::{BinaryOperator, CatchBlock, Expr, SwitchCase, TypeBinaryOperator, UnaryOperator},
    };

    #[test]
    fn test_arithmetic_evaluation() {
        let sum = Expr::binary(
            BinaryOperator::Multiply,
            Expr::binary(BinaryOperator::Add, Expr::constant(2), Expr::constant(3)).unwrap(),
            Expr::constant(4),
        )
        .unwrap();

        assert_eq!(sum.evaluate().unwrap(), Value::I32(20));

        let division = Expr::binary(BinaryOperator::Divide, Expr::constant(1), Expr::constant(0)).unwrap();

        assert!(matches!(division.evaluate(), Err(RuntimeError::DivisionByZero)));

        let test = Expr::binary(BinaryOperator::LessThan, Expr::constant(1), Expr::constant(2)).unwrap();
        let condition = Expr::condition(test, Expr::constant("yes"), Expr::constant("no")).unwrap();

        assert_eq!(condition.evaluate().unwrap(), Value::from("yes"));
    }

    #[test]
    fn test_block_and_assignment() {
        let x = Expr::parameter("x", TypeMeta::int32());

        let block = Expr::block(
            vec![x.clone()],
            vec![
                Expr::assign(x.clone(), Expr::constant(5)).unwrap(),
                Expr::assign(
                    x.clone(),
                    Expr::binary(BinaryOperator::Add, x.clone(), Expr::constant(1)).unwrap(),
                )
                .unwrap(),
                x.clone(),
            ],
        )
        .unwrap();

        assert_eq!(block.evaluate().unwrap(), Value::I32(6));

        assert!(matches!(x.evaluate(), Err(RuntimeError::UnboundParameter { .. })));
    }

    #[test]
    fn test_closures_share_variables() {
        let counter = Expr::parameter("counter", TypeMeta::int32());

        let increment = Expr::lambda(
            Vec::new(),
            Expr::assign(
                counter.clone(),
                Expr::binary(BinaryOperator::Add, counter.clone(), Expr::constant(1)).unwrap(),
            )
            .unwrap(),
        )
        .unwrap();

        let function = Expr::parameter("increment", increment.ty().unwrap());

        let block = Expr::block(
            vec![counter.clone(), function.clone()],
            vec![
                Expr::assign(function.clone(), increment).unwrap(),
                Expr::invoke(function.clone(), Vec::new()).unwrap(),
                Expr::invoke(function.clone(), Vec::new()).unwrap(),
                counter.clone(),
            ],
        )
        .unwrap();

        assert_eq!(block.evaluate().unwrap(), Value::I32(2));

        let n = Expr::parameter("n", TypeMeta::int32());
        let square = Expr::lambda(
            vec![n.clone()],
            Expr::binary(BinaryOperator::Multiply, n.clone(), n).unwrap(),
        )
        .unwrap();

        let call = Expr::invoke(square, vec![Expr::constant(7)]).unwrap();

        assert_eq!(call.evaluate().unwrap(), Value::I32(49));
    }

    #[test]
    fn test_try_catch_finally() {
        let log = Expr::parameter("log", TypeMeta::string());
        let error = Expr::parameter("error", TypeMeta::object());

        let append = |text: &str| {
            Expr::assign(
                log.clone(),
                Expr::binary(BinaryOperator::Add, log.clone(), Expr::constant(text)).unwrap(),
            )
            .unwrap()
        };

        let protected = Expr::try_catch(
            Expr::block(
                Vec::new(),
                vec![
                    append("body;"),
                    Expr::throw(Expr::constant(42)).unwrap(),
                    Expr::constant(0),
                ],
            )
            .unwrap(),
            vec![CatchBlock {
                test: TypeMeta::object(),
                variable: Some(error.clone()),
                filter: None,
                body: Expr::convert(error.clone(), TypeMeta::int32()).unwrap(),
            }],
            Some(append("finally;")),
            None,
        )
        .unwrap();

        let block = Expr::block(
            vec![log.clone()],
            vec![
                Expr::assign(log.clone(), Expr::constant("")).unwrap(),
                protected,
                log.clone(),
            ],
        )
        .unwrap();

        assert_eq!(block.evaluate().unwrap(), Value::from("body;finally;"));

        let division = Expr::binary(BinaryOperator::Divide, Expr::constant(1), Expr::constant(0)).unwrap();

        let message = Expr::try_catch(
            Expr::block(Vec::new(), vec![division, Expr::constant("unreachable")]).unwrap(),
            vec![CatchBlock {
                test: TypeMeta::exception(),
                variable: None,
                filter: None,
                body: Expr::constant("caught"),
            }],
            None,
            None,
        )
        .unwrap();

        assert_eq!(message.evaluate().unwrap(), Value::from("caught"));

        let uncaught = Expr::try_catch(
            Expr::throw(Expr::constant(1)).unwrap(),
            vec![CatchBlock {
                test: TypeMeta::string(),
                variable: None,
                filter: None,
                body: Expr::default(TypeMeta::void()),
            }],
            None,
            None,
        )
        .unwrap();

        assert!(matches!(
            uncaught.evaluate(),
            Err(RuntimeError::Thrown { value: Value::I32(1) }),
        ));
    }

    #[test]
    fn test_unreduced_evaluation() {
        assert!(matches!(
            Expr::ident("x").evaluate(),
            Err(RuntimeError::Unreduced { kind: "Ident" }),
        ));
    }

    #[test]
    fn test_stack_overflow() {
        set_depth_limit(64);

        let mut nested = Expr::constant(0);

        for _ in 0..100 {
            nested = Expr::unary(UnaryOperator::Negate, nested).unwrap();
        }

        let result = nested.evaluate();

        set_depth_limit(DEFAULT_DEPTH_LIMIT);

        assert!(matches!(result, Err(RuntimeError::StackOverflow { limit: 64 })));

        assert_eq!(nested.evaluate().unwrap(), Value::I32(0));
    }

    #[test]
    fn test_members_and_arrays() {
        let assembly = Domain::get().define_assembly("interpret_tests", Version::new(1, 0, 0));

        let point = assembly.build_type("Point").build();
        let x = point.define_field("X", TypeMeta::int32(), false);

        let _ = point.define_method(MethodDecl::constructor(move |_| Ok(Value::new_object(point))));

        let constructor = point.constructors()[0];
        let new = Expr::new(constructor, Vec::new()).unwrap();

        let variable = Expr::parameter("p", point);
        let member = Expr::member(Some(variable.clone()), crate::runtime::MemberMeta::Field(x)).unwrap();

        let block = Expr::block(
            vec![variable.clone()],
            vec![
                Expr::assign(variable.clone(), new).unwrap(),
                Expr::assign(member.clone(), Expr::constant(3)).unwrap(),
                member,
            ],
        )
        .unwrap();

        assert_eq!(block.evaluate().unwrap(), Value::I32(3));

        let array = Expr::new_array_init(
            TypeMeta::int32(),
            vec![Expr::constant(1), Expr::constant(2), Expr::constant(3)],
        )
        .unwrap();

        let item = Expr::binary(BinaryOperator::ArrayIndex, array.clone(), Expr::constant(1)).unwrap();

        assert_eq!(item.evaluate().unwrap(), Value::I32(2));

        let length = Expr::unary(UnaryOperator::ArrayLength, array).unwrap();

        assert_eq!(length.evaluate().unwrap(), Value::I32(3));

        let grid = Expr::new_array_bounds(TypeMeta::int32(), vec![Expr::constant(2), Expr::constant(3)])
            .unwrap()
            .evaluate()
            .unwrap();

        assert_eq!(grid.ty(), TypeMeta::int32().array(2));
        assert_eq!(grid.to_string(), "[[0, 0, 0], [0, 0, 0]]");
    }

    #[test]
    fn test_type_tests_and_switch() {
        let value = Expr::typed_constant("text", TypeMeta::object()).unwrap();

        let is_string = Expr::type_binary(TypeBinaryOperator::TypeIs, value.clone(), TypeMeta::string()).unwrap();
        let is_int = Expr::type_binary(TypeBinaryOperator::TypeEqual, value, TypeMeta::int32()).unwrap();

        assert_eq!(is_string.evaluate().unwrap(), Value::Bool(true));
        assert_eq!(is_int.evaluate().unwrap(), Value::Bool(false));

        let switch = Expr::switch(
            Expr::constant(2),
            vec![
                SwitchCase {
                    tests: vec![Expr::constant(1)],
                    body: Expr::constant("one"),
                },
                SwitchCase {
                    tests: vec![Expr::constant(2), Expr::constant(3)],
                    body: Expr::constant("few"),
                },
            ],
            Some(Expr::constant("many")),
        )
        .unwrap();

        assert_eq!(switch.evaluate().unwrap(), Value::from("few"));
    }
}

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

use compact_str::CompactString;
use log::trace;

use crate::{
    interpret::ops::{binary_value, promote, unary_value},
    report::INTERPRET_LOG,
    runtime::{
        select_overload,
        ArgumentShape,
        MethodMeta,
        OverloadResolution,
        RuntimeError,
        RuntimeResult,
        TypeMeta,
        Value,
    },
    tree::DynamicOperation,
};

/// Performs a late-bound operation on the evaluated arguments.
///
/// Members and overloads are looked up by the runtime types of the values,
/// with the same scoring the reduction uses for the static types. A Type
/// value as the receiver refers to the static members of the type.
pub(super) fn late_bind(operation: &DynamicOperation, arguments: Vec<Value>) -> RuntimeResult<Value> {
    let mut arguments = arguments.into_iter();

    let receiver = arguments.next().unwrap_or_default();
    let rest = arguments.collect::<Vec<_>>();

    trace!(
        target: INTERPRET_LOG,
        "Late binding of {} on {} value.",
        operation.name(),
        receiver.ty(),
    );

    match operation {
        DynamicOperation::GetMember { name } => get_member(&receiver, name),

        DynamicOperation::SetMember { name } => {
            let value = rest.into_iter().next().unwrap_or_default();

            set_member(&receiver, name, value.clone())?;

            Ok(value)
        }

        DynamicOperation::GetIndex => {
            let index = index_of(rest.first())?;

            match &receiver {
                Value::Array(array) => array.get(index),

                Value::Str(string) => {
                    let character = usize::try_from(index)
                        .ok()
                        .and_then(|position| string.chars().nth(position));

                    match character {
                        Some(character) => Ok(Value::Char(character)),

                        None => Err(RuntimeError::OutOfBounds {
                            index,
                            length: string.chars().count(),
                        }),
                    }
                }

                Value::Nil => Err(RuntimeError::NullReference {
                    operation: "indexing",
                }),

                other => Err(RuntimeError::UndefinedOperator {
                    operator: operation.name(),
                    operand: other.ty(),
                }),
            }
        }

        DynamicOperation::SetIndex => {
            let index = index_of(rest.first())?;
            let value = rest.get(1).cloned().unwrap_or_default();

            match &receiver {
                Value::Array(array) => array.set(index, value.clone())?,

                Value::Nil => {
                    return Err(RuntimeError::NullReference {
                        operation: "item assignment",
                    })
                }

                other => {
                    return Err(RuntimeError::UndefinedOperator {
                        operator: operation.name(),
                        operand: other.ty(),
                    })
                }
            }

            Ok(value)
        }

        DynamicOperation::InvokeMember {
            name,
            type_arguments,
        } => invoke_member(&receiver, name, type_arguments, &rest),

        DynamicOperation::Invoke => match &receiver {
            Value::Function(function) => function.call(&rest),

            Value::Nil => Err(RuntimeError::NullReference {
                operation: "function invocation",
            }),

            other => Err(RuntimeError::UndefinedOperator {
                operator: operation.name(),
                operand: other.ty(),
            }),
        },

        DynamicOperation::Unary { operator } => unary_value(*operator, &receiver),

        DynamicOperation::Binary { operator } => {
            let right = rest.into_iter().next().unwrap_or_default();
            let (left, right) = promote(receiver, right);

            binary_value(*operator, &left, &right)
        }

        DynamicOperation::Convert { ty } => receiver.convert(*ty),

        DynamicOperation::CreateInstance => {
            let Some(ty) = receiver.as_type() else {
                return Err(RuntimeError::TypeMismatch {
                    expected: TypeMeta::ty(),
                    actual: receiver.ty(),
                });
            };

            let method = select(ty, &CompactString::new("new"), &ty.constructors(), &[], &rest)?;

            method.invoke(None, &rest)
        }
    }
}

fn get_member(receiver: &Value, name: &CompactString) -> RuntimeResult<Value> {
    match receiver {
        Value::Nil => Err(RuntimeError::NullReference {
            operation: "member access",
        }),

        Value::Type(ty) => {
            let ty = *ty;

            if let Some(field) = ty.field(name).filter(|field| field.is_static()) {
                return field.get(None);
            }

            if let Some(property) = ty.property(name).filter(|property| property.is_static()) {
                return property.get(None);
            }

            Err(RuntimeError::UnknownMember {
                receiver: ty,
                name: name.clone(),
            })
        }

        Value::Array(array) if name.as_str() == "Length" => {
            Value::I64(i64::try_from(array.len()).unwrap_or(i64::MAX)).convert(TypeMeta::int32())
        }

        _ => {
            let ty = receiver.ty();

            if let Some(field) = ty.field(name) {
                return match field.is_static() {
                    true => field.get(None),
                    false => field.get(Some(receiver)),
                };
            }

            if let Some(property) = ty.property(name) {
                return match property.is_static() {
                    true => property.get(None),
                    false => property.get(Some(receiver)),
                };
            }

            Err(RuntimeError::UnknownMember {
                receiver: ty,
                name: name.clone(),
            })
        }
    }
}

fn set_member(receiver: &Value, name: &CompactString, value: Value) -> RuntimeResult<()> {
    let (ty, object) = match receiver {
        Value::Nil => {
            return Err(RuntimeError::NullReference {
                operation: "member assignment",
            })
        }

        Value::Type(ty) => (*ty, None),

        _ => (receiver.ty(), Some(receiver)),
    };

    if let Some(field) = ty.field(name) {
        return match field.is_static() {
            true => field.set(None, value),
            false => field.set(object, value),
        };
    }

    if let Some(property) = ty.property(name) {
        return match property.is_static() {
            true => property.set(None, value),
            false => property.set(object, value),
        };
    }

    Err(RuntimeError::UnknownMember {
        receiver: ty,
        name: name.clone(),
    })
}

fn invoke_member(
    receiver: &Value,
    name: &CompactString,
    type_arguments: &[&'static TypeMeta],
    arguments: &[Value],
) -> RuntimeResult<Value> {
    match receiver {
        Value::Nil => Err(RuntimeError::NullReference {
            operation: "method call",
        }),

        Value::Type(ty) => {
            let ty = *ty;

            let candidates = ty
                .methods(name)
                .into_iter()
                .filter(|method| method.is_static())
                .collect::<Vec<_>>();

            let method = select(ty, name, &candidates, type_arguments, arguments)?;

            method.invoke(None, arguments)
        }

        _ => {
            let ty = receiver.ty();

            let candidates = ty
                .methods(name)
                .into_iter()
                .filter(|method| !method.is_static())
                .collect::<Vec<_>>();

            // A member holding a function value is invoked as a method.
            if candidates.is_empty() {
                if let Ok(Value::Function(function)) = get_member(receiver, name) {
                    return function.call(arguments);
                }
            }

            let method = select(ty, name, &candidates, type_arguments, arguments)?;

            method.invoke(Some(receiver), arguments)
        }
    }
}

fn select(
    receiver: &'static TypeMeta,
    name: &CompactString,
    candidates: &[&'static MethodMeta],
    type_arguments: &[&'static TypeMeta],
    arguments: &[Value],
) -> RuntimeResult<&'static MethodMeta> {
    let shapes = arguments
        .iter()
        .map(|argument| match argument.is_nil() {
            true => ArgumentShape::Nil,
            false => ArgumentShape::Typed(argument.ty()),
        })
        .collect::<Vec<_>>();

    match select_overload(candidates, &shapes, type_arguments, None) {
        OverloadResolution::Selected(method) => Ok(method),

        OverloadResolution::NotFound => Err(RuntimeError::UnknownMember {
            receiver,
            name: name.clone(),
        }),

        OverloadResolution::Ambiguous(candidates) => Err(RuntimeError::AmbiguousCall {
            receiver,
            name: name.clone(),
            candidates: candidates.len(),
        }),
    }
}

fn index_of(index: Option<&Value>) -> RuntimeResult<i64> {
    let index = index.cloned().unwrap_or_default();

    match index.as_i64() {
        Some(index) => Ok(index),

        None => Err(RuntimeError::TypeMismatch {
            expected: TypeMeta::int32(),
            actual: index.ty(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use semver::Version;

    use crate::{
        runtime::{Domain, MethodDecl, RuntimeError, TypeMeta, Value},
        tree::{BinaryOperator, DynamicOperation, Expr},
    };

    #[test]
    fn test_dynamic_binary_promotion() {
        let sum = Expr::dynamic(
            DynamicOperation::Binary {
                operator: BinaryOperator::Add,
            },
            vec![Expr::constant(1), Expr::constant(0.5)],
        )
        .unwrap();

        assert_eq!(sum.ty(), Some(TypeMeta::object()));
        assert_eq!(sum.evaluate().unwrap(), Value::F64(1.5));

        let mismatch = Expr::dynamic(
            DynamicOperation::Binary {
                operator: BinaryOperator::Subtract,
            },
            vec![Expr::constant("a"), Expr::constant(1)],
        )
        .unwrap();

        assert!(matches!(
            mismatch.evaluate(),
            Err(RuntimeError::UndefinedOperator { operator: "Subtract", .. }),
        ));
    }

    #[test]
    fn test_dynamic_members() {
        let assembly = Domain::get().define_assembly("dynamic_tests", Version::new(1, 0, 0));

        let account = assembly.build_type("Account").build();
        let _ = account.define_field("Balance", TypeMeta::int64(), false);

        let _ = account.define_method(MethodDecl::constructor(move |_| Ok(Value::new_object(account))));

        let _ = account.define_method(
            MethodDecl::instance("describe", |call| {
                let balance = call.receiver()?.as_object().and_then(|object| object.field("Balance"));

                Ok(Value::from(format!("balance {}", balance.unwrap_or_default())))
            })
            .returns(TypeMeta::string()),
        );

        let _ = account.define_method(
            MethodDecl::instance("deposit", |call| {
                let object = call.receiver()?.as_object().cloned();
                let amount = call.argument(0).as_i64().unwrap_or(0);

                if let Some(object) = object {
                    let balance = object.field("Balance").and_then(|value| value.as_i64()).unwrap_or(0);

                    object.set_field("Balance", Value::I64(balance + amount));
                }

                Ok(Value::Nil)
            })
            .parameter("amount", TypeMeta::int64()),
        );

        let instance = Expr::dynamic(
            DynamicOperation::CreateInstance,
            vec![Expr::constant(Value::Type(account))],
        )
        .unwrap()
        .evaluate()
        .unwrap();

        assert_eq!(instance.ty(), account);

        let receiver = Expr::typed_constant(instance.clone(), TypeMeta::object()).unwrap();

        let _ = Expr::dynamic(
            DynamicOperation::InvokeMember {
                name: "deposit".into(),
                type_arguments: Vec::new(),
            },
            vec![receiver.clone(), Expr::constant(Value::I64(10))],
        )
        .unwrap()
        .evaluate()
        .unwrap();

        let balance = Expr::dynamic(
            DynamicOperation::GetMember {
                name: "Balance".into(),
            },
            vec![receiver.clone()],
        )
        .unwrap();

        assert_eq!(balance.evaluate().unwrap(), Value::I64(10));

        let description = Expr::dynamic(
            DynamicOperation::InvokeMember {
                name: "describe".into(),
                type_arguments: Vec::new(),
            },
            vec![receiver.clone()],
        )
        .unwrap();

        assert_eq!(description.evaluate().unwrap(), Value::from("balance 10"));

        let unknown = Expr::dynamic(
            DynamicOperation::GetMember {
                name: "Owner".into(),
            },
            vec![receiver],
        )
        .unwrap();

        assert!(matches!(unknown.evaluate(), Err(RuntimeError::UnknownMember { .. })));
    }

    #[test]
    fn test_dynamic_indexing() {
        let array = Expr::new_array_init(TypeMeta::int32(), vec![Expr::constant(4), Expr::constant(5)]).unwrap();

        let item = Expr::dynamic(DynamicOperation::GetIndex, vec![array.clone(), Expr::constant(1)]).unwrap();

        assert_eq!(item.evaluate().unwrap(), Value::I32(5));

        let out = Expr::dynamic(DynamicOperation::GetIndex, vec![array, Expr::constant(2)]).unwrap();

        assert!(matches!(
            out.evaluate(),
            Err(RuntimeError::OutOfBounds { index: 2, length: 2 }),
        ));

        let character = Expr::dynamic(
            DynamicOperation::GetIndex,
            vec![Expr::constant("abc"), Expr::constant(2)],
        )
        .unwrap();

        assert_eq!(character.evaluate().unwrap(), Value::Char('c'));
    }
}

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

use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::tree::{DynamicOperation, Expr, ExprKind, NewArrayKind};

/// Renders the expression as a parenthesized structural text:
/// `(Add (Constant Int32 1) (Parameter x Int32))`.
///
/// The text is intended for diagnostics and tests. It is not parsed back.
impl Display for Expr {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        formatter.write_fmt(format_args!("({}", self.name()))?;

        match self.kind() {
            ExprKind::Constant(node) => {
                formatter.write_fmt(format_args!(" {} {}", node.ty, node.value))?;
            }

            ExprKind::Parameter(node) => {
                formatter.write_fmt(format_args!(" {} {}", node.name, node.ty))?;
            }

            ExprKind::Lambda(node) => {
                formatter.write_fmt(format_args!(" {}", node.ty))?;
                write_group(formatter, &node.parameters)?;
                write_child(formatter, &node.body)?;
            }

            ExprKind::Block(node) => {
                write_group(formatter, &node.variables)?;
                write_children(formatter, &node.expressions)?;
            }

            ExprKind::Call(node) => {
                formatter.write_fmt(format_args!(" [{}]", node.method.signature()))?;

                if let Some(object) = &node.object {
                    write_child(formatter, object)?;
                }

                write_children(formatter, &node.arguments)?;
            }

            ExprKind::New(node) => {
                formatter.write_fmt(format_args!(
                    " {} [{}]",
                    node.constructor.declaring(),
                    node.constructor.signature(),
                ))?;
                write_children(formatter, &node.arguments)?;
            }

            ExprKind::NewArray(node) => {
                formatter.write_fmt(format_args!(" {}", node.element))?;

                match &node.kind {
                    NewArrayKind::Init(items) => write_children(formatter, items)?,
                    NewArrayKind::Bounds(lengths) => write_children(formatter, lengths)?,
                }
            }

            ExprKind::Member(node) => {
                formatter.write_fmt(format_args!(
                    " {}.{}",
                    node.member.declaring(),
                    node.member.name(),
                ))?;

                if let Some(object) = &node.object {
                    write_child(formatter, object)?;
                }
            }

            ExprKind::MemberInit(node) => {
                write_child(formatter, &node.new)?;

                for binding in &node.bindings {
                    formatter.write_fmt(format_args!(" ({} {})", binding.member.name(), binding.value))?;
                }
            }

            ExprKind::Binary(node) => {
                if let Some(method) = node.method {
                    formatter.write_fmt(format_args!(" [{}]", method.signature()))?;
                }

                write_child(formatter, &node.left)?;
                write_child(formatter, &node.right)?;

                if let Some(conversion) = &node.conversion {
                    write_child(formatter, conversion)?;
                }
            }

            ExprKind::Unary(node) => {
                if node.operator.has_explicit_type() {
                    formatter.write_fmt(format_args!(" {}", node.ty))?;
                }

                if let Some(method) = node.method {
                    formatter.write_fmt(format_args!(" [{}]", method.signature()))?;
                }

                write_child(formatter, &node.operand)?;
            }

            ExprKind::Conditional(node) => {
                write_child(formatter, &node.test)?;
                write_child(formatter, &node.if_true)?;
                write_child(formatter, &node.if_false)?;
            }

            ExprKind::Invoke(node) => {
                write_child(formatter, &node.function)?;
                write_children(formatter, &node.arguments)?;
            }

            ExprKind::TypeBinary(node) => {
                formatter.write_fmt(format_args!(" {}", node.target))?;
                write_child(formatter, &node.operand)?;
            }

            ExprKind::Default(node) => {
                formatter.write_fmt(format_args!(" {}", node.ty))?;
            }

            ExprKind::Switch(node) => {
                write_child(formatter, &node.value)?;

                for case in &node.cases {
                    formatter.write_str(" (Case")?;
                    write_group(formatter, &case.tests)?;
                    write_child(formatter, &case.body)?;
                    formatter.write_str(")")?;
                }

                if let Some(default) = &node.default {
                    formatter.write_fmt(format_args!(" (Default {default})"))?;
                }
            }

            ExprKind::Try(node) => {
                write_child(formatter, &node.body)?;

                for handler in &node.handlers {
                    formatter.write_fmt(format_args!(" (Catch {}", handler.test))?;

                    if let Some(variable) = &handler.variable {
                        write_child(formatter, variable)?;
                    }

                    if let Some(filter) = &handler.filter {
                        formatter.write_fmt(format_args!(" (Filter {filter})"))?;
                    }

                    write_child(formatter, &handler.body)?;
                    formatter.write_str(")")?;
                }

                if let Some(finally) = &node.finally {
                    formatter.write_fmt(format_args!(" (Finally {finally})"))?;
                }

                if let Some(fault) = &node.fault {
                    formatter.write_fmt(format_args!(" (Fault {fault})"))?;
                }
            }

            ExprKind::RuntimeVariables(node) => write_children(formatter, &node.variables)?,

            ExprKind::DebugInfo(node) => {
                formatter.write_fmt(format_args!(
                    " {:?} {}:{}-{}:{}",
                    node.document.as_str(),
                    node.start_line,
                    node.start_column,
                    node.end_line,
                    node.end_column,
                ))?;
            }

            ExprKind::Dynamic(node) => {
                formatter.write_fmt(format_args!(" {}", node.operation.name()))?;

                match &node.operation {
                    DynamicOperation::GetMember { name } | DynamicOperation::SetMember { name } => {
                        formatter.write_fmt(format_args!(" {name}"))?;
                    }

                    DynamicOperation::InvokeMember {
                        name,
                        type_arguments,
                    } => {
                        formatter.write_fmt(format_args!(" {name}"))?;

                        for argument in type_arguments {
                            formatter.write_fmt(format_args!(" {argument}"))?;
                        }
                    }

                    DynamicOperation::Unary { operator } => {
                        formatter.write_fmt(format_args!(" {}", operator.name()))?;
                    }

                    DynamicOperation::Binary { operator } => {
                        formatter.write_fmt(format_args!(" {}", operator.name()))?;
                    }

                    DynamicOperation::Convert { ty } => {
                        formatter.write_fmt(format_args!(" {ty}"))?;
                    }

                    _ => (),
                }

                write_children(formatter, &node.arguments)?;
            }

            ExprKind::Ident(node) => formatter.write_fmt(format_args!(" {}", node.name))?,

            ExprKind::Dispatch(node) => {
                formatter.write_fmt(format_args!(" {} {}", node.kind, node.name))?;

                for argument in &node.type_arguments {
                    formatter.write_fmt(format_args!(" {argument}"))?;
                }

                match &node.receiver {
                    Some(receiver) => write_child(formatter, receiver)?,
                    None => formatter.write_str(" _")?,
                }

                write_children(formatter, &node.arguments)?;
            }

            ExprKind::Macro(node) => {
                write_group(formatter, &node.parameters)?;
                write_child(formatter, &node.body)?;
            }

            ExprKind::AmbiguousLambda(node) => {
                if let Some(ret) = node.ret {
                    formatter.write_fmt(format_args!(" {ret}"))?;
                }

                write_group(formatter, &node.parameters)?;
                write_child(formatter, &node.body)?;
            }

            ExprKind::AmbiguousParameter(node) => {
                formatter.write_fmt(format_args!(" {}", node.name))?;

                if let Some(ty) = node.ty {
                    formatter.write_fmt(format_args!(" {ty}"))?;
                }
            }

            ExprKind::Vector(node) | ExprKind::List(node) => {
                write_children(formatter, &node.elements)?;
            }

            ExprKind::TypeCandidate(node) => formatter.write_fmt(format_args!(" {}", node.target))?,

            ExprKind::Module(node) => formatter.write_fmt(format_args!(" {}", node.table.len()))?,

            ExprKind::Extension(node) => formatter.write_fmt(format_args!(" {}", node.0.name()))?,
        }

        formatter.write_str(")")
    }
}

#[inline(always)]
fn write_child(formatter: &mut Formatter<'_>, child: &Expr) -> FmtResult {
    formatter.write_fmt(format_args!(" {child}"))
}

fn write_children(formatter: &mut Formatter<'_>, children: &[Expr]) -> FmtResult {
    for child in children {
        write_child(formatter, child)?;
    }

    Ok(())
}

fn write_group(formatter: &mut Formatter<'_>, children: &[Expr]) -> FmtResult {
    formatter.write_str(" (")?;

    for (index, child) in children.iter().enumerate() {
        if index > 0 {
            formatter.write_str(" ")?;
        }

        formatter.write_fmt(format_args!("{child}"))?;
    }

    formatter.write_str(")")
}

#[cfg(test)]
mod tests {
    use crate::{
        runtime::TypeMeta,
        tree::{BinaryOperator, Expr},
    };

    #[test]
    fn test_structural_text() {
        let x = Expr::parameter("x", TypeMeta::int32());
        let sum = Expr::binary(BinaryOperator::Add, x.clone(), Expr::constant(1)).unwrap();

        assert_eq!(
            sum.to_string(),
            "(Add (Parameter x Int32) (Constant Int32 1))",
        );

        let lambda = Expr::lambda(vec![x], sum).unwrap();

        assert_eq!(
            lambda.to_string(),
            "(Lambda Fn`2[Int32,Int32] ((Parameter x Int32)) \
            (Add (Parameter x Int32) (Constant Int32 1)))",
        );

        assert_eq!(
            Expr::list(vec![Expr::ident("f"), Expr::constant(true)]).to_string(),
            "(List (Ident f) (Constant Boolean true))",
        );
    }
}

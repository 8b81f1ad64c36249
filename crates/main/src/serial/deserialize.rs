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

use compact_str::{format_compact, CompactString};
use log::{debug, trace};
use semver::{Comparator, Op, Version};

use crate::{
    report::SERIAL_LOG,
    runtime::{AssemblyMeta, Domain, MemberMeta, MethodMeta, TypeMeta, Value},
    serial::{
        node::{ConstantRecord, ConstantValue, Node, OperationRecord, ParameterRecord},
        signature::{MethodSignature, TypeName, TypeSuffix},
        Document,
        MemberRef,
        MethodRef,
        SerialError,
        SerialResult,
    },
    tree::{
        executable,
        BinaryOperator,
        CatchBlock,
        DynamicOperation,
        Expr,
        MemberBinding,
        SwitchCase,
        TypeBinaryOperator,
        UnaryOperator,
    },
};

/// The options of the document deserialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeserializeConfig {
    /// If true, a method reference that matches several overloads with the
    /// same signature text resolves to the first declared overload.
    /// Otherwise the deserialization fails with the AmbiguousMatch error.
    ///
    /// The default value is false.
    pub lenient_overloads: bool,
}

impl Default for DeserializeConfig {
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}

impl DeserializeConfig {
    #[inline(always)]
    pub const fn new() -> Self {
        Self {
            lenient_overloads: false,
        }
    }
}

/// The arena of a deserialization session.
///
/// The context resolves the entries of the document tables to the host
/// entities lazily, and caches the resolved entries. All nodes that refer
/// to the same parameter entry share one parameter instance.
pub struct DeserializeContext<'a> {
    document: &'a Document,
    config: DeserializeConfig,
    assemblies: Vec<Option<&'static AssemblyMeta>>,
    types: Vec<Option<&'static TypeMeta>>,
    members: Vec<Option<MemberMeta>>,
    constants: Vec<Option<Expr>>,
    parameters: Vec<Option<Expr>>,
}

impl<'a> DeserializeContext<'a> {
    pub fn new(document: &'a Document, config: DeserializeConfig) -> Self {
        Self {
            document,
            config,
            assemblies: vec![None; document.assemblies.len()],
            types: vec![None; document.types.len()],
            members: vec![None; document.members.len()],
            constants: vec![None; document.constants.len()],
            parameters: vec![None; document.parameters.len()],
        }
    }

    /// Deserializes the root node of the document.
    #[inline(always)]
    pub fn root(&mut self) -> SerialResult<Expr> {
        let document = self.document;

        self.node(&document.root)
    }

    /// Rebuilds an expression tree from a serialized node.
    ///
    /// The omitted type fields are re-inferred by the expression builders,
    /// which also validate the rebuilt nodes.
    pub fn node(&mut self, node: &Node) -> SerialResult<Expr> {
        Ok(match node {
            Node::Constant { constant } => self.constant(*constant)?,

            Node::Parameter { parameter } | Node::AmbiguousParameter { parameter } => {
                self.parameter(*parameter)?
            }

            Node::Lambda {
                parameters,
                body,
                ret,
            } => {
                let parameters = self.parameters(parameters)?;
                let body = self.node(body)?;

                match ret {
                    Some(ret) => Expr::lambda_returning(parameters, body, self.ty(*ret)?)?,
                    None => Expr::lambda(parameters, body)?,
                }
            }

            Node::Block {
                variables,
                expressions,
            } => Expr::block(self.parameters(variables)?, self.nodes(expressions)?)?,

            Node::Call {
                object,
                method,
                arguments,
                extension,
            } => {
                let object = self.optional(object.as_deref())?;
                let method = self.method(*method)?;
                let arguments = self.nodes(arguments)?;

                match extension {
                    true => Expr::extension_call(method, arguments)?,
                    false => Expr::call(object, method, arguments)?,
                }
            }

            Node::New {
                constructor,
                arguments,
                members,
            } => {
                let constructor = self.method(*constructor)?;
                let arguments = self.nodes(arguments)?;

                let members = members
                    .iter()
                    .map(|member| self.member(*member))
                    .collect::<SerialResult<_>>()?;

                Expr::new_with_members(constructor, arguments, members)?
            }

            Node::NewArrayInit { element, items } => {
                Expr::new_array_init(self.ty(*element)?, self.nodes(items)?)?
            }

            Node::NewArrayBounds { element, lengths } => {
                Expr::new_array_bounds(self.ty(*element)?, self.nodes(lengths)?)?
            }

            Node::MemberAccess { object, member } => {
                let object = self.optional(object.as_deref())?;

                Expr::member(object, self.member(*member)?)?
            }

            Node::MemberInit { new, bindings } => {
                let new = self.node(new)?;

                let bindings = bindings
                    .iter()
                    .map(|binding| {
                        Ok(MemberBinding {
                            member: self.member(binding.member)?,
                            value: self.node(&binding.value)?,
                        })
                    })
                    .collect::<SerialResult<_>>()?;

                Expr::member_init(new, bindings)?
            }

            Node::Binary {
                operator,
                left,
                right,
                method,
                conversion,
            } => {
                let Some(operator) = BinaryOperator::from_name(operator) else {
                    return Err(unknown_operator(operator));
                };

                let left = self.node(left)?;
                let right = self.node(right)?;

                match (method, conversion) {
                    (Some(method), _) => {
                        Expr::binary_with_method(operator, left, right, self.method(*method)?)?
                    }

                    (None, Some(conversion)) => {
                        Expr::coalesce_with_conversion(left, right, self.node(conversion)?)?
                    }

                    (None, None) => Expr::binary(operator, left, right)?,
                }
            }

            Node::Unary {
                operator,
                operand,
                method,
                ty,
            } => {
                let Some(operator) = UnaryOperator::from_name(operator) else {
                    return Err(unknown_operator(operator));
                };

                let operand = self.node(operand)?;

                match (method, ty) {
                    (Some(method), _) => {
                        Expr::unary_with_method(operator, operand, self.method(*method)?)?
                    }

                    (None, Some(ty)) => Expr::unary_typed(operator, operand, self.ty(*ty)?)?,
                    (None, None) => Expr::unary(operator, operand)?,
                }
            }

            Node::Conditional {
                test,
                if_true,
                if_false,
                ty,
            } => {
                let test = self.node(test)?;
                let if_true = self.node(if_true)?;
                let if_false = self.node(if_false)?;

                let ty = match ty {
                    Some(ty) => self.ty(*ty)?,
                    None => executable(&if_true, "true branch")?,
                };

                Expr::condition_typed(test, if_true, if_false, ty)?
            }

            Node::Invoke {
                function,
                arguments,
            } => Expr::invoke(self.node(function)?, self.nodes(arguments)?)?,

            Node::TypeBinary {
                operator,
                operand,
                target,
            } => {
                let Some(operator) = TypeBinaryOperator::from_name(operator) else {
                    return Err(unknown_operator(operator));
                };

                Expr::type_binary(operator, self.node(operand)?, self.ty(*target)?)?
            }

            Node::Default { ty } => Expr::default(self.ty(*ty)?),

            Node::Switch {
                value,
                cases,
                default,
            } => {
                let value = self.node(value)?;

                let cases = cases
                    .iter()
                    .map(|case| {
                        Ok(SwitchCase {
                            tests: self.nodes(&case.tests)?,
                            body: self.node(&case.body)?,
                        })
                    })
                    .collect::<SerialResult<_>>()?;

                let default = self.optional(default.as_deref())?;

                Expr::switch(value, cases, default)?
            }

            Node::Try {
                body,
                handlers,
                finally,
                fault,
            } => {
                let body = self.node(body)?;

                let handlers = handlers
                    .iter()
                    .map(|handler| {
                        Ok(CatchBlock {
                            test: self.ty(handler.test)?,
                            variable: match handler.variable {
                                Some(variable) => Some(self.parameter(variable)?),
                                None => None,
                            },
                            filter: self.optional(handler.filter.as_ref())?,
                            body: self.node(&handler.body)?,
                        })
                    })
                    .collect::<SerialResult<_>>()?;

                let finally = self.optional(finally.as_deref())?;
                let fault = self.optional(fault.as_deref())?;

                Expr::try_catch(body, handlers, finally, fault)?
            }

            Node::RuntimeVariables { variables } => {
                Expr::runtime_variables(self.parameters(variables)?)?
            }

            Node::DebugInfo {
                document,
                start_line,
                start_column,
                end_line,
                end_column,
            } => Expr::debug_info(
                document.clone(),
                (*start_line, *start_column),
                (*end_line, *end_column),
            )?,

            Node::Dynamic {
                operation,
                arguments,
            } => {
                let operation = self.operation(operation)?;

                Expr::dynamic(operation, self.nodes(arguments)?)?
            }

            Node::Ident { name } => Expr::ident(name.clone()),

            Node::Dispatch {
                kind,
                receiver,
                name,
                type_arguments,
                arguments,
            } => {
                let receiver = self.optional(receiver.as_deref())?;
                let type_arguments = self.types(type_arguments)?;
                let arguments = self.nodes(arguments)?;

                Expr::dispatch(*kind, receiver, name.clone(), type_arguments, arguments)
            }

            Node::Macro { parameters, body } => {
                Expr::macro_expr(self.parameters(parameters)?, self.node(body)?)?
            }

            Node::AmbiguousLambda {
                parameters,
                body,
                ret,
            } => {
                let parameters = self.parameters(parameters)?;
                let body = self.node(body)?;

                let ret = match ret {
                    Some(ret) => Some(self.ty(*ret)?),
                    None => None,
                };

                Expr::ambiguous_lambda(parameters, body, ret)?
            }

            Node::Vector { elements } => Expr::vector(self.nodes(elements)?),

            Node::List { elements } => Expr::list(self.nodes(elements)?),

            Node::TypeCandidate { target } => Expr::type_candidate(self.ty(*target)?),
        })
    }

    /// Resolves an entry of the type table.
    pub fn ty(&mut self, index: usize) -> SerialResult<&'static TypeMeta> {
        if let Some(Some(ty)) = self.types.get(index) {
            return Ok(*ty);
        }

        let document = self.document;

        let Some(record) = document.types.get(index) else {
            return Err(SerialError::InvalidReference {
                table: "type",
                index,
            });
        };

        let assembly = self.assembly(record.assembly)?;
        let name = TypeName::parse(&record.name)?;

        let ty = resolve_type(assembly, &name)?;

        trace!(target: SERIAL_LOG, "Type #{index} resolved to '{ty}'.");

        self.types[index] = Some(ty);

        Ok(ty)
    }

    /// Resolves an entry of the member table.
    pub fn member(&mut self, index: usize) -> SerialResult<MemberMeta> {
        if let Some(Some(member)) = self.members.get(index) {
            return Ok(*member);
        }

        let document = self.document;

        let Some(record) = document.members.get(index) else {
            return Err(SerialError::InvalidReference {
                table: "member",
                index,
            });
        };

        let member = match record {
            MemberRef::Field { declaring, name } => {
                let declaring = self.ty(*declaring)?;

                match declaring.field(name) {
                    Some(field) => MemberMeta::Field(field),
                    None => return Err(missing_member(declaring, name, "field not found")),
                }
            }

            MemberRef::Property { declaring, name } => {
                let declaring = self.ty(*declaring)?;

                match declaring.property(name) {
                    Some(property) => MemberMeta::Property(property),
                    None => return Err(missing_member(declaring, name, "property not found")),
                }
            }

            MemberRef::Method(method) => MemberMeta::Method(self.method_ref(method)?),
        };

        self.members[index] = Some(member);

        Ok(member)
    }

    fn method(&mut self, index: usize) -> SerialResult<&'static MethodMeta> {
        match self.member(index)? {
            MemberMeta::Method(method) => Ok(method),

            member => Err(SerialError::MemberResolution {
                subject: CompactString::new(member.name()),
                reason: "expected a method",
            }),
        }
    }

    // Picks the overload whose re-rendered signature matches the stored
    // signature, and instantiates it with the stored type arguments.
    fn method_ref(&mut self, record: &MethodRef) -> SerialResult<&'static MethodMeta> {
        let declaring = self.ty(record.declaring)?;
        let expected = MethodSignature::parse(&record.signature)?;

        let mut matches = Vec::new();

        for candidate in declaring.declared_methods() {
            if candidate.name() != record.name {
                continue;
            }

            if MethodSignature::parse(&candidate.signature())? == expected {
                matches.push(candidate);
            }
        }

        let method = match matches.as_slice() {
            [] => {
                return Err(missing_member(
                    declaring,
                    &record.signature,
                    "no method matches the signature",
                ))
            }

            [method] => *method,

            [method, ..] if self.config.lenient_overloads => {
                debug!(
                    target: SERIAL_LOG,
                    "Signature '{}' matches {} overloads of '{declaring}'. The first one is chosen.",
                    record.signature,
                    matches.len(),
                );

                *method
            }

            _ => {
                return Err(SerialError::AmbiguousMatch {
                    subject: format_compact!("{declaring}::{}", record.signature),
                    candidates: matches.len(),
                })
            }
        };

        if record.type_arguments.is_empty() {
            return Ok(method);
        }

        let type_arguments = self.types(&record.type_arguments)?;

        match method.make_generic(&type_arguments) {
            Some(method) => Ok(method),

            None => Err(missing_member(
                declaring,
                &record.signature,
                "type arguments do not match the generic method",
            )),
        }
    }

    fn assembly(&mut self, index: usize) -> SerialResult<&'static AssemblyMeta> {
        if let Some(Some(assembly)) = self.assemblies.get(index) {
            return Ok(*assembly);
        }

        let document = self.document;

        let Some(record) = document.assemblies.get(index) else {
            return Err(SerialError::InvalidReference {
                table: "assembly",
                index,
            });
        };

        let assembly = load_assembly(&record.name)?;

        if !is_compatible(&record.version, assembly.version()) {
            return Err(SerialError::AssemblyVersion {
                name: record.name.clone(),
                expected: record.version.clone(),
                found: assembly.version().clone(),
            });
        }

        self.assemblies[index] = Some(assembly);

        Ok(assembly)
    }

    fn constant(&mut self, index: usize) -> SerialResult<Expr> {
        if let Some(Some(constant)) = self.constants.get(index) {
            return Ok(constant.clone());
        }

        let document = self.document;

        let Some(ConstantRecord { ty, value }) = document.constants.get(index) else {
            return Err(SerialError::InvalidReference {
                table: "constant",
                index,
            });
        };

        let value = self.value(value)?;

        let constant = match ty {
            Some(ty) => Expr::typed_constant(value, self.ty(*ty)?)?,
            None => Expr::constant(value),
        };

        self.constants[index] = Some(constant.clone());

        Ok(constant)
    }

    fn value(&mut self, value: &ConstantValue) -> SerialResult<Value> {
        Ok(match value {
            ConstantValue::Nil => Value::Nil,
            ConstantValue::Bool(value) => Value::Bool(*value),
            ConstantValue::Char(value) => Value::Char(*value),
            ConstantValue::I32(value) => Value::I32(*value),
            ConstantValue::I64(value) => Value::I64(*value),
            ConstantValue::F64(value) => Value::F64(*value),
            ConstantValue::Str(value) => Value::Str(value.clone()),
            ConstantValue::Type(ty) => Value::Type(self.ty(*ty)?),

            ConstantValue::Array { ty, items } => {
                let ty = self.ty(*ty)?;

                if ty.element().is_none() {
                    return Err(SerialError::MemberResolution {
                        subject: CompactString::new(ty.full_name()),
                        reason: "not an array type",
                    });
                }

                let items = items
                    .iter()
                    .map(|item| self.value(item))
                    .collect::<SerialResult<_>>()?;

                Value::new_array_of(ty, items)
            }
        })
    }

    fn parameter(&mut self, index: usize) -> SerialResult<Expr> {
        if let Some(Some(parameter)) = self.parameters.get(index) {
            return Ok(parameter.clone());
        }

        let document = self.document;

        let Some(record) = document.parameters.get(index) else {
            return Err(SerialError::InvalidReference {
                table: "parameter",
                index,
            });
        };

        let parameter = match record {
            ParameterRecord::Variable { name, ty } => Expr::parameter(name.clone(), self.ty(*ty)?),

            ParameterRecord::Ambiguous { name, ty } => {
                let ty = match ty {
                    Some(ty) => Some(self.ty(*ty)?),
                    None => None,
                };

                Expr::ambiguous_parameter(name.clone(), ty)
            }
        };

        self.parameters[index] = Some(parameter.clone());

        Ok(parameter)
    }

    fn operation(&mut self, operation: &OperationRecord) -> SerialResult<DynamicOperation> {
        Ok(match operation {
            OperationRecord::GetMember { name } => DynamicOperation::GetMember { name: name.clone() },
            OperationRecord::SetMember { name } => DynamicOperation::SetMember { name: name.clone() },
            OperationRecord::GetIndex => DynamicOperation::GetIndex,
            OperationRecord::SetIndex => DynamicOperation::SetIndex,

            OperationRecord::InvokeMember {
                name,
                type_arguments,
            } => DynamicOperation::InvokeMember {
                name: name.clone(),
                type_arguments: self.types(type_arguments)?,
            },

            OperationRecord::Invoke => DynamicOperation::Invoke,

            OperationRecord::Unary { operator } => match UnaryOperator::from_name(operator) {
                Some(operator) => DynamicOperation::Unary { operator },
                None => return Err(unknown_operator(operator)),
            },

            OperationRecord::Binary { operator } => match BinaryOperator::from_name(operator) {
                Some(operator) => DynamicOperation::Binary { operator },
                None => return Err(unknown_operator(operator)),
            },

            OperationRecord::Convert { ty } => DynamicOperation::Convert { ty: self.ty(*ty)? },
            OperationRecord::CreateInstance => DynamicOperation::CreateInstance,
        })
    }

    #[inline(always)]
    fn optional(&mut self, node: Option<&Node>) -> SerialResult<Option<Expr>> {
        match node {
            Some(node) => Ok(Some(self.node(node)?)),
            None => Ok(None),
        }
    }

    #[inline(always)]
    fn nodes(&mut self, nodes: &[Node]) -> SerialResult<Vec<Expr>> {
        nodes.iter().map(|node| self.node(node)).collect()
    }

    #[inline(always)]
    fn parameters(&mut self, indices: &[usize]) -> SerialResult<Vec<Expr>> {
        indices.iter().map(|index| self.parameter(*index)).collect()
    }

    #[inline(always)]
    fn types(&mut self, indices: &[usize]) -> SerialResult<Vec<&'static TypeMeta>> {
        indices.iter().map(|index| self.ty(*index)).collect()
    }
}

// Resolves a parsed type name. The type definition belongs to the
// `assembly`. Type arguments without an assembly qualifier belong to the
// core assembly.
fn resolve_type(assembly: &'static AssemblyMeta, name: &TypeName) -> SerialResult<&'static TypeMeta> {
    let Some(mut ty) = assembly.type_by_name(&name.definition) else {
        return Err(SerialError::MemberResolution {
            subject: format_compact!("{name}, {}", assembly.name()),
            reason: "type not found in the assembly",
        });
    };

    if !name.arguments.is_empty() {
        let mut arguments = Vec::with_capacity(name.arguments.len());

        for argument in &name.arguments {
            let assembly = match &argument.assembly {
                Some(assembly) => load_assembly(assembly)?,
                None => Domain::get().core_assembly(),
            };

            arguments.push(resolve_type(assembly, &argument.ty)?);
        }

        ty = match ty.make_generic(&arguments) {
            Some(ty) => ty,

            None => {
                return Err(SerialError::MemberResolution {
                    subject: format_compact!("{name}"),
                    reason: "type arguments do not match the generic definition",
                })
            }
        };
    }

    for suffix in &name.suffixes {
        ty = match suffix {
            TypeSuffix::Pointer => ty.pointer(),
            TypeSuffix::ByRef => ty.by_ref(),
            TypeSuffix::Array(rank) => ty.array(*rank),
        };
    }

    Ok(ty)
}

#[inline(always)]
fn load_assembly(name: &str) -> SerialResult<&'static AssemblyMeta> {
    match Domain::get().assembly(name) {
        Some(assembly) => Ok(assembly),

        None => Err(SerialError::AssemblyLoad {
            name: CompactString::new(name),
        }),
    }
}

// The caret compatibility: same major version (same minor for `0.x`), and
// not older than the expected version.
fn is_compatible(expected: &Version, found: &Version) -> bool {
    let requirement = Comparator {
        op: Op::Caret,
        major: expected.major,
        minor: Some(expected.minor),
        patch: Some(expected.patch),
        pre: expected.pre.clone(),
    };

    requirement.matches(found)
}

#[inline(always)]
fn missing_member(declaring: &'static TypeMeta, name: &str, reason: &'static str) -> SerialError {
    SerialError::MemberResolution {
        subject: format_compact!("{declaring}::{name}"),
        reason,
    }
}

#[inline(always)]
fn unknown_operator(operator: &str) -> SerialError {
    SerialError::MemberResolution {
        subject: CompactString::new(operator),
        reason: "unknown operator",
    }
}

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

use ahash::AHashMap;
use compact_str::CompactString;
use log::trace;

use crate::{
    report::SERIAL_LOG,
    runtime::{AssemblyMeta, MemberMeta, MethodMeta, TypeMeta, Value},
    serial::{
        node::{
            BindingRecord,
            CaseRecord,
            CatchRecord,
            ConstantRecord,
            ConstantValue,
            Node,
            OperationRecord,
            ParameterRecord,
        },
        AssemblyRef,
        Document,
        MemberRef,
        MethodRef,
        SerialError,
        SerialResult,
        TypeRef,
        FORMAT_VERSION,
    },
    tree::{DynamicOperation, Expr, ExprKind, NewArrayKind},
};

/// The arena of a serialization session.
///
/// The context maps the host entities to the indices of the document
/// tables. Serializing the same type, member, parameter or structurally
/// equal constant twice within one context yields the same index, so the
/// serialized nodes refer to a single table entry.
///
/// ```ignore
/// let mut context = SerializeContext::new();
///
/// let root = context.node(&expr)?;
///
/// let document = context.finish(root);
/// ```
#[derive(Default)]
pub struct SerializeContext {
    assemblies: Vec<AssemblyRef>,
    assembly_index: AHashMap<CompactString, usize>,
    types: Vec<TypeRef>,
    type_index: AHashMap<usize, usize>,
    members: Vec<MemberRef>,
    member_index: AHashMap<MemberMeta, usize>,
    constants: Vec<ConstantRecord>,
    parameters: Vec<ParameterRecord>,
    parameter_index: AHashMap<usize, usize>,
}

impl SerializeContext {
    #[inline(always)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes the context and creates a document with the `root` node.
    pub fn finish(self, root: Node) -> Document {
        trace!(
            target: SERIAL_LOG,
            "Document serialized: {} assemblies, {} types, {} members, {} constants, {} parameters.",
            self.assemblies.len(),
            self.types.len(),
            self.members.len(),
            self.constants.len(),
            self.parameters.len(),
        );

        Document {
            version: FORMAT_VERSION,
            assemblies: self.assemblies,
            types: self.types,
            members: self.members,
            constants: self.constants,
            parameters: self.parameters,
            root,
        }
    }

    /// Serializes an expression tree.
    ///
    /// Fails with UnsupportedNodeKind if the tree contains a Module or an
    /// Extension node.
    pub fn node(&mut self, expr: &Expr) -> SerialResult<Node> {
        Ok(match expr.kind() {
            ExprKind::Constant(node) => Node::Constant {
                constant: self.constant(&node.value, node.ty)?,
            },

            ExprKind::Parameter(..) => Node::Parameter {
                parameter: self.parameter(expr)?,
            },

            ExprKind::Lambda(node) => {
                let ret = node.ret();

                Node::Lambda {
                    parameters: self.parameters(&node.parameters)?,
                    body: self.boxed(&node.body)?,
                    ret: match node.body.ty() == Some(ret) {
                        true => None,
                        false => Some(self.ty(ret)?),
                    },
                }
            }

            ExprKind::Block(node) => Node::Block {
                variables: self.parameters(&node.variables)?,
                expressions: self.nodes(&node.expressions)?,
            },

            ExprKind::Call(node) => Node::Call {
                object: self.optional(node.object.as_ref())?,
                method: self.method(node.method)?,
                arguments: self.nodes(&node.arguments)?,
                extension: node.extension,
            },

            ExprKind::New(node) => Node::New {
                constructor: self.method(node.constructor)?,
                arguments: self.nodes(&node.arguments)?,
                members: node
                    .members
                    .iter()
                    .map(|member| self.member(*member))
                    .collect::<SerialResult<_>>()?,
            },

            ExprKind::NewArray(node) => match &node.kind {
                NewArrayKind::Init(items) => Node::NewArrayInit {
                    element: self.ty(node.element)?,
                    items: self.nodes(items)?,
                },

                NewArrayKind::Bounds(lengths) => Node::NewArrayBounds {
                    element: self.ty(node.element)?,
                    lengths: self.nodes(lengths)?,
                },
            },

            ExprKind::Member(node) => Node::MemberAccess {
                object: self.optional(node.object.as_ref())?,
                member: self.member(node.member)?,
            },

            ExprKind::MemberInit(node) => Node::MemberInit {
                new: self.boxed(&node.new)?,
                bindings: node
                    .bindings
                    .iter()
                    .map(|binding| {
                        Ok(BindingRecord {
                            member: self.member(binding.member)?,
                            value: self.node(&binding.value)?,
                        })
                    })
                    .collect::<SerialResult<_>>()?,
            },

            ExprKind::Binary(node) => Node::Binary {
                operator: CompactString::new(node.operator.name()),
                left: self.boxed(&node.left)?,
                right: self.boxed(&node.right)?,
                method: match node.method {
                    Some(method) => Some(self.method(method)?),
                    None => None,
                },
                conversion: self.optional(node.conversion.as_ref())?,
            },

            ExprKind::Unary(node) => Node::Unary {
                operator: CompactString::new(node.operator.name()),
                operand: self.boxed(&node.operand)?,
                method: match node.method {
                    Some(method) => Some(self.method(method)?),
                    None => None,
                },
                ty: match node.operator.has_explicit_type() && node.method.is_none() {
                    true => Some(self.ty(node.ty)?),
                    false => None,
                },
            },

            ExprKind::Conditional(node) => Node::Conditional {
                test: self.boxed(&node.test)?,
                if_true: self.boxed(&node.if_true)?,
                if_false: self.boxed(&node.if_false)?,
                ty: match node.if_true.ty() == Some(node.ty) {
                    true => None,
                    false => Some(self.ty(node.ty)?),
                },
            },

            ExprKind::Invoke(node) => Node::Invoke {
                function: self.boxed(&node.function)?,
                arguments: self.nodes(&node.arguments)?,
            },

            ExprKind::TypeBinary(node) => Node::TypeBinary {
                operator: CompactString::new(node.operator.name()),
                operand: self.boxed(&node.operand)?,
                target: self.ty(node.target)?,
            },

            ExprKind::Default(node) => Node::Default {
                ty: self.ty(node.ty)?,
            },

            ExprKind::Switch(node) => Node::Switch {
                value: self.boxed(&node.value)?,
                cases: node
                    .cases
                    .iter()
                    .map(|case| {
                        Ok(CaseRecord {
                            tests: self.nodes(&case.tests)?,
                            body: self.node(&case.body)?,
                        })
                    })
                    .collect::<SerialResult<_>>()?,
                default: self.optional(node.default.as_ref())?,
            },

            ExprKind::Try(node) => Node::Try {
                body: self.boxed(&node.body)?,
                handlers: node
                    .handlers
                    .iter()
                    .map(|handler| {
                        Ok(CatchRecord {
                            test: self.ty(handler.test)?,
                            variable: match &handler.variable {
                                Some(variable) => Some(self.parameter(variable)?),
                                None => None,
                            },
                            filter: match &handler.filter {
                                Some(filter) => Some(self.node(filter)?),
                                None => None,
                            },
                            body: self.node(&handler.body)?,
                        })
                    })
                    .collect::<SerialResult<_>>()?,
                finally: self.optional(node.finally.as_ref())?,
                fault: self.optional(node.fault.as_ref())?,
            },

            ExprKind::RuntimeVariables(node) => Node::RuntimeVariables {
                variables: self.parameters(&node.variables)?,
            },

            ExprKind::DebugInfo(node) => Node::DebugInfo {
                document: node.document.clone(),
                start_line: node.start_line,
                start_column: node.start_column,
                end_line: node.end_line,
                end_column: node.end_column,
            },

            ExprKind::Dynamic(node) => Node::Dynamic {
                operation: self.operation(&node.operation)?,
                arguments: self.nodes(&node.arguments)?,
            },

            ExprKind::Ident(node) => Node::Ident {
                name: node.name.clone(),
            },

            ExprKind::Dispatch(node) => Node::Dispatch {
                kind: node.kind,
                receiver: self.optional(node.receiver.as_ref())?,
                name: node.name.clone(),
                type_arguments: self.types(&node.type_arguments)?,
                arguments: self.nodes(&node.arguments)?,
            },

            ExprKind::Macro(node) => Node::Macro {
                parameters: self.parameters(&node.parameters)?,
                body: self.boxed(&node.body)?,
            },

            ExprKind::AmbiguousLambda(node) => Node::AmbiguousLambda {
                parameters: self.parameters(&node.parameters)?,
                body: self.boxed(&node.body)?,
                ret: match node.ret {
                    Some(ret) => Some(self.ty(ret)?),
                    None => None,
                },
            },

            ExprKind::AmbiguousParameter(..) => Node::AmbiguousParameter {
                parameter: self.parameter(expr)?,
            },

            ExprKind::Vector(node) => Node::Vector {
                elements: self.nodes(&node.elements)?,
            },

            ExprKind::List(node) => Node::List {
                elements: self.nodes(&node.elements)?,
            },

            ExprKind::TypeCandidate(node) => Node::TypeCandidate {
                target: self.ty(node.target)?,
            },

            ExprKind::Module(..) | ExprKind::Extension(..) => {
                return Err(SerialError::UnsupportedNodeKind { kind: expr.name() })
            }
        })
    }

    /// Returns the type table index of the type.
    ///
    /// Fails with UnsupportedType if the type contains unbound generic
    /// parameters.
    pub fn ty(&mut self, ty: &'static TypeMeta) -> SerialResult<usize> {
        if let Some(index) = self.type_index.get(&ty.index()) {
            return Ok(*index);
        }

        if ty.contains_generic_parameters() {
            return Err(SerialError::UnsupportedType {
                ty: CompactString::new(ty.full_name()),
            });
        }

        let assembly = self.assembly(ty.assembly());

        let index = self.types.len();

        self.types.push(TypeRef {
            assembly,
            name: CompactString::new(ty.full_name()),
        });

        let _ = self.type_index.insert(ty.index(), index);

        Ok(index)
    }

    /// Returns the member table index of the field, property or method.
    pub fn member(&mut self, member: MemberMeta) -> SerialResult<usize> {
        if let Some(index) = self.member_index.get(&member) {
            return Ok(*index);
        }

        let record = match member {
            MemberMeta::Field(field) => MemberRef::Field {
                declaring: self.ty(field.declaring())?,
                name: CompactString::new(field.name()),
            },

            MemberMeta::Property(property) => MemberRef::Property {
                declaring: self.ty(property.declaring())?,
                name: CompactString::new(property.name()),
            },

            MemberMeta::Method(method) => MemberRef::Method(self.method_ref(method)?),
        };

        let index = self.members.len();

        self.members.push(record);

        let _ = self.member_index.insert(member, index);

        Ok(index)
    }

    #[inline(always)]
    pub fn method(&mut self, method: &'static MethodMeta) -> SerialResult<usize> {
        self.member(MemberMeta::Method(method))
    }

    /// Returns the constant table index of the value of the declared type.
    ///
    /// Structurally equal values of the same declared type share one entry.
    /// Fails with UnsupportedConstant for object and function values.
    pub fn constant(&mut self, value: &Value, ty: &'static TypeMeta) -> SerialResult<usize> {
        let record = ConstantRecord {
            ty: match value.ty() == ty {
                true => None,
                false => Some(self.ty(ty)?),
            },
            value: self.value(value)?,
        };

        if let Some(index) = self
            .constants
            .iter()
            .position(|known| known.ty == record.ty && known.value.same(&record.value))
        {
            return Ok(index);
        }

        let index = self.constants.len();

        self.constants.push(record);

        Ok(index)
    }

    /// Returns the parameter table index of a Parameter or an
    /// AmbiguousParameter expression.
    pub fn parameter(&mut self, expr: &Expr) -> SerialResult<usize> {
        let (id, record) = match expr.kind() {
            ExprKind::Parameter(node) => (
                node.id,
                ParameterRecord::Variable {
                    name: node.name.clone(),
                    ty: self.ty(node.ty)?,
                },
            ),

            ExprKind::AmbiguousParameter(node) => (
                node.id,
                ParameterRecord::Ambiguous {
                    name: node.name.clone(),
                    ty: match node.ty {
                        Some(ty) => Some(self.ty(ty)?),
                        None => None,
                    },
                },
            ),

            _ => return Err(SerialError::UnsupportedNodeKind { kind: expr.name() }),
        };

        if let Some(index) = self.parameter_index.get(&id) {
            return Ok(*index);
        }

        let index = self.parameters.len();

        self.parameters.push(record);

        let _ = self.parameter_index.insert(id, index);

        Ok(index)
    }

    fn assembly(&mut self, assembly: &'static AssemblyMeta) -> usize {
        if let Some(index) = self.assembly_index.get(assembly.name()) {
            return *index;
        }

        let index = self.assemblies.len();

        self.assemblies.push(AssemblyRef {
            name: CompactString::new(assembly.name()),
            version: assembly.version().clone(),
        });

        let _ = self
            .assembly_index
            .insert(CompactString::new(assembly.name()), index);

        index
    }

    fn method_ref(&mut self, method: &'static MethodMeta) -> SerialResult<MethodRef> {
        if method.is_generic_definition() {
            return Err(SerialError::UnsupportedType {
                ty: CompactString::new(method.signature()),
            });
        }

        let (definition, type_arguments) = match method.definition() {
            Some(definition) => (definition, self.types(method.type_arguments())?),
            None => (method, Vec::new()),
        };

        Ok(MethodRef {
            declaring: self.ty(method.declaring())?,
            name: CompactString::new(method.name()),
            signature: CompactString::new(definition.signature()),
            type_arguments,
        })
    }

    fn value(&mut self, value: &Value) -> SerialResult<ConstantValue> {
        Ok(match value {
            Value::Nil => ConstantValue::Nil,
            Value::Bool(value) => ConstantValue::Bool(*value),
            Value::Char(value) => ConstantValue::Char(*value),
            Value::I32(value) => ConstantValue::I32(*value),
            Value::I64(value) => ConstantValue::I64(*value),
            Value::F64(value) => ConstantValue::F64(*value),
            Value::Str(value) => ConstantValue::Str(value.clone()),
            Value::Type(ty) => ConstantValue::Type(self.ty(*ty)?),

            Value::Array(array) => ConstantValue::Array {
                ty: self.ty(array.ty())?,
                items: array
                    .items()
                    .iter()
                    .map(|item| self.value(item))
                    .collect::<SerialResult<_>>()?,
            },

            Value::Object(..) | Value::Function(..) => {
                return Err(SerialError::UnsupportedConstant {
                    ty: CompactString::new(value.ty().full_name()),
                })
            }
        })
    }

    fn operation(&mut self, operation: &DynamicOperation) -> SerialResult<OperationRecord> {
        Ok(match operation {
            DynamicOperation::GetMember { name } => OperationRecord::GetMember { name: name.clone() },
            DynamicOperation::SetMember { name } => OperationRecord::SetMember { name: name.clone() },
            DynamicOperation::GetIndex => OperationRecord::GetIndex,
            DynamicOperation::SetIndex => OperationRecord::SetIndex,

            DynamicOperation::InvokeMember {
                name,
                type_arguments,
            } => OperationRecord::InvokeMember {
                name: name.clone(),
                type_arguments: self.types(type_arguments)?,
            },

            DynamicOperation::Invoke => OperationRecord::Invoke,

            DynamicOperation::Unary { operator } => OperationRecord::Unary {
                operator: CompactString::new(operator.name()),
            },

            DynamicOperation::Binary { operator } => OperationRecord::Binary {
                operator: CompactString::new(operator.name()),
            },

            DynamicOperation::Convert { ty } => OperationRecord::Convert { ty: self.ty(*ty)? },
            DynamicOperation::CreateInstance => OperationRecord::CreateInstance,
        })
    }

    #[inline(always)]
    fn boxed(&mut self, expr: &Expr) -> SerialResult<Box<Node>> {
        Ok(Box::new(self.node(expr)?))
    }

    #[inline(always)]
    fn optional(&mut self, expr: Option<&Expr>) -> SerialResult<Option<Box<Node>>> {
        match expr {
            Some(expr) => Ok(Some(self.boxed(expr)?)),
            None => Ok(None),
        }
    }

    #[inline(always)]
    fn nodes(&mut self, exprs: &[Expr]) -> SerialResult<Vec<Node>> {
        exprs.iter().map(|expr| self.node(expr)).collect()
    }

    #[inline(always)]
    fn parameters(&mut self, exprs: &[Expr]) -> SerialResult<Vec<usize>> {
        exprs.iter().map(|expr| self.parameter(expr)).collect()
    }

    #[inline(always)]
    fn types(&mut self, types: &[&'static TypeMeta]) -> SerialResult<Vec<usize>> {
        types.iter().map(|ty| self.ty(*ty)).collect()
    }
}

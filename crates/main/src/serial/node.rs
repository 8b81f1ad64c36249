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
use serde::{Deserialize, Serialize};

use crate::symbols::DispatchKind;

/// A serialized expression node.
///
/// The set of node kinds is closed: every [ExprKind](crate::tree::ExprKind)
/// variant except the Module and the Extension nodes has exactly one
/// serialized form. Nodes refer to the types, members, constants and
/// parameters by indices in the tables of the enclosing
/// [Document](crate::serial::Document).
///
/// Type fields that can be inferred from the children are omitted, and are
/// re-inferred when the node is deserialized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node")]
pub enum Node {
    Constant {
        constant: usize,
    },

    Parameter {
        parameter: usize,
    },

    Lambda {
        parameters: Vec<usize>,
        body: Box<Node>,

        /// The declared return type if it differs from the body type.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ret: Option<usize>,
    },

    Block {
        variables: Vec<usize>,
        expressions: Vec<Node>,
    },

    Call {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        object: Option<Box<Node>>,
        method: usize,
        arguments: Vec<Node>,
        #[serde(default, skip_serializing_if = "is_false")]
        extension: bool,
    },

    New {
        constructor: usize,
        arguments: Vec<Node>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        members: Vec<usize>,
    },

    NewArrayInit {
        element: usize,
        items: Vec<Node>,
    },

    NewArrayBounds {
        element: usize,
        lengths: Vec<Node>,
    },

    MemberAccess {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        object: Option<Box<Node>>,
        member: usize,
    },

    MemberInit {
        new: Box<Node>,
        bindings: Vec<BindingRecord>,
    },

    Binary {
        operator: CompactString,
        left: Box<Node>,
        right: Box<Node>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        method: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conversion: Option<Box<Node>>,
    },

    Unary {
        operator: CompactString,
        operand: Box<Node>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        method: Option<usize>,

        /// The result type of the Convert, TypeAs and Throw operators.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ty: Option<usize>,
    },

    Conditional {
        test: Box<Node>,
        if_true: Box<Node>,
        if_false: Box<Node>,

        /// The result type if it differs from the type of the true branch.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ty: Option<usize>,
    },

    Invoke {
        function: Box<Node>,
        arguments: Vec<Node>,
    },

    TypeBinary {
        operator: CompactString,
        operand: Box<Node>,
        target: usize,
    },

    Default {
        ty: usize,
    },

    Switch {
        value: Box<Node>,
        cases: Vec<CaseRecord>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<Box<Node>>,
    },

    Try {
        body: Box<Node>,
        handlers: Vec<CatchRecord>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        finally: Option<Box<Node>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fault: Option<Box<Node>>,
    },

    RuntimeVariables {
        variables: Vec<usize>,
    },

    DebugInfo {
        document: CompactString,
        start_line: u32,
        start_column: u32,
        end_line: u32,
        end_column: u32,
    },

    Dynamic {
        operation: OperationRecord,
        arguments: Vec<Node>,
    },

    Ident {
        name: CompactString,
    },

    Dispatch {
        kind: DispatchKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        receiver: Option<Box<Node>>,
        name: CompactString,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        type_arguments: Vec<usize>,
        arguments: Vec<Node>,
    },

    Macro {
        parameters: Vec<usize>,
        body: Box<Node>,
    },

    AmbiguousLambda {
        parameters: Vec<usize>,
        body: Box<Node>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ret: Option<usize>,
    },

    AmbiguousParameter {
        parameter: usize,
    },

    Vector {
        elements: Vec<Node>,
    },

    List {
        elements: Vec<Node>,
    },

    TypeCandidate {
        target: usize,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BindingRecord {
    pub member: usize,
    pub value: Node,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub tests: Vec<Node>,
    pub body: Node,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatchRecord {
    pub test: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Node>,
    pub body: Node,
}

/// A serialized late-bound operation of the Dynamic node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation")]
pub enum OperationRecord {
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
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        type_arguments: Vec<usize>,
    },
    Invoke,
    Unary {
        operator: CompactString,
    },
    Binary {
        operator: CompactString,
    },
    Convert {
        ty: usize,
    },
    CreateInstance,
}

/// An entry of the constant table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConstantRecord {
    /// The declared type of the constant if it differs from the runtime
    /// type of the value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<usize>,
    pub value: ConstantValue,
}

/// A serialized constant value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum ConstantValue {
    Nil,
    Bool(bool),
    Char(char),
    I32(i32),
    I64(i64),
    /// Non-finite values are stored as the `NaN`, `Infinity` and
    /// `-Infinity` strings.
    F64(#[serde(with = "double")] f64),
    Str(CompactString),

    /// An index in the type table of the document.
    Type(usize),

    Array {
        /// The array type index.
        ty: usize,
        items: Vec<ConstantValue>,
    },
}

impl ConstantValue {
    // Structural identity. Unlike the PartialEq implementation, floats are
    // compared by their bit patterns, so `0.0` and `-0.0` stay distinct
    // while `NaN` matches itself.
    pub(super) fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::F64(this), Self::F64(other)) => this.to_bits() == other.to_bits(),

            (
                Self::Array {
                    ty: this_ty,
                    items: this_items,
                },
                Self::Array {
                    ty: other_ty,
                    items: other_items,
                },
            ) => {
                this_ty == other_ty
                    && this_items.len() == other_items.len()
                    && this_items
                        .iter()
                        .zip(other_items)
                        .all(|(this, other)| this.same(other))
            }

            _ => self == other,
        }
    }
}

/// An entry of the parameter table.
///
/// Every occurrence of a parameter in the tree refers to the same entry,
/// so the deserialized tree shares one parameter instance between the
/// declaration and the uses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "parameter")]
pub enum ParameterRecord {
    Variable {
        name: CompactString,
        ty: usize,
    },

    Ambiguous {
        name: CompactString,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ty: Option<usize>,
    },
}

mod double {
    use compact_str::CompactString;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum DoubleRecord {
        Number(f64),
        Text(CompactString),
    }

    pub(super) fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            return serializer.serialize_f64(*value);
        }

        serializer.serialize_str(match value.is_nan() {
            true => "NaN",
            false if value.is_sign_positive() => "Infinity",
            false => "-Infinity",
        })
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match DoubleRecord::deserialize(deserializer)? {
            DoubleRecord::Number(value) => Ok(value),

            DoubleRecord::Text(text) => match text.as_str() {
                "NaN" => Ok(f64::NAN),
                "Infinity" => Ok(f64::INFINITY),
                "-Infinity" => Ok(f64::NEG_INFINITY),
                _ => Err(Error::custom(format_args!("invalid double value '{text}'"))),
            },
        }
    }
}

#[inline(always)]
fn is_false(value: &bool) -> bool {
    !*value
}

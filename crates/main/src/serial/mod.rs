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

//! Serialization of the expression trees into portable documents.
//!
//! A [Document] describes an expression tree without referring to the
//! in-process metadata objects. Types are stored by their canonical full
//! names (see [TypeName]) together with the name and the version of the
//! defining assembly. Fields and properties are stored by name, and methods
//! by their textual [signatures](MethodSignature), so a document produced in
//! one process can be loaded in another one that defines compatible
//! assemblies.
//!
//! Both executable and reducible trees are supported, except the Module and
//! the Extension nodes that refer to the process-local state.
//!
//! The document is a serde data structure. [Document::to_json] and
//! [Document::from_json] provide the JSON text form.

mod deserialize;
mod document;
mod error;
mod node;
mod refs;
mod serialize;
mod signature;

pub use crate::serial::{
    deserialize::{DeserializeConfig, DeserializeContext},
    document::{Document, FORMAT_VERSION},
    error::{SerialError, SerialResult},
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
    refs::{AssemblyRef, MemberRef, MethodRef, TypeRef},
    serialize::SerializeContext,
    signature::{MethodSignature, SignatureToken, TypeArgument, TypeName, TypeSuffix},
};

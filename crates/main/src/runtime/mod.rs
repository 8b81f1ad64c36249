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

//! The host world that reduced expression trees are executed against.
//!
//! Assemblies, types, fields, properties and methods registered here play
//! the role of a native reflection layer: the reduction engine resolves
//! symbols to these entities, the serializer describes them by name, and the
//! interpreter invokes their native bodies.
//!
//! Metadata objects are registered once and live for the rest of the
//! process, so the API hands out `&'static` references and compares them by
//! identity.

mod domain;
mod error;
mod member;
mod overload;
mod ty;
mod value;

pub use crate::runtime::{
    domain::{AssemblyMeta, Domain, CORE_ASSEMBLY},
    error::{NumberCastCause, RuntimeError, RuntimeResult},
    member::{
        FieldMeta,
        Getter,
        MemberKind,
        MemberMeta,
        MethodDecl,
        MethodGenerics,
        MethodKind,
        MethodMeta,
        NativeCall,
        NativeFn,
        ParamMeta,
        PropertyMeta,
        Setter,
        CONSTRUCTOR_NAME,
    },
    overload::{select_overload, ArgumentShape, OverloadResolution},
    ty::{GenericOwner, TypeBuilder, TypeCategory, TypeMeta, TypeShape, MAX_FUNCTION_ARITY},
    value::{ArrayRef, FunctionRef, ObjectRef, ScriptCallable, Value},
};

pub(crate) use crate::runtime::ty::write_escaped;

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

use std::fmt::{Display, Formatter};

use compact_str::CompactString;
use semver::Version;
use serde::{Deserialize, Serialize};

/// A reference to an [assembly](crate::runtime::AssemblyMeta) by name.
///
/// The version records the assembly version the document was serialized
/// against. A document loads into a caret-compatible assembly: the same
/// major version (the same minor version for `0.x` assemblies) that is not
/// older than the recorded one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyRef {
    pub name: CompactString,
    pub version: Version,
}

/// A reference to a closed type by description.
///
/// Constructed generic types, arrays, pointers and references are described
/// by their canonical full names, such as ``Box`1[[Geometry.Point, geometry]][]``.
/// The type definition named by the outermost name segment belongs to the
/// referred assembly. The assemblies of the type arguments are named inside
/// the full name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRef {
    /// An index in the assembly table of the document.
    pub assembly: usize,

    /// The canonical full name of the type.
    pub name: CompactString,
}

/// A reference to a field, a property or a method.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "member")]
pub enum MemberRef {
    Field {
        /// An index in the type table of the document.
        declaring: usize,
        name: CompactString,
    },

    Property {
        declaring: usize,
        name: CompactString,
    },

    Method(MethodRef),
}

impl MemberRef {
    #[inline(always)]
    pub fn declaring(&self) -> usize {
        match self {
            Self::Field { declaring, .. } => *declaring,
            Self::Property { declaring, .. } => *declaring,
            Self::Method(method) => method.declaring,
        }
    }
}

/// A reference to a method or a constructor by its signature.
///
/// For an instantiated generic method, the signature is the signature of
/// the generic method definition, and the type arguments refer to the
/// instantiation arguments.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodRef {
    /// An index in the type table of the document.
    pub declaring: usize,

    /// The method name, or `.ctor` for constructors.
    pub name: CompactString,

    /// The canonical signature text as rendered by
    /// [MethodMeta::signature](crate::runtime::MethodMeta::signature).
    pub signature: CompactString,

    /// Indices in the type table of the document.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_arguments: Vec<usize>,
}

impl Display for MethodRef {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(&self.signature)
    }
}

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

use std::{
    fmt::{Debug, Display, Formatter},
    hash::{Hash, Hasher},
    ops::Deref,
    sync::RwLock,
};

use ahash::AHashMap;
use compact_str::CompactString;
use lady_deirdre::sync::Lazy;
use semver::Version;

use crate::{
    runtime::{
        member::{MethodDecl, MethodMeta},
        ty::{TypeBuilder, TypeCategory, TypeMeta},
        Value,
    },
    sync::{read, write},
};

/// The name of the assembly that hosts the built-in types.
pub const CORE_ASSEMBLY: &str = "core";

/// A named and versioned unit of host types.
///
/// Assemblies are created through [Domain::define_assembly] and live for the
/// rest of the process. Two assemblies are equal only if they are the same
/// registered instance.
pub struct AssemblyMeta {
    name: CompactString,
    version: Version,
    types: RwLock<AHashMap<String, &'static TypeMeta>>,
}

impl PartialEq for AssemblyMeta {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for AssemblyMeta {}

impl Hash for AssemblyMeta {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self as *const Self).hash(state)
    }
}

impl Debug for AssemblyMeta {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, formatter)
    }
}

impl Display for AssemblyMeta {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_fmt(format_args!("{} {}", self.name, self.version))
    }
}

impl AssemblyMeta {
    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline(always)]
    pub fn version(&self) -> &Version {
        &self.version
    }

    #[inline(always)]
    pub fn is_core(&self) -> bool {
        self.name == CORE_ASSEMBLY
    }

    /// Looks up a type definition by its canonical full name
    /// (e.g. ``Geometry.Shape`1`` or `Geometry.Outer+Inner`).
    ///
    /// Constructed generic types, pointers, references and arrays are not
    /// registered in the assembly. They are derived from the definitions
    /// through [TypeMeta::make_generic] and the related functions.
    #[inline(always)]
    pub fn type_by_name(&self, full_name: &str) -> Option<&'static TypeMeta> {
        read(&self.types).get(full_name).copied()
    }

    /// Returns all type definitions of this assembly in registration order.
    pub fn types(&self) -> Vec<&'static TypeMeta> {
        let mut types = read(&self.types).values().copied().collect::<Vec<_>>();

        types.sort_by_key(|ty| ty.index());

        types
    }

    /// Opens a builder of a new type definition inside this assembly.
    #[inline(always)]
    pub fn build_type(&'static self, name: impl Into<CompactString>) -> TypeBuilder {
        TypeBuilder::new(self, name.into())
    }

    // Registers a new type definition, or returns the previously registered
    // definition with the same full name.
    pub(super) fn register(&self, candidate: TypeMeta) -> &'static TypeMeta {
        let key = candidate.full_name();

        let mut types = write(&self.types);

        if let Some(ty) = types.get(&key).copied() {
            return ty;
        }

        let ty: &'static TypeMeta = Box::leak(Box::new(candidate));

        let _ = types.insert(key, ty);

        ty
    }

    fn leak(name: CompactString, version: Version) -> &'static Self {
        Box::leak(Box::new(Self {
            name,
            version,
            types: RwLock::new(AHashMap::new()),
        }))
    }
}

#[derive(PartialEq, Eq, Hash)]
pub(super) enum DerivedKey {
    Constructed(usize, Vec<usize>),
    Pointer(usize),
    ByRef(usize),
    Array(usize, usize),
}

#[derive(PartialEq, Eq, Hash)]
pub(super) enum MethodKey {
    Constructed(usize, Vec<usize>),
    Hosted(usize, usize),
}

pub(super) struct CoreTypes {
    pub(super) object: &'static TypeMeta,
    pub(super) void: &'static TypeMeta,
    pub(super) boolean: &'static TypeMeta,
    pub(super) char: &'static TypeMeta,
    pub(super) int32: &'static TypeMeta,
    pub(super) int64: &'static TypeMeta,
    pub(super) double: &'static TypeMeta,
    pub(super) string: &'static TypeMeta,
    pub(super) ty: &'static TypeMeta,
    pub(super) exception: &'static TypeMeta,
    pub(super) static_wrapper: &'static TypeMeta,
    pub(super) functions: Vec<&'static TypeMeta>,
}

/// The registry of all assemblies known to the process.
///
/// The domain is a lazily initialized singleton. Its first access
/// bootstraps the core assembly with the built-in types. Derived types
/// (constructed generics, pointers, references and arrays) and instantiated
/// generic methods are cached here, so deriving the same entity twice yields
/// the same `&'static` instance.
pub struct Domain {
    core: &'static AssemblyMeta,
    assemblies: RwLock<AHashMap<CompactString, &'static AssemblyMeta>>,
    derived_types: RwLock<AHashMap<DerivedKey, &'static TypeMeta>>,
    derived_methods: RwLock<AHashMap<MethodKey, &'static MethodMeta>>,
    types: CoreTypes,
}

impl Domain {
    /// Returns the process-wide domain.
    #[inline(always)]
    pub fn get() -> &'static Self {
        static DOMAIN: Lazy<Domain> = Lazy::new(Domain::bootstrap);

        DOMAIN.deref()
    }

    #[inline(always)]
    pub fn core_assembly(&self) -> &'static AssemblyMeta {
        self.core
    }

    /// Looks up a previously defined assembly by name.
    #[inline(always)]
    pub fn assembly(&self, name: &str) -> Option<&'static AssemblyMeta> {
        read(&self.assemblies).get(name).copied()
    }

    /// Defines a new assembly.
    ///
    /// If an assembly with the same name already exists, the existing one
    /// is returned regardless of the requested version.
    pub fn define_assembly(
        &self,
        name: impl Into<CompactString>,
        version: Version,
    ) -> &'static AssemblyMeta {
        let name = name.into();

        let mut assemblies = write(&self.assemblies);

        if let Some(assembly) = assemblies.get(&name).copied() {
            return assembly;
        }

        let assembly = AssemblyMeta::leak(name.clone(), version);

        let _ = assemblies.insert(name, assembly);

        assembly
    }

    /// Returns all known assemblies ordered by name.
    pub fn assemblies(&self) -> Vec<&'static AssemblyMeta> {
        let mut assemblies = read(&self.assemblies).values().copied().collect::<Vec<_>>();

        assemblies.sort_by(|a, b| a.name().cmp(b.name()));

        assemblies
    }

    #[inline(always)]
    pub(super) fn core_types(&self) -> &CoreTypes {
        &self.types
    }

    pub(super) fn derive_type(
        &self,
        key: DerivedKey,
        make: impl FnOnce() -> TypeMeta,
    ) -> &'static TypeMeta {
        if let Some(ty) = read(&self.derived_types).get(&key).copied() {
            return ty;
        }

        // Making a derived type may derive other types, so the lock must not
        // be held while the constructor runs.
        let candidate = make();

        let mut derived = write(&self.derived_types);

        if let Some(ty) = derived.get(&key).copied() {
            return ty;
        }

        let ty: &'static TypeMeta = Box::leak(Box::new(candidate));

        let _ = derived.insert(key, ty);

        ty
    }

    pub(super) fn derive_method(
        &self,
        key: MethodKey,
        make: impl FnOnce() -> MethodMeta,
    ) -> &'static MethodMeta {
        if let Some(method) = read(&self.derived_methods).get(&key).copied() {
            return method;
        }

        let candidate = make();

        let mut derived = write(&self.derived_methods);

        if let Some(method) = derived.get(&key).copied() {
            return method;
        }

        let method: &'static MethodMeta = Box::leak(Box::new(candidate));

        let _ = derived.insert(key, method);

        method
    }

    // Must not access `Domain::get()` directly or indirectly.
    fn bootstrap() -> Self {
        let core = AssemblyMeta::leak(
            CompactString::new(CORE_ASSEMBLY),
            Version::new(1, 0, 0),
        );

        let object = TypeBuilder::bootstrap(core, "Object", None, TypeCategory::Class, &[]);

        let primitive = |name: &str| {
            TypeBuilder::bootstrap(core, name, Some(object), TypeCategory::Primitive, &[])
        };

        let void = primitive("Void");
        let boolean = primitive("Boolean");
        let char = primitive("Char");
        let int32 = primitive("Int32");
        let int64 = primitive("Int64");
        let double = primitive("Double");

        let string = TypeBuilder::bootstrap(core, "String", Some(object), TypeCategory::Class, &[]);
        let ty = TypeBuilder::bootstrap(core, "Type", Some(object), TypeCategory::Class, &[]);

        let exception =
            TypeBuilder::bootstrap(core, "Exception", Some(object), TypeCategory::Class, &[]);

        let _ = exception.define_field("Message", string, false);

        let _ = exception.define_method(
            MethodDecl::constructor(|call| {
                let exception = Value::new_object(call.method.declaring());

                if let Value::Object(object) = &exception {
                    object.set_field("Message", call.argument(0).clone());
                }

                Ok(exception)
            })
            .parameter("message", string)
            .returns(void),
        );

        let static_wrapper =
            TypeBuilder::bootstrap(core, "Static", Some(object), TypeCategory::Class, &["T"]);

        let mut functions = Vec::with_capacity(super::MAX_FUNCTION_ARITY + 1);

        for arity in 0..=super::MAX_FUNCTION_ARITY {
            let mut parameters = (1..=arity).map(|index| format!("T{index}")).collect::<Vec<_>>();

            parameters.push(String::from("TResult"));

            let parameters = parameters.iter().map(String::as_str).collect::<Vec<_>>();

            functions.push(TypeBuilder::bootstrap(
                core,
                "Fn",
                Some(object),
                TypeCategory::Class,
                &parameters,
            ));
        }

        let mut assemblies = AHashMap::new();

        let _ = assemblies.insert(CompactString::new(CORE_ASSEMBLY), core);

        Self {
            core,
            assemblies: RwLock::new(assemblies),
            derived_types: RwLock::new(AHashMap::new()),
            derived_methods: RwLock::new(AHashMap::new()),
            types: CoreTypes {
                object,
                void,
                boolean,
                char,
                int32,
                int64,
                double,
                string,
                ty,
                exception,
                static_wrapper,
                functions,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use semver::Version;

    use crate::runtime::{Domain, TypeMeta, CORE_ASSEMBLY};

    #[test]
    fn test_core_assembly() {
        let domain = Domain::get();

        let core = domain.core_assembly();

        assert_eq!(core.name(), CORE_ASSEMBLY);
        assert!(core.is_core());
        assert_eq!(domain.assembly(CORE_ASSEMBLY), Some(core));

        assert_eq!(core.type_by_name("Object"), Some(TypeMeta::object()));
        assert_eq!(core.type_by_name("Int32"), Some(TypeMeta::int32()));
        assert_eq!(core.type_by_name("Fn`3").map(|ty| ty.arity()), Some(3));
        assert_eq!(core.type_by_name("Static`1"), Some(TypeMeta::static_definition()));
        assert!(core.type_by_name("Missing").is_none());
    }

    #[test]
    fn test_define_assembly_is_idempotent() {
        let domain = Domain::get();

        let first = domain.define_assembly("domain_test", Version::new(1, 2, 0));
        let second = domain.define_assembly("domain_test", Version::new(9, 0, 0));

        assert_eq!(first, second);
        assert_eq!(second.version(), &Version::new(1, 2, 0));
        assert_eq!(domain.assembly("domain_test"), Some(first));
        assert!(domain.assembly("domain_test_unknown").is_none());
    }
}

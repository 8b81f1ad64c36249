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
    fmt::{Debug, Display, Formatter, Write},
    hash::{Hash, Hasher},
    sync::{
        atomic::{AtomicUsize, Ordering},
        RwLock,
    },
};

use compact_str::CompactString;

use crate::{
    report::system_panic,
    runtime::{
        domain::{CoreTypes, DerivedKey},
        member::{FieldMeta, Getter, MemberMeta, MethodDecl, MethodMeta, PropertyMeta, Setter},
        AssemblyMeta,
        Domain,
        Value,
    },
    sync::{read, write},
};

/// The maximum number of parameters of the built-in function types.
///
/// The core assembly defines ``Fn`1`` (a function without parameters) through
/// ``Fn`9`` (a function with eight parameters). The last type argument of
/// a function type is its return type.
pub const MAX_FUNCTION_ARITY: usize = 8;

static NEXT_TYPE_INDEX: AtomicUsize = AtomicUsize::new(1);

const ESCAPED: [char; 12] = ['\\', '`', '[', ']', '+', '.', ',', '*', '&', '(', ')', ' '];

// Writes a name component of a canonical type name, escaping the characters
// that have meaning in the type name grammar.
pub(crate) fn write_escaped(target: &mut String, name: &str) {
    for character in name.chars() {
        if ESCAPED.contains(&character) {
            target.push('\\');
        }

        target.push(character);
    }
}

/// A broad classification of a type definition.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TypeCategory {
    /// A reference type. Values of reference types can be nil.
    Class,

    /// An abstract contract that classes implement.
    Interface,

    /// A built-in value type. Values of primitive types are never nil.
    Primitive,
}

/// Denotes whether a generic parameter belongs to a type or to a method.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum GenericOwner {
    Type,
    Method,
}

/// The structural form of a type.
#[derive(Clone, Debug)]
pub enum TypeShape {
    /// An ordinary non-generic type definition.
    Plain,

    /// A generic type definition with unbound parameters (e.g. ``List`1``).
    Definition {
        parameters: Vec<&'static TypeMeta>,
    },

    /// A generic definition instantiated with type arguments
    /// (e.g. ``List`1[Int32]``).
    Constructed {
        definition: &'static TypeMeta,
        arguments: Vec<&'static TypeMeta>,
    },

    /// A generic parameter placeholder.
    Parameter {
        position: usize,
        owner: GenericOwner,
    },

    /// An unmanaged pointer to the element type (`Int32*`).
    Pointer {
        element: &'static TypeMeta,
    },

    /// A by-reference form of the element type (`Int32&`).
    ByRef {
        element: &'static TypeMeta,
    },

    /// An array of the element type of the specified rank (`Int32[]`,
    /// `Int32[,]`).
    Array {
        element: &'static TypeMeta,
        rank: usize,
    },
}

/// Introspection metadata of a host type.
///
/// Type metadata objects are unique per type: two references denote the same
/// type if and only if they are equal. Type definitions are registered in
/// their [assembly](AssemblyMeta) through the [TypeBuilder]. Derived types
/// such as constructed generics, arrays, pointers and references are created
/// on demand and cached by the [Domain].
pub struct TypeMeta {
    index: usize,
    name: CompactString,
    namespace: Option<CompactString>,
    declaring: Option<&'static TypeMeta>,
    assembly: &'static AssemblyMeta,
    shape: TypeShape,
    base: Option<&'static TypeMeta>,
    interfaces: Vec<&'static TypeMeta>,
    category: TypeCategory,
    members: RwLock<Vec<MemberMeta>>,
}

impl PartialEq for TypeMeta {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for TypeMeta {}

impl Hash for TypeMeta {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state)
    }
}

impl Debug for TypeMeta {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, formatter)
    }
}

impl Display for TypeMeta {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(&self.full_name())
    }
}

impl TypeMeta {
    /// Returns metadata of the root type of the type hierarchy. Every class,
    /// interface and primitive type is convertible to the Object type.
    #[inline(always)]
    pub fn object() -> &'static Self {
        Self::core().object
    }

    /// Returns metadata of the type of expressions that produce no value.
    #[inline(always)]
    pub fn void() -> &'static Self {
        Self::core().void
    }

    #[inline(always)]
    pub fn boolean() -> &'static Self {
        Self::core().boolean
    }

    #[inline(always)]
    pub fn char() -> &'static Self {
        Self::core().char
    }

    #[inline(always)]
    pub fn int32() -> &'static Self {
        Self::core().int32
    }

    #[inline(always)]
    pub fn int64() -> &'static Self {
        Self::core().int64
    }

    #[inline(always)]
    pub fn double() -> &'static Self {
        Self::core().double
    }

    #[inline(always)]
    pub fn string() -> &'static Self {
        Self::core().string
    }

    /// Returns metadata of the type of type objects.
    #[inline(always)]
    pub fn ty() -> &'static Self {
        Self::core().ty
    }

    /// Returns metadata of the base type of the values thrown by the
    /// `throw` operations and caught by the try blocks.
    #[inline(always)]
    pub fn exception() -> &'static Self {
        Self::core().exception
    }

    /// Returns the ``Static`1`` generic definition.
    ///
    /// A constructed ``Static`1[T]`` type denotes the type `T` itself
    /// rather than an instance of `T`. Type names used as dispatch receivers
    /// have this type.
    #[inline(always)]
    pub fn static_definition() -> &'static Self {
        Self::core().static_wrapper
    }

    /// Returns the generic definition of the function type with the
    /// specified number of parameters.
    #[inline(always)]
    pub fn function_definition(arity: usize) -> Option<&'static Self> {
        Self::core().functions.get(arity).copied()
    }

    /// Returns the static wrapper type of the `target` type.
    pub fn static_of(target: &'static Self) -> &'static Self {
        match Self::static_definition().make_generic(&[target]) {
            Some(ty) => ty,
            None => system_panic!("Static wrapper definition is not generic."),
        }
    }

    /// Returns the function type with the specified parameter types and
    /// return type, or None if the number of parameters exceeds
    /// [MAX_FUNCTION_ARITY].
    pub fn function(parameters: &[&'static Self], ret: &'static Self) -> Option<&'static Self> {
        let definition = Self::function_definition(parameters.len())?;

        let mut arguments = Vec::with_capacity(parameters.len() + 1);

        arguments.extend_from_slice(parameters);
        arguments.push(ret);

        definition.make_generic(&arguments)
    }

    /// A unique numeric identifier of this type within the process.
    #[inline(always)]
    pub fn index(&self) -> usize {
        self.index
    }

    /// The simple name of the type without the namespace, the declaring
    /// types and the generic arity.
    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline(always)]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// The enclosing type of a nested type.
    #[inline(always)]
    pub fn declaring(&self) -> Option<&'static TypeMeta> {
        self.declaring
    }

    #[inline(always)]
    pub fn assembly(&self) -> &'static AssemblyMeta {
        self.assembly
    }

    #[inline(always)]
    pub fn shape(&self) -> &TypeShape {
        &self.shape
    }

    /// The direct base class. Only the Object type, interfaces, generic
    /// parameters, pointers and references have no base class.
    #[inline(always)]
    pub fn base(&self) -> Option<&'static TypeMeta> {
        self.base
    }

    /// The interfaces that this type directly implements.
    #[inline(always)]
    pub fn interfaces(&self) -> &[&'static TypeMeta] {
        &self.interfaces
    }

    #[inline(always)]
    pub fn category(&self) -> TypeCategory {
        self.category
    }

    #[inline(always)]
    pub fn is_interface(&self) -> bool {
        self.category == TypeCategory::Interface
    }

    /// Returns true if the values of this type can never be nil.
    #[inline(always)]
    pub fn is_value_type(&self) -> bool {
        self.category == TypeCategory::Primitive
    }

    #[inline(always)]
    pub fn is_object(&self) -> bool {
        self == Self::object()
    }

    #[inline(always)]
    pub fn is_void(&self) -> bool {
        self == Self::void()
    }

    /// Returns true if this type is one of the built-in numeric types.
    #[inline(always)]
    pub fn is_numeric(&self) -> bool {
        self == Self::int32() || self == Self::int64() || self == Self::double()
    }

    #[inline(always)]
    pub fn is_generic_definition(&self) -> bool {
        matches!(&self.shape, TypeShape::Definition { .. })
    }

    #[inline(always)]
    pub fn is_generic_parameter(&self) -> bool {
        matches!(&self.shape, TypeShape::Parameter { .. })
    }

    /// Returns true if this type is a generic parameter or is derived from
    /// one (e.g. ``List`1[T]`` or `T[]`).
    pub fn contains_generic_parameters(&self) -> bool {
        match &self.shape {
            TypeShape::Parameter { .. } => true,
            TypeShape::Constructed { arguments, .. } => arguments
                .iter()
                .any(|argument| argument.contains_generic_parameters()),
            TypeShape::Pointer { element }
            | TypeShape::ByRef { element }
            | TypeShape::Array { element, .. } => element.contains_generic_parameters(),
            _ => false,
        }
    }

    /// The generic definition of a constructed generic type.
    #[inline(always)]
    pub fn definition(&self) -> Option<&'static TypeMeta> {
        match &self.shape {
            TypeShape::Constructed { definition, .. } => Some(*definition),
            _ => None,
        }
    }

    /// The type arguments of a constructed generic type, or an empty slice
    /// for any other type.
    #[inline(always)]
    pub fn arguments(&self) -> &[&'static TypeMeta] {
        match &self.shape {
            TypeShape::Constructed { arguments, .. } => arguments,
            _ => &[],
        }
    }

    /// The generic parameters of a generic type definition, or an empty
    /// slice for any other type.
    #[inline(always)]
    pub fn generic_parameters(&self) -> &[&'static TypeMeta] {
        match &self.shape {
            TypeShape::Definition { parameters } => parameters,
            _ => &[],
        }
    }

    /// The number of generic parameters or type arguments of this type.
    #[inline(always)]
    pub fn arity(&self) -> usize {
        match &self.shape {
            TypeShape::Definition { parameters } => parameters.len(),
            TypeShape::Constructed { arguments, .. } => arguments.len(),
            _ => 0,
        }
    }

    /// The element type of a pointer, reference or array type.
    #[inline(always)]
    pub fn element(&self) -> Option<&'static TypeMeta> {
        match &self.shape {
            TypeShape::Pointer { element }
            | TypeShape::ByRef { element }
            | TypeShape::Array { element, .. } => Some(*element),
            _ => None,
        }
    }

    /// Returns true if this type is a ``Static`1[T]`` wrapper.
    #[inline(always)]
    pub fn is_static_wrapper(&self) -> bool {
        self.definition() == Some(Self::static_definition())
    }

    /// Returns `T` if this type is a ``Static`1[T]`` wrapper.
    #[inline(always)]
    pub fn static_target(&self) -> Option<&'static TypeMeta> {
        match self.is_static_wrapper() {
            true => self.arguments().first().copied(),
            false => None,
        }
    }

    /// Returns the parameter types and the return type of a function type.
    pub fn function_signature(&self) -> Option<(&[&'static TypeMeta], &'static TypeMeta)> {
        let definition = self.definition()?;

        if !definition.assembly.is_core() || definition.name != "Fn" {
            return None;
        }

        let (ret, parameters) = self.arguments().split_last()?;

        Some((parameters, *ret))
    }

    /// Instantiates this generic type definition with the type arguments.
    ///
    /// Returns None if this type is not a generic definition or if the
    /// number of arguments does not match the number of parameters.
    pub fn make_generic(&'static self, arguments: &[&'static TypeMeta]) -> Option<&'static TypeMeta> {
        let TypeShape::Definition { parameters } = &self.shape else {
            return None;
        };

        if parameters.len() != arguments.len() {
            return None;
        }

        let key = DerivedKey::Constructed(
            self.index,
            arguments.iter().map(|argument| argument.index).collect(),
        );

        Some(Domain::get().derive_type(key, || {
            let base = self.base.map(|base| base.substitute(arguments, &[]));

            let interfaces = self
                .interfaces
                .iter()
                .map(|interface| interface.substitute(arguments, &[]))
                .collect();

            Self::new(
                self.name.clone(),
                self.namespace.clone(),
                self.declaring,
                self.assembly,
                TypeShape::Constructed {
                    definition: self,
                    arguments: arguments.to_vec(),
                },
                base,
                interfaces,
                self.category,
            )
        }))
    }

    /// Returns the pointer type of this type.
    pub fn pointer(&'static self) -> &'static TypeMeta {
        Domain::get().derive_type(DerivedKey::Pointer(self.index), || {
            self.derive(TypeShape::Pointer { element: self }, None)
        })
    }

    /// Returns the by-reference type of this type.
    pub fn by_ref(&'static self) -> &'static TypeMeta {
        Domain::get().derive_type(DerivedKey::ByRef(self.index), || {
            self.derive(TypeShape::ByRef { element: self }, None)
        })
    }

    /// Returns the array type of this type with the specified rank.
    pub fn array(&'static self, rank: usize) -> &'static TypeMeta {
        let rank = rank.max(1);

        Domain::get().derive_type(DerivedKey::Array(self.index, rank), || {
            self.derive(
                TypeShape::Array {
                    element: self,
                    rank,
                },
                Some(Self::object()),
            )
        })
    }

    /// Replaces the generic parameters inside this type with the type
    /// arguments.
    ///
    /// Type-level parameters are replaced with `type_arguments`, and
    /// method-level parameters are replaced with `method_arguments` by
    /// position. Parameters without a corresponding argument stay intact.
    pub fn substitute(
        &'static self,
        type_arguments: &[&'static TypeMeta],
        method_arguments: &[&'static TypeMeta],
    ) -> &'static TypeMeta {
        match &self.shape {
            TypeShape::Parameter { position, owner } => {
                let arguments = match owner {
                    GenericOwner::Type => type_arguments,
                    GenericOwner::Method => method_arguments,
                };

                arguments.get(*position).copied().unwrap_or(self)
            }

            TypeShape::Constructed {
                definition,
                arguments,
            } => {
                let substituted = arguments
                    .iter()
                    .map(|argument| argument.substitute(type_arguments, method_arguments))
                    .collect::<Vec<_>>();

                definition.make_generic(&substituted).unwrap_or(self)
            }

            TypeShape::Pointer { element } => {
                element.substitute(type_arguments, method_arguments).pointer()
            }

            TypeShape::ByRef { element } => {
                element.substitute(type_arguments, method_arguments).by_ref()
            }

            TypeShape::Array { element, rank } => element
                .substitute(type_arguments, method_arguments)
                .array(*rank),

            _ => self,
        }
    }

    /// Returns the canonical full name of this type.
    ///
    /// The name consists of the namespace, the chain of declaring types
    /// separated by `+`, the simple name with the generic arity suffix
    /// (`` `N ``), the bracketed type arguments of constructed types, and the
    /// `*`, `&` and `[]` suffixes of pointers, references and arrays. Type
    /// arguments from assemblies other than the core assembly are qualified
    /// with the assembly name: ``Box`1[[Geometry.Point, geometry]]``.
    ///
    /// Characters with a special meaning in this grammar are escaped with a
    /// backslash.
    pub fn full_name(&self) -> String {
        let mut target = String::new();

        self.write_full_name(&mut target);

        target
    }

    /// Returns the list of types that values of this type convert to
    /// implicitly, ordered from the most specific to the most general.
    ///
    /// The list starts with the type itself, followed by its interfaces,
    /// then by its base type and the interfaces of the base type, and so on
    /// up to the Object type. Interfaces and generic parameters end with the
    /// Object type too.
    pub fn convertible_chain(&'static self) -> Vec<&'static TypeMeta> {
        let mut chain = Vec::new();

        if matches!(
            &self.shape,
            TypeShape::Pointer { .. } | TypeShape::ByRef { .. }
        ) {
            chain.push(self);
            return chain;
        }

        let mut current = Some(self);

        while let Some(ty) = current {
            if !chain.contains(&ty) {
                chain.push(ty);
            }

            for interface in &ty.interfaces {
                push_interface(&mut chain, interface);
            }

            current = ty.base;
        }

        let object = Self::object();

        if !chain.contains(&object) {
            chain.push(object);
        }

        chain
    }

    /// Returns the number of implicit conversion steps from this type to the
    /// `target` type, or None if this type is not convertible to the target.
    ///
    /// A generic type definition is considered a target of each of its
    /// constructed types.
    pub fn distance_to(&'static self, target: &'static TypeMeta) -> Option<usize> {
        self.convertible_chain()
            .into_iter()
            .position(|ty| ty == target || ty.definition() == Some(target))
    }

    /// Returns true if values of the `actual` type convert to this type
    /// implicitly.
    #[inline(always)]
    pub fn is_assignable_from(&'static self, actual: &'static TypeMeta) -> bool {
        actual.distance_to(self).is_some()
    }

    /// Computes the distance between a dispatch target type (this type) and
    /// the actual type of a receiver.
    ///
    /// Unlike [distance_to](Self::distance_to), a static wrapper receiver
    /// never matches the Object target, and two static wrappers match each
    /// other by the distance between their wrapped types.
    pub fn dispatch_distance(&'static self, actual: &'static TypeMeta) -> Option<usize> {
        if let (Some(target), Some(actual)) = (self.static_target(), actual.static_target()) {
            return target.dispatch_distance(actual);
        }

        if self.is_object() && actual.is_static_wrapper() {
            return None;
        }

        actual.distance_to(self)
    }

    /// Returns the value that variables and fields of this type hold
    /// initially.
    pub fn default_value(&self) -> Value {
        let core = Self::core();

        if self == core.boolean {
            return Value::Bool(false);
        }

        if self == core.char {
            return Value::Char('\0');
        }

        if self == core.int32 {
            return Value::I32(0);
        }

        if self == core.int64 {
            return Value::I64(0);
        }

        if self == core.double {
            return Value::F64(0.0);
        }

        Value::Nil
    }

    /// Defines a field in this type definition.
    pub fn define_field(
        &'static self,
        name: impl Into<CompactString>,
        ty: &'static TypeMeta,
        is_static: bool,
    ) -> &'static FieldMeta {
        let field: &'static FieldMeta = Box::leak(Box::new(FieldMeta::new(
            self,
            name.into(),
            ty,
            is_static,
        )));

        write(&self.members).push(MemberMeta::Field(field));

        field
    }

    /// Defines a property in this type definition.
    ///
    /// A property without a getter is write-only, and a property without a
    /// setter is read-only.
    pub fn define_property(
        &'static self,
        name: impl Into<CompactString>,
        ty: &'static TypeMeta,
        is_static: bool,
        getter: Option<Getter>,
        setter: Option<Setter>,
    ) -> &'static PropertyMeta {
        let property: &'static PropertyMeta = Box::leak(Box::new(PropertyMeta::new(
            self,
            name.into(),
            ty,
            is_static,
            getter,
            setter,
        )));

        write(&self.members).push(MemberMeta::Property(property));

        property
    }

    /// Defines a method or a constructor in this type definition.
    pub fn define_method(&'static self, declaration: MethodDecl) -> &'static MethodMeta {
        let method: &'static MethodMeta = Box::leak(Box::new(declaration.finish(self)));

        write(&self.members).push(MemberMeta::Method(method));

        method
    }

    /// Returns the members declared directly in this type definition in
    /// declaration order.
    pub fn declared_members(&self) -> Vec<MemberMeta> {
        match &self.shape {
            TypeShape::Constructed { definition, .. } => definition.declared_members(),
            _ => read(&self.members).clone(),
        }
    }

    /// Looks up a field by name in this type and its base types.
    pub fn field(&'static self, name: &str) -> Option<&'static FieldMeta> {
        self.find_member(|member| match member {
            MemberMeta::Field(field) if field.name() == name => Some(*field),
            _ => None,
        })
    }

    /// Looks up a property by name in this type and its base types.
    pub fn property(&'static self, name: &str) -> Option<&'static PropertyMeta> {
        self.find_member(|member| match member {
            MemberMeta::Property(property) if property.name() == name => Some(*property),
            _ => None,
        })
    }

    /// Returns the methods with the specified name declared in this type
    /// and in its base types.
    ///
    /// A method of a base type is hidden by a method of a derived type with
    /// the same parameter types. Methods of constructed generic types have
    /// the type arguments substituted into their signatures.
    pub fn methods(&'static self, name: &str) -> Vec<&'static MethodMeta> {
        let mut result: Vec<&'static MethodMeta> = Vec::new();

        let mut current = Some(self);

        while let Some(ty) = current {
            for method in ty.declared_methods() {
                if method.is_constructor() || method.name() != name {
                    continue;
                }

                if result.iter().any(|known| known.same_parameters(method)) {
                    continue;
                }

                result.push(method);
            }

            current = ty.base;
        }

        if self.is_interface() {
            for interface in self.convertible_chain().into_iter().skip(1) {
                for method in interface.declared_methods() {
                    if method.name() == name && !result.iter().any(|known| known.same_parameters(method)) {
                        result.push(method);
                    }
                }
            }
        }

        result
    }

    /// Returns the constructors declared in this type.
    pub fn constructors(&'static self) -> Vec<&'static MethodMeta> {
        self.declared_methods()
            .into_iter()
            .filter(|method| method.is_constructor())
            .collect()
    }

    /// Returns the names of all fields, properties and methods available in
    /// this type including the inherited ones.
    pub fn member_names(&'static self) -> Vec<CompactString> {
        let mut names = Vec::<CompactString>::new();

        for ty in self.convertible_chain() {
            for member in ty.declared_members() {
                if let MemberMeta::Method(method) = member {
                    if method.is_constructor() {
                        continue;
                    }
                }

                let name = member.name();

                if !names.iter().any(|known| known.as_str() == name) {
                    names.push(CompactString::new(name));
                }
            }
        }

        names
    }

    /// Returns the instance fields of this type and of its base types
    /// together with their types as seen from this type.
    pub fn instance_fields(&'static self) -> Vec<(&'static FieldMeta, &'static TypeMeta)> {
        let mut fields = Vec::new();

        let mut current = Some(self);

        while let Some(ty) = current {
            for member in ty.declared_members() {
                let MemberMeta::Field(field) = member else {
                    continue;
                };

                if field.is_static() {
                    continue;
                }

                fields.push((field, field.ty().substitute(ty.arguments(), &[])));
            }

            current = ty.base;
        }

        fields
    }

    /// Finds the element of the convertible chain of this type that
    /// corresponds to the `declaring` type definition.
    ///
    /// For a receiver of type ``List`1[Int32]`` and a member declared in
    /// ``List`1``, returns ``List`1[Int32]``.
    pub fn view_of(&'static self, declaring: &'static TypeMeta) -> Option<&'static TypeMeta> {
        if let Some(target) = self.static_target() {
            return target.view_of(declaring);
        }

        self.convertible_chain()
            .into_iter()
            .find(|ty| *ty == declaring || ty.definition() == Some(declaring))
    }

    pub(crate) fn declared_methods(&'static self) -> Vec<&'static MethodMeta> {
        match &self.shape {
            TypeShape::Constructed { definition, .. } => definition
                .declared_methods()
                .into_iter()
                .map(|method| method.host_on(self))
                .collect(),

            _ => read(&self.members)
                .iter()
                .filter_map(|member| match member {
                    MemberMeta::Method(method) => Some(*method),
                    _ => None,
                })
                .collect(),
        }
    }

    pub(super) fn generic_parameter(
        assembly: &'static AssemblyMeta,
        name: CompactString,
        position: usize,
        owner: GenericOwner,
    ) -> &'static TypeMeta {
        Box::leak(Box::new(Self::new(
            name,
            None,
            None,
            assembly,
            TypeShape::Parameter { position, owner },
            None,
            Vec::new(),
            TypeCategory::Class,
        )))
    }

    #[allow(clippy::too_many_arguments)]
    fn new(
        name: CompactString,
        namespace: Option<CompactString>,
        declaring: Option<&'static TypeMeta>,
        assembly: &'static AssemblyMeta,
        shape: TypeShape,
        base: Option<&'static TypeMeta>,
        interfaces: Vec<&'static TypeMeta>,
        category: TypeCategory,
    ) -> Self {
        Self {
            index: NEXT_TYPE_INDEX.fetch_add(1, Ordering::SeqCst),
            name,
            namespace,
            declaring,
            assembly,
            shape,
            base,
            interfaces,
            category,
            members: RwLock::new(Vec::new()),
        }
    }

    fn derive(&'static self, shape: TypeShape, base: Option<&'static TypeMeta>) -> Self {
        Self::new(
            self.name.clone(),
            self.namespace.clone(),
            self.declaring,
            self.assembly,
            shape,
            base,
            Vec::new(),
            TypeCategory::Class,
        )
    }

    fn find_member<T>(&'static self, mut select: impl FnMut(&MemberMeta) -> Option<T>) -> Option<T> {
        let mut current = Some(self);

        while let Some(ty) = current {
            for member in ty.declared_members() {
                if let Some(found) = select(&member) {
                    return Some(found);
                }
            }

            current = ty.base;
        }

        None
    }

    #[inline(always)]
    fn core() -> &'static CoreTypes {
        Domain::get().core_types()
    }

    fn write_full_name(&self, target: &mut String) {
        match &self.shape {
            TypeShape::Constructed {
                definition,
                arguments,
            } => {
                definition.write_definition_name(target);

                target.push('[');

                for (index, argument) in arguments.iter().enumerate() {
                    if index > 0 {
                        target.push(',');
                    }

                    argument.write_argument(target);
                }

                target.push(']');
            }

            TypeShape::Pointer { element } => {
                element.write_full_name(target);
                target.push('*');
            }

            TypeShape::ByRef { element } => {
                element.write_full_name(target);
                target.push('&');
            }

            TypeShape::Array { element, rank } => {
                element.write_full_name(target);
                target.push('[');

                for _ in 1..*rank {
                    target.push(',');
                }

                target.push(']');
            }

            _ => self.write_definition_name(target),
        }
    }

    fn write_argument(&self, target: &mut String) {
        if self.assembly.is_core() || self.is_generic_parameter() {
            return self.write_full_name(target);
        }

        target.push('[');
        self.write_full_name(target);
        target.push_str(", ");
        write_escaped(target, self.assembly.name());
        target.push(']');
    }

    fn write_definition_name(&self, target: &mut String) {
        match self.declaring {
            Some(declaring) => {
                declaring.write_definition_name(target);
                target.push('+');
            }

            None => {
                if let Some(namespace) = &self.namespace {
                    for segment in namespace.split('.') {
                        write_escaped(target, segment);
                        target.push('.');
                    }
                }
            }
        }

        write_escaped(target, &self.name);

        if let TypeShape::Definition { parameters } = &self.shape {
            let _ = target.write_fmt(format_args!("`{}", parameters.len()));
        }
    }
}

fn push_interface(chain: &mut Vec<&'static TypeMeta>, interface: &'static TypeMeta) {
    if chain.contains(&interface) {
        return;
    }

    chain.push(interface);

    for inherited in &interface.interfaces {
        push_interface(chain, inherited);
    }
}

/// A builder of a new type definition.
///
/// Created by [AssemblyMeta::build_type]. The type is registered in the
/// assembly when the [build](TypeBuilder::build) function is called.
pub struct TypeBuilder {
    assembly: &'static AssemblyMeta,
    name: CompactString,
    namespace: Option<CompactString>,
    declaring: Option<&'static TypeMeta>,
    base: Option<&'static TypeMeta>,
    interfaces: Vec<&'static TypeMeta>,
    category: TypeCategory,
    generics: Vec<CompactString>,
}

impl TypeBuilder {
    /// Sets the dot-separated namespace of the type.
    #[inline(always)]
    pub fn namespace(mut self, namespace: impl Into<CompactString>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Makes the type nested in the `declaring` type.
    #[inline(always)]
    pub fn nested_in(mut self, declaring: &'static TypeMeta) -> Self {
        self.declaring = Some(declaring);
        self
    }

    /// Sets the base class. By default, classes inherit from the Object type.
    #[inline(always)]
    pub fn base(mut self, base: &'static TypeMeta) -> Self {
        self.base = Some(base);
        self
    }

    #[inline(always)]
    pub fn implements(mut self, interface: &'static TypeMeta) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Makes the type an interface.
    #[inline(always)]
    pub fn interface(mut self) -> Self {
        self.category = TypeCategory::Interface;
        self
    }

    /// Makes the type a generic definition with the specified parameter
    /// names.
    pub fn generic(mut self, parameters: &[&str]) -> Self {
        self.generics = parameters.iter().map(|name| CompactString::new(name)).collect();
        self
    }

    /// Registers the type in the assembly.
    ///
    /// If the assembly already contains a type with the same full name, the
    /// existing type is returned.
    pub fn build(self) -> &'static TypeMeta {
        let base = match (self.base, self.category) {
            (Some(base), _) => Some(base),
            (None, TypeCategory::Interface) => None,
            (None, _) => Some(TypeMeta::object()),
        };

        self.finish(base)
    }

    // Used by the Domain bootstrap, so it must not access the Domain.
    pub(super) fn bootstrap(
        assembly: &'static AssemblyMeta,
        name: &str,
        base: Option<&'static TypeMeta>,
        category: TypeCategory,
        generics: &[&str],
    ) -> &'static TypeMeta {
        let mut builder = Self::new(assembly, CompactString::new(name)).generic(generics);

        builder.category = category;

        builder.finish(base)
    }

    #[inline(always)]
    pub(super) fn new(assembly: &'static AssemblyMeta, name: CompactString) -> Self {
        Self {
            assembly,
            name,
            namespace: None,
            declaring: None,
            base: None,
            interfaces: Vec::new(),
            category: TypeCategory::Class,
            generics: Vec::new(),
        }
    }

    fn finish(self, base: Option<&'static TypeMeta>) -> &'static TypeMeta {
        let shape = match self.generics.is_empty() {
            true => TypeShape::Plain,

            false => TypeShape::Definition {
                parameters: self
                    .generics
                    .into_iter()
                    .enumerate()
                    .map(|(position, name)| {
                        TypeMeta::generic_parameter(self.assembly, name, position, GenericOwner::Type)
                    })
                    .collect(),
            },
        };

        let namespace = match self.declaring {
            Some(declaring) => declaring.namespace.clone(),
            None => self.namespace,
        };

        self.assembly.register(TypeMeta::new(
            self.name,
            namespace,
            self.declaring,
            self.assembly,
            shape,
            base,
            self.interfaces,
            self.category,
        ))
    }
}

// Generic method definitions own their parameter placeholders, which are
// created before the method itself.
pub(super) fn method_generic_parameters(names: &[&str]) -> Vec<&'static TypeMeta> {
    let assembly = Domain::get().core_assembly();

    names
        .iter()
        .enumerate()
        .map(|(position, name)| {
            TypeMeta::generic_parameter(assembly, CompactString::new(name), position, GenericOwner::Method)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use semver::Version;

    use crate::runtime::{AssemblyMeta, Domain, TypeMeta, TypeShape};

    fn assembly() -> &'static AssemblyMeta {
        Domain::get().define_assembly("ty_tests", Version::new(1, 0, 0))
    }

    #[test]
    fn test_full_names() {
        let assembly = assembly();

        let outer = assembly.build_type("Outer").namespace("Geo.Shapes").build();
        let inner = assembly.build_type("Inner").nested_in(outer).build();
        let boxed = assembly.build_type("Box").namespace("Geo").generic(&["T"]).build();
        let odd = assembly.build_type("Odd Name").build();

        assert_eq!(outer.full_name(), "Geo.Shapes.Outer");
        assert_eq!(inner.full_name(), "Geo.Shapes.Outer+Inner");
        assert_eq!(boxed.full_name(), "Geo.Box`1");
        assert_eq!(odd.full_name(), "Odd\\ Name");

        let constructed = boxed.make_generic(&[TypeMeta::int32()]).unwrap();

        assert_eq!(constructed.full_name(), "Geo.Box`1[Int32]");

        let nested = boxed.make_generic(&[inner]).unwrap();

        assert_eq!(
            nested.full_name(),
            "Geo.Box`1[[Geo.Shapes.Outer+Inner, ty_tests]]",
        );

        assert_eq!(TypeMeta::int32().pointer().full_name(), "Int32*");
        assert_eq!(TypeMeta::int32().by_ref().full_name(), "Int32&");
        assert_eq!(TypeMeta::string().array(1).full_name(), "String[]");
        assert_eq!(TypeMeta::string().array(2).full_name(), "String[,]");

        assert_eq!(assembly.type_by_name("Geo.Shapes.Outer+Inner"), Some(inner));
        assert_eq!(assembly.type_by_name("Geo.Box`1"), Some(boxed));
    }

    #[test]
    fn test_derived_type_identity() {
        let list = assembly().build_type("IdentityList").generic(&["T"]).build();

        let first = list.make_generic(&[TypeMeta::string()]).unwrap();
        let second = list.make_generic(&[TypeMeta::string()]).unwrap();
        let other = list.make_generic(&[TypeMeta::int32()]).unwrap();

        assert_eq!(first, second);
        assert!(std::ptr::eq(first, second));
        assert_ne!(first, other);
        assert_eq!(first.definition(), Some(list));
        assert!(list.make_generic(&[]).is_none());
        assert!(TypeMeta::int32().make_generic(&[TypeMeta::int32()]).is_none());

        assert!(std::ptr::eq(TypeMeta::int32().array(1), TypeMeta::int32().array(1)));
    }

    #[test]
    fn test_convertible_chain() {
        let assembly = assembly();

        let shape = assembly.build_type("IChainShape").interface().build();
        let named = assembly.build_type("IChainNamed").interface().build();
        let base = assembly.build_type("ChainBase").implements(named).build();
        let derived = assembly
            .build_type("ChainDerived")
            .base(base)
            .implements(shape)
            .build();

        assert_eq!(
            derived.convertible_chain(),
            vec![derived, shape, base, named, TypeMeta::object()],
        );

        assert_eq!(shape.convertible_chain(), vec![shape, TypeMeta::object()]);

        assert_eq!(derived.distance_to(derived), Some(0));
        assert_eq!(derived.distance_to(base), Some(2));
        assert_eq!(derived.distance_to(TypeMeta::object()), Some(4));
        assert_eq!(base.distance_to(derived), None);

        assert!(base.is_assignable_from(derived));
        assert!(!derived.is_assignable_from(base));
        assert!(TypeMeta::object().is_assignable_from(TypeMeta::int32()));
    }

    #[test]
    fn test_static_wrapper_distance() {
        let assembly = assembly();

        let base = assembly.build_type("StaticBase").build();
        let derived = assembly.build_type("StaticDerived").base(base).build();

        let static_base = TypeMeta::static_of(base);
        let static_derived = TypeMeta::static_of(derived);

        assert!(static_base.is_static_wrapper());
        assert_eq!(static_derived.static_target(), Some(derived));
        assert!(!base.is_static_wrapper());

        assert_eq!(TypeMeta::object().dispatch_distance(static_base), None);
        assert_eq!(TypeMeta::object().dispatch_distance(base), Some(1));
        assert_eq!(static_base.dispatch_distance(static_derived), Some(1));
        assert_eq!(static_derived.dispatch_distance(static_base), None);
        assert_eq!(static_base.dispatch_distance(base), None);

        assert_eq!(
            TypeMeta::static_definition().dispatch_distance(static_base),
            Some(0),
        );
    }

    #[test]
    fn test_generic_substitution() {
        let assembly = assembly();

        let pair = assembly.build_type("SubstPair").generic(&["A", "B"]).build();
        let parameters = pair.generic_parameters().to_vec();

        let open = pair.make_generic(&[parameters[1], parameters[0]]).unwrap();

        assert!(open.contains_generic_parameters());

        let closed = open.substitute(&[TypeMeta::int32(), TypeMeta::string()], &[]);

        assert_eq!(closed.full_name(), "SubstPair`2[String,Int32]");
        assert!(!closed.contains_generic_parameters());

        let array = parameters[0].array(1).substitute(&[TypeMeta::double()], &[]);

        assert_eq!(array, TypeMeta::double().array(1));
    }

    #[test]
    fn test_function_types() {
        let function = TypeMeta::function(&[TypeMeta::int32(), TypeMeta::string()], TypeMeta::boolean())
            .unwrap();

        assert_eq!(function.full_name(), "Fn`3[Int32,String,Boolean]");

        let (parameters, ret) = function.function_signature().unwrap();

        assert_eq!(parameters, &[TypeMeta::int32(), TypeMeta::string()]);
        assert_eq!(ret, TypeMeta::boolean());

        assert!(TypeMeta::int32().function_signature().is_none());

        let too_many = vec![TypeMeta::int32(); 9];

        assert!(TypeMeta::function(&too_many, TypeMeta::void()).is_none());

        assert!(matches!(
            TypeMeta::function_definition(0).unwrap().shape(),
            TypeShape::Definition { parameters } if parameters.len() == 1,
        ));
    }

    #[test]
    fn test_default_values() {
        assert!(matches!(TypeMeta::int32().default_value(), crate::runtime::Value::I32(0)));
        assert!(matches!(TypeMeta::boolean().default_value(), crate::runtime::Value::Bool(false)));
        assert!(TypeMeta::string().default_value().is_nil());
        assert!(TypeMeta::object().default_value().is_nil());
    }
}

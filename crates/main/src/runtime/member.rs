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
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
        RwLock,
    },
};

use compact_str::CompactString;

use crate::{
    runtime::{
        domain::MethodKey,
        ty::method_generic_parameters,
        write_escaped,
        Domain,
        RuntimeError,
        RuntimeResult,
        TypeMeta,
        Value,
    },
    sync::{read, write},
};

/// The name under which constructors appear in method signatures.
pub const CONSTRUCTOR_NAME: &str = ".ctor";

static NEXT_METHOD_INDEX: AtomicUsize = AtomicUsize::new(1);

static NIL: Value = Value::Nil;

/// A native implementation of a method.
pub type NativeFn = Arc<dyn Fn(NativeCall<'_>) -> RuntimeResult<Value> + Send + Sync>;

/// A native implementation of a property getter. The argument is the
/// receiver object, or None for static properties.
pub type Getter = Arc<dyn Fn(Option<&Value>) -> RuntimeResult<Value> + Send + Sync>;

/// A native implementation of a property setter.
pub type Setter = Arc<dyn Fn(Option<&Value>, Value) -> RuntimeResult<()> + Send + Sync>;

/// The context of a native method invocation.
#[derive(Clone, Copy)]
pub struct NativeCall<'a> {
    /// The invoked method. For generic methods, this is the instantiated
    /// method with bound type arguments.
    pub method: &'static MethodMeta,

    /// The receiver object of an instance method.
    pub receiver: Option<&'a Value>,

    /// The invocation arguments. Their number always matches the number of
    /// the method parameters.
    pub arguments: &'a [Value],
}

impl<'a> NativeCall<'a> {
    /// Returns the argument at the specified position, or nil if there is
    /// no such argument.
    #[inline(always)]
    pub fn argument(&self, index: usize) -> &'a Value {
        self.arguments.get(index).unwrap_or(&NIL)
    }

    /// Returns the receiver object, or a NullReference error if the
    /// receiver is missing or nil.
    #[inline(always)]
    pub fn receiver(&self) -> RuntimeResult<&'a Value> {
        match self.receiver {
            Some(receiver) if !receiver.is_nil() => Ok(receiver),
            _ => Err(RuntimeError::NullReference {
                operation: "method call",
            }),
        }
    }

    /// Returns the type arguments of the invoked generic method.
    #[inline(always)]
    pub fn type_arguments(&self) -> &'static [&'static TypeMeta] {
        self.method.type_arguments()
    }
}

/// A member of a host type.
#[derive(Clone, Copy)]
pub enum MemberMeta {
    Field(&'static FieldMeta),
    Property(&'static PropertyMeta),
    Method(&'static MethodMeta),
}

impl PartialEq for MemberMeta {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Field(this), Self::Field(other)) => std::ptr::eq(*this, *other),
            (Self::Property(this), Self::Property(other)) => std::ptr::eq(*this, *other),
            (Self::Method(this), Self::Method(other)) => this == other,
            _ => false,
        }
    }
}

impl Eq for MemberMeta {}

impl Hash for MemberMeta {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Field(field) => (*field as *const FieldMeta).hash(state),
            Self::Property(property) => (*property as *const PropertyMeta).hash(state),
            Self::Method(method) => method.index.hash(state),
        }
    }
}

impl Debug for MemberMeta {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Field(field) => formatter.write_fmt(format_args!(
                "field {}.{}",
                field.declaring, field.name
            )),

            Self::Property(property) => formatter.write_fmt(format_args!(
                "property {}.{}",
                property.declaring, property.name
            )),

            Self::Method(method) => formatter.write_fmt(format_args!(
                "method {}::{}",
                method.declaring,
                method.signature()
            )),
        }
    }
}

/// A classification of members.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum MemberKind {
    Field,
    Property,
    Method,
    Constructor,
}

impl MemberMeta {
    #[inline(always)]
    pub fn name(&self) -> &str {
        match self {
            Self::Field(field) => field.name(),
            Self::Property(property) => property.name(),
            Self::Method(method) => method.name(),
        }
    }

    #[inline(always)]
    pub fn declaring(&self) -> &'static TypeMeta {
        match self {
            Self::Field(field) => field.declaring,
            Self::Property(property) => property.declaring,
            Self::Method(method) => method.declaring,
        }
    }

    #[inline(always)]
    pub fn kind(&self) -> MemberKind {
        match self {
            Self::Field(..) => MemberKind::Field,
            Self::Property(..) => MemberKind::Property,
            Self::Method(method) if method.is_constructor() => MemberKind::Constructor,
            Self::Method(..) => MemberKind::Method,
        }
    }

    #[inline(always)]
    pub fn is_static(&self) -> bool {
        match self {
            Self::Field(field) => field.is_static,
            Self::Property(property) => property.is_static,
            Self::Method(method) => method.kind != MethodKind::Instance,
        }
    }

    /// The type of a field or a property, or the return type of a method,
    /// as declared.
    #[inline(always)]
    pub fn ty(&self) -> &'static TypeMeta {
        match self {
            Self::Field(field) => field.ty,
            Self::Property(property) => property.ty,
            Self::Method(method) => method.ret,
        }
    }

    /// The type of this member as seen through a receiver of the specified
    /// type. For a field `Value: T` declared in ``Box`1``, the type seen
    /// through ``Box`1[Int32]`` is `Int32`.
    pub fn ty_on(&self, receiver: &'static TypeMeta) -> &'static TypeMeta {
        let ty = self.ty();

        match receiver.view_of(self.declaring()) {
            Some(view) => ty.substitute(view.arguments(), &[]),
            None => ty,
        }
    }
}

/// A field of a host type.
///
/// Instance field values are stored in the objects. Static field values are
/// stored in the field itself.
pub struct FieldMeta {
    declaring: &'static TypeMeta,
    name: CompactString,
    ty: &'static TypeMeta,
    is_static: bool,
    storage: RwLock<Value>,
}

impl FieldMeta {
    #[inline(always)]
    pub fn declaring(&self) -> &'static TypeMeta {
        self.declaring
    }

    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline(always)]
    pub fn ty(&self) -> &'static TypeMeta {
        self.ty
    }

    #[inline(always)]
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Reads the field value of the receiver object, or the static field
    /// value.
    pub fn get(&self, receiver: Option<&Value>) -> RuntimeResult<Value> {
        if self.is_static {
            return Ok(read(&self.storage).clone());
        }

        match receiver {
            Some(Value::Object(object)) => Ok(object.field(&self.name).unwrap_or_default()),

            _ => Err(RuntimeError::NullReference {
                operation: "field access",
            }),
        }
    }

    /// Writes the field value of the receiver object, or the static field
    /// value.
    pub fn set(&self, receiver: Option<&Value>, value: Value) -> RuntimeResult<()> {
        if self.is_static {
            *write(&self.storage) = value;
            return Ok(());
        }

        match receiver {
            Some(Value::Object(object)) => {
                object.set_field(&self.name, value);
                Ok(())
            }

            _ => Err(RuntimeError::NullReference {
                operation: "field assignment",
            }),
        }
    }

    // Must not access the Domain because core fields are defined during
    // the Domain bootstrap.
    pub(super) fn new(
        declaring: &'static TypeMeta,
        name: CompactString,
        ty: &'static TypeMeta,
        is_static: bool,
    ) -> Self {
        Self {
            declaring,
            name,
            ty,
            is_static,
            storage: RwLock::new(Value::Nil),
        }
    }
}

/// A property of a host type implemented by native accessor functions.
pub struct PropertyMeta {
    declaring: &'static TypeMeta,
    name: CompactString,
    ty: &'static TypeMeta,
    is_static: bool,
    getter: Option<Getter>,
    setter: Option<Setter>,
}

impl PropertyMeta {
    #[inline(always)]
    pub fn declaring(&self) -> &'static TypeMeta {
        self.declaring
    }

    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline(always)]
    pub fn ty(&self) -> &'static TypeMeta {
        self.ty
    }

    #[inline(always)]
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    #[inline(always)]
    pub fn is_readable(&self) -> bool {
        self.getter.is_some()
    }

    #[inline(always)]
    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }

    pub fn get(&self, receiver: Option<&Value>) -> RuntimeResult<Value> {
        match &self.getter {
            Some(getter) => getter(receiver),

            None => Err(RuntimeError::NotReadable {
                member: self.name.clone(),
            }),
        }
    }

    pub fn set(&self, receiver: Option<&Value>, value: Value) -> RuntimeResult<()> {
        match &self.setter {
            Some(setter) => setter(receiver, value),

            None => Err(RuntimeError::NotWritable {
                member: self.name.clone(),
            }),
        }
    }

    pub(super) fn new(
        declaring: &'static TypeMeta,
        name: CompactString,
        ty: &'static TypeMeta,
        is_static: bool,
        getter: Option<Getter>,
        setter: Option<Setter>,
    ) -> Self {
        Self {
            declaring,
            name,
            ty,
            is_static,
            getter,
            setter,
        }
    }
}

/// A classification of methods.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum MethodKind {
    Instance,
    Static,
    Constructor,
}

/// A method parameter.
#[derive(Clone, Debug)]
pub struct ParamMeta {
    pub name: CompactString,
    pub ty: &'static TypeMeta,
}

/// The generic form of a method.
#[derive(Clone, Debug)]
pub enum MethodGenerics {
    /// A non-generic method.
    None,

    /// A generic method definition with unbound type parameters.
    Definition { parameters: Vec<&'static TypeMeta> },

    /// A generic method definition instantiated with type arguments.
    Constructed {
        definition: &'static MethodMeta,
        arguments: Vec<&'static TypeMeta>,
    },
}

/// A method or a constructor of a host type.
///
/// Methods of a generic type definition are re-hosted on each of its
/// constructed types with the type arguments substituted into the
/// signature. Generic method definitions are instantiated through
/// [make_generic](MethodMeta::make_generic). Both forms are cached, so the
/// same method is always represented by the same `&'static` instance.
pub struct MethodMeta {
    index: usize,
    declaring: &'static TypeMeta,
    name: CompactString,
    kind: MethodKind,
    parameters: Vec<ParamMeta>,
    ret: &'static TypeMeta,
    generics: MethodGenerics,
    hosted: Option<&'static MethodMeta>,
    body: NativeFn,
}

impl PartialEq for MethodMeta {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for MethodMeta {}

impl Hash for MethodMeta {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state)
    }
}

impl Debug for MethodMeta {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_fmt(format_args!("{}::{}", self.declaring, self.signature()))
    }
}

impl Display for MethodMeta {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(&self.signature())
    }
}

impl MethodMeta {
    #[inline(always)]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline(always)]
    pub fn declaring(&self) -> &'static TypeMeta {
        self.declaring
    }

    /// The method name. Constructors are named [CONSTRUCTOR_NAME].
    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline(always)]
    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    #[inline(always)]
    pub fn is_static(&self) -> bool {
        self.kind == MethodKind::Static
    }

    #[inline(always)]
    pub fn is_constructor(&self) -> bool {
        self.kind == MethodKind::Constructor
    }

    #[inline(always)]
    pub fn parameters(&self) -> &[ParamMeta] {
        &self.parameters
    }

    #[inline(always)]
    pub fn ret(&self) -> &'static TypeMeta {
        self.ret
    }

    #[inline(always)]
    pub fn generics(&self) -> &MethodGenerics {
        &self.generics
    }

    #[inline(always)]
    pub fn is_generic_definition(&self) -> bool {
        matches!(&self.generics, MethodGenerics::Definition { .. })
    }

    /// The type parameters of a generic method definition.
    #[inline(always)]
    pub fn generic_parameters(&self) -> &[&'static TypeMeta] {
        match &self.generics {
            MethodGenerics::Definition { parameters } => parameters,
            _ => &[],
        }
    }

    /// The type arguments of an instantiated generic method.
    #[inline(always)]
    pub fn type_arguments(&'static self) -> &'static [&'static TypeMeta] {
        match &self.generics {
            MethodGenerics::Constructed { arguments, .. } => arguments,
            _ => &[],
        }
    }

    /// The generic method definition of an instantiated generic method.
    #[inline(always)]
    pub fn definition(&self) -> Option<&'static MethodMeta> {
        match &self.generics {
            MethodGenerics::Constructed { definition, .. } => Some(*definition),
            _ => None,
        }
    }

    /// The method of the generic type definition that this method was
    /// re-hosted from.
    #[inline(always)]
    pub fn hosted(&self) -> Option<&'static MethodMeta> {
        self.hosted
    }

    /// Instantiates this generic method definition with the type arguments.
    pub fn make_generic(&'static self, arguments: &[&'static TypeMeta]) -> Option<&'static MethodMeta> {
        let MethodGenerics::Definition { parameters } = &self.generics else {
            return None;
        };

        if parameters.len() != arguments.len() {
            return None;
        }

        let key = MethodKey::Constructed(
            self.index,
            arguments.iter().map(|argument| argument.index()).collect(),
        );

        Some(Domain::get().derive_method(key, || {
            let type_arguments = self.declaring.arguments();

            Self {
                index: NEXT_METHOD_INDEX.fetch_add(1, Ordering::SeqCst),
                declaring: self.declaring,
                name: self.name.clone(),
                kind: self.kind,
                parameters: self
                    .parameters
                    .iter()
                    .map(|parameter| ParamMeta {
                        name: parameter.name.clone(),
                        ty: parameter.ty.substitute(type_arguments, arguments),
                    })
                    .collect(),
                ret: self.ret.substitute(type_arguments, arguments),
                generics: MethodGenerics::Constructed {
                    definition: self,
                    arguments: arguments.to_vec(),
                },
                hosted: None,
                body: self.body.clone(),
            }
        }))
    }

    /// Returns the textual signature of this method in the form
    /// `ReturnType Name[TypeArguments](ParameterTypes)`.
    ///
    /// For example, `Int32 Add(Int32, Int32)`, ``Void .ctor(String)`` or
    /// ``Box`1[T] Wrap[T](T)``.
    pub fn signature(&self) -> String {
        let mut target = self.ret.full_name();

        target.push(' ');

        match self.kind {
            MethodKind::Constructor => target.push_str(CONSTRUCTOR_NAME),
            _ => write_escaped(&mut target, &self.name),
        }

        let generics = match &self.generics {
            MethodGenerics::None => &[][..],
            MethodGenerics::Definition { parameters } => parameters.as_slice(),
            MethodGenerics::Constructed { arguments, .. } => arguments.as_slice(),
        };

        if !generics.is_empty() {
            target.push('[');

            for (index, argument) in generics.iter().enumerate() {
                if index > 0 {
                    target.push(',');
                }

                target.push_str(&argument.full_name());
            }

            target.push(']');
        }

        target.push('(');

        for (index, parameter) in self.parameters.iter().enumerate() {
            if index > 0 {
                target.push_str(", ");
            }

            target.push_str(&parameter.ty.full_name());
        }

        target.push(')');

        target
    }

    /// Invokes the native body of this method.
    ///
    /// Fails with ArityMismatch if the number of arguments does not match
    /// the number of parameters, and with NullReference if an instance
    /// method is called without a receiver.
    pub fn invoke(&'static self, receiver: Option<&Value>, arguments: &[Value]) -> RuntimeResult<Value> {
        if arguments.len() != self.parameters.len() {
            return Err(RuntimeError::ArityMismatch {
                parameters: self.parameters.len(),
                arguments: arguments.len(),
            });
        }

        if self.is_generic_definition() {
            return Err(RuntimeError::OpenGeneric {
                method: CompactString::new(self.signature()),
            });
        }

        if self.kind == MethodKind::Instance && receiver.map(Value::is_nil).unwrap_or(true) {
            return Err(RuntimeError::NullReference {
                operation: "method call",
            });
        }

        (self.body)(NativeCall {
            method: self,
            receiver,
            arguments,
        })
    }

    pub(super) fn host_on(&'static self, declaring: &'static TypeMeta) -> &'static MethodMeta {
        let key = MethodKey::Hosted(self.index, declaring.index());

        Domain::get().derive_method(key, || {
            let type_arguments = declaring.arguments();

            Self {
                index: NEXT_METHOD_INDEX.fetch_add(1, Ordering::SeqCst),
                declaring,
                name: self.name.clone(),
                kind: self.kind,
                parameters: self
                    .parameters
                    .iter()
                    .map(|parameter| ParamMeta {
                        name: parameter.name.clone(),
                        ty: parameter.ty.substitute(type_arguments, &[]),
                    })
                    .collect(),
                ret: self.ret.substitute(type_arguments, &[]),
                generics: self.generics.clone(),
                hosted: Some(self),
                body: self.body.clone(),
            }
        })
    }

    pub(super) fn same_parameters(&self, other: &MethodMeta) -> bool {
        if self.generic_parameters().len() != other.generic_parameters().len() {
            return false;
        }

        if self.parameters.len() != other.parameters.len() {
            return false;
        }

        self.parameters.iter().zip(&other.parameters).all(|(a, b)| {
            a.ty == b.ty || (a.ty.is_generic_parameter() && b.ty.is_generic_parameter())
        })
    }
}

/// A declaration of a new method.
///
/// ```ignore
/// let mut declaration = MethodDecl::function("Identity", |call| Ok(call.argument(0).clone()));
///
/// let t = declaration.generic(&["T"])[0];
///
/// ty.define_method(declaration.parameter("value", t).returns(t));
/// ```
pub struct MethodDecl {
    name: CompactString,
    kind: MethodKind,
    parameters: Vec<ParamMeta>,
    ret: Option<&'static TypeMeta>,
    generics: Vec<&'static TypeMeta>,
    body: NativeFn,
}

impl MethodDecl {
    pub fn new(
        kind: MethodKind,
        name: impl Into<CompactString>,
        body: impl Fn(NativeCall<'_>) -> RuntimeResult<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            parameters: Vec::new(),
            ret: None,
            generics: Vec::new(),
            body: Arc::new(body),
        }
    }

    /// Declares an instance method.
    #[inline(always)]
    pub fn instance(
        name: impl Into<CompactString>,
        body: impl Fn(NativeCall<'_>) -> RuntimeResult<Value> + Send + Sync + 'static,
    ) -> Self {
        Self::new(MethodKind::Instance, name, body)
    }

    /// Declares a static method.
    #[inline(always)]
    pub fn function(
        name: impl Into<CompactString>,
        body: impl Fn(NativeCall<'_>) -> RuntimeResult<Value> + Send + Sync + 'static,
    ) -> Self {
        Self::new(MethodKind::Static, name, body)
    }

    /// Declares a constructor. The body is responsible for creating the
    /// object.
    #[inline(always)]
    pub fn constructor(
        body: impl Fn(NativeCall<'_>) -> RuntimeResult<Value> + Send + Sync + 'static,
    ) -> Self {
        Self::new(MethodKind::Constructor, CONSTRUCTOR_NAME, body)
    }

    /// Makes the method a generic definition and returns the placeholders of
    /// its type parameters to be used in the parameter and return types.
    pub fn generic(&mut self, names: &[&str]) -> Vec<&'static TypeMeta> {
        self.generics = method_generic_parameters(names);
        self.generics.clone()
    }

    #[inline(always)]
    pub fn parameter(mut self, name: impl Into<CompactString>, ty: &'static TypeMeta) -> Self {
        self.parameters.push(ParamMeta {
            name: name.into(),
            ty,
        });
        self
    }

    /// Sets the return type. By default, methods return Void.
    #[inline(always)]
    pub fn returns(mut self, ty: &'static TypeMeta) -> Self {
        self.ret = Some(ty);
        self
    }

    pub(super) fn finish(self, declaring: &'static TypeMeta) -> MethodMeta {
        MethodMeta {
            index: NEXT_METHOD_INDEX.fetch_add(1, Ordering::SeqCst),
            declaring,
            name: self.name,
            kind: self.kind,
            parameters: self.parameters,
            ret: self.ret.unwrap_or_else(TypeMeta::void),
            generics: match self.generics.is_empty() {
                true => MethodGenerics::None,
                false => MethodGenerics::Definition {
                    parameters: self.generics,
                },
            },
            hosted: None,
            body: self.body,
        }
    }
}

#[cfg(test)]
mod tests {
    use semver::Version;

    use crate::runtime::{
        Domain,
        MemberKind,
        MemberMeta,
        MethodDecl,
        RuntimeError,
        TypeMeta,
        Value,
    };

    #[test]
    fn test_method_signatures() {
        let assembly = Domain::get().define_assembly("member_tests", Version::new(1, 0, 0));

        let boxed = assembly.build_type("SigBox").generic(&["T"]).build();
        let t = boxed.generic_parameters()[0];

        let _ = boxed.define_method(
            MethodDecl::constructor(|call| Ok(Value::new_object(call.method.declaring())))
                .parameter("value", t),
        );

        let mut wrap = MethodDecl::function("Wrap", |call| Ok(call.argument(0).clone()));
        let u = wrap.generic(&["U"])[0];
        let wrap = boxed.define_method(wrap.parameter("value", u).parameter("count", TypeMeta::int32()).returns(u));

        assert_eq!(wrap.signature(), "U Wrap[U](U, Int32)");
        assert_eq!(boxed.constructors()[0].signature(), "Void .ctor(T)");

        let constructed = boxed.make_generic(&[TypeMeta::string()]).unwrap();

        assert_eq!(constructed.constructors()[0].signature(), "Void .ctor(String)");

        let hosted = constructed.methods("Wrap")[0];

        assert_eq!(hosted.hosted(), Some(wrap));
        assert!(std::ptr::eq(hosted, constructed.methods("Wrap")[0]));

        let instantiated = hosted.make_generic(&[TypeMeta::double()]).unwrap();

        assert_eq!(instantiated.signature(), "Double Wrap[Double](Double, Int32)");
        assert_eq!(instantiated.type_arguments(), &[TypeMeta::double()]);
        assert_eq!(instantiated.definition(), Some(hosted));
    }

    #[test]
    fn test_invoke_checks() {
        let assembly = Domain::get().define_assembly("member_tests", Version::new(1, 0, 0));

        let counter = assembly.build_type("InvokeCounter").build();

        let increment = counter.define_method(
            MethodDecl::instance("Increment", |call| {
                let receiver = call.receiver()?;

                match call.argument(0) {
                    Value::I32(step) => Ok(Value::I32(step + receiver.as_i32().unwrap_or(0))),
                    _ => Ok(Value::Nil),
                }
            })
            .parameter("step", TypeMeta::int32())
            .returns(TypeMeta::int32()),
        );

        assert!(matches!(
            increment.invoke(Some(&Value::I32(1)), &[]),
            Err(RuntimeError::ArityMismatch {
                parameters: 1,
                arguments: 0
            }),
        ));

        assert!(matches!(
            increment.invoke(None, &[Value::I32(1)]),
            Err(RuntimeError::NullReference { .. }),
        ));

        assert!(matches!(
            increment.invoke(Some(&Value::I32(2)), &[Value::I32(3)]),
            Ok(Value::I32(5)),
        ));
    }

    #[test]
    fn test_fields_and_properties() {
        let assembly = Domain::get().define_assembly("member_tests", Version::new(1, 0, 0));

        let holder = assembly.build_type("FieldHolder").generic(&["T"]).build();
        let t = holder.generic_parameters()[0];

        let value = holder.define_field("Value", t, false);
        let shared = holder.define_field("Shared", TypeMeta::int32(), true);

        let _ = holder.define_property(
            "Constant",
            TypeMeta::string(),
            true,
            Some(std::sync::Arc::new(|_| Ok(Value::from("constant")))),
            None,
        );

        let constructed = holder.make_generic(&[TypeMeta::int64()]).unwrap();

        assert_eq!(MemberMeta::Field(value).ty_on(constructed), TypeMeta::int64());
        assert_eq!(MemberMeta::Field(value).kind(), MemberKind::Field);

        let object = Value::new_object(constructed);

        assert!(matches!(value.get(Some(&object)), Ok(Value::I64(0))));

        value.set(Some(&object), Value::I64(7)).unwrap();

        assert!(matches!(value.get(Some(&object)), Ok(Value::I64(7))));

        shared.set(None, Value::I32(3)).unwrap();

        assert!(matches!(
            constructed.field("Shared").unwrap().get(None),
            Ok(Value::I32(3))
        ));

        let property = constructed.property("Constant").unwrap();

        assert!(matches!(property.get(None), Ok(Value::Str(text)) if text == "constant"));
        assert!(matches!(
            property.set(None, Value::Nil),
            Err(RuntimeError::NotWritable { .. })
        ));

        assert!(constructed.member_names().iter().any(|name| name.as_str() == "Value"));
    }
}

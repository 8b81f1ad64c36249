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
    sync::{Arc, RwLock},
};

use ahash::AHashMap;
use compact_str::CompactString;

use crate::{
    runtime::{NumberCastCause, RuntimeError, RuntimeResult, TypeMeta},
    sync::{read, write},
};

/// A callable object that the interpreter can invoke through a
/// [FunctionRef] value, such as a closure created from a lambda expression.
pub trait ScriptCallable: Send + Sync {
    /// The function type of this callable (``Fn`N[...]``).
    fn ty(&self) -> &'static TypeMeta;

    /// Calls the function with the arguments.
    fn call(&self, arguments: &[Value]) -> RuntimeResult<Value>;
}

/// A runtime value.
///
/// Primitive values are stored inline. Objects, arrays and functions are
/// shared references: cloning the Value clones the reference, and two
/// reference values are equal only if they point to the same instance.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Char(char),
    I32(i32),
    I64(i64),
    F64(f64),
    Str(CompactString),
    Type(&'static TypeMeta),
    Object(ObjectRef),
    Array(ArrayRef),
    Function(FunctionRef),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Bool(this), Self::Bool(other)) => this == other,
            (Self::Char(this), Self::Char(other)) => this == other,
            (Self::I32(this), Self::I32(other)) => this == other,
            (Self::I64(this), Self::I64(other)) => this == other,
            (Self::F64(this), Self::F64(other)) => this == other,
            (Self::Str(this), Self::Str(other)) => this == other,
            (Self::Type(this), Self::Type(other)) => this == other,
            (Self::Object(this), Self::Object(other)) => this.ptr_eq(other),
            (Self::Array(this), Self::Array(other)) => this.ptr_eq(other),
            (Self::Function(this), Self::Function(other)) => this.ptr_eq(other),
            _ => false,
        }
    }
}

impl Debug for Value {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Char(value) => Debug::fmt(value, formatter),
            Self::Str(value) => Debug::fmt(value, formatter),
            _ => Display::fmt(self, formatter),
        }
    }
}

impl Display for Value {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nil => formatter.write_str("nil"),
            Self::Bool(value) => Display::fmt(value, formatter),
            Self::Char(value) => Display::fmt(value, formatter),
            Self::I32(value) => Display::fmt(value, formatter),
            Self::I64(value) => Display::fmt(value, formatter),
            Self::F64(value) => Display::fmt(value, formatter),
            Self::Str(value) => formatter.write_str(value),
            Self::Type(ty) => formatter.write_fmt(format_args!("type {ty}")),
            Self::Object(object) => formatter.write_fmt(format_args!("{} object", object.ty())),

            Self::Array(array) => {
                formatter.write_str("[")?;

                for (index, item) in array.items().iter().enumerate() {
                    if index > 0 {
                        formatter.write_str(", ")?;
                    }

                    Debug::fmt(item, formatter)?;
                }

                formatter.write_str("]")
            }

            Self::Function(function) => formatter.write_fmt(format_args!("{} function", function.ty())),
        }
    }
}

impl From<bool> for Value {
    #[inline(always)]
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<char> for Value {
    #[inline(always)]
    fn from(value: char) -> Self {
        Self::Char(value)
    }
}

impl From<i32> for Value {
    #[inline(always)]
    fn from(value: i32) -> Self {
        Self::I32(value)
    }
}

impl From<i64> for Value {
    #[inline(always)]
    fn from(value: i64) -> Self {
        Self::I64(value)
    }
}

impl From<f64> for Value {
    #[inline(always)]
    fn from(value: f64) -> Self {
        Self::F64(value)
    }
}

impl From<&str> for Value {
    #[inline(always)]
    fn from(value: &str) -> Self {
        Self::Str(CompactString::new(value))
    }
}

impl From<String> for Value {
    #[inline(always)]
    fn from(value: String) -> Self {
        Self::Str(CompactString::from(value))
    }
}

impl From<CompactString> for Value {
    #[inline(always)]
    fn from(value: CompactString) -> Self {
        Self::Str(value)
    }
}

impl Value {
    /// Creates a new object of the specified type with all instance fields
    /// set to their default values.
    pub fn new_object(ty: &'static TypeMeta) -> Self {
        let fields = ty
            .instance_fields()
            .into_iter()
            .map(|(field, ty)| (CompactString::new(field.name()), ty.default_value()))
            .collect();

        Self::Object(ObjectRef(Arc::new(ObjectData {
            ty,
            fields: RwLock::new(fields),
        })))
    }

    /// Creates a new single-dimensional array of the element type.
    pub fn new_array(element: &'static TypeMeta, items: Vec<Value>) -> Self {
        Self::new_array_of(element.array(1), items)
    }

    // Multi-dimensional arrays are represented as arrays of arrays, with the
    // outer array carrying the multi-dimensional type.
    #[inline(always)]
    pub(crate) fn new_array_of(ty: &'static TypeMeta, items: Vec<Value>) -> Self {
        Self::Array(ArrayRef(Arc::new(ArrayData {
            ty,
            items: RwLock::new(items),
        })))
    }

    /// Creates a new Exception object with the message.
    pub fn exception(message: impl Into<CompactString>) -> Self {
        let exception = Self::new_object(TypeMeta::exception());

        if let Self::Object(object) = &exception {
            object.set_field("Message", Self::Str(message.into()));
        }

        exception
    }

    /// Wraps a callable object.
    #[inline(always)]
    pub fn function(callable: impl ScriptCallable + 'static) -> Self {
        Self::Function(FunctionRef(Arc::new(callable)))
    }

    /// Returns the runtime type of this value. The type of the nil value is
    /// the Object type.
    pub fn ty(&self) -> &'static TypeMeta {
        match self {
            Self::Nil => TypeMeta::object(),
            Self::Bool(..) => TypeMeta::boolean(),
            Self::Char(..) => TypeMeta::char(),
            Self::I32(..) => TypeMeta::int32(),
            Self::I64(..) => TypeMeta::int64(),
            Self::F64(..) => TypeMeta::double(),
            Self::Str(..) => TypeMeta::string(),
            Self::Type(..) => TypeMeta::ty(),
            Self::Object(object) => object.ty(),
            Self::Array(array) => array.ty(),
            Self::Function(function) => function.ty(),
        }
    }

    #[inline(always)]
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    #[inline(always)]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::I32(value) => Some(*value),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I32(value) => Some(*value as i64),
            Self::I64(value) => Some(*value),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::I32(value) => Some(cast::f64(*value)),
            Self::I64(value) => Some(cast::f64(*value)),
            Self::F64(value) => Some(*value),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value.as_str()),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn as_type(&self) -> Option<&'static TypeMeta> {
        match self {
            Self::Type(ty) => Some(*ty),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Self::Array(array) => Some(array),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn as_function(&self) -> Option<&FunctionRef> {
        match self {
            Self::Function(function) => Some(function),
            _ => None,
        }
    }

    /// Returns true if this value is a true boolean. Any other value,
    /// including nil, is false.
    #[inline(always)]
    pub fn is_truthy(&self) -> bool {
        matches!(self, Self::Bool(true))
    }

    /// Converts this value to the target type.
    ///
    /// Numeric values are converted between the numeric types with range
    /// checks. Reference values are converted to any type they are
    /// assignable to, and nil converts to any reference type.
    pub fn convert(&self, to: &'static TypeMeta) -> RuntimeResult<Value> {
        let from = self.ty();

        if from == to || to.is_object() {
            return Ok(self.clone());
        }

        let number_cast = |cause: cast::Error| RuntimeError::NumberCast {
            from,
            to,
            cause: NumberCastCause::from(cause),
        };

        if to == TypeMeta::int32() {
            return match self {
                Self::I64(value) => cast::i32(*value).map(Self::I32).map_err(number_cast),
                Self::F64(value) => cast::i32(*value).map(Self::I32).map_err(number_cast),
                Self::Char(value) => cast::i32(*value as u32).map(Self::I32).map_err(number_cast),
                _ => Err(RuntimeError::InvalidCast { from, to }),
            };
        }

        if to == TypeMeta::int64() {
            return match self {
                Self::I32(value) => Ok(Self::I64(cast::i64(*value))),
                Self::F64(value) => cast::i64(*value).map(Self::I64).map_err(number_cast),
                Self::Char(value) => Ok(Self::I64(cast::i64(*value as u32))),
                _ => Err(RuntimeError::InvalidCast { from, to }),
            };
        }

        if to == TypeMeta::double() {
            return match self {
                Self::I32(value) => Ok(Self::F64(cast::f64(*value))),
                Self::I64(value) => Ok(Self::F64(cast::f64(*value))),
                _ => Err(RuntimeError::InvalidCast { from, to }),
            };
        }

        if to == TypeMeta::char() {
            let code = match self {
                Self::I32(value) => cast::u32(*value).map_err(number_cast)?,
                Self::I64(value) => cast::u32(*value).map_err(number_cast)?,
                _ => return Err(RuntimeError::InvalidCast { from, to }),
            };

            return match char::from_u32(code) {
                Some(character) => Ok(Self::Char(character)),
                None => Err(RuntimeError::InvalidCast { from, to }),
            };
        }

        if to == TypeMeta::string() {
            return match self {
                Self::Nil => Ok(Self::Nil),
                _ => Err(RuntimeError::InvalidCast { from, to }),
            };
        }

        if self.is_nil() {
            return match to.is_value_type() {
                true => Err(RuntimeError::InvalidCast { from, to }),
                false => Ok(Self::Nil),
            };
        }

        match to.is_assignable_from(from) {
            true => Ok(self.clone()),
            false => Err(RuntimeError::InvalidCast { from, to }),
        }
    }
}

/// A shared reference to a host object.
#[derive(Clone)]
pub struct ObjectRef(Arc<ObjectData>);

struct ObjectData {
    ty: &'static TypeMeta,
    fields: RwLock<AHashMap<CompactString, Value>>,
}

impl ObjectRef {
    #[inline(always)]
    pub fn ty(&self) -> &'static TypeMeta {
        self.0.ty
    }

    /// Returns the value of the instance field, or None if the object does
    /// not have such field.
    #[inline(always)]
    pub fn field(&self, name: &str) -> Option<Value> {
        read(&self.0.fields).get(name).cloned()
    }

    #[inline(always)]
    pub fn set_field(&self, name: &str, value: Value) {
        let _ = write(&self.0.fields).insert(CompactString::new(name), value);
    }

    #[inline(always)]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A shared reference to an array.
#[derive(Clone)]
pub struct ArrayRef(Arc<ArrayData>);

struct ArrayData {
    ty: &'static TypeMeta,
    items: RwLock<Vec<Value>>,
}

impl ArrayRef {
    /// The array type (e.g. `Int32[]`).
    #[inline(always)]
    pub fn ty(&self) -> &'static TypeMeta {
        self.0.ty
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        read(&self.0.items).len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a snapshot of the array items.
    #[inline(always)]
    pub fn items(&self) -> Vec<Value> {
        read(&self.0.items).clone()
    }

    pub fn get(&self, index: i64) -> RuntimeResult<Value> {
        let items = read(&self.0.items);

        match usize::try_from(index).ok().and_then(|index| items.get(index)) {
            Some(item) => Ok(item.clone()),

            None => Err(RuntimeError::OutOfBounds {
                index,
                length: items.len(),
            }),
        }
    }

    pub fn set(&self, index: i64, value: Value) -> RuntimeResult<()> {
        let mut items = write(&self.0.items);
        let length = items.len();

        match usize::try_from(index).ok().and_then(|index| items.get_mut(index)) {
            Some(item) => {
                *item = value;
                Ok(())
            }

            None => Err(RuntimeError::OutOfBounds { index, length }),
        }
    }

    #[inline(always)]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A shared reference to a [ScriptCallable] object.
#[derive(Clone)]
pub struct FunctionRef(Arc<dyn ScriptCallable>);

impl FunctionRef {
    #[inline(always)]
    pub fn ty(&self) -> &'static TypeMeta {
        self.0.ty()
    }

    #[inline(always)]
    pub fn call(&self, arguments: &[Value]) -> RuntimeResult<Value> {
        self.0.call(arguments)
    }

    #[inline(always)]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::{NumberCastCause, RuntimeError, TypeMeta, Value};

    #[test]
    fn test_numeric_conversions() {
        assert_eq!(Value::I32(7).convert(TypeMeta::int64()).unwrap(), Value::I64(7));
        assert_eq!(Value::I64(7).convert(TypeMeta::double()).unwrap(), Value::F64(7.0));
        assert_eq!(Value::F64(7.9).convert(TypeMeta::int32()).unwrap(), Value::I32(7));
        assert_eq!(Value::I32(65).convert(TypeMeta::char()).unwrap(), Value::Char('A'));

        assert!(matches!(
            Value::I64(i64::MAX).convert(TypeMeta::int32()),
            Err(RuntimeError::NumberCast {
                cause: NumberCastCause::Overflow,
                ..
            }),
        ));

        assert!(matches!(
            Value::F64(f64::NAN).convert(TypeMeta::int64()),
            Err(RuntimeError::NumberCast {
                cause: NumberCastCause::NAN,
                ..
            }),
        ));

        assert!(matches!(
            Value::from("text").convert(TypeMeta::int32()),
            Err(RuntimeError::InvalidCast { .. }),
        ));
    }

    #[test]
    fn test_reference_conversions() {
        assert!(Value::Nil.convert(TypeMeta::string()).unwrap().is_nil());
        assert!(Value::Nil.convert(TypeMeta::int32()).is_err());

        let exception = Value::exception("boom");

        assert_eq!(exception.convert(TypeMeta::object()).unwrap(), exception);
        assert!(exception.convert(TypeMeta::string()).is_err());

        assert_eq!(
            exception.as_object().and_then(|object| object.field("Message")),
            Some(Value::from("boom")),
        );
    }

    #[test]
    fn test_reference_equality() {
        let first = Value::new_array(TypeMeta::int32(), vec![Value::I32(1), Value::I32(2)]);
        let second = Value::new_array(TypeMeta::int32(), vec![Value::I32(1), Value::I32(2)]);

        assert_eq!(first, first.clone());
        assert_ne!(first, second);
        assert_eq!(first.ty(), TypeMeta::int32().array(1));
        assert_eq!(first.to_string(), "[1, 2]");

        let array = first.as_array().unwrap();

        array.set(1, Value::I32(5)).unwrap();

        assert_eq!(array.get(1).unwrap(), Value::I32(5));
        assert!(matches!(array.get(2), Err(RuntimeError::OutOfBounds { index: 2, length: 2 })));
        assert!(matches!(array.get(-1), Err(RuntimeError::OutOfBounds { .. })));
    }
}

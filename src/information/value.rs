//! Values stored in an information container.

use std::fmt;

use crate::extent::Extent;
use crate::object::{Object, Ref};
use crate::request::Pass;

/// Discriminant of a [`Value`], fixed per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// 32-bit signed integer.
    Integer,
    /// 64-bit unsigned integer.
    UnsignedLong,
    /// Double-precision float.
    Double,
    /// UTF-8 string.
    String,
    /// Vector of 64-bit signed integers.
    IntegerVector,
    /// Vector of doubles.
    DoubleVector,
    /// Vector of strings.
    StringVector,
    /// Strong reference to an object.
    Object,
}

/// A heterogeneous value owned by an information container.
#[derive(Debug, Clone)]
pub enum Value {
    /// 32-bit signed integer.
    Integer(i32),
    /// 64-bit unsigned integer.
    UnsignedLong(u64),
    /// Double-precision float.
    Double(f64),
    /// UTF-8 string.
    String(String),
    /// Vector of 64-bit signed integers.
    IntegerVector(Vec<i64>),
    /// Vector of doubles.
    DoubleVector(Vec<f64>),
    /// Vector of strings.
    StringVector(Vec<String>),
    /// Strong reference to an object.
    Object(Ref<dyn Object>),
}

impl Value {
    /// The kind of this value.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Integer(_) => ValueKind::Integer,
            Value::UnsignedLong(_) => ValueKind::UnsignedLong,
            Value::Double(_) => ValueKind::Double,
            Value::String(_) => ValueKind::String,
            Value::IntegerVector(_) => ValueKind::IntegerVector,
            Value::DoubleVector(_) => ValueKind::DoubleVector,
            Value::StringVector(_) => ValueKind::StringVector,
            Value::Object(_) => ValueKind::Object,
        }
    }

    /// Equality used to decide whether a `set` changes anything.
    ///
    /// Doubles compare bitwise, so re-setting NaN is not a change. Objects
    /// compare by identity.
    #[must_use]
    pub fn same_as(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::UnsignedLong(a), Value::UnsignedLong(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::IntegerVector(a), Value::IntegerVector(b)) => a == b,
            (Value::DoubleVector(a), Value::DoubleVector(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            (Value::StringVector(a), Value::StringVector(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{v}"),
            Value::UnsignedLong(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v}"),
            Value::IntegerVector(v) => write!(f, "{v:?}"),
            Value::DoubleVector(v) => write!(f, "{v:?}"),
            Value::StringVector(v) => write!(f, "{v:?}"),
            Value::Object(v) => write!(f, "{}({:#x})", v.class_name(), v.addr()),
        }
    }
}

/// Rust types that can be stored under a typed key.
///
/// Converting into a [`Value`] may yield `None`, meaning "remove the entry";
/// object keys use this for unset references.
pub trait KeyValue: Sized {
    /// Kind of the stored [`Value`].
    const KIND: ValueKind;

    /// Value reported for an absent key.
    fn default_value() -> Self;

    /// Convert into storage form.
    fn into_value(self) -> Option<Value>;

    /// Convert from storage form. `None` on kind mismatch.
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! scalar_key_value {
    ($ty:ty, $variant:ident, $default:expr) => {
        impl KeyValue for $ty {
            const KIND: ValueKind = ValueKind::$variant;

            fn default_value() -> Self {
                $default
            }

            fn into_value(self) -> Option<Value> {
                Some(Value::$variant(self))
            }

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

scalar_key_value!(i32, Integer, 0);
scalar_key_value!(u64, UnsignedLong, 0);
scalar_key_value!(f64, Double, 0.0);
scalar_key_value!(String, String, String::new());
scalar_key_value!(Vec<i64>, IntegerVector, Vec::new());
scalar_key_value!(Vec<f64>, DoubleVector, Vec::new());
scalar_key_value!(Vec<String>, StringVector, Vec::new());

impl KeyValue for Extent {
    const KIND: ValueKind = ValueKind::IntegerVector;

    fn default_value() -> Self {
        Extent::EMPTY
    }

    fn into_value(self) -> Option<Value> {
        Some(Value::IntegerVector(self.to_vec()))
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::IntegerVector(v) => Extent::from_slice(v),
            _ => None,
        }
    }
}

impl KeyValue for Pass {
    const KIND: ValueKind = ValueKind::Integer;

    fn default_value() -> Self {
        Pass::Data
    }

    fn into_value(self) -> Option<Value> {
        Some(Value::Integer(self.code()))
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(code) => Pass::from_code(*code),
            _ => None,
        }
    }
}

impl<T: Object> KeyValue for Option<Ref<T>> {
    const KIND: ValueKind = ValueKind::Object;

    fn default_value() -> Self {
        None
    }

    fn into_value(self) -> Option<Value> {
        self.map(|r| Value::Object(r.to_object()))
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Object(object) => Some(object.downcast::<T>()),
            _ => None,
        }
    }
}

impl KeyValue for Option<Ref<dyn Object>> {
    const KIND: ValueKind = ValueKind::Object;

    fn default_value() -> Self {
        None
    }

    fn into_value(self) -> Option<Value> {
        self.map(Value::Object)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Object(object) => Some(Some(object.clone())),
            _ => None,
        }
    }
}

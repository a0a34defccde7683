//! Script-side and host-side values and the codec between them
//!
//! The codec never widens or narrows silently. A value whose runtime type
//! does not fit the declared type is a [`CallError::TypeMismatch`]; the one
//! allowance is that script integers may fill `B`, `S` and `C` slots when
//! the value is in range, since scripts have no narrower integer types.
//!
//! A `C` slot also accepts a one-unit string, but always comes back as the
//! raw UTF-16 code unit in a [`ScriptValue::Int`], so lone surrogates
//! survive the trip.

use crate::{CallError, ReturnDesc, TypeDesc};
use std::fmt;
use std::num::NonZeroU64;

/// Opaque reference to a host object. `0` is never a valid reference.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectRef(NonZeroU64);

impl ObjectRef {
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    pub fn raw(self) -> u64 {
        self.0.get()
    }
}

impl From<NonZeroU64> for ObjectRef {
    fn from(raw: NonZeroU64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj#{}", self.0)
    }
}

/// A value as the scripting side sees it.
#[derive(Clone, Debug, PartialEq)]
pub enum ScriptValue {
    Void,
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    Object(ObjectRef),
}

impl ScriptValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ScriptValue::Void => "void",
            ScriptValue::Null => "null",
            ScriptValue::Bool(_) => "bool",
            ScriptValue::Int(_) => "int32",
            ScriptValue::Long(_) => "int64",
            ScriptValue::Float(_) => "float32",
            ScriptValue::Double(_) => "float64",
            ScriptValue::Str(_) => "string",
            ScriptValue::Object(_) => "object",
        }
    }

    pub fn as_object(&self) -> Option<ObjectRef> {
        match self {
            ScriptValue::Object(object) => Some(*object),
            _ => None,
        }
    }
}

impl From<bool> for ScriptValue {
    fn from(v: bool) -> Self {
        ScriptValue::Bool(v)
    }
}

impl From<i32> for ScriptValue {
    fn from(v: i32) -> Self {
        ScriptValue::Int(v)
    }
}

impl From<i64> for ScriptValue {
    fn from(v: i64) -> Self {
        ScriptValue::Long(v)
    }
}

impl From<f32> for ScriptValue {
    fn from(v: f32) -> Self {
        ScriptValue::Float(v)
    }
}

impl From<f64> for ScriptValue {
    fn from(v: f64) -> Self {
        ScriptValue::Double(v)
    }
}

impl From<&str> for ScriptValue {
    fn from(v: &str) -> Self {
        ScriptValue::Str(v.to_string())
    }
}

impl From<String> for ScriptValue {
    fn from(v: String) -> Self {
        ScriptValue::Str(v)
    }
}

impl From<ObjectRef> for ScriptValue {
    fn from(v: ObjectRef) -> Self {
        ScriptValue::Object(v)
    }
}

/// A value in the host's typed argument/return slots.
#[derive(Clone, Debug, PartialEq)]
pub enum HostValue {
    Void,
    Boolean(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    /// Any reference slot; `None` is the host's null.
    Object(Option<ObjectRef>),
}

impl HostValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Void => "void",
            HostValue::Boolean(_) => "boolean",
            HostValue::Byte(_) => "byte",
            HostValue::Char(_) => "char",
            HostValue::Short(_) => "short",
            HostValue::Int(_) => "int",
            HostValue::Long(_) => "long",
            HostValue::Float(_) => "float",
            HostValue::Double(_) => "double",
            HostValue::Str(_) => "string",
            HostValue::Object(_) => "object",
        }
    }
}

/// Convert one script argument into the host slot declared at `index`.
pub fn encode_argument(
    index: usize,
    value: &ScriptValue,
    expected: &TypeDesc,
) -> Result<HostValue, CallError> {
    let mismatch = || CallError::TypeMismatch {
        index,
        expected: expected.to_string(),
        found: value.type_name(),
    };

    Ok(match (expected, value) {
        (TypeDesc::Boolean, ScriptValue::Bool(v)) => HostValue::Boolean(*v),
        (TypeDesc::Int, ScriptValue::Int(v)) => HostValue::Int(*v),
        (TypeDesc::Long, ScriptValue::Long(v)) => HostValue::Long(*v),
        (TypeDesc::Float, ScriptValue::Float(v)) => HostValue::Float(*v),
        (TypeDesc::Double, ScriptValue::Double(v)) => HostValue::Double(*v),
        (TypeDesc::Byte, ScriptValue::Int(v)) => {
            HostValue::Byte(i8::try_from(*v).map_err(|_| mismatch())?)
        }
        (TypeDesc::Short, ScriptValue::Int(v)) => {
            HostValue::Short(i16::try_from(*v).map_err(|_| mismatch())?)
        }
        (TypeDesc::Char, ScriptValue::Int(v)) => {
            HostValue::Char(u16::try_from(*v).map_err(|_| mismatch())?)
        }
        (TypeDesc::Char, ScriptValue::Str(s)) => {
            let mut units = s.encode_utf16();
            match (units.next(), units.next()) {
                (Some(unit), None) => HostValue::Char(unit),
                _ => return Err(mismatch()),
            }
        }
        (ty, ScriptValue::Str(s)) if ty.is_string() => HostValue::Str(s.clone()),
        (ty, ScriptValue::Null) if ty.is_reference() => HostValue::Object(None),
        (ty, ScriptValue::Object(object)) if ty.is_reference() => HostValue::Object(Some(*object)),
        _ => return Err(mismatch()),
    })
}

/// Convert a host return value according to the declared return type.
pub fn decode_result(value: HostValue, declared: &ReturnDesc) -> Result<ScriptValue, CallError> {
    let ty = match declared {
        ReturnDesc::Void => {
            return match value {
                HostValue::Void => Ok(ScriptValue::Void),
                other => Err(result_mismatch(declared, &other)),
            }
        }
        ReturnDesc::Value(ty) => ty,
    };
    decode_value(value, ty).map_err(|found| CallError::ResultMismatch {
        expected: declared.to_string(),
        found,
    })
}

/// Convert a host field value according to its descriptor.
pub fn decode_field(value: HostValue, declared: &TypeDesc) -> Result<ScriptValue, CallError> {
    decode_value(value, declared).map_err(|found| CallError::ResultMismatch {
        expected: declared.to_string(),
        found,
    })
}

fn result_mismatch(declared: &ReturnDesc, found: &HostValue) -> CallError {
    CallError::ResultMismatch {
        expected: declared.to_string(),
        found: found.type_name(),
    }
}

fn decode_value(value: HostValue, ty: &TypeDesc) -> Result<ScriptValue, &'static str> {
    Ok(match (ty, value) {
        (TypeDesc::Boolean, HostValue::Boolean(v)) => ScriptValue::Bool(v),
        (TypeDesc::Byte, HostValue::Byte(v)) => ScriptValue::Int(v.into()),
        (TypeDesc::Short, HostValue::Short(v)) => ScriptValue::Int(v.into()),
        (TypeDesc::Char, HostValue::Char(v)) => ScriptValue::Int(v.into()),
        (TypeDesc::Int, HostValue::Int(v)) => ScriptValue::Int(v),
        (TypeDesc::Long, HostValue::Long(v)) => ScriptValue::Long(v),
        (TypeDesc::Float, HostValue::Float(v)) => ScriptValue::Float(v),
        (TypeDesc::Double, HostValue::Double(v)) => ScriptValue::Double(v),
        (ty, HostValue::Str(s)) if ty.is_string() => ScriptValue::Str(s),
        (ty, HostValue::Object(None)) if ty.is_reference() => ScriptValue::Null,
        (ty, HostValue::Object(Some(object))) if ty.is_reference() => ScriptValue::Object(object),
        (_, other) => return Err(other.type_name()),
    })
}

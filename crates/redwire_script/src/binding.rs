//! JavaScript bindings for the call bridge
//!
//! ```js
//! const world = newObject("redwire/sim/World", "(Ljava/lang/String;)V", "the_nether");
//! callMethod(world, "redwire/sim/World", "isSpawnAllowed", "(III)Z", 0, 70, 0);
//! callStatic("redwire/sim/World", "getTime", "()J");
//! getField(world, "redwire/sim/World", "difficulty", "I");
//! releaseObject(world);
//! ```
//!
//! JS numbers are matched against the declared slot: integral numbers fill
//! `I`, `B`, `S` and `C` within `i32` range and `J` up to 2^53, any number
//! fills `F` (rounded) and `D`. Every other pairing reaches the codec as-is
//! and fails there with the usual type mismatch. Host objects appear as
//! `{ __redwireRef: n }`. Call errors are thrown as JS exceptions.

use crate::{CallBridge, CallError, ObjectRef, ScriptValue, Signature, TypeDesc};
use rquickjs::function::Rest;
use rquickjs::{Ctx, Exception, Function, IntoJs, Object, Value};
use std::ops::Deref;

/// Property carrying the raw reference on host-object handles.
pub const REF_KEY: &str = "__redwireRef";

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Convert a JS value for the slot at `index` declared as `expected`.
pub fn from_js(value: &Value<'_>, index: usize, expected: &TypeDesc) -> Result<ScriptValue, CallError> {
    if value.is_null() || value.is_undefined() {
        return Ok(ScriptValue::Null);
    }
    if let Some(b) = value.as_bool() {
        return Ok(ScriptValue::Bool(b));
    }
    if let Some(n) = value.as_number() {
        return Ok(number_for(n, expected));
    }
    if let Some(s) = value.as_string() {
        return Ok(ScriptValue::Str(s.to_string().map_err(|_| mismatch(index, expected, "string"))?));
    }
    if let Some(object) = object_ref(value) {
        return Ok(ScriptValue::Object(object));
    }
    let found = if value.is_function() {
        "function"
    } else if value.is_array() {
        "array"
    } else {
        "object"
    };
    Err(mismatch(index, expected, found))
}

/// Convert a bridge result into a JS value.
pub fn to_js<'js>(ctx: &Ctx<'js>, value: ScriptValue) -> rquickjs::Result<Value<'js>> {
    Ok(match value {
        ScriptValue::Void => Value::new_undefined(ctx.clone()),
        ScriptValue::Null => Value::new_null(ctx.clone()),
        ScriptValue::Bool(b) => Value::new_bool(ctx.clone(), b),
        ScriptValue::Int(n) => Value::new_int(ctx.clone(), n),
        ScriptValue::Long(n) => Value::new_float(ctx.clone(), n as f64),
        ScriptValue::Float(n) => Value::new_float(ctx.clone(), n.into()),
        ScriptValue::Double(n) => Value::new_float(ctx.clone(), n),
        ScriptValue::Str(s) => s.into_js(ctx)?,
        ScriptValue::Object(object) => {
            let handle = Object::new(ctx.clone())?;
            handle.set(REF_KEY, object.raw() as f64)?;
            handle.into_value()
        }
    })
}

fn number_for(n: f64, expected: &TypeDesc) -> ScriptValue {
    let integral = n.fract() == 0.0;
    match expected {
        TypeDesc::Int | TypeDesc::Byte | TypeDesc::Short | TypeDesc::Char
            if integral && n >= f64::from(i32::MIN) && n <= f64::from(i32::MAX) =>
        {
            ScriptValue::Int(n as i32)
        }
        TypeDesc::Long if integral && n.abs() <= MAX_SAFE_INTEGER => ScriptValue::Long(n as i64),
        TypeDesc::Float => ScriptValue::Float(n as f32),
        _ => ScriptValue::Double(n),
    }
}

fn object_ref(value: &Value<'_>) -> Option<ObjectRef> {
    let raw: f64 = value.as_object()?.get::<_, Option<f64>>(REF_KEY).ok().flatten()?;
    if raw.fract() != 0.0 || raw < 1.0 {
        return None;
    }
    ObjectRef::from_raw(raw as u64)
}

fn mismatch(index: usize, expected: &TypeDesc, found: &'static str) -> CallError {
    CallError::TypeMismatch {
        index,
        expected: expected.to_string(),
        found,
    }
}

fn arguments(values: &[Value<'_>], sig: &Signature) -> Result<Vec<ScriptValue>, CallError> {
    if values.len() != sig.arity() {
        return Err(CallError::ArityMismatch {
            expected: sig.arity(),
            found: values.len(),
        });
    }
    sig.params()
        .iter()
        .zip(values)
        .enumerate()
        .map(|(index, (ty, value))| from_js(value, index, ty))
        .collect()
}

/// `null`/`undefined` is a null target; anything else must be a handle.
fn target(value: &Value<'_>) -> Result<Option<ObjectRef>, CallError> {
    if value.is_null() || value.is_undefined() {
        return Ok(None);
    }
    object_ref(value)
        .map(Some)
        .ok_or_else(|| mismatch(0, &TypeDesc::Object("java/lang/Object".into()), "object"))
}

fn throw(ctx: &Ctx<'_>, err: CallError) -> rquickjs::Error {
    let message = err.to_string();
    match err {
        CallError::TypeMismatch { .. }
        | CallError::ArityMismatch { .. }
        | CallError::MalformedSignature { .. } => Exception::throw_type(ctx, &message),
        _ => Exception::throw_message(ctx, &message),
    }
}

fn returned<'js>(ctx: &Ctx<'js>, result: Result<ScriptValue, CallError>) -> rquickjs::Result<Value<'js>> {
    match result {
        Ok(value) => to_js(ctx, value),
        Err(err) => Err(throw(ctx, err)),
    }
}

/// Install `callStatic`, `callMethod`, `newObject`, `getField`,
/// `getStaticField`, `setField` and `releaseObject`.
pub(crate) fn install<'js, B>(ctx: &Ctx<'js>, bridge: B) -> rquickjs::Result<()>
where
    B: Deref<Target = CallBridge> + Clone + 'static,
{
    let globals = ctx.globals();

    let b = bridge.clone();
    globals.set(
        "callStatic",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>,
                  type_name: String,
                  member: String,
                  signature: String,
                  args: Rest<Value<'js>>|
                  -> rquickjs::Result<Value<'js>> {
                let result = b
                    .parse_signature(&signature)
                    .and_then(|sig| arguments(&args.0, &sig))
                    .and_then(|args| b.invoke_static(&type_name, &member, &signature, &args));
                returned(&ctx, result)
            },
        )?,
    )?;

    let b = bridge.clone();
    globals.set(
        "callMethod",
        Function::new(
            ctx.clone(),
            move |object: Value<'js>,
                  type_name: String,
                  member: String,
                  signature: String,
                  args: Rest<Value<'js>>|
                  -> rquickjs::Result<Value<'js>> {
                let ctx = object.ctx().clone();
                let result = target(&object).and_then(|object| {
                    let sig = b.parse_signature(&signature)?;
                    let args = arguments(&args.0, &sig)?;
                    b.invoke_instance(object, &type_name, &member, &signature, &args)
                });
                returned(&ctx, result)
            },
        )?,
    )?;

    let b = bridge.clone();
    globals.set(
        "newObject",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>,
                  type_name: String,
                  signature: String,
                  args: Rest<Value<'js>>|
                  -> rquickjs::Result<Value<'js>> {
                let result = b
                    .parse_signature(&signature)
                    .and_then(|sig| arguments(&args.0, &sig))
                    .and_then(|args| b.construct(&type_name, &signature, &args))
                    .map(ScriptValue::Object);
                returned(&ctx, result)
            },
        )?,
    )?;

    let b = bridge.clone();
    globals.set(
        "getField",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>,
                  object: Value<'js>,
                  type_name: String,
                  field: String,
                  descriptor: String|
                  -> rquickjs::Result<Value<'js>> {
                let result = target(&object)
                    .and_then(|object| b.get_field(object, &type_name, &field, &descriptor));
                returned(&ctx, result)
            },
        )?,
    )?;

    let b = bridge.clone();
    globals.set(
        "getStaticField",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>,
                  type_name: String,
                  field: String,
                  descriptor: String|
                  -> rquickjs::Result<Value<'js>> {
                returned(&ctx, b.get_static_field(&type_name, &field, &descriptor))
            },
        )?,
    )?;

    let b = bridge.clone();
    globals.set(
        "setField",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>,
                  object: Value<'js>,
                  type_name: String,
                  field: String,
                  descriptor: String,
                  value: Value<'js>|
                  -> rquickjs::Result<Value<'js>> {
                let result = target(&object).and_then(|object| {
                    let ty = b.parse_field_type(&descriptor)?;
                    let value = from_js(&value, 0, &ty)?;
                    b.set_field(object, &type_name, &field, &descriptor, &value)?;
                    Ok(ScriptValue::Void)
                });
                returned(&ctx, result)
            },
        )?,
    )?;

    let b = bridge;
    globals.set(
        "releaseObject",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, object: Value<'js>| -> rquickjs::Result<Value<'js>> {
                let result = match target(&object) {
                    Ok(Some(object)) => b.release(object).map(ScriptValue::Bool),
                    Ok(None) => Ok(ScriptValue::Bool(false)),
                    Err(err) => Err(err),
                };
                returned(&ctx, result)
            },
        )?,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_follow_the_declared_slot() {
        assert_eq!(number_for(4.0, &TypeDesc::Int), ScriptValue::Int(4));
        assert_eq!(number_for(4.0, &TypeDesc::Long), ScriptValue::Long(4));
        assert_eq!(number_for(4.5, &TypeDesc::Int), ScriptValue::Double(4.5));
        assert_eq!(number_for(1.5, &TypeDesc::Float), ScriptValue::Float(1.5));
        assert_eq!(number_for(3e10, &TypeDesc::Int), ScriptValue::Double(3e10));
        assert_eq!(number_for(2.0, &TypeDesc::Boolean), ScriptValue::Double(2.0));
    }
}

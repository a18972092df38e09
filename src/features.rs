#[cfg(feature = "serde_json")]
use crate::{CodecError, Value};
#[cfg(feature = "serde_json")]
use serde_json::{Map, Number};

// --- serde_json::Value ---
/// Converts a [`Value`] into JSON.
///
/// Integers become JSON integers and floats JSON floats. Non-finite floats have no JSON
/// representation and become `null`.
#[cfg(feature = "serde_json")]
impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::U8(v) => v.into(),
            Value::U16(v) => v.into(),
            Value::U32(v) => v.into(),
            Value::I8(v) => v.into(),
            Value::I16(v) => v.into(),
            Value::I32(v) => v.into(),
            Value::F32(v) => float_to_json(v as f64),
            Value::F64(v) => float_to_json(v),
            Value::Str(s) => serde_json::Value::String(s),
            Value::List(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            Value::Map(map) => {
                let obj: Map<String, serde_json::Value> =
                    map.into_iter().map(|(k, v)| (k, v.into())).collect();
                serde_json::Value::Object(obj)
            }
        }
    }
}

#[cfg(feature = "serde_json")]
fn float_to_json(v: f64) -> serde_json::Value {
    Number::from_f64(v).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

/// Converts JSON into a [`Value`].
///
/// Integers that fit `u32` become [`Value::U32`], other integers that fit `i32` become
/// [`Value::I32`], and every other number becomes [`Value::F64`].
///
/// # Errors
/// Returns an error for integers outside both 32-bit ranges, which `Value` cannot hold
/// without losing precision.
#[cfg(feature = "serde_json")]
impl TryFrom<serde_json::Value> for Value {
    type Error = CodecError;

    fn try_from(json: serde_json::Value) -> Result<Self, Self::Error> {
        Ok(match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => number_from_json(&n)?,
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(arr) => Value::List(
                arr.into_iter()
                    .map(Value::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            serde_json::Value::Object(obj) => Value::Map(
                obj.into_iter()
                    .map(|(k, v)| Ok((k, Value::try_from(v)?)))
                    .collect::<Result<_, CodecError>>()?,
            ),
        })
    }
}

#[cfg(feature = "serde_json")]
fn number_from_json(n: &Number) -> Result<Value, CodecError> {
    if let Some(u) = n.as_u64() {
        return u32::try_from(u)
            .map(Value::U32)
            .map_err(|_| CodecError::Encode(format!("JSON integer {} exceeds u32", u)));
    }
    if let Some(i) = n.as_i64() {
        return i32::try_from(i)
            .map(Value::I32)
            .map_err(|_| CodecError::Encode(format!("JSON integer {} exceeds i32", i)));
    }
    n.as_f64()
        .map(Value::F64)
        .ok_or_else(|| CodecError::Encode(format!("Unsupported JSON number {}", n)))
}

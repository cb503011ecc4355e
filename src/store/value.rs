//! Firestore REST value decoding.
//!
//! The REST API wraps every value in a single-key object naming its type,
//! e.g. `{"integerValue": "10"}` or `{"mapValue": {"fields": {...}}}`.
//! These are unwrapped into plain JSON so the rest of the crate never sees
//! the wire encoding.

use serde_json::{json, Map, Value};

use crate::error::FetchError;
use crate::trial::FieldMap;

/// Decode a document's `fields` object.
pub fn decode_fields(fields: &Map<String, Value>) -> Result<FieldMap, FetchError> {
    let mut out = Map::with_capacity(fields.len());
    for (name, typed) in fields {
        let value = decode_value(typed).map_err(|e| match e {
            FetchError::Decode(msg) => FetchError::Decode(format!("field `{}`: {}", name, msg)),
            other => other,
        })?;
        out.insert(name.clone(), value);
    }
    Ok(out)
}

pub fn decode_value(typed: &Value) -> Result<Value, FetchError> {
    let obj = typed
        .as_object()
        .ok_or_else(|| FetchError::Decode(format!("expected a typed value, got {}", typed)))?;
    let (kind, inner) = obj
        .iter()
        .next()
        .ok_or_else(|| FetchError::Decode("empty typed value".to_string()))?;

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => inner
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| bad(kind, inner)),
        // int64 travels as a decimal string
        "integerValue" => match inner {
            Value::String(s) => s
                .parse::<i64>()
                .map(|i| json!(i))
                .map_err(|_| bad(kind, inner)),
            Value::Number(n) if n.is_i64() => Ok(inner.clone()),
            _ => Err(bad(kind, inner)),
        },
        "doubleValue" => match inner {
            Value::Number(_) => Ok(inner.clone()),
            // NaN and the infinities have no JSON number form
            Value::String(s) if matches!(s.as_str(), "NaN" | "Infinity" | "-Infinity") => {
                Ok(Value::Null)
            }
            _ => Err(bad(kind, inner)),
        },
        "stringValue" | "timestampValue" | "bytesValue" | "referenceValue" => match inner {
            Value::String(_) => Ok(inner.clone()),
            _ => Err(bad(kind, inner)),
        },
        "geoPointValue" => {
            let lat = inner.get("latitude").and_then(Value::as_f64).unwrap_or(0.0);
            let lng = inner.get("longitude").and_then(Value::as_f64).unwrap_or(0.0);
            Ok(json!({"latitude": lat, "longitude": lng}))
        }
        "arrayValue" => {
            // an empty array is sent as `{}`
            let values = match inner.get("values") {
                None => return Ok(Value::Array(Vec::new())),
                Some(Value::Array(values)) => values,
                Some(other) => return Err(bad(kind, other)),
            };
            values
                .iter()
                .map(decode_value)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        "mapValue" => match inner.get("fields") {
            None => Ok(Value::Object(Map::new())),
            Some(Value::Object(fields)) => decode_fields(fields).map(Value::Object),
            Some(other) => Err(bad(kind, other)),
        },
        other => Err(FetchError::Decode(format!("unknown value type `{}`", other))),
    }
}

fn bad(kind: &str, inner: &Value) -> FetchError {
    FetchError::Decode(format!("invalid {}: {}", kind, inner))
}

//! Conversion between plain JSON and Firestore's tagged field values
//!
//! Encoding checks string and boolean before any numeric coercion, so a
//! boolean never becomes `integerValue` and an integer never becomes
//! `booleanValue`. Numbers with no fractional part inside the safe-integer
//! range become `integerValue`; every other number is `doubleValue`.
//!
//! Decoding looks at the tags in a fixed order (string, integer, boolean,
//! double, timestamp, map, array, null) and uses the first one present.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};

use crate::error::CodecError;
use crate::models::{ArrayValue, Fields, FirestoreValue, MapValue};

/// Largest integer a double can carry without losing precision (2^53 - 1).
pub const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_991;

fn is_safe_integer(i: i64) -> bool {
    (-MAX_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(&i)
}

/// Encode one JSON value. `key` names the field in errors.
pub fn encode_value(key: &str, value: &Value) -> Result<FirestoreValue, CodecError> {
    match value {
        Value::String(s) => Ok(FirestoreValue {
            string_value: Some(s.clone()),
            ..Default::default()
        }),
        Value::Bool(b) => Ok(FirestoreValue {
            boolean_value: Some(*b),
            ..Default::default()
        }),
        Value::Number(n) => Ok(encode_number(n)),
        Value::Object(obj) => Ok(FirestoreValue {
            map_value: Some(MapValue {
                fields: encode_map(Some(key), obj)?,
            }),
            ..Default::default()
        }),
        Value::Array(items) => {
            let values = items
                .iter()
                .enumerate()
                .map(|(i, item)| encode_value(&format!("{}[{}]", key, i), item))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(FirestoreValue {
                array_value: Some(ArrayValue { values }),
                ..Default::default()
            })
        }
        Value::Null => Err(CodecError::UnsupportedFieldType {
            key: key.to_string(),
        }),
    }
}

fn encode_number(n: &Number) -> FirestoreValue {
    let integer = if let Some(i) = n.as_i64() {
        is_safe_integer(i).then_some(i)
    } else if n.is_u64() {
        // Above i64::MAX, certainly outside the safe range
        None
    } else {
        n.as_f64().and_then(|f| {
            (f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER as f64).then_some(f as i64)
        })
    };

    match integer {
        Some(i) => FirestoreValue {
            integer_value: Some(i.to_string()),
            ..Default::default()
        },
        None => FirestoreValue {
            double_value: n.as_f64(),
            ..Default::default()
        },
    }
}

fn encode_map(prefix: Option<&str>, obj: &Map<String, Value>) -> Result<Fields, CodecError> {
    obj.iter()
        .map(|(k, v)| {
            let path = match prefix {
                Some(p) => format!("{}.{}", p, k),
                None => k.clone(),
            };
            encode_value(&path, v).map(|encoded| (k.clone(), encoded))
        })
        .collect()
}

/// Encode a JSON object into a document field map.
pub fn encode_fields(obj: &Map<String, Value>) -> Result<Fields, CodecError> {
    encode_map(None, obj)
}

/// Encode any serializable record into a document field map.
pub fn encode_document<T: Serialize>(doc: &T) -> Result<Fields, CodecError> {
    match serde_json::to_value(doc)? {
        Value::Object(obj) => encode_fields(&obj),
        _ => Err(CodecError::NotAnObject),
    }
}

/// Decode one tagged value. A value with no tag decodes to `null`.
pub fn decode_value(value: &FirestoreValue) -> Result<Value, CodecError> {
    if let Some(s) = &value.string_value {
        return Ok(Value::String(s.clone()));
    }
    if let Some(raw) = &value.integer_value {
        let i: i64 = raw
            .trim()
            .parse()
            .map_err(|_| CodecError::MalformedInteger { value: raw.clone() })?;
        return Ok(Value::Number(i.into()));
    }
    if let Some(b) = value.boolean_value {
        return Ok(Value::Bool(b));
    }
    if let Some(d) = value.double_value {
        return Ok(decode_double(d));
    }
    if let Some(ts) = &value.timestamp_value {
        return Ok(Value::String(ts.clone()));
    }
    if let Some(map) = &value.map_value {
        return decode_fields(&map.fields).map(Value::Object);
    }
    if let Some(array) = &value.array_value {
        return array
            .values
            .iter()
            .map(decode_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array);
    }
    Ok(Value::Null)
}

/// NaN and the infinities have no JSON number form; they keep the string
/// spelling the REST API uses for them.
fn decode_double(d: f64) -> Value {
    match Number::from_f64(d) {
        Some(n) => Value::Number(n),
        None if d.is_nan() => Value::String("NaN".to_string()),
        None if d > 0.0 => Value::String("Infinity".to_string()),
        None => Value::String("-Infinity".to_string()),
    }
}

/// Unwrap every value of a field map into one JSON object.
pub fn decode_fields(fields: &Fields) -> Result<Map<String, Value>, CodecError> {
    fields
        .iter()
        .map(|(k, v)| decode_value(v).map(|decoded| (k.clone(), decoded)))
        .collect()
}

/// Decode a field map into a typed record.
///
/// An empty field map is an absent document and yields `None`.
pub fn decode_document<T: DeserializeOwned>(fields: &Fields) -> Result<Option<T>, CodecError> {
    if fields.is_empty() {
        return Ok(None);
    }
    let obj = decode_fields(fields)?;
    Ok(Some(serde_json::from_value(Value::Object(obj))?))
}

//! Text codec for schemas.
//!
//! Embedded patterns travel as the sentinel string
//! `regexp____<source>____<flags>`; `parse` turns every such string back into a
//! pattern.

use serde::de::DeserializeOwned;

use crate::error::CodecError;
use crate::format::Pattern;
use crate::value::Value;

pub fn stringify(schema: &Value) -> Result<String, CodecError> {
    Ok(serde_json::to_string(schema)?)
}

pub fn stringify_pretty(schema: &Value) -> Result<String, CodecError> {
    Ok(serde_json::to_string_pretty(schema)?)
}

/// Parse schema text, reviving sentinel strings into patterns. A sentinel
/// whose body does not compile stays a plain string.
pub fn parse(text: &str) -> Result<Value, CodecError> {
    let json: serde_json::Value = from_str_with_path(text)?;
    Ok(revive(Value::from(json)))
}

/// Deserialize with the JSON path of the failure in the error.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, CodecError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    let value = serde_path_to_error::deserialize::<_, T>(&mut *de).map_err(|err| CodecError::Syntax {
        path: err.path().to_string(),
        source: err.into_inner(),
    })?;
    de.end().map_err(|source| CodecError::Syntax {
        path: ".".to_string(),
        source,
    })?;
    Ok(value)
}

fn revive(value: Value) -> Value {
    match value {
        Value::String(s) => match Pattern::from_sentinel(&s) {
            Some(Ok(pattern)) => Value::Pattern(pattern),
            Some(Err(error)) => {
                tracing::warn!(%error, text = %s, "sentinel does not hold a valid pattern; kept as text");
                Value::String(s)
            }
            None => Value::String(s),
        },
        Value::Array(xs) => Value::Array(xs.into_iter().map(revive).collect()),
        Value::Object(m) => Value::Object(m.into_iter().map(|(k, v)| (k, revive(v))).collect()),
        other => other,
    }
}

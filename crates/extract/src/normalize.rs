//! Key-casing normalization for ACME documents.
//!
//! Different proxy releases wrote the same fields as `Domain`/`domain`,
//! `PrivateKey`/`privatekey` and so on. Lower-casing every mapping key once
//! lets the record builder look fields up by a single spelling.

use serde_json::{Map, Value};

use crate::error::ExtractError;

/// Rebuild `node` with every mapping key lower-cased, recursively.
///
/// Scalars pass through unchanged. When two keys differ only in case the
/// last one in iteration order wins.
pub fn lowercase_keys(node: &Value) -> Value {
    match node {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                out.insert(key.to_lowercase(), lowercase_keys(value));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(lowercase_keys).collect()),
        scalar => scalar.clone(),
    }
}

/// Normalize a certificate collection into a list of records.
///
/// The collection must be a sequence; anything else means the document does
/// not follow any known layout and the pass cannot identify its records.
pub fn normalize_collection(location: &str, node: &Value) -> Result<Vec<Value>, ExtractError> {
    match node {
        Value::Array(items) => Ok(items.iter().map(lowercase_keys).collect()),
        other => Err(ExtractError::UnsupportedShape {
            location: location.to_string(),
            found: shape_name(other),
        }),
    }
}

/// Human readable JSON type name.
pub(crate) fn shape_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

//! Point identity and payload conversion helpers

use qdrant_client::qdrant::Value;
use qdrant_client::qdrant::value::Kind;
use std::collections::HashMap;
use uuid::Uuid;

use sr_core::{IndexedChunk, PropertyMap, chunk_properties};

/// Stable point id for a chunk: re-ingesting the same section of the same
/// document overwrites its point instead of duplicating it.
pub fn point_id(chunk: &IndexedChunk) -> String {
    let mut key = chunk.metadata.name.clone();
    key.push('\u{1f}');
    key.push_str(&chunk.content);
    Uuid::from_bytes(md5::compute(key.as_bytes()).0).to_string()
}

/// Qdrant payload for a chunk
pub fn to_payload(chunk: &IndexedChunk) -> HashMap<String, Value> {
    chunk_properties(chunk)
        .into_iter()
        .map(|(key, value)| (key, json_to_value(value)))
        .collect()
}

/// Flatten a Qdrant payload back into a JSON property map
pub fn from_payload(payload: HashMap<String, Value>) -> PropertyMap {
    payload
        .into_iter()
        .map(|(key, value)| (key, value_to_json(value)))
        .collect()
}

fn json_to_value(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Bool(b) => Value::from(b),
        serde_json::Value::String(s) => Value::from(s),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::from(i),
            None => Value::from(n.as_f64().unwrap_or_default()),
        },
        // chunk properties are flat scalars
        other => Value::from(other.to_string()),
    }
}

fn value_to_json(value: Value) -> serde_json::Value {
    match value.kind {
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(b),
        Some(Kind::StringValue(s)) => serde_json::Value::String(s),
        Some(Kind::IntegerValue(i)) => serde_json::Value::from(i),
        Some(Kind::DoubleValue(d)) => serde_json::Value::from(d),
        Some(Kind::ListValue(list)) => {
            serde_json::Value::Array(list.values.into_iter().map(value_to_json).collect())
        }
        Some(Kind::StructValue(object)) => serde_json::Value::Object(
            object
                .fields
                .into_iter()
                .map(|(key, value)| (key, value_to_json(value)))
                .collect(),
        ),
        Some(Kind::NullValue(_)) | None => serde_json::Value::Null,
    }
}

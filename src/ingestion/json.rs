//! JSON record reader.
//!
//! Supported inputs:
//! - A JSON array of objects: `[{"a":1}, {"a":2}]`
//! - A single JSON object
//! - Newline-delimited JSON (NDJSON): `{"a":1}\n{"a":2}\n`
//!
//! Objects are flattened into [`RawRecord`]s: nested objects become dot paths (`user.name`),
//! strings are taken as-is, numbers/booleans/arrays are rendered as JSON text and `null` leaves
//! the key absent.

use std::fs;
use std::path::Path;

use crate::error::{IngestionError, IngestionResult};
use crate::types::RawRecord;

/// Read all records from a JSON or NDJSON file.
pub fn read_json_from_path(path: impl AsRef<Path>) -> IngestionResult<Vec<RawRecord>> {
    let text = fs::read_to_string(path)?;
    read_json_from_str(&text)
}

/// Read all records from in-memory JSON or NDJSON text.
pub fn read_json_from_str(input: &str) -> IngestionResult<Vec<RawRecord>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    // First try parsing as a single JSON value (array or object).
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(trimmed) {
        return match v {
            serde_json::Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| to_record(i, item))
                .collect(),
            serde_json::Value::Object(_) => Ok(vec![to_record(0, &v)?]),
            _ => Err(IngestionError::SchemaMismatch {
                message: "json must be an object, an array of objects, or NDJSON".to_string(),
            }),
        };
    }

    // Fall back to NDJSON.
    let mut records = Vec::new();
    for (i, line) in trimmed.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let v = serde_json::from_str::<serde_json::Value>(line).map_err(|e| {
            IngestionError::SchemaMismatch {
                message: format!("invalid ndjson at line {}: {}", i + 1, e),
            }
        })?;
        records.push(to_record(records.len(), &v)?);
    }
    Ok(records)
}

fn to_record(index: usize, value: &serde_json::Value) -> IngestionResult<RawRecord> {
    let serde_json::Value::Object(map) = value else {
        return Err(IngestionError::SchemaMismatch {
            message: format!("json record {index} is not an object"),
        });
    };
    let mut record = RawRecord::new();
    for (key, v) in map {
        flatten(key, v, &mut record);
    }
    Ok(record)
}

fn flatten(path: &str, value: &serde_json::Value, out: &mut RawRecord) {
    match value {
        serde_json::Value::Null => {}
        serde_json::Value::String(s) => {
            out.insert(path.to_string(), s.clone());
        }
        serde_json::Value::Object(map) => {
            for (key, v) in map {
                flatten(&format!("{path}.{key}"), v, out);
            }
        }
        other => {
            out.insert(path.to_string(), other.to_string());
        }
    }
}

//! Index entry key encoding.
//!
//! Entry keys are laid out as
//! `[index name][0x00][sortable sort-field values][0x00][document id]`, so a
//! prefix scan over one index returns its documents ordered by the sort
//! fields and then by id.

use serde_json::Value;

/// Separator between key sections.
const SEPARATOR: u8 = 0x00;

/// Get the current timestamp in microseconds since Unix epoch.
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or_default()
}

/// Prefix shared by all entries of one index.
pub fn index_prefix(index: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(index.len() + 1);
    key.extend_from_slice(index.as_bytes());
    key.push(SEPARATOR);
    key
}

/// Build the entry key of a document in an index.
///
/// Missing sort fields encode as `null` and sort first.
pub fn index_entry_key(index: &str, sort_values: &[Option<Value>], id: &str) -> Vec<u8> {
    let mut key = index_prefix(index);
    for value in sort_values {
        encode_value_sortable_into(value.as_ref().unwrap_or(&Value::Null), &mut key);
    }
    key.push(SEPARATOR);
    key.extend_from_slice(id.as_bytes());
    key
}

/// Encode a JSON value so that byte order matches value order within a type.
///
/// Types are ordered null < bool < number < string < array < object.
fn encode_value_sortable_into(value: &Value, buf: &mut Vec<u8>) {
    match value {
        Value::Null => buf.push(0x01),
        Value::Bool(b) => {
            buf.push(0x02);
            buf.push(if *b { 1 } else { 0 });
        }
        Value::Number(n) => {
            buf.push(0x03);
            let f = n.as_f64().unwrap_or_default();
            let bits = f.to_bits();
            // Negative: flip all bits. Positive: flip the sign bit.
            let sortable = if (bits & 0x8000_0000_0000_0000) != 0 {
                !bits
            } else {
                bits ^ 0x8000_0000_0000_0000
            };
            buf.extend_from_slice(&sortable.to_be_bytes());
        }
        Value::String(s) => {
            buf.push(0x04);
            buf.extend_from_slice(s.as_bytes());
            buf.push(SEPARATOR);
        }
        Value::Array(_) | Value::Object(_) => {
            // Compound values are grouped, not ordered.
            buf.push(0xFF);
        }
    }
}

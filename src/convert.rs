//! Bridge between `serde_json` documents and arena values.
//!
//! This is the in-process deep converter: embedders that already hold JSON
//! build conditions and records with [`json_to_value`], and recover plain
//! JSON from match results with [`value_to_json`]. Regex, pointer, and
//! opaque values have no JSON form and do not convert back.

use crate::arena::Arena;
use crate::value::{Value, ValueView};

/// Deep-converts a JSON document into an arena value.
pub fn json_to_value(arena: &Arena, json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => arena.null(),
        serde_json::Value::Bool(b) => arena.boolean(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => arena.int(i),
            None => arena.double(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => arena.string(s),
        serde_json::Value::Array(items) => {
            let array = arena.array_new();
            for item in items {
                array.push(&json_to_value(arena, item));
            }
            array
        }
        serde_json::Value::Object(map) => {
            let table = arena.table_new();
            for (key, item) in map {
                table.table_set(key, &json_to_value(arena, item));
            }
            table
        }
    }
}

/// Recovers a JSON document from an arena value. Returns `None` for kinds
/// with no JSON form.
pub fn value_to_json(value: &Value) -> Option<serde_json::Value> {
    match value.view() {
        ValueView::Null => Some(serde_json::Value::Null),
        ValueView::Bool(b) => Some(serde_json::Value::Bool(b)),
        ValueView::Int(i) => Some(serde_json::Value::from(i)),
        ValueView::Double(d) => serde_json::Number::from_f64(d).map(serde_json::Value::Number),
        ValueView::Str(s) => Some(serde_json::Value::from(s.as_ref())),
        ValueView::Array => {
            let mut items = Vec::with_capacity(value.len());
            for index in 0..value.len() {
                match value.get(index) {
                    Some(item) => items.push(value_to_json(&item)?),
                    None => items.push(serde_json::Value::Null),
                }
            }
            Some(serde_json::Value::Array(items))
        }
        ValueView::Table => {
            let mut map = serde_json::Map::new();
            for (key, item) in value.table_entries() {
                map.insert(key.to_string(), value_to_json(&item)?);
            }
            Some(serde_json::Value::Object(map))
        }
        ValueView::Regex(_) | ValueView::Pointer(_) | ValueView::Opaque(_) => None,
    }
}

//! Attribute value formatting
//!
//! Converts plain JSON values into the typed attribute values the service
//! expects (`{"S": "clip"}`, `{"N": "1234"}`, ...).

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Target shape of a formatted attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeFormat {
    /// Bare attribute value, used for `Item` and `Key`
    #[default]
    Put,
    /// Wrapped as `{"Value": ...}`, used for `AttributeUpdates`
    Update,
}

fn number_string(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn typed_value(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(json!({ "S": s })),
        Value::Number(n) => Some(json!({ "N": n.to_string() })),
        Value::Bool(b) => Some(json!({ "N": if *b { "1" } else { "0" } })),
        Value::Array(items) if items.is_empty() => None,
        Value::Array(items) => {
            if let Some(numbers) = items.iter().map(number_string).collect::<Option<Vec<_>>>() {
                return Some(json!({ "NS": numbers }));
            }

            let strings = items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()?;
            Some(json!({ "SS": strings }))
        }
        // Already an attribute value
        Value::Object(map) if map.is_empty() => None,
        Value::Object(_) => Some(value.clone()),
    }
}

/// Format one value; `None` means the attribute is skipped
///
/// Null, empty strings and empty arrays have no attribute representation.
/// Arrays of numbers become number sets, other scalar arrays string sets.
pub fn format_value(value: &Value, format: AttributeFormat) -> Option<Value> {
    let typed = typed_value(value)?;

    match format {
        AttributeFormat::Put => Some(typed),
        AttributeFormat::Update => {
            let already_wrapped = typed
                .as_object()
                .map(|map| map.contains_key("Value") || map.contains_key("Action"))
                .unwrap_or(false);

            if already_wrapped {
                Some(typed)
            } else {
                Some(json!({ "Value": typed }))
            }
        }
    }
}

/// Format every entry of `values`, dropping the skipped ones
pub fn format_attributes(values: &Map<String, Value>, format: AttributeFormat) -> Map<String, Value> {
    values
        .iter()
        .filter_map(|(name, value)| format_value(value, format).map(|formatted| (name.clone(), formatted)))
        .collect()
}

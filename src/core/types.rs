//! # Core Types
//!
//! Request and response shapes exchanged with remote service clients.
//!
//! Requests are JSON-shaped trees: mappings of named parameters, ordered
//! lists and scalar leaves. `serde_json::Value` already models exactly that,
//! including the distinction between `1` and `"1"`, so it is used directly.

use serde_json::{Map, Value};

/// Parameters of one remote operation (table name, key, projection, ...)
pub type RequestArguments = Value;

/// Structured response returned by a remote operation
pub type RemoteOperationResult = Value;

/// Small builder used by facades to assemble request arguments.
///
/// Optional parameters are only written when present so that two calls that
/// differ only in omitted defaults produce identical requests (and identical
/// cache keys).
#[derive(Debug, Default, Clone)]
pub struct ArgumentsBuilder {
    map: Map<String, Value>,
}

impl ArgumentsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always set `name`
    pub fn set<V: Into<Value>>(mut self, name: &str, value: V) -> Self {
        self.map.insert(name.to_string(), value.into());
        self
    }

    /// Set `name` only when a value is given
    pub fn set_opt<V: Into<Value>>(self, name: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.set(name, value),
            None => self,
        }
    }

    /// Set `name` only when the value is not an empty container
    pub fn set_non_empty(self, name: &str, value: Value) -> Self {
        if is_empty_container(&value) {
            self
        } else {
            self.set(name, value)
        }
    }

    pub fn build(self) -> RequestArguments {
        Value::Object(self.map)
    }
}

/// `true` for `null`, `{}` and `[]`
pub fn is_empty_container(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_skips_absent_and_empty_values() {
        let args = ArgumentsBuilder::new()
            .set("TableName", "videos")
            .set_opt::<i64>("Limit", None)
            .set_opt("ExclusiveStartTableName", Some("clips"))
            .set_non_empty("AttributesToGet", json!([]))
            .set_non_empty("Expected", json!({}))
            .build();

        assert_eq!(
            args,
            json!({"TableName": "videos", "ExclusiveStartTableName": "clips"})
        );
    }

    #[test]
    fn test_empty_containers() {
        assert!(is_empty_container(&Value::Null));
        assert!(is_empty_container(&json!({})));
        assert!(is_empty_container(&json!([])));
        assert!(!is_empty_container(&json!("")));
        assert!(!is_empty_container(&json!([1])));
    }
}

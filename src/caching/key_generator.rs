//! # Cache Key Generator
//!
//! Turns request arguments into a stable cache key so that logically
//! identical requests hit the same entry.
//!
//! Canonicalization builds a new [`CanonicalValue`] tree bottom-up:
//! - objects become mappings sorted by key
//! - arrays become lists sorted by the encoding of their elements, with
//!   structural elements (nested objects/arrays) first replaced by the
//!   digest of their own canonical encoding
//!
//! The tree is then written with a type-tagged, length-prefixed encoding and
//! digested with SHA-256. The caller's arguments are never touched.

use crate::core::types::RequestArguments;
use serde_json::{Number, Value};
use sha2::{Digest, Sha256};
use std::fmt;

/// Canonical form of a request argument tree
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    /// Surrogate for a structure found at a list position
    Digest(String),
    /// Entries sorted by key
    Map(Vec<(String, CanonicalValue)>),
    /// Elements sorted by encoding
    List(Vec<CanonicalValue>),
}

impl CanonicalValue {
    /// Deterministic byte encoding of this value
    ///
    /// Every variant carries its own tag and every variable-length part is
    /// length-prefixed, so `1` and `"1"`, `{}` and `[]`, or a digest and a
    /// string holding the same hex never encode alike.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64);
        self.encode_into(&mut buf);
        buf
    }

    fn encode_into(&self, buf: &mut Vec<u8>) {
        match self {
            Self::Null => buf.push(b'n'),
            Self::Bool(true) => buf.extend_from_slice(b"b1"),
            Self::Bool(false) => buf.extend_from_slice(b"b0"),
            Self::Int(i) => {
                buf.extend_from_slice(format!("i{};", i).as_bytes());
            }
            Self::UInt(u) => {
                buf.extend_from_slice(format!("i{};", u).as_bytes());
            }
            Self::Float(f) => {
                buf.extend_from_slice(format!("f{:?};", f).as_bytes());
            }
            Self::String(s) => encode_str(s, buf),
            Self::Digest(hex) => {
                buf.push(b'h');
                buf.extend_from_slice(hex.as_bytes());
                buf.push(b';');
            }
            Self::Map(entries) => {
                buf.extend_from_slice(format!("m{}:", entries.len()).as_bytes());
                for (key, value) in entries {
                    encode_str(key, buf);
                    value.encode_into(buf);
                }
            }
            Self::List(items) => {
                buf.extend_from_slice(format!("l{}:", items.len()).as_bytes());
                for item in items {
                    item.encode_into(buf);
                }
            }
        }
    }

    /// SHA-256 of the encoding, lowercase hex
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.encode()))
    }

    fn is_structure(&self) -> bool {
        matches!(self, Self::Map(_) | Self::List(_))
    }
}

fn encode_str(s: &str, buf: &mut Vec<u8>) {
    buf.extend_from_slice(format!("s{}:", s.len()).as_bytes());
    buf.extend_from_slice(s.as_bytes());
}

fn canonical_number(n: &Number) -> CanonicalValue {
    if let Some(i) = n.as_i64() {
        CanonicalValue::Int(i)
    } else if let Some(u) = n.as_u64() {
        CanonicalValue::UInt(u)
    } else {
        CanonicalValue::Float(n.as_f64().unwrap_or(f64::NAN))
    }
}

/// Build the canonical form of `value`
///
/// Container kind follows the JSON type: an array is a list and an object is
/// a mapping, even when every key of the object looks like an index.
pub fn canonicalize(value: &Value) -> CanonicalValue {
    match value {
        Value::Null => CanonicalValue::Null,
        Value::Bool(b) => CanonicalValue::Bool(*b),
        Value::Number(n) => canonical_number(n),
        Value::String(s) => CanonicalValue::String(s.clone()),
        Value::Object(map) => {
            let mut entries: Vec<(String, CanonicalValue)> = map
                .iter()
                .map(|(key, child)| (key.clone(), canonicalize(child)))
                .collect();
            entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
            CanonicalValue::Map(entries)
        }
        Value::Array(items) => {
            let mut elements: Vec<(Vec<u8>, CanonicalValue)> = items
                .iter()
                .map(|child| {
                    let canonical = canonicalize(child);
                    let element = if canonical.is_structure() {
                        CanonicalValue::Digest(canonical.digest())
                    } else {
                        canonical
                    };
                    (element.encode(), element)
                })
                .collect();
            elements.sort_by(|a, b| a.0.cmp(&b.0));
            CanonicalValue::List(elements.into_iter().map(|(_, element)| element).collect())
        }
    }
}

/// Format a cache key: `<prefix>_<digest>`, or the bare digest
pub fn format_key(prefix: Option<&str>, digest: &str) -> String {
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{}_{}", prefix, digest),
        _ => digest.to_string(),
    }
}

/// Cache key generator trait
pub trait KeyGenerator: Send + Sync {
    /// Generate a cache key for one request
    fn generate_key(&self, args: &RequestArguments) -> String;

    /// Generate a cache key under an explicit prefix instead of the
    /// generator's own
    fn generate_key_with_prefix(&self, args: &RequestArguments, prefix: Option<&str>) -> String;
}

/// Default key generator: canonicalize, digest, prefix
#[derive(Debug, Clone, Default)]
pub struct CanonicalKeyGenerator {
    prefix: Option<String>,
}

impl CanonicalKeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with key prefix
    pub fn with_prefix<P: Into<String>>(mut self, prefix: P) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }
}

impl KeyGenerator for CanonicalKeyGenerator {
    fn generate_key(&self, args: &RequestArguments) -> String {
        self.generate_key_with_prefix(args, self.prefix.as_deref())
    }

    fn generate_key_with_prefix(&self, args: &RequestArguments, prefix: Option<&str>) -> String {
        format_key(prefix, &canonicalize(args).digest())
    }
}

impl fmt::Display for CanonicalKeyGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "CanonicalKeyGenerator(prefix={})", prefix),
            None => write!(f, "CanonicalKeyGenerator"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(args: &Value) -> String {
        CanonicalKeyGenerator::new().generate_key(args)
    }

    #[test]
    fn test_mapping_key_order_does_not_matter() {
        let a: Value = serde_json::from_str(r#"{"TableName":"videos","Key":{"id":{"N":"1"}}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"Key":{"id":{"N":"1"}},"TableName":"videos"}"#).unwrap();
        assert_eq!(key(&a), key(&b));
    }

    #[test]
    fn test_scalar_list_order_does_not_matter() {
        let a = json!({"TableName": "videos", "AttributesToGet": ["title", "id", "duration"]});
        let b = json!({"TableName": "videos", "AttributesToGet": ["duration", "title", "id"]});
        assert_eq!(key(&a), key(&b));
    }

    #[test]
    fn test_nested_list_of_mappings_order_does_not_matter() {
        let a = json!({
            "RequestItems": {
                "videos": {"Keys": [{"id": {"N": "1"}}, {"id": {"N": "2"}, "rev": {"N": "7"}}]}
            }
        });
        let b = json!({
            "RequestItems": {
                "videos": {"Keys": [{"rev": {"N": "7"}, "id": {"N": "2"}}, {"id": {"N": "1"}}]}
            }
        });
        assert_eq!(key(&a), key(&b));
    }

    #[test]
    fn test_numbers_and_numeric_strings_differ() {
        assert_ne!(key(&json!({"a": 1})), key(&json!({"a": "1"})));
        assert_ne!(key(&json!({"a": 1})), key(&json!({"a": 1.0})));
        assert_ne!(key(&json!({"a": true})), key(&json!({"a": 1})));
        assert_ne!(key(&json!({"a": null})), key(&json!({"a": "n"})));
    }

    #[test]
    fn test_empty_mapping_and_empty_list_differ() {
        assert_ne!(key(&json!({"Key": {}})), key(&json!({"Key": []})));
        assert_ne!(key(&json!({})), key(&json!([])));
    }

    #[test]
    fn test_numeric_looking_object_is_still_a_mapping() {
        let object = json!({"0": "b", "1": "a"});
        let list = json!(["b", "a"]);
        assert_ne!(key(&object), key(&list));

        // Mapping values keep their positions; only keys are sorted
        assert_ne!(key(&json!({"0": "b", "1": "a"})), key(&json!({"0": "a", "1": "b"})));
    }

    #[test]
    fn test_digest_surrogate_differs_from_plain_string() {
        let nested = json!([{"id": 1}]);
        let surrogate = canonicalize(&json!({"id": 1})).digest();
        assert_ne!(key(&nested), key(&json!([surrogate])));
    }

    #[test]
    fn test_input_is_left_unchanged() {
        let args = json!({"b": [3, 1, 2], "a": [{"z": 1, "y": 2}]});
        let before = args.to_string();
        let _ = key(&args);
        assert_eq!(args.to_string(), before);
    }

    #[test]
    fn test_list_elements_are_sorted_and_structures_replaced() {
        let canonical = canonicalize(&json!([{"x": 1}, "b", "a"]));
        match canonical {
            CanonicalValue::List(items) => {
                assert_eq!(items.len(), 3);
                assert!(items.iter().any(|item| matches!(item, CanonicalValue::Digest(_))));
                let strings: Vec<&CanonicalValue> = items
                    .iter()
                    .filter(|item| matches!(item, CanonicalValue::String(_)))
                    .collect();
                assert_eq!(
                    strings,
                    vec![
                        &CanonicalValue::String("a".to_string()),
                        &CanonicalValue::String("b".to_string())
                    ]
                );
            }
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_prefix_format() {
        let args = json!({"TableName": "videos"});
        let bare = CanonicalKeyGenerator::new().generate_key(&args);
        let prefixed = CanonicalKeyGenerator::new().with_prefix("videos").generate_key(&args);

        assert_eq!(bare.len(), 64);
        assert!(bare.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(prefixed, format!("videos_{}", bare));
    }

    #[test]
    fn test_prefix_override() {
        let args = json!({"TableName": "videos"});
        let generator = CanonicalKeyGenerator::new().with_prefix("videos");
        let overridden = generator.generate_key_with_prefix(&args, Some("clips"));
        assert!(overridden.starts_with("clips_"));
        assert_eq!(generator.generate_key_with_prefix(&args, None).len(), 64);
    }

    #[test]
    fn test_empty_prefix_gives_bare_digest() {
        assert_eq!(format_key(Some(""), "abc"), "abc");
        assert_eq!(format_key(Some("p"), "abc"), "p_abc");
    }
}

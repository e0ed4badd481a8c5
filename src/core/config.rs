//! # Configuration Module
//!
//! Bundle configuration: credential sets, named service clients, key-value
//! store facades with their cache settings, command notification and logging.
//!
//! ## Key Features
//! - YAML/JSON configuration parsing with serde
//! - Environment variable override support
//! - Validation that reports every problem at once, including dangling
//!   references between sections

use crate::core::error::{BundleError, BundleResult};
use crate::observability::logging::{LogConfig, LogFormat};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Default cache TTL for key-value store reads: one day
pub const DEFAULT_CACHE_TTL_SECS: u64 = 86_400;

/// Main bundle configuration
///
/// ```yaml
/// credentials:
///   default:
///     key: AKIA...
///     secret: "..."
///     region: eu-west-1
/// clients:
///   videos:
///     credential: default
///     service: DynamoDb
/// dynamodb:
///   videos:
///     client: videos
///     cache:
///       service: memory
///       key_prefix: videos
///       ttl: 3600
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleConfig {
    /// Credential sets, by name
    #[serde(default)]
    pub credentials: BTreeMap<String, CredentialConfig>,

    /// Service clients, by name
    #[serde(default)]
    pub clients: BTreeMap<String, ClientConfig>,

    /// Key-value store facades, by name
    #[serde(default)]
    pub dynamodb: BTreeMap<String, DynamoDbConfig>,

    /// Command notification settings
    #[serde(default)]
    pub events: EventsConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LogConfig,
}

/// One credential set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialConfig {
    pub key: String,
    pub secret: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_region: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub curl_options: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub request_options: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub command_params: BTreeMap<String, Value>,
}

/// One named service client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Name of the credential set to use
    pub credential: String,

    /// Service alias understood by the client factory (`DynamoDb`, `Sqs`, ...)
    pub service: String,

    /// Region override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Endpoint override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// One key-value store facade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamoDbConfig {
    /// Name of the client it wraps
    pub client: String,

    /// Read cache; absent means pass-through
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<DynamoDbCacheConfig>,
}

/// Read cache settings for a key-value store facade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamoDbCacheConfig {
    /// Name of the cache store service
    pub service: String,

    /// Prefix prepended to every cache key
    #[serde(default)]
    pub key_prefix: Option<String>,

    /// Entry lifetime in seconds
    #[serde(default = "default_cache_ttl")]
    pub ttl: u64,
}

impl DynamoDbCacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl)
    }
}

fn default_cache_ttl() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

/// Command notification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Wrap every client in a timing proxy
    #[serde(default)]
    pub enabled: bool,

    /// Capacity of the broadcast channel subscribers read from
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl BundleConfig {
    /// Load configuration from a YAML file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> BundleResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| BundleError::config(format!("Failed to read config file: {}", e)))?;

        let mut config: BundleConfig = serde_yaml::from_str(&content)
            .map_err(|e| BundleError::config(format!("Failed to parse config: {}", e)))?;

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub async fn load_from_json<P: AsRef<Path>>(path: P) -> BundleResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| BundleError::config(format!("Failed to read config file: {}", e)))?;

        let mut config: BundleConfig = serde_json::from_str(&content)
            .map_err(|e| BundleError::config(format!("Failed to parse JSON config: {}", e)))?;

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file, picking the parser from the extension
    pub async fn load<P: AsRef<Path>>(path: P) -> BundleResult<Self> {
        let path = path.as_ref();
        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            Self::load_from_json(path).await
        } else {
            Self::load_from_file(path).await
        }
    }

    /// Parse and validate YAML text, without environment overrides
    pub fn from_yaml_str(content: &str) -> BundleResult<Self> {
        let config: BundleConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    ///
    /// Environment variables follow the pattern `AWS_BUNDLE_<FIELD>`.
    pub fn apply_env_overrides(&mut self) -> BundleResult<()> {
        use std::env;

        if let Ok(level) = env::var("AWS_BUNDLE_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(format) = env::var("AWS_BUNDLE_LOG_FORMAT") {
            self.logging.format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "text" => LogFormat::Text,
                other => {
                    return Err(BundleError::config(format!(
                        "Invalid AWS_BUNDLE_LOG_FORMAT: {}",
                        other
                    )))
                }
            };
        }

        if let Ok(ttl) = env::var("AWS_BUNDLE_DEFAULT_CACHE_TTL") {
            let ttl: u64 = ttl.parse().map_err(|e| {
                BundleError::config(format!("Invalid AWS_BUNDLE_DEFAULT_CACHE_TTL: {}", e))
            })?;
            for cache in self.dynamodb.values_mut().filter_map(|d| d.cache.as_mut()) {
                cache.ttl = ttl;
            }
        }

        if let Ok(enabled) = env::var("AWS_BUNDLE_EVENTS_ENABLED") {
            self.events.enabled = enabled.parse().map_err(|e| {
                BundleError::config(format!("Invalid AWS_BUNDLE_EVENTS_ENABLED: {}", e))
            })?;
        }

        Ok(())
    }

    /// Validate the configuration
    ///
    /// All problems are collected and returned in one configuration error.
    pub fn validate(&self) -> BundleResult<()> {
        let mut errors = Vec::new();

        if self.credentials.is_empty() {
            errors.push("At least one credential set must be configured".to_string());
        }

        if self.clients.is_empty() {
            errors.push("At least one client must be configured".to_string());
        }

        for (name, credential) in &self.credentials {
            for (field, value) in [
                ("key", &credential.key),
                ("secret", &credential.secret),
                ("region", &credential.region),
            ] {
                if value.trim().is_empty() {
                    errors.push(format!("Credential '{}' {} cannot be empty", name, field));
                }
            }
        }

        for (name, client) in &self.clients {
            if client.service.trim().is_empty() {
                errors.push(format!("Client '{}' service cannot be empty", name));
            }

            if client.credential.trim().is_empty() {
                errors.push(format!("Client '{}' credential cannot be empty", name));
            } else if !self.credentials.contains_key(&client.credential) {
                errors.push(format!(
                    "Client '{}' references unknown credential '{}'",
                    name, client.credential
                ));
            }
        }

        for (name, table) in &self.dynamodb {
            if table.client.trim().is_empty() {
                errors.push(format!("DynamoDB '{}' client cannot be empty", name));
            } else if !self.clients.contains_key(&table.client) {
                errors.push(format!(
                    "DynamoDB '{}' references unknown client '{}'",
                    name, table.client
                ));
            }

            if let Some(cache) = &table.cache {
                if cache.service.trim().is_empty() {
                    errors.push(format!("DynamoDB '{}' cache service cannot be empty", name));
                }
                if cache.ttl == 0 {
                    errors.push(format!("DynamoDB '{}' cache ttl must be greater than 0", name));
                }
            }
        }

        if self.events.channel_capacity == 0 {
            errors.push("events channel_capacity must be greater than 0".to_string());
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => errors.push(format!("Invalid log level: {}", self.logging.level)),
        }

        if !errors.is_empty() {
            return Err(BundleError::config(format!(
                "Configuration validation failed:\n{}",
                errors.join("\n")
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::env;
    use tempfile::TempDir;

    // Tests that read or write AWS_BUNDLE_* variables take this lock.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const SAMPLE: &str = r#"
credentials:
  default:
    key: AKIAEXAMPLE
    secret: shhh
    region: eu-west-1
    signature_service: dynamodb
    curl_options:
      timeout: 10
clients:
  videos:
    credential: default
    service: DynamoDb
    region: us-east-1
  queue:
    credential: default
    service: Sqs
dynamodb:
  videos:
    client: videos
    cache:
      service: memory
      key_prefix: videos
  raw:
    client: videos
"#;

    #[test]
    fn test_parse_sample_config() {
        let config = BundleConfig::from_yaml_str(SAMPLE).unwrap();

        assert_eq!(config.credentials.len(), 1);
        assert_eq!(config.clients["videos"].region.as_deref(), Some("us-east-1"));
        assert_eq!(
            config.credentials["default"].curl_options["timeout"],
            serde_json::json!(10)
        );

        let cache = config.dynamodb["videos"].cache.as_ref().unwrap();
        assert_eq!(cache.ttl, DEFAULT_CACHE_TTL_SECS);
        assert_eq!(cache.key_prefix.as_deref(), Some("videos"));
        assert!(config.dynamodb["raw"].cache.is_none());
        assert!(!config.events.enabled);
    }

    #[test]
    fn test_empty_sections_are_rejected() {
        let err = BundleConfig::from_yaml_str("{}").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("At least one credential set"));
        assert!(message.contains("At least one client"));
    }

    #[test]
    fn test_dangling_references_are_reported() {
        let yaml = r#"
credentials:
  default: { key: k, secret: s, region: "" }
clients:
  videos: { credential: other, service: DynamoDb }
dynamodb:
  videos:
    client: missing
    cache: { service: "", ttl: 0 }
"#;
        let message = BundleConfig::from_yaml_str(yaml).unwrap_err().to_string();

        assert!(message.contains("Credential 'default' region cannot be empty"));
        assert!(message.contains("references unknown credential 'other'"));
        assert!(message.contains("references unknown client 'missing'"));
        assert!(message.contains("cache service cannot be empty"));
        assert!(message.contains("cache ttl must be greater than 0"));
    }

    #[tokio::test]
    async fn test_load_config_from_yaml_and_json_files() {
        let _env = ENV_LOCK.lock();
        let temp_dir = TempDir::new().unwrap();

        let yaml_path = temp_dir.path().join("bundle.yaml");
        tokio::fs::write(&yaml_path, SAMPLE).await.unwrap();
        let from_yaml = BundleConfig::load(&yaml_path).await.unwrap();
        assert_eq!(from_yaml.dynamodb.len(), 2);

        let json_path = temp_dir.path().join("bundle.json");
        tokio::fs::write(&json_path, serde_json::to_string_pretty(&from_yaml).unwrap())
            .await
            .unwrap();
        let from_json = BundleConfig::load(&json_path).await.unwrap();
        assert_eq!(from_json.clients.len(), 2);
        assert_eq!(from_json.clients["queue"].service, "Sqs");
    }

    #[tokio::test]
    async fn test_missing_file_is_a_configuration_error() {
        let err = BundleConfig::load_from_file("/definitely/not/here.yaml")
            .await
            .unwrap_err();
        assert!(matches!(err, BundleError::Configuration { .. }));
    }

    #[test]
    fn test_environment_variable_overrides() {
        let _env = ENV_LOCK.lock();
        let mut config = BundleConfig::from_yaml_str(SAMPLE).unwrap();

        env::set_var("AWS_BUNDLE_LOG_LEVEL", "debug");
        env::set_var("AWS_BUNDLE_DEFAULT_CACHE_TTL", "60");
        env::set_var("AWS_BUNDLE_EVENTS_ENABLED", "true");
        config.apply_env_overrides().unwrap();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.dynamodb["videos"].cache.as_ref().unwrap().ttl, 60);
        assert!(config.events.enabled);

        env::set_var("AWS_BUNDLE_DEFAULT_CACHE_TTL", "soon");
        let result = config.apply_env_overrides();
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Invalid AWS_BUNDLE_DEFAULT_CACHE_TTL"));

        env::remove_var("AWS_BUNDLE_LOG_LEVEL");
        env::remove_var("AWS_BUNDLE_DEFAULT_CACHE_TTL");
        env::remove_var("AWS_BUNDLE_EVENTS_ENABLED");
    }
}

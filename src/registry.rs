//! # Bundle Registry
//!
//! Turns a [`BundleConfig`] into ready-to-use clients: one remote client per
//! `clients` entry (built by a [`RemoteClientFactory`]) and one
//! [`DynamoDbClient`] facade per `dynamodb` entry, with its read cache wired
//! to a named [`CacheStore`].
//!
//! When events are enabled, every remote client is wrapped in an
//! [`InstrumentedClient`] that reports `<service>.command` events to the
//! registry's broadcast channel and to the log.

use crate::caching::{CacheSettings, CacheStore};
use crate::core::config::{BundleConfig, ClientConfig, CredentialConfig};
use crate::core::error::{BundleError, BundleResult};
use crate::dynamodb::DynamoDbClient;
use crate::events::{
    BroadcastDispatcher, CommandEvent, EventDispatcher, InstrumentedClient, MultiDispatcher,
    TracingDispatcher,
};
use crate::remote::RemoteServiceClient;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Parameter names written with `_` in configuration and `.` by the SDK
pub const ALIAS_KEYS: &[&str] = &[
    "signature_service",
    "signature_region",
    "curl_options",
    "request_options",
    "command_params",
];

/// Rename alias keys (`curl_options` -> `curl.options`), leave others as is
pub fn filter_alias_key(name: &str) -> String {
    if ALIAS_KEYS.contains(&name) {
        name.replace('_', ".")
    } else {
        name.to_string()
    }
}

/// Everything a factory needs to build one service client
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientParams {
    /// Service alias, e.g. `DynamoDb`
    pub service: String,
    /// SDK parameters with alias keys already renamed
    pub params: BTreeMap<String, Value>,
}

impl ClientParams {
    /// Merge a credential set with the client's own overrides
    pub fn from_config(client: &ClientConfig, credential: &CredentialConfig) -> Self {
        let mut raw: Vec<(&str, Value)> = vec![
            ("key", Value::from(credential.key.clone())),
            ("secret", Value::from(credential.secret.clone())),
            ("region", Value::from(credential.region.clone())),
        ];

        let optional = [
            ("scheme", &credential.scheme),
            ("base_url", &credential.base_url),
            ("signature", &credential.signature),
            ("signature_service", &credential.signature_service),
            ("signature_region", &credential.signature_region),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                raw.push((name, Value::from(value.clone())));
            }
        }

        let maps = [
            ("curl_options", &credential.curl_options),
            ("request_options", &credential.request_options),
            ("command_params", &credential.command_params),
        ];
        for (name, map) in maps {
            if !map.is_empty() {
                let object = map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                raw.push((name, Value::Object(object)));
            }
        }

        if let Some(region) = &client.region {
            raw.push(("region", Value::from(region.clone())));
        }
        if let Some(base_url) = &client.base_url {
            raw.push(("base_url", Value::from(base_url.clone())));
        }

        // Later entries win, so client overrides replace credential values
        let params = raw
            .into_iter()
            .map(|(name, value)| (filter_alias_key(name), value))
            .collect();

        Self {
            service: client.service.clone(),
            params,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    pub fn region(&self) -> Option<&str> {
        self.get("region").and_then(Value::as_str)
    }

    /// Parameters with the secret masked, for display
    pub fn redacted(&self) -> BTreeMap<String, Value> {
        let mut params = self.params.clone();
        if params.contains_key("secret") {
            params.insert("secret".to_string(), Value::from("****"));
        }
        params
    }
}

/// Builds remote clients for named services
#[async_trait]
pub trait RemoteClientFactory: Send + Sync {
    async fn create(&self, params: &ClientParams) -> BundleResult<Arc<dyn RemoteServiceClient>>;
}

/// Event name used for a service: `DynamoDb` -> `dynamodb.command`
pub fn event_name_for(service: &str) -> String {
    format!("{}.command", service.to_lowercase())
}

/// Wired clients, by name
pub struct BundleRegistry {
    clients: BTreeMap<String, Arc<dyn RemoteServiceClient>>,
    dynamodb: BTreeMap<String, DynamoDbClient>,
    events: Option<Arc<BroadcastDispatcher>>,
}

impl BundleRegistry {
    /// Validate `config` and build every client it declares
    pub async fn build(
        config: &BundleConfig,
        factory: &dyn RemoteClientFactory,
        caches: &HashMap<String, Arc<dyn CacheStore>>,
    ) -> BundleResult<Self> {
        config.validate()?;

        let events = if config.events.enabled {
            Some(Arc::new(BroadcastDispatcher::new(config.events.channel_capacity)))
        } else {
            None
        };
        let dispatcher: Option<Arc<dyn EventDispatcher>> = events.as_ref().map(|broadcast| {
            let broadcast: Arc<dyn EventDispatcher> = broadcast.clone();
            Arc::new(
                MultiDispatcher::new()
                    .with(broadcast)
                    .with(Arc::new(TracingDispatcher)),
            ) as Arc<dyn EventDispatcher>
        });

        let mut clients = BTreeMap::new();
        for (name, client_config) in &config.clients {
            let credential = config
                .credentials
                .get(&client_config.credential)
                .ok_or_else(|| BundleError::unknown("credential", &client_config.credential))?;

            let params = ClientParams::from_config(client_config, credential);
            let client = factory.create(&params).await?;

            let client = match &dispatcher {
                Some(dispatcher) => {
                    let event_name = event_name_for(&client_config.service);
                    debug!(client = %name, event = %event_name, "Instrumenting client");
                    Arc::new(
                        InstrumentedClient::new(client, event_name).with_dispatcher(dispatcher.clone()),
                    ) as Arc<dyn RemoteServiceClient>
                }
                None => client,
            };

            info!(client = %name, service = %client_config.service, region = ?params.region(), "Client registered");
            clients.insert(name.clone(), client);
        }

        let mut dynamodb = BTreeMap::new();
        for (name, table_config) in &config.dynamodb {
            let client = clients
                .get(&table_config.client)
                .cloned()
                .ok_or_else(|| BundleError::unknown("client", &table_config.client))?;

            let mut facade = DynamoDbClient::new(client);
            if let Some(cache) = &table_config.cache {
                let store = caches
                    .get(&cache.service)
                    .cloned()
                    .ok_or_else(|| BundleError::unknown("cache service", &cache.service))?;

                facade = facade.with_cache(
                    store,
                    CacheSettings::new(Some(cache.ttl()), cache.key_prefix.clone()),
                );
                info!(
                    dynamodb = %name,
                    cache = %cache.service,
                    ttl_secs = cache.ttl,
                    key_prefix = ?cache.key_prefix,
                    "DynamoDB read cache enabled"
                );
            }

            dynamodb.insert(name.clone(), facade);
        }

        Ok(Self {
            clients,
            dynamodb,
            events,
        })
    }

    /// Remote client registered as `name`
    pub fn client(&self, name: &str) -> BundleResult<Arc<dyn RemoteServiceClient>> {
        self.clients
            .get(name)
            .cloned()
            .ok_or_else(|| BundleError::unknown("client", name))
    }

    /// DynamoDB facade registered as `name`
    pub fn dynamodb(&self, name: &str) -> BundleResult<&DynamoDbClient> {
        self.dynamodb
            .get(name)
            .ok_or_else(|| BundleError::unknown("dynamodb", name))
    }

    pub fn client_names(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }

    pub fn dynamodb_names(&self) -> impl Iterator<Item = &str> {
        self.dynamodb.keys().map(String::as_str)
    }

    /// Subscribe to command events; `None` when events are disabled
    pub fn subscribe(&self) -> Option<broadcast::Receiver<(String, CommandEvent)>> {
        self.events.as_ref().map(|events| events.subscribe())
    }
}

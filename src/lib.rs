//! # AWS Bundle Library
//!
//! Service-client wiring for AWS-style key-value stores and queues, with a
//! read-through cache for item reads and timing events for every command.
//!
//! ## Layout
//! - `core`: errors, configuration and the request/response value types
//! - `remote`: the `RemoteServiceClient` capability the SDK transport implements
//! - `caching`: cache-key canonicalization, cache stores and the read-through wrapper
//! - `dynamodb`: the DynamoDB facade that assembles request arguments
//! - `events`: command events and the timing proxy
//! - `registry`: configuration-driven construction of named clients
//! - `observability`: logging setup

/// Core functionality: error types, configuration and request/response values
pub mod core;

/// Remote service client capability and its error type
pub mod remote;

/// Cache-key canonicalization, cache stores and the read-through wrapper
pub mod caching;

/// DynamoDB facade: argument assembly and attribute formatting
pub mod dynamodb;

/// Command events, dispatchers and the timing proxy
pub mod events;

/// Logging initialisation
pub mod observability;

/// Named clients built from a `BundleConfig`
pub mod registry;

/// Main error type used throughout the bundle
pub use core::error::{BundleError, BundleResult};

/// Bundle configuration
pub use core::config::BundleConfig;

pub use core::types::{RemoteOperationResult, RequestArguments};

pub use caching::{CacheSettings, CacheStore, CanonicalKeyGenerator, InMemoryCache, ReadThroughCache};

pub use dynamodb::DynamoDbClient;

pub use events::{CommandEvent, EventDispatcher, InstrumentedClient};

pub use registry::{BundleRegistry, ClientParams, RemoteClientFactory};

pub use remote::{RemoteServiceClient, RemoteServiceError};

//! # Error Handling Module
//!
//! Top-level error type for the bundle, built with `thiserror`.
//!
//! Every layer keeps its own error enum (`CacheError` for cache stores,
//! `RemoteServiceError` for service clients) and converts into
//! [`BundleError`] at the boundary. Remote errors are carried verbatim so a
//! caller can still match on the original error kind and code.

use crate::caching::CacheError;
use crate::remote::RemoteServiceError;
use thiserror::Error;

/// Main result type used throughout the bundle
pub type BundleResult<T> = Result<T, BundleError>;

/// Errors surfaced by the bundle
#[derive(Debug, Error)]
pub enum BundleError {
    /// Configuration-related errors (invalid config, missing files, dangling references)
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A client, table facade or cache service was requested by a name that was never wired
    #[error("Unknown {kind}: {name}")]
    UnknownService { kind: String, name: String },

    /// Error raised by the remote service client, never translated
    #[error(transparent)]
    Remote(#[from] RemoteServiceError),

    /// Cache store failure (unavailable store, eviction refused, ...)
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Response could not be serialized for storage or cached bytes could not be read back
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// I/O errors while reading configuration files
    #[error("I/O error: {message}")]
    Io { message: String },

    /// JSON parsing errors
    #[error("JSON error: {message}")]
    Json { message: String },

    /// YAML parsing errors for configuration files
    #[error("YAML error: {message}")]
    Yaml { message: String },
}

impl BundleError {
    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an unknown-service error
    pub fn unknown<K: Into<String>, N: Into<String>>(kind: K, name: N) -> Self {
        Self::UnknownService {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create a serialization error with a custom message
    pub fn serialization<S: Into<String>>(message: S) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// The remote error, when this error came from the service client
    pub fn as_remote(&self) -> Option<&RemoteServiceError> {
        match self {
            Self::Remote(err) => Some(err),
            _ => None,
        }
    }

    /// Whether the failure originated in the cache layer
    pub fn is_cache_failure(&self) -> bool {
        matches!(self, Self::Cache(_))
    }

    /// Check if this error should be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Remote(err) => err.is_retryable(),
            Self::Cache(CacheError::Unavailable) => true,
            Self::Io { .. } => true,
            _ => false,
        }
    }
}

impl From<std::io::Error> for BundleError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for BundleError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for BundleError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteErrorKind;

    #[test]
    fn test_remote_error_is_carried_verbatim() {
        let remote = RemoteServiceError::new(
            RemoteErrorKind::Throttling,
            "ProvisionedThroughputExceededException",
            "slow down",
        );
        let err: BundleError = remote.clone().into();

        assert_eq!(err.as_remote(), Some(&remote));
        assert_eq!(err.to_string(), remote.to_string());
        assert!(err.is_retryable());
    }

    #[test]
    fn test_cache_failure_detection() {
        let err: BundleError = CacheError::Unavailable.into();
        assert!(err.is_cache_failure());
        assert!(err.as_remote().is_none());
    }

    #[test]
    fn test_helper_constructors() {
        let err = BundleError::unknown("dynamodb client", "missing");
        assert_eq!(err.to_string(), "Unknown dynamodb client: missing");

        let err = BundleError::config("credentials must not be empty");
        assert!(matches!(err, BundleError::Configuration { .. }));
        assert!(!err.is_retryable());
    }
}

//! # Remote Service Client
//!
//! The capability every facade forwards to: invoke a named operation with
//! structured arguments and get a structured response back, or a typed
//! error. The SDK transport itself lives behind this trait.

use crate::core::types::{RemoteOperationResult, RequestArguments};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Broad category of a remote failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemoteErrorKind {
    /// Connection refused, reset, DNS, TLS ...
    Network,
    /// Request rate or provisioned throughput exceeded
    Throttling,
    /// The service rejected the request parameters
    Validation,
    /// Any other error reported by the service
    Service,
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Network => "network",
            Self::Throttling => "throttling",
            Self::Validation => "validation",
            Self::Service => "service",
        };
        f.write_str(name)
    }
}

/// Error raised by a remote service client
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Remote {kind} error ({code}): {message}")]
pub struct RemoteServiceError {
    pub kind: RemoteErrorKind,
    /// Service error code, e.g. `ResourceNotFoundException`
    pub code: String,
    pub message: String,
}

impl RemoteServiceError {
    pub fn new<C: Into<String>, M: Into<String>>(kind: RemoteErrorKind, code: C, message: M) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn network<M: Into<String>>(message: M) -> Self {
        Self::new(RemoteErrorKind::Network, "NetworkError", message)
    }

    pub fn throttling<C: Into<String>, M: Into<String>>(code: C, message: M) -> Self {
        Self::new(RemoteErrorKind::Throttling, code, message)
    }

    pub fn validation<M: Into<String>>(message: M) -> Self {
        Self::new(RemoteErrorKind::Validation, "ValidationException", message)
    }

    /// Network failures and throttling are worth retrying; validation is not
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, RemoteErrorKind::Network | RemoteErrorKind::Throttling)
    }
}

/// Invoke operations on a remote service
#[async_trait]
pub trait RemoteServiceClient: Send + Sync {
    /// Invoke `operation` (e.g. `GetItem`) with `args`
    async fn invoke(
        &self,
        operation: &str,
        args: &RequestArguments,
    ) -> Result<RemoteOperationResult, RemoteServiceError>;

    /// Service alias this client talks to, used in event names and logs
    fn service_name(&self) -> &str {
        "remote"
    }
}

#[async_trait]
impl<T: RemoteServiceClient + ?Sized> RemoteServiceClient for Arc<T> {
    async fn invoke(
        &self,
        operation: &str,
        args: &RequestArguments,
    ) -> Result<RemoteOperationResult, RemoteServiceError> {
        (**self).invoke(operation, args).await
    }

    fn service_name(&self) -> &str {
        (**self).service_name()
    }
}

#[async_trait]
impl<T: RemoteServiceClient + ?Sized> RemoteServiceClient for Box<T> {
    async fn invoke(
        &self,
        operation: &str,
        args: &RequestArguments,
    ) -> Result<RemoteOperationResult, RemoteServiceError> {
        (**self).invoke(operation, args).await
    }

    fn service_name(&self) -> &str {
        (**self).service_name()
    }
}

//! # Observability
//!
//! Logging setup. Metrics are emitted through the `metrics` facade at the
//! call sites (cache hits/misses, command durations); installing a recorder
//! is left to the host application.

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat};

//! # Command Events
//!
//! Every remote command can be reported to an [`EventDispatcher`] with its
//! arguments and execution time. Listeners use this for statsd-style timing,
//! audit trails or debugging.

pub mod proxy;

pub use proxy::{with_timing, InstrumentedClient};

use crate::core::types::RequestArguments;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// A remote command that just ran
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEvent {
    /// Operation name, e.g. `GetItem` or `SendMessage`
    pub command: String,
    pub arguments: RequestArguments,
    pub execution_time: Duration,
    pub occurred_at: DateTime<Utc>,
    /// Error message when the command failed
    pub error: Option<String>,
}

impl CommandEvent {
    pub fn new<C: Into<String>>(command: C, arguments: RequestArguments, execution_time: Duration) -> Self {
        Self {
            command: command.into(),
            arguments,
            execution_time,
            occurred_at: Utc::now(),
            error: None,
        }
    }

    pub fn with_error<E: Into<String>>(mut self, error: E) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Execution time in milliseconds
    pub fn timing_ms(&self) -> f64 {
        self.execution_time.as_secs_f64() * 1000.0
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Receives command events
pub trait EventDispatcher: Send + Sync {
    fn dispatch(&self, event_name: &str, event: &CommandEvent);
}

/// Writes every event to the `tracing` subscriber
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDispatcher;

impl EventDispatcher for TracingDispatcher {
    fn dispatch(&self, event_name: &str, event: &CommandEvent) {
        info!(
            event = %event_name,
            command = %event.command,
            timing_ms = event.timing_ms(),
            error = ?event.error,
            "Remote command executed"
        );
    }
}

/// Fans events out to any number of async subscribers
#[derive(Debug, Clone)]
pub struct BroadcastDispatcher {
    sender: broadcast::Sender<(String, CommandEvent)>,
}

impl BroadcastDispatcher {
    /// `capacity` events are buffered per lagging subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<(String, CommandEvent)> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventDispatcher for BroadcastDispatcher {
    fn dispatch(&self, event_name: &str, event: &CommandEvent) {
        if self
            .sender
            .send((event_name.to_string(), event.clone()))
            .is_err()
        {
            debug!(event = %event_name, "No subscribers for command event");
        }
    }
}

/// Sends each event to several dispatchers, in order
#[derive(Clone, Default)]
pub struct MultiDispatcher {
    dispatchers: Vec<Arc<dyn EventDispatcher>>,
}

impl MultiDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, dispatcher: Arc<dyn EventDispatcher>) -> Self {
        self.dispatchers.push(dispatcher);
        self
    }

    pub fn len(&self) -> usize {
        self.dispatchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dispatchers.is_empty()
    }
}

impl EventDispatcher for MultiDispatcher {
    fn dispatch(&self, event_name: &str, event: &CommandEvent) {
        for dispatcher in &self.dispatchers {
            dispatcher.dispatch(event_name, event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_timing_is_in_milliseconds() {
        let event = CommandEvent::new("SendMessage", json!({}), Duration::from_micros(1500));
        assert!((event.timing_ms() - 1.5).abs() < 1e-9);
        assert!(event.succeeded());
        assert!(!event.clone().with_error("boom").succeeded());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_subscribers() {
        let dispatcher = BroadcastDispatcher::new(8);
        let mut first = dispatcher.subscribe();
        let mut second = dispatcher.subscribe();
        assert_eq!(dispatcher.subscriber_count(), 2);

        let event = CommandEvent::new("GetItem", json!({"TableName": "videos"}), Duration::from_millis(3));
        dispatcher.dispatch("dynamodb.command", &event);

        let (name, received) = first.recv().await.unwrap();
        assert_eq!(name, "dynamodb.command");
        assert_eq!(received, event);
        assert_eq!(second.recv().await.unwrap().1.command, "GetItem");
    }

    #[test]
    fn test_dispatch_without_subscribers_is_silent() {
        let dispatcher = BroadcastDispatcher::new(0);
        let event = CommandEvent::new("GetItem", json!({}), Duration::ZERO);
        dispatcher.dispatch("dynamodb.command", &event);
        TracingDispatcher.dispatch("dynamodb.command", &event);
    }

    #[tokio::test]
    async fn test_multi_dispatcher_fans_out() {
        let first = Arc::new(BroadcastDispatcher::new(4));
        let second = Arc::new(BroadcastDispatcher::new(4));
        let mut first_rx = first.subscribe();
        let mut second_rx = second.subscribe();

        let multi = MultiDispatcher::new()
            .with(first.clone())
            .with(second.clone())
            .with(Arc::new(TracingDispatcher));
        assert_eq!(multi.len(), 3);

        let event = CommandEvent::new("DescribeTable", json!({"TableName": "videos"}), Duration::ZERO);
        multi.dispatch("dynamodb.command", &event);

        assert_eq!(first_rx.recv().await.unwrap().1, event);
        assert_eq!(second_rx.recv().await.unwrap().1, event);
    }
}

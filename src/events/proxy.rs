//! Timing proxy
//!
//! [`InstrumentedClient`] sits in front of any remote client, times every
//! `invoke` and reports a [`CommandEvent`] under a fixed event name such as
//! `dynamodb.command` or `sqs.command`.

use super::{CommandEvent, EventDispatcher};
use crate::core::types::{RemoteOperationResult, RequestArguments};
use crate::remote::{RemoteServiceClient, RemoteServiceError};
use async_trait::async_trait;
use metrics::histogram;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

/// Run `call`, then record its duration and dispatch a [`CommandEvent`]
///
/// The event is dispatched for failures too, with the error message
/// attached; the result is returned unchanged.
pub async fn with_timing<F, T, E>(
    event_name: &str,
    command: &str,
    arguments: &RequestArguments,
    dispatcher: &dyn EventDispatcher,
    call: F,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let start = Instant::now();
    let result = call.await;
    let elapsed = start.elapsed();

    histogram!(
        "aws_bundle_command_duration_seconds",
        "event" => event_name.to_string(),
        "command" => command.to_string()
    )
    .record(elapsed.as_secs_f64());

    let mut event = CommandEvent::new(command, arguments.clone(), elapsed);
    if let Err(e) = &result {
        event = event.with_error(e.to_string());
    }
    dispatcher.dispatch(event_name, &event);

    result
}

/// Remote client that reports every command it forwards
pub struct InstrumentedClient<C> {
    inner: C,
    event_name: String,
    dispatcher: Option<Arc<dyn EventDispatcher>>,
}

impl<C: RemoteServiceClient> InstrumentedClient<C> {
    /// Proxy without dispatcher: calls are forwarded untouched
    pub fn new<N: Into<String>>(inner: C, event_name: N) -> Self {
        Self {
            inner,
            event_name: event_name.into(),
            dispatcher: None,
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn EventDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// The wrapped client
    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: RemoteServiceClient> RemoteServiceClient for InstrumentedClient<C> {
    async fn invoke(
        &self,
        operation: &str,
        args: &RequestArguments,
    ) -> Result<RemoteOperationResult, RemoteServiceError> {
        match &self.dispatcher {
            Some(dispatcher) => {
                with_timing(
                    &self.event_name,
                    operation,
                    args,
                    dispatcher.as_ref(),
                    self.inner.invoke(operation, args),
                )
                .await
            }
            None => self.inner.invoke(operation, args).await,
        }
    }

    fn service_name(&self) -> &str {
        self.inner.service_name()
    }
}

impl<C> fmt::Debug for InstrumentedClient<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentedClient")
            .field("event_name", &self.event_name)
            .field("dispatching", &self.dispatcher.is_some())
            .finish()
    }
}

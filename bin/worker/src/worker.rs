//! Engine wiring and the event loop.

use crate::config::WorkerConfig;
use crate::error::WorkerError;
use relaydesk_automation::memory::{
    InMemoryContactStore, InMemoryRunLogger, InMemoryTenantStore, InMemoryTriggerIndex,
    InMemoryWorkflowStore,
};
use relaydesk_automation::{
    AuditHooks, Engine, EventDispatcher, HandlerDeps, HandlerRegistry, InboundEvent,
    LifecycleHooks, TriggerMatcher,
};
use relaydesk_integration::{CloudApiSender, DryRunSender, HttpWebhookClient, MessageSender};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

/// The in-memory stores backing the worker.
#[derive(Debug, Clone, Default)]
pub struct Stores {
    pub workflows: Arc<InMemoryWorkflowStore>,
    pub triggers: Arc<InMemoryTriggerIndex>,
    pub contacts: Arc<InMemoryContactStore>,
    pub tenants: Arc<InMemoryTenantStore>,
    pub runs: Arc<InMemoryRunLogger>,
}

impl Stores {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Builds the dispatcher: built-in handlers, audit hooks and the
/// configured outbound clients.
///
/// # Errors
///
/// Returns an error if an HTTP client cannot be constructed.
pub fn build_dispatcher(
    config: &WorkerConfig,
    stores: &Stores,
) -> relaydesk_core::Result<EventDispatcher, WorkerError> {
    let client_error = |e: relaydesk_integration::ConnectorError| WorkerError::Client {
        details: e.to_string(),
    };

    let sender: Arc<dyn MessageSender> = match &config.provider_base_url {
        Some(base_url) => {
            info!(%base_url, "sending through the provider API");
            Arc::new(CloudApiSender::new(base_url.as_str(), config.http_timeout()).map_err(client_error)?)
        }
        None => {
            info!("no provider configured, outbound messages are only logged");
            Arc::new(DryRunSender)
        }
    };
    let webhooks = Arc::new(HttpWebhookClient::new(config.http_timeout()).map_err(client_error)?);

    let deps = HandlerDeps {
        contacts: stores.contacts.clone(),
        sender,
        webhooks,
        fail_webhook_on_error_status: config.engine.fail_webhook_on_error_status,
    };
    let mut hooks = LifecycleHooks::new();
    AuditHooks::register(&mut hooks, stores.runs.clone());
    let engine = Engine::new(HandlerRegistry::builtin(deps), hooks, config.engine.clone());

    Ok(EventDispatcher::new(
        TriggerMatcher::new(stores.triggers.clone()),
        stores.workflows.clone(),
        stores.contacts.clone(),
        stores.tenants.clone(),
        Arc::new(engine),
    ))
}

/// Dispatches one event per input line until the input ends.
///
/// Blank lines are ignored; lines that are not a valid event are logged
/// and skipped. Returns the number of events dispatched.
///
/// # Errors
///
/// Returns an error if reading the input fails.
pub async fn run_events<R>(
    dispatcher: &EventDispatcher,
    input: R,
) -> relaydesk_core::Result<usize, WorkerError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut dispatched = 0;

    while let Some(line) = lines.next_line().await.map_err(|e| WorkerError::Input {
        details: e.to_string(),
    })? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event: InboundEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "skipping malformed event");
                continue;
            }
        };
        dispatcher.dispatch(event).await;
        dispatched += 1;
    }

    Ok(dispatched)
}

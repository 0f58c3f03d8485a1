//! Test doubles and a wired-up harness shared by the unit tests.

use crate::audit::AuditHooks;
use crate::config::EngineConfig;
use crate::context::{ActionResult, Contact, ExecutionContext, TenantProfile};
use crate::definition::{Workflow, WorkflowDefinition, WorkflowStatus};
use crate::dispatcher::{EventDispatcher, InboundEvent};
use crate::engine::Engine;
use crate::error::{HandlerError, HookError};
use crate::execution::{NodeStatus, RunStatus};
use crate::handler::{ActionHandler, HandlerDeps, HandlerRegistry};
use crate::hooks::{HookEvent, HookHandler, LifecycleHooks, RunInfo};
use crate::matcher::TriggerMatcher;
use crate::memory::{
    InMemoryContactStore, InMemoryRunLogger, InMemoryTenantStore, InMemoryTriggerIndex,
    InMemoryWorkflowStore,
};
use crate::node::{Node, NodeId};
use crate::store::TriggerIndex;
use crate::trigger::EventType;
use async_trait::async_trait;
use chrono::Utc;
use relaydesk_core::{TenantId, WorkflowId, WorkflowRunId};
use relaydesk_integration::{
    ConnectorError, MessageSender, OutboundMessage, ProviderAccount, SendReceipt, WebhookClient,
    WebhookRequest, WebhookResponse,
};
use serde_json::{Map, Value as JsonValue, json};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) fn run_info() -> RunInfo {
    RunInfo {
        run_id: WorkflowRunId::new(),
        workflow_id: WorkflowId::new(),
        tenant_id: TenantId::new(),
        entry_node_id: NodeId::new("trigger"),
        contact_id: None,
        started_at: Utc::now(),
    }
}

pub(crate) type HookLog = Arc<Mutex<Vec<String>>>;

/// Appends `label:hookName` to a shared log, followed by `:node_id` for
/// node events and `:status` for after events.
pub(crate) struct RecordingHook {
    label: String,
    log: HookLog,
}

impl RecordingHook {
    pub(crate) fn shared_log() -> HookLog {
        Arc::new(Mutex::new(Vec::new()))
    }

    pub(crate) fn with_log(label: &str, log: HookLog) -> Self {
        Self {
            label: label.to_string(),
            log,
        }
    }

    pub(crate) fn entries(log: &HookLog) -> Vec<String> {
        log.lock().expect("hook log").clone()
    }
}

#[async_trait]
impl HookHandler for RecordingHook {
    fn name(&self) -> &str {
        &self.label
    }

    async fn handle(&self, event: &HookEvent<'_>) -> Result<(), HookError> {
        let prefix = format!("{}:{}", self.label, event.name());
        let entry = match event {
            HookEvent::WorkflowExecuteBefore { .. } => prefix,
            HookEvent::WorkflowExecuteAfter { status, .. } => {
                let status = match status {
                    RunStatus::Running => "running",
                    RunStatus::Success => "success",
                    RunStatus::Failed => "failed",
                };
                format!("{prefix}:{status}")
            }
            HookEvent::NodeExecuteBefore { node, .. } => format!("{prefix}:{}", node.id),
            HookEvent::NodeExecuteAfter { node, status, .. } => {
                let status = match status {
                    NodeStatus::Success => "success",
                    NodeStatus::Failed => "failed",
                };
                format!("{prefix}:{}:{status}", node.id)
            }
        };
        self.log.lock().expect("hook log").push(entry);
        Ok(())
    }
}

pub(crate) struct FailingHook;

#[async_trait]
impl HookHandler for FailingHook {
    fn name(&self) -> &str {
        "failing"
    }

    async fn handle(&self, _event: &HookEvent<'_>) -> Result<(), HookError> {
        Err(HookError::Failed {
            reason: "audit sink offline".to_string(),
        })
    }
}

pub(crate) struct PanickingHook;

#[async_trait]
impl HookHandler for PanickingHook {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn handle(&self, event: &HookEvent<'_>) -> Result<(), HookError> {
        panic!("hook blew up on {}", event.name());
    }
}

/// Sleeps before succeeding.
pub(crate) struct SlowHandler(pub Duration);

#[async_trait]
impl ActionHandler for SlowHandler {
    async fn execute(
        &self,
        _node: &Node,
        _ctx: &ExecutionContext,
    ) -> Result<ActionResult, HandlerError> {
        tokio::time::sleep(self.0).await;
        Ok(ActionResult::proceed())
    }
}

pub(crate) struct PanickingHandler;

#[async_trait]
impl ActionHandler for PanickingHandler {
    async fn execute(
        &self,
        node: &Node,
        _ctx: &ExecutionContext,
    ) -> Result<ActionResult, HandlerError> {
        panic!("handler for {} blew up", node.id);
    }
}

/// Records outbound messages instead of sending them.
#[derive(Default)]
pub(crate) struct RecordingSender {
    sent: Mutex<Vec<OutboundMessage>>,
    failure: Mutex<Option<ConnectorError>>,
}

impl RecordingSender {
    pub(crate) fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().expect("sent").clone()
    }

    pub(crate) fn fail_with(&self, error: ConnectorError) {
        *self.failure.lock().expect("failure") = Some(error);
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(
        &self,
        _account: &ProviderAccount,
        message: &OutboundMessage,
    ) -> Result<SendReceipt, ConnectorError> {
        if let Some(error) = self.failure.lock().expect("failure").clone() {
            return Err(error);
        }
        let mut sent = self.sent.lock().expect("sent");
        sent.push(message.clone());
        Ok(SendReceipt {
            provider_message_id: format!("wamid.{}", sent.len()),
        })
    }
}

/// Records webhook requests and answers with a configurable status.
pub(crate) struct RecordingWebhookClient {
    requests: Mutex<Vec<WebhookRequest>>,
    status: AtomicU16,
    failure: Mutex<Option<ConnectorError>>,
}

impl RecordingWebhookClient {
    pub(crate) fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            status: AtomicU16::new(200),
            failure: Mutex::new(None),
        }
    }

    pub(crate) fn requests(&self) -> Vec<WebhookRequest> {
        self.requests.lock().expect("requests").clone()
    }

    pub(crate) fn set_status(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    pub(crate) fn fail_with(&self, error: ConnectorError) {
        *self.failure.lock().expect("failure") = Some(error);
    }
}

#[async_trait]
impl WebhookClient for RecordingWebhookClient {
    async fn call(&self, request: &WebhookRequest) -> Result<WebhookResponse, ConnectorError> {
        if let Some(error) = self.failure.lock().expect("failure").clone() {
            return Err(error);
        }
        self.requests.lock().expect("requests").push(request.clone());
        Ok(WebhookResponse {
            status: self.status.load(Ordering::SeqCst),
            body: "{}".to_string(),
        })
    }
}

/// One tenant with a profile and a contact named Ana, in-memory stores and
/// recording collaborators.
pub(crate) struct Harness {
    pub tenant_id: TenantId,
    pub contact: Contact,
    pub contacts: Arc<InMemoryContactStore>,
    pub tenants: Arc<InMemoryTenantStore>,
    pub workflows: Arc<InMemoryWorkflowStore>,
    pub triggers: Arc<InMemoryTriggerIndex>,
    pub runs: Arc<InMemoryRunLogger>,
    pub sender: Arc<RecordingSender>,
    pub webhooks: Arc<RecordingWebhookClient>,
    profile: Arc<TenantProfile>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        let tenant_id = TenantId::new();
        let profile = TenantProfile {
            tenant_id,
            business_name: "Padaria Central".to_string(),
            provider: ProviderAccount {
                phone_number_id: "1055".to_string(),
                access_token: "test-token".to_string(),
            },
            settings: Map::new(),
        };
        let mut contact = Contact::new(tenant_id)
            .with_name("Ana")
            .with_phone("+5511999990000");
        contact.set_custom_field("age", json!(31));

        let tenants = Arc::new(InMemoryTenantStore::new());
        tenants.insert(profile.clone());
        let contacts = Arc::new(InMemoryContactStore::new());
        contacts.insert(contact.clone());

        Self {
            tenant_id,
            contact,
            contacts,
            tenants,
            workflows: Arc::new(InMemoryWorkflowStore::new()),
            triggers: Arc::new(InMemoryTriggerIndex::new()),
            runs: Arc::new(InMemoryRunLogger::new()),
            sender: Arc::new(RecordingSender::default()),
            webhooks: Arc::new(RecordingWebhookClient::new()),
            profile: Arc::new(profile),
        }
    }

    pub(crate) fn handler_deps(&self) -> HandlerDeps {
        HandlerDeps {
            contacts: self.contacts.clone(),
            sender: self.sender.clone(),
            webhooks: self.webhooks.clone(),
            fail_webhook_on_error_status: false,
        }
    }

    pub(crate) fn registry(&self) -> HandlerRegistry {
        HandlerRegistry::builtin(self.handler_deps())
    }

    pub(crate) fn audited_hooks(&self) -> LifecycleHooks {
        let mut hooks = LifecycleHooks::new();
        AuditHooks::register(&mut hooks, self.runs.clone());
        hooks
    }

    pub(crate) fn engine(&self, config: EngineConfig) -> Engine {
        Engine::new(self.registry(), self.audited_hooks(), config)
    }

    pub(crate) fn dispatcher(&self) -> EventDispatcher {
        self.dispatcher_with(self.engine(EngineConfig::default()))
    }

    pub(crate) fn dispatcher_with(&self, engine: Engine) -> EventDispatcher {
        EventDispatcher::new(
            TriggerMatcher::new(self.triggers.clone()),
            self.workflows.clone(),
            self.contacts.clone(),
            self.tenants.clone(),
            Arc::new(engine),
        )
    }

    /// An empty active workflow of this tenant.
    pub(crate) fn definition(&self, name: &str) -> WorkflowDefinition {
        WorkflowDefinition::new(self.tenant_id, name).with_status(WorkflowStatus::Active)
    }

    pub(crate) fn workflow(&self, definition: WorkflowDefinition) -> Workflow {
        Workflow::try_from(definition).expect("valid workflow")
    }

    /// Stores a workflow and registers its triggers.
    pub(crate) async fn install(&self, definition: WorkflowDefinition) -> Workflow {
        let workflow = self.workflow(definition);
        self.triggers
            .sync_workflow(&workflow)
            .await
            .expect("register triggers");
        self.workflows.insert(workflow.clone());
        workflow
    }

    /// An event about the harness contact.
    pub(crate) fn event(&self, event_type: EventType, payload: JsonValue) -> InboundEvent {
        InboundEvent::new(self.tenant_id, event_type, payload).for_contact(self.contact.id)
    }

    pub(crate) fn context(&self) -> ExecutionContext {
        self.context_for(Some(self.contact.clone()), json!({}))
    }

    pub(crate) fn context_with_trigger(&self, trigger: JsonValue) -> ExecutionContext {
        self.context_for(Some(self.contact.clone()), trigger)
    }

    pub(crate) fn context_without_contact(&self) -> ExecutionContext {
        self.context_for(None, json!({}))
    }

    pub(crate) fn context_for(&self, contact: Option<Contact>, trigger: JsonValue) -> ExecutionContext {
        ExecutionContext::new(
            WorkflowId::new(),
            self.profile.clone(),
            contact,
            Arc::new(trigger),
        )
    }
}

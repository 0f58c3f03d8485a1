//! The event dispatcher: the entry point for inbound events.
//!
//! One event can start several runs. Each matched `(workflow, entry node)`
//! pair runs on its own task with its own [`ExecutionContext`]; a failing
//! or panicking run never affects its siblings. Dispatch waits for every
//! run it started and never fails: problems are logged and reflected in
//! the returned [`DispatchReport`].

use crate::context::{Contact, ExecutionContext, TenantProfile};
use crate::definition::Workflow;
use crate::engine::Engine;
use crate::error::DispatchError;
use crate::execution::{RunOutcome, RunStatus};
use crate::matcher::{TriggerMatch, TriggerMatcher};
use crate::node::NodeId;
use crate::store::{ContactStore, TenantStore, WorkflowStore};
use crate::trigger::EventType;
use relaydesk_core::{ContactId, TenantId, WorkflowId};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

/// An inbound event as delivered by the event source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub tenant_id: TenantId,
    pub event_type: EventType,
    /// The contact the event is about, if any.
    #[serde(default)]
    pub contact_id: Option<ContactId>,
    #[serde(default)]
    pub payload: JsonValue,
}

impl InboundEvent {
    #[must_use]
    pub fn new(tenant_id: TenantId, event_type: EventType, payload: JsonValue) -> Self {
        Self {
            tenant_id,
            event_type,
            contact_id: None,
            payload,
        }
    }

    #[must_use]
    pub fn for_contact(mut self, contact_id: ContactId) -> Self {
        self.contact_id = Some(contact_id);
        self
    }
}

/// What one dispatch did.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    /// Every trigger registration that matched.
    pub matched: Vec<TriggerMatch>,
    /// Workflows that matched but were not run: not active, owned by
    /// another tenant, or not loadable.
    pub skipped: Vec<WorkflowId>,
    /// Outcomes of the runs that finished, in completion order.
    pub runs: Vec<RunOutcome>,
    /// Runs whose task panicked.
    pub panicked: usize,
}

impl DispatchReport {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.runs.iter().filter(|run| run.succeeded()).count()
    }

    /// Failed runs, panics included.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.runs
            .iter()
            .filter(|run| run.status == RunStatus::Failed)
            .count()
            + self.panicked
    }

    /// The outcome of the run of a workflow, if exactly one ran.
    #[must_use]
    pub fn run_of(&self, workflow_id: WorkflowId) -> Option<&RunOutcome> {
        let mut runs = self.runs.iter().filter(|run| run.workflow_id == workflow_id);
        let run = runs.next()?;
        runs.next().is_none().then_some(run)
    }
}

/// Turns inbound events into workflow runs.
#[derive(Clone)]
pub struct EventDispatcher {
    matcher: TriggerMatcher,
    workflows: Arc<dyn WorkflowStore>,
    contacts: Arc<dyn ContactStore>,
    tenants: Arc<dyn TenantStore>,
    engine: Arc<Engine>,
}

impl EventDispatcher {
    #[must_use]
    pub fn new(
        matcher: TriggerMatcher,
        workflows: Arc<dyn WorkflowStore>,
        contacts: Arc<dyn ContactStore>,
        tenants: Arc<dyn TenantStore>,
        engine: Arc<Engine>,
    ) -> Self {
        Self {
            matcher,
            workflows,
            contacts,
            tenants,
            engine,
        }
    }

    /// Matches the event, starts one run per matched entry point and waits
    /// for all of them.
    #[instrument(skip(self, event), fields(tenant_id = %event.tenant_id, event_type = %event.event_type))]
    pub async fn dispatch(&self, event: InboundEvent) -> DispatchReport {
        let mut report = DispatchReport::default();

        let matches = match self
            .matcher
            .find_matches(event.tenant_id, event.event_type, &event.payload)
            .await
        {
            Ok(matches) => matches,
            Err(e) => {
                error!(error = %e, "event dropped");
                return report;
            }
        };
        if matches.is_empty() {
            debug!("no trigger matched");
            return report;
        }

        let runnable = self
            .runnable(event.tenant_id, &matches, &mut report.skipped)
            .await;
        report.matched = matches;
        if runnable.is_empty() {
            return report;
        }

        let (profile, contact) = match self.load_context(&event).await {
            Ok(loaded) => loaded,
            Err(e) => {
                error!(error = %e, "event dropped");
                return report;
            }
        };
        let trigger = Arc::new(event.payload);

        let mut runs = JoinSet::new();
        for (workflow, entry) in runnable {
            let engine = self.engine.clone();
            let ctx = ExecutionContext::new(
                workflow.id,
                profile.clone(),
                contact.clone(),
                trigger.clone(),
            );
            runs.spawn(async move { engine.run(&workflow, &entry, ctx).await });
        }

        while let Some(joined) = runs.join_next().await {
            match joined {
                Ok(outcome) => report.runs.push(outcome),
                Err(e) => {
                    error!(error = %e, "workflow run panicked");
                    report.panicked += 1;
                }
            }
        }

        info!(
            matched = report.matched.len(),
            skipped = report.skipped.len(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            "event dispatched"
        );
        report
    }

    /// Resolves matches to loaded workflows.
    ///
    /// Each workflow is fetched once however many of its entry points
    /// matched; repeated `(workflow, entry)` pairs run once.
    async fn runnable(
        &self,
        tenant_id: TenantId,
        matches: &[TriggerMatch],
        skipped: &mut Vec<WorkflowId>,
    ) -> Vec<(Arc<Workflow>, NodeId)> {
        let mut loaded: HashMap<WorkflowId, Option<Arc<Workflow>>> = HashMap::new();
        let mut seen = HashSet::new();
        let mut runnable = Vec::new();

        for entry in matches {
            if !seen.insert((entry.workflow_id, &entry.entry_node_id)) {
                continue;
            }
            let workflow = match loaded.entry(entry.workflow_id) {
                Entry::Occupied(slot) => slot.get().clone(),
                Entry::Vacant(slot) => {
                    let workflow = self.load_workflow(tenant_id, entry.workflow_id).await;
                    if workflow.is_none() {
                        skipped.push(entry.workflow_id);
                    }
                    slot.insert(workflow).clone()
                }
            };
            if let Some(workflow) = workflow {
                runnable.push((workflow, entry.entry_node_id.clone()));
            }
        }

        runnable
    }

    async fn load_workflow(&self, tenant_id: TenantId, workflow_id: WorkflowId) -> Option<Arc<Workflow>> {
        let workflow = match self.workflows.get_workflow(workflow_id).await {
            Ok(workflow) => workflow,
            Err(e) => {
                let error = DispatchError::WorkflowLookup {
                    workflow_id,
                    reason: e.to_string(),
                };
                warn!(%error, "skipping workflow");
                return None;
            }
        };

        if workflow.tenant_id != tenant_id {
            warn!(%workflow_id, owner = %workflow.tenant_id, "workflow belongs to another tenant, skipping");
            return None;
        }
        if !workflow.is_active() {
            info!(%workflow_id, status = %workflow.status, "workflow is not active, skipping");
            return None;
        }
        Some(workflow)
    }

    async fn load_context(
        &self,
        event: &InboundEvent,
    ) -> relaydesk_core::Result<(Arc<TenantProfile>, Option<Contact>), DispatchError> {
        let profile = self
            .tenants
            .get_profile(event.tenant_id)
            .await
            .map_err(|e| DispatchError::ProfileLookup {
                tenant_id: event.tenant_id,
                reason: e.to_string(),
            })?;

        let contact = match event.contact_id {
            Some(contact_id) => Some(
                self.contacts
                    .get_contact(event.tenant_id, contact_id)
                    .await
                    .map_err(|e| DispatchError::ContactLookup {
                        contact_id,
                        reason: e.to_string(),
                    })?,
            ),
            None => None,
        };

        Ok((Arc::new(profile), contact))
    }
}

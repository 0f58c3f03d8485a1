//! In-memory implementations of the store traits.
//!
//! Used by the worker binary with fixture data and by tests.

use crate::context::{Contact, TenantProfile};
use crate::definition::Workflow;
use crate::error::StoreError;
use crate::execution::{NodeLog, NodeStat, NodeStatus, RunRecord, RunStatus};
use crate::node::NodeId;
use crate::store::{ContactStore, RunLogger, TenantStore, TriggerIndex, WorkflowStore};
use crate::trigger::{TriggerRegistration, TriggerType};
use async_trait::async_trait;
use relaydesk_core::{ContactId, TenantId, WorkflowId, WorkflowRunId};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Workflows keyed by id.
#[derive(Debug, Default)]
pub struct InMemoryWorkflowStore {
    workflows: RwLock<HashMap<WorkflowId, Arc<Workflow>>>,
}

impl InMemoryWorkflowStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a workflow.
    pub fn insert(&self, workflow: Workflow) {
        write(&self.workflows).insert(workflow.id, Arc::new(workflow));
    }

    /// Removes a workflow.
    pub fn remove(&self, workflow_id: WorkflowId) -> Option<Arc<Workflow>> {
        write(&self.workflows).remove(&workflow_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        read(&self.workflows).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn get_workflow(&self, workflow_id: WorkflowId) -> Result<Arc<Workflow>, StoreError> {
        read(&self.workflows)
            .get(&workflow_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("workflow", workflow_id))
    }
}

/// Trigger registrations in a flat list.
#[derive(Debug, Default)]
pub struct InMemoryTriggerIndex {
    registrations: RwLock<Vec<TriggerRegistration>>,
}

impl InMemoryTriggerIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registrations across all tenants.
    #[must_use]
    pub fn len(&self) -> usize {
        read(&self.registrations).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TriggerIndex for InMemoryTriggerIndex {
    async fn list(
        &self,
        tenant_id: TenantId,
        trigger_type: TriggerType,
        key: Option<&str>,
    ) -> Result<Vec<TriggerRegistration>, StoreError> {
        Ok(read(&self.registrations)
            .iter()
            .filter(|r| r.tenant_id == tenant_id && r.trigger_type == trigger_type)
            .filter(|r| key.is_none_or(|key| r.trigger_key == key))
            .cloned()
            .collect())
    }

    async fn replace_for_workflow(
        &self,
        workflow_id: WorkflowId,
        registrations: Vec<TriggerRegistration>,
    ) -> Result<usize, StoreError> {
        let mut stored = write(&self.registrations);
        stored.retain(|r| r.workflow_id != workflow_id);
        let count = registrations.len();
        stored.extend(registrations);
        Ok(count)
    }

    async fn delete_for_workflow(&self, workflow_id: WorkflowId) -> Result<usize, StoreError> {
        let mut stored = write(&self.registrations);
        let before = stored.len();
        stored.retain(|r| r.workflow_id != workflow_id);
        Ok(before - stored.len())
    }
}

/// Contacts keyed by id.
#[derive(Debug, Default)]
pub struct InMemoryContactStore {
    contacts: RwLock<HashMap<ContactId, Contact>>,
}

impl InMemoryContactStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, contact: Contact) {
        write(&self.contacts).insert(contact.id, contact);
    }

    /// Returns a snapshot of a contact.
    #[must_use]
    pub fn get(&self, contact_id: ContactId) -> Option<Contact> {
        read(&self.contacts).get(&contact_id).cloned()
    }
}

#[async_trait]
impl ContactStore for InMemoryContactStore {
    async fn get_contact(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
    ) -> Result<Contact, StoreError> {
        read(&self.contacts)
            .get(&contact_id)
            .filter(|c| c.tenant_id == tenant_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("contact", contact_id))
    }

    async fn save_contact(&self, contact: &Contact) -> Result<(), StoreError> {
        write(&self.contacts).insert(contact.id, contact.clone());
        Ok(())
    }

    async fn add_tags(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
        tags: &[String],
    ) -> Result<Contact, StoreError> {
        let mut contacts = write(&self.contacts);
        let contact = contacts
            .get_mut(&contact_id)
            .filter(|c| c.tenant_id == tenant_id)
            .ok_or_else(|| StoreError::not_found("contact", contact_id))?;
        contact.add_tags(tags);
        Ok(contact.clone())
    }

    async fn remove_tags(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
        tags: &[String],
    ) -> Result<Contact, StoreError> {
        let mut contacts = write(&self.contacts);
        let contact = contacts
            .get_mut(&contact_id)
            .filter(|c| c.tenant_id == tenant_id)
            .ok_or_else(|| StoreError::not_found("contact", contact_id))?;
        contact.remove_tags(tags);
        Ok(contact.clone())
    }

    async fn set_custom_field(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
        key: &str,
        value: JsonValue,
    ) -> Result<Contact, StoreError> {
        let mut contacts = write(&self.contacts);
        let contact = contacts
            .get_mut(&contact_id)
            .filter(|c| c.tenant_id == tenant_id)
            .ok_or_else(|| StoreError::not_found("contact", contact_id))?;
        contact.set_custom_field(key, value);
        Ok(contact.clone())
    }
}

/// Tenant profiles keyed by tenant.
#[derive(Debug, Default)]
pub struct InMemoryTenantStore {
    profiles: RwLock<HashMap<TenantId, TenantProfile>>,
}

impl InMemoryTenantStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, profile: TenantProfile) {
        write(&self.profiles).insert(profile.tenant_id, profile);
    }
}

#[async_trait]
impl TenantStore for InMemoryTenantStore {
    async fn get_profile(&self, tenant_id: TenantId) -> Result<TenantProfile, StoreError> {
        read(&self.profiles)
            .get(&tenant_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("tenant profile", tenant_id))
    }
}

/// Run records, node logs and node statistics.
#[derive(Debug, Default)]
pub struct InMemoryRunLogger {
    runs: RwLock<HashMap<WorkflowRunId, RunRecord>>,
    node_logs: RwLock<Vec<NodeLog>>,
    stats: RwLock<HashMap<(WorkflowId, NodeId), NodeStat>>,
}

impl InMemoryRunLogger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn run(&self, run_id: WorkflowRunId) -> Option<RunRecord> {
        read(&self.runs).get(&run_id).cloned()
    }

    /// All run records, oldest first.
    #[must_use]
    pub fn runs(&self) -> Vec<RunRecord> {
        let mut runs: Vec<RunRecord> = read(&self.runs).values().cloned().collect();
        runs.sort_by_key(|r| r.started_at);
        runs
    }

    /// Node logs of one run in append order.
    #[must_use]
    pub fn node_logs(&self, run_id: WorkflowRunId) -> Vec<NodeLog> {
        read(&self.node_logs)
            .iter()
            .filter(|log| log.run_id == run_id)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn node_stat(&self, workflow_id: WorkflowId, node_id: &NodeId) -> Option<NodeStat> {
        read(&self.stats)
            .get(&(workflow_id, node_id.clone()))
            .cloned()
    }
}

#[async_trait]
impl RunLogger for InMemoryRunLogger {
    async fn create_run(&self, record: &RunRecord) -> Result<(), StoreError> {
        write(&self.runs).insert(record.id, record.clone());
        Ok(())
    }

    async fn finish_run(
        &self,
        run_id: WorkflowRunId,
        status: RunStatus,
        detail: Option<String>,
    ) -> Result<(), StoreError> {
        let mut runs = write(&self.runs);
        let record = runs
            .get_mut(&run_id)
            .ok_or_else(|| StoreError::not_found("run", run_id))?;
        record.finish(status, detail);
        Ok(())
    }

    async fn append_node_log(&self, log: &NodeLog) -> Result<(), StoreError> {
        write(&self.node_logs).push(log.clone());
        Ok(())
    }

    async fn increment_node_stat(
        &self,
        workflow_id: WorkflowId,
        node_id: &NodeId,
        status: NodeStatus,
    ) -> Result<(), StoreError> {
        write(&self.stats)
            .entry((workflow_id, node_id.clone()))
            .or_insert_with(|| NodeStat::new(workflow_id, node_id.clone()))
            .record(status);
        Ok(())
    }
}

//! Persistence collaborator traits.
//!
//! The engine never talks to a database directly. Each concern has a
//! trait here; [`crate::memory`] provides in-process implementations.

use crate::context::{Contact, TenantProfile};
use crate::definition::Workflow;
use crate::error::StoreError;
use crate::execution::{NodeLog, NodeStatus, RunRecord, RunStatus};
use crate::node::NodeId;
use crate::trigger::{TriggerRegistration, TriggerType, registrations_for};
use async_trait::async_trait;
use relaydesk_core::{ContactId, TenantId, WorkflowId, WorkflowRunId};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Source of workflow definitions.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Loads a workflow by id, whatever its status.
    async fn get_workflow(&self, workflow_id: WorkflowId) -> Result<Arc<Workflow>, StoreError>;
}

/// The denormalized trigger lookup table.
#[async_trait]
pub trait TriggerIndex: Send + Sync {
    /// Lists a tenant's registrations of one type.
    ///
    /// When `key` is given only registrations with exactly that key are
    /// returned.
    async fn list(
        &self,
        tenant_id: TenantId,
        trigger_type: TriggerType,
        key: Option<&str>,
    ) -> Result<Vec<TriggerRegistration>, StoreError>;

    /// Replaces every registration of a workflow. Returns how many were stored.
    async fn replace_for_workflow(
        &self,
        workflow_id: WorkflowId,
        registrations: Vec<TriggerRegistration>,
    ) -> Result<usize, StoreError>;

    /// Removes every registration of a workflow. Returns how many were removed.
    async fn delete_for_workflow(&self, workflow_id: WorkflowId) -> Result<usize, StoreError>;

    /// Re-derives and stores a workflow's registrations.
    async fn sync_workflow(&self, workflow: &Workflow) -> Result<usize, StoreError> {
        self.replace_for_workflow(workflow.id, registrations_for(workflow))
            .await
    }
}

/// Contact reads and mutations.
///
/// The mutation methods have read-modify-write defaults; stores that can
/// apply them atomically should override them.
#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn get_contact(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
    ) -> Result<Contact, StoreError>;

    async fn save_contact(&self, contact: &Contact) -> Result<(), StoreError>;

    /// Adds tags and returns the updated contact.
    async fn add_tags(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
        tags: &[String],
    ) -> Result<Contact, StoreError> {
        let mut contact = self.get_contact(tenant_id, contact_id).await?;
        if contact.add_tags(tags) {
            self.save_contact(&contact).await?;
        }
        Ok(contact)
    }

    /// Removes tags and returns the updated contact.
    async fn remove_tags(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
        tags: &[String],
    ) -> Result<Contact, StoreError> {
        let mut contact = self.get_contact(tenant_id, contact_id).await?;
        if contact.remove_tags(tags) {
            self.save_contact(&contact).await?;
        }
        Ok(contact)
    }

    /// Sets one custom field and returns the updated contact.
    async fn set_custom_field(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
        key: &str,
        value: JsonValue,
    ) -> Result<Contact, StoreError> {
        let mut contact = self.get_contact(tenant_id, contact_id).await?;
        contact.set_custom_field(key, value);
        self.save_contact(&contact).await?;
        Ok(contact)
    }
}

/// Tenant profile lookup.
#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn get_profile(&self, tenant_id: TenantId) -> Result<TenantProfile, StoreError>;
}

/// Sink for run records, node logs and node statistics.
#[async_trait]
pub trait RunLogger: Send + Sync {
    async fn create_run(&self, record: &RunRecord) -> Result<(), StoreError>;

    async fn finish_run(
        &self,
        run_id: WorkflowRunId,
        status: RunStatus,
        detail: Option<String>,
    ) -> Result<(), StoreError>;

    async fn append_node_log(&self, log: &NodeLog) -> Result<(), StoreError>;

    async fn increment_node_stat(
        &self,
        workflow_id: WorkflowId,
        node_id: &NodeId,
        status: NodeStatus,
    ) -> Result<(), StoreError>;
}

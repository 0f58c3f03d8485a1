//! Error types for the automation crate.
//!
//! Errors are layered the same way the engine is:
//! - `GraphError`: a workflow definition could not be turned into a graph
//! - `StoreError`: a collaborator (workflow, contact, tenant, run-log store) failed
//! - `HandlerError`: a node handler rejected its input or its side effect failed
//! - `RunError`: the reason a run ended in `failed`
//! - `HookError`: a lifecycle hook failed (logged, never fatal)
//! - `DispatchError`: context for reports raised while preparing a dispatch

use crate::node::NodeId;
use relaydesk_core::{ContactId, TenantId, WorkflowId};
use relaydesk_integration::ConnectorError;
use std::fmt;

/// Errors from building a workflow graph out of its definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A node has an empty id.
    EmptyNodeId,
    /// Two nodes share an id.
    DuplicateNode { node_id: NodeId },
    /// A node carries a type tag the engine does not know.
    UnknownNodeType { node_id: NodeId, node_type: String },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyNodeId => write!(f, "node id must not be empty"),
            Self::DuplicateNode { node_id } => write!(f, "duplicate node id: {node_id}"),
            Self::UnknownNodeType { node_id, node_type } => {
                write!(f, "node {node_id} has unknown type '{node_type}'")
            }
        }
    }
}

impl std::error::Error for GraphError {}

/// Errors from persistence collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The requested entity does not exist.
    NotFound { entity: &'static str, id: String },
    /// The backing store could not serve the request.
    Unavailable { reason: String },
}

impl StoreError {
    /// Shorthand for a `NotFound` error.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Unavailable { reason } => write!(f, "store unavailable: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Errors raised by action handlers.
///
/// The engine records the `Display` text verbatim as the run's failure detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// The node's configuration is missing a field or has the wrong shape.
    InvalidConfig { reason: String },
    /// The node acts on a contact but the run has none.
    MissingContact,
    /// The contact has no phone number to send to.
    MissingRecipient { contact_id: ContactId },
    /// The messaging provider failed.
    Provider(ConnectorError),
    /// The webhook call failed.
    Webhook(ConnectorError),
    /// The webhook answered with a non-2xx status and the node is strict.
    WebhookStatus { status: u16 },
    /// A resolved JSON template is not valid JSON.
    InvalidJsonBody { reason: String },
    /// A contact mutation could not be persisted.
    Store(StoreError),
}

impl HandlerError {
    /// Shorthand for an `InvalidConfig` error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig { reason } => write!(f, "invalid node config: {reason}"),
            Self::MissingContact => write!(f, "run has no contact"),
            Self::MissingRecipient { contact_id } => {
                write!(f, "contact {contact_id} has no phone number")
            }
            Self::Provider(e) => write!(f, "message not sent: {e}"),
            Self::Webhook(e) => write!(f, "webhook failed: {e}"),
            Self::WebhookStatus { status } => {
                write!(f, "webhook answered with status {status}")
            }
            Self::InvalidJsonBody { reason } => {
                write!(f, "webhook body is not valid JSON: {reason}")
            }
            Self::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for HandlerError {}

impl From<StoreError> for HandlerError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

/// The reason a run ended in `failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    /// No handler is registered for the node's type.
    UnknownNodeType { node_id: NodeId, node_type: String },
    /// The handler returned an error.
    HandlerFailure { node_id: NodeId, message: String },
    /// The handler did not finish within the per-node timeout.
    NodeTimeout { node_id: NodeId, timeout_secs: u64 },
    /// The run executed the maximum number of nodes without terminating.
    StepLimitExceeded { max_steps: usize },
    /// The run exceeded its wall-clock budget.
    RunTimeout { timeout_secs: u64 },
}

impl RunError {
    /// The node the run failed on, if the failure is node-scoped.
    #[must_use]
    pub fn node_id(&self) -> Option<&NodeId> {
        match self {
            Self::UnknownNodeType { node_id, .. }
            | Self::HandlerFailure { node_id, .. }
            | Self::NodeTimeout { node_id, .. } => Some(node_id),
            Self::StepLimitExceeded { .. } | Self::RunTimeout { .. } => None,
        }
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownNodeType { node_id, node_type } => {
                write!(f, "no handler for node {node_id} of type '{node_type}'")
            }
            Self::HandlerFailure { node_id, message } => {
                write!(f, "node {node_id} failed: {message}")
            }
            Self::NodeTimeout {
                node_id,
                timeout_secs,
            } => write!(f, "node {node_id} timed out after {timeout_secs}s"),
            Self::StepLimitExceeded { max_steps } => {
                write!(f, "run exceeded the limit of {max_steps} steps")
            }
            Self::RunTimeout { timeout_secs } => {
                write!(f, "run exceeded its {timeout_secs}s time limit")
            }
        }
    }
}

impl std::error::Error for RunError {}

/// A lifecycle hook failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookError {
    /// The hook's own store failed.
    Store(StoreError),
    /// Any other hook failure.
    Failed { reason: String },
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(e) => write!(f, "hook store error: {e}"),
            Self::Failed { reason } => write!(f, "hook failed: {reason}"),
        }
    }
}

impl std::error::Error for HookError {}

impl From<StoreError> for HookError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

/// Context for failures while preparing the runs for one event.
///
/// Dispatch is best-effort: these never reach the event source, they are
/// logged and the dispatch starts no runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The trigger index could not be queried.
    TriggerLookup { tenant_id: TenantId, reason: String },
    /// The tenant profile could not be loaded.
    ProfileLookup { tenant_id: TenantId, reason: String },
    /// The event's contact could not be loaded.
    ContactLookup { contact_id: ContactId, reason: String },
    /// A matched workflow could not be loaded.
    WorkflowLookup {
        workflow_id: WorkflowId,
        reason: String,
    },
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TriggerLookup { tenant_id, reason } => {
                write!(f, "trigger lookup failed for tenant {tenant_id}: {reason}")
            }
            Self::ProfileLookup { tenant_id, reason } => {
                write!(f, "profile lookup failed for tenant {tenant_id}: {reason}")
            }
            Self::ContactLookup { contact_id, reason } => {
                write!(f, "contact lookup failed for {contact_id}: {reason}")
            }
            Self::WorkflowLookup {
                workflow_id,
                reason,
            } => write!(f, "workflow lookup failed for {workflow_id}: {reason}"),
        }
    }
}

impl std::error::Error for DispatchError {}

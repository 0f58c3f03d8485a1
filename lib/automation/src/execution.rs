//! Run and node execution records.
//!
//! A run moves `running -> success | failed` exactly once. Node logs and
//! per-node statistics are appended as nodes finish; they are written by
//! lifecycle hooks, not by the engine itself.

use crate::context::Contact;
use crate::hooks::RunInfo;
use crate::node::{NodeId, NodeKind};
use chrono::{DateTime, Utc};
use relaydesk_core::{ContactId, NodeExecutionId, TenantId, WorkflowId, WorkflowRunId};
use serde::{Deserialize, Serialize};

/// The state of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

impl RunStatus {
    /// Returns true if this is a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

/// The outcome of a single node invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Success,
    Failed,
}

/// The persisted record of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: WorkflowRunId,
    pub workflow_id: WorkflowId,
    pub tenant_id: TenantId,
    pub entry_node_id: NodeId,
    pub contact_id: Option<ContactId>,
    pub status: RunStatus,
    /// Failure reason, set when the run fails.
    pub detail: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunRecord {
    /// Creates a record in the `running` state.
    #[must_use]
    pub fn start(run: &RunInfo) -> Self {
        Self {
            id: run.run_id,
            workflow_id: run.workflow_id,
            tenant_id: run.tenant_id,
            entry_node_id: run.entry_node_id.clone(),
            contact_id: run.contact_id,
            status: RunStatus::Running,
            detail: None,
            started_at: run.started_at,
            finished_at: None,
        }
    }

    /// Moves the record to a terminal state.
    ///
    /// A record that already finished is left unchanged; returns whether
    /// the transition happened.
    pub fn finish(&mut self, status: RunStatus, detail: Option<String>) -> bool {
        if self.status.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        self.detail = detail;
        self.finished_at = Some(Utc::now());
        true
    }
}

/// One node invocation within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeLog {
    pub id: NodeExecutionId,
    pub run_id: WorkflowRunId,
    pub node_id: NodeId,
    pub node_type: NodeKind,
    pub status: NodeStatus,
    pub detail: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Success and failure counters for one node of one workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStat {
    pub workflow_id: WorkflowId,
    pub node_id: NodeId,
    pub success_count: u64,
    pub failure_count: u64,
}

impl NodeStat {
    #[must_use]
    pub fn new(workflow_id: WorkflowId, node_id: NodeId) -> Self {
        Self {
            workflow_id,
            node_id,
            success_count: 0,
            failure_count: 0,
        }
    }

    /// Counts one invocation.
    pub fn record(&mut self, status: NodeStatus) {
        match status {
            NodeStatus::Success => self.success_count += 1,
            NodeStatus::Failed => self.failure_count += 1,
        }
    }
}

/// What the engine returns for a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub run_id: WorkflowRunId,
    pub workflow_id: WorkflowId,
    pub entry_node_id: NodeId,
    pub status: RunStatus,
    pub detail: Option<String>,
    /// Number of node invocations, including a failing one.
    pub steps: usize,
    /// The contact as it stood when the run ended.
    pub contact: Option<Contact>,
}

impl RunOutcome {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Success
    }
}

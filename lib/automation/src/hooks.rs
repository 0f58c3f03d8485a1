//! Lifecycle hooks.
//!
//! Hooks observe runs at four points: before and after the whole run, and
//! before and after each node. Handlers registered for a point are awaited
//! in registration order. A failing or panicking handler is logged and
//! skipped; it never changes the outcome of the run.

use crate::error::HookError;
use crate::execution::{NodeStatus, RunStatus};
use crate::node::{Node, NodeId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use relaydesk_core::{ContactId, TenantId, WorkflowId, WorkflowRunId};
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::warn;

/// The points a hook can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookName {
    WorkflowExecuteBefore,
    WorkflowExecuteAfter,
    NodeExecuteBefore,
    NodeExecuteAfter,
}

impl HookName {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WorkflowExecuteBefore => "workflowExecuteBefore",
            Self::WorkflowExecuteAfter => "workflowExecuteAfter",
            Self::NodeExecuteBefore => "nodeExecuteBefore",
            Self::NodeExecuteAfter => "nodeExecuteAfter",
        }
    }
}

impl fmt::Display for HookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the run a hook event belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInfo {
    pub run_id: WorkflowRunId,
    pub workflow_id: WorkflowId,
    pub tenant_id: TenantId,
    pub entry_node_id: NodeId,
    pub contact_id: Option<ContactId>,
    pub started_at: DateTime<Utc>,
}

/// The payload delivered to hook handlers.
#[derive(Debug, Clone)]
pub enum HookEvent<'a> {
    WorkflowExecuteBefore {
        run: &'a RunInfo,
    },
    WorkflowExecuteAfter {
        run: &'a RunInfo,
        status: RunStatus,
        detail: Option<&'a str>,
    },
    NodeExecuteBefore {
        run: &'a RunInfo,
        node: &'a Node,
    },
    NodeExecuteAfter {
        run: &'a RunInfo,
        node: &'a Node,
        status: NodeStatus,
        detail: Option<&'a str>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    },
}

impl HookEvent<'_> {
    /// The hook point this event is delivered to.
    #[must_use]
    pub fn name(&self) -> HookName {
        match self {
            Self::WorkflowExecuteBefore { .. } => HookName::WorkflowExecuteBefore,
            Self::WorkflowExecuteAfter { .. } => HookName::WorkflowExecuteAfter,
            Self::NodeExecuteBefore { .. } => HookName::NodeExecuteBefore,
            Self::NodeExecuteAfter { .. } => HookName::NodeExecuteAfter,
        }
    }

    #[must_use]
    pub fn run(&self) -> &RunInfo {
        match self {
            Self::WorkflowExecuteBefore { run }
            | Self::WorkflowExecuteAfter { run, .. }
            | Self::NodeExecuteBefore { run, .. }
            | Self::NodeExecuteAfter { run, .. } => run,
        }
    }
}

/// A lifecycle observer.
#[async_trait]
pub trait HookHandler: Send + Sync {
    /// Name used in logs when the handler fails.
    fn name(&self) -> &str;

    /// Handles one event.
    async fn handle(&self, event: &HookEvent<'_>) -> Result<(), HookError>;
}

/// Registry of hook handlers per hook point.
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    handlers: HashMap<HookName, Vec<Arc<dyn HookHandler>>>,
}

impl LifecycleHooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler to a hook point.
    pub fn register(&mut self, name: HookName, handler: Arc<dyn HookHandler>) {
        self.handlers.entry(name).or_default().push(handler);
    }

    /// Number of handlers attached to a hook point.
    #[must_use]
    pub fn handler_count(&self, name: HookName) -> usize {
        self.handlers.get(&name).map_or(0, Vec::len)
    }

    /// Delivers an event to every handler of its hook point, in order.
    pub async fn fire(&self, event: HookEvent<'_>) {
        let name = event.name();
        let Some(handlers) = self.handlers.get(&name) else {
            return;
        };
        for handler in handlers {
            let outcome = AssertUnwindSafe(handler.handle(&event))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    Err(HookError::Failed {
                        reason: "hook panicked".to_string(),
                    })
                });
            if let Err(error) = outcome {
                warn!(
                    hook = %name,
                    handler = handler.name(),
                    run_id = %event.run().run_id,
                    %error,
                    "lifecycle hook failed"
                );
            }
        }
    }
}

impl fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, handlers) in &self.handlers {
            let names: Vec<&str> = handlers.iter().map(|h| h.name()).collect();
            map.entry(name, &names);
        }
        map.finish()
    }
}

//! Run auditing through lifecycle hooks.
//!
//! [`AuditHooks`] writes the run record when a run starts, finalizes it
//! when the run ends, and appends a node log plus a statistics increment
//! for every non-trigger node. Trigger nodes only mark the entry point, so
//! they are not logged.

use crate::error::HookError;
use crate::execution::{NodeLog, RunRecord};
use crate::hooks::{HookEvent, HookHandler, HookName, LifecycleHooks};
use crate::store::RunLogger;
use async_trait::async_trait;
use relaydesk_core::NodeExecutionId;
use std::sync::Arc;

/// Hook handler persisting runs through a [`RunLogger`].
pub struct AuditHooks {
    logger: Arc<dyn RunLogger>,
}

impl AuditHooks {
    /// Attaches the audit handler to the run and node-after hook points.
    pub fn register(hooks: &mut LifecycleHooks, logger: Arc<dyn RunLogger>) {
        let audit: Arc<dyn HookHandler> = Arc::new(Self { logger });
        hooks.register(HookName::WorkflowExecuteBefore, Arc::clone(&audit));
        hooks.register(HookName::WorkflowExecuteAfter, Arc::clone(&audit));
        hooks.register(HookName::NodeExecuteAfter, audit);
    }
}

#[async_trait]
impl HookHandler for AuditHooks {
    fn name(&self) -> &str {
        "audit"
    }

    async fn handle(&self, event: &HookEvent<'_>) -> Result<(), HookError> {
        match event {
            HookEvent::WorkflowExecuteBefore { run } => {
                self.logger.create_run(&RunRecord::start(run)).await?;
            }
            HookEvent::WorkflowExecuteAfter {
                run,
                status,
                detail,
            } => {
                self.logger
                    .finish_run(run.run_id, *status, detail.map(str::to_string))
                    .await?;
            }
            HookEvent::NodeExecuteAfter {
                run,
                node,
                status,
                detail,
                started_at,
                finished_at,
            } => {
                if node.is_trigger() {
                    return Ok(());
                }
                let log = NodeLog {
                    id: NodeExecutionId::new(),
                    run_id: run.run_id,
                    node_id: node.id.clone(),
                    node_type: node.kind,
                    status: *status,
                    detail: detail.map(str::to_string),
                    started_at: *started_at,
                    finished_at: *finished_at,
                };
                self.logger.append_node_log(&log).await?;
                self.logger
                    .increment_node_stat(run.workflow_id, &node.id, *status)
                    .await?;
            }
            HookEvent::NodeExecuteBefore { .. } => {}
        }
        Ok(())
    }
}

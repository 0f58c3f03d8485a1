//! The workflow execution engine.
//!
//! A run starts at its entry node and repeatedly:
//! 1. fires `nodeExecuteBefore`
//! 2. invokes the node's handler under the per-node timeout
//! 3. fires `nodeExecuteAfter`
//! 4. follows the edge keyed by `(node, handle)` the handler chose
//!
//! The run succeeds when there is no edge to follow (or the edge points at
//! a node that does not exist). It fails on the first handler error,
//! timeout, panic, missing handler, or when the step or time limit is
//! reached.
//! `workflowExecuteBefore` and `workflowExecuteAfter` are fired exactly
//! once per run regardless of the outcome.

use crate::config::EngineConfig;
use crate::context::{ActionResult, ExecutionContext};
use crate::definition::Workflow;
use crate::edge::RouteKey;
use crate::error::RunError;
use crate::execution::{NodeStatus, RunOutcome, RunStatus};
use crate::handler::HandlerRegistry;
use crate::hooks::{HookEvent, LifecycleHooks, RunInfo};
use crate::node::{Node, NodeId};
use chrono::Utc;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Runs workflows.
#[derive(Debug, Clone)]
pub struct Engine {
    registry: HandlerRegistry,
    hooks: LifecycleHooks,
    config: EngineConfig,
}

impl Engine {
    #[must_use]
    pub fn new(registry: HandlerRegistry, hooks: LifecycleHooks, config: EngineConfig) -> Self {
        Self {
            registry,
            hooks,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Executes one run of `workflow` starting at `entry`.
    ///
    /// Never fails: the outcome carries the final status and, for failed
    /// runs, the reason.
    #[instrument(skip_all, fields(workflow_id = %workflow.id, run_id = %ctx.run_id, entry = %entry))]
    pub async fn run(
        &self,
        workflow: &Workflow,
        entry: &NodeId,
        mut ctx: ExecutionContext,
    ) -> RunOutcome {
        ctx.workflow_id = workflow.id;
        let run = RunInfo {
            run_id: ctx.run_id,
            workflow_id: workflow.id,
            tenant_id: ctx.tenant_id,
            entry_node_id: entry.clone(),
            contact_id: ctx.contact.as_ref().map(|c| c.id),
            started_at: Utc::now(),
        };

        self.hooks
            .fire(HookEvent::WorkflowExecuteBefore { run: &run })
            .await;

        let mut steps = 0;
        let result = self
            .walk(workflow, entry, &mut ctx, &run, &mut steps)
            .await;

        let (status, detail) = match &result {
            Ok(()) => {
                info!(steps, "run succeeded");
                (RunStatus::Success, None)
            }
            Err(error) => {
                match error.node_id() {
                    Some(node_id) => warn!(steps, %node_id, %error, "run failed at node"),
                    None => warn!(steps, %error, "run failed"),
                }
                (RunStatus::Failed, Some(error.to_string()))
            }
        };

        self.hooks
            .fire(HookEvent::WorkflowExecuteAfter {
                run: &run,
                status,
                detail: detail.as_deref(),
            })
            .await;

        RunOutcome {
            run_id: run.run_id,
            workflow_id: workflow.id,
            entry_node_id: entry.clone(),
            status,
            detail,
            steps,
            contact: ctx.contact,
        }
    }

    async fn walk(
        &self,
        workflow: &Workflow,
        entry: &NodeId,
        ctx: &mut ExecutionContext,
        run: &RunInfo,
        steps: &mut usize,
    ) -> Result<(), RunError> {
        let deadline = Instant::now() + self.config.run_timeout();
        let mut current = entry.clone();

        loop {
            let Some(node) = workflow.graph.node(&current) else {
                warn!(node_id = %current, "next node does not exist, ending run");
                return Ok(());
            };
            if *steps >= self.config.max_steps {
                return Err(RunError::StepLimitExceeded {
                    max_steps: self.config.max_steps,
                });
            }
            if Instant::now() >= deadline {
                return Err(RunError::RunTimeout {
                    timeout_secs: self.config.run_timeout_secs,
                });
            }

            *steps += 1;
            let result = self.execute_node(node, ctx, run).await?;
            if let Some(contact) = result.contact {
                ctx.contact = Some(contact);
            }

            let key = RouteKey::new(node.id.clone(), result.next_handle);
            match workflow.graph.route(&key) {
                Some(next) => current = next.clone(),
                None => {
                    debug!(route = %key, "no outgoing edge, run complete");
                    return Ok(());
                }
            }
        }
    }

    async fn execute_node(
        &self,
        node: &Node,
        ctx: &ExecutionContext,
        run: &RunInfo,
    ) -> Result<ActionResult, RunError> {
        let started_at = Utc::now();
        self.hooks
            .fire(HookEvent::NodeExecuteBefore { run, node })
            .await;

        let result = self.invoke(node, ctx).await;

        let (status, detail) = match &result {
            Ok(action) => (NodeStatus::Success, action.detail.clone()),
            Err(RunError::HandlerFailure { message, .. }) => {
                (NodeStatus::Failed, Some(message.clone()))
            }
            Err(other) => (NodeStatus::Failed, Some(other.to_string())),
        };
        self.hooks
            .fire(HookEvent::NodeExecuteAfter {
                run,
                node,
                status,
                detail: detail.as_deref(),
                started_at,
                finished_at: Utc::now(),
            })
            .await;

        result
    }

    async fn invoke(&self, node: &Node, ctx: &ExecutionContext) -> Result<ActionResult, RunError> {
        let Some(handler) = self.registry.get(node.kind) else {
            return Err(RunError::UnknownNodeType {
                node_id: node.id.clone(),
                node_type: node.kind.to_string(),
            });
        };

        let call = AssertUnwindSafe(handler.execute(node, ctx)).catch_unwind();
        match tokio::time::timeout(self.config.node_timeout(), call).await {
            Ok(Ok(Ok(result))) => {
                debug!(
                    node_id = %node.id,
                    node_type = %node.kind,
                    handle = ?result.next_handle,
                    "node executed"
                );
                Ok(result)
            }
            Ok(Ok(Err(error))) => Err(RunError::HandlerFailure {
                node_id: node.id.clone(),
                message: error.to_string(),
            }),
            Ok(Err(_)) => Err(RunError::HandlerFailure {
                node_id: node.id.clone(),
                message: "handler panicked".to_string(),
            }),
            Err(_) => Err(RunError::NodeTimeout {
                node_id: node.id.clone(),
                timeout_secs: self.config.node_timeout_secs,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::WorkflowDefinition;
    use crate::edge::Edge;
    use crate::execution::NodeStatus;
    use crate::hooks::HookName;
    use crate::node::NodeKind;
    use crate::audit::AuditHooks;
    use crate::testing::{
        FailingHook, Harness, HookLog, PanickingHandler, PanickingHook, RecordingHook, SlowHandler,
    };
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn welcome(harness: &Harness) -> WorkflowDefinition {
        harness
            .definition("Welcome")
            .with_node("t", "new_contact_with_tag", json!({ "tag": "vip" }))
            .with_node("a", "add_tag", json!({ "tags": ["welcomed"] }))
            .with_node("s", "send_text_message", json!({ "message": "Hi {{contact.name}}" }))
            .with_edge(Edge::new("t", "a"))
            .with_edge(Edge::new("a", "s"))
    }

    fn entry() -> NodeId {
        NodeId::new("t")
    }

    /// Audit hooks plus a recorder on every hook point.
    fn recorded_hooks(harness: &Harness) -> (LifecycleHooks, HookLog) {
        let log = RecordingHook::shared_log();
        let mut hooks = harness.audited_hooks();
        let recorder: Arc<RecordingHook> = Arc::new(RecordingHook::with_log("rec", log.clone()));
        for name in [
            HookName::WorkflowExecuteBefore,
            HookName::WorkflowExecuteAfter,
            HookName::NodeExecuteBefore,
            HookName::NodeExecuteAfter,
        ] {
            hooks.register(name, recorder.clone());
        }
        (hooks, log)
    }

    #[tokio::test]
    async fn linear_run_succeeds_and_threads_the_contact() {
        let harness = Harness::new();
        let workflow = harness.workflow(welcome(&harness));
        let engine = harness.engine(EngineConfig::default());

        let outcome = engine.run(&workflow, &entry(), harness.context()).await;

        assert_eq!(outcome.status, RunStatus::Success);
        assert_eq!(outcome.steps, 3);
        assert!(outcome.detail.is_none());
        assert!(outcome.contact.expect("contact").has_tag("welcomed"));
        assert_eq!(harness.sender.sent().len(), 1);

        let record = harness.runs.run(outcome.run_id).expect("record");
        assert_eq!(record.status, RunStatus::Success);
        assert_eq!(record.workflow_id, workflow.id);
        assert_eq!(harness.runs.node_logs(outcome.run_id).len(), 2);
    }

    #[tokio::test]
    async fn condition_follows_the_chosen_handle() {
        let harness = Harness::new();
        let definition = harness
            .definition("Branch")
            .with_node("t", "new_contact", json!({}))
            .with_node(
                "c",
                "condition",
                json!({ "conditions": [{ "variable": "contact.name", "operator": "equals", "value": "Bia" }] }),
            )
            .with_node("yes", "add_tag", json!({ "tag": "is-bia" }))
            .with_node("no", "add_tag", json!({ "tag": "not-bia" }))
            .with_edge(Edge::new("t", "c"))
            .with_edge(Edge::branch("c", "yes", "yes"))
            .with_edge(Edge::branch("c", "no", "no"));
        let workflow = harness.workflow(definition);

        let outcome = harness
            .engine(EngineConfig::default())
            .run(&workflow, &entry(), harness.context())
            .await;

        let contact = outcome.contact.expect("contact");
        assert!(contact.has_tag("not-bia"));
        assert!(!contact.has_tag("is-bia"));
        assert_eq!(outcome.steps, 3);
    }

    #[tokio::test]
    async fn missing_edge_for_handle_ends_successfully() {
        let harness = Harness::new();
        let definition = harness
            .definition("Only yes")
            .with_node("t", "new_contact", json!({}))
            .with_node("c", "condition", json!({ "conditions": [{ "variable": "contact.name", "operator": "is_empty" }] }))
            .with_node("y", "add_tag", json!({ "tag": "x" }))
            .with_edge(Edge::new("t", "c"))
            .with_edge(Edge::branch("c", "yes", "y"));
        let workflow = harness.workflow(definition);

        let outcome = harness
            .engine(EngineConfig::default())
            .run(&workflow, &entry(), harness.context())
            .await;
        assert_eq!(outcome.status, RunStatus::Success);
        assert_eq!(outcome.steps, 2);
    }

    #[tokio::test]
    async fn dangling_edge_ends_successfully() {
        let harness = Harness::new();
        let definition = harness
            .definition("Dangling")
            .with_node("t", "new_contact", json!({}))
            .with_edge(Edge::new("t", "deleted-node"));
        let workflow = harness.workflow(definition);

        let outcome = harness
            .engine(EngineConfig::default())
            .run(&workflow, &entry(), harness.context())
            .await;
        assert_eq!(outcome.status, RunStatus::Success);
        assert_eq!(outcome.steps, 1);
    }

    #[tokio::test]
    async fn single_node_run_fires_one_pair_of_each_hook() {
        let harness = Harness::new();
        let workflow = harness.workflow(harness.definition("Lonely").with_node(
            "t",
            "new_contact",
            json!({}),
        ));
        let (hooks, log) = recorded_hooks(&harness);
        let engine = Engine::new(harness.registry(), hooks, EngineConfig::default());

        let outcome = engine.run(&workflow, &entry(), harness.context()).await;

        assert_eq!(outcome.status, RunStatus::Success);
        assert_eq!(outcome.steps, 1);
        assert_eq!(
            RecordingHook::entries(&log),
            vec![
                "rec:workflowExecuteBefore",
                "rec:nodeExecuteBefore:t",
                "rec:nodeExecuteAfter:t:success",
                "rec:workflowExecuteAfter:success",
            ]
        );
    }

    #[tokio::test]
    async fn failing_node_fires_one_failed_after_of_each_kind() {
        let harness = Harness::new();
        let definition = harness
            .definition("Broken send")
            .with_node("t", "new_contact", json!({}))
            .with_node("s", "send_text_message", json!({}))
            .with_node("a", "add_tag", json!({ "tag": "never" }))
            .with_edge(Edge::new("t", "s"))
            .with_edge(Edge::new("s", "a"));
        let workflow = harness.workflow(definition);
        let (hooks, log) = recorded_hooks(&harness);
        let engine = Engine::new(harness.registry(), hooks, EngineConfig::default());

        let outcome = engine.run(&workflow, &entry(), harness.context()).await;

        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(
            RecordingHook::entries(&log),
            vec![
                "rec:workflowExecuteBefore",
                "rec:nodeExecuteBefore:t",
                "rec:nodeExecuteAfter:t:success",
                "rec:nodeExecuteBefore:s",
                "rec:nodeExecuteAfter:s:failed",
                "rec:workflowExecuteAfter:failed",
            ]
        );
    }

    #[tokio::test]
    async fn panicking_hook_does_not_change_the_outcome() {
        let harness = Harness::new();
        let workflow = harness.workflow(welcome(&harness));
        let mut hooks = LifecycleHooks::new();
        for name in [
            HookName::WorkflowExecuteBefore,
            HookName::WorkflowExecuteAfter,
            HookName::NodeExecuteBefore,
            HookName::NodeExecuteAfter,
        ] {
            hooks.register(name, Arc::new(PanickingHook));
        }
        AuditHooks::register(&mut hooks, harness.runs.clone());
        let engine = Engine::new(harness.registry(), hooks, EngineConfig::default());

        let outcome = engine.run(&workflow, &entry(), harness.context()).await;

        assert_eq!(outcome.status, RunStatus::Success);
        assert_eq!(outcome.steps, 3);
        assert_eq!(harness.sender.sent().len(), 1);
        let record = harness.runs.run(outcome.run_id).expect("record");
        assert_eq!(record.status, RunStatus::Success);
        assert_eq!(harness.runs.node_logs(outcome.run_id).len(), 2);
    }

    #[tokio::test]
    async fn cycle_hits_the_step_limit_with_paired_hooks() {
        let harness = Harness::new();
        let definition = harness
            .definition("Loop")
            .with_node("t", "new_contact", json!({}))
            .with_node("a", "add_tag", json!({ "tag": "loop" }))
            .with_edge(Edge::new("t", "a"))
            .with_edge(Edge::new("a", "t"));
        let workflow = harness.workflow(definition);

        let (hooks, log) = recorded_hooks(&harness);
        let config = EngineConfig {
            max_steps: 5,
            ..EngineConfig::default()
        };
        let engine = Engine::new(harness.registry(), hooks, config);

        let outcome = engine.run(&workflow, &entry(), harness.context()).await;

        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(outcome.steps, 5);
        assert_eq!(
            outcome.detail.as_deref(),
            Some("run exceeded the limit of 5 steps")
        );

        let entries = RecordingHook::entries(&log);
        let count = |prefix: &str| entries.iter().filter(|e| e.starts_with(prefix)).count();
        assert_eq!(count("rec:workflowExecuteBefore"), 1);
        assert_eq!(count("rec:workflowExecuteAfter"), 1);
        assert_eq!(count("rec:nodeExecuteBefore"), 5);
        assert_eq!(count("rec:nodeExecuteAfter"), 5);
        assert_eq!(
            entries.last().map(String::as_str),
            Some("rec:workflowExecuteAfter:failed")
        );
    }

    #[tokio::test]
    async fn handler_failure_stops_the_run_with_its_message() {
        let harness = Harness::new();
        let definition = harness
            .definition("Broken send")
            .with_node("t", "new_contact", json!({}))
            .with_node("s", "send_text_message", json!({}))
            .with_node("a", "add_tag", json!({ "tag": "never" }))
            .with_edge(Edge::new("t", "s"))
            .with_edge(Edge::new("s", "a"));
        let workflow = harness.workflow(definition);

        let outcome = harness
            .engine(EngineConfig::default())
            .run(&workflow, &entry(), harness.context())
            .await;

        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(outcome.steps, 2);
        let detail = outcome.detail.expect("detail");
        assert!(detail.starts_with("node s failed: invalid node config"), "{detail}");
        assert!(!outcome.contact.expect("contact").has_tag("never"));

        let record = harness.runs.run(outcome.run_id).expect("record");
        assert_eq!(record.status, RunStatus::Failed);
        assert_eq!(record.detail.as_deref(), Some(detail.as_str()));
        let logs = harness.runs.node_logs(outcome.run_id);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, NodeStatus::Failed);
        assert_eq!(
            harness
                .runs
                .node_stat(workflow.id, &NodeId::new("s"))
                .map(|s| s.failure_count),
            Some(1)
        );
    }

    #[tokio::test]
    async fn missing_handler_is_unknown_node_type() {
        let harness = Harness::new();
        let workflow = harness.workflow(welcome(&harness));
        let mut registry = harness.registry();
        registry.unregister(NodeKind::AddTag);
        let engine = Engine::new(registry, harness.audited_hooks(), EngineConfig::default());

        let outcome = engine.run(&workflow, &entry(), harness.context()).await;
        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(
            outcome.detail.as_deref(),
            Some("no handler for node a of type 'add_tag'")
        );
        assert!(harness.sender.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_handler_times_out() {
        let harness = Harness::new();
        let workflow = harness.workflow(welcome(&harness));
        let mut registry = harness.registry();
        registry.register(
            NodeKind::AddTag,
            Arc::new(SlowHandler(Duration::from_secs(120))),
        );
        let config = EngineConfig {
            node_timeout_secs: 5,
            ..EngineConfig::default()
        };
        let engine = Engine::new(registry, harness.audited_hooks(), config);

        let outcome = engine.run(&workflow, &entry(), harness.context()).await;
        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(
            outcome.detail.as_deref(),
            Some("node a timed out after 5s")
        );
    }

    #[tokio::test]
    async fn exhausted_run_budget_fails_before_any_node() {
        let harness = Harness::new();
        let workflow = harness.workflow(welcome(&harness));
        let config = EngineConfig {
            run_timeout_secs: 0,
            ..EngineConfig::default()
        };

        let outcome = harness
            .engine(config)
            .run(&workflow, &entry(), harness.context())
            .await;
        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(outcome.steps, 0);
        assert_eq!(
            harness.runs.run(outcome.run_id).map(|r| r.status),
            Some(RunStatus::Failed)
        );
    }

    #[tokio::test]
    async fn failing_hook_does_not_change_the_outcome() {
        let harness = Harness::new();
        let workflow = harness.workflow(welcome(&harness));
        let mut hooks = harness.audited_hooks();
        hooks.register(HookName::NodeExecuteAfter, Arc::new(FailingHook));
        hooks.register(HookName::WorkflowExecuteBefore, Arc::new(FailingHook));
        let engine = Engine::new(harness.registry(), hooks, EngineConfig::default());

        let outcome = engine.run(&workflow, &entry(), harness.context()).await;
        assert_eq!(outcome.status, RunStatus::Success);
        assert_eq!(harness.runs.node_logs(outcome.run_id).len(), 2);
    }

    #[tokio::test]
    async fn panicking_handler_fails_the_run() {
        let harness = Harness::new();
        let workflow = harness.workflow(welcome(&harness));
        let mut registry = harness.registry();
        registry.register(NodeKind::SendTextMessage, Arc::new(PanickingHandler));
        let engine = Engine::new(registry, harness.audited_hooks(), EngineConfig::default());

        let outcome = engine.run(&workflow, &entry(), harness.context()).await;
        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(outcome.detail.as_deref(), Some("node s failed: handler panicked"));
        assert_eq!(
            harness.runs.run(outcome.run_id).map(|r| r.status),
            Some(RunStatus::Failed)
        );
    }
}

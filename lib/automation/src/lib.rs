//! Automation engine for the relaydesk messaging CRM.
//!
//! Inbound events (chat messages, button taps, new contacts, tag changes,
//! deals, webhooks) start workflow runs. This crate provides:
//!
//! - **Model**: workflows as a petgraph-backed node/edge graph with a
//!   `(source, sourceHandle)` routing table
//! - **Variable resolver**: `{{path}}` substitution for text and JSON payloads
//! - **Trigger matcher** and **event dispatcher**: from event to concurrent runs
//! - **Handler registry**: one built-in handler per node type
//! - **Execution engine**: the per-run state machine, bounded by step and
//!   time limits
//! - **Lifecycle hooks**: ordered observers for audit logging and node stats

pub mod audit;
pub mod config;
pub mod context;
pub mod definition;
pub mod dispatcher;
pub mod edge;
pub mod engine;
pub mod error;
pub mod execution;
pub mod graph;
pub mod handler;
pub mod hooks;
pub mod matcher;
pub mod memory;
pub mod node;
pub mod resolver;
pub mod store;
pub mod trigger;

#[cfg(test)]
pub(crate) mod testing;

pub use audit::AuditHooks;
pub use config::EngineConfig;
pub use context::{ActionResult, Contact, ExecutionContext, TenantProfile};
pub use definition::{NodeDefinition, Workflow, WorkflowDefinition, WorkflowStatus};
pub use dispatcher::{DispatchReport, EventDispatcher, InboundEvent};
pub use edge::{Edge, RouteKey};
pub use engine::Engine;
pub use error::{DispatchError, GraphError, HandlerError, HookError, RunError, StoreError};
pub use execution::{NodeLog, NodeStat, NodeStatus, RunOutcome, RunRecord, RunStatus};
pub use graph::WorkflowGraph;
pub use handler::{ActionHandler, HandlerDeps, HandlerRegistry};
pub use hooks::{HookEvent, HookHandler, HookName, LifecycleHooks, RunInfo};
pub use matcher::{TriggerMatch, TriggerMatcher};
pub use node::{Node, NodeCategory, NodeId, NodeKind};
pub use store::{ContactStore, RunLogger, TenantStore, TriggerIndex, WorkflowStore};
pub use trigger::{EventType, MatchStrategy, TriggerRegistration, TriggerType};

//! Workflow definition types.
//!
//! A [`WorkflowDefinition`] is the raw shape the editor saves: a node list
//! and an edge list with string type tags. Converting it into a
//! [`Workflow`] validates the nodes and builds the [`WorkflowGraph`] the
//! engine walks. `Workflow` serializes back to the definition shape.

use crate::edge::Edge;
use crate::error::GraphError;
use crate::graph::WorkflowGraph;
use crate::node::{Node, NodeId, NodeKind};
use chrono::{DateTime, Utc};
use relaydesk_core::{TenantId, WorkflowId};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use tracing::warn;

/// Publication status of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Being edited; never started by events.
    #[default]
    Draft,
    /// Live; started by matching events.
    Active,
    /// Temporarily switched off.
    Paused,
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Paused => "paused",
        })
    }
}

/// A node as saved by the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub config: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A workflow as saved by the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    pub id: WorkflowId,
    pub tenant_id: TenantId,
    pub name: String,
    #[serde(default)]
    pub status: WorkflowStatus,
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl WorkflowDefinition {
    /// Creates an empty draft definition.
    #[must_use]
    pub fn new(tenant_id: TenantId, name: impl Into<String>) -> Self {
        Self {
            id: WorkflowId::new(),
            tenant_id,
            name: name.into(),
            status: WorkflowStatus::Draft,
            nodes: Vec::new(),
            edges: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Sets the status.
    #[must_use]
    pub fn with_status(mut self, status: WorkflowStatus) -> Self {
        self.status = status;
        self
    }

    /// Appends a node.
    #[must_use]
    pub fn with_node(
        mut self,
        id: impl Into<String>,
        node_type: impl Into<String>,
        config: JsonValue,
    ) -> Self {
        self.nodes.push(NodeDefinition {
            id: id.into(),
            node_type: node_type.into(),
            config,
            name: None,
        });
        self
    }

    /// Appends an edge.
    #[must_use]
    pub fn with_edge(mut self, edge: Edge) -> Self {
        self.edges.push(edge);
        self
    }
}

/// A validated workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "WorkflowDefinition", into = "WorkflowDefinition")]
pub struct Workflow {
    pub id: WorkflowId,
    pub tenant_id: TenantId,
    pub name: String,
    pub status: WorkflowStatus,
    pub graph: WorkflowGraph,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Whether events may start runs of this workflow.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == WorkflowStatus::Active
    }

    /// Returns a node by id.
    #[must_use]
    pub fn node(&self, node_id: &NodeId) -> Option<&Node> {
        self.graph.node(node_id)
    }
}

impl TryFrom<WorkflowDefinition> for Workflow {
    type Error = GraphError;

    fn try_from(definition: WorkflowDefinition) -> Result<Self, Self::Error> {
        let WorkflowDefinition {
            id,
            tenant_id,
            name,
            status,
            nodes,
            edges,
            updated_at,
        } = definition;

        let mut graph = WorkflowGraph::new();
        for node in nodes {
            let node_id = NodeId::new(node.id);
            if node_id.as_str().is_empty() {
                return Err(GraphError::EmptyNodeId);
            }
            let kind = node
                .node_type
                .parse::<NodeKind>()
                .map_err(|e| GraphError::UnknownNodeType {
                    node_id: node_id.clone(),
                    node_type: e.0,
                })?;
            graph.add_node(Node {
                id: node_id,
                kind,
                name: node.name,
                config: node.config,
            })?;
        }

        for edge in edges {
            if let Some(replaced) = graph.add_edge(edge) {
                warn!(
                    workflow_id = %id,
                    route = %replaced.route_key(),
                    dropped_target = %replaced.target,
                    "duplicate routing key, keeping the later edge"
                );
            }
        }
        for edge in graph.dangling_edges() {
            warn!(
                workflow_id = %id,
                source = %edge.source,
                target = %edge.target,
                "edge references a missing node"
            );
        }
        if graph.has_cycle() {
            warn!(workflow_id = %id, "workflow graph contains a cycle");
        }

        Ok(Self {
            id,
            tenant_id,
            name,
            status,
            graph,
            updated_at,
        })
    }
}

impl From<Workflow> for WorkflowDefinition {
    fn from(workflow: Workflow) -> Self {
        let nodes = workflow
            .graph
            .nodes()
            .map(|node| NodeDefinition {
                id: node.id.to_string(),
                node_type: node.kind.as_str().to_string(),
                config: node.config.clone(),
                name: node.name.clone(),
            })
            .collect();
        let mut edges: Vec<Edge> = workflow.graph.edges().cloned().collect();
        edges.sort_by(|a, b| {
            (&a.source, &a.source_handle).cmp(&(&b.source, &b.source_handle))
        });

        Self {
            id: workflow.id,
            tenant_id: workflow.tenant_id,
            name: workflow.name,
            status: workflow.status,
            nodes,
            edges,
            updated_at: workflow.updated_at,
        }
    }
}

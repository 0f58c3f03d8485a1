//! Workflow graph implementation using petgraph.
//!
//! The graph keeps two views of the same edges:
//! - a petgraph directed graph, used for structural questions (cycles,
//!   entry points)
//! - a routing table keyed by `(source, handle)`, used by the engine to pick
//!   the next node
//!
//! At most one edge exists per routing key. Adding a second edge with the
//! same key replaces the first.

use crate::edge::{Edge, RouteKey};
use crate::error::GraphError;
use crate::node::{Node, NodeId};
use petgraph::algo::is_cyclic_directed;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Route {
    edge: Edge,
    /// Absent when the edge points at a node that is not in the graph.
    index: Option<EdgeIndex>,
}

/// A workflow graph.
#[derive(Debug, Clone, Default)]
pub struct WorkflowGraph {
    graph: StableDiGraph<Node, Option<String>>,
    node_index_map: HashMap<NodeId, NodeIndex>,
    routes: HashMap<RouteKey, Route>,
}

impl WorkflowGraph {
    /// Creates a new empty workflow graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node to the graph.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is empty or already used.
    pub fn add_node(&mut self, node: Node) -> Result<(), GraphError> {
        if node.id.as_str().is_empty() {
            return Err(GraphError::EmptyNodeId);
        }
        if self.node_index_map.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode { node_id: node.id });
        }
        let node_id = node.id.clone();
        let index = self.graph.add_node(node);
        self.node_index_map.insert(node_id, index);
        Ok(())
    }

    /// Adds an edge, replacing any edge with the same routing key.
    ///
    /// Returns the replaced edge. Edges may point at nodes that do not
    /// exist; such edges stay in the routing table but not in the
    /// structural view.
    pub fn add_edge(&mut self, edge: Edge) -> Option<Edge> {
        let index = match (
            self.node_index_map.get(&edge.source),
            self.node_index_map.get(&edge.target),
        ) {
            (Some(&source), Some(&target)) => {
                Some(self.graph.add_edge(source, target, edge.source_handle.clone()))
            }
            _ => None,
        };

        let replaced = self.routes.insert(edge.route_key(), Route { edge, index })?;
        if let Some(old) = replaced.index {
            self.graph.remove_edge(old);
        }
        Some(replaced.edge)
    }

    /// Returns a node by its id.
    #[must_use]
    pub fn node(&self, node_id: &NodeId) -> Option<&Node> {
        let index = self.node_index_map.get(node_id)?;
        self.graph.node_weight(*index)
    }

    /// Returns all nodes.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    /// Returns all trigger nodes.
    pub fn trigger_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes().filter(|node| node.is_trigger())
    }

    /// Returns all edges in the routing table.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.routes.values().map(|route| &route.edge)
    }

    /// Looks up the target for a routing key.
    #[must_use]
    pub fn route(&self, key: &RouteKey) -> Option<&NodeId> {
        self.routes.get(key).map(|route| &route.edge.target)
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of edges in the routing table.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.routes.len()
    }

    /// Whether any node can reach itself.
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Returns edges whose source or target is not a node of this graph.
    #[must_use]
    pub fn dangling_edges(&self) -> Vec<&Edge> {
        self.routes
            .values()
            .filter(|route| route.index.is_none())
            .map(|route| &route.edge)
            .collect()
    }
}

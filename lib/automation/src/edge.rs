//! Edge types for workflow graphs.
//!
//! An edge leaves a node through an optional handle and enters its target.
//! Branching nodes pick the handle (`"yes"`, `"no"`, `"0"`, `"else"`, ...);
//! every other node leaves through the default, handle-less edge.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An edge as stored in a workflow definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// The node the edge leaves.
    pub source: NodeId,
    /// The branch handle on the source node, absent for the default edge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    /// The node the edge enters.
    pub target: NodeId,
}

impl Edge {
    /// Creates a default (handle-less) edge.
    #[must_use]
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            source: source.into(),
            source_handle: None,
            target: target.into(),
        }
    }

    /// Creates an edge leaving through a named handle.
    #[must_use]
    pub fn branch(
        source: impl Into<NodeId>,
        handle: impl Into<String>,
        target: impl Into<NodeId>,
    ) -> Self {
        Self {
            source: source.into(),
            source_handle: Some(handle.into()),
            target: target.into(),
        }
    }

    /// The routing key this edge answers to.
    #[must_use]
    pub fn route_key(&self) -> RouteKey {
        RouteKey::new(self.source.clone(), self.source_handle.clone())
    }
}

/// Key of the routing table: the node just executed and the handle it chose.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub source: NodeId,
    pub handle: Option<String>,
}

impl RouteKey {
    #[must_use]
    pub fn new(source: NodeId, handle: Option<String>) -> Self {
        Self { source, handle }
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.handle {
            Some(handle) => write!(f, "{}:{handle}", self.source),
            None => write!(f, "{}", self.source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_editor_shape() {
        let edge: Edge = serde_json::from_value(json!({
            "source": "cond",
            "sourceHandle": "yes",
            "target": "send",
        }))
        .expect("deserialize");
        assert_eq!(edge, Edge::branch("cond", "yes", "send"));
    }

    #[test]
    fn default_edge_omits_handle() {
        let json = serde_json::to_value(Edge::new("a", "b")).expect("serialize");
        assert!(json.get("sourceHandle").is_none());
    }

    #[test]
    fn route_key_display() {
        assert_eq!(Edge::new("a", "b").route_key().to_string(), "a");
        assert_eq!(Edge::branch("a", "no", "b").route_key().to_string(), "a:no");
    }
}

//! Action handlers.
//!
//! Every node type has exactly one handler. A handler reads the node's
//! config and the run context, performs its side effect, and tells the
//! engine which handle to leave through.

pub mod contact;
pub mod logic;
pub mod messaging;
pub mod trigger;
pub mod webhook;

use crate::context::{ActionResult, Contact, ExecutionContext};
use crate::error::HandlerError;
use crate::node::{Node, NodeCategory, NodeKind};
use crate::store::ContactStore;
use async_trait::async_trait;
use relaydesk_integration::{MessageSender, WebhookClient};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Executes one node type.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Runs the node.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] when the config is unusable or the side
    /// effect fails. The run ends in `failed` with the error text.
    async fn execute(
        &self,
        node: &Node,
        ctx: &ExecutionContext,
    ) -> Result<ActionResult, HandlerError>;
}

/// Collaborators the built-in handlers need.
#[derive(Clone)]
pub struct HandlerDeps {
    pub contacts: Arc<dyn ContactStore>,
    pub sender: Arc<dyn MessageSender>,
    pub webhooks: Arc<dyn WebhookClient>,
    /// Default for webhook nodes that do not set `fail_on_error_status`.
    pub fail_webhook_on_error_status: bool,
}

/// Node type to handler lookup.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<NodeKind, Arc<dyn ActionHandler>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with a handler for every node type.
    #[must_use]
    pub fn builtin(deps: HandlerDeps) -> Self {
        let mut registry = Self::new();

        let pass_through: Arc<dyn ActionHandler> = Arc::new(trigger::TriggerPassThrough);
        for kind in NodeKind::ALL {
            if kind.category() == NodeCategory::Trigger {
                registry.register(kind, Arc::clone(&pass_through));
            }
        }

        registry.register(
            NodeKind::AddTag,
            Arc::new(contact::AddTagHandler::new(Arc::clone(&deps.contacts))),
        );
        registry.register(
            NodeKind::RemoveTag,
            Arc::new(contact::RemoveTagHandler::new(Arc::clone(&deps.contacts))),
        );
        registry.register(
            NodeKind::SetCustomField,
            Arc::new(contact::SetCustomFieldHandler::new(deps.contacts)),
        );

        let send: Arc<dyn ActionHandler> = Arc::new(messaging::SendMessageHandler::new(deps.sender));
        for kind in NodeKind::ALL {
            if kind.category() == NodeCategory::Messaging {
                registry.register(kind, Arc::clone(&send));
            }
        }

        registry.register(
            NodeKind::SendWebhook,
            Arc::new(webhook::SendWebhookHandler::new(
                deps.webhooks,
                deps.fail_webhook_on_error_status,
            )),
        );
        registry.register(NodeKind::Condition, Arc::new(logic::ConditionHandler));
        registry.register(NodeKind::SplitPath, Arc::new(logic::SplitPathHandler));

        registry
    }

    /// Registers a handler, returning the one it replaces.
    pub fn register(
        &mut self,
        kind: NodeKind,
        handler: Arc<dyn ActionHandler>,
    ) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.insert(kind, handler)
    }

    /// Removes the handler of a node type.
    pub fn unregister(&mut self, kind: NodeKind) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.remove(&kind)
    }

    /// Looks up the handler of a node type.
    #[must_use]
    pub fn get(&self, kind: NodeKind) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(&kind).cloned()
    }

    #[must_use]
    pub fn contains(&self, kind: NodeKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&str> = self.handlers.keys().map(NodeKind::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("HandlerRegistry").field("kinds", &kinds).finish()
    }
}

/// Deserializes a node's config; a missing config reads as `{}`.
pub(crate) fn parse_config<T: DeserializeOwned>(node: &Node) -> Result<T, HandlerError> {
    let config = match &node.config {
        JsonValue::Null => JsonValue::Object(serde_json::Map::new()),
        other => other.clone(),
    };
    serde_json::from_value(config)
        .map_err(|e| HandlerError::invalid_config(format!("{} node {}: {e}", node.kind, node.id)))
}

/// The run's contact, or an error for nodes that need one.
pub(crate) fn require_contact(ctx: &ExecutionContext) -> Result<&Contact, HandlerError> {
    ctx.contact.as_ref().ok_or(HandlerError::MissingContact)
}

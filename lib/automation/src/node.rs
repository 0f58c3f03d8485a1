//! Workflow node types.
//!
//! Every node has an id that is unique within its workflow, a type tag from
//! a closed set, and a free-form JSON configuration whose shape depends on
//! the type. The type decides which handler runs the node.

use crate::trigger::TriggerType;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

/// Identifier of a node within a workflow.
///
/// Node ids come from the workflow editor, so they are plain strings rather
/// than generated ULIDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Creates a node id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The category of a workflow node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    /// Entry points matched against inbound events.
    Trigger,
    /// Contact mutations (tags, custom fields).
    Contact,
    /// Outbound messages to the contact.
    Messaging,
    /// Calls to external systems.
    Integration,
    /// Branching.
    Logic,
}

/// The type tag of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    MessageReceivedWithKeyword,
    ButtonClicked,
    NewContact,
    NewContactWithTag,
    WebhookReceived,
    DealCreated,
    DealStageChanged,
    AddTag,
    RemoveTag,
    SetCustomField,
    SendTemplate,
    SendTextMessage,
    SendMedia,
    SendInteractiveMessage,
    SendWebhook,
    Condition,
    SplitPath,
}

impl NodeKind {
    /// Every node type, triggers first.
    pub const ALL: [Self; 17] = [
        Self::MessageReceivedWithKeyword,
        Self::ButtonClicked,
        Self::NewContact,
        Self::NewContactWithTag,
        Self::WebhookReceived,
        Self::DealCreated,
        Self::DealStageChanged,
        Self::AddTag,
        Self::RemoveTag,
        Self::SetCustomField,
        Self::SendTemplate,
        Self::SendTextMessage,
        Self::SendMedia,
        Self::SendInteractiveMessage,
        Self::SendWebhook,
        Self::Condition,
        Self::SplitPath,
    ];

    /// Returns the wire tag.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MessageReceivedWithKeyword => "message_received_with_keyword",
            Self::ButtonClicked => "button_clicked",
            Self::NewContact => "new_contact",
            Self::NewContactWithTag => "new_contact_with_tag",
            Self::WebhookReceived => "webhook_received",
            Self::DealCreated => "deal_created",
            Self::DealStageChanged => "deal_stage_changed",
            Self::AddTag => "add_tag",
            Self::RemoveTag => "remove_tag",
            Self::SetCustomField => "set_custom_field",
            Self::SendTemplate => "send_template",
            Self::SendTextMessage => "send_text_message",
            Self::SendMedia => "send_media",
            Self::SendInteractiveMessage => "send_interactive_message",
            Self::SendWebhook => "send_webhook",
            Self::Condition => "condition",
            Self::SplitPath => "split_path",
        }
    }

    /// Returns the category of this node type.
    #[must_use]
    pub fn category(&self) -> NodeCategory {
        match self {
            Self::MessageReceivedWithKeyword
            | Self::ButtonClicked
            | Self::NewContact
            | Self::NewContactWithTag
            | Self::WebhookReceived
            | Self::DealCreated
            | Self::DealStageChanged => NodeCategory::Trigger,
            Self::AddTag | Self::RemoveTag | Self::SetCustomField => NodeCategory::Contact,
            Self::SendTemplate
            | Self::SendTextMessage
            | Self::SendMedia
            | Self::SendInteractiveMessage => NodeCategory::Messaging,
            Self::SendWebhook => NodeCategory::Integration,
            Self::Condition | Self::SplitPath => NodeCategory::Logic,
        }
    }

    /// The trigger type this node registers, if it is a trigger node.
    #[must_use]
    pub fn trigger_type(&self) -> Option<TriggerType> {
        TriggerType::ALL
            .into_iter()
            .find(|trigger| trigger.node_kind() == *self)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a type tag names no known node type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownNodeKind(pub String);

impl fmt::Display for UnknownNodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown node type '{}'", self.0)
    }
}

impl std::error::Error for UnknownNodeKind {}

impl FromStr for NodeKind {
    type Err = UnknownNodeKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownNodeKind(s.to_string()))
    }
}

/// A node in a workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier within the workflow.
    pub id: NodeId,
    /// The node's type tag.
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Display name shown in the editor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Type-specific configuration.
    #[serde(default)]
    pub config: JsonValue,
}

impl Node {
    /// Creates a node.
    #[must_use]
    pub fn new(id: impl Into<NodeId>, kind: NodeKind, config: JsonValue) -> Self {
        Self {
            id: id.into(),
            kind,
            name: None,
            config,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns the node's category.
    #[must_use]
    pub fn category(&self) -> NodeCategory {
        self.kind.category()
    }

    /// Whether this is a trigger node.
    #[must_use]
    pub fn is_trigger(&self) -> bool {
        self.category() == NodeCategory::Trigger
    }
}

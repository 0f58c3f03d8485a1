//! Trigger types for workflow initiation.
//!
//! Trigger nodes are entry points in the workflow graph. They are
//! denormalized into a trigger index (one [`TriggerRegistration`] per
//! trigger node and key) so an inbound event can be matched without
//! loading every workflow of the tenant.

use crate::definition::Workflow;
use crate::node::{Node, NodeId, NodeKind};
use chrono::{DateTime, Utc};
use relaydesk_core::{TenantId, TriggerId, WorkflowId};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::fmt;
use tracing::warn;

/// The kind of inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A contact sent a chat message.
    MessageReceived,
    /// A contact tapped an interactive button.
    ButtonClicked,
    /// A contact was created.
    ContactCreated,
    /// A tag was added to a contact.
    TagAdded,
    /// A tenant-defined inbound webhook was called.
    WebhookReceived,
    /// A deal was created.
    DealCreated,
    /// A deal moved to another pipeline stage.
    DealStageChanged,
}

impl EventType {
    /// Returns the wire tag.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MessageReceived => "message_received",
            Self::ButtonClicked => "button_clicked",
            Self::ContactCreated => "contact_created",
            Self::TagAdded => "tag_added",
            Self::WebhookReceived => "webhook_received",
            Self::DealCreated => "deal_created",
            Self::DealStageChanged => "deal_stage_changed",
        }
    }

    /// The trigger type events of this kind are matched against.
    #[must_use]
    pub fn trigger_type(&self) -> TriggerType {
        match self {
            Self::MessageReceived => TriggerType::MessageReceivedWithKeyword,
            Self::ButtonClicked => TriggerType::ButtonClicked,
            Self::ContactCreated => TriggerType::NewContact,
            Self::TagAdded => TriggerType::NewContactWithTag,
            Self::WebhookReceived => TriggerType::WebhookReceived,
            Self::DealCreated => TriggerType::DealCreated,
            Self::DealStageChanged => TriggerType::DealStageChanged,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a registration's key is compared with the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// Every registration of the type matches.
    Always,
    /// The registered keyword occurs in the event text, ignoring case.
    Keyword,
    /// The event value equals the registered key.
    Exact,
    /// The event value equals the registered key, ignoring case.
    ExactIgnoreCase,
}

impl MatchStrategy {
    /// Compares a registered key with the event's value.
    #[must_use]
    pub fn matches(&self, registered: &str, event_value: Option<&str>) -> bool {
        match self {
            Self::Always => true,
            Self::Keyword => event_value.is_some_and(|text| {
                let keyword = registered.trim().to_lowercase();
                !keyword.is_empty() && text.to_lowercase().contains(&keyword)
            }),
            Self::Exact => event_value == Some(registered),
            Self::ExactIgnoreCase => event_value
                .is_some_and(|value| value.trim().to_lowercase() == registered.trim().to_lowercase()),
        }
    }

    /// Whether the index can be filtered by key before matching.
    #[must_use]
    pub fn filters_by_key(&self) -> bool {
        matches!(self, Self::Exact)
    }
}

/// The type of a trigger registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    MessageReceivedWithKeyword,
    ButtonClicked,
    NewContact,
    NewContactWithTag,
    WebhookReceived,
    DealCreated,
    DealStageChanged,
}

impl TriggerType {
    /// Every trigger type.
    pub const ALL: [Self; 7] = [
        Self::MessageReceivedWithKeyword,
        Self::ButtonClicked,
        Self::NewContact,
        Self::NewContactWithTag,
        Self::WebhookReceived,
        Self::DealCreated,
        Self::DealStageChanged,
    ];

    /// The node type that declares this trigger.
    #[must_use]
    pub fn node_kind(&self) -> NodeKind {
        match self {
            Self::MessageReceivedWithKeyword => NodeKind::MessageReceivedWithKeyword,
            Self::ButtonClicked => NodeKind::ButtonClicked,
            Self::NewContact => NodeKind::NewContact,
            Self::NewContactWithTag => NodeKind::NewContactWithTag,
            Self::WebhookReceived => NodeKind::WebhookReceived,
            Self::DealCreated => NodeKind::DealCreated,
            Self::DealStageChanged => NodeKind::DealStageChanged,
        }
    }

    /// How registrations of this type are matched.
    #[must_use]
    pub fn match_strategy(&self) -> MatchStrategy {
        match self {
            Self::MessageReceivedWithKeyword => MatchStrategy::Keyword,
            Self::ButtonClicked | Self::WebhookReceived => MatchStrategy::Exact,
            Self::NewContactWithTag | Self::DealStageChanged => MatchStrategy::ExactIgnoreCase,
            Self::NewContact | Self::DealCreated => MatchStrategy::Always,
        }
    }

    /// The event payload field compared with the registered key.
    #[must_use]
    pub fn event_field(&self) -> Option<&'static str> {
        match self {
            Self::MessageReceivedWithKeyword => Some("body"),
            Self::ButtonClicked => Some("button_payload"),
            Self::NewContactWithTag => Some("tag"),
            Self::WebhookReceived => Some("webhook_key"),
            Self::DealStageChanged => Some("stage"),
            Self::NewContact | Self::DealCreated => None,
        }
    }

    /// The trigger node config field holding the key.
    fn config_field(&self) -> Option<&'static str> {
        match self {
            Self::MessageReceivedWithKeyword => Some("keyword"),
            Self::ButtonClicked => Some("payload"),
            Self::NewContactWithTag => Some("tag"),
            Self::WebhookReceived => Some("key"),
            Self::DealStageChanged => Some("stage"),
            Self::NewContact | Self::DealCreated => None,
        }
    }

    /// Extracts the event's value for matching.
    #[must_use]
    pub fn event_value(&self, payload: &JsonValue) -> Option<String> {
        scalar_text(payload.get(self.event_field()?)?)
    }

    /// Extracts the registration keys from a trigger node's config.
    ///
    /// Keyword triggers accept a single `keyword` or a `keywords` list and
    /// yield one key per non-blank entry. Unkeyed triggers yield a single
    /// empty key.
    #[must_use]
    pub fn registration_keys(&self, config: &JsonValue) -> Vec<String> {
        let Some(field) = self.config_field() else {
            return vec![String::new()];
        };

        let mut keys: Vec<String> = config.get(field).and_then(scalar_text).into_iter().collect();
        if *self == Self::MessageReceivedWithKeyword {
            if let Some(list) = config.get("keywords").and_then(JsonValue::as_array) {
                keys.extend(list.iter().filter_map(scalar_text));
            }
        }
        let mut seen = HashSet::new();
        keys.retain(|key| !key.trim().is_empty() && seen.insert(key.clone()));
        keys
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.node_kind().as_str())
    }
}

fn scalar_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// One entry of the trigger index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRegistration {
    pub id: TriggerId,
    pub tenant_id: TenantId,
    pub workflow_id: WorkflowId,
    /// The trigger node runs start from.
    pub entry_node_id: NodeId,
    pub trigger_type: TriggerType,
    /// Keyword, payload, tag, webhook key or stage; empty for unkeyed types.
    pub trigger_key: String,
    pub created_at: DateTime<Utc>,
}

impl TriggerRegistration {
    /// Creates a registration.
    #[must_use]
    pub fn new(
        tenant_id: TenantId,
        workflow_id: WorkflowId,
        entry_node_id: NodeId,
        trigger_type: TriggerType,
        trigger_key: impl Into<String>,
    ) -> Self {
        Self {
            id: TriggerId::new(),
            tenant_id,
            workflow_id,
            entry_node_id,
            trigger_type,
            trigger_key: trigger_key.into(),
            created_at: Utc::now(),
        }
    }

    /// Whether an event value matches this registration.
    #[must_use]
    pub fn matches(&self, event_value: Option<&str>) -> bool {
        self.trigger_type
            .match_strategy()
            .matches(&self.trigger_key, event_value)
    }
}

/// Derives the trigger registrations of a workflow.
///
/// Keyed trigger nodes without a usable key are skipped with a warning.
#[must_use]
pub fn registrations_for(workflow: &Workflow) -> Vec<TriggerRegistration> {
    workflow
        .graph
        .trigger_nodes()
        .flat_map(|node| node_registrations(workflow, node))
        .collect()
}

fn node_registrations(workflow: &Workflow, node: &Node) -> Vec<TriggerRegistration> {
    let Some(trigger_type) = node.kind.trigger_type() else {
        return Vec::new();
    };
    let keys = trigger_type.registration_keys(&node.config);
    if keys.is_empty() {
        warn!(
            workflow_id = %workflow.id,
            node_id = %node.id,
            trigger_type = %trigger_type,
            "trigger node has no key and will never match"
        );
    }
    keys.into_iter()
        .map(|key| {
            TriggerRegistration::new(
                workflow.tenant_id,
                workflow.id,
                node.id.clone(),
                trigger_type,
                key,
            )
        })
        .collect()
}

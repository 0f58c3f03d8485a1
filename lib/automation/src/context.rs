//! Run-scoped data handed to every node.
//!
//! An [`ExecutionContext`] is created by the dispatcher for one run and
//! owned by the engine for its duration. The trigger payload and tenant
//! profile are shared and read-only; the contact is replaced whenever a
//! handler returns an updated copy.

use relaydesk_core::{ContactId, TenantId, WorkflowId, WorkflowRunId};
use relaydesk_integration::ProviderAccount;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A CRM contact as seen by the automation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub tenant_id: TenantId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Tags in insertion order, unique ignoring case.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub custom_fields: BTreeMap<String, JsonValue>,
}

impl Contact {
    /// Creates a contact with no details.
    #[must_use]
    pub fn new(tenant_id: TenantId) -> Self {
        Self {
            id: ContactId::new(),
            tenant_id,
            name: None,
            phone: None,
            email: None,
            tags: Vec::new(),
            custom_fields: BTreeMap::new(),
        }
    }

    /// Sets the name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the phone number.
    #[must_use]
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// Whether the contact carries a tag, ignoring case.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        let tag = tag.trim();
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Adds tags not already present. Returns whether anything changed.
    pub fn add_tags<I, S>(&mut self, tags: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let before = self.tags.len();
        for tag in tags {
            let tag = tag.as_ref().trim();
            if !tag.is_empty() && !self.has_tag(tag) {
                self.tags.push(tag.to_string());
            }
        }
        self.tags.len() != before
    }

    /// Removes tags, ignoring case. Returns whether anything changed.
    pub fn remove_tags<I, S>(&mut self, tags: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let before = self.tags.len();
        for tag in tags {
            let tag = tag.as_ref().trim();
            self.tags.retain(|t| !t.eq_ignore_ascii_case(tag));
        }
        self.tags.len() != before
    }

    /// Sets a custom field, replacing any previous value.
    pub fn set_custom_field(&mut self, key: impl Into<String>, value: JsonValue) {
        self.custom_fields.insert(key.into(), value);
    }
}

/// Tenant settings every run reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantProfile {
    pub tenant_id: TenantId,
    pub business_name: String,
    /// Sending account used by messaging nodes.
    pub provider: ProviderAccount,
    /// Free-form settings exposed to templates under `profile`.
    #[serde(default)]
    pub settings: Map<String, JsonValue>,
}

/// Everything a node handler may read.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub run_id: WorkflowRunId,
    pub workflow_id: WorkflowId,
    pub tenant_id: TenantId,
    pub contact: Option<Contact>,
    pub trigger: Arc<JsonValue>,
    pub profile: Arc<TenantProfile>,
}

impl ExecutionContext {
    /// Creates a context for a new run.
    #[must_use]
    pub fn new(
        workflow_id: WorkflowId,
        profile: Arc<TenantProfile>,
        contact: Option<Contact>,
        trigger: Arc<JsonValue>,
    ) -> Self {
        Self {
            run_id: WorkflowRunId::new(),
            workflow_id,
            tenant_id: profile.tenant_id,
            contact,
            trigger,
            profile,
        }
    }

    /// Builds the template scope: `contact`, `trigger`, `profile`,
    /// `workflow_id` and `tenant_id` at the root.
    ///
    /// Profile settings are flattened next to `business_name`; the provider
    /// account is never exposed.
    #[must_use]
    pub fn template_scope(&self) -> JsonValue {
        let mut profile = self.profile.settings.clone();
        profile.insert(
            "business_name".to_string(),
            JsonValue::String(self.profile.business_name.clone()),
        );

        let contact = self
            .contact
            .as_ref()
            .and_then(|c| serde_json::to_value(c).ok())
            .unwrap_or(JsonValue::Null);

        json!({
            "contact": contact,
            "trigger": self.trigger.as_ref(),
            "profile": profile,
            "workflow_id": self.workflow_id.to_string(),
            "tenant_id": self.tenant_id.to_string(),
        })
    }
}

/// What a handler reports back to the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionResult {
    /// The updated contact, when the handler changed it.
    pub contact: Option<Contact>,
    /// The handle to leave through; `None` follows the default edge.
    pub next_handle: Option<String>,
    /// Human-readable summary recorded in the node log.
    pub detail: Option<String>,
}

impl ActionResult {
    /// Continue along the default edge.
    #[must_use]
    pub fn proceed() -> Self {
        Self::default()
    }

    /// Continue along a named handle.
    #[must_use]
    pub fn branch(handle: impl Into<String>) -> Self {
        Self {
            next_handle: Some(handle.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_contact(mut self, contact: Contact) -> Self {
        self.contact = Some(contact);
        self
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

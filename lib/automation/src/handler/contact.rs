//! Contact mutation nodes: `add_tag`, `remove_tag`, `set_custom_field`.
//!
//! Values may contain `{{path}}` placeholders. The mutation goes through
//! the [`ContactStore`] and the stored result becomes the run's contact.

use crate::context::{ActionResult, ExecutionContext};
use crate::error::HandlerError;
use crate::handler::{ActionHandler, parse_config, require_contact};
use crate::node::Node;
use crate::resolver::resolve_template;
use crate::store::ContactStore;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Accepts `{"tag": "vip"}`, `{"tags": ["vip", "lead"]}` or both.
#[derive(Debug, Deserialize)]
struct TagConfig {
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

fn resolve_tags(node: &Node, ctx: &ExecutionContext) -> Result<Vec<String>, HandlerError> {
    let config: TagConfig = parse_config(node)?;
    let scope = ctx.template_scope();
    let tags: Vec<String> = config
        .tag
        .into_iter()
        .chain(config.tags)
        .map(|tag| resolve_template(&tag, &scope).trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect();
    if tags.is_empty() {
        return Err(HandlerError::invalid_config("no tags given"));
    }
    Ok(tags)
}

pub struct AddTagHandler {
    contacts: Arc<dyn ContactStore>,
}

impl AddTagHandler {
    #[must_use]
    pub fn new(contacts: Arc<dyn ContactStore>) -> Self {
        Self { contacts }
    }
}

#[async_trait]
impl ActionHandler for AddTagHandler {
    async fn execute(
        &self,
        node: &Node,
        ctx: &ExecutionContext,
    ) -> Result<ActionResult, HandlerError> {
        let contact = require_contact(ctx)?;
        let tags = resolve_tags(node, ctx)?;
        let updated = self
            .contacts
            .add_tags(ctx.tenant_id, contact.id, &tags)
            .await?;
        Ok(ActionResult::proceed()
            .with_contact(updated)
            .with_detail(format!("added tags: {}", tags.join(", "))))
    }
}

pub struct RemoveTagHandler {
    contacts: Arc<dyn ContactStore>,
}

impl RemoveTagHandler {
    #[must_use]
    pub fn new(contacts: Arc<dyn ContactStore>) -> Self {
        Self { contacts }
    }
}

#[async_trait]
impl ActionHandler for RemoveTagHandler {
    async fn execute(
        &self,
        node: &Node,
        ctx: &ExecutionContext,
    ) -> Result<ActionResult, HandlerError> {
        let contact = require_contact(ctx)?;
        let tags = resolve_tags(node, ctx)?;
        let updated = self
            .contacts
            .remove_tags(ctx.tenant_id, contact.id, &tags)
            .await?;
        Ok(ActionResult::proceed()
            .with_contact(updated)
            .with_detail(format!("removed tags: {}", tags.join(", "))))
    }
}

#[derive(Debug, Deserialize)]
struct CustomFieldConfig {
    #[serde(alias = "key")]
    field: String,
    #[serde(default)]
    value: JsonValue,
}

pub struct SetCustomFieldHandler {
    contacts: Arc<dyn ContactStore>,
}

impl SetCustomFieldHandler {
    #[must_use]
    pub fn new(contacts: Arc<dyn ContactStore>) -> Self {
        Self { contacts }
    }
}

#[async_trait]
impl ActionHandler for SetCustomFieldHandler {
    async fn execute(
        &self,
        node: &Node,
        ctx: &ExecutionContext,
    ) -> Result<ActionResult, HandlerError> {
        let contact = require_contact(ctx)?;
        let config: CustomFieldConfig = parse_config(node)?;
        let field = config.field.trim();
        if field.is_empty() {
            return Err(HandlerError::invalid_config("custom field name is empty"));
        }

        // string values are templates, everything else is stored as given
        let value = match config.value {
            JsonValue::String(text) => {
                JsonValue::String(resolve_template(&text, &ctx.template_scope()))
            }
            other => other,
        };

        let updated = self
            .contacts
            .set_custom_field(ctx.tenant_id, contact.id, field, value)
            .await?;
        Ok(ActionResult::proceed()
            .with_contact(updated)
            .with_detail(format!("set custom field {field}")))
    }
}

//! The `send_webhook` node.
//!
//! Config:
//!
//! ```json
//! {
//!   "url": "https://crm.example.com/hooks/{{tenant_id}}",
//!   "method": "POST",
//!   "headers": { "X-Source": "relaydesk" },
//!   "body_type": "json",
//!   "body": { "name": "{{contact.name}}", "age": "{{contact.custom_fields.age}}" },
//!   "fail_on_error_status": false
//! }
//! ```
//!
//! A JSON body may be an object or a string template; either way it is
//! resolved with [`resolve_json_template`] and must parse afterwards.
//! A non-2xx answer is recorded and the run continues, unless the node
//! (or the engine default) asks for it to fail.

use crate::context::{ActionResult, ExecutionContext};
use crate::error::HandlerError;
use crate::handler::{ActionHandler, parse_config};
use crate::node::Node;
use crate::resolver::{resolve_json_template, resolve_template};
use async_trait::async_trait;
use relaydesk_integration::{WebhookBody, WebhookClient, WebhookRequest};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum BodyType {
    #[default]
    Json,
    Form,
    None,
}

#[derive(Debug, Deserialize)]
struct WebhookConfig {
    url: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    body_type: BodyType,
    #[serde(default)]
    body: Option<JsonValue>,
    #[serde(default)]
    fail_on_error_status: Option<bool>,
}

fn default_method() -> String {
    "POST".to_string()
}

pub struct SendWebhookHandler {
    client: Arc<dyn WebhookClient>,
    fail_on_error_status: bool,
}

impl SendWebhookHandler {
    /// `fail_on_error_status` applies to nodes that do not set it themselves.
    #[must_use]
    pub fn new(client: Arc<dyn WebhookClient>, fail_on_error_status: bool) -> Self {
        Self {
            client,
            fail_on_error_status,
        }
    }
}

fn json_body(body: &JsonValue, scope: &JsonValue) -> Result<WebhookBody, HandlerError> {
    let template = match body {
        JsonValue::String(text) => text.clone(),
        other => other.to_string(),
    };
    let resolved = resolve_json_template(&template, scope);
    serde_json::from_str(&resolved)
        .map(WebhookBody::Json)
        .map_err(|e| HandlerError::InvalidJsonBody {
            reason: e.to_string(),
        })
}

fn form_body(body: &JsonValue, scope: &JsonValue) -> Result<WebhookBody, HandlerError> {
    let JsonValue::Object(fields) = body else {
        return Err(HandlerError::invalid_config("form body must be an object"));
    };
    let pairs = fields
        .iter()
        .map(|(name, value)| {
            let text = match value {
                JsonValue::String(s) => resolve_template(s, scope),
                other => other.to_string(),
            };
            (name.clone(), text)
        })
        .collect();
    Ok(WebhookBody::Form(pairs))
}

fn build_request(config: &WebhookConfig, scope: &JsonValue) -> Result<WebhookRequest, HandlerError> {
    let url = resolve_template(config.url.trim(), scope);
    if url.is_empty() {
        return Err(HandlerError::invalid_config("webhook url is empty"));
    }

    let headers = config
        .headers
        .iter()
        .map(|(name, value)| (name.clone(), resolve_template(value, scope)))
        .collect();

    let body = match (&config.body, config.body_type) {
        (None, _) | (_, BodyType::None) => WebhookBody::Empty,
        (Some(body), BodyType::Json) => json_body(body, scope)?,
        (Some(body), BodyType::Form) => form_body(body, scope)?,
    };

    Ok(WebhookRequest {
        method: config.method.clone(),
        url,
        headers,
        body,
    })
}

#[async_trait]
impl ActionHandler for SendWebhookHandler {
    async fn execute(
        &self,
        node: &Node,
        ctx: &ExecutionContext,
    ) -> Result<ActionResult, HandlerError> {
        let config: WebhookConfig = parse_config(node)?;
        let request = build_request(&config, &ctx.template_scope())?;

        let response = self
            .client
            .call(&request)
            .await
            .map_err(HandlerError::Webhook)?;

        if !response.is_success() {
            if config.fail_on_error_status.unwrap_or(self.fail_on_error_status) {
                return Err(HandlerError::WebhookStatus {
                    status: response.status,
                });
            }
            warn!(
                node_id = %node.id,
                status = response.status,
                "webhook answered with an error status, continuing"
            );
        } else {
            debug!(node_id = %node.id, status = response.status, "webhook delivered");
        }

        Ok(ActionResult::proceed().with_detail(format!(
            "{} {} answered {}",
            request.method.to_uppercase(),
            request.url,
            response.status
        )))
    }
}

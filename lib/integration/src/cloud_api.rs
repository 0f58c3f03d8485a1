//! Cloud-API style HTTP message sender.
//!
//! Messages are posted as JSON to `{base_url}/{phone_number_id}/messages`
//! with the account's bearer token. The provider answers with
//! `{"messages":[{"id":"..."}]}` on success.

use crate::error::ConnectorError;
use crate::messaging::{MessageContent, MessageSender, OutboundMessage, ProviderAccount, SendReceipt};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Value as JsonValue, json};
use std::time::Duration;
use tracing::{debug, instrument};

/// Sends messages through a Cloud-API compatible HTTP endpoint.
#[derive(Debug, Clone)]
pub struct CloudApiSender {
    http: reqwest::Client,
    base_url: String,
}

impl CloudApiSender {
    /// Creates a sender for the given API base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ConnectorError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, account: &ProviderAccount) -> String {
        format!("{}/{}/messages", self.base_url, account.phone_number_id)
    }
}

/// Builds the provider request body for a message.
#[must_use]
pub fn request_body(message: &OutboundMessage) -> JsonValue {
    let mut request = json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": message.recipient,
    });

    let (kind, payload) = match &message.content {
        MessageContent::Text { body } => ("text", json!({ "body": body, "preview_url": true })),
        MessageContent::Template {
            name,
            language,
            parameters,
        } => {
            let mut template = json!({
                "name": name,
                "language": { "code": language },
            });
            if !parameters.is_empty() {
                let params: Vec<JsonValue> = parameters
                    .iter()
                    .map(|p| json!({ "type": "text", "text": p }))
                    .collect();
                template["components"] = json!([{ "type": "body", "parameters": params }]);
            }
            ("template", template)
        }
        MessageContent::Media {
            kind,
            url,
            caption,
            filename,
        } => {
            let mut media = json!({ "link": url });
            if let Some(caption) = caption.as_ref().filter(|_| kind.supports_caption()) {
                media["caption"] = json!(caption);
            }
            if let Some(filename) = filename {
                media["filename"] = json!(filename);
            }
            (kind.as_str(), media)
        }
        MessageContent::Interactive {
            body,
            buttons,
            header,
            footer,
        } => {
            let buttons: Vec<JsonValue> = buttons
                .iter()
                .map(|b| json!({ "type": "reply", "reply": { "id": b.id, "title": b.title } }))
                .collect();
            let mut interactive = json!({
                "type": "button",
                "body": { "text": body },
                "action": { "buttons": buttons },
            });
            if let Some(header) = header {
                interactive["header"] = json!({ "type": "text", "text": header });
            }
            if let Some(footer) = footer {
                interactive["footer"] = json!({ "text": footer });
            }
            ("interactive", interactive)
        }
    };

    request["type"] = json!(kind);
    request[kind] = payload;
    request
}

/// Extracts the provider message id from a success response.
fn message_id(response: &JsonValue) -> Result<String, ConnectorError> {
    response
        .get("messages")
        .and_then(|m| m.get(0))
        .and_then(|m| m.get("id"))
        .and_then(JsonValue::as_str)
        .map(str::to_string)
        .ok_or_else(|| ConnectorError::ProtocolError {
            reason: "response has no message id".to_string(),
        })
}

#[async_trait]
impl MessageSender for CloudApiSender {
    #[instrument(skip_all, fields(kind = message.content.label()))]
    async fn send(
        &self,
        account: &ProviderAccount,
        message: &OutboundMessage,
    ) -> Result<SendReceipt, ConnectorError> {
        let response = self
            .http
            .post(self.endpoint(account))
            .bearer_auth(&account.access_token)
            .json(&request_body(message))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let payload: JsonValue = response.json().await?;
            let provider_message_id = message_id(&payload)?;
            debug!(%provider_message_id, "provider accepted message");
            return Ok(SendReceipt {
                provider_message_id,
            });
        }

        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let reason = response.text().await.unwrap_or_default();

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                ConnectorError::AuthenticationFailed { reason }
            }
            StatusCode::TOO_MANY_REQUESTS => ConnectorError::RateLimited { retry_after_secs },
            other => ConnectorError::Rejected {
                status: other.as_u16(),
                reason,
            },
        })
    }
}

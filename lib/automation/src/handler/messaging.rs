//! Messaging nodes: text, template, media and interactive messages.
//!
//! All four node types share one handler. Text fields are resolved
//! against the run's template scope; the message goes to the contact's
//! phone number through the tenant's provider account.

use crate::context::{ActionResult, ExecutionContext};
use crate::error::HandlerError;
use crate::handler::{ActionHandler, parse_config, require_contact};
use crate::node::{Node, NodeKind};
use crate::resolver::resolve_template;
use async_trait::async_trait;
use relaydesk_integration::{MediaKind, MessageContent, MessageSender, OutboundMessage, ReplyButton};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::debug;

/// Provider limit on reply buttons per message.
pub const MAX_REPLY_BUTTONS: usize = 3;

#[derive(Debug, Deserialize)]
struct TextConfig {
    #[serde(alias = "text", alias = "body")]
    message: String,
}

#[derive(Debug, Deserialize)]
struct TemplateConfig {
    #[serde(alias = "name")]
    template_name: String,
    #[serde(default = "default_language")]
    language: String,
    #[serde(default)]
    parameters: Vec<String>,
}

fn default_language() -> String {
    "en_US".to_string()
}

#[derive(Debug, Deserialize)]
struct MediaConfig {
    #[serde(alias = "kind")]
    media_type: MediaKind,
    url: String,
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    filename: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ButtonConfig {
    Title(String),
    Full {
        #[serde(default)]
        id: Option<String>,
        title: String,
    },
}

#[derive(Debug, Deserialize)]
struct InteractiveConfig {
    #[serde(alias = "message")]
    body: String,
    buttons: Vec<ButtonConfig>,
    #[serde(default)]
    header: Option<String>,
    #[serde(default)]
    footer: Option<String>,
}

/// Sends any of the messaging node types.
pub struct SendMessageHandler {
    sender: Arc<dyn MessageSender>,
}

impl SendMessageHandler {
    #[must_use]
    pub fn new(sender: Arc<dyn MessageSender>) -> Self {
        Self { sender }
    }
}

fn non_empty(text: String, what: &str) -> Result<String, HandlerError> {
    if text.trim().is_empty() {
        Err(HandlerError::invalid_config(format!("{what} is empty")))
    } else {
        Ok(text)
    }
}

/// Builds the resolved message content for a messaging node.
fn build_content(node: &Node, scope: &JsonValue) -> Result<MessageContent, HandlerError> {
    let resolve = |text: &str| resolve_template(text, scope);

    match node.kind {
        NodeKind::SendTextMessage => {
            let config: TextConfig = parse_config(node)?;
            Ok(MessageContent::Text {
                body: non_empty(resolve(&config.message), "message")?,
            })
        }
        NodeKind::SendTemplate => {
            let config: TemplateConfig = parse_config(node)?;
            Ok(MessageContent::Template {
                name: non_empty(config.template_name, "template name")?,
                language: config.language,
                parameters: config.parameters.iter().map(|p| resolve(p)).collect(),
            })
        }
        NodeKind::SendMedia => {
            let config: MediaConfig = parse_config(node)?;
            Ok(MessageContent::Media {
                kind: config.media_type,
                url: non_empty(resolve(&config.url), "media url")?,
                caption: config.caption.as_deref().map(resolve),
                filename: config.filename,
            })
        }
        NodeKind::SendInteractiveMessage => {
            let config: InteractiveConfig = parse_config(node)?;
            if config.buttons.is_empty() || config.buttons.len() > MAX_REPLY_BUTTONS {
                return Err(HandlerError::invalid_config(format!(
                    "interactive messages need 1 to {MAX_REPLY_BUTTONS} buttons, got {}",
                    config.buttons.len()
                )));
            }
            let buttons = config
                .buttons
                .into_iter()
                .map(|button| match button {
                    ButtonConfig::Title(title) => {
                        let title = resolve(&title);
                        ReplyButton {
                            id: title.clone(),
                            title,
                        }
                    }
                    ButtonConfig::Full { id, title } => {
                        let title = resolve(&title);
                        ReplyButton {
                            id: id.unwrap_or_else(|| title.clone()),
                            title,
                        }
                    }
                })
                .collect();
            Ok(MessageContent::Interactive {
                body: non_empty(resolve(&config.body), "message body")?,
                buttons,
                header: config.header.as_deref().map(resolve),
                footer: config.footer.as_deref().map(resolve),
            })
        }
        other => Err(HandlerError::invalid_config(format!(
            "{other} is not a messaging node"
        ))),
    }
}

#[async_trait]
impl ActionHandler for SendMessageHandler {
    async fn execute(
        &self,
        node: &Node,
        ctx: &ExecutionContext,
    ) -> Result<ActionResult, HandlerError> {
        let contact = require_contact(ctx)?;
        let recipient = contact
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|phone| !phone.is_empty())
            .ok_or(HandlerError::MissingRecipient {
                contact_id: contact.id,
            })?;

        let content = build_content(node, &ctx.template_scope())?;
        let message = OutboundMessage {
            recipient: recipient.to_string(),
            content,
        };

        let receipt = self
            .sender
            .send(&ctx.profile.provider, &message)
            .await
            .map_err(HandlerError::Provider)?;
        debug!(
            node_id = %node.id,
            kind = message.content.label(),
            provider_message_id = %receipt.provider_message_id,
            "message sent"
        );

        Ok(ActionResult::proceed().with_detail(format!(
            "sent {} message {}",
            message.content.label(),
            receipt.provider_message_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use relaydesk_integration::ConnectorError;
    use serde_json::json;

    async fn send(harness: &Harness, node: Node) -> Result<ActionResult, HandlerError> {
        let handler = SendMessageHandler::new(harness.sender.clone());
        handler.execute(&node, &harness.context()).await
    }

    #[tokio::test]
    async fn text_is_resolved_and_sent_to_contact_phone() {
        let harness = Harness::new();
        let node = Node::new(
            "s",
            NodeKind::SendTextMessage,
            json!({ "message": "Hi {{contact.name}}, welcome to {{profile.business_name}}" }),
        );

        let result = send(&harness, node).await.expect("send");
        assert!(result.detail.expect("detail").starts_with("sent text message"));

        let sent = harness.sender.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, harness.contact.phone.clone().expect("phone"));
        assert_eq!(
            sent[0].content,
            MessageContent::Text {
                body: "Hi Ana, welcome to Padaria Central".to_string()
            }
        );
    }

    #[tokio::test]
    async fn template_parameters_are_resolved() {
        let harness = Harness::new();
        let node = Node::new(
            "s",
            NodeKind::SendTemplate,
            json!({ "template_name": "order_ready", "language": "pt_BR", "parameters": ["{{contact.name}}"] }),
        );

        send(&harness, node).await.expect("send");
        assert_eq!(
            harness.sender.sent()[0].content,
            MessageContent::Template {
                name: "order_ready".to_string(),
                language: "pt_BR".to_string(),
                parameters: vec!["Ana".to_string()],
            }
        );
    }

    #[tokio::test]
    async fn media_message() {
        let harness = Harness::new();
        let node = Node::new(
            "m",
            NodeKind::SendMedia,
            json!({ "media_type": "image", "url": "https://cdn.example.com/menu.png", "caption": "Menu for {{contact.name}}" }),
        );

        send(&harness, node).await.expect("send");
        match &harness.sender.sent()[0].content {
            MessageContent::Media { kind, caption, .. } => {
                assert_eq!(*kind, MediaKind::Image);
                assert_eq!(caption.as_deref(), Some("Menu for Ana"));
            }
            other => panic!("unexpected content {other:?}"),
        }
    }

    #[tokio::test]
    async fn interactive_buttons_accept_plain_titles() {
        let harness = Harness::new();
        let node = Node::new(
            "i",
            NodeKind::SendInteractiveMessage,
            json!({ "body": "Confirm?", "buttons": ["Yes", { "id": "no_thanks", "title": "No" }] }),
        );

        send(&harness, node).await.expect("send");
        match &harness.sender.sent()[0].content {
            MessageContent::Interactive { buttons, .. } => {
                assert_eq!(buttons[0].id, "Yes");
                assert_eq!(buttons[1].id, "no_thanks");
            }
            other => panic!("unexpected content {other:?}"),
        }
    }

    #[tokio::test]
    async fn too_many_buttons_is_invalid() {
        let harness = Harness::new();
        let node = Node::new(
            "i",
            NodeKind::SendInteractiveMessage,
            json!({ "body": "Pick", "buttons": ["a", "b", "c", "d"] }),
        );

        let err = send(&harness, node).await.unwrap_err();
        assert!(matches!(err, HandlerError::InvalidConfig { .. }));
        assert!(harness.sender.sent().is_empty());
    }

    #[tokio::test]
    async fn contact_without_phone_fails() {
        let harness = Harness::new();
        let mut contact = harness.contact.clone();
        contact.phone = None;
        let ctx = harness.context_for(Some(contact), json!({}));
        let handler = SendMessageHandler::new(harness.sender.clone());
        let node = Node::new("s", NodeKind::SendTextMessage, json!({ "message": "hi" }));

        let err = handler.execute(&node, &ctx).await.unwrap_err();
        assert!(matches!(err, HandlerError::MissingRecipient { .. }));
    }

    #[tokio::test]
    async fn provider_error_is_reported() {
        let harness = Harness::new();
        harness.sender.fail_with(ConnectorError::Rejected {
            status: 400,
            reason: "invalid recipient".to_string(),
        });
        let node = Node::new("s", NodeKind::SendTextMessage, json!({ "message": "hi" }));

        let err = send(&harness, node).await.unwrap_err();
        assert!(err.to_string().contains("invalid recipient"));
    }
}

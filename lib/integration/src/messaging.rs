//! Message-sending provider contract.
//!
//! Automation handlers build an [`OutboundMessage`] with fully resolved
//! content and hand it to a [`MessageSender`] together with the tenant's
//! [`ProviderAccount`]. The sender owns the wire format.

use crate::error::ConnectorError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Provider credentials for one tenant's sending number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAccount {
    /// The provider-side id of the sending phone number.
    pub phone_number_id: String,
    /// Bearer token for the provider API.
    #[serde(default, skip_serializing)]
    pub access_token: String,
}

/// Kind of media attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
}

impl MediaKind {
    /// Returns the provider's type tag for this media kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
        }
    }

    /// Whether the provider accepts a caption for this media kind.
    #[must_use]
    pub fn supports_caption(&self) -> bool {
        !matches!(self, Self::Audio)
    }
}

/// A quick-reply button on an interactive message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyButton {
    /// Payload echoed back when the contact taps the button.
    pub id: String,
    /// Visible label.
    pub title: String,
}

/// Resolved message content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    /// Free-form text.
    Text { body: String },
    /// A pre-approved provider template.
    Template {
        name: String,
        language: String,
        parameters: Vec<String>,
    },
    /// Media by public URL.
    Media {
        kind: MediaKind,
        url: String,
        caption: Option<String>,
        filename: Option<String>,
    },
    /// Body text with reply buttons.
    Interactive {
        body: String,
        buttons: Vec<ReplyButton>,
        header: Option<String>,
        footer: Option<String>,
    },
}

impl MessageContent {
    /// Short label used in logs and node detail.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Template { .. } => "template",
            Self::Media { .. } => "media",
            Self::Interactive { .. } => "interactive",
        }
    }
}

/// A message ready to send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Recipient phone number in international format.
    pub recipient: String,
    /// Resolved content.
    pub content: MessageContent,
}

/// Provider acknowledgement of an accepted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    /// The provider's id for the message.
    pub provider_message_id: String,
}

/// Trait for message-sending providers.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Sends a message on behalf of the given account.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectorError`] if the provider is unreachable or
    /// rejects the message.
    async fn send(
        &self,
        account: &ProviderAccount,
        message: &OutboundMessage,
    ) -> Result<SendReceipt, ConnectorError>;

    /// Sends a free-form text message.
    async fn send_text(
        &self,
        account: &ProviderAccount,
        recipient: &str,
        body: String,
    ) -> Result<SendReceipt, ConnectorError> {
        let message = OutboundMessage {
            recipient: recipient.to_string(),
            content: MessageContent::Text { body },
        };
        self.send(account, &message).await
    }

    /// Sends a provider template message.
    async fn send_templated(
        &self,
        account: &ProviderAccount,
        recipient: &str,
        name: String,
        language: String,
        parameters: Vec<String>,
    ) -> Result<SendReceipt, ConnectorError> {
        let message = OutboundMessage {
            recipient: recipient.to_string(),
            content: MessageContent::Template {
                name,
                language,
                parameters,
            },
        };
        self.send(account, &message).await
    }
}

//! Outbound integrations for relaydesk.
//!
//! This crate provides the side-effecting collaborators that automation
//! handlers call into:
//!
//! - **Message sender**: the provider contract for text, template, media and
//!   interactive messages, with a Cloud-API HTTP implementation and a dry-run
//!   implementation
//! - **Webhook client**: arbitrary outbound HTTP calls for `send_webhook` nodes

pub mod cloud_api;
pub mod dry_run;
pub mod error;
pub mod messaging;
pub mod webhook;

pub use cloud_api::CloudApiSender;
pub use dry_run::DryRunSender;
pub use error::ConnectorError;
pub use messaging::{
    MediaKind, MessageContent, MessageSender, OutboundMessage, ProviderAccount, ReplyButton,
    SendReceipt,
};
pub use webhook::{HttpWebhookClient, WebhookBody, WebhookClient, WebhookRequest, WebhookResponse};

//! A message sender that logs instead of sending.
//!
//! Used by the worker when no provider endpoint is configured.

use crate::error::ConnectorError;
use crate::messaging::{MessageSender, OutboundMessage, ProviderAccount, SendReceipt};
use async_trait::async_trait;
use tracing::info;
use ulid::Ulid;

/// Logs every outbound message and acknowledges it with a synthetic id.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunSender;

#[async_trait]
impl MessageSender for DryRunSender {
    async fn send(
        &self,
        account: &ProviderAccount,
        message: &OutboundMessage,
    ) -> Result<SendReceipt, ConnectorError> {
        let provider_message_id = format!("dryrun.{}", Ulid::new());
        info!(
            phone_number_id = %account.phone_number_id,
            recipient = %message.recipient,
            kind = message.content.label(),
            content = ?message.content,
            %provider_message_id,
            "dry-run send"
        );
        Ok(SendReceipt {
            provider_message_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acknowledges_with_synthetic_id() {
        let account = ProviderAccount {
            phone_number_id: "1055".to_string(),
            access_token: String::new(),
        };
        let receipt = DryRunSender
            .send_text(&account, "+15550001111", "hello".to_string())
            .await
            .expect("dry run never fails");
        assert!(receipt.provider_message_id.starts_with("dryrun."));
    }
}

use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::types::{MessagingCapabilities, OutgoingDocument},
    Result,
};

/// Cross-messenger port.
///
/// Telegram is the only implementation; reports are delivered as HTML text plus
/// an optional document.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef>;

    async fn send_document(&self, chat_id: ChatId, doc: OutgoingDocument) -> Result<MessageRef>;
}

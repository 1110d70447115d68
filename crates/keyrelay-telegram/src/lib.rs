//! Telegram adapter (teloxide).
//!
//! Implements the `keyrelay-core` MessagingPort and RoleDirectory over the
//! Telegram Bot API.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{InputFile, ParseMode},
};

use tokio::time::sleep;
use tracing::debug;

pub mod handlers;
pub mod router;

use keyrelay_core::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{MessagingCapabilities, OutgoingDocument},
    },
    ports::RoleDirectory,
    Result,
};

/// Telegram's hard limit for a text message.
pub const TELEGRAM_MAX_MESSAGE_LEN: usize = 4096;

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn message_ref(chat_id: ChatId, msg: &Message) -> MessageRef {
        MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        }
    }
}

fn map_err(e: teloxide::RequestError) -> Error {
    Error::External(format!("telegram error: {e}"))
}

/// Run a Bot API request, retrying once when Telegram asks us to back off.
async fn with_retry<T, Fut>(mut op: impl FnMut() -> Fut) -> Result<T>
where
    Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
    Fut::IntoFuture: Send,
{
    const MAX_RETRIES: usize = 1;
    let mut attempts = 0usize;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(teloxide::RequestError::RetryAfter(d)) if attempts < MAX_RETRIES => {
                attempts += 1;
                debug!(retry_after = ?d, "telegram rate limited, retrying");
                sleep(d).await;
            }
            Err(other) => return Err(map_err(other)),
        }
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            supports_documents: true,
            max_message_len: TELEGRAM_MAX_MESSAGE_LEN,
        }
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        let msg = with_retry(|| {
            self.bot
                .send_message(Self::tg_chat(chat_id), html.to_string())
                .parse_mode(ParseMode::Html)
                .disable_web_page_preview(true)
        })
        .await?;

        Ok(Self::message_ref(chat_id, &msg))
    }

    async fn send_document(&self, chat_id: ChatId, doc: OutgoingDocument) -> Result<MessageRef> {
        let msg = with_retry(|| {
            let file = InputFile::memory(doc.bytes.clone()).file_name(doc.file_name.clone());
            let mut req = self.bot.send_document(Self::tg_chat(chat_id), file);
            if let Some(caption) = &doc.caption {
                req = req.caption(caption.clone());
            }
            req
        })
        .await?;

        Ok(Self::message_ref(chat_id, &msg))
    }
}

/// Operators are the current members of one Telegram chat.
#[derive(Clone)]
pub struct ChatMembership {
    bot: Bot,
    operator_chat: teloxide::types::ChatId,
}

impl ChatMembership {
    pub fn new(bot: Bot, operator_chat_id: i64) -> Self {
        Self {
            bot,
            operator_chat: teloxide::types::ChatId(operator_chat_id),
        }
    }
}

#[async_trait]
impl RoleDirectory for ChatMembership {
    async fn is_operator(&self, user_id: UserId) -> Result<bool> {
        let Ok(id) = u64::try_from(user_id.0) else {
            return Ok(false);
        };
        let member = with_retry(|| {
            self.bot
                .get_chat_member(self.operator_chat, teloxide::types::UserId(id))
        })
        .await?;
        Ok(member.kind.is_present())
    }
}

//! Telegram update handlers.
//!
//! Only slash commands are handled; any other message is ignored.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use crate::router::AppState;

mod commands;

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    match msg.text() {
        Some(text) if text.starts_with('/') => commands::handle_command(bot, msg, state).await,
        _ => Ok(()),
    }
}

use std::sync::Arc;

use teloxide::{prelude::*, types::User};
use tracing::{debug, warn};

use keyrelay_core::{
    domain::{Actor, ChatId, OperationKind, UserId},
    formatting::escape_html,
    mask,
    relay::deliver,
};

use crate::router::AppState;

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

/// `@username` when set, full name otherwise.
fn actor_from_user(user: &User) -> Actor {
    let display_name = match &user.username {
        Some(u) => format!("@{u}"),
        None => user.full_name(),
    };
    Actor {
        user_id: UserId(user.id.0 as i64),
        display_name,
    }
}

fn help_html(key_mask: &str) -> String {
    let mut out = String::from("🤖 <b>Key Relay Bot</b>\n\n<b>📋 Lệnh:</b>\n");
    for kind in OperationKind::ALL {
        out.push_str(&format!(
            "<code>{}</code> - {}\n",
            escape_html(kind.usage()),
            escape_html(kind.description())
        ));
    }
    out.push_str(&format!(
        "\n<b>🔑 Mask:</b> <code>{}</code> ({} ký tự ngẫu nhiên)\nVí dụ: <code>{}</code>",
        escape_html(key_mask),
        mask::random_positions(key_mask),
        escape_html(&mask::sample_key(key_mask)),
    ));
    out
}

pub async fn handle_command(_bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let chat_id = ChatId(msg.chat.id.0);
    let (cmd, args) = parse_command(text);

    if cmd == "start" || cmd == "help" {
        let body = help_html(&state.cfg.key_mask);
        if let Err(e) = state.messenger.send_html(chat_id, &body).await {
            warn!(error = %e, "failed to send help");
        }
        return Ok(());
    }

    let Some(kind) = OperationKind::from_command(&cmd) else {
        debug!(command = cmd.as_str(), "ignoring unknown command");
        return Ok(());
    };

    let actor = actor_from_user(user);
    let reply = state.relay.handle(&actor, kind, &args).await;
    if let Err(e) = deliver(state.messenger.as_ref(), chat_id, &reply).await {
        warn!(
            command = kind.command_name(),
            chat_id = chat_id.0,
            error = %e,
            "failed to deliver reply"
        );
    }

    Ok(())
}

use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*, types::BotCommand};
use tracing::{info, warn};

use keyrelay_core::{
    config::Config,
    domain::OperationKind,
    messaging::port::MessagingPort,
    relay::CommandRelay,
    seller::{http::ReqwestTransport, SellerApi},
    utils::AuditLogger,
};

use crate::handlers;
use crate::{ChatMembership, TelegramMessenger};

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub relay: Arc<CommandRelay>,
    pub messenger: Arc<dyn MessagingPort>,
}

/// Commands shown in the Telegram client's command menu.
pub fn bot_commands() -> Vec<BotCommand> {
    let mut out = vec![BotCommand::new("help", "Hướng dẫn sử dụng")];
    out.extend(
        OperationKind::ALL
            .into_iter()
            .map(|k| BotCommand::new(k.command_name(), k.description())),
    );
    out
}

pub async fn run_polling(cfg: Arc<Config>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    let me = bot.get_me().await?;
    info!(
        bot = me.username(),
        operator_chat = cfg.operator_chat_id,
        seller = %cfg.seller_link.host_str().unwrap_or("-"),
        "keyrelay started"
    );

    if let Err(e) = bot.set_my_commands(bot_commands()).await {
        warn!(error = %e, "failed to register bot commands");
    }

    let transport = ReqwestTransport::new(cfg.seller_link.clone(), cfg.seller_timeout)?;
    let api = SellerApi::new(Arc::new(transport), cfg.seller_key.clone());
    let roles = Arc::new(ChatMembership::new(bot.clone(), cfg.operator_chat_id));
    let audit = AuditLogger::new(cfg.audit_log_path.clone(), cfg.audit_log_json);

    let state = Arc::new(AppState {
        cfg: cfg.clone(),
        relay: Arc::new(CommandRelay::new(cfg.clone(), api, roles, audit)),
        messenger: Arc::new(TelegramMessenger::new(bot.clone())),
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("keyrelay stopped");
    Ok(())
}

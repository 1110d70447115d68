use std::sync::Arc;

use keyrelay_core::config::Config;

#[tokio::main]
async fn main() -> Result<(), keyrelay_core::Error> {
    keyrelay_core::logging::init("keyrelay")?;

    let cfg = Arc::new(Config::load()?);

    keyrelay_telegram::router::run_polling(cfg)
        .await
        .map_err(|e| keyrelay_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}

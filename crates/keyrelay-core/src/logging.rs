use tracing_subscriber::{fmt, EnvFilter};

use crate::{errors::Error, Result};

/// Initialize logging/tracing for the relay.
///
/// Default: info for our crates, warn for everything else.
/// Can be overridden with `RUST_LOG`.
pub fn init(service_name: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,keyrelay_core=info,keyrelay_telegram=info,{}=info",
            service_name.replace('-', "_")
        ))
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .try_init()
        .map_err(|e| Error::External(format!("logging init failed: {e}")))
}

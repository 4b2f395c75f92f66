use tracing_subscriber::{fmt, EnvFilter};

use crate::{config::Config, Result};

/// Initialize tracing for a bridge host.
///
/// Default: info for our crates, warn for everything else. Can be overridden with
/// `RUST_LOG`. Calling this twice is harmless (the second install is ignored).
pub fn init(service_name: &str, cfg: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,mcb_core=info,mcb_host=info,{service_name}=info"
        ))
    });

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(cfg.log_ansi)
        .with_writer(std::io::stderr)
        .try_init();

    Ok(())
}

use anyhow::Context;
use tracing::Level;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Installs the global subscriber. The filter is read from `RUST_LOG`, falling back to `info`.
pub fn setup_logging() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::builder().with_default_directive(Level::INFO.into()).parse_lossy(""));

    let fmt_layer = fmt::layer().with_target(true).with_thread_ids(false);

    let subscriber = Registry::default().with(env_filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber).context("Setting the global tracing subscriber")?;

    Ok(())
}

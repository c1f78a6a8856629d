//! Tracing subscriber setup for the CLI.

use anyhow::Context as _;

/// Installs a stderr subscriber filtered by `RUST_LOG`.
///
/// Without `RUST_LOG` the level is `info`, or `debug` when scraper debug
/// logging is enabled in the config.
pub fn init(debug: bool) -> anyhow::Result<()> {
    let default_level = if debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(default_level))
        .context("build log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("initialize tracing subscriber: {err}"))?;

    Ok(())
}

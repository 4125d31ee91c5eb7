//! Tracing subscriber setup for host applications

use eyre::{Result, eyre};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Build the filter: RUST_LOG wins, otherwise the configured level
pub fn env_filter(config: &LogConfig) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| eyre!("Invalid log level '{}': {}", config.level, e))
}

/// Install a global fmt subscriber writing to stderr
///
/// Fails instead of panicking if a subscriber is already installed.
pub fn init(config: &LogConfig) -> Result<()> {
    let filter = env_filter(config)?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(config.ansi)
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized (level: {})", config.level);
    Ok(())
}

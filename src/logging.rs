//! Logging setup
//!
//! Log output goes to stderr so stdin/stdout stay free for the event feed.

use tracing_subscriber::EnvFilter;

use crate::error::ConfigError;

/// Install the global fmt subscriber
///
/// `RUST_LOG`, when set, takes precedence over `level`.
pub fn init(level: &str) -> Result<(), ConfigError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| ConfigError::Logging(e.to_string()))
}

//! Tracing subscriber setup driven by [`LoggingConfig`].

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install the global subscriber with the configured filter. A `RUST_LOG`
/// environment variable takes precedence over the config value. Repeated
/// calls are harmless; only the first installation sticks, so embedding
/// applications and tests can both call this freely.
pub fn init(cfg: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.level.clone()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

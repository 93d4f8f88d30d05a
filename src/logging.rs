//! Subscriber setup for the binary.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Fallback variable consulted when `RUST_LOG` is unset.
pub const LOG_ENV: &str = "PATCH_BRIDGE_LOG";

/// `RUST_LOG`, then `PATCH_BRIDGE_LOG`, then `default`.
pub fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env(LOG_ENV))
        .unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install a stderr fmt subscriber. Safe to call more than once.
pub fn init_tracing(default: &str) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(default))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

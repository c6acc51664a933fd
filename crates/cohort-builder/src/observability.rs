//! Tracing setup driven by the `[logging]` section of [`BuilderConfig`](crate::BuilderConfig).

use crate::config::LoggingConfig;
use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

fn filter_for(logging: &LoggingConfig) -> EnvFilter {
    match std::env::var("RUST_LOG") {
        Ok(_) => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&logging.level)),
        Err(_) => EnvFilter::new(&logging.level),
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `logging.level`.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing(logging: &LoggingConfig) -> bool {
    let (filter, handle) = reload::Layer::new(filter_for(logging));
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init()
        .is_ok();
    if installed {
        let _ = FILTER_HANDLE.set(handle);
        tracing::debug!(level = %logging.level, "tracing initialized");
    }
    installed
}

/// Switch to the level of a reloaded configuration.
pub fn apply_logging_config(logging: &LoggingConfig) -> bool {
    let Some(handle) = FILTER_HANDLE.get() else {
        return false;
    };
    let applied = handle
        .modify(|filter| *filter = EnvFilter::new(&logging.level))
        .is_ok();
    if applied {
        tracing::info!(level = %logging.level, "logging level changed");
    }
    applied
}

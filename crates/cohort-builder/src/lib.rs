//! Cohort builder session wiring, configuration and tracing setup.

pub mod config;
pub mod error;
pub mod observability;
pub mod session;

pub use config::BuilderConfig;
pub use error::{BuilderError, Result};
pub use session::BuilderSession;

/// Load the configuration and install tracing at its configured level.
pub fn bootstrap(path: Option<&str>) -> std::result::Result<BuilderConfig, String> {
    let config = crate::config::loader::load_config(path)?;
    observability::init_tracing(&config.logging);
    Ok(config)
}

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BuilderConfig {
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub removal: RemovalSettings,
    #[serde(default)]
    pub catalog: CatalogSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BuilderConfig {
    pub fn validate(&self) -> Result<(), String> {
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        if self.removal.grace_period_ms == 0 {
            return Err("removal.grace_period_ms must be > 0".into());
        }
        Ok(())
    }
}

/// Count refresh settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Window in which the edits of one gesture coalesce into one refresh
    #[serde(default = "default_coalesce_delay_ms")]
    pub coalesce_delay_ms: u64,
}
fn default_coalesce_delay_ms() -> u64 {
    10
}
impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            coalesce_delay_ms: default_coalesce_delay_ms(),
        }
    }
}
impl EngineSettings {
    pub fn coalesce_delay(&self) -> Duration {
        Duration::from_millis(self.coalesce_delay_ms)
    }
}

/// Soft-delete settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovalSettings {
    /// Undo window before a soft-deleted group is removed for good
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
}
fn default_grace_period_ms() -> u64 {
    10_000
}
impl Default for RemovalSettings {
    fn default() -> Self {
        Self {
            grace_period_ms: default_grace_period_ms(),
        }
    }
}
impl RemovalSettings {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSettings {
    /// Cached lookups per kind; 0 disables caching
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}
fn default_cache_capacity() -> usize {
    cohort_search::catalog::DEFAULT_CACHE_CAPACITY
}
impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            cache_capacity: default_cache_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::BuilderConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub fn load_config(path: Option<&str>) -> Result<BuilderConfig, String> {
        let mut builder = Config::builder();
        let file = PathBuf::from(path.unwrap_or("cohort.toml"));
        if file.exists() {
            builder = builder.add_source(File::from(file));
        }
        // Environment variable overrides, e.g., COHORT__ENGINE__COALESCE_DELAY_MS=25
        builder = builder.add_source(
            Environment::with_prefix("COHORT")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: BuilderConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

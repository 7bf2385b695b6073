use anyhow::{Context, Result};
use campusdesk_core::CoreConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/campusdesk.db".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub operation_timeout_ms: u64,
    pub totals_cache_ttl_secs: u64,
    pub totals_cache_capacity: u64,
    pub award_requires_resolution: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            operation_timeout_ms: 5000,
            totals_cache_ttl_secs: 60,
            totals_cache_capacity: 10_000,
            award_requires_resolution: true,
        }
    }
}

impl EngineConfig {
    pub fn core_config(&self) -> CoreConfig {
        CoreConfig {
            operation_timeout: Duration::from_millis(self.operation_timeout_ms),
            totals_cache_ttl: Duration::from_secs(self.totals_cache_ttl_secs),
            totals_cache_capacity: self.totals_cache_capacity,
            award_requires_resolution: self.award_requires_resolution,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub json: bool,
}

impl Config {
    /// Read the TOML file at `path`, falling back to defaults when it does
    /// not exist, then apply `CAMPUSDESK_*` environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            Self::parse(&content).with_context(|| format!("parsing config {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("CAMPUSDESK_DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(json) = lookup("CAMPUSDESK_LOG_JSON") {
            self.logging.json = matches!(json.trim(), "1" | "true" | "yes");
        }
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.database.max_connections > 0,
            "database.max_connections must be at least 1"
        );
        anyhow::ensure!(
            self.engine.operation_timeout_ms > 0,
            "engine.operation_timeout_ms must be positive"
        );
        Ok(())
    }
}

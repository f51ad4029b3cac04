use std::collections::HashSet;
use std::path::Path;
use ::config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use crate::config::{EngineConfig, LoggingConfig};
use crate::error::{Error, Result};
use crate::price_infra::SourceConfig;

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

impl AppConfig {
    /// Layers `config/default`, optional `config/<env>` and `QUOTE_INFRA__*`
    /// environment variables, then validates the result.
    pub fn load(env: &str) -> Result<Self> {
        Self::load_from_dir("config", env)
    }

    pub fn load_from_dir(dir: impl AsRef<Path>, env: &str) -> Result<Self> {
        let dir = dir.as_ref();
        let config = Config::builder()
            .add_source(File::from(dir.join("default")))
            .add_source(File::from(dir.join(env)).required(false))
            .add_source(Environment::with_prefix("QUOTE_INFRA").separator("__"))
            .build()
            .map_err(|e| Error::ConfigError(e.to_string()))?;

        let app: AppConfig = config.try_deserialize()
            .map_err(|e| Error::ConfigError(e.to_string()))?;
        app.validate()?;
        Ok(app)
    }

    pub fn from_toml_str(src: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(src, FileFormat::Toml))
            .build()
            .map_err(|e| Error::ConfigError(e.to_string()))?;

        let app: AppConfig = config.try_deserialize()
            .map_err(|e| Error::ConfigError(e.to_string()))?;
        app.validate()?;
        Ok(app)
    }

    /// Startup checks. Per-source structure is checked again when the
    /// sources are built.
    pub fn validate(&self) -> Result<()> {
        if self.engine.per_source_timeout_ms == 0 || self.engine.overall_timeout_ms == 0 {
            return Err(Error::ConfigError("timeouts must be positive".to_string()));
        }

        let enabled: Vec<_> = self.enabled_sources().collect();
        if enabled.is_empty() {
            return Err(Error::NoSourcesConfigured);
        }

        let mut ids = HashSet::new();
        for source in &self.sources {
            if !ids.insert(source.id.as_str()) {
                return Err(Error::ConfigError(format!("duplicate source id {}", source.id)));
            }
        }

        Ok(())
    }

    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }
}

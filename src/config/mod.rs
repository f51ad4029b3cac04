use std::time::Duration;
use serde::{Deserialize, Serialize};

pub mod loader;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EngineConfig {
    pub per_source_timeout_ms: u64,
    pub overall_timeout_ms: u64,
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl EngineConfig {
    pub fn per_source_timeout(&self) -> Duration {
        Duration::from_millis(self.per_source_timeout_ms)
    }

    pub fn overall_timeout(&self) -> Duration {
        Duration::from_millis(self.overall_timeout_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            per_source_timeout_ms: 2_000,
            overall_timeout_ms: 5_000,
            proxy: None,
            user_agent: default_user_agent(),
        }
    }
}

fn default_user_agent() -> String {
    format!("quote-infra/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

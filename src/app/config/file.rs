use super::ConfigError;
use super::serde_helpers::deserialize_optional_duration;
use crate::domain::{GroupingLabels, Route};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Contents of a `--config-file` TOML document.
///
/// ```toml
/// interval = "30s"
/// scrape_timeout = "10s"
///
/// [grouping]
/// instance = "edge-1"
///
/// [[sources]]
/// name = "node"
/// url = "http://127.0.0.1:9100/metrics"
///
/// [[sinks]]
/// name = "central"
/// url = "https://pushgateway:9091"
/// bearerTokenFile = "/run/secrets/token"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default, deserialize_with = "deserialize_optional_duration")]
    pub interval: Option<Duration>,
    #[serde(default, deserialize_with = "deserialize_optional_duration")]
    pub scrape_timeout: Option<Duration>,
    #[serde(default, deserialize_with = "deserialize_optional_duration")]
    pub drain_timeout: Option<Duration>,
    #[serde(default)]
    pub grouping: GroupingLabels,
    #[serde(default)]
    pub sources: Vec<Route>,
    #[serde(default)]
    pub sinks: Vec<Route>,
}

impl FileConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: FileConfig = toml::from_str(content)?;
        config.sources = config.sources.into_iter().map(Route::normalized).collect();
        config.sinks = config.sinks.into_iter().map(Route::normalized).collect();
        Ok(config)
    }
}

use super::serde_helpers::{format_duration, parse_duration};
use super::validation::validate_transfer_config;
use super::{ConfigError, FileConfig, LogLevel, labels, routes};
use crate::transfer::{
    DEFAULT_DRAIN_TIMEOUT, DEFAULT_INTERVAL, DEFAULT_SCRAPE_TIMEOUT, TransferConfig,
};
use crate::transport::TransportConfig;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug, Clone, Default, PartialEq)]
#[command(
    name = "exporter-gateway",
    author,
    version,
    about = "Gateway for the Prometheus exporters",
    long_about = None
)]
pub struct Config {
    /// Transmission interval [default: 15s]
    #[arg(long, env = "GATEWAY_INTERVAL", value_name = "DURATION", value_parser = parse_duration)]
    pub interval: Option<Duration>,

    /// Exporter route, e.g. 'node.url=http://127.0.0.1:9100/metrics' (repeatable)
    #[arg(long = "from", value_name = "ROUTE")]
    pub from: Vec<String>,

    /// Scrape timeout, must be less than --interval [default: 10s]
    #[arg(
        long = "from-timeout",
        visible_alias = "from.timeout",
        env = "GATEWAY_FROM_TIMEOUT",
        value_name = "DURATION",
        value_parser = parse_duration
    )]
    pub from_timeout: Option<Duration>,

    /// Pushgateway route, e.g. 'central.url=http://pushgateway:9091' (repeatable)
    #[arg(long = "to", value_name = "ROUTE")]
    pub to: Vec<String>,

    /// Grouping label added to every push, e.g. 'instance=edge-1' (repeatable)
    #[arg(long = "to-group", visible_alias = "to.group", value_name = "NAME=VALUE")]
    pub to_group: Vec<String>,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Log debug info, same as --log-level debug
    #[arg(long = "log-debug", visible_alias = "log.debug")]
    pub log_debug: bool,

    /// Log as JSON
    #[arg(long = "log-json", visible_alias = "log.json", env = "LOG_JSON")]
    pub log_json: bool,

    /// Configuration file path (optional)
    #[arg(long, env = "CONFIG_FILE")]
    pub config_file: Option<PathBuf>,
}

impl Config {
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Ok(Config::try_parse_from(args)?)
    }

    /// `--log-debug` wins over `--log-level`.
    pub fn effective_log_level(&self) -> LogLevel {
        if self.log_debug {
            LogLevel::Debug
        } else {
            self.log_level
        }
    }

    /// Merges the optional config file with the command line.
    ///
    /// File routes come first and command line routes are appended; command
    /// line durations override file durations.
    pub fn transfer_config(&self) -> Result<TransferConfig, ConfigError> {
        let file = match &self.config_file {
            Some(path) => {
                info!("Loading configuration from file: {}", path.display());
                FileConfig::from_file(path)?
            }
            None => FileConfig::default(),
        };

        let mut sources = file.sources;
        sources.extend(routes::parse_routes(&self.from)?);
        let mut sinks = file.sinks;
        sinks.extend(routes::parse_routes(&self.to)?);
        let mut grouping = file.grouping;
        grouping.extend(labels::parse_labels(&self.to_group)?);

        let config = TransferConfig {
            interval: self.interval.or(file.interval).unwrap_or(DEFAULT_INTERVAL),
            scrape_timeout: self
                .from_timeout
                .or(file.scrape_timeout)
                .unwrap_or(DEFAULT_SCRAPE_TIMEOUT),
            drain_timeout: file.drain_timeout.unwrap_or(DEFAULT_DRAIN_TIMEOUT),
            grouping,
            sources,
            sinks,
            transport: TransportConfig::default(),
        };
        validate_transfer_config(&config)?;

        info!(
            "Transferring in {} per {}",
            format_duration(config.scrape_timeout),
            format_duration(config.interval)
        );
        Ok(config)
    }
}

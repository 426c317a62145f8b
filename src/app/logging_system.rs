use super::config::LogLevel;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Dependencies that are too chatty at the gateway's own level.
const QUIET_TARGETS: &[(&str, LogLevel)] = &[
    ("hyper", LogLevel::Warn),
    ("hyper_util", LogLevel::Warn),
    ("reqwest", LogLevel::Warn),
    ("h2", LogLevel::Warn),
    ("rustls", LogLevel::Warn),
];

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {source}")]
    InvalidFilter {
        filter: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    #[error("Failed to set global tracing subscriber: {0}")]
    Install(#[from] TryInitError),
}

/// Builds and installs the global `tracing` subscriber.
#[derive(Debug, Clone)]
pub struct LoggingSystem {
    level: LogLevel,
    json: bool,
    directives: Vec<String>,
}

impl LoggingSystem {
    pub fn new(level: LogLevel, json: bool) -> Self {
        let directives = QUIET_TARGETS
            .iter()
            .map(|(target, level)| format!("{target}={}", level.as_str()))
            .collect();
        Self {
            level,
            json,
            directives,
        }
    }

    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// The default level followed by per-target directives.
    pub fn filter_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.directives.len() + 1);
        parts.push(self.level.as_str().to_string());
        parts.extend(self.directives.iter().cloned());
        parts.join(",")
    }

    /// `RUST_LOG`, when set, replaces the computed filter entirely.
    pub fn env_filter(&self) -> Result<EnvFilter, LoggingError> {
        let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
            Ok(value) if !value.trim().is_empty() => value,
            _ => self.filter_string(),
        };
        EnvFilter::try_new(&filter)
            .map_err(|source| LoggingError::InvalidFilter { filter, source })
    }

    pub fn init(&self) -> Result<(), LoggingError> {
        let registry = tracing_subscriber::registry().with(self.env_filter()?);
        if self.json {
            registry
                .with(fmt::layer().json().with_target(true).with_current_span(false))
                .try_init()?;
        } else {
            registry
                .with(fmt::layer().with_target(true).with_level(true).compact())
                .try_init()?;
        }
        Ok(())
    }
}

/// Installs logging once per process; later calls are no-ops.
pub fn setup_logging(level: LogLevel, json: bool) -> Result<(), LoggingError> {
    static INITIALIZED: Mutex<bool> = Mutex::new(false);

    let mut initialized = INITIALIZED.lock().unwrap_or_else(PoisonError::into_inner);
    if *initialized {
        return Ok(());
    }
    LoggingSystem::new(level, json).init()?;
    *initialized = true;
    Ok(())
}

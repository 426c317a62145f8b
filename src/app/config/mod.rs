mod cli;
mod file;
pub mod labels;
pub mod routes;
pub mod serde_helpers;
mod validation;

use crate::domain::LabelError;
use crate::transfer::TransferError;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid duration '{value}': {reason}")]
    InvalidDuration { value: String, reason: String },
    #[error("Invalid route '{value}': {reason}")]
    InvalidRoute { value: String, reason: String },
    #[error("Invalid grouping label '{0}', expected NAME=VALUE")]
    InvalidLabel(String),
    #[error(transparent)]
    Label(#[from] LabelError),
    #[error("Duplicate {role} route name '{name}'")]
    DuplicateRoute { role: &'static str, name: String },
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error("Command line error: {0}")]
    Cli(#[from] clap::Error),
    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

pub use cli::Config;
pub use file::FileConfig;

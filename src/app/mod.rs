pub mod config;
pub mod logging_system;
pub mod shutdown;

pub use config::{Config, ConfigError, FileConfig, LogLevel};
pub use logging_system::{LoggingError, LoggingSystem, setup_logging};
pub use shutdown::SignalHandler;

use crate::transfer::{DrainReport, Transfer, TransferError};
use clap::Parser;
use std::process;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),
    #[error("Failed to create the gateway: {0}")]
    Transfer(#[from] TransferError),
    #[error("Failed to install signal handlers: {0}")]
    Signal(#[from] std::io::Error),
}

pub struct App {
    transfer: Transfer,
}

impl App {
    pub fn from_args<I, T>(args: I) -> Result<Self, GatewayError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let config = Config::from_args(args)?;
        Self::from_config(config)
    }

    /// Sets up logging, then validates the configuration and builds every
    /// endpoint. Nothing touches the network yet.
    pub fn from_config(config: Config) -> Result<Self, GatewayError> {
        setup_logging(config.effective_log_level(), config.log_json)?;

        info!("Starting exporter-gateway v{}", crate::VERSION);
        let transfer_config = config.transfer_config()?;
        for route in &transfer_config.sources {
            info!("Transferring from {route}");
        }
        for route in &transfer_config.sinks {
            info!("Transferring to {route}");
        }
        if !transfer_config.grouping.is_empty() {
            info!("Transferring with labels {}", transfer_config.grouping);
        }

        let transfer = Transfer::new(transfer_config)?;
        Ok(Self { transfer })
    }

    pub fn transfer(&self) -> &Transfer {
        &self.transfer
    }

    /// Relays until SIGINT, SIGTERM or SIGQUIT, then drains.
    pub async fn run(self) -> Result<DrainReport, GatewayError> {
        let shutdown = CancellationToken::new();
        let _signals = SignalHandler::install(shutdown.clone())?;

        info!("exporter-gateway is running. Press Ctrl+C to stop.");
        let report = self.transfer.run(shutdown).await?;

        for failure in report.failures() {
            if let Err(err) = &failure.result {
                warn!(
                    sink = %failure.sink,
                    job = %failure.source,
                    "Job group was not deleted: {err}"
                );
            }
        }
        info!("exporter-gateway stopped.");
        Ok(report)
    }
}

pub fn get_version() -> String {
    crate::VERSION.to_string()
}

// Main entry point for the application
pub async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // --help, --version and usage errors are printed and exit here
    let config = Config::try_parse_from(std::env::args_os()).unwrap_or_else(|err| err.exit());

    let app = match App::from_config(config) {
        Ok(app) => app,
        Err(GatewayError::Logging(e)) => {
            eprintln!("exporter-gateway: {e}");
            process::exit(1);
        }
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    };

    if let Err(e) = app.run().await {
        error!("Application error: {e}");
        process::exit(1);
    }

    Ok(())
}

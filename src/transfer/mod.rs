//! The relay engine: interval scrapes, push fan-out and the shutdown drain.

mod drain;
mod pipeline;

pub use drain::{DeleteOutcome, DrainReport};

use crate::domain::{GroupingLabels, MetricSnapshot, Route, RouteError};
use crate::sink::SinkEndpoint;
use crate::source::SourceEndpoint;
use crate::transport::{TransportConfig, TransportError, TransportFactory};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_SCRAPE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("scrape timeout must be greater than zero")]
    ZeroTimeout,
    #[error("scrape timeout {timeout:?} must be less than the interval {interval:?}")]
    TimeoutNotBelowInterval {
        timeout: Duration,
        interval: Duration,
    },
    #[error("drain timeout must be greater than zero")]
    ZeroDrainTimeout,
    #[error("cannot start without any exporter endpoints")]
    NoSources,
    #[error("cannot start without any pushgateway endpoints")]
    NoSinks,
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error("failed to create {role} endpoint '{name}': {source}")]
    Endpoint {
        role: &'static str,
        name: String,
        #[source]
        source: TransportError,
    },
    #[error("transfer cannot be started while {0}")]
    AlreadyStarted(TransferState),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferConfig {
    pub interval: Duration,
    pub scrape_timeout: Duration,
    pub drain_timeout: Duration,
    pub grouping: GroupingLabels,
    pub sources: Vec<Route>,
    pub sinks: Vec<Route>,
    pub transport: TransportConfig,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            scrape_timeout: DEFAULT_SCRAPE_TIMEOUT,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            grouping: GroupingLabels::default(),
            sources: Vec::new(),
            sinks: Vec::new(),
            transport: TransportConfig::default(),
        }
    }
}

impl TransferConfig {
    pub fn validate(&self) -> Result<(), TransferError> {
        if self.scrape_timeout.is_zero() {
            return Err(TransferError::ZeroTimeout);
        }
        if self.scrape_timeout >= self.interval {
            return Err(TransferError::TimeoutNotBelowInterval {
                timeout: self.scrape_timeout,
                interval: self.interval,
            });
        }
        if self.drain_timeout.is_zero() {
            return Err(TransferError::ZeroDrainTimeout);
        }
        if self.sources.is_empty() {
            return Err(TransferError::NoSources);
        }
        if self.sinks.is_empty() {
            return Err(TransferError::NoSinks);
        }
        for route in self.sources.iter().chain(&self.sinks) {
            route.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    Running,
    Draining,
    Terminated,
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Terminated => "terminated",
        };
        f.write_str(state)
    }
}

/// Relays every source to every sink until shutdown, then deletes what it pushed.
pub struct Transfer {
    interval: Duration,
    scrape_timeout: Duration,
    drain_timeout: Duration,
    grouping: Arc<GroupingLabels>,
    sources: Arc<Vec<SourceEndpoint>>,
    sinks: Arc<Vec<SinkEndpoint>>,
    state: watch::Sender<TransferState>,
}

impl Transfer {
    /// Validates the configuration and builds one endpoint per route.
    pub fn new(config: TransferConfig) -> Result<Self, TransferError> {
        config.validate()?;

        let factory = TransportFactory::new(config.transport);
        let sources = config
            .sources
            .iter()
            .map(|route| {
                SourceEndpoint::new(route, &factory).map_err(|source| TransferError::Endpoint {
                    role: "exporter",
                    name: route.name.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let sinks = config
            .sinks
            .iter()
            .map(|route| {
                SinkEndpoint::new(route, &factory).map_err(|source| TransferError::Endpoint {
                    role: "pushgateway",
                    name: route.name.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let (state, _) = watch::channel(TransferState::Idle);
        Ok(Self {
            interval: config.interval,
            scrape_timeout: config.scrape_timeout,
            drain_timeout: config.drain_timeout,
            grouping: Arc::new(config.grouping),
            sources: Arc::new(sources),
            sinks: Arc::new(sinks),
            state,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn scrape_timeout(&self) -> Duration {
        self.scrape_timeout
    }

    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }

    pub fn grouping(&self) -> &GroupingLabels {
        &self.grouping
    }

    pub fn sources(&self) -> &[SourceEndpoint] {
        &self.sources
    }

    pub fn sinks(&self) -> &[SinkEndpoint] {
        &self.sinks
    }

    pub fn state(&self) -> TransferState {
        *self.state.borrow()
    }

    /// Watches state transitions, e.g. to learn when draining starts.
    pub fn subscribe(&self) -> watch::Receiver<TransferState> {
        self.state.subscribe()
    }

    /// Relays until `shutdown` is cancelled, then drains.
    ///
    /// A transfer runs once; calling this again fails with
    /// [`TransferError::AlreadyStarted`].
    pub async fn run(&self, shutdown: CancellationToken) -> Result<DrainReport, TransferError> {
        let started = self.state.send_if_modified(|state| {
            if *state == TransferState::Idle {
                *state = TransferState::Running;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(TransferError::AlreadyStarted(self.state()));
        }

        info!(
            interval = ?self.interval,
            timeout = ?self.scrape_timeout,
            sources = self.sources.len(),
            sinks = self.sinks.len(),
            grouping = %self.grouping,
            "Starting transfer"
        );

        let (tx, rx) = mpsc::channel(self.sources.len());
        let consumer = tokio::spawn(pipeline::push_consumer(
            rx,
            Arc::clone(&self.sinks),
            Arc::clone(&self.grouping),
        ));

        self.relay(&shutdown, tx).await;

        match consumer.await {
            Ok(tally) => debug!(
                snapshots = tally.snapshots,
                succeeded = tally.succeeded,
                failed = tally.failed,
                "Push consumer finished"
            ),
            Err(err) => error!("Push consumer task failed: {err}"),
        }

        self.state.send_replace(TransferState::Draining);
        info!(timeout = ?self.drain_timeout, "Draining pushed job groups");
        let report = drain::drain(
            &self.sources,
            &self.sinks,
            &self.grouping,
            self.drain_timeout,
        )
        .await;
        self.state.send_replace(TransferState::Terminated);

        info!(
            deleted = report.succeeded(),
            failed = report.failed(),
            "Transfer terminated"
        );
        Ok(report)
    }

    /// Starts one scrape pass per interval until shutdown.
    ///
    /// Owns the queue sender; once it returns, the only senders left belong
    /// to passes that have already finished.
    async fn relay(&self, shutdown: &CancellationToken, tx: mpsc::Sender<MetricSnapshot>) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut passes = JoinSet::new();

        while !shutdown.is_cancelled() {
            let pass = shutdown.child_token();
            passes.spawn(pipeline::scrape_pass(
                Arc::clone(&self.sources),
                self.scrape_timeout,
                pass.clone(),
                tx.clone(),
            ));

            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("Shutdown requested, stopping scrapes");
                    pass.cancel();
                }
                _ = ticker.tick() => {
                    pass.cancel();
                }
            }

            while let Some(finished) = passes.try_join_next() {
                if let Err(err) = finished {
                    error!("Scrape pass task failed: {err}");
                }
            }
        }

        drop(tx);
        while let Some(finished) = passes.join_next().await {
            if let Err(err) = finished {
                error!("Scrape pass task failed: {err}");
            }
        }
    }
}

impl fmt::Debug for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transfer")
            .field("interval", &self.interval)
            .field("scrape_timeout", &self.scrape_timeout)
            .field("drain_timeout", &self.drain_timeout)
            .field("grouping", &self.grouping)
            .field("sources", &self.sources)
            .field("sinks", &self.sinks)
            .field("state", &self.state())
            .finish()
    }
}

use crate::domain::GroupingLabels;
use crate::sink::{SinkEndpoint, SinkError};
use crate::source::SourceEndpoint;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, error, warn};

/// Result of deleting one source's job group from one sink.
#[derive(Debug)]
pub struct DeleteOutcome {
    pub source: String,
    pub sink: String,
    pub result: Result<(), SinkError>,
}

/// Every delete issued during the shutdown drain.
#[derive(Debug, Default)]
pub struct DrainReport {
    pub outcomes: Vec<DeleteOutcome>,
}

impl DrainReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.result.is_ok())
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = &DeleteOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.result.is_err())
    }

    pub fn is_clean(&self) -> bool {
        self.failed() == 0
    }
}

/// Deletes every (source, sink) job group concurrently under one deadline.
pub(crate) async fn drain(
    sources: &[SourceEndpoint],
    sinks: &[SinkEndpoint],
    grouping: &Arc<GroupingLabels>,
    timeout: Duration,
) -> DrainReport {
    let deadline = Instant::now() + timeout;
    let mut deletes = JoinSet::new();

    for (source_index, source) in sources.iter().enumerate() {
        for (sink_index, sink) in sinks.iter().enumerate() {
            let job = source.name().to_string();
            let sink = sink.clone();
            let grouping = Arc::clone(grouping);
            deletes.spawn(async move {
                let result = match timeout_at(deadline, sink.delete(&job, &grouping)).await {
                    Ok(result) => result,
                    Err(_) => Err(SinkError::DeadlineExceeded(timeout)),
                };
                let outcome = DeleteOutcome {
                    source: job,
                    sink: sink.name().to_string(),
                    result,
                };
                ((source_index, sink_index), outcome)
            });
        }
    }

    let mut outcomes = Vec::with_capacity(sources.len() * sinks.len());
    while let Some(joined) = deletes.join_next().await {
        match joined {
            Ok((order, outcome)) => {
                match &outcome.result {
                    Ok(()) => debug!(
                        sink = %outcome.sink,
                        job = %outcome.source,
                        "Delete succeeded"
                    ),
                    Err(err) => warn!(
                        sink = %outcome.sink,
                        job = %outcome.source,
                        error = %err,
                        "Delete failed"
                    ),
                }
                outcomes.push((order, outcome));
            }
            Err(err) => error!("Delete task failed: {err}"),
        }
    }

    outcomes.sort_by_key(|(order, _)| *order);
    DrainReport {
        outcomes: outcomes.into_iter().map(|(_, outcome)| outcome).collect(),
    }
}

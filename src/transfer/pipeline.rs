use crate::domain::{GroupingLabels, MetricSnapshot};
use crate::sink::SinkEndpoint;
use crate::source::{ScrapeError, SourceEndpoint};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Scrapes every source once, in order, queueing each successful snapshot.
///
/// Failed sources are logged and skipped. Stops early once `cancel` fires.
pub(crate) async fn scrape_pass(
    sources: Arc<Vec<SourceEndpoint>>,
    timeout: Duration,
    cancel: CancellationToken,
    tx: mpsc::Sender<MetricSnapshot>,
) -> usize {
    let mut queued = 0;
    for source in sources.iter() {
        if cancel.is_cancelled() {
            break;
        }

        match source.scrape(&cancel, timeout).await {
            Ok(snapshot) => {
                debug!(source = source.name(), "Scrape succeeded");
                if tx.send(snapshot).await.is_err() {
                    warn!("Push queue closed, abandoning scrape pass");
                    break;
                }
                queued += 1;
            }
            Err(ScrapeError::Cancelled { .. }) => {
                debug!(source = source.name(), "Scrape pass cancelled");
                break;
            }
            Err(err) => {
                warn!(source = source.name(), error = %err, "Scrape failed");
            }
        }
    }
    queued
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PushTally {
    pub snapshots: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Pushes each queued snapshot to every sink until the queue closes.
///
/// Puts are never cut short: neither the scrape pass nor the interval
/// timer reaches them, so a slow put may overlap the next pass.
pub(crate) async fn push_consumer(
    mut rx: mpsc::Receiver<MetricSnapshot>,
    sinks: Arc<Vec<SinkEndpoint>>,
    grouping: Arc<GroupingLabels>,
) -> PushTally {
    let mut tally = PushTally::default();
    while let Some(snapshot) = rx.recv().await {
        tally.snapshots += 1;
        for sink in sinks.iter() {
            match sink.put(&snapshot.source, &grouping, &snapshot.families).await {
                Ok(()) => {
                    tally.succeeded += 1;
                    debug!(sink = sink.name(), job = %snapshot.source, "Push succeeded");
                }
                Err(err) => {
                    tally.failed += 1;
                    warn!(
                        sink = sink.name(),
                        job = %snapshot.source,
                        error = %err,
                        "Push failed"
                    );
                }
            }
        }
    }
    tally
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Route;
    use crate::transport::TransportFactory;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn source(name: &str, server: &MockServer, status: u16) -> SourceEndpoint {
        let route_path = format!("/{name}/metrics");
        Mock::given(method("GET"))
            .and(path(route_path.as_str()))
            .respond_with(ResponseTemplate::new(status).set_body_string("up 1\n"))
            .mount(server)
            .await;
        let url = Url::parse(&format!("{}{route_path}", server.uri())).unwrap();
        SourceEndpoint::new(&Route::new(name, url), &TransportFactory::default()).unwrap()
    }

    #[tokio::test]
    async fn failed_source_is_skipped() {
        let server = MockServer::start().await;
        let sources = Arc::new(vec![
            source("a", &server, 500).await,
            source("b", &server, 200).await,
        ]);

        let (tx, mut rx) = mpsc::channel(sources.len());
        let queued = scrape_pass(
            sources,
            Duration::from_secs(5),
            CancellationToken::new(),
            tx,
        )
        .await;

        assert_eq!(queued, 1);
        let snapshot = rx.recv().await.unwrap();
        assert_eq!(snapshot.source, "b");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn cancelled_pass_queues_nothing() {
        let server = MockServer::start().await;
        let sources = Arc::new(vec![source("a", &server, 200).await]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let (tx, mut rx) = mpsc::channel(1);
        assert_eq!(scrape_pass(sources, Duration::from_secs(5), cancel, tx).await, 0);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn consumer_pushes_every_snapshot_to_every_sink() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(202))
            .expect(4)
            .mount(&server)
            .await;

        let factory = TransportFactory::default();
        let sinks: Vec<SinkEndpoint> = ["one", "two"]
            .into_iter()
            .map(|name| {
                let url = Url::parse(&format!("{}/{name}", server.uri())).unwrap();
                SinkEndpoint::new(&Route::new(name, url), &factory).unwrap()
            })
            .collect();

        let (tx, rx) = mpsc::channel(2);
        let families = crate::exposition::text::parse("up 1\n").unwrap();
        tx.send(MetricSnapshot::new("a", families.clone())).await.unwrap();
        tx.send(MetricSnapshot::new("b", families)).await.unwrap();
        drop(tx);

        let tally = push_consumer(rx, Arc::new(sinks), Arc::new(GroupingLabels::new())).await;
        assert_eq!(
            tally,
            PushTally {
                snapshots: 2,
                succeeded: 4,
                failed: 0,
            }
        );
    }

    #[tokio::test]
    async fn put_slower_than_the_interval_still_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(202).set_delay(Duration::from_millis(700)))
            .expect(1)
            .mount(&server)
            .await;
        let route = Route::new("slow", Url::parse(&server.uri()).unwrap());
        let sink = SinkEndpoint::new(&route, &TransportFactory::default()).unwrap();

        let (tx, rx) = mpsc::channel(1);
        let families = crate::exposition::text::parse("up 1\n").unwrap();
        tx.send(MetricSnapshot::new("app", families)).await.unwrap();
        drop(tx);

        let tally = push_consumer(rx, Arc::new(vec![sink]), Arc::new(GroupingLabels::new())).await;
        assert_eq!(tally.succeeded, 1);
        assert_eq!(tally.failed, 0);
    }
}

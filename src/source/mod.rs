//! Scraping of pull-based exporters.

use crate::domain::{MetricSnapshot, Route};
use crate::exposition::{ExpositionError, text};
use crate::transport::{Transport, TransportError, TransportFactory, read_error_body};
use bytes::Bytes;
use flate2::read::GzDecoder;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, ACCEPT_ENCODING, CONTENT_ENCODING, USER_AGENT};
use std::io::Read;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

/// Text exposition first, anything else as a fallback the parser will reject.
pub const ACCEPT_HEADER: &str = "text/plain;version=0.0.4;q=1,*/*;q=0.1";

pub const SCRAPE_TIMEOUT_HEADER: &str = "X-Prometheus-Scrape-Timeout-Seconds";

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("scrape of {url} timed out after {timeout:?}")]
    Timeout { url: Url, timeout: Duration },
    #[error("scrape of {url} was cancelled")]
    Cancelled { url: Url },
    #[error("unexpected status code {status} while scraping {url}: {body}")]
    UnexpectedStatus {
        status: u16,
        url: Url,
        body: String,
    },
    #[error("cannot read response body from {url}: {source}")]
    Body {
        url: Url,
        #[source]
        source: reqwest::Error,
    },
    #[error("cannot uncompress gzip response body from {url}: {source}")]
    Decompress {
        url: Url,
        #[source]
        source: std::io::Error,
    },
    #[error("response body from {url} is not valid UTF-8")]
    InvalidUtf8 {
        url: Url,
        #[source]
        source: std::string::FromUtf8Error,
    },
    #[error("cannot parse response body from {url}: {source}")]
    Decode {
        url: Url,
        #[source]
        source: ExpositionError,
    },
}

/// A named exporter and the transport used to reach it.
#[derive(Debug, Clone)]
pub struct SourceEndpoint {
    name: String,
    target: Url,
    transport: Transport,
}

impl SourceEndpoint {
    pub fn new(route: &Route, factory: &TransportFactory) -> Result<Self, TransportError> {
        Ok(Self {
            name: route.name.clone(),
            target: route.url.clone(),
            transport: factory.build(route)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    /// Fetches and decodes one snapshot.
    ///
    /// Gives up when `timeout` elapses or `cancel` fires, whichever comes
    /// first. Never retries.
    pub async fn scrape(
        &self,
        cancel: &CancellationToken,
        timeout: Duration,
    ) -> Result<MetricSnapshot, ScrapeError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ScrapeError::Cancelled {
                url: self.target.clone(),
            }),
            result = tokio::time::timeout(timeout, self.fetch(timeout)) => match result {
                Ok(result) => result,
                Err(_) => Err(ScrapeError::Timeout {
                    url: self.target.clone(),
                    timeout,
                }),
            },
        }
    }

    async fn fetch(&self, timeout: Duration) -> Result<MetricSnapshot, ScrapeError> {
        let request = self
            .transport
            .client()
            .get(self.target.clone())
            .header(ACCEPT, ACCEPT_HEADER)
            .header(ACCEPT_ENCODING, "gzip")
            .header(USER_AGENT, crate::user_agent())
            .header(
                SCRAPE_TIMEOUT_HEADER,
                format!("{:.6}", timeout.as_secs_f64()),
            )
            .build()
            .map_err(TransportError::from)?;

        let response = self.transport.execute(request).await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(ScrapeError::UnexpectedStatus {
                status: status.as_u16(),
                url: self.target.clone(),
                body: read_error_body(response).await,
            });
        }

        let gzipped = response
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("gzip"));

        let body = response.bytes().await.map_err(|source| ScrapeError::Body {
            url: self.target.clone(),
            source,
        })?;
        let raw = if gzipped {
            gunzip(&body).map_err(|source| ScrapeError::Decompress {
                url: self.target.clone(),
                source,
            })?
        } else {
            body.to_vec()
        };
        let payload = String::from_utf8(raw).map_err(|source| ScrapeError::InvalidUtf8 {
            url: self.target.clone(),
            source,
        })?;

        let families = text::parse(&payload).map_err(|source| ScrapeError::Decode {
            url: self.target.clone(),
            source,
        })?;

        let snapshot = MetricSnapshot::new(self.name.clone(), families);
        debug!(
            source = %self.name,
            families = snapshot.family_count(),
            metrics = snapshot.metric_count(),
            "Scraped source"
        );
        Ok(snapshot)
    }
}

fn gunzip(body: &Bytes) -> std::io::Result<Vec<u8>> {
    let mut decoded = Vec::with_capacity(body.len() * 4);
    GzDecoder::new(body.as_ref()).read_to_end(&mut decoded)?;
    Ok(decoded)
}

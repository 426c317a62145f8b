//! Pushing to and deleting from Pushgateway job groups.

use crate::domain::{GroupingLabels, JOB_LABEL, MetricFamilies, Route};
use crate::exposition::{DELIMITED_CONTENT_TYPE, ExpositionError, MetricFamily, delimited};
use crate::transport::{Transport, TransportError, TransportFactory, read_error_body};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Request, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("cannot push to an unknown job")]
    EmptyJob,
    #[error("sink URL {0} cannot carry a job path")]
    InvalidUrl(Url),
    #[error(transparent)]
    Encode(#[from] ExpositionError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("unexpected status code {status} for {method} {url}: {body}")]
    UnexpectedStatus {
        method: Method,
        status: u16,
        url: Url,
        body: String,
    },
    #[error("request did not complete within {0:?}")]
    DeadlineExceeded(Duration),
}

/// A named Pushgateway and the transport used to reach it.
#[derive(Debug, Clone)]
pub struct SinkEndpoint {
    name: String,
    target: Url,
    transport: Transport,
}

impl SinkEndpoint {
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

    /// `<target>/job/<job>[/<label>/<value>]...`, grouping labels in name order.
    pub fn job_url(&self, job: &str, grouping: &GroupingLabels) -> Result<Url, SinkError> {
        if job.is_empty() {
            return Err(SinkError::EmptyJob);
        }

        let mut url = self.target.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| SinkError::InvalidUrl(self.target.clone()))?;
            let (job_name, job_value) = encode_label(JOB_LABEL, job);
            segments.pop_if_empty().push(&job_name).push(&job_value);
            for (name, value) in grouping.iter() {
                let (name, value) = encode_label(name, value);
                segments.push(&name).push(&value);
            }
        }
        Ok(url)
    }

    /// Replaces the job group's metrics with `families`.
    ///
    /// Labels named `job` or named like a grouping label are stripped from
    /// every metric first; the pushgateway would reject them otherwise.
    pub async fn put(
        &self,
        job: &str,
        grouping: &GroupingLabels,
        families: &MetricFamilies,
    ) -> Result<(), SinkError> {
        let url = self.job_url(job, grouping)?;
        let scrubbed = scrub_families(families, grouping);
        let body = delimited::encode(&scrubbed)?;

        let request = self
            .transport
            .client()
            .put(url.clone())
            .header(CONTENT_TYPE, DELIMITED_CONTENT_TYPE)
            .body(body)
            .build()
            .map_err(TransportError::from)?;

        self.send(request).await?;
        debug!(
            sink = %self.name,
            job,
            families = scrubbed.len(),
            "Pushed metrics"
        );
        Ok(())
    }

    /// Deletes the job group. Deleting a group that does not exist succeeds.
    pub async fn delete(&self, job: &str, grouping: &GroupingLabels) -> Result<(), SinkError> {
        let url = self.job_url(job, grouping)?;
        let request = self
            .transport
            .client()
            .delete(url)
            .build()
            .map_err(TransportError::from)?;

        self.send(request).await?;
        debug!(sink = %self.name, job, "Deleted job group");
        Ok(())
    }

    async fn send(&self, request: Request) -> Result<(), SinkError> {
        let method = request.method().clone();
        let url = request.url().clone();
        let response = self.transport.execute(request).await?;

        if response.status() != StatusCode::ACCEPTED {
            return Err(SinkError::UnexpectedStatus {
                method,
                status: response.status().as_u16(),
                url,
                body: read_error_body(response).await,
            });
        }
        Ok(())
    }
}

/// Path segments for one label, using the `@base64` form where a plain
/// segment cannot represent the value.
fn encode_label(name: &str, value: &str) -> (String, String) {
    if value.is_empty() {
        (format!("{name}@base64"), "=".to_string())
    } else if value.contains('/') {
        (format!("{name}@base64"), URL_SAFE.encode(value))
    } else {
        (name.to_string(), value.to_string())
    }
}

/// Copies `families` without labels that the push URL already defines.
pub fn scrub_families(families: &MetricFamilies, grouping: &GroupingLabels) -> Vec<MetricFamily> {
    families
        .values()
        .map(|family| {
            let mut family = family.clone();
            for metric in &mut family.metric {
                metric.label.retain(|pair| {
                    let name = pair.name.as_deref().unwrap_or_default();
                    name != JOB_LABEL && !grouping.contains(name)
                });
            }
            family
        })
        .collect()
}

//! HTTP transports shared by source and sink endpoints.
//!
//! A [`Transport`] is a `reqwest::Client` configured for a route's TLS
//! settings plus an ordered chain of [`RequestDecorator`]s that attach the
//! route's credentials to every outgoing request.

pub mod auth;
pub mod tls;

pub use auth::{
    BasicAuthDecorator, BearerTokenDecorator, BearerTokenFileDecorator, RequestDecorator,
};

use crate::domain::Route;
use reqwest::{Client, ClientBuilder, Request, Response};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Upper bound on how much of an error response body ends up in an error.
pub const MAX_ERROR_BODY: usize = 1024;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to read {kind} file {}: {source}", .path.display())]
    ReadFile {
        kind: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid client certificate and key pair: {0}")]
    InvalidKeyPair(#[source] reqwest::Error),
    #[error("CA bundle {} is empty", .0.display())]
    EmptyCaBundle(PathBuf),
    #[error("CA bundle {} contains no certificates", .0.display())]
    NoCertificates(PathBuf),
    #[error("invalid CA bundle {}: {source}", .path.display())]
    InvalidCaBundle {
        path: PathBuf,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    #[error("credentials cannot be used as an Authorization header: {0}")]
    InvalidCredentials(#[from] reqwest::header::InvalidHeaderValue),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Connection settings applied to every client the factory builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    pub pool_idle_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            pool_idle_timeout: Duration::from_secs(60),
            pool_max_idle_per_host: 20,
            user_agent: crate::user_agent(),
        }
    }
}

/// A TLS-configured client and the credential decorators of one route.
#[derive(Clone)]
pub struct Transport {
    client: Client,
    decorators: Vec<Arc<dyn RequestDecorator>>,
}

impl Transport {
    pub fn new(client: Client, decorators: Vec<Arc<dyn RequestDecorator>>) -> Self {
        Self { client, decorators }
    }

    /// Runs the request through every decorator, first to last.
    pub fn decorate(&self, request: Request) -> Result<Request, TransportError> {
        self.decorators
            .iter()
            .try_fold(request, |request, decorator| decorator.decorate(request))
    }

    pub async fn execute(&self, request: Request) -> Result<Response, TransportError> {
        let request = self.decorate(request)?;
        Ok(self.client.execute(request).await?)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn decorator_names(&self) -> Vec<&'static str> {
        self.decorators.iter().map(|decorator| decorator.name()).collect()
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("decorators", &self.decorator_names())
            .finish_non_exhaustive()
    }
}

/// Builds one [`Transport`] per route.
#[derive(Debug, Clone, Default)]
pub struct TransportFactory {
    config: TransportConfig,
}

impl TransportFactory {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Builds the client and decorator chain for `route`.
    ///
    /// TLS material is loaded here, so unreadable or invalid certificate
    /// files fail construction. Credential files are read per request.
    pub fn build(&self, route: &Route) -> Result<Transport, TransportError> {
        let mut builder: ClientBuilder = Client::builder()
            .use_rustls_tls()
            .connect_timeout(self.config.connect_timeout)
            .pool_idle_timeout(self.config.pool_idle_timeout)
            .pool_max_idle_per_host(self.config.pool_max_idle_per_host)
            .user_agent(&self.config.user_agent);

        if let Some(tls_config) = &route.tls_config {
            if tls_config.server_name.is_some() {
                warn!(
                    route = %route.name,
                    "tlsConfig.serverName is not supported and will be ignored"
                );
            }
            builder = tls::configure(builder, tls_config)?;
        }

        let client = builder.build().map_err(TransportError::ClientBuild)?;

        if route.basic_auth.is_some() && route.has_bearer() {
            warn!(
                route = %route.name,
                "both basic auth and a bearer token are configured, basic auth takes precedence"
            );
        }

        let transport = Transport::new(client, auth::chain_for(route));
        debug!(
            route = %route.name,
            decorators = ?transport.decorator_names(),
            "Built transport"
        );
        Ok(transport)
    }
}

pub(crate) fn read_file(kind: &'static str, path: &Path) -> Result<Vec<u8>, TransportError> {
    std::fs::read(path).map_err(|source| TransportError::ReadFile {
        kind,
        path: path.to_path_buf(),
        source,
    })
}

/// Reads a credential file, dropping surrounding whitespace.
pub(crate) fn read_trimmed(kind: &'static str, path: &Path) -> Result<String, TransportError> {
    let raw = read_file(kind, path)?;
    Ok(String::from_utf8_lossy(&raw).trim().to_string())
}

/// Consumes an unsuccessful response, keeping at most [`MAX_ERROR_BODY`] bytes.
pub(crate) async fn read_error_body(response: Response) -> String {
    match response.bytes().await {
        Ok(body) => truncate_body(&String::from_utf8_lossy(&body)),
        Err(err) => format!("<failed to read body: {err}>"),
    }
}

fn truncate_body(body: &str) -> String {
    let body = body.trim_end();
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

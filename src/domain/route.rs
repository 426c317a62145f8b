use super::RouteError;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::PathBuf;
use url::Url;

/// A credential that never shows up in logs.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw credential. Only the transport layer should call this.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            Ok(())
        } else {
            f.write_str("<secret>")
        }
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Secret)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BasicAuth {
    pub username: String,
    #[serde(default)]
    pub password: Secret,
    pub password_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TlsConfig {
    pub ca_file: Option<PathBuf>,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    pub server_name: Option<String>,
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

/// A named exporter or pushgateway endpoint.
///
/// The name doubles as the pushgateway job identifier for everything scraped
/// from a source route.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Route {
    pub name: String,
    pub url: Url,
    pub basic_auth: Option<BasicAuth>,
    pub bearer_token: Option<Secret>,
    pub bearer_token_file: Option<PathBuf>,
    pub tls_config: Option<TlsConfig>,
}

impl Route {
    pub fn new(name: impl Into<String>, url: Url) -> Self {
        Self {
            name: name.into(),
            url,
            basic_auth: None,
            bearer_token: None,
            bearer_token_file: None,
            tls_config: None,
        }
    }

    /// Drops a trailing `/` from the URL path, keeping the root path intact.
    pub fn normalized(mut self) -> Self {
        let path = self.url.path();
        if path.len() > 1 && path.ends_with('/') {
            let trimmed = path.trim_end_matches('/').to_string();
            self.url.set_path(&trimmed);
        }
        self
    }

    pub fn validate(&self) -> Result<(), RouteError> {
        if self.name.trim().is_empty() {
            return Err(RouteError::EmptyName);
        }

        match self.url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(RouteError::UnsupportedScheme {
                    name: self.name.clone(),
                    scheme: other.to_string(),
                });
            }
        }

        if self.url.cannot_be_a_base() {
            return Err(RouteError::CannotBeABase {
                name: self.name.clone(),
                url: self.url.to_string(),
            });
        }

        if let Some(tls) = &self.tls_config
            && tls.cert_file.is_some() != tls.key_file.is_some()
        {
            return Err(RouteError::IncompleteKeyPair {
                name: self.name.clone(),
            });
        }

        Ok(())
    }

    /// Whether a usable bearer credential is configured.
    pub fn has_bearer(&self) -> bool {
        self.bearer_token.as_ref().is_some_and(|token| !token.is_empty())
            || self.bearer_token_file.is_some()
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.url)
    }
}

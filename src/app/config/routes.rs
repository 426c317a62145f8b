//! `--from` / `--to` route flags.
//!
//! Each flag value is a comma separated list of `NAME.KEY=VALUE` assignments,
//! for example `node.url=https://node:9100/metrics,node.tlsConfig.caFile=/ca.pem`.
//! A literal comma inside a value is written as `\,`. Assignments to the same
//! route name merge, across flags too.

use super::ConfigError;
use crate::domain::{BasicAuth, Route, Secret, TlsConfig};
use std::path::PathBuf;
use url::Url;

#[derive(Default)]
struct RouteDraft {
    url: Option<String>,
    basic_auth: Option<BasicAuth>,
    bearer_token: Option<Secret>,
    bearer_token_file: Option<PathBuf>,
    tls_config: Option<TlsConfig>,
}

impl RouteDraft {
    fn assign(&mut self, key: &str, value: String) -> Result<(), String> {
        match key {
            "url" => self.url = Some(value),
            "bearerToken" => self.bearer_token = Some(Secret::new(value)),
            "bearerTokenFile" => self.bearer_token_file = Some(PathBuf::from(value)),
            "basicAuth.username" => self.basic_auth().username = value,
            "basicAuth.password" => self.basic_auth().password = Secret::new(value),
            "basicAuth.passwordFile" => {
                self.basic_auth().password_file = Some(PathBuf::from(value));
            }
            "tlsConfig.caFile" => self.tls_config().ca_file = Some(PathBuf::from(value)),
            "tlsConfig.certFile" => self.tls_config().cert_file = Some(PathBuf::from(value)),
            "tlsConfig.keyFile" => self.tls_config().key_file = Some(PathBuf::from(value)),
            "tlsConfig.serverName" => self.tls_config().server_name = Some(value),
            "tlsConfig.insecureSkipVerify" => {
                self.tls_config().insecure_skip_verify = value
                    .parse()
                    .map_err(|_| format!("'{value}' is not a boolean"))?;
            }
            other => return Err(format!("unknown key '{other}'")),
        }
        Ok(())
    }

    fn basic_auth(&mut self) -> &mut BasicAuth {
        self.basic_auth.get_or_insert_with(BasicAuth::default)
    }

    fn tls_config(&mut self) -> &mut TlsConfig {
        self.tls_config.get_or_insert_with(TlsConfig::default)
    }

    fn build(self, name: String) -> Result<Route, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidRoute {
            value: name.clone(),
            reason,
        };
        let raw = self.url.ok_or_else(|| invalid("missing url".to_string()))?;
        let url = Url::parse(&raw).map_err(|err| invalid(format!("invalid url '{raw}': {err}")))?;

        let route = Route {
            name: name.clone(),
            url,
            basic_auth: self.basic_auth,
            bearer_token: self.bearer_token,
            bearer_token_file: self.bearer_token_file,
            tls_config: self.tls_config,
        };
        Ok(route.normalized())
    }
}

/// Parses route flag values into routes, in order of first appearance.
pub fn parse_routes<S: AsRef<str>>(values: &[S]) -> Result<Vec<Route>, ConfigError> {
    let mut drafts: Vec<(String, RouteDraft)> = Vec::new();

    for value in values {
        let value = value.as_ref();
        for assignment in split_assignments(value) {
            let invalid = |reason: String| ConfigError::InvalidRoute {
                value: value.to_string(),
                reason,
            };

            let (path, assigned) = assignment
                .split_once('=')
                .ok_or_else(|| invalid(format!("'{assignment}' is not a NAME.KEY=VALUE assignment")))?;
            let (name, key) = path
                .trim()
                .split_once('.')
                .ok_or_else(|| invalid(format!("'{path}' has no NAME.KEY form")))?;
            if name.is_empty() {
                return Err(invalid("route name must not be empty".to_string()));
            }

            let index = match drafts.iter().position(|(existing, _)| existing == name) {
                Some(index) => index,
                None => {
                    drafts.push((name.to_string(), RouteDraft::default()));
                    drafts.len() - 1
                }
            };
            drafts[index]
                .1
                .assign(key, assigned.trim().to_string())
                .map_err(|reason| invalid(format!("route '{name}': {reason}")))?;
        }
    }

    drafts
        .into_iter()
        .map(|(name, draft)| draft.build(name))
        .collect()
}

/// Splits on unescaped commas, turning `\,` into `,`.
fn split_assignments(value: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = value.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&',') => {
                current.push(',');
                chars.next();
            }
            ',' => parts.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    parts.push(current);

    parts
        .into_iter()
        .filter(|part| !part.trim().is_empty())
        .collect()
}

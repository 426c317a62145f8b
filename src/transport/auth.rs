use super::{TransportError, read_trimmed};
use crate::domain::{BasicAuth, Route, Secret};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Request;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use std::path::PathBuf;
use std::sync::Arc;

/// One step of a transport's request pipeline.
///
/// A decorator owns the request while it runs and hands it back, so nothing
/// the caller still holds is ever modified.
pub trait RequestDecorator: Send + Sync {
    fn name(&self) -> &'static str;

    fn decorate(&self, request: Request) -> Result<Request, TransportError>;
}

/// Decorators for `route` in the order they must run: basic auth, then bearer.
pub fn chain_for(route: &Route) -> Vec<Arc<dyn RequestDecorator>> {
    let mut chain: Vec<Arc<dyn RequestDecorator>> = Vec::new();

    if let Some(basic) = &route.basic_auth {
        chain.push(Arc::new(BasicAuthDecorator::new(basic.clone())));
    }

    match (&route.bearer_token, &route.bearer_token_file) {
        (Some(token), _) if !token.is_empty() => {
            chain.push(Arc::new(BearerTokenDecorator::new(token.clone())));
        }
        (_, Some(path)) => {
            chain.push(Arc::new(BearerTokenFileDecorator::new(path.clone())));
        }
        _ => {}
    }

    chain
}

fn set_authorization(mut request: Request, value: &str) -> Result<Request, TransportError> {
    let mut header = HeaderValue::from_str(value)?;
    header.set_sensitive(true);
    request.headers_mut().insert(AUTHORIZATION, header);
    Ok(request)
}

fn has_authorization(request: &Request) -> bool {
    request.headers().contains_key(AUTHORIZATION)
}

#[derive(Debug, Clone)]
pub struct BasicAuthDecorator {
    auth: BasicAuth,
}

impl BasicAuthDecorator {
    pub fn new(auth: BasicAuth) -> Self {
        Self { auth }
    }

    fn password(&self) -> Result<String, TransportError> {
        match &self.auth.password_file {
            Some(path) => read_trimmed("password", path),
            None => Ok(self.auth.password.expose().trim().to_string()),
        }
    }
}

impl RequestDecorator for BasicAuthDecorator {
    fn name(&self) -> &'static str {
        "basic_auth"
    }

    fn decorate(&self, request: Request) -> Result<Request, TransportError> {
        if has_authorization(&request) {
            return Ok(request);
        }
        let credentials = format!("{}:{}", self.auth.username, self.password()?);
        set_authorization(request, &format!("Basic {}", STANDARD.encode(credentials)))
    }
}

#[derive(Debug, Clone)]
pub struct BearerTokenDecorator {
    token: Secret,
}

impl BearerTokenDecorator {
    pub fn new(token: Secret) -> Self {
        Self { token }
    }
}

impl RequestDecorator for BearerTokenDecorator {
    fn name(&self) -> &'static str {
        "bearer_token"
    }

    fn decorate(&self, request: Request) -> Result<Request, TransportError> {
        if has_authorization(&request) {
            return Ok(request);
        }
        set_authorization(request, &format!("Bearer {}", self.token.expose()))
    }
}

/// Reads the token on every request, so rotated tokens are picked up.
#[derive(Debug, Clone)]
pub struct BearerTokenFileDecorator {
    path: PathBuf,
}

impl BearerTokenFileDecorator {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl RequestDecorator for BearerTokenFileDecorator {
    fn name(&self) -> &'static str {
        "bearer_token_file"
    }

    fn decorate(&self, request: Request) -> Result<Request, TransportError> {
        if has_authorization(&request) {
            return Ok(request);
        }
        let token = read_trimmed("bearer token", &self.path)?;
        set_authorization(request, &format!("Bearer {token}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use url::Url;

    fn request() -> Request {
        Request::new(Method::GET, Url::parse("http://localhost/metrics").unwrap())
    }

    fn authorization(request: &Request) -> Option<String> {
        request
            .headers()
            .get(AUTHORIZATION)
            .map(|value| value.to_str().unwrap().to_string())
    }

    fn route() -> Route {
        Route::new("app", Url::parse("http://localhost/metrics").unwrap())
    }

    #[test]
    fn literal_token_beats_token_file() {
        let mut route = route();
        route.bearer_token = Some(Secret::new("literal"));
        route.bearer_token_file = Some(PathBuf::from("/does/not/exist"));

        let chain = chain_for(&route);
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].name(), "bearer_token");
    }

    #[test]
    fn empty_literal_token_falls_back_to_file() {
        let mut route = route();
        route.bearer_token = Some(Secret::default());
        route.bearer_token_file = Some(PathBuf::from("/var/run/token"));

        let chain = chain_for(&route);
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].name(), "bearer_token_file");
    }

    #[test]
    fn token_file_is_trimmed_and_read_per_request() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "  first-token  ").unwrap();

        let decorator = BearerTokenFileDecorator::new(file.path().to_path_buf());
        let decorated = decorator.decorate(request()).unwrap();
        assert_eq!(authorization(&decorated).as_deref(), Some("Bearer first-token"));

        std::fs::write(file.path(), "second-token\n").unwrap();
        let decorated = decorator.decorate(request()).unwrap();
        assert_eq!(authorization(&decorated).as_deref(), Some("Bearer second-token"));
    }

    #[test]
    fn missing_token_file_fails_the_request() {
        let decorator = BearerTokenFileDecorator::new(PathBuf::from("/does/not/exist/token"));
        let err = decorator.decorate(request()).unwrap_err();
        assert!(matches!(
            err,
            TransportError::ReadFile {
                kind: "bearer token",
                ..
            }
        ));
    }

    #[test]
    fn password_file_beats_literal_password() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "from-file").unwrap();

        let decorator = BasicAuthDecorator::new(BasicAuth {
            username: "user".to_string(),
            password: Secret::new("literal"),
            password_file: Some(file.path().to_path_buf()),
        });
        let decorated = decorator.decorate(request()).unwrap();
        let expected = format!("Basic {}", STANDARD.encode("user:from-file"));
        assert_eq!(authorization(&decorated), Some(expected));
    }

    #[test]
    fn literal_password_is_trimmed() {
        let decorator = BasicAuthDecorator::new(BasicAuth {
            username: "user".to_string(),
            password: Secret::new("  pass \n"),
            password_file: None,
        });
        let decorated = decorator.decorate(request()).unwrap();
        assert_eq!(
            authorization(&decorated).as_deref(),
            Some("Basic dXNlcjpwYXNz")
        );
    }

    #[test]
    fn authorization_header_is_sensitive() {
        let decorator = BearerTokenDecorator::new(Secret::new("abc"));
        let decorated = decorator.decorate(request()).unwrap();
        assert!(decorated.headers().get(AUTHORIZATION).unwrap().is_sensitive());
    }

    #[test]
    fn invalid_token_characters_are_rejected() {
        let decorator = BearerTokenDecorator::new(Secret::new("line\nbreak"));
        assert!(matches!(
            decorator.decorate(request()),
            Err(TransportError::InvalidCredentials(_))
        ));
    }
}

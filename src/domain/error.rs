use thiserror::Error;

/// Problems with a single route definition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("route name must not be empty")]
    EmptyName,

    #[error("route '{name}' uses unsupported scheme '{scheme}', expected http or https")]
    UnsupportedScheme { name: String, scheme: String },

    #[error("route '{name}' has a URL that cannot carry a path: {url}")]
    CannotBeABase { name: String, url: String },

    #[error("route '{name}' sets only one of tlsConfig.certFile and tlsConfig.keyFile")]
    IncompleteKeyPair { name: String },
}

/// Problems with a grouping label.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LabelError {
    #[error("grouping label '{0}' is reserved")]
    Reserved(String),

    #[error("invalid grouping label name '{0}'")]
    InvalidName(String),
}

//! Domain layer for exporter-gateway.
//!
//! Contains the canonical types shared across all modules:
//! - `Route`: a named endpoint plus its TLS and auth settings
//! - `GroupingLabels`: static labels attached to every pushed job
//! - `MetricSnapshot`: the result of one successful scrape

pub mod error;
pub mod grouping;
pub mod route;
pub mod snapshot;

pub use error::{LabelError, RouteError};
pub use grouping::{GroupingLabels, JOB_LABEL};
pub use route::{BasicAuth, Route, Secret, TlsConfig};
pub use snapshot::{MetricFamilies, MetricSnapshot};

//! Prometheus exposition formats.
//!
//! Scrapes arrive in the text format; pushes leave as a length-delimited
//! protobuf stream of `MetricFamily` messages. Both sides share the
//! `io.prometheus.client` types generated in `prometheus::proto`.

pub mod delimited;
pub mod text;

pub use delimited::DELIMITED_CONTENT_TYPE;
pub use prometheus::proto::{
    Bucket, Counter, Gauge, Histogram, LabelPair, Metric, MetricFamily, MetricType, Quantile,
    Summary, Untyped,
};

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static METRIC_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z_:][a-zA-Z0-9_:]*$").expect("metric name pattern"));

static LABEL_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("label name pattern"));

#[derive(Error, Debug)]
pub enum ExpositionError {
    #[error("text format parsing error in line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("failed to encode metric family: {0}")]
    Encode(#[from] prometheus::Error),
    #[error("failed to decode metric family: {0}")]
    Decode(#[from] protobuf::Error),
}

/// Accessors on the generated `MetricFamily`.
pub trait MetricFamilyExt {
    /// Declared type, `UNTYPED` when unset or unknown.
    fn metric_type(&self) -> MetricType;
}

impl MetricFamilyExt for MetricFamily {
    fn metric_type(&self) -> MetricType {
        self.type_
            .and_then(|kind| kind.enum_value().ok())
            .unwrap_or(MetricType::UNTYPED)
    }
}

pub trait MetricExt {
    /// Value of the label called `name`, if present.
    fn label_value(&self, name: &str) -> Option<&str>;
}

impl MetricExt for Metric {
    fn label_value(&self, name: &str) -> Option<&str> {
        self.label
            .iter()
            .find(|pair| pair.name.as_deref() == Some(name))
            .and_then(|pair| pair.value.as_deref())
    }
}

pub fn is_valid_metric_name(name: &str) -> bool {
    METRIC_NAME.is_match(name)
}

pub fn is_valid_label_name(name: &str) -> bool {
    LABEL_NAME.is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names() {
        assert!(is_valid_metric_name("http_requests_total"));
        assert!(is_valid_metric_name("namespace:rule:rate5m"));
        assert!(is_valid_metric_name("_hidden"));
        assert!(!is_valid_metric_name(""));
        assert!(!is_valid_metric_name("0starts_with_digit"));
        assert!(!is_valid_metric_name("has-dash"));
    }

    #[test]
    fn label_names() {
        assert!(is_valid_label_name("instance"));
        assert!(is_valid_label_name("__name__"));
        assert!(!is_valid_label_name("with:colon"));
        assert!(!is_valid_label_name(""));
    }

    #[test]
    fn unset_type_reads_as_untyped() {
        let mut family = MetricFamily::default();
        assert_eq!(family.metric_type(), MetricType::UNTYPED);

        family.type_ = Some(protobuf::EnumOrUnknown::new(MetricType::GAUGE));
        assert_eq!(family.metric_type(), MetricType::GAUGE);

        family.type_ = Some(protobuf::EnumOrUnknown::from_i32(42));
        assert_eq!(family.metric_type(), MetricType::UNTYPED);
    }
}

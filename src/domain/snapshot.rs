use crate::exposition::MetricFamily;
use std::collections::BTreeMap;

/// Metric families keyed by family name.
pub type MetricFamilies = BTreeMap<String, MetricFamily>;

/// One successful scrape of one source, consumed by a single push fan-out.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSnapshot {
    pub source: String,
    pub families: MetricFamilies,
}

impl MetricSnapshot {
    pub fn new(source: impl Into<String>, families: MetricFamilies) -> Self {
        Self {
            source: source.into(),
            families,
        }
    }

    pub fn family_count(&self) -> usize {
        self.families.len()
    }

    /// Number of metric instances across all families.
    pub fn metric_count(&self) -> usize {
        self.families.values().map(|family| family.metric.len()).sum()
    }
}

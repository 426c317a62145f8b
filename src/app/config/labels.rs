use super::ConfigError;
use crate::domain::{GroupingLabels, JOB_LABEL};
use tracing::warn;

/// Parses `--to-group NAME=VALUE` values.
///
/// `job` is owned by the source name, so it is dropped with a warning.
pub fn parse_labels<S: AsRef<str>>(values: &[S]) -> Result<GroupingLabels, ConfigError> {
    let mut labels = GroupingLabels::new();
    for value in values {
        let value = value.as_ref();
        let (name, label_value) = value
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidLabel(value.to_string()))?;
        let name = name.trim();
        if name == JOB_LABEL {
            warn!("Ignoring grouping label '{value}': job is set from the source name");
            continue;
        }
        labels.insert(name, label_value.trim())?;
    }
    Ok(labels)
}

use super::LabelError;
use crate::exposition::is_valid_label_name;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

/// Label name that pushgateway reserves for the job identifier.
pub const JOB_LABEL: &str = "job";

/// Static labels that become part of every pushed job's URL.
///
/// Kept sorted by name, so URL path segments come out in a stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>")]
pub struct GroupingLabels(BTreeMap<String, String>);

impl GroupingLabels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a label, returning the value it replaced.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Option<String>, LabelError> {
        let name = name.into();
        if name == JOB_LABEL {
            return Err(LabelError::Reserved(name));
        }
        if !is_valid_label_name(&name) {
            return Err(LabelError::InvalidName(name));
        }
        Ok(self.0.insert(name, value.into()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Appends every label of `other`, later values winning.
    pub fn extend(&mut self, other: GroupingLabels) {
        self.0.extend(other.0);
    }
}

impl TryFrom<BTreeMap<String, String>> for GroupingLabels {
    type Error = LabelError;

    fn try_from(map: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        let mut labels = Self::new();
        for (name, value) in map {
            labels.insert(name, value)?;
        }
        Ok(labels)
    }
}

impl fmt::Display for GroupingLabels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in self.iter() {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{name}={value}")?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_job_label() {
        let mut labels = GroupingLabels::new();
        assert_eq!(
            labels.insert("job", "x"),
            Err(LabelError::Reserved("job".to_string()))
        );
        assert!(labels.is_empty());
    }

    #[test]
    fn rejects_invalid_names() {
        let mut labels = GroupingLabels::new();
        assert!(matches!(
            labels.insert("1abc", "x"),
            Err(LabelError::InvalidName(_))
        ));
        assert!(matches!(
            labels.insert("with-dash", "x"),
            Err(LabelError::InvalidName(_))
        ));
    }

    #[test]
    fn iterates_in_name_order() {
        let mut labels = GroupingLabels::new();
        labels.insert("zone", "a").unwrap();
        labels.insert("env", "prod").unwrap();
        labels.insert("instance", "host-1").unwrap();

        let names: Vec<&str> = labels.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["env", "instance", "zone"]);
        assert_eq!(labels.to_string(), "env=prod,instance=host-1,zone=a");
    }

    #[test]
    fn insert_replaces_existing_value() {
        let mut labels = GroupingLabels::new();
        assert_eq!(labels.insert("env", "dev").unwrap(), None);
        assert_eq!(labels.insert("env", "prod").unwrap(), Some("dev".to_string()));
        assert_eq!(labels.get("env"), Some("prod"));
    }

    #[test]
    fn deserialize_validates_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            grouping: GroupingLabels,
        }

        let ok: Wrapper = toml::from_str("[grouping]\nenv = \"prod\"\n").unwrap();
        assert!(ok.grouping.contains("env"));

        let reserved = toml::from_str::<Wrapper>("[grouping]\njob = \"x\"\n");
        assert!(reserved.is_err());
    }
}

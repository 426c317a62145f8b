//! Parser for the Prometheus text exposition format, version 0.0.4.

use super::{
    Bucket, Counter, ExpositionError, Gauge, LabelPair, Metric, MetricFamily, MetricType,
    Quantile, Untyped, is_valid_label_name, is_valid_metric_name,
};
use crate::domain::MetricFamilies;
use protobuf::{EnumOrUnknown, MessageField};
use std::collections::{BTreeMap, HashMap};

const QUANTILE_LABEL: &str = "quantile";
const BUCKET_LABEL: &str = "le";

/// Parses a text exposition payload into metric families keyed by name.
///
/// Families that only carry `# HELP`/`# TYPE` lines and no samples are
/// dropped.
pub fn parse(input: &str) -> Result<MetricFamilies, ExpositionError> {
    let mut parser = TextParser::default();
    for (index, line) in input.lines().enumerate() {
        parser
            .line(line)
            .map_err(|message| ExpositionError::Syntax {
                line: index + 1,
                message,
            })?;
    }
    Ok(parser.finish())
}

/// Parses the type keyword of a `# TYPE` line.
fn type_from_keyword(keyword: &str) -> Option<MetricType> {
    match keyword {
        "counter" => Some(MetricType::COUNTER),
        "gauge" => Some(MetricType::GAUGE),
        "summary" => Some(MetricType::SUMMARY),
        "histogram" => Some(MetricType::HISTOGRAM),
        "untyped" | "unknown" => Some(MetricType::UNTYPED),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SampleRole {
    Value,
    Bucket,
    Sum,
    Count,
}

#[derive(Default)]
struct FamilyBuilder {
    help: Option<String>,
    kind: Option<MetricType>,
    metrics: Vec<Metric>,
    // label signature -> index into `metrics`, for summaries and histograms
    groups: HashMap<String, usize>,
}

impl FamilyBuilder {
    fn is_composite(&self) -> bool {
        matches!(self.kind, Some(MetricType::SUMMARY | MetricType::HISTOGRAM))
    }

    fn grouped(&mut self, labels: Vec<LabelPair>, timestamp_ms: Option<i64>) -> &mut Metric {
        let signature = signature(&labels, timestamp_ms);
        let index = match self.groups.get(&signature) {
            Some(index) => *index,
            None => {
                self.metrics.push(Metric {
                    label: labels,
                    timestamp_ms,
                    ..Metric::default()
                });
                let index = self.metrics.len() - 1;
                self.groups.insert(signature, index);
                index
            }
        };
        &mut self.metrics[index]
    }
}

#[derive(Default)]
struct TextParser {
    families: BTreeMap<String, FamilyBuilder>,
}

impl TextParser {
    fn line(&mut self, line: &str) -> Result<(), String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }
        match line.strip_prefix('#') {
            Some(comment) => self.comment(comment),
            None => self.sample(line),
        }
    }

    fn comment(&mut self, comment: &str) -> Result<(), String> {
        let (keyword, rest) = split_token(comment.trim_start());
        match keyword {
            "HELP" => {
                let (name, docstring) = split_token(rest);
                check_metric_name(name)?;
                let family = self.families.entry(name.to_string()).or_default();
                if family.help.is_some() {
                    return Err(format!("second HELP line for metric name {name:?}"));
                }
                family.help = Some(unescape_help(docstring));
                Ok(())
            }
            "TYPE" => {
                let (name, keyword) = split_token(rest);
                check_metric_name(name)?;
                let kind = type_from_keyword(keyword.trim())
                    .ok_or_else(|| format!("unknown metric type {:?}", keyword.trim()))?;
                let family = self.families.entry(name.to_string()).or_default();
                if family.kind.is_some() {
                    return Err(format!("second TYPE line for metric name {name:?}"));
                }
                if !family.metrics.is_empty() {
                    return Err(format!("TYPE line for metric name {name:?} after its samples"));
                }
                family.kind = Some(kind);
                Ok(())
            }
            // Plain comments, and OpenMetrics' # EOF / # UNIT
            _ => Ok(()),
        }
    }

    fn sample(&mut self, line: &str) -> Result<(), String> {
        let name_end = line
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == ':'))
            .unwrap_or(line.len());
        let name = &line[..name_end];
        check_metric_name(name)?;

        let mut rest = line[name_end..].trim_start();
        let labels = match rest.strip_prefix('{') {
            Some(inner) => {
                let (labels, remaining) = parse_labels(inner)?;
                rest = remaining;
                labels
            }
            None => Vec::new(),
        };

        let mut fields = rest.split_whitespace();
        let raw_value = fields
            .next()
            .ok_or_else(|| format!("missing value for metric {name:?}"))?;
        let value = parse_float(raw_value)
            .ok_or_else(|| format!("invalid value {raw_value:?} for metric {name:?}"))?;
        let timestamp_ms = match fields.next() {
            Some(raw) => Some(
                raw.parse::<i64>()
                    .map_err(|_| format!("invalid timestamp {raw:?} for metric {name:?}"))?,
            ),
            None => None,
        };
        if let Some(extra) = fields.next() {
            return Err(format!("unexpected trailing content {extra:?}"));
        }

        self.record(name, labels, value, timestamp_ms)
    }

    fn resolve(&self, name: &str) -> (String, SampleRole) {
        let declared = self
            .families
            .get(name)
            .is_some_and(|family| family.kind.is_some());
        if !declared {
            for (suffix, role) in [
                ("_bucket", SampleRole::Bucket),
                ("_sum", SampleRole::Sum),
                ("_count", SampleRole::Count),
            ] {
                if let Some(base) = name.strip_suffix(suffix)
                    && let Some(family) = self.families.get(base)
                {
                    match (family.kind, role) {
                        (Some(MetricType::HISTOGRAM), _)
                        | (Some(MetricType::SUMMARY), SampleRole::Sum | SampleRole::Count) => {
                            return (base.to_string(), role);
                        }
                        _ => {}
                    }
                }
            }
        }
        (name.to_string(), SampleRole::Value)
    }

    fn record(
        &mut self,
        name: &str,
        labels: Vec<LabelPair>,
        value: f64,
        timestamp_ms: Option<i64>,
    ) -> Result<(), String> {
        let (family_name, role) = self.resolve(name);
        let family = self.families.entry(family_name).or_default();

        if !family.is_composite() {
            let mut metric = Metric {
                label: labels,
                timestamp_ms,
                ..Metric::default()
            };
            match family.kind.unwrap_or(MetricType::UNTYPED) {
                MetricType::COUNTER => {
                    metric.counter = MessageField::some(Counter {
                        value: Some(value),
                        ..Counter::default()
                    });
                }
                MetricType::GAUGE => {
                    metric.gauge = MessageField::some(Gauge {
                        value: Some(value),
                        ..Gauge::default()
                    });
                }
                _ => {
                    metric.untyped = MessageField::some(Untyped {
                        value: Some(value),
                        ..Untyped::default()
                    });
                }
            }
            family.metrics.push(metric);
            return Ok(());
        }

        if family.kind == Some(MetricType::SUMMARY) {
            let (quantile, labels) = take_label(labels, QUANTILE_LABEL);
            let summary = family
                .grouped(labels, timestamp_ms)
                .summary
                .mut_or_insert_default();
            match role {
                SampleRole::Sum => summary.sample_sum = Some(value),
                SampleRole::Count => summary.sample_count = Some(value as u64),
                _ => {
                    let raw = quantile
                        .ok_or_else(|| format!("summary sample {name:?} has no quantile label"))?;
                    let quantile = parse_float(&raw)
                        .ok_or_else(|| format!("invalid quantile {raw:?} for metric {name:?}"))?;
                    summary.quantile.push(Quantile {
                        quantile: Some(quantile),
                        value: Some(value),
                        ..Quantile::default()
                    });
                }
            }
            return Ok(());
        }

        let (upper_bound, labels) = take_label(labels, BUCKET_LABEL);
        let histogram = family
            .grouped(labels, timestamp_ms)
            .histogram
            .mut_or_insert_default();
        match role {
            SampleRole::Sum => histogram.sample_sum = Some(value),
            SampleRole::Count => histogram.sample_count = Some(value as u64),
            SampleRole::Bucket => {
                let raw = upper_bound
                    .ok_or_else(|| format!("histogram bucket {name:?} has no le label"))?;
                let upper_bound = parse_float(&raw)
                    .ok_or_else(|| format!("invalid le {raw:?} for metric {name:?}"))?;
                histogram.bucket.push(Bucket {
                    cumulative_count: Some(value as u64),
                    upper_bound: Some(upper_bound),
                    ..Bucket::default()
                });
            }
            SampleRole::Value => {
                return Err(format!(
                    "histogram sample {name:?} needs a _bucket, _sum or _count suffix"
                ));
            }
        }
        Ok(())
    }

    fn finish(self) -> MetricFamilies {
        self.families
            .into_iter()
            .filter(|(_, family)| !family.metrics.is_empty())
            .map(|(name, family)| {
                let kind = family.kind.unwrap_or(MetricType::UNTYPED);
                let parsed = MetricFamily {
                    name: Some(name.clone()),
                    help: family.help,
                    type_: Some(EnumOrUnknown::new(kind)),
                    metric: family.metrics,
                    ..MetricFamily::default()
                };
                (name, parsed)
            })
            .collect()
    }
}

fn check_metric_name(name: &str) -> Result<(), String> {
    if is_valid_metric_name(name) {
        Ok(())
    } else {
        Err(format!("invalid metric name {name:?}"))
    }
}

/// Splits off the first whitespace-delimited token.
fn split_token(input: &str) -> (&str, &str) {
    match input.find(char::is_whitespace) {
        Some(index) => (&input[..index], input[index..].trim_start()),
        None => (input, ""),
    }
}

fn parse_float(raw: &str) -> Option<f64> {
    match raw {
        "+Inf" | "Inf" => Some(f64::INFINITY),
        "-Inf" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        _ => raw.parse().ok(),
    }
}

fn parse_labels(input: &str) -> Result<(Vec<LabelPair>, &str), String> {
    let mut labels: Vec<LabelPair> = Vec::new();
    let mut rest = input;
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return Err("unterminated label set".to_string());
        }
        if let Some(after) = rest.strip_prefix('}') {
            return Ok((labels, after));
        }

        let name_end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        let name = &rest[..name_end];
        if !is_valid_label_name(name) {
            return Err(format!("invalid label name {name:?}"));
        }
        rest = rest[name_end..].trim_start();
        rest = rest
            .strip_prefix('=')
            .ok_or_else(|| format!("expected '=' after label name {name:?}"))?
            .trim_start();
        rest = rest
            .strip_prefix('"')
            .ok_or_else(|| format!("expected quoted value for label {name:?}"))?;
        let (value, after) = unescape_label_value(rest)?;

        if labels.iter().any(|pair| pair.name.as_deref() == Some(name)) {
            return Err(format!("duplicate label name {name:?}"));
        }
        labels.push(LabelPair {
            name: Some(name.to_string()),
            value: Some(value),
            ..LabelPair::default()
        });

        rest = after.trim_start();
        if let Some(after) = rest.strip_prefix(',') {
            rest = after;
        } else if let Some(after) = rest.strip_prefix('}') {
            return Ok((labels, after));
        } else {
            return Err(format!("unexpected content after value of label {name:?}"));
        }
    }
}

/// Reads a label value up to its closing quote, returning the rest of the input.
fn unescape_label_value(input: &str) -> Result<(String, &str), String> {
    let mut value = String::new();
    let mut chars = input.char_indices();
    while let Some((index, c)) = chars.next() {
        match c {
            '"' => return Ok((value, &input[index + 1..])),
            '\\' => match chars.next() {
                Some((_, '\\')) => value.push('\\'),
                Some((_, '"')) => value.push('"'),
                Some((_, 'n')) => value.push('\n'),
                Some((_, other)) => return Err(format!("invalid escape sequence '\\{other}'")),
                None => break,
            },
            c => value.push(c),
        }
    }
    Err("unterminated label value".to_string())
}

fn unescape_help(input: &str) -> String {
    let mut help = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            help.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => help.push('\\'),
            Some('n') => help.push('\n'),
            Some(other) => {
                help.push('\\');
                help.push(other);
            }
            None => help.push('\\'),
        }
    }
    help
}

fn take_label(labels: Vec<LabelPair>, name: &str) -> (Option<String>, Vec<LabelPair>) {
    let mut taken = None;
    let mut kept = Vec::with_capacity(labels.len());
    for pair in labels {
        if pair.name.as_deref() == Some(name) {
            taken = pair.value;
        } else {
            kept.push(pair);
        }
    }
    (taken, kept)
}

fn signature(labels: &[LabelPair], timestamp_ms: Option<i64>) -> String {
    let mut pairs: Vec<(&str, &str)> = labels
        .iter()
        .map(|pair| {
            (
                pair.name.as_deref().unwrap_or_default(),
                pair.value.as_deref().unwrap_or_default(),
            )
        })
        .collect();
    pairs.sort_unstable();

    let mut signature = String::new();
    for (name, value) in pairs {
        signature.push_str(name);
        signature.push('\u{ff}');
        signature.push_str(value);
        signature.push('\u{ff}');
    }
    if let Some(timestamp) = timestamp_ms {
        signature.push_str(&timestamp.to_string());
    }
    signature
}

//! Anomaly findings and the per-run report that collects them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::Result;

/// Category of a validation finding.
///
/// The declaration order is the order findings of one feature are reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyKind {
    /// A schema feature does not occur in the data at all.
    MissingFeature,
    /// A feature occurs less often than the schema requires.
    PresenceBelowThreshold,
    /// The observed type differs from the schema type.
    TypeMismatch,
    /// Some example carries too few or too many values.
    ValueCountOutOfBounds,
    /// Categorical values outside the enumerated domain.
    UnexpectedValue,
    /// Numeric values outside the range domain.
    OutOfRange,
    /// A feature occurs in the data but not in the schema.
    NewFeature,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::MissingFeature => "MISSING_FEATURE",
            AnomalyKind::PresenceBelowThreshold => "PRESENCE_BELOW_THRESHOLD",
            AnomalyKind::TypeMismatch => "TYPE_MISMATCH",
            AnomalyKind::ValueCountOutOfBounds => "VALUE_COUNT_OUT_OF_BOUNDS",
            AnomalyKind::UnexpectedValue => "UNEXPECTED_VALUE",
            AnomalyKind::OutOfRange => "OUT_OF_RANGE",
            AnomalyKind::NewFeature => "NEW_FEATURE",
        }
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One finding about one feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    /// Headline suitable for a table cell
    pub short_description: String,
    /// Full explanation including the observed and expected values
    pub description: String,
    /// Fraction of the relevant population that is affected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fraction: Option<f64>,
    /// Number of affected examples or values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    /// Offending values, most frequent first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub samples: Vec<String>,
}

impl Anomaly {
    pub fn new(
        kind: AnomalyKind,
        short_description: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            short_description: short_description.into(),
            description: description.into(),
            fraction: None,
            count: None,
            samples: Vec::new(),
        }
    }

    pub fn with_fraction(mut self, fraction: f64) -> Self {
        self.fraction = Some(fraction);
        self
    }

    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_samples(mut self, samples: Vec<String>) -> Self {
        self.samples = samples;
        self
    }
}

/// Findings of one validation run, keyed by feature name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    anomalies: BTreeMap<String, Vec<Anomaly>>,
}

impl AnomalyReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a finding, keeping each feature's findings ordered by kind.
    pub(crate) fn push(&mut self, feature: &str, anomaly: Anomaly) {
        let findings = self.anomalies.entry(feature.to_string()).or_default();
        let position = findings.partition_point(|a| a.kind <= anomaly.kind);
        findings.insert(position, anomaly);
    }

    /// Returns true when no feature has findings.
    pub fn is_empty(&self) -> bool {
        self.anomalies.is_empty()
    }

    /// Number of features with findings.
    pub fn len(&self) -> usize {
        self.anomalies.len()
    }

    /// Total number of findings across features.
    pub fn num_anomalies(&self) -> usize {
        self.anomalies.values().map(Vec::len).sum()
    }

    pub fn get(&self, feature: &str) -> Option<&[Anomaly]> {
        self.anomalies.get(feature).map(Vec::as_slice)
    }

    /// Iterates over features and their findings in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Anomaly])> {
        self.anomalies
            .iter()
            .map(|(name, findings)| (name.as_str(), findings.as_slice()))
    }

    /// Findings of one kind across all features.
    pub fn of_kind(&self, kind: AnomalyKind) -> impl Iterator<Item = (&str, &Anomaly)> {
        self.iter()
            .flat_map(|(name, findings)| findings.iter().map(move |a| (name, a)))
            .filter(move |(_, a)| a.kind == kind)
    }

    /// Serializes to compact JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serializes to indented JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

//! Decoded record types consumed by the statistics accumulators.
//!
//! Decoding concrete file formats is the job of an external decoder; this
//! module only defines the shape it must produce: an [`Example`] maps each
//! feature name to an ordered list of typed [`Value`]s.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single typed value of a feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    /// Integer value, counted as numeric.
    Int(i64),
    /// Floating point value, counted as numeric.
    Float(f64),
    /// UTF-8 string value, counted as categorical.
    Str(String),
    /// Nested record, counted as structured.
    Struct(Example),
}

impl Value {
    /// Returns the feature type this value contributes to.
    pub fn kind(&self) -> FeatureType {
        match self {
            Value::Int(_) | Value::Float(_) => FeatureType::Numeric,
            Value::Str(_) => FeatureType::Categorical,
            Value::Struct(_) => FeatureType::Structured,
        }
    }

    /// Attempts to get the value as f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Attempts to get the value as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Example> for Value {
    fn from(v: Example) -> Self {
        Value::Struct(v)
    }
}

/// One decoded record: feature name to ordered value list.
///
/// A feature is *present* in the example when it has an entry, even an empty
/// one; it is *missing* when there is no entry at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Example {
    features: BTreeMap<String, Vec<Value>>,
}

impl Example {
    /// Creates an empty example.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a feature with the given values, builder style.
    pub fn with<V>(mut self, name: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self
    where
        V: Into<Value>,
    {
        self.insert(name, values.into_iter().map(Into::into).collect());
        self
    }

    /// Inserts or replaces the value list of a feature.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<Value>) {
        self.features.insert(name.into(), values);
    }

    /// Returns the value list of a feature, or `None` when the feature is missing.
    pub fn get(&self, name: &str) -> Option<&[Value]> {
        self.features.get(name).map(Vec::as_slice)
    }

    /// Iterates over present features in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.features
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Returns the number of present features.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Returns true if no feature is present.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl FromIterator<(String, Vec<Value>)> for Example {
    fn from_iter<I: IntoIterator<Item = (String, Vec<Value>)>>(iter: I) -> Self {
        Self {
            features: iter.into_iter().collect(),
        }
    }
}

/// Observed or expected type of a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureType {
    Numeric,
    Categorical,
    Structured,
}

impl FeatureType {
    /// Returns the type name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureType::Numeric => "numeric",
            FeatureType::Categorical => "categorical",
            FeatureType::Structured => "structured",
        }
    }
}

impl fmt::Display for FeatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of values seen per value kind.
///
/// The majority kind decides the feature type; more than one non-zero kind is
/// a type conflict. Counts sum under merge, so both properties are recomputed
/// rather than chosen from either side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCounts {
    pub numeric: u64,
    pub categorical: u64,
    pub structured: u64,
}

impl TypeCounts {
    /// Records one value of the given kind.
    pub fn record(&mut self, kind: FeatureType) {
        match kind {
            FeatureType::Numeric => self.numeric += 1,
            FeatureType::Categorical => self.categorical += 1,
            FeatureType::Structured => self.structured += 1,
        }
    }

    /// Returns the count recorded for a kind.
    pub fn get(&self, kind: FeatureType) -> u64 {
        match kind {
            FeatureType::Numeric => self.numeric,
            FeatureType::Categorical => self.categorical,
            FeatureType::Structured => self.structured,
        }
    }

    /// Sums two count sets.
    pub fn combine(&self, other: &Self) -> Self {
        Self {
            numeric: self.numeric + other.numeric,
            categorical: self.categorical + other.categorical,
            structured: self.structured + other.structured,
        }
    }

    /// Returns the kind with the most values; ties resolve to the earlier kind
    /// in `Numeric, Categorical, Structured` order.
    pub fn majority(&self) -> Option<FeatureType> {
        let mut best: Option<(FeatureType, u64)> = None;
        for kind in [
            FeatureType::Numeric,
            FeatureType::Categorical,
            FeatureType::Structured,
        ] {
            let count = self.get(kind);
            if count == 0 {
                continue;
            }
            match best {
                Some((_, best_count)) if best_count >= count => {}
                _ => best = Some((kind, count)),
            }
        }
        best.map(|(kind, _)| kind)
    }

    /// Returns the kinds with at least one value.
    pub fn observed_kinds(&self) -> Vec<FeatureType> {
        [
            FeatureType::Numeric,
            FeatureType::Categorical,
            FeatureType::Structured,
        ]
        .into_iter()
        .filter(|kind| self.get(*kind) > 0)
        .collect()
    }

    /// Returns true when values of more than one kind were observed.
    pub fn is_conflicted(&self) -> bool {
        self.observed_kinds().len() > 1
    }

    /// Total number of values across kinds.
    pub fn total(&self) -> u64 {
        self.numeric + self.categorical + self.structured
    }
}

//! Per-feature statistics snapshots and their merge.

use serde::{Deserialize, Serialize};

use crate::error::{FeatureGuardError, Result};
use crate::sketches::{DistinctSketch, KllSketch, RunningMoments, TopKSketch};
use crate::statistics::options::StatsOptions;
use crate::types::{FeatureType, TypeCounts};

/// Distribution summary of the numeric values of a feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericStatistics {
    moments: RunningMoments,
    quantiles: KllSketch,
    num_zeros: u64,
    /// NaN and infinite values; excluded from moments and quantiles.
    num_non_finite: u64,
}

impl NumericStatistics {
    pub(crate) fn new(options: &StatsOptions) -> Self {
        Self {
            moments: RunningMoments::new(),
            quantiles: KllSketch::new(options.quantile_sketch_k),
            num_zeros: 0,
            num_non_finite: 0,
        }
    }

    pub(crate) fn update(&mut self, value: f64) {
        if !value.is_finite() {
            self.num_non_finite += 1;
            return;
        }
        if value == 0.0 {
            self.num_zeros += 1;
        }
        self.moments.update(value);
        self.quantiles.update(value);
    }

    /// Returns the merge of two summaries.
    pub fn merge(&self, other: &Self) -> Result<Self> {
        Ok(Self {
            moments: self.moments.merge(&other.moments),
            quantiles: self.quantiles.merged(&other.quantiles)?,
            num_zeros: self.num_zeros + other.num_zeros,
            num_non_finite: self.num_non_finite + other.num_non_finite,
        })
    }

    pub fn mean(&self) -> Option<f64> {
        self.moments.mean()
    }

    pub fn variance(&self) -> Option<f64> {
        self.moments.variance()
    }

    pub fn std_dev(&self) -> Option<f64> {
        self.moments.std_dev()
    }

    pub fn min(&self) -> Option<f64> {
        self.quantiles.min()
    }

    pub fn max(&self) -> Option<f64> {
        self.quantiles.max()
    }

    /// Number of finite values summarized.
    pub fn count(&self) -> u64 {
        self.moments.count()
    }

    pub fn num_zeros(&self) -> u64 {
        self.num_zeros
    }

    pub fn num_non_finite(&self) -> u64 {
        self.num_non_finite
    }

    pub fn moments(&self) -> &RunningMoments {
        &self.moments
    }

    /// The quantile sketch backing distribution queries.
    pub fn quantile_sketch(&self) -> &KllSketch {
        &self.quantiles
    }
}

/// Frequency summary of the string values of a feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalStatistics {
    top_values: TopKSketch,
    distinct: DistinctSketch,
    num_strings: u64,
    total_length: u64,
}

impl CategoricalStatistics {
    pub(crate) fn new(options: &StatsOptions) -> Self {
        Self {
            top_values: TopKSketch::new(options.top_k_capacity),
            distinct: DistinctSketch::new(options.distinct_sketch_k),
            num_strings: 0,
            total_length: 0,
        }
    }

    pub(crate) fn update(&mut self, value: &str) {
        self.num_strings += 1;
        self.total_length += value.chars().count() as u64;
        self.top_values.update(value);
        self.distinct.update(value);
    }

    pub(crate) fn compact(&mut self) {
        self.top_values.compact();
    }

    /// Returns the merge of two summaries.
    pub fn merge(&self, other: &Self) -> Result<Self> {
        Ok(Self {
            top_values: self.top_values.merge(&other.top_values)?,
            distinct: self.distinct.merge(&other.distinct)?,
            num_strings: self.num_strings + other.num_strings,
            total_length: self.total_length + other.total_length,
        })
    }

    /// Number of string values summarized.
    pub fn count(&self) -> u64 {
        self.num_strings
    }

    /// Estimated number of distinct strings.
    pub fn distinct_estimate(&self) -> u64 {
        self.distinct.estimate_rounded()
    }

    /// Average length in characters, `None` when no strings were seen.
    pub fn avg_length(&self) -> Option<f64> {
        (self.num_strings > 0).then(|| self.total_length as f64 / self.num_strings as f64)
    }

    pub fn top_values(&self) -> &TopKSketch {
        &self.top_values
    }

    pub fn distinct_sketch(&self) -> &DistinctSketch {
        &self.distinct
    }
}

/// Smallest and largest number of values in a single present example.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueCountRange {
    pub min: u64,
    pub max: u64,
}

impl ValueCountRange {
    pub(crate) fn include(range: Option<Self>, count: u64) -> Self {
        match range {
            Some(r) => Self {
                min: r.min.min(count),
                max: r.max.max(count),
            },
            None => Self {
                min: count,
                max: count,
            },
        }
    }

    fn combine(a: Option<Self>, b: Option<Self>) -> Option<Self> {
        match (a, b) {
            (Some(a), Some(b)) => Some(Self {
                min: a.min.min(b.min),
                max: a.max.max(b.max),
            }),
            (a, None) => a,
            (None, b) => b,
        }
    }
}

/// Immutable statistics of one feature over a shard or a whole dataset.
///
/// `present_count + missing_count` always equals the number of examples the
/// snapshot covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureStatistics {
    name: String,
    type_counts: TypeCounts,
    present_count: u64,
    missing_count: u64,
    total_values: u64,
    num_values: Option<ValueCountRange>,
    numeric: Option<NumericStatistics>,
    categorical: Option<CategoricalStatistics>,
}

impl FeatureStatistics {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        name: String,
        type_counts: TypeCounts,
        present_count: u64,
        missing_count: u64,
        total_values: u64,
        num_values: Option<ValueCountRange>,
        numeric: Option<NumericStatistics>,
        categorical: Option<CategoricalStatistics>,
    ) -> Self {
        Self {
            name,
            type_counts,
            present_count,
            missing_count,
            total_values,
            num_values,
            numeric,
            categorical,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Majority type of the observed values, `None` if no value was seen.
    pub fn feature_type(&self) -> Option<FeatureType> {
        self.type_counts.majority()
    }

    /// True when values of more than one kind were observed.
    pub fn has_type_conflict(&self) -> bool {
        self.type_counts.is_conflicted()
    }

    pub fn type_counts(&self) -> &TypeCounts {
        &self.type_counts
    }

    /// Examples in which the feature had an entry.
    pub fn present_count(&self) -> u64 {
        self.present_count
    }

    /// Examples in which the feature had no entry.
    pub fn missing_count(&self) -> u64 {
        self.missing_count
    }

    /// Examples covered by this snapshot.
    pub fn num_examples(&self) -> u64 {
        self.present_count + self.missing_count
    }

    /// Fraction of covered examples in which the feature is present.
    pub fn presence_fraction(&self) -> f64 {
        match self.num_examples() {
            0 => 0.0,
            n => self.present_count as f64 / n as f64,
        }
    }

    /// Total number of values across present examples.
    pub fn total_values(&self) -> u64 {
        self.total_values
    }

    /// Per-example value count range over present examples.
    pub fn num_values(&self) -> Option<ValueCountRange> {
        self.num_values
    }

    /// Average number of values per present example.
    pub fn avg_num_values(&self) -> Option<f64> {
        (self.present_count > 0).then(|| self.total_values as f64 / self.present_count as f64)
    }

    pub fn numeric(&self) -> Option<&NumericStatistics> {
        self.numeric.as_ref()
    }

    pub fn categorical(&self) -> Option<&CategoricalStatistics> {
        self.categorical.as_ref()
    }

    /// Returns the merge of two snapshots of the same feature.
    ///
    /// Count fields add, ranges widen, sketches merge under their own
    /// contracts. Differing value kinds are not an error: the type counts add
    /// up and the result carries the type conflict.
    pub fn merge(&self, other: &FeatureStatistics) -> Result<FeatureStatistics> {
        if self.name != other.name {
            return Err(FeatureGuardError::merge_mismatch(format!(
                "feature names differ: '{}' vs '{}'",
                self.name, other.name
            )));
        }

        Ok(FeatureStatistics {
            name: self.name.clone(),
            type_counts: self.type_counts.combine(&other.type_counts),
            present_count: self.present_count + other.present_count,
            missing_count: self.missing_count + other.missing_count,
            total_values: self.total_values + other.total_values,
            num_values: ValueCountRange::combine(self.num_values, other.num_values),
            numeric: merge_optional(&self.numeric, &other.numeric, NumericStatistics::merge)?,
            categorical: merge_optional(
                &self.categorical,
                &other.categorical,
                CategoricalStatistics::merge,
            )?,
        })
    }

    /// Copy of this snapshot covering `examples` more examples in which the
    /// feature did not occur.
    pub(crate) fn with_additional_missing(&self, examples: u64) -> FeatureStatistics {
        let mut stats = self.clone();
        stats.missing_count += examples;
        stats
    }
}

fn merge_optional<T: Clone>(
    a: &Option<T>,
    b: &Option<T>,
    merge: fn(&T, &T) -> Result<T>,
) -> Result<Option<T>> {
    match (a, b) {
        (Some(a), Some(b)) => merge(a, b).map(Some),
        (Some(a), None) => Ok(Some(a.clone())),
        (None, Some(b)) => Ok(Some(b.clone())),
        (None, None) => Ok(None),
    }
}

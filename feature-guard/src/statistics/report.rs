//! Summary view of dataset statistics for external consumers.
//!
//! [`DatasetStatistics`] carries full sketches so it can keep being merged.
//! The report flattens them into plain numbers: moments and quantile
//! boundaries for numeric features, distinct estimates and top values for
//! categorical ones.

use serde::{Deserialize, Serialize};

use crate::statistics::dataset::DatasetStatistics;
use crate::statistics::feature::{CategoricalStatistics, FeatureStatistics, NumericStatistics};
use crate::statistics::options::StatsOptions;
use crate::types::FeatureType;

/// Serializable summary of a dataset's statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsReport {
    pub num_examples: u64,
    pub features: Vec<FeatureReport>,
}

/// Summary of a single feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureReport {
    pub name: String,
    pub feature_type: Option<FeatureType>,
    pub type_conflict: bool,
    pub present_count: u64,
    pub missing_count: u64,
    pub total_values: u64,
    pub min_num_values: Option<u64>,
    pub max_num_values: Option<u64>,
    pub avg_num_values: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric: Option<NumericReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categorical: Option<CategoricalReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericReport {
    pub count: u64,
    pub mean: Option<f64>,
    pub variance: Option<f64>,
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub num_zeros: u64,
    pub num_non_finite: u64,
    /// Evenly spaced quantile boundaries from min to max
    pub quantiles: Vec<f64>,
    /// Normalized rank error of the quantiles
    pub quantile_rank_error: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalReport {
    pub count: u64,
    pub distinct_estimate: u64,
    pub distinct_is_exact: bool,
    pub avg_length: Option<f64>,
    pub top_values: Vec<ValueFrequency>,
    /// Largest possible undercount of any listed frequency
    pub frequency_error: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueFrequency {
    pub value: String,
    pub frequency: u64,
}

impl StatisticsReport {
    pub(crate) fn from_statistics(stats: &DatasetStatistics, options: &StatsOptions) -> Self {
        Self {
            num_examples: stats.num_examples(),
            features: stats
                .features()
                .map(|f| FeatureReport::from_statistics(f, options))
                .collect(),
        }
    }

    /// Looks up one feature's summary.
    pub fn feature(&self, name: &str) -> Option<&FeatureReport> {
        self.features.iter().find(|f| f.name == name)
    }
}

impl FeatureReport {
    fn from_statistics(stats: &FeatureStatistics, options: &StatsOptions) -> Self {
        let range = stats.num_values();
        Self {
            name: stats.name().to_string(),
            feature_type: stats.feature_type(),
            type_conflict: stats.has_type_conflict(),
            present_count: stats.present_count(),
            missing_count: stats.missing_count(),
            total_values: stats.total_values(),
            min_num_values: range.map(|r| r.min),
            max_num_values: range.map(|r| r.max),
            avg_num_values: stats.avg_num_values(),
            numeric: stats
                .numeric()
                .map(|n| NumericReport::from_statistics(n, options)),
            categorical: stats
                .categorical()
                .map(|c| CategoricalReport::from_statistics(c, options)),
        }
    }
}

impl NumericReport {
    fn from_statistics(stats: &NumericStatistics, options: &StatsOptions) -> Self {
        let sketch = stats.quantile_sketch();
        Self {
            count: stats.count(),
            mean: stats.mean(),
            variance: stats.variance(),
            std_dev: stats.std_dev(),
            min: stats.min(),
            max: stats.max(),
            num_zeros: stats.num_zeros(),
            num_non_finite: stats.num_non_finite(),
            quantiles: sketch.quantiles(options.num_quantiles),
            quantile_rank_error: sketch.rank_error_bound(),
        }
    }
}

impl CategoricalReport {
    fn from_statistics(stats: &CategoricalStatistics, options: &StatsOptions) -> Self {
        Self {
            count: stats.count(),
            distinct_estimate: stats.distinct_estimate(),
            distinct_is_exact: stats.distinct_sketch().is_exact(),
            avg_length: stats.avg_length(),
            top_values: stats
                .top_values()
                .top(options.num_top_values)
                .into_iter()
                .map(|(value, frequency)| ValueFrequency { value, frequency })
                .collect(),
            frequency_error: stats.top_values().max_error(),
        }
    }
}

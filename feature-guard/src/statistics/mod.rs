//! Mergeable feature statistics.
//!
//! Statistics are computed per shard by a [`StatisticsAccumulator`] and
//! combined with [`DatasetStatistics::merge`]. Merging is associative and
//! commutative, so the result does not depend on how the data was sharded:
//! counts, extrema and moments are exact, while quantiles, top values and
//! distinct counts carry the error bounds of their sketches.
//!
//! ## Example
//!
//! ```rust,ignore
//! use feature_guard::prelude::*;
//!
//! let examples = vec![
//!     Example::new().with("age", [34]).with("country", ["US"]),
//!     Example::new().with("age", [27]),
//! ];
//! let stats = compute_statistics(&examples, &StatsOptions::default())?;
//! assert_eq!(stats.feature("country").unwrap().missing_count(), 1);
//! ```

pub mod accumulator;
pub mod dataset;
pub mod feature;
pub mod options;
pub mod report;
pub mod substrate;

pub use accumulator::{compute_statistics, FeatureAccumulator, StatisticsAccumulator};
pub use dataset::DatasetStatistics;
pub use feature::{CategoricalStatistics, FeatureStatistics, NumericStatistics, ValueCountRange};
pub use options::StatsOptions;
pub use report::{CategoricalReport, FeatureReport, NumericReport, StatisticsReport, ValueFrequency};
pub use substrate::{
    compute_statistics_sharded, ExecutionSubstrate, SequentialSubstrate, StatisticsPipeline,
    TokioSubstrate,
};

//! Options controlling statistics generation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{FeatureGuardError, Result};
use crate::sketches::{distinct, kll_sketch, top_k};

/// Configuration for statistics generation.
///
/// Sketch parameters must be identical for every shard whose statistics are
/// merged; merging snapshots built with different parameters is an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsOptions {
    /// Number of most frequent values listed per categorical feature in reports (default: 20)
    pub num_top_values: usize,
    /// Number of quantile intervals listed per numeric feature in reports (default: 10)
    pub num_quantiles: usize,
    /// `k` of the KLL quantile sketch (default: 200)
    pub quantile_sketch_k: usize,
    /// Counter capacity of the top-k frequency sketch (default: 1000)
    pub top_k_capacity: usize,
    /// `k` of the distinct-value sketch (default: 1024)
    pub distinct_sketch_k: usize,
    /// When set, only these features are accumulated
    pub feature_allowlist: Option<BTreeSet<String>>,
}

impl Default for StatsOptions {
    fn default() -> Self {
        Self {
            num_top_values: 20,
            num_quantiles: 10,
            quantile_sketch_k: kll_sketch::DEFAULT_K,
            top_k_capacity: top_k::DEFAULT_CAPACITY,
            distinct_sketch_k: distinct::DEFAULT_K,
            feature_allowlist: None,
        }
    }
}

impl StatsOptions {
    /// Sets the number of reported top values.
    pub fn with_num_top_values(mut self, n: usize) -> Self {
        self.num_top_values = n;
        self
    }

    /// Sets the number of reported quantile intervals.
    pub fn with_num_quantiles(mut self, n: usize) -> Self {
        self.num_quantiles = n;
        self
    }

    /// Sets the KLL sketch `k`.
    pub fn with_quantile_sketch_k(mut self, k: usize) -> Self {
        self.quantile_sketch_k = k;
        self
    }

    /// Sets the top-k sketch capacity.
    pub fn with_top_k_capacity(mut self, capacity: usize) -> Self {
        self.top_k_capacity = capacity;
        self
    }

    /// Sets the distinct sketch `k`.
    pub fn with_distinct_sketch_k(mut self, k: usize) -> Self {
        self.distinct_sketch_k = k;
        self
    }

    /// Restricts accumulation to the given features.
    pub fn with_feature_allowlist<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.feature_allowlist = Some(features.into_iter().map(Into::into).collect());
        self
    }

    /// Returns true if statistics should be gathered for `feature`.
    pub fn is_allowed(&self, feature: &str) -> bool {
        self.feature_allowlist
            .as_ref()
            .map_or(true, |allowed| allowed.contains(feature))
    }

    /// Checks that sketch parameters are usable.
    pub fn validate(&self) -> Result<()> {
        if self.quantile_sketch_k < kll_sketch::MIN_K {
            return Err(FeatureGuardError::configuration(format!(
                "quantile_sketch_k must be at least {}, got {}",
                kll_sketch::MIN_K,
                self.quantile_sketch_k
            )));
        }
        if self.top_k_capacity == 0 {
            return Err(FeatureGuardError::configuration(
                "top_k_capacity must be positive",
            ));
        }
        if self.distinct_sketch_k < distinct::MIN_K {
            return Err(FeatureGuardError::configuration(format!(
                "distinct_sketch_k must be at least {}, got {}",
                distinct::MIN_K,
                self.distinct_sketch_k
            )));
        }
        Ok(())
    }
}

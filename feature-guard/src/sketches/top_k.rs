//! Bounded frequent-value sketch (Misra-Gries with mergeable reductions).
//!
//! Every reported count is a lower bound of the true count, and undercounts it
//! by at most `max_error()`, which never exceeds `total / (capacity + 1)`.
//! The guarantee holds across any sequence of ingests and merges.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{FeatureGuardError, Result};

/// Default number of tracked values.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Frequent-value sketch with a fixed number of counters.
///
/// Ingest tolerates up to twice the capacity before reducing, which amortizes
/// the reduction cost; [`TopKSketch::compact`] and every merge bring the
/// counter set back to at most `capacity` entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopKSketch {
    capacity: usize,
    counters: BTreeMap<String, u64>,
    total: u64,
    /// Sum of all reductions applied in this sketch's history.
    max_error: u64,
}

impl TopKSketch {
    /// Creates a sketch tracking at most `capacity` values (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            counters: BTreeMap::new(),
            total: 0,
            max_error: 0,
        }
    }

    /// Counts one occurrence of `value`.
    pub fn update(&mut self, value: &str) {
        self.total += 1;
        match self.counters.get_mut(value) {
            Some(count) => *count += 1,
            None => {
                self.counters.insert(value.to_string(), 1);
            }
        }
        if self.counters.len() > 2 * self.capacity {
            self.reduce();
        }
    }

    /// Reduces the counter set to at most `capacity` entries.
    pub fn compact(&mut self) {
        self.reduce();
    }

    /// Subtracts the (capacity+1)-th largest count from every counter and
    /// evicts the counters that reach zero. At least `capacity + 1` counters
    /// lose that amount, which is what bounds the accumulated error by
    /// `total / (capacity + 1)`.
    fn reduce(&mut self) {
        if self.counters.len() <= self.capacity {
            return;
        }
        let mut counts: Vec<u64> = self.counters.values().copied().collect();
        counts.sort_unstable_by(|a, b| b.cmp(a));
        let cut = counts[self.capacity];

        self.counters.retain(|_, count| {
            *count -= (*count).min(cut);
            *count > 0
        });
        self.max_error += cut;
    }

    /// Returns the merge of two sketches without modifying either.
    pub fn merge(&self, other: &TopKSketch) -> Result<TopKSketch> {
        if self.capacity != other.capacity {
            return Err(FeatureGuardError::sketch(format!(
                "Cannot merge top-k sketches with different capacities: {} vs {}",
                self.capacity, other.capacity
            )));
        }

        let mut merged = self.clone();
        for (value, count) in &other.counters {
            *merged.counters.entry(value.clone()).or_insert(0) += count;
        }
        merged.total += other.total;
        merged.max_error += other.max_error;
        merged.reduce();
        Ok(merged)
    }

    /// Lower-bound estimate of the count of `value`.
    pub fn estimate(&self, value: &str) -> u64 {
        self.counters.get(value).copied().unwrap_or(0)
    }

    /// Up to `n` tracked values, most frequent first; ties by value.
    pub fn top(&self, n: usize) -> Vec<(String, u64)> {
        let mut entries: Vec<(String, u64)> = self
            .counters
            .iter()
            .map(|(value, count)| (value.clone(), *count))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries.truncate(n);
        entries
    }

    /// Iterates over all tracked values in value order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counters.iter().map(|(v, c)| (v.as_str(), *c))
    }

    /// Number of tracked values.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Returns true if nothing was ingested.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Total number of ingested occurrences.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Configured counter capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Largest possible undercount of any estimate.
    pub fn max_error(&self) -> u64 {
        self.max_error
    }

    /// Declared relative error `ε = 1 / (capacity + 1)`.
    pub fn error_bound(&self) -> f64 {
        1.0 / (self.capacity as f64 + 1.0)
    }

    /// True while no reduction ever happened: every count is exact and every
    /// ingested value is tracked.
    pub fn is_exact(&self) -> bool {
        self.max_error == 0
    }
}

impl Default for TopKSketch {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

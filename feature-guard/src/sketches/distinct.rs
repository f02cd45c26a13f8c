//! Distinct-value estimation with a K-minimum-values sketch.
//!
//! Each value is hashed to 64 bits (SHA-256 prefix, stable across processes
//! and releases). The sketch keeps the `k` smallest hashes. Below `k` distinct
//! values the count is exact; above it the estimate is `(k - 1) / θ` where `θ`
//! is the k-th smallest hash scaled to `[0, 1]`, with relative standard error
//! about `1 / sqrt(k - 2)`.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

use crate::error::{FeatureGuardError, Result};

/// Default number of retained hashes (about 3% standard error).
pub const DEFAULT_K: usize = 1024;

/// Smallest accepted `k`.
pub const MIN_K: usize = 16;

/// K-minimum-values distinct counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistinctSketch {
    k: usize,
    hashes: BTreeSet<u64>,
}

impl DistinctSketch {
    /// Creates an empty sketch. Values of `k` below [`MIN_K`] are raised to it.
    pub fn new(k: usize) -> Self {
        Self {
            k: k.max(MIN_K),
            hashes: BTreeSet::new(),
        }
    }

    fn hash_value(value: &str) -> u64 {
        let digest = Sha256::digest(value.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(prefix)
    }

    /// Records one value.
    pub fn update(&mut self, value: &str) {
        let hash = Self::hash_value(value);
        if self.hashes.len() < self.k {
            self.hashes.insert(hash);
        } else if self.hashes.last().is_some_and(|&max| hash < max) && self.hashes.insert(hash) {
            self.hashes.pop_last();
        }
    }

    /// Returns the union of two sketches without modifying either.
    pub fn merge(&self, other: &DistinctSketch) -> Result<DistinctSketch> {
        if self.k != other.k {
            return Err(FeatureGuardError::sketch(format!(
                "Cannot merge distinct sketches with different k values: {} vs {}",
                self.k, other.k
            )));
        }
        let mut hashes: BTreeSet<u64> = self.hashes.union(&other.hashes).copied().collect();
        while hashes.len() > self.k {
            hashes.pop_last();
        }
        Ok(DistinctSketch { k: self.k, hashes })
    }

    /// Estimated number of distinct values.
    pub fn estimate(&self) -> f64 {
        if self.is_exact() {
            return self.hashes.len() as f64;
        }
        match self.hashes.last() {
            Some(&kth) if kth > 0 => {
                let theta = kth as f64 / u64::MAX as f64;
                (self.k - 1) as f64 / theta
            }
            _ => self.hashes.len() as f64,
        }
    }

    /// Estimate rounded to the nearest integer.
    pub fn estimate_rounded(&self) -> u64 {
        self.estimate().round() as u64
    }

    /// True while fewer than `k` distinct hashes were seen.
    pub fn is_exact(&self) -> bool {
        self.hashes.len() < self.k
    }

    /// Relative standard error of the estimate once it is approximate.
    pub fn relative_standard_error(&self) -> f64 {
        1.0 / ((self.k - 2) as f64).sqrt()
    }

    /// The k parameter.
    pub fn k(&self) -> usize {
        self.k
    }
}

impl Default for DistinctSketch {
    fn default() -> Self {
        Self::new(DEFAULT_K)
    }
}

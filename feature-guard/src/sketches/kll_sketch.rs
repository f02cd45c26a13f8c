//! KLL (Karnin-Lang-Liberty) sketch for memory-efficient approximate quantile computation.
//!
//! The KLL sketch maintains a hierarchy of compactors. Level `h` holds items
//! that each stand for `2^h` original values. When the sketch outgrows its
//! budget, one full level is sorted and every other item is promoted to the
//! next level. Level capacities shrink geometrically (factor 2/3) below the top
//! level, which bounds memory by O(k + log n).
//!
//! The normalized rank error is bounded by [`KllSketch::rank_error_bound`],
//! roughly `2.446 / k^0.9433` (about 1.65% for k = 200), and does not depend on
//! how many partial sketches were merged to produce the final one.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{FeatureGuardError, Result};

/// Smallest accepted `k`.
pub const MIN_K: usize = 8;

/// Default `k`, about 1.65% normalized rank error.
pub const DEFAULT_K: usize = 200;

/// Capacity decay per level below the top.
const CAPACITY_DECAY: f64 = 2.0 / 3.0;

/// Floor for the capacity of any level.
const MIN_LEVEL_CAPACITY: usize = 8;

/// KLL sketch for approximate quantile computation.
///
/// # Example
///
/// ```rust
/// use feature_guard::sketches::KllSketch;
///
/// let mut sketch = KllSketch::new(200);
/// for i in 0..1000 {
///     sketch.update(i as f64);
/// }
///
/// let median = sketch.quantile(0.5).unwrap();
/// assert!((median - 500.0).abs() < 50.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KllSketch {
    /// Controls accuracy/memory tradeoff (higher k = better accuracy)
    k: usize,
    /// Items per level; an item at level h has weight 2^h
    levels: Vec<Vec<f64>>,
    /// Compactions performed per level, summed under merge
    compactions: Vec<u64>,
    /// Total number of items seen
    n: u64,
    min_value: Option<f64>,
    max_value: Option<f64>,
}

impl KllSketch {
    /// Creates a new KLL sketch. Values of `k` below [`MIN_K`] are raised to it.
    pub fn new(k: usize) -> Self {
        Self {
            k: k.max(MIN_K),
            levels: vec![Vec::new()],
            compactions: vec![0],
            n: 0,
            min_value: None,
            max_value: None,
        }
    }

    /// Normalized rank error for a given `k`.
    pub fn rank_error_for_k(k: usize) -> f64 {
        2.446 / (k.max(MIN_K) as f64).powf(0.9433)
    }

    /// Capacity of a level given the current height of the sketch.
    fn capacity(&self, level: usize) -> usize {
        let depth = self.levels.len() - level - 1;
        let scaled = (self.k as f64 * CAPACITY_DECAY.powi(depth as i32)).ceil() as usize;
        scaled.max(MIN_LEVEL_CAPACITY)
    }

    fn max_size(&self) -> usize {
        (0..self.levels.len()).map(|h| self.capacity(h)).sum()
    }

    fn size(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    fn grow(&mut self) {
        self.levels.push(Vec::new());
        self.compactions.push(0);
    }

    /// Updates the sketch with a new value. Non-finite values are ignored.
    pub fn update(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }

        self.n += 1;
        self.min_value = Some(self.min_value.map_or(value, |m| m.min(value)));
        self.max_value = Some(self.max_value.map_or(value, |m| m.max(value)));
        self.levels[0].push(value);

        if self.size() >= self.max_size() {
            self.compress();
        }
    }

    /// Compacts the lowest full level until the sketch fits its budget again.
    fn compress(&mut self) {
        while self.size() >= self.max_size() {
            let Some(level) = (0..self.levels.len()).find(|&h| self.levels[h].len() >= self.capacity(h))
            else {
                break;
            };
            if level + 1 >= self.levels.len() {
                self.grow();
            }
            let promoted = self.compact_level(level);
            self.levels[level + 1].extend(promoted);
        }
    }

    /// Sorts a level and returns every other item; an odd leftover (the
    /// smallest item) stays behind.
    fn compact_level(&mut self, level: usize) -> Vec<f64> {
        let mut items = std::mem::take(&mut self.levels[level]);
        items.sort_by(f64::total_cmp);

        let offset = usize::from(self.coin(level));
        self.compactions[level] += 1;

        let start = items.len() % 2;
        let promoted = items[start..]
            .iter()
            .skip(offset)
            .step_by(2)
            .copied()
            .collect();
        if start == 1 {
            self.levels[level].push(items[0]);
        }
        promoted
    }

    /// Pseudo-random compaction parity.
    ///
    /// Derived from the level and its compaction count only, so it is
    /// independent of the data and identical for any merge order.
    fn coin(&self, level: usize) -> bool {
        let mut hasher = Sha256::new();
        hasher.update((level as u64).to_le_bytes());
        hasher.update(self.compactions[level].to_le_bytes());
        hasher.finalize()[0] & 1 == 1
    }

    /// Merges another KLL sketch into this one.
    ///
    /// Both sketches must have the same k parameter.
    pub fn merge(&mut self, other: &KllSketch) -> Result<()> {
        if self.k != other.k {
            return Err(FeatureGuardError::sketch(format!(
                "Cannot merge KLL sketches with different k values: {} vs {}",
                self.k, other.k
            )));
        }

        self.n += other.n;
        self.min_value = merge_option(self.min_value, other.min_value, f64::min);
        self.max_value = merge_option(self.max_value, other.max_value, f64::max);

        while self.levels.len() < other.levels.len() {
            self.grow();
        }
        for (level, items) in other.levels.iter().enumerate() {
            self.levels[level].extend_from_slice(items);
            self.compactions[level] += other.compactions[level];
        }

        self.compress();

        // Canonical layout: equal inputs in either order give equal sketches.
        for level in &mut self.levels {
            level.sort_by(f64::total_cmp);
        }
        Ok(())
    }

    /// Returns the merge of two sketches without modifying either.
    pub fn merged(&self, other: &KllSketch) -> Result<KllSketch> {
        let mut result = self.clone();
        result.merge(other)?;
        Ok(result)
    }

    fn weighted_items(&self) -> Vec<(f64, u64)> {
        let mut items: Vec<(f64, u64)> = self
            .levels
            .iter()
            .enumerate()
            .flat_map(|(level, values)| {
                let weight = 1u64 << level.min(62);
                values.iter().map(move |&v| (v, weight))
            })
            .collect();
        items.sort_by(|a, b| a.0.total_cmp(&b.0));
        items
    }

    /// Returns the approximate quantile for the given phi (0 <= phi <= 1).
    ///
    /// `phi = 0` and `phi = 1` return the exact minimum and maximum.
    pub fn quantile(&self, phi: f64) -> Result<f64> {
        if !(0.0..=1.0).contains(&phi) {
            return Err(FeatureGuardError::sketch(format!(
                "Quantile phi must be in [0, 1], got {phi}"
            )));
        }
        let (Some(min), Some(max)) = (self.min_value, self.max_value) else {
            return Err(FeatureGuardError::sketch(
                "Cannot compute quantile on empty sketch",
            ));
        };
        if phi == 0.0 {
            return Ok(min);
        }
        if phi == 1.0 {
            return Ok(max);
        }

        let items = self.weighted_items();
        let total_weight: u64 = items.iter().map(|(_, w)| *w).sum();
        let target_rank = (phi * total_weight as f64).ceil() as u64;

        let mut cumulative = 0u64;
        for (value, weight) in items {
            cumulative += weight;
            if cumulative >= target_rank {
                return Ok(value.clamp(min, max));
            }
        }
        Ok(max)
    }

    /// Returns `num_intervals + 1` evenly spaced quantile boundaries, from the
    /// minimum to the maximum. Empty sketches yield an empty vector.
    pub fn quantiles(&self, num_intervals: usize) -> Vec<f64> {
        if self.is_empty() || num_intervals == 0 {
            return Vec::new();
        }
        (0..=num_intervals)
            .filter_map(|i| self.quantile(i as f64 / num_intervals as f64).ok())
            .collect()
    }

    /// Approximate fraction of values less than or equal to `value`.
    pub fn rank(&self, value: f64) -> f64 {
        self.normalized_weight(|item| item <= value)
    }

    /// Approximate fraction of values strictly less than `value`.
    pub fn rank_exclusive(&self, value: f64) -> f64 {
        self.normalized_weight(|item| item < value)
    }

    fn normalized_weight(&self, include: impl Fn(f64) -> bool) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        let mut total = 0u64;
        let mut selected = 0u64;
        for (level, values) in self.levels.iter().enumerate() {
            let weight = 1u64 << level.min(62);
            for &v in values {
                total += weight;
                if include(v) {
                    selected += weight;
                }
            }
        }
        selected as f64 / total as f64
    }

    /// Returns the total number of items processed.
    pub fn count(&self) -> u64 {
        self.n
    }

    /// Returns true if the sketch is empty.
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Returns the k parameter.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Exact minimum of the ingested values.
    pub fn min(&self) -> Option<f64> {
        self.min_value
    }

    /// Exact maximum of the ingested values.
    pub fn max(&self) -> Option<f64> {
        self.max_value
    }

    /// Returns the number of compactor levels.
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Returns the number of retained items.
    pub fn num_retained(&self) -> usize {
        self.size()
    }

    /// Returns the normalized rank error bound for this sketch.
    pub fn rank_error_bound(&self) -> f64 {
        Self::rank_error_for_k(self.k)
    }
}

impl Default for KllSketch {
    fn default() -> Self {
        Self::new(DEFAULT_K)
    }
}

fn merge_option(a: Option<f64>, b: Option<f64>, pick: fn(f64, f64) -> f64) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(pick(a, b)),
        (a, None) => a,
        (None, b) => b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Largest absolute difference between the sketch rank and the true rank
    /// of `0..n`, probed at every percentile.
    fn max_rank_error(sketch: &KllSketch, n: usize) -> f64 {
        (1..100)
            .map(|p| {
                let phi = p as f64 / 100.0;
                let value = sketch.quantile(phi).unwrap();
                let true_rank = (value + 1.0) / n as f64;
                (true_rank - phi).abs()
            })
            .fold(0.0, f64::max)
    }

    #[test]
    fn test_kll_sketch_basic() {
        let mut sketch = KllSketch::new(200);
        for i in 0..10_000 {
            sketch.update(i as f64);
        }

        assert_eq!(sketch.count(), 10_000);
        assert_eq!(sketch.min(), Some(0.0));
        assert_eq!(sketch.max(), Some(9_999.0));

        let error = max_rank_error(&sketch, 10_000);
        assert!(
            error <= 3.0 * sketch.rank_error_bound(),
            "rank error {error} exceeds bound"
        );
    }

    #[test]
    fn test_kll_sketch_memory_is_bounded() {
        let mut sketch = KllSketch::new(100);
        for i in 0..200_000 {
            sketch.update((i % 7919) as f64);
        }
        // Budget is the sum of level capacities: well under 4k + 8 per level.
        assert!(sketch.num_retained() < 4 * 100 + 8 * sketch.num_levels());
    }

    #[test]
    fn test_kll_sketch_empty() {
        let sketch = KllSketch::new(100);
        assert!(sketch.is_empty());
        assert!(sketch.quantile(0.5).is_err());
        assert!(sketch.quantiles(4).is_empty());
        assert_eq!(sketch.rank(1.0), 0.0);
    }

    #[test]
    fn test_kll_sketch_single_value() {
        let mut sketch = KllSketch::new(100);
        sketch.update(42.0);

        assert_eq!(sketch.quantile(0.0).unwrap(), 42.0);
        assert_eq!(sketch.quantile(0.5).unwrap(), 42.0);
        assert_eq!(sketch.quantile(1.0).unwrap(), 42.0);
    }

    #[test]
    fn test_kll_sketch_invalid_phi() {
        let mut sketch = KllSketch::new(100);
        sketch.update(1.0);
        assert!(sketch.quantile(1.5).is_err());
        assert!(sketch.quantile(-0.1).is_err());
    }

    #[test]
    fn test_kll_sketch_merge() {
        let mut sketch1 = KllSketch::new(200);
        let mut sketch2 = KllSketch::new(200);
        for i in 0..5_000 {
            sketch1.update(i as f64);
        }
        for i in 5_000..10_000 {
            sketch2.update(i as f64);
        }

        sketch1.merge(&sketch2).unwrap();
        assert_eq!(sketch1.count(), 10_000);
        assert_eq!(sketch1.min(), Some(0.0));
        assert_eq!(sketch1.max(), Some(9_999.0));
        assert!(max_rank_error(&sketch1, 10_000) <= 3.0 * sketch1.rank_error_bound());
    }

    #[test]
    fn test_error_does_not_grow_with_merge_depth() {
        let n = 16_384;
        let shards: Vec<KllSketch> = (0..64)
            .map(|s| {
                let mut sketch = KllSketch::new(200);
                // Interleave so every shard covers the whole range.
                for i in (s..n).step_by(64) {
                    sketch.update(i as f64);
                }
                sketch
            })
            .collect();

        let mut sequential = KllSketch::new(200);
        for shard in &shards {
            sequential.merge(shard).unwrap();
        }
        assert_eq!(sequential.count(), n as u64);
        assert!(max_rank_error(&sequential, n) <= 3.0 * sequential.rank_error_bound());
    }

    #[test]
    fn test_merge_is_order_insensitive() {
        let mut a = KllSketch::new(50);
        let mut b = KllSketch::new(50);
        for i in 0..3_000 {
            a.update((i * 7 % 1000) as f64);
        }
        for i in 0..1_700 {
            b.update((i * 13 % 500) as f64 + 0.5);
        }

        let ab = a.merged(&b).unwrap();
        let ba = b.merged(&a).unwrap();
        assert_eq!(ab, ba);
        assert_eq!(ab.quantiles(10), ba.quantiles(10));
    }

    #[test]
    fn test_compaction_coin_is_pinned() {
        // Persisted sketches must keep compacting the same way across builds.
        let mut sketch = KllSketch::new(50);
        sketch.compactions = vec![0, 0];
        let mut parities = Vec::new();
        for level in 0..2 {
            let bits: Vec<bool> = (0..8)
                .map(|count| {
                    sketch.compactions[level] = count;
                    sketch.coin(level)
                })
                .collect();
            parities.push(bits);
        }
        assert_eq!(
            parities,
            vec![
                vec![true, true, true, false, true, true, true, false],
                vec![false, true, false, false, true, true, true, false],
            ]
        );
    }

    #[test]
    fn test_merge_rejects_different_k() {
        let mut a = KllSketch::new(100);
        let b = KllSketch::new(200);
        assert!(a.merge(&b).is_err());
    }

    #[test]
    fn test_kll_sketch_nan_handling() {
        let mut sketch = KllSketch::new(100);
        sketch.update(1.0);
        sketch.update(f64::NAN);
        sketch.update(f64::INFINITY);
        sketch.update(2.0);

        assert_eq!(sketch.count(), 2);
    }

    #[test]
    fn test_rank_queries() {
        let mut sketch = KllSketch::new(200);
        for i in 0..100 {
            sketch.update(i as f64);
        }
        // Exact while nothing has been compacted.
        assert_eq!(sketch.rank(49.0), 0.5);
        assert_eq!(sketch.rank_exclusive(0.0), 0.0);
        assert_eq!(sketch.rank(1000.0), 1.0);
    }

    #[test]
    fn test_quantile_boundaries() {
        let mut sketch = KllSketch::new(200);
        for i in 1..=100 {
            sketch.update(i as f64);
        }
        let bounds = sketch.quantiles(4);
        assert_eq!(bounds, vec![1.0, 25.0, 50.0, 75.0, 100.0]);
    }

    #[test]
    fn test_rank_error_bound() {
        let sketch = KllSketch::new(200);
        assert!((sketch.rank_error_bound() - 0.0165).abs() < 0.001);
    }

    #[test]
    fn test_serde_round_trip() {
        let mut sketch = KllSketch::new(50);
        for i in 0..500 {
            sketch.update(i as f64 * 0.5);
        }
        let json = serde_json::to_string(&sketch).unwrap();
        let back: KllSketch = serde_json::from_str(&json).unwrap();
        assert_eq!(back.quantiles(5), sketch.quantiles(5));
    }
}

//! Streaming mean and variance.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Running count, mean and sum of squared deviations (Welford).
///
/// Updates never form `sum(x²) - n·mean²`, which loses all precision when the
/// mean is large relative to the spread. Partial states combine with the
/// pairwise formula of Chan, Golub and LeVeque.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningMoments {
    count: u64,
    mean: f64,
    m2: f64,
}

impl RunningMoments {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one finite value.
    pub fn update(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// Combines two states into a new one.
    ///
    /// Operands are put in a canonical order first, so `a.merge(&b)` and
    /// `b.merge(&a)` produce bit-identical results.
    pub fn merge(&self, other: &Self) -> Self {
        let (a, b) = match Self::canonical_cmp(self, other) {
            Ordering::Greater => (other, self),
            _ => (self, other),
        };
        if a.count == 0 {
            return *b;
        }
        if b.count == 0 {
            return *a;
        }

        let count = a.count + b.count;
        let na = a.count as f64;
        let nb = b.count as f64;
        let n = count as f64;
        let delta = b.mean - a.mean;

        Self {
            count,
            mean: a.mean + delta * nb / n,
            m2: a.m2 + b.m2 + delta * delta * na * nb / n,
        }
    }

    fn canonical_cmp(a: &Self, b: &Self) -> Ordering {
        a.count
            .cmp(&b.count)
            .then_with(|| a.mean.total_cmp(&b.mean))
            .then_with(|| a.m2.total_cmp(&b.m2))
    }

    /// Number of values seen.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean of the values, `None` when empty.
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    /// Population variance, `None` when empty.
    pub fn variance(&self) -> Option<f64> {
        (self.count > 0).then(|| (self.m2 / self.count as f64).max(0.0))
    }

    /// Sample variance with Bessel's correction, `None` below two values.
    pub fn sample_variance(&self) -> Option<f64> {
        (self.count > 1).then(|| (self.m2 / (self.count - 1) as f64).max(0.0))
    }

    /// Population standard deviation.
    pub fn std_dev(&self) -> Option<f64> {
        self.variance().map(f64::sqrt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_values(values: &[f64]) -> RunningMoments {
        let mut moments = RunningMoments::new();
        for &v in values {
            moments.update(v);
        }
        moments
    }

    #[test]
    fn test_empty_moments() {
        let moments = RunningMoments::new();
        assert_eq!(moments.mean(), None);
        assert_eq!(moments.variance(), None);
        assert_eq!(moments.sample_variance(), None);
    }

    #[test]
    fn test_mean_and_variance() {
        let moments = from_values(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(moments.count(), 8);
        assert!((moments.mean().unwrap() - 5.0).abs() < 1e-12);
        assert!((moments.variance().unwrap() - 4.0).abs() < 1e-12);
        assert!((moments.std_dev().unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_large_offset_is_stable() {
        // Naive sum-of-squares loses every digit here.
        let base = 1e9;
        let moments = from_values(&[base + 4.0, base + 7.0, base + 13.0, base + 16.0]);
        assert!((moments.variance().unwrap() - 22.5).abs() < 1e-6);
    }

    #[test]
    fn test_merge_matches_single_pass() {
        let all: Vec<f64> = (0..100).map(|i| (i as f64) * 0.37 - 5.0).collect();
        let left = from_values(&all[..37]);
        let right = from_values(&all[37..]);
        let single = from_values(&all);

        let merged = left.merge(&right);
        assert_eq!(merged.count(), single.count());
        assert!((merged.mean().unwrap() - single.mean().unwrap()).abs() < 1e-9);
        assert!((merged.variance().unwrap() - single.variance().unwrap()).abs() < 1e-9);
    }

    #[test]
    fn test_merge_is_bitwise_commutative() {
        let a = from_values(&[1.0, 2.5, 3.25]);
        let b = from_values(&[10.0, -4.0]);
        assert_eq!(a.merge(&b), b.merge(&a));
    }

    #[test]
    fn test_merge_with_empty() {
        let a = from_values(&[1.0, 3.0]);
        let empty = RunningMoments::new();
        assert_eq!(a.merge(&empty), a);
        assert_eq!(empty.merge(&a), a);
    }
}

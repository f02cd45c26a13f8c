//! Dataset-level statistics: the unit that shards produce and merges combine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, instrument};

use crate::error::{FeatureGuardError, Result};
use crate::statistics::feature::FeatureStatistics;
use crate::statistics::options::StatsOptions;
use crate::statistics::report::StatisticsReport;

/// Statistics for every feature of a dataset or shard, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetStatistics {
    num_examples: u64,
    features: BTreeMap<String, FeatureStatistics>,
}

impl DatasetStatistics {
    pub(crate) fn from_parts(
        num_examples: u64,
        features: BTreeMap<String, FeatureStatistics>,
    ) -> Self {
        Self {
            num_examples,
            features,
        }
    }

    /// Total number of examples covered.
    pub fn num_examples(&self) -> u64 {
        self.num_examples
    }

    /// Looks up the statistics of one feature.
    pub fn feature(&self, name: &str) -> Option<&FeatureStatistics> {
        self.features.get(name)
    }

    /// Iterates over feature statistics in name order.
    pub fn features(&self) -> impl Iterator<Item = &FeatureStatistics> {
        self.features.values()
    }

    /// Feature names in order.
    pub fn feature_names(&self) -> impl Iterator<Item = &str> {
        self.features.keys().map(String::as_str)
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Returns true if no feature was observed.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Returns the merge of two snapshots without modifying either.
    ///
    /// Features present on both sides are merged; a feature present on one
    /// side only is carried over, missing from every example of the other
    /// side.
    pub fn merge(&self, other: &DatasetStatistics) -> Result<DatasetStatistics> {
        let mut features = BTreeMap::new();

        for (name, stats) in &self.features {
            let merged = match other.features.get(name) {
                Some(theirs) => stats.merge(theirs)?,
                None => stats.with_additional_missing(other.num_examples),
            };
            features.insert(name.clone(), merged);
        }
        for (name, stats) in &other.features {
            if !self.features.contains_key(name) {
                features.insert(
                    name.clone(),
                    stats.with_additional_missing(self.num_examples),
                );
            }
        }

        debug!(
            left_examples = self.num_examples,
            right_examples = other.num_examples,
            num_features = features.len(),
            "Merged dataset statistics"
        );

        Ok(DatasetStatistics {
            num_examples: self.num_examples + other.num_examples,
            features,
        })
    }

    /// Merges any number of snapshots left to right. An empty input yields
    /// empty statistics, the identity of `merge`.
    pub fn merge_all<'a, I>(parts: I) -> Result<DatasetStatistics>
    where
        I: IntoIterator<Item = &'a DatasetStatistics>,
    {
        parts
            .into_iter()
            .try_fold(DatasetStatistics::default(), |acc, part| acc.merge(part))
    }

    /// Builds the summary view of these statistics.
    pub fn report(&self, options: &StatsOptions) -> StatisticsReport {
        StatisticsReport::from_statistics(self, options)
    }

    /// Checks that every feature covers exactly `num_examples` examples.
    pub fn check_consistency(&self) -> Result<()> {
        for stats in self.features.values() {
            if stats.num_examples() != self.num_examples {
                return Err(FeatureGuardError::Serialization(format!(
                    "feature '{}' covers {} examples, dataset has {}",
                    stats.name(),
                    stats.num_examples(),
                    self.num_examples
                )));
            }
        }
        Ok(())
    }

    /// Serializes to compact JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses statistics from JSON and checks their consistency.
    pub fn from_json(json: &str) -> Result<DatasetStatistics> {
        let stats: DatasetStatistics = serde_json::from_str(json)?;
        stats.check_consistency()?;
        Ok(stats)
    }

    /// Loads statistics previously written with [`DatasetStatistics::write`].
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<DatasetStatistics> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&json)
    }

    /// Writes statistics as JSON.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::accumulator::compute_statistics;
    use crate::types::Example;

    fn stats(rows: Vec<Example>) -> DatasetStatistics {
        compute_statistics(rows, &StatsOptions::default()).unwrap()
    }

    #[test]
    fn test_merge_unions_features_and_keeps_coverage() {
        let left = stats(vec![
            Example::new().with("a", [1]),
            Example::new().with("a", [2]),
        ]);
        let right = stats(vec![Example::new().with("b", ["x"])]);

        let merged = left.merge(&right).unwrap();
        assert_eq!(merged.num_examples(), 3);
        merged.check_consistency().unwrap();

        let a = merged.feature("a").unwrap();
        assert_eq!((a.present_count(), a.missing_count()), (2, 1));
        let b = merged.feature("b").unwrap();
        assert_eq!((b.present_count(), b.missing_count()), (1, 2));
    }

    #[test]
    fn test_merge_is_commutative() {
        let left = stats(vec![
            Example::new().with("a", [1]).with("c", ["u"]),
            Example::new().with("a", [5]),
        ]);
        let right = stats(vec![Example::new().with("b", ["x"]).with("c", ["v"])]);
        assert_eq!(left.merge(&right).unwrap(), right.merge(&left).unwrap());
    }

    #[test]
    fn test_merge_all_identity() {
        let only = stats(vec![Example::new().with("a", [1])]);
        assert_eq!(DatasetStatistics::merge_all([&only]).unwrap(), only);
        assert_eq!(
            DatasetStatistics::merge_all(std::iter::empty()).unwrap(),
            DatasetStatistics::default()
        );
    }

    #[test]
    fn test_json_round_trip_and_file_io() {
        let original = stats(vec![
            Example::new().with("a", [1.5]).with("s", ["hello"]),
            Example::new().with("a", [2.5]),
        ]);
        let json = original.to_json().unwrap();
        assert_eq!(DatasetStatistics::from_json(&json).unwrap(), original);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        original.write(&path).unwrap();
        assert_eq!(DatasetStatistics::load(&path).unwrap(), original);
    }

    #[test]
    fn test_from_json_rejects_inconsistent_counts() {
        let original = stats(vec![Example::new().with("a", [1])]);
        let tampered = original
            .to_json()
            .unwrap()
            .replacen("\"num_examples\":1", "\"num_examples\":7", 1);
        assert!(DatasetStatistics::from_json(&tampered).is_err());
    }
}

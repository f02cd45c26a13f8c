//! Streaming accumulators that turn decoded examples into statistics.
//!
//! A [`StatisticsAccumulator`] is owned by exactly one shard worker. It keeps
//! one [`FeatureAccumulator`] per feature seen in the shard and produces an
//! immutable [`DatasetStatistics`] when finalized. Shard snapshots are then
//! combined with [`DatasetStatistics::merge`].

use std::borrow::Borrow;
use std::collections::BTreeMap;

use tracing::{debug, info, instrument};

use crate::error::{FeatureGuardError, Result};
use crate::statistics::dataset::DatasetStatistics;
use crate::statistics::feature::{
    CategoricalStatistics, FeatureStatistics, NumericStatistics, ValueCountRange,
};
use crate::statistics::options::StatsOptions;
use crate::types::{Example, FeatureType, TypeCounts, Value};

/// Running aggregate for a single feature.
#[derive(Debug)]
pub struct FeatureAccumulator {
    name: String,
    options: StatsOptions,
    type_counts: TypeCounts,
    present_count: u64,
    missing_count: u64,
    total_values: u64,
    num_values: Option<ValueCountRange>,
    numeric: Option<NumericStatistics>,
    categorical: Option<CategoricalStatistics>,
    finalized: bool,
}

impl FeatureAccumulator {
    /// Creates an empty accumulator.
    pub fn new(name: impl Into<String>, options: &StatsOptions) -> Self {
        Self {
            name: name.into(),
            options: options.clone(),
            type_counts: TypeCounts::default(),
            present_count: 0,
            missing_count: 0,
            total_values: 0,
            num_values: None,
            numeric: None,
            categorical: None,
            finalized: false,
        }
    }

    /// Returns the feature name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Records the feature's values for one example; `None` means the
    /// feature is missing from that example.
    ///
    /// Values whose kind differs from the kinds seen so far are still
    /// accumulated. The mismatch shows up as a type conflict in the finalized
    /// statistics instead of an error.
    pub fn ingest(&mut self, values: Option<&[Value]>) -> Result<()> {
        if self.finalized {
            return Err(FeatureGuardError::accumulator_finalized(&self.name));
        }

        let Some(values) = values else {
            self.missing_count += 1;
            return Ok(());
        };

        self.present_count += 1;
        self.total_values += values.len() as u64;
        self.num_values = Some(ValueCountRange::include(
            self.num_values,
            values.len() as u64,
        ));

        for value in values {
            self.record_kind(value.kind());
            match value {
                Value::Int(_) | Value::Float(_) => {
                    let numeric = self
                        .numeric
                        .get_or_insert_with(|| NumericStatistics::new(&self.options));
                    if let Some(v) = value.as_f64() {
                        numeric.update(v);
                    }
                }
                Value::Str(s) => self
                    .categorical
                    .get_or_insert_with(|| CategoricalStatistics::new(&self.options))
                    .update(s),
                Value::Struct(_) => {}
            }
        }
        Ok(())
    }

    /// Records `count` examples in which the feature did not occur.
    pub(crate) fn record_missing(&mut self, count: u64) {
        self.missing_count += count;
    }

    fn record_kind(&mut self, kind: FeatureType) {
        if self.type_counts.get(kind) == 0 {
            if let Some(existing) = self.type_counts.majority() {
                debug!(
                    feature = %self.name,
                    existing_type = %existing,
                    new_type = %kind,
                    "Type conflict recorded"
                );
            }
        }
        self.type_counts.record(kind);
    }

    /// Produces the immutable snapshot. The accumulator cannot be used
    /// afterwards.
    pub fn finalize(&mut self) -> Result<FeatureStatistics> {
        if self.finalized {
            return Err(FeatureGuardError::accumulator_finalized(&self.name));
        }
        self.finalized = true;

        let mut categorical = self.categorical.take();
        if let Some(c) = categorical.as_mut() {
            c.compact();
        }

        Ok(FeatureStatistics::from_parts(
            self.name.clone(),
            self.type_counts,
            self.present_count,
            self.missing_count,
            self.total_values,
            self.num_values,
            self.numeric.take(),
            categorical,
        ))
    }

    /// Returns true once `finalize` was called.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}

/// Running aggregate for all features of one shard.
#[derive(Debug)]
pub struct StatisticsAccumulator {
    options: StatsOptions,
    num_examples: u64,
    features: BTreeMap<String, FeatureAccumulator>,
    finalized: bool,
}

impl StatisticsAccumulator {
    /// Creates an accumulator after checking the options.
    pub fn new(options: StatsOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            num_examples: 0,
            features: BTreeMap::new(),
            finalized: false,
        })
    }

    /// Adds one decoded example.
    pub fn ingest(&mut self, example: &Example) -> Result<()> {
        if self.finalized {
            return Err(FeatureGuardError::accumulator_finalized("<dataset>"));
        }

        for (name, accumulator) in self.features.iter_mut() {
            accumulator.ingest(example.get(name))?;
        }

        for (name, values) in example.iter() {
            if self.features.contains_key(name) || !self.options.is_allowed(name) {
                continue;
            }
            let mut accumulator = FeatureAccumulator::new(name, &self.options);
            // The feature was missing from every earlier example.
            accumulator.record_missing(self.num_examples);
            accumulator.ingest(Some(values))?;
            self.features.insert(name.to_string(), accumulator);
        }

        self.num_examples += 1;
        Ok(())
    }

    /// Number of examples ingested so far.
    pub fn num_examples(&self) -> u64 {
        self.num_examples
    }

    /// Produces the shard snapshot. The accumulator cannot be used afterwards.
    pub fn finalize(&mut self) -> Result<DatasetStatistics> {
        if self.finalized {
            return Err(FeatureGuardError::accumulator_finalized("<dataset>"));
        }
        self.finalized = true;

        let mut features = BTreeMap::new();
        for (name, mut accumulator) in std::mem::take(&mut self.features) {
            features.insert(name, accumulator.finalize()?);
        }
        Ok(DatasetStatistics::from_parts(self.num_examples, features))
    }
}

/// Computes statistics over a stream of decoded examples in a single pass.
///
/// For sharded data, run one [`StatisticsAccumulator`] per shard and merge the
/// snapshots, or hand the shards to an
/// [`ExecutionSubstrate`](crate::statistics::substrate::ExecutionSubstrate).
#[instrument(skip_all)]
pub fn compute_statistics<I>(records: I, options: &StatsOptions) -> Result<DatasetStatistics>
where
    I: IntoIterator,
    I::Item: Borrow<Example>,
{
    let mut accumulator = StatisticsAccumulator::new(options.clone())?;
    for record in records {
        accumulator.ingest(record.borrow())?;
    }
    let stats = accumulator.finalize()?;

    info!(
        num_examples = stats.num_examples(),
        num_features = stats.len(),
        "Computed statistics"
    );
    Ok(stats)
}

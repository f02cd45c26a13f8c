//! Execution substrates for sharded statistics computation.
//!
//! A substrate decides where shards are processed and in what order partial
//! statistics are combined. Because merging is associative and commutative,
//! every substrate produces the same counts, extrema and moments for the same
//! shards; sketch contents agree within their documented error bounds.
//!
//! ```rust,ignore
//! use feature_guard::statistics::{StatisticsPipeline, TokioSubstrate, ExecutionSubstrate};
//! use std::sync::Arc;
//!
//! let pipeline = Arc::new(StatisticsPipeline::new(StatsOptions::default())?);
//! let stats = TokioSubstrate::default().reduce(pipeline, shards).await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument};

use crate::error::{FeatureGuardError, Result};
use crate::statistics::accumulator::compute_statistics;
use crate::statistics::dataset::DatasetStatistics;
use crate::statistics::options::StatsOptions;
use crate::types::Example;

/// The per-shard and combine steps a substrate schedules.
#[derive(Debug, Clone)]
pub struct StatisticsPipeline {
    options: StatsOptions,
}

impl StatisticsPipeline {
    /// Creates a pipeline after checking the options.
    pub fn new(options: StatsOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &StatsOptions {
        &self.options
    }

    /// Accumulates one shard into a finalized snapshot.
    pub fn process_shard(&self, shard: &[Example]) -> Result<DatasetStatistics> {
        compute_statistics(shard, &self.options)
    }

    /// Combines two partial results.
    pub fn merge(&self, left: &DatasetStatistics, right: &DatasetStatistics) -> Result<DatasetStatistics> {
        left.merge(right)
    }
}

/// Schedules shard processing and the reduction of partial statistics.
#[async_trait]
pub trait ExecutionSubstrate: Send + Sync {
    /// Processes every shard and reduces the partial results to one.
    async fn reduce(
        &self,
        pipeline: Arc<StatisticsPipeline>,
        shards: Vec<Vec<Example>>,
    ) -> Result<DatasetStatistics>;

    /// Name used in logs.
    fn name(&self) -> &str;
}

/// Processes shards one after another on the calling task and folds the
/// results left to right.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialSubstrate;

#[async_trait]
impl ExecutionSubstrate for SequentialSubstrate {
    #[instrument(skip_all, fields(substrate = "sequential", num_shards = shards.len()))]
    async fn reduce(
        &self,
        pipeline: Arc<StatisticsPipeline>,
        shards: Vec<Vec<Example>>,
    ) -> Result<DatasetStatistics> {
        let mut result = DatasetStatistics::default();
        for shard in &shards {
            let partial = pipeline.process_shard(shard)?;
            result = pipeline.merge(&result, &partial)?;
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        "sequential"
    }
}

/// Processes shards on tokio's blocking pool, bounded by a semaphore, then
/// merges the partial results pairwise as a tree.
#[derive(Debug, Clone)]
pub struct TokioSubstrate {
    max_parallelism: usize,
}

impl Default for TokioSubstrate {
    fn default() -> Self {
        Self {
            max_parallelism: num_cpus::get(),
        }
    }
}

impl TokioSubstrate {
    /// Creates a substrate running at most `max_parallelism` shards at once.
    pub fn new(max_parallelism: usize) -> Result<Self> {
        if max_parallelism == 0 {
            return Err(FeatureGuardError::configuration(
                "max_parallelism must be positive",
            ));
        }
        Ok(Self { max_parallelism })
    }

    pub fn max_parallelism(&self) -> usize {
        self.max_parallelism
    }

    async fn process_all(
        &self,
        pipeline: &Arc<StatisticsPipeline>,
        shards: Vec<Vec<Example>>,
    ) -> Result<Vec<DatasetStatistics>> {
        let semaphore = Arc::new(Semaphore::new(self.max_parallelism));

        let tasks = shards.into_iter().enumerate().map(|(index, shard)| {
            let pipeline = Arc::clone(pipeline);
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| FeatureGuardError::execution(e.to_string()))?;
                let stats =
                    tokio::task::spawn_blocking(move || pipeline.process_shard(&shard)).await??;
                debug!(
                    shard = index,
                    num_examples = stats.num_examples(),
                    "Processed shard"
                );
                Ok::<_, FeatureGuardError>(stats)
            }
        });

        try_join_all(tasks).await
    }
}

#[async_trait]
impl ExecutionSubstrate for TokioSubstrate {
    #[instrument(skip_all, fields(
        substrate = "tokio",
        num_shards = shards.len(),
        max_parallelism = self.max_parallelism
    ))]
    async fn reduce(
        &self,
        pipeline: Arc<StatisticsPipeline>,
        shards: Vec<Vec<Example>>,
    ) -> Result<DatasetStatistics> {
        let mut level = self.process_all(&pipeline, shards).await?;

        while level.len() > 1 {
            let mut pairs = Vec::with_capacity(level.len().div_ceil(2));
            let mut iter = level.into_iter();
            while let Some(left) = iter.next() {
                pairs.push((left, iter.next()));
            }

            let merges = pairs.into_iter().map(|(left, right)| {
                let pipeline = Arc::clone(&pipeline);
                async move {
                    let Some(right) = right else {
                        return Ok(left);
                    };
                    let merged =
                        tokio::task::spawn_blocking(move || pipeline.merge(&left, &right))
                            .await??;
                    Ok::<_, FeatureGuardError>(merged)
                }
            });
            level = try_join_all(merges).await?;
        }

        Ok(level.pop().unwrap_or_default())
    }

    fn name(&self) -> &str {
        "tokio"
    }
}

/// Computes statistics over pre-sharded examples with the given substrate.
pub async fn compute_statistics_sharded(
    shards: Vec<Vec<Example>>,
    options: &StatsOptions,
    substrate: &dyn ExecutionSubstrate,
) -> Result<DatasetStatistics> {
    let num_shards = shards.len();
    let pipeline = Arc::new(StatisticsPipeline::new(options.clone())?);
    let stats = substrate.reduce(pipeline, shards).await?;

    info!(
        substrate = substrate.name(),
        num_shards,
        num_examples = stats.num_examples(),
        num_features = stats.len(),
        "Computed sharded statistics"
    );
    Ok(stats)
}

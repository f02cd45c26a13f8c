//! # feature-guard - Feature statistics, schema inference and data validation
//!
//! feature-guard computes mergeable statistics over datasets of decoded
//! examples, infers a conservative schema from them, and validates later
//! datasets against that schema, reporting typed anomalies per feature.
//!
//! ## Quick Start
//!
//! ```rust
//! use feature_guard::prelude::*;
//!
//! # fn main() -> feature_guard::error::Result<()> {
//! let training: Vec<Example> = ["Cash", "Credit Card", "Cash"]
//!     .into_iter()
//!     .map(|p| Example::new().with("payment_type", [p]).with("fare", [12.5]))
//!     .collect();
//!
//! let stats = compute_statistics(&training, &StatsOptions::default())?;
//! let schema = infer_schema(&stats, &InferenceConfig::default())?;
//!
//! let serving = vec![Example::new().with("payment_type", ["Prcard"]).with("fare", [9.0])];
//! let serving_stats = compute_statistics(&serving, &StatsOptions::default())?;
//! let report = validate(&serving_stats, &schema, &ValidationOptions::default())?;
//!
//! let findings = report.get("payment_type").unwrap();
//! assert_eq!(findings[0].kind, AnomalyKind::UnexpectedValue);
//! assert_eq!(findings[0].samples, vec!["Prcard"]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`types`**: decoded records ([`types::Example`], [`types::Value`]) and feature types
//! - **`sketches`**: mergeable summaries with documented error bounds (KLL quantiles,
//!   Misra-Gries top-k, KMV distinct count, Welford moments)
//! - **`statistics`**: per-feature accumulators, dataset statistics, merging and the
//!   execution substrates that run shards in parallel
//! - **`schema`**: the schema model and conservative inference
//! - **`validation`**: anomaly detection against a schema
//! - **`logging`**: `tracing` configuration helpers
//!
//! ## Sharded computation
//!
//! Statistics of disjoint shards merge into the statistics of their union.
//! Counts, extrema and moments do not depend on the sharding; sketch-derived
//! values stay within their error bounds.
//!
//! ```rust,no_run
//! use feature_guard::prelude::*;
//!
//! # async fn example(shards: Vec<Vec<Example>>) -> feature_guard::error::Result<()> {
//! let stats = compute_statistics_sharded(
//!     shards,
//!     &StatsOptions::default(),
//!     &TokioSubstrate::default(),
//! )
//! .await?;
//! stats.write("stats.json")?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod logging;
pub mod prelude;
pub mod schema;
pub mod sketches;
pub mod statistics;
pub mod types;
pub mod validation;

pub use schema::infer_schema;
pub use statistics::{compute_statistics, compute_statistics_sharded};
pub use validation::validate;

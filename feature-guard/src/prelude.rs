//! Prelude for commonly used types and functions in feature-guard.

pub use crate::error::{FeatureGuardError, Result};
pub use crate::logging::LogConfig;
pub use crate::schema::{
    infer_schema, Domain, DomainKind, FeatureSpec, InferenceConfig, Schema, SchemaInferencer,
};
pub use crate::statistics::{
    compute_statistics, compute_statistics_sharded, DatasetStatistics, ExecutionSubstrate,
    FeatureStatistics, SequentialSubstrate, StatisticsReport, StatsOptions, TokioSubstrate,
};
pub use crate::types::{Example, FeatureType, Value};
pub use crate::validation::{
    validate, Anomaly, AnomalyKind, AnomalyReport, NewFeaturePolicy, ValidationOptions,
};

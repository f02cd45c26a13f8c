//! Validation of new data against a held schema.
//!
//! [`validate`] compares [`DatasetStatistics`](crate::statistics::DatasetStatistics)
//! with a [`Schema`](crate::schema::Schema) and returns an [`AnomalyReport`]
//! listing every deviation per feature. Validation has no side effects and is
//! deterministic, so reports can be diffed between runs.

pub mod anomaly;
pub mod validator;

pub use anomaly::{Anomaly, AnomalyKind, AnomalyReport};
pub use validator::{validate, NewFeaturePolicy, ValidationOptions};

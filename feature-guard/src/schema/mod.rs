//! Schemas: what a dataset is expected to look like.
//!
//! A [`Schema`] lists one [`FeatureSpec`] per feature and a table of named
//! [`Domain`]s that features reference by name. Schemas are usually inferred
//! once with [`infer_schema`], reviewed and edited by hand through the
//! accessors on [`Schema`], persisted as JSON, and then used to validate later
//! datasets.

pub mod inference;
pub mod types;

pub use inference::{infer_schema, InferenceConfig, SchemaInferencer, SchemaInferencerBuilder};
pub use types::{Domain, DomainKind, FeatureSpec, PresenceBounds, Schema, ValueCountBounds};

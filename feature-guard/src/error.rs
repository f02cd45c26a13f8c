//! Error types for the feature-guard library.
//!
//! All fallible operations in the crate return [`Result`], whose error side is
//! [`FeatureGuardError`]. Most conditions that a data pipeline routinely meets
//! (type conflicts, sketch overflow, empty datasets) are *not* errors: they are
//! carried as data in the statistics and reported later as anomalies. The
//! variants below cover structural problems and API misuse only.

use thiserror::Error;

/// The main error type for the feature-guard library.
#[derive(Error, Debug)]
pub enum FeatureGuardError {
    /// A schema feature references a domain that the schema does not define.
    #[error("SchemaReferenceError: feature '{feature}' references undefined domain '{domain}'")]
    SchemaReference {
        /// Feature holding the dangling reference
        feature: String,
        /// Name of the domain that could not be resolved
        domain: String,
    },

    /// A feature name occurs more than once in a schema.
    #[error("Duplicate feature '{0}' in schema")]
    DuplicateFeature(String),

    /// A domain name occurs more than once in a schema.
    #[error("Duplicate domain '{0}' in schema")]
    DuplicateDomain(String),

    /// Lookup of a feature by name failed.
    #[error("Feature '{feature}' not found")]
    FeatureNotFound { feature: String },

    /// Lookup of a domain by name failed.
    #[error("Domain '{domain}' not found")]
    DomainNotFound { domain: String },

    /// `ingest` or `finalize` was called on an accumulator that was already finalized.
    #[error("Accumulator for '{feature}' has already been finalized")]
    AccumulatorFinalized { feature: String },

    /// Two statistics snapshots cannot be merged.
    #[error("Cannot merge statistics: {0}")]
    MergeMismatch(String),

    /// A sketch was queried or combined in an invalid way.
    #[error("Sketch error: {0}")]
    Sketch(String),

    /// Invalid configuration values.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A shard task failed inside the execution substrate.
    #[error("Execution error: {0}")]
    Execution(String),
}

/// A type alias for `Result<T, FeatureGuardError>`.
pub type Result<T> = std::result::Result<T, FeatureGuardError>;

impl FeatureGuardError {
    /// Creates a schema reference error.
    pub fn schema_reference(feature: impl Into<String>, domain: impl Into<String>) -> Self {
        Self::SchemaReference {
            feature: feature.into(),
            domain: domain.into(),
        }
    }

    /// Creates a feature lookup error.
    pub fn feature_not_found(feature: impl Into<String>) -> Self {
        Self::FeatureNotFound {
            feature: feature.into(),
        }
    }

    /// Creates a domain lookup error.
    pub fn domain_not_found(domain: impl Into<String>) -> Self {
        Self::DomainNotFound {
            domain: domain.into(),
        }
    }

    /// Creates a finalized-accumulator usage error.
    pub fn accumulator_finalized(feature: impl Into<String>) -> Self {
        Self::AccumulatorFinalized {
            feature: feature.into(),
        }
    }

    /// Creates a merge mismatch error with the given message.
    pub fn merge_mismatch(msg: impl Into<String>) -> Self {
        Self::MergeMismatch(msg.into())
    }

    /// Creates a sketch error with the given message.
    pub fn sketch(msg: impl Into<String>) -> Self {
        Self::Sketch(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates an execution error with the given message.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Returns true for structural schema errors that make validation impossible.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::SchemaReference { .. } | Self::DuplicateFeature(_) | Self::DuplicateDomain(_)
        )
    }
}

/// Converts serde_json errors to FeatureGuardError.
impl From<serde_json::Error> for FeatureGuardError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<tokio::task::JoinError> for FeatureGuardError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Execution(err.to_string())
    }
}

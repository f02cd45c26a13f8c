//! Conservative schema inference from dataset statistics.
//!
//! The inferred schema is meant to accept the data it was inferred from and
//! data like it. Bounds are widened rather than tightened wherever the
//! statistics are approximate:
//!
//! | Property      | Rule                                                                  |
//! |---------------|-----------------------------------------------------------------------|
//! | type          | majority observed kind, `low_confidence` when kinds conflict          |
//! | value count   | `[1, 1]` if always single-valued, otherwise observed range ± margin   |
//! | presence      | `1.0` if always present, otherwise rounded down to `presence_step`    |
//! | enum domain   | all values, when few enough and the top-k sketch is still exact       |
//! | range domain  | opt-in, only for tightly clustered numeric features                   |
//!
//! # Example
//!
//! ```rust,ignore
//! use feature_guard::schema::SchemaInferencer;
//!
//! let inferencer = SchemaInferencer::builder()
//!     .max_domain_cardinality(50)
//!     .infer_numeric_domains(true)
//!     .build()?;
//! let schema = inferencer.infer(&stats)?;
//! ```

use serde::{Deserialize, Serialize};

use tracing::{debug, info, instrument};

use crate::error::{FeatureGuardError, Result};
use crate::schema::types::{
    Domain, DomainKind, FeatureSpec, PresenceBounds, Schema, ValueCountBounds,
};
use crate::statistics::{DatasetStatistics, FeatureStatistics};
use crate::types::FeatureType;

/// Thresholds used by schema inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Largest number of distinct values that still yields an enumerated domain (default: 100)
    pub max_domain_cardinality: u64,
    /// Granularity that partial presence fractions are rounded down to (default: 0.1)
    pub presence_step: f64,
    /// Relative widening of observed value-count bounds (default: 0.5)
    pub value_count_margin: f64,
    /// Whether numeric features may get range domains (default: false)
    pub infer_numeric_domains: bool,
    /// A range domain is inferred only if `max - min <= range_tightness * stddev` (default: 4.0)
    pub range_tightness: f64,
    /// Padding added on each side of an inferred range, relative to its width (default: 0.1)
    pub range_margin: f64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_domain_cardinality: 100,
            presence_step: 0.1,
            value_count_margin: 0.5,
            infer_numeric_domains: false,
            range_tightness: 4.0,
            range_margin: 0.1,
        }
    }
}

impl InferenceConfig {
    /// Checks that thresholds are usable.
    pub fn validate(&self) -> Result<()> {
        if !(self.presence_step > 0.0 && self.presence_step <= 1.0) {
            return Err(FeatureGuardError::configuration(format!(
                "presence_step must be in (0, 1], got {}",
                self.presence_step
            )));
        }
        for (name, value) in [
            ("value_count_margin", self.value_count_margin),
            ("range_tightness", self.range_tightness),
            ("range_margin", self.range_margin),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(FeatureGuardError::configuration(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if self.value_count_margin > 1.0 {
            return Err(FeatureGuardError::configuration(format!(
                "value_count_margin must not exceed 1.0, got {}",
                self.value_count_margin
            )));
        }
        Ok(())
    }
}

/// Builder for [`SchemaInferencer`]
pub struct SchemaInferencerBuilder {
    config: InferenceConfig,
}

impl SchemaInferencerBuilder {
    /// Set the enumerated-domain cardinality threshold
    pub fn max_domain_cardinality(mut self, threshold: u64) -> Self {
        self.config.max_domain_cardinality = threshold;
        self
    }

    /// Set the presence rounding step
    pub fn presence_step(mut self, step: f64) -> Self {
        self.config.presence_step = step;
        self
    }

    /// Set the value-count margin
    pub fn value_count_margin(mut self, margin: f64) -> Self {
        self.config.value_count_margin = margin;
        self
    }

    /// Enable or disable numeric range domains
    pub fn infer_numeric_domains(mut self, enable: bool) -> Self {
        self.config.infer_numeric_domains = enable;
        self
    }

    /// Set the range tightness factor
    pub fn range_tightness(mut self, factor: f64) -> Self {
        self.config.range_tightness = factor;
        self
    }

    /// Set the range padding
    pub fn range_margin(mut self, margin: f64) -> Self {
        self.config.range_margin = margin;
        self
    }

    /// Build the SchemaInferencer
    pub fn build(self) -> Result<SchemaInferencer> {
        SchemaInferencer::with_config(self.config)
    }
}

/// Derives a [`Schema`] from [`DatasetStatistics`].
#[derive(Debug, Clone)]
pub struct SchemaInferencer {
    config: InferenceConfig,
}

impl Default for SchemaInferencer {
    fn default() -> Self {
        Self {
            config: InferenceConfig::default(),
        }
    }
}

impl SchemaInferencer {
    /// Create a new builder for SchemaInferencer
    pub fn builder() -> SchemaInferencerBuilder {
        SchemaInferencerBuilder {
            config: InferenceConfig::default(),
        }
    }

    /// Create a SchemaInferencer from an explicit configuration
    pub fn with_config(config: InferenceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Infers a schema covering every feature present at least once.
    #[instrument(skip_all, fields(num_features = stats.len()))]
    pub fn infer(&self, stats: &DatasetStatistics) -> Result<Schema> {
        let mut features = Vec::new();
        let mut domains: Vec<Domain> = Vec::new();

        for feature in stats.features() {
            if feature.present_count() == 0 {
                debug!(feature = feature.name(), "Skipping feature never present");
                continue;
            }

            let mut spec = FeatureSpec {
                name: feature.name().to_string(),
                feature_type: feature.feature_type(),
                value_count: self.infer_value_count(feature),
                presence: self.infer_presence(feature),
                domain: None,
                low_confidence: feature.has_type_conflict(),
            };
            if spec.low_confidence {
                debug!(
                    feature = feature.name(),
                    kinds = ?feature.type_counts().observed_kinds(),
                    "Marking conflicting feature low confidence"
                );
            }

            if let Some(kind) = self.infer_domain(feature) {
                let name = match domains.iter().find(|d| d.kind == kind) {
                    Some(existing) => existing.name.clone(),
                    None => {
                        domains.push(Domain::new(feature.name(), kind));
                        feature.name().to_string()
                    }
                };
                spec.domain = Some(name);
            }
            features.push(spec);
        }

        let schema = Schema::from_parts(features, domains);
        schema.validate_structure()?;

        info!(
            num_features = schema.features().len(),
            num_domains = schema.domains().len(),
            "Inferred schema"
        );
        Ok(schema)
    }

    fn infer_value_count(&self, feature: &FeatureStatistics) -> Option<ValueCountBounds> {
        let observed = feature.num_values()?;
        if observed.min == 1 && observed.max == 1 {
            return Some(ValueCountBounds::new(1, 1));
        }
        let margin = self.config.value_count_margin;
        let min = (observed.min as f64 * (1.0 - margin)).floor() as u64;
        let max = (observed.max as f64 * (1.0 + margin)).ceil() as u64;
        Some(ValueCountBounds::new(min.min(observed.min), max.max(observed.max)))
    }

    fn infer_presence(&self, feature: &FeatureStatistics) -> PresenceBounds {
        if feature.missing_count() == 0 {
            return PresenceBounds::new(1.0, 1);
        }
        let fraction = feature.presence_fraction();
        let step = self.config.presence_step;
        let steps = (fraction / step + 1e-9).floor();
        // Snap away representation noise such as 3 * 0.1 = 0.30000000000000004.
        let snapped = ((steps * step) * 1e9).round() / 1e9;
        PresenceBounds::new(snapped.min(fraction).max(0.0), 1)
    }

    fn infer_domain(&self, feature: &FeatureStatistics) -> Option<DomainKind> {
        match feature.feature_type()? {
            FeatureType::Categorical => {
                let categorical = feature.categorical()?;
                let top_values = categorical.top_values();
                if !top_values.is_exact()
                    || categorical.distinct_estimate() > self.config.max_domain_cardinality
                {
                    debug!(
                        feature = feature.name(),
                        distinct = categorical.distinct_estimate(),
                        "No enumerated domain inferred"
                    );
                    return None;
                }
                Some(DomainKind::enumerated(
                    top_values.iter().map(|(value, _)| value.to_string()),
                ))
            }
            FeatureType::Numeric if self.config.infer_numeric_domains => {
                let numeric = feature.numeric()?;
                let (min, max, std_dev) = (numeric.min()?, numeric.max()?, numeric.std_dev()?);
                let width = max - min;
                if width > self.config.range_tightness * std_dev {
                    return None;
                }
                let pad = width * self.config.range_margin;
                Some(DomainKind::range(min - pad, max + pad))
            }
            _ => None,
        }
    }
}

/// Infers a schema from statistics using the given thresholds.
pub fn infer_schema(stats: &DatasetStatistics, config: &InferenceConfig) -> Result<Schema> {
    SchemaInferencer::with_config(config.clone())?.infer(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::{compute_statistics, StatsOptions};
    use crate::types::{Example, Value};

    fn stats(rows: Vec<Example>) -> DatasetStatistics {
        compute_statistics(rows, &StatsOptions::default()).unwrap()
    }

    #[test]
    fn test_single_valued_always_present_feature() {
        let rows = (0..10)
            .map(|i| Example::new().with("age", [20 + i]))
            .collect();
        let schema = infer_schema(&stats(rows), &InferenceConfig::default()).unwrap();

        let age = schema.feature("age").unwrap();
        assert_eq!(age.feature_type, Some(FeatureType::Numeric));
        assert_eq!(age.value_count, Some(ValueCountBounds::new(1, 1)));
        assert_eq!(age.presence, PresenceBounds::new(1.0, 1));
        assert!(age.domain.is_none());
        assert!(!age.low_confidence);
    }

    #[test]
    fn test_multi_valued_bounds_are_widened() {
        let rows = vec![
            Example::new().with("tags", ["a", "b"]),
            Example::new().with("tags", ["a", "b", "c", "d"]),
        ];
        let schema = infer_schema(&stats(rows), &InferenceConfig::default()).unwrap();
        assert_eq!(
            schema.feature("tags").unwrap().value_count,
            Some(ValueCountBounds::new(1, 6))
        );
    }

    #[test]
    fn test_partial_presence_rounds_down() {
        let rows = (0..10)
            .map(|i| {
                if i < 3 {
                    Example::new().with("device", ["mobile"]).with("id", [i])
                } else {
                    Example::new().with("id", [i])
                }
            })
            .collect();
        let schema = infer_schema(&stats(rows), &InferenceConfig::default()).unwrap();
        let device = schema.feature("device").unwrap();
        assert_eq!(device.presence.min_count, 1);
        assert!(device.presence.min_fraction <= 0.3);
        assert!((device.presence.min_fraction - 0.3).abs() < 1e-9);

        let coarse = infer_schema(
            &stats(
                (0..100)
                    .map(|i| {
                        if i < 37 {
                            Example::new().with("x", [1])
                        } else {
                            Example::new().with("y", [1])
                        }
                    })
                    .collect(),
            ),
            &InferenceConfig::default(),
        )
        .unwrap();
        assert!((coarse.feature("x").unwrap().presence.min_fraction - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_low_cardinality_categorical_gets_domain() {
        let rows = ["Cash", "Credit Card", "Cash", "No Charge"]
            .into_iter()
            .map(|v| Example::new().with("payment_type", [v]))
            .collect();
        let schema = infer_schema(&stats(rows), &InferenceConfig::default()).unwrap();

        let domain = schema.feature_domain("payment_type").unwrap().unwrap();
        assert_eq!(domain.name, "payment_type");
        assert_eq!(
            domain.kind,
            DomainKind::enumerated(["Cash", "Credit Card", "No Charge"])
        );
    }

    #[test]
    fn test_high_cardinality_categorical_has_no_domain() {
        let rows = (0..50)
            .map(|i| Example::new().with("user_id", [format!("u{i}")]))
            .collect();
        let inferencer = SchemaInferencer::builder()
            .max_domain_cardinality(10)
            .build()
            .unwrap();
        let schema = inferencer.infer(&stats(rows)).unwrap();
        assert!(schema.feature("user_id").unwrap().domain.is_none());
        assert!(schema.domains().is_empty());
    }

    #[test]
    fn test_identical_domains_are_shared() {
        let rows = vec![
            Example::new().with("pickup_zone", ["A"]).with("dropoff_zone", ["B"]),
            Example::new().with("pickup_zone", ["B"]).with("dropoff_zone", ["A"]),
        ];
        let schema = infer_schema(&stats(rows), &InferenceConfig::default()).unwrap();

        assert_eq!(schema.domains().len(), 1);
        // Named after the first feature in name order.
        assert_eq!(schema.domains()[0].name, "dropoff_zone");
        assert_eq!(
            schema.feature("pickup_zone").unwrap().domain.as_deref(),
            Some("dropoff_zone")
        );
    }

    #[test]
    fn test_numeric_range_domain_is_opt_in() {
        let rows: Vec<Example> = [10.0, 11.0, 12.0, 13.0]
            .into_iter()
            .map(|v| Example::new().with("temp", [v]))
            .collect();
        let data = stats(rows);

        let default = infer_schema(&data, &InferenceConfig::default()).unwrap();
        assert!(default.feature("temp").unwrap().domain.is_none());

        let inferencer = SchemaInferencer::builder()
            .infer_numeric_domains(true)
            .build()
            .unwrap();
        let schema = inferencer.infer(&data).unwrap();
        match &schema.feature_domain("temp").unwrap().unwrap().kind {
            DomainKind::Range { min, max } => {
                assert!((min - 9.7).abs() < 1e-9);
                assert!((max - 13.3).abs() < 1e-9);
            }
            other => panic!("expected range, got {other:?}"),
        }
    }

    #[test]
    fn test_conflicting_feature_is_low_confidence() {
        let rows = vec![
            Example::new().with("zip", ["02139"]),
            Example::new().with("zip", ["10001"]),
            Example::new().with("zip", [Value::Int(94105)]),
        ];
        let schema = infer_schema(&stats(rows), &InferenceConfig::default()).unwrap();
        let zip = schema.feature("zip").unwrap();
        assert_eq!(zip.feature_type, Some(FeatureType::Categorical));
        assert!(zip.low_confidence);
    }

    #[test]
    fn test_empty_statistics_give_empty_schema() {
        let schema = infer_schema(&DatasetStatistics::default(), &InferenceConfig::default())
            .unwrap();
        assert!(schema.features().is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(SchemaInferencer::builder().presence_step(0.0).build().is_err());
        assert!(SchemaInferencer::builder()
            .value_count_margin(-1.0)
            .build()
            .is_err());
    }
}

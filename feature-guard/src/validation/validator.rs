//! Validation of dataset statistics against a schema.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use tracing::{debug, info, instrument};

use crate::error::{FeatureGuardError, Result};
use crate::logging::truncate_field;
use crate::schema::{DomainKind, FeatureSpec, Schema};
use crate::statistics::{CategoricalStatistics, DatasetStatistics, FeatureStatistics, NumericStatistics};
use crate::validation::anomaly::{Anomaly, AnomalyKind, AnomalyReport};

const MAX_LOGGED_DESCRIPTION: usize = 256;

/// Standard errors of the distinct estimate tolerated before untracked
/// categorical mass is attributed to values outside the domain.
const DISTINCT_ERROR_MARGIN: f64 = 3.0;

/// What to do with features that occur in the data but not in the schema.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewFeaturePolicy {
    /// Skip them silently.
    #[default]
    Ignore,
    /// Report each one as `NEW_FEATURE`.
    Report,
}

/// Options controlling validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationOptions {
    /// Handling of features absent from the schema (default: ignore)
    pub new_feature_policy: NewFeaturePolicy,
    /// Lowest distinct count at which evicted top-k mass can be reported as unexpected (default: 100)
    pub max_domain_cardinality: u64,
    /// Maximum number of offending values listed per finding (default: 10)
    pub max_sample_values: usize,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            new_feature_policy: NewFeaturePolicy::Ignore,
            max_domain_cardinality: 100,
            max_sample_values: 10,
        }
    }
}

impl ValidationOptions {
    pub fn with_new_feature_policy(mut self, policy: NewFeaturePolicy) -> Self {
        self.new_feature_policy = policy;
        self
    }

    pub fn with_max_domain_cardinality(mut self, threshold: u64) -> Self {
        self.max_domain_cardinality = threshold;
        self
    }

    pub fn with_max_sample_values(mut self, n: usize) -> Self {
        self.max_sample_values = n;
        self
    }

    /// Checks that thresholds are usable.
    pub fn validate(&self) -> Result<()> {
        if self.max_domain_cardinality == 0 {
            return Err(FeatureGuardError::configuration(
                "max_domain_cardinality must be positive",
            ));
        }
        Ok(())
    }
}

/// Checks statistics against a schema and reports every deviation.
///
/// The result depends only on the inputs: features are reported in name
/// order, findings of a feature in [`AnomalyKind`] order, and samples by
/// estimated frequency then value. A schema with dangling domain references
/// is rejected before any check runs.
#[instrument(skip_all, fields(
    num_schema_features = schema.features().len(),
    num_observed_features = stats.len(),
    num_examples = stats.num_examples()
))]
pub fn validate(
    stats: &DatasetStatistics,
    schema: &Schema,
    options: &ValidationOptions,
) -> Result<AnomalyReport> {
    options.validate()?;
    schema.validate_structure()?;

    let mut report = AnomalyReport::new();
    for spec in schema.features() {
        let domain = match &spec.domain {
            Some(name) => Some(
                &schema
                    .domain(name)
                    .ok_or_else(|| FeatureGuardError::schema_reference(&spec.name, name))?
                    .kind,
            ),
            None => None,
        };

        match stats.feature(&spec.name) {
            Some(observed) if observed.present_count() > 0 => {
                check_feature(spec, domain, observed, options, &mut report)
            }
            _ => check_missing(spec, stats.num_examples(), &mut report),
        }
    }

    if options.new_feature_policy == NewFeaturePolicy::Report {
        let known: BTreeSet<&str> = schema.features().iter().map(|f| f.name.as_str()).collect();
        for observed in stats.features() {
            if observed.present_count() > 0 && !known.contains(observed.name()) {
                report.push(
                    observed.name(),
                    Anomaly::new(
                        AnomalyKind::NewFeature,
                        "New column",
                        format!(
                            "Feature '{}' occurs in {} examples but is not in the schema",
                            observed.name(),
                            observed.present_count()
                        ),
                    )
                    .with_count(observed.present_count()),
                );
            }
        }
    }

    info!(
        num_features_with_anomalies = report.len(),
        num_anomalies = report.num_anomalies(),
        "Validated statistics"
    );
    Ok(report)
}

fn check_missing(spec: &FeatureSpec, num_examples: u64, report: &mut AnomalyReport) {
    if spec.presence.min_fraction <= 0.0 {
        return;
    }
    debug!(feature = %spec.name, "Feature missing from data");
    report.push(
        &spec.name,
        Anomaly::new(
            AnomalyKind::MissingFeature,
            "Column dropped",
            format!(
                "Feature '{}' does not occur in any of the {num_examples} examples",
                spec.name
            ),
        )
        .with_fraction(0.0)
        .with_count(0),
    );
}

fn check_feature(
    spec: &FeatureSpec,
    domain: Option<&DomainKind>,
    observed: &FeatureStatistics,
    options: &ValidationOptions,
    report: &mut AnomalyReport,
) {
    let findings = [
        check_presence(spec, observed),
        check_type(spec, observed),
        check_value_count(spec, observed),
        match (domain, observed.categorical()) {
            (Some(DomainKind::Enumerated { values }), Some(categorical)) => {
                check_enumerated(values, categorical, options)
            }
            _ => None,
        },
        match (domain, observed.numeric()) {
            (Some(DomainKind::Range { min, max }), Some(numeric)) => {
                check_range(*min, *max, numeric)
            }
            _ => None,
        },
    ];

    for anomaly in findings.into_iter().flatten() {
        debug!(
            feature = %spec.name,
            kind = %anomaly.kind,
            description = %truncate_field(&anomaly.description, MAX_LOGGED_DESCRIPTION),
            "Anomaly found"
        );
        report.push(&spec.name, anomaly);
    }
}

fn check_presence(spec: &FeatureSpec, observed: &FeatureStatistics) -> Option<Anomaly> {
    let fraction = observed.presence_fraction();
    let count = observed.present_count();
    let bounds = spec.presence;
    if fraction >= bounds.min_fraction && count >= bounds.min_count {
        return None;
    }
    Some(
        Anomaly::new(
            AnomalyKind::PresenceBelowThreshold,
            "Low presence",
            format!(
                "Feature '{}' is present in {count} examples ({:.2}%), expected at least \
                 {:.2}% and {} examples",
                spec.name,
                fraction * 100.0,
                bounds.min_fraction * 100.0,
                bounds.min_count
            ),
        )
        .with_fraction(fraction)
        .with_count(count),
    )
}

fn check_type(spec: &FeatureSpec, observed: &FeatureStatistics) -> Option<Anomaly> {
    let expected = spec.feature_type?;
    let actual = observed.feature_type()?;

    if actual != expected {
        let mismatched = observed.type_counts().total() - observed.type_counts().get(expected);
        return Some(
            Anomaly::new(
                AnomalyKind::TypeMismatch,
                "Unexpected data type",
                format!(
                    "Feature '{}' is mostly {actual} values, expected {expected}",
                    spec.name
                ),
            )
            .with_count(mismatched),
        );
    }

    if observed.has_type_conflict() && !spec.low_confidence {
        let kinds: Vec<&str> = observed
            .type_counts()
            .observed_kinds()
            .iter()
            .map(|k| k.as_str())
            .collect();
        let mismatched = observed.type_counts().total() - observed.type_counts().get(expected);
        return Some(
            Anomaly::new(
                AnomalyKind::TypeMismatch,
                "Multiple data types",
                format!(
                    "Feature '{}' mixes {} values, expected only {expected}",
                    spec.name,
                    kinds.join(" and ")
                ),
            )
            .with_fraction(mismatched as f64 / observed.type_counts().total() as f64)
            .with_count(mismatched),
        );
    }
    None
}

fn check_value_count(spec: &FeatureSpec, observed: &FeatureStatistics) -> Option<Anomaly> {
    let bounds = spec.value_count?;
    let range = observed.num_values()?;
    if bounds.contains(range.min) && bounds.contains(range.max) {
        return None;
    }
    Some(Anomaly::new(
        AnomalyKind::ValueCountOutOfBounds,
        "Unexpected number of values",
        format!(
            "Feature '{}' has between {} and {} values per example, expected between {} and {}",
            spec.name, range.min, range.max, bounds.min, bounds.max
        ),
    ))
}

fn check_enumerated(
    allowed: &BTreeSet<String>,
    categorical: &CategoricalStatistics,
    options: &ValidationOptions,
) -> Option<Anomaly> {
    let total = categorical.count();
    if total == 0 {
        return None;
    }
    let top_values = categorical.top_values();

    let mut offending: Vec<(&str, u64)> = top_values
        .iter()
        .filter(|(value, count)| *count > 0 && !allowed.contains(*value))
        .collect();
    offending.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    let mut count: u64 = offending.iter().map(|(_, c)| c).sum();

    // Values evicted from the sketch cannot be checked one by one. Only when
    // the distinct estimate exceeds the domain size beyond the sketch error is
    // the surplus share of the untracked mass counted as unexpected.
    let distinct = categorical.distinct_estimate();
    let mut unexplained = 0;
    let threshold = evicted_mass_threshold(allowed.len(), categorical, options);
    if !top_values.is_exact() && distinct > threshold {
        let tracked: u64 = top_values.iter().map(|(_, c)| c).sum();
        let evicted = total.saturating_sub(tracked);
        let surplus = distinct.saturating_sub(allowed.len() as u64);
        unexplained = ((evicted as f64) * (surplus as f64 / distinct as f64)).round() as u64;
        count += unexplained;
    }

    if count == 0 {
        return None;
    }

    let samples: Vec<String> = offending
        .iter()
        .take(options.max_sample_values)
        .map(|(value, _)| value.to_string())
        .collect();
    let listed: Vec<String> = offending
        .iter()
        .take(options.max_sample_values)
        .map(|(value, c)| format!("{value} (~{c})"))
        .collect();

    let mut description = format!(
        "{count} of {total} values are outside the domain of {} values",
        allowed.len()
    );
    if !listed.is_empty() {
        description.push_str(&format!(": {}", listed.join(", ")));
    }
    if unexplained > 0 {
        description.push_str(&format!(
            "; about {unexplained} values of an estimated {distinct} distinct could not be listed"
        ));
    }

    Some(
        Anomaly::new(
            AnomalyKind::UnexpectedValue,
            "Unexpected string values",
            description,
        )
        .with_fraction(count as f64 / total as f64)
        .with_count(count)
        .with_samples(samples),
    )
}

/// Smallest distinct estimate that is credibly above the domain size.
fn evicted_mass_threshold(
    domain_len: usize,
    categorical: &CategoricalStatistics,
    options: &ValidationOptions,
) -> u64 {
    let sketch = categorical.distinct_sketch();
    let error = if sketch.is_exact() {
        0.0
    } else {
        DISTINCT_ERROR_MARGIN * sketch.relative_standard_error()
    };
    let credible = (domain_len as f64 * (1.0 + error)).ceil() as u64;
    credible.max(options.max_domain_cardinality)
}

fn check_range(min: f64, max: f64, numeric: &NumericStatistics) -> Option<Anomaly> {
    let (observed_min, observed_max) = (numeric.min()?, numeric.max()?);
    if observed_min >= min && observed_max <= max {
        return None;
    }

    let n = numeric.quantile_sketch().count();
    let sketch = numeric.quantile_sketch();
    let estimated = (sketch.rank_exclusive(min) + (1.0 - sketch.rank(max))).clamp(0.0, 1.0);
    // At least the extreme value itself lies outside.
    let count = ((estimated * n as f64).round() as u64).max(1);
    let fraction = count as f64 / n as f64;

    Some(
        Anomaly::new(
            AnomalyKind::OutOfRange,
            "Out-of-range values",
            format!(
                "Values span [{observed_min}, {observed_max}], expected within [{min}, {max}]; \
                 about {count} values ({:.2}%) lie outside",
                fraction * 100.0
            ),
        )
        .with_fraction(fraction)
        .with_count(count),
    )
}

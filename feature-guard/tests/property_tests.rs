//! Property-based tests for the statistics and validation pipeline.
//!
//! These tests use proptest to check properties that must hold for any input:
//!
//! - merging is commutative on whole statistics snapshots
//! - any sharding of a dataset yields the same counts and extrema as a single
//!   pass, and moments agree up to floating point rounding
//! - top-k estimates never overshoot and undershoot by at most `N / (k + 1)`
//! - a schema inferred from statistics accepts those statistics, with and
//!   without numeric range domains

use feature_guard::prelude::*;
use feature_guard::sketches::TopKSketch;
use proptest::prelude::*;
use std::collections::HashMap;

const VOCABULARY: &[&str] = &["Cash", "Credit Card", "Dispute", "No Charge", "Unknown", "Prcard"];

/// One generated row: an optional numeric value, an optional categorical
/// value and an optional multi-valued feature.
type Row = (Option<i64>, Option<usize>, Option<Vec<f64>>);

fn row_strategy() -> impl Strategy<Value = Row> {
    (
        proptest::option::of(-1_000i64..1_000),
        proptest::option::of(0..VOCABULARY.len()),
        proptest::option::of(proptest::collection::vec(-50.0f64..50.0, 0..4)),
    )
}

fn to_example((fare, payment, tips): &Row) -> Example {
    let mut example = Example::new();
    if let Some(fare) = fare {
        example.insert("fare", vec![Value::Int(*fare)]);
    }
    if let Some(index) = payment {
        example.insert("payment_type", vec![Value::from(VOCABULARY[*index])]);
    }
    if let Some(tips) = tips {
        example.insert("tips", tips.iter().map(|t| Value::Float(*t)).collect());
    }
    example
}

fn stats_of(rows: &[Row]) -> DatasetStatistics {
    let examples: Vec<Example> = rows.iter().map(to_example).collect();
    compute_statistics(&examples, &StatsOptions::default()).unwrap()
}

proptest! {
    #[test]
    fn merge_is_commutative(
        left in proptest::collection::vec(row_strategy(), 0..60),
        right in proptest::collection::vec(row_strategy(), 0..60),
    ) {
        let (a, b) = (stats_of(&left), stats_of(&right));
        prop_assert_eq!(a.merge(&b).unwrap(), b.merge(&a).unwrap());
    }

    #[test]
    fn sharding_preserves_counts_and_extrema(
        rows in proptest::collection::vec(row_strategy(), 1..150),
        cuts in proptest::collection::vec(0usize..150, 0..4),
    ) {
        let whole = stats_of(&rows);

        let mut boundaries: Vec<usize> = cuts.into_iter().map(|c| c % (rows.len() + 1)).collect();
        boundaries.push(0);
        boundaries.push(rows.len());
        boundaries.sort_unstable();
        let shards: Vec<DatasetStatistics> = boundaries
            .windows(2)
            .map(|w| stats_of(&rows[w[0]..w[1]]))
            .collect();

        // Merge in reverse to exercise a different pairing than the data order.
        let merged = DatasetStatistics::merge_all(shards.iter().rev()).unwrap();

        prop_assert_eq!(merged.num_examples(), whole.num_examples());
        prop_assert_eq!(
            merged.feature_names().collect::<Vec<_>>(),
            whole.feature_names().collect::<Vec<_>>()
        );
        for feature in whole.features() {
            let other = merged.feature(feature.name()).unwrap();
            prop_assert_eq!(other.present_count(), feature.present_count());
            prop_assert_eq!(other.missing_count(), feature.missing_count());
            prop_assert_eq!(other.total_values(), feature.total_values());
            prop_assert_eq!(other.num_values(), feature.num_values());
            prop_assert_eq!(other.type_counts(), feature.type_counts());

            if let (Some(x), Some(y)) = (feature.numeric(), other.numeric()) {
                prop_assert_eq!(x.min(), y.min());
                prop_assert_eq!(x.max(), y.max());
                prop_assert_eq!(x.count(), y.count());
                if let (Some(mx), Some(my)) = (x.mean(), y.mean()) {
                    prop_assert!((mx - my).abs() <= 1e-9 * (1.0 + mx.abs()));
                }
            }
            if let (Some(x), Some(y)) = (feature.categorical(), other.categorical()) {
                prop_assert_eq!(x.count(), y.count());
                prop_assert_eq!(x.distinct_estimate(), y.distinct_estimate());
            }
        }
    }

    #[test]
    fn top_k_error_is_bounded(
        values in proptest::collection::vec(0u32..40, 0..400),
        split in 0usize..400,
        capacity in 1usize..12,
    ) {
        let split = split.min(values.len());
        let mut left = TopKSketch::new(capacity);
        let mut right = TopKSketch::new(capacity);
        let mut truth: HashMap<String, u64> = HashMap::new();
        for (i, v) in values.iter().enumerate() {
            let key = format!("v{v}");
            *truth.entry(key.clone()).or_default() += 1;
            if i < split { left.update(&key) } else { right.update(&key) }
        }
        let merged = left.merge(&right).unwrap();

        let bound = values.len() as f64 / (capacity as f64 + 1.0);
        for (key, &count) in &truth {
            let estimate = merged.estimate(key);
            prop_assert!(estimate <= count);
            prop_assert!((count - estimate) as f64 <= bound + 1e-9);
            prop_assert!(estimate + merged.max_error() >= count);
        }
    }

    #[test]
    fn inferred_schema_accepts_source_statistics(
        rows in proptest::collection::vec(row_strategy(), 0..120),
    ) {
        let stats = stats_of(&rows);
        let schema = infer_schema(&stats, &InferenceConfig::default()).unwrap();
        let report = validate(&stats, &schema, &ValidationOptions::default()).unwrap();
        prop_assert!(report.is_empty(), "unexpected anomalies: {:?}", report);
    }

    #[test]
    fn inferred_range_domains_accept_source_statistics(
        rows in proptest::collection::vec(row_strategy(), 0..120),
    ) {
        let stats = stats_of(&rows);
        let inferencer = SchemaInferencer::builder()
            .infer_numeric_domains(true)
            .build()
            .unwrap();
        let schema = inferencer.infer(&stats).unwrap();
        let report = validate(&stats, &schema, &ValidationOptions::default()).unwrap();
        prop_assert!(report.is_empty(), "unexpected anomalies: {:?}", report);
    }
}

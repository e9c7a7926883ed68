//! End-to-end runs of the profiling engine.
//!
//! Each test builds a small in-memory dataset, runs the full engine and
//! checks the composite report: applicability markers, the shared sample,
//! determinism and the two fatal outcomes.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use indexmap::IndexMap;
use tracing_subscriber::EnvFilter;

use tabula_compute::pipeline::readiness::FeatureQuality;
use tabula_compute::pipeline::timeseries::Frequency;
use tabula_compute::{ProfileEngine, ProfileReport, StructuredSummary};
use tabula_core::{AnalysisConfig, ColumnKind, ColumnType, Dataset, FieldValue, Row, TabulaError};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn engine() -> ProfileEngine {
    init_tracing();
    ProfileEngine::new(AnalysisConfig::default()).unwrap()
}

fn build(columns: &[(&str, ColumnKind)], rows: Vec<Vec<FieldValue>>) -> Dataset {
    let types: IndexMap<String, ColumnType> = columns
        .iter()
        .map(|(name, kind)| (name.to_string(), ColumnType::new(*kind)))
        .collect();
    let rows: Vec<Row> = rows
        .into_iter()
        .map(|values| {
            columns
                .iter()
                .map(|(name, _)| name.to_string())
                .zip(values)
                .collect()
        })
        .collect();
    Dataset::new(rows, types)
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// 30,000 hourly rows: two numeric columns, a region and a timestamp.
fn large_dataset() -> Dataset {
    let regions = ["north", "south", "west"];
    let rows = (0..30_000)
        .map(|i| {
            let x = (i % 100) as f64;
            let bump = [40.0, 0.0, -25.0][i % 3];
            vec![
                FieldValue::from(start() + ChronoDuration::hours(i as i64)),
                FieldValue::from(x),
                FieldValue::from(2.0 * x + bump + (i % 7) as f64),
                FieldValue::from(regions[i % 3]),
            ]
        })
        .collect();
    build(
        &[
            ("ts", ColumnKind::Date),
            ("x", ColumnKind::Float),
            ("y", ColumnKind::Float),
            ("region", ColumnKind::Categorical),
        ],
        rows,
    )
}

fn flagged_values(report: &ProfileReport, column: &str) -> Vec<f64> {
    report.outlier_analysis.as_complete().unwrap().columns[column]
        .as_complete()
        .unwrap()
        .outliers
        .iter()
        .map(|o| o.value)
        .collect()
}

#[tokio::test]
async fn spike_is_the_only_outlier() {
    let rows = (1..=9)
        .map(f64::from)
        .chain([1000.0])
        .map(|v| vec![FieldValue::from(v)])
        .collect();
    let data = build(&[("v", ColumnKind::Float)], rows);
    let report = engine().analyze(data).await.unwrap();

    let flagged = flagged_values(&report, "v");
    assert_eq!(flagged, vec![1000.0]);
    let record = &report.outlier_analysis.as_complete().unwrap().columns["v"]
        .as_complete()
        .unwrap()
        .outliers[0];
    assert!(record.extreme);
    assert!(report.overall_outlier_rate.unwrap() > 0.0);

    // Ten rows is too few for distribution fitting or modeling.
    assert_eq!(report.distribution_analysis.status(), "complete");
    assert!(!report.distribution_analysis.as_complete().unwrap().columns["v"].is_applicable());
    assert!(!report.regression_analysis.is_applicable());
    assert!(!report.time_series_analysis.is_applicable());
}

#[tokio::test]
async fn exact_line_is_recovered() {
    let rows = (1..=50)
        .map(|i| {
            let x = i as f64;
            vec![FieldValue::from(x), FieldValue::from(2.0 * x + 5.0)]
        })
        .collect();
    let data = build(&[("x", ColumnKind::Float), ("y", ColumnKind::Float)], rows);
    let config = AnalysisConfig {
        target_column: Some("y".into()),
        ..AnalysisConfig::default()
    };
    let report = ProfileEngine::new(config).unwrap().analyze(data).await.unwrap();

    let regression = report.regression_analysis.as_complete().unwrap();
    assert_eq!(regression.target.column, "y");
    assert!(!regression.target.auto_selected);
    let fit = regression.simple["x"].as_complete().unwrap();
    assert!((fit.slope - 2.0).abs() < 1e-6);
    assert!((fit.intercept - 5.0).abs() < 1e-6);
    assert!((fit.r_squared - 1.0).abs() < 1e-6);
    assert!(fit.f_test.p_value < 0.05);
    assert!(regression.selected.is_some());
    assert_eq!(report.metadata.target_column.as_deref(), Some("y"));
}

#[tokio::test]
async fn constant_category_is_excluded() {
    let rows = (0..100)
        .map(|i| vec![FieldValue::from("active"), FieldValue::from(i as f64)])
        .collect();
    let data = build(&[("status", ColumnKind::Categorical), ("amount", ColumnKind::Float)], rows);
    let report = engine().analyze(data).await.unwrap();

    let status = report.column_stats["status"].as_complete().unwrap().as_categorical().unwrap();
    assert_eq!(status.unique_count, 1);
    assert_eq!(status.entropy, 0.0);

    let readiness = report.ml_readiness.as_complete().unwrap();
    let feature = &readiness.features["status"];
    assert_eq!(feature.quality, FeatureQuality::Poor);
    assert!(feature.exclude);
    assert!(report.suggestions.iter().any(|s| s.contains("Exclude status")));
}

#[tokio::test]
async fn large_input_shares_one_sample() {
    let report = engine().analyze(large_dataset()).await.unwrap();
    let meta = &report.metadata;
    assert_eq!(meta.original_rows, 30_000);
    assert!(meta.sample.sampled);
    assert!(meta.analyzed_rows <= 5_000);
    let n = meta.analyzed_rows;

    let x = report.column_stats["x"].as_complete().unwrap().as_numeric().unwrap();
    assert_eq!(x.count, n);

    let corr = report.correlation_analysis.as_complete().unwrap();
    assert!(corr.pairs.values().all(|p| p.n == n));

    let regression = report.regression_analysis.as_complete().unwrap();
    assert_eq!(regression.target.valid_rows, n);

    let cart = report.cart_analysis.as_complete().unwrap();
    assert_eq!(cart.n, n);
    assert!(!cart.segments.is_empty());

    let ts = report.time_series_analysis.as_complete().unwrap();
    assert_eq!(ts.observations, n);
    assert_eq!(ts.frequency, Frequency::Hourly);
    assert_eq!(ts.missing_periods, 0);

    let summary = StructuredSummary::from(&report);
    assert_eq!(summary.dataset.rows, 30_000);
    assert_eq!(summary.dataset.analyzed_rows, n);
    assert!(summary.best_model.is_some());
}

#[tokio::test]
async fn periodic_category_keeps_every_level_in_the_sample() {
    // region cycles with period 3; 30,000 / 5,000 rows is a multiple of it.
    let report = engine().analyze(large_dataset()).await.unwrap();
    assert!(report.metadata.sample.sampled);

    let region = report.column_stats["region"].as_complete().unwrap().as_categorical().unwrap();
    assert_eq!(region.unique_count, 3);
    for level in &region.frequencies {
        assert!((level.percentage - 100.0 / 3.0).abs() < 5.0, "{level:?}");
    }

    let cart = report.cart_analysis.as_complete().unwrap();
    assert!(cart.features.iter().any(|f| f == "region"));
}

#[tokio::test]
async fn weekly_spacing_and_random_gaps() {
    let weekly = (0..30)
        .map(|i| {
            vec![
                FieldValue::from(start() + ChronoDuration::days(7 * i)),
                FieldValue::from(100.0 + i as f64 * 1.5 + (i % 4) as f64),
            ]
        })
        .collect();
    let data = build(&[("week", ColumnKind::Date), ("sales", ColumnKind::Float)], weekly);
    let report = engine().analyze(data).await.unwrap();
    let ts = report.time_series_analysis.as_complete().unwrap();
    assert_eq!(ts.frequency, Frequency::Weekly);
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["timeSeriesAnalysis"]["frequency"], "weekly");

    let gaps = [1, 9, 2, 15, 3, 1, 22, 4, 2, 11, 1, 30, 5, 2, 8, 1, 19, 3, 2, 12, 1, 25, 6, 1];
    let mut t = start();
    let mut rows = vec![vec![FieldValue::from(t), FieldValue::from(0.0)]];
    for (i, g) in gaps.iter().enumerate() {
        t += ChronoDuration::days(*g);
        rows.push(vec![FieldValue::from(t), FieldValue::from(i as f64)]);
    }
    let data = build(&[("day", ColumnKind::Date), ("sales", ColumnKind::Float)], rows);
    let report = engine().analyze(data).await.unwrap();
    assert!(!report.time_series_analysis.is_applicable());
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["timeSeriesAnalysis"]["status"], "notApplicable");
}

#[tokio::test]
async fn repeated_runs_agree() {
    let rows = (0..200)
        .map(|i| {
            let base = 50.0 + (i % 17) as f64;
            let v = if i % 61 == 0 { base * 20.0 } else { base };
            vec![FieldValue::from(v), FieldValue::from((i % 23) as f64 * 3.0)]
        })
        .collect::<Vec<_>>();
    let data = build(&[("a", ColumnKind::Float), ("b", ColumnKind::Float)], rows);

    let first = engine().analyze(data.clone()).await.unwrap();
    let second = engine().analyze(data).await.unwrap();

    assert_eq!(first.statuses(), second.statuses());
    for column in ["a", "b"] {
        let rows = |r: &ProfileReport| -> BTreeSet<usize> {
            r.outlier_analysis.as_complete().unwrap().columns[column]
                .as_complete()
                .map(|c| c.flagged_rows().into_iter().collect())
                .unwrap_or_default()
        };
        assert_eq!(rows(&first), rows(&second));
        assert_eq!(first.column_stats[column], second.column_stats[column]);
    }
    assert!(flagged_values(&first, "a").contains(&1000.0));
}

#[tokio::test]
async fn step_deadline_skips_without_failing_the_run() {
    init_tracing();
    let config = AnalysisConfig {
        step_timeout_ms: 1,
        ..AnalysisConfig::default()
    };
    let report = ProfileEngine::new(config)
        .unwrap()
        .analyze(large_dataset())
        .await
        .unwrap();
    assert!(report.outlier_analysis.is_skipped());
    assert!(report.metadata.metrics.timed_out_steps > 0);
    assert!(report.insights.iter().any(|i| i.title.ends_with("was skipped")));
}

#[tokio::test]
async fn global_deadline_is_fatal() {
    init_tracing();
    let config = AnalysisConfig {
        global_timeout_ms: 1,
        ..AnalysisConfig::default()
    };
    let err = ProfileEngine::new(config)
        .unwrap()
        .analyze(large_dataset())
        .await
        .unwrap_err();
    assert!(matches!(err, TabulaError::PipelineTimeout { limit_ms: 1, .. }));
    assert!(err.to_string().contains("TABULA_GLOBAL_TIMEOUT_MS"));
}

#[tokio::test]
async fn empty_input_short_circuits() {
    let engine = engine();
    let err = engine.analyze(Dataset::default()).await.unwrap_err();
    assert_eq!(err, TabulaError::EmptyDataset);
    assert!(err.is_fatal());

    let report = engine.analyze_or_empty(Dataset::default()).await.unwrap();
    assert!(report.statuses().values().all(|s| *s == "notApplicable"));
    assert!(report.column_stats.is_empty());
}

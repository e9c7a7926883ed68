//! The profiling engine: samples once, runs every analysis under its own
//! deadline, and folds the results into one [`ProfileReport`].
//!
//! Degradation policy:
//! - a step that misses its deadline becomes `Skipped`, the run continues
//! - a step that errors becomes `Failed`, the run continues
//! - the global deadline and empty input are the only fatal outcomes

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use tabula_core::{Analysis, AnalysisConfig, Dataset, Result, TabulaError};

use crate::algorithms::isolation_forest::IsolationForestParams;
use crate::execution::{run_bounded, sample_indices, CancelToken, ProgressObserver, SamplePlan, StepOutcome, TracingObserver};
use crate::pipeline::metrics::{PipelineMetrics, StepTimer};
use crate::pipeline::modeling::{self, segmentation};
use crate::pipeline::profile::{profile_columns, ColumnProfile};
use crate::pipeline::readiness::{self, MlReadiness, ReadinessInputs};
use crate::pipeline::report::{ProfileReport, ReportMetadata};
use crate::pipeline::{correlation, distribution, insights, outliers, timeseries};

const STEP_COUNT: usize = 8;
const DISABLED: &str = "disabled by the analysis needs map";

/// Result of one step plus what the metrics need to know about it.
struct StepRun<T> {
    analysis: Analysis<T>,
    elapsed: Duration,
    outcome: &'static str,
}

impl<T> StepRun<T> {
    fn disabled() -> Self {
        Self {
            analysis: Analysis::skipped(DISABLED),
            elapsed: Duration::ZERO,
            outcome: "disabled",
        }
    }
}

impl<T> StepRun<Analysis<T>> {
    fn flatten(self) -> StepRun<T> {
        StepRun {
            analysis: self.analysis.flatten(),
            elapsed: self.elapsed,
            outcome: self.outcome,
        }
    }
}

/// Counts finished steps and reports percent complete.
struct Progress {
    observer: Arc<dyn ProgressObserver>,
    done: AtomicUsize,
}

impl Progress {
    fn step_done(&self, step: &str) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        self.observer
            .on_progress(step, (done * 100 / STEP_COUNT).min(100) as u8);
    }
}

pub struct ProfileEngine {
    config: AnalysisConfig,
    observer: Arc<dyn ProgressObserver>,
}

impl ProfileEngine {
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        config.log_summary();
        Ok(Self {
            config,
            observer: Arc::new(TracingObserver),
        })
    }

    /// Engine configured from `TABULA_*` environment variables and `.env`.
    pub fn from_env() -> Result<Self> {
        tabula_core::config::load_dotenv();
        Self::new(AnalysisConfig::from_env())
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Profile `data`. Fails only on empty input or when the global deadline
    /// expires; every other problem is recorded inside the report.
    pub async fn analyze(&self, data: Dataset) -> Result<ProfileReport> {
        if data.is_empty() {
            return Err(TabulaError::EmptyDataset);
        }
        let limit = Duration::from_millis(self.config.global_timeout_ms);
        let run_token = CancelToken::new();
        let start = Instant::now();

        match tokio::time::timeout(limit, self.run(data, run_token.clone())).await {
            Ok(report) => Ok(report),
            Err(_) => {
                run_token.cancel();
                let elapsed_ms = start.elapsed().as_millis() as u64;
                warn!(elapsed_ms, limit_ms = self.config.global_timeout_ms, "profiling run hit the global deadline");
                Err(TabulaError::PipelineTimeout {
                    elapsed_ms,
                    limit_ms: self.config.global_timeout_ms,
                })
            }
        }
    }

    /// Like [`analyze`](Self::analyze), but empty input yields a report whose
    /// every slot is marked not applicable instead of an error.
    pub async fn analyze_or_empty(&self, data: Dataset) -> Result<ProfileReport> {
        match self.analyze(data).await {
            Err(TabulaError::EmptyDataset) => {
                let mut metrics = PipelineMetrics::new();
                metrics.finish();
                Ok(ProfileReport::empty(&TabulaError::EmptyDataset.to_string(), metrics))
            }
            other => other,
        }
    }

    async fn step<T, F>(&self, step: &'static str, enabled: bool, run: &CancelToken, progress: &Progress, task: F) -> StepRun<T>
    where
        T: Send + 'static,
        F: FnOnce(&CancelToken) -> Result<T> + Send + 'static,
    {
        if !enabled {
            debug!(step, "step disabled");
            progress.step_done(step);
            return StepRun::disabled();
        }
        let timer = StepTimer::start();
        let deadline = Duration::from_millis(self.config.step_timeout_ms);
        let outcome: StepOutcome<T> = run_bounded(step, deadline, run.child(), task).await;
        let label = outcome.label();
        progress.step_done(step);
        StepRun {
            analysis: outcome.into_analysis(step),
            elapsed: timer.elapsed(),
            outcome: label,
        }
    }

    async fn run(&self, data: Dataset, token: CancelToken) -> ProfileReport {
        let mut metrics = PipelineMetrics::new();
        let needs = self.config.needs.clone();
        let progress = Progress {
            observer: Arc::clone(&self.observer),
            done: AtomicUsize::new(0),
        };
        info!(
            run_id = %metrics.run_id,
            rows = data.row_count(),
            columns = data.column_count(),
            "profiling run started"
        );

        // One sample per run; every step below reads the same rows.
        let original_rows = data.row_count();
        let indices = sample_indices(original_rows, &self.config.sampling);
        let sampled = indices.len() < original_rows;
        let data = Arc::new(if sampled { data.select_rows(&indices) } else { data });
        let sample = SamplePlan {
            original_rows,
            sampled_rows: data.row_count(),
            sampled,
        };
        if sampled {
            info!(original_rows, sampled_rows = sample.sampled_rows, "dataset downsampled");
        }
        let source_rows = sampled.then(|| Arc::new(indices));

        let d = Arc::clone(&data);
        let profile = self
            .step("profile", true, &token, &progress, move |_| Ok(profile_columns(&d)))
            .await;
        let column_stats: IndexMap<String, Analysis<ColumnProfile>> = match profile.analysis {
            Analysis::Complete(map) => map,
            other => {
                let reason = other.reason().unwrap_or("column profiling did not finish").to_string();
                data.columns
                    .keys()
                    .map(|c| (c.clone(), Analysis::skipped(reason.clone())))
                    .collect()
            }
        };
        metrics.record_step("profile", profile.elapsed, profile.outcome);

        let target = modeling::select_target(&data, self.config.target_column.as_deref());
        let forest = IsolationForestParams {
            trees: self.config.isolation_trees,
            subsample: self.config.isolation_sample,
            seed: self.config.sampling.seed,
        };

        let d = Arc::clone(&data);
        let distribution_step = self.step("distribution", needs.distribution, &token, &progress, move |c| {
            distribution::analyze(&d, c)
        });
        let d = Arc::clone(&data);
        let outlier_step = self.step("outliers", needs.outliers, &token, &progress, move |c| {
            outliers::analyze(&d, &forest, c)
        });
        let d = Arc::clone(&data);
        let correlation_step = self.step("correlation", needs.correlation, &token, &progress, move |c| {
            correlation::analyze(&d, c)
        });
        let d = Arc::clone(&data);
        let regression_target = target.clone();
        let regression_step = self.step("regression", needs.regression, &token, &progress, move |c| match regression_target {
            Ok(t) => modeling::regress(&d, &t, c),
            Err(reason) => Ok(Analysis::not_applicable(reason)),
        });
        let d = Arc::clone(&data);
        let segmentation_target = target.clone();
        let segmentation_step = self.step("segmentation", needs.segmentation, &token, &progress, move |c| match segmentation_target {
            Ok(t) => segmentation::segment(&d, &t.column, c),
            Err(reason) => Ok(Analysis::not_applicable(reason)),
        });
        let d = Arc::clone(&data);
        let rows = source_rows.clone();
        let time_series_step = self.step("timeSeries", needs.time_series, &token, &progress, move |c| {
            timeseries::analyze(&d, rows.as_deref().map(Vec::as_slice), c)
        });

        let (dist, outl, corr, regr, cart, ts) = tokio::join!(
            distribution_step,
            outlier_step,
            correlation_step,
            regression_step,
            segmentation_step,
            time_series_step
        );
        let (regr, cart, ts) = (regr.flatten(), cart.flatten(), ts.flatten());
        metrics.record_step("distribution", dist.elapsed, dist.outcome);
        metrics.record_step("outliers", outl.elapsed, outl.outcome);
        metrics.record_step("correlation", corr.elapsed, corr.outcome);
        metrics.record_step("regression", regr.elapsed, regr.outcome);
        metrics.record_step("segmentation", cart.elapsed, cart.outcome);
        metrics.record_step("timeSeries", ts.elapsed, ts.outcome);

        let overall_outlier_rate = outl.analysis.as_complete().map(|o| o.overall_outlier_rate);
        let collinear: Vec<String> = corr
            .analysis
            .as_complete()
            .and_then(|c| c.multicollinearity.as_complete())
            .map(|m| m.problematic.clone())
            .unwrap_or_default();
        let d = Arc::clone(&data);
        let profiles = column_stats.clone();
        let problem_type = target.as_ref().ok().map(|t| t.problem_type);
        let readiness_step = self
            .step("mlReadiness", needs.ml_readiness, &token, &progress, move |_| -> Result<MlReadiness> {
                Ok(readiness::assess(&ReadinessInputs {
                    data: &d,
                    original_rows,
                    profiles: &profiles,
                    outlier_rate: overall_outlier_rate,
                    problem_type,
                    collinear_columns: &collinear,
                }))
            })
            .await;
        metrics.record_step("mlReadiness", readiness_step.elapsed, readiness_step.outcome);
        metrics.finish();

        info!(
            run_id = %metrics.run_id,
            duration_ms = metrics.total_duration_ms,
            timed_out = metrics.timed_out_steps,
            failed = metrics.failed_steps,
            "profiling run finished"
        );

        let mut report = ProfileReport {
            metadata: ReportMetadata {
                original_rows,
                analyzed_rows: data.row_count(),
                column_count: data.column_count(),
                sample,
                target_column: target.ok().map(|t| t.column),
                metrics,
            },
            column_stats,
            distribution_analysis: dist.analysis,
            outlier_analysis: outl.analysis,
            overall_outlier_rate,
            correlation_analysis: corr.analysis,
            regression_analysis: regr.analysis,
            cart_analysis: cart.analysis,
            time_series_analysis: ts.analysis,
            ml_readiness: readiness_step.analysis,
            insights: Vec::new(),
            suggestions: Vec::new(),
        };
        let (found, suggestions) = insights::generate(&report);
        report.insights = found;
        report.suggestions = suggestions;
        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tabula_core::{AnalysisNeeds, ColumnKind, ColumnType, FieldValue, Row};

    use super::*;

    struct Recorder(Mutex<Vec<(String, u8)>>);

    impl ProgressObserver for Recorder {
        fn on_progress(&self, step: &str, percent: u8) {
            self.0.lock().unwrap().push((step.to_string(), percent));
        }
    }

    fn small() -> Dataset {
        let mut columns = IndexMap::new();
        columns.insert("x".to_string(), ColumnType::new(ColumnKind::Float));
        columns.insert("y".to_string(), ColumnType::new(ColumnKind::Float));
        let rows: Vec<Row> = (1..=60)
            .map(|i| {
                let x = i as f64;
                Row::from([
                    ("x".to_string(), FieldValue::from(x)),
                    ("y".to_string(), FieldValue::from(3.0 * x + (i % 7) as f64)),
                ])
            })
            .collect();
        Dataset::new(rows, columns)
    }

    #[tokio::test]
    async fn disabled_steps_are_marked_skipped() {
        let config = AnalysisConfig {
            needs: AnalysisNeeds::basic_only(),
            ..AnalysisConfig::default()
        };
        let engine = ProfileEngine::new(config).unwrap();
        let report = engine.analyze(small()).await.unwrap();
        assert!(report.column_stats["x"].is_complete());
        assert!(report.regression_analysis.is_skipped());
        assert_eq!(report.regression_analysis.reason(), Some(DISABLED));
        assert_eq!(report.metadata.metrics.steps["regression"].outcome, "disabled");
        assert!(report.overall_outlier_rate.is_none());
    }

    #[tokio::test]
    async fn progress_reaches_one_hundred() {
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let engine = ProfileEngine::new(AnalysisConfig::default())
            .unwrap()
            .with_observer(recorder.clone());
        engine.analyze(small()).await.unwrap();
        let seen = recorder.0.lock().unwrap();
        assert_eq!(seen.len(), STEP_COUNT);
        assert_eq!(seen.first().map(|s| s.0.as_str()), Some("profile"));
        assert_eq!(seen.last(), Some(&("mlReadiness".to_string(), 100)));
    }

    #[tokio::test]
    async fn empty_input_is_fatal_or_empty_report() {
        let engine = ProfileEngine::new(AnalysisConfig::default()).unwrap();
        let err = engine.analyze(Dataset::default()).await.unwrap_err();
        assert_eq!(err, TabulaError::EmptyDataset);
        let report = engine.analyze_or_empty(Dataset::default()).await.unwrap();
        assert!(!report.ml_readiness.is_applicable());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = AnalysisConfig {
            step_timeout_ms: 0,
            ..AnalysisConfig::default()
        };
        assert!(ProfileEngine::new(config).is_err());
    }
}

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Timing and outcome of one pipeline step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepMetrics {
    pub duration_ms: u64,
    /// `completed`, `timed_out`, `failed` or `disabled`.
    pub outcome: String,
}

/// Run-level metrics, updated incrementally as each step finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineMetrics {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub total_duration_ms: u64,
    /// Per-step timings, in the order steps finished being recorded.
    pub steps: IndexMap<String, StepMetrics>,
    pub timed_out_steps: usize,
    pub failed_steps: usize,

    #[serde(skip, default = "Instant::now")]
    started: Instant,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            total_duration_ms: 0,
            steps: IndexMap::new(),
            timed_out_steps: 0,
            failed_steps: 0,
            started: Instant::now(),
        }
    }

    /// Record a step that ran for `elapsed` and ended with `outcome`.
    pub fn record_step(&mut self, step: &str, elapsed: Duration, outcome: &str) {
        match outcome {
            "timed_out" => self.timed_out_steps += 1,
            "failed" => self.failed_steps += 1,
            _ => {}
        }
        self.steps.insert(
            step.to_string(),
            StepMetrics {
                duration_ms: elapsed.as_millis() as u64,
                outcome: outcome.to_string(),
            },
        );
    }

    /// Record a step the needs map switched off.
    pub fn record_disabled(&mut self, step: &str) {
        self.record_step(step, Duration::ZERO, "disabled");
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
        self.total_duration_ms = self.started.elapsed().as_millis() as u64;
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Guard that measures the duration of a step.
///
/// ```ignore
/// let timer = StepTimer::start();
/// // ... do work ...
/// metrics.record_step("profile", timer.elapsed(), "completed");
/// ```
pub struct StepTimer {
    start: Instant,
}

impl StepTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

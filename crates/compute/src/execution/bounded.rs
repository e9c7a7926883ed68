//! Bounded execution: race a blocking computation against a deadline.
//!
//! Every expensive analysis step goes through [`run_bounded`]. The task runs
//! on tokio's blocking pool; if the deadline fires first the step's token is
//! cancelled, whatever the task eventually produces is dropped, and the
//! caller gets [`StepOutcome::TimedOut`].

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use tabula_core::{Analysis, Result, TabulaError};

use super::cancel::CancelToken;

#[derive(Debug)]
pub enum StepOutcome<T> {
    Completed(T),
    TimedOut { after: Duration },
    Failed(String),
}

impl<T> StepOutcome<T> {
    /// Fold the outcome into the applicability marker for `step`.
    pub fn into_analysis(self, step: &str) -> Analysis<T> {
        match self {
            StepOutcome::Completed(v) => Analysis::Complete(v),
            StepOutcome::TimedOut { after } => Analysis::skipped(format!(
                "{step} exceeded its {}ms deadline",
                after.as_millis()
            )),
            StepOutcome::Failed(error) => Analysis::Failed { error },
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StepOutcome::Completed(_) => "completed",
            StepOutcome::TimedOut { .. } => "timed_out",
            StepOutcome::Failed(_) => "failed",
        }
    }
}

/// Run `task` under `deadline`. The task receives a token it should poll in
/// long loops; the token is cancelled when the deadline expires.
pub async fn run_bounded<T, F>(step: &str, deadline: Duration, cancel: CancelToken, task: F) -> StepOutcome<T>
where
    T: Send + 'static,
    F: FnOnce(&CancelToken) -> Result<T> + Send + 'static,
{
    let start = Instant::now();
    let token = cancel.clone();
    let handle = tokio::task::spawn_blocking(move || task(&token));

    let outcome = match tokio::time::timeout(deadline, handle).await {
        Ok(Ok(Ok(value))) => StepOutcome::Completed(value),
        Ok(Ok(Err(TabulaError::Cancelled))) => StepOutcome::TimedOut { after: deadline },
        Ok(Ok(Err(e))) => StepOutcome::Failed(e.to_string()),
        Ok(Err(join_error)) => StepOutcome::Failed(format!("{step} aborted: {join_error}")),
        Err(_) => {
            cancel.cancel();
            StepOutcome::TimedOut { after: deadline }
        }
    };

    match &outcome {
        StepOutcome::Completed(_) => {
            debug!(step, elapsed_ms = start.elapsed().as_millis() as u64, "step completed")
        }
        StepOutcome::TimedOut { after } => {
            warn!(step, deadline_ms = after.as_millis() as u64, "step timed out, result discarded")
        }
        StepOutcome::Failed(error) => warn!(step, %error, "step failed"),
    }
    outcome
}

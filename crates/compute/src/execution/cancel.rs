use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag shared between a step and its supervisor.
///
/// A child token also reports cancellation when its parent is cancelled, so
/// tripping the run-level token stops every step still running.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    parent: Option<Arc<AtomicBool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(&self) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            parent: Some(Arc::clone(&self.flag)),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
            || self
                .parent
                .as_ref()
                .is_some_and(|p| p.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_sees_parent_cancellation() {
        let run = CancelToken::new();
        let step = run.child();
        assert!(!step.is_cancelled());
        run.cancel();
        assert!(step.is_cancelled());
    }

    #[test]
    fn child_cancellation_does_not_leak_upward() {
        let run = CancelToken::new();
        let step = run.child();
        step.cancel();
        assert!(step.is_cancelled());
        assert!(!run.is_cancelled());
    }
}

use tracing::info;

/// Receives step progress. Keeps narration out of the computational core.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, step: &str, percent: u8);
}

/// Narrates progress through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn on_progress(&self, step: &str, percent: u8) {
        info!(step, percent, "analysis progress");
    }
}

/// Discards progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_progress(&self, _step: &str, _percent: u8) {}
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Recorder(Mutex<Vec<(String, u8)>>);

    impl ProgressObserver for Recorder {
        fn on_progress(&self, step: &str, percent: u8) {
            self.0.lock().unwrap().push((step.to_string(), percent));
        }
    }

    #[test]
    fn observers_are_object_safe() {
        let recorder = Recorder(Mutex::new(Vec::new()));
        let observers: Vec<&dyn ProgressObserver> = vec![&NoopObserver, &TracingObserver, &recorder];
        for o in &observers {
            o.on_progress("profile", 10);
        }
        assert_eq!(recorder.0.lock().unwrap().as_slice(), &[("profile".to_string(), 10)]);
    }
}

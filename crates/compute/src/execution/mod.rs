//! Run-time control for analysis steps: bounded execution with deadlines,
//! cooperative cancellation, progress narration, and the shared sampler.
//!
//! Nothing here knows about statistics; the pipeline hands closures in.

pub mod bounded;
pub mod cancel;
pub mod progress;
pub mod sampling;

pub use bounded::{run_bounded, StepOutcome};
pub use cancel::CancelToken;
pub use progress::{NoopObserver, ProgressObserver, TracingObserver};
pub use sampling::{sample_indices, SamplePlan};

pub mod algorithms;
pub mod engine;
pub mod execution;
pub mod pipeline;

pub use engine::ProfileEngine;
pub use execution::{CancelToken, NoopObserver, ProgressObserver, TracingObserver};
pub use pipeline::{Insight, InsightSeverity, PipelineMetrics, ProfileReport, StructuredSummary};

//! Analysis components run by the profiling engine.
//!
//! Each module takes the shared (possibly sampled) dataset and returns its
//! own result type; none of them knows about deadlines or the other steps.
//!
//! - per-column descriptive statistics ([`profile`])
//! - normality, distribution fit, transform search ([`distribution`])
//! - multi-method outlier consensus ([`outliers`])
//! - pairwise association and multicollinearity ([`correlation`])
//! - regression variants and tree segmentation ([`modeling`])
//! - frequency, trend, seasonality, stationarity, forecast ([`timeseries`])
//! - ML-readiness score, fed by everything above ([`readiness`])
//! - the composite output ([`report`], [`insights`], [`structured`])
//! - per-run timings ([`metrics`])

pub mod correlation;
pub mod distribution;
pub mod insights;
pub mod metrics;
pub mod modeling;
pub mod outliers;
pub mod profile;
pub mod readiness;
pub mod report;
pub mod structured;
pub mod timeseries;

pub use insights::{Insight, InsightSeverity};
pub use metrics::PipelineMetrics;
pub use report::{ProfileReport, ReportMetadata};
pub use structured::StructuredSummary;

//! The composite result of one profiling run.
//!
//! Every analysis slot is always present. Anything that did not produce a
//! result carries its applicability marker instead.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use tabula_core::Analysis;

use super::correlation::CorrelationAnalysis;
use super::distribution::DistributionAnalysis;
use super::insights::Insight;
use super::metrics::PipelineMetrics;
use super::modeling::{RegressionAnalysis, SegmentationAnalysis};
use super::outliers::OutlierAnalysis;
use super::profile::ColumnProfile;
use super::readiness::MlReadiness;
use super::timeseries::TimeSeriesAnalysis;
use crate::execution::SamplePlan;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    pub original_rows: usize,
    pub analyzed_rows: usize,
    pub column_count: usize,
    pub sample: SamplePlan,
    /// Modeling target, requested or auto-selected.
    pub target_column: Option<String>,
    pub metrics: PipelineMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileReport {
    pub metadata: ReportMetadata,
    pub column_stats: IndexMap<String, Analysis<ColumnProfile>>,
    pub distribution_analysis: Analysis<DistributionAnalysis>,
    pub outlier_analysis: Analysis<OutlierAnalysis>,
    /// `None` when outlier analysis produced no result.
    pub overall_outlier_rate: Option<f64>,
    pub correlation_analysis: Analysis<CorrelationAnalysis>,
    pub regression_analysis: Analysis<RegressionAnalysis>,
    pub cart_analysis: Analysis<SegmentationAnalysis>,
    pub time_series_analysis: Analysis<TimeSeriesAnalysis>,
    pub ml_readiness: Analysis<MlReadiness>,
    pub insights: Vec<Insight>,
    pub suggestions: Vec<String>,
}

impl ProfileReport {
    /// A report for input that could not be analyzed at all. Every slot
    /// carries the same reason.
    pub fn empty(reason: &str, metrics: PipelineMetrics) -> Self {
        Self {
            metadata: ReportMetadata {
                original_rows: 0,
                analyzed_rows: 0,
                column_count: 0,
                sample: SamplePlan {
                    original_rows: 0,
                    sampled_rows: 0,
                    sampled: false,
                },
                target_column: None,
                metrics,
            },
            column_stats: IndexMap::new(),
            distribution_analysis: Analysis::not_applicable(reason),
            outlier_analysis: Analysis::not_applicable(reason),
            overall_outlier_rate: None,
            correlation_analysis: Analysis::not_applicable(reason),
            regression_analysis: Analysis::not_applicable(reason),
            cart_analysis: Analysis::not_applicable(reason),
            time_series_analysis: Analysis::not_applicable(reason),
            ml_readiness: Analysis::not_applicable(reason),
            insights: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Status label of every analysis slot, keyed like the JSON output.
    pub fn statuses(&self) -> IndexMap<&'static str, &'static str> {
        IndexMap::from([
            ("distributionAnalysis", self.distribution_analysis.status()),
            ("outlierAnalysis", self.outlier_analysis.status()),
            ("correlationAnalysis", self.correlation_analysis.status()),
            ("regressionAnalysis", self.regression_analysis.status()),
            ("cartAnalysis", self.cart_analysis.status()),
            ("timeSeriesAnalysis", self.time_series_analysis.status()),
            ("mlReadiness", self.ml_readiness.status()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report_keeps_every_key() {
        let report = ProfileReport::empty("dataset is empty", PipelineMetrics::new());
        let json = serde_json::to_value(&report).unwrap();
        for key in [
            "columnStats",
            "distributionAnalysis",
            "outlierAnalysis",
            "overallOutlierRate",
            "correlationAnalysis",
            "regressionAnalysis",
            "cartAnalysis",
            "timeSeriesAnalysis",
            "mlReadiness",
            "insights",
            "suggestions",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["cartAnalysis"]["status"], "notApplicable");
        assert_eq!(json["cartAnalysis"]["reason"], "dataset is empty");
        assert_eq!(json["timeSeriesAnalysis"]["reason"], "dataset is empty");
        assert_eq!(report.ml_readiness.reason(), Some("dataset is empty"));
        assert!(json["overallOutlierRate"].is_null());
        assert!(report.statuses().values().all(|s| *s == "notApplicable"));
    }
}

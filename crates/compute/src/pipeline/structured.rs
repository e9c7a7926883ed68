//! Flat projection of a report for LLM and other downstream consumers.
//!
//! Pure read of [`ProfileReport`]: same numbers, fewer levels of nesting.

use serde::{Deserialize, Serialize};

use super::insights::Insight;
use super::modeling::ModelKind;
use super::readiness::ReadinessTier;
use super::report::ProfileReport;
use super::timeseries::{Frequency, TrendDirection};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetShape {
    pub rows: usize,
    pub analyzed_rows: usize,
    pub columns: usize,
    pub sampled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationHeadline {
    pub columns: [String; 2],
    pub pearson: f64,
    pub significant: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlierHeadline {
    pub column: String,
    pub count: usize,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelHeadline {
    pub target: String,
    pub kind: ModelKind,
    pub predictors: Vec<String>,
    pub r_squared: f64,
    pub adjusted_r_squared: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentHeadline {
    pub rule: String,
    pub predicted_value: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesHeadline {
    pub column: String,
    pub trend: TrendDirection,
    pub seasonal: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesHeadline {
    pub date_column: String,
    pub frequency: Frequency,
    pub series: Vec<SeriesHeadline>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredSummary {
    pub dataset: DatasetShape,
    pub top_correlations: Vec<CorrelationHeadline>,
    /// Columns with at least one flagged row, highest rate first.
    pub outlier_columns: Vec<OutlierHeadline>,
    pub overall_outlier_rate: Option<f64>,
    pub best_model: Option<ModelHeadline>,
    pub segments: Vec<SegmentHeadline>,
    pub time_series: Option<TimeSeriesHeadline>,
    pub readiness_score: Option<f64>,
    pub readiness_tier: Option<ReadinessTier>,
    pub insights: Vec<Insight>,
}

impl From<&ProfileReport> for StructuredSummary {
    fn from(report: &ProfileReport) -> Self {
        let top_correlations = report
            .correlation_analysis
            .as_complete()
            .map(|c| {
                c.strongest
                    .iter()
                    .take(5)
                    .map(|p| CorrelationHeadline {
                        columns: [p.column_a.clone(), p.column_b.clone()],
                        pearson: p.pearson,
                        significant: p.significant,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut outlier_columns: Vec<OutlierHeadline> = report
            .outlier_analysis
            .as_complete()
            .map(|o| {
                o.columns
                    .iter()
                    .filter_map(|(name, c)| c.as_complete().map(|c| (name, c)))
                    .filter(|(_, c)| !c.outliers.is_empty())
                    .map(|(name, c)| OutlierHeadline {
                        column: name.clone(),
                        count: c.outliers.len(),
                        rate: c.outlier_rate,
                    })
                    .collect()
            })
            .unwrap_or_default();
        outlier_columns.sort_by(|a, b| b.rate.total_cmp(&a.rate).then_with(|| a.column.cmp(&b.column)));

        let best_model = report.regression_analysis.as_complete().and_then(|r| {
            r.selected.as_ref().map(|m| ModelHeadline {
                target: r.target.column.clone(),
                kind: m.kind,
                predictors: m.predictors.clone(),
                r_squared: m.r_squared,
                adjusted_r_squared: m.adjusted_r_squared,
            })
        });

        let segments = report
            .cart_analysis
            .as_complete()
            .map(|c| {
                c.segments
                    .iter()
                    .map(|s| SegmentHeadline {
                        rule: s.rule.clone(),
                        predicted_value: s.predicted_value,
                        support: s.support,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let time_series = report.time_series_analysis.as_complete().map(|ts| TimeSeriesHeadline {
            date_column: ts.date_column.clone(),
            frequency: ts.frequency,
            series: ts
                .series
                .iter()
                .filter_map(|(name, s)| {
                    s.as_complete().map(|s| SeriesHeadline {
                        column: name.clone(),
                        trend: s.trend.direction,
                        seasonal: s.seasonality.as_complete().is_some_and(|x| x.detected),
                    })
                })
                .collect(),
        });

        let readiness = report.ml_readiness.as_complete();
        Self {
            dataset: DatasetShape {
                rows: report.metadata.original_rows,
                analyzed_rows: report.metadata.analyzed_rows,
                columns: report.metadata.column_count,
                sampled: report.metadata.sample.sampled,
            },
            top_correlations,
            outlier_columns,
            overall_outlier_rate: report.overall_outlier_rate,
            best_model,
            segments,
            time_series,
            readiness_score: readiness.map(|r| r.score),
            readiness_tier: readiness.map(|r| r.tier),
            insights: report.insights.clone(),
        }
    }
}

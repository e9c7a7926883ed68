//! Plain-language findings and follow-up suggestions drawn from a finished
//! report. Read-only over the report; nothing is recomputed here.

use serde::{Deserialize, Serialize};

use tabula_core::Analysis;

use super::correlation::Strength;
use super::outliers::ConfidenceTier;
use super::profile::ColumnProfile;
use super::readiness::{Preprocessing, ReadinessTier};
use super::report::ProfileReport;
use super::timeseries::stationarity::Verdict;
use super::timeseries::TrendDirection;

/// Missing share (percent) above which a column gets its own insight.
const HIGH_MISSING_PERCENT: f64 = 20.0;
/// Per-column outlier rate worth calling out.
const NOTABLE_OUTLIER_RATE: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InsightSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    pub title: String,
    pub description: String,
    pub severity: InsightSeverity,
    pub columns: Vec<String>,
}

impl Insight {
    fn new(severity: InsightSeverity, title: String, description: String, columns: Vec<String>) -> Self {
        Self {
            title,
            description,
            severity,
            columns,
        }
    }
}

#[derive(Default)]
struct Collector {
    insights: Vec<Insight>,
    suggestions: Vec<String>,
}

impl Collector {
    fn insight(&mut self, severity: InsightSeverity, title: String, description: String, columns: Vec<String>) {
        self.insights.push(Insight::new(severity, title, description, columns));
    }

    fn suggest(&mut self, text: String) {
        if !self.suggestions.contains(&text) {
            self.suggestions.push(text);
        }
    }
}

fn degraded_steps(report: &ProfileReport, out: &mut Collector) {
    for (step, status) in report.statuses() {
        match status {
            "skipped" => out.insight(
                InsightSeverity::Warning,
                format!("{step} was skipped"),
                "The step ran out of time; its result was discarded.".into(),
                Vec::new(),
            ),
            "failed" => out.insight(
                InsightSeverity::Warning,
                format!("{step} failed"),
                "A calculation error stopped this step; other results are unaffected.".into(),
                Vec::new(),
            ),
            _ => {}
        }
    }
    if report.metadata.sample.sampled {
        out.insight(
            InsightSeverity::Info,
            "Analysis ran on a sample".into(),
            format!(
                "{} of {} rows were analyzed; every step used the same sample.",
                report.metadata.sample.sampled_rows, report.metadata.sample.original_rows
            ),
            Vec::new(),
        );
    }
}

fn column_findings(report: &ProfileReport, out: &mut Collector) {
    for (name, profile) in &report.column_stats {
        let Some(profile) = profile.as_complete() else {
            continue;
        };
        if profile.null_percentage() > HIGH_MISSING_PERCENT {
            out.insight(
                InsightSeverity::Warning,
                format!("{name} is {:.0}% missing", profile.null_percentage()),
                "Missing values will bias averages and drop rows from models.".into(),
                vec![name.clone()],
            );
            out.suggest(format!("Impute or drop missing values in {name}"));
        }
        match profile {
            ColumnProfile::Numeric(p) if p.shape.is_highly_skewed() => out.insight(
                InsightSeverity::Info,
                format!("{name} is highly skewed"),
                format!("Skewness {:.2}; the median ({:.3}) describes it better than the mean.", p.skewness, p.median),
                vec![name.clone()],
            ),
            ColumnProfile::Categorical(p) if p.unique_count == 1 => out.insight(
                InsightSeverity::Warning,
                format!("{name} has a single value"),
                "A constant column carries no information.".into(),
                vec![name.clone()],
            ),
            ColumnProfile::Identifier(p) if p.duplicate_count > 0 => out.insight(
                InsightSeverity::Warning,
                format!("{name} has duplicate identifiers"),
                format!("{} values repeat in a column expected to be unique.", p.duplicate_count),
                vec![name.clone()],
            ),
            _ => {}
        }
    }

    if let Some(dist) = report.distribution_analysis.as_complete() {
        for (name, column) in &dist.columns {
            if let Some(t) = column.as_complete().and_then(|c| c.transformation.recommended.as_ref()) {
                out.suggest(format!(
                    "Apply a {} transform to {name} (skewness {:.2} → {:.2})",
                    t.name, column.as_complete().map_or(0.0, |c| c.transformation.original_skewness), t.skewness
                ));
            }
        }
        if !dist.normal_columns.is_empty() {
            out.insight(
                InsightSeverity::Info,
                "Normally distributed columns".into(),
                format!("{} pass the majority of normality tests.", dist.normal_columns.join(", ")),
                dist.normal_columns.clone(),
            );
        }
    }
}

fn outlier_findings(report: &ProfileReport, out: &mut Collector) {
    let Some(outliers) = report.outlier_analysis.as_complete() else {
        return;
    };
    for (name, column) in &outliers.columns {
        let Some(c) = column.as_complete() else {
            continue;
        };
        let very_high = c
            .outliers
            .iter()
            .filter(|o| o.confidence == ConfidenceTier::VeryHigh)
            .count();
        if c.outlier_rate > NOTABLE_OUTLIER_RATE || very_high > 0 {
            let severity = if c.context.high_rate {
                InsightSeverity::Critical
            } else {
                InsightSeverity::Warning
            };
            out.insight(
                severity,
                format!("Outliers in {name}"),
                format!(
                    "{} rows flagged ({:.1}%), {very_high} agreed on by four or more methods.",
                    c.outliers.len(),
                    c.outlier_rate * 100.0
                ),
                vec![name.clone()],
            );
            out.suggest(format!("Review flagged rows in {name} before modeling"));
        }
        if !c.context.clustered_runs.is_empty() {
            out.insight(
                InsightSeverity::Info,
                format!("Outliers in {name} come in runs"),
                format!(
                    "{} runs of adjacent flagged rows suggest a data-entry or process event.",
                    c.context.clustered_runs.len()
                ),
                vec![name.clone()],
            );
        }
    }
}

fn correlation_findings(report: &ProfileReport, out: &mut Collector) {
    let Some(corr) = report.correlation_analysis.as_complete() else {
        return;
    };
    for pair in corr
        .strongest
        .iter()
        .filter(|p| matches!(p.strength, Strength::Strong | Strength::VeryStrong) && p.significant)
    {
        out.insight(
            InsightSeverity::Info,
            format!("{} and {} move together", pair.column_a, pair.column_b),
            format!("Pearson r = {:.3}, Spearman ρ = {:.3} over {} rows.", pair.pearson, pair.spearman, pair.n),
            vec![pair.column_a.clone(), pair.column_b.clone()],
        );
    }
    if let Some(m) = corr.multicollinearity.as_complete() {
        if !m.problematic.is_empty() {
            out.insight(
                InsightSeverity::Warning,
                "Multicollinearity".into(),
                format!("{} are largely explained by other columns.", m.problematic.join(", ")),
                m.problematic.clone(),
            );
            out.suggest("Drop or combine collinear columns, or use a regularized model".into());
        }
    }
}

fn modeling_findings(report: &ProfileReport, out: &mut Collector) {
    if let Some(reg) = report.regression_analysis.as_complete() {
        if let Some(model) = &reg.selected {
            out.insight(
                InsightSeverity::Info,
                format!("Best model for {}", reg.target.column),
                model.interpretation.clone(),
                model.predictors.clone(),
            );
        }
        if let Some(p) = reg.polynomial.as_complete().filter(|p| p.nonlinear) {
            out.insight(
                InsightSeverity::Info,
                format!("{} relates to {} nonlinearly", reg.target.column, p.predictor),
                p.interpretation.clone(),
                vec![p.predictor.clone()],
            );
        }
        if let Some(d) = reg.diagnostics.as_complete() {
            for issue in &d.issues {
                out.suggest(format!("Model residuals: {issue}"));
            }
        }
    }
    if let Some(cart) = report.cart_analysis.as_complete() {
        if let Some(top) = cart.segments.first() {
            out.insight(
                InsightSeverity::Info,
                format!("Highest {} segment", cart.target),
                format!(
                    "{} → {:.3} on average ({} rows, {:.1}%).",
                    top.rule, top.predicted_value, top.support, top.support_percentage
                ),
                cart.feature_importance.keys().take(3).cloned().collect(),
            );
        }
    }
}

fn time_series_findings(report: &ProfileReport, out: &mut Collector) {
    let Some(ts) = report.time_series_analysis.as_complete() else {
        return;
    };
    if ts.missing_periods > 0 {
        out.insight(
            InsightSeverity::Warning,
            "Gaps in the time series".into(),
            format!(
                "About {} of {} expected periods are missing.",
                ts.missing_periods, ts.expected_observations
            ),
            vec![ts.date_column.clone()],
        );
    }
    for (name, series) in &ts.series {
        let Some(s) = series.as_complete() else {
            continue;
        };
        if s.trend.direction != TrendDirection::Flat {
            let word = if s.trend.direction == TrendDirection::Increasing {
                "rising"
            } else {
                "falling"
            };
            out.insight(
                InsightSeverity::Info,
                format!("{name} is {word}"),
                format!("{:+.4} per period (p = {:.4}).", s.trend.slope, s.trend.p_value),
                vec![name.clone()],
            );
        }
        if let Some(season) = s.seasonality.as_complete().filter(|x| x.detected) {
            out.insight(
                InsightSeverity::Info,
                format!("{name} is seasonal"),
                format!("Repeats every {} periods (strength {:.2}).", season.period, season.strength),
                vec![name.clone()],
            );
        }
        if s.stationarity.verdict == Verdict::NonStationary {
            out.suggest(format!("Difference {name} before fitting time-series models"));
        }
        if !s.structural_breaks.is_empty() {
            out.insight(
                InsightSeverity::Warning,
                format!("Level shifts in {name}"),
                format!("{} structural breaks found.", s.structural_breaks.len()),
                vec![name.clone()],
            );
        }
    }
}

fn readiness_findings(report: &ProfileReport, out: &mut Collector) {
    let Analysis::Complete(r) = &report.ml_readiness else {
        return;
    };
    let severity = match r.tier {
        ReadinessTier::Insufficient => InsightSeverity::Critical,
        ReadinessTier::Low => InsightSeverity::Warning,
        _ => InsightSeverity::Info,
    };
    out.insight(
        severity,
        format!("ML readiness {:.1}/10", r.score),
        if r.blocking_issues.is_empty() {
            format!("{} usable features.", r.usable_features)
        } else {
            r.blocking_issues.join("; ")
        },
        Vec::new(),
    );
    for (name, f) in &r.features {
        if f.exclude {
            out.suggest(format!("Exclude {name} from model features"));
        } else if f.actions.contains(&Preprocessing::ExtractDateComponents) {
            out.suggest(format!("Extract year, month and weekday from {name}"));
        } else if f.actions.contains(&Preprocessing::TargetEncode) {
            out.suggest(format!("Target-encode {name}"));
        }
    }
    if let Some(m) = r.suggested_models.first() {
        out.suggest(format!("Start with {}: {}", m.model, m.reason));
    }
}

/// Build the insight list and suggestion list for a finished report.
pub fn generate(report: &ProfileReport) -> (Vec<Insight>, Vec<String>) {
    let mut out = Collector::default();
    degraded_steps(report, &mut out);
    column_findings(report, &mut out);
    outlier_findings(report, &mut out);
    correlation_findings(report, &mut out);
    modeling_findings(report, &mut out);
    time_series_findings(report, &mut out);
    readiness_findings(report, &mut out);
    (out.insights, out.suggestions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::metrics::PipelineMetrics;

    #[test]
    fn skipped_steps_are_reported() {
        let mut report = ProfileReport::empty("nothing", PipelineMetrics::new());
        report.correlation_analysis = Analysis::skipped("deadline");
        let (insights, suggestions) = generate(&report);
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].title, "correlationAnalysis was skipped");
        assert_eq!(insights[0].severity, InsightSeverity::Warning);
        assert!(suggestions.is_empty());
    }

    #[test]
    fn suggestions_are_unique() {
        let mut c = Collector::default();
        c.suggest("a".into());
        c.suggest("a".into());
        c.suggest("b".into());
        assert_eq!(c.suggestions, vec!["a", "b"]);
    }
}

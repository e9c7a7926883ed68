//! ML-readiness scoring.
//!
//! Folds the outputs of the other analyses into one 0–10 score:
//!
//! ```text
//! score = 0.2 × size + 0.4 × quality + 0.4 × features
//! ```
//!
//! - size: step function on the original row count
//! - quality: mean of completeness, consistency, uniqueness and validity
//! - features: share of columns rated good or excellent and kept

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use tabula_core::{Analysis, ColumnKind, Dataset};

use super::modeling::ProblemType;
use super::profile::ColumnProfile;

/// Below this many rows the dataset is insufficient whatever else holds.
pub const MIN_READY_ROWS: usize = 50;

pub const WEIGHT_SIZE: f64 = 0.2;
pub const WEIGHT_QUALITY: f64 = 0.4;
pub const WEIGHT_FEATURES: f64 = 0.4;

const MAX_MISSING_SHARE: f64 = 0.5;
const IMPUTE_MISSING_SHARE: f64 = 0.05;
const HIGH_CARDINALITY: usize = 50;
const LOW_CARDINALITY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReadinessTier {
    Insufficient,
    Low,
    Medium,
    High,
}

impl ReadinessTier {
    pub fn from_score(score: f64) -> Self {
        if score < 4.0 {
            ReadinessTier::Insufficient
        } else if score < 6.0 {
            ReadinessTier::Low
        } else if score < 8.0 {
            ReadinessTier::Medium
        } else {
            ReadinessTier::High
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeatureQuality {
    Poor,
    Fair,
    Good,
    Excellent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Preprocessing {
    Drop,
    Impute,
    Standardize,
    LogTransform,
    OneHotEncode,
    TargetEncode,
    ExtractDateComponents,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureAssessment {
    pub kind: ColumnKind,
    pub quality: FeatureQuality,
    pub exclude: bool,
    pub missing_percentage: f64,
    pub issues: Vec<String>,
    pub actions: Vec<Preprocessing>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityComponents {
    pub completeness: f64,
    /// 1 - 2 × overall outlier rate, floored at 0.
    pub consistency: f64,
    pub uniqueness: f64,
    /// Mean type-inference confidence.
    pub validity: f64,
}

impl QualityComponents {
    pub fn score(&self) -> f64 {
        (self.completeness + self.consistency + self.uniqueness + self.validity) / 4.0 * 10.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreComponents {
    pub size: f64,
    pub quality: f64,
    pub features: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSuggestion {
    pub model: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MlReadiness {
    pub score: f64,
    pub tier: ReadinessTier,
    pub components: ScoreComponents,
    pub quality: QualityComponents,
    pub features: IndexMap<String, FeatureAssessment>,
    pub usable_features: usize,
    pub problem_type: Option<ProblemType>,
    pub suggested_models: Vec<ModelSuggestion>,
    pub blocking_issues: Vec<String>,
}

/// Everything the scorer reads from the rest of the run.
pub struct ReadinessInputs<'a> {
    pub data: &'a Dataset,
    /// Row count before sampling; size gating uses the real dataset size.
    pub original_rows: usize,
    pub profiles: &'a IndexMap<String, Analysis<ColumnProfile>>,
    /// `None` when outlier analysis did not run.
    pub outlier_rate: Option<f64>,
    pub problem_type: Option<ProblemType>,
    /// Columns flagged by multicollinearity checks.
    pub collinear_columns: &'a [String],
}

pub fn size_score(rows: usize) -> f64 {
    match rows {
        0..=49 => 0.0,
        50..=99 => 2.0,
        100..=499 => 4.0,
        500..=999 => 6.0,
        1000..=4999 => 8.0,
        _ => 10.0,
    }
}

/// Share of rows that exactly repeat an earlier row.
pub fn duplicate_rate(data: &Dataset) -> f64 {
    if data.rows.is_empty() {
        return 0.0;
    }
    let mut seen: HashSet<String> = HashSet::with_capacity(data.rows.len());
    let mut duplicates = 0usize;
    for row in 0..data.row_count() {
        let key: Vec<String> = data
            .columns
            .keys()
            .map(|c| data.value(row, c).label().unwrap_or_default())
            .collect();
        if !seen.insert(key.join("\u{1f}")) {
            duplicates += 1;
        }
    }
    duplicates as f64 / data.row_count() as f64
}

/// Most common value dwarfs the runner-up and few distinct values exist.
fn near_zero_variance(values: &[f64]) -> bool {
    if values.len() < 20 {
        return false;
    }
    let mut counts: HashMap<u64, usize> = HashMap::new();
    for v in values {
        *counts.entry(v.to_bits()).or_default() += 1;
    }
    let mut freq: Vec<usize> = counts.into_values().collect();
    freq.sort_unstable_by(|a, b| b.cmp(a));
    let unique_share = freq.len() as f64 / values.len() as f64;
    match freq.as_slice() {
        [_] => true,
        [top, second, ..] => unique_share < 0.1 && *top as f64 / *second as f64 > 19.0,
        [] => false,
    }
}

fn assess_feature(data: &Dataset, column: &str, kind: ColumnKind, profile: &Analysis<ColumnProfile>) -> FeatureAssessment {
    let rows = data.row_count().max(1);
    let missing = data.null_count(column) as f64 / rows as f64;
    let mut a = FeatureAssessment {
        kind,
        quality: FeatureQuality::Excellent,
        exclude: false,
        missing_percentage: missing * 100.0,
        issues: Vec::new(),
        actions: Vec::new(),
    };

    match (kind, profile.as_complete()) {
        (ColumnKind::Identifier, _) => {
            a.quality = FeatureQuality::Poor;
            a.exclude = true;
            a.issues.push("identifier carries no generalizable signal".into());
            a.actions.push(Preprocessing::Drop);
            return a;
        }
        (ColumnKind::Date, _) => {
            a.quality = FeatureQuality::Good;
            a.issues.push("raw timestamps need component extraction".into());
            a.actions.push(Preprocessing::ExtractDateComponents);
        }
        (ColumnKind::Integer | ColumnKind::Float, Some(ColumnProfile::Numeric(p))) => {
            if p.std_dev <= f64::EPSILON || p.unique_count <= 1 {
                a.quality = FeatureQuality::Poor;
                a.exclude = true;
                a.issues.push("zero variance".into());
                a.actions.push(Preprocessing::Drop);
                return a;
            }
            if near_zero_variance(&data.numeric_values(column)) {
                a.quality = FeatureQuality::Poor;
                a.exclude = true;
                a.issues.push("near-zero variance".into());
                a.actions.push(Preprocessing::Drop);
                return a;
            }
            if p.shape.is_highly_skewed() {
                a.quality = FeatureQuality::Good;
                a.issues.push(format!("highly skewed ({:.2})", p.skewness));
                a.actions.push(Preprocessing::LogTransform);
            }
            a.actions.push(Preprocessing::Standardize);
        }
        (ColumnKind::Categorical, Some(ColumnProfile::Categorical(p))) => {
            if p.unique_count <= 1 {
                a.quality = FeatureQuality::Poor;
                a.exclude = true;
                a.issues.push("single category".into());
                a.actions.push(Preprocessing::Drop);
                return a;
            }
            if p.unique_count > HIGH_CARDINALITY && p.unique_ratio > 0.5 {
                a.quality = FeatureQuality::Fair;
                a.issues.push(format!("high cardinality ({} categories)", p.unique_count));
                a.actions.push(Preprocessing::TargetEncode);
            } else if p.unique_count <= LOW_CARDINALITY {
                a.actions.push(Preprocessing::OneHotEncode);
            } else {
                a.quality = FeatureQuality::Good;
                a.actions.push(Preprocessing::TargetEncode);
            }
        }
        // No profile: the column is empty or failed to profile.
        _ => {
            a.quality = FeatureQuality::Poor;
            a.exclude = true;
            a.issues.push(
                profile
                    .reason()
                    .map_or_else(|| "no usable values".to_string(), str::to_string),
            );
            a.actions.push(Preprocessing::Drop);
            return a;
        }
    }

    if missing > MAX_MISSING_SHARE {
        a.quality = FeatureQuality::Poor;
        a.issues.push(format!("{:.0}% missing", missing * 100.0));
        a.actions.insert(0, Preprocessing::Impute);
    } else if missing > IMPUTE_MISSING_SHARE {
        a.quality = a.quality.min(FeatureQuality::Good);
        a.actions.insert(0, Preprocessing::Impute);
    }
    a
}

fn suggest_models(
    problem: Option<ProblemType>,
    score: f64,
    rows: usize,
    columns: usize,
    collinear: bool,
) -> Vec<ModelSuggestion> {
    let s = |model: &str, reason: &str| ModelSuggestion {
        model: model.into(),
        reason: reason.into(),
    };
    let mut out = match problem {
        Some(ProblemType::Regression) => vec![s(
            "Linear regression",
            "interpretable baseline for a continuous target",
        )],
        Some(ProblemType::Classification) => vec![
            s("Logistic regression", "interpretable baseline for a discrete target"),
            s("Decision tree", "readable rules for class boundaries"),
        ],
        None => vec![s(
            "K-means clustering",
            "no numeric target was found; explore structure without labels",
        )],
    };
    if problem == Some(ProblemType::Regression) && (collinear || columns > 10) {
        out.push(s(
            "Ridge or Lasso regression",
            "regularization handles many or correlated predictors",
        ));
    }
    if problem.is_some() && score >= 6.0 {
        out.push(s("Random forest", "robust to nonlinearity and mixed feature types"));
        out.push(s("Gradient boosting", "usually the strongest tabular learner at this quality"));
    }
    if problem.is_some() && score >= 8.0 && columns > 50 && rows > 10_000 {
        out.push(s("Neural network", "enough rows and features to learn dense representations"));
    }
    out
}

pub fn assess(inputs: &ReadinessInputs<'_>) -> MlReadiness {
    let data = inputs.data;
    let features: IndexMap<String, FeatureAssessment> = data
        .columns
        .iter()
        .map(|(name, t)| {
            let profile = inputs
                .profiles
                .get(name)
                .cloned()
                .unwrap_or_else(|| Analysis::not_applicable("not profiled"));
            (name.clone(), assess_feature(data, name, t.kind, &profile))
        })
        .collect();

    let cells = (data.row_count() * data.column_count()).max(1);
    let nulls: usize = data.columns.keys().map(|c| data.null_count(c)).sum();
    let validity = if data.columns.is_empty() {
        0.0
    } else {
        data.columns.values().map(|t| t.confidence_or_default()).sum::<f64>() / data.column_count() as f64
    };
    let quality = QualityComponents {
        completeness: 1.0 - nulls as f64 / cells as f64,
        consistency: (1.0 - 2.0 * inputs.outlier_rate.unwrap_or(0.0)).max(0.0),
        uniqueness: 1.0 - duplicate_rate(data),
        validity,
    };

    let usable = features
        .values()
        .filter(|f| !f.exclude && f.quality >= FeatureQuality::Good)
        .count();
    let feature_score = if features.is_empty() {
        0.0
    } else {
        usable as f64 / features.len() as f64 * 10.0
    };
    let components = ScoreComponents {
        size: size_score(inputs.original_rows),
        quality: quality.score(),
        features: feature_score,
    };
    let score = WEIGHT_SIZE * components.size
        + WEIGHT_QUALITY * components.quality
        + WEIGHT_FEATURES * components.features;

    let mut blocking_issues = Vec::new();
    if inputs.original_rows < MIN_READY_ROWS {
        blocking_issues.push(format!(
            "only {} rows; at least {MIN_READY_ROWS} are needed to train anything",
            inputs.original_rows
        ));
    }
    if features.values().all(|f| f.exclude) {
        blocking_issues.push("every column is excluded as a feature".into());
    }
    if quality.completeness < 0.5 {
        blocking_issues.push(format!(
            "{:.0}% of cells are missing",
            (1.0 - quality.completeness) * 100.0
        ));
    }

    let tier = if inputs.original_rows < MIN_READY_ROWS {
        ReadinessTier::Insufficient
    } else {
        ReadinessTier::from_score(score)
    };

    MlReadiness {
        score,
        tier,
        suggested_models: suggest_models(
            inputs.problem_type,
            score,
            inputs.original_rows,
            data.column_count(),
            !inputs.collinear_columns.is_empty(),
        ),
        components,
        quality,
        features,
        usable_features: usable,
        problem_type: inputs.problem_type,
        blocking_issues,
    }
}

#[cfg(test)]
mod tests {
    use tabula_core::{ColumnType, FieldValue, Row};

    use super::*;
    use crate::pipeline::profile::profile_columns;

    fn inputs_for<'a>(
        data: &'a Dataset,
        profiles: &'a IndexMap<String, Analysis<ColumnProfile>>,
        problem_type: Option<ProblemType>,
    ) -> ReadinessInputs<'a> {
        ReadinessInputs {
            data,
            original_rows: data.row_count(),
            profiles,
            outlier_rate: Some(0.0),
            problem_type,
            collinear_columns: &[],
        }
    }

    #[test]
    fn size_steps() {
        assert_eq!(size_score(10), 0.0);
        assert_eq!(size_score(50), 2.0);
        assert_eq!(size_score(499), 4.0);
        assert_eq!(size_score(999), 6.0);
        assert_eq!(size_score(4999), 8.0);
        assert_eq!(size_score(5000), 10.0);
    }

    #[test]
    fn tiers() {
        assert_eq!(ReadinessTier::from_score(3.9), ReadinessTier::Insufficient);
        assert_eq!(ReadinessTier::from_score(5.0), ReadinessTier::Low);
        assert_eq!(ReadinessTier::from_score(7.99), ReadinessTier::Medium);
        assert_eq!(ReadinessTier::from_score(8.0), ReadinessTier::High);
    }

    #[test]
    fn constant_category_is_poor_and_excluded() {
        let mut columns = IndexMap::new();
        columns.insert("status".to_string(), ColumnType::new(ColumnKind::Categorical));
        let rows: Vec<Row> = (0..100)
            .map(|_| Row::from([("status".to_string(), FieldValue::from("active"))]))
            .collect();
        let data = Dataset::new(rows, columns);
        let profiles = profile_columns(&data);
        let r = assess(&inputs_for(&data, &profiles, None));
        let status = &r.features["status"];
        assert_eq!(status.quality, FeatureQuality::Poor);
        assert!(status.exclude);
        assert_eq!(r.usable_features, 0);
        assert!(r.blocking_issues.iter().any(|i| i.contains("excluded")));
    }

    #[test]
    fn small_dataset_is_insufficient() {
        let mut columns = IndexMap::new();
        columns.insert("x".to_string(), ColumnType::new(ColumnKind::Float));
        let rows: Vec<Row> = (0..30)
            .map(|i| Row::from([("x".to_string(), FieldValue::from(i as f64))]))
            .collect();
        let data = Dataset::new(rows, columns);
        let profiles = profile_columns(&data);
        let r = assess(&inputs_for(&data, &profiles, Some(ProblemType::Regression)));
        assert_eq!(r.tier, ReadinessTier::Insufficient);
        assert!(!r.blocking_issues.is_empty());
    }

    #[test]
    fn clean_dataset_scores_well() {
        let mut columns = IndexMap::new();
        columns.insert("id".to_string(), ColumnType::new(ColumnKind::Identifier));
        columns.insert("age".to_string(), ColumnType::new(ColumnKind::Integer));
        columns.insert("income".to_string(), ColumnType::new(ColumnKind::Float));
        columns.insert("plan".to_string(), ColumnType::new(ColumnKind::Categorical));
        let plans = ["basic", "plus", "pro"];
        let rows: Vec<Row> = (0..6000)
            .map(|i| {
                Row::from([
                    ("id".to_string(), FieldValue::from(format!("u{i}"))),
                    ("age".to_string(), FieldValue::from((18 + i % 60) as f64)),
                    ("income".to_string(), FieldValue::from(20_000.0 + (i % 97) as f64 * 500.0)),
                    ("plan".to_string(), FieldValue::from(plans[i % 3])),
                ])
            })
            .collect();
        let data = Dataset::new(rows, columns);
        let profiles = profile_columns(&data);
        let r = assess(&inputs_for(&data, &profiles, Some(ProblemType::Regression)));
        assert!(r.features["id"].exclude);
        assert_eq!(r.features["plan"].quality, FeatureQuality::Excellent);
        assert_eq!(r.usable_features, 3);
        assert!((r.components.features - 7.5).abs() < 1e-9);
        assert_eq!(r.components.size, 10.0);
        // 0.2·10 + 0.4·10 + 0.4·7.5
        assert!((r.score - 9.0).abs() < 1e-9);
        assert_eq!(r.tier, ReadinessTier::High);
        assert!(r.suggested_models.iter().any(|m| m.model == "Random forest"));
        assert!(!r.suggested_models.iter().any(|m| m.model == "Neural network"));
    }

    #[test]
    fn mostly_missing_numeric_is_poor() {
        let mut columns = IndexMap::new();
        columns.insert("x".to_string(), ColumnType::new(ColumnKind::Float));
        let rows: Vec<Row> = (0..100)
            .map(|i| {
                let v = if i % 4 == 0 { FieldValue::from(i as f64) } else { FieldValue::Null };
                Row::from([("x".to_string(), v)])
            })
            .collect();
        let data = Dataset::new(rows, columns);
        let profiles = profile_columns(&data);
        let r = assess(&inputs_for(&data, &profiles, None));
        assert_eq!(r.features["x"].quality, FeatureQuality::Poor);
        assert_eq!(r.features["x"].actions[0], Preprocessing::Impute);
    }

    #[test]
    fn duplicates_are_counted() {
        let mut columns = IndexMap::new();
        columns.insert("a".to_string(), ColumnType::new(ColumnKind::Float));
        let rows: Vec<Row> = [1.0, 1.0, 2.0, 3.0]
            .iter()
            .map(|v| Row::from([("a".to_string(), FieldValue::from(*v))]))
            .collect();
        let data = Dataset::new(rows, columns);
        assert!((duplicate_rate(&data) - 0.25).abs() < 1e-12);
    }
}

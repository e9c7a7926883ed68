//! Predictive modeling: target selection, regression variants with model
//! selection and residual diagnostics, and tree-based segmentation.
//!
//! Sub-modules:
//! - simple, multiple, polynomial and robust fits ([`regression`])
//! - residual checks on the selected model ([`diagnostics`])
//! - regression-tree segments ([`segmentation`])

pub mod diagnostics;
pub mod regression;
pub mod segmentation;

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use tabula_core::{Analysis, Dataset, Result, TabulaError};

use crate::algorithms::descriptive::variance;
use crate::algorithms::linalg::{design_matrix, least_squares};
use crate::execution::CancelToken;

pub use diagnostics::ResidualDiagnostics;
pub use regression::{MultipleRegression, PolynomialRegression, RegressionData, RobustRegression, SimpleRegression};
pub use segmentation::SegmentationAnalysis;

pub const MIN_MODELING_ROWS: usize = 20;

/// Multiple regression uses at most this many predictors, strongest first.
const MAX_PREDICTORS: usize = 20;

/// Numeric targets with at most this many distinct integer values are
/// treated as class labels.
const MAX_CLASS_LABELS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProblemType {
    Regression,
    Classification,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetChoice {
    pub column: String,
    pub auto_selected: bool,
    pub problem_type: ProblemType,
    pub valid_rows: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModelKind {
    Simple,
    Multiple,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedModel {
    pub kind: ModelKind,
    pub predictors: Vec<String>,
    pub r_squared: f64,
    pub adjusted_r_squared: f64,
    pub interpretation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegressionAnalysis {
    pub target: TargetChoice,
    pub predictors: Vec<String>,
    pub simple: IndexMap<String, Analysis<SimpleRegression>>,
    pub multiple: Analysis<MultipleRegression>,
    pub polynomial: Analysis<PolynomialRegression>,
    pub robust: Analysis<RobustRegression>,
    pub selected: Option<SelectedModel>,
    pub diagnostics: Analysis<ResidualDiagnostics>,
}

fn problem_type(values: &[f64]) -> ProblemType {
    let integral = values.iter().all(|v| v.fract() == 0.0);
    let distinct: HashSet<u64> = values.iter().map(|v| v.to_bits()).collect();
    if integral && distinct.len() <= MAX_CLASS_LABELS {
        ProblemType::Classification
    } else {
        ProblemType::Regression
    }
}

/// Pick the modeling target: the requested column when given, otherwise
/// the numeric column with the largest variance among those with enough
/// valid rows. `Err` carries the reason modeling does not apply.
pub fn select_target(data: &Dataset, requested: Option<&str>) -> std::result::Result<TargetChoice, String> {
    let numeric = data.numeric_columns();
    if numeric.len() < 2 {
        return Err("needs a numeric target and at least one numeric predictor".into());
    }
    let (column, auto_selected) = match requested {
        Some(name) if numeric.iter().any(|c| c == name) => (name.to_string(), false),
        Some(name) => return Err(format!("target column '{name}' is not numeric or does not exist")),
        None => {
            let best = numeric
                .iter()
                .map(|c| (c, data.numeric_values(c)))
                .filter(|(_, v)| v.len() >= MIN_MODELING_ROWS)
                .map(|(c, v)| (c, variance(&v)))
                .filter(|(_, var)| *var > 0.0)
                .max_by(|a, b| a.1.total_cmp(&b.1));
            match best {
                Some((c, _)) => (c.clone(), true),
                None => {
                    return Err(format!(
                        "no numeric column has {MIN_MODELING_ROWS} valid rows and non-zero variance"
                    ))
                }
            }
        }
    };
    let values = data.numeric_values(&column);
    if values.len() < MIN_MODELING_ROWS {
        return Err(format!(
            "target '{column}' has {} valid rows, needs {MIN_MODELING_ROWS}",
            values.len()
        ));
    }
    Ok(TargetChoice {
        problem_type: problem_type(&values),
        valid_rows: values.len(),
        column,
        auto_selected,
    })
}

/// Non-constant numeric predictors, strongest |r| with the target first.
fn candidate_predictors(data: &Dataset, target: &str) -> Vec<(String, Vec<Option<f64>>)> {
    let y = data.numeric_column(target);
    let mut scored: Vec<(f64, String, Vec<Option<f64>>)> = data
        .numeric_columns()
        .into_iter()
        .filter(|c| c != target)
        .filter_map(|c| {
            let column = data.numeric_column(&c);
            let (a, b): (Vec<f64>, Vec<f64>) = y
                .iter()
                .zip(&column)
                .filter_map(|(t, x)| Some(((*t)?, (*x)?)))
                .unzip();
            let r = crate::algorithms::descriptive::pearson(&a, &b)?;
            Some((r.abs(), c, column))
        })
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    scored.truncate(MAX_PREDICTORS);
    // Back to column order so output keys are stable.
    let order = data.numeric_columns();
    scored.sort_by_key(|(_, c, _)| order.iter().position(|o| o == c));
    scored.into_iter().map(|(_, c, v)| (c, v)).collect()
}

fn paired(y: &[Option<f64>], x: &[Option<f64>]) -> (Vec<f64>, Vec<f64>) {
    x.iter()
        .zip(y)
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .unzip()
}

pub fn regress(data: &Dataset, target: &TargetChoice, cancel: &CancelToken) -> Result<Analysis<RegressionAnalysis>> {
    let predictors = candidate_predictors(data, &target.column);
    if predictors.is_empty() {
        return Ok(Analysis::not_applicable("no usable numeric predictor"));
    }
    let y = data.numeric_column(&target.column);

    let mut simple = IndexMap::new();
    for (name, column) in &predictors {
        if cancel.is_cancelled() {
            return Err(TabulaError::Cancelled);
        }
        let (x, yy) = paired(&y, column);
        let fit = if x.len() < MIN_MODELING_ROWS {
            Analysis::not_applicable(format!("{} paired rows, needs {MIN_MODELING_ROWS}", x.len()))
        } else {
            regression::simple(&target.column, name, &x, &yy)
        };
        simple.insert(name.clone(), fit);
    }

    let data_cc = RegressionData::complete_cases(&target.column, &y, &predictors);
    let enough_rows = data_cc.n() >= MIN_MODELING_ROWS;

    let (multiple, multiple_fit) = if predictors.len() < 2 {
        (Analysis::not_applicable("needs at least 2 predictors"), None)
    } else if !enough_rows {
        (Analysis::not_applicable("too few complete rows"), None)
    } else {
        match regression::multiple(&data_cc) {
            Ok((model, fit)) => (Analysis::Complete(model), Some(fit)),
            Err(e) => (Analysis::failed(e), None),
        }
    };

    let (first_name, first_column) = &predictors[0];
    let (px, py) = paired(&y, first_column);
    let polynomial = if px.len() < MIN_MODELING_ROWS {
        Analysis::not_applicable("too few paired rows")
    } else {
        regression::polynomial(&target.column, first_name, &px, &py).into()
    };

    let robust = if !enough_rows {
        Analysis::not_applicable("too few complete rows")
    } else {
        regression::robust(&data_cc, cancel).into()
    };
    if cancel.is_cancelled() {
        return Err(TabulaError::Cancelled);
    }

    let selected = select_model(&simple, &multiple);
    let diagnostics = match &selected {
        None => Analysis::not_applicable("no model was fitted"),
        Some(model) => diagnose_selected(model, data, &target.column, &data_cc, multiple_fit.as_ref()),
    };
    debug!(
        target = %target.column,
        predictors = predictors.len(),
        selected = ?selected.as_ref().map(|s| s.kind),
        "regression finished"
    );

    Ok(Analysis::Complete(RegressionAnalysis {
        target: target.clone(),
        predictors: predictors.into_iter().map(|(n, _)| n).collect(),
        simple,
        multiple,
        polynomial,
        robust,
        selected,
        diagnostics,
    }))
}

/// Highest adjusted R² among the simple fits and the multiple fit. Ties go
/// to the simpler model.
fn select_model(
    simple: &IndexMap<String, Analysis<SimpleRegression>>,
    multiple: &Analysis<MultipleRegression>,
) -> Option<SelectedModel> {
    let mut best: Option<SelectedModel> = None;
    for fit in simple.values().filter_map(Analysis::as_complete) {
        if best.as_ref().map_or(true, |b| fit.adjusted_r_squared > b.adjusted_r_squared) {
            best = Some(SelectedModel {
                kind: ModelKind::Simple,
                predictors: vec![fit.predictor.clone()],
                r_squared: fit.r_squared,
                adjusted_r_squared: fit.adjusted_r_squared,
                interpretation: fit.interpretation.clone(),
            });
        }
    }
    if let Some(fit) = multiple.as_complete() {
        if best.as_ref().map_or(true, |b| fit.adjusted_r_squared > b.adjusted_r_squared) {
            best = Some(SelectedModel {
                kind: ModelKind::Multiple,
                predictors: fit.predictors.clone(),
                r_squared: fit.r_squared,
                adjusted_r_squared: fit.adjusted_r_squared,
                interpretation: fit.interpretation.clone(),
            });
        }
    }
    best
}

fn diagnose_selected(
    model: &SelectedModel,
    data: &Dataset,
    target: &str,
    complete: &RegressionData,
    multiple_fit: Option<&crate::algorithms::linalg::LeastSquaresFit>,
) -> Analysis<ResidualDiagnostics> {
    let p = model.predictors.len() + 1;
    match (model.kind, multiple_fit) {
        (ModelKind::Multiple, Some(fit)) => diagnostics::diagnose(fit, p, &complete.rows).into(),
        _ => {
            let y = data.numeric_column(target);
            let x = data.numeric_column(&model.predictors[0]);
            let single = RegressionData::complete_cases(target, &y, &[(model.predictors[0].clone(), x)]);
            least_squares(&design_matrix(&single.x, true), &single.y)
                .and_then(|fit| diagnostics::diagnose(&fit, p, &single.rows))
                .into()
        }
    }
}

#[cfg(test)]
mod tests {
    use tabula_core::{ColumnKind, ColumnType, FieldValue, Row};

    use super::*;

    fn dataset(n: usize) -> Dataset {
        let mut columns = IndexMap::new();
        columns.insert("x".to_string(), ColumnType::new(ColumnKind::Float));
        columns.insert("y".to_string(), ColumnType::new(ColumnKind::Float));
        columns.insert("flag".to_string(), ColumnType::new(ColumnKind::Integer));
        let rows: Vec<Row> = (1..=n)
            .map(|i| {
                let x = i as f64;
                Row::from([
                    ("x".to_string(), FieldValue::from(x)),
                    ("y".to_string(), FieldValue::from(2.0 * x + 5.0)),
                    ("flag".to_string(), FieldValue::from((i % 2) as f64)),
                ])
            })
            .collect();
        Dataset::new(rows, columns)
    }

    #[test]
    fn auto_target_is_max_variance_column() {
        let choice = select_target(&dataset(50), None).unwrap();
        assert_eq!(choice.column, "y");
        assert!(choice.auto_selected);
        assert_eq!(choice.problem_type, ProblemType::Regression);
    }

    #[test]
    fn binary_target_is_classification() {
        let choice = select_target(&dataset(50), Some("flag")).unwrap();
        assert_eq!(choice.problem_type, ProblemType::Classification);
        assert!(!choice.auto_selected);
    }

    #[test]
    fn unknown_target_is_rejected() {
        assert!(select_target(&dataset(50), Some("missing")).is_err());
        assert!(select_target(&dataset(10), None).is_err());
    }

    #[test]
    fn exact_line_selects_simple_model() {
        let data = dataset(50);
        let target = select_target(&data, Some("y")).unwrap();
        let result = regress(&data, &target, &CancelToken::new())
            .unwrap()
            .into_complete()
            .unwrap();
        let fit = result.simple["x"].as_complete().unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-6);
        assert!((fit.intercept - 5.0).abs() < 1e-6);
        assert!((fit.r_squared - 1.0).abs() < 1e-6);
        assert!(fit.f_test.p_value < 0.05);
        let selected = result.selected.unwrap();
        assert!((selected.r_squared - 1.0).abs() < 1e-6);
        assert!(result.robust.is_complete());
    }
}

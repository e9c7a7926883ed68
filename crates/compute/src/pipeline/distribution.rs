//! Distribution fitting for numeric columns.
//!
//! Normality is decided by majority vote over the applicable tests
//! (Shapiro-Wilk, Anderson-Darling, Jarque-Bera, Q-Q correlation). Uniform
//! and exponential candidates are checked with one-sample KS tests, and a
//! skew-reducing transformation is searched over log, sqrt and a Box-Cox
//! lambda grid.

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use tabula_core::{Analysis, Dataset};

use crate::algorithms::descriptive::{mean, skewness, std_dev};
use crate::algorithms::normality::{
    anderson_darling, jarque_bera, kolmogorov_smirnov, qq_correlation, shapiro_wilk, TestResult,
};
use crate::algorithms::probability::normal_cdf;
use crate::execution::CancelToken;

/// Minimum valid values before any distribution test runs.
pub const MIN_DISTRIBUTION_N: usize = 20;

const BOX_COX_LAMBDAS: [f64; 7] = [-2.0, -1.0, -0.5, 0.0, 0.5, 1.0, 2.0];

/// Below this |skewness| no transformation is recommended.
const SKEW_WORTH_FIXING: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Candidate {
    Normal,
    Uniform,
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalityAssessment {
    pub tests: Vec<TestResult>,
    pub applicable_tests: usize,
    /// Tests that failed to reject normality.
    pub passed: usize,
    pub is_normal: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitCandidate {
    pub distribution: Candidate,
    /// 1 - KS distance; higher is a closer fit.
    pub score: f64,
    pub rejected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transform {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lambda: Option<f64>,
    /// Constant added before transforming so every input is in range.
    pub shift: f64,
    pub skewness: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformSearch {
    pub original_skewness: f64,
    pub candidates: Vec<Transform>,
    pub recommended: Option<Transform>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDistribution {
    pub sample_size: usize,
    pub normality: NormalityAssessment,
    pub uniformity: Analysis<TestResult>,
    pub exponential: Analysis<TestResult>,
    pub candidates: Vec<FitCandidate>,
    pub best_fit: Option<Candidate>,
    pub transformation: TransformSearch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionAnalysis {
    pub columns: IndexMap<String, Analysis<ColumnDistribution>>,
    pub normal_columns: Vec<String>,
}

pub fn assess_normality(values: &[f64]) -> NormalityAssessment {
    let tests: Vec<TestResult> = [
        shapiro_wilk(values),
        anderson_darling(values),
        jarque_bera(values),
        qq_correlation(values),
    ]
    .into_iter()
    .flatten()
    .collect();
    let applicable_tests = tests.len();
    let passed = tests.iter().filter(|t| !t.rejected).count();
    NormalityAssessment {
        is_normal: applicable_tests > 0 && passed * 2 > applicable_tests,
        tests,
        applicable_tests,
        passed,
    }
}

fn uniformity(values: &[f64]) -> Analysis<TestResult> {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let width = max - min;
    if width <= f64::EPSILON {
        return Analysis::not_applicable("zero range");
    }
    kolmogorov_smirnov(values, "ks-uniform", |x| ((x - min) / width).clamp(0.0, 1.0))
        .map_or_else(|| Analysis::not_applicable("too few values"), Analysis::Complete)
}

fn exponential_fit(values: &[f64]) -> Analysis<TestResult> {
    let positive = values.iter().filter(|v| **v > 0.0).count();
    if (positive as f64) < 0.9 * values.len() as f64 {
        return Analysis::not_applicable("fewer than 90% of values are positive");
    }
    let scale = mean(values);
    if scale <= 0.0 {
        return Analysis::not_applicable("non-positive mean");
    }
    kolmogorov_smirnov(values, "ks-exponential", |x| {
        if x <= 0.0 {
            0.0
        } else {
            1.0 - (-x / scale).exp()
        }
    })
    .map_or_else(|| Analysis::not_applicable("too few values"), Analysis::Complete)
}

fn box_cox(x: f64, lambda: f64) -> f64 {
    if lambda == 0.0 {
        x.ln()
    } else {
        (x.powf(lambda) - 1.0) / lambda
    }
}

fn transform_candidate(
    values: &[f64],
    name: &str,
    lambda: Option<f64>,
    shift: f64,
    f: impl Fn(f64) -> f64,
) -> Option<Transform> {
    let transformed: Vec<f64> = values.iter().map(|v| f(v + shift)).collect();
    if transformed.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Some(Transform {
        name: name.to_string(),
        lambda,
        shift,
        skewness: skewness(&transformed),
    })
}

/// Try log, sqrt and Box-Cox over the lambda grid. A transform is only
/// recommended when it strictly lowers |skewness| and the data is skewed
/// enough to care.
pub fn search_transforms(values: &[f64]) -> TransformSearch {
    let original_skewness = skewness(values);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let positive_shift = if min > 0.0 { 0.0 } else { 1.0 - min };
    let sqrt_shift = if min >= 0.0 { 0.0 } else { -min };

    let mut candidates = Vec::new();
    candidates.extend(transform_candidate(values, "log", None, positive_shift, f64::ln));
    candidates.extend(transform_candidate(values, "sqrt", None, sqrt_shift, f64::sqrt));
    for lambda in BOX_COX_LAMBDAS {
        candidates.extend(transform_candidate(
            values,
            "box-cox",
            Some(lambda),
            positive_shift,
            |x| box_cox(x, lambda),
        ));
    }

    let recommended = if original_skewness.abs() < SKEW_WORTH_FIXING {
        None
    } else {
        candidates
            .iter()
            .filter(|c| c.skewness.abs() < original_skewness.abs())
            .min_by(|a, b| a.skewness.abs().total_cmp(&b.skewness.abs()))
            .cloned()
    };

    TransformSearch {
        original_skewness,
        candidates,
        recommended,
    }
}

pub fn analyze_values(values: &[f64]) -> Analysis<ColumnDistribution> {
    if values.len() < MIN_DISTRIBUTION_N {
        return Analysis::not_applicable(format!(
            "needs at least {MIN_DISTRIBUTION_N} values, found {}",
            values.len()
        ));
    }
    let m = mean(values);
    let s = std_dev(values);
    if s <= f64::EPSILON {
        return Analysis::not_applicable("zero variance");
    }

    let normality = assess_normality(values);
    let uniformity = uniformity(values);
    let exponential = exponential_fit(values);

    let mut candidates = Vec::new();
    if let Some(ks) = kolmogorov_smirnov(values, "ks-normal", |x| normal_cdf((x - m) / s)) {
        candidates.push(FitCandidate {
            distribution: Candidate::Normal,
            score: 1.0 - ks.statistic,
            rejected: !normality.is_normal,
        });
    }
    for (distribution, test) in [
        (Candidate::Uniform, &uniformity),
        (Candidate::Exponential, &exponential),
    ] {
        if let Some(t) = test.as_complete() {
            candidates.push(FitCandidate {
                distribution,
                score: 1.0 - t.statistic,
                rejected: t.rejected,
            });
        }
    }
    let best_fit = candidates
        .iter()
        .filter(|c| !c.rejected)
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .map(|c| c.distribution);

    Analysis::Complete(ColumnDistribution {
        sample_size: values.len(),
        normality,
        uniformity,
        exponential,
        candidates,
        best_fit,
        transformation: search_transforms(values),
    })
}

pub fn analyze(data: &Dataset, cancel: &CancelToken) -> tabula_core::Result<DistributionAnalysis> {
    let columns = data.numeric_columns();
    let results: Vec<(String, Analysis<ColumnDistribution>)> = columns
        .par_iter()
        .map(|name| {
            if cancel.is_cancelled() {
                return (name.clone(), Analysis::skipped("computation cancelled"));
            }
            (name.clone(), analyze_values(&data.numeric_values(name)))
        })
        .collect();
    if cancel.is_cancelled() {
        return Err(tabula_core::TabulaError::Cancelled);
    }
    let normal_columns = results
        .iter()
        .filter(|(_, a)| a.as_complete().is_some_and(|d| d.normality.is_normal))
        .map(|(n, _)| n.clone())
        .collect();
    Ok(DistributionAnalysis {
        columns: results.into_iter().collect(),
        normal_columns,
    })
}

#[cfg(test)]
mod tests {
    use crate::algorithms::probability::normal_quantile;

    use super::*;

    fn normal_sample(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + 15.0 * normal_quantile((i as f64 + 0.5) / n as f64))
            .collect()
    }

    fn lognormal_sample(n: usize) -> Vec<f64> {
        normal_sample(n).iter().map(|v| ((v - 100.0) / 15.0).exp()).collect()
    }

    #[test]
    fn small_columns_are_not_applicable() {
        let values: Vec<f64> = (0..19).map(f64::from).collect();
        assert!(!analyze_values(&values).is_applicable());
    }

    #[test]
    fn normal_data_is_normal_and_best_fit() {
        let result = analyze_values(&normal_sample(200));
        let d = result.as_complete().unwrap();
        assert!(d.normality.is_normal);
        assert_eq!(d.best_fit, Some(Candidate::Normal));
        assert!(d.transformation.recommended.is_none());
    }

    #[test]
    fn uniform_grid_prefers_uniform() {
        let values: Vec<f64> = (0..200).map(|i| i as f64 * 0.5).collect();
        let d = analyze_values(&values).into_complete().unwrap();
        assert_eq!(d.best_fit, Some(Candidate::Uniform));
    }

    #[test]
    fn exponential_requires_positive_values() {
        let mut values = normal_sample(100);
        values.iter_mut().for_each(|v| *v -= 100.0);
        let d = analyze_values(&values).into_complete().unwrap();
        assert!(!d.exponential.is_applicable());
    }

    #[test]
    fn recommended_transform_reduces_skew() {
        let values = lognormal_sample(300);
        let search = search_transforms(&values);
        let rec = search.recommended.expect("log-normal data should be transformable");
        assert!(rec.skewness.abs() < search.original_skewness.abs());
        assert!(search.original_skewness > 2.0);
    }

    #[test]
    fn no_recommendation_when_nothing_improves() {
        let values = normal_sample(100);
        let search = search_transforms(&values);
        assert!(search.recommended.is_none());
        assert!(!search.candidates.is_empty());
    }

    #[test]
    fn box_cox_zero_is_log() {
        assert!((box_cox(std::f64::consts::E, 0.0) - 1.0).abs() < 1e-12);
        assert!((box_cox(4.0, 0.5) - 2.0).abs() < 1e-12);
    }
}

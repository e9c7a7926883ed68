//! Regression variants: simple OLS per predictor, multiple OLS, a degree-2
//! polynomial on the first predictor, and Huber-weighted robust regression.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use tabula_core::{Analysis, Result, TabulaError};

use crate::algorithms::descriptive::{mad, mean, std_dev};
use crate::algorithms::linalg::{
    adjusted_r_squared, design_matrix, least_squares, r_squared, weighted_least_squares,
    LeastSquaresFit,
};
use crate::algorithms::normality::ALPHA;
use crate::algorithms::probability::{f_sf, t_two_tailed};
use crate::execution::CancelToken;

pub const HUBER_MAX_ITERATIONS: usize = 20;
pub const HUBER_TOLERANCE: f64 = 1e-4;
const HUBER_K: f64 = 1.345;

/// R² gain of the quadratic fit over the linear one that counts as curvature.
const NONLINEAR_GAIN: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coefficient {
    pub name: String,
    pub estimate: f64,
    pub std_error: f64,
    /// `None` when the standard error vanishes (exact fit).
    pub t_statistic: Option<f64>,
    pub p_value: f64,
    pub significant: bool,
}

impl Coefficient {
    fn new(name: &str, estimate: f64, std_error: f64, df: f64) -> Self {
        let (t_statistic, p_value) = if std_error > f64::EPSILON * estimate.abs().max(1.0) {
            let t = estimate / std_error;
            (Some(t), t_two_tailed(t, df))
        } else if estimate == 0.0 {
            (None, 1.0)
        } else {
            (None, 0.0)
        };
        Self {
            name: name.to_string(),
            estimate,
            std_error,
            t_statistic,
            p_value,
            significant: p_value < ALPHA,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FTest {
    /// `None` when residual variance is zero.
    pub statistic: Option<f64>,
    pub df_model: usize,
    pub df_residual: usize,
    pub p_value: f64,
    pub significant: bool,
}

impl FTest {
    fn new(ss_model: f64, sse: f64, df_model: usize, df_residual: usize) -> Self {
        let (statistic, p_value) = if sse <= 1e-12 * (ss_model + sse).max(f64::MIN_POSITIVE) {
            (None, if ss_model > 0.0 { 0.0 } else { 1.0 })
        } else {
            let f = (ss_model / df_model as f64) / (sse / df_residual as f64);
            (Some(f), f_sf(f, df_model as f64, df_residual as f64))
        };
        Self {
            statistic,
            df_model,
            df_residual,
            p_value,
            significant: p_value < ALPHA,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleRegression {
    pub predictor: String,
    pub n: usize,
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub adjusted_r_squared: f64,
    pub rmse: f64,
    pub coefficients: Vec<Coefficient>,
    pub f_test: FTest,
    pub interpretation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipleRegression {
    pub predictors: Vec<String>,
    pub n: usize,
    pub coefficients: Vec<Coefficient>,
    pub r_squared: f64,
    pub adjusted_r_squared: f64,
    pub rmse: f64,
    pub f_test: FTest,
    pub vif: IndexMap<String, f64>,
    pub interpretation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolynomialRegression {
    pub predictor: String,
    pub n: usize,
    /// Intercept, linear and quadratic terms.
    pub coefficients: [f64; 3],
    pub r_squared: f64,
    pub adjusted_r_squared: f64,
    pub linear_r_squared: f64,
    pub nonlinear: bool,
    /// Turning point of the parabola when it falls inside the observed range.
    pub vertex: Option<f64>,
    pub interpretation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RobustRegression {
    pub predictors: Vec<String>,
    pub n: usize,
    pub coefficients: IndexMap<String, f64>,
    pub iterations: usize,
    pub converged: bool,
    /// Rows whose final Huber weight is below 1.
    pub down_weighted: usize,
    pub r_squared: f64,
    pub interpretation: String,
}

/// Complete-case design for one target and its predictors.
#[derive(Debug, Clone)]
pub struct RegressionData {
    pub target: String,
    pub predictors: Vec<String>,
    /// Row index (in the analyzed dataset) of each observation.
    pub rows: Vec<usize>,
    pub y: Vec<f64>,
    /// Column-major predictor values.
    pub x: Vec<Vec<f64>>,
}

impl RegressionData {
    pub fn n(&self) -> usize {
        self.y.len()
    }

    /// Keep rows where the target and every predictor are present.
    pub fn complete_cases(
        target: &str,
        target_values: &[Option<f64>],
        predictors: &[(String, Vec<Option<f64>>)],
    ) -> Self {
        let mut data = Self {
            target: target.to_string(),
            predictors: predictors.iter().map(|(n, _)| n.clone()).collect(),
            rows: Vec::new(),
            y: Vec::new(),
            x: vec![Vec::new(); predictors.len()],
        };
        'rows: for (row, y) in target_values.iter().enumerate() {
            let Some(y) = y else { continue };
            let mut values = Vec::with_capacity(predictors.len());
            for (_, column) in predictors {
                match column.get(row).copied().flatten() {
                    Some(v) => values.push(v),
                    None => continue 'rows,
                }
            }
            data.rows.push(row);
            data.y.push(*y);
            for (col, v) in data.x.iter_mut().zip(values) {
                col.push(v);
            }
        }
        data
    }
}

fn rmse(sse: f64, n: usize) -> f64 {
    if n == 0 {
        0.0
    } else {
        (sse / n as f64).sqrt()
    }
}

fn total_ss(y: &[f64]) -> f64 {
    let m = mean(y);
    y.iter().map(|v| (v - m).powi(2)).sum()
}

/// Closed-form OLS of `y` on one predictor with t and F tests.
pub fn simple(target: &str, predictor: &str, x: &[f64], y: &[f64]) -> Analysis<SimpleRegression> {
    let n = x.len();
    if n < 3 {
        return Analysis::not_applicable("needs at least 3 paired rows");
    }
    let mx = mean(x);
    let my = mean(y);
    let sxx: f64 = x.iter().map(|v| (v - mx).powi(2)).sum();
    if sxx <= f64::EPSILON {
        return Analysis::not_applicable(format!("{predictor} is constant"));
    }
    let sxy: f64 = x.iter().zip(y).map(|(a, b)| (a - mx) * (b - my)).sum();
    let slope = sxy / sxx;
    let intercept = my - slope * mx;
    let fitted: Vec<f64> = x.iter().map(|v| intercept + slope * v).collect();
    let sse: f64 = y.iter().zip(&fitted).map(|(a, b)| (a - b).powi(2)).sum();
    let sst = total_ss(y);
    let r2 = r_squared(y, &fitted).clamp(0.0, 1.0);

    let df = (n - 2) as f64;
    let s2 = sse / df;
    let se_slope = (s2 / sxx).sqrt();
    let se_intercept = (s2 * (1.0 / n as f64 + mx * mx / sxx)).sqrt();

    Analysis::Complete(SimpleRegression {
        predictor: predictor.to_string(),
        n,
        slope,
        intercept,
        r_squared: r2,
        adjusted_r_squared: adjusted_r_squared(r2, n, 1),
        rmse: rmse(sse, n),
        coefficients: vec![
            Coefficient::new("intercept", intercept, se_intercept, df),
            Coefficient::new(predictor, slope, se_slope, df),
        ],
        f_test: FTest::new((sst - sse).max(0.0), sse, 1, n - 2),
        interpretation: format!(
            "Each unit increase in {predictor} changes {target} by {slope:.4} on average; \
             {predictor} explains {:.1}% of the variance",
            r2 * 100.0
        ),
    })
}

/// Predictors whose coefficient p-value is below alpha, intercept excluded.
fn significant_names(coefficients: &[Coefficient]) -> Vec<&str> {
    coefficients
        .iter()
        .skip(1)
        .filter(|c| c.significant)
        .map(|c| c.name.as_str())
        .collect()
}

/// VIF of each predictor from regressing it on the others.
pub fn variance_inflation(names: &[String], x: &[Vec<f64>]) -> IndexMap<String, f64> {
    let mut out = IndexMap::new();
    for (j, name) in names.iter().enumerate() {
        let others: Vec<Vec<f64>> = x
            .iter()
            .enumerate()
            .filter(|(k, _)| *k != j)
            .map(|(_, c)| c.clone())
            .collect();
        let vif = if others.is_empty() {
            1.0
        } else {
            match least_squares(&design_matrix(&others, true), &x[j]) {
                Ok(fit) => {
                    let r2 = r_squared(&x[j], &fit.fitted).clamp(0.0, 1.0);
                    1.0 / (1.0 - r2).max(1e-9)
                }
                Err(_) => 1e9,
            }
        };
        out.insert(name.clone(), vif);
    }
    out
}

/// OLS on every predictor at once. Returns the fit as well so the caller can
/// run residual diagnostics without refitting.
pub fn multiple(data: &RegressionData) -> Result<(MultipleRegression, LeastSquaresFit)> {
    let n = data.n();
    let k = data.predictors.len();
    if n <= k + 1 {
        return Err(TabulaError::InvalidInput(format!(
            "{n} rows cannot support {k} predictors"
        )));
    }
    let fit = least_squares(&design_matrix(&data.x, true), &data.y)?;
    let sse = fit.sse();
    let sst = total_ss(&data.y);
    let r2 = r_squared(&data.y, &fit.fitted).clamp(0.0, 1.0);
    let df = (n - k - 1) as f64;
    let s2 = sse / df;

    let names: Vec<&str> = std::iter::once("intercept")
        .chain(data.predictors.iter().map(String::as_str))
        .collect();
    let coefficients: Vec<Coefficient> = names
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let se = (s2 * fit.xtx_inv[(j, j)]).max(0.0).sqrt();
            Coefficient::new(name, fit.coefficients[j], se, df)
        })
        .collect();
    let significant = significant_names(&coefficients);
    let interpretation = format!(
        "{k} predictors explain {:.1}% of the variance in {}; significant: {}",
        r2 * 100.0,
        data.target,
        if significant.is_empty() {
            "none".to_string()
        } else {
            significant.join(", ")
        }
    );

    Ok((
        MultipleRegression {
            predictors: data.predictors.clone(),
            n,
            r_squared: r2,
            adjusted_r_squared: adjusted_r_squared(r2, n, k),
            rmse: rmse(sse, n),
            f_test: FTest::new((sst - sse).max(0.0), sse, k, n - k - 1),
            vif: variance_inflation(&data.predictors, &data.x),
            coefficients,
            interpretation,
        },
        fit,
    ))
}

/// Degree-2 fit on one predictor, compared against the straight line.
///
/// The fit runs on the standardized predictor so that large raw values
/// (epoch seconds, numeric ids) do not make `[1, x, x²]` numerically
/// singular. Coefficients are mapped back to the original scale.
pub fn polynomial(target: &str, predictor: &str, x: &[f64], y: &[f64]) -> Result<PolynomialRegression> {
    let n = x.len();
    if n < 4 {
        return Err(TabulaError::InvalidInput("needs at least 4 rows".into()));
    }
    let (m, sd) = (mean(x), std_dev(x));
    if sd.is_nan() || sd <= 0.0 {
        return Err(TabulaError::InvalidInput(format!("{predictor} is constant")));
    }
    let z: Vec<f64> = x.iter().map(|v| (v - m) / sd).collect();
    let squared: Vec<f64> = z.iter().map(|v| v * v).collect();
    let fit = least_squares(&design_matrix(&[z.clone(), squared], true), y)?;
    let r2 = r_squared(y, &fit.fitted).clamp(0.0, 1.0);
    let linear = least_squares(&design_matrix(&[z], true), y)?;
    let linear_r2 = r_squared(y, &linear.fitted).clamp(0.0, 1.0);

    let [alpha, beta, gamma] = [fit.coefficients[0], fit.coefficients[1], fit.coefficients[2]];
    let c = gamma / (sd * sd);
    let b = beta / sd - 2.0 * gamma * m / (sd * sd);
    let a = alpha - beta * m / sd + gamma * m * m / (sd * sd);
    let (lo, hi) = x
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(l, h), &v| (l.min(v), h.max(v)));
    let vertex = if gamma.abs() > f64::EPSILON {
        Some(m - beta / (2.0 * gamma) * sd).filter(|v| *v >= lo && *v <= hi)
    } else {
        None
    };
    let nonlinear = r2 - linear_r2 > NONLINEAR_GAIN;

    let mut interpretation = if nonlinear {
        format!(
            "{target} responds non-linearly to {predictor}: the quadratic term lifts R² from {linear_r2:.3} to {r2:.3}"
        )
    } else {
        format!("A straight line describes {target} against {predictor} about as well as a curve")
    };
    if let Some(v) = vertex {
        let turn = if c < 0.0 { "peaks" } else { "bottoms out" };
        interpretation.push_str(&format!("; the curve {turn} at {predictor} = {v:.3}"));
    }

    Ok(PolynomialRegression {
        predictor: predictor.to_string(),
        n,
        coefficients: [a, b, c],
        r_squared: r2,
        adjusted_r_squared: adjusted_r_squared(r2, n, 2),
        linear_r_squared: linear_r2,
        nonlinear,
        vertex,
        interpretation,
    })
}

/// Huber M-estimation by iteratively reweighted least squares.
///
/// Residual scale is MAD / 0.6745; rows with |r| above 1.345 scales get
/// weight k / |r|. Stops after 20 iterations or when no coefficient moves
/// more than the tolerance.
pub fn robust(data: &RegressionData, cancel: &CancelToken) -> Result<RobustRegression> {
    let n = data.n();
    let x = design_matrix(&data.x, true);
    let mut beta = least_squares(&x, &data.y)?.coefficients;
    let mut weights = vec![1.0; n];
    let mut iterations = 0;
    let mut converged = false;

    while iterations < HUBER_MAX_ITERATIONS {
        if cancel.is_cancelled() {
            return Err(TabulaError::Cancelled);
        }
        iterations += 1;
        let fitted = &x * nalgebra::DVector::from_column_slice(&beta);
        let residuals: Vec<f64> = data.y.iter().zip(fitted.iter()).map(|(a, b)| a - b).collect();
        let scale = mad(&residuals) / 0.6745;
        if scale <= f64::EPSILON {
            converged = true;
            break;
        }
        let k = HUBER_K * scale;
        weights = residuals
            .iter()
            .map(|r| if r.abs() <= k { 1.0 } else { k / r.abs() })
            .collect();
        let next = weighted_least_squares(&x, &data.y, &weights)?;
        let shift = next
            .iter()
            .zip(&beta)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        beta = next;
        if shift < HUBER_TOLERANCE {
            converged = true;
            break;
        }
    }

    let fitted = &x * nalgebra::DVector::from_column_slice(&beta);
    let fitted: Vec<f64> = fitted.iter().copied().collect();
    let down_weighted = weights.iter().filter(|w| **w < 1.0).count();
    let mut coefficients = IndexMap::new();
    coefficients.insert("intercept".to_string(), beta[0]);
    for (name, b) in data.predictors.iter().zip(&beta[1..]) {
        coefficients.insert(name.clone(), *b);
    }

    Ok(RobustRegression {
        predictors: data.predictors.clone(),
        n,
        coefficients,
        iterations,
        converged,
        down_weighted,
        r_squared: r_squared(&data.y, &fitted).clamp(0.0, 1.0),
        interpretation: format!(
            "Huber regression down-weighted {down_weighted} of {n} rows as outliers{}",
            if converged { "" } else { " (did not converge)" }
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> (Vec<f64>, Vec<f64>) {
        let x: Vec<f64> = (1..=n).map(|i| i as f64).collect();
        let y = x.iter().map(|v| 2.0 * v + 5.0).collect();
        (x, y)
    }

    #[test]
    fn exact_line_recovers_coefficients() {
        let (x, y) = line(50);
        let fit = simple("y", "x", &x, &y).into_complete().unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-6);
        assert!((fit.intercept - 5.0).abs() < 1e-6);
        assert!((fit.r_squared - 1.0).abs() < 1e-6);
        assert!(fit.f_test.p_value < 0.05);
        assert!(fit.f_test.significant);
    }

    #[test]
    fn noisy_line_has_finite_tests() {
        let (x, mut y) = line(40);
        for (i, v) in y.iter_mut().enumerate() {
            *v += if i % 2 == 0 { 1.5 } else { -1.5 };
        }
        let fit = simple("y", "x", &x, &y).into_complete().unwrap();
        let t = fit.coefficients[1].t_statistic.unwrap();
        assert!(t > 10.0);
        assert!(fit.f_test.statistic.unwrap() > 100.0);
        assert!(fit.r_squared < 1.0);
    }

    #[test]
    fn constant_predictor_not_applicable() {
        let y: Vec<f64> = (0..30).map(f64::from).collect();
        assert!(!simple("y", "x", &[4.0; 30], &y).is_applicable());
    }

    #[test]
    fn multiple_regression_with_vif() {
        let n = 60;
        let a: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let b: Vec<f64> = (0..n).map(|i| ((i * 17) % 13) as f64).collect();
        let y: Vec<f64> = a
            .iter()
            .zip(&b)
            .enumerate()
            .map(|(i, (a, b))| 3.0 * a - 2.0 * b + 1.0 + ((i % 3) as f64 - 1.0) * 0.1)
            .collect();
        let data = RegressionData {
            target: "y".into(),
            predictors: vec!["a".into(), "b".into()],
            rows: (0..n).collect(),
            y,
            x: vec![a, b],
        };
        let (model, fit) = multiple(&data).unwrap();
        assert!((model.coefficients[1].estimate - 3.0).abs() < 0.01);
        assert!((model.coefficients[2].estimate + 2.0).abs() < 0.01);
        assert!(model.r_squared > 0.99);
        assert!(model.vif["a"] < 2.0);
        assert_eq!(fit.residuals.len(), n);
    }

    #[test]
    fn collinear_predictors_are_singular() {
        let a: Vec<f64> = (0..30).map(f64::from).collect();
        let b: Vec<f64> = a.iter().map(|v| v * 2.0).collect();
        let data = RegressionData {
            target: "y".into(),
            predictors: vec!["a".into(), "b".into()],
            rows: (0..30).collect(),
            y: a.iter().map(|v| v + 1.0).collect(),
            x: vec![a, b],
        };
        assert!(matches!(multiple(&data), Err(TabulaError::SingularMatrix)));
    }

    #[test]
    fn polynomial_detects_curvature_and_vertex() {
        let x: Vec<f64> = (0..41).map(|i| i as f64 / 2.0 - 10.0).collect();
        let y: Vec<f64> = x.iter().map(|v| 50.0 - (v - 2.0).powi(2)).collect();
        let poly = polynomial("y", "x", &x, &y).unwrap();
        assert!(poly.nonlinear);
        assert!((poly.vertex.unwrap() - 2.0).abs() < 1e-6);
        assert!(poly.r_squared > 0.999);
        let [a, b, c] = poly.coefficients;
        assert!((c + 1.0).abs() < 1e-9);
        assert!((b - 4.0).abs() < 1e-9);
        assert!((a - 46.0).abs() < 1e-9);
    }

    #[test]
    fn polynomial_handles_epoch_scale_predictor() {
        let t: Vec<f64> = (-30..30).map(f64::from).collect();
        let x: Vec<f64> = t.iter().map(|v| 1.7e9 + v).collect();
        let y: Vec<f64> = t.iter().map(|v| 3.0 + 0.5 * v * v).collect();
        let poly = polynomial("y", "ts", &x, &y).unwrap();
        assert!(poly.r_squared > 0.999);
        assert!(poly.nonlinear);
        assert!((poly.coefficients[2] - 0.5).abs() < 1e-6);
        let vertex = poly.vertex.unwrap();
        assert!((vertex - 1.7e9).abs() < 1e-3, "vertex {vertex}");
    }

    #[test]
    fn huber_resists_a_gross_outlier() {
        let (x, mut y) = line(40);
        for (i, v) in y.iter_mut().enumerate() {
            *v += ((i * 7) % 5) as f64 * 0.2 - 0.4;
        }
        y[20] += 500.0;
        let data = RegressionData {
            target: "y".into(),
            predictors: vec!["x".into()],
            rows: (0..40).collect(),
            y,
            x: vec![x],
        };
        let fit = robust(&data, &CancelToken::new()).unwrap();
        assert!((fit.coefficients["x"] - 2.0).abs() < 0.1);
        assert!(fit.down_weighted >= 1);
        assert!(fit.iterations <= HUBER_MAX_ITERATIONS);
    }

    #[test]
    fn complete_cases_drop_missing_rows() {
        let target = vec![Some(1.0), None, Some(3.0), Some(4.0)];
        let predictors = vec![("a".to_string(), vec![Some(1.0), Some(2.0), None, Some(4.0)])];
        let data = RegressionData::complete_cases("y", &target, &predictors);
        assert_eq!(data.rows, vec![0, 3]);
        assert_eq!(data.x[0], vec![1.0, 4.0]);
    }
}

//! Least squares via singular value decomposition.
//!
//! The SVD path replaces normal-equation inversion: rank deficiency shows
//! up as a vanishing singular value and is reported as
//! [`TabulaError::SingularMatrix`] instead of producing garbage estimates.

use nalgebra::{DMatrix, DVector};

use tabula_core::{Result, TabulaError};

/// Ratio between smallest and largest singular value below which the design
/// is treated as rank deficient.
const RCOND: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct LeastSquaresFit {
    pub coefficients: Vec<f64>,
    pub fitted: Vec<f64>,
    pub residuals: Vec<f64>,
    /// Unscaled covariance (XᵀX)⁻¹.
    pub xtx_inv: DMatrix<f64>,
    /// Diagonal of the hat matrix.
    pub leverage: Vec<f64>,
}

impl LeastSquaresFit {
    pub fn sse(&self) -> f64 {
        self.residuals.iter().map(|r| r * r).sum()
    }
}

/// Build a row-major design matrix from feature columns, optionally
/// prepending an intercept column of ones.
pub fn design_matrix(columns: &[Vec<f64>], intercept: bool) -> DMatrix<f64> {
    let n = columns.first().map_or(0, Vec::len);
    let p = columns.len() + usize::from(intercept);
    DMatrix::from_fn(n, p, |i, j| {
        if intercept {
            if j == 0 {
                1.0
            } else {
                columns[j - 1][i]
            }
        } else {
            columns[j][i]
        }
    })
}

/// Solve `min ||Xb - y||²`.
pub fn least_squares(x: &DMatrix<f64>, y: &[f64]) -> Result<LeastSquaresFit> {
    let (n, p) = x.shape();
    if n != y.len() {
        return Err(TabulaError::InvalidInput(format!(
            "design has {n} rows but target has {}",
            y.len()
        )));
    }
    if n < p || p == 0 {
        return Err(TabulaError::InvalidInput(format!(
            "need at least {p} observations for {p} parameters, got {n}"
        )));
    }
    if x.iter().chain(y).any(|v| !v.is_finite()) {
        return Err(TabulaError::Calculation("non-finite value in regression input".into()));
    }

    let svd = x.clone().svd(true, true);
    let s = &svd.singular_values;
    let s_max = s.max();
    let s_min = s.min();
    if s_max <= 0.0 || s_min <= s_max * RCOND {
        return Err(TabulaError::SingularMatrix);
    }

    let y_vec = DVector::from_column_slice(y);
    let beta = svd
        .solve(&y_vec, s_max * RCOND)
        .map_err(|e| TabulaError::Calculation(e.to_string()))?;

    let v_t = svd
        .v_t
        .as_ref()
        .ok_or_else(|| TabulaError::Calculation("SVD did not produce V".into()))?;
    let u = svd
        .u
        .as_ref()
        .ok_or_else(|| TabulaError::Calculation("SVD did not produce U".into()))?;

    let inv_s2 = DMatrix::from_diagonal(&s.map(|v| 1.0 / (v * v)));
    let xtx_inv = v_t.transpose() * inv_s2 * v_t;

    let leverage: Vec<f64> = (0..n).map(|i| u.row(i).norm_squared()).collect();
    let fitted_vec = x * &beta;
    let fitted: Vec<f64> = fitted_vec.iter().copied().collect();
    let residuals: Vec<f64> = y.iter().zip(&fitted).map(|(a, b)| a - b).collect();

    Ok(LeastSquaresFit {
        coefficients: beta.iter().copied().collect(),
        fitted,
        residuals,
        xtx_inv,
        leverage,
    })
}

/// Weighted least squares by row scaling with `sqrt(w)`. Returned fitted
/// values and residuals are on the original (unweighted) scale.
pub fn weighted_least_squares(x: &DMatrix<f64>, y: &[f64], weights: &[f64]) -> Result<Vec<f64>> {
    let (n, _) = x.shape();
    if weights.len() != n {
        return Err(TabulaError::InvalidInput("weight count does not match rows".into()));
    }
    let mut xw = x.clone();
    let mut yw = Vec::with_capacity(n);
    for i in 0..n {
        let sw = weights[i].max(0.0).sqrt();
        xw.row_mut(i).scale_mut(sw);
        yw.push(y[i] * sw);
    }
    least_squares(&xw, &yw).map(|fit| fit.coefficients)
}

/// R² from observed and fitted values.
pub fn r_squared(y: &[f64], fitted: &[f64]) -> f64 {
    let n = y.len();
    if n == 0 {
        return 0.0;
    }
    let my = y.iter().sum::<f64>() / n as f64;
    let ss_tot: f64 = y.iter().map(|v| (v - my).powi(2)).sum();
    let ss_res: f64 = y.iter().zip(fitted).map(|(a, b)| (a - b).powi(2)).sum();
    if ss_tot <= f64::EPSILON {
        return if ss_res <= f64::EPSILON { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Adjusted R² for `p` predictors (excluding intercept).
pub fn adjusted_r_squared(r2: f64, n: usize, p: usize) -> f64 {
    if n <= p + 1 {
        return r2;
    }
    1.0 - (1.0 - r2) * (n as f64 - 1.0) / (n as f64 - p as f64 - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_exact_plane() {
        let x1: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let x2: Vec<f64> = (0..20).map(|i| ((i * 7) % 5) as f64).collect();
        let y: Vec<f64> = x1.iter().zip(&x2).map(|(a, b)| 1.0 + 2.0 * a - 3.0 * b).collect();
        let x = design_matrix(&[x1, x2], true);
        let fit = least_squares(&x, &y).unwrap();
        assert!((fit.coefficients[0] - 1.0).abs() < 1e-8);
        assert!((fit.coefficients[1] - 2.0).abs() < 1e-8);
        assert!((fit.coefficients[2] + 3.0).abs() < 1e-8);
        assert!(fit.sse() < 1e-12);
        // Leverages sum to the number of parameters.
        let total: f64 = fit.leverage.iter().sum();
        assert!((total - 3.0).abs() < 1e-8);
    }

    #[test]
    fn collinear_design_is_singular() {
        let x1: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let x2: Vec<f64> = x1.iter().map(|v| v * 2.0).collect();
        let y: Vec<f64> = x1.iter().map(|v| v + 1.0).collect();
        let x = design_matrix(&[x1, x2], true);
        assert!(matches!(least_squares(&x, &y), Err(TabulaError::SingularMatrix)));
    }

    #[test]
    fn xtx_inverse_matches_closed_form() {
        let x1: Vec<f64> = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let y = vec![2.0, 4.1, 5.9, 8.2, 9.9];
        let x = design_matrix(&[x1.clone()], true);
        let fit = least_squares(&x, &y).unwrap();
        // Var(slope) factor = 1 / Sxx = 1 / 10
        assert!((fit.xtx_inv[(1, 1)] - 0.1).abs() < 1e-10);
    }

    #[test]
    fn weights_downplay_outlier() {
        let x1: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let mut y: Vec<f64> = x1.iter().map(|v| 2.0 * v).collect();
        y[9] = 100.0;
        let x = design_matrix(&[x1], true);
        let mut w = vec![1.0; 10];
        w[9] = 0.0;
        let beta = weighted_least_squares(&x, &y, &w).unwrap();
        assert!((beta[1] - 2.0).abs() < 1e-8);
    }

    #[test]
    fn adjusted_r2_penalizes_predictors() {
        assert!(adjusted_r_squared(0.8, 30, 5) < 0.8);
        assert_eq!(adjusted_r_squared(0.8, 3, 5), 0.8);
    }
}

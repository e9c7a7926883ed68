//! Residual diagnostics for the selected regression model.

use serde::{Deserialize, Serialize};

use tabula_core::{Analysis, Result, TabulaError};

use crate::algorithms::descriptive::fit_line;
use crate::algorithms::linalg::LeastSquaresFit;
use crate::algorithms::normality::{shapiro_wilk, TestResult, ALPHA};
use crate::algorithms::probability::chi_square_sf;

/// Influential rows listed in the report are capped at this many.
const MAX_INFLUENTIAL_ROWS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Homoscedasticity {
    /// Breusch-Pagan LM = n * R² of squared residuals on fitted values.
    pub lm_statistic: f64,
    pub p_value: f64,
    pub heteroscedastic: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Autocorrelation {
    Positive,
    Negative,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Independence {
    pub durbin_watson: f64,
    pub autocorrelation: Autocorrelation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfluentialPoint {
    pub row: usize,
    pub cooks_distance: f64,
    pub leverage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Influence {
    pub cooks_threshold: f64,
    pub leverage_threshold: f64,
    pub influential_count: usize,
    /// Largest Cook's distance first.
    pub points: Vec<InfluentialPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidualDiagnostics {
    pub normality: Analysis<TestResult>,
    pub homoscedasticity: Homoscedasticity,
    pub independence: Independence,
    pub influence: Influence,
    pub issues: Vec<String>,
}

pub fn durbin_watson(residuals: &[f64]) -> f64 {
    let ss: f64 = residuals.iter().map(|r| r * r).sum();
    if ss <= f64::EPSILON {
        return 2.0;
    }
    residuals
        .windows(2)
        .map(|w| (w[1] - w[0]).powi(2))
        .sum::<f64>()
        / ss
}

pub fn breusch_pagan(residuals: &[f64], fitted: &[f64]) -> Homoscedasticity {
    let squared: Vec<f64> = residuals.iter().map(|r| r * r).collect();
    let aux_r2 = fit_line(fitted, &squared).map_or(0.0, |f| f.r_squared);
    let lm = residuals.len() as f64 * aux_r2;
    let p_value = chi_square_sf(lm, 1.0);
    Homoscedasticity {
        lm_statistic: lm,
        p_value,
        heteroscedastic: p_value < ALPHA,
    }
}

/// Diagnose a least-squares fit with `p` parameters (intercept included).
/// `rows` maps each observation back to its dataset row.
pub fn diagnose(fit: &LeastSquaresFit, p: usize, rows: &[usize]) -> Result<ResidualDiagnostics> {
    let n = fit.residuals.len();
    if n <= p {
        return Err(TabulaError::InvalidInput("no residual degrees of freedom".into()));
    }
    let sse = fit.sse();
    let mse = sse / (n - p) as f64;
    if !mse.is_finite() {
        return Err(TabulaError::Calculation("non-finite residual variance".into()));
    }

    let standardized: Vec<f64> = fit
        .residuals
        .iter()
        .zip(&fit.leverage)
        .map(|(r, h)| r / (mse * (1.0 - h).max(1e-12)).sqrt())
        .collect();
    let normality = if mse <= f64::EPSILON {
        Analysis::not_applicable("residuals vanish: exact fit")
    } else {
        shapiro_wilk(&standardized)
            .map_or_else(|| Analysis::not_applicable("too few residuals"), Analysis::Complete)
    };

    let homoscedasticity = breusch_pagan(&fit.residuals, &fit.fitted);
    let dw = durbin_watson(&fit.residuals);
    let independence = Independence {
        durbin_watson: dw,
        autocorrelation: if dw < 1.5 {
            Autocorrelation::Positive
        } else if dw > 2.5 {
            Autocorrelation::Negative
        } else {
            Autocorrelation::None
        },
    };

    let cooks_threshold = 4.0 / n as f64;
    let leverage_threshold = 2.0 * p as f64 / n as f64;
    let mut points: Vec<InfluentialPoint> = fit
        .residuals
        .iter()
        .zip(&fit.leverage)
        .enumerate()
        .filter_map(|(i, (r, h))| {
            let one_minus = (1.0 - h).max(1e-12);
            let cooks = if mse <= f64::EPSILON {
                0.0
            } else {
                r * r / (p as f64 * mse) * h / (one_minus * one_minus)
            };
            (cooks > cooks_threshold || *h > leverage_threshold).then(|| InfluentialPoint {
                row: rows.get(i).copied().unwrap_or(i),
                cooks_distance: cooks,
                leverage: *h,
            })
        })
        .collect();
    points.sort_by(|a, b| b.cooks_distance.total_cmp(&a.cooks_distance).then(a.row.cmp(&b.row)));
    let influential_count = points.len();
    points.truncate(MAX_INFLUENTIAL_ROWS);

    let mut issues = Vec::new();
    if normality.as_complete().is_some_and(|t| t.rejected) {
        issues.push("residuals are not normally distributed".to_string());
    }
    if homoscedasticity.heteroscedastic {
        issues.push("residual variance changes with the fitted value".to_string());
    }
    match independence.autocorrelation {
        Autocorrelation::Positive => issues.push("residuals are positively autocorrelated".into()),
        Autocorrelation::Negative => issues.push("residuals are negatively autocorrelated".into()),
        Autocorrelation::None => {}
    }
    if influential_count > 0 {
        issues.push(format!("{influential_count} influential observations"));
    }

    Ok(ResidualDiagnostics {
        normality,
        homoscedasticity,
        independence,
        influence: Influence {
            cooks_threshold,
            leverage_threshold,
            influential_count,
            points,
        },
        issues,
    })
}

//! Stationarity checks: simplified ADF and KPSS, plus a sliding-window scan
//! for structural breaks in the level.

use serde::{Deserialize, Serialize};

use crate::algorithms::descriptive::{mean, variance};
use crate::pipeline::modeling::regression;

/// 5% critical value of the ADF t-statistic (constant, no trend).
pub const ADF_CRITICAL: f64 = -2.86;
/// 5% critical value of the level-KPSS statistic.
pub const KPSS_CRITICAL: f64 = 0.463;
/// |t| between adjacent windows above which a level shift is reported.
pub const BREAK_T: f64 = 2.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Verdict {
    Stationary,
    NonStationary,
    /// The two tests disagree.
    Inconclusive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stationarity {
    pub adf_statistic: Option<f64>,
    pub adf_critical: f64,
    pub adf_stationary: bool,
    pub kpss_statistic: f64,
    pub kpss_critical: f64,
    pub kpss_stationary: bool,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralBreak {
    /// Position in the time-ordered series where the new level starts.
    pub index: usize,
    pub t_statistic: f64,
    pub mean_before: f64,
    pub mean_after: f64,
}

/// t-statistic of β in Δy_t = α + β·y_{t-1} + ε.
pub fn adf_statistic(y: &[f64]) -> Option<f64> {
    if y.len() < 4 {
        return None;
    }
    let lagged = &y[..y.len() - 1];
    let diffs: Vec<f64> = y.windows(2).map(|w| w[1] - w[0]).collect();
    let fit = regression::simple("diff", "lag", lagged, &diffs).into_complete()?;
    fit.coefficients.get(1).and_then(|c| c.t_statistic)
}

/// Level KPSS with a Bartlett-weighted long-run variance.
pub fn kpss_statistic(y: &[f64]) -> f64 {
    let n = y.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(y);
    let e: Vec<f64> = y.iter().map(|v| v - m).collect();
    let nf = n as f64;
    let lags = (4.0 * (nf / 100.0).powf(0.25)).floor() as usize;
    let mut long_run = e.iter().map(|v| v * v).sum::<f64>() / nf;
    for l in 1..=lags.min(n - 1) {
        let w = 1.0 - l as f64 / (lags as f64 + 1.0);
        let cov: f64 = (l..n).map(|t| e[t] * e[t - l]).sum::<f64>() / nf;
        long_run += 2.0 * w * cov;
    }
    if long_run <= f64::EPSILON {
        return 0.0;
    }
    let mut partial = 0.0;
    let sum_sq: f64 = e
        .iter()
        .map(|v| {
            partial += v;
            partial * partial
        })
        .sum();
    sum_sq / (nf * nf * long_run)
}

pub fn assess(y: &[f64]) -> Stationarity {
    let adf = adf_statistic(y);
    let kpss = kpss_statistic(y);
    let adf_stationary = adf.is_some_and(|t| t < ADF_CRITICAL);
    let kpss_stationary = kpss < KPSS_CRITICAL;
    let verdict = match (adf_stationary, kpss_stationary) {
        (true, true) => Verdict::Stationary,
        (false, false) => Verdict::NonStationary,
        _ => Verdict::Inconclusive,
    };
    Stationarity {
        adf_statistic: adf,
        adf_critical: ADF_CRITICAL,
        adf_stationary,
        kpss_statistic: kpss,
        kpss_critical: KPSS_CRITICAL,
        kpss_stationary,
        verdict,
    }
}

fn welch_t(a: &[f64], b: &[f64]) -> f64 {
    let se = (variance(a) / a.len() as f64 + variance(b) / b.len() as f64).sqrt();
    let diff = mean(b) - mean(a);
    if se <= f64::EPSILON {
        if diff.abs() <= f64::EPSILON {
            0.0
        } else {
            f64::MAX.copysign(diff)
        }
    } else {
        diff / se
    }
}

/// Compare the windows either side of every position; each run of
/// positions above the threshold reports its strongest point.
pub fn structural_breaks(y: &[f64]) -> Vec<StructuralBreak> {
    let n = y.len();
    let w = 10usize.max(n / 10);
    if n < 2 * w {
        return Vec::new();
    }
    let mut breaks: Vec<StructuralBreak> = Vec::new();
    let mut last_flagged: Option<usize> = None;
    for i in w..=n - w {
        let before = &y[i - w..i];
        let after = &y[i..i + w];
        let t = welch_t(before, after);
        if t.abs() <= BREAK_T {
            continue;
        }
        let candidate = StructuralBreak {
            index: i,
            t_statistic: t,
            mean_before: mean(before),
            mean_after: mean(after),
        };
        match (last_flagged, breaks.last_mut()) {
            (Some(prev), Some(current)) if prev + 1 == i => {
                if t.abs() > current.t_statistic.abs() {
                    *current = candidate;
                }
            }
            _ => breaks.push(candidate),
        }
        last_flagged = Some(i);
    }
    breaks
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic pseudo-noise in [-1, 1].
    fn noise(n: usize) -> Vec<f64> {
        let mut state = 12345u64;
        (0..n)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((state >> 33) as f64 / (1u64 << 31) as f64) * 2.0 - 1.0
            })
            .collect()
    }

    #[test]
    fn white_noise_is_stationary() {
        let s = assess(&noise(200));
        assert!(s.adf_stationary, "adf = {:?}", s.adf_statistic);
        assert!(s.kpss_stationary, "kpss = {}", s.kpss_statistic);
        assert_eq!(s.verdict, Verdict::Stationary);
    }

    #[test]
    fn random_walk_is_not_stationary_by_kpss() {
        let mut level = 0.0;
        let walk: Vec<f64> = noise(300)
            .into_iter()
            .map(|e| {
                level += e + 0.3;
                level
            })
            .collect();
        let s = assess(&walk);
        assert!(!s.kpss_stationary);
        assert_ne!(s.verdict, Verdict::Stationary);
    }

    #[test]
    fn level_shift_is_found_once() {
        let mut y: Vec<f64> = noise(100).iter().map(|e| 10.0 + e).collect();
        y.extend(noise(100).iter().map(|e| 30.0 + e));
        let breaks = structural_breaks(&y);
        assert_eq!(breaks.len(), 1);
        assert!((breaks[0].index as i64 - 100).abs() <= 2);
        assert!(breaks[0].mean_after > breaks[0].mean_before);
    }

    #[test]
    fn short_series_has_no_breaks() {
        assert!(structural_breaks(&[1.0; 15]).is_empty());
    }
}

//! Individual outlier detectors.
//!
//! Each detector works on the valid values of one column and reports the
//! positions it flags. Gates (minimum n, zero MAD) surface as
//! `NotApplicable` so the consensus can tell "ran and found nothing" from
//! "did not run".

use serde::{Deserialize, Serialize};

use tabula_core::{Analysis, Result, TabulaError};

use crate::algorithms::descriptive::{mad, mean, median, quantile_sorted, sorted, std_dev};
use crate::algorithms::isolation_forest::{self, IsolationForestParams};
use crate::algorithms::normality::ALPHA;
use crate::algorithms::probability::t_quantile_upper;
use crate::execution::CancelToken;

pub const IQR_MILD: f64 = 1.5;
pub const IQR_EXTREME: f64 = 3.0;
pub const MODIFIED_Z_THRESHOLD: f64 = 3.5;
pub const MODIFIED_Z_EXTREME: f64 = 5.0;
pub const ESD_MIN_N: usize = 25;
/// ESD never removes more than this share of the column.
pub const ESD_MAX_SHARE: f64 = 0.1;
pub const ISOLATION_MIN_N: usize = 20;
pub const ISOLATION_THRESHOLD: f64 = 0.6;
pub const GRUBBS_MIN_N: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutlierMethod {
    Iqr,
    ModifiedZScore,
    GeneralizedEsd,
    IsolationForest,
    Grubbs,
}

impl OutlierMethod {
    pub const ALL: [OutlierMethod; 5] = [
        OutlierMethod::Iqr,
        OutlierMethod::ModifiedZScore,
        OutlierMethod::GeneralizedEsd,
        OutlierMethod::IsolationForest,
        OutlierMethod::Grubbs,
    ];

    pub fn key(self) -> &'static str {
        match self {
            OutlierMethod::Iqr => "iqr",
            OutlierMethod::ModifiedZScore => "modifiedZScore",
            OutlierMethod::GeneralizedEsd => "generalizedEsd",
            OutlierMethod::IsolationForest => "isolationForest",
            OutlierMethod::Grubbs => "grubbs",
        }
    }
}

/// Positions (into the value slice) a detector flagged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodFlags {
    pub flagged: Vec<usize>,
    /// Subset of `flagged` beyond the detector's extreme threshold.
    pub extreme: Vec<usize>,
    pub threshold: f64,
}

/// Tukey fences: mild beyond 1.5 IQR, extreme beyond 3 IQR.
pub fn iqr(values: &[f64]) -> Analysis<MethodFlags> {
    if values.len() < 4 {
        return Analysis::not_applicable("needs at least 4 values");
    }
    let s = sorted(values);
    let q1 = quantile_sorted(&s, 0.25);
    let q3 = quantile_sorted(&s, 0.75);
    let spread = q3 - q1;
    let mut out = MethodFlags {
        threshold: IQR_MILD,
        ..Default::default()
    };
    for (i, &v) in values.iter().enumerate() {
        if v < q1 - IQR_MILD * spread || v > q3 + IQR_MILD * spread {
            out.flagged.push(i);
            if v < q1 - IQR_EXTREME * spread || v > q3 + IQR_EXTREME * spread {
                out.extreme.push(i);
            }
        }
    }
    Analysis::Complete(out)
}

/// Iglewicz-Hoaglin modified z-score, M = 0.6745 (x - median) / MAD.
pub fn modified_z(values: &[f64]) -> Analysis<MethodFlags> {
    if values.len() < 3 {
        return Analysis::not_applicable("needs at least 3 values");
    }
    let med = median(values);
    let spread = mad(values);
    if spread <= f64::EPSILON {
        return Analysis::not_applicable("median absolute deviation is zero");
    }
    let mut out = MethodFlags {
        threshold: MODIFIED_Z_THRESHOLD,
        ..Default::default()
    };
    for (i, &v) in values.iter().enumerate() {
        let m = (0.6745 * (v - med) / spread).abs();
        if m > MODIFIED_Z_THRESHOLD {
            out.flagged.push(i);
            if m > MODIFIED_Z_EXTREME {
                out.extreme.push(i);
            }
        }
    }
    Analysis::Complete(out)
}

/// Critical value of the Grubbs/ESD statistic for a sample of `n`.
fn studentized_critical(n: usize) -> f64 {
    let nf = n as f64;
    let t = t_quantile_upper(ALPHA / (2.0 * nf), nf - 2.0);
    (nf - 1.0) * t / ((nf - 2.0 + t * t) * nf).sqrt()
}

fn most_deviant(values: &[f64], positions: &[usize]) -> Option<(usize, f64)> {
    let subset: Vec<f64> = positions.iter().map(|&p| values[p]).collect();
    let m = mean(&subset);
    let s = std_dev(&subset);
    if s <= f64::EPSILON {
        return None;
    }
    positions
        .iter()
        .enumerate()
        .map(|(k, &p)| (k, (values[p] - m).abs() / s))
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

/// Rosner's generalized ESD. Up to 10% of n candidates are removed one at a
/// time; the number of outliers is the largest step whose statistic beats
/// its critical value.
pub fn generalized_esd(values: &[f64], cancel: &CancelToken) -> Result<Analysis<MethodFlags>> {
    let n = values.len();
    if n < ESD_MIN_N {
        return Ok(Analysis::not_applicable(format!("needs at least {ESD_MIN_N} values")));
    }
    let max_outliers = ((n as f64 * ESD_MAX_SHARE).floor() as usize).max(1);
    let mut remaining: Vec<usize> = (0..n).collect();
    let mut removed = Vec::with_capacity(max_outliers);
    let mut significant = 0;

    for step in 1..=max_outliers {
        if cancel.is_cancelled() {
            return Err(TabulaError::Cancelled);
        }
        let Some((k, r)) = most_deviant(values, &remaining) else {
            break;
        };
        if r > studentized_critical(remaining.len()) {
            significant = step;
        }
        removed.push(remaining.swap_remove(k));
    }
    removed.truncate(significant);
    removed.sort_unstable();
    Ok(Analysis::Complete(MethodFlags {
        flagged: removed,
        extreme: Vec::new(),
        threshold: ALPHA,
    }))
}

pub fn isolation(
    values: &[f64],
    params: &IsolationForestParams,
    cancel: &CancelToken,
) -> Result<Analysis<MethodFlags>> {
    if values.len() < ISOLATION_MIN_N {
        return Ok(Analysis::not_applicable(format!(
            "needs at least {ISOLATION_MIN_N} values"
        )));
    }
    let scores = isolation_forest::score(values, params, cancel)?;
    Ok(Analysis::Complete(MethodFlags {
        flagged: scores
            .iter()
            .enumerate()
            .filter(|(_, s)| **s > ISOLATION_THRESHOLD)
            .map(|(i, _)| i)
            .collect(),
        extreme: Vec::new(),
        threshold: ISOLATION_THRESHOLD,
    }))
}

/// Two-sided Grubbs test on the single most deviant value.
pub fn grubbs(values: &[f64]) -> Analysis<MethodFlags> {
    let n = values.len();
    if n < GRUBBS_MIN_N {
        return Analysis::not_applicable(format!("needs at least {GRUBBS_MIN_N} values"));
    }
    let positions: Vec<usize> = (0..n).collect();
    let critical = studentized_critical(n);
    let flagged = match most_deviant(values, &positions) {
        Some((k, g)) if g > critical => vec![k],
        _ => Vec::new(),
    };
    Analysis::Complete(MethodFlags {
        flagged,
        extreme: Vec::new(),
        threshold: critical,
    })
}

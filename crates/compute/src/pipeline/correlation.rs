//! Pairwise association between numeric columns.

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use tabula_core::{Analysis, Dataset, Result, TabulaError};

use crate::algorithms::descriptive::{pearson, spearman};
use crate::algorithms::normality::ALPHA;
use crate::algorithms::probability::t_two_tailed;
use crate::execution::CancelToken;

pub const MIN_PAIRED_ROWS: usize = 10;

/// Pearson |r| at or below this is not reported.
const REPORT_THRESHOLD: f64 = 0.1;

const TOP_PAIRS: usize = 10;

/// Mean |r| is capped here before it is used as an R² proxy.
const MAX_R2_PROXY: f64 = 0.99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Strength {
    VeryStrong,
    Strong,
    Moderate,
    Weak,
    Negligible,
}

impl Strength {
    pub fn from_coefficient(r: f64) -> Self {
        match r.abs() {
            a if a >= 0.9 => Strength::VeryStrong,
            a if a >= 0.7 => Strength::Strong,
            a if a >= 0.5 => Strength::Moderate,
            a if a >= 0.3 => Strength::Weak,
            _ => Strength::Negligible,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    Positive,
    Negative,
    None,
}

impl Direction {
    pub fn of(r: f64) -> Self {
        if r > 0.0 {
            Direction::Positive
        } else if r < 0.0 {
            Direction::Negative
        } else {
            Direction::None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationPair {
    pub column_a: String,
    pub column_b: String,
    pub n: usize,
    pub pearson: f64,
    pub p_value: f64,
    pub significant: bool,
    pub spearman: f64,
    pub strength: Strength,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VifSeverity {
    Low,
    Moderate,
    Severe,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnVif {
    pub mean_abs_correlation: f64,
    pub vif: f64,
    pub severity: VifSeverity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Multicollinearity {
    pub columns: IndexMap<String, ColumnVif>,
    pub problematic: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationAnalysis {
    /// Pairs with |r| > 0.1, keyed `"a|b"` in column order.
    pub pairs: IndexMap<String, CorrelationPair>,
    /// Pearson r for every computable pair, reported or not.
    pub matrix: IndexMap<String, f64>,
    pub strongest: Vec<CorrelationPair>,
    pub multicollinearity: Analysis<Multicollinearity>,
}

pub fn pair_key(a: &str, b: &str) -> String {
    format!("{a}|{b}")
}

fn paired(a: &[Option<f64>], b: &[Option<f64>]) -> (Vec<f64>, Vec<f64>) {
    a.iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .unzip()
}

/// Correlate one pair of columns. `None` when too few rows pair up or
/// either side is constant.
pub fn correlate(name_a: &str, a: &[Option<f64>], name_b: &str, b: &[Option<f64>]) -> Option<CorrelationPair> {
    let (x, y) = paired(a, b);
    let n = x.len();
    if n < MIN_PAIRED_ROWS {
        return None;
    }
    let r = pearson(&x, &y)?;
    let rho = spearman(&x, &y).unwrap_or(0.0);
    let df = (n - 2) as f64;
    let p_value = if r.abs() >= 1.0 {
        0.0
    } else {
        t_two_tailed(r * (df / (1.0 - r * r)).sqrt(), df)
    };
    Some(CorrelationPair {
        column_a: name_a.to_string(),
        column_b: name_b.to_string(),
        n,
        pearson: r,
        p_value,
        significant: p_value < ALPHA,
        spearman: rho,
        strength: Strength::from_coefficient(rho),
        direction: Direction::of(rho),
    })
}

fn multicollinearity(columns: &[String], matrix: &IndexMap<String, f64>) -> Analysis<Multicollinearity> {
    if columns.len() < 3 {
        return Analysis::not_applicable("needs at least 3 numeric columns");
    }
    let lookup = |a: &str, b: &str| {
        matrix
            .get(&pair_key(a, b))
            .or_else(|| matrix.get(&pair_key(b, a)))
            .copied()
            .unwrap_or(0.0)
    };
    let mut out = IndexMap::new();
    let mut problematic = Vec::new();
    for c in columns {
        let others: Vec<f64> = columns
            .iter()
            .filter(|o| *o != c)
            .map(|o| lookup(c, o).abs())
            .collect();
        let mean_abs = others.iter().sum::<f64>() / others.len() as f64;
        let r2 = mean_abs.min(MAX_R2_PROXY);
        let vif = 1.0 / (1.0 - r2);
        let severity = if vif > 10.0 {
            VifSeverity::Severe
        } else if vif > 5.0 {
            VifSeverity::Moderate
        } else {
            VifSeverity::Low
        };
        if severity != VifSeverity::Low {
            problematic.push(c.clone());
        }
        out.insert(
            c.clone(),
            ColumnVif {
                mean_abs_correlation: mean_abs,
                vif,
                severity,
            },
        );
    }
    Analysis::Complete(Multicollinearity {
        columns: out,
        problematic,
    })
}

pub fn analyze(data: &Dataset, cancel: &CancelToken) -> Result<CorrelationAnalysis> {
    let columns = data.numeric_columns();
    let series: Vec<Vec<Option<f64>>> = columns.iter().map(|c| data.numeric_column(c)).collect();
    let pairs: Vec<(usize, usize)> = (0..columns.len())
        .flat_map(|i| (i + 1..columns.len()).map(move |j| (i, j)))
        .collect();

    let results: Vec<Option<CorrelationPair>> = pairs
        .par_iter()
        .map(|&(i, j)| {
            if cancel.is_cancelled() {
                return None;
            }
            correlate(&columns[i], &series[i], &columns[j], &series[j])
        })
        .collect();
    if cancel.is_cancelled() {
        return Err(TabulaError::Cancelled);
    }

    let mut matrix = IndexMap::new();
    let mut reported = IndexMap::new();
    for pair in results.into_iter().flatten() {
        let key = pair_key(&pair.column_a, &pair.column_b);
        matrix.insert(key.clone(), pair.pearson);
        if pair.pearson.abs() > REPORT_THRESHOLD {
            reported.insert(key, pair);
        }
    }

    let mut strongest: Vec<CorrelationPair> = reported.values().cloned().collect();
    strongest.sort_by(|a, b| {
        b.pearson
            .abs()
            .total_cmp(&a.pearson.abs())
            .then_with(|| a.column_a.cmp(&b.column_a))
            .then_with(|| a.column_b.cmp(&b.column_b))
    });
    strongest.truncate(TOP_PAIRS);

    Ok(CorrelationAnalysis {
        multicollinearity: multicollinearity(&columns, &matrix),
        pairs: reported,
        matrix,
        strongest,
    })
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;
    use tabula_core::{ColumnKind, ColumnType, FieldValue, Row};

    use super::*;

    fn dataset(n: usize) -> Dataset {
        let mut columns = IndexMap::new();
        for c in ["x", "double", "noise", "inverse"] {
            columns.insert(c.to_string(), ColumnType::new(ColumnKind::Float));
        }
        let rows: Vec<Row> = (0..n)
            .map(|i| {
                let x = i as f64;
                Row::from([
                    ("x".to_string(), FieldValue::from(x)),
                    ("double".to_string(), FieldValue::from(2.0 * x + 1.0)),
                    ("noise".to_string(), FieldValue::from(((i * 37) % 11) as f64)),
                    ("inverse".to_string(), FieldValue::from(-x * x)),
                ])
            })
            .collect();
        Dataset::new(rows, columns)
    }

    #[test]
    fn perfect_linear_pair() {
        let result = analyze(&dataset(30), &CancelToken::new()).unwrap();
        let pair = &result.pairs[&pair_key("x", "double")];
        assert!((pair.pearson - 1.0).abs() < 1e-12);
        assert!(pair.p_value < 1e-10);
        assert_eq!(pair.strength, Strength::VeryStrong);
        assert_eq!(pair.direction, Direction::Positive);
        assert_eq!(result.strongest[0].column_b, "double");
    }

    #[test]
    fn monotone_decreasing_has_negative_spearman() {
        let result = analyze(&dataset(30), &CancelToken::new()).unwrap();
        let pair = &result.pairs[&pair_key("x", "inverse")];
        assert!((pair.spearman + 1.0).abs() < 1e-12);
        assert_eq!(pair.direction, Direction::Negative);
    }

    #[test]
    fn too_few_rows_yield_no_pairs() {
        let result = analyze(&dataset(9), &CancelToken::new()).unwrap();
        assert!(result.pairs.is_empty());
        assert!(result.matrix.is_empty());
    }

    #[test]
    fn multicollinearity_flags_redundant_columns() {
        let result = analyze(&dataset(40), &CancelToken::new()).unwrap();
        let mc = result.multicollinearity.as_complete().unwrap();
        assert_eq!(mc.columns.len(), 4);
        assert!(mc.columns["x"].vif > 1.0);
    }

    #[test]
    fn strength_labels() {
        assert_eq!(Strength::from_coefficient(-0.95), Strength::VeryStrong);
        assert_eq!(Strength::from_coefficient(0.75), Strength::Strong);
        assert_eq!(Strength::from_coefficient(0.55), Strength::Moderate);
        assert_eq!(Strength::from_coefficient(0.35), Strength::Weak);
        assert_eq!(Strength::from_coefficient(0.1), Strength::Negligible);
    }
}

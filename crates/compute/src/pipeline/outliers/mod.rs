//! Outlier consensus across independent detectors.
//!
//! Every numeric column is screened by five gated methods (see [`methods`]).
//! Flags are aggregated per row, so two rows holding the same value keep
//! separate records, and the number of agreeing methods sets the
//! confidence tier. A contextual pass then looks at where the outliers sit.
//!
//! Sub-modules:
//! - the individual detectors ([`methods`])

pub mod methods;

use std::collections::BTreeMap;

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use tabula_core::{Analysis, Dataset, Result, TabulaError};

use crate::algorithms::descriptive::median;
use crate::algorithms::isolation_forest::IsolationForestParams;
use crate::execution::CancelToken;

pub use methods::{MethodFlags, OutlierMethod};

/// Shortest run of adjacent flagged rows reported as a cluster.
const MIN_RUN_LENGTH: usize = 3;

/// Outlier share above which a column is called out.
const HIGH_RATE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ConfidenceTier {
    pub fn from_method_count(count: usize) -> Self {
        match count {
            0 | 1 => ConfidenceTier::Low,
            2 => ConfidenceTier::Medium,
            3 => ConfidenceTier::High,
            _ => ConfidenceTier::VeryHigh,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlierRecord {
    /// Row index in the analyzed dataset.
    pub row: usize,
    pub value: f64,
    pub methods: Vec<OutlierMethod>,
    pub method_count: usize,
    pub confidence: ConfidenceTier,
    /// Beyond an extreme threshold (3 IQR or modified z above 5).
    pub extreme: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodSummary {
    pub flagged_count: usize,
    pub extreme_count: usize,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowRun {
    pub start_row: usize,
    pub end_row: usize,
    pub length: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutlierSide {
    Upper,
    Lower,
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlierContext {
    /// Runs of adjacent flagged rows: possible temporal anomalies.
    pub clustered_runs: Vec<RowRun>,
    pub side: Option<OutlierSide>,
    pub above_median: usize,
    pub below_median: usize,
    pub high_rate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnOutliers {
    pub valid_count: usize,
    pub methods: IndexMap<String, Analysis<MethodSummary>>,
    /// Most agreed-upon first.
    pub outliers: Vec<OutlierRecord>,
    pub outlier_rate: f64,
    pub context: OutlierContext,
}

impl ColumnOutliers {
    pub fn flagged_rows(&self) -> Vec<usize> {
        let mut rows: Vec<usize> = self.outliers.iter().map(|o| o.row).collect();
        rows.sort_unstable();
        rows
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlierAnalysis {
    pub columns: IndexMap<String, Analysis<ColumnOutliers>>,
    pub total_outliers: usize,
    /// Flagged cells over valid numeric cells, across all columns.
    pub overall_outlier_rate: f64,
}

struct Flag {
    value: f64,
    methods: Vec<OutlierMethod>,
    extreme: bool,
}

fn contiguous_runs(rows: &[usize]) -> Vec<RowRun> {
    let mut runs = Vec::new();
    let mut start = 0;
    for i in 1..=rows.len() {
        if i == rows.len() || rows[i] != rows[i - 1] + 1 {
            if i - start >= MIN_RUN_LENGTH {
                runs.push(RowRun {
                    start_row: rows[start],
                    end_row: rows[i - 1],
                    length: i - start,
                });
            }
            start = i;
        }
    }
    runs
}

fn context(records: &[OutlierRecord], values: &[f64], rate: f64) -> OutlierContext {
    let mut rows: Vec<usize> = records.iter().map(|r| r.row).collect();
    rows.sort_unstable();
    let med = median(values);
    let above_median = records.iter().filter(|r| r.value > med).count();
    let below_median = records.iter().filter(|r| r.value < med).count();
    let side = match (above_median, below_median) {
        (0, 0) => None,
        (_, 0) => Some(OutlierSide::Upper),
        (0, _) => Some(OutlierSide::Lower),
        _ => Some(OutlierSide::Both),
    };
    OutlierContext {
        clustered_runs: contiguous_runs(&rows),
        side,
        above_median,
        below_median,
        high_rate: rate > HIGH_RATE,
    }
}

/// Run every detector on one column and fold the flags by row.
pub fn detect_column(
    indexed: &[(usize, f64)],
    params: &IsolationForestParams,
    cancel: &CancelToken,
) -> Result<ColumnOutliers> {
    let values: Vec<f64> = indexed.iter().map(|(_, v)| *v).collect();
    let runs: Vec<(OutlierMethod, Analysis<MethodFlags>)> = vec![
        (OutlierMethod::Iqr, methods::iqr(&values)),
        (OutlierMethod::ModifiedZScore, methods::modified_z(&values)),
        (
            OutlierMethod::GeneralizedEsd,
            methods::generalized_esd(&values, cancel)?,
        ),
        (
            OutlierMethod::IsolationForest,
            methods::isolation(&values, params, cancel)?,
        ),
        (OutlierMethod::Grubbs, methods::grubbs(&values)),
    ];

    let mut by_row: BTreeMap<usize, Flag> = BTreeMap::new();
    let mut summaries = IndexMap::new();
    for (method, run) in runs {
        if let Some(flags) = run.as_complete() {
            for &pos in &flags.flagged {
                let (row, value) = indexed[pos];
                let entry = by_row.entry(row).or_insert_with(|| Flag {
                    value,
                    methods: Vec::new(),
                    extreme: false,
                });
                entry.methods.push(method);
                entry.extreme |= flags.extreme.contains(&pos);
            }
        }
        summaries.insert(
            method.key().to_string(),
            run.map(|f| MethodSummary {
                flagged_count: f.flagged.len(),
                extreme_count: f.extreme.len(),
                threshold: f.threshold,
            }),
        );
    }

    let med = median(&values);
    let mut outliers: Vec<OutlierRecord> = by_row
        .into_iter()
        .map(|(row, flag)| OutlierRecord {
            row,
            value: flag.value,
            method_count: flag.methods.len(),
            confidence: ConfidenceTier::from_method_count(flag.methods.len()),
            methods: flag.methods,
            extreme: flag.extreme,
        })
        .collect();
    outliers.sort_by(|a, b| {
        b.method_count
            .cmp(&a.method_count)
            .then_with(|| (b.value - med).abs().total_cmp(&(a.value - med).abs()))
            .then_with(|| a.row.cmp(&b.row))
    });

    let outlier_rate = if values.is_empty() {
        0.0
    } else {
        outliers.len() as f64 / values.len() as f64
    };
    Ok(ColumnOutliers {
        valid_count: values.len(),
        methods: summaries,
        context: context(&outliers, &values, outlier_rate),
        outliers,
        outlier_rate,
    })
}

pub fn analyze(
    data: &Dataset,
    params: &IsolationForestParams,
    cancel: &CancelToken,
) -> Result<OutlierAnalysis> {
    let columns = data.numeric_columns();
    let results: Vec<(String, usize, Analysis<ColumnOutliers>)> = columns
        .par_iter()
        .map(|name| {
            let indexed = data.indexed_numeric(name);
            let valid = indexed.len();
            let analysis = if valid < 3 {
                Analysis::not_applicable("needs at least 3 valid values")
            } else {
                detect_column(&indexed, params, cancel).into()
            };
            (name.clone(), valid, analysis)
        })
        .collect();
    if cancel.is_cancelled() {
        return Err(TabulaError::Cancelled);
    }

    let valid_cells: usize = results
        .iter()
        .filter(|(_, _, a)| a.is_complete())
        .map(|(_, v, _)| v)
        .sum();
    let total_outliers: usize = results
        .iter()
        .filter_map(|(_, _, a)| a.as_complete())
        .map(|c| c.outliers.len())
        .sum();
    Ok(OutlierAnalysis {
        columns: results.into_iter().map(|(n, _, a)| (n, a)).collect(),
        total_outliers,
        overall_outlier_rate: if valid_cells == 0 {
            0.0
        } else {
            total_outliers as f64 / valid_cells as f64
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indexed(values: &[f64]) -> Vec<(usize, f64)> {
        values.iter().copied().enumerate().collect()
    }

    #[test]
    fn spike_is_found_and_small_values_are_not() {
        let values: Vec<f64> = (1..=9).map(f64::from).chain([1000.0]).collect();
        let result = detect_column(
            &indexed(&values),
            &IsolationForestParams::default(),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(result.outliers.len(), 1);
        let top = &result.outliers[0];
        assert_eq!(top.value, 1000.0);
        assert!(top.extreme);
        assert!(top.methods.contains(&OutlierMethod::Grubbs));
        assert!(top.confidence >= ConfidenceTier::High);
        assert!(!result.methods["generalizedEsd"].is_applicable());
        assert_eq!(result.context.side, Some(OutlierSide::Upper));
    }

    #[test]
    fn equal_values_keep_separate_records() {
        let mut values: Vec<f64> = (0..40).map(|i| 10.0 + (i % 5) as f64).collect();
        values[5] = 400.0;
        values[30] = 400.0;
        let result = detect_column(
            &indexed(&values),
            &IsolationForestParams::default(),
            &CancelToken::new(),
        )
        .unwrap();
        let rows: Vec<usize> = result
            .outliers
            .iter()
            .filter(|o| o.value == 400.0)
            .map(|o| o.row)
            .collect();
        assert_eq!(rows.len(), 2);
        assert!(rows.contains(&5) && rows.contains(&30));
    }

    #[test]
    fn tiers_follow_method_count() {
        assert_eq!(ConfidenceTier::from_method_count(1), ConfidenceTier::Low);
        assert_eq!(ConfidenceTier::from_method_count(2), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::from_method_count(3), ConfidenceTier::High);
        assert_eq!(ConfidenceTier::from_method_count(5), ConfidenceTier::VeryHigh);
    }

    #[test]
    fn adjacent_rows_form_runs() {
        let runs = contiguous_runs(&[1, 4, 5, 6, 7, 12, 13]);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].start_row, 4);
        assert_eq!(runs[0].length, 4);
    }

    #[test]
    fn constant_column_has_no_outliers() {
        let values = vec![3.0; 30];
        let result = detect_column(
            &indexed(&values),
            &IsolationForestParams::default(),
            &CancelToken::new(),
        )
        .unwrap();
        assert!(result.outliers.is_empty());
        assert_eq!(result.context.side, None);
    }
}

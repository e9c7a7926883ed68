//! Tree-based segmentation: a shallow regression tree whose leaves become
//! readable business segments.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use tabula_core::{Analysis, Dataset, Result};

use crate::algorithms::descriptive::{median, quantile};
use crate::algorithms::linalg::r_squared;
use crate::algorithms::regression_tree::{LeafPath, RegressionTree, TreeParams};
use crate::execution::CancelToken;

pub const MIN_SEGMENTATION_ROWS: usize = 50;
/// Target plus at least two feature columns.
pub const MIN_USABLE_COLUMNS: usize = 3;
pub const MAX_DEPTH: usize = 5;
/// One-hot encoding keeps this many most frequent categories per column.
pub const MAX_CATEGORIES: usize = 20;
/// Leaves must hold more than this many rows to become segments.
const MIN_SEGMENT_SUPPORT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueTier {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    /// Conditions joined with AND, e.g. `region = north AND price > 12.5`.
    pub rule: String,
    pub conditions: Vec<String>,
    pub predicted_value: f64,
    pub support: usize,
    pub support_percentage: f64,
    /// 1 - coefficient of variation inside the leaf, clamped to [0, 1].
    pub confidence: f64,
    pub tier: ValueTier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentationAnalysis {
    pub target: String,
    pub n: usize,
    pub features: Vec<String>,
    pub depth: usize,
    pub leaf_count: usize,
    pub min_leaf: usize,
    /// Highest predicted value first.
    pub segments: Vec<Segment>,
    /// Percent of inverse-depth-weighted splits per source column.
    pub feature_importance: IndexMap<String, f64>,
    pub r_squared: f64,
}

/// One encoded model input and how to render a split on it.
enum Feature {
    Numeric { column: String },
    OneHot { column: String, category: String },
}

impl Feature {
    fn column(&self) -> &str {
        match self {
            Feature::Numeric { column } | Feature::OneHot { column, .. } => column,
        }
    }

    fn describe(&self, threshold: f64, goes_left: bool) -> String {
        match self {
            Feature::Numeric { column } => {
                let op = if goes_left { "<=" } else { ">" };
                format!("{column} {op} {threshold:.3}")
            }
            // Indicator columns split at 0.5: left means "not this category".
            Feature::OneHot { column, category } => {
                let op = if goes_left { "!=" } else { "=" };
                format!("{column} {op} {category}")
            }
        }
    }
}

fn top_categories(labels: &[Option<String>]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for l in labels.iter().flatten() {
        *counts.entry(l.as_str()).or_default() += 1;
    }
    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(MAX_CATEGORIES)
        .map(|(v, _)| v.to_string())
        .collect()
}

/// Collapse repeated bounds on the same numeric feature to the tightest pair.
fn simplify(path: &LeafPath, features: &[Feature]) -> Vec<String> {
    let mut upper: IndexMap<usize, f64> = IndexMap::new();
    let mut lower: IndexMap<usize, f64> = IndexMap::new();
    let mut out = Vec::new();
    for &(f, threshold, goes_left) in &path.conditions {
        match &features[f] {
            Feature::Numeric { .. } if goes_left => {
                let e = upper.entry(f).or_insert(threshold);
                *e = e.min(threshold);
            }
            Feature::Numeric { .. } => {
                let e = lower.entry(f).or_insert(threshold);
                *e = e.max(threshold);
            }
            onehot => out.push(onehot.describe(threshold, goes_left)),
        }
    }
    for (f, t) in lower {
        out.push(features[f].describe(t, false));
    }
    for (f, t) in upper {
        out.push(features[f].describe(t, true));
    }
    out
}

pub fn segment(data: &Dataset, target: &str, cancel: &CancelToken) -> Result<Analysis<SegmentationAnalysis>> {
    let target_values = data.numeric_column(target);
    let rows: Vec<usize> = target_values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|_| i))
        .collect();
    let n = rows.len();
    if n < MIN_SEGMENTATION_ROWS {
        return Ok(Analysis::not_applicable(format!(
            "needs at least {MIN_SEGMENTATION_ROWS} rows with a target value, found {n}"
        )));
    }
    let y: Vec<f64> = rows.iter().filter_map(|&i| target_values[i]).collect();

    let mut features: Vec<Feature> = Vec::new();
    let mut matrix: Vec<Vec<f64>> = Vec::new();
    let mut source_columns: Vec<String> = Vec::new();

    for column in data.numeric_columns().into_iter().filter(|c| c != target) {
        let values = data.numeric_column(&column);
        let present: Vec<f64> = rows.iter().filter_map(|&i| values[i]).collect();
        if present.len() < n / 2 {
            continue;
        }
        // Missing cells take the column median.
        let fill = median(&present);
        matrix.push(rows.iter().map(|&i| values[i].unwrap_or(fill)).collect());
        features.push(Feature::Numeric {
            column: column.clone(),
        });
        source_columns.push(column);
    }
    for column in data.categorical_columns() {
        let labels = data.label_column(&column);
        let categories = top_categories(&labels);
        if categories.len() < 2 {
            continue;
        }
        for category in categories {
            matrix.push(
                rows.iter()
                    .map(|&i| f64::from(u8::from(labels[i].as_deref() == Some(category.as_str()))))
                    .collect(),
            );
            features.push(Feature::OneHot {
                column: column.clone(),
                category,
            });
        }
        source_columns.push(column);
    }

    if source_columns.len() + 1 < MIN_USABLE_COLUMNS {
        return Ok(Analysis::not_applicable(format!(
            "needs the target plus at least {} usable feature columns",
            MIN_USABLE_COLUMNS - 1
        )));
    }

    let min_leaf = 5usize.max((n as f64 * 0.05).ceil() as usize);
    let params = TreeParams {
        max_depth: MAX_DEPTH,
        min_leaf,
    };
    let tree = RegressionTree::fit(&matrix, &y, &params, cancel)?;
    let predictions = tree.predict(&matrix, n);
    let leaves = tree.leaves();

    let leaf_values: Vec<f64> = leaves.iter().map(|l| l.value).collect();
    let p75 = quantile(&leaf_values, 0.75);
    let p25 = quantile(&leaf_values, 0.25);

    let mut segments: Vec<Segment> = leaves
        .iter()
        .filter(|l| l.samples > MIN_SEGMENT_SUPPORT)
        .map(|leaf| {
            let conditions = simplify(leaf, &features);
            let cv = if leaf.value.abs() > f64::EPSILON {
                leaf.std_dev / leaf.value.abs()
            } else {
                1.0
            };
            let tier = if leaf.value >= p75 {
                ValueTier::High
            } else if leaf.value <= p25 {
                ValueTier::Low
            } else {
                ValueTier::Medium
            };
            Segment {
                rule: if conditions.is_empty() {
                    "all rows".to_string()
                } else {
                    conditions.join(" AND ")
                },
                conditions,
                predicted_value: leaf.value,
                support: leaf.samples,
                support_percentage: leaf.samples as f64 / n as f64 * 100.0,
                confidence: (1.0 - cv).clamp(0.0, 1.0),
                tier,
            }
        })
        .collect();
    segments.sort_by(|a, b| b.predicted_value.total_cmp(&a.predicted_value));

    let mut importance: IndexMap<String, f64> = IndexMap::new();
    for (feature, share) in features.iter().zip(tree.feature_importance()) {
        *importance.entry(feature.column().to_string()).or_default() += share;
    }
    importance.sort_by(|_, a, _, b| b.total_cmp(a));

    Ok(Analysis::Complete(SegmentationAnalysis {
        target: target.to_string(),
        n,
        features: source_columns,
        depth: tree.depth(),
        leaf_count: leaves.len(),
        min_leaf,
        segments,
        feature_importance: importance,
        r_squared: r_squared(&y, &predictions).clamp(0.0, 1.0),
    }))
}

//! Per-column descriptive statistics.
//!
//! One profile per column, built once per run from the shared sample:
//! - numeric: moments, quantiles, shape classification, quick outlier screen
//! - categorical: frequency table, entropy, rare categories, label lengths
//! - date: range and span
//! - identifier: uniqueness and duplicates

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use tabula_core::{Analysis, ColumnKind, ColumnType, Dataset, Result, TabulaError};

use crate::algorithms::descriptive::{
    coefficient_of_variation, kurtosis, mad, mean, mode, quantile_sorted, skewness, sorted,
    std_dev, variance,
};

/// Categories below this share of valid values are rare.
const RARE_CATEGORY_SHARE: f64 = 0.01;

/// Frequency tables keep at most this many entries.
const MAX_FREQUENCY_ENTRIES: usize = 50;

/// Quick outlier value lists are truncated to this length.
const MAX_QUICK_OUTLIER_VALUES: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ColumnProfile {
    Numeric(NumericProfile),
    Categorical(CategoricalProfile),
    Date(DateProfile),
    Identifier(IdentifierProfile),
}

impl ColumnProfile {
    pub fn null_percentage(&self) -> f64 {
        match self {
            ColumnProfile::Numeric(p) => p.null_percentage,
            ColumnProfile::Categorical(p) => p.null_percentage,
            ColumnProfile::Date(p) => p.null_percentage,
            ColumnProfile::Identifier(p) => p.null_percentage,
        }
    }

    pub fn unique_count(&self) -> usize {
        match self {
            ColumnProfile::Numeric(p) => p.unique_count,
            ColumnProfile::Categorical(p) => p.unique_count,
            ColumnProfile::Date(p) => p.unique_count,
            ColumnProfile::Identifier(p) => p.unique_count,
        }
    }

    pub fn as_numeric(&self) -> Option<&NumericProfile> {
        match self {
            ColumnProfile::Numeric(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_categorical(&self) -> Option<&CategoricalProfile> {
        match self {
            ColumnProfile::Categorical(p) => Some(p),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DistributionShape {
    Discrete,
    Symmetric,
    HeavyTailed,
    LightTailed,
    ModeratelyRightSkewed,
    ModeratelyLeftSkewed,
    HighlyRightSkewed,
    HighlyLeftSkewed,
}

impl DistributionShape {
    /// |skew| < 0.5 is symmetric, > 2 highly skewed; fewer than 10 distinct
    /// values is discrete regardless of moments.
    pub fn classify(skew: f64, excess_kurtosis: f64, unique_count: usize) -> Self {
        if unique_count < 10 {
            return DistributionShape::Discrete;
        }
        let abs = skew.abs();
        if abs > 2.0 {
            if skew > 0.0 {
                DistributionShape::HighlyRightSkewed
            } else {
                DistributionShape::HighlyLeftSkewed
            }
        } else if abs >= 0.5 {
            if skew > 0.0 {
                DistributionShape::ModeratelyRightSkewed
            } else {
                DistributionShape::ModeratelyLeftSkewed
            }
        } else if excess_kurtosis > 3.0 {
            DistributionShape::HeavyTailed
        } else if excess_kurtosis < -1.0 {
            DistributionShape::LightTailed
        } else {
            DistributionShape::Symmetric
        }
    }

    pub fn is_highly_skewed(self) -> bool {
        matches!(
            self,
            DistributionShape::HighlyRightSkewed | DistributionShape::HighlyLeftSkewed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p5: f64,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
}

/// Fast screening outliers; the consensus detector does the full job.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickOutliers {
    pub iqr_count: usize,
    pub z_score_count: usize,
    pub modified_z_count: usize,
    /// Distinct flagged values across the three screens, ascending.
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumericProfile {
    pub count: usize,
    pub null_count: usize,
    pub null_percentage: f64,
    pub mean: f64,
    pub median: f64,
    pub mode: Option<f64>,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    pub sum: f64,
    pub std_dev: f64,
    pub variance: f64,
    pub coefficient_of_variation: f64,
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub percentiles: Percentiles,
    pub skewness: f64,
    pub kurtosis: f64,
    pub unique_count: usize,
    pub unique_ratio: f64,
    pub zero_count: usize,
    pub positive_count: usize,
    pub negative_count: usize,
    pub quick_outliers: QuickOutliers,
    pub shape: DistributionShape,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryFrequency {
    pub value: String,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LengthStats {
    pub min: usize,
    pub max: usize,
    pub mean: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoricalProfile {
    pub count: usize,
    pub null_count: usize,
    pub null_percentage: f64,
    pub unique_count: usize,
    pub unique_ratio: f64,
    /// Most frequent first; ties broken alphabetically.
    pub frequencies: Vec<CategoryFrequency>,
    pub mode: Option<String>,
    pub mode_percentage: f64,
    /// Shannon entropy in bits.
    pub entropy: f64,
    /// Entropy divided by log2(unique count); 0 for a single category.
    pub normalized_entropy: f64,
    pub rare_categories: Vec<String>,
    pub length: LengthStats,
    /// Values outside the declared category set, when one was declared.
    pub undeclared_values: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateProfile {
    pub count: usize,
    pub null_count: usize,
    pub null_percentage: f64,
    pub unique_count: usize,
    pub min: DateTime<Utc>,
    pub max: DateTime<Utc>,
    pub span_days: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifierProfile {
    pub count: usize,
    pub null_count: usize,
    pub null_percentage: f64,
    pub unique_count: usize,
    pub unique_ratio: f64,
    pub duplicate_count: usize,
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

fn distinct_count(values: &[f64]) -> usize {
    values.iter().map(|v| v.to_bits()).collect::<HashSet<_>>().len()
}

/// IQR, z-score (|z| > 3) and modified z-score (|M| > 3.5) screens.
pub fn quick_outliers(values: &[f64], sorted_values: &[f64]) -> QuickOutliers {
    if values.len() < 3 {
        return QuickOutliers::default();
    }
    let q1 = quantile_sorted(sorted_values, 0.25);
    let q3 = quantile_sorted(sorted_values, 0.75);
    let iqr = q3 - q1;
    let (lo, hi) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);
    let m = mean(values);
    let s = std_dev(values);
    let med = quantile_sorted(sorted_values, 0.5);
    let mad_value = mad(values);

    let mut flagged: Vec<f64> = Vec::new();
    let mut out = QuickOutliers::default();
    for &v in values {
        let by_iqr = v < lo || v > hi;
        let by_z = s > f64::EPSILON && ((v - m) / s).abs() > 3.0;
        let by_mod_z = mad_value > f64::EPSILON && (0.6745 * (v - med) / mad_value).abs() > 3.5;
        out.iqr_count += usize::from(by_iqr);
        out.z_score_count += usize::from(by_z);
        out.modified_z_count += usize::from(by_mod_z);
        if by_iqr || by_z || by_mod_z {
            flagged.push(v);
        }
    }
    flagged.sort_by(f64::total_cmp);
    flagged.dedup();
    flagged.truncate(MAX_QUICK_OUTLIER_VALUES);
    out.values = flagged;
    out
}

pub fn profile_numeric(values: &[f64], null_count: usize) -> Result<NumericProfile> {
    let count = values.len();
    if count == 0 {
        return Err(TabulaError::InvalidInput("no valid numeric values".into()));
    }
    let s = sorted(values);
    let total = count + null_count;
    let min = s[0];
    let max = s[count - 1];
    let sum: f64 = values.iter().sum();
    let m = mean(values);
    let var = variance(values);
    let skew = skewness(values);
    let kurt = kurtosis(values);
    let unique_count = distinct_count(values);
    let q = |p: f64| quantile_sorted(&s, p);

    if [m, var, skew, kurt, sum].iter().any(|v| !v.is_finite()) {
        return Err(TabulaError::Calculation(
            "numeric overflow while computing moments".into(),
        ));
    }

    Ok(NumericProfile {
        count,
        null_count,
        null_percentage: percentage(null_count, total),
        mean: m,
        median: q(0.5),
        mode: mode(values),
        min,
        max,
        range: max - min,
        sum,
        std_dev: var.sqrt(),
        variance: var,
        coefficient_of_variation: coefficient_of_variation(values),
        q1: q(0.25),
        q3: q(0.75),
        iqr: q(0.75) - q(0.25),
        percentiles: Percentiles {
            p5: q(0.05),
            p10: q(0.10),
            p25: q(0.25),
            p50: q(0.5),
            p75: q(0.75),
            p90: q(0.90),
            p95: q(0.95),
        },
        skewness: skew,
        kurtosis: kurt,
        unique_count,
        unique_ratio: unique_count as f64 / count as f64,
        zero_count: values.iter().filter(|v| **v == 0.0).count(),
        positive_count: values.iter().filter(|v| **v > 0.0).count(),
        negative_count: values.iter().filter(|v| **v < 0.0).count(),
        quick_outliers: quick_outliers(values, &s),
        shape: DistributionShape::classify(skew, kurt, unique_count),
    })
}

pub fn profile_categorical(
    labels: &[String],
    null_count: usize,
    declared: Option<&[String]>,
) -> Result<CategoricalProfile> {
    let count = labels.len();
    if count == 0 {
        return Err(TabulaError::InvalidInput("no non-null values".into()));
    }
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for l in labels {
        *counts.entry(l.as_str()).or_default() += 1;
    }
    let mut freq: Vec<(&str, usize)> = counts.into_iter().collect();
    freq.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let n = count as f64;
    let entropy: f64 = freq
        .iter()
        .map(|(_, c)| {
            let p = *c as f64 / n;
            -p * p.log2()
        })
        .sum::<f64>()
        .max(0.0);
    let unique_count = freq.len();
    let normalized_entropy = if unique_count > 1 {
        entropy / (unique_count as f64).log2()
    } else {
        0.0
    };

    let rare_categories = freq
        .iter()
        .filter(|(_, c)| (*c as f64 / n) < RARE_CATEGORY_SHARE)
        .map(|(v, _)| v.to_string())
        .collect();

    let lengths: Vec<usize> = labels.iter().map(|l| l.chars().count()).collect();
    let undeclared_values = declared.map_or(0, |cats| {
        let known: HashSet<&str> = cats.iter().map(String::as_str).collect();
        labels.iter().filter(|l| !known.contains(l.as_str())).count()
    });

    let (mode, mode_count) = freq
        .first()
        .map(|(v, c)| (Some(v.to_string()), *c))
        .unwrap_or((None, 0));

    Ok(CategoricalProfile {
        count,
        null_count,
        null_percentage: percentage(null_count, count + null_count),
        unique_count,
        unique_ratio: unique_count as f64 / n,
        frequencies: freq
            .iter()
            .take(MAX_FREQUENCY_ENTRIES)
            .map(|(v, c)| CategoryFrequency {
                value: v.to_string(),
                count: *c,
                percentage: percentage(*c, count),
            })
            .collect(),
        mode,
        mode_percentage: percentage(mode_count, count),
        entropy,
        normalized_entropy,
        rare_categories,
        length: LengthStats {
            min: lengths.iter().copied().min().unwrap_or(0),
            max: lengths.iter().copied().max().unwrap_or(0),
            mean: lengths.iter().sum::<usize>() as f64 / n,
        },
        undeclared_values,
    })
}

pub fn profile_date(dates: &[DateTime<Utc>], null_count: usize) -> Result<DateProfile> {
    let (Some(min), Some(max)) = (dates.iter().min(), dates.iter().max()) else {
        return Err(TabulaError::InvalidInput("no parseable timestamps".into()));
    };
    let unique: HashSet<i64> = dates.iter().map(|d| d.timestamp_millis()).collect();
    Ok(DateProfile {
        count: dates.len(),
        null_count,
        null_percentage: percentage(null_count, dates.len() + null_count),
        unique_count: unique.len(),
        min: *min,
        max: *max,
        span_days: (*max - *min).num_seconds() as f64 / 86_400.0,
    })
}

pub fn profile_identifier(labels: &[String], null_count: usize) -> IdentifierProfile {
    let unique: HashSet<&str> = labels.iter().map(String::as_str).collect();
    let count = labels.len();
    IdentifierProfile {
        count,
        null_count,
        null_percentage: percentage(null_count, count + null_count),
        unique_count: unique.len(),
        unique_ratio: if count == 0 { 0.0 } else { unique.len() as f64 / count as f64 },
        duplicate_count: count - unique.len(),
    }
}

/// Profile a single column of the dataset.
pub fn profile_column(data: &Dataset, name: &str, column_type: &ColumnType) -> Analysis<ColumnProfile> {
    let null_count = data.null_count(name);
    let result = match column_type.kind {
        ColumnKind::Integer | ColumnKind::Float => {
            let values = data.numeric_values(name);
            if values.is_empty() {
                return Analysis::not_applicable("column has no numeric values");
            }
            // Cells holding non-numeric text count as missing.
            let missing = data.row_count() - values.len();
            profile_numeric(&values, missing).map(ColumnProfile::Numeric)
        }
        ColumnKind::Categorical => {
            let labels: Vec<String> = data.label_column(name).into_iter().flatten().collect();
            if labels.is_empty() {
                return Analysis::not_applicable("column has no non-null values");
            }
            profile_categorical(&labels, null_count, column_type.categories.as_deref())
                .map(ColumnProfile::Categorical)
        }
        ColumnKind::Date => {
            let dates: Vec<DateTime<Utc>> = data.date_column(name).into_iter().flatten().collect();
            if dates.is_empty() {
                return Analysis::not_applicable("column has no parseable timestamps");
            }
            let missing = data.row_count() - dates.len();
            profile_date(&dates, missing).map(ColumnProfile::Date)
        }
        ColumnKind::Identifier => {
            let labels: Vec<String> = data.label_column(name).into_iter().flatten().collect();
            Ok(ColumnProfile::Identifier(profile_identifier(&labels, null_count)))
        }
    };
    result.into()
}

/// Profile every column. Columns are processed in parallel; the map keeps
/// the dataset's column order.
pub fn profile_columns(data: &Dataset) -> indexmap::IndexMap<String, Analysis<ColumnProfile>> {
    let columns: Vec<(&String, &ColumnType)> = data.columns.iter().collect();
    let profiles: Vec<(String, Analysis<ColumnProfile>)> = columns
        .par_iter()
        .map(|(name, t)| ((*name).clone(), profile_column(data, name, t)))
        .collect();
    profiles.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;
    use tabula_core::{FieldValue, Row};

    use super::*;

    #[test]
    fn numeric_profile_basics() {
        let values: Vec<f64> = (1..=9).map(f64::from).chain([1000.0]).collect();
        let p = profile_numeric(&values, 2).unwrap();
        assert_eq!(p.count, 10);
        assert!((p.null_percentage - 100.0 * 2.0 / 12.0).abs() < 1e-9);
        assert_eq!(p.min, 1.0);
        assert_eq!(p.max, 1000.0);
        assert_eq!(p.range, 999.0);
        assert!((p.median - 5.5).abs() < 1e-12);
        assert!((p.iqr - 4.5).abs() < 1e-12);
        assert_eq!(p.positive_count, 10);
        assert!(p.quick_outliers.values.contains(&1000.0));
        assert!(!p.quick_outliers.values.contains(&9.0));
        assert_eq!(p.shape, DistributionShape::HighlyRightSkewed);
    }

    #[test]
    fn tiny_samples_have_zero_shape_moments() {
        let p = profile_numeric(&[4.0, 8.0], 0).unwrap();
        assert_eq!(p.skewness, 0.0);
        assert_eq!(p.kurtosis, 0.0);
        let p = profile_numeric(&[4.0], 0).unwrap();
        assert_eq!(p.std_dev, 0.0);
        assert_eq!(p.variance, 0.0);
    }

    #[test]
    fn zero_variance_column() {
        let p = profile_numeric(&[7.0; 40], 0).unwrap();
        assert_eq!(p.coefficient_of_variation, 0.0);
        assert_eq!(p.quick_outliers.z_score_count, 0);
        assert_eq!(p.quick_outliers.modified_z_count, 0);
        assert!(p.quick_outliers.values.is_empty());
        assert_eq!(p.shape, DistributionShape::Discrete);
    }

    #[test]
    fn negative_mean_has_zero_cv() {
        let p = profile_numeric(&[-5.0, -3.0, -1.0], 0).unwrap();
        assert_eq!(p.coefficient_of_variation, 0.0);
        assert_eq!(p.negative_count, 3);
    }

    #[test]
    fn constant_categorical_has_zero_entropy() {
        let labels = vec!["same".to_string(); 100];
        let p = profile_categorical(&labels, 0, None).unwrap();
        assert_eq!(p.unique_count, 1);
        assert_eq!(p.entropy, 0.0);
        assert_eq!(p.normalized_entropy, 0.0);
        assert_eq!(p.mode.as_deref(), Some("same"));
        assert_eq!(p.mode_percentage, 100.0);
    }

    #[test]
    fn categorical_entropy_and_rare_values() {
        let mut labels = Vec::new();
        for _ in 0..150 {
            labels.push("a".to_string());
            labels.push("b".to_string());
        }
        labels.push("z".to_string());
        let declared = vec!["a".to_string(), "b".to_string()];
        let p = profile_categorical(&labels, 0, Some(&declared)).unwrap();
        assert_eq!(p.unique_count, 3);
        assert!(p.entropy > 1.0 && p.entropy < 1.1);
        assert_eq!(p.rare_categories, vec!["z".to_string()]);
        assert_eq!(p.undeclared_values, 1);
        assert_eq!(p.frequencies[0].value, "a");
        assert_eq!(p.length.max, 1);
    }

    #[test]
    fn shape_classification_thresholds() {
        assert_eq!(DistributionShape::classify(0.2, 0.0, 50), DistributionShape::Symmetric);
        assert_eq!(DistributionShape::classify(-2.5, 0.0, 50), DistributionShape::HighlyLeftSkewed);
        assert_eq!(DistributionShape::classify(1.0, 0.0, 50), DistributionShape::ModeratelyRightSkewed);
        assert_eq!(DistributionShape::classify(0.1, 5.0, 50), DistributionShape::HeavyTailed);
        assert_eq!(DistributionShape::classify(0.1, -1.2, 50), DistributionShape::LightTailed);
        assert_eq!(DistributionShape::classify(3.0, 9.0, 4), DistributionShape::Discrete);
    }

    #[test]
    fn profile_columns_keeps_order_and_marks_empty_columns() {
        let mut columns = IndexMap::new();
        columns.insert("id".to_string(), ColumnType::new(ColumnKind::Identifier));
        columns.insert("x".to_string(), ColumnType::new(ColumnKind::Float));
        columns.insert("empty".to_string(), ColumnType::new(ColumnKind::Float));
        let rows: Vec<Row> = (0..5)
            .map(|i| {
                Row::from([
                    ("id".to_string(), FieldValue::from(format!("r{}", i % 4))),
                    ("x".to_string(), FieldValue::from(i as f64)),
                    ("empty".to_string(), FieldValue::Null),
                ])
            })
            .collect();
        let data = Dataset::new(rows, columns);
        let profiles = profile_columns(&data);
        let names: Vec<&String> = profiles.keys().collect();
        assert_eq!(names, ["id", "x", "empty"]);
        assert!(!profiles["empty"].is_applicable());
        match profiles["id"].as_complete() {
            Some(ColumnProfile::Identifier(p)) => assert_eq!(p.duplicate_count, 1),
            other => panic!("unexpected {other:?}"),
        }
    }
}

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::column::{ColumnKind, ColumnType};

/// A single row: column name to typed value.
pub type Row = HashMap<String, FieldValue>;

/// Typed cell values. Parsing happens upstream; we only preserve type info.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Date(DateTime<Utc>),
    Null,
}

impl FieldValue {
    /// Extract a finite number. Numeric text is accepted; NaN and infinities are not.
    pub fn as_f64(&self) -> Option<f64> {
        let v = match self {
            FieldValue::Number(n) => *n,
            FieldValue::Text(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        v.is_finite().then_some(v)
    }

    /// Extract as string, returning None for Null.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Extract a timestamp. RFC 3339 and plain `YYYY-MM-DD[ HH:MM:SS]` text is accepted.
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Date(d) => Some(*d),
            FieldValue::Text(s) => parse_timestamp(s.trim()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::Number(n) => n.is_nan(),
            FieldValue::Date(_) => false,
        }
    }

    /// Render the value as a category label.
    pub fn label(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Text(s) if s.trim().is_empty() => None,
            FieldValue::Text(s) => Some(s.clone()),
            FieldValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                Some(format!("{}", *n as i64))
            }
            FieldValue::Number(n) => Some(n.to_string()),
            FieldValue::Date(d) => Some(d.to_rfc3339()),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Number(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Number(v as f64)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(v: DateTime<Utc>) -> Self {
        FieldValue::Date(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(FieldValue::Null, Into::into)
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(ndt.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| ndt.and_utc())
}

/// Ordered rows plus the externally inferred column-type map.
///
/// Row order matters only for time-series analysis. Column order follows
/// the type map and drives the order of every per-column result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    pub rows: Vec<Row>,
    pub columns: IndexMap<String, ColumnType>,
}

impl Dataset {
    pub fn new(rows: Vec<Row>, columns: IndexMap<String, ColumnType>) -> Self {
        Self { rows, columns }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }

    /// Names of columns whose kind satisfies the predicate, in column order.
    pub fn columns_where(&self, pred: impl Fn(ColumnKind) -> bool) -> Vec<String> {
        self.columns
            .iter()
            .filter(|(_, t)| pred(t.kind))
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn numeric_columns(&self) -> Vec<String> {
        self.columns_where(ColumnKind::is_numeric)
    }

    pub fn categorical_columns(&self) -> Vec<String> {
        self.columns_where(|k| k == ColumnKind::Categorical)
    }

    pub fn date_columns(&self) -> Vec<String> {
        self.columns_where(|k| k == ColumnKind::Date)
    }

    pub fn value<'a>(&'a self, row: usize, column: &str) -> &'a FieldValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&FieldValue::Null)
    }

    /// Column values aligned with row positions (`None` for null or non-numeric cells).
    pub fn numeric_column(&self, column: &str) -> Vec<Option<f64>> {
        self.rows
            .iter()
            .map(|r| r.get(column).and_then(FieldValue::as_f64))
            .collect()
    }

    /// Valid numeric values together with their row index.
    pub fn indexed_numeric(&self, column: &str) -> Vec<(usize, f64)> {
        self.numeric_column(column)
            .into_iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|v| (i, v)))
            .collect()
    }

    /// Valid numeric values only.
    pub fn numeric_values(&self, column: &str) -> Vec<f64> {
        self.numeric_column(column).into_iter().flatten().collect()
    }

    /// Category labels aligned with row positions.
    pub fn label_column(&self, column: &str) -> Vec<Option<String>> {
        self.rows
            .iter()
            .map(|r| r.get(column).and_then(FieldValue::label))
            .collect()
    }

    pub fn date_column(&self, column: &str) -> Vec<Option<DateTime<Utc>>> {
        self.rows
            .iter()
            .map(|r| r.get(column).and_then(FieldValue::as_date))
            .collect()
    }

    pub fn null_count(&self, column: &str) -> usize {
        self.rows
            .iter()
            .filter(|r| r.get(column).map_or(true, FieldValue::is_null))
            .count()
    }

    /// Build a new dataset holding the rows at `indices`, in that order.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
            columns: self.columns.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> Dataset {
        let mut columns = IndexMap::new();
        columns.insert("amount".to_string(), ColumnType::new(ColumnKind::Float));
        columns.insert("city".to_string(), ColumnType::new(ColumnKind::Categorical));
        let rows = vec![
            Row::from([
                ("amount".to_string(), FieldValue::from(1.5)),
                ("city".to_string(), FieldValue::from("Oslo")),
            ]),
            Row::from([
                ("amount".to_string(), FieldValue::Null),
                ("city".to_string(), FieldValue::from("")),
            ]),
            Row::from([("amount".to_string(), FieldValue::from("3"))]),
        ];
        Dataset::new(rows, columns)
    }

    #[test]
    fn numeric_extraction_skips_nulls_and_parses_text() {
        let ds = dataset();
        assert_eq!(ds.numeric_column("amount"), vec![Some(1.5), None, Some(3.0)]);
        assert_eq!(ds.indexed_numeric("amount"), vec![(0, 1.5), (2, 3.0)]);
    }

    #[test]
    fn null_count_treats_blank_text_and_missing_keys_as_null() {
        let ds = dataset();
        assert_eq!(ds.null_count("amount"), 1);
        assert_eq!(ds.null_count("city"), 2);
    }

    #[test]
    fn nan_is_not_a_number() {
        assert_eq!(FieldValue::Number(f64::NAN).as_f64(), None);
        assert!(FieldValue::Number(f64::NAN).is_null());
    }

    #[test]
    fn parses_plain_dates() {
        let v = FieldValue::from("2024-03-01");
        let d = v.as_date().unwrap();
        assert_eq!(d.to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert!(FieldValue::from("not a date").as_date().is_none());
    }

    #[test]
    fn labels_render_integers_without_fraction() {
        assert_eq!(FieldValue::from(3.0).label().as_deref(), Some("3"));
        assert_eq!(FieldValue::from(2.5).label().as_deref(), Some("2.5"));
        assert_eq!(FieldValue::Null.label(), None);
    }

    #[test]
    fn select_rows_preserves_order() {
        let ds = dataset();
        let sub = ds.select_rows(&[2, 0]);
        assert_eq!(sub.numeric_column("amount"), vec![Some(3.0), Some(1.5)]);
        assert_eq!(sub.column_count(), 2);
    }
}

//! Time-series analysis over the first usable date column.
//!
//! Frequency is inferred from the median spacing of sorted timestamps and
//! only regular spacing (interval CV ≤ 0.3) is analyzed. Each numeric
//! series with enough coverage gets trend, seasonality, stationarity,
//! structural breaks, a classical decomposition and a naive forecast.
//!
//! Sub-modules:
//! - ADF, KPSS and structural-break scan ([`stationarity`])
//! - moving-average decomposition ([`decomposition`])

pub mod decomposition;
pub mod stationarity;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use tabula_core::{Analysis, Dataset, Result, TabulaError};

use crate::algorithms::descriptive::{fit_line, mean, median, population_variance, std_dev};
use crate::algorithms::linalg::{design_matrix, least_squares, r_squared};
use crate::execution::CancelToken;
use crate::pipeline::modeling::regression;

pub use decomposition::Decomposition;
pub use stationarity::{Stationarity, StructuralBreak};

pub const MIN_TIMESTAMPS: usize = 20;
pub const MAX_INTERVAL_CV: f64 = 0.3;
pub const MIN_COVERAGE: f64 = 0.8;
/// Quadratic trend must beat the linear R² by this much to be preferred.
const QUADRATIC_MARGIN: f64 = 0.1;
const SEASONALITY_THRESHOLD: f64 = 0.2;
const MAX_FORECAST_STEPS: usize = 12;

const HOUR: f64 = 3_600.0;
const DAY: f64 = 86_400.0;
const WEEK: f64 = 7.0 * DAY;
const MONTH: f64 = 30.44 * DAY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Custom,
}

impl Frequency {
    /// Buckets: ±10% around an hour, day or week; ±20% around 30.44 days.
    pub fn from_interval(seconds: f64) -> Self {
        let near = |target: f64, tol: f64| (seconds - target).abs() <= target * tol;
        if near(HOUR, 0.1) {
            Frequency::Hourly
        } else if near(DAY, 0.1) {
            Frequency::Daily
        } else if near(WEEK, 0.1) {
            Frequency::Weekly
        } else if near(MONTH, 0.2) {
            Frequency::Monthly
        } else {
            Frequency::Custom
        }
    }

    /// Observations per seasonal cycle.
    pub fn period(self) -> Option<usize> {
        match self {
            Frequency::Hourly => Some(24),
            Frequency::Daily => Some(7),
            Frequency::Weekly => Some(4),
            Frequency::Monthly => Some(12),
            Frequency::Custom => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrendShape {
    Linear,
    Quadratic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Flat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trend {
    pub shape: TrendShape,
    pub direction: TrendDirection,
    /// Change per median interval from the linear fit.
    pub slope: f64,
    pub intercept: f64,
    pub p_value: f64,
    pub linear_r_squared: f64,
    pub quadratic_r_squared: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seasonality {
    pub period: usize,
    /// Detrended means per cycle position, divided by the series level.
    pub indices: Vec<f64>,
    pub strength: f64,
    pub detected: bool,
    /// Only evaluated for daily series spanning two years.
    pub yearly: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Forecast {
    pub method: String,
    pub horizon: usize,
    pub points: Vec<ForecastPoint>,
    /// Always `low`: a straight-line extension ignores seasonality and shocks.
    pub confidence: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesAnalysis {
    pub n: usize,
    pub coverage: f64,
    pub trend: Trend,
    pub seasonality: Analysis<Seasonality>,
    pub stationarity: Stationarity,
    pub structural_breaks: Vec<StructuralBreak>,
    pub decomposition: Analysis<Decomposition>,
    pub forecast: Analysis<Forecast>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesAnalysis {
    pub date_column: String,
    pub frequency: Frequency,
    pub median_interval_seconds: f64,
    pub interval_cv: f64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub span_days: f64,
    pub observations: usize,
    pub expected_observations: usize,
    pub missing_periods: usize,
    pub series: IndexMap<String, Analysis<SeriesAnalysis>>,
}

/// Spacing between consecutive sorted timestamps, per input row.
///
/// `source_rows` maps each analyzed row to its position in the unsampled
/// input. A gap that spans several input rows is divided by that count, so
/// a random sample of an evenly spaced series still reads as even.
fn step_intervals(stamped: &[(DateTime<Utc>, usize)], source_rows: Option<&[usize]>) -> Vec<f64> {
    stamped
        .windows(2)
        .map(|w| {
            let seconds = (w[1].0 - w[0].0).num_milliseconds() as f64 / 1000.0;
            let rows = source_rows.map_or(1, |p| p[w[1].1].abs_diff(p[w[0].1]).max(1));
            seconds / rows as f64
        })
        .collect()
}

/// Median spacing and its coefficient of variation.
pub fn interval_stats(intervals: &[f64]) -> (f64, f64) {
    let m = mean(intervals);
    let cv = if m > 0.0 { std_dev(intervals) / m } else { f64::INFINITY };
    (median(intervals), cv)
}

fn trend(name: &str, t: &[f64], y: &[f64]) -> Trend {
    let linear = regression::simple(name, "time", t, y);
    let (slope, intercept, p_value, linear_r2) = match linear.as_complete() {
        Some(fit) => (
            fit.slope,
            fit.intercept,
            fit.coefficients.get(1).map_or(1.0, |c| c.p_value),
            fit.r_squared,
        ),
        None => (0.0, mean(y), 1.0, 0.0),
    };
    // Standardized time keeps the squared column well conditioned on long series.
    let (mt, st) = (mean(t), std_dev(t));
    let quadratic_r2 = (st > 0.0)
        .then(|| {
            let z: Vec<f64> = t.iter().map(|v| (v - mt) / st).collect();
            let squared: Vec<f64> = z.iter().map(|v| v * v).collect();
            least_squares(&design_matrix(&[z, squared], true), y).ok()
        })
        .flatten()
        .map(|fit| r_squared(y, &fit.fitted).clamp(0.0, 1.0));
    let shape = match quadratic_r2 {
        Some(q) if q > linear_r2 + QUADRATIC_MARGIN => TrendShape::Quadratic,
        _ => TrendShape::Linear,
    };
    let direction = if p_value >= 0.05 || slope == 0.0 {
        TrendDirection::Flat
    } else if slope > 0.0 {
        TrendDirection::Increasing
    } else {
        TrendDirection::Decreasing
    };
    Trend {
        shape,
        direction,
        slope,
        intercept,
        p_value,
        linear_r_squared: linear_r2,
        quadratic_r_squared: quadratic_r2,
    }
}

fn detrended(t: &[f64], y: &[f64]) -> Vec<f64> {
    match fit_line(t, y) {
        Some(fit) => t
            .iter()
            .zip(y)
            .map(|(ti, v)| v - (fit.intercept + fit.slope * ti))
            .collect(),
        None => {
            let m = mean(y);
            y.iter().map(|v| v - m).collect()
        }
    }
}

/// Mean detrended value per cycle position, scaled by the series level.
fn seasonal_indices(residuals: &[f64], t: &[f64], period: usize, level: f64) -> Vec<f64> {
    let mut sums = vec![0.0; period];
    let mut counts = vec![0usize; period];
    for (r, ti) in residuals.iter().zip(t) {
        let phase = (ti.max(0.0) as usize) % period;
        sums[phase] += r;
        counts[phase] += 1;
    }
    sums.iter()
        .zip(&counts)
        .map(|(s, c)| if *c == 0 { 0.0 } else { s / *c as f64 / level })
        .collect()
}

fn seasonality(t: &[f64], y: &[f64], frequency: Frequency) -> Analysis<Seasonality> {
    let Some(period) = frequency.period() else {
        return Analysis::not_applicable("no seasonal period for custom spacing");
    };
    if y.len() < 2 * period {
        return Analysis::not_applicable(format!("needs two full cycles of {period}"));
    }
    let residuals = detrended(t, y);
    let level = {
        let m = y.iter().map(|v| v.abs()).sum::<f64>() / y.len() as f64;
        if m > f64::EPSILON {
            m
        } else {
            std_dev(y).max(1.0)
        }
    };
    let indices = seasonal_indices(&residuals, t, period, level);
    let strength = std_dev(&indices);
    let span = t.last().zip(t.first()).map_or(0.0, |(l, f)| l - f);
    let yearly = (frequency == Frequency::Daily && span >= 729.0)
        .then(|| std_dev(&seasonal_indices(&residuals, t, 365, level)) > SEASONALITY_THRESHOLD);
    Analysis::Complete(Seasonality {
        period,
        detected: strength > SEASONALITY_THRESHOLD,
        indices,
        strength,
        yearly,
    })
}

fn forecast(t: &[f64], y: &[f64], last: DateTime<Utc>, step_seconds: f64) -> Analysis<Forecast> {
    let n = y.len();
    let horizon = MAX_FORECAST_STEPS.min(n / 5);
    if horizon == 0 {
        return Analysis::not_applicable("series too short to extend");
    }
    let Some(fit) = fit_line(t, y) else {
        return Analysis::not_applicable("no time variation to extrapolate");
    };
    let residuals: Vec<f64> = t
        .iter()
        .zip(y)
        .map(|(ti, v)| v - (fit.intercept + fit.slope * ti))
        .collect();
    let sigma = population_variance(&residuals).sqrt();
    let t_last = t.last().copied().unwrap_or(0.0);
    let step_ms = (step_seconds * 1000.0).round() as i64;
    let points = (1..=horizon)
        .map(|k| {
            let value = fit.intercept + fit.slope * (t_last + k as f64);
            ForecastPoint {
                timestamp: last + ChronoDuration::milliseconds(step_ms * k as i64),
                value,
                lower: value - 2.0 * sigma,
                upper: value + 2.0 * sigma,
            }
        })
        .collect();
    Analysis::Complete(Forecast {
        method: "linear".into(),
        horizon,
        points,
        confidence: "low".into(),
    })
}

/// One numeric column against the shared time axis.
///
/// `steps` holds each observation's offset from the first timestamp in
/// median intervals. Decomposition needs consecutive observations and is
/// withheld on a sampled run.
fn analyze_series(
    name: &str,
    values: &[Option<f64>],
    steps: &[f64],
    frequency: Frequency,
    last: DateTime<Utc>,
    step_seconds: f64,
    consecutive: bool,
) -> Analysis<SeriesAnalysis> {
    let (t, y): (Vec<f64>, Vec<f64>) = steps
        .iter()
        .zip(values)
        .filter_map(|(s, v)| v.map(|v| (*s, v)))
        .unzip();
    let coverage = if values.is_empty() { 0.0 } else { y.len() as f64 / values.len() as f64 };
    if coverage < MIN_COVERAGE {
        return Analysis::not_applicable(format!(
            "only {:.0}% of timestamps carry a value",
            coverage * 100.0
        ));
    }
    if y.len() < MIN_TIMESTAMPS {
        return Analysis::not_applicable(format!("needs {MIN_TIMESTAMPS} observations"));
    }
    let decomposition = match frequency.period() {
        None => Analysis::not_applicable("no seasonal period for custom spacing"),
        Some(_) if !consecutive => Analysis::not_applicable("sampled rows are not consecutive observations"),
        Some(p) => decomposition::decompose(&y, p)
            .map_or_else(|| Analysis::not_applicable("fewer than two full cycles"), Analysis::Complete),
    };
    Analysis::Complete(SeriesAnalysis {
        n: y.len(),
        coverage,
        trend: trend(name, &t, &y),
        seasonality: seasonality(&t, &y, frequency),
        stationarity: stationarity::assess(&y),
        structural_breaks: stationarity::structural_breaks(&y),
        decomposition,
        forecast: forecast(&t, &y, last, step_seconds),
    })
}

/// Analyze the first date column with enough timestamps.
///
/// `source_rows` is the sample's row positions in the original input, or
/// `None` when every row was kept. Input rows are expected in time order.
pub fn analyze(
    data: &Dataset,
    source_rows: Option<&[usize]>,
    cancel: &CancelToken,
) -> Result<Analysis<TimeSeriesAnalysis>> {
    let candidate = data.date_columns().into_iter().find_map(|column| {
        let mut stamped: Vec<(DateTime<Utc>, usize)> = data
            .date_column(&column)
            .into_iter()
            .enumerate()
            .filter_map(|(row, d)| d.map(|d| (d, row)))
            .collect();
        (stamped.len() >= MIN_TIMESTAMPS).then(|| {
            stamped.sort();
            (column, stamped)
        })
    });
    let Some((date_column, stamped)) = candidate else {
        return Ok(Analysis::not_applicable(format!(
            "needs a date column with at least {MIN_TIMESTAMPS} valid timestamps"
        )));
    };
    let source_rows = source_rows.filter(|p| p.len() == data.row_count());

    let (median_interval, cv) = interval_stats(&step_intervals(&stamped, source_rows));
    if cv.is_nan() || cv > MAX_INTERVAL_CV || median_interval <= 0.0 {
        return Ok(Analysis::not_applicable(format!(
            "irregular spacing: interval CV {cv:.2} exceeds {MAX_INTERVAL_CV}"
        )));
    }
    let frequency = Frequency::from_interval(median_interval);
    let times: Vec<DateTime<Utc>> = stamped.iter().map(|(d, _)| *d).collect();
    let (start, end) = (times[0], times[times.len() - 1]);
    let span_seconds = (end - start).num_milliseconds() as f64 / 1000.0;
    let expected = (span_seconds / median_interval).round() as usize + 1;
    // Input rows between the first and last stamp; all of them when unsampled.
    let present = match source_rows {
        Some(p) => {
            let (lo, hi) = stamped
                .iter()
                .fold((usize::MAX, 0), |(lo, hi), (_, row)| (lo.min(p[*row]), hi.max(p[*row])));
            hi - lo + 1
        }
        None => {
            let mut distinct = times.clone();
            distinct.dedup();
            distinct.len()
        }
    };
    let steps: Vec<f64> = times
        .iter()
        .map(|t| ((*t - start).num_milliseconds() as f64 / 1000.0 / median_interval).round())
        .collect();

    let mut series = IndexMap::new();
    for column in data.numeric_columns() {
        if cancel.is_cancelled() {
            return Err(TabulaError::Cancelled);
        }
        let column_values = data.numeric_column(&column);
        let ordered: Vec<Option<f64>> = stamped.iter().map(|(_, row)| column_values[*row]).collect();
        series.insert(
            column.clone(),
            analyze_series(
                &column,
                &ordered,
                &steps,
                frequency,
                end,
                median_interval,
                source_rows.is_none(),
            ),
        );
    }

    Ok(Analysis::Complete(TimeSeriesAnalysis {
        date_column,
        frequency,
        median_interval_seconds: median_interval,
        interval_cv: cv,
        start,
        end,
        span_days: span_seconds / DAY,
        observations: times.len(),
        expected_observations: expected,
        missing_periods: expected.saturating_sub(present),
        series,
    }))
}

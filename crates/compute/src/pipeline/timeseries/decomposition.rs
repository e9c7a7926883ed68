//! Classical additive decomposition: centered moving-average trend,
//! period-aligned seasonal means, and the residual.

use serde::{Deserialize, Serialize};

use crate::algorithms::descriptive::{mean, population_variance};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decomposition {
    pub period: usize,
    /// `None` where the moving-average window runs off either end.
    pub trend: Vec<Option<f64>>,
    pub seasonal: Vec<f64>,
    pub residual: Vec<Option<f64>>,
    /// One value per position in the cycle, summing to zero.
    pub seasonal_pattern: Vec<f64>,
    /// var(seasonal) / (var(seasonal) + var(residual)).
    pub seasonal_strength: f64,
    pub trend_strength: f64,
}

/// Centered moving average. Even windows use the 2×m average so the result
/// stays aligned with observations.
pub fn centered_moving_average(y: &[f64], window: usize) -> Vec<Option<f64>> {
    let n = y.len();
    let half = window / 2;
    (0..n)
        .map(|i| {
            if i < half || i + half >= n {
                return None;
            }
            if window % 2 == 1 {
                Some(mean(&y[i - half..=i + half]))
            } else {
                let inner: f64 = y[i - half + 1..i + half].iter().sum();
                Some((0.5 * y[i - half] + inner + 0.5 * y[i + half]) / window as f64)
            }
        })
        .collect()
}

pub fn decompose(y: &[f64], period: usize) -> Option<Decomposition> {
    let n = y.len();
    if period < 2 || n < 2 * period {
        return None;
    }
    let trend = centered_moving_average(y, period);

    let mut sums = vec![0.0; period];
    let mut counts = vec![0usize; period];
    for (i, t) in trend.iter().enumerate() {
        if let Some(t) = t {
            sums[i % period] += y[i] - t;
            counts[i % period] += 1;
        }
    }
    if counts.iter().any(|c| *c == 0) {
        return None;
    }
    let raw: Vec<f64> = sums.iter().zip(&counts).map(|(s, c)| s / *c as f64).collect();
    let offset = mean(&raw);
    let seasonal_pattern: Vec<f64> = raw.iter().map(|v| v - offset).collect();
    let seasonal: Vec<f64> = (0..n).map(|i| seasonal_pattern[i % period]).collect();

    let residual: Vec<Option<f64>> = trend
        .iter()
        .enumerate()
        .map(|(i, t)| t.map(|t| y[i] - t - seasonal[i]))
        .collect();

    let mut s_defined = Vec::new();
    let mut r_defined = Vec::new();
    let mut tr_defined = Vec::new();
    for i in 0..n {
        if let (Some(t), Some(r)) = (trend[i], residual[i]) {
            s_defined.push(seasonal[i]);
            r_defined.push(r);
            tr_defined.push(t + r);
        }
    }
    let var_s = population_variance(&s_defined);
    let var_r = population_variance(&r_defined);
    let var_tr = population_variance(&tr_defined);
    let seasonal_strength = if var_s + var_r <= f64::EPSILON {
        0.0
    } else {
        var_s / (var_s + var_r)
    };
    let trend_strength = if var_tr <= f64::EPSILON {
        0.0
    } else {
        (1.0 - var_r / var_tr).max(0.0)
    };

    Some(Decomposition {
        period,
        trend,
        seasonal,
        residual,
        seasonal_pattern,
        seasonal_strength,
        trend_strength,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moving_average_of_line_is_line() {
        let y: Vec<f64> = (0..20).map(f64::from).collect();
        let odd = centered_moving_average(&y, 5);
        assert_eq!(odd[0], None);
        assert!((odd[10].unwrap() - 10.0).abs() < 1e-12);
        let even = centered_moving_average(&y, 4);
        assert!((even[10].unwrap() - 10.0).abs() < 1e-12);
        assert_eq!(even[18], None);
    }

    #[test]
    fn recovers_weekly_pattern() {
        let pattern = [5.0, -2.0, -2.0, -1.0, 0.0, 1.0, -1.0];
        let y: Vec<f64> = (0..70)
            .map(|i| 100.0 + 0.5 * i as f64 + pattern[i % 7])
            .collect();
        let d = decompose(&y, 7).unwrap();
        for (got, want) in d.seasonal_pattern.iter().zip(pattern) {
            assert!((got - want).abs() < 1e-9, "{got} vs {want}");
        }
        assert!(d.seasonal_strength > 0.99);
        assert!(d.trend_strength > 0.9);
    }

    #[test]
    fn too_short_for_two_cycles() {
        assert!(decompose(&[1.0; 13], 7).is_none());
    }
}

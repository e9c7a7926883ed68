//! Distribution helpers for p-values and critical values, backed by `statrs`.
//!
//! Invalid parameters (e.g. non-positive degrees of freedom) yield a p-value
//! of 1.0, i.e. "no evidence", rather than an error.

use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor, Normal, StudentsT};

pub fn normal_cdf(x: f64) -> f64 {
    Normal::new(0.0, 1.0).map(|n| n.cdf(x)).unwrap_or(0.5)
}

/// Inverse standard normal CDF. `p` is clamped into the open unit interval.
pub fn normal_quantile(p: f64) -> f64 {
    let p = p.clamp(1e-12, 1.0 - 1e-12);
    Normal::new(0.0, 1.0).map(|n| n.inverse_cdf(p)).unwrap_or(0.0)
}

/// Two-tailed p-value of a Student-t statistic.
pub fn t_two_tailed(t: f64, df: f64) -> f64 {
    if !t.is_finite() {
        return if t.is_nan() { 1.0 } else { 0.0 };
    }
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => (2.0 * dist.sf(t.abs())).clamp(0.0, 1.0),
        Err(_) => 1.0,
    }
}

/// Upper critical value of Student-t at tail probability `p`.
pub fn t_quantile_upper(p: f64, df: f64) -> f64 {
    let p = p.clamp(1e-12, 1.0 - 1e-12);
    StudentsT::new(0.0, 1.0, df)
        .map(|d| d.inverse_cdf(1.0 - p))
        .unwrap_or(f64::INFINITY)
}

/// Upper-tail probability of a chi-square statistic.
pub fn chi_square_sf(x: f64, df: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    if !x.is_finite() {
        return 0.0;
    }
    ChiSquared::new(df).map(|d| d.sf(x)).unwrap_or(1.0)
}

/// Upper-tail probability of an F statistic.
pub fn f_sf(f: f64, df1: f64, df2: f64) -> f64 {
    if f <= 0.0 {
        return 1.0;
    }
    if !f.is_finite() {
        return 0.0;
    }
    FisherSnedecor::new(df1, df2).map(|d| d.sf(f)).unwrap_or(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_reference_points() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-12);
        assert!((normal_cdf(1.96) - 0.975).abs() < 1e-3);
        assert!((normal_quantile(0.975) - 1.959964).abs() < 1e-4);
    }

    #[test]
    fn t_test_reference_points() {
        // t = 2.228 is the 5% two-tailed critical value at df = 10.
        assert!((t_two_tailed(2.228, 10.0) - 0.05).abs() < 1e-3);
        assert!((t_quantile_upper(0.025, 10.0) - 2.228).abs() < 1e-3);
        assert_eq!(t_two_tailed(f64::INFINITY, 10.0), 0.0);
        assert_eq!(t_two_tailed(1.0, 0.0), 1.0);
    }

    #[test]
    fn chi_square_reference_points() {
        assert!((chi_square_sf(5.991, 2.0) - 0.05).abs() < 1e-3);
        assert!((chi_square_sf(3.841, 1.0) - 0.05).abs() < 1e-3);
        assert_eq!(chi_square_sf(0.0, 1.0), 1.0);
    }

    #[test]
    fn f_reference_points() {
        assert!((f_sf(4.96, 1.0, 10.0) - 0.05).abs() < 2e-3);
        assert_eq!(f_sf(f64::INFINITY, 1.0, 10.0), 0.0);
    }
}

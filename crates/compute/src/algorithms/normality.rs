//! Goodness-of-fit kernels: Shapiro-Wilk, Anderson-Darling, Jarque-Bera,
//! Q-Q correlation and one-sample Kolmogorov-Smirnov.
//!
//! p-values here are approximations suitable for screening, not for
//! publication.

use serde::{Deserialize, Serialize};

use super::descriptive::{mean, pearson, sorted, std_dev};
use super::probability::{chi_square_sf, normal_cdf, normal_quantile};

/// Significance level used by every test in this module.
pub const ALPHA: f64 = 0.05;

/// Anderson-Darling critical value at 5% for the size-adjusted statistic.
pub const AD_CRITICAL: f64 = 0.752;

/// Chi-square(2) critical value at 5%.
pub const JB_CRITICAL: f64 = 5.991;

/// Largest sample Shapiro-Wilk is evaluated on; bigger inputs are thinned.
const SW_MAX_N: usize = 5000;

/// Shapiro & Wilk (1965) coefficients for n = 3..=50, largest first:
/// `a_n, a_{n-1}, ..., a_{n-k+1}` with k = n / 2. The lower half is the
/// negated mirror and the middle weight of an odd sample is zero.
const SW_TABLE: [&[f64]; 48] = [
    &[0.7071],
    &[0.6872, 0.1677],
    &[0.6646, 0.2413],
    &[0.6431, 0.2806, 0.0875],
    &[0.6233, 0.3031, 0.1401],
    &[0.6052, 0.3164, 0.1743, 0.0561],
    &[0.5888, 0.3244, 0.1976, 0.0947],
    &[0.5739, 0.3291, 0.2141, 0.1224, 0.0399],
    &[0.5601, 0.3315, 0.2260, 0.1429, 0.0695],
    &[0.5475, 0.3325, 0.2347, 0.1586, 0.0922, 0.0303],
    &[0.5359, 0.3325, 0.2412, 0.1707, 0.1099, 0.0539],
    &[0.5251, 0.3318, 0.2460, 0.1802, 0.1240, 0.0727, 0.0240],
    &[0.5150, 0.3306, 0.2495, 0.1878, 0.1353, 0.0880, 0.0433],
    &[0.5056, 0.3290, 0.2521, 0.1939, 0.1447, 0.1005, 0.0593, 0.0196],
    &[0.4968, 0.3273, 0.2540, 0.1988, 0.1524, 0.1109, 0.0725, 0.0359],
    &[0.4886, 0.3253, 0.2553, 0.2027, 0.1587, 0.1197, 0.0837, 0.0496, 0.0163],
    &[0.4808, 0.3232, 0.2561, 0.2059, 0.1641, 0.1271, 0.0932, 0.0612, 0.0303],
    &[0.4734, 0.3211, 0.2565, 0.2085, 0.1686, 0.1334, 0.1013, 0.0711, 0.0422, 0.0140],
    &[0.4643, 0.3185, 0.2578, 0.2119, 0.1736, 0.1399, 0.1092, 0.0804, 0.0530, 0.0263],
    &[0.4590, 0.3156, 0.2571, 0.2131, 0.1764, 0.1443, 0.1150, 0.0878, 0.0618, 0.0368, 0.0122],
    &[0.4542, 0.3126, 0.2563, 0.2139, 0.1787, 0.1480, 0.1201, 0.0941, 0.0696, 0.0459, 0.0228],
    &[
        0.4493, 0.3098, 0.2554, 0.2145, 0.1807, 0.1512, 0.1245, 0.0997, 0.0764, 0.0539, 0.0321,
        0.0107,
    ],
    &[
        0.4450, 0.3069, 0.2543, 0.2148, 0.1822, 0.1539, 0.1283, 0.1046, 0.0823, 0.0610, 0.0403,
        0.0200,
    ],
    &[
        0.4407, 0.3043, 0.2533, 0.2151, 0.1836, 0.1563, 0.1316, 0.1089, 0.0876, 0.0672, 0.0476,
        0.0284, 0.0094,
    ],
    &[
        0.4366, 0.3018, 0.2522, 0.2152, 0.1848, 0.1584, 0.1346, 0.1128, 0.0923, 0.0728, 0.0540,
        0.0358, 0.0178,
    ],
    &[
        0.4328, 0.2992, 0.2510, 0.2151, 0.1857, 0.1601, 0.1372, 0.1162, 0.0965, 0.0778, 0.0598,
        0.0424, 0.0253, 0.0084,
    ],
    &[
        0.4291, 0.2968, 0.2499, 0.2150, 0.1864, 0.1616, 0.1395, 0.1192, 0.1002, 0.0822, 0.0650,
        0.0483, 0.0320, 0.0159,
    ],
    &[
        0.4254, 0.2944, 0.2487, 0.2148, 0.1870, 0.1630, 0.1415, 0.1219, 0.1036, 0.0862, 0.0697,
        0.0537, 0.0381, 0.0227, 0.0076,
    ],
    &[
        0.4220, 0.2921, 0.2475, 0.2145, 0.1874, 0.1641, 0.1433, 0.1243, 0.1066, 0.0899, 0.0739,
        0.0585, 0.0435, 0.0289, 0.0144,
    ],
    &[
        0.4188, 0.2898, 0.2463, 0.2141, 0.1878, 0.1651, 0.1449, 0.1265, 0.1093, 0.0931, 0.0777,
        0.0629, 0.0485, 0.0344, 0.0206, 0.0068,
    ],
    &[
        0.4156, 0.2876, 0.2451, 0.2137, 0.1880, 0.1660, 0.1463, 0.1284, 0.1118, 0.0961, 0.0812,
        0.0669, 0.0530, 0.0395, 0.0262, 0.0131,
    ],
    &[
        0.4127, 0.2854, 0.2439, 0.2132, 0.1882, 0.1667, 0.1475, 0.1301, 0.1140, 0.0988, 0.0844,
        0.0706, 0.0572, 0.0441, 0.0314, 0.0187, 0.0062,
    ],
    &[
        0.4096, 0.2834, 0.2427, 0.2127, 0.1883, 0.1673, 0.1487, 0.1317, 0.1160, 0.1013, 0.0873,
        0.0739, 0.0610, 0.0484, 0.0361, 0.0239, 0.0119,
    ],
    &[
        0.4068, 0.2813, 0.2415, 0.2121, 0.1883, 0.1678, 0.1496, 0.1331, 0.1179, 0.1036, 0.0900,
        0.0770, 0.0645, 0.0523, 0.0404, 0.0287, 0.0172, 0.0057,
    ],
    &[
        0.4040, 0.2794, 0.2403, 0.2116, 0.1883, 0.1683, 0.1505, 0.1344, 0.1196, 0.1056, 0.0924,
        0.0798, 0.0677, 0.0559, 0.0444, 0.0331, 0.0220, 0.0110,
    ],
    &[
        0.4015, 0.2774, 0.2391, 0.2110, 0.1881, 0.1686, 0.1513, 0.1356, 0.1211, 0.1075, 0.0947,
        0.0824, 0.0706, 0.0592, 0.0481, 0.0372, 0.0264, 0.0158, 0.0053,
    ],
    &[
        0.3989, 0.2755, 0.2380, 0.2104, 0.1880, 0.1689, 0.1520, 0.1366, 0.1225, 0.1092, 0.0967,
        0.0848, 0.0733, 0.0622, 0.0515, 0.0409, 0.0305, 0.0203, 0.0101,
    ],
    &[
        0.3964, 0.2737, 0.2368, 0.2098, 0.1878, 0.1691, 0.1526, 0.1376, 0.1237, 0.1108, 0.0986,
        0.0870, 0.0759, 0.0651, 0.0546, 0.0444, 0.0343, 0.0244, 0.0146, 0.0049,
    ],
    &[
        0.3940, 0.2719, 0.2357, 0.2091, 0.1876, 0.1693, 0.1531, 0.1384, 0.1249, 0.1123, 0.1004,
        0.0891, 0.0782, 0.0677, 0.0575, 0.0476, 0.0379, 0.0283, 0.0188, 0.0094,
    ],
    &[
        0.3917, 0.2701, 0.2345, 0.2085, 0.1874, 0.1694, 0.1535, 0.1392, 0.1259, 0.1136, 0.1020,
        0.0909, 0.0804, 0.0701, 0.0602, 0.0506, 0.0411, 0.0318, 0.0227, 0.0136, 0.0045,
    ],
    &[
        0.3894, 0.2684, 0.2334, 0.2078, 0.1871, 0.1695, 0.1539, 0.1398, 0.1269, 0.1149, 0.1035,
        0.0927, 0.0824, 0.0724, 0.0628, 0.0534, 0.0442, 0.0352, 0.0263, 0.0175, 0.0087,
    ],
    &[
        0.3872, 0.2667, 0.2323, 0.2072, 0.1868, 0.1695, 0.1542, 0.1405, 0.1278, 0.1160, 0.1049,
        0.0943, 0.0842, 0.0745, 0.0651, 0.0560, 0.0471, 0.0383, 0.0296, 0.0211, 0.0126, 0.0042,
    ],
    &[
        0.3850, 0.2651, 0.2313, 0.2065, 0.1865, 0.1695, 0.1545, 0.1410, 0.1286, 0.1170, 0.1062,
        0.0959, 0.0860, 0.0765, 0.0673, 0.0584, 0.0497, 0.0412, 0.0328, 0.0245, 0.0163, 0.0081,
    ],
    &[
        0.3830, 0.2635, 0.2302, 0.2058, 0.1862, 0.1695, 0.1548, 0.1415, 0.1293, 0.1180, 0.1073,
        0.0972, 0.0876, 0.0783, 0.0694, 0.0607, 0.0522, 0.0439, 0.0357, 0.0277, 0.0197, 0.0118,
        0.0039,
    ],
    &[
        0.3808, 0.2620, 0.2291, 0.2052, 0.1859, 0.1695, 0.1550, 0.1420, 0.1300, 0.1189, 0.1085,
        0.0986, 0.0892, 0.0801, 0.0713, 0.0628, 0.0546, 0.0465, 0.0385, 0.0307, 0.0229, 0.0153,
        0.0076,
    ],
    &[
        0.3789, 0.2604, 0.2281, 0.2045, 0.1855, 0.1693, 0.1551, 0.1423, 0.1306, 0.1197, 0.1095,
        0.0998, 0.0906, 0.0817, 0.0731, 0.0648, 0.0568, 0.0489, 0.0411, 0.0335, 0.0259, 0.0185,
        0.0111, 0.0037,
    ],
    &[
        0.3770, 0.2589, 0.2271, 0.2038, 0.1851, 0.1692, 0.1553, 0.1427, 0.1312, 0.1205, 0.1105,
        0.1010, 0.0919, 0.0832, 0.0748, 0.0667, 0.0588, 0.0511, 0.0436, 0.0361, 0.0288, 0.0215,
        0.0143, 0.0071,
    ],
    &[
        0.3751, 0.2574, 0.2260, 0.2032, 0.1847, 0.1691, 0.1554, 0.1430, 0.1317, 0.1212, 0.1113,
        0.1020, 0.0932, 0.0846, 0.0764, 0.0685, 0.0608, 0.0532, 0.0459, 0.0386, 0.0314, 0.0244,
        0.0174, 0.0104, 0.0035,
    ],
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub name: String,
    pub statistic: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critical_value: Option<f64>,
    /// True when the null hypothesis (data fits the reference) is rejected.
    pub rejected: bool,
}

/// Expected normal order statistics (Blom scores).
fn blom_scores(n: usize) -> Vec<f64> {
    let nf = n as f64;
    (1..=n)
        .map(|i| normal_quantile((i as f64 - 0.375) / (nf + 0.25)))
        .collect()
}

fn poly(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Evenly spaced order statistics so large inputs stay within the valid range.
fn thin_sorted(sorted: &[f64], max_n: usize) -> Vec<f64> {
    if sorted.len() <= max_n {
        return sorted.to_vec();
    }
    let step = (sorted.len() - 1) as f64 / (max_n - 1) as f64;
    (0..max_n)
        .map(|i| sorted[((i as f64 * step).round() as usize).min(sorted.len() - 1)])
        .collect()
}

/// Full antisymmetric weight vector from the published table.
fn tabulated_weights(n: usize) -> Option<Vec<f64>> {
    let half = SW_TABLE.get(n.checked_sub(3)?)?;
    let mut a = vec![0.0; n];
    for (i, w) in half.iter().enumerate() {
        a[n - 1 - i] = *w;
        a[i] = -*w;
    }
    Some(a)
}

/// Royston's weights: Blom scores with polynomial corrections for the two
/// extreme weights. Used past the end of the table.
fn royston_weights(n: usize) -> Vec<f64> {
    let scores = blom_scores(n);
    let sum_m2: f64 = scores.iter().map(|v| v * v).sum();
    let u = 1.0 / (n as f64).sqrt();
    let c_n = scores[n - 1] / sum_m2.sqrt();
    let c_n1 = scores[n - 2] / sum_m2.sqrt();

    let a_n = c_n + poly(&[0.0, 0.221157, -0.147981, -2.071190, 4.434685, -2.706056], u);
    let a_n1 = c_n1 + poly(&[0.0, 0.042981, -0.293762, -1.752461, 5.682633, -3.582633], u);
    let phi = (sum_m2 - 2.0 * scores[n - 1].powi(2) - 2.0 * scores[n - 2].powi(2))
        / (1.0 - 2.0 * a_n.powi(2) - 2.0 * a_n1.powi(2));
    let mut a: Vec<f64> = scores.iter().map(|m| m / phi.sqrt()).collect();
    a[n - 1] = a_n;
    a[n - 2] = a_n1;
    a[0] = -a_n;
    a[1] = -a_n1;
    a
}

/// Shapiro-Wilk W.
///
/// Weights come from the Shapiro & Wilk table up to n = 50 and from
/// Royston's approximation beyond it. The p-value is exact for n = 3 and
/// otherwise maps W through Royston's log transform onto an approximately
/// standard normal variable.
pub fn shapiro_wilk(values: &[f64]) -> Option<TestResult> {
    let x = thin_sorted(&sorted(values), SW_MAX_N);
    let n = x.len();
    if n < 3 {
        return None;
    }
    let m = mean(&x);
    let ss: f64 = x.iter().map(|v| (v - m).powi(2)).sum();
    if ss <= f64::EPSILON {
        return None;
    }
    let a = tabulated_weights(n).unwrap_or_else(|| royston_weights(n));

    let numerator: f64 = a.iter().zip(&x).map(|(ai, xi)| ai * xi).sum::<f64>().powi(2);
    let w = (numerator / ss).clamp(0.0, 1.0);

    let nf = n as f64;
    let z = if n == 3 {
        // Exact distribution; W cannot fall below 0.75 for three points.
        let p = 6.0 / std::f64::consts::PI * (w.sqrt().asin() - 0.75f64.sqrt().asin());
        normal_quantile(1.0 - p.clamp(1e-12, 1.0 - 1e-12))
    } else if n <= 11 {
        let gamma = 0.459 * nf - 2.273;
        let wt = -(gamma - (1.0 - w).max(1e-300).ln()).max(1e-300).ln();
        let mu = 0.5440 - 0.39978 * nf + 0.025054 * nf.powi(2) - 0.0006714 * nf.powi(3);
        let sigma = (1.3822 - 0.77857 * nf + 0.062767 * nf.powi(2) - 0.0020322 * nf.powi(3)).exp();
        (wt - mu) / sigma
    } else {
        let ln_n = nf.ln();
        let mu = 0.0038915 * ln_n.powi(3) - 0.083751 * ln_n.powi(2) - 0.31082 * ln_n - 1.5861;
        let sigma = (0.0030302 * ln_n.powi(2) - 0.082676 * ln_n - 0.4803).exp();
        ((1.0 - w).max(1e-300).ln() - mu) / sigma
    };
    let p = (1.0 - normal_cdf(z)).clamp(0.0, 1.0);

    Some(TestResult {
        name: "shapiro-wilk".into(),
        statistic: w,
        p_value: Some(p),
        critical_value: None,
        rejected: p < ALPHA,
    })
}

/// Anderson-Darling against a normal with estimated parameters.
pub fn anderson_darling(values: &[f64]) -> Option<TestResult> {
    let n = values.len();
    if n < 8 {
        return None;
    }
    let m = mean(values);
    let s = std_dev(values);
    if s <= f64::EPSILON {
        return None;
    }
    let z: Vec<f64> = sorted(values).iter().map(|v| (v - m) / s).collect();
    let nf = n as f64;
    let cdf: Vec<f64> = z
        .iter()
        .map(|v| normal_cdf(*v).clamp(1e-12, 1.0 - 1e-12))
        .collect();
    let sum: f64 = (0..n)
        .map(|i| (2.0 * (i + 1) as f64 - 1.0) * (cdf[i].ln() + (1.0 - cdf[n - 1 - i]).ln()))
        .sum();
    let a2 = -nf - sum / nf;
    let adjusted = a2 * (1.0 + 0.75 / nf + 2.25 / nf.powi(2));

    let p = if adjusted >= 0.6 {
        (1.2937 - 5.709 * adjusted + 0.0186 * adjusted.powi(2)).exp()
    } else if adjusted >= 0.34 {
        (0.9177 - 4.279 * adjusted - 1.38 * adjusted.powi(2)).exp()
    } else if adjusted >= 0.2 {
        1.0 - (-8.318 + 42.796 * adjusted - 59.938 * adjusted.powi(2)).exp()
    } else {
        1.0 - (-13.436 + 101.14 * adjusted - 223.73 * adjusted.powi(2)).exp()
    };

    Some(TestResult {
        name: "anderson-darling".into(),
        statistic: adjusted,
        p_value: Some(p.clamp(0.0, 1.0)),
        critical_value: Some(AD_CRITICAL),
        rejected: adjusted > AD_CRITICAL,
    })
}

/// Jarque-Bera from population skewness and excess kurtosis.
pub fn jarque_bera(values: &[f64]) -> Option<TestResult> {
    let n = values.len();
    if n < 8 {
        return None;
    }
    let nf = n as f64;
    let m = mean(values);
    let m2 = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / nf;
    if m2 <= f64::EPSILON {
        return None;
    }
    let m3 = values.iter().map(|v| (v - m).powi(3)).sum::<f64>() / nf;
    let m4 = values.iter().map(|v| (v - m).powi(4)).sum::<f64>() / nf;
    let skew = m3 / m2.powf(1.5);
    let kurt = m4 / m2.powi(2) - 3.0;
    let jb = nf / 6.0 * (skew.powi(2) + kurt.powi(2) / 4.0);

    Some(TestResult {
        name: "jarque-bera".into(),
        statistic: jb,
        p_value: Some(chi_square_sf(jb, 2.0)),
        critical_value: Some(JB_CRITICAL),
        rejected: jb > JB_CRITICAL,
    })
}

/// Q-Q plot correlation against normal scores plus a tail check.
///
/// Rejects when the correlation drops below 0.95 or the outer 5% on either
/// side sits on average more than one standard deviation off the line.
pub fn qq_correlation(values: &[f64]) -> Option<TestResult> {
    let n = values.len();
    if n < 8 {
        return None;
    }
    let m = mean(values);
    let s = std_dev(values);
    if s <= f64::EPSILON {
        return None;
    }
    let z: Vec<f64> = sorted(values).iter().map(|v| (v - m) / s).collect();
    let q = blom_scores(n);
    let r = pearson(&z, &q)?;

    let tail = ((n as f64 * 0.05).ceil() as usize).max(1);
    let lower: f64 = (0..tail).map(|i| (z[i] - q[i]).abs()).sum::<f64>() / tail as f64;
    let upper: f64 =
        (n - tail..n).map(|i| (z[i] - q[i]).abs()).sum::<f64>() / tail as f64;
    let tail_deviation = lower.max(upper);

    Some(TestResult {
        name: "qq-correlation".into(),
        statistic: r,
        p_value: None,
        critical_value: Some(0.95),
        rejected: r < 0.95 || tail_deviation > 1.0,
    })
}

/// Asymptotic Kolmogorov distribution tail.
fn kolmogorov_p(d: f64, n: usize) -> f64 {
    let sqrt_n = (n as f64).sqrt();
    let lambda = (sqrt_n + 0.12 + 0.11 / sqrt_n) * d;
    if lambda < 0.2 {
        return 1.0;
    }
    let mut sum = 0.0;
    for k in 1..=100 {
        let kf = k as f64;
        let term = 2.0 * (-1.0f64).powi(k - 1) * (-2.0 * kf * kf * lambda * lambda).exp();
        sum += term;
        if term.abs() < 1e-10 {
            break;
        }
    }
    sum.clamp(0.0, 1.0)
}

/// One-sample Kolmogorov-Smirnov against the given CDF.
pub fn kolmogorov_smirnov(values: &[f64], name: &str, cdf: impl Fn(f64) -> f64) -> Option<TestResult> {
    let n = values.len();
    if n < 5 {
        return None;
    }
    let x = sorted(values);
    let nf = n as f64;
    let d = x
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let f = cdf(v);
            ((i + 1) as f64 / nf - f).max(f - i as f64 / nf)
        })
        .fold(0.0, f64::max);
    let critical = 1.36 / nf.sqrt();

    Some(TestResult {
        name: name.to_string(),
        statistic: d,
        p_value: Some(kolmogorov_p(d, n)),
        critical_value: Some(critical),
        rejected: d > critical,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic, roughly normal sample from inverse-CDF of a regular grid.
    fn normal_sample(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 50.0 + 10.0 * normal_quantile((i as f64 + 0.5) / n as f64))
            .collect()
    }

    fn exponential_sample(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| -(1.0 - (i as f64 + 0.5) / n as f64).ln() * 3.0)
            .collect()
    }

    #[test]
    fn shapiro_accepts_normal_and_rejects_exponential() {
        let sw = shapiro_wilk(&normal_sample(100)).unwrap();
        assert!(sw.statistic > 0.98, "W = {}", sw.statistic);
        assert!(!sw.rejected);

        let sw = shapiro_wilk(&exponential_sample(100)).unwrap();
        assert!(sw.rejected, "W = {} p = {:?}", sw.statistic, sw.p_value);
    }

    #[test]
    fn shapiro_small_sample_path() {
        let sw = shapiro_wilk(&normal_sample(9)).unwrap();
        assert!(sw.statistic > 0.9 && sw.statistic <= 1.0);
        assert!(sw.p_value.unwrap() > 0.05);
        assert!(shapiro_wilk(&[1.0, 1.0, 1.0, 1.0, 1.0]).is_none());
    }

    #[test]
    fn shapiro_matches_the_published_weights_example() {
        // Shapiro & Wilk (1965): weights of 11 men, W = 0.79.
        let weights = [148.0, 154.0, 158.0, 160.0, 161.0, 162.0, 166.0, 170.0, 182.0, 195.0, 236.0];
        let sw = shapiro_wilk(&weights).unwrap();
        assert!((sw.statistic - 0.7888).abs() < 1e-3, "W = {}", sw.statistic);
        assert!(sw.rejected);
    }

    #[test]
    fn shapiro_table_rows_are_unit_vectors() {
        for n in 3..=50 {
            let a = tabulated_weights(n).unwrap();
            let norm: f64 = a.iter().map(|v| v * v).sum();
            assert!((norm - 1.0).abs() < 2e-3, "n = {n}: {norm}");
        }
        assert!(tabulated_weights(51).is_none());
        assert!(tabulated_weights(2).is_none());
    }

    #[test]
    fn shapiro_three_points_has_exact_p_value() {
        let sw = shapiro_wilk(&[1.0, 2.0, 4.0]).unwrap();
        assert!((sw.statistic - 0.9643).abs() < 1e-3);
        assert!((sw.p_value.unwrap() - 0.637).abs() < 5e-3);
    }

    #[test]
    fn anderson_and_jarque_bera_agree_on_shape() {
        let normal = normal_sample(200);
        assert!(!anderson_darling(&normal).unwrap().rejected);
        assert!(!jarque_bera(&normal).unwrap().rejected);

        let skewed = exponential_sample(200);
        assert!(anderson_darling(&skewed).unwrap().rejected);
        assert!(jarque_bera(&skewed).unwrap().rejected);
    }

    #[test]
    fn qq_correlation_near_one_for_normal() {
        let qq = qq_correlation(&normal_sample(100)).unwrap();
        assert!(qq.statistic > 0.99);
        assert!(!qq.rejected);
    }

    #[test]
    fn ks_uniform() {
        let uniform: Vec<f64> = (0..100).map(|i| i as f64 / 99.0).collect();
        let ks = kolmogorov_smirnov(&uniform, "uniform", |v| v.clamp(0.0, 1.0)).unwrap();
        assert!(ks.statistic < 0.02);
        assert!(!ks.rejected);

        let squeezed: Vec<f64> = uniform.iter().map(|v| v * v).collect();
        let ks = kolmogorov_smirnov(&squeezed, "uniform", |v| v.clamp(0.0, 1.0)).unwrap();
        assert!(ks.rejected);
    }
}

//! Chi-square distribution and the two-data-set comparison test.
//!
//! The comparison test decides whether two binned count vectors could have
//! been drawn from the same distribution. With unequal totals the bins are
//! rescaled by `w = sqrt(sum1 / sum2)`:
//!
//! ```text
//! X² = Σ (o1[i] / w - o2[i] * w)² / (o1[i] + o2[i])
//! ```
//!
//! and the p-value is the chi-square survival function at `X²` with
//! `bins - 1` degrees of freedom.

use serde::Serialize;

use super::gamma::{gamma_p, gamma_q};

/// Largest accepted significance level.
pub const MAX_SIGNIFICANCE_LEVEL: f64 = 0.5;

/// CDF of the chi-square distribution with `df` degrees of freedom.
pub fn chi_square_cdf(x: f64, df: f64) -> f64 {
    if x.is_nan() || df.is_nan() || df <= 0.0 {
        return f64::NAN;
    }
    if x <= 0.0 {
        return 0.0;
    }
    gamma_p(df / 2.0, x / 2.0)
}

/// Survival function `P(X > x)` of the chi-square distribution.
pub fn chi_square_survival(x: f64, df: f64) -> f64 {
    if x.is_nan() || df.is_nan() || df <= 0.0 {
        return f64::NAN;
    }
    if x <= 0.0 {
        return 1.0;
    }
    gamma_q(df / 2.0, x / 2.0)
}

/// Chi-square statistic comparing two binned data sets.
///
/// Returns `None` when the inputs cannot be compared: fewer than two bins,
/// mismatched lengths, an empty data set, or a bin that is zero in both.
pub fn data_sets_comparison_statistic(observed1: &[u64], observed2: &[u64]) -> Option<f64> {
    if observed1.len() < 2 || observed1.len() != observed2.len() {
        return None;
    }

    let sum1: u64 = observed1.iter().sum();
    let sum2: u64 = observed2.iter().sum();
    if sum1 == 0 || sum2 == 0 {
        return None;
    }

    let unequal_totals = sum1 != sum2;
    let weight = if unequal_totals {
        (sum1 as f64 / sum2 as f64).sqrt()
    } else {
        1.0
    };

    let mut statistic = 0.0;
    for (&o1, &o2) in observed1.iter().zip(observed2) {
        if o1 == 0 && o2 == 0 {
            return None;
        }
        let (o1, o2) = (o1 as f64, o2 as f64);
        let dev = if unequal_totals {
            o1 / weight - o2 * weight
        } else {
            o1 - o2
        };
        statistic += dev * dev / (o1 + o2);
    }
    Some(statistic)
}

/// p-value of the two-data-set comparison.
pub fn data_sets_comparison_p_value(observed1: &[u64], observed2: &[u64]) -> Option<f64> {
    let statistic = data_sets_comparison_statistic(observed1, observed2)?;
    Some(chi_square_survival(
        statistic,
        (observed1.len() - 1) as f64,
    ))
}

/// Outcome of a two-data-set chi-square comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChiSquareComparison {
    /// The X² statistic.
    pub statistic: f64,
    /// Degrees of freedom (`bins - 1`).
    pub degrees_of_freedom: f64,
    /// Probability of a statistic at least this large under the null.
    pub p_value: f64,
    /// Significance level the test was run at.
    pub alpha: f64,
    /// Whether the null hypothesis was rejected.
    pub significant: bool,
}

/// Run the comparison at significance level `alpha`.
///
/// The null hypothesis (both data sets share one distribution) is rejected
/// only when `p_value < alpha`; a p-value exactly at `alpha` is not
/// significant. `alpha` must lie in `(0, 0.5]`.
pub fn data_sets_comparison_test(
    observed1: &[u64],
    observed2: &[u64],
    alpha: f64,
) -> Option<ChiSquareComparison> {
    if !(alpha > 0.0 && alpha <= MAX_SIGNIFICANCE_LEVEL) {
        return None;
    }
    let statistic = data_sets_comparison_statistic(observed1, observed2)?;
    let degrees_of_freedom = (observed1.len() - 1) as f64;
    let p_value = chi_square_survival(statistic, degrees_of_freedom);
    Some(ChiSquareComparison {
        statistic,
        degrees_of_freedom,
        p_value,
        alpha,
        significant: p_value < alpha,
    })
}

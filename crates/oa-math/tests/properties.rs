//! Property-based tests for oa-math numerical functions.
//!
//! Uses proptest to verify mathematical properties hold across many random inputs.

use proptest::prelude::*;
use oa_math::{
    chi_square_cdf, chi_square_survival, data_sets_comparison_statistic,
    data_sets_comparison_test, gamma_p, gamma_q, log_gamma,
};

/// Tolerance for floating point comparisons.
const TOL: f64 = 1e-9;

/// Helper to check approximate equality.
fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    if a.is_nan() && b.is_nan() {
        return true;
    }
    if a.is_nan() || b.is_nan() {
        return false;
    }
    (a - b).abs() <= tol.max(tol * a.abs().max(b.abs()))
}

// ============================================================================
// log_gamma properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Recurrence: log Γ(x+1) = log Γ(x) + log x.
    #[test]
    fn log_gamma_recurrence(x in 0.1..50.0f64) {
        let lhs = log_gamma(x + 1.0);
        let rhs = log_gamma(x) + x.ln();
        prop_assert!(approx_eq(lhs, rhs, 1e-8), "x={} lhs={} rhs={}", x, lhs, rhs);
    }
}

// ============================================================================
// Incomplete gamma properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// P and Q partition unity.
    #[test]
    fn gamma_p_plus_q_is_one(a in 0.1..30.0f64, x in 0.0..80.0f64) {
        let total = gamma_p(a, x) + gamma_q(a, x);
        prop_assert!(approx_eq(total, 1.0, TOL), "a={} x={} total={}", a, x, total);
    }

    /// P(a, x) is non-decreasing in x.
    #[test]
    fn gamma_p_monotone(a in 0.1..30.0f64, x in 0.0..60.0f64, dx in 0.0..10.0f64) {
        let lo = gamma_p(a, x);
        let hi = gamma_p(a, x + dx);
        prop_assert!(hi + 1e-12 >= lo, "P({}, {})={} > P({}, {})={}", a, x, lo, a, x + dx, hi);
    }
}

// ============================================================================
// Chi-square properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// CDF stays in [0, 1] and complements the survival function.
    #[test]
    fn chi_square_cdf_in_unit_interval(x in 0.0..200.0f64, df in 1u32..10) {
        let cdf = chi_square_cdf(x, df as f64);
        let sf = chi_square_survival(x, df as f64);
        prop_assert!((0.0..=1.0).contains(&cdf));
        prop_assert!(approx_eq(cdf + sf, 1.0, TOL));
    }

    /// The statistic is symmetric in its two arguments.
    #[test]
    fn comparison_statistic_symmetric(
        a0 in 1u64..500, a1 in 1u64..500, b0 in 1u64..500, b1 in 1u64..500
    ) {
        let ab = data_sets_comparison_statistic(&[a0, a1], &[b0, b1]).unwrap();
        let ba = data_sets_comparison_statistic(&[b0, b1], &[a0, a1]).unwrap();
        prop_assert!(approx_eq(ab, ba, 1e-9), "ab={} ba={}", ab, ba);
        prop_assert!(ab >= 0.0);
    }

    /// Scaling one data set by a constant factor never looks significant.
    #[test]
    fn proportional_sets_not_significant(a0 in 1u64..200, a1 in 1u64..200, k in 1u64..20) {
        let outcome = data_sets_comparison_test(&[a0, a1], &[a0 * k, a1 * k], 0.001).unwrap();
        prop_assert!(!outcome.significant, "p={}", outcome.p_value);
    }

    /// A stricter alpha never turns a rejection into more rejections.
    #[test]
    fn stricter_alpha_rejects_less(
        a0 in 1u64..300, a1 in 1u64..300, b0 in 1u64..300, b1 in 1u64..300
    ) {
        let loose = data_sets_comparison_test(&[a0, a1], &[b0, b1], 0.05).unwrap();
        let strict = data_sets_comparison_test(&[a0, a1], &[b0, b1], 0.001).unwrap();
        prop_assert!(!strict.significant || loose.significant);
    }
}

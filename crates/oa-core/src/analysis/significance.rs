//! Significance filter over paired outlier / non-outlier term samples.
//!
//! A term is reported when it is relatively more frequent among outlier
//! instances than among non-outlier instances, and a chi-square comparison
//! of `[nonOutlierTermCount, nonOutlierCount]` against
//! `[outlierTermCount, outlierCount]` rejects equal distributions at the
//! requested significance level.

use std::cmp::Ordering;

use oa_common::VariableTerm;
use oa_math::data_sets_comparison_test;
use serde::Serialize;

use crate::gateway::TermSample;

/// Counts backing the decision for one (variable, term) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TermCounts {
    pub outlier_term_count: u64,
    pub outlier_count: u64,
    pub non_outlier_term_count: u64,
    pub non_outlier_count: u64,
}

impl TermCounts {
    pub fn ratio_in_outlier_set(&self) -> f64 {
        ratio(self.outlier_term_count, self.outlier_count)
    }

    /// 0 when the non-outlier population is empty.
    pub fn ratio_in_non_outlier_set(&self) -> f64 {
        ratio(self.non_outlier_term_count, self.non_outlier_count)
    }

    pub fn ratio_of_total_instances(&self) -> f64 {
        ratio(
            self.outlier_term_count,
            self.outlier_count + self.non_outlier_count,
        )
    }

    pub fn is_more_frequent_in_outlier_set(&self) -> bool {
        self.ratio_in_outlier_set() > self.ratio_in_non_outlier_set()
    }

    /// Chi-square comparison at `alpha`. Tables the test cannot evaluate
    /// (an empty non-outlier population, for one) are never significant.
    pub fn is_significant(&self, alpha: f64) -> bool {
        data_sets_comparison_test(
            &[self.non_outlier_term_count, self.non_outlier_count],
            &[self.outlier_term_count, self.outlier_count],
            alpha,
        )
        .is_some_and(|c| c.significant)
    }

    pub fn passes(&self, alpha: f64) -> bool {
        self.is_more_frequent_in_outlier_set() && self.is_significant(alpha)
    }
}

fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// Significant terms of the outlier sample, by outlier count descending and
/// then by variable name and term.
pub fn significant_terms(
    outliers: &TermSample,
    non_outliers: &TermSample,
    alpha: f64,
) -> Vec<VariableTerm> {
    if outliers.population_count == 0 {
        return Vec::new();
    }

    let mut result: Vec<VariableTerm> = outliers
        .terms
        .iter()
        .flat_map(|(name, terms)| terms.iter().map(move |(term, count)| (name, term, *count)))
        .filter_map(|(name, term, outlier_term_count)| {
            let counts = TermCounts {
                outlier_term_count,
                outlier_count: outliers.population_count,
                non_outlier_term_count: non_outliers.term_count(name, term),
                non_outlier_count: non_outliers.population_count,
            };
            counts.passes(alpha).then(|| VariableTerm {
                variable_name: name.clone(),
                term: term.clone(),
                outlier_instance_count: outlier_term_count,
                ratio_in_outlier_set: counts.ratio_in_outlier_set(),
                ratio_in_non_outlier_set: counts.ratio_in_non_outlier_set(),
                ratio_of_total_instances: counts.ratio_of_total_instances(),
            })
        })
        .collect();

    result.sort_by(rank);
    result
}

fn rank(a: &VariableTerm, b: &VariableTerm) -> Ordering {
    b.outlier_instance_count
        .cmp(&a.outlier_instance_count)
        .then_with(|| a.variable_name.cmp(&b.variable_name))
        .then_with(|| a.term.cmp(&b.term))
}

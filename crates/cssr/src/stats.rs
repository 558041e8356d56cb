//! Equivalence tests deciding whether two next-symbol samples come from the
//! same distribution.
//!
//! Both tests work on raw counts so that sample sizes enter the decision. A
//! test returns a p-value; two samples are declared different when the
//! p-value falls below the significance level.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared as ChiSquaredDist, ContinuousCDF};

use crate::error::Error;

/// Selects the equivalence test used during state splitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TestKind {
    /// Two-sample Kolmogorov-Smirnov test on cumulative distributions.
    #[default]
    KolmogorovSmirnov,
    /// Chi-squared test on the two-row contingency table.
    ChiSquared,
}

impl TestKind {
    /// Builds the test implementation. Called once per run.
    pub fn build(self) -> Box<dyn EquivalenceTest> {
        match self {
            TestKind::KolmogorovSmirnov => Box::new(KolmogorovSmirnov),
            TestKind::ChiSquared => Box::new(ChiSquared),
        }
    }

    /// Short code used in reports and on the command line.
    pub fn code(self) -> &'static str {
        match self {
            TestKind::KolmogorovSmirnov => "ks",
            TestKind::ChiSquared => "ch",
        }
    }
}

impl std::fmt::Display for TestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestKind::KolmogorovSmirnov => write!(f, "Kolmogorov-Smirnov"),
            TestKind::ChiSquared => write!(f, "Chi-squared"),
        }
    }
}

impl FromStr for TestKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ks" | "kolmogorov-smirnov" | "kolmogorov_smirnov" => Ok(TestKind::KolmogorovSmirnov),
            "ch" | "chi" | "chi-squared" | "chi_squared" | "chisquared" => {
                Ok(TestKind::ChiSquared)
            }
            other => Err(Error::InvalidParameter(format!(
                "unrecognized test kind {:?} (expected \"ks\" or \"ch\")",
                other
            ))),
        }
    }
}

/// A two-sample test over next-symbol counts.
pub trait EquivalenceTest {
    /// The test's name for logs and reports.
    fn name(&self) -> &'static str;

    /// Probability of a difference at least this large if both samples came
    /// from the same distribution. Returns `1.0` when either sample is empty.
    fn p_value(&self, first: &[u64], second: &[u64]) -> f64;

    /// `true` when the samples differ at the given significance level.
    fn differs(&self, first: &[u64], second: &[u64], significance: f64) -> bool {
        self.p_value(first, second) < significance
    }
}

/// Two-sample Kolmogorov-Smirnov test on the symbols' cumulative distributions.
#[derive(Debug, Clone, Copy, Default)]
pub struct KolmogorovSmirnov;

impl EquivalenceTest for KolmogorovSmirnov {
    fn name(&self) -> &'static str {
        "Kolmogorov-Smirnov"
    }

    fn p_value(&self, first: &[u64], second: &[u64]) -> f64 {
        let n1: u64 = first.iter().sum();
        let n2: u64 = second.iter().sum();
        if n1 == 0 || n2 == 0 {
            return 1.0;
        }

        let (n1, n2) = (n1 as f64, n2 as f64);
        let mut cdf1 = 0.0;
        let mut cdf2 = 0.0;
        let mut d: f64 = 0.0;
        for (a, b) in first.iter().zip(second) {
            cdf1 += *a as f64 / n1;
            cdf2 += *b as f64 / n2;
            d = d.max((cdf1 - cdf2).abs());
        }
        if d <= f64::EPSILON {
            return 1.0;
        }

        let en = (n1 * n2 / (n1 + n2)).sqrt();
        kolmogorov_tail((en + 0.12 + 0.11 / en) * d)
    }
}

/// Chi-squared test on two samples of possibly different sizes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChiSquared;

impl EquivalenceTest for ChiSquared {
    fn name(&self) -> &'static str {
        "Chi-squared"
    }

    fn p_value(&self, first: &[u64], second: &[u64]) -> f64 {
        let n1: u64 = first.iter().sum();
        let n2: u64 = second.iter().sum();
        if n1 == 0 || n2 == 0 {
            return 1.0;
        }

        let ratio1 = (n2 as f64 / n1 as f64).sqrt();
        let ratio2 = (n1 as f64 / n2 as f64).sqrt();
        let mut freedom = first.len() as f64 - 1.0;
        let mut statistic = 0.0;
        for (a, b) in first.iter().zip(second) {
            if *a == 0 && *b == 0 {
                // Symbols absent from both samples carry no information.
                freedom -= 1.0;
                continue;
            }
            let (a, b) = (*a as f64, *b as f64);
            let diff = ratio1 * a - ratio2 * b;
            statistic += diff * diff / (a + b);
        }

        if freedom <= 0.0 {
            return 1.0;
        }
        match ChiSquaredDist::new(freedom) {
            Ok(dist) => dist.sf(statistic).clamp(0.0, 1.0),
            Err(_) => 1.0,
        }
    }
}

/// Upper tail of the Kolmogorov distribution, `Q(λ) = 2 Σ (-1)^(j-1) e^(-2 j² λ²)`.
///
/// The alternating series is summed until terms become negligible; if it
/// fails to converge (λ near zero) the tail is 1.
pub fn kolmogorov_tail(lambda: f64) -> f64 {
    const EPS1: f64 = 0.001;
    const EPS2: f64 = 1.0e-8;

    let a2 = -2.0 * lambda * lambda;
    let mut factor = 2.0;
    let mut sum = 0.0;
    let mut previous = 0.0;
    for j in 1..=100 {
        let j = j as f64;
        let term = factor * (a2 * j * j).exp();
        sum += term;
        if term.abs() <= EPS1 * previous || term.abs() <= EPS2 * sum {
            return sum.clamp(0.0, 1.0);
        }
        factor = -factor;
        previous = term.abs();
    }
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("ks".parse::<TestKind>().unwrap(), TestKind::KolmogorovSmirnov);
        assert_eq!("ch".parse::<TestKind>().unwrap(), TestKind::ChiSquared);
        assert_eq!(
            "Chi-Squared".parse::<TestKind>().unwrap(),
            TestKind::ChiSquared
        );
        assert!(matches!(
            "anova".parse::<TestKind>(),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_kind_builds_matching_test() {
        assert_eq!(TestKind::KolmogorovSmirnov.build().name(), "Kolmogorov-Smirnov");
        assert_eq!(TestKind::ChiSquared.build().name(), "Chi-squared");
    }

    #[test]
    fn test_kolmogorov_tail_known_values() {
        // Critical value for the 5% level is about 1.358.
        assert!((kolmogorov_tail(1.358) - 0.05).abs() < 0.002);
        assert!((kolmogorov_tail(1.628) - 0.01).abs() < 0.001);
        assert_eq!(kolmogorov_tail(0.0), 1.0);
        assert!(kolmogorov_tail(5.0) < 1e-10);
    }

    #[test]
    fn test_identical_samples_never_differ() {
        for kind in [TestKind::KolmogorovSmirnov, TestKind::ChiSquared] {
            let test = kind.build();
            let p = test.p_value(&[500, 500], &[250, 250]);
            assert!(p > 0.99, "{} gave {}", test.name(), p);
            assert!(!test.differs(&[500, 500], &[250, 250], 0.05));
        }
    }

    #[test]
    fn test_opposite_samples_differ() {
        for kind in [TestKind::KolmogorovSmirnov, TestKind::ChiSquared] {
            let test = kind.build();
            assert!(test.differs(&[0, 200], &[200, 0], 0.05), "{}", test.name());
        }
    }

    #[test]
    fn test_small_samples_are_inconclusive() {
        // One observation each cannot establish a difference at 5%.
        let test = KolmogorovSmirnov;
        assert!(!test.differs(&[1, 0], &[0, 1], 0.05));
    }

    #[test]
    fn test_empty_sample_is_inconclusive() {
        assert_eq!(KolmogorovSmirnov.p_value(&[0, 0], &[3, 4]), 1.0);
        assert_eq!(ChiSquared.p_value(&[3, 4], &[0, 0]), 1.0);
    }

    #[test]
    fn test_chi_squared_ignores_unused_symbols() {
        // The third symbol never occurs; the comparison reduces to one degree of freedom.
        let with_gap = ChiSquared.p_value(&[40, 60, 0], &[45, 55, 0]);
        let without = ChiSquared.p_value(&[40, 60], &[45, 55]);
        assert!((with_gap - without).abs() < 1e-12);
    }

    #[test]
    fn test_chi_squared_matches_reference_statistic() {
        // Equal sample sizes: statistic = Σ (a-b)²/(a+b) = 100/100 + 100/100 = 2, df = 1.
        let p = ChiSquared.p_value(&[45, 55], &[55, 45]);
        assert!((p - 0.157299).abs() < 1e-4);
    }
}

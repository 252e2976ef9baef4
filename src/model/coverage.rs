// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Overdispersed model of per-sample read depth.

use derive_new::new;
use statrs::distribution::{Discrete, NegativeBinomial, Poisson};

use crate::model::solver::SolverError;

/// Read depth with mean `mu` and variance `dispersion * mu`.
/// A dispersion of at most one degenerates to a Poisson distribution.
#[derive(Debug, Clone, Copy, PartialEq, new)]
pub struct CoverageModel {
    dispersion: f64,
}

impl CoverageModel {
    /// Probability (natural log) to observe `depth` reads given the expected depth.
    pub fn ln_prob(&self, depth: u32, mean: f64) -> Result<f64, SolverError> {
        if !mean.is_finite() || mean < 0.0 {
            return Err(SolverError::InvalidCoverage { mean });
        }
        if mean == 0.0 {
            return Ok(if depth == 0 { 0.0 } else { f64::NEG_INFINITY });
        }

        let invalid = |e: &dyn std::fmt::Display| SolverError::InvalidDistribution {
            msg: e.to_string(),
        };
        if self.dispersion <= 1.0 {
            let poisson = Poisson::new(mean).map_err(|e| invalid(&e))?;
            Ok(poisson.ln_pmf(depth as u64))
        } else {
            let r = mean / (self.dispersion - 1.0);
            let p = 1.0 / self.dispersion;
            let nb = NegativeBinomial::new(r, p).map_err(|e| invalid(&e))?;
            Ok(nb.ln_pmf(depth as u64))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_mean() {
        let model = CoverageModel::new(2.5);
        assert_eq!(model.ln_prob(0, 0.0).unwrap(), 0.0);
        assert_eq!(model.ln_prob(3, 0.0).unwrap(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_negative_binomial_moments() {
        let model = CoverageModel::new(2.5);
        let mean = 8.0;
        let probs: Vec<f64> = (0..2000)
            .map(|k| model.ln_prob(k, mean).unwrap().exp())
            .collect();
        let total: f64 = probs.iter().sum();
        let m: f64 = probs.iter().enumerate().map(|(k, p)| k as f64 * p).sum();
        let var: f64 = probs
            .iter()
            .enumerate()
            .map(|(k, p)| (k as f64 - m).powi(2) * p)
            .sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-9);
        assert_relative_eq!(m, mean, epsilon = 1e-6);
        assert_relative_eq!(var, 2.5 * mean, epsilon = 1e-4);
    }

    #[test]
    fn test_poisson_fallback() {
        let model = CoverageModel::new(1.0);
        assert_relative_eq!(
            model.ln_prob(0, 3.0).unwrap(),
            -3.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_invalid_mean() {
        let model = CoverageModel::new(2.5);
        assert!(model.ln_prob(1, f64::NAN).is_err());
        assert!(model.ln_prob(1, -1.0).is_err());
    }
}

// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Single EM steps. The drivers in `crate::em` only rely on the traits defined here,
//! so that the numerical kernel can be exchanged.

use bio::stats::LogProb;
use thiserror::Error;

use crate::model::coverage::CoverageModel;
use crate::model::genotype::Genotype;
use crate::model::{DropoutParams, JointGenotype, PedigreeParams, SampleCall};

pub mod trio;
pub mod unrelated;

pub use trio::TrioEm;
pub use unrelated::DropoutEm;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("invalid expected coverage {mean}")]
    InvalidCoverage { mean: f64 },
    #[error("invalid coverage distribution: {msg}")]
    InvalidDistribution { msg: String },
    #[error("sample {sample} has zero likelihood under the current parameters")]
    ZeroLikelihood { sample: String },
    #[error("likelihood of sample {sample} is not a number")]
    NumericalError { sample: String },
    #[error("no coverage left to estimate the mean coverage from")]
    DegenerateCoverage,
    #[error("parameter snapshot does not define {name}")]
    UndefinedParameter { name: &'static str },
    #[error("no samples given")]
    NoSamples,
}

/// One EM step for the unrelated sample model.
pub trait DropoutSolver {
    /// Return updated parameters, with the log-likelihood of the updated parameters.
    fn update(
        &self,
        params: &DropoutParams,
        calls: &[SampleCall],
        dispersion: f64,
    ) -> Result<DropoutParams, SolverError>;
}

/// One EM step for a trio, given fixed parental genotypes.
pub trait PedigreeSolver {
    /// Return updated parameters. A log-likelihood of `-inf` signals that the parental
    /// genotypes are incompatible with the data.
    fn update(
        &self,
        params: &PedigreeParams,
        calls: &[SampleCall],
        dispersion: f64,
        parents: &JointGenotype,
    ) -> Result<PedigreeParams, SolverError>;
}

/// Evidence of a single sample given its genotype.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SampleEvidence {
    /// Probability (natural log) of depth and reads.
    pub(crate) ln_prob: f64,
    /// Posterior probability that the sample is a digest failure.
    pub(crate) digest_failure: f64,
}

impl SampleEvidence {
    pub(crate) fn compute(
        call: &SampleCall,
        genotype: &Genotype,
        lambda: f64,
        delta: f64,
        coverage: &CoverageModel,
    ) -> Result<Self, SolverError> {
        let mean = lambda * call.norm_factor() * genotype.relative_coverage();
        let ln_prob_depth = coverage.ln_prob(*call.depth(), mean)?;

        let (ln_prob, digest_failure) = if call.is_missing() {
            let ln_prob_failure = LogProb(delta.ln());
            let ln_prob_dropout = LogProb((1.0 - delta).ln() + ln_prob_depth);
            let total = ln_prob_failure.ln_add_exp(ln_prob_dropout);
            let digest_failure = if *total == f64::NEG_INFINITY {
                0.0
            } else {
                (*ln_prob_failure - *total).exp()
            };
            (*total, digest_failure)
        } else {
            ((1.0 - delta).ln() + ln_prob_depth, 0.0)
        };

        let ln_prob_reads = call
            .genotype_likelihoods()
            .map_or(0.0, |pl| pl.ln_likelihood(genotype.observed()));

        Ok(SampleEvidence {
            ln_prob: ln_prob + ln_prob_reads,
            digest_failure,
        })
    }
}

/// Normalize joint probabilities (natural log) of a sample into genotype posteriors.
/// Returns the marginal probability (natural log) and the posteriors.
pub(crate) fn posteriors(ln_joint: &[f64; 6]) -> (f64, [f64; 6]) {
    let ln_probs: Vec<LogProb> = ln_joint.iter().map(|p| LogProb(*p)).collect();
    let total = *LogProb::ln_sum_exp(&ln_probs);
    let mut posteriors = [0.0; 6];
    if total.is_finite() {
        for (posterior, p) in posteriors.iter_mut().zip(ln_joint.iter()) {
            *posterior = (p - total).exp();
        }
    }
    (total, posteriors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::genotype::GENOTYPES;
    use crate::model::likelihood::GenotypeLikelihoods;

    #[test]
    fn test_digest_failure_posterior() {
        let coverage = CoverageModel::new(2.5);
        let call = SampleCall::new("s1".to_owned(), 0, None);
        // a ./. genotype explains missing coverage with certainty
        let evidence = SampleEvidence::compute(&call, &GENOTYPES[5], 10.0, 0.1, &coverage).unwrap();
        assert_relative_eq!(evidence.ln_prob, 0.0, epsilon = 1e-6);
        assert_relative_eq!(evidence.digest_failure, 0.1, epsilon = 1e-6);

        let evidence = SampleEvidence::compute(&call, &GENOTYPES[0], 10.0, 0.1, &coverage).unwrap();
        assert!(evidence.digest_failure > 0.1);
        assert!(evidence.ln_prob < 0.0);
    }

    #[test]
    fn test_covered_sample() {
        let coverage = CoverageModel::new(2.5);
        let call = SampleCall::new(
            "s1".to_owned(),
            10,
            Some(GenotypeLikelihoods([0.0, 30.0, 300.0])),
        );
        let homref = SampleEvidence::compute(&call, &GENOTYPES[0], 10.0, 0.1, &coverage).unwrap();
        let het = SampleEvidence::compute(&call, &GENOTYPES[1], 10.0, 0.1, &coverage).unwrap();
        let dropout = SampleEvidence::compute(&call, &GENOTYPES[5], 10.0, 0.1, &coverage).unwrap();
        assert_eq!(homref.digest_failure, 0.0);
        assert!(homref.ln_prob > het.ln_prob);
        assert_eq!(dropout.ln_prob, f64::NEG_INFINITY);
    }

    #[test]
    fn test_posteriors() {
        let (total, post) = posteriors(&[
            0.5f64.ln(),
            0.25f64.ln(),
            f64::NEG_INFINITY,
            0.25f64.ln(),
            f64::NEG_INFINITY,
            f64::NEG_INFINITY,
        ]);
        assert_relative_eq!(total, 0.0, epsilon = 1e-6);
        assert_relative_eq!(post[0], 0.5, epsilon = 1e-6);
        assert_eq!(post[2], 0.0);

        let (total, post) = posteriors(&[f64::NEG_INFINITY; 6]);
        assert_eq!(total, f64::NEG_INFINITY);
        assert_eq!(post, [0.0; 6]);
    }
}

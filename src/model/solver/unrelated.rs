// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! EM step for unrelated samples: genotypes follow Hardy-Weinberg proportions of the
//! REF, ALT and dropout allele, depth follows the coverage model with a digest failure
//! component.

use crate::model::coverage::CoverageModel;
use crate::model::genotype::GENOTYPES;
use crate::model::solver::{posteriors, DropoutSolver, SampleEvidence, SolverError};
use crate::model::{AlleleFreqs, DropoutParams, SampleCall};

#[derive(Debug, Clone, Copy, Default)]
pub struct DropoutEm;

struct Expectation {
    loglik: f64,
    genotypes: Vec<[f64; 6]>,
    digest_failures: Vec<[f64; 6]>,
}

impl DropoutEm {
    fn expectation(
        &self,
        phi: &AlleleFreqs,
        lambda: f64,
        delta: f64,
        calls: &[SampleCall],
        coverage: &CoverageModel,
    ) -> Result<Expectation, SolverError> {
        let mut loglik = 0.0;
        let mut genotypes = Vec::with_capacity(calls.len());
        let mut digest_failures = Vec::with_capacity(calls.len());

        for call in calls {
            let mut ln_joint = [f64::NEG_INFINITY; 6];
            let mut failures = [0.0; 6];
            for (i, genotype) in GENOTYPES.iter().enumerate() {
                let prior = genotype.ln_hwe_prob(phi);
                if prior == f64::NEG_INFINITY {
                    continue;
                }
                let evidence = SampleEvidence::compute(call, genotype, lambda, delta, coverage)?;
                ln_joint[i] = prior + evidence.ln_prob;
                failures[i] = evidence.digest_failure;
            }
            let (marginal, posterior) = posteriors(&ln_joint);
            if marginal.is_nan() {
                return Err(SolverError::NumericalError {
                    sample: call.sample().to_owned(),
                });
            }
            if marginal == f64::NEG_INFINITY {
                return Err(SolverError::ZeroLikelihood {
                    sample: call.sample().to_owned(),
                });
            }
            loglik += marginal;
            genotypes.push(posterior);
            digest_failures.push(failures);
        }

        Ok(Expectation {
            loglik,
            genotypes,
            digest_failures,
        })
    }

    /// Log-likelihood of the data under the given parameters.
    pub fn loglik(
        &self,
        phi: &AlleleFreqs,
        lambda: f64,
        delta: f64,
        calls: &[SampleCall],
        dispersion: f64,
    ) -> Result<f64, SolverError> {
        let coverage = CoverageModel::new(dispersion);
        Ok(self
            .expectation(phi, lambda, delta, calls, &coverage)?
            .loglik)
    }
}

impl DropoutSolver for DropoutEm {
    fn update(
        &self,
        params: &DropoutParams,
        calls: &[SampleCall],
        dispersion: f64,
    ) -> Result<DropoutParams, SolverError> {
        if calls.is_empty() {
            return Err(SolverError::NoSamples);
        }
        let lambda = params
            .lambda
            .ok_or(SolverError::UndefinedParameter { name: "lambda" })?;
        let delta = params
            .delta
            .ok_or(SolverError::UndefinedParameter { name: "delta" })?;
        let coverage = CoverageModel::new(dispersion);

        let expectation = self.expectation(&params.phi, lambda, delta, calls, &coverage)?;

        let mut allele_counts = [0.0; 3];
        let mut expected_counts = Vec::with_capacity(calls.len());
        let mut failures = 0.0;
        let mut weighted_depth = 0.0;
        let mut weighted_coverage = 0.0;
        for ((call, genotype_probs), failure_probs) in calls
            .iter()
            .zip(expectation.genotypes.iter())
            .zip(expectation.digest_failures.iter())
        {
            let mut counts = [0.0; 3];
            for (i, genotype) in GENOTYPES.iter().enumerate() {
                let weight = genotype_probs[i];
                if weight == 0.0 {
                    continue;
                }
                for (count, allele_count) in counts.iter_mut().zip(genotype.0.iter()) {
                    *count += weight * *allele_count as f64;
                }
                failures += weight * failure_probs[i];
                let digested = weight * (1.0 - failure_probs[i]);
                weighted_depth += digested * *call.depth() as f64;
                weighted_coverage += digested * call.norm_factor() * genotype.relative_coverage();
            }
            for (total, count) in allele_counts.iter_mut().zip(counts.iter()) {
                *total += count;
            }
            expected_counts.push(counts);
        }

        let n = calls.len() as f64;
        let alleles: f64 = allele_counts.iter().sum();
        let phi = AlleleFreqs([
            allele_counts[0] / alleles,
            allele_counts[1] / alleles,
            allele_counts[2] / alleles,
        ]);
        let delta = (failures / n).min(1.0).max(0.0);
        if weighted_coverage <= 0.0 || weighted_depth <= 0.0 {
            return Err(SolverError::DegenerateCoverage);
        }
        let lambda = weighted_depth / weighted_coverage;

        let loglik = self.expectation(&phi, lambda, delta, calls, &coverage)?.loglik;

        Ok(DropoutParams {
            phi,
            lambda: Some(lambda),
            delta: Some(delta),
            loglik: Some(loglik),
            failed: false,
            expected_counts: Some(expected_counts),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::likelihood::GenotypeLikelihoods;

    fn calls(depths: &[u32]) -> Vec<SampleCall> {
        depths
            .iter()
            .enumerate()
            .map(|(i, dp)| {
                SampleCall::new(
                    format!("s{}", i),
                    *dp,
                    Some(GenotypeLikelihoods([0.0, 30.0, 300.0])),
                )
            })
            .collect()
    }

    fn seed(phi: [f64; 3]) -> DropoutParams {
        DropoutParams::seed(AlleleFreqs(phi), Some(8.0), Some(0.05))
    }

    #[test]
    fn test_update_keeps_null_hypothesis() {
        let calls = calls(&[10, 8, 0, 12, 9, 11]);
        let updated = DropoutEm
            .update(&seed([0.99, 0.01, 0.0]), &calls, 2.5)
            .unwrap();
        assert_eq!(updated.phi.dropout(), 0.0);
        assert_relative_eq!(updated.phi.0.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert!(updated.lambda.unwrap() > 0.0);
        assert!(updated.loglik.unwrap() < 0.0);
        assert_eq!(updated.expected_counts.as_ref().unwrap().len(), calls.len());
        assert!(!updated.failed);
    }

    #[test]
    fn test_em_increases_likelihood() {
        // half of the covered samples show half the coverage of the others
        let calls = calls(&[
            38, 41, 40, 42, 39, 40, 37, 43, 40, 41, 19, 21, 20, 22, 18, 20, 21, 19, 0, 0,
        ]);
        let solver = DropoutEm;
        let mut params = seed([0.89, 0.01, 0.1]);
        let mut last = f64::NEG_INFINITY;
        for _ in 0..100 {
            params = solver.update(&params, &calls, 1.0).unwrap();
            let loglik = params.loglik.unwrap();
            assert!(loglik >= last - 1e-6);
            last = loglik;
        }
        assert!(params.phi.dropout() > 0.1);
        assert!(params.lambda.unwrap() > 30.0);
    }

    #[test]
    fn test_undefined_parameters() {
        let calls = calls(&[10]);
        let params = DropoutParams::seed(AlleleFreqs([1.0, 0.0, 0.0]), None, None);
        assert_eq!(
            DropoutEm.update(&params, &calls, 2.5),
            Err(SolverError::UndefinedParameter { name: "lambda" })
        );
        assert_eq!(
            DropoutEm.update(&seed([1.0, 0.0, 0.0]), &[], 2.5),
            Err(SolverError::NoSamples)
        );
    }
}

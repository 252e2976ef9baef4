// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! EM step for a trio with fixed parental genotypes.

use crate::constants::PEDIGREE_DIGEST_FAILURE;
use crate::model::call::PedigreeRole;
use crate::model::coverage::CoverageModel;
use crate::model::genotype::{Genotype, GENOTYPES};
use crate::model::solver::{posteriors, PedigreeSolver, SampleEvidence, SolverError};
use crate::model::{JointGenotype, PedigreeParams, SampleCall};

/// Trio kernel. Parents are fixed to the genotypes of the track, children follow
/// Mendelian transmission. The digest failure rate is not estimated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrioEm {
    pub digest_failure: f64,
}

impl Default for TrioEm {
    fn default() -> Self {
        TrioEm {
            digest_failure: PEDIGREE_DIGEST_FAILURE,
        }
    }
}

fn one_hot(genotype: &Genotype) -> [f64; 6] {
    let mut prior = [0.0; 6];
    if let Some(idx) = genotype.index() {
        prior[idx] = 1.0;
    }
    prior
}

impl TrioEm {
    fn prior(call: &SampleCall, parents: &JointGenotype) -> Option<[f64; 6]> {
        match call.role() {
            PedigreeRole::Father => Some(one_hot(&parents.father)),
            PedigreeRole::Mother => Some(one_hot(&parents.mother)),
            PedigreeRole::Child => Some(Genotype::offspring_probs(
                &parents.father,
                &parents.mother,
            )),
            PedigreeRole::None => None,
        }
    }

    /// Per family member: genotype posteriors and digest failure posteriors.
    /// Returns `None` as log-likelihood if the data is impossible under the parents.
    #[allow(clippy::type_complexity)]
    fn expectation(
        &self,
        lambda: f64,
        calls: &[SampleCall],
        parents: &JointGenotype,
        coverage: &CoverageModel,
    ) -> Result<(f64, Vec<Option<([f64; 6], [f64; 6])>>), SolverError> {
        let mut loglik = 0.0;
        let mut members = Vec::with_capacity(calls.len());
        for call in calls {
            let prior = match TrioEm::prior(call, parents) {
                Some(prior) => prior,
                None => {
                    members.push(None);
                    continue;
                }
            };
            let mut ln_joint = [f64::NEG_INFINITY; 6];
            let mut failures = [0.0; 6];
            for (i, genotype) in GENOTYPES.iter().enumerate() {
                if prior[i] == 0.0 {
                    continue;
                }
                let evidence =
                    SampleEvidence::compute(call, genotype, lambda, self.digest_failure, coverage)?;
                ln_joint[i] = prior[i].ln() + evidence.ln_prob;
                failures[i] = evidence.digest_failure;
            }
            let (marginal, posterior) = posteriors(&ln_joint);
            if marginal.is_nan() {
                return Err(SolverError::NumericalError {
                    sample: call.sample().to_owned(),
                });
            }
            loglik += marginal;
            members.push(Some((posterior, failures)));
        }
        Ok((loglik, members))
    }
}

impl PedigreeSolver for TrioEm {
    fn update(
        &self,
        params: &PedigreeParams,
        calls: &[SampleCall],
        dispersion: f64,
        parents: &JointGenotype,
    ) -> Result<PedigreeParams, SolverError> {
        let lambda = params
            .lambda
            .ok_or(SolverError::UndefinedParameter { name: "lambda" })?;
        let coverage = CoverageModel::new(dispersion);

        let (loglik, members) = self.expectation(lambda, calls, parents, &coverage)?;
        if members.iter().all(|m| m.is_none()) {
            return Err(SolverError::NoSamples);
        }
        if loglik == f64::NEG_INFINITY {
            // incompatible parental genotypes, keep lambda
            return Ok(PedigreeParams {
                lambda: Some(lambda),
                loglik: Some(f64::NEG_INFINITY),
                failed: false,
                expected_counts: None,
            });
        }

        let mut weighted_depth = 0.0;
        let mut weighted_coverage = 0.0;
        let mut expected_counts = Vec::with_capacity(calls.len());
        for (call, member) in calls.iter().zip(members.iter()) {
            let (genotype_probs, failure_probs) = match member {
                Some(member) => member,
                None => {
                    expected_counts.push(None);
                    continue;
                }
            };
            let mut counts = [0.0; 3];
            for (i, genotype) in GENOTYPES.iter().enumerate() {
                let weight = genotype_probs[i];
                if weight == 0.0 {
                    continue;
                }
                for (count, allele_count) in counts.iter_mut().zip(genotype.0.iter()) {
                    *count += weight * *allele_count as f64;
                }
                let digested = weight * (1.0 - failure_probs[i]);
                weighted_depth += digested * *call.depth() as f64;
                weighted_coverage += digested * call.norm_factor() * genotype.relative_coverage();
            }
            expected_counts.push(Some(counts));
        }
        if weighted_coverage <= 0.0 || weighted_depth <= 0.0 {
            return Err(SolverError::DegenerateCoverage);
        }
        let lambda = weighted_depth / weighted_coverage;

        let (loglik, _) = self.expectation(lambda, calls, parents, &coverage)?;

        Ok(PedigreeParams {
            lambda: Some(lambda),
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

    fn member(sample: &str, depth: u32, pl: [f64; 3], role: PedigreeRole) -> SampleCall {
        let mut call = SampleCall::new(sample.to_owned(), depth, Some(GenotypeLikelihoods(pl)));
        call.set_role(role);
        call
    }

    fn trio() -> Vec<SampleCall> {
        vec![
            member("dad", 10, [0.0, 30.0, 300.0], PedigreeRole::Father),
            member("mom", 12, [0.0, 30.0, 300.0], PedigreeRole::Mother),
            member("kid1", 11, [0.0, 30.0, 300.0], PedigreeRole::Child),
            member("kid2", 9, [0.0, 30.0, 300.0], PedigreeRole::Child),
            member("other", 40, [300.0, 0.0, 300.0], PedigreeRole::None),
        ]
    }

    #[test]
    fn test_homref_parents() {
        let calls = trio();
        let parents = JointGenotype::new(GENOTYPES[0], GENOTYPES[0]);
        let updated = TrioEm::default()
            .update(&PedigreeParams::seed(Some(8.0)), &calls, 2.5, &parents)
            .unwrap();
        // the unrelated sample does not contribute to the coverage estimate
        assert_relative_eq!(updated.lambda.unwrap(), 10.5, epsilon = 1e-9);
        assert!(updated.loglik.unwrap().is_finite());
        let counts = updated.expected_counts.unwrap();
        assert_eq!(counts[4], None);
        assert_relative_eq!(counts[0].unwrap()[0], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_incompatible_parents() {
        let calls = trio();
        // ./. x ./. cannot produce covered children
        let parents = JointGenotype::new(GENOTYPES[5], GENOTYPES[5]);
        let updated = TrioEm::default()
            .update(&PedigreeParams::seed(Some(8.0)), &calls, 2.5, &parents)
            .unwrap();
        assert_eq!(updated.loglik, Some(f64::NEG_INFINITY));
    }

    #[test]
    fn test_no_family() {
        let calls = vec![member("other", 40, [300.0, 0.0, 300.0], PedigreeRole::None)];
        let parents = JointGenotype::new(GENOTYPES[0], GENOTYPES[0]);
        assert_eq!(
            TrioEm::default().update(&PedigreeParams::seed(Some(8.0)), &calls, 2.5, &parents),
            Err(SolverError::NoSamples)
        );
    }
}

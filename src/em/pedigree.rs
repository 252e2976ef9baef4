// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Dropout test for a trio. Each of the 36 joint parental genotypes is fitted on its
//! own, and the likelihoods are integrated over the parental genotypes with a uniform
//! prior within the null (no parental dropout allele) and the alternative subsets.

use ordered_float::OrderedFloat;
use rayon::prelude::*;

use crate::em::{run_track, seed_coverage, Dispersion, EmConfig};
use crate::model::genotype::{ALT_TRIO_GENOTYPES, NULL_TRIO_GENOTYPES, TRIO_GENOTYPES};
use crate::model::params::Snapshot;
use crate::model::solver::PedigreeSolver;
use crate::model::{History, JointGenotype, PedigreeParams, SampleCall};

#[derive(Debug, Clone, Getters)]
#[getset(get = "pub")]
pub struct PedigreeMarker {
    calls: Vec<SampleCall>,
    dispersion: f64,
    /// One track per entry of `TRIO_GENOTYPES`, in the same order.
    tracks: Vec<History<PedigreeParams>>,
}

impl PedigreeMarker {
    pub fn new(calls: Vec<SampleCall>, dispersion: &Dispersion) -> Self {
        let (lambda, disp) = match seed_coverage(calls.iter().map(|call| *call.depth())) {
            Some((lambda, _, _)) => (Some(lambda), dispersion.at(lambda)),
            None => (None, dispersion.at(0.0)),
        };
        PedigreeMarker {
            calls,
            dispersion: disp,
            tracks: TRIO_GENOTYPES
                .iter()
                .map(|_| History::new(PedigreeParams::seed(lambda)))
                .collect(),
        }
    }

    /// Fit all parental genotype tracks. Tracks are independent and run in parallel.
    pub fn fit<S: PedigreeSolver + Sync>(&mut self, solver: &S, config: &EmConfig) {
        let calls = &self.calls;
        let dispersion = self.dispersion;
        self.tracks
            .par_iter_mut()
            .zip(TRIO_GENOTYPES.par_iter())
            .for_each(|(history, parents)| {
                run_track(
                    history,
                    &config.pedigree,
                    config.max_iterations,
                    |params: &PedigreeParams| {
                        solver
                            .update(params, calls, dispersion, parents)
                            .map(|updated| {
                                // the likelihood cannot recover from zero
                                if updated.loglik == Some(f64::NEG_INFINITY) {
                                    updated.freeze()
                                } else {
                                    updated
                                }
                            })
                    },
                )
            });
    }

    /// Tracks together with their parental genotypes.
    pub fn genotype_tracks(
        &self,
    ) -> impl DoubleEndedIterator<Item = (&JointGenotype, &History<PedigreeParams>)> {
        TRIO_GENOTYPES.iter().zip(self.tracks.iter())
    }

    /// Mixture likelihood ratio `-2 (ln H0 - ln H1)`, with `H0` (`H1`) the average
    /// likelihood of the null (alternative) parental genotypes relative to the best one.
    /// `None` if any track lacks a log-likelihood or if all likelihoods are zero.
    pub fn likelihood_ratio(&self) -> Option<f64> {
        let logliks = self
            .tracks
            .iter()
            .map(|history| history.last().loglik)
            .collect::<Option<Vec<f64>>>()?;
        let max = logliks
            .iter()
            .map(|ll| OrderedFloat(*ll))
            .max()?
            .into_inner();
        if !max.is_finite() {
            return None;
        }

        let mut h0 = 0.0;
        let mut h1 = 0.0;
        for (parents, loglik) in TRIO_GENOTYPES.iter().zip(logliks.iter()) {
            let lik = (loglik - max).exp();
            if parents.is_null() {
                h0 += lik / *NULL_TRIO_GENOTYPES as f64;
            } else {
                h1 += lik / *ALT_TRIO_GENOTYPES as f64;
            }
        }
        Some(-2.0 * (h0.ln() - h1.ln()))
    }

    fn best(&self, null: bool) -> Option<(&JointGenotype, &History<PedigreeParams>)> {
        self.genotype_tracks()
            .filter(|(parents, _)| parents.is_null() == null)
            .filter_map(|(parents, history)| {
                history
                    .last()
                    .loglik
                    .filter(|ll| ll.is_finite())
                    .map(|ll| (parents, history, ll))
            })
            .rev()
            .max_by_key(|(_, _, ll)| OrderedFloat(*ll))
            .map(|(parents, history, _)| (parents, history))
    }

    /// Most likely parental genotypes with a parental dropout allele.
    pub fn best_h1(&self) -> Option<(&JointGenotype, &History<PedigreeParams>)> {
        self.best(false)
    }

    /// Most likely parental genotypes without a parental dropout allele.
    pub fn best_h0(&self) -> Option<(&JointGenotype, &History<PedigreeParams>)> {
        self.best(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::call::PedigreeRole;
    use crate::model::genotype::GENOTYPES;
    use crate::model::likelihood::GenotypeLikelihoods;
    use crate::model::solver::{SolverError, TrioEm};

    /// Solver returning a fixed log-likelihood per parental genotype.
    struct Fixed<F: Fn(&JointGenotype) -> f64 + Sync>(F);

    impl<F: Fn(&JointGenotype) -> f64 + Sync> PedigreeSolver for Fixed<F> {
        fn update(
            &self,
            params: &PedigreeParams,
            _: &[SampleCall],
            _: f64,
            parents: &JointGenotype,
        ) -> Result<PedigreeParams, SolverError> {
            Ok(PedigreeParams {
                loglik: Some((self.0)(parents)),
                ..params.clone()
            })
        }
    }

    fn family(depths: &[u32]) -> Vec<SampleCall> {
        let roles = [
            PedigreeRole::Father,
            PedigreeRole::Mother,
            PedigreeRole::Child,
            PedigreeRole::Child,
        ];
        depths
            .iter()
            .zip(roles.iter().cycle())
            .enumerate()
            .map(|(i, (dp, role))| {
                let mut call = SampleCall::new(
                    format!("s{}", i),
                    *dp,
                    Some(GenotypeLikelihoods([0.0, 30.0, 300.0])),
                );
                call.set_role(*role);
                call
            })
            .collect()
    }

    #[test]
    fn test_zero_depth() {
        let mut marker = PedigreeMarker::new(family(&[0, 0, 0, 0]), &Dispersion::default());
        assert_eq!(marker.tracks().len(), 36);
        marker.fit(&Fixed(|_: &JointGenotype| -1.0), &EmConfig::default());
        for (_, history) in marker.genotype_tracks() {
            assert_eq!(history.len(), 1);
            assert!(history.last().failed);
        }
        assert_eq!(marker.likelihood_ratio(), None);
        assert!(marker.best_h0().is_none());
        assert!(marker.best_h1().is_none());
    }

    #[test]
    fn test_equal_likelihoods() {
        let mut marker = PedigreeMarker::new(family(&[10, 12, 9, 11]), &Dispersion::default());
        marker.fit(&Fixed(|_: &JointGenotype| -12.5), &EmConfig::default());
        assert_relative_eq!(marker.likelihood_ratio().unwrap(), 0.0, epsilon = 1e-6);
        // ties resolve to the first genotype in table order
        let (parents, _) = marker.best_h0().unwrap();
        assert_eq!(*parents, JointGenotype::new(GENOTYPES[0], GENOTYPES[0]));
        let (parents, _) = marker.best_h1().unwrap();
        assert_eq!(*parents, JointGenotype::new(GENOTYPES[0], GENOTYPES[2]));
    }

    #[test]
    fn test_infinite_loglik_fails_track() {
        let mut marker = PedigreeMarker::new(family(&[10, 12, 9, 11]), &Dispersion::default());
        let solver = Fixed(|parents: &JointGenotype| {
            if parents.father == GENOTYPES[5] {
                f64::NEG_INFINITY
            } else if parents.is_null() {
                -20.0
            } else {
                -10.0
            }
        });
        marker.fit(&solver, &EmConfig::default());
        for (parents, history) in marker.genotype_tracks() {
            if parents.father == GENOTYPES[5] {
                assert_eq!(history.len(), 2);
                assert!(history.last().failed);
            } else {
                assert!(!history.last().failed);
            }
        }
        // 21 of 27 alternative tracks at the maximum, all null tracks e^-10 below
        let h0 = (-10.0f64).exp();
        let h1 = 21.0f64 / 27.0;
        assert_relative_eq!(
            marker.likelihood_ratio().unwrap(),
            -2.0 * (h0.ln() - h1.ln()),
            epsilon = 1e-6
        );
        let (parents, history) = marker.best_h1().unwrap();
        assert_ne!(parents.father, GENOTYPES[5]);
        assert_eq!(history.last().loglik, Some(-10.0));
    }

    #[test]
    fn test_undefined_loglik() {
        let mut marker = PedigreeMarker::new(family(&[10, 12, 9, 11]), &Dispersion::default());
        marker.tracks[3] = History::new(PedigreeParams::seed(None));
        marker.fit(&Fixed(|_: &JointGenotype| -3.0), &EmConfig::default());
        assert_eq!(marker.likelihood_ratio(), None);
        assert!(marker.best_h1().is_some());
    }

    #[test]
    fn test_fit_with_default_solver() {
        let mut marker = PedigreeMarker::new(family(&[8, 16, 0, 15]), &Dispersion::default());
        let config = EmConfig {
            max_iterations: Some(200),
            ..EmConfig::default()
        };
        marker.fit(&TrioEm::default(), &config);
        assert!(marker.likelihood_ratio().unwrap().is_finite());
        // ./. x ./. cannot explain the covered samples
        let incompatible = JointGenotype::new(GENOTYPES[5], GENOTYPES[5]);
        for (parents, history) in marker.genotype_tracks() {
            if *parents == incompatible {
                assert!(history.last().failed);
                assert_eq!(history.last().loglik, Some(f64::NEG_INFINITY));
            }
        }
        let (parents, _) = marker.best_h1().unwrap();
        assert_ne!(*parents, incompatible);
        let (parents, history) = marker.best_h0().unwrap();
        assert!(parents.is_null());
        assert!(history.last().loglik.unwrap().is_finite());
    }
}

// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Genotype likelihoods from read pileups, using a sequencer specific confusion
//! matrix instead of a uniform split of the miscall probability.

use std::f64::consts::LN_10;

use bio::stats::{PHREDProb, Prob};
use derive_new::new;
use itertools::Itertools;

use crate::constants::{base_index, CONFUSION_MATRIX, PHRED_ASCII_OFFSET};
use crate::model::genotype::ObservedGenotype;

/// A single base of an aligned read covering the locus.
#[derive(Debug, Clone, Copy, PartialEq, new)]
pub struct BaseObservation {
    pub base: u8,
    pub qual: u8,
}

/// PHRED-scaled genotype likelihoods (hom-ref, het, hom-alt).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenotypeLikelihoods(pub [f64; 3]);

impl GenotypeLikelihoods {
    /// Likelihood (natural log) of the reads given the visible genotype class.
    pub fn ln_likelihood(&self, observed: ObservedGenotype) -> f64 {
        let pl = match observed {
            ObservedGenotype::HomRef => self.0[0],
            ObservedGenotype::Het => self.0[1],
            ObservedGenotype::HomAlt => self.0[2],
            // no reads are expected, any evidence is explained by the coverage model
            ObservedGenotype::Invisible => return 0.0,
        };
        -pl / 10.0 * LN_10
    }
}

/// Confusion probability between two distinct bases; `None` on the diagonal or for non-nucleotides.
pub fn miscall_prob(first: u8, second: u8) -> Option<f64> {
    match (base_index(first), base_index(second)) {
        (Some(i), Some(j)) => CONFUSION_MATRIX[i][j],
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, new)]
pub struct GenotypeLikelihoodModel {
    /// Offset subtracted from the quality values before PHRED decoding.
    quality_offset: u8,
}

impl Default for GenotypeLikelihoodModel {
    fn default() -> Self {
        GenotypeLikelihoodModel::new(PHRED_ASCII_OFFSET)
    }
}

impl GenotypeLikelihoodModel {
    /// Model for qualities as stored in BAM records (already decoded).
    pub fn decoded() -> Self {
        GenotypeLikelihoodModel::new(0)
    }

    fn prob_miscall(&self, qual: u8) -> f64 {
        *Prob::from(PHREDProb(qual.saturating_sub(self.quality_offset) as f64))
    }

    /// Accumulated log10 likelihoods of the reads under hom-ref, het and hom-alt.
    /// Returns `None` if no read shows the REF or ALT base, or if a read is of too low
    /// quality for the likelihoods to be defined (e.g. PHRED 0 or 1).
    pub fn log10_likelihoods(
        &self,
        observations: &[BaseObservation],
        ref_base: u8,
        alt_base: u8,
    ) -> Option<[f64; 3]> {
        let pr_ref = miscall_prob(alt_base, ref_base)?;
        let pr_alt = miscall_prob(ref_base, alt_base)?;
        let ref_base = ref_base.to_ascii_uppercase();
        let alt_base = alt_base.to_ascii_uppercase();

        let mut lik = [0.0; 3];
        let mut informative = 0;
        for obs in observations {
            let epsilon = self.prob_miscall(obs.qual);
            let base = obs.base.to_ascii_uppercase();
            if base == ref_base {
                lik[0] += (1.0 - epsilon).log10();
                lik[1] += ((1.0 - epsilon * (1.0 + pr_alt)) / 2.0).log10();
                lik[2] += (epsilon * pr_alt).log10();
            } else if base == alt_base {
                lik[0] += (epsilon * pr_ref).log10();
                lik[1] += ((1.0 - epsilon * (1.0 + pr_ref)) / 2.0).log10();
                lik[2] += (1.0 - epsilon).log10();
            } else {
                continue;
            }
            informative += 1;
        }

        if informative > 0 && lik.iter().all(|l| l.is_finite()) {
            Some(lik)
        } else {
            None
        }
    }

    /// PHRED-scaled genotype likelihoods, normalized to the most likely genotype.
    pub fn genotype_likelihoods(
        &self,
        observations: &[BaseObservation],
        ref_base: u8,
        alt_base: u8,
    ) -> Option<GenotypeLikelihoods> {
        let lik = self.log10_likelihoods(observations, ref_base, alt_base)?;
        let max = lik.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if !max.is_finite() {
            return None;
        }
        let pl = lik.iter().map(|l| -10.0 * (l - max)).collect_vec();
        Some(GenotypeLikelihoods([pl[0], pl[1], pl[2]]))
    }
}

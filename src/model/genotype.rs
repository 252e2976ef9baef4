// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Diploid genotypes over the three alleles REF, ALT and dropout (`.`).

use std::fmt;

use derive_new::new;
use itertools::iproduct;
use statrs::function::factorial::ln_factorial;

use crate::model::AlleleFreqs;

/// Allele counts (ref, alt, dropout) of a diploid individual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Genotype(pub [u8; 3]);

pub const PLOIDY: u8 = 2;

/// All diploid genotypes, in the order `0/0, 0/1, 0/., 1/1, 1/., ./.`.
pub const GENOTYPES: [Genotype; 6] = [
    Genotype([2, 0, 0]),
    Genotype([1, 1, 0]),
    Genotype([1, 0, 1]),
    Genotype([0, 2, 0]),
    Genotype([0, 1, 1]),
    Genotype([0, 0, 2]),
];

/// Genotype class as visible in the reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservedGenotype {
    HomRef,
    Het,
    HomAlt,
    Invisible,
}

impl Genotype {
    pub fn ref_count(&self) -> u8 {
        self.0[0]
    }

    pub fn alt_count(&self) -> u8 {
        self.0[1]
    }

    pub fn dropout_count(&self) -> u8 {
        self.0[2]
    }

    /// Position of this genotype in `GENOTYPES`.
    pub fn index(&self) -> Option<usize> {
        GENOTYPES.iter().position(|g| g == self)
    }

    pub fn has_dropout(&self) -> bool {
        self.dropout_count() > 0
    }

    /// Number of alleles that yield reads.
    pub fn sequenced_alleles(&self) -> u8 {
        self.ref_count() + self.alt_count()
    }

    /// Expected coverage relative to an individual without dropout alleles.
    pub fn relative_coverage(&self) -> f64 {
        self.sequenced_alleles() as f64 / PLOIDY as f64
    }

    pub fn observed(&self) -> ObservedGenotype {
        match (self.ref_count(), self.alt_count()) {
            (0, 0) => ObservedGenotype::Invisible,
            (_, 0) => ObservedGenotype::HomRef,
            (0, _) => ObservedGenotype::HomAlt,
            _ => ObservedGenotype::Het,
        }
    }

    /// Hardy-Weinberg probability of this genotype given allele frequencies (natural log).
    pub fn ln_hwe_prob(&self, phi: &AlleleFreqs) -> f64 {
        let mut prob = ln_factorial(PLOIDY as u64);
        for (count, freq) in self.0.iter().zip(phi.0.iter()) {
            if *count > 0 {
                prob += *count as f64 * freq.ln() - ln_factorial(*count as u64);
            }
        }
        prob
    }

    /// Probability that a parent with this genotype transmits each of the three alleles.
    pub fn transmission_probs(&self) -> [f64; 3] {
        let ploidy = PLOIDY as f64;
        [
            self.ref_count() as f64 / ploidy,
            self.alt_count() as f64 / ploidy,
            self.dropout_count() as f64 / ploidy,
        ]
    }

    /// Mendelian probability of each genotype in `GENOTYPES` for a child of the given parents.
    pub fn offspring_probs(father: &Genotype, mother: &Genotype) -> [f64; 6] {
        let paternal = father.transmission_probs();
        let maternal = mother.transmission_probs();
        let mut probs = [0.0; 6];
        for (i, j) in iproduct!(0..3, 0..3) {
            let mut counts = [0; 3];
            counts[i] += 1;
            counts[j] += 1;
            if let Some(idx) = Genotype(counts).index() {
                probs[idx] += paternal[i] * maternal[j];
            }
        }
        probs
    }
}

impl fmt::Display for Genotype {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let call = match self.0 {
            [2, 0, 0] => "0/0",
            [1, 1, 0] => "0/1",
            [1, 0, 1] => "0/.",
            [0, 2, 0] => "1/1",
            [0, 1, 1] => "1/.",
            [0, 0, 2] => "./.",
            _ => return Err(fmt::Error),
        };
        f.write_str(call)
    }
}

/// Genotypes of father and mother.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, new)]
pub struct JointGenotype {
    pub father: Genotype,
    pub mother: Genotype,
}

impl JointGenotype {
    /// Whether this combination belongs to the null hypothesis (no parental dropout allele).
    pub fn is_null(&self) -> bool {
        !self.father.has_dropout() && !self.mother.has_dropout()
    }

    /// Parental genotype calls as written to the output, e.g. `0/0,0/.`.
    pub fn formatted(&self) -> String {
        format!("{},{}", self.father, self.mother)
    }
}

lazy_static! {
    /// All 36 combinations of parental genotypes.
    pub static ref TRIO_GENOTYPES: Vec<JointGenotype> = iproduct!(GENOTYPES.iter(), GENOTYPES.iter())
        .map(|(father, mother)| JointGenotype::new(*father, *mother))
        .collect();
    pub static ref NULL_TRIO_GENOTYPES: usize = TRIO_GENOTYPES.iter().filter(|gt| gt.is_null()).count();
    pub static ref ALT_TRIO_GENOTYPES: usize = TRIO_GENOTYPES.len() - *NULL_TRIO_GENOTYPES;
}

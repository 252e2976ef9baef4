// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

pub mod call;
pub mod coverage;
pub mod genotype;
pub mod likelihood;
pub mod params;
pub mod solver;

pub use call::{PedigreeRole, SampleCall};
pub use genotype::{Genotype, JointGenotype};
pub use params::{DropoutParams, History, PedigreeParams};

/// Frequencies of the reference, alternative and dropout allele (phi).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlleleFreqs(pub [f64; 3]);

impl AlleleFreqs {
    pub fn reference(&self) -> f64 {
        self.0[0]
    }

    pub fn alt(&self) -> f64 {
        self.0[1]
    }

    pub fn dropout(&self) -> f64 {
        self.0[2]
    }
}

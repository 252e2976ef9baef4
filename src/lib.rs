// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Detection of restriction-site dropout alleles in reduced-representation
//! (GBS, RAD-seq) sequencing data.
//!
//! For each marker, two competing models are fitted by expectation maximization:
//! one that allows a segregating allele that abolishes the restriction site
//! (and therefore removes all reads of its haplotype), and a null model without
//! such an allele. The resulting likelihood ratio is reported in the output VCF.
//! With a pedigree, the parental genotypes are enumerated and integrated out
//! instead.

#[macro_use]
extern crate log;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate getset;
#[cfg(test)]
#[macro_use]
extern crate approx;

pub mod calling;
pub mod cli;
pub mod constants;
pub mod em;
pub mod errors;
pub mod io;
pub mod model;
pub mod projection;
pub mod utils;

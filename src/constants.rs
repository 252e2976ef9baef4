// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

/// Dropout allele frequency used to seed the alternative hypothesis.
pub const SEED_DROPOUT_FREQ: f64 = 0.01;

/// Alternative allele frequency assumed if the record does not provide an AF estimate.
pub const DEFAULT_ALT_FREQ: f64 = 0.01;

/// Upper bound for the AF seed, keeping the reference allele frequency positive.
pub const MAX_ALT_FREQ: f64 = 0.9999;

/// Lower bound for the digest failure seed.
pub const MIN_DIGEST_FAILURE: f64 = 0.01;

/// Offset of ASCII encoded (FASTQ style) base qualities.
pub const PHRED_ASCII_OFFSET: u8 = 33;

/// Maximum number of reads considered per sample and locus.
pub const MAX_PILEUP_DEPTH: usize = 250;

/// Normalization factor used whenever no factor can be looked up.
pub const DEFAULT_NORM_FACTOR: f64 = 1.0;

// Default coverage dispersion model: dispersion = slope * lambda + intercept.
pub const DEFAULT_DISP_SLOPE: f64 = 0.0;
pub const DEFAULT_DISP_INTERCEPT: f64 = 2.5;

// Convergence tolerances of the unrelated sample EM.
pub const PHI_TOLERANCE: f64 = 0.001;
pub const LAMBDA_TOLERANCE: f64 = 0.1;
pub const DELTA_TOLERANCE: f64 = 0.005;

// Pedigree coverage estimates are noisier, hence the looser tolerance.
pub const PEDIGREE_LAMBDA_TOLERANCE: f64 = 0.25;

/// Digest failure rate assumed by the pedigree EM.
pub const PEDIGREE_DIGEST_FAILURE: f64 = 0.01;

/// Base-miscall confusion probabilities for Illumina sequencers
/// (DePristo et al. 2010), indexed by the A, C, G, T order of `base_index`.
/// Self transitions are undefined.
pub const CONFUSION_MATRIX: [[Option<f64>; 4]; 4] = [
    [None, Some(0.577), Some(0.171), Some(0.252)],
    [Some(0.349), None, Some(0.113), Some(0.539)],
    [Some(0.319), Some(0.051), None, Some(0.630)],
    [Some(0.458), Some(0.221), Some(0.320), None],
];

/// Index of a nucleotide in `CONFUSION_MATRIX`.
pub fn base_index(base: u8) -> Option<usize> {
    match base.to_ascii_uppercase() {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        _ => None,
    }
}

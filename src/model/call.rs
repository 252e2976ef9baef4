// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use strum_macros::Display;

use crate::constants::DEFAULT_NORM_FACTOR;
use crate::model::likelihood::GenotypeLikelihoods;
use crate::utils;

/// Role of a sample in the analysed family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum PedigreeRole {
    None,
    Father,
    Mother,
    Child,
}

impl Default for PedigreeRole {
    fn default() -> Self {
        PedigreeRole::None
    }
}

/// Observations of one sample at one marker.
#[derive(Debug, Clone, PartialEq, Getters, Setters)]
pub struct SampleCall {
    #[getset(get = "pub")]
    sample: String,
    #[getset(get = "pub")]
    depth: u32,
    #[getset(get = "pub")]
    genotype_likelihoods: Option<GenotypeLikelihoods>,
    #[getset(get = "pub")]
    insert_sizes: Vec<i64>,
    #[getset(get = "pub")]
    self_sites: Vec<String>,
    #[getset(get = "pub")]
    mate_sites: Vec<String>,
    #[getset(get = "pub", set = "pub")]
    norm_factor: f64,
    #[getset(get = "pub", set = "pub")]
    role: PedigreeRole,
}

impl SampleCall {
    /// Create a new call. Genotype likelihoods are dropped if there is no coverage.
    pub fn new(
        sample: String,
        depth: u32,
        genotype_likelihoods: Option<GenotypeLikelihoods>,
    ) -> Self {
        SampleCall {
            sample,
            depth,
            genotype_likelihoods: if depth > 0 {
                genotype_likelihoods
            } else {
                None
            },
            insert_sizes: Vec::new(),
            self_sites: Vec::new(),
            mate_sites: Vec::new(),
            norm_factor: DEFAULT_NORM_FACTOR,
            role: PedigreeRole::None,
        }
    }

    pub fn with_read_tags(
        mut self,
        insert_sizes: Vec<i64>,
        self_sites: Vec<String>,
        mate_sites: Vec<String>,
    ) -> Self {
        self.insert_sizes = insert_sizes;
        self.self_sites = self_sites;
        self.mate_sites = mate_sites;
        self
    }

    /// Forget genotype likelihoods (depth-only mode).
    pub fn strip_genotype_likelihoods(&mut self) {
        self.genotype_likelihoods = None;
    }

    pub fn is_missing(&self) -> bool {
        self.depth == 0
    }

    /// Median insert size of the reads (INS).
    pub fn median_insert_size(&self) -> Option<f64> {
        utils::median(&self.insert_sizes.iter().map(|ins| *ins as f64).collect::<Vec<_>>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_depth_drops_likelihoods() {
        let call = SampleCall::new(
            "s1".to_owned(),
            0,
            Some(GenotypeLikelihoods([0.0, 3.0, 30.0])),
        );
        assert!(call.genotype_likelihoods().is_none());
        assert!(call.is_missing());

        let mut call = SampleCall::new(
            "s2".to_owned(),
            4,
            Some(GenotypeLikelihoods([0.0, 3.0, 30.0])),
        );
        assert!(call.genotype_likelihoods().is_some());
        call.strip_genotype_likelihoods();
        assert!(call.genotype_likelihoods().is_none());
        assert_eq!(*call.norm_factor(), 1.0);
        assert_eq!(*call.role(), PedigreeRole::None);
    }

    #[test]
    fn test_median_insert_size() {
        let call = SampleCall::new("s1".to_owned(), 3, None).with_read_tags(
            vec![300, 100, 300, 200],
            vec![],
            vec![],
        );
        assert_relative_eq!(call.median_insert_size().unwrap(), 250.0);
        assert_eq!(SampleCall::new("s2".to_owned(), 0, None).median_insert_size(), None);
    }
}

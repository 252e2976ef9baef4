// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Per-sample observations taken directly from the reads of an indexed BAM file.
//!
//! Besides the bases, the reads may carry annotations of the restriction fragment:
//! `Z0` (insert size before trimming), `Z2` (restriction sites of the read) and
//! `Z4` (restriction sites of the mate).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rust_htslib::bam;
use rust_htslib::bam::record::Aux;
use rust_htslib::bam::Read;

use crate::constants::MAX_PILEUP_DEPTH;
use crate::model::likelihood::{BaseObservation, GenotypeLikelihoodModel};
use crate::model::SampleCall;

/// Reads and read annotations collected at a single locus.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocusReads {
    pub depth: u32,
    pub observations: Vec<BaseObservation>,
    pub insert_sizes: Vec<i64>,
    pub self_sites: Vec<String>,
    pub mate_sites: Vec<String>,
}

impl LocusReads {
    /// Add a read, given its base (if it has one at the locus) and its record.
    fn push(&mut self, record: &bam::Record, qpos: Option<usize>) {
        self.depth += 1;
        if let Some(qpos) = qpos {
            self.observations.push(BaseObservation::new(
                record.seq()[qpos],
                record.qual()[qpos],
            ));
        }
        if let Some(insert_size) = aux_integer(record, b"Z0") {
            self.insert_sizes.push(insert_size);
        }
        if let Some(sites) = aux_string(record, b"Z2") {
            self.self_sites.push(sites);
        }
        if let Some(sites) = aux_string(record, b"Z4") {
            self.mate_sites.push(sites);
        }
    }

    /// Turn the reads into a sample call for the given alleles.
    pub fn into_call(
        self,
        sample: &str,
        model: &GenotypeLikelihoodModel,
        ref_base: u8,
        alt_base: Option<u8>,
    ) -> SampleCall {
        let genotype_likelihoods = alt_base
            .and_then(|alt| model.genotype_likelihoods(&self.observations, ref_base, alt));
        SampleCall::new(sample.to_owned(), self.depth, genotype_likelihoods).with_read_tags(
            self.insert_sizes,
            self.self_sites,
            self.mate_sites,
        )
    }
}

fn aux_integer(record: &bam::Record, tag: &[u8]) -> Option<i64> {
    match record.aux(tag) {
        Ok(Aux::I8(value)) => Some(value as i64),
        Ok(Aux::U8(value)) => Some(value as i64),
        Ok(Aux::I16(value)) => Some(value as i64),
        Ok(Aux::U16(value)) => Some(value as i64),
        Ok(Aux::I32(value)) => Some(value as i64),
        Ok(Aux::U32(value)) => Some(value as i64),
        _ => None,
    }
}

fn aux_string(record: &bam::Record, tag: &[u8]) -> Option<String> {
    match record.aux(tag) {
        Ok(Aux::String(value)) => Some(value.to_owned()),
        _ => None,
    }
}

/// Indexed BAM file of one sample.
pub struct BamSource {
    sample: String,
    path: PathBuf,
    reader: bam::IndexedReader,
    model: GenotypeLikelihoodModel,
    max_depth: usize,
}

impl BamSource {
    pub fn from_path<P: AsRef<Path>>(sample: &str, path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = bam::IndexedReader::from_path(path)
            .with_context(|| format!("error opening indexed BAM file {}", path.display()))?;
        Ok(BamSource {
            sample: sample.to_owned(),
            path: path.to_owned(),
            reader,
            model: GenotypeLikelihoodModel::decoded(),
            max_depth: MAX_PILEUP_DEPTH,
        })
    }

    pub fn sample(&self) -> &str {
        &self.sample
    }

    /// Collect the reads with a mapping quality above zero at the given (0-based)
    /// position. At most `MAX_PILEUP_DEPTH` reads are used.
    pub fn reads(&mut self, chrom: &[u8], pos: i64) -> Result<LocusReads> {
        let mut reads = LocusReads::default();
        if self.reader.header().tid(chrom).is_none() {
            // contig without alignments in this file
            return Ok(reads);
        }
        self.reader.fetch((chrom, pos, pos + 1)).with_context(|| {
            format!(
                "error fetching {}:{} from {}",
                String::from_utf8_lossy(chrom),
                pos + 1,
                self.path.display()
            )
        })?;

        for pileup in self.reader.pileup() {
            let pileup = pileup?;
            if (pileup.pos() as i64) < pos {
                continue;
            }
            if pileup.pos() as i64 > pos {
                break;
            }
            for alignment in pileup.alignments() {
                if reads.depth as usize >= self.max_depth {
                    break;
                }
                let record = alignment.record();
                if record.mapq() == 0 {
                    continue;
                }
                reads.push(&record, alignment.qpos());
            }
        }
        Ok(reads)
    }

    /// Sample call at the given (0-based) position.
    pub fn call(
        &mut self,
        chrom: &[u8],
        pos: i64,
        ref_base: u8,
        alt_base: Option<u8>,
    ) -> Result<SampleCall> {
        let model = self.model;
        let reads = self.reads(chrom, pos)?;
        Ok(reads.into_call(&self.sample, &model, ref_base, alt_base))
    }
}

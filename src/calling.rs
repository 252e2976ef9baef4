// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Marker-at-a-time processing of the input records: per-sample calls are collected
//! from BAM files or the record itself, fitted with the unrelated or the pedigree
//! model and written back with the resulting annotations.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use derive_builder::Builder;
use progress_logger::ProgressLogger;
use rust_htslib::bcf::{self, Read};

use crate::em::{Dispersion, EmConfig, Marker, PedigreeMarker};
use crate::errors;
use crate::io::normfactors::NormFactors;
use crate::io::ped::Family;
use crate::io::pileup::BamSource;
use crate::io::same_samples;
use crate::io::samples::{read_bam_list, read_sample_list};
use crate::io::vcf::{self, RecordCalls, Site};
use crate::model::solver::{DropoutEm, TrioEm};
use crate::projection::MarkerInfo;

#[derive(Builder)]
#[builder(pattern = "owned")]
pub struct Caller {
    #[builder(private)]
    reader: bcf::Reader,
    #[builder(private)]
    input: PathBuf,
    #[builder(private)]
    samples: Vec<String>,
    #[builder(private, default)]
    bams: HashMap<String, BamSource>,
    #[builder(private, default)]
    norm_factors: NormFactors,
    #[builder(private, default)]
    family: Option<Family>,
    /// Ignore genotype likelihoods and only use read depth.
    #[builder(default)]
    dp_mode: bool,
    #[builder(default)]
    dispersion: Dispersion,
    #[builder(default)]
    em_config: EmConfig,
    /// Output file, stdout if not given.
    #[builder(default)]
    output: Option<PathBuf>,
    /// Write BCF instead of VCF.
    #[builder(default)]
    bcf: bool,
}

impl CallerBuilder {
    /// Input VCF/BCF with the markers to test. All of its samples are analysed unless
    /// a sample list is given afterwards.
    pub fn vcf<P: AsRef<Path>>(self, path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = bcf::Reader::from_path(path)
            .with_context(|| format!("error opening input VCF/BCF {}", path.display()))?;
        let samples = reader
            .header()
            .samples()
            .iter()
            .map(|sample| String::from_utf8_lossy(sample).into_owned())
            .collect();
        Ok(self
            .reader(reader)
            .input(path.to_owned())
            .samples(samples))
    }

    pub fn sample_list<P: AsRef<Path>>(self, path: Option<P>) -> Result<Self> {
        match path {
            Some(path) => {
                let samples = read_sample_list(path)?;
                Ok(self.samples(samples))
            }
            None => Ok(self),
        }
    }

    /// BAM files to pile up reads from. Samples without BAM file are taken from the
    /// input VCF/BCF.
    pub fn bam_list<P: AsRef<Path>>(self, path: Option<P>) -> Result<Self> {
        let bams = match path {
            Some(path) => read_bam_list(path)?,
            None => return Ok(self),
        };
        let bam_samples: Vec<String> = bams.iter().map(|(sample, _)| sample.clone()).collect();
        if !same_samples(&bam_samples, self.analysed_samples()) {
            warn!(
                "Samples in the BAM list and the analysed samples do not agree. Samples \
                 without BAM file are taken from the input VCF/BCF."
            );
        }

        let mut sources = HashMap::new();
        for (sample, bam) in bams {
            if self.analysed_samples().contains(&sample) {
                let source = BamSource::from_path(&sample, bam)?;
                sources.insert(sample, source);
            }
        }
        Ok(self.bams(sources))
    }

    pub fn norm<P: AsRef<Path>>(self, path: Option<P>) -> Result<Self> {
        match path {
            Some(path) => {
                let factors = NormFactors::load(path, self.analysed_samples())?;
                Ok(self.norm_factors(factors))
            }
            None => Ok(self),
        }
    }

    /// PED file. With a pedigree, markers are fitted with the trio model. Without a
    /// family among the analysed samples, they are treated as unrelated.
    pub fn ped<P: AsRef<Path>>(self, path: Option<P>) -> Result<Self> {
        match path {
            Some(path) => {
                let family = Family::from_ped(path, self.analysed_samples())?;
                Ok(self.family(family))
            }
            None => Ok(self),
        }
    }

    fn analysed_samples(&self) -> &[String] {
        self.samples.as_deref().unwrap_or(&[])
    }
}

impl Caller {
    pub fn call(&mut self) -> Result<()> {
        if self.samples.is_empty() {
            return Err(errors::Error::NoSamples.into());
        }
        let header_sample_names: Vec<String> = self
            .reader
            .header()
            .samples()
            .iter()
            .map(|sample| String::from_utf8_lossy(sample).into_owned())
            .collect();
        let header_samples: HashMap<String, usize> = header_sample_names
            .iter()
            .enumerate()
            .map(|(i, sample)| (sample.clone(), i))
            .collect();
        for sample in &self.samples {
            if !header_samples.contains_key(sample) && !self.bams.contains_key(sample) {
                warn!(
                    "Sample {} is neither in the input VCF/BCF nor in the BAM list.",
                    sample
                );
            }
        }
        if self.family.is_some() {
            info!("Fitting markers with the pedigree model.");
        }

        let header = vcf::output_header(
            self.reader.header(),
            self.family.is_some(),
            &self.input.display().to_string(),
            &self.dispersion,
        );
        let format = if self.bcf {
            bcf::Format::Bcf
        } else {
            bcf::Format::Vcf
        };
        let mut writer = match self.output {
            Some(ref path) => bcf::Writer::from_path(path, &header, !self.bcf, format)
                .with_context(|| format!("error writing to {}", path.display()))?,
            None => bcf::Writer::from_stdout(&header, !self.bcf, format)?,
        };

        let mut progress_logger = ProgressLogger::builder()
            .with_items_name("records")
            .with_frequency(std::time::Duration::from_secs(20))
            .start();
        let mut record = self.reader.empty_record();
        let mut i = 0;
        while let Some(result) = self.reader.read(&mut record) {
            result?;
            i += 1;
            writer.translate(&mut record);
            match self.marker_info(&record, i, &header_samples) {
                Ok(info) => vcf::annotate(&mut record, &info, &header_sample_names)?,
                Err(e) => error!("Record {} is written without annotation: {}", i, e),
            }
            writer.write(&record)?;
            progress_logger.update(1u64);
        }
        progress_logger.stop();

        Ok(())
    }

    fn marker_info(
        &mut self,
        record: &bcf::Record,
        i: usize,
        header_samples: &HashMap<String, usize>,
    ) -> Result<MarkerInfo> {
        let site = Site::from_record(record, i)?;
        let record_calls = RecordCalls::from_record(record);

        let mut calls = Vec::with_capacity(self.samples.len());
        for sample in &self.samples {
            let bam_call = match self.bams.get_mut(sample) {
                Some(bam) => {
                    match bam.call(&site.chrom, site.pos, site.ref_base, site.alt_base) {
                        Ok(call) => Some(call),
                        Err(e) => {
                            warn!(
                                "Error reading BAM file of sample {} at {}:{}, using the input \
                                 VCF/BCF instead: {}",
                                sample,
                                site.chrom_name(),
                                site.pos + 1,
                                e
                            );
                            None
                        }
                    }
                }
                None => None,
            };
            let mut call = match bam_call.or_else(|| {
                header_samples
                    .get(sample)
                    .map(|index| record_calls.call(sample, *index))
            }) {
                Some(call) => call,
                None => {
                    return Err(errors::Error::MissingSample {
                        name: sample.clone(),
                    }
                    .into())
                }
            };

            let norm_factor = self.norm_factors.get(sample, call.median_insert_size());
            call.set_norm_factor(norm_factor);
            if self.dp_mode {
                call.strip_genotype_likelihoods();
            }
            if let Some(ref family) = self.family {
                call.set_role(family.role(sample));
            }
            calls.push(call);
        }

        Ok(match self.family {
            Some(_) => {
                let mut marker = PedigreeMarker::new(calls, &self.dispersion);
                let solver = TrioEm {
                    digest_failure: self.em_config.pedigree_digest_failure,
                };
                marker.fit(&solver, &self.em_config);
                MarkerInfo::from_pedigree(&marker)
            }
            None => {
                let mut marker = Marker::new(calls, site.alt_freq, &self.dispersion);
                marker.fit(&DropoutEm::default(), &self.em_config);
                MarkerInfo::from_marker(&marker)
            }
        })
    }
}

// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::path::PathBuf;

use anyhow::Result;
use structopt::StructOpt;

use crate::calling::CallerBuilder;
use crate::constants::{DEFAULT_DISP_INTERCEPT, DEFAULT_DISP_SLOPE};
use crate::em::{Dispersion, EmConfig};

#[derive(Debug, StructOpt, Clone)]
#[structopt(
    name = "gbs-dropout",
    about = "Detection of restriction-site dropout alleles in GBS and RAD-seq data.",
    setting = structopt::clap::AppSettings::ColoredHelp
)]
pub enum GbsDropout {
    #[structopt(
        name = "call",
        about = "Test each marker of a VCF/BCF file for a segregating restriction-site dropout allele.",
        setting = structopt::clap::AppSettings::ColoredHelp
    )]
    Call {
        #[structopt(
            parse(from_os_str),
            help = "VCF/BCF file with the markers to test and per-sample DP and PL values."
        )]
        calls: PathBuf,
        #[structopt(
            long,
            parse(from_os_str),
            help = "File with whitespace separated sample names and paths to indexed BAM files. \
                    Depth and genotype likelihoods are then computed from the reads instead of \
                    the VCF/BCF."
        )]
        bams: Option<PathBuf>,
        #[structopt(
            long,
            parse(from_os_str),
            help = "Table with per-sample depth normalization factors, binned by insert size."
        )]
        norm: Option<PathBuf>,
        #[structopt(
            long,
            parse(from_os_str),
            help = "PED file. If given, markers are tested with the pedigree model on the \
                    family with the most children among the analysed samples."
        )]
        ped: Option<PathBuf>,
        #[structopt(
            long,
            parse(from_os_str),
            help = "File with the names of the samples to analyse, one per line (default: all \
                    samples of the VCF/BCF)."
        )]
        samples: Option<PathBuf>,
        #[structopt(long = "dp-mode", help = "Ignore genotype likelihoods and only use depth.")]
        dp_mode: bool,
        #[structopt(
            long = "disp-slope",
            default_value = "0.0",
            help = "Slope of the linear model of coverage dispersion."
        )]
        disp_slope: f64,
        #[structopt(
            long = "disp-intercept",
            default_value = "2.5",
            help = "Intercept of the linear model of coverage dispersion."
        )]
        disp_intercept: f64,
        #[structopt(
            long = "em-config",
            parse(from_os_str),
            help = "JSON file with EM settings (convergence tolerances, iteration cap, \
                    pedigree digest failure rate)."
        )]
        em_config: Option<PathBuf>,
        #[structopt(
            long,
            short,
            parse(from_os_str),
            help = "Output file (if omitted, write to STDOUT)."
        )]
        output: Option<PathBuf>,
        #[structopt(long, help = "Write BCF instead of VCF.")]
        bcf: bool,
        #[structopt(
            long,
            short,
            default_value = "1",
            help = "Number of threads used for fitting the parental genotypes of a pedigree."
        )]
        threads: usize,
        #[structopt(long, short, help = "Print debug messages.")]
        verbose: bool,
    },
}

impl GbsDropout {
    pub fn verbose(&self) -> bool {
        match self {
            GbsDropout::Call { verbose, .. } => *verbose,
        }
    }
}

pub fn run(opt: GbsDropout) -> Result<()> {
    match opt {
        GbsDropout::Call {
            ref calls,
            ref bams,
            ref norm,
            ref ped,
            ref samples,
            dp_mode,
            disp_slope,
            disp_intercept,
            ref em_config,
            ref output,
            bcf,
            threads,
            ..
        } => {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build_global()?;

            let em_config = match em_config {
                Some(path) => EmConfig::from_path(path)?,
                None => EmConfig::default(),
            };
            if (disp_slope, disp_intercept) != (DEFAULT_DISP_SLOPE, DEFAULT_DISP_INTERCEPT) {
                info!(
                    "Using coverage dispersion model {} * lambda + {}.",
                    disp_slope, disp_intercept
                );
            }

            let mut caller = CallerBuilder::default()
                .vcf(calls)?
                .sample_list(samples.as_ref())?
                .bam_list(bams.as_ref())?
                .norm(norm.as_ref())?
                .ped(ped.as_ref())?
                .dp_mode(dp_mode)
                .dispersion(Dispersion::new(disp_slope, disp_intercept))
                .em_config(em_config)
                .output(output.clone())
                .bcf(bcf)
                .build()?;
            caller.call()?;
        }
    }
    Ok(())
}

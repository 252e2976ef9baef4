// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Reading of markers and per-sample calls from VCF/BCF, and annotation of the output.

use anyhow::Result;
use rust_htslib::bcf;
use rust_htslib::bcf::record::Numeric;

use crate::em::Dispersion;
use crate::errors;
use crate::model::likelihood::GenotypeLikelihoods;
use crate::model::SampleCall;
use crate::projection::{InfoValue, MarkerInfo, SampleFormat};

const VECTOR_END_INTEGER: i32 = i32::MIN + 1;

fn is_value(value: i32) -> bool {
    !value.is_missing() && value != VECTOR_END_INTEGER
}

/// Position and alleles of a marker.
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    pub chrom: Vec<u8>,
    /// 0-based position.
    pub pos: i64,
    pub ref_base: u8,
    pub alt_base: Option<u8>,
    /// ALT allele frequency estimate (INFO/AF).
    pub alt_freq: Option<f64>,
}

impl Site {
    /// `i` is the index of the record in the input, used for error reporting.
    pub fn from_record(record: &bcf::Record, i: usize) -> Result<Self> {
        let rid = record
            .rid()
            .ok_or(errors::Error::RecordMissingChrom { i })?;
        let chrom = record.header().rid2name(rid)?.to_owned();
        let alleles = record.alleles();
        let ref_base = alleles
            .get(0)
            .and_then(|allele| allele.get(0))
            .cloned()
            .unwrap_or(b'N');
        let alt_base = alleles
            .get(1)
            .filter(|allele| **allele != &b"."[..])
            .and_then(|allele| allele.get(0))
            .cloned();
        let alt_freq = match record.info(b"AF").float() {
            Ok(Some(values)) => values
                .get(0)
                .filter(|af| !af.is_missing() && af.is_finite())
                .map(|af| *af as f64),
            _ => None,
        };

        Ok(Site {
            chrom,
            pos: record.pos(),
            ref_base,
            alt_base,
            alt_freq,
        })
    }

    pub fn chrom_name(&self) -> String {
        String::from_utf8_lossy(&self.chrom).into_owned()
    }
}

/// FORMAT/DP and FORMAT/PL of all samples of a record.
#[derive(Debug, Clone, Default)]
pub struct RecordCalls {
    depths: Option<Vec<i32>>,
    likelihoods: Option<Vec<Vec<i32>>>,
}

impl RecordCalls {
    pub fn from_record(record: &bcf::Record) -> Self {
        let depths = record
            .format(b"DP")
            .integer()
            .ok()
            .map(|dps| dps.iter().map(|dp| dp.get(0).cloned().unwrap_or(0)).collect());
        let likelihoods = record
            .format(b"PL")
            .integer()
            .ok()
            .map(|pls| pls.iter().map(|pl| pl.to_vec()).collect());
        RecordCalls {
            depths,
            likelihoods,
        }
    }

    /// Call of the sample with the given index in the VCF header.
    pub fn call(&self, sample: &str, index: usize) -> SampleCall {
        let depth = self
            .depths
            .as_ref()
            .and_then(|dps| dps.get(index))
            .filter(|dp| is_value(**dp) && **dp > 0)
            .map_or(0, |dp| *dp as u32);
        let genotype_likelihoods = self
            .likelihoods
            .as_ref()
            .and_then(|pls| pls.get(index))
            .filter(|pl| pl.len() >= 3 && pl[..3].iter().all(|v| is_value(*v)))
            .map(|pl| GenotypeLikelihoods([pl[0] as f64, pl[1] as f64, pl[2] as f64]));
        SampleCall::new(sample.to_owned(), depth, genotype_likelihoods)
    }
}

const INFO_HEADER: &[(&str, &str, &str, &str)] = &[
    ("DLR", "1", "Float", "Dropout likelihood ratio"),
    ("DFreq", "1", "Float", "Dropout allele frequency estimated by EM"),
    ("AFH1", "1", "Float", "Allele frequency estimated by EM"),
    ("AFH0", "1", "Float", "Null hypothesis allele frequency estimated by EM"),
    ("LambdaH1", "1", "Float", "Normalized mean coverage estimated by EM"),
    ("LambdaH0", "1", "Float", "Null hypothesis normalized mean coverage estimated by EM"),
    ("DigestH1", "1", "Float", "Digest failure rate estimated by EM"),
    ("DigestH0", "1", "Float", "Null hypothesis digest failure rate estimated by EM"),
    ("IterationH1", "1", "Integer", "Number of alternative hypothesis EM iterations"),
    ("IterationH0", "1", "Integer", "Number of null hypothesis EM iterations"),
    ("EMFailH1", "0", "Flag", "EM failure flag"),
    ("EMFailH0", "0", "Flag", "Null hypothesis EM failure flag"),
    ("SelfRS", ".", "String", "Recognition sites for reads mapped to the SNP"),
    ("MateRS", ".", "String", "Recognition sites for mate pairs of reads mapped to the SNP"),
    ("InsMed", "1", "Float", "Insert size median"),
    ("InsMAD", "1", "Float", "Insert size MAD"),
];

const PEDIGREE_INFO_HEADER: &[(&str, &str, &str, &str)] = &[
    ("DLR", "1", "Float", "Dropout likelihood ratio"),
    ("ParentsH1", ".", "String", "Maximum likelihood parental genotypes for alternative hypothesis"),
    ("ParentsH0", ".", "String", "Maximum likelihood parental genotypes for null hypothesis"),
    ("LambdaH1", "1", "Float", "Normalized mean coverage estimated by EM for MLE parental genotypes"),
    ("LambdaH0", "1", "Float", "Null hypothesis normalized mean coverage estimated by EM for MLE parental genotypes"),
    ("IterationH1", "1", "Integer", "Number of alternative hypothesis EM iterations for MLE parental genotypes"),
    ("IterationH0", "1", "Integer", "Number of null hypothesis EM iterations for MLE parental genotypes"),
    ("EMFailH1", "0", "Flag", "EM failure flag"),
    ("EMFailH0", "0", "Flag", "Null hypothesis EM failure flag"),
    ("SelfRS", ".", "String", "Recognition sites for reads mapped to the SNP"),
    ("MateRS", ".", "String", "Recognition sites for mate pairs of reads mapped to the SNP"),
    ("InsMed", "1", "Float", "Insert size median"),
    ("InsMAD", "1", "Float", "Insert size MAD"),
];

const FORMAT_HEADER: &[(&str, &str, &str, &str)] = &[
    ("DC", "1", "Integer", "Dropout allele count"),
    ("INS", "1", "Integer", "Median insert size"),
    ("NF", "1", "Float", "Normalization factor for sample DP"),
];

/// Output header: the input header plus the annotation fields and a line recording
/// the input and the dispersion model.
pub fn output_header(
    template: &bcf::header::HeaderView,
    pedigree: bool,
    input: &str,
    dispersion: &Dispersion,
) -> bcf::Header {
    let mut header = bcf::Header::from_template(template);
    let info = if pedigree {
        PEDIGREE_INFO_HEADER
    } else {
        INFO_HEADER
    };
    for (id, number, kind, description) in info {
        header.remove_info(id.as_bytes());
        header.push_record(
            format!(
                "##INFO=<ID={},Number={},Type={},Description=\"{}\">",
                id, number, kind, description
            )
            .as_bytes(),
        );
    }
    for (id, number, kind, description) in FORMAT_HEADER {
        header.remove_format(id.as_bytes());
        header.push_record(
            format!(
                "##FORMAT=<ID={},Number={},Type={},Description=\"{}\">",
                id, number, kind, description
            )
            .as_bytes(),
        );
    }
    header.push_record(
        format!(
            "##gbs-dropout=input_file={} disp_slope={} disp_intercept={}",
            input,
            dispersion.slope(),
            dispersion.intercept()
        )
        .as_bytes(),
    );
    header
}

/// Write the marker summary into the record. `samples` are the sample names in
/// header order; samples that were not analysed get missing FORMAT values.
pub fn annotate(record: &mut bcf::Record, info: &MarkerInfo, samples: &[String]) -> Result<()> {
    for (key, value) in info.info() {
        let tag = key.as_bytes();
        match value {
            InfoValue::Float(v) => record.push_info_float(tag, &[*v as f32])?,
            InfoValue::Integer(v) => record.push_info_integer(tag, &[*v])?,
            InfoValue::Flag => record.push_info_flag(tag)?,
            InfoValue::Str(v) => record.push_info_string(tag, &[v.as_bytes()])?,
        }
    }

    let formats: Vec<_> = samples.iter().map(|name| info.sample(name)).collect();
    let integers = |value: fn(&SampleFormat) -> Option<i32>| {
        formats
            .iter()
            .map(|f| f.and_then(value).unwrap_or_else(i32::missing))
            .collect::<Vec<i32>>()
    };
    record.push_format_integer(b"DC", &integers(|f| *f.dropout_count()))?;
    record.push_format_integer(b"INS", &integers(|f| *f.insert_size()))?;
    let norm_factors: Vec<f32> = formats
        .iter()
        .map(|f| {
            f.and_then(|f| *f.norm_factor())
                .map_or_else(f32::missing, |nf| nf as f32)
        })
        .collect();
    record.push_format_float(b"NF", &norm_factors)?;
    Ok(())
}

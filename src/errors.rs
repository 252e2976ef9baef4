use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("sample {name} not found in input VCF/BCF or in list of BAM files")]
    MissingSample { name: String },
    #[error("invalid line {line} in BAM list {path}: expected a sample name and a BAM path")]
    InvalidBamList { path: PathBuf, line: usize },
    #[error("invalid line {line} in PED file {path}: expected six whitespace separated columns")]
    InvalidPedLine { path: PathBuf, line: usize },
    #[error("invalid normalization factor file {path}: {msg}")]
    InvalidNormFactors { path: PathBuf, msg: String },
    #[error("record {i} in input VCF/BCF does not define a chromosome")]
    RecordMissingChrom { i: usize },
    #[error("the input VCF/BCF does not contain any samples to analyse")]
    NoSamples,
}

pub(crate) fn invalid_norm_factors(path: &Path, msg: &str) -> Error {
    Error::InvalidNormFactors {
        path: path.to_owned(),
        msg: msg.to_owned(),
    }
}

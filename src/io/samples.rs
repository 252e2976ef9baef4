// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::errors;

fn lines(path: &Path) -> Result<impl Iterator<Item = std::io::Result<String>>> {
    let file =
        File::open(path).with_context(|| format!("error opening {}", path.display()))?;
    Ok(BufReader::new(file).lines())
}

/// Read a list of sample names, one per line. Empty lines are skipped.
pub fn read_sample_list<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let mut samples = Vec::new();
    for line in lines(path.as_ref())? {
        let line = line?;
        let line = line.trim();
        if !line.is_empty() {
            samples.push(line.to_owned());
        }
    }
    Ok(samples)
}

/// Read a list of `sample path` pairs pointing to indexed BAM files.
pub fn read_bam_list<P: AsRef<Path>>(path: P) -> Result<Vec<(String, PathBuf)>> {
    let path = path.as_ref();
    let mut bams = Vec::new();
    for (i, line) in lines(path)?.enumerate() {
        let line = line?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [] => continue,
            [sample, bam] => bams.push(((*sample).to_owned(), PathBuf::from(*bam))),
            _ => {
                return Err(errors::Error::InvalidBamList {
                    path: path.to_owned(),
                    line: i + 1,
                }
                .into())
            }
        }
    }
    Ok(bams)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_sample_list() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "s1\n\n  s2 \ns3").unwrap();
        assert_eq!(read_sample_list(file.path()).unwrap(), vec!["s1", "s2", "s3"]);
    }

    #[test]
    fn test_read_bam_list() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "s1\t/data/s1.bam\ns2 /data/s2.bam\n").unwrap();
        let bams = read_bam_list(file.path()).unwrap();
        assert_eq!(bams.len(), 2);
        assert_eq!(bams[1], ("s2".to_owned(), PathBuf::from("/data/s2.bam")));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "s1 /data/s1.bam\ns2").unwrap();
        let err = read_bam_list(file.path()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<errors::Error>(),
            Some(&errors::Error::InvalidBamList {
                path: file.path().to_owned(),
                line: 2
            })
        );
    }
}

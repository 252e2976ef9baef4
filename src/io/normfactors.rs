// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Per-sample depth normalization factors, binned by insert size.
//!
//! The table has a header `bin sample1 sample2 ...` and one row per insert size bin.
//! The bin `NA` holds factors for protocols without a meaningful insert size (RAD-seq).

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};

use crate::constants::DEFAULT_NORM_FACTOR;
use crate::errors::invalid_norm_factors;
use crate::io::same_samples;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormFactors {
    factors: HashMap<(String, Option<i64>), f64>,
}

impl NormFactors {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<(Self, Vec<String>)> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("error opening normalization factors {}", path.display()))?;
        let mut lines = BufReader::new(file).lines();

        let header = match lines.next() {
            Some(header) => header?,
            None => return Err(invalid_norm_factors(path, "missing header").into()),
        };
        let samples: Vec<String> = header
            .split_whitespace()
            .skip(1)
            .map(|s| s.to_owned())
            .collect();

        let mut factors = HashMap::new();
        for line in lines {
            let line = line?;
            let mut fields = line.split_whitespace();
            let bin = match fields.next() {
                Some("NA") => None,
                Some(bin) => Some(bin.parse::<i64>().map_err(|_| {
                    invalid_norm_factors(path, &format!("invalid insert size bin {}", bin))
                })?),
                None => continue,
            };
            let row = fields
                .map(|f| f.parse::<f64>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| invalid_norm_factors(path, &e.to_string()))?;
            if row.len() != samples.len() {
                return Err(invalid_norm_factors(
                    path,
                    &format!("expected {} factors per row, found {}", samples.len(), row.len()),
                )
                .into());
            }
            for (sample, factor) in samples.iter().zip(row) {
                if !(factor > 0.0 && factor.is_finite()) {
                    return Err(invalid_norm_factors(
                        path,
                        &format!("factor {} of sample {} is not positive", factor, sample),
                    )
                    .into());
                }
                factors.insert((sample.clone(), bin), factor);
            }
        }
        Ok((NormFactors { factors }, samples))
    }

    /// Load the table, or discard it with a warning if its samples do not match the
    /// analysed ones. Without a table, all factors are 1.0.
    pub fn load<P: AsRef<Path>>(path: P, samples: &[String]) -> Result<Self> {
        let (factors, table_samples) = NormFactors::from_path(path)?;
        if same_samples(&table_samples, samples) {
            Ok(factors)
        } else {
            warn!(
                "Samples in the normalization factor table and the analysed samples do not \
                 agree. This may cause depth normalization errors. Using the default \
                 normalization factor ({}) for all samples.",
                DEFAULT_NORM_FACTOR
            );
            Ok(NormFactors::default())
        }
    }

    /// Factor for the sample at the given median insert size. Falls back to the `NA`
    /// bin and finally to the default factor.
    pub fn get(&self, sample: &str, insert_size: Option<f64>) -> f64 {
        let sample = sample.to_owned();
        insert_size
            .and_then(|ins| {
                self.factors
                    .get(&(sample.clone(), Some(ins.round() as i64)))
            })
            .or_else(|| self.factors.get(&(sample, None)))
            .cloned()
            .unwrap_or(DEFAULT_NORM_FACTOR)
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn table(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    fn samples(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_lookup() {
        let file = table("bin s1 s2\n200 0.5 1.5\n300 0.8 1.2\nNA 0.9 1.1\n");
        let factors = NormFactors::load(file.path(), &samples(&["s2", "s1"])).unwrap();
        assert_relative_eq!(factors.get("s1", Some(200.0)), 0.5);
        assert_relative_eq!(factors.get("s2", Some(299.6)), 1.2);
        // unknown bin falls back to NA
        assert_relative_eq!(factors.get("s1", Some(250.0)), 0.9);
        assert_relative_eq!(factors.get("s2", None), 1.1);
        assert_relative_eq!(factors.get("s3", Some(200.0)), 1.0);
    }

    #[test]
    fn test_sample_mismatch() {
        let file = table("bin s1 s2\nNA 0.9 1.1\n");
        let factors = NormFactors::load(file.path(), &samples(&["s1", "s2", "s3"])).unwrap();
        assert!(factors.is_empty());
        assert_relative_eq!(factors.get("s1", None), 1.0);
    }

    #[test]
    fn test_invalid() {
        let file = table("bin s1 s2\nNA 0.9\n");
        assert!(NormFactors::from_path(file.path()).is_err());
        let file = table("bin s1\nabc 0.9\n");
        assert!(NormFactors::from_path(file.path()).is_err());
        let file = table("bin s1\nNA -1.0\n");
        assert!(NormFactors::from_path(file.path()).is_err());
        let file = table("");
        assert!(NormFactors::from_path(file.path()).is_err());
    }
}

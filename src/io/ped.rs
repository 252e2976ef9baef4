// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use linear_map::LinearMap;

use crate::errors;
use crate::model::PedigreeRole;

/// Parents and children of the analysed trio.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
#[getset(get = "pub")]
pub struct Family {
    father: String,
    mother: String,
    children: Vec<String>,
}

impl Family {
    /// Read a PED file (family, individual, father, mother, sex, phenotype) and return
    /// the parent pair with the most children among the given samples. Ties are
    /// resolved by order of appearance. `None` if no pair has children among the
    /// samples.
    pub fn from_ped<P: AsRef<Path>>(path: P, samples: &[String]) -> Result<Option<Self>> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("error opening PED file {}", path.display()))?;

        let mut offspring: LinearMap<(String, String), Vec<String>> = LinearMap::new();
        for (i, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 6 {
                return Err(errors::Error::InvalidPedLine {
                    path: path.to_owned(),
                    line: i + 1,
                }
                .into());
            }
            let (individual, father, mother) = (fields[1], fields[2], fields[3]);
            if father == "0" || mother == "0" {
                // founder
                continue;
            }
            if !samples.iter().any(|s| s == individual) {
                continue;
            }
            offspring
                .entry((father.to_owned(), mother.to_owned()))
                .or_insert(Vec::new())
                .push(individual.to_owned());
        }

        let mut best: Option<(&(String, String), &Vec<String>)> = None;
        for (parents, children) in offspring.iter() {
            if best.map_or(true, |(_, best_children)| children.len() > best_children.len()) {
                best = Some((parents, children));
            }
        }
        let ((father, mother), children) = match best {
            Some(family) => family,
            None => {
                warn!(
                    "No family with children among the analysed samples found in PED file {}, \
                     treating all samples as unrelated.",
                    path.display()
                );
                return Ok(None);
            }
        };

        for parent in &[father, mother] {
            if !samples.contains(*parent) {
                warn!(
                    "Parent {} of the selected family is not among the analysed samples.",
                    parent
                );
            }
        }
        info!(
            "Using family with father {}, mother {} and {} children.",
            father,
            mother,
            children.len()
        );

        Ok(Some(Family {
            father: father.clone(),
            mother: mother.clone(),
            children: children.clone(),
        }))
    }

    pub fn role(&self, sample: &str) -> PedigreeRole {
        if sample == self.father {
            PedigreeRole::Father
        } else if sample == self.mother {
            PedigreeRole::Mother
        } else if self.children.iter().any(|c| c == sample) {
            PedigreeRole::Child
        } else {
            PedigreeRole::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn ped(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    fn samples(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_largest_family() {
        let file = ped(
            "f1 dad1 0 0 1 0\n\
             f1 mom1 0 0 2 0\n\
             f1 kid1 dad1 mom1 1 0\n\
             f2 kid2 dad2 mom2 1 0\n\
             f2 kid3 dad2 mom2 2 0\n\
             f2 kid4 dad2 mom2 2 0\n",
        );
        let all = samples(&["dad1", "mom1", "kid1", "dad2", "mom2", "kid2", "kid3", "kid4"]);
        let family = Family::from_ped(file.path(), &all).unwrap().unwrap();
        assert_eq!(family.father(), "dad2");
        assert_eq!(family.children().len(), 3);
        assert_eq!(family.role("mom2"), PedigreeRole::Mother);
        assert_eq!(family.role("kid3"), PedigreeRole::Child);
        assert_eq!(family.role("kid1"), PedigreeRole::None);

        // children outside the analysed samples do not count, ties keep file order
        let subset = samples(&["dad1", "mom1", "kid1", "dad2", "mom2", "kid2"]);
        let family = Family::from_ped(file.path(), &subset).unwrap().unwrap();
        assert_eq!(family.father(), "dad1");
        assert_eq!(family.children(), &vec!["kid1".to_owned()]);
    }

    #[test]
    fn test_invalid_ped() {
        let file = ped("f1 kid1 dad1 mom1 1\n");
        let err = Family::from_ped(file.path(), &samples(&["kid1"])).unwrap_err();
        assert_eq!(
            err.downcast_ref::<errors::Error>(),
            Some(&errors::Error::InvalidPedLine {
                path: file.path().to_owned(),
                line: 1
            })
        );
    }

    #[test]
    fn test_no_family() {
        // founders only
        let file = ped("f1 dad1 0 0 1 0\nf1 mom1 0 0 2 0\n");
        assert_eq!(
            Family::from_ped(file.path(), &samples(&["dad1", "mom1"])).unwrap(),
            None
        );

        // children outside the analysed samples
        let file = ped("f1 kid1 dad1 mom1 1 0\n");
        assert_eq!(
            Family::from_ped(file.path(), &samples(&["dad1", "mom1"])).unwrap(),
            None
        );
    }
}

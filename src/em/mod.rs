// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! EM drivers: seeding, iteration until convergence and likelihood ratios.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use derive_new::new;

use crate::constants::{DEFAULT_DISP_INTERCEPT, DEFAULT_DISP_SLOPE, PEDIGREE_DIGEST_FAILURE};
use crate::model::params::{DropoutTolerance, History, PedigreeTolerance, Snapshot};
use crate::model::solver::SolverError;

pub mod marker;
pub mod pedigree;

pub use marker::Marker;
pub use pedigree::PedigreeMarker;

/// Settings of the EM iterations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmConfig {
    pub marker: DropoutTolerance,
    pub pedigree: PedigreeTolerance,
    /// Maximum number of solver calls per track. Unbounded if not set.
    pub max_iterations: Option<usize>,
    pub pedigree_digest_failure: f64,
}

impl Default for EmConfig {
    fn default() -> Self {
        EmConfig {
            marker: DropoutTolerance::default(),
            pedigree: PedigreeTolerance::default(),
            max_iterations: None,
            pedigree_digest_failure: PEDIGREE_DIGEST_FAILURE,
        }
    }
}

impl EmConfig {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = File::open(path.as_ref()).with_context(|| {
            format!("error opening EM config {}", path.as_ref().display())
        })?;
        Ok(serde_json::from_reader(reader).context("invalid EM config")?)
    }
}

/// Linear model of the coverage dispersion: `slope * lambda + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, new)]
pub struct Dispersion {
    slope: f64,
    intercept: f64,
}

impl Default for Dispersion {
    fn default() -> Self {
        Dispersion::new(DEFAULT_DISP_SLOPE, DEFAULT_DISP_INTERCEPT)
    }
}

impl Dispersion {
    pub fn slope(&self) -> f64 {
        self.slope
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn at(&self, lambda: f64) -> f64 {
        self.slope * lambda + self.intercept
    }
}

/// Coverage seed shared by both drivers: mean depth over covered samples.
/// `None` if there is no coverage at all.
pub(crate) fn seed_coverage(depths: impl Iterator<Item = u32>) -> Option<(f64, usize, usize)> {
    let mut total = 0u64;
    let mut n = 0;
    let mut missing = 0;
    for depth in depths {
        total += depth as u64;
        n += 1;
        if depth == 0 {
            missing += 1;
        }
    }
    if total == 0 {
        None
    } else {
        Some((total as f64 / (n - missing) as f64, n, missing))
    }
}

/// Iterate one track until it converges, fails or hits the iteration cap.
/// Solver errors and invalid snapshots freeze the last snapshot.
pub(crate) fn run_track<S, F>(
    history: &mut History<S>,
    tolerance: &S::Tolerance,
    max_iterations: Option<usize>,
    mut step: F,
) where
    S: Snapshot,
    F: FnMut(&S) -> Result<S, SolverError>,
{
    let mut iterations = 0;
    while !history.is_converged(tolerance) {
        if max_iterations.map_or(false, |max| iterations >= max) {
            debug!("stopping EM after {} iterations", iterations);
            break;
        }
        let last = history.last();
        let next = match step(last) {
            Ok(snapshot) if snapshot.is_valid() => snapshot,
            Ok(_) => {
                debug!("solver returned invalid parameters, freezing track");
                last.freeze()
            }
            Err(e) => {
                debug!("solver failed ({}), freezing track", e);
                last.freeze()
            }
        };
        history.push(next);
        iterations += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PedigreeParams;

    #[test]
    fn test_seed_coverage() {
        assert_eq!(seed_coverage(vec![0, 0, 0].into_iter()), None);
        let (lambda, n, missing) = seed_coverage(vec![4, 0, 8].into_iter()).unwrap();
        assert_relative_eq!(lambda, 6.0);
        assert_eq!(n, 3);
        assert_eq!(missing, 1);
    }

    #[test]
    fn test_config_defaults() {
        let config: EmConfig = serde_json::from_str(r#"{"max_iterations": 50}"#).unwrap();
        assert_eq!(config.max_iterations, Some(50));
        assert_eq!(config.marker, DropoutTolerance::default());
        assert_relative_eq!(config.pedigree.lambda, 0.25);

        let config: EmConfig = serde_json::from_str(r#"{"marker": {"lambda": 0.5}}"#).unwrap();
        assert_relative_eq!(config.marker.lambda, 0.5);
        assert_relative_eq!(config.marker.phi, 0.001);
    }

    #[test]
    fn test_dispersion() {
        assert_relative_eq!(Dispersion::default().at(100.0), 2.5);
        assert_relative_eq!(Dispersion::new(0.1, 1.0).at(10.0), 2.0);
    }

    #[test]
    fn test_run_track_freezes_on_error() {
        let mut history = History::new(PedigreeParams::seed(Some(5.0)));
        let mut calls = 0;
        run_track(&mut history, &PedigreeTolerance::default(), None, |_| {
            calls += 1;
            Err(SolverError::DegenerateCoverage)
        });
        assert_eq!(calls, 1);
        assert_eq!(history.len(), 2);
        assert!(history.last().failed);
        assert_eq!(history.last().lambda, Some(5.0));
    }

    #[test]
    fn test_run_track_iteration_cap() {
        let mut history = History::new(PedigreeParams::seed(Some(5.0)));
        run_track(&mut history, &PedigreeTolerance::default(), Some(3), |last| {
            Ok(PedigreeParams {
                lambda: last.lambda.map(|l| l + 1.0),
                loglik: Some(-1.0),
                failed: false,
                expected_counts: None,
            })
        });
        assert_eq!(history.len(), 4);
        assert!(!history.last().failed);
    }
}

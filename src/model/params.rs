// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Parameter snapshots of the EM tracks and their append-only history.

use crate::constants::{
    DELTA_TOLERANCE, LAMBDA_TOLERANCE, PEDIGREE_LAMBDA_TOLERANCE, PHI_TOLERANCE,
};
use crate::model::AlleleFreqs;

/// Parameter state of one EM iteration.
pub trait Snapshot: Clone {
    type Tolerance;

    fn failed(&self) -> bool;

    /// Copy of this snapshot with the failure flag set.
    fn freeze(&self) -> Self;

    /// Whether all parameters are usable for a further iteration.
    fn is_valid(&self) -> bool;

    /// Whether the parameters changed less than the tolerance since `previous`.
    fn within_tolerance(&self, previous: &Self, tolerance: &Self::Tolerance) -> bool;
}

/// Ordered log of parameter snapshots, one per EM iteration. Snapshots are never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct History<S> {
    snapshots: Vec<S>,
}

impl<S: Snapshot> History<S> {
    pub fn new(seed: S) -> Self {
        History {
            snapshots: vec![seed],
        }
    }

    pub fn push(&mut self, snapshot: S) {
        self.snapshots.push(snapshot);
    }

    pub fn last(&self) -> &S {
        // a history is never empty, it starts with the seed
        &self.snapshots[self.snapshots.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, S> {
        self.snapshots.iter()
    }

    /// A track is converged if it failed, or if the last two snapshots agree within the tolerance.
    /// A single snapshot is never converged.
    pub fn is_converged(&self, tolerance: &S::Tolerance) -> bool {
        let last = self.last();
        if last.failed() {
            return true;
        }
        match self.snapshots.len() {
            0 | 1 => false,
            n => last.within_tolerance(&self.snapshots[n - 2], tolerance),
        }
    }
}

fn abs_diff(a: Option<f64>, b: Option<f64>) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) => (a - b).abs(),
        _ => f64::INFINITY,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DropoutTolerance {
    pub phi: f64,
    pub lambda: f64,
    pub delta: f64,
}

impl Default for DropoutTolerance {
    fn default() -> Self {
        DropoutTolerance {
            phi: PHI_TOLERANCE,
            lambda: LAMBDA_TOLERANCE,
            delta: DELTA_TOLERANCE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PedigreeTolerance {
    pub lambda: f64,
}

impl Default for PedigreeTolerance {
    fn default() -> Self {
        PedigreeTolerance {
            lambda: PEDIGREE_LAMBDA_TOLERANCE,
        }
    }
}

/// Parameters of one hypothesis in unrelated sample mode.
#[derive(Debug, Clone, PartialEq)]
pub struct DropoutParams {
    /// Allele frequencies (phi).
    pub phi: AlleleFreqs,
    /// Normalized mean coverage (lambda).
    pub lambda: Option<f64>,
    /// Digest failure rate (delta).
    pub delta: Option<f64>,
    pub loglik: Option<f64>,
    pub failed: bool,
    /// Posterior expected (ref, alt, dropout) allele counts per sample.
    pub expected_counts: Option<Vec<[f64; 3]>>,
}

impl DropoutParams {
    pub fn seed(phi: AlleleFreqs, lambda: Option<f64>, delta: Option<f64>) -> Self {
        DropoutParams {
            phi,
            failed: lambda.is_none(),
            lambda,
            delta,
            loglik: None,
            expected_counts: None,
        }
    }
}

impl Snapshot for DropoutParams {
    type Tolerance = DropoutTolerance;

    fn failed(&self) -> bool {
        self.failed
    }

    fn freeze(&self) -> Self {
        DropoutParams {
            failed: true,
            ..self.clone()
        }
    }

    fn is_valid(&self) -> bool {
        let lambda_valid = self.lambda.map_or(false, |l| l.is_finite() && l > 0.0);
        let delta_valid = self.delta.map_or(false, |d| (0.0..=1.0).contains(&d));
        let phi_valid = self.phi.0.iter().all(|f| (0.0..=1.0).contains(f));
        let loglik_valid = self.loglik.map_or(false, |ll| !ll.is_nan());
        lambda_valid && delta_valid && phi_valid && loglik_valid
    }

    fn within_tolerance(&self, previous: &Self, tolerance: &DropoutTolerance) -> bool {
        let phi_diff = (self.phi.alt() - previous.phi.alt())
            .abs()
            .max((self.phi.dropout() - previous.phi.dropout()).abs());
        phi_diff <= tolerance.phi
            && abs_diff(self.lambda, previous.lambda) <= tolerance.lambda
            && abs_diff(self.delta, previous.delta) <= tolerance.delta
    }
}

/// Parameters of one parental genotype track in pedigree mode.
#[derive(Debug, Clone, PartialEq)]
pub struct PedigreeParams {
    pub lambda: Option<f64>,
    pub loglik: Option<f64>,
    pub failed: bool,
    /// Posterior expected allele counts per sample, `None` for samples outside the family.
    pub expected_counts: Option<Vec<Option<[f64; 3]>>>,
}

impl PedigreeParams {
    pub fn seed(lambda: Option<f64>) -> Self {
        PedigreeParams {
            failed: lambda.is_none(),
            lambda,
            loglik: None,
            expected_counts: None,
        }
    }
}

impl Snapshot for PedigreeParams {
    type Tolerance = PedigreeTolerance;

    fn failed(&self) -> bool {
        self.failed
    }

    fn freeze(&self) -> Self {
        PedigreeParams {
            failed: true,
            ..self.clone()
        }
    }

    fn is_valid(&self) -> bool {
        // -inf is a legal likelihood here, it is handled by the driver
        self.lambda.map_or(false, |l| l.is_finite() && l > 0.0)
            && self.loglik.map_or(false, |ll| !ll.is_nan())
    }

    fn within_tolerance(&self, previous: &Self, tolerance: &PedigreeTolerance) -> bool {
        abs_diff(self.lambda, previous.lambda) <= tolerance.lambda
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(phi: [f64; 3], lambda: f64, delta: f64) -> DropoutParams {
        DropoutParams {
            phi: AlleleFreqs(phi),
            lambda: Some(lambda),
            delta: Some(delta),
            loglik: Some(-10.0),
            failed: false,
            expected_counts: None,
        }
    }

    #[test]
    fn test_single_snapshot_never_converged() {
        let history = History::new(params([0.99, 0.0, 0.01], 5.0, 0.01));
        let loose = DropoutTolerance {
            phi: f64::INFINITY,
            lambda: f64::INFINITY,
            delta: f64::INFINITY,
        };
        assert!(!history.is_converged(&loose));
        assert!(!history.is_converged(&DropoutTolerance::default()));

        let history = History::new(PedigreeParams::seed(Some(4.0)));
        assert!(!history.is_converged(&PedigreeTolerance { lambda: 1e9 }));
    }

    #[test]
    fn test_failed_seed_is_converged() {
        let history = History::new(DropoutParams::seed(AlleleFreqs([1.0, 0.0, 0.0]), None, None));
        assert!(history.is_converged(&DropoutTolerance::default()));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_convergence() {
        let tolerance = DropoutTolerance::default();
        let mut history = History::new(params([0.9, 0.09, 0.01], 5.0, 0.01));
        history.push(params([0.9, 0.0905, 0.0095], 5.05, 0.012));
        assert!(history.is_converged(&tolerance));

        // only the last two snapshots count
        history.push(params([0.9, 0.0905, 0.0095], 5.3, 0.012));
        assert!(!history.is_converged(&tolerance));

        let mut history = History::new(params([0.9, 0.09, 0.01], 5.0, 0.01));
        history.push(params([0.9, 0.088, 0.012], 5.0, 0.01));
        assert!(!history.is_converged(&tolerance));

        let mut history = History::new(params([0.9, 0.09, 0.01], 5.0, 0.01));
        history.push(params([0.9, 0.09, 0.01], 5.0, 0.02));
        assert!(!history.is_converged(&tolerance));
    }

    #[test]
    fn test_pedigree_convergence() {
        let tolerance = PedigreeTolerance::default();
        let mut history = History::new(PedigreeParams::seed(Some(4.0)));
        history.push(PedigreeParams::seed(Some(4.2)));
        assert!(history.is_converged(&tolerance));
        history.push(PedigreeParams::seed(Some(4.5)));
        assert!(!history.is_converged(&tolerance));
    }

    #[test]
    fn test_freeze() {
        let p = params([0.9, 0.09, 0.01], 5.0, 0.01);
        let frozen = p.freeze();
        assert!(frozen.failed);
        assert_eq!(frozen.phi, p.phi);
        assert_eq!(frozen.lambda, p.lambda);
        assert_eq!(frozen.loglik, p.loglik);
    }
}

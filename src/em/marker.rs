// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Dropout test for unrelated samples: an alternative hypothesis (H1) with a free
//! dropout allele frequency against a null hypothesis (H0) without dropout allele.

use crate::constants::{DEFAULT_ALT_FREQ, MAX_ALT_FREQ, MIN_DIGEST_FAILURE, SEED_DROPOUT_FREQ};
use crate::em::{run_track, seed_coverage, Dispersion, EmConfig};
use crate::model::solver::DropoutSolver;
use crate::model::{AlleleFreqs, DropoutParams, History, SampleCall};

#[derive(Debug, Clone, Getters)]
#[getset(get = "pub")]
pub struct Marker {
    calls: Vec<SampleCall>,
    /// Coverage dispersion, seeded once from the initial coverage estimate.
    dispersion: f64,
    h1: History<DropoutParams>,
    h0: History<DropoutParams>,
}

impl Marker {
    /// Seed both hypotheses. `alt_freq` is an external ALT allele frequency estimate
    /// (e.g. the AF field of the record).
    pub fn new(calls: Vec<SampleCall>, alt_freq: Option<f64>, dispersion: &Dispersion) -> Self {
        let (lambda, delta, disp) = match seed_coverage(calls.iter().map(|call| *call.depth())) {
            Some((lambda, n, missing)) => (
                Some(lambda),
                Some((missing as f64 / n as f64).max(MIN_DIGEST_FAILURE)),
                dispersion.at(lambda),
            ),
            None => (None, None, dispersion.at(0.0)),
        };

        let depth_only = calls
            .iter()
            .all(|call| call.genotype_likelihoods().is_none());
        let d = SEED_DROPOUT_FREQ;
        let (phi1, phi0) = if depth_only {
            ([1.0 - d, 0.0, d], [1.0, 0.0, 0.0])
        } else {
            let af = alt_freq
                .filter(|af| af.is_finite() && *af >= 0.0)
                .unwrap_or(DEFAULT_ALT_FREQ)
                .min(MAX_ALT_FREQ);
            (
                [(1.0 - af) * (1.0 - d), af * (1.0 - d), d],
                [1.0 - af, af, 0.0],
            )
        };

        Marker {
            calls,
            dispersion: disp,
            h1: History::new(DropoutParams::seed(AlleleFreqs(phi1), lambda, delta)),
            h0: History::new(DropoutParams::seed(AlleleFreqs(phi0), lambda, delta)),
        }
    }

    /// Run both hypotheses to convergence.
    pub fn fit<S: DropoutSolver>(&mut self, solver: &S, config: &EmConfig) {
        let calls = &self.calls;
        let dispersion = self.dispersion;
        let step = |params: &DropoutParams| solver.update(params, calls, dispersion);
        run_track(&mut self.h1, &config.marker, config.max_iterations, step);
        run_track(&mut self.h0, &config.marker, config.max_iterations, step);
    }

    /// `-2 (LL_H0 - LL_H1)`, `None` if either log-likelihood is undefined.
    pub fn likelihood_ratio(&self) -> Option<f64> {
        let ll1 = self.h1.last().loglik?;
        let ll0 = self.h0.last().loglik?;
        let lr = -2.0 * (ll0 - ll1);
        if lr.is_nan() {
            None
        } else {
            Some(lr)
        }
    }
}

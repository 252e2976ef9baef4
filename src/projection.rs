// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Summary of a fitted marker as exported to the INFO and FORMAT fields of the output.
//! Values that are undefined upstream are left out. Floats are rounded to three decimals.

use linear_map::LinearMap;

use crate::em::{Marker, PedigreeMarker};
use crate::model::SampleCall;
use crate::utils;

#[derive(Debug, Clone, PartialEq)]
pub enum InfoValue {
    Float(f64),
    Integer(i32),
    Flag,
    Str(String),
}

/// Per-sample FORMAT values.
#[derive(Debug, Clone, PartialEq, Getters)]
#[getset(get = "pub")]
pub struct SampleFormat {
    sample: String,
    /// Expected number of dropout alleles (DC).
    dropout_count: Option<i32>,
    /// Median insert size (INS).
    insert_size: Option<i32>,
    /// Normalization factor (NF).
    norm_factor: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MarkerInfo {
    info: LinearMap<&'static str, InfoValue>,
    samples: Vec<SampleFormat>,
}

impl MarkerInfo {
    pub fn from_marker(marker: &Marker) -> Self {
        let mut info = MarkerInfo::default();
        let h1 = marker.h1().last();
        let h0 = marker.h0().last();

        info.float("DLR", marker.likelihood_ratio());
        // allele frequencies are reported for failed tracks as well
        info.float("DFreq", Some(h1.phi.dropout()));
        info.float("AFH1", Some(h1.phi.alt()));
        info.float("AFH0", Some(h0.phi.alt()));
        info.float("LambdaH1", h1.lambda);
        info.float("LambdaH0", h0.lambda);
        info.float("DigestH1", h1.delta);
        info.float("DigestH0", h0.delta);
        info.integer("IterationH1", marker.h1().len());
        info.integer("IterationH0", marker.h0().len());
        info.flag("EMFailH1", h1.failed);
        info.flag("EMFailH0", h0.failed);
        info.read_tags(marker.calls());

        let dropout_counts: Vec<Option<f64>> = match h1.expected_counts {
            Some(ref counts) => counts.iter().map(|c| Some(c[2])).collect(),
            None => vec![None; marker.calls().len()],
        };
        info.sample_formats(marker.calls(), &dropout_counts);
        info
    }

    pub fn from_pedigree(marker: &PedigreeMarker) -> Self {
        let mut info = MarkerInfo::default();
        info.float("DLR", marker.likelihood_ratio());

        let best_h1 = marker.best_h1();
        if let Some((parents, history)) = best_h1 {
            info.string("ParentsH1", parents.formatted());
            info.float("LambdaH1", history.last().lambda);
            info.integer("IterationH1", history.len());
            info.flag("EMFailH1", history.last().failed);
        }
        if let Some((parents, history)) = marker.best_h0() {
            info.string("ParentsH0", parents.formatted());
            info.float("LambdaH0", history.last().lambda);
            info.integer("IterationH0", history.len());
            info.flag("EMFailH0", history.last().failed);
        }
        if best_h1.is_none() && marker.best_h0().is_none() {
            // all tracks failed: report the shared seed
            if let Some((_, history)) = marker.genotype_tracks().next() {
                info.integer("IterationH1", history.len());
                info.integer("IterationH0", history.len());
                info.flag("EMFailH1", history.last().failed);
                info.flag("EMFailH0", history.last().failed);
            }
        }
        info.read_tags(marker.calls());

        let dropout_counts: Vec<Option<f64>> = match best_h1
            .and_then(|(_, history)| history.last().expected_counts.as_ref())
        {
            Some(counts) => counts.iter().map(|c| c.map(|c| c[2])).collect(),
            None => vec![None; marker.calls().len()],
        };
        info.sample_formats(marker.calls(), &dropout_counts);
        info
    }

    pub fn get(&self, key: &str) -> Option<&InfoValue> {
        self.info.get(key)
    }

    /// INFO entries in output order.
    pub fn info(&self) -> impl Iterator<Item = (&&'static str, &InfoValue)> {
        self.info.iter()
    }

    pub fn samples(&self) -> &[SampleFormat] {
        &self.samples
    }

    pub fn sample(&self, name: &str) -> Option<&SampleFormat> {
        self.samples.iter().find(|s| s.sample == name)
    }

    fn float(&mut self, key: &'static str, value: Option<f64>) {
        if let Some(value) = value.filter(|v| !v.is_nan()) {
            let value = if value.is_finite() {
                utils::round_output(value)
            } else {
                value
            };
            self.info.insert(key, InfoValue::Float(value));
        }
    }

    fn integer(&mut self, key: &'static str, value: usize) {
        self.info.insert(key, InfoValue::Integer(value as i32));
    }

    fn flag(&mut self, key: &'static str, set: bool) {
        if set {
            self.info.insert(key, InfoValue::Flag);
        }
    }

    fn string(&mut self, key: &'static str, value: String) {
        self.info.insert(key, InfoValue::Str(value));
    }

    /// Insert size statistics and restriction site annotations over all reads.
    fn read_tags(&mut self, calls: &[SampleCall]) {
        let inserts: Vec<f64> = calls
            .iter()
            .flat_map(|call| call.insert_sizes().iter().map(|ins| *ins as f64))
            .collect();
        self.float("InsMed", utils::median(&inserts));
        self.float("InsMAD", utils::median_abs_deviation(&inserts));

        let sites = |select: fn(&SampleCall) -> &Vec<String>| {
            utils::most_common(
                calls
                    .iter()
                    .flat_map(|call| select(call).iter().map(|s| s.as_str())),
            )
            .map(|(site, count)| format!("{},{}", site.replace(';', ","), count))
        };
        if let Some(value) = sites(SampleCall::self_sites) {
            self.string("SelfRS", value);
        }
        if let Some(value) = sites(SampleCall::mate_sites) {
            self.string("MateRS", value);
        }
    }

    fn sample_formats(&mut self, calls: &[SampleCall], dropout_counts: &[Option<f64>]) {
        self.samples = calls
            .iter()
            .zip(dropout_counts.iter())
            .map(|(call, dc)| SampleFormat {
                sample: call.sample().to_owned(),
                dropout_count: dc.filter(|dc| dc.is_finite()).map(|dc| dc.round() as i32),
                insert_size: call.median_insert_size().map(|ins| ins.round() as i32),
                norm_factor: Some(utils::round_output(*call.norm_factor())),
            })
            .collect();
    }
}

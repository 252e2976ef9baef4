// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Readers and writers for the input and output formats.

pub mod normfactors;
pub mod ped;
pub mod pileup;
pub mod samples;
pub mod vcf;

use std::collections::HashSet;

/// Whether two sample collections contain the same names.
pub(crate) fn same_samples<'a, A, B>(a: A, b: B) -> bool
where
    A: IntoIterator<Item = &'a String>,
    B: IntoIterator<Item = &'a String>,
{
    a.into_iter().collect::<HashSet<_>>() == b.into_iter().collect::<HashSet<_>>()
}

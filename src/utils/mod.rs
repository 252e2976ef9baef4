// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use counter::Counter;
use statrs::statistics::{Data, Median};

/// Number of decimals kept for floating point values in the output.
pub const OUTPUT_DECIMALS: i32 = 3;

/// Median of the given values, `None` if there are none.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(Data::new(values.to_vec()).median())
    }
}

/// Median absolute deviation from the median.
pub fn median_abs_deviation(values: &[f64]) -> Option<f64> {
    let med = median(values)?;
    median(&values.iter().map(|v| (v - med).abs()).collect::<Vec<_>>())
}

/// Round to the precision used in the output.
pub fn round_output(value: f64) -> f64 {
    let factor = 10f64.powi(OUTPUT_DECIMALS);
    (value * factor).round() / factor
}

/// Most frequent entry and its count. Ties are resolved by the entry's sort order.
pub fn most_common<'a, I>(entries: I) -> Option<(&'a str, usize)>
where
    I: IntoIterator<Item = &'a str>,
{
    let counts: Counter<&str> = entries.into_iter().collect();
    counts.most_common_ordered().into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median() {
        assert_eq!(median(&[]), None);
        assert_relative_eq!(median(&[3.0, 1.0, 2.0]).unwrap(), 2.0);
        assert_relative_eq!(median(&[4.0, 1.0, 2.0, 3.0]).unwrap(), 2.5);
    }

    #[test]
    fn test_median_abs_deviation() {
        assert_relative_eq!(
            median_abs_deviation(&[1.0, 1.0, 2.0, 2.0, 4.0, 6.0, 9.0]).unwrap(),
            1.0
        );
    }

    #[test]
    fn test_round_output() {
        assert_relative_eq!(round_output(1.23456), 1.235);
        assert_relative_eq!(round_output(-0.0004), 0.0);
    }

    #[test]
    fn test_most_common() {
        let entries = vec!["EcoT22I;MseI", "ApeKI", "EcoT22I;MseI"];
        assert_eq!(
            most_common(entries.iter().cloned()),
            Some(("EcoT22I;MseI", 2))
        );
        assert_eq!(most_common(Vec::<&str>::new()), None);
    }
}

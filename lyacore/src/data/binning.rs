use serde::{Deserialize, Serialize};

use crate::error::LyaError;

/// Wavelength-grid classification for one run.
///
/// Computed once from the first spectrum of a batch and threaded by value
/// into every stage; every subsequent spectrum must match it exactly.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WavelengthBinning {
    /// True for linear-wavelength binning (widths in Angstrom), false for
    /// log10-wavelength binning (widths in log10 Angstrom).
    pub linear: bool,
    /// Size of one wavelength bin in the matching unit.
    pub bin_width: f64,
}

impl WavelengthBinning {
    /// Checks that another classification matches this one exactly.
    ///
    /// Mixing binning conventions within one run is not supported, so any
    /// mismatch is a fatal error.
    pub fn validate_consistent(&self, other: &WavelengthBinning) -> Result<(), LyaError> {
        if self.linear != other.linear || self.bin_width != other.bin_width {
            return Err(LyaError::BinningClassification(
                "inhomogeneous wavelength binning between input files".to_string(),
            ));
        }
        Ok(())
    }
}

/// Linear-interpolation percentile of an already sorted slice.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let rank = q / 100.0 * (n - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

fn sorted_diffs<F: Fn(f64) -> f64>(values: &[f64], transform: F) -> Vec<f64> {
    let mut diffs: Vec<f64> = values
        .windows(2)
        .map(|pair| transform(pair[1]) - transform(pair[0]))
        .collect();
    diffs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    diffs
}

/// Decides whether a log10-wavelength grid is linearly or logarithmically
/// spaced, and measures the bin width. Stable against masked-out pixels.
///
/// The 5th and 25th percentiles of the elementwise differences are compared
/// in both linear and log space: a tight interquartile gap identifies the
/// spacing that is actually uniform. A 5th-percentile log difference of
/// 0.01 or more means the input was almost certainly plain wavelength
/// passed as log-wavelength, which is a fatal error.
///
/// # Arguments
/// * `log_lambda` - monotonically increasing log10 wavelength grid (length >= 2)
///
/// # Returns
/// The binning type plus the median bin width in the matching unit.
pub fn classify_binning(log_lambda: &[f64]) -> Result<WavelengthBinning, LyaError> {
    if log_lambda.len() < 2 {
        return Err(LyaError::BinningClassification(
            "need at least two pixels to classify the wavelength binning".to_string(),
        ));
    }

    let diff_lambda = sorted_diffs(log_lambda, |x| 10f64.powf(x));
    let diff_log_lambda = sorted_diffs(log_lambda, |x| x);

    let q5_lambda = percentile(&diff_lambda, 5.0);
    let q25_lambda = percentile(&diff_lambda, 25.0);
    let q5_log_lambda = percentile(&diff_log_lambda, 5.0);
    let q25_log_lambda = percentile(&diff_log_lambda, 25.0);

    if (q25_lambda - q5_lambda) < 1e-6 {
        Ok(WavelengthBinning {
            linear: true,
            bin_width: percentile(&diff_lambda, 50.0),
        })
    } else if (q25_log_lambda - q5_log_lambda) < 1e-6 && q5_log_lambda < 0.01 {
        Ok(WavelengthBinning {
            linear: false,
            bin_width: percentile(&diff_log_lambda, 50.0),
        })
    } else if q5_log_lambda >= 0.01 {
        Err(LyaError::BinningClassification(
            "could not figure out if linear or log wavelength binning was used, \
             probably submitted lambda as log_lambda"
                .to_string(),
        ))
    } else {
        Err(LyaError::BinningClassification(
            "could not figure out if linear or log wavelength binning was used".to_string(),
        ))
    }
}

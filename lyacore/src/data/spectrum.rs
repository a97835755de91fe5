use serde::{Deserialize, Serialize};

/// One quasar sightline: the Lyman-alpha forest of a single spectrum.
///
/// Per-pixel arrays all share the same length; `resolution_matrix`, when
/// present, holds one banded convolution kernel per pixel. The coordinate
/// is always stored as log10 wavelength; whether the grid is uniform in
/// wavelength or in log-wavelength is decided by the binning classifier.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Forest {
    /// Line-of-sight identifier (survey object id).
    pub los_id: i64,
    /// Right ascension [degrees].
    pub ra: f64,
    /// Declination [degrees].
    pub dec: f64,
    /// Quasar redshift.
    pub z_qso: f64,
    /// Mean signal-to-noise ratio per pixel.
    pub mean_snr: f64,
    /// Mean resolution [km/s].
    pub mean_reso: f64,
    /// Spectrum's plate id.
    pub plate: i64,
    /// Modified Julian Date the spectrum was taken.
    pub mjd: i64,
    /// Spectrum's fiber number.
    pub fiberid: i64,
    /// Log10 wavelength grid [log10 Angstrom], monotonically increasing.
    pub log_lambda: Vec<f64>,
    /// Flux fluctuation relative to the mean continuum.
    pub delta: Vec<f64>,
    /// Inverse variance per pixel; zero marks a masked pixel.
    pub ivar: Vec<f64>,
    /// Alternating-exposure noise difference per pixel.
    pub exposures_diff: Vec<f64>,
    /// Per-pixel instrumental convolution kernel (banded coefficients).
    #[serde(default)]
    pub resolution_matrix: Option<Vec<Vec<f64>>>,
    /// Running multiplicative transmission correction accumulated by masks.
    #[serde(default)]
    pub transmission_correction: Option<Vec<f64>>,
}

impl Forest {
    pub fn num_pixels(&self) -> usize {
        self.log_lambda.len()
    }

    /// Observed wavelength grid in Angstrom.
    pub fn wavelength(&self) -> Vec<f64> {
        self.log_lambda.iter().map(|&x| 10f64.powf(x)).collect()
    }

    fn transmission_correction_mut(&mut self) -> &mut Vec<f64> {
        if self.transmission_correction.is_none() {
            self.transmission_correction = Some(vec![1.0; self.log_lambda.len()]);
        }
        self.transmission_correction.as_mut().unwrap()
    }

    /// Multiplies the running transmission correction by a per-pixel factor.
    pub fn accumulate_transmission(&mut self, transmission: &[f64]) {
        let correction = self.transmission_correction_mut();
        for (value, factor) in correction.iter_mut().zip(transmission.iter()) {
            *value *= factor;
        }
    }

    /// Drops the pixels where `keep` is false from every per-pixel field,
    /// resolution-matrix kernels included. Array lengths shrink.
    pub fn remove_pixels(&mut self, keep: &[bool]) {
        fn filter(values: &mut Vec<f64>, keep: &[bool]) {
            let mut index = 0;
            values.retain(|_| {
                let kept = keep[index];
                index += 1;
                kept
            });
        }

        filter(&mut self.log_lambda, keep);
        filter(&mut self.delta, keep);
        filter(&mut self.ivar, keep);
        filter(&mut self.exposures_diff, keep);
        if let Some(correction) = self.transmission_correction.as_mut() {
            filter(correction, keep);
        }
        if let Some(matrix) = self.resolution_matrix.as_mut() {
            let mut index = 0;
            matrix.retain(|_| {
                let kept = keep[index];
                index += 1;
                kept
            });
        }
    }

    /// Zeroes the inverse variance where `keep` is false. Array lengths are
    /// unchanged; downstream stages treat zero-ivar pixels as masked.
    pub fn zero_ivar(&mut self, keep: &[bool]) {
        for (value, &kept) in self.ivar.iter_mut().zip(keep.iter()) {
            if !kept {
                *value = 0.0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub fn toy_forest(n: usize) -> Forest {
        Forest {
            los_id: 42,
            ra: 150.1,
            dec: 2.2,
            z_qso: 2.5,
            mean_snr: 5.0,
            mean_reso: 70.0,
            plate: 1234,
            mjd: 55555,
            fiberid: 7,
            log_lambda: (0..n).map(|i| 3.56 + 1e-4 * i as f64).collect(),
            delta: vec![0.1; n],
            ivar: vec![2.0; n],
            exposures_diff: vec![0.01; n],
            resolution_matrix: Some(vec![vec![0.1, 0.8, 0.1]; n]),
            transmission_correction: None,
        }
    }

    #[test]
    fn test_remove_pixels_shrinks_all_fields() {
        let mut forest = toy_forest(5);
        let keep = vec![true, false, true, false, true];
        forest.remove_pixels(&keep);
        assert_eq!(forest.log_lambda.len(), 3);
        assert_eq!(forest.delta.len(), 3);
        assert_eq!(forest.ivar.len(), 3);
        assert_eq!(forest.exposures_diff.len(), 3);
        assert_eq!(forest.resolution_matrix.as_ref().unwrap().len(), 3);
    }

    #[test]
    fn test_zero_ivar_keeps_length() {
        let mut forest = toy_forest(4);
        let keep = vec![true, false, true, true];
        forest.zero_ivar(&keep);
        assert_eq!(forest.ivar, vec![2.0, 0.0, 2.0, 2.0]);
        assert_eq!(forest.num_pixels(), 4);
    }

    #[test]
    fn test_accumulate_transmission() {
        let mut forest = toy_forest(3);
        forest.accumulate_transmission(&[0.5, 1.0, 0.25]);
        forest.accumulate_transmission(&[0.5, 1.0, 1.0]);
        let correction = forest.transmission_correction.as_ref().unwrap();
        assert_eq!(correction, &vec![0.25, 1.0, 0.25]);
    }
}

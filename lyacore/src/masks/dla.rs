use std::collections::HashMap;

use itertools::izip;
use serde::{Deserialize, Serialize};

use crate::constants::{LAMBDA_LYA, LAMBDA_LYB};
use crate::data::spectrum::Forest;
use crate::error::LyaError;
use crate::masks::voigt::voigt_profile;

// Physical constants for the optical-depth model (Garnett 2018), SI units.
const ELEMENTARY_CHARGE: f64 = 1.6021e-19; // C
const EPSILON_0: f64 = 8.8541e-12; // C^2.s^2.kg^-1.m^-3
const PROTON_MASS: f64 = 1.6726e-27; // kg
const ELECTRON_MASS: f64 = 9.109e-31; // kg
const SPEED_LIGHT_MS: f64 = 2.9979e8; // m.s^-1
const BOLTZMANN: f64 = 1.3806e-23; // m^2.kg.s^-2.K^-1
const GAS_TEMPERATURE: f64 = 5e4; // K

const OSCILLATOR_STRENGTH_LYA: f64 = 0.4164;
const OSCILLATOR_STRENGTH_LYB: f64 = 0.07912;
const DAMPING_LYA: f64 = 6.2648e8; // s^-1
const DAMPING_LYB: f64 = 4.1641e-1; // s^-1

/// Voigt-profile optical depth of one Lyman-series transition.
fn tau_transition(
    lambda: &[f64],
    z_abs: f64,
    log_nhi: f64,
    lambda_transition: f64,
    oscillator_strength: f64,
    damping: f64,
) -> Vec<f64> {
    let doppler_broadening = (2.0 * BOLTZMANN * GAS_TEMPERATURE / PROTON_MASS).sqrt();
    let lorentz_width =
        damping * lambda_transition / (4.0 * std::f64::consts::PI) * 1e-10;
    let nhi_m2 = 10f64.powf(log_nhi) * 1e4;
    let prefactor = nhi_m2
        * std::f64::consts::PI
        * ELEMENTARY_CHARGE.powi(2)
        * oscillator_strength
        * lambda_transition
        * 1e-10
        / (4.0 * std::f64::consts::PI * EPSILON_0 * ELECTRON_MASS * SPEED_LIGHT_MS);

    lambda
        .iter()
        .map(|&value| {
            let lambda_rest_frame = value / (1.0 + z_abs);
            let velocity = SPEED_LIGHT_MS * (lambda_rest_frame / lambda_transition - 1.0);
            prefactor
                * voigt_profile(
                    velocity,
                    doppler_broadening / std::f64::consts::SQRT_2,
                    lorentz_width,
                )
        })
        .collect()
}

/// Lyman-alpha optical depth for an absorber at `z_abs` with column
/// density `log_nhi` in log10(cm^-2), evaluated on an observed-frame
/// wavelength grid [Angstrom].
pub fn tau_lya(lambda: &[f64], z_abs: f64, log_nhi: f64) -> Vec<f64> {
    tau_transition(
        lambda,
        z_abs,
        log_nhi,
        LAMBDA_LYA,
        OSCILLATOR_STRENGTH_LYA,
        DAMPING_LYA,
    )
}

/// Lyman-beta optical depth, same conventions as [`tau_lya`].
pub fn tau_lyb(lambda: &[f64], z_abs: f64, log_nhi: f64) -> Vec<f64> {
    tau_transition(
        lambda,
        z_abs,
        log_nhi,
        LAMBDA_LYB,
        OSCILLATOR_STRENGTH_LYB,
        DAMPING_LYB,
    )
}

/// Fractional transmission of a single DLA: exp of minus the combined
/// Lyman-alpha and Lyman-beta optical depths.
pub fn dla_profile(lambda: &[f64], z_abs: f64, log_nhi: f64) -> Vec<f64> {
    izip!(
        tau_lya(lambda, z_abs, log_nhi),
        tau_lyb(lambda, z_abs, log_nhi)
    )
    .map(|(alpha, beta)| (-alpha - beta).exp())
    .collect()
}

/// One catalogued absorber.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct DlaCatalogueEntry {
    /// Line-of-sight identifier of the affected sightline.
    pub los_id: i64,
    /// Absorption redshift.
    pub z_abs: f64,
    /// Column density in log10(cm^-2).
    pub log_nhi: f64,
}

/// DLA catalogue grouped by line of sight. Built once, immutable, queried
/// read-only during masking.
#[derive(Clone, Debug, Default)]
pub struct DlaCatalogue {
    los_ids: HashMap<i64, Vec<(f64, f64)>>,
}

impl DlaCatalogue {
    pub fn from_entries(entries: impl IntoIterator<Item = DlaCatalogueEntry>) -> Self {
        let mut los_ids: HashMap<i64, Vec<(f64, f64)>> = HashMap::new();
        for entry in entries {
            los_ids
                .entry(entry.los_id)
                .or_default()
                .push((entry.z_abs, entry.log_nhi));
        }
        DlaCatalogue { los_ids }
    }

    /// `(z_abs, log_nhi)` pairs for one sightline, if any are catalogued.
    pub fn absorbers(&self, los_id: i64) -> Option<&[(f64, f64)]> {
        self.los_ids.get(&los_id).map(Vec::as_slice)
    }

    pub fn num_sightlines(&self) -> usize {
        self.los_ids.len()
    }

    pub fn num_absorbers(&self) -> usize {
        self.los_ids.values().map(Vec::len).sum()
    }
}

/// A mask that can be applied to a forest before it enters the Pk1D
/// pipeline.
pub trait Mask {
    fn apply_mask(&self, forest: &mut Forest) -> Result<(), LyaError>;
}

/// How masked pixels are taken out of a forest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaskPolicy {
    /// Drop masked pixels from every per-pixel array, shrinking them.
    RemovePixels,
    /// Keep array lengths and zero the inverse variance instead.
    ZeroIvar,
}

/// A rest-frame wavelength interval to exclude around every absorber.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RestFrameRange {
    pub wave_min: f64,
    pub wave_max: f64,
}

/// Masks pixels contaminated by damped Lyman-alpha absorbers.
pub struct DlaMask {
    catalogue: DlaCatalogue,
    /// Pixels with cumulative transmission at or below this are masked.
    transmission_limit: f64,
    policy: MaskPolicy,
    /// Static rest-frame exclusion windows, applied per absorber.
    exclusions: Vec<RestFrameRange>,
}

impl DlaMask {
    pub fn new(
        catalogue: DlaCatalogue,
        transmission_limit: f64,
        policy: MaskPolicy,
        exclusions: Vec<RestFrameRange>,
    ) -> Self {
        DlaMask {
            catalogue,
            transmission_limit,
            policy,
            exclusions,
        }
    }
}

impl Mask for DlaMask {
    /// Masks the forest's pixels affected by its catalogued absorbers.
    ///
    /// The cumulative transmission over all absorbers on the line of sight
    /// is accumulated onto the forest's transmission correction; pixels at
    /// or below the transmission limit, or inside a rest-frame exclusion
    /// window of any absorber, are then removed or zero-weighted according
    /// to the masking policy. A sightline with no catalogued absorber is
    /// left untouched.
    fn apply_mask(&self, forest: &mut Forest) -> Result<(), LyaError> {
        let Some(absorbers) = self.catalogue.absorbers(forest.los_id) else {
            return Ok(());
        };

        let lambda = forest.wavelength();
        let mut transmission = vec![1.0; lambda.len()];
        for &(z_abs, log_nhi) in absorbers {
            for (total, factor) in transmission
                .iter_mut()
                .zip(dla_profile(&lambda, z_abs, log_nhi).iter())
            {
                *total *= factor;
            }
        }

        let mut keep: Vec<bool> = transmission
            .iter()
            .map(|&value| value > self.transmission_limit)
            .collect();
        for range in &self.exclusions {
            for &(z_abs, _) in absorbers {
                for (kept, &value) in keep.iter_mut().zip(lambda.iter()) {
                    let rest_frame = value / (1.0 + z_abs);
                    *kept &= rest_frame < range.wave_min || rest_frame > range.wave_max;
                }
            }
        }

        forest.accumulate_transmission(&transmission);
        match self.policy {
            MaskPolicy::RemovePixels => forest.remove_pixels(&keep),
            MaskPolicy::ZeroIvar => forest.zero_ivar(&keep),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn toy_forest(los_id: i64, n: usize) -> Forest {
        Forest {
            los_id,
            ra: 150.1,
            dec: 2.2,
            z_qso: 2.8,
            mean_snr: 5.0,
            mean_reso: 70.0,
            plate: 1234,
            mjd: 55555,
            fiberid: 11,
            log_lambda: (0..n)
                .map(|i| (3800.0 + 0.8 * i as f64).log10())
                .collect(),
            delta: vec![0.1; n],
            ivar: vec![2.0; n],
            exposures_diff: vec![0.01; n],
            resolution_matrix: Some(vec![vec![0.2, 0.6, 0.2]; n]),
            transmission_correction: None,
        }
    }

    // absorber placed so its Lyman-alpha line center sits inside the grid
    fn absorber_on_grid() -> DlaCatalogueEntry {
        DlaCatalogueEntry {
            los_id: 7,
            z_abs: 2.2,
            log_nhi: 21.0,
        }
    }

    #[test]
    fn test_profile_saturates_at_line_center() {
        let z_abs = 2.2;
        let center = LAMBDA_LYA * (1.0 + z_abs);
        let lambda = vec![center - 30.0, center, center + 30.0, center + 400.0];
        let profile = dla_profile(&lambda, z_abs, 21.0);
        // a strong DLA is opaque at and around line center
        assert!(profile[1] < 1e-6);
        assert!(profile[0] < profile[3]);
        // far from the line the transmission recovers
        assert!(profile[3] > 0.9);
        for &value in &profile {
            assert!((0.0..=1.0).contains(&value));
        }
    }

    #[test]
    fn test_tau_positive_and_peaked_at_center() {
        let z_abs = 2.2;
        let center = LAMBDA_LYA * (1.0 + z_abs);
        let lambda: Vec<f64> = (-50..=50).map(|i| center + i as f64).collect();
        let tau = tau_lya(&lambda, z_abs, 20.5);
        let peak_index = tau
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;
        assert_eq!(peak_index, 50);
        assert!(tau.iter().all(|&value| value > 0.0));
    }

    #[test]
    fn test_no_catalogued_absorber_is_identity() {
        let catalogue = DlaCatalogue::from_entries([absorber_on_grid()]);
        let mask = DlaMask::new(catalogue, 0.8, MaskPolicy::RemovePixels, Vec::new());
        let mut forest = toy_forest(999, 50); // id not in catalogue
        let original = forest.clone();
        mask.apply_mask(&mut forest).unwrap();
        assert_eq!(forest.log_lambda, original.log_lambda);
        assert_eq!(forest.ivar, original.ivar);
        assert!(forest.transmission_correction.is_none());
    }

    #[test]
    fn test_remove_policy_shrinks_arrays() {
        let catalogue = DlaCatalogue::from_entries([absorber_on_grid()]);
        let mask = DlaMask::new(catalogue, 0.8, MaskPolicy::RemovePixels, Vec::new());
        let mut forest = toy_forest(7, 200);
        let before = forest.num_pixels();
        mask.apply_mask(&mut forest).unwrap();
        let after = forest.num_pixels();
        assert!(after < before, "a strong DLA must mask some pixels");
        assert_eq!(forest.delta.len(), after);
        assert_eq!(forest.ivar.len(), after);
        assert_eq!(forest.resolution_matrix.as_ref().unwrap().len(), after);
        // surviving pixels all clear the transmission limit
        let correction = forest.transmission_correction.as_ref().unwrap();
        assert_eq!(correction.len(), after);
        assert!(correction.iter().all(|&value| value > 0.8));
    }

    #[test]
    fn test_zero_ivar_policy_keeps_length() {
        let catalogue = DlaCatalogue::from_entries([absorber_on_grid()]);
        let remove_mask = DlaMask::new(
            catalogue.clone(),
            0.8,
            MaskPolicy::RemovePixels,
            Vec::new(),
        );
        let zero_mask = DlaMask::new(catalogue, 0.8, MaskPolicy::ZeroIvar, Vec::new());

        let mut removed = toy_forest(7, 200);
        let mut zeroed = toy_forest(7, 200);
        remove_mask.apply_mask(&mut removed).unwrap();
        zero_mask.apply_mask(&mut zeroed).unwrap();

        assert_eq!(zeroed.num_pixels(), 200);
        let num_zeroed = zeroed.ivar.iter().filter(|&&value| value == 0.0).count();
        assert_eq!(removed.num_pixels(), 200 - num_zeroed);
    }

    #[test]
    fn test_rest_frame_exclusion_masks_extra_pixels() {
        let entry = absorber_on_grid();
        let catalogue = DlaCatalogue::from_entries([entry]);
        let plain = DlaMask::new(catalogue.clone(), 0.8, MaskPolicy::ZeroIvar, Vec::new());
        // a window well away from the damped core, in the absorber rest frame
        let windowed = DlaMask::new(
            catalogue,
            0.8,
            MaskPolicy::ZeroIvar,
            vec![RestFrameRange { wave_min: 1250.0, wave_max: 1255.0 }],
        );

        let mut without = toy_forest(7, 800);
        let mut with = toy_forest(7, 800);
        plain.apply_mask(&mut without).unwrap();
        windowed.apply_mask(&mut with).unwrap();

        let masked_without = without.ivar.iter().filter(|&&v| v == 0.0).count();
        let masked_with = with.ivar.iter().filter(|&&v| v == 0.0).count();
        assert!(masked_with > masked_without);
    }

    #[test]
    fn test_catalogue_groups_by_sightline() {
        let catalogue = DlaCatalogue::from_entries([
            DlaCatalogueEntry { los_id: 1, z_abs: 2.0, log_nhi: 20.3 },
            DlaCatalogueEntry { los_id: 1, z_abs: 2.4, log_nhi: 21.0 },
            DlaCatalogueEntry { los_id: 2, z_abs: 2.1, log_nhi: 20.0 },
        ]);
        assert_eq!(catalogue.num_sightlines(), 2);
        assert_eq!(catalogue.num_absorbers(), 3);
        assert_eq!(catalogue.absorbers(1).unwrap().len(), 2);
        assert!(catalogue.absorbers(3).is_none());

        let pairs = catalogue.absorbers(1).unwrap();
        assert_abs_diff_eq!(pairs[0].0, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(pairs[1].1, 21.0, epsilon = 1e-12);
    }
}

use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};

use crate::constants::{absorber_igm, SPEED_LIGHT};
use crate::data::binning::WavelengthBinning;
use crate::data::spectrum::Forest;
use crate::error::LyaError;
use crate::pk1d::fill::fill_masked_pixels;
use crate::pk1d::power::{compute_pk_noise, compute_pk_raw};
use crate::pk1d::rebin::rebin_diff_noise;
use crate::pk1d::resolution::{compute_correction_reso, compute_correction_reso_matrix};
use crate::pk1d::split::split_forest;

/// How the noise power subtracted from the raw power is estimated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseEstimate {
    /// Monte-Carlo realizations drawn from the inverse-variance model.
    Pipeline,
    /// Power of the exposure-difference spectrum, bin by bin.
    Diff,
    /// Mean difference power over k in (0, 0.02), used as a flat floor.
    MeanDiff,
    /// Difference power after variance-preserving rebinning.
    RebinDiff,
    /// Mean rebinned difference power over k in (0.003, 0.02).
    MeanRebinDiff,
}

impl NoiseEstimate {
    fn uses_rebinned_diff(self) -> bool {
        matches!(self, NoiseEstimate::RebinDiff | NoiseEstimate::MeanRebinDiff)
    }
}

impl FromStr for NoiseEstimate {
    type Err = LyaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pipeline" => Ok(NoiseEstimate::Pipeline),
            "diff" => Ok(NoiseEstimate::Diff),
            "mean_diff" => Ok(NoiseEstimate::MeanDiff),
            "rebin_diff" => Ok(NoiseEstimate::RebinDiff),
            "mean_rebin_diff" => Ok(NoiseEstimate::MeanRebinDiff),
            other => Err(LyaError::Config(format!(
                "unknown noise estimate '{other}', expected one of \
                 pipeline/diff/mean_diff/rebin_diff/mean_rebin_diff"
            ))),
        }
    }
}

/// Resolution-correction variant, chosen once per run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResoCorrection {
    Gaussian,
    Matrix,
}

/// Picks the resolution-correction variant from the first spectrum of a
/// run: the matrix variant needs linear binning and an available
/// resolution matrix, and can be disabled explicitly.
pub fn select_reso_correction(
    forest: &Forest,
    binning: &WavelengthBinning,
    disable_reso_matrix: bool,
) -> ResoCorrection {
    if binning.linear && !disable_reso_matrix && forest.resolution_matrix.is_some() {
        ResoCorrection::Matrix
    } else {
        ResoCorrection::Gaussian
    }
}

/// Configuration for the Pk1D pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pk1dConfig {
    /// Minimal mean SNR per pixel; spectra at or below are skipped.
    pub snr_min: f64,
    /// Maximal mean resolution [km/s]; spectra at or above are skipped.
    pub reso_max: f64,
    /// Lower limit on observed wavelength [Angstrom].
    pub lambda_obs_min: f64,
    /// Requested number of segments per forest.
    pub nb_part: usize,
    /// Minimal number of pixels in a segment.
    pub nb_pixel_min: usize,
    /// Maximal number of masked pixels in a segment.
    pub nb_pixel_masked_max: usize,
    /// Skip the masked-pixel filling step.
    pub no_apply_filling: bool,
    pub noise_estimate: NoiseEstimate,
    /// Name of the absorption line defining the pixel redshifts.
    pub absorber: String,
    /// Number of pipeline-noise realizations per segment.
    pub num_noise_exp: usize,
    /// Worker-pool size for batch processing.
    pub num_processors: usize,
    /// Never use the resolution matrix, even when available.
    pub disable_reso_matrix: bool,
    /// Convert linear-binning outputs to velocity units.
    pub force_output_in_velocity: bool,
}

impl Default for Pk1dConfig {
    fn default() -> Self {
        Pk1dConfig {
            snr_min: 2.0,
            reso_max: 85.0,
            lambda_obs_min: 3600.0,
            nb_part: 3,
            nb_pixel_min: 75,
            nb_pixel_masked_max: 40,
            no_apply_filling: false,
            noise_estimate: NoiseEstimate::MeanDiff,
            absorber: "LYA".to_string(),
            num_noise_exp: 10,
            num_processors: 1,
            disable_reso_matrix: false,
            force_output_in_velocity: false,
        }
    }
}

impl Pk1dConfig {
    /// Rest-frame wavelength of the configured absorber line.
    pub fn absorber_wavelength(&self) -> Result<f64, LyaError> {
        absorber_igm(&self.absorber).ok_or_else(|| {
            LyaError::Config(format!("unknown absorption line '{}'", self.absorber))
        })
    }
}

/// Power spectrum of one forest segment.
///
/// All arrays share the wavenumber grid; `pk` is the raw power with the
/// configured noise term subtracted, divided by the resolution correction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pk1dResult {
    pub k: Vec<f64>,
    pub pk_raw: Vec<f64>,
    pub pk_noise: Vec<f64>,
    pub pk_diff: Vec<f64>,
    pub correction_reso: Vec<f64>,
    pub pk: Vec<f64>,
    pub mean_z: f64,
    pub num_masked_pixels: usize,
}

fn mean_over_band(k: &[f64], values: &[f64], k_min: f64, k_max: f64) -> f64 {
    let mut total = 0.0;
    let mut count = 0usize;
    for (&mode, &value) in k.iter().zip(values.iter()) {
        if mode > k_min && mode < k_max {
            total += value;
            count += 1;
        }
    }
    // an empty band yields NaN and poisons the combined power downstream
    total / count as f64
}

/// Runs the full per-spectrum pipeline: selection cuts, segmentation,
/// masked-pixel filling, raw/noise power estimation, resolution correction
/// and the final combination.
///
/// Returns `None` when the spectrum fails the SNR/resolution cuts or has
/// too few pixels past the observed-wavelength floor. Segments with too
/// many masked pixels are skipped individually, so the returned list can
/// be shorter than the segment count (or empty).
pub fn compute_pk1d(
    forest: &Forest,
    binning: &WavelengthBinning,
    reso_correction: ResoCorrection,
    config: &Pk1dConfig,
    absorber_wavelength: f64,
    rng: &mut impl Rng,
) -> Option<Vec<Pk1dResult>> {
    // Selection over the SNR and the resolution
    if forest.mean_snr <= config.snr_min || forest.mean_reso >= config.reso_max {
        return None;
    }

    let lambda = forest.wavelength();
    let first_pixel_index = lambda
        .iter()
        .position(|&value| value > config.lambda_obs_min)
        .unwrap_or(lambda.len());

    let num_eligible = lambda.len() - first_pixel_index;
    if num_eligible < config.nb_pixel_min {
        return None;
    }
    let num_parts = usize::min(config.nb_part, num_eligible / config.nb_pixel_min);

    let coord: &[f64] = if binning.linear {
        &lambda
    } else {
        &forest.log_lambda
    };
    let reso_matrix = match reso_correction {
        ResoCorrection::Matrix => forest.resolution_matrix.as_deref(),
        ResoCorrection::Gaussian => None,
    };

    let mut sections = split_forest(
        num_parts,
        coord,
        &forest.delta,
        &forest.exposures_diff,
        &forest.ivar,
        first_pixel_index,
        reso_matrix,
        absorber_wavelength,
        binning.linear,
    );

    let mut results = Vec::with_capacity(num_parts);
    for section in sections.iter_mut() {
        if config.noise_estimate.uses_rebinned_diff() {
            section.exposures_diff = rebin_diff_noise(
                binning.bin_width,
                &section.coord,
                &section.exposures_diff,
                rng,
            );
        }

        let filled = fill_masked_pixels(
            binning.bin_width,
            &section.coord,
            &section.delta,
            &section.exposures_diff,
            &section.ivar,
            config.no_apply_filling,
        );
        if filled.num_masked_pixels > config.nb_pixel_masked_max {
            continue;
        }

        let (mut k, pk_raw) = compute_pk_raw(binning.bin_width, &filled.delta, binning.linear);

        let run_noise = config.noise_estimate == NoiseEstimate::Pipeline;
        let (pk_noise, pk_diff) = compute_pk_noise(
            binning.bin_width,
            &filled.ivar,
            &filled.exposures_diff,
            run_noise,
            binning.linear,
            config.num_noise_exp,
            rng,
        );

        let correction_reso = if binning.linear {
            match reso_correction {
                ResoCorrection::Matrix => compute_correction_reso_matrix(
                    section.reso_matrix.as_deref().unwrap_or(&[]),
                    &k,
                    filled.num_pixels(),
                ),
                ResoCorrection::Gaussian => {
                    // convert the velocity-space resolution estimate to
                    // Angstrom via the pixel size
                    let mean_reso_angstrom =
                        binning.bin_width * forest.mean_reso / 10f64.ln() / SPEED_LIGHT;
                    compute_correction_reso(binning.bin_width, mean_reso_angstrom, &k)
                }
            }
        } else {
            let pixel_velocity = binning.bin_width * 10f64.ln() * SPEED_LIGHT;
            compute_correction_reso(pixel_velocity, forest.mean_reso, &k)
        };

        let mut pk: Vec<f64> = match config.noise_estimate {
            NoiseEstimate::Pipeline => pk_raw
                .iter()
                .zip(pk_noise.iter())
                .zip(correction_reso.iter())
                .map(|((&raw, &noise), &correction)| (raw - noise) / correction)
                .collect(),
            NoiseEstimate::Diff | NoiseEstimate::RebinDiff => pk_raw
                .iter()
                .zip(pk_diff.iter())
                .zip(correction_reso.iter())
                .map(|((&raw, &diff), &correction)| (raw - diff) / correction)
                .collect(),
            NoiseEstimate::MeanDiff | NoiseEstimate::MeanRebinDiff => {
                let k_min = if config.noise_estimate == NoiseEstimate::MeanRebinDiff {
                    0.003
                } else {
                    0.0
                };
                let noise_floor = mean_over_band(&k, &pk_diff, k_min, 0.02);
                pk_raw
                    .iter()
                    .zip(correction_reso.iter())
                    .map(|(&raw, &correction)| (raw - noise_floor) / correction)
                    .collect()
            }
        };

        if config.force_output_in_velocity && binning.linear {
            let mean_lambda =
                filled.coord.iter().sum::<f64>() / filled.num_pixels() as f64;
            let jacobian = SPEED_LIGHT / mean_lambda;
            for value in pk.iter_mut() {
                *value *= jacobian;
            }
            for mode in k.iter_mut() {
                *mode /= jacobian;
            }
        }

        results.push(Pk1dResult {
            k,
            pk_raw,
            pk_noise,
            pk_diff,
            correction_reso,
            pk,
            mean_z: section.mean_z,
            num_masked_pixels: filled.num_masked_pixels,
        });
    }

    Some(results)
}

/// Processes a batch of spectra through a fixed-size worker pool.
///
/// Spectra are independent; each gets its own RNG derived from the batch
/// seed and its catalogue index, so results do not depend on worker
/// scheduling. The output preserves catalogue order, one entry per input
/// spectrum (`None` for spectra rejected by the selection cuts).
pub fn compute_pk1d_batch(
    forests: &[Forest],
    binning: &WavelengthBinning,
    reso_correction: ResoCorrection,
    config: &Pk1dConfig,
    seed: u64,
) -> Result<Vec<Option<Vec<Pk1dResult>>>, LyaError> {
    let absorber_wavelength = config.absorber_wavelength()?;

    let pool = ThreadPoolBuilder::new()
        .num_threads(config.num_processors)
        .build()
        .map_err(|error| LyaError::Config(format!("could not build worker pool: {error}")))?;

    Ok(pool.install(|| {
        forests
            .par_iter()
            .enumerate()
            .map(|(index, forest)| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(index as u64));
                compute_pk1d(
                    forest,
                    binning,
                    reso_correction,
                    config,
                    absorber_wavelength,
                    &mut rng,
                )
            })
            .collect()
    }))
}

use rand::Rng;
use rustfft::num_complex::Complex64;
use rustfft::FftPlanner;
use statrs::distribution::Normal;

use crate::constants::SPEED_LIGHT;

/// Physical length of a segment of `num_pixels` bins, in Angstrom for
/// linear binning and km/s for log binning.
fn segment_length(bin_width: f64, num_pixels: usize, linear: bool) -> f64 {
    if linear {
        bin_width * num_pixels as f64
    } else {
        bin_width * 10f64.ln() * SPEED_LIGHT * num_pixels as f64
    }
}

fn fft_forward(values: &[f64]) -> Vec<Complex64> {
    let mut buffer: Vec<Complex64> = values
        .iter()
        .map(|&value| Complex64::new(value, 0.0))
        .collect();
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(buffer.len());
    fft.process(&mut buffer);
    buffer
}

/// Discrete power spectrum of a delta array.
///
/// The wavenumber grid has one entry per pixel, `k[j] = 2*pi*j / L` with
/// `L` the physical segment length, and the power is the squared Fourier
/// magnitude normalized as `|F[j]|^2 * L / n^2`. Units are 1/Angstrom and
/// Angstrom on linear grids, (km/s)^-1 and km/s on log grids.
///
/// # Returns
/// `(k, pk)`, both of length `delta.len()`.
pub fn compute_pk_raw(bin_width: f64, delta: &[f64], linear: bool) -> (Vec<f64>, Vec<f64>) {
    let num_pixels = delta.len();
    let length = segment_length(bin_width, num_pixels, linear);

    let spectrum = fft_forward(delta);
    let k: Vec<f64> = (0..num_pixels)
        .map(|index| 2.0 * std::f64::consts::PI * index as f64 / length)
        .collect();
    let pk: Vec<f64> = spectrum
        .iter()
        .map(|value| value.norm_sqr() * length / (num_pixels * num_pixels) as f64)
        .collect();
    (k, pk)
}

/// Noise power spectra for one segment.
///
/// When `run_noise` is set, the pipeline-noise power is estimated by Monte
/// Carlo: `num_noise_exp` synthetic realizations drawn per pixel from a
/// Gaussian with variance `1/ivar`, Fourier transformed and averaged.
/// Pixels with zero ivar contribute zero noise, not infinite. When
/// `run_noise` is unset the pipeline-noise power stays all-zero.
///
/// The difference power is the raw power of `exposures_diff` halved, since
/// differencing two exposures doubles the variance.
///
/// # Returns
/// `(pk_noise, pk_diff)`, both of length `ivar.len()`.
pub fn compute_pk_noise(
    bin_width: f64,
    ivar: &[f64],
    exposures_diff: &[f64],
    run_noise: bool,
    linear: bool,
    num_noise_exp: usize,
    rng: &mut impl Rng,
) -> (Vec<f64>, Vec<f64>) {
    let num_pixels = ivar.len();
    let sigma: Vec<f64> = ivar
        .iter()
        .map(|&value| if value > 0.0 { 1.0 / value.sqrt() } else { 0.0 })
        .collect();

    let mut pk_noise = vec![0.0; num_pixels];
    if run_noise && num_noise_exp > 0 {
        let unit_normal = Normal::new(0.0, 1.0).unwrap();
        for _ in 0..num_noise_exp {
            let realization: Vec<f64> = sigma
                .iter()
                .map(|&s| {
                    if s > 0.0 {
                        s * rng.sample(unit_normal)
                    } else {
                        0.0
                    }
                })
                .collect();
            let (_, pk_exp) = compute_pk_raw(bin_width, &realization, linear);
            for (total, value) in pk_noise.iter_mut().zip(pk_exp.iter()) {
                *total += value;
            }
        }
        for value in pk_noise.iter_mut() {
            *value /= num_noise_exp as f64;
        }
    }

    let (_, pk_diff_raw) = compute_pk_raw(bin_width, exposures_diff, linear);
    let pk_diff: Vec<f64> = pk_diff_raw.iter().map(|&value| value / 2.0).collect();

    (pk_noise, pk_diff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_zero_delta_gives_zero_power() {
        let delta = vec![0.0; 64];
        let (k, pk) = compute_pk_raw(0.8, &delta, true);
        assert_eq!(k.len(), 64);
        assert_eq!(pk.len(), 64);
        assert!(pk.iter().all(|&value| value == 0.0));
    }

    #[test]
    fn test_k_grid_starts_at_zero_and_is_uniform() {
        let delta = vec![0.1; 32];
        let (k, _) = compute_pk_raw(0.8, &delta, true);
        assert_abs_diff_eq!(k[0], 0.0, epsilon = 1e-15);
        let dk = 2.0 * std::f64::consts::PI / (0.8 * 32.0);
        for (index, &value) in k.iter().enumerate() {
            assert_abs_diff_eq!(value, dk * index as f64, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_single_mode_power_lands_in_matching_bin() {
        // delta_j = cos(2 pi m j / n) puts |F| = n/2 in bins m and n - m,
        // so pk there is (n/2)^2 * L / n^2 = L / 4.
        let n = 128;
        let m = 5;
        let bin_width = 0.8;
        let delta: Vec<f64> = (0..n)
            .map(|j| (2.0 * std::f64::consts::PI * m as f64 * j as f64 / n as f64).cos())
            .collect();
        let (_, pk) = compute_pk_raw(bin_width, &delta, true);
        let length = bin_width * n as f64;
        assert_abs_diff_eq!(pk[m], length / 4.0, epsilon = 1e-8);
        assert_abs_diff_eq!(pk[n - m], length / 4.0, epsilon = 1e-8);
        assert_abs_diff_eq!(pk[m + 1], 0.0, epsilon = 1e-8);
    }

    #[test]
    fn test_log_binning_uses_velocity_length() {
        let delta = vec![0.1; 16];
        let (k_log, _) = compute_pk_raw(1e-4, &delta, false);
        let velocity_length = 1e-4 * 10f64.ln() * SPEED_LIGHT * 16.0;
        assert_abs_diff_eq!(
            k_log[1],
            2.0 * std::f64::consts::PI / velocity_length,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_noise_power_zero_without_pipeline_mode() {
        let mut rng = StdRng::seed_from_u64(4);
        let ivar = vec![1.0; 32];
        let diff = vec![0.5; 32];
        let (pk_noise, pk_diff) = compute_pk_noise(0.8, &ivar, &diff, false, true, 10, &mut rng);
        assert!(pk_noise.iter().all(|&value| value == 0.0));
        // difference power is halved raw power
        let (_, pk_diff_raw) = compute_pk_raw(0.8, &diff, true);
        for (half, raw) in pk_diff.iter().zip(pk_diff_raw.iter()) {
            assert_abs_diff_eq!(half * 2.0, raw, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_zero_ivar_pixels_contribute_zero_noise() {
        let mut rng = StdRng::seed_from_u64(4);
        let ivar = vec![0.0; 32];
        let diff = vec![0.0; 32];
        let (pk_noise, pk_diff) = compute_pk_noise(0.8, &ivar, &diff, true, true, 5, &mut rng);
        assert!(pk_noise.iter().all(|&value| value == 0.0));
        assert!(pk_diff.iter().all(|&value| value == 0.0));
    }

    #[test]
    fn test_monte_carlo_noise_tracks_variance_level() {
        // White noise with variance 1/ivar has mean power L / (n * ivar).
        let mut rng = StdRng::seed_from_u64(4);
        let n = 256;
        let ivar = vec![4.0; n];
        let diff = vec![0.0; n];
        let bin_width = 0.8;
        let (pk_noise, _) = compute_pk_noise(bin_width, &ivar, &diff, true, true, 200, &mut rng);
        let mean_power: f64 = pk_noise.iter().sum::<f64>() / n as f64;
        let expected = bin_width * n as f64 / (n as f64 * 4.0);
        assert_abs_diff_eq!(mean_power, expected, epsilon = expected * 0.1);
    }
}

use rustfft::num_complex::Complex64;
use rustfft::FftPlanner;

/// Gaussian resolution correction evaluated on a wavenumber grid.
///
/// The factor combines the Gaussian line-spread response
/// `exp(-(k * mean_reso)^2)` with the pixelization top-hat response
/// `sinc(k * bin_width / 2pi)^2`. The caller divides the noise-subtracted
/// power by it. `mean_reso` and `bin_width` must share the wavenumber unit
/// (Angstrom on linear grids, km/s on log grids).
///
/// The factor is strictly positive but not clamped: at high wavenumber it
/// underflows toward machine precision and the deconvolved power blows up,
/// exactly as the uncorrected formula dictates.
pub fn compute_correction_reso(bin_width: f64, mean_reso: f64, k: &[f64]) -> Vec<f64> {
    k.iter()
        .map(|&mode| {
            let gaussian = (-(mode * mean_reso).powi(2)).exp();
            let sinc = if mode > 0.0 {
                let half_width = mode * bin_width / 2.0;
                (half_width.sin() / half_width).powi(2)
            } else {
                1.0
            };
            gaussian * sinc
        })
        .collect()
}

/// Resolution correction derived from the per-pixel convolution kernels.
///
/// Each kernel row is zero-padded to the segment length and Fourier
/// transformed; the correction at each wavenumber is the mean squared
/// kernel magnitude over all pixels. This captures non-Gaussian
/// instrumental responses the single-width model cannot.
///
/// # Arguments
/// * `reso_matrix` - one banded kernel per pixel (any shorter than
///   `num_pixels`; longer kernels are truncated)
/// * `k` - wavenumber grid of length `num_pixels`
/// * `num_pixels` - pixel count of the (filled) segment
pub fn compute_correction_reso_matrix(
    reso_matrix: &[Vec<f64>],
    k: &[f64],
    num_pixels: usize,
) -> Vec<f64> {
    if reso_matrix.is_empty() {
        return vec![1.0; k.len()];
    }

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(num_pixels);

    let mut mean_squared = vec![0.0; num_pixels];
    for kernel in reso_matrix {
        let mut buffer = vec![Complex64::new(0.0, 0.0); num_pixels];
        for (slot, &coefficient) in kernel.iter().take(num_pixels).enumerate() {
            buffer[slot] = Complex64::new(coefficient, 0.0);
        }
        fft.process(&mut buffer);
        for (total, value) in mean_squared.iter_mut().zip(buffer.iter()) {
            *total += value.norm_sqr();
        }
    }
    let num_kernels = reso_matrix.len() as f64;
    mean_squared
        .iter()
        .take(k.len())
        .map(|&total| total / num_kernels)
        .collect()
}

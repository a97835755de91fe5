/// A segment whose masked pixels have been filled onto a complete uniform
/// grid, plus the count of masked pixels on that grid.
#[derive(Clone, Debug)]
pub struct FilledSection {
    pub coord: Vec<f64>,
    pub delta: Vec<f64>,
    pub exposures_diff: Vec<f64>,
    pub ivar: Vec<f64>,
    /// Number of zero-ivar pixels on the output grid.
    pub num_masked_pixels: usize,
}

impl FilledSection {
    pub fn num_pixels(&self) -> usize {
        self.coord.len()
    }
}

/// Fills gaps in a segment so the FFT sees a complete uniform grid.
///
/// The output grid spans the segment's coordinate range at `bin_width`
/// spacing; pixels absent from the input get delta and noise difference set
/// to zero and ivar set to zero. The masked-pixel count is taken on the
/// output grid, so it includes both filled-in gaps and input pixels that
/// already had zero ivar.
///
/// With `no_apply_filling` the arrays pass through unchanged and the count
/// is taken directly on the input.
pub fn fill_masked_pixels(
    bin_width: f64,
    coord: &[f64],
    delta: &[f64],
    exposures_diff: &[f64],
    ivar: &[f64],
    no_apply_filling: bool,
) -> FilledSection {
    if no_apply_filling {
        let num_masked_pixels = ivar.iter().filter(|&&value| value == 0.0).count();
        return FilledSection {
            coord: coord.to_vec(),
            delta: delta.to_vec(),
            exposures_diff: exposures_diff.to_vec(),
            ivar: ivar.to_vec(),
            num_masked_pixels,
        };
    }

    let origin = coord[0];
    let indices: Vec<usize> = coord
        .iter()
        .map(|&x| ((x - origin) / bin_width + 0.5).floor() as usize)
        .collect();
    let num_bins = indices[indices.len() - 1] + 1;

    let mut delta_new = vec![0.0; num_bins];
    let mut exposures_diff_new = vec![0.0; num_bins];
    let mut ivar_new = vec![0.0; num_bins];
    for (slot, &index) in indices.iter().enumerate() {
        delta_new[index] = delta[slot];
        exposures_diff_new[index] = exposures_diff[slot];
        ivar_new[index] = ivar[slot];
    }

    let coord_new: Vec<f64> = (0..num_bins)
        .map(|index| origin + index as f64 * bin_width)
        .collect();
    let num_masked_pixels = ivar_new.iter().filter(|&&value| value == 0.0).count();

    FilledSection {
        coord: coord_new,
        delta: delta_new,
        exposures_diff: exposures_diff_new,
        ivar: ivar_new,
        num_masked_pixels,
    }
}

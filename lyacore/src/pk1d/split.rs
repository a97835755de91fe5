/// One contiguous redshift segment of a forest, carrying independent copies
/// of the per-pixel arrays it needs downstream.
#[derive(Clone, Debug)]
pub struct ForestSection {
    /// Mean absorber redshift of the segment.
    pub mean_z: f64,
    /// Coordinate slice: wavelength [Angstrom] on linear grids, log10
    /// wavelength on log grids.
    pub coord: Vec<f64>,
    pub delta: Vec<f64>,
    pub exposures_diff: Vec<f64>,
    pub ivar: Vec<f64>,
    /// Per-pixel convolution kernels, when a resolution matrix is in use.
    pub reso_matrix: Option<Vec<Vec<f64>>>,
}

/// Splits a forest into `num_parts` contiguous segments.
///
/// Segments tile `[first_pixel_index, n)` with `(n - first) / num_parts`
/// pixels each; the integer-division remainder goes to the last segment, so
/// the tiling is deterministic and reproducible pixel for pixel. The caller
/// is responsible for choosing `num_parts` so that every segment reaches the
/// minimum pixel count.
///
/// # Arguments
/// * `num_parts` - number of segments (>= 1)
/// * `coord` - wavelength or log10-wavelength grid, per the binning mode
/// * `first_pixel_index` - first pixel past the observed-wavelength floor
/// * `reso_matrix` - per-pixel kernels to slice along with the pixel arrays
/// * `absorber_wavelength` - rest-frame transition wavelength [Angstrom]
///   defining the pixel redshifts
/// * `linear` - true if `coord` is wavelength, false if log10 wavelength
pub fn split_forest(
    num_parts: usize,
    coord: &[f64],
    delta: &[f64],
    exposures_diff: &[f64],
    ivar: &[f64],
    first_pixel_index: usize,
    reso_matrix: Option<&[Vec<f64>]>,
    absorber_wavelength: f64,
    linear: bool,
) -> Vec<ForestSection> {
    let num_pixels = coord.len() - first_pixel_index;
    let pixels_per_part = num_pixels / num_parts;

    let mut sections = Vec::with_capacity(num_parts);
    for part_index in 0..num_parts {
        let start = first_pixel_index + part_index * pixels_per_part;
        let end = if part_index == num_parts - 1 {
            coord.len()
        } else {
            start + pixels_per_part
        };

        let coord_part = coord[start..end].to_vec();
        let lambda_first = if linear {
            coord_part[0]
        } else {
            10f64.powf(coord_part[0])
        };
        let lambda_last = if linear {
            coord_part[coord_part.len() - 1]
        } else {
            10f64.powf(coord_part[coord_part.len() - 1])
        };
        let mean_z = (lambda_first + lambda_last) / 2.0 / absorber_wavelength - 1.0;

        sections.push(ForestSection {
            mean_z,
            coord: coord_part,
            delta: delta[start..end].to_vec(),
            exposures_diff: exposures_diff[start..end].to_vec(),
            ivar: ivar[start..end].to_vec(),
            reso_matrix: reso_matrix.map(|matrix| matrix[start..end].to_vec()),
        });
    }
    sections
}

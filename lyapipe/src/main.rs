use std::path::PathBuf;
use std::process::exit;

use clap::Parser;
use log::{error, info};

use lyacore::error::LyaError;
use lyacore::masks::dla::{DlaMask, Mask, MaskPolicy};
use lyacore::pk1d::pipeline::{NoiseEstimate, Pk1dConfig};
use lyapipe::io::dla_catalogue::{read_dla_catalogue, read_exclusion_file};
use lyapipe::run::{run, RunOptions};

/// Compute the 1D power spectrum of the Lyman-alpha forest from delta
/// files, one output file per input file.
#[derive(Debug, Parser)]
#[command(name = "lyapipe", version, about)]
struct Cli {
    /// Directory to write the power spectra to
    #[arg(long)]
    out_dir: PathBuf,

    /// Directory holding the delta files (*.jsonl)
    #[arg(long)]
    in_dir: PathBuf,

    /// Minimal mean SNR per pixel
    #[arg(long, default_value_t = 2.0)]
    snr_min: f64,

    /// Maximal mean resolution [km/s]
    #[arg(long, default_value_t = 85.0)]
    reso_max: f64,

    /// Lower limit on observed wavelength [Angstrom]
    #[arg(long, default_value_t = 3600.0)]
    lambda_obs_min: f64,

    /// Number of parts in which to split the forest
    #[arg(long, default_value_t = 3)]
    nb_part: usize,

    /// Minimal number of pixels in a part of a forest
    #[arg(long, default_value_t = 75)]
    nb_pixel_min: usize,

    /// Maximal number of masked pixels in a part of a forest
    #[arg(long, default_value_t = 40)]
    nb_pixel_masked_max: usize,

    /// Do not fill masked pixels before the Fourier transform
    #[arg(long)]
    no_apply_filling: bool,

    /// Noise estimate: pipeline, diff, mean_diff, rebin_diff or
    /// mean_rebin_diff
    #[arg(long, default_value = "mean_diff")]
    noise_estimate: String,

    /// Name of the absorption line defining the redshift of the delta
    /// field (e.g. LYA, LYB, CIV(1548))
    #[arg(long, default_value = "LYA")]
    abs_igm: String,

    /// Number of processors for the worker pool
    #[arg(long, default_value_t = 1)]
    num_processors: usize,

    /// Number of pipeline-noise realizations per segment
    #[arg(long, default_value_t = 10)]
    num_noise_exp: usize,

    /// Use the Gaussian resolution correction even when a resolution
    /// matrix is available
    #[arg(long)]
    disable_reso_matrix: bool,

    /// Report linear-binning results in velocity units
    #[arg(long)]
    force_output_in_velocity: bool,

    /// Base seed for the noise-realization RNGs
    #[arg(long, default_value_t = 4)]
    seed: u64,

    /// Optional DLA catalogue (CSV); enables DLA masking
    #[arg(long)]
    dla_catalogue: Option<PathBuf>,

    /// Name of the line-of-sight id column in the DLA catalogue
    #[arg(long, default_value = "THING_ID")]
    los_id_name: String,

    /// Transmission threshold below which DLA pixels are masked
    #[arg(long, default_value_t = 0.8)]
    dla_mask_limit: f64,

    /// Optional rest-frame exclusion file for the DLA mask
    #[arg(long)]
    mask_file: Option<PathBuf>,

    /// Zero the weight of masked pixels instead of removing them
    #[arg(long)]
    keep_masked_pixels: bool,
}

fn build_options(cli: Cli) -> Result<RunOptions, LyaError> {
    let config = Pk1dConfig {
        snr_min: cli.snr_min,
        reso_max: cli.reso_max,
        lambda_obs_min: cli.lambda_obs_min,
        nb_part: cli.nb_part,
        nb_pixel_min: cli.nb_pixel_min,
        nb_pixel_masked_max: cli.nb_pixel_masked_max,
        no_apply_filling: cli.no_apply_filling,
        noise_estimate: cli.noise_estimate.parse::<NoiseEstimate>()?,
        absorber: cli.abs_igm,
        num_noise_exp: cli.num_noise_exp,
        num_processors: cli.num_processors,
        disable_reso_matrix: cli.disable_reso_matrix,
        force_output_in_velocity: cli.force_output_in_velocity,
    };
    // reject unknown absorber names before touching any data
    config.absorber_wavelength()?;

    let mask: Option<Box<dyn Mask>> = match &cli.dla_catalogue {
        None => None,
        Some(path) => {
            let catalogue = read_dla_catalogue(path, &cli.los_id_name)?;
            info!(
                "DLA catalogue: {} absorbers on {} sightlines",
                catalogue.num_absorbers(),
                catalogue.num_sightlines()
            );
            let exclusions = match &cli.mask_file {
                Some(mask_path) => read_exclusion_file(mask_path)?,
                None => Vec::new(),
            };
            let policy = if cli.keep_masked_pixels {
                MaskPolicy::ZeroIvar
            } else {
                MaskPolicy::RemovePixels
            };
            Some(Box::new(DlaMask::new(
                catalogue,
                cli.dla_mask_limit,
                policy,
                exclusions,
            )))
        }
    };

    Ok(RunOptions {
        in_dir: cli.in_dir,
        out_dir: cli.out_dir,
        config,
        seed: cli.seed,
        mask,
    })
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let options = match build_options(cli) {
        Ok(options) => options,
        Err(err) => {
            error!("{err}");
            exit(1);
        }
    };

    match run(&options) {
        Ok(summary) => {
            info!(
                "all done: {} files, {} spectra ({} rejected), {} records",
                summary.num_files, summary.num_spectra, summary.num_rejected, summary.num_records
            );
        }
        Err(err) => {
            error!("{err}");
            exit(1);
        }
    }
}

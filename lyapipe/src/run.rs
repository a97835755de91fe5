use std::path::PathBuf;

use log::{debug, info, warn};

use lyacore::data::binning::{classify_binning, WavelengthBinning};
use lyacore::error::LyaError;
use lyacore::masks::dla::Mask;
use lyacore::pk1d::pipeline::{
    compute_pk1d_batch, select_reso_correction, Pk1dConfig, ResoCorrection,
};

use crate::io::delta::{list_delta_files, read_delta_file};
use crate::io::writer::{write_pk1d_file, Pk1dRecord};

/// Everything one Pk1D run needs besides the input data.
pub struct RunOptions {
    pub in_dir: PathBuf,
    pub out_dir: PathBuf,
    pub config: Pk1dConfig,
    /// Base seed for the per-spectrum noise-realization RNGs.
    pub seed: u64,
    /// Optional mask applied to every forest before the pipeline.
    pub mask: Option<Box<dyn Mask>>,
}

/// Counters for one completed run.
#[derive(Clone, Copy, Debug, Default)]
pub struct RunSummary {
    pub num_files: usize,
    pub num_spectra: usize,
    /// Spectra skipped by the SNR/resolution/pixel-count cuts.
    pub num_rejected: usize,
    /// Segment records written.
    pub num_records: usize,
}

/// Drives a whole run: lists the input files, classifies the wavelength
/// binning once, optionally masks DLAs, runs the worker-pool pipeline per
/// file and writes one output file per input file.
///
/// The binning classification of the first spectrum is validated against
/// every later file; a mismatch aborts the run. Per-spectrum rejections
/// only increment a counter.
pub fn run(options: &RunOptions) -> Result<RunSummary, LyaError> {
    let files = list_delta_files(&options.in_dir)?;
    info!("computing Pk1d for {}", options.in_dir.display());

    let mut binning: Option<WavelengthBinning> = None;
    let mut reso_correction = ResoCorrection::Gaussian;
    let mut summary = RunSummary { num_files: files.len(), ..RunSummary::default() };

    for (file_index, file) in files.iter().enumerate() {
        let mut spectra = read_delta_file(file)?;
        summary.num_spectra += spectra.len();

        if let Some(mask) = &options.mask {
            for forest in spectra.iter_mut() {
                mask.apply_mask(forest)?;
            }
        }

        let file_binning = classify_binning(&spectra[0].log_lambda)?;
        if let Some(first) = binning {
            first.validate_consistent(&file_binning)?;
        } else {
            reso_correction = select_reso_correction(
                &spectra[0],
                &file_binning,
                options.config.disable_reso_matrix,
            );
            if file_binning.linear {
                info!("using linear binning, results will have units of AA");
            } else {
                info!("using log binning, results will have units of km/s");
            }
            info!("using {reso_correction:?} resolution correction");
            binning = Some(file_binning);
        }
        let binning = binning.unwrap_or(file_binning);

        // distinct seed block per file so spectrum RNG streams never repeat
        let file_seed = options.seed.wrapping_add((file_index as u64) << 32);
        let results = compute_pk1d_batch(
            &spectra,
            &binning,
            reso_correction,
            &options.config,
            file_seed,
        )?;

        let unit = if binning.linear && !options.config.force_output_in_velocity {
            "AA"
        } else {
            "km/s"
        };

        let mut records = Vec::new();
        for (forest, result) in spectra.iter().zip(results.into_iter()) {
            match result {
                None => {
                    summary.num_rejected += 1;
                    debug!("skipping los_id {} (selection cuts)", forest.los_id);
                }
                Some(segments) => {
                    for segment in segments {
                        records.push(Pk1dRecord::from_result(forest, segment, unit));
                    }
                }
            }
        }

        if records.is_empty() {
            warn!("no segment passed the cuts in {}", file.display());
        } else {
            let out_path = options.out_dir.join(format!("Pk1D-{file_index}.jsonl"));
            write_pk1d_file(&out_path, &records)?;
            summary.num_records += records.len();
        }
        info!(
            "file {} of {}: {} spectra, {} records",
            file_index + 1,
            files.len(),
            spectra.len(),
            records.len()
        );
    }

    Ok(summary)
}

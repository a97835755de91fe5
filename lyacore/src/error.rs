use thiserror::Error;

/// Fatal error classes for a Pk1D run.
///
/// Per-spectrum and per-segment rejections (SNR cuts, too many masked
/// pixels) are not errors; they are skip returns counted by the caller.
#[derive(Debug, Error)]
pub enum LyaError {
    /// Missing or invalid configuration option, detected before processing.
    #[error("configuration error: {0}")]
    Config(String),

    /// Unreadable input or a catalogue missing a required column.
    #[error("data error: {0}")]
    Data(String),

    /// Ambiguous wavelength grid, or grids inconsistent across input files.
    #[error("binning classification error: {0}")]
    BinningClassification(String),

    /// Failure while constructing or applying a mask.
    #[error("mask error: {0}")]
    Mask(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use lyacore::data::spectrum::Forest;
use lyacore::error::LyaError;

/// Lists the delta files of an input directory in sorted order, so runs
/// are reproducible regardless of directory iteration order.
pub fn list_delta_files(in_dir: &Path) -> Result<Vec<PathBuf>, LyaError> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(in_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "jsonl"))
        .collect();
    files.sort();
    if files.is_empty() {
        return Err(LyaError::Data(format!(
            "no delta files (*.jsonl) found in {}",
            in_dir.display()
        )));
    }
    Ok(files)
}

/// Reads one delta file: one JSON spectrum record per line.
pub fn read_delta_file(path: &Path) -> Result<Vec<Forest>, LyaError> {
    let reader = BufReader::new(File::open(path)?);
    let mut spectra = Vec::new();
    for (line_index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let forest: Forest = serde_json::from_str(&line).map_err(|error| {
            LyaError::Data(format!(
                "{}:{}: invalid delta record: {error}",
                path.display(),
                line_index + 1
            ))
        })?;
        spectra.push(forest);
    }
    if spectra.is_empty() {
        return Err(LyaError::Data(format!(
            "delta file {} contains no spectra",
            path.display()
        )));
    }
    Ok(spectra)
}

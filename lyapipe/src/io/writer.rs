use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use lyacore::data::spectrum::Forest;
use lyacore::error::LyaError;
use lyacore::pk1d::pipeline::Pk1dResult;

/// One output record: the power spectrum of a single forest segment plus
/// the metadata of the spectrum it came from.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pk1dRecord {
    /// QSO's right ascension [degrees].
    pub ra: f64,
    /// QSO's declination [degrees].
    pub dec: f64,
    /// QSO's redshift.
    pub z_qso: f64,
    /// Absorbers mean redshift of the segment.
    pub mean_z: f64,
    /// Mean resolution [km/s].
    pub mean_reso: f64,
    /// Mean signal-to-noise ratio.
    pub mean_snr: f64,
    /// Number of masked pixels in the segment.
    pub num_masked_pixels: usize,
    pub plate: i64,
    pub mjd: i64,
    pub fiberid: i64,
    /// Base unit of the wavenumber axis: "AA" or "km/s" inverses.
    pub unit: String,
    pub k: Vec<f64>,
    pub pk_raw: Vec<f64>,
    pub pk_noise: Vec<f64>,
    pub pk_diff: Vec<f64>,
    pub correction_reso: Vec<f64>,
    pub pk: Vec<f64>,
}

impl Pk1dRecord {
    pub fn from_result(forest: &Forest, result: Pk1dResult, unit: &str) -> Self {
        Pk1dRecord {
            ra: forest.ra,
            dec: forest.dec,
            z_qso: forest.z_qso,
            mean_z: result.mean_z,
            mean_reso: forest.mean_reso,
            mean_snr: forest.mean_snr,
            num_masked_pixels: result.num_masked_pixels,
            plate: forest.plate,
            mjd: forest.mjd,
            fiberid: forest.fiberid,
            unit: unit.to_string(),
            k: result.k,
            pk_raw: result.pk_raw,
            pk_noise: result.pk_noise,
            pk_diff: result.pk_diff,
            correction_reso: result.correction_reso,
            pk: result.pk,
        }
    }
}

/// Writes one record per line as JSON. Records are grouped by spectrum in
/// catalogue order by construction; the writer is owned by the
/// orchestrating process, never by workers.
pub fn write_pk1d_file(path: &Path, records: &[Pk1dRecord]) -> Result<(), LyaError> {
    let mut writer = BufWriter::new(File::create(path)?);
    for record in records {
        let line = serde_json::to_string(record)
            .map_err(|error| LyaError::Data(format!("could not serialize record: {error}")))?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead;

    fn toy_record() -> Pk1dRecord {
        Pk1dRecord {
            ra: 150.1,
            dec: 2.2,
            z_qso: 2.8,
            mean_z: 2.05,
            mean_reso: 70.0,
            mean_snr: 5.0,
            num_masked_pixels: 3,
            plate: 1234,
            mjd: 55555,
            fiberid: 11,
            unit: "AA".to_string(),
            k: vec![0.0, 0.1],
            pk_raw: vec![1.0, 2.0],
            pk_noise: vec![0.0, 0.0],
            pk_diff: vec![0.5, 0.5],
            correction_reso: vec![1.0, 0.9],
            pk: vec![0.5, 1.5],
        }
    }

    #[test]
    fn test_write_and_reparse_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Pk1D-0.jsonl");
        write_pk1d_file(&path, &[toy_record(), toy_record()]).unwrap();

        let reader = std::io::BufReader::new(File::open(&path).unwrap());
        let lines: Vec<String> = reader.lines().map(|line| line.unwrap()).collect();
        assert_eq!(lines.len(), 2);
        let parsed: Pk1dRecord = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(parsed.unit, "AA");
        assert_eq!(parsed.k.len(), 2);
        assert_eq!(parsed.num_masked_pixels, 3);
    }
}

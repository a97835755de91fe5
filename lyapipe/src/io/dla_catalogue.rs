use std::path::Path;

use csv::ReaderBuilder;

use lyacore::error::LyaError;
use lyacore::masks::dla::{DlaCatalogue, DlaCatalogueEntry, RestFrameRange};

/// Column names accepted for the absorber redshift, in preference order.
const ACCEPTED_Z_COLUMNS: [&str; 2] = ["Z_DLA", "Z"];

fn column_index(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|column| column == name)
}

fn parse_field(record: &csv::StringRecord, index: usize, path: &Path) -> Result<f64, LyaError> {
    record
        .get(index)
        .and_then(|value| value.trim().parse::<f64>().ok())
        .ok_or_else(|| {
            LyaError::Data(format!(
                "unparseable numeric field in DLA catalogue {}",
                path.display()
            ))
        })
}

/// Reads a DLA catalogue from a CSV table with a header row.
///
/// The id column name is configurable (survey-specific); the redshift
/// column is `Z_DLA` when present, otherwise `Z`; the column density
/// column is `NHI` in log10(cm^-2). A missing required column is a fatal
/// data error.
pub fn read_dla_catalogue(path: &Path, los_id_column: &str) -> Result<DlaCatalogue, LyaError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|error| {
            LyaError::Data(format!(
                "could not open DLA catalogue {}: {error}",
                path.display()
            ))
        })?;

    let headers = reader
        .headers()
        .map_err(|error| LyaError::Data(format!("invalid catalogue header: {error}")))?
        .clone();

    let id_index = column_index(&headers, los_id_column).ok_or_else(|| {
        LyaError::Data(format!(
            "DLA catalogue {} does not have field '{los_id_column}'",
            path.display()
        ))
    })?;
    let z_index = ACCEPTED_Z_COLUMNS
        .iter()
        .find_map(|name| column_index(&headers, name))
        .ok_or_else(|| {
            LyaError::Data(format!(
                "DLA catalogue {} needs one of the columns {}",
                path.display(),
                ACCEPTED_Z_COLUMNS.join(", ")
            ))
        })?;
    let nhi_index = column_index(&headers, "NHI").ok_or_else(|| {
        LyaError::Data(format!(
            "DLA catalogue {} does not have field 'NHI'",
            path.display()
        ))
    })?;

    let mut entries = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|error| LyaError::Data(format!("invalid catalogue row: {error}")))?;
        let los_id = record
            .get(id_index)
            .and_then(|value| value.trim().parse::<i64>().ok())
            .ok_or_else(|| {
                LyaError::Data(format!(
                    "unparseable line-of-sight id in DLA catalogue {}",
                    path.display()
                ))
            })?;
        entries.push(DlaCatalogueEntry {
            los_id,
            z_abs: parse_field(&record, z_index, path)?,
            log_nhi: parse_field(&record, nhi_index, path)?,
        });
    }
    Ok(DlaCatalogue::from_entries(entries))
}

/// Reads the optional rest-frame exclusion file: CSV rows of
/// `type,wave_min,wave_max,frame`, keeping only the `RF_DLA` frame rows.
pub fn read_exclusion_file(path: &Path) -> Result<Vec<RestFrameRange>, LyaError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|error| {
            LyaError::Mask(format!(
                "error while reading mask file {}: {error}",
                path.display()
            ))
        })?;

    let headers = reader
        .headers()
        .map_err(|error| LyaError::Mask(format!("invalid mask file header: {error}")))?
        .clone();
    let wave_min_index = column_index(&headers, "wave_min");
    let wave_max_index = column_index(&headers, "wave_max");
    let frame_index = column_index(&headers, "frame");
    let (Some(wave_min_index), Some(wave_max_index), Some(frame_index)) =
        (wave_min_index, wave_max_index, frame_index)
    else {
        return Err(LyaError::Mask(format!(
            "mask file {} needs columns 'wave_min', 'wave_max' and 'frame'",
            path.display()
        )));
    };

    let mut ranges = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|error| LyaError::Mask(format!("invalid mask file row: {error}")))?;
        if record.get(frame_index) != Some("RF_DLA") {
            continue;
        }
        let wave_min = parse_field(&record, wave_min_index, path)
            .map_err(|_| LyaError::Mask(format!("unparseable range in {}", path.display())))?;
        let wave_max = parse_field(&record, wave_max_index, path)
            .map_err(|_| LyaError::Mask(format!("unparseable range in {}", path.display())))?;
        ranges.push(RestFrameRange { wave_min, wave_max });
    }
    Ok(ranges)
}

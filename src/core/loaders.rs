//! Loaders for scan CSV files.
//!
//! A scan is stored as three CSV files sharing a stem:
//! - `<stem>_entries.csv`: id, has_location, has_normal_spectra, has_dwell_spectra, has_pseudo_intensities
//! - `<stem>_beams.csv`: x, y, z (blank cells mark a missing beam location)
//! - `<stem>_coords.csv`: i, j (blank cells mark a missing image coordinate)
//!
//! Row counts are not reconciled here; the ingestor reports misaligned files.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use log::debug;
use regex::Regex;
use thiserror::Error;

use super::types::{BeamLocation, ImageCoord, ScanEntry, ScanInput};

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("Missing scan file: {0}")]
    MissingFile(PathBuf),

    #[error("Missing required columns in {path}: {columns}")]
    MissingColumns { path: PathBuf, columns: String },

    #[error("Parse error in {path}, row {row}: {message}")]
    ParseError {
        path: PathBuf,
        row: usize,
        message: String,
    },

    #[error("Invalid file name pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// The three files that make up one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPaths {
    pub entries: PathBuf,
    pub beams: PathBuf,
    pub coords: PathBuf,
}

impl ScanPaths {
    pub fn new(directory: &Path, stem: &str) -> Self {
        Self {
            entries: directory.join(format!("{}_entries.csv", stem)),
            beams: directory.join(format!("{}_beams.csv", stem)),
            coords: directory.join(format!("{}_coords.csv", stem)),
        }
    }
}

fn open_reader(path: &Path) -> Result<csv::Reader<BufReader<File>>> {
    if !path.exists() {
        return Err(LoaderError::MissingFile(path.to_path_buf()));
    }
    let file = File::open(path)?;
    Ok(ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file)))
}

/// Map lowercase header names to column indices, failing if any `required` is absent.
fn column_indices(
    reader: &mut csv::Reader<BufReader<File>>,
    path: &Path,
    required: &[&str],
) -> Result<Vec<usize>> {
    let headers = reader.headers()?.clone();
    let col_map: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| (name.to_lowercase(), i))
        .collect();

    let missing: Vec<&str> = required
        .iter()
        .filter(|name| !col_map.contains_key(**name))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(LoaderError::MissingColumns {
            path: path.to_path_buf(),
            columns: missing.join(", "),
        });
    }

    Ok(required.iter().filter_map(|name| col_map.get(*name).copied()).collect())
}

/// Optional float cell: blank or absent is `None`.
fn parse_f64(record: &StringRecord, idx: usize, path: &Path, row: usize) -> Result<Option<f64>> {
    match record.get(idx).map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(|_| LoaderError::ParseError {
            path: path.to_path_buf(),
            row,
            message: format!("'{}' is not a number", s),
        }),
    }
}

/// Boolean cell accepting true/false, yes/no and 1/0. Blank is `false`.
fn parse_bool(record: &StringRecord, idx: usize, path: &Path, row: usize) -> Result<bool> {
    match record.get(idx).map(|s| s.trim().to_lowercase()).as_deref() {
        None | Some("") | Some("false") | Some("no") | Some("0") => Ok(false),
        Some("true") | Some("yes") | Some("1") => Ok(true),
        Some(other) => Err(LoaderError::ParseError {
            path: path.to_path_buf(),
            row,
            message: format!("'{}' is not a boolean", other),
        }),
    }
}

/// Load scan entries.
///
/// # Errors
///
/// Fails for a missing file, missing columns, unparseable cells or an empty file.
pub fn load_entries_csv<P: AsRef<Path>>(path: P) -> Result<Vec<ScanEntry>> {
    let path = path.as_ref();
    let mut reader = open_reader(path)?;
    let cols = column_indices(
        &mut reader,
        path,
        &[
            "id",
            "has_location",
            "has_normal_spectra",
            "has_dwell_spectra",
            "has_pseudo_intensities",
        ],
    )?;

    let mut entries = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result?;
        let id = record
            .get(cols[0])
            .and_then(|s| s.trim().parse::<i32>().ok())
            .ok_or_else(|| LoaderError::ParseError {
                path: path.to_path_buf(),
                row,
                message: "missing or invalid id".to_string(),
            })?;

        entries.push(ScanEntry {
            id,
            has_location: parse_bool(&record, cols[1], path, row)?,
            has_normal_spectra: parse_bool(&record, cols[2], path, row)?,
            has_dwell_spectra: parse_bool(&record, cols[3], path, row)?,
            has_pseudo_intensities: parse_bool(&record, cols[4], path, row)?,
        });
    }

    if entries.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }
    Ok(entries)
}

/// Load beam locations. A row with any blank cell is a missing location.
pub fn load_beams_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Option<BeamLocation>>> {
    let path = path.as_ref();
    let mut reader = open_reader(path)?;
    let cols = column_indices(&mut reader, path, &["x", "y", "z"])?;

    let mut beams = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result?;
        let x = parse_f64(&record, cols[0], path, row)?;
        let y = parse_f64(&record, cols[1], path, row)?;
        let z = parse_f64(&record, cols[2], path, row)?;

        beams.push(match (x, y, z) {
            (Some(x), Some(y), Some(z)) => Some(BeamLocation::new(x, y, z)),
            _ => None,
        });
    }
    Ok(beams)
}

/// Load image coordinates. A row with any blank cell is a missing coordinate.
pub fn load_coords_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Option<ImageCoord>>> {
    let path = path.as_ref();
    let mut reader = open_reader(path)?;
    let cols = column_indices(&mut reader, path, &["i", "j"])?;

    let mut coords = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result?;
        let i = parse_f64(&record, cols[0], path, row)?;
        let j = parse_f64(&record, cols[1], path, row)?;

        coords.push(match (i, j) {
            (Some(i), Some(j)) => Some(ImageCoord::new(i, j)),
            _ => None,
        });
    }
    Ok(coords)
}

/// Load the three files of scan `stem` from `directory`.
pub fn load_scan(directory: &Path, stem: &str) -> Result<ScanInput> {
    let paths = ScanPaths::new(directory, stem);

    let entries = load_entries_csv(&paths.entries)?;
    let beams = load_beams_csv(&paths.beams)?;
    let coords = load_coords_csv(&paths.coords)?;

    debug!(
        "{}: loaded {} entries, {} beams, {} coords",
        stem,
        entries.len(),
        beams.len(),
        coords.len()
    );

    Ok(ScanInput::new(entries, beams, coords))
}

/// Discover scan stems in a directory from their `<stem>_entries.csv` files, sorted.
///
/// The suffix match is case-sensitive, matching the names `ScanPaths` rebuilds.
pub fn find_scan_stems(directory: &Path) -> Result<Vec<String>> {
    let pattern = Regex::new(r"^(.+)_entries\.csv$")?;

    let mut stems: Vec<String> = fs::read_dir(directory)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            pattern
                .captures(&name)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        })
        .collect();

    stems.sort();
    stems.dedup();
    Ok(stems)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn write_file(dir: &Path, name: &str, lines: &[&str]) {
        let mut file = File::create(dir.join(name)).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
    }

    #[test]
    fn test_load_entries_csv() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "id,has_location,has_normal_spectra,has_dwell_spectra,has_pseudo_intensities").unwrap();
        writeln!(file, "101,true,true,false,false").unwrap();
        writeln!(file, "102, 1, 0, 1, 0").unwrap();
        file.flush().unwrap();

        let entries = load_entries_csv(file.path())?;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], ScanEntry::located(101));
        assert_eq!(entries[1].id, 102);
        assert!(entries[1].has_location);
        assert!(!entries[1].has_normal_spectra);
        assert!(entries[1].has_dwell_spectra);

        Ok(())
    }

    #[test]
    fn test_load_beams_with_blank_cells() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "x,y,z").unwrap();
        writeln!(file, "1.0,2.0,3.0").unwrap();
        writeln!(file, ",,").unwrap();
        writeln!(file, "4.0,,6.0").unwrap();
        file.flush().unwrap();

        let beams = load_beams_csv(file.path())?;
        assert_eq!(beams.len(), 3);
        assert_eq!(beams[0], Some(BeamLocation::new(1.0, 2.0, 3.0)));
        assert!(beams[1].is_none());
        assert!(beams[2].is_none());

        Ok(())
    }

    #[test]
    fn test_load_coords_column_order() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "J,I").unwrap();
        writeln!(file, "20.5,10.25").unwrap();
        file.flush().unwrap();

        let coords = load_coords_csv(file.path())?;
        assert_eq!(coords, vec![Some(ImageCoord::new(10.25, 20.5))]);

        Ok(())
    }

    #[test]
    fn test_missing_columns() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "x,y").unwrap();
        writeln!(file, "1.0,2.0").unwrap();
        file.flush().unwrap();

        match load_beams_csv(file.path()) {
            Err(LoaderError::MissingColumns { columns, .. }) => assert_eq!(columns, "z"),
            other => panic!("Expected MissingColumns, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_number_is_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "i,j").unwrap();
        writeln!(file, "1.0,abc").unwrap();
        file.flush().unwrap();

        assert!(matches!(
            load_coords_csv(file.path()),
            Err(LoaderError::ParseError { row: 0, .. })
        ));
    }

    #[test]
    fn test_empty_entries_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "id,has_location,has_normal_spectra,has_dwell_spectra,has_pseudo_intensities").unwrap();
        file.flush().unwrap();

        assert!(matches!(
            load_entries_csv(file.path()),
            Err(LoaderError::EmptyFile(_))
        ));
    }

    #[test]
    fn test_load_scan_and_find_stems() -> Result<()> {
        let dir = tempdir().unwrap();
        let header = "id,has_location,has_normal_spectra,has_dwell_spectra,has_pseudo_intensities";
        write_file(dir.path(), "scan_b_entries.csv", &[header, "1,true,true,false,false"]);
        write_file(dir.path(), "scan_b_beams.csv", &["x,y,z", "0.1,0.2,5.0"]);
        write_file(dir.path(), "scan_b_coords.csv", &["i,j", "12,34"]);
        write_file(dir.path(), "scan_a_entries.csv", &[header, "7,true,true,false,false"]);
        write_file(dir.path(), "notes.csv", &["a,b"]);

        let stems = find_scan_stems(dir.path())?;
        assert_eq!(stems, vec!["scan_a".to_string(), "scan_b".to_string()]);

        let input = load_scan(dir.path(), "scan_b")?;
        assert_eq!(input.len(), 1);
        assert_eq!(input.coords[0], Some(ImageCoord::new(12.0, 34.0)));

        // scan_a has no beams file
        assert!(matches!(
            load_scan(dir.path(), "scan_a"),
            Err(LoaderError::MissingFile(_))
        ));

        Ok(())
    }

    #[test]
    fn test_find_scan_stems_only_lists_loadable_names() -> Result<()> {
        let dir = tempdir().unwrap();
        let header = "id,has_location,has_normal_spectra,has_dwell_spectra,has_pseudo_intensities";
        write_file(dir.path(), "SCAN_C_ENTRIES.csv", &[header, "1,true,true,false,false"]);
        write_file(dir.path(), "scan_d_entries.CSV", &[header, "2,true,true,false,false"]);
        write_file(dir.path(), "Scan_E_entries.csv", &[header, "3,true,true,false,false"]);
        write_file(dir.path(), "Scan_E_beams.csv", &["x,y,z", "0.1,0.2,5.0"]);
        write_file(dir.path(), "Scan_E_coords.csv", &["i,j", "5,6"]);

        let stems = find_scan_stems(dir.path())?;
        assert_eq!(stems, vec!["Scan_E".to_string()]);

        for stem in &stems {
            assert_eq!(load_scan(dir.path(), stem)?.len(), 1);
        }
        Ok(())
    }
}

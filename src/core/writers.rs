//! CSV writers for pipeline output.
//!
//! - Per-point polygons: one row per polygon vertex, `pmc,index,vertex,i,j`
//! - Cluster footprints: one row per footprint vertex, `cluster,vertex,i,j,normal_i,normal_j`

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use geo::Polygon;
use thiserror::Error;

use super::geom;
use super::types::ScanPoint;
use crate::processors::hull::HullPoint;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// Mismatched array lengths.
    #[error("array length mismatch: {points_len} points, {polygons_len} polygons")]
    LengthMismatch {
        points_len: usize,
        polygons_len: usize,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Creates a CSV writer over a buffered file, creating parent directories first.
fn create_csv_writer(path: &Path) -> Result<csv::Writer<BufWriter<File>>> {
    ensure_parent_dirs(path)?;
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(csv::Writer::from_writer(BufWriter::new(file)))
}

/// Write every drawable polygon, one row per vertex (closing vertex omitted).
///
/// Points without a polygon produce no rows.
///
/// # Errors
///
/// Returns an error if:
/// - `points` and `polygons` have different lengths
/// - Parent directories cannot be created
/// - File cannot be created or written to
pub fn write_polygons_csv(
    path: &Path,
    points: &[ScanPoint],
    polygons: &[Option<Polygon<f64>>],
) -> Result<()> {
    if points.len() != polygons.len() {
        return Err(WriteError::LengthMismatch {
            points_len: points.len(),
            polygons_len: polygons.len(),
        });
    }

    let mut csv_writer = create_csv_writer(path)?;
    let path_str = path.display().to_string();
    let csv_err = |e: csv::Error| WriteError::CsvError {
        path: path_str.clone(),
        source: e,
    };

    csv_writer
        .write_record(["pmc", "index", "vertex", "i", "j"])
        .map_err(csv_err)?;

    for (point, polygon) in points.iter().zip(polygons) {
        let Some(polygon) = polygon else {
            continue;
        };
        for (vertex, c) in geom::open_ring(polygon).iter().enumerate() {
            csv_writer
                .write_record(&[
                    point.pmc.to_string(),
                    point.index.to_string(),
                    vertex.to_string(),
                    format!("{:.4}", c.x),
                    format!("{:.4}", c.y),
                ])
                .map_err(csv_err)?;
        }
    }

    csv_writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str.clone(),
        source: e,
    })?;

    Ok(())
}

/// Write cluster footprints, one row per vertex. Missing normals are left blank.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written to.
pub fn write_footprint_csv<'a, I>(path: &Path, footprints: I) -> Result<()>
where
    I: IntoIterator<Item = &'a [HullPoint]>,
{
    let mut csv_writer = create_csv_writer(path)?;
    let path_str = path.display().to_string();
    let csv_err = |e: csv::Error| WriteError::CsvError {
        path: path_str.clone(),
        source: e,
    };

    csv_writer
        .write_record(["cluster", "vertex", "i", "j", "normal_i", "normal_j"])
        .map_err(csv_err)?;

    for (cluster, footprint) in footprints.into_iter().enumerate() {
        for (vertex, hp) in footprint.iter().enumerate() {
            let (ni, nj) = match hp.normal {
                Some(n) => (format!("{:.6}", n.x), format!("{:.6}", n.y)),
                None => (String::new(), String::new()),
            };
            csv_writer
                .write_record(&[
                    cluster.to_string(),
                    vertex.to_string(),
                    format!("{:.4}", hp.coord.x),
                    format!("{:.4}", hp.coord.y),
                    ni,
                    nj,
                ])
                .map_err(csv_err)?;
        }
    }

    csv_writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str.clone(),
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Coord;
    use tempfile::tempdir;

    fn point(pmc: i32, index: usize) -> ScanPoint {
        ScanPoint {
            pmc,
            coord: Some(Coord { x: 0.0, y: 0.0 }),
            index,
            has_dwell_spectra: false,
            has_missing_data: false,
            has_normal_or_pseudo_data: true,
        }
    }

    fn square() -> Polygon<f64> {
        geom::polygon_from_ring(&[
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 1.0, y: 0.0 },
            Coord { x: 1.0, y: 1.0 },
            Coord { x: 0.0, y: 1.0 },
        ])
    }

    #[test]
    fn test_write_polygons_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("polygons.csv");
        let points = vec![point(10, 0), point(11, 1)];
        let polygons = vec![Some(square()), None];

        write_polygons_csv(&path, &points, &polygons).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "pmc,index,vertex,i,j");
        assert_eq!(lines.len(), 5); // header + 4 vertices
        assert_eq!(lines[1], "10,0,0,0.0000,0.0000");
        assert!(lines.iter().skip(1).all(|l| l.starts_with("10,")));
    }

    #[test]
    fn test_write_polygons_csv_length_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("polygons.csv");

        let result = write_polygons_csv(&path, &[point(1, 0)], &[]);
        match result {
            Err(WriteError::LengthMismatch {
                points_len,
                polygons_len,
            }) => {
                assert_eq!(points_len, 1);
                assert_eq!(polygons_len, 0);
            }
            _ => panic!("Expected LengthMismatch error"),
        }
    }

    #[test]
    fn test_write_footprint_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("footprint.csv");

        let mut first = HullPoint::new(Coord { x: 1.0, y: 2.0 }, 0);
        first.normal = Some(Coord { x: 0.0, y: -1.0 });
        let second = HullPoint::new(Coord { x: 3.0, y: 4.0 }, 1);
        let footprints: Vec<Vec<HullPoint>> = vec![vec![first, second], vec![second]];

        write_footprint_csv(&path, footprints.iter().map(Vec::as_slice)).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "cluster,vertex,i,j,normal_i,normal_j");
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "0,0,1.0000,2.0000,0.000000,-1.000000");
        assert_eq!(lines[2], "0,1,3.0000,4.0000,,");
        assert!(lines[3].starts_with("1,0,"));
    }
}

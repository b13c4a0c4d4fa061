//! Entry ingestion: alignment checks, point arena, extents and unit detection.

use geo::Coord;
use log::{debug, info};
use thiserror::Error;

use crate::core::bounds::{BoundingBox, PhysicalBounds};
use crate::core::types::{InstrumentFamily, ScanInput, ScanPoint};

/// Structural input errors. These abort the whole pipeline run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error(
        "input arrays are not aligned: {entries} scan entries, {beams} beam locations, {coords} image coordinates"
    )]
    LengthMismatch {
        entries: usize,
        beams: usize,
        coords: usize,
    },

    #[error("no scan entry has a valid beam location and image coordinate")]
    NoLocationData,
}

/// Output of the ingestion stage.
#[derive(Debug, Clone)]
pub struct IngestedScan {
    /// One point per input entry, in entry order
    pub points: Vec<ScanPoint>,
    /// Physical extents of valid beam locations (instrument units)
    pub physical_bounds: PhysicalBounds,
    /// Extents of valid image coordinates, rounded to whole pixels
    pub pixel_bounds: BoundingBox,
    /// Whether physical units were judged to be meters
    pub beam_units_in_meters: bool,
    /// Number of points with a valid coordinate
    pub located_count: usize,
}

impl IngestedScan {
    /// Indices of points that carry an image coordinate.
    pub fn located_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.points
            .iter()
            .filter(|p| p.coord.is_some())
            .map(|p| p.index)
    }
}

/// Validate and ingest the three aligned input arrays.
///
/// Entries lacking a location, a finite beam XYZ or a finite image IJ keep their
/// index slot with `coord = None` and are left out of every extent.
///
/// # Errors
///
/// `LengthMismatch` when the arrays differ in length, `NoLocationData` when no
/// entry survives validation.
pub fn ingest(input: &ScanInput, family: InstrumentFamily) -> Result<IngestedScan, IngestError> {
    let n = input.entries.len();
    if input.beams.len() != n || input.coords.len() != n {
        return Err(IngestError::LengthMismatch {
            entries: n,
            beams: input.beams.len(),
            coords: input.coords.len(),
        });
    }

    let mut points = Vec::with_capacity(n);
    let mut physical_bounds = PhysicalBounds::empty();
    let mut pixel_bounds = BoundingBox::empty();
    let mut located_count = 0usize;
    let mut non_finite = 0usize;

    for (index, ((entry, beam), coord)) in input
        .entries
        .iter()
        .zip(input.beams.iter())
        .zip(input.coords.iter())
        .enumerate()
    {
        let located = match (entry.has_location, beam, coord) {
            (true, Some(beam), Some(ij)) => {
                if beam.is_finite() && ij.is_finite() {
                    physical_bounds.expand_to_fit([beam.x, beam.y, beam.z]);
                    pixel_bounds.expand_to_fit(Coord {
                        x: ij.i.round(),
                        y: ij.j.round(),
                    });
                    Some(Coord { x: ij.i, y: ij.j })
                } else {
                    non_finite += 1;
                    None
                }
            }
            _ => None,
        };

        if located.is_some() {
            located_count += 1;
        }

        points.push(ScanPoint {
            pmc: entry.id,
            coord: located,
            index,
            has_dwell_spectra: entry.has_dwell_spectra,
            has_missing_data: located.is_none(),
            has_normal_or_pseudo_data: entry.has_normal_spectra || entry.has_pseudo_intensities,
        });
    }

    if non_finite > 0 {
        debug!("{} entries dropped for non-finite coordinates", non_finite);
    }

    if located_count == 0 {
        return Err(IngestError::NoLocationData);
    }

    let beam_units_in_meters = family.may_report_meters() && physical_bounds.max_z() < 1.0;

    info!(
        "ingested {} entries ({} located), beam units: {}",
        n,
        located_count,
        if beam_units_in_meters { "m" } else { "mm" }
    );

    Ok(IngestedScan {
        points,
        physical_bounds,
        pixel_bounds,
        beam_units_in_meters,
        located_count,
    })
}

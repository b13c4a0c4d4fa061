//! Input records delivered by the data layer and the per-point arena built from them.

use geo::Coord;
use serde::{Deserialize, Serialize};

/// Instrument families known to the pipeline.
///
/// Flight and engineering-model PIXL data sometimes reports beam locations in
/// meters; the ingestor only applies the meters heuristic to those families.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentFamily {
    #[default]
    PixlFm,
    PixlEm,
    Breadboard,
    Unknown,
}

impl InstrumentFamily {
    /// Whether beam units for this family may be meters rather than millimeters.
    #[inline]
    pub fn may_report_meters(self) -> bool {
        matches!(self, InstrumentFamily::PixlFm | InstrumentFamily::PixlEm)
    }
}

/// One scan entry as delivered by the data layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEntry {
    /// Entry identifier (PMC)
    pub id: i32,
    #[serde(default)]
    pub has_location: bool,
    #[serde(default)]
    pub has_normal_spectra: bool,
    #[serde(default)]
    pub has_dwell_spectra: bool,
    #[serde(default)]
    pub has_pseudo_intensities: bool,
}

impl ScanEntry {
    /// Create an entry with a location and normal spectra, the common case.
    pub fn located(id: i32) -> Self {
        Self {
            id,
            has_location: true,
            has_normal_spectra: true,
            has_dwell_spectra: false,
            has_pseudo_intensities: false,
        }
    }
}

/// Physical beam location (instrument units, mm or m).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeamLocation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl BeamLocation {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Image-space coordinate of a beam (pixels).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageCoord {
    pub i: f64,
    pub j: f64,
}

impl ImageCoord {
    pub fn new(i: f64, j: f64) -> Self {
        Self { i, j }
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.i.is_finite() && self.j.is_finite()
    }
}

/// The three index-aligned arrays a pipeline run consumes.
#[derive(Debug, Clone, Default)]
pub struct ScanInput {
    pub entries: Vec<ScanEntry>,
    pub beams: Vec<Option<BeamLocation>>,
    pub coords: Vec<Option<ImageCoord>>,
}

impl ScanInput {
    pub fn new(
        entries: Vec<ScanEntry>,
        beams: Vec<Option<BeamLocation>>,
        coords: Vec<Option<ImageCoord>>,
    ) -> Self {
        Self {
            entries,
            beams,
            coords,
        }
    }

    /// Build an input where every entry is located, from (x, y, z, i, j) rows.
    pub fn from_rows(rows: &[(f64, f64, f64, f64, f64)]) -> Self {
        let mut input = Self::default();
        for (idx, &(x, y, z, i, j)) in rows.iter().enumerate() {
            input.entries.push(ScanEntry::located(idx as i32));
            input.beams.push(Some(BeamLocation::new(x, y, z)));
            input.coords.push(Some(ImageCoord::new(i, j)));
        }
        input
    }

    /// Number of entries (the reference length for alignment checks).
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One scan point in the ingested arena.
///
/// `index` is the position in the original entry order and stays a stable
/// reference for clusters, hulls and polygons.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanPoint {
    pub pmc: i32,
    /// Image-space coordinate, `None` when the entry has no usable beam data
    pub coord: Option<Coord<f64>>,
    pub index: usize,
    pub has_dwell_spectra: bool,
    pub has_missing_data: bool,
    pub has_normal_or_pseudo_data: bool,
}

impl ScanPoint {
    /// Whether the point carries any spectrum worth drawing a region for.
    #[inline]
    pub fn has_spectra(&self) -> bool {
        self.has_normal_or_pseudo_data || self.has_dwell_spectra
    }
}

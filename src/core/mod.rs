//! Core data types, geometry helpers and I/O operations.

pub mod bounds;
pub mod geom;
pub mod loaders;
pub mod types;
pub mod writers;

pub use bounds::{BoundingBox, PhysicalBounds};
pub use loaders::{find_scan_stems, load_scan, LoaderError};
pub use types::{BeamLocation, ImageCoord, InstrumentFamily, ScanEntry, ScanInput, ScanPoint};
pub use writers::{write_footprint_csv, write_polygons_csv, WriteError};

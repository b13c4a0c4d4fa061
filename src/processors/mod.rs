//! Pipeline stages.

pub mod angle;
pub mod clustering;
pub mod draw_model;
pub mod hull;
pub mod ingest;
pub mod scale;
pub mod spacing;
pub mod voronoi;

// Re-export key types for convenience
pub use clustering::{build_clusters, ClusterSet, PointCluster};
pub use draw_model::{build_draw_model, build_draw_model_seeded, PipelineError, ScanDrawModel};
pub use hull::HullPoint;
pub use ingest::{ingest, IngestError, IngestedScan};
pub use scale::{calibrate, ScaleCalibration, ScaleError};
pub use spacing::SpacingEstimate;
pub use voronoi::{clip_cell, ClipError, ClipResult};

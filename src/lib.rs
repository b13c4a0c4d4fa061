//! Scan footprint pipeline for rastered spectrometer scans.
//!
//! This crate turns the beam locations of a scan into drawable geometry:
//! - Loading scan entry, beam location and image coordinate CSV files
//! - Estimating point spacing with a k-d tree
//! - Splitting the scan path into clusters and fattening their convex hulls
//! - Clipping a Voronoi cell per point to its cluster footprint
//! - Calibrating millimetres per pixel
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use scan_footprint::{build_draw_model_seeded, core::loaders::load_scan, PipelineConfig};
//!
//! let input = load_scan(Path::new("data"), "scan_001").unwrap();
//! let model = build_draw_model_seeded(&input, &PipelineConfig::default()).unwrap();
//! println!("{} drawable points", model.drawable_count());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use config::{ClusteringConfig, PipelineConfig, SpacingConfig, VoronoiConfig};
pub use core::types::ScanInput;
pub use processors::draw_model::{build_draw_model, build_draw_model_seeded, PipelineError, ScanDrawModel};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Configuration types for the scan geometry pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::types::InstrumentFamily;

/// Detector/instrument parameters supplied alongside the scan data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// Physical beam radius in millimeters
    #[serde(default = "default_beam_radius_mm")]
    pub beam_radius_mm: f64,

    /// Instrument family, drives the meters/millimeters heuristic
    #[serde(default)]
    pub family: InstrumentFamily,
}

fn default_beam_radius_mm() -> f64 {
    0.06
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            beam_radius_mm: default_beam_radius_mm(),
            family: InstrumentFamily::default(),
        }
    }
}

/// Configuration for the point spacing estimator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpacingConfig {
    /// Maximum number of points sampled for nearest-neighbour distances
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,

    /// Search box half-size as a fraction of the mean image extent
    #[serde(default = "default_search_box_fraction")]
    pub search_box_fraction: f64,

    /// Multiplier applied to the mean neighbour distance
    #[serde(default = "default_radius_inflation")]
    pub radius_inflation: f64,

    /// Radius used when no neighbour could be found
    #[serde(default = "default_radius")]
    pub default_radius: f64,

    /// Seed for the sampling RNG
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_max_samples() -> usize {
    100
}

fn default_search_box_fraction() -> f64 {
    0.1
}

fn default_radius_inflation() -> f64 {
    1.1
}

fn default_radius() -> f64 {
    1.0
}

fn default_seed() -> u64 {
    42
}

impl Default for SpacingConfig {
    fn default() -> Self {
        Self {
            max_samples: default_max_samples(),
            search_box_fraction: default_search_box_fraction(),
            radius_inflation: default_radius_inflation(),
            default_radius: default_radius(),
            seed: default_seed(),
        }
    }
}

/// Configuration for the acquisition-order clusterer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// A jump longer than this multiple of the running mean starts a new cluster
    #[serde(default = "default_break_factor")]
    pub break_factor: f64,

    /// Cosine tolerance for treating all break directions as identical
    #[serde(default = "default_direction_tolerance")]
    pub direction_tolerance: f64,
}

fn default_break_factor() -> f64 {
    10.0
}

fn default_direction_tolerance() -> f64 {
    0.001
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            break_factor: default_break_factor(),
            direction_tolerance: default_direction_tolerance(),
        }
    }
}

/// Configuration for rotation angle estimation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AngleConfig {
    /// Angles within this many degrees of an image axis snap to zero
    #[serde(default = "default_snap_tolerance_deg")]
    pub snap_tolerance_deg: f64,

    /// Direction change (degrees) above which a point counts as a turn
    #[serde(default = "default_turn_threshold_deg")]
    pub turn_threshold_deg: f64,
}

fn default_snap_tolerance_deg() -> f64 {
    5.0
}

fn default_turn_threshold_deg() -> f64 {
    60.0
}

impl Default for AngleConfig {
    fn default() -> Self {
        Self {
            snap_tolerance_deg: default_snap_tolerance_deg(),
            turn_threshold_deg: default_turn_threshold_deg(),
        }
    }
}

/// Configuration for Voronoi cell generation and clipping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoronoiConfig {
    /// Padding added around the cluster extents before building cells
    #[serde(default = "default_box_margin")]
    pub box_margin: f64,

    /// Scale applied to half the cluster spacing for the per-point clip box
    #[serde(default = "default_local_box_scale")]
    pub local_box_scale: f64,
}

fn default_box_margin() -> f64 {
    50.0
}

fn default_local_box_scale() -> f64 {
    1.25
}

impl Default for VoronoiConfig {
    fn default() -> Self {
        Self {
            box_margin: default_box_margin(),
            local_box_scale: default_local_box_scale(),
        }
    }
}

/// Configuration for the physical/pixel scale calibration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaleConfig {
    /// mm/pixel used when either extent is zero (single point, single line)
    #[serde(default = "default_fallback_mm_per_pixel")]
    pub fallback_mm_per_pixel: f64,
}

fn default_fallback_mm_per_pixel() -> f64 {
    1.0
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            fallback_mm_per_pixel: default_fallback_mm_per_pixel(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub instrument: InstrumentConfig,

    #[serde(default)]
    pub spacing: SpacingConfig,

    #[serde(default)]
    pub clustering: ClusteringConfig,

    #[serde(default)]
    pub angle: AngleConfig,

    #[serde(default)]
    pub voronoi: VoronoiConfig,

    #[serde(default)]
    pub scale: ScaleConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

//! Pipeline composition: scan input in, `ScanDrawModel` out.
//!
//! Every stage returns a value consumed by the next one:
//! 1. Ingest (alignment, extents, units)
//! 2. Spacing estimate (display radius) and minimum physical spacing
//! 3. Clusters with hulls, angles and footprints
//! 4. Clipped Voronoi polygon per point
//! 5. Scale calibration

use geo::{BooleanOps, MultiPolygon, Polygon};
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::core::bounds::{BoundingBox, PhysicalBounds};
use crate::core::types::{ScanInput, ScanPoint};
use crate::processors::clustering::{build_clusters, PointCluster};
use crate::processors::hull::{hull_polygon, HullPoint};
use crate::processors::ingest::{ingest, IngestError};
use crate::processors::scale::{calibrate, ScaleError};
use crate::processors::spacing::{estimate_point_radius, min_xy_spacing_mm, SpacingEstimate};
use crate::processors::voronoi::cluster_polygons;

/// Failures that abort a pipeline run. No partial model is produced.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Scale(#[from] ScaleError),
}

/// Everything the renderer needs to draw one scan over its context image.
#[derive(Debug, Clone)]
pub struct ScanDrawModel {
    pub points: Vec<ScanPoint>,
    /// Per-point polygon, index-aligned with `points`; `None` is not drawable
    pub polygons: Vec<Option<Polygon<f64>>>,
    pub clusters: Vec<PointCluster>,
    /// Rotation of the largest cluster, radians
    pub angle_rad: f64,
    pub mm_per_pixel: f64,
    /// Display radius of a point, pixels
    pub point_radius_px: f64,
    /// Beam radius, pixels
    pub beam_radius_px: f64,
    pub spacing: SpacingEstimate,
    pub physical_bounds: PhysicalBounds,
    pub pixel_bounds: BoundingBox,
    pub beam_units_in_meters: bool,
    pub min_xy_spacing_mm: Option<f64>,
    pub break_cosines: Vec<f64>,
    pub z_pattern_merged: bool,
}

impl ScanDrawModel {
    /// Fattened footprint of each cluster.
    pub fn footprints(&self) -> impl Iterator<Item = &[HullPoint]> + '_ {
        self.clusters.iter().map(|c| c.footprint.as_slice())
    }

    /// Union of all cluster footprints. Degenerate footprints are skipped.
    pub fn footprint_polygon(&self) -> MultiPolygon<f64> {
        self.clusters
            .iter()
            .filter_map(|c| hull_polygon(&c.footprint))
            .fold(MultiPolygon::new(Vec::new()), |acc, polygon| {
                acc.union(&MultiPolygon::new(vec![polygon]))
            })
    }

    /// Number of points that received a polygon.
    pub fn drawable_count(&self) -> usize {
        self.polygons.iter().filter(|p| p.is_some()).count()
    }

    pub fn polygon_for(&self, index: usize) -> Option<&Polygon<f64>> {
        self.polygons.get(index).and_then(Option::as_ref)
    }
}

/// Run the whole geometry pipeline with an injected random source.
///
/// # Errors
///
/// `PipelineError::Ingest` for misaligned inputs or no located point,
/// `PipelineError::Scale` when no finite unit conversion exists.
pub fn build_draw_model<R: Rng + ?Sized>(
    input: &ScanInput,
    config: &PipelineConfig,
    rng: &mut R,
) -> Result<ScanDrawModel, PipelineError> {
    let scan = ingest(input, config.instrument.family)?;

    let spacing = estimate_point_radius(&scan.points, &scan.pixel_bounds, &config.spacing, rng);
    let min_xy_spacing_mm = min_xy_spacing_mm(&scan.points, &input.beams, scan.beam_units_in_meters);

    let cluster_set = build_clusters(&scan.points, config);

    let mut polygons: Vec<Option<Polygon<f64>>> = vec![None; scan.points.len()];
    for cluster in &cluster_set.clusters {
        let cell_polygons = cluster_polygons(&scan.points, cluster, config);
        for (&idx, polygon) in cluster.point_indices.iter().zip(cell_polygons) {
            polygons[idx] = polygon;
        }
    }

    let calibration = calibrate(
        &scan.physical_bounds,
        &scan.pixel_bounds,
        scan.beam_units_in_meters,
        config.instrument.beam_radius_mm,
        &config.scale,
    )?;

    let angle_rad = cluster_set.largest().map_or(0.0, |c| c.angle_rad);

    let model = ScanDrawModel {
        points: scan.points,
        polygons,
        clusters: cluster_set.clusters,
        angle_rad,
        mm_per_pixel: calibration.mm_per_pixel,
        point_radius_px: spacing.point_radius,
        beam_radius_px: calibration.beam_radius_px,
        spacing,
        physical_bounds: scan.physical_bounds,
        pixel_bounds: scan.pixel_bounds,
        beam_units_in_meters: scan.beam_units_in_meters,
        min_xy_spacing_mm,
        break_cosines: cluster_set.break_cosines,
        z_pattern_merged: cluster_set.z_pattern_merged,
    };

    info!(
        "draw model: {} points, {} drawable, {} clusters, angle {:.2} deg, {:.5} mm/px",
        model.points.len(),
        model.drawable_count(),
        model.clusters.len(),
        model.angle_rad.to_degrees(),
        model.mm_per_pixel
    );

    Ok(model)
}

/// Run the pipeline with a `StdRng` seeded from `config.spacing.seed`.
pub fn build_draw_model_seeded(
    input: &ScanInput,
    config: &PipelineConfig,
) -> Result<ScanDrawModel, PipelineError> {
    let mut rng = StdRng::seed_from_u64(config.spacing.seed);
    build_draw_model(input, config, &mut rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geom;
    use crate::processors::hull::hull_area;
    use geo::Area;

    fn rows(coords: &[(f64, f64)]) -> ScanInput {
        let rows: Vec<(f64, f64, f64, f64, f64)> = coords
            .iter()
            .map(|&(i, j)| (i * 0.01, j * 0.01, 5.0, i, j))
            .collect();
        ScanInput::from_rows(&rows)
    }

    #[test]
    fn test_scenario_a_right_triangle() {
        let input = rows(&[(0.0, 0.0), (4.0, 0.0), (0.0, 3.0)]);
        let model = build_draw_model_seeded(&input, &PipelineConfig::default()).unwrap();

        assert_eq!(model.clusters.len(), 1);
        let hull = &model.clusters[0].hull;
        assert_eq!(hull.len(), 3);

        let ring: Vec<_> = hull.iter().map(|hp| hp.coord).collect();
        assert!(geom::signed_area(&ring) > 0.0);
        let mut idx: Vec<usize> = hull.iter().map(|hp| hp.point_idx).collect();
        idx.sort_unstable();
        assert_eq!(idx, vec![0, 1, 2]);
    }

    #[test]
    fn test_scenario_b_single_point() {
        let input = rows(&[(50.0, 60.0)]);
        let model = build_draw_model_seeded(&input, &PipelineConfig::default()).unwrap();

        assert_eq!(model.point_radius_px, 1.0);
        assert_eq!(model.clusters.len(), 1);
        assert_eq!(hull_area(&model.clusters[0].hull), 0.0);
        assert_eq!(model.angle_rad, 0.0);
        assert!(model.mm_per_pixel.is_finite() && model.mm_per_pixel > 0.0);
        assert_eq!(model.polygons, vec![None]);
    }

    #[test]
    fn test_scenario_c_two_clusters() {
        let mut coords: Vec<(f64, f64)> = (0..12).map(|k| (k as f64 * 2.0, 10.0)).collect();
        coords.extend((0..12).map(|k| (300.0 + k as f64 * 2.0, 220.0)));
        let model = build_draw_model_seeded(&rows(&coords), &PipelineConfig::default()).unwrap();

        assert_eq!(model.break_cosines.len(), 1);
        assert!(!model.z_pattern_merged);
        assert_eq!(model.clusters.len(), 2);

        // Footprints of the two clusters do not overlap
        let union = model.footprint_polygon();
        assert_eq!(union.0.len(), 2);
    }

    #[test]
    fn test_scenario_d_short_beam_array() {
        let mut input = rows(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);
        input.beams.truncate(2);

        let err = build_draw_model_seeded(&input, &PipelineConfig::default()).unwrap_err();
        assert_eq!(
            err,
            PipelineError::Ingest(IngestError::LengthMismatch {
                entries: 3,
                beams: 2,
                coords: 3
            })
        );
    }

    #[test]
    fn test_pipeline_is_idempotent() {
        let coords: Vec<(f64, f64)> = (0..80)
            .map(|k| ((k % 10) as f64 * 4.0 + (k / 10) as f64 * 0.3, (k / 10) as f64 * 4.0))
            .collect();
        let input = rows(&coords);
        let config = PipelineConfig::default();

        let a = build_draw_model_seeded(&input, &config).unwrap();
        let b = build_draw_model_seeded(&input, &config).unwrap();

        assert_eq!(a.polygons, b.polygons);
        assert_eq!(a.clusters, b.clusters);
        assert_eq!(a.point_radius_px, b.point_radius_px);
        assert_eq!(a.angle_rad, b.angle_rad);
    }

    #[test]
    fn test_polygons_align_with_points() {
        let mut input = rows(&[(0.0, 0.0), (10.0, 0.0), (20.0, 0.0), (0.0, 10.0), (10.0, 10.0)]);
        input.entries[2].has_location = false;

        let model = build_draw_model_seeded(&input, &PipelineConfig::default()).unwrap();

        assert_eq!(model.polygons.len(), model.points.len());
        assert!(model.points[2].coord.is_none());
        assert!(model.polygon_for(2).is_none());
        assert!(model.polygon_for(0).is_some());
    }

    #[test]
    fn test_footprint_union_covers_drawable_area() {
        let coords: Vec<(f64, f64)> = (0..30)
            .map(|k| ((k % 6) as f64 * 5.0, (k / 6) as f64 * 5.0))
            .collect();
        let model = build_draw_model_seeded(&rows(&coords), &PipelineConfig::default()).unwrap();

        let footprint_area = model.footprint_polygon().unsigned_area();
        let polygon_area: f64 = model
            .polygons
            .iter()
            .flatten()
            .map(|p| p.unsigned_area())
            .sum();

        assert!(polygon_area > 0.0);
        assert!(polygon_area <= footprint_area + 1e-6);
    }

    #[test]
    fn test_beam_radius_round_trip() {
        let coords: Vec<(f64, f64)> = (0..20).map(|k| ((k % 5) as f64 * 8.0, (k / 5) as f64 * 6.0)).collect();
        let config = PipelineConfig::default();
        let model = build_draw_model_seeded(&rows(&coords), &config).unwrap();

        assert!((model.beam_radius_px * model.mm_per_pixel - config.instrument.beam_radius_mm).abs() < 1e-12);
    }
}

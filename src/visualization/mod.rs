//! PNG rendering of a draw model.
//!
//! Draws the per-point polygons coloured by cluster, the footprint outline of
//! every cluster and a marker per located point, in image coordinates (J grows
//! downwards).

use std::path::Path;

use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::core::geom;
use crate::processors::draw_model::ScanDrawModel;

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("Draw model has no located points")]
    EmptyModel,
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Default plot width in pixels.
pub const DEFAULT_WIDTH: u32 = 1600;

/// Default plot height in pixels.
pub const DEFAULT_HEIGHT: u32 = 1200;

/// Color palette for cluster visualization.
const CLUSTER_COLORS: &[(u8, u8, u8)] = &[
    (228, 26, 28),   // Red
    (55, 126, 184),  // Blue
    (77, 175, 74),   // Green
    (152, 78, 163),  // Purple
    (255, 127, 0),   // Orange
    (166, 86, 40),   // Brown
    (247, 129, 191), // Pink
    (0, 206, 209),   // Turquoise
];

/// Marker color for points that did not get a polygon.
const UNDRAWN_COLOR: (u8, u8, u8) = (128, 128, 128);

fn cluster_color(cluster: usize) -> RGBColor {
    let c = CLUSTER_COLORS[cluster % CLUSTER_COLORS.len()];
    RGBColor(c.0, c.1, c.2)
}

fn plot_err<E: std::fmt::Display>(e: E) -> VisualizationError {
    VisualizationError::PlottingError(e.to_string())
}

/// Plot range covering the pixel bounds, padded by 5% (at least a few pixels).
fn plot_ranges(model: &ScanDrawModel) -> ((f64, f64), (f64, f64)) {
    let bounds = &model.pixel_bounds;
    let pad_x = (bounds.width() * 0.05).max(model.point_radius_px * 4.0).max(2.0);
    let pad_y = (bounds.height() * 0.05).max(model.point_radius_px * 4.0).max(2.0);
    (
        (bounds.min.x - pad_x, bounds.max.x + pad_x),
        (bounds.min.y - pad_y, bounds.max.y + pad_y),
    )
}

/// Render `model` to a PNG at `output_path`.
///
/// # Errors
///
/// `EmptyModel` when no point is located, `PlottingError` for backend failures.
pub fn plot_draw_model(
    output_path: &Path,
    model: &ScanDrawModel,
    width: u32,
    height: u32,
) -> Result<()> {
    if model.pixel_bounds.is_empty() {
        return Err(VisualizationError::EmptyModel);
    }

    let ((x_min, x_max), (y_min, y_max)) = plot_ranges(model);

    let root = BitMapBackend::new(output_path, (width, height)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    // Image J axis points down, so the Y range is reversed
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .build_cartesian_2d(x_min..x_max, y_max..y_min)
        .map_err(plot_err)?;

    // Per-point polygons, filled with their cluster's colour
    for (cluster_idx, cluster) in model.clusters.iter().enumerate() {
        let color = cluster_color(cluster_idx);
        let polygons = cluster
            .point_indices
            .iter()
            .filter_map(|&idx| model.polygon_for(idx))
            .map(|polygon| {
                geom::open_ring(polygon)
                    .iter()
                    .map(|c| (c.x, c.y))
                    .collect::<Vec<_>>()
            });

        chart
            .draw_series(
                polygons
                    .clone()
                    .map(|ring| Polygon::new(ring, color.mix(0.35).filled())),
            )
            .map_err(plot_err)?;
        chart
            .draw_series(polygons.map(|mut ring| {
                if let Some(&first) = ring.first() {
                    ring.push(first);
                }
                PathElement::new(ring, color.stroke_width(1))
            }))
            .map_err(plot_err)?;
    }

    // Footprint outlines
    for (cluster_idx, footprint) in model.footprints().enumerate() {
        let mut ring: Vec<(f64, f64)> = footprint.iter().map(|hp| (hp.coord.x, hp.coord.y)).collect();
        if let Some(&first) = ring.first() {
            ring.push(first);
        }
        chart
            .draw_series(std::iter::once(PathElement::new(
                ring,
                cluster_color(cluster_idx).stroke_width(2),
            )))
            .map_err(plot_err)?;
    }

    // Point markers
    let undrawn = RGBColor(UNDRAWN_COLOR.0, UNDRAWN_COLOR.1, UNDRAWN_COLOR.2);
    chart
        .draw_series(model.points.iter().filter_map(|p| {
            let c = p.coord?;
            let style = if model.polygon_for(p.index).is_some() {
                BLACK.filled()
            } else {
                undrawn.filled()
            };
            Some(Circle::new((c.x, c.y), 2, style))
        }))
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::core::types::ScanInput;
    use crate::processors::draw_model::build_draw_model_seeded;
    use tempfile::tempdir;

    #[test]
    fn test_plot_draw_model_writes_png() {
        let rows: Vec<(f64, f64, f64, f64, f64)> = (0..24)
            .map(|k| {
                let i = (k % 6) as f64 * 12.0;
                let j = (k / 6) as f64 * 12.0;
                (i * 0.01, j * 0.01, 5.0, i, j)
            })
            .collect();
        let model = build_draw_model_seeded(&ScanInput::from_rows(&rows), &PipelineConfig::default())
            .unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("model.png");
        plot_draw_model(&path, &model, 320, 240).unwrap();

        assert!(path.exists());
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }
}

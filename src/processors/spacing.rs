//! Representative point spacing from sampled nearest-neighbour distances.
//!
//! The estimate drives the display radius of each point. It deliberately does
//! not look at every pair:
//! - At most `max_samples` located points are drawn (without replacement)
//! - Each sample looks for its nearest neighbour inside a square search box
//!   using a `kiddo` KD-tree, so the cost is bounded for very large scans

use geo::Coord;
use kiddo::{ImmutableKdTree, SquaredEuclidean};
use log::debug;
use rand::Rng;

use crate::config::SpacingConfig;
use crate::core::bounds::BoundingBox;
use crate::core::types::{BeamLocation, ScanPoint};

/// Result of the spacing estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpacingEstimate {
    /// Display radius for a point, in pixels
    pub point_radius: f64,
    /// Mean nearest-neighbour distance over samples that found one
    pub mean_neighbour_distance: Option<f64>,
    /// Number of samples drawn
    pub samples: usize,
    /// Number of samples that found a neighbour inside their search box
    pub samples_with_neighbour: usize,
}

/// Estimate the display point radius from sampled nearest-neighbour distances.
///
/// The search box half-size is `search_box_fraction` of the mean of the pixel
/// bounding box width and height. Coincident neighbours are ignored. When no
/// sample finds a neighbour the radius falls back to `default_radius`.
pub fn estimate_point_radius<R: Rng + ?Sized>(
    points: &[ScanPoint],
    pixel_bounds: &BoundingBox,
    config: &SpacingConfig,
    rng: &mut R,
) -> SpacingEstimate {
    let located: Vec<[f64; 2]> = points
        .iter()
        .filter_map(|p| p.coord)
        .map(|c| [c.x, c.y])
        .collect();

    let fallback = SpacingEstimate {
        point_radius: config.default_radius,
        mean_neighbour_distance: None,
        samples: 0,
        samples_with_neighbour: 0,
    };

    if located.len() < 2 {
        debug!("spacing: fewer than 2 located points, using default radius");
        return fallback;
    }

    let half_box =
        config.search_box_fraction * (pixel_bounds.width() + pixel_bounds.height()) * 0.5;
    if !(half_box > 0.0) {
        debug!("spacing: degenerate search box, using default radius");
        return fallback;
    }

    let tree: ImmutableKdTree<f64, 2> = ImmutableKdTree::new_from_slice(&located);

    // Circle enclosing the search box; results are filtered back to the box
    let radius_sq = 2.0 * half_box * half_box;

    let amount = config.max_samples.min(located.len());
    let sampled = rand::seq::index::sample(rng, located.len(), amount);

    let mut total = 0.0;
    let mut found = 0usize;

    for sample_idx in sampled.iter() {
        let query = located[sample_idx];

        let nearest_sq = tree
            .within::<SquaredEuclidean>(&query, radius_sq)
            .iter()
            .filter(|nn| nn.item as usize != sample_idx && nn.distance > 0.0)
            .filter(|nn| {
                let other = located[nn.item as usize];
                (other[0] - query[0]).abs() <= half_box && (other[1] - query[1]).abs() <= half_box
            })
            .map(|nn| nn.distance)
            .fold(f64::INFINITY, f64::min);

        if nearest_sq.is_finite() {
            total += nearest_sq.sqrt();
            found += 1;
        }
    }

    if found == 0 {
        debug!("spacing: no sample found a neighbour, using default radius");
        return SpacingEstimate {
            samples: amount,
            ..fallback
        };
    }

    let mean = total / found as f64;
    SpacingEstimate {
        point_radius: mean * config.radius_inflation,
        mean_neighbour_distance: Some(mean),
        samples: amount,
        samples_with_neighbour: found,
    }
}

/// Smallest physical XY distance between two points that both carry spectra.
///
/// `beams` must be index-aligned with `points`. Coincident locations are
/// ignored. The result is converted to millimeters when `in_meters` is set.
/// Returns `None` with fewer than two distinct qualifying points.
pub fn min_xy_spacing_mm(
    points: &[ScanPoint],
    beams: &[Option<BeamLocation>],
    in_meters: bool,
) -> Option<f64> {
    let mut xy: Vec<Coord<f64>> = points
        .iter()
        .zip(beams.iter())
        .filter(|(p, _)| p.coord.is_some() && p.has_spectra())
        .filter_map(|(_, beam)| beam.as_ref())
        .map(|b| Coord { x: b.x, y: b.y })
        .collect();

    if xy.len() < 2 {
        return None;
    }

    // Sort along X and sweep; pairs further apart in X than the best so far are skipped
    xy.sort_by(|a, b| a.x.total_cmp(&b.x));

    let mut best_sq = f64::INFINITY;
    for i in 0..xy.len() {
        for j in (i + 1)..xy.len() {
            let dx = xy[j].x - xy[i].x;
            if dx * dx >= best_sq {
                break;
            }
            let dy = xy[j].y - xy[i].y;
            let d_sq = dx * dx + dy * dy;
            if d_sq > 0.0 && d_sq < best_sq {
                best_sq = d_sq;
            }
        }
    }

    if !best_sq.is_finite() {
        return None;
    }

    let spacing = best_sq.sqrt();
    Some(if in_meters { spacing * 1000.0 } else { spacing })
}

//! Per-point Voronoi cells, clipped to the cluster footprint and a local box.
//!
//! Cells are built per cluster. Each site starts from the cluster's padded
//! bounding box and is cut by the perpendicular bisector towards every Delaunay
//! neighbour (`delaunator`), one half-plane at a time. The resulting convex cell
//! is then intersected with the fattened hull and with a square around the point
//! using `geo` boolean operations.

use std::collections::BTreeSet;

use delaunator::{triangulate, Point};
use geo::{Area, BooleanOps, Coord, MultiPolygon, Polygon};
use log::{debug, warn};
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::core::bounds::BoundingBox;
use crate::core::geom::{self, EPSILON};
use crate::core::types::ScanPoint;
use crate::processors::angle::local_angles;
use crate::processors::clustering::PointCluster;
use crate::processors::hull::hull_polygon;

/// Outcome of one polygon intersection.
#[derive(Debug, Clone, PartialEq)]
pub enum ClipResult {
    /// Nothing of the subject survived
    Empty,
    /// A single polygon with a single ring
    Single(Polygon<f64>),
    /// Several pieces or holes; not renderable as one cell
    Degenerate,
}

/// Inputs the clipper refuses to process.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClipError {
    #[error("clip polygon has fewer than three vertices or no area")]
    DegenerateClipper,

    #[error("polygon has a non-finite vertex")]
    NonFiniteVertex,
}

/// Intersect `subject` with `clipper`.
///
/// # Errors
///
/// `DegenerateClipper` when the clipper has no area, `NonFiniteVertex` when either
/// polygon holds a NaN or infinite coordinate.
pub fn clip_cell(subject: &Polygon<f64>, clipper: &Polygon<f64>) -> Result<ClipResult, ClipError> {
    let finite = |p: &Polygon<f64>| p.exterior().coords().all(|c| c.x.is_finite() && c.y.is_finite());
    if !finite(subject) || !finite(clipper) {
        return Err(ClipError::NonFiniteVertex);
    }
    if geom::open_ring(clipper).len() < 3 || clipper.unsigned_area() < EPSILON {
        return Err(ClipError::DegenerateClipper);
    }
    if geom::open_ring(subject).len() < 3 || subject.unsigned_area() < EPSILON {
        return Ok(ClipResult::Empty);
    }

    Ok(classify(subject.intersection(clipper)))
}

fn classify(result: MultiPolygon<f64>) -> ClipResult {
    let mut pieces: Vec<Polygon<f64>> = result
        .into_iter()
        .filter(|p| p.unsigned_area() >= EPSILON)
        .collect();

    match pieces.len() {
        0 => ClipResult::Empty,
        1 => {
            let Some(polygon) = pieces.pop() else {
                return ClipResult::Empty;
            };
            if polygon.interiors().is_empty() && geom::open_ring(&polygon).len() >= 3 {
                ClipResult::Single(polygon)
            } else {
                ClipResult::Degenerate
            }
        }
        _ => ClipResult::Degenerate,
    }
}

/// Cut a convex ring down to the side of the bisector between `site` and `other`
/// that is closer to `site`.
fn clip_half_plane(ring: &[Coord<f64>], site: Coord<f64>, other: Coord<f64>) -> Vec<Coord<f64>> {
    if ring.is_empty() {
        return Vec::new();
    }

    let mid = Coord {
        x: (site.x + other.x) * 0.5,
        y: (site.y + other.y) * 0.5,
    };
    let dir = other - site;
    let side = |p: Coord<f64>| geom::dot(p - mid, dir);

    let mut out = Vec::with_capacity(ring.len() + 1);
    let mut prev = ring[ring.len() - 1];
    let mut prev_d = side(prev);

    for &cur in ring {
        let cur_d = side(cur);
        let cur_in = cur_d <= 0.0;
        let prev_in = prev_d <= 0.0;

        if cur_in != prev_in {
            let t = (prev_d / (prev_d - cur_d)).clamp(0.0, 1.0);
            out.push(Coord {
                x: prev.x + (cur.x - prev.x) * t,
                y: prev.y + (cur.y - prev.y) * t,
            });
        }
        if cur_in {
            out.push(cur);
        }

        prev = cur;
        prev_d = cur_d;
    }

    out
}

/// Collapse coincident sites (closer than `EPSILON`) into one.
///
/// Returns the distinct sites and, for every input site, the index of its
/// distinct representative.
fn dedup_sites(sites: &[Coord<f64>]) -> (Vec<Coord<f64>>, Vec<usize>) {
    let mut order: Vec<usize> = (0..sites.len()).collect();
    order.sort_by(|&a, &b| {
        sites[a]
            .x
            .total_cmp(&sites[b].x)
            .then(sites[a].y.total_cmp(&sites[b].y))
    });

    let mut distinct: Vec<Coord<f64>> = Vec::with_capacity(sites.len());
    let mut owner = vec![0usize; sites.len()];
    for idx in order {
        let site = sites[idx];
        match distinct.last() {
            Some(&last) if geom::distance(last, site) < EPSILON => {}
            _ => distinct.push(site),
        }
        owner[idx] = distinct.len() - 1;
    }
    (distinct, owner)
}

/// Voronoi neighbours of every distinct site.
///
/// A site the triangulation still drops (a near-duplicate below its tolerance)
/// borrows the neighbours of the closest triangulated site plus that site itself.
/// Without any triangle the sites are collinear, and each one neighbours the
/// nearest sites on either side along the line.
fn neighbour_sets(sites: &[Coord<f64>]) -> Vec<Vec<usize>> {
    let n = sites.len();
    let points: Vec<Point> = sites.iter().map(|c| Point { x: c.x, y: c.y }).collect();
    let triangulation = triangulate(&points);

    if triangulation.triangles.is_empty() {
        return collinear_neighbours(sites);
    }

    let mut sets = vec![BTreeSet::new(); n];
    for tri in triangulation.triangles.chunks_exact(3) {
        for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
            sets[a].insert(b);
            sets[b].insert(a);
        }
    }

    let mut result: Vec<Vec<usize>> = sets
        .iter()
        .map(|set| set.iter().copied().collect())
        .collect();
    for idx in (0..n).filter(|&idx| sets[idx].is_empty()) {
        let nearest = (0..n)
            .filter(|&other| !sets[other].is_empty())
            .min_by(|&a, &b| {
                geom::distance(sites[idx], sites[a])
                    .total_cmp(&geom::distance(sites[idx], sites[b]))
            });
        if let Some(nearest) = nearest {
            debug!("voronoi: site {} missing from triangulation, borrowing from {}", idx, nearest);
            let mut borrowed = result[nearest].clone();
            borrowed.push(nearest);
            result[idx] = borrowed;
        }
    }
    result
}

fn collinear_neighbours(sites: &[Coord<f64>]) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..sites.len()).collect();
    // Lexicographic order is the order along any line
    order.sort_by(|&a, &b| {
        sites[a]
            .x
            .total_cmp(&sites[b].x)
            .then(sites[a].y.total_cmp(&sites[b].y))
    });

    let mut sets = vec![Vec::new(); sites.len()];
    for (pos, &idx) in order.iter().enumerate() {
        let here = sites[idx];
        if let Some(&before) = order[..pos].iter().rev().find(|&&o| sites[o] != here) {
            sets[idx].push(before);
        }
        if let Some(&after) = order[pos + 1..].iter().find(|&&o| sites[o] != here) {
            sets[idx].push(after);
        }
    }
    sets
}

/// Voronoi cell of every site inside `bounds`, as an open CCW ring.
///
/// Coincident sites share one cell. A cell that collapses entirely comes back as
/// an empty ring.
pub fn voronoi_cells(sites: &[Coord<f64>], bounds: &BoundingBox) -> Vec<Vec<Coord<f64>>> {
    if sites.is_empty() || bounds.is_empty() {
        return vec![Vec::new(); sites.len()];
    }

    let (distinct, owner) = dedup_sites(sites);
    let neighbours = neighbour_sets(&distinct);
    let start = bounds.corners().to_vec();

    let cells: Vec<Vec<Coord<f64>>> = distinct
        .iter()
        .enumerate()
        .map(|(idx, &site)| {
            let mut cell = start.clone();
            for &other in &neighbours[idx] {
                let other_site = distinct[other];
                if geom::distance(site, other_site) < EPSILON {
                    continue;
                }
                cell = clip_half_plane(&cell, site, other_site);
                if cell.is_empty() {
                    break;
                }
            }
            cell
        })
        .collect();

    owner.into_iter().map(|idx| cells[idx].clone()).collect()
}

/// Clipped polygon for every point of a cluster, aligned with `cluster.point_indices`.
///
/// `None` marks a point that cannot be drawn: no coordinate, no spectra, a cell
/// clipped away, a degenerate clip or a clip error (logged).
pub fn cluster_polygons(
    points: &[ScanPoint],
    cluster: &PointCluster,
    config: &PipelineConfig,
) -> Vec<Option<Polygon<f64>>> {
    let coords = cluster.coords(points);
    if coords.len() != cluster.len() {
        warn!("cluster holds points without coordinates, skipping polygons");
        return vec![None; cluster.len()];
    }

    let Some(footprint) = hull_polygon(&cluster.footprint) else {
        debug!(
            "cluster of {} points has a degenerate footprint, no polygons",
            cluster.len()
        );
        return vec![None; cluster.len()];
    };

    let bounds = BoundingBox::from_coords(coords.iter().copied()).padded(config.voronoi.box_margin);
    let cells = voronoi_cells(&coords, &bounds);
    let angles = local_angles(&coords, cluster.angle_rad, &config.angle);
    let half = config.voronoi.local_box_scale * cluster.point_distance / 2.0;

    cluster
        .point_indices
        .iter()
        .enumerate()
        .map(|(k, &idx)| {
            let point = &points[idx];
            if !point.has_spectra() || cells[k].len() < 3 {
                return None;
            }

            let cell = geom::polygon_from_ring(&cells[k]);
            let local_box =
                geom::polygon_from_ring(&geom::oriented_square(coords[k], half, angles[k]));

            let clipped = clip_cell(&cell, &footprint)
                .and_then(|first| match first {
                    ClipResult::Single(polygon) => clip_cell(&polygon, &local_box),
                    other => Ok(other),
                });

            match clipped {
                Ok(ClipResult::Single(polygon)) => Some(polygon),
                Ok(ClipResult::Empty) => None,
                Ok(ClipResult::Degenerate) => {
                    debug!("pmc {}: clip produced a degenerate polygon", point.pmc);
                    None
                }
                Err(e) => {
                    debug!("pmc {}: clip failed: {}", point.pmc, e);
                    None
                }
            }
        })
        .collect()
}

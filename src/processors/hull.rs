//! Footprint hulls: convex hull of a cluster, fattening and vertex normals.

use geo::{ConvexHull, Coord, MultiPoint, Polygon};
use log::debug;

use crate::core::geom::{self, EPSILON};

/// A vertex of a cluster footprint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HullPoint {
    pub coord: Coord<f64>,
    /// Position of the source point in the owning cluster's point list
    pub point_idx: usize,
    /// Outward unit normal, averaged across the two adjacent edges
    pub normal: Option<Coord<f64>>,
}

impl HullPoint {
    pub fn new(coord: Coord<f64>, point_idx: usize) -> Self {
        Self {
            coord,
            point_idx,
            normal: None,
        }
    }
}

/// Convex hull of `coords`, counter-clockwise, without a repeated closing vertex.
///
/// Each hull point refers back to its position in `coords`. Fewer than three
/// distinct inputs produce a degenerate hull holding those distinct points.
pub fn convex_hull(coords: &[Coord<f64>]) -> Vec<HullPoint> {
    let mut distinct: Vec<usize> = Vec::new();
    for (idx, c) in coords.iter().enumerate() {
        if !distinct.iter().any(|&d| coords[d] == *c) {
            distinct.push(idx);
            if distinct.len() >= 3 {
                break;
            }
        }
    }

    if distinct.len() < 3 {
        return distinct
            .into_iter()
            .map(|idx| HullPoint::new(coords[idx], idx))
            .collect();
    }

    let hull: Polygon<f64> = MultiPoint::from(coords.to_vec()).convex_hull();
    let mut ring = geom::open_ring(&hull);
    if geom::signed_area(&ring) < 0.0 {
        ring.reverse();
    }

    ring.into_iter()
        .filter_map(|hc| match coords.iter().position(|c| *c == hc) {
            Some(idx) => Some(HullPoint::new(hc, idx)),
            None => {
                debug!("hull vertex ({}, {}) has no source point", hc.x, hc.y);
                None
            }
        })
        .collect()
}

/// Enlarge a hull so it covers a square of half-side `enlarge_by` around every vertex.
///
/// Squares are rotated by `angle` (the cluster's grid rotation). The result is the
/// convex hull of all square corners, with each vertex keeping the `point_idx` of
/// the hull point it came from, and with normals recomputed.
pub fn fatten_hull(hull: &[HullPoint], enlarge_by: f64, angle: f64) -> Vec<HullPoint> {
    if hull.is_empty() {
        return Vec::new();
    }
    if !(enlarge_by > 0.0) || !enlarge_by.is_finite() {
        return with_normals(hull.to_vec());
    }

    let mut corners = Vec::with_capacity(hull.len() * 4);
    let mut sources = Vec::with_capacity(hull.len() * 4);
    for hp in hull {
        for corner in geom::oriented_square(hp.coord, enlarge_by, angle) {
            corners.push(corner);
            sources.push(hp.point_idx);
        }
    }

    let fattened = convex_hull(&corners)
        .into_iter()
        .map(|hp| HullPoint::new(hp.coord, sources[hp.point_idx]))
        .collect();

    with_normals(fattened)
}

/// Compute per-vertex outward normals for a CCW hull.
///
/// Edge normal is the edge direction turned clockwise by 90 degrees; the vertex
/// normal is the normalized sum of the normals of its two edges.
pub fn with_normals(mut hull: Vec<HullPoint>) -> Vec<HullPoint> {
    let n = hull.len();
    if n < 2 {
        for hp in &mut hull {
            hp.normal = None;
        }
        return hull;
    }

    let edge_normals: Vec<Option<Coord<f64>>> = (0..n)
        .map(|i| {
            let d = hull[(i + 1) % n].coord - hull[i].coord;
            geom::normalize(Coord { x: d.y, y: -d.x })
        })
        .collect();

    for i in 0..n {
        let prev = edge_normals[(i + n - 1) % n];
        let next = edge_normals[i];
        hull[i].normal = match (prev, next) {
            (Some(a), Some(b)) => geom::normalize(a + b),
            (Some(a), None) | (None, Some(a)) => Some(a),
            (None, None) => None,
        };
    }

    hull
}

/// Hull as a polygon, `None` when it has fewer than three vertices or no area.
pub fn hull_polygon(hull: &[HullPoint]) -> Option<Polygon<f64>> {
    if hull.len() < 3 {
        return None;
    }
    let ring: Vec<Coord<f64>> = hull.iter().map(|hp| hp.coord).collect();
    if geom::signed_area(&ring).abs() < EPSILON {
        return None;
    }
    Some(geom::polygon_from_ring(&ring))
}

/// Unsigned area enclosed by the hull (zero when degenerate).
pub fn hull_area(hull: &[HullPoint]) -> f64 {
    let ring: Vec<Coord<f64>> = hull.iter().map(|hp| hp.coord).collect();
    geom::signed_area(&ring).abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Contains, Intersects, Point};

    fn c(x: f64, y: f64) -> Coord<f64> {
        Coord { x, y }
    }

    #[test]
    fn test_right_triangle_hull() {
        let coords = vec![c(0.0, 0.0), c(4.0, 0.0), c(0.0, 3.0)];
        let hull = convex_hull(&coords);

        assert_eq!(hull.len(), 3);
        let mut idx: Vec<usize> = hull.iter().map(|hp| hp.point_idx).collect();
        idx.sort_unstable();
        assert_eq!(idx, vec![0, 1, 2]);

        let ring: Vec<Coord<f64>> = hull.iter().map(|hp| hp.coord).collect();
        assert!((geom::signed_area(&ring) - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_hull_drops_interior_and_closing_point() {
        let coords = vec![
            c(0.0, 0.0),
            c(10.0, 0.0),
            c(5.0, 5.0),
            c(10.0, 10.0),
            c(0.0, 10.0),
            c(3.0, 7.0),
        ];
        let hull = convex_hull(&coords);

        assert_eq!(hull.len(), 4);
        assert_ne!(hull.first().map(|h| h.coord), hull.last().map(|h| h.coord));
        assert!(hull.iter().all(|hp| hp.point_idx != 2 && hp.point_idx != 5));
    }

    #[test]
    fn test_hull_contains_all_points() {
        let coords: Vec<Coord<f64>> = (0..40)
            .map(|k| {
                let t = k as f64 * 0.7;
                c(t.cos() * (3.0 + (k % 5) as f64), t.sin() * (2.0 + (k % 3) as f64))
            })
            .collect();
        let hull = convex_hull(&coords);
        let polygon = hull_polygon(&hull).unwrap();

        for p in &coords {
            assert!(polygon.intersects(&Point::from(*p)), "point {:?} outside hull", p);
        }
        for hp in &hull {
            assert_eq!(coords[hp.point_idx], hp.coord);
        }
    }

    #[test]
    fn test_single_point_hull_is_degenerate() {
        let hull = convex_hull(&[c(2.0, 2.0), c(2.0, 2.0)]);
        assert_eq!(hull.len(), 1);
        assert_eq!(hull_area(&hull), 0.0);
        assert!(hull_polygon(&hull).is_none());
    }

    #[test]
    fn test_fatten_contains_original() {
        let coords = vec![c(0.0, 0.0), c(10.0, 0.0), c(10.0, 4.0), c(0.0, 4.0), c(5.0, 2.0)];
        let hull = convex_hull(&coords);
        let fat = fatten_hull(&hull, 1.0, 0.3);

        assert!(hull_area(&fat) >= hull_area(&hull));
        let fat_poly = hull_polygon(&fat).unwrap();
        let orig_poly = hull_polygon(&hull).unwrap();
        assert!(fat_poly.contains(&orig_poly));

        for hp in &fat {
            assert!(hp.point_idx < coords.len());
        }
    }

    #[test]
    fn test_fatten_line_scan_gains_width() {
        let coords: Vec<Coord<f64>> = (0..10).map(|k| c(k as f64, 0.0)).collect();
        let hull = convex_hull(&coords);
        assert_eq!(hull_area(&hull), 0.0);

        let fat = fatten_hull(&hull, 0.5, 0.0);
        // 10 x 1 rectangle from the squares at both ends
        assert!((hull_area(&fat) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_normals_point_outward() {
        let square = convex_hull(&[c(0.0, 0.0), c(2.0, 0.0), c(2.0, 2.0), c(0.0, 2.0)]);
        let with_n = with_normals(square);
        let center = c(1.0, 1.0);

        for hp in &with_n {
            let normal = hp.normal.unwrap();
            assert!((geom::length(normal) - 1.0).abs() < 1e-12);
            assert!(geom::dot(normal, hp.coord - center) > 0.0);
        }
    }

    #[test]
    fn test_fatten_zero_keeps_hull() {
        let hull = convex_hull(&[c(0.0, 0.0), c(1.0, 0.0), c(0.0, 1.0)]);
        let fat = fatten_hull(&hull, 0.0, 0.0);
        assert_eq!(fat.len(), 3);
        assert!(fat.iter().all(|hp| hp.normal.is_some()));
    }
}

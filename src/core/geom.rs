//! Small vector helpers over `geo::Coord<f64>`.

use geo::{Coord, LineString, Polygon};

/// Lengths below this are treated as zero.
pub const EPSILON: f64 = 1e-9;

#[inline]
pub fn dot(a: Coord<f64>, b: Coord<f64>) -> f64 {
    a.x * b.x + a.y * b.y
}

/// Z component of the 2D cross product.
#[inline]
pub fn cross(a: Coord<f64>, b: Coord<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

#[inline]
pub fn length(v: Coord<f64>) -> f64 {
    v.x.hypot(v.y)
}

#[inline]
pub fn distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    length(b - a)
}

/// Unit vector in the direction of `v`, `None` for a (near) zero vector.
#[inline]
pub fn normalize(v: Coord<f64>) -> Option<Coord<f64>> {
    let len = length(v);
    if len < EPSILON || !len.is_finite() {
        return None;
    }
    Some(Coord {
        x: v.x / len,
        y: v.y / len,
    })
}

/// Rotate `v` counter-clockwise by `angle` radians.
#[inline]
pub fn rotate(v: Coord<f64>, angle: f64) -> Coord<f64> {
    let (sin, cos) = angle.sin_cos();
    Coord {
        x: v.x * cos - v.y * sin,
        y: v.x * sin + v.y * cos,
    }
}

/// Corners of a square of half-side `half` centred on `center`, rotated by `angle`.
///
/// Returned in CCW order for a non-negative `half`.
pub fn oriented_square(center: Coord<f64>, half: f64, angle: f64) -> [Coord<f64>; 4] {
    [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)].map(|(sx, sy)| {
        center
            + rotate(
                Coord {
                    x: sx * half,
                    y: sy * half,
                },
                angle,
            )
    })
}

/// Polygon with the given exterior ring (closed automatically).
pub fn polygon_from_ring(ring: &[Coord<f64>]) -> Polygon<f64> {
    Polygon::new(LineString::from(ring.to_vec()), vec![])
}

/// Shoelace signed area, positive for CCW rings. The ring may be open or closed.
pub fn signed_area(ring: &[Coord<f64>]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for (i, a) in ring.iter().enumerate() {
        let b = ring[(i + 1) % ring.len()];
        sum += cross(*a, b);
    }
    sum * 0.5
}

/// Exterior ring of a polygon without the closing duplicate vertex.
pub fn open_ring(polygon: &Polygon<f64>) -> Vec<Coord<f64>> {
    let mut coords: Vec<Coord<f64>> = polygon.exterior().coords().copied().collect();
    if coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }
    coords
}

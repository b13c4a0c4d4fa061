//! Rotation of the sampling grid relative to the image axes.

use geo::Coord;
use log::debug;

use crate::config::AngleConfig;
use crate::core::geom;

/// Angle (radians) of a unit direction vector, measured from image "up" (0, -1).
///
/// Vectors pointing towards negative X are folded with `π/2 - angle` so that a
/// direction and its reverse resolve to the same grid orientation for
/// axis-aligned edges.
pub fn direction_angle(unit: Coord<f64>) -> f64 {
    let up = Coord { x: 0.0, y: -1.0 };
    let angle = geom::dot(unit, up).clamp(-1.0, 1.0).acos();
    if unit.x < 0.0 {
        std::f64::consts::FRAC_PI_2 - angle
    } else {
        angle
    }
}

/// Angles (degrees) that count as axis-aligned.
const SNAP_TARGETS_DEG: [f64; 4] = [0.0, 90.0, 270.0, 360.0];

/// Force angles within `tolerance_deg` of 0, 90, 270 or 360 degrees to exactly zero.
///
/// Other angles, including those near 180 degrees, are returned unchanged.
pub fn snap_to_axis(angle: f64, tolerance_deg: f64) -> f64 {
    let deg = angle.to_degrees();
    if SNAP_TARGETS_DEG
        .iter()
        .any(|target| (deg - target).abs() <= tolerance_deg)
    {
        0.0
    } else {
        angle
    }
}

/// Estimate the grid rotation from the longest edge of a hull.
///
/// Edges are taken between consecutive vertices, wrapping around. Returns 0 for an
/// empty hull or when every edge has zero length.
pub fn estimate_hull_angle(hull: &[Coord<f64>], config: &AngleConfig) -> f64 {
    if hull.is_empty() {
        debug!("angle: empty hull, using 0");
        return 0.0;
    }

    let n = hull.len();
    let mut longest: Option<(f64, Coord<f64>)> = None;
    for i in 0..n {
        let edge = hull[(i + 1) % n] - hull[i];
        let len = geom::length(edge);
        if len > longest.map_or(0.0, |(best, _)| best) {
            longest = Some((len, edge));
        }
    }

    let Some(unit) = longest.and_then(|(_, edge)| geom::normalize(edge)) else {
        debug!("angle: no longest edge among {} hull points, using 0", n);
        return 0.0;
    };

    snap_to_axis(direction_angle(unit), config.snap_tolerance_deg)
}

/// Rotation for one point's clip box, refined from its acquisition neighbours.
///
/// Points with both a predecessor and a successor use the average of the incoming
/// and outgoing directions, unless the path turns by more than the configured
/// threshold there. Endpoints, turns and coincident neighbours use `cluster_angle`.
pub fn local_angle(
    prev: Option<Coord<f64>>,
    here: Coord<f64>,
    next: Option<Coord<f64>>,
    cluster_angle: f64,
    config: &AngleConfig,
) -> f64 {
    let (Some(prev), Some(next)) = (prev, next) else {
        return cluster_angle;
    };

    let (Some(incoming), Some(outgoing)) =
        (geom::normalize(here - prev), geom::normalize(next - here))
    else {
        return cluster_angle;
    };

    let turn = geom::dot(incoming, outgoing).clamp(-1.0, 1.0).acos();
    if turn.to_degrees() > config.turn_threshold_deg {
        return cluster_angle;
    }

    match geom::normalize(incoming + outgoing) {
        Some(avg) => direction_angle(avg),
        None => cluster_angle,
    }
}

/// Local clip-box angles for an ordered list of cluster coordinates.
pub fn local_angles(coords: &[Coord<f64>], cluster_angle: f64, config: &AngleConfig) -> Vec<f64> {
    (0..coords.len())
        .map(|k| {
            let prev = k.checked_sub(1).map(|p| coords[p]);
            let next = coords.get(k + 1).copied();
            local_angle(prev, coords[k], next, cluster_angle, config)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_4, PI};

    fn c(x: f64, y: f64) -> Coord<f64> {
        Coord { x, y }
    }

    #[test]
    fn test_direction_angle_axes() {
        assert!(direction_angle(c(0.0, -1.0)).abs() < 1e-12);
        assert!((direction_angle(c(1.0, 0.0)) - PI / 2.0).abs() < 1e-12);
        // Reverse horizontal folds back to zero
        assert!(direction_angle(c(-1.0, 0.0)).abs() < 1e-12);
    }

    #[test]
    fn test_snap_to_axis() {
        let tol = 5.0;
        assert_eq!(snap_to_axis(3.0_f64.to_radians(), tol), 0.0);
        assert_eq!(snap_to_axis(88.0_f64.to_radians(), tol), 0.0);
        assert_eq!(snap_to_axis(272.0_f64.to_radians(), tol), 0.0);
        assert_eq!(snap_to_axis(357.0_f64.to_radians(), tol), 0.0);
        assert_eq!(snap_to_axis((-4.0_f64).to_radians(), tol), 0.0);

        for deg in [30.0_f64, 178.0, 180.0, -88.0] {
            let kept = deg.to_radians();
            assert_eq!(snap_to_axis(kept, tol), kept);
        }
    }

    #[test]
    fn test_near_180_longest_edge_keeps_angle() {
        let config = AngleConfig::default();

        // Longest edge points almost straight down the image (178 degrees from up)
        let dir = c(2.0_f64.to_radians().sin(), 2.0_f64.to_radians().cos());
        let hull = vec![c(0.0, 0.0), c(30.0 * dir.x, 30.0 * dir.y), c(-2.0, 15.0)];

        let angle = estimate_hull_angle(&hull, &config);
        assert!((angle - 178.0_f64.to_radians()).abs() < 1e-9);
    }

    #[test]
    fn test_axis_aligned_hull_angles() {
        let config = AngleConfig::default();

        // Longest edge tilted 3 degrees from horizontal
        let tilt = 3.0_f64.to_radians();
        let hull = vec![
            c(0.0, 0.0),
            c(20.0 * tilt.cos(), 20.0 * tilt.sin()),
            c(20.0 * tilt.cos() - 2.0 * tilt.sin(), 20.0 * tilt.sin() + 2.0 * tilt.cos()),
            c(-2.0 * tilt.sin(), 2.0 * tilt.cos()),
        ];
        assert_eq!(estimate_hull_angle(&hull, &config), 0.0);

        // Longest edge heading down the image is a half turn, not an axis snap
        let tall = vec![c(0.0, 0.0), c(2.0, 0.0), c(2.0, 30.0), c(0.0, 30.0)];
        assert!((estimate_hull_angle(&tall, &config) - PI).abs() < 1e-12);
    }

    #[test]
    fn test_diagonal_hull_angle() {
        let config = AngleConfig::default();
        let hull = vec![c(0.0, 0.0), c(10.0, 10.0), c(9.0, 10.5)];

        let angle = estimate_hull_angle(&hull, &config);
        // Longest edge heads along (+1, +1): 135 degrees from image up
        assert!((angle - 3.0 * FRAC_PI_4).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_hulls_give_zero() {
        let config = AngleConfig::default();
        assert_eq!(estimate_hull_angle(&[], &config), 0.0);
        assert_eq!(estimate_hull_angle(&[c(1.0, 1.0)], &config), 0.0);
        assert_eq!(estimate_hull_angle(&[c(1.0, 1.0), c(1.0, 1.0)], &config), 0.0);
    }

    #[test]
    fn test_local_angle_straight_run() {
        let config = AngleConfig::default();
        let angle = local_angle(
            Some(c(0.0, 0.0)),
            c(1.0, 1.0),
            Some(c(2.0, 2.0)),
            0.0,
            &config,
        );
        assert!((angle - 3.0 * FRAC_PI_4).abs() < 1e-9);
    }

    #[test]
    fn test_local_angle_falls_back() {
        let config = AngleConfig::default();
        let cluster_angle = 0.4;

        // Endpoint
        assert_eq!(
            local_angle(None, c(0.0, 0.0), Some(c(1.0, 0.0)), cluster_angle, &config),
            cluster_angle
        );
        // Sharp turn (90 degrees)
        assert_eq!(
            local_angle(
                Some(c(0.0, 0.0)),
                c(1.0, 0.0),
                Some(c(1.0, 1.0)),
                cluster_angle,
                &config
            ),
            cluster_angle
        );
        // Coincident predecessor
        assert_eq!(
            local_angle(
                Some(c(1.0, 0.0)),
                c(1.0, 0.0),
                Some(c(2.0, 0.0)),
                cluster_angle,
                &config
            ),
            cluster_angle
        );
    }

    #[test]
    fn test_local_angles_length() {
        let config = AngleConfig::default();
        let coords = vec![c(0.0, 0.0), c(1.0, 0.0), c(2.0, 0.0), c(3.0, 0.0)];
        let angles = local_angles(&coords, 0.25, &config);

        assert_eq!(angles.len(), 4);
        assert_eq!(angles[0], 0.25);
        assert_eq!(angles[3], 0.25);
        assert!((angles[1] - PI / 2.0).abs() < 1e-12);
    }
}

//! Acquisition-order clustering of scan points.
//!
//! Points are walked in their original index order, which is the order the
//! instrument visited them. A new cluster starts whenever the step to the next
//! located point is much larger than the running mean step:
//! - Break threshold: `break_factor` times the mean of the non-zero steps seen so far
//! - Every break records the cosine between the jump and the X axis
//! - When there are at least two breaks and all of them point the same way, the scan
//!   is a raster ("Z-pattern") and every point goes back into a single cluster
//!
//! Each surviving cluster then gets its convex hull, rotation angle and fattened
//! footprint.

use geo::Coord;
use log::{debug, info};

use crate::config::{ClusteringConfig, PipelineConfig};
use crate::core::geom;
use crate::core::types::ScanPoint;
use crate::processors::angle::estimate_hull_angle;
use crate::processors::hull::{convex_hull, fatten_hull, HullPoint};

/// A spatially contiguous run of scan points.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCluster {
    /// Indices into the point arena, in acquisition order
    pub point_indices: Vec<usize>,
    /// Mean step between consecutive points of the cluster (pixels)
    pub point_distance: f64,
    /// Convex hull before fattening
    pub hull: Vec<HullPoint>,
    /// Fattened hull with normals
    pub footprint: Vec<HullPoint>,
    /// Grid rotation in radians
    pub angle_rad: f64,
}

impl PointCluster {
    pub fn len(&self) -> usize {
        self.point_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.point_indices.is_empty()
    }

    /// Image coordinates of the cluster's points, in cluster order.
    ///
    /// Cluster members always carry a coordinate.
    pub fn coords(&self, points: &[ScanPoint]) -> Vec<Coord<f64>> {
        self.point_indices
            .iter()
            .filter_map(|&idx| points[idx].coord)
            .collect()
    }

    /// Footprint vertex coordinates.
    pub fn footprint_coords(&self) -> Vec<Coord<f64>> {
        self.footprint.iter().map(|hp| hp.coord).collect()
    }
}

/// Output of the clusterer.
#[derive(Debug, Clone, Default)]
pub struct ClusterSet {
    pub clusters: Vec<PointCluster>,
    /// Cosine between each break jump and the X axis, in the order encountered
    pub break_cosines: Vec<f64>,
    /// Whether the breaks were uniform and all clusters were merged back into one
    pub z_pattern_merged: bool,
}

impl ClusterSet {
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Cluster with the most points (first one on ties).
    pub fn largest(&self) -> Option<&PointCluster> {
        self.clusters
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| a.len().cmp(&b.len()).then(ib.cmp(ia)))
            .map(|(_, c)| c)
    }
}

/// A run of point indices plus the step statistics that went into it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segment {
    pub point_indices: Vec<usize>,
    step_sum: f64,
    step_count: usize,
}

impl Segment {
    fn push_step(&mut self, step: f64) {
        self.step_sum += step;
        self.step_count += 1;
    }

    fn absorb(&mut self, other: Segment) {
        self.point_indices.extend(other.point_indices);
        self.step_sum += other.step_sum;
        self.step_count += other.step_count;
    }

    /// Mean of the non-zero steps inside the segment, if any.
    pub fn mean_step(&self) -> Option<f64> {
        (self.step_count > 0).then(|| self.step_sum / self.step_count as f64)
    }
}

/// Result of partitioning the point list, before any geometry is built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    pub segments: Vec<Segment>,
    pub break_cosines: Vec<f64>,
    pub z_pattern_merged: bool,
    /// Running mean step at the end of the walk
    pub mean_step: Option<f64>,
}

/// Split located points into segments at large jumps.
///
/// Points without a coordinate are skipped and belong to no segment. Break steps
/// do not feed the running mean.
pub fn partition_points(points: &[ScanPoint], config: &ClusteringConfig) -> Partition {
    let mut segments: Vec<Segment> = Vec::new();
    let mut current = Segment::default();
    let mut break_cosines = Vec::new();

    let mut sum = 0.0;
    let mut count = 0usize;
    let mut last: Option<Coord<f64>> = None;

    for point in points {
        let Some(coord) = point.coord else {
            continue;
        };

        if let Some(prev) = last {
            let step = coord - prev;
            let dist = geom::length(step);

            let is_break = count > 0 && dist > config.break_factor * (sum / count as f64);
            if is_break {
                // dist is non-zero here so the cosine is defined
                break_cosines.push(step.x / dist);
                segments.push(std::mem::take(&mut current));
            } else if dist > 0.0 {
                sum += dist;
                count += 1;
                current.push_step(dist);
            }
        }

        current.point_indices.push(point.index);
        last = Some(coord);
    }
    segments.push(current);
    segments.retain(|s| !s.point_indices.is_empty());

    let z_pattern = is_uniform(&break_cosines, config.direction_tolerance);
    if z_pattern {
        debug!(
            "clustering: {} breaks share one direction, merging {} segments",
            break_cosines.len(),
            segments.len()
        );
        let mut merged = Segment::default();
        for segment in segments.drain(..) {
            merged.absorb(segment);
        }
        segments.push(merged);
    }

    Partition {
        segments,
        break_cosines,
        z_pattern_merged: z_pattern,
        mean_step: (count > 0).then(|| sum / count as f64),
    }
}

/// True when there are at least two breaks and each lies within `tolerance` of the first.
fn is_uniform(cosines: &[f64], tolerance: f64) -> bool {
    match cosines.split_first() {
        Some((first, rest)) if !rest.is_empty() => {
            rest.iter().all(|c| (c - first).abs() <= tolerance)
        }
        _ => false,
    }
}

/// Partition the points and build hull, angle and footprint for every cluster.
///
/// A cluster's point distance is the mean step inside it, falling back to the
/// scan-wide mean step, and to zero when no step exists at all.
pub fn build_clusters(points: &[ScanPoint], config: &PipelineConfig) -> ClusterSet {
    let partition = partition_points(points, &config.clustering);
    let global_step = partition.mean_step.unwrap_or(0.0);

    let clusters: Vec<PointCluster> = partition
        .segments
        .into_iter()
        .map(|segment| {
            let point_distance = segment.mean_step().unwrap_or(global_step);
            let coords: Vec<Coord<f64>> = segment
                .point_indices
                .iter()
                .filter_map(|&idx| points[idx].coord)
                .collect();

            let hull = convex_hull(&coords);
            let hull_coords: Vec<Coord<f64>> = hull.iter().map(|hp| hp.coord).collect();
            let angle_rad = estimate_hull_angle(&hull_coords, &config.angle);
            let footprint = fatten_hull(&hull, point_distance / 2.0, angle_rad);

            PointCluster {
                point_indices: segment.point_indices,
                point_distance,
                hull,
                footprint,
                angle_rad,
            }
        })
        .collect();

    info!(
        "clustered {} points into {} clusters ({} breaks{})",
        clusters.iter().map(PointCluster::len).sum::<usize>(),
        clusters.len(),
        partition.break_cosines.len(),
        if partition.z_pattern_merged {
            ", z-pattern merged"
        } else {
            ""
        }
    );

    ClusterSet {
        clusters,
        break_cosines: partition.break_cosines,
        z_pattern_merged: partition.z_pattern_merged,
    }
}

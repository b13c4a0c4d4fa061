//! Axis-aligned bounding boxes for image-space and physical extents.

use geo::Coord;

/// Axis-aligned 2D rectangle that grows to fit points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Coord<f64>,
    pub max: Coord<f64>,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

impl BoundingBox {
    pub fn new(min: Coord<f64>, max: Coord<f64>) -> Self {
        Self { min, max }
    }

    /// Empty box with min > max, so the first expand sets both corners.
    pub fn empty() -> Self {
        Self {
            min: Coord {
                x: f64::INFINITY,
                y: f64::INFINITY,
            },
            max: Coord {
                x: f64::NEG_INFINITY,
                y: f64::NEG_INFINITY,
            },
        }
    }

    /// Smallest box containing every coordinate in the iterator.
    pub fn from_coords<I: IntoIterator<Item = Coord<f64>>>(coords: I) -> Self {
        let mut bbox = Self::empty();
        for c in coords {
            bbox.expand_to_fit(c);
        }
        bbox
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    #[inline]
    pub fn expand_to_fit(&mut self, c: Coord<f64>) {
        self.min.x = self.min.x.min(c.x);
        self.min.y = self.min.y.min(c.y);
        self.max.x = self.max.x.max(c.x);
        self.max.y = self.max.y.max(c.y);
    }

    /// Copy of this box padded by `margin` on every side.
    pub fn padded(&self, margin: f64) -> Self {
        Self {
            min: Coord {
                x: self.min.x - margin,
                y: self.min.y - margin,
            },
            max: Coord {
                x: self.max.x + margin,
                y: self.max.y + margin,
            },
        }
    }

    /// Width, zero for an empty box.
    #[inline]
    pub fn width(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max.x - self.min.x
        }
    }

    /// Height, zero for an empty box.
    #[inline]
    pub fn height(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max.y - self.min.y
        }
    }

    /// Corners in CCW order starting at min.
    pub fn corners(&self) -> [Coord<f64>; 4] {
        [
            self.min,
            Coord {
                x: self.max.x,
                y: self.min.y,
            },
            self.max,
            Coord {
                x: self.min.x,
                y: self.max.y,
            },
        ]
    }
}

/// Axis-aligned 3D extents of the physical beam locations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicalBounds {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Default for PhysicalBounds {
    fn default() -> Self {
        Self::empty()
    }
}

impl PhysicalBounds {
    pub fn empty() -> Self {
        Self {
            min: [f64::INFINITY; 3],
            max: [f64::NEG_INFINITY; 3],
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        (0..3).any(|axis| self.min[axis] > self.max[axis])
    }

    pub fn expand_to_fit(&mut self, xyz: [f64; 3]) {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(xyz[axis]);
            self.max[axis] = self.max[axis].max(xyz[axis]);
        }
    }

    /// Extent along one axis (0 = X, 1 = Y, 2 = Z), zero when empty.
    #[inline]
    pub fn range(&self, axis: usize) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max[axis] - self.min[axis]
        }
    }

    #[inline]
    pub fn max_z(&self) -> f64 {
        self.max[2]
    }
}

//! Cylindrical remapping of master shape points.
//!
//! The cylinder axis is +Y through the origin of the shape's local space.
//! Heights are normalized against the vertical extent so a shape can be
//! stretched along a strand of any length.

use strix_math::{signed_angle, Interval, Vec3, EPSILON};

use crate::error::StrandError;

/// A point in cylinder coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CylindricalPoint {
    /// Distance from the Y axis
    pub radius: f32,
    /// Normalized height in `[0, 1]` (0 for flat shapes)
    pub height: f32,
    /// Counter-clockwise angle around +Y from +X, radians
    pub angle: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundingCylinder {
    /// Vertical extent
    pub y: Interval,
    /// `y.max - y.min`, 0 while empty
    pub height: f32,
    /// Largest distance from the Y axis
    pub radius: f32,
    points: Vec<CylindricalPoint>,
}

impl Default for BoundingCylinder {
    fn default() -> Self {
        Self {
            y: Interval::EMPTY,
            height: 0.0,
            radius: 0.0,
            points: Vec::new(),
        }
    }
}

impl BoundingCylinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grow the extent to include `point`.
    pub fn adjust(&mut self, point: Vec3) {
        self.y.include(point.y);
        self.height = self.y.size();
        self.radius = self.radius.max(radial_distance(point));
    }

    /// Take over the extent of `other`, leaving this cylinder's points alone.
    pub fn copy_boundaries(&mut self, other: &BoundingCylinder) {
        self.y = other.y;
        self.height = other.height;
        self.radius = other.radius;
    }

    /// Size the remapped point storage.
    pub fn allocate(&mut self, count: usize) {
        self.points.clear();
        self.points.resize(count, CylindricalPoint::default());
    }

    /// Convert `point` to cylinder coordinates and store it at `index`.
    pub fn remap_point(&mut self, point: Vec3, index: usize) -> Result<(), StrandError> {
        let mapped = self.to_cylindrical(point);
        let len = self.points.len();
        let slot = self
            .points
            .get_mut(index)
            .ok_or(StrandError::IndexOutOfRange {
                what: "cylinder point",
                index,
                len,
            })?;
        *slot = mapped;
        Ok(())
    }

    /// Cylinder coordinates of `point` against the current extent.
    pub fn to_cylindrical(&self, point: Vec3) -> CylindricalPoint {
        let radius = radial_distance(point);
        // Flat shapes would divide by ~0
        let height = if self.height > EPSILON {
            (point.y - self.y.min) / self.height
        } else {
            0.0
        };
        let angle = if radius == 0.0 {
            0.0
        } else {
            signed_angle(Vec3::X, Vec3::new(point.x, 0.0, point.z), Vec3::Y)
        };
        CylindricalPoint {
            radius,
            height,
            angle,
        }
    }

    pub fn remapped_point(&self, index: usize) -> Option<CylindricalPoint> {
        self.points.get(index).copied()
    }

    pub fn remapped_points(&self) -> &[CylindricalPoint] {
        &self.points
    }
}

#[inline]
fn radial_distance(p: Vec3) -> f32 {
    (p.x * p.x + p.z * p.z).sqrt()
}

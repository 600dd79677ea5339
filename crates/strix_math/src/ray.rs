use crate::Vec3;

/// Denominators below this are treated as a ray parallel to the plane.
const PARALLEL_EPSILON: f32 = 1e-8;

/// A ray in 3D space with origin and direction.
///
/// Used to carry a reference point from one strand segment to the next.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Create a new ray.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Get the point along the ray at parameter t.
    ///
    /// Returns: origin + t * direction
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Intersect the ray's supporting line with the plane through `point`
    /// with normal `normal`.
    ///
    /// Negative parameters are accepted. Returns `None` when the ray is
    /// (nearly) parallel to the plane or the result is not finite.
    pub fn intersect_plane(&self, point: Vec3, normal: Vec3) -> Option<Vec3> {
        let denom = normal.dot(self.direction);
        if denom.abs() <= PARALLEL_EPSILON {
            return None;
        }

        let t = -(normal.dot(self.origin) - point.dot(normal)) / denom;
        let hit = self.at(t);
        hit.is_finite().then_some(hit)
    }
}

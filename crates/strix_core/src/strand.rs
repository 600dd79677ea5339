//! Strands: the polylines that master shapes get bent along.
//!
//! A strand is a root-to-tip list of points with optional per-point radius,
//! orientation and velocity. Queries are parametrized by `t`, the fraction of
//! the arc length from the root, and bracket/interpolate between points.
//!
//! Besides the points, a strand carries a transported reference axis `X`:
//! for every point, a position a short distance off the strand that defines
//! the local "sideways" direction without flipping along bends.

use strix_math::{
    axes_from_rotation, is_full_turn, rotate_about, signed_angle, with_length, Quat, Ray, Vec3,
    EPSILON,
};

use crate::error::StrandError;

/// Distance of the transported axis points from the strand.
pub const AXIS_LENGTH: f32 = 0.01;

/// How the transported axis at the root was chosen. Stored so that strands
/// derived for other motion keys are framed the same way.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameSettings {
    pub use_tangent_map: bool,
    /// Rotation of the tangent map direction around the root tangent, radians
    pub spread: f32,
}

/// Geometry of the strand at one deform key, for exact motion blur.
///
/// `radii` and `orientations` stay empty until a key value is set, and an
/// empty channel means the reference values hold at this key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeySample {
    pub points: Vec<Vec3>,
    pub radii: Vec<f32>,
    pub orientations: Vec<Quat>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Strand {
    points: Vec<Vec3>,
    radii: Vec<f32>,
    velocities: Vec<Vec3>,
    orientations: Vec<Quat>,
    keys: Vec<KeySample>,
    x: Vec<Vec3>,
    length: f32,
    weight: f32,
    tangent_map: Vec3,
    frame: FrameSettings,
}

impl Strand {
    /// Allocate a strand.
    ///
    /// Fewer than two points is clamped to two. Zero counts leave the
    /// optional channels empty. With `exact_mb`, key points are allocated
    /// per deform key; key radii and orientations are seeded from the
    /// reference values on first write.
    pub fn new(
        nb_points: usize,
        nb_radii: usize,
        nb_velocities: usize,
        nb_orientations: usize,
        exact_mb: bool,
        nb_deform_keys: usize,
    ) -> Self {
        let nb_points = nb_points.max(2);
        let keys = if exact_mb {
            (0..nb_deform_keys)
                .map(|_| KeySample {
                    points: vec![Vec3::ZERO; nb_points],
                    ..Default::default()
                })
                .collect()
        } else {
            Vec::new()
        };

        Self {
            points: vec![Vec3::ZERO; nb_points],
            radii: vec![0.0; nb_radii],
            velocities: vec![Vec3::ZERO; nb_velocities],
            orientations: vec![Quat::IDENTITY; nb_orientations],
            keys,
            x: vec![Vec3::ZERO; nb_points],
            length: 0.0,
            weight: 0.0,
            tangent_map: Vec3::ZERO,
            frame: FrameSettings::default(),
        }
    }

    /// Build a strand from its points, with length and axis computed.
    ///
    /// A single point is duplicated so the strand is degenerate but valid.
    pub fn from_points(points: &[Vec3]) -> Result<Self, StrandError> {
        let first = *points.first().ok_or(StrandError::EmptyStrand { strand: 0 })?;
        let mut strand = Self::new(points.len(), 0, 0, 0, false, 0);
        if points.len() == 1 {
            strand.points = vec![first, first];
        } else {
            strand.points.copy_from_slice(points);
        }
        strand.compute_length();
        strand.compute_bended_x(false, 0.0);
        Ok(strand)
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn radii(&self) -> &[f32] {
        &self.radii
    }

    pub fn orientations(&self) -> &[Quat] {
        &self.orientations
    }

    pub fn velocities(&self) -> &[Vec3] {
        &self.velocities
    }

    /// Transported axis points, one per strand point.
    pub fn axis_points(&self) -> &[Vec3] {
        &self.x
    }

    pub fn length(&self) -> f32 {
        self.length
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    pub fn frame_settings(&self) -> FrameSettings {
        self.frame
    }

    pub fn set_point(&mut self, p: Vec3, index: usize) -> Result<(), StrandError> {
        set_checked(&mut self.points, index, p, "point")
    }

    pub fn point(&self, index: usize) -> Option<Vec3> {
        self.points.get(index).copied()
    }

    pub fn set_radius(&mut self, r: f32, index: usize) -> Result<(), StrandError> {
        set_checked(&mut self.radii, index, r, "radius")
    }

    pub fn radius(&self, index: usize) -> Option<f32> {
        self.radii.get(index).copied()
    }

    pub fn set_velocity(&mut self, v: Vec3, index: usize) -> Result<(), StrandError> {
        set_checked(&mut self.velocities, index, v, "velocity")
    }

    pub fn velocity(&self, index: usize) -> Option<Vec3> {
        self.velocities.get(index).copied()
    }

    pub fn set_orientation(&mut self, q: Quat, index: usize) -> Result<(), StrandError> {
        set_checked(&mut self.orientations, index, q, "orientation")
    }

    pub fn orientation(&self, index: usize) -> Option<Quat> {
        self.orientations.get(index).copied()
    }

    fn key_mut(&mut self, key: usize) -> Result<&mut KeySample, StrandError> {
        let keys = self.keys.len();
        self.keys
            .get_mut(key)
            .ok_or(StrandError::KeyOutOfRange { key, keys })
    }

    pub fn set_mb_point(&mut self, p: Vec3, index: usize, key: usize) -> Result<(), StrandError> {
        set_checked(&mut self.key_mut(key)?.points, index, p, "motion point")
    }

    pub fn mb_point(&self, index: usize, key: usize) -> Option<Vec3> {
        self.keys.get(key)?.points.get(index).copied()
    }

    pub fn set_mb_radius(&mut self, r: f32, index: usize, key: usize) -> Result<(), StrandError> {
        let keys = self.keys.len();
        let sample = self
            .keys
            .get_mut(key)
            .ok_or(StrandError::KeyOutOfRange { key, keys })?;
        if sample.radii.is_empty() {
            sample.radii.clone_from(&self.radii);
        }
        set_checked(&mut sample.radii, index, r, "motion radius")
    }

    pub fn set_mb_orientation(
        &mut self,
        q: Quat,
        index: usize,
        key: usize,
    ) -> Result<(), StrandError> {
        let keys = self.keys.len();
        let sample = self
            .keys
            .get_mut(key)
            .ok_or(StrandError::KeyOutOfRange { key, keys })?;
        if sample.orientations.is_empty() {
            sample.orientations.clone_from(&self.orientations);
        }
        set_checked(&mut sample.orientations, index, q, "motion orientation")
    }

    /// Store the assignment weight, clamped to `[0, 1]`.
    pub fn set_weight_map_value(&mut self, w: f32) {
        self.weight = if w.is_nan() { 0.0 } else { w.clamp(0.0, 1.0) };
    }

    pub fn weight_map_value(&self) -> f32 {
        self.weight
    }

    /// Decode a tangent map color (`0..1` per channel) into a unit direction.
    pub fn set_tangent_map_rgb(&mut self, r: f32, g: f32, b: f32) {
        let n = (Vec3::new(r, g, b) - Vec3::splat(0.5)) * 2.0;
        self.tangent_map = n.normalize_or_zero();
    }

    pub fn tangent_map_value(&self) -> Vec3 {
        self.tangent_map
    }

    /// Sum of the segment lengths.
    pub fn compute_length(&mut self) {
        self.length = self.points.windows(2).map(|w| (w[1] - w[0]).length()).sum();
    }

    /// Direction of the segment starting at `index`; the last point uses the
    /// segment ending at it. Zero for coincident points.
    pub fn segment_direction(&self, index: usize) -> Option<Vec3> {
        let n = self.points.len();
        if index >= n {
            return None;
        }
        let d = if index == n - 1 {
            self.points[index] - self.points[index - 1]
        } else {
            self.points[index + 1] - self.points[index]
        };
        Some(d.normalize_or_zero())
    }

    /// Tangent at point `index`: the averaged direction of the two segments
    /// sharing it, or the single segment direction at the endpoints.
    pub fn segment_tangent(&self, index: usize) -> Option<Vec3> {
        let n = self.points.len();
        if index >= n {
            return None;
        }
        if index == 0 || index == n - 1 {
            return self.segment_direction(index);
        }
        Some((self.points[index + 1] - self.points[index - 1]).normalize_or_zero())
    }

    /// Index of the point just below `t` and the fraction of the following
    /// segment covered past it.
    ///
    /// `t <= 0` is the root, `t >= 1` the last point. A zero-length strand
    /// always maps to the root.
    pub fn point_index_along_length(&self, t: f32) -> (usize, f32) {
        let last = self.points.len() - 1;
        if t <= 0.0 || self.length <= 0.0 || t.is_nan() {
            return (0, 0.0);
        }
        if t >= 1.0 {
            return (last, 0.0);
        }

        let mut accumulated = 0.0;
        for i in 0..last {
            let l = (self.points[i + 1] - self.points[i]).length() / self.length;
            if accumulated + l > t {
                return (i, (t - accumulated) / l);
            }
            accumulated += l;
        }
        // Rounding left t just past the accumulated total
        (last, 0.0)
    }

    /// Position at `t` and the index of the segment it lies on.
    pub fn position_by_t(&self, t: f32) -> (Vec3, usize) {
        let (index, remain) = self.point_index_along_length(t);
        match self.points.get(index + 1) {
            Some(next) => (self.points[index].lerp(*next, remain), index),
            None => (self.points[index], index),
        }
    }

    /// Radius at `t`, or `None` if the strand has no radii.
    pub fn radius_by_t(&self, t: f32) -> Option<f32> {
        let (index, remain) = self.point_index_along_length(t);
        let r0 = *self.radii.get(index).or(self.radii.last())?;
        Some(match self.radii.get(index + 1) {
            Some(r1) if index + 1 < self.points.len() => r0 + (r1 - r0) * remain,
            _ => r0,
        })
    }

    /// Transported axis point at `t`.
    pub fn x_by_t(&self, t: f32) -> Vec3 {
        let (index, remain) = self.point_index_along_length(t);
        match self.x.get(index + 1) {
            Some(next) => self.x[index].lerp(*next, remain),
            None => self.x[index],
        }
    }

    /// Walk the reference axis from root to tip.
    ///
    /// The root axis comes from the tangent map (rotated by `spread` around
    /// the root tangent), else from the first orientation's X axis, else from
    /// `tangent × Z`. Each following axis point is found by casting a ray
    /// from the previous one along the previous segment onto the plane
    /// through the next point, normal to its tangent. Supplied orientations
    /// add only their incremental twist between consecutive points. A
    /// degenerate intersection copies the previous offset.
    pub fn compute_bended_x(&mut self, use_tangent_map: bool, spread: f32) {
        self.frame = FrameSettings {
            use_tangent_map,
            spread,
        };

        let root_tangent = self
            .segment_tangent(0)
            .and_then(|t| t.try_normalize())
            .unwrap_or(Vec3::Y);
        let mut previous_rot_x = self
            .orientations
            .first()
            .map(|q| axes_from_rotation(*q).0);

        let initial = if use_tangent_map {
            if is_full_turn(spread) {
                self.tangent_map
            } else {
                rotate_about(self.tangent_map, root_tangent, spread)
            }
        } else if let Some(rot_x) = previous_rot_x {
            rot_x
        } else {
            root_tangent.cross(Vec3::Z)
        };
        let initial = initial
            .try_normalize()
            .or_else(|| root_tangent.cross(Vec3::Z).try_normalize())
            .or_else(|| root_tangent.cross(Vec3::X).try_normalize())
            .unwrap_or(Vec3::X);

        let mut v = self.points[0] + initial * AXIS_LENGTH;
        self.x[0] = v;

        for i in 1..self.points.len() {
            let tangent = self.segment_tangent(i).unwrap_or(Vec3::ZERO);
            let previous_dir = self.segment_direction(i - 1).unwrap_or(Vec3::ZERO);
            let ray = Ray::new(v, previous_dir);

            let offset = ray
                .intersect_plane(self.points[i], tangent)
                .map(|hit| with_length(hit - self.points[i], AXIS_LENGTH))
                .filter(|offset| *offset != Vec3::ZERO);

            v = match offset {
                Some(mut offset) => {
                    if let Some(q) = self.orientations.get(i) {
                        let (rot_x, _, _) = axes_from_rotation(*q);
                        if let Some(prev) = previous_rot_x {
                            let angle = signed_angle(prev, rot_x, tangent);
                            if angle.abs() > EPSILON {
                                offset = rotate_about(offset, tangent, angle);
                            }
                        }
                        previous_rot_x = Some(rot_x);
                    }
                    self.points[i] + offset
                }
                None => self.points[i] + (self.x[i - 1] - self.points[i - 1]),
            };
            self.x[i] = v;
        }
    }

    /// Unit sideways direction at `t`, orthogonal to `tangent`.
    ///
    /// `pos` is the strand position at `t`; `tangent` must be normalized.
    pub fn bended_x_direction_by_t(&self, pos: Vec3, tangent: Vec3, t: f32) -> Vec3 {
        let x = self.x_by_t(t) - pos;
        let z = x.cross(tangent);
        tangent
            .cross(z)
            .try_normalize()
            .unwrap_or_else(|| tangent.any_orthonormal_vector())
    }

    /// This strand moved by `velocity * scale` per point.
    ///
    /// Radii and orientations are held; length and axis are recomputed with
    /// the same frame settings.
    pub fn displaced(&self, scale: f32) -> Strand {
        let mut moved = self.clone();
        moved.keys.clear();
        for (p, v) in moved.points.iter_mut().zip(&self.velocities) {
            *p += *v * scale;
        }
        moved.compute_length();
        moved.compute_bended_x(self.frame.use_tangent_map, self.frame.spread);
        moved
    }

    /// The strand as sampled at deform key `key`.
    ///
    /// Key radii/orientations replace the reference ones when they were set
    /// for this key.
    pub fn at_key(&self, key: usize) -> Result<Strand, StrandError> {
        let sample = self.keys.get(key).ok_or(StrandError::KeyOutOfRange {
            key,
            keys: self.keys.len(),
        })?;

        let mut keyed = self.clone();
        keyed.keys.clear();
        keyed.points.clone_from(&sample.points);
        if !sample.radii.is_empty() {
            keyed.radii.clone_from(&sample.radii);
        }
        if !sample.orientations.is_empty() {
            keyed.orientations.clone_from(&sample.orientations);
        }
        keyed.compute_length();
        keyed.compute_bended_x(self.frame.use_tangent_map, self.frame.spread);
        Ok(keyed)
    }
}

fn set_checked<T>(
    values: &mut [T],
    index: usize,
    value: T,
    what: &'static str,
) -> Result<(), StrandError> {
    let len = values.len();
    let slot = values
        .get_mut(index)
        .ok_or(StrandError::IndexOutOfRange { what, index, len })?;
    *slot = value;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn straight(n: usize, step: f32) -> Strand {
        let points: Vec<Vec3> = (0..n).map(|i| Vec3::new(0.0, i as f32 * step, 0.0)).collect();
        Strand::from_points(&points).unwrap()
    }

    #[test]
    fn test_new_clamps_to_two_points() {
        let strand = Strand::new(1, 0, 0, 0, false, 0);
        assert_eq!(strand.point_count(), 2);

        let strand = Strand::new(0, 0, 0, 0, true, 3);
        assert_eq!(strand.point_count(), 2);
        assert_eq!(strand.key_count(), 3);
    }

    #[test]
    fn test_bounds_checked_access() {
        let mut strand = Strand::new(3, 3, 0, 0, true, 2);
        assert!(strand.set_point(Vec3::ONE, 2).is_ok());
        assert_eq!(
            strand.set_point(Vec3::ONE, 3),
            Err(StrandError::IndexOutOfRange {
                what: "point",
                index: 3,
                len: 3
            })
        );
        assert_eq!(strand.point(3), None);
        assert!(strand.set_velocity(Vec3::ONE, 0).is_err());

        assert!(strand.set_mb_point(Vec3::X, 1, 1).is_ok());
        assert_eq!(strand.mb_point(1, 1), Some(Vec3::X));
        assert_eq!(
            strand.set_mb_point(Vec3::X, 0, 2),
            Err(StrandError::KeyOutOfRange { key: 2, keys: 2 })
        );
        assert_eq!(strand.mb_point(0, 5), None);
    }

    #[test]
    fn test_compute_length() {
        let strand = Strand::from_points(&[
            Vec3::ZERO,
            Vec3::new(3.0, 4.0, 0.0),
            Vec3::new(3.0, 4.0, 2.0),
        ])
        .unwrap();
        assert!((strand.length() - 7.0).abs() < 1e-6);
    }

    #[test]
    fn test_position_by_t_matches_lerp_on_straight_strand() {
        let strand = straight(5, 0.5);
        let (first, last) = (strand.points()[0], strand.points()[4]);

        for i in 0..=100 {
            let t = i as f32 / 100.0;
            let (p, index) = strand.position_by_t(t);
            let expected = first.lerp(last, t);
            assert!(
                (p - expected).length() < 1e-5,
                "t={} gave {:?}, expected {:?}",
                t,
                p,
                expected
            );
            assert!(index <= 4);
        }
    }

    #[test]
    fn test_position_by_t_clamps() {
        let strand = straight(3, 1.0);
        assert_eq!(strand.position_by_t(-1.0), (Vec3::ZERO, 0));
        assert_eq!(strand.position_by_t(2.0), (Vec3::new(0.0, 2.0, 0.0), 2));
    }

    #[test]
    fn test_point_index_along_length_uneven_segments() {
        // Segments of length 1 and 3
        let strand = Strand::from_points(&[Vec3::ZERO, Vec3::Y, Vec3::new(0.0, 4.0, 0.0)]).unwrap();

        let (index, remain) = strand.point_index_along_length(0.125);
        assert_eq!(index, 0);
        assert!((remain - 0.5).abs() < 1e-5);

        let (index, remain) = strand.point_index_along_length(0.625);
        assert_eq!(index, 1);
        assert!((remain - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_radius_by_t() {
        let mut strand = Strand::new(3, 3, 0, 0, false, 0);
        for i in 0..3 {
            strand.set_point(Vec3::new(0.0, i as f32, 0.0), i).unwrap();
            strand.set_radius(1.0 - i as f32 * 0.5, i).unwrap();
        }
        strand.compute_length();

        assert_eq!(strand.radius_by_t(0.0), Some(1.0));
        assert!((strand.radius_by_t(0.25).unwrap() - 0.75).abs() < 1e-5);
        assert_eq!(strand.radius_by_t(1.0), Some(0.0));

        let bare = straight(3, 1.0);
        assert_eq!(bare.radius_by_t(0.5), None);
    }

    #[test]
    fn test_bended_x_straight_strand() {
        let strand = straight(4, 1.0);
        for (p, x) in strand.points().iter().zip(strand.axis_points()) {
            let offset = *x - *p;
            assert!(
                (offset - Vec3::X * AXIS_LENGTH).length() < 1e-6,
                "offset {:?}",
                offset
            );
        }
    }

    #[test]
    fn test_bended_x_follows_bend_without_flip() {
        // Up along Y, then a right angle towards +Z
        let strand = Strand::from_points(&[
            Vec3::ZERO,
            Vec3::Y,
            Vec3::new(0.0, 1.0, 1.0),
            Vec3::new(0.0, 1.0, 2.0),
        ])
        .unwrap();

        for (i, (p, x)) in strand.points().iter().zip(strand.axis_points()).enumerate() {
            let offset = *x - *p;
            assert!(
                (offset.length() - AXIS_LENGTH).abs() < 1e-5,
                "axis length at {} is {}",
                i,
                offset.length()
            );
            // Bending in the YZ plane never rotates the X axis
            assert!(offset.normalize().dot(Vec3::X) > 0.999, "flip at {}: {:?}", i, offset);
        }
    }

    #[test]
    fn test_bended_x_along_z_uses_fallback_axis() {
        let strand = Strand::from_points(&[Vec3::ZERO, Vec3::Z, Vec3::Z * 2.0]).unwrap();
        for x in strand.axis_points() {
            assert!(x.is_finite());
        }
        let offset = strand.axis_points()[0] - strand.points()[0];
        assert!((offset.length() - AXIS_LENGTH).abs() < 1e-6);
        assert!(offset.dot(Vec3::Z).abs() < 1e-6);
    }

    #[test]
    fn test_bended_x_tangent_map_with_spread() {
        let mut strand = straight(3, 1.0);
        strand.set_tangent_map_rgb(0.5, 0.5, 1.0);
        assert!((strand.tangent_map_value() - Vec3::Z).length() < 1e-6);

        strand.compute_bended_x(true, 0.0);
        let offset = strand.axis_points()[0] - strand.points()[0];
        assert!((offset.normalize() - Vec3::Z).length() < 1e-5);

        // A quarter turn around +Y takes +Z to +X
        strand.compute_bended_x(true, FRAC_PI_2);
        let offset = strand.axis_points()[2] - strand.points()[2];
        assert!((offset.normalize() - Vec3::X).length() < 1e-4, "got {:?}", offset);
        assert_eq!(strand.frame_settings().spread, FRAC_PI_2);
    }

    #[test]
    fn test_bended_x_orientation_twist_is_incremental() {
        let mut strand = Strand::new(3, 0, 0, 3, false, 0);
        for i in 0..3 {
            strand.set_point(Vec3::new(0.0, i as f32, 0.0), i).unwrap();
        }
        // Root oriented with X, then a quarter twist around Y at point 2
        strand.set_orientation(Quat::IDENTITY, 0).unwrap();
        strand.set_orientation(Quat::IDENTITY, 1).unwrap();
        strand
            .set_orientation(Quat::from_rotation_y(FRAC_PI_2), 2)
            .unwrap();
        strand.compute_length();
        strand.compute_bended_x(false, 0.0);

        let x1 = (strand.axis_points()[1] - strand.points()[1]).normalize();
        let x2 = (strand.axis_points()[2] - strand.points()[2]).normalize();
        assert!((x1 - Vec3::X).length() < 1e-5, "x1 {:?}", x1);
        assert!((x2 - Vec3::NEG_Z).length() < 1e-4, "x2 {:?}", x2);
    }

    #[test]
    fn test_single_point_strand_is_degenerate_but_finite() {
        let strand = Strand::from_points(&[Vec3::new(1.0, 2.0, 3.0)]).unwrap();
        assert_eq!(strand.point_count(), 2);
        assert_eq!(strand.length(), 0.0);

        let (p, _) = strand.position_by_t(0.5);
        assert_eq!(p, Vec3::new(1.0, 2.0, 3.0));
        for x in strand.axis_points() {
            assert!(x.is_finite());
        }
        let dir = strand.bended_x_direction_by_t(p, Vec3::Y, 0.5);
        assert!(dir.is_finite());
        assert!((dir.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_points_rejected() {
        assert_eq!(
            Strand::from_points(&[]),
            Err(StrandError::EmptyStrand { strand: 0 })
        );
    }

    #[test]
    fn test_displaced_by_velocity() {
        let mut strand = Strand::new(2, 2, 2, 0, false, 0);
        strand.set_point(Vec3::ZERO, 0).unwrap();
        strand.set_point(Vec3::Y, 1).unwrap();
        strand.set_radius(0.5, 0).unwrap();
        strand.set_radius(0.25, 1).unwrap();
        strand.set_velocity(Vec3::new(24.0, 0.0, 0.0), 0).unwrap();
        strand.set_velocity(Vec3::new(0.0, 0.0, 48.0), 1).unwrap();
        strand.compute_length();
        strand.compute_bended_x(false, 0.0);

        let moved = strand.displaced(0.5 / 24.0);
        assert!((moved.points()[0] - Vec3::new(0.5, 0.0, 0.0)).length() < 1e-6);
        assert!((moved.points()[1] - Vec3::new(0.0, 1.0, 1.0)).length() < 1e-6);
        assert_eq!(moved.radii(), strand.radii());
        assert!((moved.length() - (0.25f32 + 1.0 + 1.0).sqrt()).abs() < 1e-5);
    }

    #[test]
    fn test_at_key_uses_key_geometry() {
        let mut strand = Strand::new(2, 2, 0, 0, true, 2);
        strand.set_point(Vec3::ZERO, 0).unwrap();
        strand.set_point(Vec3::Y, 1).unwrap();
        strand.set_radius(1.0, 0).unwrap();
        strand.set_radius(1.0, 1).unwrap();
        for key in 0..2 {
            let shift = Vec3::X * key as f32;
            strand.set_mb_point(shift, 0, key).unwrap();
            strand.set_mb_point(Vec3::Y * 2.0 + shift, 1, key).unwrap();
        }
        strand.compute_length();

        let keyed = strand.at_key(1).unwrap();
        assert_eq!(keyed.points()[0], Vec3::X);
        assert!((keyed.length() - 2.0).abs() < 1e-6);
        assert_eq!(keyed.key_count(), 0);

        assert!(strand.at_key(2).is_err());
    }

    #[test]
    fn test_at_key_without_key_radii_keeps_reference() {
        let mut strand = Strand::new(2, 2, 0, 2, true, 2);
        strand.set_point(Vec3::ZERO, 0).unwrap();
        strand.set_point(Vec3::Y, 1).unwrap();
        strand.set_radius(1.0, 0).unwrap();
        strand.set_radius(1.0, 1).unwrap();
        let twist = Quat::from_rotation_y(FRAC_PI_2);
        strand.set_orientation(twist, 0).unwrap();
        strand.set_orientation(twist, 1).unwrap();
        strand.set_mb_point(Vec3::ZERO, 0, 1).unwrap();
        strand.set_mb_point(Vec3::Y * 2.0, 1, 1).unwrap();
        strand.compute_length();

        let keyed = strand.at_key(1).unwrap();
        assert_eq!(keyed.radii(), &[1.0, 1.0], "reference radii must hold");
        assert_eq!(keyed.orientations(), &[twist, twist]);
        assert!((keyed.radius_by_t(0.5).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_at_key_partial_key_radii_seeded_from_reference() {
        let mut strand = Strand::new(2, 2, 0, 0, true, 1);
        strand.set_radius(0.5, 0).unwrap();
        strand.set_radius(0.25, 1).unwrap();
        strand.set_mb_point(Vec3::Y, 1, 0).unwrap();
        strand.set_mb_radius(2.0, 1, 0).unwrap();

        let keyed = strand.at_key(0).unwrap();
        assert_eq!(keyed.radii(), &[0.5, 2.0]);
    }

    #[test]
    fn test_weight_map_value_clamped() {
        let mut strand = Strand::new(2, 0, 0, 0, false, 0);
        strand.set_weight_map_value(1.5);
        assert_eq!(strand.weight_map_value(), 1.0);
        strand.set_weight_map_value(-0.5);
        assert_eq!(strand.weight_map_value(), 0.0);
        strand.set_weight_map_value(0.3);
        assert_eq!(strand.weight_map_value(), 0.3);
    }
}

//! Helpers for building and carrying local reference frames.

use std::f32::consts::TAU;

use glam::{Quat, Vec3};

/// Angle in `[0, 2π)` that takes `from` onto `to`, measured counter-clockwise
/// around `axis`.
///
/// Either input being zero gives 0.
pub fn signed_angle(from: Vec3, to: Vec3, axis: Vec3) -> f32 {
    let (Some(a), Some(b)) = (from.try_normalize(), to.try_normalize()) else {
        return 0.0;
    };

    let dot = a.dot(b);
    if dot >= 1.0 {
        return 0.0;
    }

    let angle = dot.max(-1.0).acos();
    if a.cross(b).dot(axis) < 0.0 {
        TAU - angle
    } else {
        angle
    }
}

/// Right-handed rotation of `v` by `angle` radians around `axis`.
///
/// A zero axis leaves `v` unchanged.
pub fn rotate_about(v: Vec3, axis: Vec3, angle: f32) -> Vec3 {
    match axis.try_normalize() {
        Some(axis) => Quat::from_axis_angle(axis, angle) * v,
        None => v,
    }
}

/// `v` rescaled to `length`. Zero stays zero.
#[inline]
pub fn with_length(v: Vec3, length: f32) -> Vec3 {
    v.normalize_or_zero() * length
}

/// The local X, Y and Z axes of a rotation.
pub fn axes_from_rotation(rotation: Quat) -> (Vec3, Vec3, Vec3) {
    (rotation * Vec3::X, rotation * Vec3::Y, rotation * Vec3::Z)
}

/// True for 0 and any whole multiple of a full turn.
pub fn is_full_turn(angle: f32) -> bool {
    let r = angle.rem_euclid(TAU);
    r < 1e-6 || TAU - r < 1e-6
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_signed_angle_quadrants() {
        assert!(signed_angle(Vec3::X, Vec3::X, Vec3::Y).abs() < 1e-6);

        // -Z is a quarter turn counter-clockwise around +Y
        let a = signed_angle(Vec3::X, Vec3::NEG_Z, Vec3::Y);
        assert!((a - FRAC_PI_2).abs() < 1e-5, "got {}", a);

        let a = signed_angle(Vec3::X, Vec3::NEG_X, Vec3::Y);
        assert!((a - PI).abs() < 1e-3, "got {}", a);

        let a = signed_angle(Vec3::X, Vec3::Z, Vec3::Y);
        assert!((a - 3.0 * FRAC_PI_2).abs() < 1e-5, "got {}", a);
    }

    #[test]
    fn test_signed_angle_zero_input() {
        assert_eq!(signed_angle(Vec3::ZERO, Vec3::X, Vec3::Y), 0.0);
        assert_eq!(signed_angle(Vec3::X, Vec3::ZERO, Vec3::Y), 0.0);
    }

    #[test]
    fn test_rotate_about_inverts_signed_angle() {
        let targets = [
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(-1.0, 0.0, 0.5),
            Vec3::new(0.2, 0.0, -3.0),
        ];
        for target in targets {
            let angle = signed_angle(Vec3::X, target, Vec3::Y);
            let rotated = rotate_about(Vec3::X, Vec3::Y, angle);
            let expected = target.normalize();
            assert!(
                (rotated - expected).length() < 1e-4,
                "rotating X by {} gave {:?}, expected {:?}",
                angle,
                rotated,
                expected
            );
        }
    }

    #[test]
    fn test_rotate_about_zero_axis() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(rotate_about(v, Vec3::ZERO, 1.0), v);
    }

    #[test]
    fn test_with_length() {
        let v = with_length(Vec3::new(3.0, 4.0, 0.0), 0.01);
        assert!((v.length() - 0.01).abs() < 1e-7);
        assert_eq!(with_length(Vec3::ZERO, 5.0), Vec3::ZERO);
    }

    #[test]
    fn test_axes_from_rotation() {
        let (x, y, z) = axes_from_rotation(Quat::from_rotation_y(FRAC_PI_2));
        assert!((x - Vec3::NEG_Z).length() < 1e-5);
        assert!((y - Vec3::Y).length() < 1e-5);
        assert!((z - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn test_is_full_turn() {
        assert!(is_full_turn(0.0));
        assert!(is_full_turn(TAU));
        assert!(is_full_turn(-TAU));
        assert!(!is_full_turn(0.1));
        assert!(!is_full_turn(PI));
    }
}

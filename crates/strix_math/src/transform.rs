// Transform utilities for Mat4
//
// Extends glam::Mat4 with the decompositions needed to place master shapes
// in the frame of the object that instances them.

use glam::{Mat3, Mat4, Quat, Vec3};

/// Extension trait for Mat4 to provide additional transform utilities
pub trait Mat4Ext {
    /// Keep the scale of the matrix, dropping rotation and translation.
    fn scale_only(&self) -> Mat4;

    /// Transform a surface normal (inverse transpose), renormalized.
    /// Degenerate matrices leave the normal untouched.
    fn transform_normal3(&self, normal: Vec3) -> Vec3;
}

impl Mat4Ext for Mat4 {
    fn scale_only(&self) -> Mat4 {
        let (scale, _, _) = self.to_scale_rotation_translation();
        Mat4::from_scale_rotation_translation(scale, Quat::IDENTITY, Vec3::ZERO)
    }

    fn transform_normal3(&self, normal: Vec3) -> Vec3 {
        let linear = Mat3::from_mat4(*self);
        if linear.determinant().abs() < f32::EPSILON {
            return normal;
        }
        let n = linear.inverse().transpose() * normal;
        n.try_normalize().unwrap_or(normal)
    }
}

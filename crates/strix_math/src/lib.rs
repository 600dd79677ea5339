// Re-export glam for convenience
pub use glam::*;

// Strix math types
mod frame;
mod interval;
mod ray;
mod transform;

pub use frame::{axes_from_rotation, is_full_turn, rotate_about, signed_angle, with_length};
pub use interval::Interval;
pub use ray::Ray;
pub use transform::Mat4Ext;

/// Tolerance under which a length or extent is treated as degenerate.
pub const EPSILON: f32 = 0.001;

//! Vector type aliases for world positions and planar flow.

use nalgebra::{Vector2, Vector3};

/// 3D vector type for world positions.
///
/// Alias for `nalgebra::Vector3<f32>`. The atmosphere is a 2D tile grid laid out
/// on the world X/Z plane, so the Y component is ignored by lookups.
pub type Vec3 = Vector3<f32>;

/// 2D vector on the tile plane, used for gas velocity (x = east, y = north).
pub type Vec2 = Vector2<f32>;

//! Position + orientation value type and look-rotation construction.
//!
//! Local axes follow the marker convention used throughout the crate:
//! - `+X`: right
//! - `+Y`: up (marker normal)
//! - `+Z`: forward (towards the top edge of the marker)

use std::f32::consts::PI;

use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};

/// Vectors shorter than this are treated as zero-length.
pub const NORMALIZE_EPSILON: f32 = 1e-5;

/// Rigid pose in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// World-space position
    pub position: Vector3<f32>,
    /// World-space orientation
    pub orientation: UnitQuaternion<f32>,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    #[inline]
    pub fn new(position: Vector3<f32>, orientation: UnitQuaternion<f32>) -> Self {
        Self {
            position,
            orientation,
        }
    }

    #[inline]
    pub fn identity() -> Self {
        Self::new(Vector3::zeros(), UnitQuaternion::identity())
    }

    /// Local `+Z` expressed in world space.
    #[inline]
    pub fn forward(&self) -> Vector3<f32> {
        self.orientation * Vector3::z()
    }

    /// Local `+Y` expressed in world space.
    #[inline]
    pub fn up(&self) -> Vector3<f32> {
        self.orientation * Vector3::y()
    }

    /// Local `+X` expressed in world space.
    #[inline]
    pub fn right(&self) -> Vector3<f32> {
        self.orientation * Vector3::x()
    }

    /// Map a point from the pose's local frame into world space.
    #[inline]
    pub fn transform_point(&self, local: &Vector3<f32>) -> Vector3<f32> {
        self.position + self.orientation * local
    }
}

/// Normalize `v`, returning `None` when it is (numerically) zero-length.
#[inline]
pub fn try_normalize(v: &Vector3<f32>) -> Option<Vector3<f32>> {
    v.try_normalize(NORMALIZE_EPSILON)
}

/// Unclamped linear interpolation between two points.
#[inline]
pub fn lerp_unclamped(a: &Vector3<f32>, b: &Vector3<f32>, t: f32) -> Vector3<f32> {
    a + (b - a) * t
}

/// Build the orientation whose local `+Z` points along `forward` and whose
/// local `+Y` is as close as possible to `up`.
///
/// ```text
/// right      = normalize(up x forward)
/// up'        = forward x right
/// basis      = [right | up' | forward]
/// ```
///
/// A zero `forward` yields the identity. When `up` is zero or parallel to
/// `forward`, the shortest-arc rotation from `+Z` to `forward` is returned.
pub fn look_rotation(forward: &Vector3<f32>, up: &Vector3<f32>) -> UnitQuaternion<f32> {
    let Some(forward) = try_normalize(forward) else {
        return UnitQuaternion::identity();
    };

    let Some(right) = try_normalize(&up.cross(&forward)) else {
        return UnitQuaternion::rotation_between(&Vector3::z(), &forward)
            .unwrap_or_else(|| UnitQuaternion::from_axis_angle(&Vector3::y_axis(), PI));
    };

    let corrected_up = forward.cross(&right);
    let basis = Matrix3::from_columns(&[right, corrected_up, forward]);
    UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(basis))
}

//! Reduces a free marker orientation to a wall- or floor-aligned one.
//!
//! World up is `+Y`.

use std::f32::consts::FRAC_1_SQRT_2;

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::tracker::pose::look_rotation;

/// cos(45°)
const COS_45: f32 = FRAC_1_SQRT_2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RotationConstraint {
    /// Orientation is left untouched
    #[default]
    AnyDirection,
    /// Marker on a wall: forward is world up, only yaw remains
    Vertical,
    /// Marker on a floor or ceiling: normal is world up or down
    Horizontal,
    /// Whichever of `Vertical` / `Horizontal` is closer
    VerticalOrHorizontal,
}

impl RotationConstraint {
    pub fn apply(self, rotation: &UnitQuaternion<f32>) -> UnitQuaternion<f32> {
        match self {
            Self::AnyDirection => *rotation,
            Self::Vertical => to_vertical(rotation),
            Self::Horizontal => to_horizontal(rotation),
            Self::VerticalOrHorizontal => {
                let up = rotation * Vector3::y();
                if up.y.abs() > COS_45 {
                    to_horizontal(rotation)
                } else {
                    to_vertical(rotation)
                }
            }
        }
    }
}

fn to_vertical(rotation: &UnitQuaternion<f32>) -> UnitQuaternion<f32> {
    let mut up = rotation * Vector3::y();
    up.y = 0.0;
    look_rotation(&Vector3::y(), &up)
}

fn to_horizontal(rotation: &UnitQuaternion<f32>) -> UnitQuaternion<f32> {
    let mut forward = rotation * Vector3::z();
    forward.y = 0.0;

    let up = rotation * Vector3::y();
    if up.y > 0.0 {
        look_rotation(&forward, &Vector3::y())
    } else {
        look_rotation(&forward, &-Vector3::y())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tilted() -> UnitQuaternion<f32> {
        UnitQuaternion::from_euler_angles(0.2, 0.9, -0.15)
    }

    /// Close to a wall-mounted code: top edge up, normal towards -Z, slight tilt.
    fn nearly_vertical() -> UnitQuaternion<f32> {
        look_rotation(&Vector3::new(0.1, 1.0, 0.05), &Vector3::new(0.05, -0.1, -1.0))
    }

    #[test]
    fn test_any_direction_is_identity() {
        let q = tilted();
        assert_eq!(RotationConstraint::AnyDirection.apply(&q), q);
    }

    #[test]
    fn test_vertical_points_forward_up() {
        let q = RotationConstraint::Vertical.apply(&nearly_vertical());
        assert_relative_eq!(q * Vector3::z(), Vector3::y(), epsilon = 1e-5);
        assert_relative_eq!((q * Vector3::y()).y, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_vertical_is_idempotent() {
        let once = RotationConstraint::Vertical.apply(&nearly_vertical());
        let twice = RotationConstraint::Vertical.apply(&once);
        assert!(once.angle_to(&twice) < 1e-4);
    }

    #[test]
    fn test_horizontal_resolves_polarity() {
        let facing_up = look_rotation(&Vector3::new(0.0, 0.2, 1.0), &Vector3::new(0.1, 1.0, 0.0));
        let q = RotationConstraint::Horizontal.apply(&facing_up);
        assert_relative_eq!(q * Vector3::y(), Vector3::y(), epsilon = 1e-5);
        assert_relative_eq!((q * Vector3::z()).y, 0.0, epsilon = 1e-5);

        let facing_down =
            look_rotation(&Vector3::new(0.0, 0.2, 1.0), &Vector3::new(0.1, -1.0, 0.0));
        let q = RotationConstraint::Horizontal.apply(&facing_down);
        assert_relative_eq!(q * Vector3::y(), -Vector3::y(), epsilon = 1e-5);
    }

    #[test]
    fn test_horizontal_is_idempotent() {
        let once = RotationConstraint::Horizontal.apply(&tilted());
        let twice = RotationConstraint::Horizontal.apply(&once);
        assert!(once.angle_to(&twice) < 1e-4);
    }

    #[test]
    fn test_vertical_or_horizontal_picks_closest() {
        let wall = nearly_vertical();
        let chosen = RotationConstraint::VerticalOrHorizontal.apply(&wall);
        let vertical = RotationConstraint::Vertical.apply(&wall);
        assert!(chosen.angle_to(&vertical) < 1e-6);

        let floor = look_rotation(&Vector3::new(0.3, 0.1, 1.0), &Vector3::new(0.0, 1.0, -0.1));
        let chosen = RotationConstraint::VerticalOrHorizontal.apply(&floor);
        let horizontal = RotationConstraint::Horizontal.apply(&floor);
        assert!(chosen.angle_to(&horizontal) < 1e-6);
    }

    #[test]
    fn test_vertical_or_horizontal_keeps_vertical_result() {
        for q in [tilted(), nearly_vertical()] {
            let vertical = RotationConstraint::Vertical.apply(&q);
            let chosen = RotationConstraint::VerticalOrHorizontal.apply(&vertical);
            assert!(chosen.angle_to(&vertical) < 1e-4);
        }
    }

    #[test]
    fn test_constraint_from_json() {
        let constraint: RotationConstraint =
            serde_json::from_str("\"VerticalOrHorizontal\"").unwrap();
        assert_eq!(constraint, RotationConstraint::VerticalOrHorizontal);
    }
}

//! Environment raycasting and camera model seams.

use std::fmt;

use nalgebra::{Point2, Vector3};
use thiserror::Error;

use crate::tracker::Pose;

/// World-space ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vector3<f32>,
    pub direction: Vector3<f32>,
}

impl Ray {
    pub fn new(origin: Vector3<f32>, direction: Vector3<f32>) -> Self {
        Self { origin, direction }
    }
}

/// Why an environment raycast produced no usable hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitStatus {
    NoHit,
    HitPointOccluded,
    HitPointOutsideOfCameraFrame,
    NotReady,
    NotSupported,
}

impl fmt::Display for HitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoHit => "no hit",
            Self::HitPointOccluded => "hit point occluded",
            Self::HitPointOutsideOfCameraFrame => "hit point outside of camera frame",
            Self::NotReady => "not ready",
            Self::NotSupported => "not supported",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("failed to raycast to environment: {status}")]
pub struct RaycastMiss {
    pub status: HitStatus,
}

impl RaycastMiss {
    pub fn new(status: HitStatus) -> Self {
        Self { status }
    }
}

/// Intersects rays with the reconstructed environment.
pub trait RaycastSource {
    /// World-space hit point of `ray`.
    fn raycast(&mut self, ray: &Ray) -> Result<Vector3<f32>, RaycastMiss>;

    /// Whether raycasting is available at all on this platform.
    fn is_supported(&self) -> bool {
        true
    }
}

/// Pose and intrinsics of the capturing camera.
pub trait CameraProvider {
    /// Camera pose in world space for the frame being processed, or `None`
    /// while the camera is not streaming.
    fn camera_pose(&self) -> Option<Pose>;

    /// Direction, in camera space, of the ray through an image pixel.
    /// The pixel origin is the bottom-left corner of the image.
    fn pixel_to_ray(&self, pixel: Point2<i32>) -> Vector3<f32>;

    /// Whether the camera can be used at all.
    fn is_available(&self) -> bool {
        true
    }
}

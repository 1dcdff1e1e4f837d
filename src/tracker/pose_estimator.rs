//! Marker pose and physical size from three raycast finder-pattern centers.

use nalgebra::Vector3;
use thiserror::Error;

use crate::tracker::marker::DetectedMarker;
use crate::tracker::pose::{Pose, lerp_unclamped, look_rotation, try_normalize};

/// Width of one QR finder pattern in grid modules.
pub const FINDER_PATTERN_CELLS: u32 = 7;

/// Error type for pose estimation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoseError {
    /// The corner points do not span a plane, or the cell span is empty.
    #[error("degenerate marker geometry: {reason}")]
    DegenerateGeometry { reason: &'static str },
}

/// World-space finder-pattern centers of one QR code.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerCorners {
    pub bottom_left: Vector3<f32>,
    pub top_left: Vector3<f32>,
    pub top_right: Vector3<f32>,
}

impl MarkerCorners {
    pub fn new(bottom_left: Vector3<f32>, top_left: Vector3<f32>, top_right: Vector3<f32>) -> Self {
        Self {
            bottom_left,
            top_left,
            top_right,
        }
    }
}

/// Pose and extent of a marker before its payload is attached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerGeometry {
    pub pose: Pose,
    pub physical_size: f32,
    pub physical_width: f32,
    pub physical_height: f32,
}

impl MarkerGeometry {
    /// Attach the decoded payload.
    pub fn into_marker(self, text: impl Into<String>, raw_bytes: Vec<u8>) -> DetectedMarker {
        DetectedMarker::new(
            self.pose,
            self.physical_size,
            self.physical_width,
            self.physical_height,
            text,
            raw_bytes,
        )
    }
}

/// Estimate the center pose and physical size of a marker.
///
/// `cell_size` is the number of grid modules across one side of the code.
/// The finder-pattern centers are `cell_size - 7` modules apart, so the
/// measured spans are scaled by `cell_size / (cell_size - 7)`.
pub fn estimate_marker_geometry(
    corners: &MarkerCorners,
    cell_size: u32,
) -> Result<MarkerGeometry, PoseError> {
    let MarkerCorners {
        bottom_left,
        top_left,
        top_right,
    } = corners;

    let forward =
        try_normalize(&(top_left - bottom_left)).ok_or(PoseError::DegenerateGeometry {
            reason: "bottom-left and top-left coincide",
        })?;
    let right = try_normalize(&(top_right - top_left)).ok_or(PoseError::DegenerateGeometry {
        reason: "top-left and top-right coincide",
    })?;
    let up = try_normalize(&forward.cross(&right)).ok_or(PoseError::DegenerateGeometry {
        reason: "corner points are collinear",
    })?;

    if cell_size <= FINDER_PATTERN_CELLS {
        return Err(PoseError::DegenerateGeometry {
            reason: "cell size does not exceed the finder pattern width",
        });
    }
    let effective_cells = (cell_size - FINDER_PATTERN_CELLS) as f32;
    let scale = cell_size as f32 / effective_cells;

    let physical_width = (top_right - top_left).norm() * scale;
    let physical_height = (top_left - bottom_left).norm() * scale;
    let physical_size = (physical_width + physical_height) / 2.0;

    let center = lerp_unclamped(bottom_left, top_right, 0.5);
    let orientation = look_rotation(&forward, &up);

    Ok(MarkerGeometry {
        pose: Pose::new(center, orientation),
        physical_size,
        physical_width,
        physical_height,
    })
}

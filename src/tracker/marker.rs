//! Resolved marker detections and their filter tags.

use crate::tracker::pose::Pose;

/// A QR code resolved into world space.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedMarker {
    /// Center pose; `forward` points to the top edge, `up` is the plane normal
    pub pose: Pose,
    /// Mean of `physical_width` and `physical_height`
    pub physical_size: f32,
    /// Extent along the marker's right axis
    pub physical_width: f32,
    /// Extent along the marker's forward axis
    pub physical_height: f32,
    /// Decoded payload as text
    pub text: String,
    /// Decoded payload as raw bytes
    pub raw_bytes: Vec<u8>,
}

impl DetectedMarker {
    pub fn new(
        pose: Pose,
        physical_size: f32,
        physical_width: f32,
        physical_height: f32,
        text: impl Into<String>,
        raw_bytes: Vec<u8>,
    ) -> Self {
        Self {
            pose,
            physical_size,
            physical_width,
            physical_height,
            text: text.into(),
            raw_bytes,
        }
    }
}

/// Filter verdict attached to a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterState {
    /// Target not present this cycle
    #[default]
    NotDetected,
    /// Detection accepted so far
    Valid,
    /// Detection present but rejected by a filter
    Ignored,
}

/// A detection flowing through the filter chain.
///
/// A marker is carried iff the state is not [`FilterState::NotDetected`];
/// the constructors are the only way to build one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaggedDetection {
    state: FilterState,
    marker: Option<DetectedMarker>,
}

impl TaggedDetection {
    pub fn not_detected() -> Self {
        Self {
            state: FilterState::NotDetected,
            marker: None,
        }
    }

    pub fn valid(marker: DetectedMarker) -> Self {
        Self {
            state: FilterState::Valid,
            marker: Some(marker),
        }
    }

    pub fn ignored(marker: DetectedMarker) -> Self {
        Self {
            state: FilterState::Ignored,
            marker: Some(marker),
        }
    }

    /// `Valid` when a marker is given, `NotDetected` otherwise.
    pub fn from_option(marker: Option<DetectedMarker>) -> Self {
        match marker {
            Some(marker) => Self::valid(marker),
            None => Self::not_detected(),
        }
    }

    #[inline]
    pub fn state(&self) -> FilterState {
        self.state
    }

    #[inline]
    pub fn marker(&self) -> Option<&DetectedMarker> {
        self.marker.as_ref()
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.state == FilterState::Valid
    }

    pub fn into_marker(self) -> Option<DetectedMarker> {
        self.marker
    }

    /// Re-tag a `Valid` detection as `Ignored`; other states pass through.
    pub fn into_ignored(self) -> Self {
        match (self.state, self.marker) {
            (FilterState::Valid, Some(marker)) => Self::ignored(marker),
            (state, marker) => Self { state, marker },
        }
    }
}

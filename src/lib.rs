//! QR code pose estimation and tracking.
//!
//! Per-frame QR detections are lifted into world space with environment
//! raycasts, estimated into a pose and physical size, filtered, and fed to
//! per-marker trackers that publish a stabilized pose and lifecycle events.

pub mod integration;
pub mod tracker;

pub use integration::{
    CameraProvider, CancellationToken, CycleOutcome, DecodeSource, DetectionCycleDriver,
    DriverConfig, Frame, RawDetection, RawDetectionBuilder, Ray, RaycastSource,
};
pub use tracker::{
    AnchorPoint, DetectedMarker, FilterChain, FilterConfig, Pose, QrTracker, RotationConstraint,
    TaggedDetection, TrackerConfig, TrackingEvent, TrackingState,
};

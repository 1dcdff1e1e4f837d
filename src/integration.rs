//! Integration module for connecting QR decoders, environment raycasting and
//! camera models with the marker trackers.
//!
//! This module provides the oracle traits, a decode worker thread and the
//! detection cycle driver that ties them together.

mod builder;
mod cancel;
mod detector;
mod pipeline;
mod raycast;
mod worker;

pub use builder::RawDetectionBuilder;
pub use cancel::CancellationToken;
pub use detector::{DecodeSource, Frame, RawDetection};
pub use pipeline::{
    CycleOutcome, CycleReport, DetectionCycleDriver, DriverConfig, DriverError, ResolveError,
    TrackerId,
};
pub use raycast::{CameraProvider, HitStatus, Ray, RaycastMiss, RaycastSource};
pub use worker::{DecodeError, DecodeWorker};

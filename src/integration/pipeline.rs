//! DetectionCycleDriver for combining QR decoding, raycasting and tracking.

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use nalgebra::{Point2, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tracker::{
    DetectedMarker, HandlerResult, MarkerCorners, Pose, PoseError, QrTracker, Subscribers,
    SubscriptionId, TrackerConfig, TrackingEvent, estimate_marker_geometry,
};

use super::{
    CameraProvider, CancellationToken, DecodeSource, Frame, RawDetection, Ray, RaycastMiss,
    RaycastSource,
};

/// How long `run` waits for a frame before re-checking cancellation.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Configuration for the DetectionCycleDriver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Maximum detection cycles per second; `<= 0` or NaN runs every tick
    pub detection_frame_rate: f32,
    /// Template for trackers created automatically for unseen marker texts
    pub auto_track: Option<TrackerConfig>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            detection_frame_rate: 0.0,
            auto_track: None,
        }
    }
}

/// Error type for driver initialization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("environment raycasting is not available")]
    RaycastUnavailable,
    #[error("camera is not available")]
    CameraUnavailable,
}

/// Why a raw detection could not be turned into a marker.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("failed to get cell size from QR code")]
    MissingCellSize,
    #[error("expected at least 3 result points, got {0}")]
    TooFewPoints(usize),
    #[error(transparent)]
    Raycast(#[from] RaycastMiss),
    #[error(transparent)]
    Geometry(#[from] PoseError),
}

/// Index of a tracker owned by a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackerId(pub usize);

/// Result of one completed detection cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Markers resolved this cycle, in decoder order
    pub markers: Vec<DetectedMarker>,
    /// Raw detections dropped during resolution
    pub dropped: usize,
    /// Events emitted by the trackers, in emission order
    pub events: Vec<(TrackerId, TrackingEvent)>,
}

/// What a call to [`DetectionCycleDriver::tick`] did.
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// Cancellation was observed; nothing was dispatched
    Cancelled,
    /// The driver is disabled
    Disabled,
    /// The minimum interval since the last cycle has not elapsed
    Throttled,
    /// The camera has no pose for this frame
    CameraNotReady,
    Completed(CycleReport),
}

/// Runs decode -> raycast -> pose estimation -> tracking once per tick.
///
/// Owns its trackers; each tracker's filter windows and state are touched
/// only from the driver's cycle, one cycle at a time.
pub struct DetectionCycleDriver<D, R, C>
where
    D: DecodeSource,
    R: RaycastSource,
    C: CameraProvider,
{
    config: DriverConfig,
    decoder: D,
    raycaster: R,
    camera: C,
    trackers: Vec<QrTracker>,
    marker_subscribers: Subscribers<[DetectedMarker]>,
    cancel: CancellationToken,
    enabled: bool,
    last_detection: Option<Instant>,
}

impl<D, R, C> DetectionCycleDriver<D, R, C>
where
    D: DecodeSource,
    R: RaycastSource,
    C: CameraProvider,
{
    /// Create a driver; fails if a collaborator is unavailable.
    pub fn new(
        config: DriverConfig,
        decoder: D,
        raycaster: R,
        camera: C,
    ) -> Result<Self, DriverError> {
        if !raycaster.is_supported() {
            log::error!("{}", DriverError::RaycastUnavailable);
            return Err(DriverError::RaycastUnavailable);
        }
        if !camera.is_available() {
            log::error!("{}", DriverError::CameraUnavailable);
            return Err(DriverError::CameraUnavailable);
        }

        Ok(Self {
            config,
            decoder,
            raycaster,
            camera,
            trackers: Vec::new(),
            marker_subscribers: Subscribers::new(),
            cancel: CancellationToken::new(),
            enabled: true,
            last_detection: None,
        })
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn set_detection_frame_rate(&mut self, rate: f32) {
        self.config.detection_frame_rate = rate;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// A disabled driver skips every tick without decoding.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Token that stops the driver when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn add_tracker(&mut self, tracker: QrTracker) -> TrackerId {
        self.trackers.push(tracker);
        TrackerId(self.trackers.len() - 1)
    }

    pub fn trackers(&self) -> &[QrTracker] {
        &self.trackers
    }

    pub fn tracker(&self, id: TrackerId) -> Option<&QrTracker> {
        self.trackers.get(id.0)
    }

    pub fn tracker_mut(&mut self, id: TrackerId) -> Option<&mut QrTracker> {
        self.trackers.get_mut(id.0)
    }

    /// First tracker targeting `text`.
    pub fn find_tracker(&self, text: &str) -> Option<TrackerId> {
        self.trackers
            .iter()
            .position(|tracker| tracker.target_text() == text)
            .map(TrackerId)
    }

    /// Subscribe to the full list of markers resolved in each cycle.
    pub fn subscribe_markers<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&[DetectedMarker]) -> HandlerResult + Send + 'static,
    {
        self.marker_subscribers.subscribe(handler)
    }

    pub fn unsubscribe_markers(&mut self, id: SubscriptionId) -> bool {
        self.marker_subscribers.unsubscribe(id)
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn raycaster(&self) -> &R {
        &self.raycaster
    }

    pub fn camera(&self) -> &C {
        &self.camera
    }

    /// Run one detection cycle on `frame` if the driver is due at `now`.
    pub fn tick(&mut self, now: Instant, frame: &Frame) -> CycleOutcome {
        if self.cancel.is_cancelled() {
            return CycleOutcome::Cancelled;
        }
        if !self.enabled {
            return CycleOutcome::Disabled;
        }
        if !self.is_due(now) {
            log::trace!("detection throttled");
            return CycleOutcome::Throttled;
        }
        let Some(camera_pose) = self.camera.camera_pose() else {
            log::trace!("camera pose not ready");
            return CycleOutcome::CameraNotReady;
        };
        self.last_detection = Some(now);

        let raw_detections = match self
            .decoder
            .decode(&frame.pixels, frame.width, frame.height)
        {
            Ok(raw_detections) => raw_detections,
            Err(err) => {
                log::warn!("QR decoding failed: {err}");
                Vec::new()
            }
        };

        if self.cancel.is_cancelled() {
            return CycleOutcome::Cancelled;
        }

        let mut report = CycleReport::default();
        for raw in &raw_detections {
            match self.resolve(raw, frame.height, &camera_pose) {
                Ok(marker) => report.markers.push(marker),
                Err(err) => {
                    log::warn!("dropping QR code {:?}: {err}", raw.text);
                    report.dropped += 1;
                }
            }
        }

        self.marker_subscribers.emit(&report.markers);
        self.spawn_auto_trackers(&report.markers);

        for (index, tracker) in self.trackers.iter_mut().enumerate() {
            let events = tracker.update(&report.markers);
            report
                .events
                .extend(events.into_iter().map(|event| (TrackerId(index), event)));
        }

        CycleOutcome::Completed(report)
    }

    /// Consume frames until the channel closes or the driver is cancelled.
    pub fn run(&mut self, frames: &Receiver<Frame>) {
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            match frames.recv_timeout(CANCEL_POLL_INTERVAL) {
                Ok(frame) => {
                    if let CycleOutcome::Cancelled = self.tick(Instant::now(), &frame) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        log::debug!("detection loop stopped");
    }

    /// Cancel the driver; later ticks return [`CycleOutcome::Cancelled`].
    pub fn shutdown(&mut self) {
        self.cancel.cancel();
    }

    fn is_due(&self, now: Instant) -> bool {
        let rate = self.config.detection_frame_rate;
        if rate.is_nan() || rate <= 0.0 {
            return true;
        }
        let Some(last) = self.last_detection else {
            return true;
        };
        // An interval too long to represent is never reached.
        Duration::try_from_secs_f32(1.0 / rate)
            .ok()
            .and_then(|interval| last.checked_add(interval))
            .is_some_and(|due| now >= due)
    }

    fn resolve(
        &mut self,
        raw: &RawDetection,
        image_height: u32,
        camera_pose: &Pose,
    ) -> Result<DetectedMarker, ResolveError> {
        let cell_size = raw.cell_size.ok_or(ResolveError::MissingCellSize)?;
        let [bottom_left, top_left, top_right, ..] = raw.corner_points.as_slice() else {
            return Err(ResolveError::TooFewPoints(raw.corner_points.len()));
        };

        let corners = MarkerCorners::new(
            self.raycast_pixel(bottom_left, image_height, camera_pose)?,
            self.raycast_pixel(top_left, image_height, camera_pose)?,
            self.raycast_pixel(top_right, image_height, camera_pose)?,
        );

        let geometry = estimate_marker_geometry(&corners, cell_size)?;
        Ok(geometry.into_marker(raw.text.clone(), raw.raw_bytes.clone()))
    }

    /// Raycast through an image point given with a top-left origin.
    fn raycast_pixel(
        &mut self,
        point: &Point2<f32>,
        image_height: u32,
        camera_pose: &Pose,
    ) -> Result<Vector3<f32>, RaycastMiss> {
        let pixel = Point2::new(
            point.x.round() as i32,
            (image_height as f32 - point.y).round() as i32,
        );
        let direction = camera_pose.orientation * self.camera.pixel_to_ray(pixel);
        self.raycaster
            .raycast(&Ray::new(camera_pose.position, direction))
    }

    fn spawn_auto_trackers(&mut self, markers: &[DetectedMarker]) {
        let Some(template) = &self.config.auto_track else {
            return;
        };
        let mut spawned: Vec<QrTracker> = Vec::new();
        for marker in markers {
            let known = self
                .trackers
                .iter()
                .chain(spawned.iter())
                .any(|tracker| tracker.target_text() == marker.text);
            if !known {
                log::debug!("auto-tracking QR code {:?}", marker.text);
                spawned.push(QrTracker::new(TrackerConfig {
                    target_text: marker.text.clone(),
                    ..template.clone()
                }));
            }
        }
        self.trackers.extend(spawned);
    }
}

impl<D, R, C> Drop for DetectionCycleDriver<D, R, C>
where
    D: DecodeSource,
    R: RaycastSource,
    C: CameraProvider,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}

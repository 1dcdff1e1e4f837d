//! Per-target tracking state machine.

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::tracker::events::{HandlerResult, Subscribers, SubscriptionId, TrackingEvent};
use crate::tracker::filter::{FilterChain, FilterConfig, MarkerFilter};
use crate::tracker::marker::{DetectedMarker, FilterState, TaggedDetection};
use crate::tracker::pose::Pose;
use crate::tracker::rotation_constraint::RotationConstraint;
use crate::tracker::track_state::TrackingState;

/// Point of the marker plane the published transform snaps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AnchorPoint {
    #[default]
    Center,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl AnchorPoint {
    /// Offset from the marker center in the marker's local frame
    /// (`x` = right, `z` = forward/top).
    pub fn local_offset(self, marker_size: f32) -> Vector3<f32> {
        let half = marker_size / 2.0;
        match self {
            Self::Center => Vector3::zeros(),
            Self::TopLeft => Vector3::new(-half, 0.0, half),
            Self::TopRight => Vector3::new(half, 0.0, half),
            Self::BottomLeft => Vector3::new(-half, 0.0, -half),
            Self::BottomRight => Vector3::new(half, 0.0, -half),
        }
    }

    /// Move a marker center pose onto this anchor; orientation is kept.
    pub fn apply(self, center: &Pose, marker_size: f32) -> Pose {
        if self == Self::Center {
            return *center;
        }
        Pose::new(
            center.transform_point(&self.local_offset(marker_size)),
            center.orientation,
        )
    }
}

/// Configuration for the QrTracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Only markers whose text equals this are tracked
    pub target_text: String,
    pub anchor_point: AnchorPoint,
    /// Publish `physical_size` as a uniform scale
    pub scale_by_physical_size: bool,
    pub rotation_constraint: RotationConstraint,
    /// Filter stages, applied in order
    pub filters: Vec<FilterConfig>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            target_text: String::new(),
            anchor_point: AnchorPoint::Center,
            scale_by_physical_size: false,
            rotation_constraint: RotationConstraint::AnyDirection,
            filters: Vec::new(),
        }
    }
}

impl TrackerConfig {
    pub fn for_target(target_text: impl Into<String>) -> Self {
        Self {
            target_text: target_text.into(),
            ..Self::default()
        }
    }
}

/// Stabilized output of a tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedTransform {
    pub position: Vector3<f32>,
    pub orientation: UnitQuaternion<f32>,
    /// Uniform scale, present when scaling by physical size is enabled
    pub scale: Option<f32>,
}

/// Tracks one QR code, identified by its text, across detection cycles.
#[derive(Debug)]
pub struct QrTracker {
    config: TrackerConfig,
    filters: FilterChain,
    state: TrackingState,
    transform: Option<TrackedTransform>,
    last_marker: Option<DetectedMarker>,
    subscribers: Subscribers<TrackingEvent>,
}

impl QrTracker {
    pub fn new(config: TrackerConfig) -> Self {
        let filters = FilterChain::from_configs(&config.filters);
        Self::with_filters(config, filters)
    }

    /// Use a prebuilt filter chain instead of `config.filters`.
    pub fn with_filters(config: TrackerConfig, filters: FilterChain) -> Self {
        Self {
            config,
            filters,
            state: TrackingState::Idle,
            transform: None,
            last_marker: None,
            subscribers: Subscribers::new(),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn target_text(&self) -> &str {
        &self.config.target_text
    }

    pub fn set_target_text(&mut self, target_text: impl Into<String>) {
        self.config.target_text = target_text.into();
    }

    pub fn rotation_constraint(&self) -> RotationConstraint {
        self.config.rotation_constraint
    }

    pub fn set_rotation_constraint(&mut self, constraint: RotationConstraint) {
        self.config.rotation_constraint = constraint;
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    /// Last published transform; unchanged by ignored and lost cycles.
    pub fn transform(&self) -> Option<&TrackedTransform> {
        self.transform.as_ref()
    }

    /// Marker of the last valid cycle, after filtering.
    pub fn last_marker(&self) -> Option<&DetectedMarker> {
        self.last_marker.as_ref()
    }

    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&TrackingEvent) -> HandlerResult + Send + 'static,
    {
        self.subscribers.subscribe(handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Pick this tracker's target out of one cycle's markers.
    pub fn select(&self, markers: &[DetectedMarker]) -> TaggedDetection {
        TaggedDetection::from_option(
            markers
                .iter()
                .find(|marker| marker.text == self.config.target_text)
                .cloned(),
        )
    }

    /// Run one detection cycle: select, filter, update state and notify.
    ///
    /// Returns the events emitted this cycle, in emission order.
    pub fn update(&mut self, markers: &[DetectedMarker]) -> Vec<TrackingEvent> {
        let detection = self.select(markers);
        let filtered = self.filters.process(detection);
        self.handle_filtered(filtered)
    }

    /// Advance the state machine with an already filtered detection.
    pub fn handle_filtered(&mut self, detection: TaggedDetection) -> Vec<TrackingEvent> {
        let mut events = Vec::new();

        match detection.state() {
            FilterState::NotDetected => {
                if self.state == TrackingState::Tracking {
                    self.state = TrackingState::Lost;
                    log::debug!("lost QR code {:?}", self.config.target_text);
                    events.push(TrackingEvent::Lost);
                }
            }
            FilterState::Ignored => {}
            FilterState::Valid => {
                if let Some(marker) = detection.into_marker() {
                    self.publish(&marker);

                    let first_detection = self.state == TrackingState::Idle;
                    if self.state != TrackingState::Tracking {
                        log::debug!("tracking QR code {:?}", marker.text);
                    }
                    self.state = TrackingState::Tracking;

                    if first_detection {
                        events.push(TrackingEvent::FirstDetected(marker.clone()));
                    }
                    events.push(TrackingEvent::Detected(marker.clone()));
                    self.last_marker = Some(marker);
                }
            }
        }

        for event in &events {
            self.subscribers.emit(event);
        }
        events
    }

    fn publish(&mut self, marker: &DetectedMarker) {
        let anchor_pose = self
            .config
            .anchor_point
            .apply(&marker.pose, marker.physical_size);
        let orientation = self
            .config
            .rotation_constraint
            .apply(&anchor_pose.orientation);

        self.transform = Some(TrackedTransform {
            position: anchor_pose.position,
            orientation,
            scale: self
                .config
                .scale_by_physical_size
                .then_some(marker.physical_size),
        });
    }
}

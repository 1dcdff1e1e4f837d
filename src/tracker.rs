mod aspect_ratio_filter;
mod events;
mod filter;
mod marker;
mod pose;
mod pose_estimator;
mod qr_tracker;
mod rotation_constraint;
mod track_state;
mod zscore_filter;

pub use aspect_ratio_filter::{AspectRatioFilter, DEFAULT_ASPECT_RATIO_THRESHOLD};
pub use events::{HandlerError, HandlerResult, Subscribers, SubscriptionId, TrackingEvent};
pub use filter::{FilterChain, FilterConfig, FilterStage, MarkerFilter};
pub use marker::{DetectedMarker, FilterState, TaggedDetection};
pub use pose::{Pose, lerp_unclamped, look_rotation};
pub use pose_estimator::{
    FINDER_PATTERN_CELLS, MarkerCorners, MarkerGeometry, PoseError, estimate_marker_geometry,
};
pub use qr_tracker::{AnchorPoint, QrTracker, TrackedTransform, TrackerConfig};
pub use rotation_constraint::RotationConstraint;
pub use track_state::TrackingState;
pub use zscore_filter::{
    Aggregation, DEFAULT_WINDOW_SIZE, DEFAULT_Z_SCORE_THRESHOLD, ZScoreFilter,
};

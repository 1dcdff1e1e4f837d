/// Lifecycle state of a single tracked marker.
///
/// `Lost` is re-enterable: the next valid detection moves the tracker back
/// to `Tracking` without counting as a first detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingState {
    /// Never detected yet
    #[default]
    Idle,
    /// Detected in the most recent non-ignored cycle
    Tracking,
    /// Previously tracked, currently not detected
    Lost,
}

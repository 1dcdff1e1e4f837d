//! Rejects detections whose physical extent is far from square.

use crate::tracker::filter::MarkerFilter;
use crate::tracker::marker::{DetectedMarker, TaggedDetection};

pub const DEFAULT_ASPECT_RATIO_THRESHOLD: f32 = 0.95;

#[derive(Debug, Clone)]
pub struct AspectRatioFilter {
    threshold: f32,
}

impl Default for AspectRatioFilter {
    fn default() -> Self {
        Self::new(DEFAULT_ASPECT_RATIO_THRESHOLD)
    }
}

impl AspectRatioFilter {
    /// `threshold` is the minimum accepted `short side / long side` ratio.
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}

impl MarkerFilter for AspectRatioFilter {
    fn process(&mut self, detection: TaggedDetection) -> TaggedDetection {
        if !detection.is_valid() {
            return detection;
        }
        let Some(ratio) = detection.marker().map(aspect_ratio) else {
            return detection;
        };

        if ratio < self.threshold {
            detection.into_ignored()
        } else {
            detection
        }
    }
}

fn aspect_ratio(marker: &DetectedMarker) -> f32 {
    let width = marker.physical_width;
    let height = marker.physical_height;
    if width > height {
        height / width
    } else {
        width / height
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::marker::FilterState;
    use crate::tracker::pose::Pose;

    fn marker(width: f32, height: f32) -> DetectedMarker {
        DetectedMarker::new(
            Pose::identity(),
            (width + height) / 2.0,
            width,
            height,
            "qr",
            vec![1, 2, 3],
        )
    }

    #[test]
    fn test_nearly_square_stays_valid() {
        let mut filter = AspectRatioFilter::new(0.95);
        let out = filter.process(TaggedDetection::valid(marker(10.0, 9.6)));
        assert_eq!(out.state(), FilterState::Valid);
    }

    #[test]
    fn test_elongated_becomes_ignored() {
        let mut filter = AspectRatioFilter::new(0.95);
        let input = marker(10.0, 9.0);
        let out = filter.process(TaggedDetection::valid(input.clone()));
        assert_eq!(out.state(), FilterState::Ignored);
        assert_eq!(out.marker(), Some(&input));
    }

    #[test]
    fn test_ratio_is_orientation_independent() {
        let mut filter = AspectRatioFilter::new(0.95);
        let out = filter.process(TaggedDetection::valid(marker(9.0, 10.0)));
        assert_eq!(out.state(), FilterState::Ignored);
    }

    #[test]
    fn test_non_valid_inputs_pass_through() {
        let mut filter = AspectRatioFilter::default();
        assert_eq!(
            filter.process(TaggedDetection::not_detected()),
            TaggedDetection::not_detected()
        );

        let ignored = TaggedDetection::ignored(marker(10.0, 10.0));
        assert_eq!(filter.process(ignored.clone()), ignored);
    }
}

//! Sliding-window z-score outlier rejection over marker positions.

use std::collections::VecDeque;

use nalgebra::Vector3;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::tracker::filter::MarkerFilter;
use crate::tracker::marker::{DetectedMarker, TaggedDetection};
use crate::tracker::pose::{Pose, look_rotation, try_normalize};

pub const DEFAULT_WINDOW_SIZE: usize = 16;
pub const DEFAULT_Z_SCORE_THRESHOLD: f32 = 0.5;

/// How the inliers of the window are turned into one output detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Aggregation {
    /// Mean pose and size of all inliers
    #[default]
    Average,
    /// Most recent inlier
    Latest,
}

/// Position statistics of the window.
#[derive(Debug, Clone)]
struct WindowStats {
    /// Population variance of the positions (mean squared distance).
    variance: f32,
    /// Squared distance of each window entry from the mean, in window order.
    squared_distances: Array1<f32>,
}

impl WindowStats {
    fn is_inlier(&self, index: usize, threshold: f32) -> bool {
        let squared_distance = self.squared_distances[index];
        if self.variance > 0.0 && self.variance.is_finite() {
            squared_distance / self.variance < threshold
        } else if self.variance == 0.0 {
            // Every sample sits on the mean.
            squared_distance == 0.0
        } else {
            false
        }
    }
}

/// Keeps the last `window_size` valid detections and replaces each new one
/// with an outlier-free aggregate of the window.
#[derive(Debug, Clone)]
pub struct ZScoreFilter {
    window_size: usize,
    z_score_threshold: f32,
    aggregation: Aggregation,
    window: VecDeque<DetectedMarker>,
}

impl Default for ZScoreFilter {
    fn default() -> Self {
        Self::new(
            DEFAULT_WINDOW_SIZE,
            DEFAULT_Z_SCORE_THRESHOLD,
            Aggregation::default(),
        )
    }
}

impl ZScoreFilter {
    /// A `window_size` of zero is raised to one.
    pub fn new(window_size: usize, z_score_threshold: f32, aggregation: Aggregation) -> Self {
        let window_size = window_size.max(1);
        Self {
            window_size,
            z_score_threshold,
            aggregation,
            window: VecDeque::with_capacity(window_size),
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn aggregation(&self) -> Aggregation {
        self.aggregation
    }

    /// Number of detections currently held.
    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn clear(&mut self) {
        self.window.clear();
    }

    fn push(&mut self, marker: DetectedMarker) {
        self.window.push_back(marker);
        while self.window.len() > self.window_size {
            self.window.pop_front();
        }
    }

    fn stats(&self) -> Option<WindowStats> {
        let positions = Array2::from_shape_fn((self.window.len(), 3), |(i, j)| {
            self.window[i].pose.position[j]
        });
        let mean = positions.mean_axis(Axis(0))?;

        let deltas = &positions - &mean;
        let squared_distances = (&deltas * &deltas).sum_axis(Axis(1));
        let variance = squared_distances.mean()?;

        Some(WindowStats {
            variance,
            squared_distances,
        })
    }

    fn inliers(&self, stats: &WindowStats) -> Vec<&DetectedMarker> {
        let threshold = self.z_score_threshold * self.z_score_threshold;
        self.window
            .iter()
            .enumerate()
            .filter(|(i, _)| stats.is_inlier(*i, threshold))
            .map(|(_, marker)| marker)
            .collect()
    }
}

impl MarkerFilter for ZScoreFilter {
    fn process(&mut self, detection: TaggedDetection) -> TaggedDetection {
        if !detection.is_valid() {
            return detection;
        }
        let Some(marker) = detection.into_marker() else {
            return TaggedDetection::not_detected();
        };
        self.push(marker);

        let inliers = match self.stats() {
            Some(stats) => self.inliers(&stats),
            None => Vec::new(),
        };

        let aggregated = match self.aggregation {
            Aggregation::Latest => inliers.last().map(|m| (*m).clone()),
            Aggregation::Average => average(&inliers),
        };

        // No inliers: fall back to the newest sample.
        match aggregated.or_else(|| self.window.back().cloned()) {
            Some(marker) => TaggedDetection::valid(marker),
            None => TaggedDetection::not_detected(),
        }
    }
}

/// Mean pose and size of `markers`; payload is taken from the last one.
///
/// The orientation is rebuilt from the averaged forward and right axes.
fn average(markers: &[&DetectedMarker]) -> Option<DetectedMarker> {
    let last = markers.last()?;
    let count = markers.len() as f32;

    let mut sum_position = Vector3::zeros();
    let mut sum_forward = Vector3::zeros();
    let mut sum_right = Vector3::zeros();
    let mut sum_size = 0.0;
    let mut sum_width = 0.0;
    let mut sum_height = 0.0;

    for marker in markers {
        sum_position += marker.pose.position;
        sum_forward += marker.pose.forward();
        sum_right += marker.pose.right();
        sum_size += marker.physical_size;
        sum_width += marker.physical_width;
        sum_height += marker.physical_height;
    }

    let position = sum_position / count;
    let orientation = match (
        try_normalize(&(sum_forward / count)),
        try_normalize(&(sum_right / count)),
    ) {
        (Some(forward), Some(right)) => look_rotation(&forward, &forward.cross(&right)),
        // Opposing samples cancelled out.
        _ => last.pose.orientation,
    };

    Some(DetectedMarker::new(
        Pose::new(position, orientation),
        sum_size / count,
        sum_width / count,
        sum_height / count,
        last.text.clone(),
        last.raw_bytes.clone(),
    ))
}

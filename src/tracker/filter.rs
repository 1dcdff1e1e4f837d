//! Ordered chain of detection filters.

use serde::{Deserialize, Serialize};

use crate::tracker::aspect_ratio_filter::{AspectRatioFilter, DEFAULT_ASPECT_RATIO_THRESHOLD};
use crate::tracker::marker::TaggedDetection;
use crate::tracker::zscore_filter::{
    Aggregation, DEFAULT_WINDOW_SIZE, DEFAULT_Z_SCORE_THRESHOLD, ZScoreFilter,
};

/// A single filter stage.
///
/// Implementations must pass `NotDetected` through unchanged and may never
/// turn an `Ignored` or `NotDetected` input into `Valid`.
pub trait MarkerFilter {
    fn process(&mut self, detection: TaggedDetection) -> TaggedDetection;
}

/// Serializable description of one filter stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum FilterConfig {
    AspectRatio {
        #[serde(default = "default_aspect_ratio_threshold")]
        threshold: f32,
    },
    ZScore {
        #[serde(default = "default_window_size")]
        window_size: usize,
        #[serde(default = "default_z_score_threshold")]
        z_score_threshold: f32,
        #[serde(default)]
        aggregation: Aggregation,
    },
}

fn default_aspect_ratio_threshold() -> f32 {
    DEFAULT_ASPECT_RATIO_THRESHOLD
}

fn default_window_size() -> usize {
    DEFAULT_WINDOW_SIZE
}

fn default_z_score_threshold() -> f32 {
    DEFAULT_Z_SCORE_THRESHOLD
}

/// Built-in filter stages.
#[derive(Debug, Clone)]
pub enum FilterStage {
    AspectRatio(AspectRatioFilter),
    ZScore(ZScoreFilter),
}

impl From<&FilterConfig> for FilterStage {
    fn from(config: &FilterConfig) -> Self {
        match *config {
            FilterConfig::AspectRatio { threshold } => {
                Self::AspectRatio(AspectRatioFilter::new(threshold))
            }
            FilterConfig::ZScore {
                window_size,
                z_score_threshold,
                aggregation,
            } => Self::ZScore(ZScoreFilter::new(
                window_size,
                z_score_threshold,
                aggregation,
            )),
        }
    }
}

impl MarkerFilter for FilterStage {
    fn process(&mut self, detection: TaggedDetection) -> TaggedDetection {
        match self {
            Self::AspectRatio(filter) => filter.process(detection),
            Self::ZScore(filter) => filter.process(detection),
        }
    }
}

/// Filter stages applied strictly in insertion order.
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    stages: Vec<FilterStage>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_configs(configs: &[FilterConfig]) -> Self {
        Self {
            stages: configs.iter().map(FilterStage::from).collect(),
        }
    }

    /// Append a stage to the end of the chain.
    pub fn with_stage(mut self, stage: FilterStage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn push(&mut self, stage: FilterStage) {
        self.stages.push(stage);
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stages(&self) -> &[FilterStage] {
        &self.stages
    }
}

impl MarkerFilter for FilterChain {
    fn process(&mut self, detection: TaggedDetection) -> TaggedDetection {
        self.stages
            .iter_mut()
            .fold(detection, |detection, stage| stage.process(detection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::marker::{DetectedMarker, FilterState};
    use crate::tracker::pose::Pose;

    fn marker(width: f32, height: f32) -> DetectedMarker {
        DetectedMarker::new(Pose::identity(), 1.0, width, height, "qr", vec![])
    }

    #[test]
    fn test_empty_chain_is_identity() {
        let mut chain = FilterChain::new();
        let input = TaggedDetection::valid(marker(1.0, 1.0));
        assert_eq!(chain.process(input.clone()), input);
    }

    #[test]
    fn test_ignored_is_not_windowed_downstream() {
        let mut chain = FilterChain::new()
            .with_stage(FilterStage::AspectRatio(AspectRatioFilter::new(0.95)))
            .with_stage(FilterStage::ZScore(ZScoreFilter::default()));

        let out = chain.process(TaggedDetection::valid(marker(1.0, 0.5)));
        assert_eq!(out.state(), FilterState::Ignored);

        match &chain.stages()[1] {
            FilterStage::ZScore(filter) => assert!(filter.is_empty()),
            other => panic!("unexpected stage {other:?}"),
        }
    }

    #[test]
    fn test_not_detected_passes_every_stage() {
        let mut chain = FilterChain::from_configs(&[
            FilterConfig::AspectRatio { threshold: 0.9 },
            FilterConfig::ZScore {
                window_size: 4,
                z_score_threshold: 0.5,
                aggregation: Aggregation::Latest,
            },
        ]);
        assert_eq!(chain.len(), 2);
        assert_eq!(
            chain.process(TaggedDetection::not_detected()),
            TaggedDetection::not_detected()
        );
    }

    #[test]
    fn test_filter_config_from_json() {
        let configs: Vec<FilterConfig> = serde_json::from_str(
            r#"[
                {"kind": "AspectRatio"},
                {"kind": "ZScore", "window_size": 8, "aggregation": "Latest"}
            ]"#,
        )
        .unwrap();

        assert_eq!(
            configs,
            vec![
                FilterConfig::AspectRatio { threshold: 0.95 },
                FilterConfig::ZScore {
                    window_size: 8,
                    z_score_threshold: 0.5,
                    aggregation: Aggregation::Latest,
                },
            ]
        );
    }
}

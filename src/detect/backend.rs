use anyhow::{anyhow, Result};
use image::DynamicImage;

use crate::pose::Pose;

pub const DEFAULT_MAX_DETECTIONS: usize = 3;
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.6;
pub const DEFAULT_NMS_RADIUS: f32 = 20.0;

/// Options every estimator honours.
///
/// Filtering by confidence, duplicate suppression and the detection cap are
/// the estimator's job. Downstream geometry never filters poses.
#[derive(Clone, Debug, PartialEq)]
pub struct EstimatorConfig {
    /// Mirror detections around the vertical center line.
    pub flip_horizontal: bool,
    /// Maximum number of poses returned.
    pub max_detections: usize,
    /// Minimum pose score to include a pose.
    pub score_threshold: f32,
    /// Non-max-suppression distance in image pixels.
    pub nms_radius: f32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            flip_horizontal: false,
            max_detections: DEFAULT_MAX_DETECTIONS,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            nms_radius: DEFAULT_NMS_RADIUS,
        }
    }
}

impl EstimatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_detections == 0 {
            return Err(anyhow!("max_detections must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.score_threshold) {
            return Err(anyhow!(
                "score_threshold must be within 0..=1, got {}",
                self.score_threshold
            ));
        }
        if !self.nms_radius.is_finite() || self.nms_radius < 0.0 {
            return Err(anyhow!(
                "nms_radius must be a non-negative number, got {}",
                self.nms_radius
            ));
        }
        Ok(())
    }
}

/// Pose estimator trait.
///
/// Implementations wrap a pretrained model (or a recorded result) and return a
/// finite, already-filtered list of poses with keypoints in the pixel space of
/// the image they were handed.
pub trait PoseEstimator: Send {
    /// Estimator identifier.
    fn name(&self) -> &'static str;

    /// Run pose estimation on a decoded image.
    fn estimate(&mut self, image: &DynamicImage, config: &EstimatorConfig) -> Result<Vec<Pose>>;

    /// Optional model load hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

use std::path::Path;

use anyhow::{Context, Result};
use image::DynamicImage;

use crate::detect::backend::{EstimatorConfig, PoseEstimator};
use crate::detect::postprocess::apply_config;
use crate::pose::{poses_from_json, Pose};

/// Estimator that serves recorded poses.
///
/// Poses are kept as raw model output and pass through the same
/// estimator-side filtering a live model would apply.
pub struct FixtureEstimator {
    poses: Vec<Pose>,
}

impl FixtureEstimator {
    pub fn new(poses: Vec<Pose>) -> Self {
        Self { poses }
    }

    /// Load poses from a JSON file in PoseNet output shape.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read pose fixture {}", path.display()))?;
        let poses = poses_from_json(&raw)
            .with_context(|| format!("invalid pose fixture {}", path.display()))?;
        log::info!("loaded {} recorded poses from {}", poses.len(), path.display());
        Ok(Self::new(poses))
    }
}

impl PoseEstimator for FixtureEstimator {
    fn name(&self) -> &'static str {
        "fixture"
    }

    fn estimate(&mut self, image: &DynamicImage, config: &EstimatorConfig) -> Result<Vec<Pose>> {
        Ok(apply_config(
            self.poses.clone(),
            image.width() as f32,
            config,
        ))
    }
}

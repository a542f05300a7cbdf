#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use image::DynamicImage;
use tract_onnx::prelude::*;

use crate::detect::backend::{EstimatorConfig, PoseEstimator};
use crate::detect::decode::decode_multipose;
use crate::detect::postprocess::apply_config;
use crate::pose::Pose;

/// Tract-based estimator for ONNX multipose models.
///
/// Expects an int32 NHWC RGB input and a `[1, N, 56]` float output.
/// Loads the model from a local file; no network I/O.
pub struct TractEstimator {
    model: TypedRunnableModel<TypedModel>,
    input_width: u32,
    input_height: u32,
}

impl TractEstimator {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_width: u32, input_height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    i32::datum_type(),
                    tvec!(1, input_height as usize, input_width as usize, 3),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "loaded pose model {} ({}x{} input)",
            model_path.display(),
            input_width,
            input_height
        );
        Ok(Self {
            model,
            input_width,
            input_height,
        })
    }

    fn build_input(&self, image: &DynamicImage) -> Tensor {
        let resized = image
            .resize_exact(self.input_width, self.input_height, FilterType::Triangle)
            .to_rgb8();
        tract_ndarray::Array4::from_shape_fn(
            (1, self.input_height as usize, self.input_width as usize, 3),
            |(_, y, x, channel)| resized.get_pixel(x as u32, y as u32)[channel] as i32,
        )
        .into_tensor()
    }
}

impl PoseEstimator for TractEstimator {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn estimate(&mut self, image: &DynamicImage, config: &EstimatorConfig) -> Result<Vec<Pose>> {
        let input = self.build_input(image);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let values: Vec<f32> = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .iter()
            .copied()
            .collect();

        let poses = decode_multipose(&values, image.width(), image.height())?;
        log::debug!("model returned {} raw poses", poses.len());
        Ok(apply_config(poses, image.width() as f32, config))
    }
}

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::detect::{
    EstimatorConfig, DEFAULT_MAX_DETECTIONS, DEFAULT_NMS_RADIUS, DEFAULT_SCORE_THRESHOLD,
};
use crate::sticker::{STICKER_EYE_LINE, STICKER_REFERENCE_SIZE};
use crate::upload::MAX_UPLOAD_BYTES;

const DEFAULT_BACKEND: &str = "fixture";
const DEFAULT_MODEL_INPUT: u32 = 256;
const DEFAULT_STICKER_DIR: &str = "stickers";

#[derive(Debug, Deserialize, Default)]
struct AppConfigFile {
    estimator: Option<EstimatorConfigFile>,
    sticker: Option<StickerConfigFile>,
    upload: Option<UploadConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct EstimatorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    input_width: Option<u32>,
    input_height: Option<u32>,
    flip_horizontal: Option<bool>,
    max_detections: Option<usize>,
    score_threshold: Option<f32>,
    nms_radius: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct StickerConfigFile {
    dir: Option<PathBuf>,
    reference_size: Option<f32>,
    eye_line: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct UploadConfigFile {
    max_bytes: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub estimator: EstimatorSettings,
    pub sticker: StickerSettings,
    pub max_upload_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct EstimatorSettings {
    /// Registered estimator name (`fixture` or `tract`).
    pub backend: String,
    pub model_path: Option<PathBuf>,
    pub input_width: u32,
    pub input_height: u32,
    pub options: EstimatorConfig,
}

#[derive(Debug, Clone)]
pub struct StickerSettings {
    pub dir: PathBuf,
    pub reference_size: f32,
    pub eye_line: f32,
}

impl AppConfig {
    /// Defaults, then the file named by `STICKER_CONFIG`, then env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("STICKER_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: AppConfigFile) -> Self {
        let est = file.estimator.unwrap_or_default();
        let estimator = EstimatorSettings {
            backend: est.backend.unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
            model_path: est.model_path,
            input_width: est.input_width.unwrap_or(DEFAULT_MODEL_INPUT),
            input_height: est.input_height.unwrap_or(DEFAULT_MODEL_INPUT),
            options: EstimatorConfig {
                flip_horizontal: est.flip_horizontal.unwrap_or(false),
                max_detections: est.max_detections.unwrap_or(DEFAULT_MAX_DETECTIONS),
                score_threshold: est.score_threshold.unwrap_or(DEFAULT_SCORE_THRESHOLD),
                nms_radius: est.nms_radius.unwrap_or(DEFAULT_NMS_RADIUS),
            },
        };
        let sticker_file = file.sticker.unwrap_or_default();
        let sticker = StickerSettings {
            dir: sticker_file
                .dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STICKER_DIR)),
            reference_size: sticker_file.reference_size.unwrap_or(STICKER_REFERENCE_SIZE),
            eye_line: sticker_file.eye_line.unwrap_or(STICKER_EYE_LINE),
        };
        let max_upload_bytes = file
            .upload
            .and_then(|upload| upload.max_bytes)
            .unwrap_or(MAX_UPLOAD_BYTES);
        Self {
            estimator,
            sticker,
            max_upload_bytes,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(backend) = std::env::var("STICKER_BACKEND") {
            if !backend.trim().is_empty() {
                self.estimator.backend = backend.trim().to_string();
            }
        }
        if let Ok(path) = std::env::var("STICKER_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.estimator.model_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(threshold) = std::env::var("STICKER_SCORE_THRESHOLD") {
            self.estimator.options.score_threshold = threshold
                .parse()
                .map_err(|_| anyhow!("STICKER_SCORE_THRESHOLD must be a number"))?;
        }
        if let Ok(max) = std::env::var("STICKER_MAX_DETECTIONS") {
            self.estimator.options.max_detections = max
                .parse()
                .map_err(|_| anyhow!("STICKER_MAX_DETECTIONS must be a positive integer"))?;
        }
        if let Ok(dir) = std::env::var("STICKER_DIR") {
            if !dir.trim().is_empty() {
                self.sticker.dir = PathBuf::from(dir);
            }
        }
        if let Ok(bytes) = std::env::var("STICKER_MAX_UPLOAD_BYTES") {
            self.max_upload_bytes = bytes
                .parse()
                .map_err(|_| anyhow!("STICKER_MAX_UPLOAD_BYTES must be an integer byte count"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.estimator.options.validate()?;
        if self.estimator.input_width == 0 || self.estimator.input_height == 0 {
            return Err(anyhow!("model input dimensions must be greater than zero"));
        }
        if !self.sticker.reference_size.is_finite() || self.sticker.reference_size <= 0.0 {
            return Err(anyhow!("sticker reference_size must be greater than zero"));
        }
        if !self.sticker.eye_line.is_finite() {
            return Err(anyhow!("sticker eye_line must be a finite number"));
        }
        if self.max_upload_bytes == 0 {
            return Err(anyhow!("upload max_bytes must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<AppConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

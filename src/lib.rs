//! Pose-anchored sticker compositing.
//!
//! Detects people in a photo with a pluggable pose estimator and draws a
//! sticker over each person's eyes, scaled to their height.
//!
//! # Pipeline
//!
//! 1. `upload`: type and size gating for the selected file.
//! 2. `detect`: the `PoseEstimator` boundary, estimator-side filtering, backends.
//! 3. `geometry`: poses to anchors (eye midpoint, eye-to-ankle height) in
//!    native image pixels, highest score first.
//! 4. `composite`: pure `composite(source, anchors, sticker)`.
//! 5. `render`: PNG / data URI output.
//!
//! `session` ties the stages together with latest-request gating and
//! `config` loads settings.

pub mod composite;
pub mod config;
pub mod detect;
pub mod geometry;
pub mod pose;
pub mod render;
pub mod session;
pub mod sticker;
pub mod upload;

pub use composite::{composite, placement, StickerPlacement};
pub use config::AppConfig;
pub use detect::{EstimatorConfig, EstimatorRegistry, FixtureEstimator, PoseEstimator};
#[cfg(feature = "backend-tract")]
pub use detect::TractEstimator;
pub use geometry::{resolve_anchors, scale_factor, PoseAnchor};
pub use pose::{Keypoint, KeypointPart, Pose, Position, KEYPOINT_COUNT};
pub use render::{fingerprint, to_data_uri};
pub use session::{Advisory, EstimationOutcome, RequestToken, Session};
pub use sticker::{StickerAsset, StickerCatalog, STICKER_EYE_LINE, STICKER_REFERENCE_SIZE};
pub use upload::{check_upload, Upload, UploadVerdict, MAX_UPLOAD_BYTES};

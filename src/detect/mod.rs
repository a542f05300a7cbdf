mod backend;
mod backends;
mod decode;
mod postprocess;
mod registry;

pub use backend::{
    EstimatorConfig, PoseEstimator, DEFAULT_MAX_DETECTIONS, DEFAULT_NMS_RADIUS,
    DEFAULT_SCORE_THRESHOLD,
};
pub use backends::FixtureEstimator;
#[cfg(feature = "backend-tract")]
pub use backends::TractEstimator;
pub use decode::{decode_multipose, MULTIPOSE_ROW_LEN};
pub use postprocess::apply_config;
pub use registry::EstimatorRegistry;

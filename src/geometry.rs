//! Pose geometry resolution.
//!
//! Estimators report keypoints in the pixel space of the image they were
//! shown, which may be a CSS-scaled rendition of the upload. This module
//! maps each pose onto the native pixel grid of the source image and reduces
//! it to the two quantities sticker placement needs: the eye midpoint and the
//! eye-to-ankle height.

use anyhow::{anyhow, Result};

use crate::pose::{KeypointPart, Pose, Position, KEYPOINT_COUNT};

/// Resolved placement reference for one pose, in source-image pixels.
///
/// `height_ref` is zero or negative when keypoints are coincident or the
/// ankles were detected above the eyes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PoseAnchor {
    pub anchor_x: f32,
    pub anchor_y: f32,
    pub height_ref: f32,
    pub score: f32,
}

/// Number of native image pixels per displayed pixel.
pub fn scale_factor(natural_width: u32, displayed_width: u32) -> Result<f32> {
    if displayed_width == 0 {
        return Err(anyhow!("displayed width must be greater than zero"));
    }
    if natural_width == 0 {
        return Err(anyhow!("natural width must be greater than zero"));
    }
    Ok(natural_width as f32 / displayed_width as f32)
}

/// Resolve every pose into an anchor, highest score first.
///
/// Equal scores keep their estimator order. A pose with fewer than
/// [`KEYPOINT_COUNT`] keypoints violates the estimator contract and fails the
/// whole pass; no partial list is returned.
pub fn resolve_anchors(poses: &[Pose], scale_factor: f32) -> Result<Vec<PoseAnchor>> {
    let mut ordered: Vec<&Pose> = poses.iter().collect();
    ordered.sort_by(|a, b| b.score.total_cmp(&a.score));

    ordered
        .into_iter()
        .enumerate()
        .map(|(rank, pose)| {
            resolve_pose(pose, scale_factor)
                .map_err(|e| anyhow!("pose #{} (score {}): {}", rank, pose.score, e))
        })
        .collect()
}

fn resolve_pose(pose: &Pose, scale_factor: f32) -> Result<PoseAnchor> {
    if pose.keypoints.len() < KEYPOINT_COUNT {
        return Err(anyhow!(
            "estimator contract violation: expected {} keypoints, got {}",
            KEYPOINT_COUNT,
            pose.keypoints.len()
        ));
    }

    let eyes = midpoint(pose, KeypointPart::LeftEye, KeypointPart::RightEye)?;
    let ankles = midpoint(pose, KeypointPart::LeftAnkle, KeypointPart::RightAnkle)?;

    Ok(PoseAnchor {
        anchor_x: eyes.x * scale_factor,
        anchor_y: eyes.y * scale_factor,
        height_ref: (ankles.y - eyes.y) * scale_factor,
        score: pose.score,
    })
}

fn midpoint(pose: &Pose, left: KeypointPart, right: KeypointPart) -> Result<Position> {
    let left = pose
        .keypoint(left)
        .ok_or_else(|| anyhow!("missing {:?} keypoint", left))?;
    let right = pose
        .keypoint(right)
        .ok_or_else(|| anyhow!("missing {:?} keypoint", right))?;
    Ok(left.position.midpoint(&right.position))
}

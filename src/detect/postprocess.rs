use crate::pose::Pose;

use super::backend::EstimatorConfig;

/// Apply estimator-side options to raw model output.
///
/// Steps run in order: optional horizontal mirror, score threshold,
/// score-descending stable sort, non-max suppression, detection cap.
///
/// Suppression uses each candidate's strongest keypoint: if that keypoint lies
/// within `nms_radius` of the same part of an already accepted pose, the
/// candidate is treated as a duplicate of that pose.
pub fn apply_config(mut poses: Vec<Pose>, image_width: f32, config: &EstimatorConfig) -> Vec<Pose> {
    if config.flip_horizontal {
        for pose in &mut poses {
            pose.mirror_horizontally(image_width);
        }
    }

    poses.retain(|pose| pose.score >= config.score_threshold);
    poses.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut accepted: Vec<Pose> = Vec::with_capacity(config.max_detections.min(poses.len()));
    for candidate in poses {
        if accepted.len() >= config.max_detections {
            break;
        }
        if is_duplicate(&candidate, &accepted, config.nms_radius) {
            log::debug!(
                "suppressing pose with score {:.3} within {}px of an accepted pose",
                candidate.score,
                config.nms_radius
            );
            continue;
        }
        accepted.push(candidate);
    }
    accepted
}

fn is_duplicate(candidate: &Pose, accepted: &[Pose], radius: f32) -> bool {
    let Some(root) = candidate.strongest_keypoint() else {
        return false;
    };
    accepted.iter().any(|pose| {
        pose.keypoint(root.part)
            .is_some_and(|other| other.part == root.part && other.position.distance(&root.position) <= radius)
    })
}

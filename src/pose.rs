//! Pose data model shared by estimators and the geometry resolver.
//!
//! Poses use the 17-slot keypoint layout produced by PoseNet/MoveNet style
//! models. Slot order is fixed; consumers index keypoints by slot, not by name.

use serde::{Deserialize, Serialize};

/// Number of keypoint slots every pose must carry.
pub const KEYPOINT_COUNT: usize = 17;

/// Anatomical keypoint slots, in model output order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeypointPart {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl KeypointPart {
    pub const ALL: [KeypointPart; KEYPOINT_COUNT] = [
        KeypointPart::Nose,
        KeypointPart::LeftEye,
        KeypointPart::RightEye,
        KeypointPart::LeftEar,
        KeypointPart::RightEar,
        KeypointPart::LeftShoulder,
        KeypointPart::RightShoulder,
        KeypointPart::LeftElbow,
        KeypointPart::RightElbow,
        KeypointPart::LeftWrist,
        KeypointPart::RightWrist,
        KeypointPart::LeftHip,
        KeypointPart::RightHip,
        KeypointPart::LeftKnee,
        KeypointPart::RightKnee,
        KeypointPart::LeftAnkle,
        KeypointPart::RightAnkle,
    ];

    /// Slot index of this part within `Pose::keypoints`.
    pub fn slot(self) -> usize {
        self as usize
    }
}

/// Position in image-pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn midpoint(&self, other: &Position) -> Position {
        Position {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub part: KeypointPart,
    pub position: Position,
    #[serde(default)]
    pub score: f32,
}

/// A detected human figure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub score: f32,
    pub keypoints: Vec<Keypoint>,
}

impl Pose {
    /// Keypoint stored in the slot for `part`, if the pose carries that slot.
    pub fn keypoint(&self, part: KeypointPart) -> Option<&Keypoint> {
        self.keypoints.get(part.slot())
    }

    /// Keypoint with the highest individual score.
    pub fn strongest_keypoint(&self) -> Option<&Keypoint> {
        self.keypoints
            .iter()
            .max_by(|a, b| a.score.total_cmp(&b.score))
    }

    /// Mirror all keypoints around the vertical center line of an image `width` wide.
    pub fn mirror_horizontally(&mut self, width: f32) {
        for keypoint in &mut self.keypoints {
            keypoint.position.x = width - keypoint.position.x;
        }
    }
}

/// Parse a JSON array of poses in PoseNet output shape.
pub fn poses_from_json(raw: &str) -> anyhow::Result<Vec<Pose>> {
    let poses: Vec<Pose> = serde_json::from_str(raw)?;
    Ok(poses)
}

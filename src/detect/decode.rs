use anyhow::{anyhow, Result};

use crate::pose::{Keypoint, KeypointPart, Pose, Position, KEYPOINT_COUNT};

/// Values per detection row in the MoveNet multipose output.
///
/// 17 keypoints as (y, x, score), then ymin, xmin, ymax, xmax, score.
pub const MULTIPOSE_ROW_LEN: usize = KEYPOINT_COUNT * 3 + 5;

/// Decode a flattened `[1, N, 56]` multipose tensor into poses.
///
/// Model coordinates are normalized to 0..1 and are projected onto an image
/// of `width` x `height` pixels. Rows with a zero score are padding and skipped.
pub fn decode_multipose(values: &[f32], width: u32, height: u32) -> Result<Vec<Pose>> {
    if values.len() % MULTIPOSE_ROW_LEN != 0 {
        return Err(anyhow!(
            "multipose output length {} is not a multiple of {}",
            values.len(),
            MULTIPOSE_ROW_LEN
        ));
    }

    let (w, h) = (width as f32, height as f32);
    let poses = values
        .chunks_exact(MULTIPOSE_ROW_LEN)
        .filter(|row| row[MULTIPOSE_ROW_LEN - 1] > 0.0)
        .map(|row| {
            let keypoints = KeypointPart::ALL
                .iter()
                .enumerate()
                .map(|(i, part)| Keypoint {
                    part: *part,
                    position: Position::new(row[i * 3 + 1] * w, row[i * 3] * h),
                    score: row[i * 3 + 2],
                })
                .collect();
            Pose {
                score: row[MULTIPOSE_ROW_LEN - 1],
                keypoints,
            }
        })
        .collect();
    Ok(poses)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projects_normalized_coordinates() -> Result<()> {
        let mut row = vec![0.0f32; MULTIPOSE_ROW_LEN];
        // left eye at y=0.25, x=0.5
        row[3] = 0.25;
        row[4] = 0.5;
        row[5] = 0.8;
        row[MULTIPOSE_ROW_LEN - 1] = 0.77;
        let padding = vec![0.0f32; MULTIPOSE_ROW_LEN];
        let values = [row, padding].concat();

        let poses = decode_multipose(&values, 200, 100)?;
        assert_eq!(poses.len(), 1);
        assert_eq!(poses[0].score, 0.77);
        let eye = poses[0].keypoint(KeypointPart::LeftEye).unwrap();
        assert_eq!(eye.position, Position::new(100.0, 25.0));
        assert_eq!(eye.score, 0.8);
        Ok(())
    }

    #[test]
    fn rejects_ragged_output() {
        assert!(decode_multipose(&[0.0; 10], 10, 10).is_err());
    }
}

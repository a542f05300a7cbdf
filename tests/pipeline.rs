//! End-to-end runs through the session: upload, estimate, resolve, merge.

use std::io::{Cursor, Write};

use anyhow::Result;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use tempfile::NamedTempFile;

use pose_sticker::{
    fingerprint, EstimationOutcome, EstimatorConfig, EstimatorRegistry, FixtureEstimator, Keypoint,
    KeypointPart, Pose, PoseAnchor, Position, Session, StickerAsset, Upload, UploadVerdict,
};

const BACKGROUND: Rgb<u8> = Rgb([20, 120, 40]);

fn photo(width: u32, height: u32) -> (DynamicImage, Upload) {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, BACKGROUND));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode photo");
    (image, Upload::new("group.png", bytes))
}

fn pose(score: f32, eyes: [(f32, f32); 2], ankles: [(f32, f32); 2]) -> Pose {
    let keypoints = KeypointPart::ALL
        .iter()
        .map(|part| {
            let (x, y) = match part {
                KeypointPart::LeftEye => eyes[0],
                KeypointPart::RightEye => eyes[1],
                KeypointPart::LeftAnkle => ankles[0],
                KeypointPart::RightAnkle => ankles[1],
                _ => ((eyes[0].0 + ankles[0].0) / 2.0, (eyes[0].1 + ankles[0].1) / 2.0),
            };
            Keypoint {
                part: *part,
                position: Position::new(x, y),
                score: 0.9,
            }
        })
        .collect();
    Pose { score, keypoints }
}

fn fixture_file(poses: &[Pose]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp poses");
    file.write_all(serde_json::to_string(poses).expect("poses json").as_bytes())
        .expect("write poses");
    file
}

fn magenta_sticker() -> StickerAsset {
    StickerAsset::new("magenta", RgbaImage::from_pixel(100, 100, Rgba([255, 0, 255, 255])))
}

#[test]
fn scaled_display_example_lands_sticker_at_expected_corner() -> Result<()> {
    let poses = [pose(
        0.9,
        [(100.0, 50.0), (110.0, 50.0)],
        [(105.0, 200.0), (107.0, 200.0)],
    )];
    let file = fixture_file(&poses);
    let mut registry = EstimatorRegistry::new();
    registry.register(FixtureEstimator::from_path(file.path())?);

    let (_, upload) = photo(1000, 800);
    let mut session = Session::default();
    assert!(session.select_file(upload)?.is_accepted());
    session.set_display_width(Some(500));

    let token = session.begin_estimation()?;
    let input = session.estimation_image()?;
    assert_eq!((input.width(), input.height()), (500, 400));
    let outcome =
        session.complete_estimation(token, registry.estimate(&input, &EstimatorConfig::default()))?;
    assert_eq!(outcome, EstimationOutcome::Resolved { anchors: 1 });
    assert_eq!(
        session.anchors().unwrap(),
        &[PoseAnchor {
            anchor_x: 210.0,
            anchor_y: 100.0,
            height_ref: 300.0,
            score: 0.9,
        }]
    );

    session.select_sticker(magenta_sticker());
    let merged = session.merge()?;
    assert_eq!(merged.dimensions(), (1000, 800));
    let sticker_px = Rgba([255, 0, 255, 255]);
    let background_px = Rgba([20, 120, 40, 255]);
    assert_eq!(merged.get_pixel(60, 67), &sticker_px);
    assert_eq!(merged.get_pixel(359, 366), &sticker_px);
    assert_eq!(merged.get_pixel(59, 200), &background_px);
    assert_eq!(merged.get_pixel(360, 200), &background_px);
    assert_eq!(merged.get_pixel(200, 66), &background_px);
    assert_eq!(merged.get_pixel(200, 367), &background_px);
    Ok(())
}

#[test]
fn low_confidence_poses_never_reach_the_compositor() -> Result<()> {
    let poses = vec![
        pose(0.95, [(100.0, 40.0), (110.0, 40.0)], [(100.0, 140.0), (110.0, 140.0)]),
        pose(0.3, [(300.0, 40.0), (310.0, 40.0)], [(300.0, 140.0), (310.0, 140.0)]),
        pose(0.7, [(200.0, 40.0), (210.0, 40.0)], [(200.0, 140.0), (210.0, 140.0)]),
    ];
    let (_, upload) = photo(400, 200);
    let mut session = Session::default();
    session.select_file(upload)?;
    let mut estimator = FixtureEstimator::new(poses);
    session.estimate_with(&mut estimator, &EstimatorConfig::default())?;

    let scores: Vec<f32> = session.anchors().unwrap().iter().map(|a| a.score).collect();
    assert_eq!(scores, vec![0.95, 0.7]);
    Ok(())
}

#[test]
fn no_poses_yields_undecorated_source() -> Result<()> {
    let (source, upload) = photo(64, 48);
    let mut session = Session::default();
    session.select_file(upload)?;
    let mut estimator = FixtureEstimator::new(Vec::new());
    let outcome = session.estimate_with(&mut estimator, &EstimatorConfig::default())?;
    assert_eq!(outcome, EstimationOutcome::Resolved { anchors: 0 });

    session.select_sticker(magenta_sticker());
    let merged = session.merge()?.clone();
    assert_eq!(merged, source.to_rgba8());
    Ok(())
}

#[test]
fn repeated_merges_are_byte_identical() -> Result<()> {
    let poses = vec![
        pose(0.9, [(30.0, 20.0), (40.0, 22.0)], [(33.0, 170.0), (37.0, 171.0)]),
        pose(0.8, [(130.0, 30.0), (139.0, 31.0)], [(131.0, 160.0), (140.0, 166.0)]),
    ];
    let (_, upload) = photo(200, 200);
    let mut session = Session::default();
    session.select_file(upload)?;
    session.estimate_with(&mut FixtureEstimator::new(poses), &EstimatorConfig::default())?;
    session.select_sticker(StickerAsset::new(
        "gradient",
        RgbaImage::from_fn(32, 32, |x, y| Rgba([(x * 8) as u8, (y * 8) as u8, 128, 200])),
    ));

    let first = fingerprint(session.merge()?);
    let second = fingerprint(session.merge()?);
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn oversize_upload_is_advisory_only() -> Result<()> {
    let (_, upload) = photo(32, 32);
    let mut session = Session::default();
    session.select_file(upload)?;

    let mut exact = b"\x89PNG\r\n\x1a\n".to_vec();
    exact.resize(300_000, 0);
    let mut over = exact.clone();
    over.push(0);

    let verdict = session.select_file(Upload::new("huge.png", over))?;
    assert!(matches!(verdict, UploadVerdict::Oversize { size: 300_001, limit: 300_000 }));
    assert_eq!(session.image().map(|i| i.width()), Some(32));

    // at the limit the file passes the gate and then fails to decode
    assert!(session.select_file(Upload::new("exact.png", exact)).is_err());
    assert_eq!(session.image().map(|i| i.width()), Some(32));
    Ok(())
}

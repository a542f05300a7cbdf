//! Upload session state.
//!
//! One `Session` tracks a single user's current photo, the anchors resolved
//! for it, the selected sticker and the last merged preview. Estimation is
//! split into `begin_estimation` / `complete_estimation` around a
//! [`RequestToken`]: only the most recently issued token may complete, so a
//! result that arrives after a re-upload or a newer request is dropped
//! without touching state.

use anyhow::{anyhow, Result};
use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};

use crate::composite::composite;
use crate::detect::{EstimatorConfig, PoseEstimator};
use crate::geometry::{resolve_anchors, scale_factor, PoseAnchor};
use crate::pose::Pose;
use crate::render::to_data_uri;
use crate::sticker::StickerAsset;
use crate::upload::{check_upload, Upload, UploadVerdict, MAX_UPLOAD_BYTES};

/// Handle for one estimation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestToken(u64);

/// Non-fatal conditions surfaced to the user.
#[derive(Clone, Debug, PartialEq)]
pub enum Advisory {
    Oversize { size: u64, limit: u64 },
    Unsupported { detected: Option<String> },
    EstimationFailed { reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EstimationOutcome {
    /// Anchors were resolved for the current image.
    Resolved { anchors: usize },
    /// The token was superseded; state was left alone.
    Stale,
}

/// The outstanding request and the scale of the rendition it was issued for.
struct InFlight {
    id: u64,
    scale: f32,
}

struct SourceImage {
    name: String,
    image: DynamicImage,
}

pub struct Session {
    upload_limit: u64,
    source: Option<SourceImage>,
    display_width: Option<u32>,
    anchors: Option<Vec<PoseAnchor>>,
    sticker: Option<StickerAsset>,
    preview: Option<RgbaImage>,
    advisory: Option<Advisory>,
    next_request: u64,
    in_flight: Option<InFlight>,
}

impl Session {
    pub fn new(upload_limit: u64) -> Self {
        Self {
            upload_limit,
            source: None,
            display_width: None,
            anchors: None,
            sticker: None,
            preview: None,
            advisory: None,
            next_request: 0,
            in_flight: None,
        }
    }

    /// Take a newly selected file.
    ///
    /// Rejected files only raise an advisory; the current image stays. An
    /// accepted file replaces the image, drops its anchors and preview, and
    /// invalidates any in-flight estimation.
    pub fn select_file(&mut self, upload: Upload) -> Result<UploadVerdict> {
        let verdict = check_upload(&upload, self.upload_limit);
        match &verdict {
            UploadVerdict::Oversize { size, limit } => {
                log::warn!("{} is too big ({} > {} bytes)", upload.name, size, limit);
                self.advisory = Some(Advisory::Oversize {
                    size: *size,
                    limit: *limit,
                });
                return Ok(verdict);
            }
            UploadVerdict::Unsupported { detected } => {
                log::warn!("{} has unsupported type {:?}", upload.name, detected);
                self.advisory = Some(Advisory::Unsupported {
                    detected: detected.clone(),
                });
                return Ok(verdict);
            }
            UploadVerdict::Accepted { .. } => {}
        }

        let image = upload.decode()?;
        log::info!(
            "accepted {} ({}x{}, {} bytes)",
            upload.name,
            image.width(),
            image.height(),
            upload.size()
        );
        self.source = Some(SourceImage {
            name: upload.name,
            image,
        });
        self.anchors = None;
        self.preview = None;
        self.advisory = None;
        self.in_flight = None;
        self.next_request += 1;
        Ok(verdict)
    }

    /// Width the image is shown at; estimation runs on that rendition.
    ///
    /// A request already in flight keeps the scale it was issued with.
    pub fn set_display_width(&mut self, width: Option<u32>) {
        self.display_width = width;
    }

    pub fn image(&self) -> Option<&DynamicImage> {
        self.source.as_ref().map(|s| &s.image)
    }

    pub fn image_name(&self) -> Option<&str> {
        self.source.as_ref().map(|s| s.name.as_str())
    }

    /// Image handed to the estimator: the source resized to the display width.
    pub fn estimation_image(&self) -> Result<DynamicImage> {
        let source = self.current_image()?;
        match self.display_width {
            Some(width) if width != source.width() => {
                let factor = scale_factor(source.width(), width)?;
                let height = ((source.height() as f32 / factor).round() as u32).max(1);
                Ok(source.resize_exact(width, height, FilterType::Triangle))
            }
            _ => Ok(source.clone()),
        }
    }

    /// Native pixels per displayed pixel for the current image.
    pub fn scale_factor(&self) -> Result<f32> {
        let source = self.current_image()?;
        scale_factor(source.width(), self.display_width.unwrap_or(source.width()))
    }

    /// Start an estimation for the current image, superseding earlier requests.
    pub fn begin_estimation(&mut self) -> Result<RequestToken> {
        let scale = self.scale_factor()?;
        self.next_request += 1;
        self.in_flight = Some(InFlight {
            id: self.next_request,
            scale,
        });
        Ok(RequestToken(self.next_request))
    }

    /// Deliver an estimator result for `token`.
    ///
    /// Estimator failures and malformed poses are returned as errors after
    /// clearing the request, so the caller can retry. Anchors are only stored
    /// when every pose resolves.
    pub fn complete_estimation(
        &mut self,
        token: RequestToken,
        result: Result<Vec<Pose>>,
    ) -> Result<EstimationOutcome> {
        let scale = match self.in_flight.take() {
            Some(req) if req.id == token.0 => req.scale,
            other => {
                self.in_flight = other;
                log::debug!("dropping result for superseded request {}", token.0);
                return Ok(EstimationOutcome::Stale);
            }
        };

        let poses = match result {
            Ok(poses) => poses,
            Err(e) => {
                log::warn!("pose estimation failed: {:#}", e);
                self.advisory = Some(Advisory::EstimationFailed {
                    reason: format!("{:#}", e),
                });
                return Err(e.context("pose estimation failed; upload again to retry"));
            }
        };

        let anchors = resolve_anchors(&poses, scale)?;
        log::info!("resolved {} pose anchors", anchors.len());
        let count = anchors.len();
        self.anchors = Some(anchors);
        self.preview = None;
        self.advisory = None;
        Ok(EstimationOutcome::Resolved { anchors: count })
    }

    /// Run `estimator` synchronously for the current image.
    pub fn estimate_with(
        &mut self,
        estimator: &mut dyn PoseEstimator,
        config: &EstimatorConfig,
    ) -> Result<EstimationOutcome> {
        let token = self.begin_estimation()?;
        let input = self.estimation_image()?;
        let result = estimator.estimate(&input, config);
        self.complete_estimation(token, result)
    }

    pub fn anchors(&self) -> Option<&[PoseAnchor]> {
        self.anchors.as_deref()
    }

    pub fn select_sticker(&mut self, sticker: StickerAsset) {
        log::info!("selected sticker {}", sticker.id);
        self.sticker = Some(sticker);
    }

    pub fn sticker(&self) -> Option<&StickerAsset> {
        self.sticker.as_ref()
    }

    pub fn advisory(&self) -> Option<&Advisory> {
        self.advisory.as_ref()
    }

    /// Composite the selected sticker over every anchor and keep it as the preview.
    pub fn merge(&mut self) -> Result<&RgbaImage> {
        let source = self.current_image()?;
        let anchors = self
            .anchors
            .as_deref()
            .ok_or_else(|| anyhow!("poses have not been estimated for the current image"))?;
        let sticker = self
            .sticker
            .as_ref()
            .ok_or_else(|| anyhow!("no sticker selected"))?;

        let merged = composite(source, anchors, sticker);
        Ok(self.preview.insert(merged))
    }

    pub fn preview(&self) -> Option<&RgbaImage> {
        self.preview.as_ref()
    }

    pub fn preview_data_uri(&self) -> Result<Option<String>> {
        self.preview.as_ref().map(to_data_uri).transpose()
    }

    fn current_image(&self) -> Result<&DynamicImage> {
        self.image().ok_or_else(|| anyhow!("no image uploaded"))
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(MAX_UPLOAD_BYTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::FixtureEstimator;
    use crate::pose::{Keypoint, KeypointPart, Position};
    use image::{ImageFormat, Rgb, RgbImage, Rgba};
    use std::io::Cursor;

    fn png_upload(width: u32, height: u32) -> Upload {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 200, 200])))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        Upload::new("photo.png", bytes)
    }

    fn pose(score: f32, eye_y: f32, ankle_y: f32) -> Pose {
        Pose {
            score,
            keypoints: KeypointPart::ALL
                .iter()
                .map(|part| {
                    let y = match part {
                        KeypointPart::LeftEye | KeypointPart::RightEye => eye_y,
                        KeypointPart::LeftAnkle | KeypointPart::RightAnkle => ankle_y,
                        _ => (eye_y + ankle_y) / 2.0,
                    };
                    Keypoint {
                        part: *part,
                        position: Position::new(50.0, y),
                        score: 0.9,
                    }
                })
                .collect(),
        }
    }

    fn sticker() -> StickerAsset {
        StickerAsset::new("red", RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])))
    }

    #[test]
    fn oversize_file_keeps_current_image() -> Result<()> {
        let mut session = Session::new(10_000);
        assert!(session.select_file(png_upload(8, 8))?.is_accepted());

        let mut big = png_upload(8, 8);
        big.bytes.resize(10_001, 0);
        let verdict = session.select_file(big)?;
        assert!(matches!(verdict, UploadVerdict::Oversize { size: 10_001, .. }));
        assert!(matches!(session.advisory(), Some(Advisory::Oversize { .. })));
        assert_eq!(session.image().map(|i| i.width()), Some(8));
        Ok(())
    }

    #[test]
    fn stale_result_is_dropped_after_reupload() -> Result<()> {
        let mut session = Session::default();
        session.select_file(png_upload(100, 100))?;
        let token = session.begin_estimation()?;

        session.select_file(png_upload(120, 80))?;
        let outcome = session.complete_estimation(token, Ok(vec![pose(0.9, 10.0, 90.0)]))?;
        assert_eq!(outcome, EstimationOutcome::Stale);
        assert!(session.anchors().is_none());
        Ok(())
    }

    #[test]
    fn newer_request_supersedes_older() -> Result<()> {
        let mut session = Session::default();
        session.select_file(png_upload(100, 100))?;
        let first = session.begin_estimation()?;
        let second = session.begin_estimation()?;

        assert_eq!(
            session.complete_estimation(first, Ok(vec![pose(0.9, 10.0, 90.0)]))?,
            EstimationOutcome::Stale
        );
        assert_eq!(
            session.complete_estimation(second, Ok(vec![pose(0.9, 10.0, 90.0)]))?,
            EstimationOutcome::Resolved { anchors: 1 }
        );
        // a token completes at most once
        assert_eq!(
            session.complete_estimation(second, Ok(Vec::new()))?,
            EstimationOutcome::Stale
        );
        Ok(())
    }

    #[test]
    fn estimator_failure_is_recoverable() -> Result<()> {
        let mut session = Session::default();
        session.select_file(png_upload(100, 100))?;
        let token = session.begin_estimation()?;
        let err = session
            .complete_estimation(token, Err(anyhow!("model load rejected")))
            .unwrap_err();
        assert!(format!("{:#}", err).contains("model load rejected"));
        assert!(matches!(
            session.advisory(),
            Some(Advisory::EstimationFailed { .. })
        ));

        let mut estimator = FixtureEstimator::new(vec![pose(0.9, 10.0, 90.0)]);
        let outcome = session.estimate_with(&mut estimator, &EstimatorConfig::default())?;
        assert_eq!(outcome, EstimationOutcome::Resolved { anchors: 1 });
        assert!(session.advisory().is_none());
        Ok(())
    }

    #[test]
    fn merge_requires_anchors_and_sticker() -> Result<()> {
        let mut session = Session::default();
        assert!(session.merge().is_err());

        session.select_file(png_upload(100, 100))?;
        session.select_sticker(sticker());
        assert!(session.merge().is_err());

        let mut estimator = FixtureEstimator::new(vec![pose(0.9, 10.0, 90.0)]);
        session.estimate_with(&mut estimator, &EstimatorConfig::default())?;
        let merged = session.merge()?;
        assert_eq!(merged.dimensions(), (100, 100));
        assert_eq!(merged.get_pixel(50, 20), &Rgba([255, 0, 0, 255]));

        let uri = session.preview_data_uri()?.expect("preview after merge");
        assert!(uri.starts_with("data:image/png;base64,"));
        Ok(())
    }

    #[test]
    fn display_width_scales_anchors_to_native_pixels() -> Result<()> {
        let mut session = Session::default();
        session.select_file(png_upload(200, 100))?;
        session.set_display_width(Some(100));
        assert_eq!(session.scale_factor()?, 2.0);
        assert_eq!(session.estimation_image()?.width(), 100);
        assert_eq!(session.estimation_image()?.height(), 50);

        let token = session.begin_estimation()?;
        session.complete_estimation(token, Ok(vec![pose(0.9, 10.0, 40.0)]))?;
        let anchor = session.anchors().expect("anchors")[0];
        assert_eq!(anchor.anchor_x, 100.0);
        assert_eq!(anchor.anchor_y, 20.0);
        assert_eq!(anchor.height_ref, 60.0);
        Ok(())
    }

    #[test]
    fn display_width_change_mid_request_keeps_issued_scale() -> Result<()> {
        let mut session = Session::default();
        session.select_file(png_upload(200, 100))?;
        session.set_display_width(Some(100));
        let token = session.begin_estimation()?;

        session.set_display_width(Some(50));
        assert_eq!(session.scale_factor()?, 4.0);
        session.complete_estimation(token, Ok(vec![pose(0.9, 10.0, 40.0)]))?;
        let anchor = session.anchors().expect("anchors")[0];
        assert_eq!(anchor.anchor_y, 20.0);
        assert_eq!(anchor.height_ref, 60.0);

        let token = session.begin_estimation()?;
        session.complete_estimation(token, Ok(vec![pose(0.9, 10.0, 40.0)]))?;
        assert_eq!(session.anchors().expect("anchors")[0].height_ref, 120.0);
        Ok(())
    }

    #[test]
    fn short_pose_leaves_no_partial_anchors() -> Result<()> {
        let mut session = Session::default();
        session.select_file(png_upload(100, 100))?;
        let mut broken = pose(0.5, 10.0, 90.0);
        broken.keypoints.truncate(3);
        let token = session.begin_estimation()?;
        assert!(session
            .complete_estimation(token, Ok(vec![pose(0.9, 10.0, 90.0), broken]))
            .is_err());
        assert!(session.anchors().is_none());
        Ok(())
    }
}

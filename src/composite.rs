//! Sticker compositing.
//!
//! `composite` is pure: it copies the source into a fresh RGBA raster of the
//! same size and paints one scaled sticker per anchor, in anchor order.

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};

use crate::geometry::PoseAnchor;
use crate::sticker::StickerAsset;

/// Where one sticker lands on the output raster, in source pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StickerPlacement {
    pub x: f32,
    pub y: f32,
    /// Side length of the drawn square.
    pub size: f32,
}

impl StickerPlacement {
    /// Pixel side length to draw, or `None` when the sticker would be under one
    /// pixel or the placement is not finite. Saturates at `u32::MAX`.
    pub fn drawn_side(&self) -> Option<u32> {
        if !(self.x.is_finite() && self.y.is_finite() && self.size.is_finite()) {
            return None;
        }
        let side = self.size.round();
        if side >= 1.0 {
            Some(side as u32)
        } else {
            None
        }
    }

    /// Part of the placement that falls on a `width` x `height` canvas.
    fn clip(&self, sticker: &RgbaImage, width: u32, height: u32) -> Option<ClippedDraw> {
        self.drawn_side()?;
        let side = f64::from(self.size).round();
        let (dst_x, span_x, src_x, src_w) =
            clip_axis(f64::from(self.x).round(), side, width, sticker.width())?;
        let (dst_y, span_y, src_y, src_h) =
            clip_axis(f64::from(self.y).round(), side, height, sticker.height())?;
        Some(ClippedDraw {
            dst_x,
            dst_y,
            width: span_x,
            height: span_y,
            src_x,
            src_y,
            src_w,
            src_h,
        })
    }
}

/// Visible window of one sticker draw: the canvas rect it covers and the
/// sticker rect that maps onto it.
struct ClippedDraw {
    dst_x: u32,
    dst_y: u32,
    width: u32,
    height: u32,
    src_x: u32,
    src_y: u32,
    src_w: u32,
    src_h: u32,
}

/// Clip `[start, start + side)` to `[0, limit)` and map the visible span back
/// onto a sticker axis of `source` pixels.
///
/// Returns `(dst_start, dst_len, src_start, src_len)`.
fn clip_axis(start: f64, side: f64, limit: u32, source: u32) -> Option<(u32, u32, u32, u32)> {
    let lo = start.max(0.0);
    let hi = (start + side).min(f64::from(limit));
    if hi <= lo || source == 0 {
        return None;
    }
    let per_px = f64::from(source) / side;
    let src_lo = (((lo - start) * per_px).floor() as u32).min(source - 1);
    let src_hi = (((hi - start) * per_px).ceil() as u32).clamp(src_lo + 1, source);
    Some((lo as u32, (hi - lo) as u32, src_lo, src_hi - src_lo))
}

/// Align the sticker's eye line with the anchor and size it to the pose height.
pub fn placement(anchor: &PoseAnchor, sticker: &StickerAsset) -> StickerPlacement {
    let scale = anchor.height_ref / sticker.reference_size;
    StickerPlacement {
        x: anchor.anchor_x - sticker.reference_size / 2.0 * scale,
        y: anchor.anchor_y - sticker.eye_line * scale,
        size: anchor.height_ref,
    }
}

/// Draw `sticker` over every anchor on a copy of `source`.
///
/// The output always has the source's dimensions. Anchors whose height rounds
/// below one pixel (including zero, negative and non-finite heights) are
/// skipped. Only the part of each sticker that lands on the canvas is
/// resampled, so work stays bounded by the source size.
pub fn composite(source: &DynamicImage, anchors: &[PoseAnchor], sticker: &StickerAsset) -> RgbaImage {
    let mut canvas = source.to_rgba8();
    let (width, height) = canvas.dimensions();

    for anchor in anchors {
        let place = placement(anchor, sticker);
        let Some(draw) = place.clip(&sticker.image, width, height) else {
            log::debug!(
                "skipping degenerate sticker at ({:.1}, {:.1}) with height {:.2}",
                anchor.anchor_x,
                anchor.anchor_y,
                anchor.height_ref
            );
            continue;
        };

        let region =
            imageops::crop_imm(&sticker.image, draw.src_x, draw.src_y, draw.src_w, draw.src_h)
                .to_image();
        let scaled = imageops::resize(&region, draw.width, draw.height, FilterType::Triangle);
        imageops::overlay(&mut canvas, &scaled, i64::from(draw.dst_x), i64::from(draw.dst_y));
    }

    canvas
}

//! Bounding-box overlay for extracted frames.
//!
//! Pure in-memory raster work: normalized box → pixel rectangle, then a
//! dark halo and a yellow stroke sized to the frame.

use anyhow::Result;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::jpeg;
use crate::model::BoundingBox;

pub const STROKE_COLOR: Rgb<u8> = Rgb([255, 214, 0]);
pub const HALO_COLOR: Rgb<u8> = Rgb([20, 20, 20]);

/// Halo extends this many pixels past each side of the stroke.
const HALO_SPREAD: u32 = 2;

/// Pixel-space rectangle, `(x1, y1)` inclusive to `(x2, y2)` exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl PixelRect {
    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }
}

/// Map a normalized box onto a `width` x `height` frame, clamped to the
/// frame. Returns `None` for inverted or empty boxes.
pub fn pixel_rect(bbox: &BoundingBox, width: u32, height: u32) -> Option<PixelRect> {
    let coords = [bbox.x_min, bbox.y_min, bbox.x_max, bbox.y_max];
    if !coords.iter().all(|v| v.is_finite()) {
        return None;
    }
    let (w, h) = (f64::from(width), f64::from(height));
    let x1 = (bbox.x_min * w).max(0.0).round();
    let y1 = (bbox.y_min * h).max(0.0).round();
    let x2 = (bbox.x_max * w).min(w).round();
    let y2 = (bbox.y_max * h).min(h).round();

    if x2 <= x1 || y2 <= y1 {
        return None;
    }
    Some(PixelRect {
        x1: x1 as u32,
        y1: y1 as u32,
        x2: x2 as u32,
        y2: y2 as u32,
    })
}

/// Stroke thickness in pixels: `max(2, round(min(w, h) / 250))`.
pub fn stroke_width(width: u32, height: u32) -> u32 {
    let short_side = f64::from(width.min(height));
    ((short_side / 250.0).round() as u32).max(2)
}

/// Draw the box onto a copy of `image`. Degenerate boxes return an
/// unmodified copy.
pub fn annotate(image: &RgbImage, bbox: &BoundingBox) -> RgbImage {
    let mut out = image.clone();
    let Some(rect) = pixel_rect(bbox, image.width(), image.height()) else {
        log::debug!("skipping degenerate box {:?}", bbox);
        return out;
    };
    let stroke = stroke_width(image.width(), image.height());
    draw_band(&mut out, rect, stroke + HALO_SPREAD, HALO_SPREAD, HALO_COLOR);
    draw_band(&mut out, rect, stroke, 0, STROKE_COLOR);
    out
}

/// Decode a JPEG, draw the box and re-encode. Degenerate boxes return the
/// input bytes untouched.
pub fn annotate_jpeg(bytes: &[u8], bbox: &BoundingBox, quality: u8) -> Result<Vec<u8>> {
    let image = jpeg::decode(bytes)?;
    if pixel_rect(bbox, image.width(), image.height()).is_none() {
        return Ok(bytes.to_vec());
    }
    jpeg::encode(&annotate(&image, bbox), quality)
}

/// Concentric one-pixel outlines from `outset` pixels outside the rectangle
/// to `thickness - outset` pixels inside it. Clipping to the image is left
/// to imageproc.
fn draw_band(image: &mut RgbImage, rect: PixelRect, thickness: u32, outset: u32, color: Rgb<u8>) {
    for i in 0..thickness {
        let offset = i as i64 - i64::from(outset);
        let left = i64::from(rect.x1) + offset;
        let top = i64::from(rect.y1) + offset;
        let width = i64::from(rect.width()) - 2 * offset;
        let height = i64::from(rect.height()) - 2 * offset;
        if width <= 0 || height <= 0 {
            break;
        }
        let outline = Rect::at(left as i32, top as i32).of_size(width as u32, height as u32);
        draw_hollow_rect_mut(image, outline, color);
    }
}

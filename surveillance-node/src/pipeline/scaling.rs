use aieyes_common::BBox;
use image::{imageops, imageops::FilterType, RgbImage};

/// Per-axis ratio between native and inference resolution, taken from the actual resized size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactor {
    sx: f32,
    sy: f32,
}

impl ScaleFactor {
    pub const IDENTITY: ScaleFactor = ScaleFactor { sx: 1.0, sy: 1.0 };

    pub fn between(native: (u32, u32), inference: (u32, u32)) -> Self {
        Self {
            sx: native.0 as f32 / inference.0.max(1) as f32,
            sy: native.1 as f32 / inference.1.max(1) as f32,
        }
    }

    pub fn to_native(&self, bbox: &BBox) -> BBox {
        bbox.scaled(self.sx, self.sy)
    }

    pub fn to_inference(&self, bbox: &BBox) -> BBox {
        bbox.scaled(1.0 / self.sx, 1.0 / self.sy)
    }
}

pub fn downscale(frame: &RgbImage, scale: f32) -> (RgbImage, ScaleFactor) {
    if scale >= 1.0 {
        return (frame.clone(), ScaleFactor::IDENTITY);
    }
    let (w, h) = frame.dimensions();
    let tw = ((w as f32 * scale).round() as u32).max(1);
    let th = ((h as f32 * scale).round() as u32).max(1);
    let small = imageops::resize(frame, tw, th, FilterType::Triangle);
    (small, ScaleFactor::between((w, h), (tw, th)))
}

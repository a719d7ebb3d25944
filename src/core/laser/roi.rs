use std::io::Cursor;

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageOutputFormat, RgbaImage};

use super::config::DetectorConfig;
use super::error::LaserError;
use super::segment::TrajectoryBox;
use crate::core::video::frame::Frame;

/// 裁剪后放大的激光区域
#[derive(Debug, Clone)]
pub struct RoiImage {
    pub image: RgbaImage,
    /// Crop rectangle in source frame coordinates.
    pub region: TrajectoryBox,
}

impl RoiImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>, LaserError> {
        compress_to_jpeg(&self.image, quality)
    }
}

/// JPEG 不支持 alpha，先转 RGB
pub fn compress_to_jpeg(image: &RgbaImage, quality: u8) -> Result<Vec<u8>, LaserError> {
    let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
    let mut buffer = Cursor::new(Vec::new());
    rgb.write_to(&mut buffer, ImageOutputFormat::Jpeg(quality))?;
    Ok(buffer.into_inner())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionCropper {
    margin_ratio: f32,
    upscale: f32,
}

impl RegionCropper {
    pub fn new(margin_ratio: f32, upscale: f32) -> Self {
        Self {
            margin_ratio,
            upscale,
        }
    }

    pub fn from_config(config: &DetectorConfig) -> Self {
        Self::new(config.roi_margin, config.roi_upscale)
    }

    /// Grows `bbox` by `margin_ratio` of its own size on each side, clamped
    /// to the frame.
    pub fn expand(&self, bbox: &TrajectoryBox, frame_width: u32, frame_height: u32) -> TrajectoryBox {
        let margin_x = (bbox.x2.saturating_sub(bbox.x1) as f32 * self.margin_ratio) as u32;
        let margin_y = (bbox.y2.saturating_sub(bbox.y1) as f32 * self.margin_ratio) as u32;

        TrajectoryBox {
            x1: bbox.x1.saturating_sub(margin_x).min(frame_width),
            y1: bbox.y1.saturating_sub(margin_y).min(frame_height),
            x2: bbox.x2.saturating_add(margin_x).min(frame_width),
            y2: bbox.y2.saturating_add(margin_y).min(frame_height),
        }
    }

    pub fn crop(&self, frame: &Frame, bbox: &TrajectoryBox) -> Result<RoiImage, LaserError> {
        let region = self.expand(bbox, frame.width, frame.height);
        if region.x2 <= region.x1 || region.y2 <= region.y1 {
            return Err(LaserError::EmptyRegion {
                x1: region.x1,
                y1: region.y1,
                x2: region.x2,
                y2: region.y2,
            });
        }

        let source = frame.to_rgba_image()?;
        let cropped =
            imageops::crop_imm(&source, region.x1, region.y1, region.width(), region.height())
                .to_image();

        let target_w = ((region.width() as f32 * self.upscale).round() as u32).max(1);
        let target_h = ((region.height() as f32 * self.upscale).round() as u32).max(1);
        let image = imageops::resize(&cropped, target_w, target_h, FilterType::CatmullRom);

        Ok(RoiImage { image, region })
    }
}

impl Default for RegionCropper {
    fn default() -> Self {
        Self::new(0.5, 2.0)
    }
}

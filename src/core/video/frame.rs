use std::time::Duration;

use image::RgbaImage;

use crate::core::laser::error::LaserError;

/// 帧数据结构
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>, // RGBA 格式
    pub timestamp: Duration,
    pub frame_number: u64,
}

impl Frame {
    pub fn new(
        width: u32,
        height: u32,
        data: Vec<u8>,
        timestamp_ms: u64,
        frame_number: u64,
    ) -> Self {
        Self {
            width,
            height,
            data,
            timestamp: Duration::from_millis(timestamp_ms),
            frame_number,
        }
    }

    pub fn from_rgba_image(image: RgbaImage, timestamp: Duration, frame_number: u64) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            data: image.into_raw(),
            timestamp,
            frame_number,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// 缓冲区长度必须正好是 width * height * 4
    pub fn check_buffer(&self) -> Result<(), LaserError> {
        if self.data.len() == self.pixel_count() * 4 {
            return Ok(());
        }
        Err(LaserError::FrameRead {
            index: self.frame_number,
            reason: format!(
                "buffer of {} bytes does not fit {}x{} RGBA",
                self.data.len(),
                self.width,
                self.height
            ),
        })
    }

    pub fn to_rgba_image(&self) -> Result<RgbaImage, LaserError> {
        self.check_buffer()?;
        RgbaImage::from_raw(self.width, self.height, self.data.clone()).ok_or_else(|| {
            LaserError::FrameRead {
                index: self.frame_number,
                reason: "RGBA buffer rejected".into(),
            }
        })
    }

    /// RGBA -> HSV（alpha 忽略）
    pub fn to_hsv(&self) -> Result<HsvImage, LaserError> {
        self.check_buffer()?;
        let pixels = self
            .data
            .chunks_exact(4)
            .map(|rgba| Hsv::from_rgb(rgba[0], rgba[1], rgba[2]))
            .collect();

        Ok(HsvImage {
            width: self.width,
            height: self.height,
            pixels,
        })
    }
}

/// Hue in degrees [0, 360), saturation and value on 0-255.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsv {
    pub h: f32,
    pub s: u8,
    pub v: u8,
}

impl Hsv {
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = (max - min) as f32;

        let s = if max == 0 {
            0
        } else {
            (delta * 255.0 / max as f32).round() as u8
        };

        let h = if delta == 0.0 {
            0.0
        } else {
            let (r, g, b) = (r as f32, g as f32, b as f32);
            let raw = if max as f32 == r {
                60.0 * (g - b) / delta
            } else if max as f32 == g {
                120.0 + 60.0 * (b - r) / delta
            } else {
                240.0 + 60.0 * (r - g) / delta
            };
            if raw < 0.0 {
                raw + 360.0
            } else {
                raw
            }
        };

        Self { h, s, v: max }
    }
}

#[derive(Debug, Clone)]
pub struct HsvImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Hsv>,
}

impl HsvImage {
    pub fn get(&self, x: u32, y: u32) -> Hsv {
        self.pixels[(y * self.width + x) as usize]
    }
}

/// 视频元数据
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub frame_count: u64,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

impl VideoInfo {
    pub fn duration_secs(&self) -> f64 {
        self.frame_count as f64 / self.fps
    }

    pub fn frame_period_secs(&self) -> f64 {
        1.0 / self.fps
    }

    pub fn time_of(&self, frame_number: u64) -> f64 {
        frame_number as f64 / self.fps
    }

    pub fn validate(&self) -> Result<(), LaserError> {
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(LaserError::SourceUnavailable(format!(
                "invalid frame rate: {}",
                self.fps
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(LaserError::SourceUnavailable(format!(
                "invalid frame size: {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

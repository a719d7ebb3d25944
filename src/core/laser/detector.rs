use log::warn;
use serde::{Deserialize, Serialize};

use super::blob::BlobExtractor;
use super::color_mask::ColorMaskBuilder;
use super::config::DetectorConfig;
use super::error::LaserError;
use super::segment::Point;
use crate::core::video::frame::Frame;

/// 单个采样帧的检测结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub frame_index: u64,
    pub time_secs: f64,
    pub points: Vec<Point>,
}

impl Detection {
    pub fn new(frame_index: u64, time_secs: f64, points: Vec<Point>) -> Self {
        Self {
            frame_index,
            time_secs,
            points,
        }
    }
}

pub trait PointDetector: Send + Sync {
    /// Candidate pointer locations in one frame; empty when nothing qualifies.
    fn detect(&self, frame: &Frame) -> Vec<Point>;
}

/// 颜色掩码 + 连通域，单帧激光点检测
#[derive(Debug, Clone)]
pub struct FrameColorDetector {
    mask_builder: ColorMaskBuilder,
    blob_extractor: BlobExtractor,
}

impl FrameColorDetector {
    pub fn new(config: &DetectorConfig) -> Result<Self, LaserError> {
        config.validate()?;
        Ok(Self {
            mask_builder: ColorMaskBuilder::new(
                config.pointer_color_mode,
                config.color_ranges.clone(),
            ),
            blob_extractor: BlobExtractor::new(config.blob_area),
        })
    }
}

impl PointDetector for FrameColorDetector {
    fn detect(&self, frame: &Frame) -> Vec<Point> {
        let hsv = match frame.to_hsv() {
            Ok(hsv) => hsv,
            Err(e) => {
                warn!("⚠️ Frame {} not scanned: {}", frame.frame_number, e);
                return Vec::new();
            }
        };
        let mask = self.mask_builder.build(&hsv);
        self.blob_extractor.extract(&mask)
    }
}

pub struct MockPointDetector {
    // 模拟在特定帧编号检测到激光点
    pattern: Option<Box<dyn Fn(u64) -> Vec<Point> + Send + Sync>>,
}

impl MockPointDetector {
    pub fn new() -> Self {
        Self { pattern: None }
    }

    pub fn with_pattern<F>(pattern: F) -> Self
    where
        F: Fn(u64) -> Vec<Point> + Send + Sync + 'static,
    {
        Self {
            pattern: Some(Box::new(pattern)),
        }
    }

    /// Reports `point` on every listed frame number.
    pub fn with_fixed_frames(frames: Vec<u64>, point: Point) -> Self {
        Self::with_pattern(move |n| {
            if frames.contains(&n) {
                vec![point]
            } else {
                Vec::new()
            }
        })
    }
}

impl Default for MockPointDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PointDetector for MockPointDetector {
    fn detect(&self, frame: &Frame) -> Vec<Point> {
        self.pattern
            .as_ref()
            .map(|p| p(frame.frame_number))
            .unwrap_or_default()
    }
}

//! 激光检测配置
//!
//! Hue is expressed in degrees (0-360), saturation and value on the 0-255 scale.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::LaserError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PointerColorMode {
    Red,
    Green,
    #[default]
    Both,
}

impl PointerColorMode {
    pub fn includes_red(self) -> bool {
        matches!(self, PointerColorMode::Red | PointerColorMode::Both)
    }

    pub fn includes_green(self) -> bool {
        matches!(self, PointerColorMode::Green | PointerColorMode::Both)
    }
}

impl FromStr for PointerColorMode {
    type Err = LaserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "red" => Ok(PointerColorMode::Red),
            "green" => Ok(PointerColorMode::Green),
            "both" => Ok(PointerColorMode::Both),
            other => Err(LaserError::InvalidConfig(format!(
                "unknown pointer color mode: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for PointerColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PointerColorMode::Red => "red",
            PointerColorMode::Green => "green",
            PointerColorMode::Both => "both",
        };
        f.write_str(name)
    }
}

/// Inclusive hue band in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HueBand {
    pub min_deg: f32,
    pub max_deg: f32,
}

impl HueBand {
    pub const fn new(min_deg: f32, max_deg: f32) -> Self {
        Self { min_deg, max_deg }
    }

    pub fn contains(&self, hue_deg: f32) -> bool {
        hue_deg >= self.min_deg && hue_deg <= self.max_deg
    }

    fn validate(&self, name: &str) -> Result<(), LaserError> {
        let in_circle = |v: f32| v.is_finite() && (0.0..=360.0).contains(&v);
        if !in_circle(self.min_deg) || !in_circle(self.max_deg) {
            return Err(LaserError::InvalidConfig(format!(
                "{} hue band must lie within 0-360 degrees",
                name
            )));
        }
        if self.min_deg > self.max_deg {
            return Err(LaserError::InvalidConfig(format!(
                "{} hue band min {} exceeds max {}",
                name, self.min_deg, self.max_deg
            )));
        }
        Ok(())
    }
}

/// 红色跨越色环 0°/360°，拆成两段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorRanges {
    pub red_low: HueBand,
    pub red_high: HueBand,
    pub green: HueBand,
    pub min_saturation: u8,
    pub min_value: u8,
}

impl Default for ColorRanges {
    fn default() -> Self {
        Self {
            red_low: HueBand::new(0.0, 20.0),
            red_high: HueBand::new(320.0, 360.0),
            green: HueBand::new(70.0, 170.0),
            min_saturation: 100,
            min_value: 100,
        }
    }
}

/// Blob pixel area, exclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaRange {
    pub min: u32,
    pub max: u32,
}

impl AreaRange {
    pub fn accepts(&self, area: u32) -> bool {
        area > self.min && area < self.max
    }
}

impl Default for AreaRange {
    fn default() -> Self {
        Self { min: 5, max: 1000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub pointer_color_mode: PointerColorMode,
    pub color_ranges: ColorRanges,
    /// Run detection on every Nth frame.
    pub sample_interval: u32,
    pub min_laser_frames: usize,
    pub pre_context_secs: f64,
    pub post_context_secs: f64,
    pub merge_gap_secs: f64,
    pub blob_area: AreaRange,
    pub trajectory_margin: u32,
    /// ROI expansion as a fraction of the trajectory box size, per side.
    pub roi_margin: f32,
    pub roi_upscale: f32,
    pub jpeg_quality: u8,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            pointer_color_mode: PointerColorMode::Both,
            color_ranges: ColorRanges::default(),
            sample_interval: 3,
            min_laser_frames: 5,
            pre_context_secs: 3.0,
            post_context_secs: 5.0,
            merge_gap_secs: 1.0,
            blob_area: AreaRange::default(),
            trajectory_margin: 50,
            roi_margin: 0.5,
            roi_upscale: 2.0,
            jpeg_quality: 90,
        }
    }
}

impl DetectorConfig {
    /// 逐帧检测，适合短视频或快速移动的激光点
    pub fn for_precise_scan() -> Self {
        Self {
            sample_interval: 1,
            ..Default::default()
        }
    }

    /// 长视频快速扫描
    pub fn for_fast_scan() -> Self {
        Self {
            sample_interval: 6,
            ..Default::default()
        }
    }

    pub fn with_mode(mut self, mode: PointerColorMode) -> Self {
        self.pointer_color_mode = mode;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, LaserError> {
        let config: DetectorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LaserError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), LaserError> {
        if self.sample_interval == 0 {
            return Err(LaserError::InvalidConfig(
                "sample_interval must be at least 1".into(),
            ));
        }
        if self.min_laser_frames == 0 {
            return Err(LaserError::InvalidConfig(
                "min_laser_frames must be at least 1".into(),
            ));
        }

        let durations = [
            ("pre_context_secs", self.pre_context_secs),
            ("post_context_secs", self.post_context_secs),
            ("merge_gap_secs", self.merge_gap_secs),
        ];
        for (name, value) in durations {
            if !value.is_finite() || value < 0.0 {
                return Err(LaserError::InvalidConfig(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        self.color_ranges.red_low.validate("red_low")?;
        self.color_ranges.red_high.validate("red_high")?;
        self.color_ranges.green.validate("green")?;

        if self.blob_area.min >= self.blob_area.max {
            return Err(LaserError::InvalidConfig(format!(
                "blob_area min {} must be below max {}",
                self.blob_area.min, self.blob_area.max
            )));
        }
        if !self.roi_margin.is_finite() || self.roi_margin < 0.0 {
            return Err(LaserError::InvalidConfig(format!(
                "roi_margin must be a non-negative number, got {}",
                self.roi_margin
            )));
        }
        if !self.roi_upscale.is_finite() || self.roi_upscale <= 0.0 {
            return Err(LaserError::InvalidConfig(format!(
                "roi_upscale must be positive, got {}",
                self.roi_upscale
            )));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(LaserError::InvalidConfig(format!(
                "jpeg_quality must be within 1-100, got {}",
                self.jpeg_quality
            )));
        }
        Ok(())
    }
}

use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology;

use super::config::{ColorRanges, PointerColorMode};
use crate::core::video::frame::{Hsv, HsvImage};

const MASK_ON: u8 = 255;

/// 按激光颜色阈值生成二值掩码
#[derive(Debug, Clone)]
pub struct ColorMaskBuilder {
    mode: PointerColorMode,
    ranges: ColorRanges,
}

impl ColorMaskBuilder {
    pub fn new(mode: PointerColorMode, ranges: ColorRanges) -> Self {
        Self { mode, ranges }
    }

    pub fn mode(&self) -> PointerColorMode {
        self.mode
    }

    fn is_bright(&self, px: &Hsv) -> bool {
        px.s >= self.ranges.min_saturation && px.v >= self.ranges.min_value
    }

    fn is_red(&self, px: &Hsv) -> bool {
        self.is_bright(px)
            && (self.ranges.red_low.contains(px.h) || self.ranges.red_high.contains(px.h))
    }

    fn is_green(&self, px: &Hsv) -> bool {
        self.is_bright(px) && self.ranges.green.contains(px.h)
    }

    fn matches(&self, px: &Hsv) -> bool {
        (self.mode.includes_red() && self.is_red(px))
            || (self.mode.includes_green() && self.is_green(px))
    }

    /// Thresholded mask before noise removal.
    pub fn threshold(&self, hsv: &HsvImage) -> GrayImage {
        GrayImage::from_fn(hsv.width, hsv.height, |x, y| {
            if self.matches(&hsv.get(x, y)) {
                Luma([MASK_ON])
            } else {
                Luma([0])
            }
        })
    }

    /// 阈值 + 3x3 开运算，去掉孤立噪点
    pub fn build(&self, hsv: &HsvImage) -> GrayImage {
        let mask = self.threshold(hsv);
        morphology::open(&mask, Norm::LInf, 1)
    }
}

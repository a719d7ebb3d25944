//! 激光标记提取器

use std::path::Path;

use log::info;

use crate::core::laser::{
    CancelFlag, DetectorConfig, ExtractionReport, KeyframeExporter, LaserError, RegionCropper,
    RoiImage, Segment, SegmentArtifacts, TrajectoryBox,
};
use crate::core::video::{BatchStats, ExtractionManager, Frame, FrameSource, ImageSequenceSource};

/// 激光标记提取器 - 检测 + 分段 + ROI 裁剪
///
/// ```no_run
/// use laser_marks::api::video::LaserMarkExtractor;
/// use laser_marks::core::laser::DetectorConfig;
///
/// let extractor = LaserMarkExtractor::create(DetectorConfig::default())?;
/// let report = extractor.extract_image_dir("frames/", 30.0)?;
/// for segment in &report.segments {
///     println!("{}", segment.timestamp_label());
/// }
/// # Ok::<(), laser_marks::core::laser::LaserError>(())
/// ```
pub struct LaserMarkExtractor {
    manager: ExtractionManager,
    cropper: RegionCropper,
}

impl LaserMarkExtractor {
    /// 创建提取器（配置非法时报错）
    pub fn create(config: DetectorConfig) -> Result<Self, LaserError> {
        let cropper = RegionCropper::from_config(&config);
        let manager = ExtractionManager::new(config)?;
        info!(
            "🎬 LaserMarkExtractor: created (mode {}, every {} frames)",
            manager.config().pointer_color_mode,
            manager.config().sample_interval
        );
        Ok(Self { manager, cropper })
    }

    pub fn extract(&self, source: &mut dyn FrameSource) -> Result<ExtractionReport, LaserError> {
        self.manager.extract(source)
    }

    /// 从图片序列目录提取
    pub fn extract_image_dir(
        &self,
        dir: impl AsRef<Path>,
        fps: f64,
    ) -> Result<ExtractionReport, LaserError> {
        let mut source = ImageSequenceSource::open(dir, fps)?;
        self.manager.extract(&mut source)
    }

    pub fn crop_region(&self, frame: &Frame, bbox: &TrajectoryBox) -> Result<RoiImage, LaserError> {
        self.cropper.crop(frame, bbox)
    }

    /// 每个片段导出原图 + ROI，失败互不影响
    pub fn export_keyframes(
        &self,
        source: &mut dyn FrameSource,
        segments: &[Segment],
        output_dir: impl AsRef<Path>,
    ) -> Vec<Result<SegmentArtifacts, LaserError>> {
        let exporter = KeyframeExporter::new(output_dir, self.manager.config());
        segments
            .iter()
            .map(|segment| exporter.export(&mut *source, segment))
            .collect()
    }

    /// 获取累计统计
    pub fn stats(&self) -> BatchStats {
        self.manager.get_stats()
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.manager.cancel_flag()
    }

    /// 在帧之间中断当前提取
    pub fn cancel(&self) {
        self.manager.cancel()
    }

    /// 重置状态
    pub fn reset(&self) {
        self.manager.reset()
    }
}

impl Drop for LaserMarkExtractor {
    fn drop(&mut self) {
        info!("🗑️ LaserMarkExtractor: released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::laser::ExtractionStatus;
    use image::{Rgb, RgbImage};
    use std::path::PathBuf;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "laser_marks_api_{}_{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Frames 0..lit show a red dot drifting right.
    fn write_frames(dir: &Path, count: u32, lit: u32) {
        for i in 0..count {
            let mut img = RgbImage::new(96, 64);
            if i < lit {
                for y in 30..35 {
                    for x in (20 + i)..(25 + i) {
                        img.put_pixel(x, y, Rgb([255, 0, 0]));
                    }
                }
            }
            img.save(dir.join(format!("frame_{:04}.png", i))).unwrap();
        }
    }

    #[test]
    fn test_create_rejects_invalid_config() {
        let config = DetectorConfig {
            roi_upscale: -1.0,
            ..Default::default()
        };
        assert!(LaserMarkExtractor::create(config).is_err());
    }

    #[test]
    fn test_extract_image_dir_and_export() {
        let frames_dir = temp_dir("frames");
        write_frames(&frames_dir, 40, 20);

        let extractor = LaserMarkExtractor::create(DetectorConfig::for_precise_scan()).unwrap();
        let report = extractor.extract_image_dir(&frames_dir, 10.0).unwrap();

        assert_eq!(report.status, ExtractionStatus::Completed);
        assert_eq!(report.segments.len(), 1);
        let segment = &report.segments[0];
        assert_eq!(segment.center_frame, 10);
        assert_eq!(segment.positions.len(), 20);
        assert_eq!(segment.positions[0].y, 32);

        let mut source = ImageSequenceSource::open(&frames_dir, 10.0).unwrap();
        let out_dir = temp_dir("out");
        let artifacts = extractor.export_keyframes(&mut source, &report.segments, &out_dir);
        assert_eq!(artifacts.len(), 1);
        let artifacts = artifacts[0].as_ref().unwrap();
        assert!(artifacts.roi_path.exists());
        assert!(artifacts.raw_path.exists());

        assert_eq!(extractor.stats().processed_videos, 1);
        assert_eq!(extractor.stats().extracted_segments, 1);
    }

    #[test]
    fn test_extract_image_dir_missing() {
        let extractor = LaserMarkExtractor::create(DetectorConfig::default()).unwrap();
        assert!(matches!(
            extractor.extract_image_dir("/nonexistent/laser_marks_api", 25.0),
            Err(LaserError::SourceUnavailable(_))
        ));
    }

    #[test]
    fn test_crop_region() {
        let extractor = LaserMarkExtractor::create(DetectorConfig::default()).unwrap();
        let frame = Frame::new(100, 100, vec![50u8; 100 * 100 * 4], 0, 0);
        let roi = extractor
            .crop_region(
                &frame,
                &TrajectoryBox {
                    x1: 40,
                    y1: 40,
                    x2: 60,
                    y2: 60,
                },
            )
            .unwrap();
        assert_eq!((roi.width(), roi.height()), (80, 80));
    }

    #[test]
    fn test_cancel_then_reset() {
        let frames_dir = temp_dir("cancel");
        write_frames(&frames_dir, 20, 20);

        let extractor = LaserMarkExtractor::create(DetectorConfig::for_precise_scan()).unwrap();
        extractor.cancel();
        let report = extractor.extract_image_dir(&frames_dir, 10.0).unwrap();
        assert_eq!(report.status, ExtractionStatus::Cancelled);

        extractor.reset();
        let report = extractor.extract_image_dir(&frames_dir, 10.0).unwrap();
        assert_eq!(report.status, ExtractionStatus::Completed);
        assert_eq!(report.segments.len(), 1);
    }
}

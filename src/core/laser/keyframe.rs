//! 关键帧导出：每个片段保存中心帧原图 + 激光区域放大图

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use super::config::DetectorConfig;
use super::error::LaserError;
use super::roi::{compress_to_jpeg, RegionCropper};
use super::segment::Segment;
use crate::core::video::source::FrameSource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentArtifacts {
    pub raw_path: PathBuf,
    pub roi_path: PathBuf,
    pub timestamp: String,
    pub laser_duration: f64,
    pub start_time: f64,
    pub end_time: f64,
}

pub struct KeyframeExporter {
    keyframe_dir: PathBuf,
    cropper: RegionCropper,
    jpeg_quality: u8,
}

impl KeyframeExporter {
    pub fn new(output_dir: impl AsRef<Path>, config: &DetectorConfig) -> Self {
        Self {
            keyframe_dir: output_dir.as_ref().join("keyframes"),
            cropper: RegionCropper::from_config(config),
            jpeg_quality: config.jpeg_quality,
        }
    }

    pub fn keyframe_dir(&self) -> &Path {
        &self.keyframe_dir
    }

    pub fn export(
        &self,
        source: &mut dyn FrameSource,
        segment: &Segment,
    ) -> Result<SegmentArtifacts, LaserError> {
        let frame = source.frame_at(segment.center_frame)?;
        fs::create_dir_all(&self.keyframe_dir)?;

        let raw_path = self
            .keyframe_dir
            .join(format!("frame_{}_raw.jpg", segment.center_frame));
        let raw = compress_to_jpeg(&frame.to_rgba_image()?, self.jpeg_quality)?;
        fs::write(&raw_path, raw)?;

        let roi = self.cropper.crop(&frame, &segment.trajectory_box)?;
        let roi_path = self
            .keyframe_dir
            .join(format!("frame_{}_roi.jpg", segment.center_frame));
        fs::write(&roi_path, roi.to_jpeg(self.jpeg_quality)?)?;

        info!("📸 Keyframe saved: {}", roi_path.display());

        Ok(SegmentArtifacts {
            raw_path,
            roi_path,
            timestamp: segment.timestamp_label(),
            laser_duration: segment.laser_duration,
            start_time: segment.start_time,
            end_time: segment.end_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use image::GenericImageView;

    use super::*;
    use crate::core::laser::segment::{Point, TrajectoryBox};
    use crate::core::video::frame::Frame;
    use crate::core::video::source::FrameSequence;

    fn create_test_frame(width: u32, height: u32, frame_number: u64) -> Frame {
        let data = vec![90u8; (width * height * 4) as usize];
        Frame::new(width, height, data, 0, frame_number)
    }

    fn segment(center_frame: u64, trajectory_box: TrajectoryBox) -> Segment {
        Segment {
            start_time: 0.0,
            end_time: 4.5,
            laser_duration: 1.5,
            center_frame,
            positions: vec![Point::new(20, 20)],
            trajectory_box,
        }
    }

    fn output_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "laser_marks_keyframe_{}_{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_export_writes_raw_and_roi() {
        let dir = output_dir("ok");
        let exporter = KeyframeExporter::new(&dir, &DetectorConfig::default());
        let frames = (0..5).map(|i| create_test_frame(64, 48, i)).collect();
        let mut source = FrameSequence::new(frames, 10.0);

        let seg = segment(
            3,
            TrajectoryBox {
                x1: 10,
                y1: 10,
                x2: 30,
                y2: 30,
            },
        );
        let artifacts = exporter.export(&mut source, &seg).unwrap();

        assert_eq!(artifacts.raw_path, dir.join("keyframes/frame_3_raw.jpg"));
        assert_eq!(artifacts.roi_path, dir.join("keyframes/frame_3_roi.jpg"));
        assert_eq!(artifacts.timestamp, "0.0s - 4.5s");
        assert!(artifacts.raw_path.exists());

        let roi = image::open(&artifacts.roi_path).unwrap();
        assert_eq!((roi.width(), roi.height()), (80, 80));
    }

    #[test]
    fn test_export_missing_frame_fails() {
        let dir = output_dir("missing");
        let exporter = KeyframeExporter::new(&dir, &DetectorConfig::default());
        let mut source = FrameSequence::new(vec![create_test_frame(8, 8, 0)], 10.0);

        let seg = segment(
            9,
            TrajectoryBox {
                x1: 0,
                y1: 0,
                x2: 4,
                y2: 4,
            },
        );
        assert!(matches!(
            exporter.export(&mut source, &seg),
            Err(LaserError::FrameRead { index: 9, .. })
        ));
    }
}

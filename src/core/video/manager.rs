//! 提取管理器：单视频内顺序处理，多视频之间并行

use std::sync::{Arc, Mutex, MutexGuard};

use log::{error, info};
use rayon::prelude::*;

use super::frame::Frame;
use super::source::FrameSource;
use crate::core::laser::config::DetectorConfig;
use crate::core::laser::detector::FrameColorDetector;
use crate::core::laser::error::LaserError;
use crate::core::laser::pipeline::{extract_segments_with, CancelFlag, ExtractionReport};
use crate::core::laser::roi::{RegionCropper, RoiImage};
use crate::core::laser::segment::Segment;

/// 下游消费者（AI 描述、入库等），核心不关心如何存储
pub trait SegmentConsumer {
    fn consume(&mut self, segment: &Segment, roi: &RoiImage) -> Result<(), LaserError>;
}

/// 单个片段的交付结果，失败互不影响
#[derive(Debug)]
pub struct SegmentOutcome {
    pub index: usize,
    pub center_frame: u64,
    pub result: Result<(), LaserError>,
}

impl SegmentOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// 累计统计
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchStats {
    pub processed_videos: u64,
    pub extracted_segments: u64,
}

pub struct ExtractionManager {
    config: DetectorConfig,
    detector: FrameColorDetector,
    cropper: RegionCropper,
    cancel: CancelFlag,
    video_count: Arc<Mutex<u64>>,
    segment_count: Arc<Mutex<u64>>,
}

impl ExtractionManager {
    pub fn new(config: DetectorConfig) -> Result<Self, LaserError> {
        let detector = FrameColorDetector::new(&config)?;
        Ok(Self {
            cropper: RegionCropper::from_config(&config),
            config,
            detector,
            cancel: CancelFlag::new(),
            video_count: Arc::new(Mutex::new(0)),
            segment_count: Arc::new(Mutex::new(0)),
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn get_stats(&self) -> BatchStats {
        BatchStats {
            processed_videos: *lock_counter(&self.video_count),
            extracted_segments: *lock_counter(&self.segment_count),
        }
    }

    pub fn reset(&self) {
        *lock_counter(&self.video_count) = 0;
        *lock_counter(&self.segment_count) = 0;
        self.cancel.clear();
    }

    pub fn extract(&self, source: &mut dyn FrameSource) -> Result<ExtractionReport, LaserError> {
        let report = extract_segments_with(source, &self.config, &self.detector, Some(&self.cancel))?;

        *lock_counter(&self.video_count) += 1;
        *lock_counter(&self.segment_count) += report.segments.len() as u64;
        Ok(report)
    }

    /// 多个独立视频并行提取，结果顺序与输入一致
    pub fn extract_batch<S>(&self, sources: Vec<S>) -> Vec<Result<ExtractionReport, LaserError>>
    where
        S: FrameSource + Send,
    {
        info!("🎬 Batch extraction over {} videos", sources.len());
        sources
            .into_par_iter()
            .map(|mut source| self.extract(&mut source))
            .collect()
    }

    pub fn crop(&self, frame: &Frame, segment: &Segment) -> Result<RoiImage, LaserError> {
        self.cropper.crop(frame, &segment.trajectory_box)
    }

    /// 批量裁剪 ROI（帧已解码），每个片段独立成败
    pub fn crop_batch(&self, items: &[(Segment, Frame)]) -> Vec<Result<RoiImage, LaserError>> {
        items
            .par_iter()
            .map(|(segment, frame)| self.crop(frame, segment))
            .collect()
    }

    /// Fetches each segment's center frame, crops its ROI and hands both to
    /// `consumer`. One outcome per segment.
    pub fn deliver_segments(
        &self,
        source: &mut dyn FrameSource,
        segments: &[Segment],
        consumer: &mut dyn SegmentConsumer,
    ) -> Vec<SegmentOutcome> {
        segments
            .iter()
            .enumerate()
            .map(|(index, segment)| {
                let result = source
                    .frame_at(segment.center_frame)
                    .and_then(|frame| self.crop(&frame, segment))
                    .and_then(|roi| consumer.consume(segment, &roi));

                if let Err(e) = &result {
                    error!(
                        "❌ Segment {} ({}) failed: {}",
                        index + 1,
                        segment.timestamp_label(),
                        e
                    );
                }

                SegmentOutcome {
                    index,
                    center_frame: segment.center_frame,
                    result,
                }
            })
            .collect()
    }
}

/// 锁被毒化时沿用内部值
fn lock_counter(counter: &Mutex<u64>) -> MutexGuard<'_, u64> {
    counter.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::laser::pipeline::ExtractionStatus;
    use crate::core::laser::segment::{Point, TrajectoryBox};
    use crate::core::video::source::FrameSequence;

    fn create_test_frame(width: u32, height: u32, frame_number: u64) -> Frame {
        let data = (0..width * height).flat_map(|_| [0, 0, 0, 255]).collect();
        Frame::new(width, height, data, frame_number * 100, frame_number)
    }

    fn paint_square(frame: &mut Frame, x0: u32, y0: u32, size: u32, rgb: [u8; 3]) {
        for y in y0..y0 + size {
            for x in x0..x0 + size {
                let idx = ((y * frame.width + x) * 4) as usize;
                frame.data[idx..idx + 3].copy_from_slice(&rgb);
            }
        }
    }

    /// `lit` frames at the start carry a green dot.
    fn create_video(frame_count: u64, lit: u64) -> FrameSequence {
        let frames = (0..frame_count)
            .map(|i| {
                let mut frame = create_test_frame(64, 48, i);
                if i < lit {
                    paint_square(&mut frame, 30, 20, 4, [0, 255, 0]);
                }
                frame
            })
            .collect();
        FrameSequence::new(frames, 10.0)
    }

    fn precise_manager() -> ExtractionManager {
        ExtractionManager::new(DetectorConfig::for_precise_scan()).unwrap()
    }

    fn segment(center_frame: u64, trajectory_box: TrajectoryBox) -> Segment {
        Segment {
            start_time: 0.0,
            end_time: 1.0,
            laser_duration: 0.5,
            center_frame,
            positions: vec![Point::new(1, 1)],
            trajectory_box,
        }
    }

    struct Collector {
        received: Vec<(u64, u32, u32)>,
        reject_frame: Option<u64>,
    }

    impl SegmentConsumer for Collector {
        fn consume(&mut self, segment: &Segment, roi: &RoiImage) -> Result<(), LaserError> {
            if self.reject_frame == Some(segment.center_frame) {
                return Err(LaserError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "store full",
                )));
            }
            self.received
                .push((segment.center_frame, roi.width(), roi.height()));
            Ok(())
        }
    }

    #[test]
    fn test_manager_creation() {
        let manager = precise_manager();
        assert_eq!(
            manager.get_stats(),
            BatchStats {
                processed_videos: 0,
                extracted_segments: 0
            }
        );
    }

    #[test]
    fn test_manager_rejects_invalid_config() {
        let config = DetectorConfig {
            min_laser_frames: 0,
            ..Default::default()
        };
        assert!(ExtractionManager::new(config).is_err());
    }

    #[test]
    fn test_manager_extract_counts() {
        let manager = precise_manager();
        let mut video = create_video(40, 12);

        let report = manager.extract(&mut video).unwrap();
        assert_eq!(report.status, ExtractionStatus::Completed);
        assert_eq!(report.segments.len(), 1);
        assert_eq!(report.segments[0].center_frame, 6);

        let stats = manager.get_stats();
        assert_eq!(stats.processed_videos, 1);
        assert_eq!(stats.extracted_segments, 1);
    }

    #[test]
    fn test_manager_batch_preserves_order() {
        let manager = precise_manager();
        let videos = vec![create_video(30, 0), create_video(30, 10), create_video(30, 2)];

        let results = manager.extract_batch(videos);
        assert_eq!(results.len(), 3);

        let statuses: Vec<_> = results
            .iter()
            .map(|r| r.as_ref().unwrap().status)
            .collect();
        assert_eq!(
            statuses,
            vec![
                ExtractionStatus::NoDetections,
                ExtractionStatus::Completed,
                ExtractionStatus::Completed
            ]
        );
        assert_eq!(results[1].as_ref().unwrap().segments.len(), 1);
        assert!(results[2].as_ref().unwrap().segments.is_empty());
        assert_eq!(manager.get_stats().processed_videos, 3);
    }

    #[test]
    fn test_manager_cancel_and_reset() {
        let manager = precise_manager();
        manager.cancel();

        let report = manager.extract(&mut create_video(30, 10)).unwrap();
        assert_eq!(report.status, ExtractionStatus::Cancelled);

        manager.reset();
        assert_eq!(manager.get_stats().processed_videos, 0);
        let report = manager.extract(&mut create_video(30, 10)).unwrap();
        assert_eq!(report.status, ExtractionStatus::Completed);
    }

    #[test]
    fn test_counters_survive_poisoned_lock() {
        let manager = precise_manager();
        let counter = Arc::clone(&manager.video_count);
        let _ = std::thread::spawn(move || {
            let _guard = counter.lock().unwrap();
            panic!("poison video counter");
        })
        .join();
        assert!(manager.video_count.is_poisoned());

        manager.extract(&mut create_video(30, 10)).unwrap();
        assert_eq!(
            manager.get_stats(),
            BatchStats {
                processed_videos: 1,
                extracted_segments: 1
            }
        );

        manager.reset();
        assert_eq!(manager.get_stats().processed_videos, 0);
    }

    #[test]
    fn test_crop_batch_isolates_failures() {
        let manager = precise_manager();
        let frame = create_test_frame(64, 48, 0);
        let items = vec![
            (
                segment(0, TrajectoryBox { x1: 10, y1: 10, x2: 20, y2: 20 }),
                frame.clone(),
            ),
            (
                segment(0, TrajectoryBox { x1: 64, y1: 0, x2: 64, y2: 10 }),
                frame.clone(),
            ),
        ];

        let results = manager.crop_batch(&items);
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(LaserError::EmptyRegion { .. })));
    }

    #[test]
    fn test_deliver_segments_isolates_failures() {
        let manager = precise_manager();
        let mut video = create_video(10, 0);
        let bbox = TrajectoryBox { x1: 10, y1: 10, x2: 30, y2: 30 };
        let segments = vec![
            segment(2, bbox),
            segment(99, bbox),
            segment(4, bbox),
            segment(6, bbox),
        ];
        let mut consumer = Collector {
            received: Vec::new(),
            reject_frame: Some(4),
        };

        let outcomes = manager.deliver_segments(&mut video, &segments, &mut consumer);

        assert_eq!(outcomes.len(), 4);
        assert!(outcomes[0].is_ok());
        assert!(matches!(
            outcomes[1].result,
            Err(LaserError::FrameRead { index: 99, .. })
        ));
        assert!(matches!(outcomes[2].result, Err(LaserError::Io(_))));
        assert!(outcomes[3].is_ok());
        assert_eq!(consumer.received, vec![(2, 80, 80), (6, 80, 80)]);
    }
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};

use super::cluster::{ClusterAccumulator, ClusterConfig, RawCluster};
use super::config::DetectorConfig;
use super::detector::{Detection, FrameColorDetector, PointDetector};
use super::error::LaserError;
use super::segment::{Segment, SegmentBuilder};
use crate::core::video::frame::{Frame, VideoInfo};
use crate::core::video::source::FrameSource;

/// 跨线程共享的取消标记，只在帧与帧之间检查
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStatus {
    Completed,
    /// The whole video produced zero qualifying detections.
    NoDetections,
    Cancelled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub frames_read: u64,
    pub sampled_frames: u64,
    pub skipped_frames: u64,
    pub detection_frames: u64,
    pub clusters_discarded: u64,
    /// Clusters that could not be turned into a segment.
    pub segments_dropped: u64,
    pub segments: u64,
}

#[derive(Debug, Clone)]
pub struct ExtractionReport {
    pub segments: Vec<Segment>,
    pub stats: ExtractionStats,
    pub status: ExtractionStatus,
}

impl ExtractionReport {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// 逐帧流式处理：采样检测 -> 时间聚类 -> 片段构建
pub struct SegmentPipeline {
    sample_interval: u64,
    video: VideoInfo,
    accumulator: ClusterAccumulator,
    builder: SegmentBuilder,
    stats: ExtractionStats,
}

impl SegmentPipeline {
    pub fn new(config: &DetectorConfig, video: VideoInfo) -> Result<Self, LaserError> {
        config.validate()?;
        video.validate()?;

        Ok(Self {
            sample_interval: config.sample_interval as u64,
            video,
            accumulator: ClusterAccumulator::new(ClusterConfig::from(config)),
            builder: SegmentBuilder::new(config, video),
            stats: ExtractionStats::default(),
        })
    }

    pub fn is_sampled(&self, frame_number: u64) -> bool {
        frame_number % self.sample_interval == 0
    }

    /// Returns a segment whenever this frame closes a long-enough cluster.
    pub fn process_frame(
        &mut self,
        frame: &Frame,
        detector: &dyn PointDetector,
    ) -> Result<Option<Segment>, LaserError> {
        self.stats.frames_read += 1;

        if !self.is_sampled(frame.frame_number) {
            return Ok(None);
        }
        self.stats.sampled_frames += 1;

        if let Err(e) = frame.check_buffer() {
            self.count_skip(&e);
            return Ok(None);
        }

        let points = detector.detect(frame);
        if points.is_empty() {
            return Ok(None);
        }

        self.stats.detection_frames += 1;
        let detection = Detection::new(
            frame.frame_number,
            self.video.time_of(frame.frame_number),
            points,
        );

        Ok(self
            .accumulator
            .push(detection)?
            .and_then(|cluster| self.finalize(&cluster)))
    }

    /// Counts an unreadable sampled frame without touching cluster state.
    pub fn skip_frame(&mut self, error: &LaserError) {
        self.stats.frames_read += 1;
        self.count_skip(error);
    }

    /// Flushes the open group at end of stream.
    pub fn finish(&mut self) -> Option<Segment> {
        let closed = self.accumulator.finish();
        self.stats.clusters_discarded = self.accumulator.discarded() as u64;
        closed.and_then(|cluster| self.finalize(&cluster))
    }

    /// Drops the open group; finalized segments stay valid.
    pub fn abandon(&mut self) {
        let dropped = self.accumulator.abandon();
        if dropped > 0 {
            debug!("Abandoned open laser group of {} detections", dropped);
        }
    }

    pub fn stats(&self) -> &ExtractionStats {
        &self.stats
    }

    pub fn reset(&mut self) {
        self.accumulator.reset();
        self.stats = ExtractionStats::default();
    }

    fn count_skip(&mut self, error: &LaserError) {
        self.stats.skipped_frames += 1;
        warn!("⚠️ Skipping unreadable frame: {}", error);
    }

    /// 单个片段失败只丢弃该片段，不中断整个视频
    fn finalize(&mut self, cluster: &RawCluster) -> Option<Segment> {
        self.stats.clusters_discarded = self.accumulator.discarded() as u64;
        let segment = match self.builder.build(cluster) {
            Ok(segment) => segment,
            Err(e) => {
                self.stats.segments_dropped += 1;
                warn!(
                    "⚠️ Dropping laser group at {:.2}s: {}",
                    cluster.start_time(),
                    e
                );
                return None;
            }
        };
        self.stats.segments += 1;
        info!(
            "✅ Laser segment {}: {} ({} detections, dwell {:.1}s)",
            self.stats.segments,
            segment.timestamp_label(),
            cluster.len(),
            segment.laser_duration
        );
        Some(segment)
    }
}

/// 默认颜色检测器跑完整个帧源
pub fn extract_segments(
    source: &mut dyn FrameSource,
    config: &DetectorConfig,
) -> Result<ExtractionReport, LaserError> {
    let detector = FrameColorDetector::new(config)?;
    extract_segments_with(source, config, &detector, None)
}

pub fn extract_segments_with(
    source: &mut dyn FrameSource,
    config: &DetectorConfig,
    detector: &dyn PointDetector,
    cancel: Option<&CancelFlag>,
) -> Result<ExtractionReport, LaserError> {
    let video = source.info();
    let mut pipeline = SegmentPipeline::new(config, video)?;

    info!(
        "🎬 Extracting laser marks: {} frames, {:.1}fps, {:.1}s",
        video.frame_count,
        video.fps,
        video.duration_secs()
    );

    let mut segments = Vec::new();
    let mut cancelled = false;

    loop {
        if cancel.map(|c| c.is_cancelled()).unwrap_or(false) {
            cancelled = true;
            break;
        }

        match source.next_frame() {
            Ok(Some(frame)) => {
                segments.extend(pipeline.process_frame(&frame, detector)?);
            }
            Ok(None) => break,
            Err(e) if e.is_recoverable() => pipeline.skip_frame(&e),
            Err(e) => return Err(e),
        }
    }

    let status = if cancelled {
        pipeline.abandon();
        info!("⏹️ Extraction cancelled with {} segments", segments.len());
        ExtractionStatus::Cancelled
    } else {
        segments.extend(pipeline.finish());
        check_duration(&video, pipeline.stats().frames_read);

        if pipeline.stats().detection_frames == 0 {
            info!("No laser detections in {} frames", pipeline.stats().frames_read);
            ExtractionStatus::NoDetections
        } else {
            ExtractionStatus::Completed
        }
    };

    let stats = pipeline.stats().clone();
    info!(
        "Extraction done: {} sampled, {} with laser, {} segments, {} discarded",
        stats.sampled_frames, stats.detection_frames, stats.segments, stats.clusters_discarded
    );

    Ok(ExtractionReport {
        segments,
        stats,
        status,
    })
}

/// 帧数与时长换算不一致时告警（以 frame_count / fps 为准）
fn check_duration(video: &VideoInfo, frames_read: u64) {
    let drift = frames_read.abs_diff(video.frame_count);
    if drift > 1 {
        warn!(
            "⚠️ Source reported {} frames ({:.2}s) but delivered {} ({:.2}s); segment times follow the reported duration",
            video.frame_count,
            video.duration_secs(),
            frames_read,
            frames_read as f64 * video.frame_period_secs()
        );
    }
}

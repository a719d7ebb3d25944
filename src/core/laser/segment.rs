use log::warn;
use serde::{Deserialize, Serialize};

use super::cluster::RawCluster;
use super::config::DetectorConfig;
use super::error::LaserError;
use crate::core::video::frame::VideoInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// 轨迹包围框，(x1, y1) 左上，(x2, y2) 右下（不含）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrajectoryBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl TrajectoryBox {
    /// Bounding box of `points` grown by `margin` on every side and clamped
    /// to `[0, width] x [0, height]`. `None` when `points` is empty.
    pub fn enclosing(points: &[Point], margin: u32, width: u32, height: u32) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }

        Some(Self {
            x1: min_x.saturating_sub(margin).min(width),
            y1: min_y.saturating_sub(margin).min(height),
            x2: max_x.saturating_add(margin).min(width),
            y2: max_y.saturating_add(margin).min(height),
        })
    }

    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }
}

/// 一次激光标记：带上下文的时间窗 + 空间轨迹框
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start_time: f64,
    pub end_time: f64,
    /// Span between first and last detection, before context padding.
    pub laser_duration: f64,
    pub center_frame: u64,
    pub positions: Vec<Point>,
    pub trajectory_box: TrajectoryBox,
}

impl Segment {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Longer dwell means the presenter lingered on the content.
    pub fn importance(&self) -> f64 {
        self.laser_duration
    }

    pub fn timestamp_label(&self) -> String {
        format!("{:.1}s - {:.1}s", self.start_time, self.end_time)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentBuilder {
    pre_context_secs: f64,
    post_context_secs: f64,
    margin: u32,
    video: VideoInfo,
}

impl SegmentBuilder {
    pub fn new(config: &DetectorConfig, video: VideoInfo) -> Self {
        Self {
            pre_context_secs: config.pre_context_secs,
            post_context_secs: config.post_context_secs,
            margin: config.trajectory_margin,
            video,
        }
    }

    pub fn build(&self, cluster: &RawCluster) -> Result<Segment, LaserError> {
        if cluster.is_empty() {
            return Err(LaserError::PreconditionViolation(
                "empty cluster reached segment builder".into(),
            ));
        }

        let first = cluster.start_time();
        let last = cluster.end_time();
        let video_duration = self.video.duration_secs();

        let end_time = (last + self.post_context_secs).min(video_duration);
        let mut start_time = (first - self.pre_context_secs).max(0.0);
        // 源实际帧数多于声明时，窗口收缩到声明时长的末尾
        if start_time > end_time {
            warn!(
                "⚠️ Laser group at {:.2}s lies past reported duration {:.2}s",
                first, video_duration
            );
            start_time = end_time;
        }

        let detections = cluster.detections();
        let center_frame = detections[detections.len() / 2].frame_index;

        let positions: Vec<Point> = detections
            .iter()
            .flat_map(|d| d.points.iter().copied())
            .collect();

        let trajectory_box =
            TrajectoryBox::enclosing(&positions, self.margin, self.video.width, self.video.height)
                .ok_or_else(|| {
                    LaserError::PreconditionViolation(format!(
                        "cluster starting at frame {} carries no points",
                        cluster.first().frame_index
                    ))
                })?;

        Ok(Segment {
            start_time,
            end_time,
            laser_duration: last - first,
            center_frame,
            positions,
            trajectory_box,
        })
    }
}

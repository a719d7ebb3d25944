//! 时间聚类：相邻检测间隔不超过 merge gap 的归为一组，过短的组视为噪声丢弃

use log::debug;

use super::config::DetectorConfig;
use super::detector::Detection;
use super::error::LaserError;

/// Non-empty, strictly time-ordered run of detections whose adjacent gaps
/// are all within the merge gap.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCluster {
    detections: Vec<Detection>,
}

impl RawCluster {
    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn first(&self) -> &Detection {
        &self.detections[0]
    }

    pub fn last(&self) -> &Detection {
        &self.detections[self.detections.len() - 1]
    }

    pub fn start_time(&self) -> f64 {
        self.first().time_secs
    }

    pub fn end_time(&self) -> f64 {
        self.last().time_secs
    }

    pub fn into_detections(self) -> Vec<Detection> {
        self.detections
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterConfig {
    pub merge_gap_secs: f64,
    pub min_laser_frames: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            merge_gap_secs: 1.0,
            min_laser_frames: 5,
        }
    }
}

impl From<&DetectorConfig> for ClusterConfig {
    fn from(config: &DetectorConfig) -> Self {
        Self {
            merge_gap_secs: config.merge_gap_secs,
            min_laser_frames: config.min_laser_frames,
        }
    }
}

/// 聚类累加器：`push` 在组被关闭时产出 RawCluster
#[derive(Debug, Clone)]
pub struct ClusterAccumulator {
    config: ClusterConfig,
    current: Vec<Detection>,
    discarded: usize,
}

impl ClusterAccumulator {
    pub fn new(config: ClusterConfig) -> Self {
        Self {
            config,
            current: Vec::new(),
            discarded: 0,
        }
    }

    /// Feeds the next detection. Returns the previous group when the gap
    /// closes it and it is long enough to keep.
    pub fn push(&mut self, detection: Detection) -> Result<Option<RawCluster>, LaserError> {
        if self.current.is_empty() {
            self.current.push(detection);
            return Ok(None);
        }

        let previous = &self.current[self.current.len() - 1];

        let gap = detection.time_secs - previous.time_secs;
        if gap <= 0.0 {
            return Err(LaserError::PreconditionViolation(format!(
                "detection at frame {} ({:.3}s) does not follow frame {} ({:.3}s)",
                detection.frame_index,
                detection.time_secs,
                previous.frame_index,
                previous.time_secs
            )));
        }

        if gap <= self.config.merge_gap_secs {
            self.current.push(detection);
            return Ok(None);
        }

        let closed = std::mem::replace(&mut self.current, vec![detection]);
        Ok(self.close(closed))
    }

    /// Applies the close-or-discard rule to the open group.
    pub fn finish(&mut self) -> Option<RawCluster> {
        let closed = std::mem::take(&mut self.current);
        self.close(closed)
    }

    /// Drops the open group without emitting it.
    pub fn abandon(&mut self) -> usize {
        let dropped = self.current.len();
        self.current.clear();
        dropped
    }

    pub fn pending(&self) -> usize {
        self.current.len()
    }

    pub fn discarded(&self) -> usize {
        self.discarded
    }

    pub fn reset(&mut self) {
        self.current.clear();
        self.discarded = 0;
    }

    fn close(&mut self, group: Vec<Detection>) -> Option<RawCluster> {
        if group.is_empty() {
            return None;
        }
        if group.len() >= self.config.min_laser_frames {
            return Some(RawCluster { detections: group });
        }

        debug!(
            "Discarding short laser group: {} detections at {:.2}s",
            group.len(),
            group[0].time_secs
        );
        self.discarded += 1;
        None
    }
}

#[derive(Debug, Clone, Default)]
pub struct TemporalClusterer {
    config: ClusterConfig,
}

impl TemporalClusterer {
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    /// Partitions a time-ordered detection stream into raw clusters.
    pub fn cluster<I>(&self, detections: I) -> Result<Vec<RawCluster>, LaserError>
    where
        I: IntoIterator<Item = Detection>,
    {
        let acc = ClusterAccumulator::new(self.config);
        let (mut acc, mut clusters) = detections.into_iter().try_fold(
            (acc, Vec::new()),
            |(mut acc, mut clusters), detection| {
                clusters.extend(acc.push(detection)?);
                Ok::<_, LaserError>((acc, clusters))
            },
        )?;
        clusters.extend(acc.finish());
        Ok(clusters)
    }
}

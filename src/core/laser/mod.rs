//! 激光笔标记检测与分段
//!
//! 核心流程：
//! 1. 颜色掩码 - HSV 阈值筛出红/绿激光候选像素，开运算去噪
//! 2. 连通域 - 按面积过滤，输出质心
//! 3. 时间聚类 - 间隔不超过 merge gap 的检测归为一组，过短丢弃
//! 4. 片段构建 - 加上下文时间窗、轨迹包围框、中心帧
//! 5. ROI 裁剪 - 中心帧上放大激光区域

pub mod blob;
pub mod cluster;
pub mod color_mask;
pub mod config;
pub mod detector;
pub mod error;
pub mod keyframe;
pub mod pipeline;
pub mod roi;
pub mod segment;

pub use blob::BlobExtractor;
pub use cluster::{ClusterAccumulator, ClusterConfig, RawCluster, TemporalClusterer};
pub use color_mask::ColorMaskBuilder;
pub use config::{AreaRange, ColorRanges, DetectorConfig, HueBand, PointerColorMode};
pub use detector::{Detection, FrameColorDetector, MockPointDetector, PointDetector};
pub use error::LaserError;
pub use keyframe::{KeyframeExporter, SegmentArtifacts};
pub use pipeline::{
    extract_segments, extract_segments_with, CancelFlag, ExtractionReport, ExtractionStats,
    ExtractionStatus, SegmentPipeline,
};
pub use roi::{RegionCropper, RoiImage};
pub use segment::{Point, Segment, SegmentBuilder, TrajectoryBox};

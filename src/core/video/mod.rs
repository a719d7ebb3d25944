pub mod frame;
pub mod manager;
pub mod source;

pub use frame::{Frame, Hsv, HsvImage, VideoInfo};
pub use manager::{BatchStats, ExtractionManager, SegmentConsumer, SegmentOutcome};
pub use source::{FrameSequence, FrameSource, ImageSequenceSource};

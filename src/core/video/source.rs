//! 帧源：视频解码在外部完成，这里只约定逐帧读取 / 按索引取帧的接口

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};

use super::frame::{Frame, VideoInfo};
use crate::core::laser::error::LaserError;

pub trait FrameSource {
    fn info(&self) -> VideoInfo;

    /// Next frame in decode order, `Ok(None)` at end of stream.
    ///
    /// `LaserError::FrameRead` marks a single unreadable frame; the stream
    /// position still advances past it.
    fn next_frame(&mut self) -> Result<Option<Frame>, LaserError>;

    fn frame_at(&mut self, index: u64) -> Result<Frame, LaserError>;
}

/// 已解码好的内存帧序列
pub struct FrameSequence {
    frames: Vec<Frame>,
    fps: f64,
    cursor: usize,
}

impl FrameSequence {
    pub fn new(frames: Vec<Frame>, fps: f64) -> Self {
        Self {
            frames,
            fps,
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }
}

impl FrameSource for FrameSequence {
    fn info(&self) -> VideoInfo {
        let (width, height) = self
            .frames
            .first()
            .map(|f| (f.width, f.height))
            .unwrap_or((0, 0));

        VideoInfo {
            frame_count: self.frames.len() as u64,
            fps: self.fps,
            width,
            height,
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, LaserError> {
        let frame = self.frames.get(self.cursor).cloned();
        if frame.is_some() {
            self.cursor += 1;
        }
        Ok(frame)
    }

    fn frame_at(&mut self, index: u64) -> Result<Frame, LaserError> {
        self.frames
            .get(index as usize)
            .cloned()
            .ok_or_else(|| LaserError::FrameRead {
                index,
                reason: format!("index out of range (frame count {})", self.frames.len()),
            })
    }
}

/// 图片序列目录（jpg/png/bmp），按文件名排序作为连续帧
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    fps: f64,
    width: u32,
    height: u32,
    cursor: usize,
}

impl ImageSequenceSource {
    const EXTENSIONS: [&'static str; 4] = ["jpg", "jpeg", "png", "bmp"];

    pub fn open(dir: impl AsRef<Path>, fps: f64) -> Result<Self, LaserError> {
        let dir = dir.as_ref();
        if !fps.is_finite() || fps <= 0.0 {
            return Err(LaserError::SourceUnavailable(format!(
                "invalid frame rate: {}",
                fps
            )));
        }

        let entries = std::fs::read_dir(dir).map_err(|e| {
            LaserError::SourceUnavailable(format!("cannot open {}: {}", dir.display(), e))
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && Self::is_image(p))
            .collect();
        paths.sort();

        let first = paths.first().ok_or_else(|| {
            LaserError::SourceUnavailable(format!("no image frames in {}", dir.display()))
        })?;

        let (width, height) = image::image_dimensions(first).map_err(|e| {
            LaserError::SourceUnavailable(format!("cannot read {}: {}", first.display(), e))
        })?;

        info!(
            "🎬 ImageSequenceSource: {} frames ({}x{}) from {}",
            paths.len(),
            width,
            height,
            dir.display()
        );

        Ok(Self {
            paths,
            fps,
            width,
            height,
            cursor: 0,
        })
    }

    fn is_image(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| Self::EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }

    fn load(&self, index: u64) -> Result<Frame, LaserError> {
        let path = self.paths.get(index as usize).ok_or_else(|| LaserError::FrameRead {
            index,
            reason: format!("index out of range (frame count {})", self.paths.len()),
        })?;

        let image = image::open(path)
            .map_err(|e| LaserError::FrameRead {
                index,
                reason: format!("{}: {}", path.display(), e),
            })?
            .to_rgba8();

        if image.width() != self.width || image.height() != self.height {
            return Err(LaserError::FrameRead {
                index,
                reason: format!(
                    "{} is {}x{}, expected {}x{}",
                    path.display(),
                    image.width(),
                    image.height(),
                    self.width,
                    self.height
                ),
            });
        }

        debug!("Loaded frame {} from {}", index, path.display());
        let timestamp = Duration::from_secs_f64(index as f64 / self.fps);
        Ok(Frame::from_rgba_image(image, timestamp, index))
    }
}

impl FrameSource for ImageSequenceSource {
    fn info(&self) -> VideoInfo {
        VideoInfo {
            frame_count: self.paths.len() as u64,
            fps: self.fps,
            width: self.width,
            height: self.height,
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, LaserError> {
        if self.cursor >= self.paths.len() {
            return Ok(None);
        }
        let index = self.cursor as u64;
        self.cursor += 1;
        self.load(index).map(Some)
    }

    fn frame_at(&mut self, index: u64) -> Result<Frame, LaserError> {
        self.load(index)
    }
}

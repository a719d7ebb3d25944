use thiserror::Error;

#[derive(Debug, Error)]
pub enum LaserError {
    #[error("Frame source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("Failed to read frame {index}: {reason}")]
    FrameRead { index: u64, reason: String },
    #[error("Crop region ({x1}, {y1}) - ({x2}, {y2}) has zero area")]
    EmptyRegion { x1: u32, y1: u32, x2: u32, y2: u32 },
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LaserError {
    /// 单帧读取失败可跳过，其余错误终止本次提取
    pub fn is_recoverable(&self) -> bool {
        matches!(self, LaserError::FrameRead { .. })
    }
}

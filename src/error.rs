// src/error.rs

use thiserror::Error;

/// Errors surfaced by the analysis engine. Frame-level variants are
/// recoverable: the caller skips that frame and keeps feeding the stream.
#[derive(Debug, Error, PartialEq)]
pub enum AnalysisError {
    #[error("invalid stream: {width}x{height} frames cannot be analyzed")]
    InvalidStream { width: usize, height: usize },

    #[error("malformed frame {width}x{height}: expected {expected} bytes, got {actual}")]
    MalformedFrame {
        width: usize,
        height: usize,
        expected: usize,
        actual: usize,
    },

    #[error("frame size {actual_width}x{actual_height} does not match stream size {width}x{height}")]
    FrameSizeMismatch {
        width: usize,
        height: usize,
        actual_width: usize,
        actual_height: usize,
    },

    #[error("frame index {received} is not after previous frame {previous}")]
    OutOfOrder { previous: u64, received: u64 },

    /// OpenCV rejected an otherwise valid frame
    #[error("vision backend failed: {0}")]
    Vision(String),
}

#[cfg(feature = "video")]
impl From<opencv::Error> for AnalysisError {
    fn from(e: opencv::Error) -> Self {
        Self::Vision(e.to_string())
    }
}

impl AnalysisError {
    /// Frame-level failures that should be skipped rather than abort the stream.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidStream { .. })
    }
}

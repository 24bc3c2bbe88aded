//! Error types for the frame muxer

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for frame muxer operations
pub type Result<T> = std::result::Result<T, MuxerError>;

/// One of the two input streams of the muxer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// Decoded video frames
    Video,
    /// Interleaved audio samples
    Audio,
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamKind::Video => write!(f, "video"),
            StreamKind::Audio => write!(f, "audio"),
        }
    }
}

/// Errors surfaced to the caller of the muxer
///
/// Only [`MuxerError::Overflow`] is expected during normal playback; the
/// remaining variants come from construction and configuration.
#[derive(Debug, Error)]
pub enum MuxerError {
    /// The current segment of a stream grew past its bound
    #[error("{stream}-stream overflow ({buffered} > {limit}). This can be caused by incorrect frame-rate. Check clip meta-data.")]
    Overflow {
        /// Stream that overflowed
        stream: StreamKind,
        /// Units (frames or samples) buffered in the segment
        buffered: usize,
        /// Bound that was exceeded
        limit: usize,
    },

    /// Invalid construction parameters (frame rate, cadence, format)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Filter pipeline could not be built from its descriptor
    #[error("Filter error: {0}")]
    Filter(String),

    /// I/O error while reading configuration
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// The async stage task terminated abnormally
    #[error("Stage error: {0}")]
    Stage(String),
}

impl MuxerError {
    /// True for stream overflow, the one error a playing item must handle
    pub fn is_overflow(&self) -> bool {
        matches!(self, MuxerError::Overflow { .. })
    }
}

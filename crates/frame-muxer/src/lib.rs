//! Audio/video frame muxer for RemoteMedia playback pipelines
//!
//! Sits between a decoder and a renderer. Decoded video frames and audio
//! samples are buffered per segment; once the first frame arrives a display
//! mode is chosen that reconciles the source's field structure and frame
//! rate with the target format, and output frames are assembled carrying one
//! or two video frames plus exactly one cadence's worth of audio.
//!
//! # Modules
//!
//! - [`segments`] - flush-delimited stream buffers with overflow bounds
//! - [`cadence`] - rotating per-frame audio sample counts
//! - [`display_mode`] - display mode selection
//! - [`muxer`] - the frame assembler and frame-count projection
//! - [`filter`] - filter pipeline abstraction and reconfiguration
//! - [`stage`] - the muxer on its own tokio task
//!
//! # Example
//!
//! ```
//! use remotemedia_frame_muxer::{FrameMuxer, PixelFormat, VideoFormat, VideoFrame};
//!
//! let mut muxer = FrameMuxer::new(25.0, VideoFormat::X1080p2500.desc(), "")?;
//!
//! let frame = VideoFrame::new(1920, 1080, PixelFormat::Bgra32, vec![0u8; 16]);
//! muxer.push_video(frame.into())?;
//! muxer.push_audio(vec![0i32; 3840].into())?;
//!
//! let output = muxer.try_pop().expect("one tick buffered");
//! assert_eq!(output.audio.len(), 3840);
//! # Ok::<(), remotemedia_frame_muxer::MuxerError>(())
//! ```

pub mod cadence;
pub mod config;
pub mod display_mode;
pub mod error;
pub mod filter;
pub mod format;
pub mod frame;
pub mod muxer;
pub mod segments;
pub mod stage;

pub use cadence::AudioCadence;
pub use config::MuxerConfig;
pub use display_mode::{get_display_mode, select_display_mode, DisplayMode, ModeSelection};
pub use error::{MuxerError, Result, StreamKind};
pub use filter::{FieldFilter, FieldFilterFactory, FilterAdapter, FilterFactory, VideoFilter};
pub use format::{print_mode, FieldMode, VideoFormat, VideoFormatDesc};
pub use frame::{
    AudioChunk, DefaultFrameFactory, FrameComposition, FrameFactory, OutputFrame, PixelFormat,
    PixelFormatDesc, StreamItem, VideoFrame,
};
pub use muxer::{FrameMuxer, FrameMuxerBuilder, MuxerStats};
pub use stage::{MuxerInput, MuxerStage, StageEvent, StageReport};

//! Frame types flowing through the muxer
//!
//! Decoded video frames and audio chunks come in wrapped in a
//! [`StreamItem`]; composite [`OutputFrame`]s go out to the renderer.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::format::FieldMode;

/// Interleaved audio samples as delivered by the decoder
pub type AudioChunk = Vec<i32>;

/// Pixel format of a video frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum PixelFormat {
    /// No pixel data (blank filler frames)
    Invalid = 0,

    /// YUV 4:2:0 planar
    Yuv420p = 1,

    /// NV12 (semi-planar, Y plane + interleaved UV)
    Nv12 = 2,

    /// Packed 24-bit RGB
    Rgb24 = 3,

    /// Packed 32-bit RGBA
    Rgba32 = 4,

    /// Packed 32-bit BGRA
    Bgra32 = 5,
}

impl PixelFormat {
    /// Expected buffer size in bytes
    pub fn buffer_size(&self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            PixelFormat::Yuv420p | PixelFormat::Nv12 => pixels * 3 / 2,
            PixelFormat::Rgb24 => pixels * 3,
            PixelFormat::Rgba32 | PixelFormat::Bgra32 => pixels * 4,
            PixelFormat::Invalid => 0,
        }
    }
}

/// Layout requested from a [`FrameFactory`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormatDesc {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
}

impl PixelFormatDesc {
    pub fn new(format: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            format,
            width,
            height,
        }
    }

    /// Descriptor of a blank frame without pixel data
    pub fn invalid() -> Self {
        Self::new(PixelFormat::Invalid, 0, 0)
    }
}

/// Decoded video frame
///
/// Pixel data is reference counted so composite outputs (a duplicated tick,
/// say) share the buffer instead of copying it.
#[derive(Clone)]
pub struct VideoFrame {
    data: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub interlaced: bool,
    pub top_field_first: bool,
    /// Presentation timestamp assigned by the decoder
    pub pts: Option<i64>,
    /// Field this frame was rebuilt from by a bob deinterlacer
    pub field: Option<FieldMode>,
    owner: Option<Uuid>,
}

impl VideoFrame {
    /// Create a progressive frame
    pub fn new(width: u32, height: u32, pixel_format: PixelFormat, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            data: data.into(),
            width,
            height,
            pixel_format,
            interlaced: false,
            top_field_first: false,
            pts: None,
            field: None,
            owner: None,
        }
    }

    /// Mark the frame as interlaced with the given field dominance
    pub fn interlaced(mut self, top_field_first: bool) -> Self {
        self.interlaced = true;
        self.top_field_first = top_field_first;
        self
    }

    pub fn with_pts(mut self, pts: i64) -> Self {
        self.pts = Some(pts);
        self
    }

    /// Tag the frame with the owner that allocated it
    pub fn with_owner(mut self, owner: Uuid) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn owner(&self) -> Option<Uuid> {
        self.owner
    }

    /// Field structure as reported by the decoder
    pub fn field_mode(&self) -> FieldMode {
        FieldMode::from_flags(self.interlaced, self.top_field_first)
    }

    /// True for blank filler frames
    pub fn is_empty(&self) -> bool {
        self.pixel_format == PixelFormat::Invalid
    }

    /// Whether two frames share the same pixel buffer
    pub fn shares_data_with(&self, other: &VideoFrame) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl std::fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("pixel_format", &self.pixel_format)
            .field("field_mode", &self.field_mode())
            .field("pts", &self.pts)
            .field("field", &self.field)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Item pushed into one of the muxer's input streams
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem<T> {
    /// Decoded payload
    Data(T),
    /// End of the current segment (clip end, loop point)
    Flush,
    /// No payload for this tick, but the pipeline must still advance
    Empty,
}

impl<T> From<T> for StreamItem<T> {
    fn from(data: T) -> Self {
        StreamItem::Data(data)
    }
}

/// Video part of an output frame
#[derive(Debug, Clone)]
pub enum FrameComposition {
    /// A single frame shown as-is
    Single(VideoFrame),
    /// Two frames woven into one interlaced frame
    Interlaced {
        first: VideoFrame,
        second: VideoFrame,
        /// Field `first` is shown in
        first_field: FieldMode,
    },
}

impl FrameComposition {
    /// Weave two consecutive frames using the target field order
    ///
    /// With a progressive target there is nothing to weave and the later
    /// frame wins.
    pub fn interlace(first: VideoFrame, second: VideoFrame, field_mode: FieldMode) -> Self {
        if field_mode.is_progressive() {
            return FrameComposition::Single(second);
        }
        FrameComposition::Interlaced {
            first,
            second,
            first_field: field_mode,
        }
    }

    /// Frames in presentation order
    pub fn frames(&self) -> Vec<&VideoFrame> {
        match self {
            FrameComposition::Single(frame) => vec![frame],
            FrameComposition::Interlaced { first, second, .. } => vec![first, second],
        }
    }

    pub fn is_interlaced(&self) -> bool {
        matches!(self, FrameComposition::Interlaced { .. })
    }
}

/// Composite frame ready for the renderer
#[derive(Debug, Clone)]
pub struct OutputFrame {
    pub composition: FrameComposition,
    /// Audio matched to this frame by the cadence
    pub audio: AudioChunk,
}

impl OutputFrame {
    pub fn new(composition: FrameComposition, audio: AudioChunk) -> Self {
        Self { composition, audio }
    }

    /// Timestamps of the composed frames, in presentation order
    pub fn pts(&self) -> Vec<Option<i64>> {
        self.composition.frames().iter().map(|frame| frame.pts).collect()
    }
}

/// Allocates frames on behalf of the muxer
pub trait FrameFactory: Send + Sync {
    /// Create a frame owned by `owner`
    fn create_frame(&self, owner: Uuid, desc: &PixelFormatDesc) -> VideoFrame;
}

/// Heap-backed frame factory producing zeroed buffers
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultFrameFactory;

impl FrameFactory for DefaultFrameFactory {
    fn create_frame(&self, owner: Uuid, desc: &PixelFormatDesc) -> VideoFrame {
        let size = desc.format.buffer_size(desc.width, desc.height);
        VideoFrame::new(desc.width, desc.height, desc.format, vec![0u8; size]).with_owner(owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(pts: i64) -> VideoFrame {
        VideoFrame::new(4, 4, PixelFormat::Rgba32, vec![pts as u8; 64]).with_pts(pts)
    }

    #[test]
    fn test_pixel_format_buffer_size() {
        assert_eq!(PixelFormat::Yuv420p.buffer_size(1280, 720), 1_382_400);
        assert_eq!(PixelFormat::Rgb24.buffer_size(1280, 720), 2_764_800);
        assert_eq!(PixelFormat::Bgra32.buffer_size(1280, 720), 3_686_400);
        assert_eq!(PixelFormat::Invalid.buffer_size(1280, 720), 0);
    }

    #[test]
    fn test_frame_field_mode() {
        assert_eq!(frame(1).field_mode(), FieldMode::Progressive);
        assert_eq!(frame(1).interlaced(true).field_mode(), FieldMode::Upper);
        assert_eq!(frame(1).interlaced(false).field_mode(), FieldMode::Lower);
    }

    #[test]
    fn test_interlace_keeps_order() {
        let composed = FrameComposition::interlace(frame(1), frame(2), FieldMode::Upper);
        assert!(composed.is_interlaced());
        let pts: Vec<_> = composed.frames().iter().map(|f| f.pts).collect();
        assert_eq!(pts, vec![Some(1), Some(2)]);
    }

    #[test]
    fn test_interlace_progressive_takes_second() {
        let composed = FrameComposition::interlace(frame(1), frame(2), FieldMode::Progressive);
        assert!(!composed.is_interlaced());
        assert_eq!(composed.frames()[0].pts, Some(2));
    }

    #[test]
    fn test_default_factory_blank_frame() {
        let owner = Uuid::new_v4();
        let blank = DefaultFrameFactory.create_frame(owner, &PixelFormatDesc::invalid());
        assert!(blank.is_empty());
        assert!(blank.data().is_empty());
        assert_eq!(blank.owner(), Some(owner));

        let desc = PixelFormatDesc::new(PixelFormat::Rgba32, 2, 2);
        let filled = DefaultFrameFactory.create_frame(owner, &desc);
        assert!(!filled.is_empty());
        assert_eq!(filled.data().len(), 16);
    }

    #[test]
    fn test_cloned_frames_share_data() {
        let a = frame(7);
        let b = a.clone();
        assert!(a.shares_data_with(&b));
        assert!(!a.shares_data_with(&frame(7)));
    }

    #[test]
    fn test_stream_item_from_data() {
        let item: StreamItem<AudioChunk> = vec![1, 2, 3].into();
        assert_eq!(item, StreamItem::Data(vec![1, 2, 3]));
    }
}

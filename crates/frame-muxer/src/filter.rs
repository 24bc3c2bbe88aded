//! Video filter pipeline
//!
//! The muxer only talks to its filter through [`VideoFilter`]: frames are
//! pushed in, zero or more frames are polled out, and the filter reports its
//! processing delay and whether it doubles the frame rate. Filters are
//! described by an ffmpeg-style descriptor (`yadif=1:-1`) and rebuilt by a
//! [`FilterFactory`] whenever the descriptor changes.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::{MuxerError, Result};
use crate::format::FieldMode;
use crate::frame::VideoFrame;

/// Deinterlacer producing one frame per input frame
pub const DEINTERLACE: &str = "yadif=0:-1";

/// Deinterlacer producing one frame per field (bob)
pub const DEINTERLACE_BOB: &str = "yadif=1:-1";

const DEINTERLACE_FILTER: &str = "yadif";

/// Filter pipeline between the decoder and the segment buffers
pub trait VideoFilter: Send {
    /// Feed one frame into the pipeline
    fn push(&mut self, frame: VideoFrame);

    /// Take the next processed frame, if any
    fn poll(&mut self) -> Option<VideoFrame>;

    /// Take every processed frame currently available
    fn poll_all(&mut self) -> Vec<VideoFrame> {
        let mut frames = Vec::new();
        while let Some(frame) = self.poll() {
            frames.push(frame);
        }
        frames
    }

    /// Descriptor this pipeline was built from
    fn filter_descriptor(&self) -> &str;

    /// Frames held back before the first output appears
    fn processing_delay(&self) -> usize;

    /// Whether the pipeline emits two frames per input frame
    fn is_double_rate(&self) -> bool {
        is_double_rate(self.filter_descriptor())
    }
}

/// Builds filter pipelines from descriptors
pub trait FilterFactory: Send + Sync {
    fn create(&self, descriptor: &str) -> Result<Box<dyn VideoFilter>>;
}

/// Whether the descriptor contains a deinterlacer
pub fn is_deinterlacing(descriptor: &str) -> bool {
    descriptor.to_ascii_lowercase().contains(DEINTERLACE_FILTER)
}

/// Whether the descriptor contains a bob (field-rate) deinterlacer
pub fn is_double_rate(descriptor: &str) -> bool {
    descriptor.to_ascii_lowercase().contains("yadif=1")
}

/// Append a filter to a comma-separated descriptor
pub fn append_filter(descriptor: &str, filter: &str) -> String {
    let descriptor = descriptor.trim();
    if descriptor.is_empty() {
        filter.to_string()
    } else {
        format!("{},{}", descriptor, filter)
    }
}

/// Descriptors compare case-insensitively
pub fn same_descriptor(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deinterlace {
    None,
    Frame,
    Field,
}

/// Built-in filter covering the deinterlacers the muxer requests
///
/// An empty descriptor passes frames straight through. `yadif=0` clears the
/// interlaced flag, `yadif=1` emits one progressive frame per field in field
/// order. Both deinterlacers look one frame ahead, so they hold one frame
/// back. Pixel data is shared, not resampled; any other filter name is
/// rejected.
pub struct FieldFilter {
    descriptor: String,
    deinterlace: Deinterlace,
    held: Option<VideoFrame>,
    ready: VecDeque<VideoFrame>,
}

impl FieldFilter {
    pub fn new(descriptor: &str) -> Result<Self> {
        Ok(Self {
            descriptor: descriptor.to_string(),
            deinterlace: Self::parse(descriptor)?,
            held: None,
            ready: VecDeque::new(),
        })
    }

    fn parse(descriptor: &str) -> Result<Deinterlace> {
        let mut deinterlace = Deinterlace::None;

        for entry in descriptor.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, args) = entry.split_once('=').unwrap_or((entry, ""));
            if !name.trim().eq_ignore_ascii_case(DEINTERLACE_FILTER) {
                return Err(MuxerError::Filter(format!(
                    "unsupported filter '{}' in '{}'",
                    name.trim(),
                    descriptor
                )));
            }
            if deinterlace != Deinterlace::None {
                return Err(MuxerError::Filter(format!(
                    "more than one deinterlacer in '{}'",
                    descriptor
                )));
            }

            let mode = args.split(':').next().unwrap_or("").trim();
            deinterlace = match mode.to_ascii_lowercase().as_str() {
                "" | "0" | "send_frame" => Deinterlace::Frame,
                "1" | "send_field" => Deinterlace::Field,
                other => {
                    return Err(MuxerError::Filter(format!(
                        "unsupported yadif mode '{}' in '{}'",
                        other, descriptor
                    )))
                }
            };
        }

        Ok(deinterlace)
    }

    fn release(&mut self, mut frame: VideoFrame) {
        match self.deinterlace {
            Deinterlace::None => self.ready.push_back(frame),
            Deinterlace::Frame => {
                frame.interlaced = false;
                self.ready.push_back(frame);
            }
            Deinterlace::Field => {
                let order = match frame.field_mode() {
                    FieldMode::Lower => [FieldMode::Lower, FieldMode::Upper],
                    _ => [FieldMode::Upper, FieldMode::Lower],
                };
                frame.interlaced = false;
                for field in order {
                    let mut field_frame = frame.clone();
                    field_frame.field = Some(field);
                    self.ready.push_back(field_frame);
                }
            }
        }
    }
}

impl VideoFilter for FieldFilter {
    fn push(&mut self, frame: VideoFrame) {
        if self.deinterlace == Deinterlace::None {
            self.release(frame);
        } else if let Some(previous) = self.held.replace(frame) {
            self.release(previous);
        }
    }

    fn poll(&mut self) -> Option<VideoFrame> {
        self.ready.pop_front()
    }

    fn filter_descriptor(&self) -> &str {
        &self.descriptor
    }

    fn processing_delay(&self) -> usize {
        match self.deinterlace {
            Deinterlace::None => 0,
            Deinterlace::Frame | Deinterlace::Field => 1,
        }
    }
}

/// Factory for [`FieldFilter`]
#[derive(Debug, Default, Clone, Copy)]
pub struct FieldFilterFactory;

impl FilterFactory for FieldFilterFactory {
    fn create(&self, descriptor: &str) -> Result<Box<dyn VideoFilter>> {
        Ok(Box::new(FieldFilter::new(descriptor)?))
    }
}

/// Owns the live filter and swaps it when the descriptor changes
pub struct FilterAdapter {
    factory: Arc<dyn FilterFactory>,
    filter: Box<dyn VideoFilter>,
    rebuilds: u64,
}

impl FilterAdapter {
    /// Start with an empty (pass-through) descriptor
    pub fn new(factory: Arc<dyn FilterFactory>) -> Result<Self> {
        let filter = factory.create("")?;
        Ok(Self {
            factory,
            filter,
            rebuilds: 0,
        })
    }

    pub fn descriptor(&self) -> &str {
        self.filter.filter_descriptor()
    }

    pub fn is_double_rate(&self) -> bool {
        self.filter.is_double_rate()
    }

    pub fn processing_delay(&self) -> usize {
        self.filter.processing_delay()
    }

    /// Number of times the pipeline has been replaced
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    /// Push a frame and collect everything the pipeline yields
    pub fn push(&mut self, frame: VideoFrame) -> Vec<VideoFrame> {
        self.filter.push(frame);
        self.filter.poll_all()
    }

    pub fn needs_reconfigure(&self, descriptor: &str) -> bool {
        !same_descriptor(self.filter.filter_descriptor(), descriptor)
    }

    /// Replace the pipeline with one built from `descriptor`
    ///
    /// Frames still in flight in the old pipeline are flushed out by pushing
    /// `trigger` through it once per frame of processing delay; whatever that
    /// yields is returned for the caller to keep.
    pub fn reconfigure(&mut self, descriptor: &str, trigger: &VideoFrame) -> Result<Vec<VideoFrame>> {
        let next = self.factory.create(descriptor)?;

        let mut drained = Vec::new();
        for _ in 0..self.filter.processing_delay() {
            self.filter.push(trigger.clone());
            if let Some(frame) = self.filter.poll() {
                drained.push(frame);
            }
        }

        self.filter = next;
        self.rebuilds += 1;
        Ok(drained)
    }
}

impl std::fmt::Debug for FilterAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterAdapter")
            .field("descriptor", &self.descriptor())
            .field("rebuilds", &self.rebuilds)
            .finish()
    }
}

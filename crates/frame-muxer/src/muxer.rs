//! Frame muxer
//!
//! [`FrameMuxer`] buffers decoded video frames and audio samples per
//! segment, picks a display mode from the first real frame, and assembles
//! output frames paced to the target format: one or two video frames plus
//! exactly one cadence's worth of audio per output.
//!
//! The muxer is a plain owned value. Every mutating call takes `&mut self`,
//! nothing blocks, and cross-thread use goes through a single owner such as
//! [`crate::stage::MuxerStage`].

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use uuid::Uuid;

use crate::cadence::AudioCadence;
use crate::config::MuxerConfig;
use crate::display_mode::{select_display_mode, DisplayMode};
use crate::error::{MuxerError, Result, StreamKind};
use crate::filter::{FieldFilterFactory, FilterAdapter, FilterFactory};
use crate::format::{print_mode, FieldMode, VideoFormatDesc};
use crate::frame::{
    AudioChunk, DefaultFrameFactory, FrameComposition, FrameFactory, OutputFrame, PixelFormatDesc,
    StreamItem, VideoFrame,
};
use crate::segments::{SegmentQueue, MAX_SEGMENT_CADENCE_MULTIPLE, MAX_SEGMENT_FRAMES};

/// Counters describing what the muxer has done so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MuxerStats {
    /// Real (non-filler) video frames pushed
    pub video_frames_in: u64,
    /// Audio samples pushed, filler silence included
    pub audio_samples_in: u64,
    /// Output frames handed to the caller
    pub frames_out: u64,
    /// Segment pairs dropped at a flush boundary with data still in them
    pub truncations: u64,
    /// Video frames discarded by truncation
    pub truncated_video_frames: u64,
    /// Audio samples discarded by truncation
    pub truncated_audio_samples: u64,
    /// Filter pipeline replacements
    pub filter_rebuilds: u64,
}

/// Format properties a display mode was selected for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameSignature {
    width: u32,
    height: u32,
    field_mode: FieldMode,
}

impl FrameSignature {
    fn of(frame: &VideoFrame) -> Self {
        Self {
            width: frame.width,
            height: frame.height,
            field_mode: frame.field_mode(),
        }
    }
}

/// Builder for [`FrameMuxer`] with custom collaborators
pub struct FrameMuxerBuilder {
    in_fps: f64,
    format_desc: VideoFormatDesc,
    filter_descriptor: String,
    frame_factory: Arc<dyn FrameFactory>,
    filter_factory: Arc<dyn FilterFactory>,
}

impl FrameMuxerBuilder {
    /// Allocate filler frames with a custom factory
    pub fn frame_factory(mut self, factory: Arc<dyn FrameFactory>) -> Self {
        self.frame_factory = factory;
        self
    }

    /// Build filter pipelines with a custom factory
    pub fn filter_factory(mut self, factory: Arc<dyn FilterFactory>) -> Self {
        self.filter_factory = factory;
        self
    }

    pub fn build(self) -> Result<FrameMuxer> {
        if !(self.in_fps.is_finite() && self.in_fps > 0.0) {
            return Err(MuxerError::InvalidConfig(format!(
                "input frame rate must be positive, got {}",
                self.in_fps
            )));
        }
        self.format_desc.validate()?;

        let cadence = AudioCadence::new(self.format_desc.interleaved_cadence())?;
        let filter = FilterAdapter::new(self.filter_factory)?;

        Ok(FrameMuxer {
            id: Uuid::new_v4(),
            video: SegmentQueue::new(),
            audio: SegmentQueue::new(),
            output: VecDeque::new(),
            display_mode: DisplayMode::Invalid,
            signature: None,
            in_fps: self.in_fps,
            format_desc: self.format_desc,
            cadence,
            frame_factory: self.frame_factory,
            filter,
            filter_descriptor: self.filter_descriptor,
            stats: MuxerStats::default(),
        })
    }
}

/// Audio/video frame muxer
pub struct FrameMuxer {
    id: Uuid,
    video: SegmentQueue<VideoFrame>,
    audio: SegmentQueue<i32>,
    /// Assembled outputs not yet returned by `try_pop`
    output: VecDeque<OutputFrame>,
    display_mode: DisplayMode,
    signature: Option<FrameSignature>,
    in_fps: f64,
    format_desc: VideoFormatDesc,
    cadence: AudioCadence,
    frame_factory: Arc<dyn FrameFactory>,
    filter: FilterAdapter,
    /// Filter configured for the item, before any deinterlacer is added
    filter_descriptor: String,
    stats: MuxerStats,
}

impl FrameMuxer {
    /// Create a muxer with the built-in filter and frame factory
    pub fn new(in_fps: f64, format_desc: VideoFormatDesc, filter_descriptor: impl Into<String>) -> Result<Self> {
        Self::builder(in_fps, format_desc, filter_descriptor).build()
    }

    pub fn builder(
        in_fps: f64,
        format_desc: VideoFormatDesc,
        filter_descriptor: impl Into<String>,
    ) -> FrameMuxerBuilder {
        FrameMuxerBuilder {
            in_fps,
            format_desc,
            filter_descriptor: filter_descriptor.into(),
            frame_factory: Arc::new(DefaultFrameFactory),
            filter_factory: Arc::new(FieldFilterFactory),
        }
    }

    /// Create a muxer from configuration
    pub fn from_config(config: &MuxerConfig) -> Result<Self> {
        Self::new(config.input_fps, config.format_desc(), config.filter.clone())
    }

    /// Push a decoded video frame or a stream marker
    ///
    /// Fails with [`MuxerError::Overflow`] when the segment being filled
    /// holds more than 32 frames, which points at a source whose real frame
    /// rate differs from the declared one.
    pub fn push_video(&mut self, item: StreamItem<VideoFrame>) -> Result<()> {
        match item {
            StreamItem::Flush => self.video.flush(),
            StreamItem::Empty => {
                let frame = self.frame_factory.create_frame(self.id, &PixelFormatDesc::invalid());
                self.video.push(frame);
                self.display_mode = DisplayMode::Simple;
            }
            StreamItem::Data(frame) => {
                self.stats.video_frames_in += 1;

                let signature = FrameSignature::of(&frame);
                if self.display_mode == DisplayMode::Invalid || self.signature != Some(signature) {
                    self.update_display_mode(&frame, signature)?;
                }

                let filtered = self.filter.push(frame);
                self.video.extend(filtered);
            }
        }

        let buffered = self.video.back_len();
        if buffered > MAX_SEGMENT_FRAMES {
            tracing::warn!(
                muxer_id = %self.id,
                buffered,
                limit = MAX_SEGMENT_FRAMES,
                "Video stream overflow"
            );
            return Err(MuxerError::Overflow {
                stream: StreamKind::Video,
                buffered,
                limit: MAX_SEGMENT_FRAMES,
            });
        }
        Ok(())
    }

    /// Push decoded audio samples or a stream marker
    ///
    /// Fails with [`MuxerError::Overflow`] when the segment being filled
    /// holds more than 32 cadence heads worth of samples.
    pub fn push_audio(&mut self, item: StreamItem<AudioChunk>) -> Result<()> {
        match item {
            StreamItem::Flush => self.audio.flush(),
            StreamItem::Empty => {
                let silence = self.cadence.head();
                self.audio.extend(std::iter::repeat(0).take(silence));
                self.stats.audio_samples_in += silence as u64;
            }
            StreamItem::Data(samples) => {
                self.stats.audio_samples_in += samples.len() as u64;
                self.audio.extend(samples);
            }
        }

        let buffered = self.audio.back_len();
        let limit = MAX_SEGMENT_CADENCE_MULTIPLE * self.cadence.head();
        if buffered > limit {
            tracing::warn!(
                muxer_id = %self.id,
                buffered,
                limit,
                "Audio stream overflow"
            );
            return Err(MuxerError::Overflow {
                stream: StreamKind::Audio,
                buffered,
                limit,
            });
        }
        Ok(())
    }

    /// Whether video for at least one more output is buffered
    pub fn video_ready(&self) -> bool {
        self.video.segment_count() > 1
            || (self.video.segment_count() >= self.audio.segment_count() && self.front_video_ready())
    }

    /// Whether audio for at least one more output is buffered
    pub fn audio_ready(&self) -> bool {
        self.audio.segment_count() > 1
            || (self.audio.segment_count() >= self.video.segment_count() && self.front_audio_ready())
    }

    fn front_video_ready(&self) -> bool {
        self.video.front_len() >= self.display_mode.video_frames_per_tick()
    }

    fn front_audio_ready(&self) -> bool {
        self.audio.front_len() >= self.cadence.upcoming(self.display_mode.audio_chunks_per_tick())
    }

    /// Take the next output frame, if one can be assembled
    ///
    /// `None` means more input is needed; it is not an error.
    pub fn try_pop(&mut self) -> Option<OutputFrame> {
        loop {
            if let Some(frame) = self.output.pop_front() {
                self.stats.frames_out += 1;
                tracing::trace!(muxer_id = %self.id, pts = ?frame.pts(), "Output frame");
                return Some(frame);
            }

            if self.video.segment_count() > 1
                && self.audio.segment_count() > 1
                && (!self.front_video_ready() || !self.front_audio_ready())
            {
                self.truncate_front_segments();
            }

            if !self.front_video_ready() || !self.front_audio_ready() || self.display_mode == DisplayMode::Invalid {
                return None;
            }

            self.assemble();
        }
    }

    /// Drop the front segment pair when it can no longer fill an output
    fn truncate_front_segments(&mut self) {
        let video_frames = self.video.front_len();
        let audio_samples = self.audio.front_len();
        self.video.drop_front();
        self.audio.drop_front();

        if video_frames == 0 && audio_samples == 0 {
            return;
        }

        tracing::debug!(
            muxer_id = %self.id,
            video_frames,
            audio_samples,
            "Truncating segment"
        );
        self.stats.truncations += 1;
        self.stats.truncated_video_frames += video_frames as u64;
        self.stats.truncated_audio_samples += audio_samples as u64;
    }

    /// Consume one tick of buffered input into the output queue
    fn assemble(&mut self) {
        let first = self.pop_video();
        let mut audio = self.pop_audio();

        match self.display_mode {
            DisplayMode::Simple | DisplayMode::DeinterlaceBob | DisplayMode::Deinterlace => {
                self.output.push_back(OutputFrame::new(FrameComposition::Single(first), audio));
            }
            DisplayMode::Interlace | DisplayMode::DeinterlaceBobReinterlace => {
                let second = self.pop_video();
                let composition = FrameComposition::interlace(first, second, self.format_desc.field_mode);
                self.output.push_back(OutputFrame::new(composition, audio));
            }
            DisplayMode::Duplicate => {
                audio.extend(self.pop_audio());
                let frame = OutputFrame::new(FrameComposition::Single(first), audio);
                self.output.push_back(frame.clone());
                self.output.push_back(frame);
            }
            DisplayMode::Half => {
                let _dropped = self.pop_video();
                self.output.push_back(OutputFrame::new(FrameComposition::Single(first), audio));
            }
            DisplayMode::Invalid => unreachable!("frame assembly without a display mode"),
        }
    }

    fn pop_video(&mut self) -> VideoFrame {
        let Some(frame) = self.video.pop_front() else {
            unreachable!("video pop on an empty segment");
        };
        frame
    }

    fn pop_audio(&mut self) -> AudioChunk {
        self.cadence.take(self.audio.front_mut())
    }

    fn update_display_mode(&mut self, frame: &VideoFrame, signature: FrameSignature) -> Result<()> {
        let selection = select_display_mode(frame, self.in_fps, &self.filter_descriptor, &self.format_desc);

        // Nothing is committed until the filter is built, so a failed
        // build is retried on the next frame.
        let reconfigure = self.filter.needs_reconfigure(&selection.filter_descriptor);
        if reconfigure {
            let drained = self.filter.reconfigure(&selection.filter_descriptor, frame)?;
            self.video.extend(drained);
            self.stats.filter_rebuilds = self.filter.rebuilds();
        }

        self.display_mode = selection.mode;
        self.signature = Some(signature);

        if reconfigure {
            tracing::info!(
                muxer_id = %self.id,
                display_mode = %self.display_mode,
                source = %print_mode(frame.width, frame.height, self.in_fps, frame.interlaced),
                filter = %selection.filter_descriptor,
                "Display mode selected"
            );
        }
        Ok(())
    }

    /// Output frames produced from `nb_frames` input frames
    ///
    /// A progress estimate: accounts for a rate-doubling filter and for
    /// modes that merge or repeat frames, truncating odd counts.
    pub fn calc_nb_frames(&self, nb_frames: u32) -> u32 {
        let mut nb_frames = nb_frames as u64;

        if self.filter.is_double_rate() {
            nb_frames *= 2;
        }

        match self.display_mode {
            DisplayMode::DeinterlaceBobReinterlace | DisplayMode::Interlace | DisplayMode::Half => {
                nb_frames /= 2;
            }
            DisplayMode::Duplicate => nb_frames *= 2,
            _ => {}
        }

        nb_frames.min(u32::MAX as u64) as u32
    }

    /// Identity passed to the frame factory
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.display_mode
    }

    /// Descriptor of the live filter pipeline
    pub fn filter_descriptor(&self) -> &str {
        self.filter.descriptor()
    }

    pub fn format_desc(&self) -> &VideoFormatDesc {
        &self.format_desc
    }

    pub fn in_fps(&self) -> f64 {
        self.in_fps
    }

    pub fn cadence(&self) -> &AudioCadence {
        &self.cadence
    }

    pub fn stats(&self) -> MuxerStats {
        self.stats
    }

    pub fn video_segment_count(&self) -> usize {
        self.video.segment_count()
    }

    pub fn audio_segment_count(&self) -> usize {
        self.audio.segment_count()
    }

    /// Video frames buffered across all segments
    pub fn buffered_video_frames(&self) -> usize {
        self.video.total_len()
    }

    /// Audio samples buffered across all segments
    pub fn buffered_audio_samples(&self) -> usize {
        self.audio.total_len()
    }

    /// Assembled outputs waiting to be popped
    pub fn pending_outputs(&self) -> usize {
        self.output.len()
    }
}

impl std::fmt::Debug for FrameMuxer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameMuxer")
            .field("id", &self.id)
            .field("display_mode", &self.display_mode)
            .field("in_fps", &self.in_fps)
            .field("format", &self.format_desc.format)
            .field("filter", &self.filter)
            .field("video_segments", &self.video.segment_count())
            .field("audio_segments", &self.audio.segment_count())
            .field("pending_outputs", &self.output.len())
            .finish()
    }
}

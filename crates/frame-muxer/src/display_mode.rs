//! Display mode selection
//!
//! A display mode is the strategy the assembler uses to turn source frames
//! into output frames: pass through, weave two frames into one, deinterlace,
//! duplicate or drop. It is chosen from the first real frame's field
//! structure, the source frame rate, the configured filter and the target
//! format.

use serde::{Deserialize, Serialize};

use crate::filter::{self, DEINTERLACE, DEINTERLACE_BOB};
use crate::format::{FieldMode, VideoFormatDesc};
use crate::frame::VideoFrame;

/// Frame rates closer than this are considered equal
const FPS_EPSILON: f64 = 2.0;

/// Strategy for reconciling source and target video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// Not detected yet
    Invalid,
    /// One source frame per output frame
    Simple,
    /// Two progressive frames woven into one interlaced frame
    Interlace,
    /// Interlaced source deinterlaced at frame rate
    Deinterlace,
    /// Interlaced source deinterlaced at field rate
    DeinterlaceBob,
    /// Bob-deinterlaced before scaling, woven back afterwards
    DeinterlaceBobReinterlace,
    /// Each source frame shown twice
    Duplicate,
    /// Every other source frame dropped
    Half,
}

impl DisplayMode {
    /// Video frames consumed per output tick
    pub fn video_frames_per_tick(&self) -> usize {
        match self {
            DisplayMode::DeinterlaceBobReinterlace | DisplayMode::Interlace | DisplayMode::Half => 2,
            _ => 1,
        }
    }

    /// Cadence chunks consumed per output tick
    pub fn audio_chunks_per_tick(&self) -> usize {
        match self {
            DisplayMode::Duplicate => 2,
            _ => 1,
        }
    }

    /// Deinterlace directive this mode adds to the filter, if any
    pub fn filter_directive(&self) -> Option<&'static str> {
        match self {
            DisplayMode::Deinterlace => Some(DEINTERLACE),
            DisplayMode::DeinterlaceBob | DisplayMode::DeinterlaceBobReinterlace => {
                Some(DEINTERLACE_BOB)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DisplayMode::Invalid => "invalid",
            DisplayMode::Simple => "simple",
            DisplayMode::Interlace => "interlace",
            DisplayMode::Deinterlace => "deinterlace",
            DisplayMode::DeinterlaceBob => "deinterlace_bob",
            DisplayMode::DeinterlaceBobReinterlace => "deinterlace_bob_reinterlace",
            DisplayMode::Duplicate => "duplicate",
            DisplayMode::Half => "half",
        };
        f.write_str(name)
    }
}

/// Base strategy for a source/target pair of field modes and frame rates
///
/// Returns [`DisplayMode::Invalid`] when no strategy fits.
pub fn get_display_mode(in_mode: FieldMode, in_fps: f64, out_mode: FieldMode, out_fps: f64) -> DisplayMode {
    if (in_fps < 20.0 || in_fps > 80.0) && out_mode.is_progressive() && !in_mode.is_progressive() {
        return if in_fps < 35.0 {
            DisplayMode::Deinterlace
        } else {
            DisplayMode::DeinterlaceBob
        };
    }

    if (in_fps - out_fps).abs() < FPS_EPSILON {
        if !in_mode.is_progressive() && out_mode.is_progressive() {
            DisplayMode::Deinterlace
        } else {
            DisplayMode::Simple
        }
    } else if (in_fps / 2.0 - out_fps).abs() < FPS_EPSILON {
        if !in_mode.is_progressive() {
            DisplayMode::Invalid
        } else if !out_mode.is_progressive() {
            DisplayMode::Interlace
        } else {
            DisplayMode::Half
        }
    } else if (in_fps - out_fps / 2.0).abs() < FPS_EPSILON {
        if !out_mode.is_progressive() {
            DisplayMode::Invalid
        } else if !in_mode.is_progressive() {
            DisplayMode::DeinterlaceBob
        } else {
            DisplayMode::Duplicate
        }
    } else {
        DisplayMode::Invalid
    }
}

/// Outcome of [`select_display_mode`]
#[derive(Debug, Clone, PartialEq)]
pub struct ModeSelection {
    pub mode: DisplayMode,
    /// Filter descriptor the mode requires
    pub filter_descriptor: String,
    /// Source field mode after metadata correction and filtering
    pub source_field_mode: FieldMode,
    /// Source frame rate after filtering
    pub effective_fps: f64,
}

/// Choose the display mode for `frame`
///
/// `filter_descriptor` is the filter configured for the item; the returned
/// descriptor extends it with the deinterlacer the mode needs. Never
/// returns [`DisplayMode::Invalid`]: undetectable cases fall back to
/// [`DisplayMode::Simple`].
pub fn select_display_mode(
    frame: &VideoFrame,
    in_fps: f64,
    filter_descriptor: &str,
    format: &VideoFormatDesc,
) -> ModeSelection {
    let mut mode = frame.field_mode();

    // Progressive SD below 50 fps is almost always mis-tagged interlaced material.
    if mode.is_progressive() && frame.height < 720 && in_fps < 50.0 {
        mode = FieldMode::Upper;
    }

    let mut fps = in_fps;
    if filter::is_deinterlacing(filter_descriptor) {
        mode = FieldMode::Progressive;
    }
    if filter::is_double_rate(filter_descriptor) {
        fps *= 2.0;
    }

    let mut display_mode = get_display_mode(mode, fps, format.field_mode, format.fps);

    // The frame will be scaled, so deinterlace before and reinterlace after.
    // NTSC DV (480 lines into a 486 line format) is left alone.
    let ntsc_dv = frame.height == 480 && format.height == 486;
    if !ntsc_dv
        && display_mode == DisplayMode::Simple
        && !mode.is_progressive()
        && !format.field_mode.is_progressive()
        && frame.height != format.height
    {
        display_mode = DisplayMode::DeinterlaceBobReinterlace;
    }

    let filter_descriptor = match display_mode.filter_directive() {
        Some(directive) => filter::append_filter(filter_descriptor, directive),
        None => filter_descriptor.to_string(),
    };

    if display_mode == DisplayMode::Invalid {
        tracing::warn!(
            source_mode = %mode,
            source_fps = fps,
            target_mode = %format.field_mode,
            target_fps = format.fps,
            "Failed to detect display mode, falling back to simple"
        );
        display_mode = DisplayMode::Simple;
    }

    ModeSelection {
        mode: display_mode,
        filter_descriptor,
        source_field_mode: mode,
        effective_fps: fps,
    }
}

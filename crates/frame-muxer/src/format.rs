//! Broadcast video formats
//!
//! Field structure, the preset format table and the target format
//! descriptor the muxer paces its output to. Every preset carries the audio
//! cadence (per-channel samples per frame) that averages 48 kHz audio
//! exactly over its frame rate, e.g. `1602, 1601, 1602, 1601, 1602` for the
//! 1001-divided rates.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{MuxerError, Result};

/// Default audio sample rate of every preset format
pub const DEFAULT_AUDIO_SAMPLE_RATE: u32 = 48_000;

/// Default interleaved channel count of every preset format
pub const DEFAULT_AUDIO_CHANNELS: u16 = 2;

/// Field structure of a video frame or format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldMode {
    /// Full frames
    Progressive,
    /// Interlaced, upper (top) field first
    Upper,
    /// Interlaced, lower (bottom) field first
    Lower,
}

impl FieldMode {
    pub fn is_progressive(&self) -> bool {
        matches!(self, FieldMode::Progressive)
    }

    /// Field mode of a frame from its interlacing flags
    pub fn from_flags(interlaced: bool, top_field_first: bool) -> Self {
        match (interlaced, top_field_first) {
            (false, _) => FieldMode::Progressive,
            (true, true) => FieldMode::Upper,
            (true, false) => FieldMode::Lower,
        }
    }
}

impl std::fmt::Display for FieldMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldMode::Progressive => write!(f, "progressive"),
            FieldMode::Upper => write!(f, "upper"),
            FieldMode::Lower => write!(f, "lower"),
        }
    }
}

/// Preset broadcast formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoFormat {
    #[serde(rename = "PAL")]
    Pal,
    #[serde(rename = "NTSC")]
    Ntsc,
    #[serde(rename = "576p2500")]
    X576p2500,
    #[serde(rename = "720p2398")]
    X720p2398,
    #[serde(rename = "720p2400")]
    X720p2400,
    #[serde(rename = "720p2500")]
    X720p2500,
    #[serde(rename = "720p2997")]
    X720p2997,
    #[serde(rename = "720p3000")]
    X720p3000,
    #[serde(rename = "720p5000")]
    X720p5000,
    #[serde(rename = "720p5994")]
    X720p5994,
    #[serde(rename = "720p6000")]
    X720p6000,
    #[serde(rename = "1080p2398")]
    X1080p2398,
    #[serde(rename = "1080p2400")]
    X1080p2400,
    #[serde(rename = "1080i5000")]
    X1080i5000,
    #[serde(rename = "1080i5994")]
    X1080i5994,
    #[serde(rename = "1080i6000")]
    X1080i6000,
    #[serde(rename = "1080p2500")]
    X1080p2500,
    #[serde(rename = "1080p2997")]
    X1080p2997,
    #[serde(rename = "1080p3000")]
    X1080p3000,
    #[serde(rename = "1080p5000")]
    X1080p5000,
    #[serde(rename = "1080p5994")]
    X1080p5994,
    #[serde(rename = "1080p6000")]
    X1080p6000,
}

const CADENCE_2398: &[usize] = &[2002];
const CADENCE_2400: &[usize] = &[2000];
const CADENCE_2500: &[usize] = &[1920];
const CADENCE_2997: &[usize] = &[1602, 1601, 1602, 1601, 1602];
const CADENCE_3000: &[usize] = &[1600];
const CADENCE_5000: &[usize] = &[960];
const CADENCE_5994: &[usize] = &[801, 800, 801, 801, 801];
const CADENCE_6000: &[usize] = &[800];

/// Row of the preset table
struct FormatRow {
    name: &'static str,
    width: u32,
    height: u32,
    field_mode: FieldMode,
    time_scale: u32,
    duration: u32,
    cadence: &'static [usize],
}

const fn row(
    name: &'static str,
    width: u32,
    height: u32,
    field_mode: FieldMode,
    time_scale: u32,
    duration: u32,
    cadence: &'static [usize],
) -> FormatRow {
    FormatRow {
        name,
        width,
        height,
        field_mode,
        time_scale,
        duration,
        cadence,
    }
}

impl VideoFormat {
    /// All presets, in table order
    pub const ALL: [VideoFormat; 22] = [
        VideoFormat::Pal,
        VideoFormat::Ntsc,
        VideoFormat::X576p2500,
        VideoFormat::X720p2398,
        VideoFormat::X720p2400,
        VideoFormat::X720p2500,
        VideoFormat::X720p2997,
        VideoFormat::X720p3000,
        VideoFormat::X720p5000,
        VideoFormat::X720p5994,
        VideoFormat::X720p6000,
        VideoFormat::X1080p2398,
        VideoFormat::X1080p2400,
        VideoFormat::X1080i5000,
        VideoFormat::X1080i5994,
        VideoFormat::X1080i6000,
        VideoFormat::X1080p2500,
        VideoFormat::X1080p2997,
        VideoFormat::X1080p3000,
        VideoFormat::X1080p5000,
        VideoFormat::X1080p5994,
        VideoFormat::X1080p6000,
    ];

    fn table_row(&self) -> FormatRow {
        use FieldMode::{Lower, Progressive, Upper};
        match self {
            VideoFormat::Pal => row("PAL", 720, 576, Upper, 25000, 1000, CADENCE_2500),
            VideoFormat::Ntsc => row("NTSC", 720, 486, Lower, 30000, 1001, CADENCE_2997),
            VideoFormat::X576p2500 => row("576p2500", 720, 576, Progressive, 25000, 1000, CADENCE_2500),
            VideoFormat::X720p2398 => row("720p2398", 1280, 720, Progressive, 24000, 1001, CADENCE_2398),
            VideoFormat::X720p2400 => row("720p2400", 1280, 720, Progressive, 24000, 1000, CADENCE_2400),
            VideoFormat::X720p2500 => row("720p2500", 1280, 720, Progressive, 25000, 1000, CADENCE_2500),
            VideoFormat::X720p2997 => row("720p2997", 1280, 720, Progressive, 30000, 1001, CADENCE_2997),
            VideoFormat::X720p3000 => row("720p3000", 1280, 720, Progressive, 30000, 1000, CADENCE_3000),
            VideoFormat::X720p5000 => row("720p5000", 1280, 720, Progressive, 50000, 1000, CADENCE_5000),
            VideoFormat::X720p5994 => row("720p5994", 1280, 720, Progressive, 60000, 1001, CADENCE_5994),
            VideoFormat::X720p6000 => row("720p6000", 1280, 720, Progressive, 60000, 1000, CADENCE_6000),
            VideoFormat::X1080p2398 => row("1080p2398", 1920, 1080, Progressive, 24000, 1001, CADENCE_2398),
            VideoFormat::X1080p2400 => row("1080p2400", 1920, 1080, Progressive, 24000, 1000, CADENCE_2400),
            VideoFormat::X1080i5000 => row("1080i5000", 1920, 1080, Upper, 25000, 1000, CADENCE_2500),
            VideoFormat::X1080i5994 => row("1080i5994", 1920, 1080, Upper, 30000, 1001, CADENCE_2997),
            VideoFormat::X1080i6000 => row("1080i6000", 1920, 1080, Upper, 30000, 1000, CADENCE_3000),
            VideoFormat::X1080p2500 => row("1080p2500", 1920, 1080, Progressive, 25000, 1000, CADENCE_2500),
            VideoFormat::X1080p2997 => row("1080p2997", 1920, 1080, Progressive, 30000, 1001, CADENCE_2997),
            VideoFormat::X1080p3000 => row("1080p3000", 1920, 1080, Progressive, 30000, 1000, CADENCE_3000),
            VideoFormat::X1080p5000 => row("1080p5000", 1920, 1080, Progressive, 50000, 1000, CADENCE_5000),
            VideoFormat::X1080p5994 => row("1080p5994", 1920, 1080, Progressive, 60000, 1001, CADENCE_5994),
            VideoFormat::X1080p6000 => row("1080p6000", 1920, 1080, Progressive, 60000, 1000, CADENCE_6000),
        }
    }

    /// Canonical name, e.g. `1080i5000`
    pub fn name(&self) -> &'static str {
        self.table_row().name
    }

    /// Full descriptor with the default audio layout
    pub fn desc(&self) -> VideoFormatDesc {
        let entry = self.table_row();
        VideoFormatDesc {
            format: Some(*self),
            width: entry.width,
            height: entry.height,
            field_mode: entry.field_mode,
            time_scale: entry.time_scale,
            duration: entry.duration,
            fps: entry.time_scale as f64 / entry.duration as f64,
            audio_sample_rate: DEFAULT_AUDIO_SAMPLE_RATE,
            audio_channels: DEFAULT_AUDIO_CHANNELS,
            audio_cadence: entry.cadence.to_vec(),
        }
    }
}

impl std::fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VideoFormat {
    type Err = MuxerError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        VideoFormat::ALL
            .iter()
            .copied()
            .find(|format| format.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| MuxerError::InvalidConfig(format!("unknown video format '{}'", s)))
    }
}

/// Target output format of the muxer
///
/// `fps` is the frame rate, so interlaced formats report half their field
/// rate (1080i5994 has an fps of 29.97).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoFormatDesc {
    /// Preset this descriptor was built from, `None` for custom formats
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<VideoFormat>,
    pub width: u32,
    pub height: u32,
    pub field_mode: FieldMode,
    pub time_scale: u32,
    pub duration: u32,
    pub fps: f64,
    pub audio_sample_rate: u32,
    pub audio_channels: u16,
    /// Per-channel samples for each output frame, repeated cyclically
    pub audio_cadence: Vec<usize>,
}

impl VideoFormatDesc {
    /// Build a descriptor for a format outside the preset table
    pub fn custom(
        width: u32,
        height: u32,
        field_mode: FieldMode,
        time_scale: u32,
        duration: u32,
        audio_cadence: Vec<usize>,
    ) -> Self {
        let fps = if duration == 0 {
            0.0
        } else {
            time_scale as f64 / duration as f64
        };
        Self {
            format: None,
            width,
            height,
            field_mode,
            time_scale,
            duration,
            fps,
            audio_sample_rate: DEFAULT_AUDIO_SAMPLE_RATE,
            audio_channels: DEFAULT_AUDIO_CHANNELS,
            audio_cadence,
        }
    }

    /// Set the interleaved channel count
    pub fn with_audio_channels(mut self, channels: u16) -> Self {
        self.audio_channels = channels;
        self
    }

    /// Cadence in interleaved samples (per-channel cadence × channels)
    pub fn interleaved_cadence(&self) -> Vec<usize> {
        self.audio_cadence
            .iter()
            .map(|&samples| samples * self.audio_channels as usize)
            .collect()
    }

    /// Number of fields per frame
    pub fn field_count(&self) -> u32 {
        if self.field_mode.is_progressive() {
            1
        } else {
            2
        }
    }

    /// Check the descriptor can drive a muxer
    pub fn validate(&self) -> Result<()> {
        if !(self.fps.is_finite() && self.fps > 0.0) {
            return Err(MuxerError::InvalidConfig(format!(
                "format frame rate must be positive, got {}",
                self.fps
            )));
        }
        if self.audio_channels == 0 {
            return Err(MuxerError::InvalidConfig(
                "format must have at least one audio channel".to_string(),
            ));
        }
        if self.audio_cadence.is_empty() || self.audio_cadence.contains(&0) {
            return Err(MuxerError::InvalidConfig(format!(
                "audio cadence must be non-empty and positive, got {:?}",
                self.audio_cadence
            )));
        }
        Ok(())
    }
}

impl From<VideoFormat> for VideoFormatDesc {
    fn from(format: VideoFormat) -> Self {
        format.desc()
    }
}

/// Human-readable source mode used in diagnostics, e.g. `1920x1080i50.00`
///
/// Interlaced sources are printed with their field rate.
pub fn print_mode(width: u32, height: u32, fps: f64, interlaced: bool) -> String {
    let (scan, rate) = if interlaced {
        ('i', fps * 2.0)
    } else {
        ('p', fps)
    };
    format!("{}x{}{}{:.2}", width, height, scan, rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_cadence_matches_frame_rate() {
        for format in VideoFormat::ALL {
            let desc = format.desc();
            let cycle: usize = desc.audio_cadence.iter().sum();
            let ideal = desc.audio_sample_rate as f64 * desc.audio_cadence.len() as f64 / desc.fps;
            assert!(
                (cycle as f64 - ideal).abs() < 1e-6,
                "{}: cadence sum {} != {}",
                format,
                cycle,
                ideal
            );
        }
    }

    #[test]
    fn test_interlaced_fps_is_frame_rate() {
        let desc = VideoFormat::X1080i5994.desc();
        assert_eq!(desc.field_mode, FieldMode::Upper);
        assert!((desc.fps - 29.97).abs() < 0.01);
        assert_eq!(desc.field_count(), 2);
        assert_eq!(VideoFormat::X1080p5000.desc().field_count(), 1);
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("1080i5000".parse::<VideoFormat>().unwrap(), VideoFormat::X1080i5000);
        assert_eq!("pal".parse::<VideoFormat>().unwrap(), VideoFormat::Pal);
        assert!("1080x9999".parse::<VideoFormat>().is_err());
    }

    #[test]
    fn test_format_name_round_trips() {
        for format in VideoFormat::ALL {
            assert_eq!(format.to_string().parse::<VideoFormat>().unwrap(), format);
        }
    }

    #[test]
    fn test_interleaved_cadence() {
        let desc = VideoFormat::X720p5994.desc();
        assert_eq!(desc.interleaved_cadence(), vec![1602, 1600, 1602, 1602, 1602]);
        let mono = desc.with_audio_channels(1);
        assert_eq!(mono.interleaved_cadence(), vec![801, 800, 801, 801, 801]);
    }

    #[test]
    fn test_validate_rejects_bad_cadence() {
        let desc = VideoFormatDesc::custom(1920, 1080, FieldMode::Progressive, 25, 1, vec![]);
        assert!(desc.validate().is_err());
        let desc = VideoFormatDesc::custom(1920, 1080, FieldMode::Progressive, 25, 1, vec![4, 0]);
        assert!(desc.validate().is_err());
        let desc = VideoFormatDesc::custom(1920, 1080, FieldMode::Progressive, 25, 0, vec![4]);
        assert!(desc.validate().is_err());
        let desc = VideoFormatDesc::custom(1920, 1080, FieldMode::Progressive, 25, 1, vec![4]);
        assert!(desc.validate().is_ok());
    }

    #[test]
    fn test_field_mode_from_flags() {
        assert_eq!(FieldMode::from_flags(false, true), FieldMode::Progressive);
        assert_eq!(FieldMode::from_flags(true, true), FieldMode::Upper);
        assert_eq!(FieldMode::from_flags(true, false), FieldMode::Lower);
    }

    #[test]
    fn test_print_mode() {
        assert_eq!(print_mode(1920, 1080, 25.0, true), "1920x1080i50.00");
        assert_eq!(print_mode(1280, 720, 59.94, false), "1280x720p59.94");
    }
}

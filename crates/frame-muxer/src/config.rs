//! Configuration for the frame muxer
//!
//! A [`MuxerConfig`] is read from a TOML file, or built from the `MUXER_*`
//! environment variables when no file is given.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{MuxerError, Result};
use crate::format::{VideoFormat, VideoFormatDesc, DEFAULT_AUDIO_CHANNELS};

/// Muxer configuration for one playing item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MuxerConfig {
    /// Declared frame rate of the source
    #[serde(default = "default_input_fps")]
    pub input_fps: f64,

    /// Target output format
    #[serde(default = "default_format")]
    pub format: VideoFormat,

    /// Filter configured for the item (ffmpeg-style descriptor)
    #[serde(default)]
    pub filter: String,

    /// Interleaved audio channels delivered by the decoder
    #[serde(default = "default_audio_channels")]
    pub audio_channels: u16,
}

fn default_input_fps() -> f64 {
    25.0
}

fn default_format() -> VideoFormat {
    VideoFormat::X1080i5000
}

fn default_audio_channels() -> u16 {
    DEFAULT_AUDIO_CHANNELS
}

impl Default for MuxerConfig {
    fn default() -> Self {
        Self {
            input_fps: default_input_fps(),
            format: default_format(),
            filter: String::new(),
            audio_channels: default_audio_channels(),
        }
    }
}

impl MuxerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: MuxerConfig =
            toml::from_str(&content).map_err(|e| MuxerError::Parse(e.to_string()))?;
        Ok(config)
    }

    /// Load configuration from environment variables, falling back to defaults
    ///
    /// Reads `MUXER_INPUT_FPS`, `MUXER_FORMAT`, `MUXER_FILTER` and
    /// `MUXER_AUDIO_CHANNELS`. Values that fail to parse are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = MuxerConfig::default();

        if let Some(fps) = lookup("MUXER_INPUT_FPS") {
            if let Ok(f) = fps.parse() {
                config.input_fps = f;
            }
        }
        if let Some(format) = lookup("MUXER_FORMAT") {
            match format.parse() {
                Ok(f) => config.format = f,
                Err(e) => tracing::warn!(value = %format, error = %e, "Ignoring MUXER_FORMAT"),
            }
        }
        if let Some(filter) = lookup("MUXER_FILTER") {
            config.filter = filter;
        }
        if let Some(channels) = lookup("MUXER_AUDIO_CHANNELS") {
            if let Ok(c) = channels.parse() {
                config.audio_channels = c;
            }
        }

        config
    }

    /// Load configuration from file if it exists, otherwise from environment
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        if let Some(p) = path {
            if p.as_ref().exists() {
                return Self::from_file(p);
            }
        }
        Ok(Self::from_env())
    }

    /// Target format with the configured channel count applied
    pub fn format_desc(&self) -> VideoFormatDesc {
        self.format.desc().with_audio_channels(self.audio_channels)
    }
}

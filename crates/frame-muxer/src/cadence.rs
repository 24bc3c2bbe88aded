//! Audio cadence allocation
//!
//! A cadence is a short cycle of per-frame sample counts whose sum matches
//! the exact (possibly fractional) samples-per-frame ratio over one cycle.
//! 29.97 fps at 48 kHz needs 1601.6 samples per frame, so the cadence
//! `1602, 1601, 1602, 1601, 1602` is consumed one position per frame and
//! never drifts.

use std::collections::VecDeque;

use crate::error::{MuxerError, Result};
use crate::frame::AudioChunk;

/// Rotating sequence of audio sample counts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioCadence {
    counts: Vec<usize>,
}

impl AudioCadence {
    /// Create a cadence from interleaved sample counts
    ///
    /// The sequence starts rotated by one position (its last entry first),
    /// e.g. `1602, 1602, 1601, 1602, 1601`, which keeps the audio mixer
    /// filled best for the 1001-divided rates.
    pub fn new(counts: Vec<usize>) -> Result<Self> {
        if counts.is_empty() || counts.contains(&0) {
            return Err(MuxerError::InvalidConfig(format!(
                "audio cadence must be non-empty and positive, got {:?}",
                counts
            )));
        }
        let mut counts = counts;
        counts.rotate_right(1);
        Ok(Self { counts })
    }

    /// Sample count of the next pop
    pub fn head(&self) -> usize {
        self.counts[0]
    }

    /// Samples needed by the next `pops` pops, wrapping around the cycle
    pub fn upcoming(&self, pops: usize) -> usize {
        self.counts.iter().cycle().take(pops).sum()
    }

    /// Move to the next position of the cycle
    pub fn advance(&mut self) {
        self.counts.rotate_left(1);
    }

    /// Number of positions in one cycle
    pub fn cycle_len(&self) -> usize {
        self.counts.len()
    }

    /// Samples consumed over one full cycle
    pub fn cycle_samples(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Average samples per frame
    pub fn samples_per_frame(&self) -> f64 {
        self.cycle_samples() as f64 / self.cycle_len() as f64
    }

    /// Counts in the order they will be consumed
    pub fn as_slice(&self) -> &[usize] {
        &self.counts
    }

    /// Remove the next cadence-sized chunk from `samples` and advance
    ///
    /// # Panics
    /// If `samples` holds fewer than [`head`](Self::head) samples. Callers
    /// check readiness first; a short buffer here is a logic error.
    pub fn take(&mut self, samples: &mut VecDeque<i32>) -> AudioChunk {
        let count = self.head();
        assert!(
            samples.len() >= count,
            "audio pop needs {} samples, segment holds {}",
            count,
            samples.len()
        );
        let chunk: AudioChunk = samples.drain(..count).collect();
        self.advance();
        chunk
    }
}

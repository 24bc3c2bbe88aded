//! Async muxer stage
//!
//! Runs a [`FrameMuxer`] on its own tokio task. Decoded input arrives over a
//! bounded mpsc channel and assembled frames leave over another, so any
//! number of producers can feed one muxer without sharing it. The first
//! overflow is forwarded as [`StageEvent::Error`] and stops the task.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{MuxerError, Result};
use crate::frame::{AudioChunk, OutputFrame, StreamItem, VideoFrame};
use crate::muxer::{FrameMuxer, MuxerStats};

/// Input for the stage task
#[derive(Debug, Clone)]
pub enum MuxerInput {
    Video(StreamItem<VideoFrame>),
    Audio(StreamItem<AudioChunk>),
}

/// Output of the stage task
#[derive(Debug)]
pub enum StageEvent {
    /// Assembled output frame
    Frame(OutputFrame),
    /// Push failed; the stage has stopped
    Error(MuxerError),
}

/// What is left once the stage has shut down
#[derive(Debug)]
pub struct StageReport {
    /// Events produced but not yet received when the stage was finished
    pub remaining: Vec<StageEvent>,
    pub stats: MuxerStats,
}

/// Handle to a muxer running on a tokio task
pub struct MuxerStage {
    id: Uuid,
    input_tx: mpsc::Sender<MuxerInput>,
    output_rx: mpsc::Receiver<StageEvent>,
    handle: JoinHandle<MuxerStats>,
}

impl MuxerStage {
    /// Move `muxer` onto a new task
    ///
    /// `capacity` bounds both channels. Must be called from within a tokio
    /// runtime.
    pub fn spawn(muxer: FrameMuxer, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (input_tx, input_rx) = mpsc::channel(capacity);
        let (output_tx, output_rx) = mpsc::channel(capacity);

        let id = muxer.id();
        let handle = tokio::spawn(run_stage(muxer, input_rx, output_tx));

        Self {
            id,
            input_tx,
            output_rx,
            handle,
        }
    }

    /// Id of the muxer owned by this stage
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Additional producer handle
    pub fn sender(&self) -> mpsc::Sender<MuxerInput> {
        self.input_tx.clone()
    }

    pub async fn push_video(&self, item: StreamItem<VideoFrame>) -> Result<()> {
        self.send(MuxerInput::Video(item)).await
    }

    pub async fn push_audio(&self, item: StreamItem<AudioChunk>) -> Result<()> {
        self.send(MuxerInput::Audio(item)).await
    }

    async fn send(&self, input: MuxerInput) -> Result<()> {
        self.input_tx
            .send(input)
            .await
            .map_err(|_| MuxerError::Stage("muxer stage has stopped".to_string()))
    }

    /// Next output event, `None` once the stage has stopped and drained
    pub async fn recv(&mut self) -> Option<StageEvent> {
        self.output_rx.recv().await
    }

    /// Close the input, drain outstanding events and wait for the task
    pub async fn finish(self) -> Result<StageReport> {
        let MuxerStage {
            input_tx,
            mut output_rx,
            handle,
            ..
        } = self;
        drop(input_tx);

        let mut remaining = Vec::new();
        while let Some(event) = output_rx.recv().await {
            remaining.push(event);
        }

        let stats = handle.await.map_err(|e| MuxerError::Stage(e.to_string()))?;
        Ok(StageReport { remaining, stats })
    }
}

impl std::fmt::Debug for MuxerStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MuxerStage")
            .field("id", &self.id)
            .field("finished", &self.handle.is_finished())
            .finish()
    }
}

async fn run_stage(
    mut muxer: FrameMuxer,
    mut input_rx: mpsc::Receiver<MuxerInput>,
    output_tx: mpsc::Sender<StageEvent>,
) -> MuxerStats {
    let muxer_id = muxer.id();
    tracing::debug!(muxer_id = %muxer_id, "Muxer stage started");

    while let Some(input) = input_rx.recv().await {
        let pushed = match input {
            MuxerInput::Video(item) => muxer.push_video(item),
            MuxerInput::Audio(item) => muxer.push_audio(item),
        };

        if let Err(e) = pushed {
            tracing::warn!(muxer_id = %muxer_id, error = %e, "Muxer stage stopping");
            input_rx.close();
            let _ = output_tx.send(StageEvent::Error(e)).await;
            break;
        }

        while let Some(frame) = muxer.try_pop() {
            if output_tx.send(StageEvent::Frame(frame)).await.is_err() {
                tracing::debug!(muxer_id = %muxer_id, "Output receiver dropped");
                return muxer.stats();
            }
        }
    }

    let stats = muxer.stats();
    tracing::debug!(
        muxer_id = %muxer_id,
        frames_out = stats.frames_out,
        truncations = stats.truncations,
        "Muxer stage finished"
    );
    stats
}

use crate::audio::{AudioChunk, BufferStats};
use anyhow::Result;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tokio::sync::{mpsc, oneshot};

/// Commands for the Recorder service
pub enum RecorderCommand {
    Start,
    Stop(oneshot::Sender<Result<NamedTempFile>>),
}

/// Commands for the Player service
pub enum PlayerCommand {
    /// Play chunks from `chunks` until every sender is dropped, optionally
    /// exporting them to a WAV file
    Play {
        chunks: mpsc::Receiver<AudioChunk>,
        export: Option<PathBuf>,
        reply: oneshot::Sender<Result<BufferStats>>,
    },
    /// Stop taking new chunks; audio already buffered still plays out
    Stop,
}

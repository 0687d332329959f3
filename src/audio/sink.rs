use super::chunk::AudioChunk;
use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;

/// Destination for recorded or played audio
///
/// Implementations receive chunks as they arrive and produce a file when
/// finalized.
#[async_trait]
pub trait AudioSink: Send {
    /// Begin a new output file at `path`
    fn start(&mut self, path: PathBuf) -> Result<()>;

    /// Hand over one chunk (called repeatedly while audio flows)
    fn write_chunk(&mut self, chunk: AudioChunk) -> Result<()>;

    /// Finish the current file and return its path
    async fn finalize(&mut self) -> Result<PathBuf>;
}

use super::chunk::AudioChunk;
use super::format::AudioFormat;
use super::sink::AudioSink;
use super::wav::{self, Padding};
use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};

enum WavCommand {
    Start(PathBuf),
    WriteChunk(AudioChunk),
    Finalize {
        reply: oneshot::Sender<Result<PathBuf>>,
    },
}

/// WAV exporter running on a dedicated encoder thread
///
/// Chunks are converted to the sink's format as they arrive and collected on the
/// encoder thread. Finalizing encodes the collected samples in one pass and
/// writes the file, so the async side never blocks on encoding or disk I/O.
pub struct WavSink {
    tx: mpsc::UnboundedSender<WavCommand>,
}

impl WavSink {
    pub fn new(format: AudioFormat, padding: Padding) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();

        std::thread::spawn(move || {
            let mut path: Option<PathBuf> = None;
            let mut samples: Vec<f32> = Vec::new();

            while let Some(cmd) = rx.blocking_recv() {
                match cmd {
                    WavCommand::Start(next) => {
                        tracing::debug!("WAV sink writing to {:?}", next);
                        samples.clear();
                        path = Some(next);
                    }
                    WavCommand::WriteChunk(chunk) => {
                        if path.is_none() {
                            tracing::warn!("WAV sink received audio before start; ignoring");
                            continue;
                        }
                        samples.extend(chunk.into_format(format));
                    }
                    WavCommand::Finalize { reply } => {
                        let result = match path.take() {
                            Some(path) => {
                                let bytes = wav::encode(&samples, format, padding);
                                wav::write_file(&path, &bytes).map(|_| path)
                            }
                            None => Err(anyhow::anyhow!("WAV sink was never started")),
                        };
                        samples.clear();
                        let _ = reply.send(result);
                    }
                }
            }
        });

        Self { tx }
    }
}

#[async_trait]
impl AudioSink for WavSink {
    fn start(&mut self, path: PathBuf) -> Result<()> {
        self.tx
            .send(WavCommand::Start(path))
            .map_err(|e| anyhow::anyhow!("Failed to send start command: {}", e))
    }

    fn write_chunk(&mut self, chunk: AudioChunk) -> Result<()> {
        self.tx
            .send(WavCommand::WriteChunk(chunk))
            .map_err(|e| anyhow::anyhow!("Failed to send write command: {}", e))
    }

    async fn finalize(&mut self) -> Result<PathBuf> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(WavCommand::Finalize { reply })
            .map_err(|e| anyhow::anyhow!("Failed to send finalize command: {}", e))?;

        rx.await
            .map_err(|e| anyhow::anyhow!("Failed to receive finalize response: {}", e))?
    }
}

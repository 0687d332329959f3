use crate::audio::{AudioCapture, AudioChunk, AudioFormat, AudioSink};
use crate::messages::RecorderCommand;
use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use tokio::sync::mpsc;

/// Records the microphone into a WAV temp file
///
/// Each Start opens a fresh capture with its own chunk channel and a fresh temp
/// file. Stop closes the device, waits for the capture to flush its last partial
/// chunk, finalizes the WAV and hands the temp file back to the caller.
///
/// Holds a cpal::Stream (!Send); spawn it with tokio::task::spawn_local.
pub struct Recorder {
    format: AudioFormat,
    cmd_rx: mpsc::Receiver<RecorderCommand>,
    sink: Box<dyn AudioSink + Send>,
    take: Option<Take>,
}

/// State of the recording in progress
struct Take {
    capture: AudioCapture,
    chunks: mpsc::Receiver<AudioChunk>,
    file: NamedTempFile,
}

impl Recorder {
    pub fn new(
        format: AudioFormat,
        cmd_rx: mpsc::Receiver<RecorderCommand>,
        sink: Box<dyn AudioSink + Send>,
    ) -> Self {
        Self {
            format,
            cmd_rx,
            sink,
            take: None,
        }
    }

    pub async fn run(mut self) {
        loop {
            let cmd = match self.take.as_mut() {
                Some(take) => tokio::select! {
                    cmd = self.cmd_rx.recv() => cmd,
                    Some(chunk) = take.chunks.recv() => {
                        if let Err(e) = self.sink.write_chunk(chunk) {
                            tracing::error!("Failed to write audio chunk: {}", e);
                        }
                        continue;
                    }
                },
                None => self.cmd_rx.recv().await,
            };

            match cmd {
                Some(RecorderCommand::Start) => self.start(),
                Some(RecorderCommand::Stop(reply)) => {
                    let _ = reply.send(self.stop().await);
                }
                None => break,
            }
        }
        tracing::debug!("Recorder shutting down");
    }

    fn start(&mut self) {
        if self.take.is_some() {
            tracing::debug!("Already recording, ignoring start");
            return;
        }

        match self.open_take() {
            Ok(take) => {
                self.take = Some(take);
                tracing::info!("Recording started");
            }
            Err(e) => tracing::error!("Failed to start recording: {:#}", e),
        }
    }

    fn open_take(&mut self) -> Result<Take> {
        let file = tempfile::Builder::new()
            .prefix("voicebox-")
            .suffix(".wav")
            .tempfile()
            .context("Failed to create temp file")?;

        self.sink.start(file.path().to_path_buf())?;

        let (chunk_tx, chunks) = mpsc::channel(100);
        let capture = AudioCapture::start(self.format, chunk_tx)?;

        Ok(Take {
            capture,
            chunks,
            file,
        })
    }

    async fn stop(&mut self) -> Result<NamedTempFile> {
        let Take {
            capture,
            mut chunks,
            file,
        } = self.take.take().context("Not recording")?;

        capture.stop();

        // The channel closes once the capture has sent its final partial chunk
        while let Some(chunk) = chunks.recv().await {
            self.sink.write_chunk(chunk)?;
        }

        let path = self.sink.finalize().await?;
        tracing::info!("Recording stopped: {:?}", path);
        Ok(file)
    }
}

/// Handle for communicating with the Recorder
#[derive(Clone)]
pub struct RecorderHandle {
    tx: mpsc::Sender<RecorderCommand>,
}

impl RecorderHandle {
    pub fn new(tx: mpsc::Sender<RecorderCommand>) -> Self {
        Self { tx }
    }

    pub async fn start(&self) -> Result<()> {
        self.tx
            .send(RecorderCommand::Start)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send start command: {}", e))
    }

    pub async fn stop(&self) -> Result<NamedTempFile> {
        let (reply, rx) = tokio::sync::oneshot::channel();
        self.tx
            .send(RecorderCommand::Stop(reply))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send stop command: {}", e))?;

        rx.await
            .map_err(|e| anyhow::anyhow!("Failed to receive stop response: {}", e))?
    }
}

use crate::audio::{AudioChunk, AudioSink, BufferStats, PlaybackSession};
use crate::messages::PlayerCommand;
use anyhow::Result;
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};

/// Plays streams of audio chunks through the default output device
///
/// Each play request brings its own bounded chunk queue. Chunks are converted to
/// the device format and pushed into a fresh PlaybackSession; when every sender
/// of the queue is dropped (or Stop arrives) the session drains what is buffered
/// and the request is answered with the session statistics. Chunks can also be
/// teed into an AudioSink for WAV export.
///
/// Note: This service holds cpal::Stream which is !Send, so it must be spawned
/// on a LocalSet using tokio::task::spawn_local.
pub struct Player {
    cmd_rx: mpsc::Receiver<PlayerCommand>,
    buffer_seconds: f32,
    export_sink: Box<dyn AudioSink + Send>,
}

impl Player {
    pub fn new(
        cmd_rx: mpsc::Receiver<PlayerCommand>,
        buffer_seconds: f32,
        export_sink: Box<dyn AudioSink + Send>,
    ) -> Self {
        Self {
            cmd_rx,
            buffer_seconds,
            export_sink,
        }
    }

    pub async fn run(mut self) {
        while let Some(cmd) = self.cmd_rx.recv().await {
            match cmd {
                PlayerCommand::Play {
                    chunks,
                    export,
                    reply,
                } => {
                    let result = self.play(chunks, export).await;
                    if let Err(e) = &result {
                        tracing::error!("Playback failed: {:#}", e);
                    }
                    let _ = reply.send(result);
                }
                PlayerCommand::Stop => tracing::debug!("Nothing playing, ignoring stop"),
            }
        }
        tracing::debug!("Player shutting down");
    }

    async fn play(
        &mut self,
        mut chunks: mpsc::Receiver<AudioChunk>,
        export: Option<PathBuf>,
    ) -> Result<BufferStats> {
        let mut session = PlaybackSession::start(self.buffer_seconds)?;

        let exporting = match export {
            Some(path) => match self.export_sink.start(path) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("Failed to start WAV export: {}", e);
                    false
                }
            },
            None => false,
        };

        loop {
            tokio::select! {
                chunk = chunks.recv() => match chunk {
                    Some(chunk) => {
                        if exporting {
                            if let Err(e) = self.export_sink.write_chunk(chunk.clone()) {
                                tracing::warn!("Failed to export audio chunk: {}", e);
                            }
                        }
                        if !feed(&mut session, chunk, &mut self.cmd_rx).await {
                            break;
                        }
                    }
                    None => {
                        tracing::debug!("Chunk source finished");
                        break;
                    }
                },

                cmd = self.cmd_rx.recv() => {
                    if !keep_playing(cmd) {
                        break;
                    }
                }
            }
        }

        // Closing the queue tells the source to stop producing
        drop(chunks);
        let stats = session.finish().await?;

        if exporting {
            match self.export_sink.finalize().await {
                Ok(path) => tracing::info!("Exported playback to {:?}", path),
                Err(e) => tracing::warn!("Failed to finalize WAV export: {}", e),
            }
        }

        Ok(stats)
    }
}

/// Convert a chunk to the device format and queue it
///
/// Waits for room in the buffer so a fast source is paced by playback. Commands
/// are still answered while waiting; returns false once playback should stop.
async fn feed(
    session: &mut PlaybackSession,
    chunk: AudioChunk,
    cmd_rx: &mut mpsc::Receiver<PlayerCommand>,
) -> bool {
    let samples = chunk.into_format(session.format());
    if samples.is_empty() {
        tracing::debug!("Skipping empty or malformed chunk");
        return true;
    }

    let push = session.push_all(&samples);
    tokio::pin!(push);
    loop {
        tokio::select! {
            _ = &mut push => return true,
            cmd = cmd_rx.recv() => {
                if !keep_playing(cmd) {
                    return false;
                }
            }
        }
    }
}

/// Answer a command that arrives mid-playback; false means stop
fn keep_playing(cmd: Option<PlayerCommand>) -> bool {
    match cmd {
        Some(PlayerCommand::Play { reply, .. }) => {
            let _ = reply.send(Err(anyhow::anyhow!("Player is already busy")));
            true
        }
        Some(PlayerCommand::Stop) | None => {
            tracing::info!("Stop requested; draining buffered audio");
            false
        }
    }
}

/// Handle for communicating with the Player
#[derive(Clone)]
pub struct PlayerHandle {
    tx: mpsc::Sender<PlayerCommand>,
}

impl PlayerHandle {
    pub fn new(tx: mpsc::Sender<PlayerCommand>) -> Self {
        Self { tx }
    }

    /// Begin a playback session fed through a queue of `queue_len` chunks
    ///
    /// Drop the returned sender to signal the end of the stream; the receiver
    /// resolves once the buffered audio has finished playing. With `export` set,
    /// the played chunks are also written to that WAV file.
    pub async fn play(
        &self,
        queue_len: usize,
        export: Option<PathBuf>,
    ) -> Result<(mpsc::Sender<AudioChunk>, oneshot::Receiver<Result<BufferStats>>)> {
        let (chunk_tx, chunks) = mpsc::channel(queue_len.max(1));
        let (reply, done) = oneshot::channel();
        self.tx
            .send(PlayerCommand::Play {
                chunks,
                export,
                reply,
            })
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send play command: {}", e))?;
        Ok((chunk_tx, done))
    }

    pub async fn stop(&self) -> Result<()> {
        self.tx
            .send(PlayerCommand::Stop)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send stop command: {}", e))
    }
}

/// Wait for a play request to finish
pub async fn wait_for(done: oneshot::Receiver<Result<BufferStats>>) -> Result<BufferStats> {
    done.await
        .map_err(|e| anyhow::anyhow!("Failed to receive playback result: {}", e))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_play_while_busy_is_refused_and_playback_continues() {
        let (_chunk_tx, chunks) = mpsc::channel(1);
        let (reply, done) = oneshot::channel();
        let cmd = PlayerCommand::Play {
            chunks,
            export: None,
            reply,
        };

        assert!(keep_playing(Some(cmd)));
        let err = wait_for(done).await.unwrap_err();
        assert!(err.to_string().contains("busy"));
    }

    #[test]
    fn test_stop_or_closed_channel_ends_playback() {
        assert!(!keep_playing(Some(PlayerCommand::Stop)));
        assert!(!keep_playing(None));
    }
}

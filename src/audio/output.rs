use super::format::AudioFormat;
use super::playback_buffer::{BufferStats, Fill, PlaybackProducer, playback_buffer};
use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// How often a paced push checks whether the callback made room
const PUSH_POLL: Duration = Duration::from_millis(10);

/// An open output stream plus the producer side of its playback buffer
///
/// Created when playback starts and torn down by [`finish`](Self::finish). Holds a cpal::Stream, so it is !Send and must live on
/// a LocalSet.
pub struct PlaybackSession {
    stream: cpal::Stream,
    producer: PlaybackProducer,
    format: AudioFormat,
    drained: Arc<Notify>,
}

impl PlaybackSession {
    /// Open the default output device with room for `buffer_seconds` of audio
    pub fn start(buffer_seconds: f32) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .context("No output audio device available")?;

        let supported = device
            .default_output_config()
            .context("Failed to query output device config")?;
        if supported.sample_format() != cpal::SampleFormat::F32 {
            tracing::debug!(
                "Output device prefers {:?}; requesting f32 samples",
                supported.sample_format()
            );
        }
        let config = supported.config();
        let format = AudioFormat::new(config.sample_rate.0, config.channels);

        let (producer, mut consumer) = playback_buffer(format.samples_for_duration(buffer_seconds));

        let drained = Arc::new(Notify::new());
        let drained_callback = drained.clone();

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    let was_finished = consumer.is_finished();
                    if consumer.fill(data) == Fill::End && !was_finished {
                        drained_callback.notify_one();
                    }
                },
                move |err| {
                    eprintln!("Audio output stream error: {}", err);
                },
                None,
            )
            .context("Failed to build output stream")?;

        stream.play().context("Failed to start output stream")?;

        tracing::info!(
            "Playback started: {} Hz, {} channels, {} sample buffer",
            format.sample_rate,
            format.channels,
            producer.capacity()
        );

        Ok(Self {
            stream,
            producer,
            format,
            drained,
        })
    }

    /// Format the output device expects; pushed samples must already match it
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Samples that fit in the playback buffer right now
    pub fn vacant(&self) -> usize {
        self.producer.vacant()
    }

    pub fn capacity(&self) -> usize {
        self.producer.capacity()
    }

    /// Queue interleaved samples for playback without waiting
    pub fn push(&mut self, samples: &[f32]) -> usize {
        self.producer.push(samples)
    }

    /// Queue all of `samples`, waiting for the device to make room as needed
    pub async fn push_all(&mut self, samples: &[f32]) -> usize {
        self.producer.push_all(samples, PUSH_POLL).await
    }

    /// Signal the end of the stream and wait until everything buffered has played
    pub async fn finish(self) -> Result<BufferStats> {
        self.producer.signal_end();
        tracing::debug!(
            "Draining {} buffered samples before stopping",
            self.producer.buffered()
        );

        self.drained.notified().await;

        let stats = self.producer.stats();
        drop(self.stream);
        tracing::info!(
            "Playback finished: {} samples played, {} underruns, {} dropped",
            stats.played,
            stats.underruns,
            stats.dropped
        );
        Ok(stats)
    }
}

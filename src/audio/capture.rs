use super::chunk::AudioChunk;
use super::format::AudioFormat;
use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};
use ringbuf::{HeapRb, traits::*};
use std::sync::Arc;
use tokio::sync::{Notify, mpsc};

/// Length of each chunk sent to the recorder
const CHUNK_SECONDS: f32 = 0.5;

/// Audio the ring can hold while the recorder is busy
const RING_SECONDS: f32 = 60.0;

/// A running microphone stream
///
/// Captured samples leave through the chunk sender given to [`AudioCapture::start`].
/// The sender is dropped once [`stop`](Self::stop) has flushed the last partial
/// chunk, so the receiver sees the complete recording followed by `None`.
pub struct AudioCapture {
    stream: cpal::Stream,
    stop: Arc<Notify>,
}

impl AudioCapture {
    /// Open the default input device in `format` and start sending chunks
    ///
    /// Holds a cpal::Stream and spawns the bridge with spawn_local, so this must
    /// run on a LocalSet.
    pub fn start(format: AudioFormat, chunk_tx: mpsc::Sender<AudioChunk>) -> Result<Self> {
        let ring = HeapRb::<f32>::new(format.samples_for_duration(RING_SECONDS));
        let (mut producer, consumer) = ring.split();

        let device = cpal::default_host()
            .default_input_device()
            .context("No input audio device available")?;

        let config = StreamConfig {
            channels: format.channels,
            sample_rate: SampleRate(format.sample_rate),
            buffer_size: BufferSize::Default,
        };

        let ready = Arc::new(Notify::new());
        let ready_callback = ready.clone();

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                    producer.push_slice(data);
                    ready_callback.notify_one();
                },
                move |err| {
                    eprintln!("Audio input stream error: {}", err);
                },
                None,
            )
            .context("Failed to build input stream")?;

        stream.play().context("Failed to start input stream")?;

        let stop = Arc::new(Notify::new());
        tokio::task::spawn_local(bridge(consumer, format, chunk_tx, ready, stop.clone()));

        tracing::info!(
            "Capture started: {} Hz, {} channels",
            format.sample_rate,
            format.channels
        );
        Ok(Self { stream, stop })
    }

    /// Close the device and flush whatever is still buffered as a final chunk
    pub fn stop(self) {
        drop(self.stream);
        self.stop.notify_one();
    }
}

/// Move samples from the callback's ring into the chunk channel
///
/// Sends full chunks as they become available. On `stop` the remainder goes out
/// as one shorter chunk and the sender is dropped.
async fn bridge(
    mut consumer: impl Consumer<Item = f32>,
    format: AudioFormat,
    tx: mpsc::Sender<AudioChunk>,
    ready: Arc<Notify>,
    stop: Arc<Notify>,
) {
    let chunk_size = format.samples_for_duration(CHUNK_SECONDS).max(1);

    loop {
        let stopping = tokio::select! {
            _ = ready.notified() => false,
            _ = stop.notified() => true,
        };

        while consumer.occupied_len() >= chunk_size || (stopping && !consumer.is_empty()) {
            let mut samples = vec![0.0f32; consumer.occupied_len().min(chunk_size)];
            let n = consumer.pop_slice(&mut samples);
            samples.truncate(n);

            if tx.send(AudioChunk::float(samples, format)).await.is_err() {
                tracing::debug!("Chunk receiver closed; stopping capture bridge");
                return;
            }
        }

        if stopping {
            tracing::debug!("Capture bridge flushed");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stop_flushes_partial_chunk() {
        let format = AudioFormat::mono(100); // 50-sample chunks
        let (mut producer, consumer) = HeapRb::<f32>::new(1000).split();
        let (tx, mut rx) = mpsc::channel(16);
        let ready = Arc::new(Notify::new());
        let stop = Arc::new(Notify::new());

        let captured: Vec<f32> = (0..120).map(|i| i as f32).collect();
        producer.push_slice(&captured);
        ready.notify_one();
        stop.notify_one();

        bridge(consumer, format, tx, ready, stop).await;

        let mut sizes = Vec::new();
        let mut received = Vec::new();
        while let Some(chunk) = rx.recv().await {
            sizes.push(chunk.sample_count());
            received.extend(chunk.into_f32());
        }
        assert_eq!(received, captured);
        assert_eq!(sizes.iter().sum::<usize>(), 120);
        assert_eq!(sizes.last(), Some(&20));
    }

    #[tokio::test]
    async fn test_stop_with_empty_ring_sends_nothing() {
        let format = AudioFormat::mono(100);
        let (_producer, consumer) = HeapRb::<f32>::new(100).split();
        let (tx, mut rx) = mpsc::channel(4);
        let stop = Arc::new(Notify::new());
        stop.notify_one();

        bridge(consumer, format, tx, Arc::new(Notify::new()), stop).await;
        assert!(rx.recv().await.is_none());
    }
}

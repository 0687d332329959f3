//! Single-producer/single-consumer sample queue between audio sources and the
//! output device callback.
//!
//! The producer side never waits: samples that do not fit are dropped and
//! counted. The consumer side always hands out exactly the requested number of
//! samples, filling any shortfall with silence, until the producer has signalled
//! the end and everything buffered has been played.

use ringbuf::{HeapCons, HeapProd, HeapRb, traits::*};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Counters describing a playback session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    /// Samples accepted from the producer
    pub pushed: u64,
    /// Samples handed to the consumer (excluding silence padding)
    pub played: u64,
    /// Samples rejected because the ring was full
    pub dropped: u64,
    /// Pulls that had to be padded with silence
    pub underruns: u64,
}

/// Result of [`PlaybackConsumer::pull`]
#[derive(Debug, Clone, PartialEq)]
pub enum Pull {
    /// Exactly the requested number of samples
    Block(Vec<f32>),
    /// No more audio will arrive and the queue is empty
    End,
}

/// Result of [`PlaybackConsumer::fill`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// The whole slice came from buffered audio
    Full,
    /// Only `filled` samples were buffered; the rest is silence
    Underrun { filled: usize },
    /// The slice is silence and the stream is over
    End,
}

#[derive(Default)]
struct Shared {
    ended: AtomicBool,
    pushed: AtomicU64,
    played: AtomicU64,
    dropped: AtomicU64,
    underruns: AtomicU64,
}

impl Shared {
    fn stats(&self) -> BufferStats {
        BufferStats {
            pushed: self.pushed.load(Ordering::Relaxed),
            played: self.played.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
        }
    }
}

/// Create a playback queue holding at most `capacity` samples
pub fn playback_buffer(capacity: usize) -> (PlaybackProducer, PlaybackConsumer) {
    let (prod, cons) = HeapRb::<f32>::new(capacity.max(1)).split();
    let shared = Arc::new(Shared::default());

    (
        PlaybackProducer {
            prod,
            shared: shared.clone(),
        },
        PlaybackConsumer {
            cons,
            shared,
            finished: false,
        },
    )
}

/// Writing half, owned by the network or capture side
pub struct PlaybackProducer {
    prod: HeapProd<f32>,
    shared: Arc<Shared>,
}

impl PlaybackProducer {
    /// Append samples without waiting
    ///
    /// Returns how many samples were accepted; the rest are dropped.
    pub fn push(&mut self, samples: &[f32]) -> usize {
        if self.shared.ended.load(Ordering::Relaxed) {
            tracing::warn!("Push after end of stream; dropping {} samples", samples.len());
            self.shared
                .dropped
                .fetch_add(samples.len() as u64, Ordering::Relaxed);
            return 0;
        }

        let accepted = self.prod.push_slice(samples);
        self.shared
            .pushed
            .fetch_add(accepted as u64, Ordering::Relaxed);

        let dropped = samples.len() - accepted;
        if dropped > 0 {
            tracing::warn!("Playback buffer full; dropped {} samples", dropped);
            self.shared
                .dropped
                .fetch_add(dropped as u64, Ordering::Relaxed);
        }
        accepted
    }

    /// Append all of `samples`, waiting for the consumer whenever the ring is full
    ///
    /// Samples go in as slices of whatever is vacant, so input longer than the
    /// ring is never dropped. Polls every `poll` while full; never call this from
    /// the audio callback. Returns early (with the count accepted so far) if the
    /// end was already signalled.
    pub async fn push_all(&mut self, samples: &[f32], poll: Duration) -> usize {
        let mut offset = 0;
        while offset < samples.len() {
            if self.shared.ended.load(Ordering::Relaxed) {
                break;
            }

            let room = self.prod.vacant_len();
            if room == 0 {
                tokio::time::sleep(poll).await;
                continue;
            }

            let end = (offset + room).min(samples.len());
            offset += self.push(&samples[offset..end]);
        }
        offset
    }

    /// Mark that no further samples will be pushed
    pub fn signal_end(&self) {
        self.shared.ended.store(true, Ordering::Release);
    }

    /// Samples currently waiting to be played
    pub fn buffered(&self) -> usize {
        self.prod.occupied_len()
    }

    /// Samples that can be pushed before the ring is full
    pub fn vacant(&self) -> usize {
        self.prod.vacant_len()
    }

    pub fn capacity(&self) -> usize {
        self.prod.capacity().get()
    }

    pub fn stats(&self) -> BufferStats {
        self.shared.stats()
    }
}

impl Drop for PlaybackProducer {
    fn drop(&mut self) {
        self.signal_end();
    }
}

/// Reading half, owned by the output callback
pub struct PlaybackConsumer {
    cons: HeapCons<f32>,
    shared: Arc<Shared>,
    finished: bool,
}

impl PlaybackConsumer {
    /// Take exactly `n` samples, or [`Pull::End`] once the stream is over
    pub fn pull(&mut self, n: usize) -> Pull {
        let mut block = vec![0.0; n];
        match self.fill(&mut block) {
            Fill::End => Pull::End,
            Fill::Full | Fill::Underrun { .. } => Pull::Block(block),
        }
    }

    /// Fill `out` from the queue without allocating
    ///
    /// Missing samples are written as silence. Safe to call from a real-time
    /// audio callback.
    pub fn fill(&mut self, out: &mut [f32]) -> Fill {
        // Read the flag before popping so a final push is never mistaken for the end.
        let ended = self.shared.ended.load(Ordering::Acquire);
        if self.finished {
            out.fill(0.0);
            return Fill::End;
        }

        let filled = self.cons.pop_slice(out);
        out[filled..].fill(0.0);
        self.shared
            .played
            .fetch_add(filled as u64, Ordering::Relaxed);

        if filled == out.len() && !out.is_empty() {
            return Fill::Full;
        }
        if ended && filled == 0 && self.cons.is_empty() {
            self.finished = true;
            return Fill::End;
        }
        if filled < out.len() && !ended {
            self.shared.underruns.fetch_add(1, Ordering::Relaxed);
        }
        Fill::Underrun { filled }
    }

    /// Discard everything buffered, returning how many samples were dropped
    pub fn flush(&mut self) -> usize {
        let discarded = self.cons.clear();
        self.shared
            .dropped
            .fetch_add(discarded as u64, Ordering::Relaxed);
        discarded
    }

    pub fn buffered(&self) -> usize {
        self.cons.occupied_len()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn stats(&self) -> BufferStats {
        self.shared.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Vec<f32> {
        (0..len).map(|i| (i + 1) as f32 / len as f32).collect()
    }

    fn block(pull: Pull) -> Vec<f32> {
        match pull {
            Pull::Block(samples) => samples,
            Pull::End => panic!("unexpected end of stream"),
        }
    }

    #[test]
    fn test_pull_always_returns_requested_length() {
        let (mut producer, mut consumer) = playback_buffer(1024);

        assert_eq!(block(consumer.pull(64)).len(), 64); // underrun

        producer.push(&ramp(64));
        assert_eq!(block(consumer.pull(64)).len(), 64); // exact

        producer.push(&ramp(200));
        assert_eq!(block(consumer.pull(64)).len(), 64); // overrun
        assert_eq!(consumer.buffered(), 136);
    }

    #[test]
    fn test_pull_returns_prefix_of_pushed_chunk() {
        let (mut producer, mut consumer) = playback_buffer(1024);
        let chunk = ramp(100);
        producer.push(&chunk);

        assert_eq!(block(consumer.pull(40)), chunk[..40].to_vec());
        assert_eq!(block(consumer.pull(60)), chunk[40..].to_vec());
    }

    #[test]
    fn test_underrun_pads_with_silence() {
        let (mut producer, mut consumer) = playback_buffer(1024);
        let chunk = ramp(50);
        producer.push(&chunk);

        let out = block(consumer.pull(80));
        assert_eq!(&out[..50], chunk.as_slice());
        assert!(out[50..].iter().all(|&s| s == 0.0));
        assert_eq!(out.len(), 80);
        assert_eq!(consumer.stats().underruns, 1);
    }

    #[test]
    fn test_end_after_drain() {
        let (mut producer, mut consumer) = playback_buffer(1024);
        producer.push(&ramp(30));
        producer.signal_end();

        // Remaining audio is still delivered, padded to the block size
        let out = block(consumer.pull(20));
        assert_eq!(out.len(), 20);
        let out = block(consumer.pull(20));
        assert_eq!(out[..10], ramp(30)[20..]);
        assert!(out[10..].iter().all(|&s| s == 0.0));

        assert_eq!(consumer.pull(20), Pull::End);
        assert_eq!(consumer.pull(20), Pull::End);
        assert!(consumer.is_finished());
        // Padding at the end of the stream is not an underrun
        assert_eq!(consumer.stats().underruns, 0);
    }

    #[test]
    fn test_dropping_producer_ends_stream() {
        let (producer, mut consumer) = playback_buffer(16);
        drop(producer);
        assert_eq!(consumer.pull(8), Pull::End);
    }

    #[test]
    fn test_fill_reports_state() {
        let (mut producer, mut consumer) = playback_buffer(16);
        let mut out = [1.0f32; 4];

        producer.push(&[0.1, 0.2, 0.3, 0.4, 0.5]);
        assert_eq!(consumer.fill(&mut out), Fill::Full);
        assert_eq!(out, [0.1, 0.2, 0.3, 0.4]);

        assert_eq!(consumer.fill(&mut out), Fill::Underrun { filled: 1 });
        assert_eq!(out, [0.5, 0.0, 0.0, 0.0]);

        producer.signal_end();
        out = [1.0; 4];
        assert_eq!(consumer.fill(&mut out), Fill::End);
        assert_eq!(out, [0.0; 4]);
    }

    #[test]
    fn test_overflow_is_dropped_not_blocking() {
        let (mut producer, mut consumer) = playback_buffer(8);
        assert_eq!(producer.capacity(), 8);
        assert_eq!(producer.push(&ramp(12)), 8);
        assert_eq!(producer.vacant(), 0);

        let stats = producer.stats();
        assert_eq!(stats.pushed, 8);
        assert_eq!(stats.dropped, 4);
        assert_eq!(block(consumer.pull(8)), ramp(12)[..8].to_vec());
    }

    #[tokio::test]
    async fn test_push_all_waits_instead_of_dropping() {
        let (mut producer, mut consumer) = playback_buffer(8);
        let chunk = ramp(50);

        let reader = std::thread::spawn(move || {
            let mut received = Vec::new();
            let mut out = [0.0f32; 3];
            loop {
                match consumer.fill(&mut out) {
                    Fill::Full => received.extend_from_slice(&out),
                    Fill::Underrun { filled } => {
                        received.extend_from_slice(&out[..filled]);
                        std::thread::sleep(Duration::from_millis(1));
                    }
                    Fill::End => break,
                }
            }
            received
        });

        let accepted = producer.push_all(&chunk, Duration::from_millis(1)).await;
        assert_eq!(accepted, 50);

        let stats = producer.stats();
        assert_eq!(stats.pushed, 50);
        assert_eq!(stats.dropped, 0);

        producer.signal_end();
        assert_eq!(reader.join().unwrap(), chunk);
    }

    #[tokio::test]
    async fn test_push_all_stops_after_end() {
        let (mut producer, _consumer) = playback_buffer(8);
        producer.signal_end();
        assert_eq!(producer.push_all(&ramp(4), Duration::from_millis(1)).await, 0);
    }

    #[test]
    fn test_push_after_end_is_rejected() {
        let (mut producer, mut consumer) = playback_buffer(8);
        producer.signal_end();
        assert_eq!(producer.push(&[0.5; 4]), 0);
        assert_eq!(consumer.pull(4), Pull::End);
    }

    #[test]
    fn test_flush_discards_buffered_audio() {
        let (mut producer, mut consumer) = playback_buffer(64);
        producer.push(&ramp(32));
        assert_eq!(consumer.flush(), 32);
        assert_eq!(consumer.buffered(), 0);
        assert_eq!(block(consumer.pull(4)), vec![0.0; 4]);
    }

    #[test]
    fn test_concurrent_producer_and_consumer() {
        let (mut producer, mut consumer) = playback_buffer(4096);
        let total = 20_000usize;

        let writer = std::thread::spawn(move || {
            let samples: Vec<f32> = (0..total).map(|i| i as f32).collect();
            let mut offset = 0;
            while offset < total {
                let end = (offset + 256).min(total);
                let accepted = producer.push(&samples[offset..end]);
                offset += accepted;
                if accepted == 0 {
                    std::thread::yield_now();
                }
            }
            producer.signal_end();
        });

        let mut received = Vec::new();
        let mut out = [0.0f32; 128];
        loop {
            match consumer.fill(&mut out) {
                Fill::Full => received.extend_from_slice(&out),
                Fill::Underrun { filled } => received.extend_from_slice(&out[..filled]),
                Fill::End => break,
            }
        }
        writer.join().unwrap();

        let expected: Vec<f32> = (0..total).map(|i| i as f32).collect();
        assert_eq!(received, expected);
    }
}

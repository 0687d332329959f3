use super::convert::{Endian, pcm16_to_f32, remix};
use super::format::AudioFormat;
use super::resample::resample_interleaved;
use std::time::Duration;

/// Sample payload carried by an [`AudioChunk`]
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkData {
    /// Little-endian signed 16-bit PCM, as returned by the speech API
    Pcm16(Vec<u8>),
    /// Normalized samples, as produced by local capture
    Float(Vec<f32>),
}

/// A block of interleaved audio tagged with its format
///
/// Chunks are built once by a source and consumed once by the stage that
/// receives them.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    data: ChunkData,
    format: AudioFormat,
}

impl AudioChunk {
    pub fn pcm16(bytes: Vec<u8>, format: AudioFormat) -> Self {
        Self {
            data: ChunkData::Pcm16(bytes),
            format,
        }
    }

    pub fn float(samples: Vec<f32>, format: AudioFormat) -> Self {
        Self {
            data: ChunkData::Float(samples),
            format,
        }
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn data(&self) -> &ChunkData {
        &self.data
    }

    pub fn bits_per_sample(&self) -> u16 {
        match self.data {
            ChunkData::Pcm16(_) => AudioFormat::BITS_PER_SAMPLE,
            ChunkData::Float(_) => 32,
        }
    }

    /// Number of interleaved samples in the chunk
    pub fn sample_count(&self) -> usize {
        match &self.data {
            ChunkData::Pcm16(bytes) => bytes.len() / 2,
            ChunkData::Float(samples) => samples.len(),
        }
    }

    pub fn duration(&self) -> Duration {
        let frames = self.sample_count() / usize::from(self.format.channels.max(1));
        Duration::from_secs_f64(frames as f64 / f64::from(self.format.sample_rate.max(1)))
    }

    /// Consume the chunk, yielding normalized samples
    ///
    /// A malformed PCM payload yields no samples.
    pub fn into_f32(self) -> Vec<f32> {
        match self.data {
            ChunkData::Pcm16(bytes) => pcm16_to_f32(&bytes, Endian::Little),
            ChunkData::Float(samples) => samples,
        }
    }

    /// Consume the chunk, yielding samples at `target`'s rate and channel count
    pub fn into_format(self, target: AudioFormat) -> Vec<f32> {
        let source = self.format;
        let samples = self.into_f32();
        let resampled = resample_interleaved(
            &samples,
            source.channels,
            source.sample_rate,
            target.sample_rate,
        );
        remix(&resampled, source.channels, target.channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_chunk_metadata() {
        let chunk = AudioChunk::pcm16(vec![0; 4800], AudioFormat::mono(24000));
        assert_eq!(chunk.bits_per_sample(), 16);
        assert_eq!(chunk.sample_count(), 2400);
        assert_eq!(chunk.duration(), Duration::from_millis(100));
    }

    #[test]
    fn test_float_chunk_passes_through() {
        let chunk = AudioChunk::float(vec![0.5, -0.5], AudioFormat::new(16000, 2));
        assert_eq!(chunk.bits_per_sample(), 32);
        assert_eq!(chunk.into_f32(), vec![0.5, -0.5]);
    }

    #[test]
    fn test_into_format_resamples_and_remixes() {
        let chunk = AudioChunk::float(vec![0.25; 100], AudioFormat::mono(24000));
        let out = chunk.into_format(AudioFormat::new(48000, 2));
        assert_eq!(out.len(), 400);
        assert!(out.iter().all(|&s| s == 0.25));
    }

    #[test]
    fn test_malformed_pcm_chunk_is_silent() {
        let chunk = AudioChunk::pcm16(vec![1, 2, 3], AudioFormat::mono(24000));
        assert!(chunk.into_f32().is_empty());
    }
}

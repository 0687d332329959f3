//! Canonical 44-byte RIFF/WAVE encoding for 16-bit PCM.
//!
//! Every function here is pure: the same samples and format always produce the
//! same bytes.

use super::convert::{f32_to_pcm16, interleave};
use super::format::AudioFormat;
use anyhow::{Context, Result};
use std::path::Path;

pub const HEADER_LEN: usize = 44;

const FMT_CHUNK_LEN: u32 = 16;
const WAVE_FORMAT_PCM: u16 = 1;

/// How much silence to append after the last sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Padding {
    /// Only complete the final frame
    #[default]
    Frame,
    /// Extend the data to the next whole second of frames
    WholeSecond,
}

/// Fields of the canonical PCM WAV header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub data_len: u32,
}

impl WavHeader {
    pub fn new(format: AudioFormat, data_len: u32) -> Self {
        Self {
            sample_rate: format.sample_rate,
            channels: format.channels,
            bits_per_sample: AudioFormat::BITS_PER_SAMPLE,
            data_len,
        }
    }

    pub fn block_align(&self) -> u16 {
        self.channels * (self.bits_per_sample / 8)
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * u32::from(self.block_align())
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut header = [0u8; HEADER_LEN];
        // RIFF chunk size covers everything after the first 8 bytes
        let riff_len = (HEADER_LEN as u32 - 8) + self.data_len;

        header[0..4].copy_from_slice(b"RIFF");
        header[4..8].copy_from_slice(&riff_len.to_le_bytes());
        header[8..12].copy_from_slice(b"WAVE");

        header[12..16].copy_from_slice(b"fmt ");
        header[16..20].copy_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
        header[20..22].copy_from_slice(&WAVE_FORMAT_PCM.to_le_bytes());
        header[22..24].copy_from_slice(&self.channels.to_le_bytes());
        header[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        header[28..32].copy_from_slice(&self.byte_rate().to_le_bytes());
        header[32..34].copy_from_slice(&self.block_align().to_le_bytes());
        header[34..36].copy_from_slice(&self.bits_per_sample.to_le_bytes());

        header[36..40].copy_from_slice(b"data");
        header[40..44].copy_from_slice(&self.data_len.to_le_bytes());
        header
    }
}

/// Encode interleaved float samples as a 16-bit PCM WAV file
pub fn encode(samples: &[f32], format: AudioFormat, padding: Padding) -> Vec<u8> {
    let pcm = f32_to_pcm16(samples);
    assemble(pcm, format, padding)
}

/// Encode one sample vector per channel
pub fn encode_planar(channels: &[Vec<f32>], sample_rate: u32, padding: Padding) -> Vec<u8> {
    let channel_count = u16::try_from(channels.len().max(1)).unwrap_or(u16::MAX);
    let format = AudioFormat::new(sample_rate, channel_count);
    encode(&interleave(channels), format, padding)
}

/// Wrap raw little-endian PCM16 bytes in a WAV container
///
/// A trailing odd byte cannot form a sample; it is trimmed with a warning rather
/// than failing the whole export.
pub fn encode_pcm16(pcm: &[u8], format: AudioFormat, padding: Padding) -> Vec<u8> {
    let mut data = pcm.to_vec();
    if data.len() % 2 != 0 {
        tracing::warn!(
            "PCM data has odd length ({} bytes); trimming final byte",
            data.len()
        );
        data.pop();
    }
    assemble(data, format, padding)
}

/// Write encoded WAV bytes to disk
pub fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("Failed to write WAV file: {:?}", path))?;
    tracing::info!("Wrote {} bytes of WAV to {:?}", bytes.len(), path);
    Ok(())
}

/// Read a WAV file into normalized interleaved samples
///
/// Accepts any integer PCM depth or 32-bit float, unlike [`encode`] which only
/// produces 16-bit PCM.
pub fn read_file(path: &Path) -> Result<(Vec<f32>, AudioFormat)> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file: {:?}", path))?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read float samples")?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read PCM samples")?
        }
    };

    let format = AudioFormat::new(spec.sample_rate, spec.channels);
    tracing::debug!(
        "Read {} samples from {:?} ({} Hz, {} channels, {} bits)",
        samples.len(),
        path,
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample
    );
    Ok((samples, format))
}

fn assemble(mut data: Vec<u8>, format: AudioFormat, padding: Padding) -> Vec<u8> {
    let padded_len = padded_data_len(data.len(), format, padding);
    data.resize(padded_len, 0);

    let data_len = u32::try_from(data.len()).unwrap_or(u32::MAX);
    let header = WavHeader::new(format, data_len);

    let mut bytes = Vec::with_capacity(HEADER_LEN + data.len());
    bytes.extend_from_slice(&header.to_bytes());
    bytes.extend_from_slice(&data);
    bytes
}

fn padded_data_len(len: usize, format: AudioFormat, padding: Padding) -> usize {
    let block = usize::from(format.block_align().max(1));
    let unit = match padding {
        Padding::Frame => block,
        Padding::WholeSecond => block * (format.sample_rate.max(1) as usize),
    };
    len.div_ceil(unit) * unit
}

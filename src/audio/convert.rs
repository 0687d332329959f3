//! Conversions between 16-bit PCM bytes and normalized f32 samples.
//!
//! Malformed input never fails: a frame with an odd byte count is dropped with a
//! warning so a streaming session keeps going on silence instead of halting.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

/// Decode signed 16-bit PCM into samples in [-1.0, 1.0)
///
/// Returns an empty vector when the byte count is odd.
pub fn pcm16_to_f32(bytes: &[u8], endian: Endian) -> Vec<f32> {
    if bytes.len() % 2 != 0 {
        tracing::warn!(
            "Dropping malformed PCM16 frame: {} bytes is not a whole number of samples",
            bytes.len()
        );
        return Vec::new();
    }

    bytes
        .chunks_exact(2)
        .map(|pair| {
            let raw = [pair[0], pair[1]];
            let value = match endian {
                Endian::Little => i16::from_le_bytes(raw),
                Endian::Big => i16::from_be_bytes(raw),
            };
            f32::from(value) / 32768.0
        })
        .collect()
}

/// Map one float sample onto the signed 16-bit range
///
/// Negative values scale by 32768 and positive values by 32767, so both -1.0 and
/// 1.0 land exactly on the ends of the range.
pub fn f32_to_i16(sample: f32) -> i16 {
    let v = sample.clamp(-1.0, 1.0);
    let scaled = if v < 0.0 { v * 32768.0 } else { v * 32767.0 };
    scaled
        .round()
        .clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
}

/// Encode samples as little-endian signed 16-bit PCM
pub fn f32_to_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        bytes.extend_from_slice(&f32_to_i16(sample).to_le_bytes());
    }
    bytes
}

/// Interleave planar channel data, padding short channels with silence
pub fn interleave(planar: &[Vec<f32>]) -> Vec<f32> {
    let frames = planar.iter().map(Vec::len).max().unwrap_or(0);
    let mut out = Vec::with_capacity(frames * planar.len());
    for frame in 0..frames {
        for channel in planar {
            out.push(channel.get(frame).copied().unwrap_or(0.0));
        }
    }
    out
}

/// Split interleaved samples into one vector per channel
///
/// A trailing partial frame is dropped.
pub fn deinterleave(samples: &[f32], channels: u16) -> Vec<Vec<f32>> {
    let channels = usize::from(channels.max(1));
    let frames = samples.len() / channels;
    let mut planar = vec![Vec::with_capacity(frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (channel, &sample) in planar.iter_mut().zip(frame) {
            channel.push(sample);
        }
    }
    planar
}

/// Change the channel count of interleaved samples
///
/// Mono is duplicated into every output channel, anything going to mono is
/// averaged, and other layouts keep the leading channels (filling missing ones
/// with silence).
pub fn remix(samples: &[f32], from_channels: u16, to_channels: u16) -> Vec<f32> {
    let from = usize::from(from_channels.max(1));
    let to = usize::from(to_channels.max(1));
    if from == to {
        return samples.to_vec();
    }

    let frames = samples.len() / from;
    let mut out = Vec::with_capacity(frames * to);
    for frame in samples.chunks_exact(from) {
        if from == 1 {
            out.extend(std::iter::repeat_n(frame[0], to));
        } else if to == 1 {
            out.push(frame.iter().sum::<f32>() / from as f32);
        } else {
            out.extend((0..to).map(|c| frame.get(c).copied().unwrap_or(0.0)));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm16_to_f32_scaling() {
        let bytes = [0x00, 0x80, 0x00, 0x00, 0xff, 0x7f, 0x00, 0x40];
        let samples = pcm16_to_f32(&bytes, Endian::Little);
        assert_eq!(samples, vec![-1.0, 0.0, 32767.0 / 32768.0, 0.5]);
    }

    #[test]
    fn test_pcm16_big_endian() {
        let samples = pcm16_to_f32(&[0x40, 0x00], Endian::Big);
        assert_eq!(samples, vec![0.5]);
    }

    #[test]
    fn test_odd_length_frame_is_dropped() {
        assert!(pcm16_to_f32(&[0x01, 0x02, 0x03], Endian::Little).is_empty());
    }

    #[test]
    fn test_f32_to_i16_asymmetric_scale() {
        assert_eq!(f32_to_i16(-1.0), i16::MIN);
        assert_eq!(f32_to_i16(1.0), i16::MAX);
        assert_eq!(f32_to_i16(0.0), 0);
        assert_eq!(f32_to_i16(-0.5), -16384);
        assert_eq!(f32_to_i16(0.5), 16384); // 16383.5 rounds away from zero
        assert_eq!(f32_to_i16(3.0), i16::MAX);
        assert_eq!(f32_to_i16(-3.0), i16::MIN);
    }

    #[test]
    fn test_pcm_round_trip_within_one_lsb() {
        let original: Vec<i16> = (i16::MIN..=i16::MAX).step_by(97).chain([i16::MAX]).collect();
        let bytes: Vec<u8> = original.iter().flat_map(|s| s.to_le_bytes()).collect();

        let restored = f32_to_pcm16(&pcm16_to_f32(&bytes, Endian::Little));
        assert_eq!(restored.len(), bytes.len());

        for (a, b) in bytes.chunks_exact(2).zip(restored.chunks_exact(2)) {
            let a = i16::from_le_bytes([a[0], a[1]]);
            let b = i16::from_le_bytes([b[0], b[1]]);
            assert!((i32::from(a) - i32::from(b)).abs() <= 1, "{a} vs {b}");
        }
    }

    #[test]
    fn test_interleave_and_deinterleave() {
        let planar = vec![vec![1.0, 2.0, 3.0], vec![-1.0, -2.0]];
        let interleaved = interleave(&planar);
        assert_eq!(interleaved, vec![1.0, -1.0, 2.0, -2.0, 3.0, 0.0]);

        let split = deinterleave(&interleaved, 2);
        assert_eq!(split, vec![vec![1.0, 2.0, 3.0], vec![-1.0, -2.0, 0.0]]);
    }

    #[test]
    fn test_remix() {
        assert_eq!(remix(&[0.25, 0.5], 1, 2), vec![0.25, 0.25, 0.5, 0.5]);
        assert_eq!(remix(&[0.25, 0.75, -1.0, 1.0], 2, 1), vec![0.5, 0.0]);
        assert_eq!(remix(&[1.0, 2.0, 3.0], 3, 2), vec![1.0, 2.0]);
        assert_eq!(remix(&[1.0, 2.0], 2, 3), vec![1.0, 2.0, 0.0]);
    }
}

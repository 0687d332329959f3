//! Linear-interpolation sample rate conversion.
//!
//! Speech audio from the API and the microphone is already band-limited, so
//! interpolating between the two nearest source samples is good enough and cheap
//! enough to run per chunk.

use super::convert::{deinterleave, interleave};
use std::borrow::Cow;

/// Resample a mono sample sequence from `source_rate` to `target_rate`
///
/// Equal rates return the input borrowed, without copying.
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Cow<'_, [f32]> {
    debug_assert!(
        source_rate > 0 && target_rate > 0,
        "sample rates must be non-zero"
    );

    if source_rate == target_rate {
        return Cow::Borrowed(samples);
    }
    if samples.is_empty() || source_rate == 0 || target_rate == 0 {
        return Cow::Owned(Vec::new());
    }

    let ratio = f64::from(target_rate) / f64::from(source_rate);
    let output_len = (samples.len() as f64 * ratio).round() as usize;
    let last = samples.len() - 1;

    let output = (0..output_len)
        .map(|i| {
            let position = i as f64 / ratio;
            let lower = (position.floor() as usize).min(last);
            let upper = (lower + 1).min(last);
            let frac = (position - lower as f64) as f32;
            samples[lower] + (samples[upper] - samples[lower]) * frac
        })
        .collect();

    Cow::Owned(output)
}

/// Resample interleaved audio, treating each channel independently
pub fn resample_interleaved(
    samples: &[f32],
    channels: u16,
    source_rate: u32,
    target_rate: u32,
) -> Cow<'_, [f32]> {
    if channels <= 1 || source_rate == target_rate {
        return resample(samples, source_rate, target_rate);
    }

    let planar: Vec<Vec<f32>> = deinterleave(samples, channels)
        .iter()
        .map(|channel| resample(channel, source_rate, target_rate).into_owned())
        .collect();

    Cow::Owned(interleave(&planar))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_rates_borrow_input() {
        let samples = vec![0.1, -0.2, 0.3];
        let out = resample(&samples, 24000, 24000);
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(&*out, samples.as_slice());
    }

    #[test]
    fn test_upsample_ramp() {
        let ramp: Vec<f32> = (0..10).map(|i| i as f32 / 9.0).collect();
        let out = resample(&ramp, 10, 20);

        assert_eq!(out.len(), 20);
        assert_eq!(out[0], ramp[0]);
        assert_eq!(out[19], ramp[9]);
        assert!(out.windows(2).all(|w| w[0] <= w[1]));
        // Midpoint between the first two samples
        assert!((out[1] - 0.5 / 9.0).abs() < 1e-6);
    }

    #[test]
    fn test_downsample_length_rounds() {
        let samples = vec![0.0; 441];
        assert_eq!(resample(&samples, 44100, 16000).len(), 160);

        let samples = vec![0.5; 1000];
        let out = resample(&samples, 48000, 24000);
        assert_eq!(out.len(), 500);
        assert!(out.iter().all(|&s| s == 0.5));
    }

    #[test]
    fn test_empty_input() {
        assert!(resample(&[], 16000, 48000).is_empty());
    }

    #[test]
    fn test_single_sample_holds_value() {
        let out = resample(&[0.75], 8000, 24000);
        assert_eq!(&*out, &[0.75, 0.75, 0.75]);
    }

    #[test]
    fn test_interleaved_channels_stay_separate() {
        let stereo = vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0];
        let out = resample_interleaved(&stereo, 2, 8000, 16000);
        assert_eq!(out.len(), 12);
        for frame in out.chunks_exact(2) {
            assert_eq!(frame, &[0.0, 1.0]);
        }
    }
}

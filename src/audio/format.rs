// NOTE: Everything we write to disk or send to the speech API is 16-bit signed integer PCM.
// Float samples only exist between conversion and the output device.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioFormat {
    pub const BITS_PER_SAMPLE: u16 = 16;

    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    pub fn mono(sample_rate: u32) -> Self {
        Self::new(sample_rate, 1)
    }

    pub fn bytes_per_sample(&self) -> u16 {
        Self::BITS_PER_SAMPLE / 8
    }

    /// Bytes in one frame (one sample for every channel)
    pub fn block_align(&self) -> u16 {
        self.channels * self.bytes_per_sample()
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * u32::from(self.block_align())
    }

    /// Number of frames covering a duration in seconds
    pub fn frames_for_duration(&self, seconds: f32) -> usize {
        (self.sample_rate as f32 * seconds) as usize
    }

    /// Number of interleaved samples covering a duration in seconds
    pub fn samples_for_duration(&self, seconds: f32) -> usize {
        self.frames_for_duration(seconds) * usize::from(self.channels)
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::mono(16000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_fields() {
        let format = AudioFormat::new(44100, 2);
        assert_eq!(format.block_align(), 4);
        assert_eq!(format.byte_rate(), 176_400);
        assert_eq!(format.samples_for_duration(0.5), 44100);
    }

    #[test]
    fn test_default_is_capture_format() {
        let format = AudioFormat::default();
        assert_eq!(format, AudioFormat::mono(16000));
        assert_eq!(format.frames_for_duration(0.1), 1600);
    }
}

pub mod capture;
pub mod chunk;
pub mod convert;
pub mod format;
pub mod output;
pub mod playback_buffer;
pub mod resample;
pub mod sink;
pub mod wav;
pub mod wav_sink;

pub use capture::AudioCapture;
pub use chunk::AudioChunk;
pub use format::AudioFormat;
pub use output::PlaybackSession;
pub use playback_buffer::BufferStats;
pub use sink::AudioSink;
pub use wav::Padding;
pub use wav_sink::WavSink;

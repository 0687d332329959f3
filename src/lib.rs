//! Speech audio pipeline: PCM conversion, resampling, WAV encoding and
//! real-time playback buffering, plus the capture/playback services and the
//! speech API calls that feed them.

pub mod audio;
pub mod config;
pub mod messages;
pub mod services;
pub mod speech;

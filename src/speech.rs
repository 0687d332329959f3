use crate::audio::{AudioChunk, AudioFormat};
use anyhow::{Context, Result};
use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    AudioResponseFormat, CreateSpeechRequestArgs, CreateTranscriptionRequestArgs, SpeechModel,
    SpeechResponseFormat, Voice,
};
use std::path::Path;

/// Configuration for transcription
pub struct TranscriptionConfig {
    pub model: String,
    pub prompt: String,
    pub language: String,
}

/// Configuration for speech synthesis
pub struct SpeechConfig {
    pub model: String,
    pub voice: String,
    /// Rate of the raw PCM the API returns
    pub sample_rate: u32,
}

impl SpeechConfig {
    pub fn format(&self) -> AudioFormat {
        AudioFormat::mono(self.sample_rate)
    }
}

/// Create an API client
pub fn create_client(api_url: &str, api_key: &str) -> Client<OpenAIConfig> {
    let openai_config = OpenAIConfig::new()
        .with_api_base(api_url.to_string())
        .with_api_key(api_key.to_string());

    Client::with_config(openai_config)
}

pub async fn transcribe(
    audio_path: &Path,
    client: &Client<OpenAIConfig>,
    config: &TranscriptionConfig,
) -> Result<String> {
    tracing::info!("Transcribing file: {:?}", audio_path);

    let request = CreateTranscriptionRequestArgs::default()
        .file(audio_path.to_str().context("Invalid path")?)
        .model(&config.model)
        .prompt(&config.prompt)
        .language(&config.language)
        .response_format(AudioResponseFormat::Json)
        .build()
        .context("Failed to build transcription request")?;

    let response = client
        .audio()
        .transcribe(request)
        .await
        .context("Transcription API call failed")?;

    tracing::info!("Transcription complete: {} chars", response.text.len());
    Ok(response.text)
}

/// Synthesize speech as raw little-endian PCM16 in `config.format()`
pub async fn synthesize(
    text: &str,
    client: &Client<OpenAIConfig>,
    config: &SpeechConfig,
) -> Result<Vec<u8>> {
    tracing::info!("Synthesizing {} chars with voice {}", text.len(), config.voice);

    let voice: Voice = serde_json::from_value(serde_json::Value::String(config.voice.clone()))
        .with_context(|| format!("Unknown voice: {}", config.voice))?;
    let model: SpeechModel = serde_json::from_value(serde_json::Value::String(config.model.clone()))
        .with_context(|| format!("Unknown speech model: {}", config.model))?;

    let request = CreateSpeechRequestArgs::default()
        .input(text)
        .model(model)
        .voice(voice)
        .response_format(SpeechResponseFormat::Pcm)
        .build()
        .context("Failed to build speech request")?;

    let response = client
        .audio()
        .speech(request)
        .await
        .context("Speech API call failed")?;

    let pcm = response.bytes.to_vec();
    tracing::info!(
        "Speech complete: {} bytes ({:.2}s)",
        pcm.len(),
        pcm.len() as f64 / f64::from(config.format().byte_rate())
    );
    Ok(pcm)
}

/// Split a PCM16 body into frame-aligned chunks of about `chunk_ms` each
///
/// Only the final chunk can be shorter. A trailing odd byte is trimmed with a
/// warning, the same way the WAV encoder treats it, so playback and export carry
/// the same samples.
pub fn pcm_chunks(pcm: &[u8], format: AudioFormat, chunk_ms: u32) -> Vec<AudioChunk> {
    let pcm = if pcm.len() % 2 != 0 {
        tracing::warn!("PCM body has odd length {}; trimming final byte", pcm.len());
        &pcm[..pcm.len() - 1]
    } else {
        pcm
    };

    let block = usize::from(format.block_align().max(1));
    let frames = format.frames_for_duration(chunk_ms as f32 / 1000.0).max(1);
    let chunk_len = frames * block;

    pcm.chunks(chunk_len)
        .map(|bytes| AudioChunk::pcm16(bytes.to_vec(), format))
        .collect()
}

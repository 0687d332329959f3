use crate::audio::Padding;
use crate::speech::{SpeechConfig, TranscriptionConfig};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_api_key")]
    pub api_key: String,

    #[serde(default = "default_speech_model")]
    pub speech_model: String,

    #[serde(default = "default_voice")]
    pub voice: String,

    #[serde(default = "default_speech_sample_rate")]
    pub speech_sample_rate: u32,

    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,

    #[serde(default)]
    pub language: Option<String>,

    #[serde(default)]
    pub whisper_prompt: Option<String>,

    #[serde(default = "default_record_sample_rate")]
    pub record_sample_rate: u32,

    #[serde(default = "default_playback_buffer_seconds")]
    pub playback_buffer_seconds: f32,

    #[serde(default = "default_chunk_ms")]
    pub chunk_ms: u32,

    #[serde(default)]
    pub pad_exports_to_second: bool,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key() -> String {
    "dummy".to_string()
}

fn default_speech_model() -> String {
    "tts-1".to_string()
}

fn default_voice() -> String {
    "alloy".to_string()
}

fn default_speech_sample_rate() -> u32 {
    24000
}

fn default_transcription_model() -> String {
    "whisper-1".to_string()
}

fn default_record_sample_rate() -> u32 {
    16000
}

fn default_playback_buffer_seconds() -> f32 {
    5.0
}

fn default_chunk_ms() -> u32 {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: default_api_key(),
            speech_model: default_speech_model(),
            voice: default_voice(),
            speech_sample_rate: default_speech_sample_rate(),
            transcription_model: default_transcription_model(),
            language: None,
            whisper_prompt: None,
            record_sample_rate: default_record_sample_rate(),
            playback_buffer_seconds: default_playback_buffer_seconds(),
            chunk_ms: default_chunk_ms(),
            pad_exports_to_second: false,
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.config/voicebox/config.json)
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            tracing::info!(
                "Config file not found at {:?}, creating default config",
                config_path
            );
            let config = Self::default();
            config.save_to(&config_path)?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        tracing::info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    /// Save configuration to `config_path`
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        tracing::info!("Saved config to {:?}", config_path);
        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
            PathBuf::from(dir)
        } else {
            let home = std::env::var("HOME").context("HOME environment variable not set")?;
            PathBuf::from(home).join(".config")
        };

        Ok(config_dir.join("voicebox").join("config.json"))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.api_url.is_empty() {
            return Err(anyhow::anyhow!("api_url cannot be empty"));
        }

        if self.speech_model.is_empty() || self.transcription_model.is_empty() {
            return Err(anyhow::anyhow!("model names cannot be empty"));
        }

        if self.speech_sample_rate == 0 || self.record_sample_rate == 0 {
            return Err(anyhow::anyhow!("sample rates must be non-zero"));
        }

        if self.playback_buffer_seconds.is_nan() || self.playback_buffer_seconds <= 0.0 {
            return Err(anyhow::anyhow!("playback_buffer_seconds must be positive"));
        }

        if self.chunk_ms == 0 {
            return Err(anyhow::anyhow!("chunk_ms must be at least 1"));
        }

        Ok(())
    }

    pub fn export_padding(&self) -> Padding {
        if self.pad_exports_to_second {
            Padding::WholeSecond
        } else {
            Padding::Frame
        }
    }

    pub fn speech_config(&self) -> SpeechConfig {
        SpeechConfig {
            model: self.speech_model.clone(),
            voice: self.voice.clone(),
            sample_rate: self.speech_sample_rate,
        }
    }

    pub fn transcription_config(&self) -> TranscriptionConfig {
        TranscriptionConfig {
            model: self.transcription_model.clone(),
            prompt: self.whisper_prompt.clone().unwrap_or_default(),
            language: self.language.clone().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.export_padding(), Padding::Frame);
        assert_eq!(config.speech_config().sample_rate, 24000);
        // Stop drains at most this much buffered audio
        assert_eq!(config.playback_buffer_seconds, 5.0);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"voice": "nova", "pad_exports_to_second": true}"#).unwrap();
        assert_eq!(config.voice, "nova");
        assert_eq!(config.chunk_ms, 100);
        assert_eq!(config.export_padding(), Padding::WholeSecond);
    }

    #[test]
    fn test_rejects_bad_values() {
        let config = Config {
            playback_buffer_seconds: 0.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            speech_sample_rate: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            language: Some("en".to_string()),
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.language.as_deref(), Some("en"));
        assert_eq!(loaded.transcription_config().language, "en");
    }
}

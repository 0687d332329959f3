use voicebox::audio::{AudioChunk, AudioFormat, BufferStats, WavSink, wav};
use voicebox::config::Config;
use voicebox::services::{Player, PlayerHandle, Recorder, RecorderHandle, player};
use voicebox::speech;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

/// Chunks allowed in flight between a source and the player
const CHUNK_QUEUE_LEN: usize = 8;

#[derive(Parser)]
#[command(name = "voicebox", version, about = "Speech synthesis, playback and recording")]
struct Cli {
    /// Config file to use instead of ~/.config/voicebox/config.json
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Synthesize text and play it
    Speak {
        text: String,
        /// Also save the synthesized audio as a WAV file
        #[arg(long)]
        save: Option<PathBuf>,
        /// Only save, don't play
        #[arg(long, requires = "save")]
        no_play: bool,
    },
    /// Play a WAV file
    Play {
        file: PathBuf,
        /// Write a copy converted to the recording format
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Record from the microphone until Ctrl+C (or for a fixed time)
    Record {
        #[arg(long)]
        seconds: Option<u64>,
        /// Where to keep the recording
        #[arg(long)]
        out: Option<PathBuf>,
        /// Send the recording to the transcription API
        #[arg(long)]
        transcribe: bool,
    },
    /// Transcribe an audio file
    Transcribe { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.validate()?;

    // LocalSet for !Send futures (Player and Recorder hold cpal::Stream)
    let local = tokio::task::LocalSet::new();

    local
        .run_until(async move { run_command(cli.command, config).await })
        .await
}

async fn run_command(command: Command, config: Config) -> Result<()> {
    match command {
        Command::Speak {
            text,
            save,
            no_play,
        } => speak(&text, save, no_play, &config).await,
        Command::Play { file, export } => play_file(file, export, &config).await,
        Command::Record {
            seconds,
            out,
            transcribe,
        } => record(seconds, out, transcribe, &config).await,
        Command::Transcribe { file } => {
            let client = speech::create_client(&config.api_url, &config.api_key);
            let text =
                speech::transcribe(&file, &client, &config.transcription_config()).await?;
            println!("{}", text);
            Ok(())
        }
    }
}

async fn speak(text: &str, save: Option<PathBuf>, no_play: bool, config: &Config) -> Result<()> {
    let client = speech::create_client(&config.api_url, &config.api_key);
    let speech_config = config.speech_config();
    let format = speech_config.format();

    let pcm = speech::synthesize(text, &client, &speech_config).await?;

    if let Some(path) = &save {
        let bytes = wav::encode_pcm16(&pcm, format, config.export_padding());
        wav::write_file(path, &bytes)?;
    }

    if no_play {
        return Ok(());
    }

    let chunks = speech::pcm_chunks(&pcm, format, config.chunk_ms);
    let player = spawn_player(config);
    let stats = stream_to_player(&player, chunks, None).await?;
    report(&stats);
    Ok(())
}

async fn play_file(file: PathBuf, export: Option<PathBuf>, config: &Config) -> Result<()> {
    let (samples, format) = wav::read_file(&file)?;
    tracing::info!(
        "Playing {:?}: {} Hz, {} channels",
        file,
        format.sample_rate,
        format.channels
    );

    let chunk_len = format
        .samples_for_duration(config.chunk_ms as f32 / 1000.0)
        .max(usize::from(format.channels.max(1)));
    let chunks = samples
        .chunks(chunk_len)
        .map(|block| AudioChunk::float(block.to_vec(), format))
        .collect();

    let player = spawn_player(config);
    let stats = stream_to_player(&player, chunks, export).await?;
    report(&stats);
    Ok(())
}

async fn record(
    seconds: Option<u64>,
    out: Option<PathBuf>,
    transcribe: bool,
    config: &Config,
) -> Result<()> {
    let recorder = spawn_recorder(config);
    recorder.start().await?;

    match seconds {
        Some(seconds) => {
            tracing::info!("Recording for {} seconds (Ctrl+C to stop early)", seconds);
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(seconds)) => {}
                _ = tokio::signal::ctrl_c() => tracing::info!("Received Ctrl+C"),
            }
        }
        None => {
            tracing::info!("Recording, press Ctrl+C to stop");
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl+C")?;
        }
    }

    let temp_file = recorder.stop().await?;
    tracing::info!("Recording saved to: {:?}", temp_file.path());

    if transcribe {
        let client = speech::create_client(&config.api_url, &config.api_key);
        let text =
            speech::transcribe(temp_file.path(), &client, &config.transcription_config()).await?;
        println!("{}", text);
    }

    if let Some(out) = out {
        std::fs::copy(temp_file.path(), &out)
            .with_context(|| format!("Failed to keep recording at {:?}", out))?;
        tracing::info!("Recording kept at {:?}", out);
    }

    Ok(())
}

/// Feed chunks to the player and wait for playback to drain
///
/// The first Ctrl+C stops the source and lets buffered audio finish; a second
/// one abandons the drain.
async fn stream_to_player(
    player: &PlayerHandle,
    chunks: Vec<AudioChunk>,
    export: Option<PathBuf>,
) -> Result<BufferStats> {
    let (chunk_tx, done) = player.play(CHUNK_QUEUE_LEN, export).await?;

    let source = async move {
        for chunk in chunks {
            if chunk_tx.send(chunk).await.is_err() {
                tracing::debug!("Player stopped accepting chunks");
                break;
            }
        }
        // Dropping chunk_tx here signals the end of the stream
    };

    tokio::select! {
        _ = source => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, stopping playback");
            player.stop().await?;
        }
    }

    tokio::select! {
        result = player::wait_for(done) => result,
        _ = tokio::signal::ctrl_c() => Err(anyhow::anyhow!("Interrupted while draining playback")),
    }
}

fn spawn_player(config: &Config) -> PlayerHandle {
    let export_format = AudioFormat::mono(config.record_sample_rate);
    let sink = Box::new(WavSink::new(export_format, config.export_padding()));

    // Spawned with spawn_local because the Player is !Send
    let (player_tx, player_rx) = mpsc::channel(10);
    let player = Player::new(player_rx, config.playback_buffer_seconds, sink);
    tokio::task::spawn_local(player.run());

    PlayerHandle::new(player_tx)
}

fn spawn_recorder(config: &Config) -> RecorderHandle {
    let format = AudioFormat::mono(config.record_sample_rate);
    let sink = Box::new(WavSink::new(format, config.export_padding()));

    // Spawned with spawn_local because the Recorder is !Send
    let (recorder_tx, recorder_rx) = mpsc::channel(10);
    let recorder = Recorder::new(format, recorder_rx, sink);
    tokio::task::spawn_local(recorder.run());

    RecorderHandle::new(recorder_tx)
}

fn report(stats: &BufferStats) {
    tracing::info!(
        "Done: {} samples played, {} underruns, {} dropped",
        stats.played,
        stats.underruns,
        stats.dropped
    );
}

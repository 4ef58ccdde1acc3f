//! Readion (readion) - Main entry point
//!
//! Command line reader: opens a text file or a saved source, reads it aloud
//! and accepts playback commands on stdin while speaking.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use readion_common::config::TomlConfig;
use readion_common::events::{EventBus, ReadionEvent};
use readion_common::text::segment;
use readion_common::time::millis_to_duration;
use readion_common::{SourceKind, TextSource, VoiceSettingsUpdate};
use sqlx::{Pool, Sqlite};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use readion_player::config::PlayerConfig;
use readion_player::db;
use readion_player::playback::{self, PlaybackController, PlaybackHandle, DEFAULT_PROGRESS_INTERVAL};
use readion_player::speech::SynthesisEvent;

/// Command-line arguments for readion
#[derive(Parser, Debug)]
#[command(name = "readion")]
#[command(about = "Read text aloud and remember where you stopped")]
#[command(version)]
struct Args {
    /// SQLite database file (overrides the data folder)
    #[arg(long, env = "READION_DB")]
    db: Option<PathBuf>,

    /// Folder holding the database
    #[arg(long, env = "READION_DATA_FOLDER")]
    data_folder: Option<PathBuf>,

    /// Speech backend: espeak or null
    #[arg(long, env = "READION_BACKEND")]
    backend: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read a text file aloud (saved as a recent source)
    Read {
        file: PathBuf,

        /// Title shown in the source list (defaults to the file name)
        #[arg(long)]
        title: Option<String>,
    },

    /// Read text given on the command line without saving it
    Say {
        text: String,

        /// Sentence to start from
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        from: i64,
    },

    /// Continue a saved source where reading stopped
    Resume { source_id: Uuid },

    /// List recent sources with their saved position
    Sources {
        /// Delete this source and its progress instead of listing
        #[arg(long)]
        delete: Option<Uuid>,
    },

    /// List voices offered by the speech backend
    Voices,

    /// Show or change voice settings
    Settings {
        #[arg(long)]
        rate: Option<f32>,

        #[arg(long)]
        pitch: Option<f32>,

        #[arg(long)]
        volume: Option<f32>,

        /// Voice id (see `readion voices`)
        #[arg(long, conflicts_with = "default_voice")]
        voice: Option<String>,

        /// Go back to the platform default voice
        #[arg(long)]
        default_voice: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml_config = TomlConfig::load_default();

    // Logs go to stderr so stdout carries only the text being read
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                let level = &toml_config.logging.level;
                format!("readion_player={},readion_common={}", level, level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = PlayerConfig::resolve(
        args.db.as_deref(),
        args.data_folder.as_deref(),
        args.backend.as_deref(),
        &toml_config,
    )
    .context("Invalid configuration")?;

    info!("Database: {}", config.db_path.display());
    let pool = readion_common::db::init_database(&config.db_path)
        .await
        .context("Failed to open database")?;

    match args.command {
        Command::Read { file, title } => {
            let content = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let title = title.unwrap_or_else(|| {
                file.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| file.display().to_string())
            });

            let source = TextSource::new(SourceKind::Document, title, content);
            db::sources::save_source(&pool, &source).await?;
            println!("Saved as source {}", source.id);
            read_source(&config, pool, source).await
        }
        Command::Say { text, from } => {
            let (handle, events, task) = start_service(&config, pool).await;
            let sentences = segment(&text);
            handle.play_text(text, None, from).await?;
            interactive(&handle, &events, &sentences).await?;
            finish(handle, task).await
        }
        Command::Resume { source_id } => {
            let Some(source) = db::sources::get_source(&pool, source_id).await? else {
                bail!("No saved source {}", source_id);
            };
            db::sources::save_source(&pool, &source).await?;
            read_source(&config, pool, source).await
        }
        Command::Sources { delete } => {
            if let Some(id) = delete {
                db::sources::delete_source(&pool, id).await?;
                println!("Deleted {}", id);
                return Ok(());
            }
            list_sources(&pool).await
        }
        Command::Voices => list_voices(&config).await,
        Command::Settings {
            rate,
            pitch,
            volume,
            voice,
            default_voice,
        } => {
            let update = VoiceSettingsUpdate {
                rate,
                pitch,
                volume,
                voice: if default_voice { Some(None) } else { voice.map(Some) },
            };
            let current = db::settings::get_voice_settings(&pool).await?;
            let settings = if update.is_empty() {
                current
            } else {
                let merged = update.apply_to(&current);
                db::settings::save_voice_settings(&pool, &merged).await?;
                merged
            };
            println!(
                "rate {}  pitch {}  volume {}  voice {}",
                settings.rate,
                settings.pitch,
                settings.volume,
                settings.voice.as_deref().unwrap_or("(default)")
            );
            Ok(())
        }
    }
}

async fn start_service(
    config: &PlayerConfig,
    pool: Pool<Sqlite>,
) -> (PlaybackHandle, EventBus, tokio::task::JoinHandle<()>) {
    let interval = match db::settings::load_progress_interval(&pool).await {
        Ok(ms) => millis_to_duration(ms),
        Err(e) => {
            warn!("Using default progress interval: {}", e);
            DEFAULT_PROGRESS_INTERVAL
        }
    };

    let events = EventBus::default();
    let controller = PlaybackController::new(config.create_synthesizer(), pool, events.clone()).await;
    let (handle, task) = playback::spawn(controller, interval);
    (handle, events, task)
}

async fn read_source(config: &PlayerConfig, pool: Pool<Sqlite>, source: TextSource) -> Result<()> {
    let sentences = segment(&source.content);
    if sentences.is_empty() {
        println!("'{}' has no sentences to read", source.title);
    }

    let (handle, events, task) = start_service(config, pool).await;
    let position = handle.open_source(source.clone()).await?;
    println!(
        "Reading '{}' from sentence {} of {}",
        source.title,
        position + 1,
        sentences.len()
    );
    handle.play().await?;

    interactive(&handle, &events, &sentences).await?;
    finish(handle, task).await
}

async fn finish(handle: PlaybackHandle, task: tokio::task::JoinHandle<()>) -> Result<()> {
    handle.shutdown().await?;
    task.await.context("Playback service panicked")?;
    info!("Shutdown complete");
    Ok(())
}

const HELP: &str = "commands: p play  a pause  s stop  n next  b back  j <n> jump  \
                    + faster  - slower  i status  q quit";

/// Read commands from stdin and echo sentences as they are spoken
async fn interactive(handle: &PlaybackHandle, events: &EventBus, sentences: &[String]) -> Result<()> {
    let mut rx = events.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    println!("{}", HELP);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match run_command(handle, line.trim()).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) if e.is_persistence() => println!("(progress not saved: {})", e),
                    Err(e) => return Err(e.into()),
                }
            }
            event = rx.recv() => match event {
                Ok(event) => print_event(&event, sentences),
                Err(broadcast::error::RecvError::Lagged(n)) => warn!("Missed {} events", n),
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = &mut shutdown => break,
        }
    }

    Ok(())
}

/// Returns false on quit
async fn run_command(handle: &PlaybackHandle, line: &str) -> readion_player::Result<bool> {
    let mut parts = line.split_whitespace();
    match parts.next() {
        Some("p") => handle.play().await?,
        Some("a") => handle.pause().await?,
        Some("s") => handle.stop().await?,
        Some("n") => {
            handle.skip_forward().await?;
        }
        Some("b") => {
            handle.skip_back().await?;
        }
        Some("j") => match parts.next().and_then(sentence_index) {
            Some(index) => {
                handle.jump(index).await?;
            }
            None => println!("usage: j <sentence number>"),
        },
        Some(step @ ("+" | "-")) => {
            let status = handle.status().await?;
            let delta = if step == "+" { 0.1 } else { -0.1 };
            let settings = handle
                .update_settings(VoiceSettingsUpdate {
                    rate: Some(status.settings.rate + delta),
                    ..VoiceSettingsUpdate::default()
                })
                .await?;
            println!("rate {:.1} (applies from the next sentence jump)", settings.rate);
        }
        Some("i") => {
            let status = handle.status().await?;
            println!(
                "{} at sentence {} of {}",
                status.state,
                status.position + 1,
                status.sentence_count
            );
        }
        Some("q") => return Ok(false),
        Some(_) => println!("{}", HELP),
        None => {}
    }
    Ok(true)
}

/// Parse a 1-based sentence number typed by the user into an index
fn sentence_index(arg: &str) -> Option<i64> {
    arg.parse::<i64>().ok().map(|n| n.saturating_sub(1))
}

fn print_event(event: &ReadionEvent, sentences: &[String]) {
    match event {
        ReadionEvent::PositionChanged { position, sentence_count, .. } => {
            if let Some(sentence) = sentences.get(*position) {
                println!("[{}/{}] {}", position + 1, sentence_count, sentence);
            }
        }
        ReadionEvent::StreamEnded { .. } => println!("(finished)"),
        ReadionEvent::PlaybackStateChanged { new_state, .. } => println!("({})", new_state),
        ReadionEvent::SpeechFailed { message, .. } => {
            println!("(speech stopped: {}; press p to retry)", message)
        }
        ReadionEvent::PersistenceFailed { operation, message, .. } => {
            println!("(could not {}: {})", operation.replace('_', " "), message)
        }
        _ => {}
    }
}

async fn list_sources(pool: &Pool<Sqlite>) -> Result<()> {
    let sources = db::sources::list_sources(pool).await?;
    if sources.is_empty() {
        println!("No saved sources");
        return Ok(());
    }

    for source in sources {
        let total = segment(&source.content).len();
        let position = db::progress::get_progress(pool, source.id)
            .await?
            .map(|p| p.position)
            .unwrap_or(0);
        println!(
            "{}  {:<8}  {}/{}  {}",
            source.id,
            source.kind,
            position.min(total.saturating_sub(1)) + 1,
            total,
            source.title
        );
    }
    Ok(())
}

async fn list_voices(config: &PlayerConfig) -> Result<()> {
    let synthesizer = config.create_synthesizer();
    if !synthesizer.is_available() {
        bail!("Speech backend '{}' is not available", config.backend);
    }

    // Voices may arrive asynchronously after attaching
    let (tx, mut rx) = mpsc::unbounded_channel();
    synthesizer.attach(tx);
    let mut voices = synthesizer.voices();
    if voices.is_empty() {
        let wait = tokio::time::timeout(Duration::from_secs(3), async {
            while let Some(event) = rx.recv().await {
                if event == SynthesisEvent::VoicesChanged {
                    break;
                }
            }
        });
        if wait.await.is_err() {
            warn!("Timed out waiting for voice list");
        }
        voices = synthesizer.voices();
    }

    for voice in voices {
        println!(
            "{:<16} {:<12} {}{}",
            voice.id,
            voice.language,
            voice.name,
            if voice.is_default { " (default)" } else { "" }
        );
    }
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentence_index_is_zero_based() {
        assert_eq!(sentence_index("1"), Some(0));
        assert_eq!(sentence_index("12"), Some(11));
        assert_eq!(sentence_index("0"), Some(-1));
        assert_eq!(sentence_index("x"), None);
    }

    #[test]
    fn test_sentence_index_saturates() {
        assert_eq!(sentence_index("-9223372036854775808"), Some(i64::MIN));
    }
}

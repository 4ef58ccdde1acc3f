//! Playback controller - state machine and persistence glue
//!
//! **Responsibilities:**
//! - Own the Idle / Playing / Paused state and the current position
//! - Route user commands to the speech engine
//! - Apply engine events (position advanced, stream ended, voices changed)
//! - Persist voice settings and reading progress, broadcasting the outcome
//!
//! **State transitions:**
//!
//! | From    | Command / event | To      |
//! |---------|-----------------|---------|
//! | Idle    | play            | Playing |
//! | Playing | pause           | Paused  |
//! | Paused  | resume / play   | Playing |
//! | any     | stop            | Idle    |
//! | Playing | stream ended    | Idle    |
//! | Paused  | stream ended    | Idle    |
//! | Playing | speech failed   | Idle    |
//! | Paused  | speech failed   | Idle    |
//!
//! A paused session can still end: the platform may finish the last
//! sentence before it sees the pause, and that end is honoured. After a
//! speech failure the position is kept so `play` retries the same sentence.
//!
//! Audio and in-memory effects always happen before persistence. A failed
//! write is reported to the caller and on the event bus but never undoes
//! the effect.

use std::sync::Arc;

use readion_common::events::{EventBus, PlaybackState, ReadionEvent};
use readion_common::text::{clamp_position, sentence_count};
use readion_common::{ReadingProgress, TextSource, VoiceInfo, VoiceSettings, VoiceSettingsUpdate};
use sqlx::{Pool, Sqlite};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::db;
use crate::error::Result;
use crate::speech::{EngineEvent, SpeechEngine, SpeechSynthesizer, SynthesisEvent};

/// Text currently loaded for reading
#[derive(Debug, Clone)]
struct OpenText {
    /// None for ad-hoc text with no stored source
    source_id: Option<Uuid>,
    content: String,
    sentence_count: usize,
}

/// Point-in-time view of the controller
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    pub position: usize,
    pub last_reported_position: usize,
    pub sentence_count: usize,
    pub source_id: Option<Uuid>,
    pub settings: VoiceSettings,
    pub voices: Vec<VoiceInfo>,
}

pub struct PlaybackController {
    engine: SpeechEngine,
    engine_rx: mpsc::UnboundedReceiver<EngineEvent>,
    db: Pool<Sqlite>,
    events: EventBus,

    state: PlaybackState,
    position: usize,

    /// Last position an engine boundary event reported; survives stream end
    last_reported_position: usize,

    text: Option<OpenText>,
    settings: VoiceSettings,
    voices: Vec<VoiceInfo>,
}

impl PlaybackController {
    /// Create a controller over `synthesizer`
    ///
    /// Stored voice settings are loaded here. If that read fails the
    /// defaults are used and a `PersistenceFailed` event is emitted.
    pub async fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        db: Pool<Sqlite>,
        events: EventBus,
    ) -> Self {
        let (engine_tx, engine_rx) = mpsc::unbounded_channel();
        let engine = SpeechEngine::new(synthesizer, Box::new(engine_tx));

        let settings = match db::settings::get_voice_settings(&db).await {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to load voice settings, using defaults: {}", e);
                events.emit_lossy(ReadionEvent::PersistenceFailed {
                    operation: "load_settings".to_string(),
                    message: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                VoiceSettings::default()
            }
        };

        let voices = engine.voices();

        Self {
            engine,
            engine_rx,
            db,
            events,
            state: PlaybackState::Idle,
            position: 0,
            last_reported_position: 0,
            text: None,
            settings,
            voices,
        }
    }

    /// Take the platform event receiver for the owner's event loop
    pub fn take_synthesis_events(&mut self) -> Option<mpsc::UnboundedReceiver<SynthesisEvent>> {
        self.engine.take_synthesis_events()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn last_reported_position(&self) -> usize {
        self.last_reported_position
    }

    pub fn settings(&self) -> &VoiceSettings {
        &self.settings
    }

    pub fn voices(&self) -> &[VoiceInfo] {
        &self.voices
    }

    pub fn source_id(&self) -> Option<Uuid> {
        self.text.as_ref().and_then(|t| t.source_id)
    }

    pub fn sentence_count(&self) -> usize {
        self.text.as_ref().map(|t| t.sentence_count).unwrap_or(0)
    }

    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            state: self.state,
            position: self.position,
            last_reported_position: self.last_reported_position,
            sentence_count: self.sentence_count(),
            source_id: self.source_id(),
            settings: self.settings.clone(),
            voices: self.voices.clone(),
        }
    }

    /// Load a stored source and restore its saved position
    ///
    /// Playback of any previous text stops. The saved position is clamped
    /// against the source's current sentence count. Returns the restored
    /// position.
    pub async fn open_source(&mut self, source: &TextSource) -> Result<usize> {
        self.stop();

        let count = sentence_count(&source.content);
        self.text = Some(OpenText {
            source_id: Some(source.id),
            content: source.content.clone(),
            sentence_count: count,
        });
        self.position = 0;
        self.last_reported_position = 0;

        let saved = match db::progress::get_progress(&self.db, source.id).await {
            Ok(saved) => saved,
            Err(e) => {
                self.report_persistence_failure("load_progress", &e);
                self.emit_position();
                return Err(e);
            }
        };

        if let Some(progress) = saved {
            let requested = i64::try_from(progress.position).unwrap_or(i64::MAX);
            self.position = clamp_position(requested, count);
            info!(
                "Restored '{}' at sentence {} of {}",
                source.title, self.position, count
            );
        } else {
            info!("Opened '{}' ({} sentences)", source.title, count);
        }

        self.emit_position();
        Ok(self.position)
    }

    /// Start (or resume) reading the open text
    ///
    /// Paused: resumes. Otherwise speaks from the current position.
    pub async fn play(&mut self) -> Result<()> {
        if self.state == PlaybackState::Paused {
            self.resume();
            return Ok(());
        }

        let Some(text) = self.text.clone() else {
            warn!("Play ignored: no text loaded");
            return Ok(());
        };

        self.start_speaking(&text.content, self.position).await
    }

    /// Load ad-hoc text (or a source's content) and speak from `position`
    pub async fn play_text(
        &mut self,
        content: impl Into<String>,
        source_id: Option<Uuid>,
        position: i64,
    ) -> Result<()> {
        let content = content.into();
        let count = sentence_count(&content);

        self.stop();
        self.text = Some(OpenText {
            source_id,
            content: content.clone(),
            sentence_count: count,
        });
        self.position = clamp_position(position, count);
        self.last_reported_position = self.position;

        self.start_speaking(&content, self.position).await
    }

    pub async fn pause(&mut self) -> Result<()> {
        if self.state != PlaybackState::Playing {
            debug!("Pause ignored in state {}", self.state);
            return Ok(());
        }

        self.engine.pause();
        self.set_state(PlaybackState::Paused);
        self.persist_progress().await
    }

    pub fn resume(&mut self) {
        if self.state != PlaybackState::Paused {
            debug!("Resume ignored in state {}", self.state);
            return;
        }

        self.engine.resume();
        self.set_state(PlaybackState::Playing);
    }

    /// Stop reading and rewind to the first sentence
    ///
    /// The text stays loaded. Idempotent.
    pub fn stop(&mut self) {
        self.engine.stop();
        // Nothing queued by the cancelled session may leak into the next one
        while self.engine_rx.try_recv().is_ok() {}

        self.set_state(PlaybackState::Idle);
        if self.position != 0 {
            self.position = 0;
            self.emit_position();
        }
    }

    /// Jump to a sentence, clamped into range
    ///
    /// In Idle only the position changes. The new position is persisted.
    /// Returns the clamped position.
    pub async fn jump(&mut self, position: i64) -> Result<usize> {
        if self.text.is_none() {
            warn!("Jump ignored: no text loaded");
            return Ok(self.position);
        }

        let target = if self.engine.is_active() {
            self.engine.jump_to_position(position)
        } else {
            clamp_position(position, self.sentence_count())
        };

        self.position = target;
        self.emit_position();
        self.process_engine_events().await?;
        self.persist_progress().await?;
        Ok(target)
    }

    /// Step one sentence forward (stays on the last sentence)
    pub async fn skip_forward(&mut self) -> Result<usize> {
        let target = i64::try_from(self.position).unwrap_or(i64::MAX).saturating_add(1);
        self.jump(target).await
    }

    /// Step one sentence back (stays on the first sentence)
    pub async fn skip_back(&mut self) -> Result<usize> {
        let target = i64::try_from(self.position).unwrap_or(i64::MAX) - 1;
        self.jump(target).await
    }

    /// Merge a partial settings update and persist the result
    ///
    /// Takes effect on the next speak or jump; a live utterance is not
    /// restarted. Returns the merged settings even when saving fails
    /// (available through `settings()`).
    pub async fn update_settings(&mut self, update: &VoiceSettingsUpdate) -> Result<VoiceSettings> {
        let merged = update.apply_to(&self.settings);
        if merged == self.settings {
            return Ok(merged);
        }

        self.settings = merged.clone();
        info!(
            "Voice settings: rate={} pitch={} volume={} voice={}",
            merged.rate,
            merged.pitch,
            merged.volume,
            merged.voice.as_deref().unwrap_or("default")
        );
        self.events.emit_lossy(ReadionEvent::SettingsChanged {
            settings: merged.clone(),
            timestamp: chrono::Utc::now(),
        });

        if let Err(e) = db::settings::save_voice_settings(&self.db, &merged).await {
            self.report_persistence_failure("save_settings", &e);
            return Err(e);
        }

        Ok(merged)
    }

    /// Save the current position for the open source
    ///
    /// No-op for ad-hoc text.
    pub async fn persist_progress(&mut self) -> Result<()> {
        let Some(source_id) = self.source_id() else {
            return Ok(());
        };
        self.save_progress(source_id, self.position).await
    }

    /// Periodic save while playing
    ///
    /// A tick that arrives after playback left Playing is ignored.
    pub async fn on_progress_tick(&mut self) -> Result<()> {
        if self.state != PlaybackState::Playing {
            return Ok(());
        }
        self.persist_progress().await
    }

    /// Feed a platform event through the engine and apply the outcome
    pub async fn handle_synthesis_event(&mut self, event: SynthesisEvent) -> Result<()> {
        self.engine.handle_synthesis_event(event);
        self.process_engine_events().await
    }

    /// Stop speech before the process exits
    pub async fn shutdown(&mut self) {
        if self.state != PlaybackState::Idle {
            if let Err(e) = self.persist_progress().await {
                warn!("Failed to save progress on shutdown: {}", e);
            }
        }
        self.stop();
    }

    async fn start_speaking(&mut self, content: &str, position: usize) -> Result<()> {
        if !self.engine.is_available() {
            warn!("Play ignored: speech synthesis unavailable");
            return Ok(());
        }

        self.engine.speak(content, &self.settings, position);
        self.position = self.engine.position();
        self.set_state(PlaybackState::Playing);
        self.emit_position();
        self.process_engine_events().await
    }

    /// Apply everything the engine reported since the last call
    async fn process_engine_events(&mut self) -> Result<()> {
        let mut result = Ok(());

        while let Ok(event) = self.engine_rx.try_recv() {
            match event {
                EngineEvent::PositionAdvanced(position) => {
                    if self.state == PlaybackState::Idle {
                        continue;
                    }
                    self.position = position;
                    self.last_reported_position = position;
                    self.emit_position();
                }
                EngineEvent::StreamEnded => {
                    if let Err(e) = self.on_stream_ended().await {
                        result = Err(e);
                    }
                }
                EngineEvent::SpeechFailed(message) => {
                    if let Err(e) = self.on_speech_failed(message).await {
                        result = Err(e);
                    }
                }
                EngineEvent::VoicesChanged(voices) => {
                    self.voices = voices.clone();
                    self.events.emit_lossy(ReadionEvent::VoicesChanged {
                        voices,
                        timestamp: chrono::Utc::now(),
                    });
                }
            }
        }

        result
    }

    /// Reading finished: back to Idle at sentence 0
    ///
    /// Saved progress rewinds too, so reopening starts from the top.
    async fn on_stream_ended(&mut self) -> Result<()> {
        if self.state == PlaybackState::Idle {
            return Ok(());
        }

        let last_position = self.position;
        self.last_reported_position = last_position;
        info!("Finished reading at sentence {}", last_position);

        self.events.emit_lossy(ReadionEvent::StreamEnded {
            source_id: self.source_id(),
            last_position,
            timestamp: chrono::Utc::now(),
        });
        self.set_state(PlaybackState::Idle);
        self.position = 0;
        self.emit_position();

        match self.source_id() {
            Some(source_id) => self.save_progress(source_id, 0).await,
            None => Ok(()),
        }
    }

    /// The synthesizer gave up: back to Idle, position kept and saved
    async fn on_speech_failed(&mut self, message: String) -> Result<()> {
        if self.state == PlaybackState::Idle {
            return Ok(());
        }

        error!("Speech failed at sentence {}: {}", self.position, message);
        self.events.emit_lossy(ReadionEvent::SpeechFailed {
            source_id: self.source_id(),
            position: self.position,
            message,
            timestamp: chrono::Utc::now(),
        });
        self.set_state(PlaybackState::Idle);
        self.persist_progress().await
    }

    async fn save_progress(&mut self, source_id: Uuid, position: usize) -> Result<()> {
        let progress = ReadingProgress::new(source_id, position);
        match db::progress::save_progress(&self.db, &progress).await {
            Ok(()) => {
                debug!("Saved progress {} for {}", position, source_id);
                self.events.emit_lossy(ReadionEvent::ProgressSaved {
                    source_id,
                    position,
                    timestamp: chrono::Utc::now(),
                });
                Ok(())
            }
            Err(e) => {
                self.report_persistence_failure("save_progress", &e);
                Err(e)
            }
        }
    }

    fn set_state(&mut self, new_state: PlaybackState) {
        if self.state == new_state {
            return;
        }

        let old_state = self.state;
        self.state = new_state;
        info!("Playback state: {} -> {}", old_state, new_state);
        self.events.emit_lossy(ReadionEvent::PlaybackStateChanged {
            old_state,
            new_state,
            timestamp: chrono::Utc::now(),
        });
    }

    fn emit_position(&self) {
        self.events.emit_lossy(ReadionEvent::PositionChanged {
            source_id: self.source_id(),
            position: self.position,
            sentence_count: self.sentence_count(),
            timestamp: chrono::Utc::now(),
        });
    }

    fn report_persistence_failure(&self, operation: &str, e: &crate::error::Error) {
        error!("Persistence failed ({}): {}", operation, e);
        self.events.emit_lossy(ReadionEvent::PersistenceFailed {
            operation: operation.to_string(),
            message: e.to_string(),
            timestamp: chrono::Utc::now(),
        });
    }
}

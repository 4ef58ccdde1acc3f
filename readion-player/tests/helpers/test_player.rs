//! Controller test fixture
//!
//! Builds a `PlaybackController` on a `RecordingSynthesizer` and a private
//! in-memory database. No audio is produced; the test fires boundary and
//! end events itself.

use std::sync::Arc;

use readion_common::db::init_memory_database;
use readion_common::events::{EventBus, ReadionEvent};
use readion_common::{SourceKind, TextSource, VoiceInfo};
use readion_player::playback::PlaybackController;
use readion_player::speech::{RecordingSynthesizer, SynthesisEvent};
use sqlx::SqlitePool;
use tokio::sync::broadcast;

pub struct TestPlayer {
    pub controller: PlaybackController,
    pub synthesizer: RecordingSynthesizer,
    pub db: SqlitePool,
    pub events: broadcast::Receiver<ReadionEvent>,
}

impl TestPlayer {
    pub async fn new() -> Self {
        Self::with_synthesizer(RecordingSynthesizer::new()).await
    }

    pub async fn with_synthesizer(synthesizer: RecordingSynthesizer) -> Self {
        let db = init_memory_database().await.expect("Failed to create database");
        Self::with_database(synthesizer, db).await
    }

    pub async fn with_database(synthesizer: RecordingSynthesizer, db: SqlitePool) -> Self {
        let bus = EventBus::new(256);
        let events = bus.subscribe();
        let controller =
            PlaybackController::new(Arc::new(synthesizer.clone()), db.clone(), bus).await;

        Self {
            controller,
            synthesizer,
            db,
            events,
        }
    }

    /// Create a source and open it in the controller
    pub async fn open(&mut self, content: &str) -> TextSource {
        let source = TextSource::new(SourceKind::Manual, "test", content);
        self.controller
            .open_source(&source)
            .await
            .expect("Failed to open source");
        source
    }

    /// Fire a boundary for the live utterance and let the controller apply it
    pub async fn boundary(&mut self) {
        let utterance_id = self
            .synthesizer
            .current_id()
            .expect("No utterance is being spoken");
        self.controller
            .handle_synthesis_event(SynthesisEvent::SentenceBoundary { utterance_id })
            .await
            .expect("Boundary handling failed");
    }

    /// End the live utterance and let the controller apply it
    pub async fn end(&mut self) {
        let utterance_id = self
            .synthesizer
            .current_id()
            .expect("No utterance is being spoken");
        self.controller
            .handle_synthesis_event(SynthesisEvent::Ended { utterance_id })
            .await
            .expect("End handling failed");
    }

    pub fn drain_events(&mut self) -> Vec<ReadionEvent> {
        drain_events(&mut self.events)
    }
}

/// Everything currently queued on the receiver
pub fn drain_events(rx: &mut broadcast::Receiver<ReadionEvent>) -> Vec<ReadionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn sample_voices() -> Vec<VoiceInfo> {
    vec![
        VoiceInfo {
            id: "en-us".to_string(),
            name: "English (America)".to_string(),
            language: "en-us".to_string(),
            is_default: true,
        },
        VoiceInfo {
            id: "de".to_string(),
            name: "German".to_string(),
            language: "de".to_string(),
            is_default: false,
        },
    ]
}

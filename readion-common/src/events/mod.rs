//! Event types for the Readion event system
//!
//! Provides shared event definitions and the EventBus used to fan playback
//! notifications out to the rest of the application.

mod playback_types;

pub use playback_types::PlaybackState;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

use crate::models::{VoiceInfo, VoiceSettings};

/// Readion event types
///
/// Events are broadcast via EventBus and can be serialized for display or
/// logging. All events carry a UTC timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ReadionEvent {
    /// Playback state changed (Idle / Playing / Paused)
    PlaybackStateChanged {
        /// Playback state before change
        old_state: PlaybackState,
        /// Playback state after change
        new_state: PlaybackState,
        /// When state changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Current sentence changed
    ///
    /// Emitted for engine boundary events, jumps and skips.
    PositionChanged {
        /// Source being read (None for ad-hoc text)
        source_id: Option<Uuid>,
        /// New sentence index
        position: usize,
        /// Number of sentences in the text
        sentence_count: usize,
        /// When the position changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The text was read to its end
    ///
    /// Not emitted for stop or for utterances cancelled by a restart.
    StreamEnded {
        /// Source that finished (None for ad-hoc text)
        source_id: Option<Uuid>,
        /// Last sentence index reported before the session ended
        last_position: usize,
        /// When playback ended
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Voice settings were replaced
    SettingsChanged {
        /// Settings now in effect for the next utterance
        settings: VoiceSettings,
        /// When settings changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Synthesizer voice list changed
    ///
    /// May fire any number of times; the list can be empty at first.
    VoicesChanged {
        /// Currently enumerated voices
        voices: Vec<VoiceInfo>,
        /// When the list was refreshed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Reading progress was written to the store
    ProgressSaved {
        /// Source the progress belongs to
        source_id: Uuid,
        /// Saved sentence index
        position: usize,
        /// When progress was saved
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The synthesizer abandoned the session before the end of the text
    ///
    /// Playback is back in Idle with the position kept, so `play` picks
    /// up at the sentence that failed.
    SpeechFailed {
        /// Source being read (None for ad-hoc text)
        source_id: Option<Uuid>,
        /// Sentence index playback stopped at
        position: usize,
        /// Synthesizer error text
        message: String,
        /// When the failure was reported
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A write to the store failed; playback continued regardless
    PersistenceFailed {
        /// What was being persisted ("progress", "settings", ...)
        operation: String,
        /// Error text
        message: String,
        /// When the failure happened
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl ReadionEvent {
    /// Event type name, matching the serde tag
    pub fn event_type(&self) -> &'static str {
        match self {
            ReadionEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            ReadionEvent::PositionChanged { .. } => "PositionChanged",
            ReadionEvent::StreamEnded { .. } => "StreamEnded",
            ReadionEvent::SettingsChanged { .. } => "SettingsChanged",
            ReadionEvent::VoicesChanged { .. } => "VoicesChanged",
            ReadionEvent::ProgressSaved { .. } => "ProgressSaved",
            ReadionEvent::SpeechFailed { .. } => "SpeechFailed",
            ReadionEvent::PersistenceFailed { .. } => "PersistenceFailed",
        }
    }
}

/// Fans `ReadionEvent`s out to every interested listener
///
/// Backed by `tokio::sync::broadcast`: emitting never waits on a listener,
/// and a listener that falls more than `capacity` events behind sees
/// `RecvError::Lagged` instead of stalling the controller.
///
/// ```
/// use readion_common::events::{EventBus, ReadionEvent};
///
/// let bus = EventBus::new(16);
/// let mut rx = bus.subscribe();
///
/// bus.emit_lossy(ReadionEvent::ProgressSaved {
///     source_id: uuid::Uuid::new_v4(),
///     position: 2,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ReadionEvent>,
}

impl EventBus {
    /// `capacity` bounds how far a listener may fall behind
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Listen from now on; earlier events are not replayed
    pub fn subscribe(&self) -> broadcast::Receiver<ReadionEvent> {
        self.tx.subscribe()
    }

    /// Broadcast `event`, returning how many listeners received it
    ///
    /// Fails only when nobody is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ReadionEvent,
    ) -> Result<usize, broadcast::error::SendError<ReadionEvent>> {
        self.tx.send(event)
    }

    /// Broadcast `event` whether or not anyone is listening
    pub fn emit_lossy(&self, event: ReadionEvent) {
        if let Err(broadcast::error::SendError(event)) = self.emit(event) {
            trace!("No listeners for {}", event.event_type());
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_is_err() {
        let bus = EventBus::new(10);
        let result = bus.emit(ReadionEvent::ProgressSaved {
            source_id: Uuid::new_v4(),
            position: 3,
            timestamp: chrono::Utc::now(),
        });
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        bus.emit_lossy(ReadionEvent::PositionChanged {
            source_id: None,
            position: 2,
            sentence_count: 5,
            timestamp: chrono::Utc::now(),
        });

        match rx.recv().await.unwrap() {
            ReadionEvent::PositionChanged { position, sentence_count, .. } => {
                assert_eq!(position, 2);
                assert_eq!(sentence_count, 5);
            }
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = ReadionEvent::StreamEnded {
            source_id: None,
            last_position: 2,
            timestamp: chrono::Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "StreamEnded");
        assert_eq!(json["last_position"], 2);
        assert_eq!(event.event_type(), "StreamEnded");
    }

    #[test]
    fn test_emit_counts_listeners() {
        let bus = EventBus::default();
        let _first = bus.subscribe();
        let _second = bus.subscribe();

        let delivered = bus
            .emit(ReadionEvent::SpeechFailed {
                source_id: None,
                position: 1,
                message: "exited with 1".to_string(),
                timestamp: chrono::Utc::now(),
            })
            .unwrap();
        assert_eq!(delivered, 2);
    }

    #[test]
    fn test_emit_lossy_without_listeners_is_silent() {
        let bus = EventBus::new(4);
        bus.emit_lossy(ReadionEvent::ProgressSaved {
            source_id: Uuid::new_v4(),
            position: 0,
            timestamp: chrono::Utc::now(),
        });
    }
}

//! Speech events (not exposed on the EventBus)
//!
//! Two layers of events flow upward:
//! - `SynthesisEvent`: what the platform reports, relative to one utterance
//! - `EngineEvent`: what the engine reports, in absolute sentence indices
//!
//! The controller converts engine events to `ReadionEvent`s before
//! broadcasting.

use readion_common::VoiceInfo;
use tokio::sync::mpsc;

use super::synthesizer::UtteranceId;

/// Platform notifications for submitted utterances
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisEvent {
    /// Playback crossed a sentence boundary inside the utterance
    SentenceBoundary { utterance_id: UtteranceId },

    /// The utterance played to completion
    ///
    /// Backends must not send this for cancelled utterances; the engine
    /// also ignores it for any utterance that is no longer live.
    Ended { utterance_id: UtteranceId },

    /// The platform gave up on the utterance and will send nothing more
    /// for it
    Failed {
        utterance_id: UtteranceId,
        message: String,
    },

    /// The platform voice list changed (may fire any number of times)
    VoicesChanged,
}

/// Channel handed to a synthesizer for its events
pub type SynthesisEventSender = mpsc::UnboundedSender<SynthesisEvent>;

/// Engine notifications in absolute sentence positions
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Reading moved to this sentence index
    PositionAdvanced(usize),

    /// The session read to the end of the text
    StreamEnded,

    /// The platform dropped the session before the end of the text
    SpeechFailed(String),

    /// Freshly enumerated voice list
    VoicesChanged(Vec<VoiceInfo>),
}

/// Callbacks registered once when the engine is constructed
pub trait EngineListener: Send {
    /// Called once per sentence boundary crossed, with the new absolute index
    fn on_position_advanced(&self, position: usize);

    /// Called exactly once when a session plays to its end
    fn on_stream_ended(&self);

    /// Called when the platform abandons the session; never followed by
    /// `on_stream_ended` for it
    fn on_speech_failed(&self, message: &str);

    /// Called when the synthesizer reports a new voice list
    fn on_voices_changed(&self, _voices: &[VoiceInfo]) {}
}

/// Forward engine callbacks into a channel for the controller to drain
impl EngineListener for mpsc::UnboundedSender<EngineEvent> {
    fn on_position_advanced(&self, position: usize) {
        // Ignore send errors (controller gone is OK during shutdown)
        let _ = self.send(EngineEvent::PositionAdvanced(position));
    }

    fn on_stream_ended(&self) {
        let _ = self.send(EngineEvent::StreamEnded);
    }

    fn on_speech_failed(&self, message: &str) {
        let _ = self.send(EngineEvent::SpeechFailed(message.to_string()));
    }

    fn on_voices_changed(&self, voices: &[VoiceInfo]) {
        let _ = self.send(EngineEvent::VoicesChanged(voices.to_vec()));
    }
}

//! In-memory synthesizer that records every call
//!
//! Produces no audio. Events are only sent when the owner fires them, which
//! makes the boundary/end sequence fully scripted. Used by tests and by
//! headless runs that only need position bookkeeping.

use std::sync::{Arc, Mutex, MutexGuard};

use readion_common::VoiceInfo;

use super::events::{SynthesisEvent, SynthesisEventSender};
use super::synthesizer::{SpeechSynthesizer, Utterance, UtteranceId};

/// One recorded call
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesizerCall {
    Speak(Utterance),
    Cancel,
    Pause,
    Resume,
}

#[derive(Debug, Default)]
struct RecordingState {
    calls: Vec<SynthesizerCall>,
    voices: Vec<VoiceInfo>,
    events: Option<SynthesisEventSender>,
    current: Option<Utterance>,
    paused: bool,
}

/// Cloneable handle; clones share the same recording
#[derive(Debug, Clone, Default)]
pub struct RecordingSynthesizer {
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a fixed voice list
    pub fn with_voices(voices: Vec<VoiceInfo>) -> Self {
        let synthesizer = Self::new();
        synthesizer.lock().voices = voices;
        synthesizer
    }

    fn lock(&self) -> MutexGuard<'_, RecordingState> {
        // A poisoned recording is still readable
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// All calls so far, oldest first
    pub fn calls(&self) -> Vec<SynthesizerCall> {
        self.lock().calls.clone()
    }

    /// Every utterance passed to `speak`, oldest first
    pub fn spoken(&self) -> Vec<Utterance> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                SynthesizerCall::Speak(utterance) => Some(utterance.clone()),
                _ => None,
            })
            .collect()
    }

    /// The utterance currently held by the platform
    pub fn current(&self) -> Option<Utterance> {
        self.lock().current.clone()
    }

    pub fn current_id(&self) -> Option<UtteranceId> {
        self.lock().current.as_ref().map(|u| u.id)
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Replace the voice list and announce the change
    pub fn set_voices(&self, voices: Vec<VoiceInfo>) {
        let mut state = self.lock();
        state.voices = voices;
        if let Some(events) = &state.events {
            let _ = events.send(SynthesisEvent::VoicesChanged);
        }
    }

    /// Send an event through the attached channel
    ///
    /// Returns false if nothing is attached or the receiver is gone.
    pub fn fire(&self, event: SynthesisEvent) -> bool {
        match &self.lock().events {
            Some(events) => events.send(event).is_ok(),
            None => false,
        }
    }

    /// Fire a sentence boundary for the current utterance
    pub fn fire_boundary(&self) -> bool {
        match self.current_id() {
            Some(utterance_id) => self.fire(SynthesisEvent::SentenceBoundary { utterance_id }),
            None => false,
        }
    }

    /// Finish the current utterance and fire its end event
    pub fn fire_end(&self) -> bool {
        let finished = {
            let mut state = self.lock();
            state.paused = false;
            state.current.take()
        };
        match finished {
            Some(utterance) => self.fire(SynthesisEvent::Ended {
                utterance_id: utterance.id,
            }),
            None => false,
        }
    }

    /// Drop the current utterance and report it as failed
    pub fn fire_failure(&self, message: &str) -> bool {
        let failed = {
            let mut state = self.lock();
            state.paused = false;
            state.current.take()
        };
        match failed {
            Some(utterance) => self.fire(SynthesisEvent::Failed {
                utterance_id: utterance.id,
                message: message.to_string(),
            }),
            None => false,
        }
    }
}

impl SpeechSynthesizer for RecordingSynthesizer {
    fn attach(&self, events: SynthesisEventSender) {
        self.lock().events = Some(events);
    }

    fn voices(&self) -> Vec<VoiceInfo> {
        self.lock().voices.clone()
    }

    fn speak(&self, utterance: Utterance) {
        let mut state = self.lock();
        state.calls.push(SynthesizerCall::Speak(utterance.clone()));
        state.current = Some(utterance);
        state.paused = false;
    }

    fn cancel(&self) {
        let mut state = self.lock();
        state.calls.push(SynthesizerCall::Cancel);
        state.current = None;
        state.paused = false;
    }

    fn pause(&self) {
        let mut state = self.lock();
        state.calls.push(SynthesizerCall::Pause);
        if state.current.is_some() {
            state.paused = true;
        }
    }

    fn resume(&self) {
        let mut state = self.lock();
        state.calls.push(SynthesizerCall::Resume);
        state.paused = false;
    }

    fn is_speaking(&self) -> bool {
        self.lock().current.is_some()
    }

    fn is_paused(&self) -> bool {
        self.lock().paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use readion_common::VoiceSettings;
    use tokio::sync::mpsc;

    fn utterance(id: UtteranceId) -> Utterance {
        Utterance::new(id, &["A".to_string()], 0, &VoiceSettings::default(), None)
    }

    #[test]
    fn test_records_calls_and_tracks_current() {
        let synthesizer = RecordingSynthesizer::new();

        synthesizer.speak(utterance(1));
        assert!(synthesizer.is_speaking());
        synthesizer.pause();
        assert!(synthesizer.is_paused());
        synthesizer.cancel();

        assert!(!synthesizer.is_speaking());
        assert!(!synthesizer.is_paused());
        assert_eq!(synthesizer.calls().len(), 3);
        assert_eq!(synthesizer.spoken()[0].id, 1);
    }

    #[test]
    fn test_fire_end_sends_event_for_current() {
        let synthesizer = RecordingSynthesizer::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        synthesizer.attach(tx);

        synthesizer.speak(utterance(7));
        assert!(synthesizer.fire_boundary());
        assert!(synthesizer.fire_end());
        assert!(!synthesizer.fire_end());

        assert_eq!(
            rx.try_recv().unwrap(),
            SynthesisEvent::SentenceBoundary { utterance_id: 7 }
        );
        assert_eq!(rx.try_recv().unwrap(), SynthesisEvent::Ended { utterance_id: 7 });
    }

    #[test]
    fn test_fire_failure_clears_current() {
        let synthesizer = RecordingSynthesizer::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        synthesizer.attach(tx);

        synthesizer.speak(utterance(4));
        assert!(synthesizer.fire_failure("device lost"));

        assert!(!synthesizer.is_speaking());
        assert_eq!(
            rx.try_recv().unwrap(),
            SynthesisEvent::Failed {
                utterance_id: 4,
                message: "device lost".to_string()
            }
        );
    }
}

//! Speech engine - one speaking session over segmented text
//!
//! **Responsibilities:**
//! - Segment text and submit the remainder from a start sentence
//! - Translate platform boundary events into absolute sentence positions
//! - Pause, resume, jump and stop the live session
//! - Resolve the configured voice id against the platform voice list
//!
//! The engine keeps no playback state beyond the live session. State
//! transitions (Idle / Playing / Paused) belong to the controller.

use std::sync::Arc;

use readion_common::text::{clamp_position, segment};
use readion_common::{VoiceInfo, VoiceSettings};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::events::{EngineListener, SynthesisEvent};
use super::synthesizer::{SpeechSynthesizer, Utterance, UtteranceId};

/// The live speaking session
#[derive(Debug)]
struct Session {
    /// Sentence index the live utterance started at
    start_position: usize,

    /// Boundary events received for the live utterance
    boundaries_crossed: usize,

    /// Last utterance handed to the platform (source of live parameters)
    utterance: Utterance,

    /// Utterance whose events are accepted; None while a restart is pending
    live_id: Option<UtteranceId>,

    paused: bool,

    /// Jump happened while paused; resume resubmits from `position`
    restart_pending: bool,
}

/// Sentence-tracking wrapper over a platform synthesizer
pub struct SpeechEngine {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    listener: Box<dyn EngineListener>,

    /// Segmentation of the most recently spoken text
    sentences: Vec<String>,

    /// Current absolute sentence index
    position: usize,

    session: Option<Session>,
    next_utterance_id: UtteranceId,

    /// Taken once by whoever drives `handle_synthesis_event`
    synthesis_rx: Option<mpsc::UnboundedReceiver<SynthesisEvent>>,
}

impl SpeechEngine {
    /// Create an engine and attach to the synthesizer's event stream
    ///
    /// The listener is registered once here; there is no way to replace it.
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, listener: Box<dyn EngineListener>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        synthesizer.attach(tx);

        if !synthesizer.is_available() {
            warn!("Speech synthesis unavailable on this platform; playback commands will be ignored");
        }

        Self {
            synthesizer,
            listener,
            sentences: Vec::new(),
            position: 0,
            session: None,
            next_utterance_id: 1,
            synthesis_rx: Some(rx),
        }
    }

    /// Take the synthesis event receiver (only once)
    pub fn take_synthesis_events(&mut self) -> Option<mpsc::UnboundedReceiver<SynthesisEvent>> {
        self.synthesis_rx.take()
    }

    pub fn is_available(&self) -> bool {
        self.synthesizer.is_available()
    }

    /// Current absolute sentence index
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn sentence_count(&self) -> usize {
        self.sentences.len()
    }

    /// True while a session exists (playing or paused)
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.session.as_ref().map(|s| s.paused).unwrap_or(false)
    }

    /// Parameters of the live utterance, if any
    pub fn live_settings(&self) -> Option<VoiceSettings> {
        self.session.as_ref().map(|s| s.utterance.settings())
    }

    /// Voices the platform currently offers
    pub fn voices(&self) -> Vec<VoiceInfo> {
        self.synthesizer.voices()
    }

    /// Speak `text` from sentence `start_position`
    ///
    /// Any session in progress is cancelled first. A start past the end is
    /// clamped to the last sentence. Text without sentences ends the stream
    /// immediately.
    pub fn speak(&mut self, text: &str, settings: &VoiceSettings, start_position: usize) {
        self.cancel_session();

        self.sentences = segment(text);
        if self.sentences.is_empty() {
            info!("No sentences to speak");
            self.position = 0;
            self.listener.on_stream_ended();
            return;
        }

        if !self.synthesizer.is_available() {
            warn!("Cannot speak: speech synthesis unavailable");
            self.position = start_position.min(self.sentences.len() - 1);
            return;
        }

        let start = start_position.min(self.sentences.len() - 1);
        let voice = self.resolve_voice(settings.voice.as_deref());
        let id = self.next_id();
        let utterance = Utterance::new(id, &self.sentences, start, settings, voice);

        info!(
            "Speaking from sentence {} of {} (utterance {})",
            start,
            self.sentences.len(),
            id
        );
        self.position = start;
        self.submit(start, utterance);
    }

    /// Pause the live session; no-op when not speaking
    pub fn pause(&mut self) {
        let Some(session) = self.session.as_mut() else {
            debug!("Pause ignored: no session");
            return;
        };
        if session.paused {
            return;
        }

        if self.synthesizer.is_speaking() {
            self.synthesizer.pause();
        }
        session.paused = true;
        debug!("Paused at sentence {}", self.position);
    }

    /// Resume a paused session; no-op when not paused
    ///
    /// If a jump happened while paused, speech restarts from the jump
    /// target instead of the pause point.
    pub fn resume(&mut self) {
        let Some(session) = self.session.as_mut() else {
            debug!("Resume ignored: no session");
            return;
        };
        if !session.paused {
            return;
        }

        if session.restart_pending {
            let id = self.next_utterance_id;
            self.next_utterance_id += 1;
            let restarted = session.utterance.respeak(id, &self.sentences, self.position);
            debug!("Resuming at jump target {}", self.position);
            self.submit(self.position, restarted);
        } else {
            if self.synthesizer.is_paused() {
                self.synthesizer.resume();
            }
            session.paused = false;
            debug!("Resumed at sentence {}", self.position);
        }
    }

    /// Move to sentence `position`, clamped into range
    ///
    /// - No session: the position is only recorded
    /// - Paused: the utterance is cancelled and restarts on resume
    /// - Playing: speech restarts at once with the live utterance's
    ///   parameters
    ///
    /// Returns the clamped position.
    pub fn jump_to_position(&mut self, position: i64) -> usize {
        let target = clamp_position(position, self.sentences.len());
        self.position = target;

        let Some(session) = self.session.as_mut() else {
            debug!("Jump to {} recorded (no session)", target);
            return target;
        };

        if session.paused {
            self.synthesizer.cancel();
            session.live_id = None;
            session.restart_pending = true;
            session.start_position = target;
            session.boundaries_crossed = 0;
            debug!("Jump to {} while paused; restart deferred", target);
        } else {
            let id = self.next_utterance_id;
            self.next_utterance_id += 1;
            let restarted = session.utterance.respeak(id, &self.sentences, target);
            self.synthesizer.cancel();
            debug!("Jump to {}; restarting (utterance {})", target, id);
            self.submit(target, restarted);
        }

        target
    }

    /// Cancel the session and reset the position
    ///
    /// Never reports stream-ended. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if self.session.is_some() {
            info!("Stopping speech at sentence {}", self.position);
        }
        self.cancel_session();
        self.position = 0;
    }

    /// Feed one platform event into the engine
    ///
    /// Events for utterances that are no longer live are discarded.
    pub fn handle_synthesis_event(&mut self, event: SynthesisEvent) {
        match event {
            SynthesisEvent::SentenceBoundary { utterance_id } => {
                let count = self.sentences.len();
                let Some(session) = self.live_session_mut(utterance_id) else {
                    debug!("Discarding boundary from stale utterance {}", utterance_id);
                    return;
                };

                session.boundaries_crossed += 1;
                let next = session.start_position + session.boundaries_crossed;

                if next >= count {
                    // Boundary past the last sentence means the text is done
                    self.finish_session();
                } else {
                    self.position = next;
                    self.listener.on_position_advanced(next);
                }
            }
            SynthesisEvent::Ended { utterance_id } => {
                if self.live_session_mut(utterance_id).is_none() {
                    debug!("Discarding end from stale utterance {}", utterance_id);
                    return;
                }
                self.finish_session();
            }
            SynthesisEvent::Failed {
                utterance_id,
                message,
            } => {
                if self.live_session_mut(utterance_id).is_none() {
                    debug!("Discarding failure from stale utterance {}", utterance_id);
                    return;
                }
                // The platform already dropped it; no cancel needed
                self.session = None;
                warn!("Speech failed at sentence {}: {}", self.position, message);
                self.listener.on_speech_failed(&message);
            }
            SynthesisEvent::VoicesChanged => {
                let voices = self.synthesizer.voices();
                debug!("Synthesizer reports {} voices", voices.len());
                self.listener.on_voices_changed(&voices);
            }
        }
    }

    /// Look up a voice id in the platform list
    ///
    /// An id the platform no longer offers falls back to the default voice
    /// with a warning; speaking never fails because of it.
    pub fn resolve_voice(&self, voice_id: Option<&str>) -> Option<VoiceInfo> {
        let voice_id = voice_id?;
        let voices = self.synthesizer.voices();

        match voices.into_iter().find(|v| v.id == voice_id) {
            Some(voice) => Some(voice),
            None => {
                warn!("Voice '{}' not available, using platform default", voice_id);
                None
            }
        }
    }

    fn next_id(&mut self) -> UtteranceId {
        let id = self.next_utterance_id;
        self.next_utterance_id += 1;
        id
    }

    fn submit(&mut self, start_position: usize, utterance: Utterance) {
        let id = utterance.id;
        self.synthesizer.speak(utterance.clone());
        self.session = Some(Session {
            start_position,
            boundaries_crossed: 0,
            utterance,
            live_id: Some(id),
            paused: false,
            restart_pending: false,
        });
    }

    fn live_session_mut(&mut self, utterance_id: UtteranceId) -> Option<&mut Session> {
        self.session
            .as_mut()
            .filter(|s| s.live_id == Some(utterance_id))
    }

    fn cancel_session(&mut self) {
        if self.session.take().is_some() {
            self.synthesizer.cancel();
        }
    }

    /// Session played out; report exactly once
    fn finish_session(&mut self) {
        if self.session.take().is_some() {
            info!("Reached end of text at sentence {}", self.position);
            self.listener.on_stream_ended();
        }
    }
}

//! Synthesizer for platforms without speech output
//!
//! Reports itself unavailable; every call is accepted and ignored.

use readion_common::VoiceInfo;

use super::events::SynthesisEventSender;
use super::synthesizer::{SpeechSynthesizer, Utterance};

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSynthesizer;

impl SpeechSynthesizer for NullSynthesizer {
    fn is_available(&self) -> bool {
        false
    }

    fn attach(&self, _events: SynthesisEventSender) {}

    fn voices(&self) -> Vec<VoiceInfo> {
        Vec::new()
    }

    fn speak(&self, _utterance: Utterance) {}

    fn cancel(&self) {}

    fn pause(&self) {}

    fn resume(&self) {}

    fn is_speaking(&self) -> bool {
        false
    }

    fn is_paused(&self) -> bool {
        false
    }
}

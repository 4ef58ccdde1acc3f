//! Platform speech capability
//!
//! A synthesizer plays one utterance at a time and reports sentence
//! boundaries and completion through the attached event channel. All
//! methods take `&self`: platforms are shared handles, and backends keep
//! their own interior state.

use readion_common::text::join_from;
use readion_common::{VoiceInfo, VoiceSettings};

use super::events::SynthesisEventSender;

/// Identifies one submitted utterance
///
/// Events carry the id so late events from cancelled utterances can be
/// told apart from the live one.
pub type UtteranceId = u64;

/// A unit of text handed to the platform
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub id: UtteranceId,

    /// Remaining sentences joined with single spaces
    pub text: String,

    /// The same sentences, unjoined, for backends that pace boundaries
    /// themselves
    pub sentences: Vec<String>,

    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,

    /// Resolved voice, None for the platform default
    pub voice: Option<VoiceInfo>,
}

impl Utterance {
    /// Build an utterance for `sentences[start..]`, copying the playback
    /// parameters
    pub fn new(
        id: UtteranceId,
        sentences: &[String],
        start: usize,
        settings: &VoiceSettings,
        voice: Option<VoiceInfo>,
    ) -> Self {
        Self {
            id,
            text: join_from(sentences, start),
            sentences: tail(sentences, start),
            rate: settings.rate,
            pitch: settings.pitch,
            volume: settings.volume,
            voice,
        }
    }

    /// Same voice and parameters, different text
    ///
    /// Used to restart mid-session with the values already live on the
    /// platform rather than the latest stored settings.
    pub fn respeak(&self, id: UtteranceId, sentences: &[String], start: usize) -> Self {
        Self {
            id,
            text: join_from(sentences, start),
            sentences: tail(sentences, start),
            rate: self.rate,
            pitch: self.pitch,
            volume: self.volume,
            voice: self.voice.clone(),
        }
    }

    /// Playback parameters as voice settings
    pub fn settings(&self) -> VoiceSettings {
        VoiceSettings {
            rate: self.rate,
            pitch: self.pitch,
            volume: self.volume,
            voice: self.voice.as_ref().map(|v| v.id.clone()),
        }
    }
}

fn tail(sentences: &[String], start: usize) -> Vec<String> {
    sentences.get(start..).map(<[String]>::to_vec).unwrap_or_default()
}

/// Platform speech synthesis
pub trait SpeechSynthesizer: Send + Sync {
    /// Whether speech output exists at all on this platform
    fn is_available(&self) -> bool {
        true
    }

    /// Register the channel for boundary, end and voice events
    ///
    /// Called once, when the engine is constructed.
    fn attach(&self, events: SynthesisEventSender);

    /// Currently known voices (may be empty until enumeration finishes)
    fn voices(&self) -> Vec<VoiceInfo>;

    /// Start speaking, replacing whatever is in progress
    fn speak(&self, utterance: Utterance);

    /// Drop the current utterance without an end event
    fn cancel(&self);

    fn pause(&self);

    fn resume(&self);

    /// True while an utterance is queued or playing, including paused
    fn is_speaking(&self) -> bool;

    fn is_paused(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentences(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_utterance_joins_remainder_with_single_space() {
        let utterance = Utterance::new(
            1,
            &sentences(&["A", "B", "C"]),
            1,
            &VoiceSettings::default(),
            None,
        );
        assert_eq!(utterance.text, "B C");
        assert_eq!(utterance.sentences.len(), 2);
    }

    #[test]
    fn test_respeak_keeps_live_parameters() {
        let voice = VoiceInfo {
            id: "en-gb".to_string(),
            name: "English (GB)".to_string(),
            language: "en-gb".to_string(),
            is_default: false,
        };
        let settings = VoiceSettings {
            rate: 1.5,
            pitch: 0.7,
            volume: 0.3,
            voice: Some("en-gb".to_string()),
        };
        let all = sentences(&["A", "B"]);
        let live = Utterance::new(1, &all, 0, &settings, Some(voice));

        let restarted = live.respeak(2, &all, 1);

        assert_eq!(restarted.id, 2);
        assert_eq!(restarted.text, "B");
        assert_eq!(restarted.settings(), settings);
    }
}

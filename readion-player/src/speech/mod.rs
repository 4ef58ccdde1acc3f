//! Speech synthesis: platform backends and the sentence-tracking engine
//!
//! **Module Structure:**
//! - `synthesizer.rs`: the platform capability trait and utterance type
//! - `events.rs`: platform events and the engine listener contract
//! - `engine.rs`: session ownership and boundary-to-position translation
//! - `espeak.rs`, `null.rs`, `recording.rs`: backends

pub mod engine;
pub mod espeak;
pub mod events;
pub mod null;
pub mod recording;
pub mod synthesizer;

pub use engine::SpeechEngine;
pub use espeak::EspeakSynthesizer;
pub use events::{EngineEvent, EngineListener, SynthesisEvent, SynthesisEventSender};
pub use null::NullSynthesizer;
pub use recording::RecordingSynthesizer;
pub use synthesizer::{SpeechSynthesizer, Utterance, UtteranceId};

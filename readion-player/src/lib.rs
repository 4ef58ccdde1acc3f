//! # Readion Player Library (readion-player)
//!
//! Reads text aloud sentence by sentence and remembers where you stopped.
//!
//! **Purpose:** Segment text into sentences, drive a platform speech
//! synthesizer from any sentence, track the current position as speech
//! advances, and persist voice settings and per-source reading progress.
//!
//! **Architecture:** platform synthesizer → `SpeechEngine` (absolute
//! positions) → `PlaybackController` (state machine, persistence) → a single
//! service task reached through `PlaybackHandle`.

pub mod config;
pub mod db;
pub mod error;
pub mod playback;
pub mod speech;

pub use error::{Error, Result};

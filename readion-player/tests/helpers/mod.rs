//! Test helper modules for Readion player integration tests
//!
//! Provides reusable test infrastructure components:
//! - TestPlayer: controller over a recording synthesizer and in-memory database
//! - Event helpers: drain and filter the event bus

#![allow(dead_code)]

pub mod test_player;

pub use test_player::{drain_events, sample_voices, TestPlayer};

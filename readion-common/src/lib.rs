//! # Readion Common Library
//!
//! Shared code for the Readion text-to-speech reader including:
//! - Sentence segmentation (the single definition of a reading position)
//! - Text source, voice settings and reading progress models
//! - Event types (ReadionEvent enum) and the EventBus
//! - Configuration loading
//! - Database initialization

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod text;
pub mod time;

pub use error::{Error, Result};
pub use models::{ReadingProgress, SourceKind, TextSource, VoiceInfo, VoiceSettings, VoiceSettingsUpdate};

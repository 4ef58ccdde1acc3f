//! Domain models shared between the player and the persistence layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

/// Number of reading progress records retained (oldest evicted first)
pub const PROGRESS_HISTORY_LIMIT: usize = 20;

/// Number of recent text sources retained
pub const RECENT_SOURCES_LIMIT: usize = 10;

/// Where a text source came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Typed or pasted text
    Manual,
    /// Text extracted from a PDF or other document
    Document,
    /// Text recognized from an image
    Image,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Manual => write!(f, "manual"),
            SourceKind::Document => write!(f, "document"),
            SourceKind::Image => write!(f, "image"),
        }
    }
}

impl FromStr for SourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(SourceKind::Manual),
            "document" | "pdf" => Ok(SourceKind::Document),
            "image" => Ok(SourceKind::Image),
            other => Err(Error::InvalidInput(format!("Unknown source kind: {}", other))),
        }
    }
}

/// A piece of text the reader can speak
///
/// `content` is opaque to the player; it is only ever segmented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSource {
    pub id: Uuid,
    pub kind: SourceKind,
    pub title: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl TextSource {
    /// Create a new source with a fresh id, stamped now
    pub fn new(kind: SourceKind, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            title: title.into(),
            content: content.into(),
            timestamp: crate::time::now(),
        }
    }
}

/// Voice settings applied to each utterance
///
/// Replaced wholesale on update. `voice` is a stable voice identifier that
/// gets resolved against the synthesizer's current voice list at use time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    /// Speaking rate multiplier, 0.1..=10
    pub rate: f32,
    /// Pitch multiplier, 0..=2
    pub pitch: f32,
    /// Volume, 0..=1
    pub volume: f32,
    /// Selected voice id (None = platform default)
    #[serde(default)]
    pub voice: Option<String>,
}

impl VoiceSettings {
    pub const RATE_RANGE: (f32, f32) = (0.1, 10.0);
    pub const PITCH_RANGE: (f32, f32) = (0.0, 2.0);
    pub const VOLUME_RANGE: (f32, f32) = (0.0, 1.0);

    /// Copy with every numeric field forced into its valid range
    pub fn clamped(&self) -> Self {
        Self {
            rate: clamp_or(self.rate, Self::RATE_RANGE, 1.0),
            pitch: clamp_or(self.pitch, Self::PITCH_RANGE, 1.0),
            volume: clamp_or(self.volume, Self::VOLUME_RANGE, 0.8),
            voice: self.voice.clone(),
        }
    }
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            volume: 0.8,
            voice: None,
        }
    }
}

// NaN is not ordered, so it falls back to the default instead of leaking through clamp
fn clamp_or(value: f32, (min, max): (f32, f32), fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

/// Partial settings update; `None` fields keep their previous value
///
/// `voice: Some(None)` explicitly resets to the platform default voice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettingsUpdate {
    #[serde(default)]
    pub rate: Option<f32>,
    #[serde(default)]
    pub pitch: Option<f32>,
    #[serde(default)]
    pub volume: Option<f32>,
    #[serde(default)]
    pub voice: Option<Option<String>>,
}

impl VoiceSettingsUpdate {
    /// Merge this update over `current`, field by field
    pub fn apply_to(&self, current: &VoiceSettings) -> VoiceSettings {
        VoiceSettings {
            rate: self.rate.unwrap_or(current.rate),
            pitch: self.pitch.unwrap_or(current.pitch),
            volume: self.volume.unwrap_or(current.volume),
            voice: self.voice.clone().unwrap_or_else(|| current.voice.clone()),
        }
        .clamped()
    }

    pub fn is_empty(&self) -> bool {
        self.rate.is_none() && self.pitch.is_none() && self.volume.is_none() && self.voice.is_none()
    }
}

/// Last known reading position for one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingProgress {
    pub source_id: Uuid,
    /// Sentence index into `segment(source.content)`
    pub position: usize,
    pub timestamp: DateTime<Utc>,
}

impl ReadingProgress {
    pub fn new(source_id: Uuid, position: usize) -> Self {
        Self {
            source_id,
            position,
            timestamp: crate::time::now(),
        }
    }
}

/// A voice offered by the speech synthesizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceInfo {
    /// Stable identifier persisted in settings
    pub id: String,
    /// Human readable name
    pub name: String,
    /// Language tag (e.g. "en-us")
    pub language: String,
    /// Whether the platform uses this voice when none is selected
    #[serde(default)]
    pub is_default: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = VoiceSettings::default();
        assert_eq!(settings.rate, 1.0);
        assert_eq!(settings.pitch, 1.0);
        assert_eq!(settings.volume, 0.8);
        assert_eq!(settings.voice, None);
    }

    #[test]
    fn test_partial_update_keeps_untouched_fields() {
        let current = VoiceSettings {
            rate: 1.0,
            pitch: 1.0,
            volume: 0.8,
            voice: Some("en-us".to_string()),
        };
        let update = VoiceSettingsUpdate {
            rate: Some(1.5),
            ..Default::default()
        };

        let merged = update.apply_to(&current);
        assert_eq!(merged.rate, 1.5);
        assert_eq!(merged.pitch, 1.0);
        assert_eq!(merged.volume, 0.8);
        assert_eq!(merged.voice.as_deref(), Some("en-us"));
    }

    #[test]
    fn test_update_can_clear_voice() {
        let current = VoiceSettings {
            voice: Some("de".to_string()),
            ..Default::default()
        };
        let update = VoiceSettingsUpdate {
            voice: Some(None),
            ..Default::default()
        };
        assert_eq!(update.apply_to(&current).voice, None);
    }

    #[test]
    fn test_update_values_are_clamped() {
        let update = VoiceSettingsUpdate {
            rate: Some(50.0),
            pitch: Some(-1.0),
            volume: Some(f32::NAN),
            voice: None,
        };
        let merged = update.apply_to(&VoiceSettings::default());
        assert_eq!(merged.rate, 10.0);
        assert_eq!(merged.pitch, 0.0);
        assert_eq!(merged.volume, 0.8);
    }

    #[test]
    fn test_empty_update() {
        assert!(VoiceSettingsUpdate::default().is_empty());
        let update = VoiceSettingsUpdate {
            volume: Some(0.5),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }

    #[test]
    fn test_source_kind_parse() {
        assert_eq!("manual".parse::<SourceKind>().unwrap(), SourceKind::Manual);
        assert_eq!("pdf".parse::<SourceKind>().unwrap(), SourceKind::Document);
        assert_eq!(SourceKind::Image.to_string(), "image");
        assert!("audio".parse::<SourceKind>().is_err());
    }

    #[test]
    fn test_settings_serde() {
        let json = r#"{"rate":2.0,"pitch":1.0,"volume":0.5}"#;
        let settings: VoiceSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.rate, 2.0);
        assert_eq!(settings.voice, None);
    }
}

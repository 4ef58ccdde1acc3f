//! Playback-related type definitions

use serde::{Deserialize, Serialize};

/// Playback state of the single reading session
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// No session; position is 0 unless a jump was recorded or speech failed
    /// partway through the open text
    #[default]
    Idle,
    /// Audio is being produced
    Playing,
    /// Session suspended, position retained
    Paused,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_idle() {
        assert_eq!(PlaybackState::default(), PlaybackState::Idle);
    }

    #[test]
    fn test_serializes_lowercase() {
        let json = serde_json::to_string(&PlaybackState::Paused).unwrap();
        assert_eq!(json, "\"paused\"");
        assert_eq!(PlaybackState::Playing.to_string(), "playing");
    }
}

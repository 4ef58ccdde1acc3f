//! Settings database access
//!
//! Read/write settings from the settings table (key-value store).
//! Voice settings are process-wide: they survive across texts and sessions.

use crate::error::{Error, Result};
use readion_common::VoiceSettings;
use sqlx::{Pool, Sqlite};
use std::str::FromStr;

const KEY_RATE: &str = "tts_rate";
const KEY_PITCH: &str = "tts_pitch";
const KEY_VOLUME: &str = "tts_volume";
const KEY_VOICE: &str = "tts_voice";
const KEY_PROGRESS_INTERVAL: &str = "playback_progress_interval_ms";

/// Load voice settings, falling back to defaults for missing keys
///
/// Stored values are clamped into their valid ranges on the way out.
pub async fn get_voice_settings(db: &Pool<Sqlite>) -> Result<VoiceSettings> {
    let defaults = VoiceSettings::default();

    let settings = VoiceSettings {
        rate: get_setting::<f32>(db, KEY_RATE).await?.unwrap_or(defaults.rate),
        pitch: get_setting::<f32>(db, KEY_PITCH).await?.unwrap_or(defaults.pitch),
        volume: get_setting::<f32>(db, KEY_VOLUME).await?.unwrap_or(defaults.volume),
        voice: get_setting::<String>(db, KEY_VOICE)
            .await?
            .filter(|voice| !voice.is_empty()),
    };

    Ok(settings.clamped())
}

/// Replace the stored voice settings
///
/// Written in one transaction so a reader never sees half an update.
pub async fn save_voice_settings(db: &Pool<Sqlite>, settings: &VoiceSettings) -> Result<()> {
    let settings = settings.clamped();
    let mut tx = db.begin().await?;

    for (key, value) in [
        (KEY_RATE, settings.rate.to_string()),
        (KEY_PITCH, settings.pitch.to_string()),
        (KEY_VOLUME, settings.volume.to_string()),
    ] {
        upsert(&mut *tx, key, value).await?;
    }

    match &settings.voice {
        Some(voice) => upsert(&mut *tx, KEY_VOICE, voice.clone()).await?,
        None => {
            // No stored voice means platform default
            sqlx::query("DELETE FROM settings WHERE key = ?")
                .bind(KEY_VOICE)
                .execute(&mut *tx)
                .await?;
        }
    }

    tx.commit().await?;
    Ok(())
}

/// Load playback_progress_interval_ms from settings table
///
/// # Returns
/// Interval in milliseconds (default: 5000ms if not set), clamped to 1-60 seconds
pub async fn load_progress_interval(db: &Pool<Sqlite>) -> Result<u64> {
    match get_setting::<u64>(db, KEY_PROGRESS_INTERVAL).await? {
        Some(interval) => Ok(interval.clamp(1000, 60000)),
        None => Ok(5000),
    }
}

/// Generic setting getter
///
/// Returns None if key doesn't exist in database or its value is NULL.
/// Parses value from string using FromStr trait.
pub async fn get_setting<T: FromStr>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(db)
            .await?;

    match value.flatten() {
        Some(s) => match s.parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(Error::InvalidData(format!(
                "Failed to parse setting '{}' value: {}",
                key, s
            ))),
        },
        None => Ok(None),
    }
}

/// Generic setting setter
///
/// Inserts or updates setting in database.
pub async fn set_setting<T: ToString>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()> {
    upsert(db, key, value.to_string()).await
}

async fn upsert<'e, E>(executor: E, key: &str, value: String) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO settings (key, value)
        VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(executor)
    .await?;

    Ok(())
}

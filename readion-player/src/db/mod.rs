//! Database access layer
//!
//! Provides queries for voice settings, reading progress and the recent
//! text source list. The SQLite `settings` table doubles as the key-value
//! store for runtime settings.

pub mod progress;
pub mod settings;
pub mod sources;

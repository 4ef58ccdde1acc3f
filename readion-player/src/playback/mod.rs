//! Playback control
//!
//! **Module Structure:**
//! - `controller.rs`: state machine, position and persistence
//! - `service.rs`: task that owns the controller and drives it from
//!   commands, platform events and the progress ticker

pub mod controller;
pub mod service;

pub use controller::{PlaybackController, PlaybackStatus};
pub use service::{spawn, PlaybackHandle, DEFAULT_PROGRESS_INTERVAL};

//! Playback service integration tests
//!
//! Exercises the service task end to end: commands through the handle,
//! platform events through the attached channel, and the periodic progress
//! save that only runs while playing.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use helpers::drain_events;
use readion_common::db::init_memory_database;
use readion_common::events::{EventBus, PlaybackState, ReadionEvent};
use readion_common::{SourceKind, TextSource};
use readion_player::db::progress;
use readion_player::playback::{self, PlaybackController, PlaybackHandle};
use readion_player::speech::RecordingSynthesizer;
use readion_player::Error;
use sqlx::SqlitePool;
use tokio::task::JoinHandle;

struct TestService {
    handle: PlaybackHandle,
    task: JoinHandle<()>,
    synthesizer: RecordingSynthesizer,
    bus: EventBus,
    db: SqlitePool,
}

async fn start(progress_interval: Duration) -> TestService {
    let db = init_memory_database().await.unwrap();
    let synthesizer = RecordingSynthesizer::new();
    let bus = EventBus::new(256);
    let controller =
        PlaybackController::new(Arc::new(synthesizer.clone()), db.clone(), bus.clone()).await;
    let (handle, task) = playback::spawn(controller, progress_interval);

    TestService {
        handle,
        task,
        synthesizer,
        bus,
        db,
    }
}

/// Poll status until `check` holds (the event channel and the command
/// channel are served in no fixed order)
async fn wait_for(handle: &PlaybackHandle, check: impl Fn(usize, PlaybackState) -> bool) -> bool {
    for _ in 0..100 {
        let status = handle.status().await.unwrap();
        if check(status.position, status.state) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_commands_round_trip_through_handle() {
    let service = start(Duration::from_secs(60)).await;
    let source = TextSource::new(SourceKind::Manual, "doc", "A. B. C.");

    assert_eq!(service.handle.open_source(source.clone()).await.unwrap(), 0);
    service.handle.play().await.unwrap();
    assert_eq!(service.handle.skip_forward().await.unwrap(), 1);
    service.handle.pause().await.unwrap();

    let status = service.handle.status().await.unwrap();
    assert_eq!(status.state, PlaybackState::Paused);
    assert_eq!(status.position, 1);
    assert_eq!(status.sentence_count, 3);
    assert_eq!(status.source_id, Some(source.id));

    service.handle.stop().await.unwrap();
    let status = service.handle.status().await.unwrap();
    assert_eq!(status.state, PlaybackState::Idle);
    assert_eq!(status.position, 0);
}

#[tokio::test]
async fn test_platform_events_advance_and_end() {
    let service = start(Duration::from_secs(60)).await;
    service.handle.play_text("A. B. C.", None, 0).await.unwrap();

    assert!(service.synthesizer.fire_boundary());
    assert!(wait_for(&service.handle, |position, _| position == 1).await);

    assert!(service.synthesizer.fire_end());
    assert!(wait_for(&service.handle, |_, state| state == PlaybackState::Idle).await);

    let status = service.handle.status().await.unwrap();
    assert_eq!(status.last_reported_position, 1);
}

#[tokio::test]
async fn test_progress_saved_periodically_while_playing() {
    let service = start(Duration::from_millis(50)).await;
    let source = TextSource::new(SourceKind::Document, "doc", "A. B. C. D.");
    service.handle.open_source(source.clone()).await.unwrap();
    service.handle.play().await.unwrap();

    service.synthesizer.fire_boundary();
    assert!(wait_for(&service.handle, |position, _| position == 1).await);
    tokio::time::sleep(Duration::from_millis(300)).await;

    let saved = progress::get_progress(&service.db, source.id).await.unwrap();
    assert_eq!(saved.map(|p| p.position), Some(1));
}

#[tokio::test]
async fn test_no_periodic_save_after_stop() {
    let service = start(Duration::from_millis(50)).await;
    let source = TextSource::new(SourceKind::Document, "doc", "A. B. C.");
    service.handle.open_source(source).await.unwrap();
    service.handle.play().await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    service.handle.stop().await.unwrap();
    let mut rx = service.bus.subscribe();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let saves = drain_events(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, ReadionEvent::ProgressSaved { .. }))
        .count();
    assert_eq!(saves, 0);
}

#[tokio::test]
async fn test_speech_failure_stops_playing_and_periodic_saves() {
    let service = start(Duration::from_millis(50)).await;
    let source = TextSource::new(SourceKind::Document, "doc", "One. Two.");
    service.handle.open_source(source).await.unwrap();
    service.handle.play().await.unwrap();

    assert!(service.synthesizer.fire_failure("espeak-ng exited with 1"));
    assert!(wait_for(&service.handle, |_, state| state == PlaybackState::Idle).await);

    let mut rx = service.bus.subscribe();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let saves = drain_events(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, ReadionEvent::ProgressSaved { .. }))
        .count();
    assert_eq!(saves, 0);
}

#[tokio::test]
async fn test_shutdown_stops_service() {
    let service = start(Duration::from_secs(60)).await;
    service.handle.play_text("A. B.", None, 0).await.unwrap();

    service.handle.shutdown().await.unwrap();
    service.task.await.unwrap();

    assert!(service.synthesizer.current().is_none());
    assert!(matches!(service.handle.play().await, Err(Error::ServiceStopped)));
}

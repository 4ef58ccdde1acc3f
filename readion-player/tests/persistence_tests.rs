//! Reading state across process restarts
//!
//! Uses a file-backed database in a temporary directory: one controller
//! reads and pauses, a second one opened on the same file continues.

mod helpers;

use helpers::TestPlayer;
use readion_common::db::init_database;
use readion_common::events::PlaybackState;
use readion_common::VoiceSettingsUpdate;
use readion_player::db::sources;
use readion_player::speech::RecordingSynthesizer;
use tempfile::TempDir;

/// Given a source read to sentence 2 and paused
/// When a new controller opens the same database and source
/// Then reading continues at sentence 2 with the saved voice settings
#[tokio::test]
async fn test_reading_resumes_after_restart() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("readion.db");

    let source_id = {
        let db = init_database(&db_path).await.unwrap();
        let mut player = TestPlayer::with_database(RecordingSynthesizer::new(), db.clone()).await;
        let source = player.open("First. Second. Third. Fourth.").await;
        sources::save_source(&db, &source).await.unwrap();

        player
            .controller
            .update_settings(&VoiceSettingsUpdate {
                pitch: Some(1.25),
                ..VoiceSettingsUpdate::default()
            })
            .await
            .unwrap();
        player.controller.play().await.unwrap();
        player.boundary().await;
        player.boundary().await;
        player.controller.pause().await.unwrap();

        db.close().await;
        source.id
    };

    let db = init_database(&db_path).await.unwrap();
    let mut player = TestPlayer::with_database(RecordingSynthesizer::new(), db.clone()).await;
    let source = sources::get_source(&db, source_id).await.unwrap().unwrap();

    assert_eq!(player.controller.open_source(&source).await.unwrap(), 2);
    assert_eq!(player.controller.settings().pitch, 1.25);

    player.controller.play().await.unwrap();
    assert_eq!(player.controller.state(), PlaybackState::Playing);
    assert_eq!(player.synthesizer.current().unwrap().text, "Third Fourth");
    assert_eq!(player.synthesizer.current().unwrap().pitch, 1.25);
}

/// Given a source whose text shrank since progress was saved
/// When it is reopened
/// Then the saved position is clamped to the new last sentence
#[tokio::test]
async fn test_shrunken_source_is_clamped_on_restore() {
    let temp_dir = TempDir::new().unwrap();
    let db = init_database(&temp_dir.path().join("readion.db")).await.unwrap();
    let mut player = TestPlayer::with_database(RecordingSynthesizer::new(), db.clone()).await;

    let mut source = player.open("A. B. C. D. E.").await;
    player.controller.jump(4).await.unwrap();

    source.content = "A. B.".to_string();
    sources::save_source(&db, &source).await.unwrap();

    assert_eq!(player.controller.open_source(&source).await.unwrap(), 1);
}

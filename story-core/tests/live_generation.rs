//! Integration tests that call the real Gemini API.
//!
//! These tests require GEMINI_API_KEY to be set (via .env file or environment).
//! Run with: `cargo test -p story-core --test live_generation -- --ignored --nocapture`

use std::sync::Arc;
use story_core::testing::{sample_story, RecordingNotifier};
use story_core::{find_genre, GeminiGenerator, HistoryStore, Narrator, NoCovers, PlaySession};
use tempfile::TempDir;

/// Load environment variables from .env file
fn setup() {
    let _ = dotenvy::dotenv();
}

/// Check if API key is available
fn has_api_key() -> bool {
    std::env::var("GEMINI_API_KEY").is_ok()
}

fn narrator() -> (Narrator, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::new());
    let narrator = Narrator::new(Arc::new(GeminiGenerator::from_env()), notifier.clone());
    (narrator, notifier)
}

#[tokio::test]
#[ignore]
async fn test_quick_start_produces_playable_draft() {
    setup();
    if !has_api_key() {
        eprintln!("Skipping test: GEMINI_API_KEY not set");
        return;
    }

    let (narrator, notifier) = narrator();
    let genre = find_genre("mystery").expect("genre exists");

    let draft = narrator.quick_start(genre).await;
    println!("Draft: {draft:#?}");
    println!("Alerts: {:?}", notifier.alerts());

    let draft = draft.expect("quick start should succeed");
    assert!(draft.validate().is_ok());
    assert!(!draft.tags.is_empty());
}

#[tokio::test]
#[ignore]
async fn test_play_two_turns_and_resume() {
    setup();
    if !has_api_key() {
        eprintln!("Skipping test: GEMINI_API_KEY not set");
        return;
    }

    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let history = HistoryStore::open(temp_dir.path());
    let (narrator, notifier) = narrator();

    let mut play = PlaySession::start(
        history.clone(),
        narrator.clone(),
        &sample_story("live-1"),
        &NoCovers,
    )
    .await
    .expect("Failed to start session");

    for action in ["I climb to the lamp", "I signal the ship"] {
        let entries = play
            .take_turn(Some(action))
            .await
            .expect("store should not fail");
        println!("> {action}\n{entries:#?}");
        assert!(entries.is_some(), "alerts: {:?}", notifier.alerts());
    }

    let resumed = PlaySession::resume(history, narrator, play.id())
        .await
        .expect("Failed to resume");
    assert_eq!(resumed.turns().len(), 5);
}

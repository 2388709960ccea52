//! Tests for the on-device history store.
//!
//! Run with: `cargo test -p story-core --test history_store`

use story_core::backend::Backend;
use story_core::testing::{sample_story, MemoryBackend};
use story_core::{HistoryStore, NoCovers, Session, TurnEntry};
use tempfile::TempDir;

fn open_store() -> (TempDir, HistoryStore) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let store = HistoryStore::open(temp_dir.path());
    (temp_dir, store)
}

// =============================================================================
// Sessions
// =============================================================================

#[tokio::test]
async fn test_empty_store_has_nothing() {
    let (_dir, store) = open_store();

    assert!(store.sessions().await.unwrap().is_empty());
    assert!(store.creations().await.unwrap().is_empty());
    assert!(store.image_path("anything").await.unwrap().is_none());
}

#[tokio::test]
async fn test_create_session_seeds_opening() {
    let (_dir, store) = open_store();
    let story = sample_story("story-1");

    let session = store.create_session(&story, &NoCovers).await.unwrap();

    assert_eq!(session.turns.len(), 1);
    assert_eq!(session.turns[0], TurnEntry::ai(story.opening.clone()));
    assert_eq!(session.story, story);
    assert!(session.image_path.is_none());
}

#[tokio::test]
async fn test_session_round_trip_drops_new_flags() {
    let (dir, store) = open_store();
    let story = sample_story("story-1");
    let session = store.create_session(&story, &NoCovers).await.unwrap();

    store
        .append_turns(
            &session.id,
            &[
                TurnEntry::user("I light the lamp"),
                TurnEntry::ai("The beam sweeps the water.").fresh(),
            ],
        )
        .await
        .unwrap();

    // Reopen from disk to make sure nothing is served from memory
    let reopened = HistoryStore::open(dir.path());
    let loaded = reopened.session(&session.id).await.unwrap().unwrap();

    assert_eq!(loaded.turns.len(), 3);
    assert!(loaded.turns.iter().all(|t| !t.is_new));

    let mut expected: Session = session.clone();
    expected.turns.push(TurnEntry::user("I light the lamp"));
    expected.turns.push(TurnEntry::ai("The beam sweeps the water."));
    assert_eq!(loaded.turns, expected.turns);
    assert_eq!(loaded.story, expected.story);
    assert_eq!(loaded.created_at, expected.created_at);
    assert!(loaded.updated_at >= expected.updated_at);
}

#[tokio::test]
async fn test_sessions_sorted_by_last_update() {
    let (_dir, store) = open_store();
    let first = store
        .create_session(&sample_story("a"), &NoCovers)
        .await
        .unwrap();
    let second = store
        .create_session(&sample_story("b"), &NoCovers)
        .await
        .unwrap();

    store
        .append_turns(&first.id, &[TurnEntry::user("wait")])
        .await
        .unwrap();

    let ids: Vec<_> = store
        .sessions()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(ids, vec![first.id, second.id]);
}

#[tokio::test]
async fn test_append_to_missing_session_fails() {
    let (_dir, store) = open_store();
    let result = store.append_turns("nope", &[TurnEntry::user("hi")]).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_delete_missing_session_is_false() {
    let (_dir, store) = open_store();
    assert!(!store.delete_session("nope").await.unwrap());
}

// =============================================================================
// Covers
// =============================================================================

#[tokio::test]
async fn test_create_session_caches_cover() {
    let (_dir, store) = open_store();
    let backend = MemoryBackend::new();
    backend.insert_cover("file-9", b"\x89PNG\r\n\x1a\nrest".to_vec()).await;

    let mut story = sample_story("story-1");
    story.image_id = Some("file-9".to_string());

    let session = store.create_session(&story, &backend).await.unwrap();
    let path = session.image_path.clone().expect("cover should be cached");

    assert!(path.exists());
    assert_eq!(path.extension().unwrap(), "png");
    assert_eq!(store.image_path("story-1").await.unwrap(), Some(path.clone()));

    // A second session reuses the cached file without downloading again
    backend.delete_cover("file-9").await.unwrap();
    let again = store.create_session(&story, &backend).await.unwrap();
    assert_eq!(again.image_path, Some(path));
}

#[tokio::test]
async fn test_failed_cover_download_still_creates_session() {
    let (_dir, store) = open_store();
    let backend = MemoryBackend::new();

    let mut story = sample_story("story-1");
    story.image_id = Some("missing".to_string());

    let session = store.create_session(&story, &backend).await.unwrap();
    assert!(session.image_path.is_none());
    assert_eq!(store.sessions().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_session_keeps_shared_cover() {
    let (_dir, store) = open_store();
    let backend = MemoryBackend::new();
    backend.insert_cover("file-1", b"GIF89a....".to_vec()).await;

    let mut story = sample_story("story-1");
    story.image_id = Some("file-1".to_string());

    let first = store.create_session(&story, &backend).await.unwrap();
    let second = store.create_session(&story, &backend).await.unwrap();
    let path = first.image_path.clone().unwrap();

    assert!(store.delete_session(&first.id).await.unwrap());
    assert!(path.exists(), "cover is still shown by the other session");

    assert!(store.delete_session(&second.id).await.unwrap());
    assert!(!path.exists());
    assert!(store.image_path("story-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_session_keeps_creation_cover() {
    let (_dir, store) = open_store();
    let mut story = sample_story("local-abc");
    story.is_local = true;

    let path = store.covers().store(&story.id, b"RIFF....WEBPVP8 ").await.unwrap();
    store.set_image_path(&story.id, &path).await.unwrap();
    store.save_creation(&story).await.unwrap();

    let session = store.create_session(&story, &NoCovers).await.unwrap();
    assert_eq!(session.image_path.as_ref(), Some(&path));

    store.delete_session(&session.id).await.unwrap();
    assert!(path.exists());
    assert_eq!(store.image_path(&story.id).await.unwrap(), Some(path));
}

// =============================================================================
// Story cascade
// =============================================================================

#[tokio::test]
async fn test_delete_story_cascades() {
    let (_dir, store) = open_store();
    let mut story = sample_story("local-abc");
    story.is_local = true;
    let other = sample_story("story-2");

    let path = store.covers().store(&story.id, b"\xff\xd8\xffjpeg").await.unwrap();
    store.set_image_path(&story.id, &path).await.unwrap();
    store.save_creation(&story).await.unwrap();

    store.create_session(&story, &NoCovers).await.unwrap();
    store.create_session(&story, &NoCovers).await.unwrap();
    let kept = store.create_session(&other, &NoCovers).await.unwrap();

    let removed = store.delete_story(&story.id).await.unwrap();

    assert_eq!(removed, 2);
    let remaining = store.sessions().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, kept.id);
    assert!(store.creation(&story.id).await.unwrap().is_none());
    assert!(store.image_path(&story.id).await.unwrap().is_none());
    assert!(!path.exists());
}

#[tokio::test]
async fn test_delete_unknown_story_is_harmless() {
    let (_dir, store) = open_store();
    store
        .create_session(&sample_story("story-1"), &NoCovers)
        .await
        .unwrap();

    assert_eq!(store.delete_story("story-404").await.unwrap(), 0);
    assert_eq!(store.sessions().await.unwrap().len(), 1);
}

// =============================================================================
// Local creations
// =============================================================================

#[tokio::test]
async fn test_save_creation_upserts() {
    let (_dir, store) = open_store();
    let mut story = sample_story("local-1");
    story.is_local = true;

    store.save_creation(&story).await.unwrap();
    story.title = "Renamed".to_string();
    store.save_creation(&story).await.unwrap();

    let creations = store.creations().await.unwrap();
    assert_eq!(creations.len(), 1);
    assert_eq!(creations[0].title, "Renamed");

    assert!(store.delete_creation("local-1").await.unwrap());
    assert!(!store.delete_creation("local-1").await.unwrap());
}

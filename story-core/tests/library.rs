//! Tests for the story library against the in-memory backend.
//!
//! Run with: `cargo test -p story-core --test library`

use chrono::{Duration, Utc};
use story_core::backend::Backend;
use story_core::testing::{sample_story, MemoryBackend, TestHarness};
use story_core::{Library, LibraryError, NoCovers, StoryDraft};

const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3];

fn library(harness: &TestHarness) -> Library<MemoryBackend> {
    Library::new(MemoryBackend::new(), harness.history.clone())
}

fn draft(title: &str) -> StoryDraft {
    StoryDraft {
        title: title.to_string(),
        description: "A short test story.".to_string(),
        tags: vec![" Mystery ".to_string()],
        opening: "You wake in a locked room.".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_save_local_story_caches_cover() {
    let harness = TestHarness::new();
    let library = library(&harness);

    let story = library
        .save_story(draft("Locked"), "user-1", Some(PNG.to_vec()), false)
        .await
        .unwrap();

    assert!(story.is_local);
    assert!(story.id.starts_with("local-"));
    assert_eq!(story.tags, vec!["mystery"]);

    let path = harness.history.image_path(&story.id).await.unwrap().unwrap();
    assert!(path.exists());
    assert_eq!(harness.history.creations().await.unwrap(), vec![story]);
    assert_eq!(library.backend().story_count().await, 0);
}

#[tokio::test]
async fn test_save_published_story_uploads_cover() {
    let harness = TestHarness::new();
    let library = library(&harness);

    let story = library
        .save_story(draft("Public"), "user-1", Some(PNG.to_vec()), true)
        .await
        .unwrap();

    assert!(!story.is_local);
    let file_id = story.image_id.clone().expect("cover should be uploaded");
    assert!(library.backend().has_cover(&file_id).await);
    assert_eq!(library.backend().story_count().await, 1);
    assert!(harness.history.creations().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_save_rejects_missing_title() {
    let harness = TestHarness::new();
    let library = library(&harness);

    let result = library
        .save_story(draft("   "), "user-1", None, false)
        .await;
    assert!(matches!(result, Err(LibraryError::Validation(_))));
}

#[tokio::test]
async fn test_stories_for_merges_and_paginates() {
    let harness = TestHarness::new();
    let library = library(&harness);

    for i in 0..30 {
        let mut story = sample_story(&format!("remote-{i}"));
        story.created_at = Utc::now() - Duration::minutes(100 - i);
        library.backend().insert_story(story).await;
    }
    let mut someone_else = sample_story("remote-other");
    someone_else.user_id = "user-2".to_string();
    library.backend().insert_story(someone_else).await;

    let local = library
        .save_story(draft("Mine"), "user-1", None, false)
        .await
        .unwrap();

    let stories = library.stories_for("user-1").await.unwrap();

    assert_eq!(stories.len(), 31);
    assert_eq!(stories[0].id, local.id);
    assert_eq!(stories[1].id, "remote-29");
    assert_eq!(stories[30].id, "remote-0");
    assert!(stories.iter().all(|s| s.id != "remote-other"));
}

#[tokio::test]
async fn test_publish_moves_creation_and_cover() {
    let harness = TestHarness::new();
    let library = library(&harness);

    let local = library
        .save_story(draft("Going public"), "user-1", Some(PNG.to_vec()), false)
        .await
        .unwrap();
    let old_path = harness.history.image_path(&local.id).await.unwrap().unwrap();

    let published = library.publish(&local.id).await.unwrap();

    assert!(!published.is_local);
    assert_ne!(published.id, local.id);
    assert_eq!(published.title, "Going public");
    assert!(library.backend().has_cover(published.image_id.as_deref().unwrap()).await);

    assert!(harness.history.creation(&local.id).await.unwrap().is_none());
    assert!(harness.history.image_path(&local.id).await.unwrap().is_none());
    assert!(!old_path.exists());

    let new_path = harness
        .history
        .image_path(&published.id)
        .await
        .unwrap()
        .unwrap();
    assert!(new_path.exists());
}

#[tokio::test]
async fn test_publish_unknown_creation_fails() {
    let harness = TestHarness::new();
    let library = library(&harness);

    let result = library.publish("local-missing").await;
    assert!(matches!(result, Err(LibraryError::CreationNotFound(_))));
}

#[tokio::test]
async fn test_update_story_routes_by_location() {
    let harness = TestHarness::new();
    let library = library(&harness);

    let mut local = library
        .save_story(draft("Draft"), "user-1", None, false)
        .await
        .unwrap();
    local.title = "Draft two".to_string();
    library.update_story(&local).await.unwrap();
    assert_eq!(
        harness.history.creation(&local.id).await.unwrap().unwrap().title,
        "Draft two"
    );

    let mut remote = library
        .save_story(draft("Live"), "user-1", None, true)
        .await
        .unwrap();
    remote.title = "Live two".to_string();
    library.update_story(&remote).await.unwrap();
    assert_eq!(library.backend().story(&remote.id).await.unwrap().title, "Live two");
}

#[tokio::test]
async fn test_delete_remote_story_clears_local_state() {
    let harness = TestHarness::new();
    let library = library(&harness);

    let story = library
        .save_story(draft("Doomed"), "user-1", Some(PNG.to_vec()), true)
        .await
        .unwrap();
    let file_id = story.image_id.clone().unwrap();

    harness.history.create_session(&story, library.backend()).await.unwrap();
    harness.history.create_session(&story, &NoCovers).await.unwrap();
    let cover = harness.history.image_path(&story.id).await.unwrap().unwrap();

    let removed = library.delete_story(&story).await.unwrap();

    assert_eq!(removed, 2);
    assert_eq!(library.backend().story_count().await, 0);
    assert!(!library.backend().has_cover(&file_id).await);
    assert!(harness.history.sessions().await.unwrap().is_empty());
    assert!(!cover.exists());
}

#[tokio::test]
async fn test_find_story_prefers_local() {
    let harness = TestHarness::new();
    let library = library(&harness);

    let local = library
        .save_story(draft("Here"), "user-1", None, false)
        .await
        .unwrap();
    library.backend().insert_story(sample_story("remote-1")).await;

    assert_eq!(library.find_story(&local.id).await.unwrap(), local);
    assert_eq!(library.find_story("remote-1").await.unwrap().id, "remote-1");
    assert!(library.find_story("nowhere").await.is_err());
}

#[tokio::test]
async fn test_publish_carries_existing_sessions() {
    let harness = TestHarness::new();
    let library = library(&harness);

    let local = library
        .save_story(draft("Played early"), "user-1", Some(PNG.to_vec()), false)
        .await
        .unwrap();
    let session = harness.history.create_session(&local, &NoCovers).await.unwrap();
    assert!(session.image_path.is_some());

    let published = library.publish(&local.id).await.unwrap();

    let session = harness.history.session(&session.id).await.unwrap().unwrap();
    assert_eq!(session.story.id, published.id);
    assert!(!session.story.is_local);
    assert_eq!(session.story.image_id, published.image_id);
    let cover = session.image_path.clone().expect("session keeps its cover");
    assert!(cover.exists());
    assert_eq!(
        harness.history.image_path(&published.id).await.unwrap(),
        Some(cover.clone())
    );

    let removed = library.delete_story(&published).await.unwrap();

    assert_eq!(removed, 1);
    assert!(harness.history.sessions().await.unwrap().is_empty());
    assert!(!cover.exists());
    assert_eq!(library.backend().cover_count().await, 0);
}

#[tokio::test]
async fn test_delete_story_already_gone_remotely() {
    let harness = TestHarness::new();
    let library = library(&harness);

    let story = sample_story("doc-vanished");
    assert!(!story.is_local);
    harness.history.create_session(&story, &NoCovers).await.unwrap();
    harness.history.create_session(&story, &NoCovers).await.unwrap();

    let removed = library.delete_story(&story).await.unwrap();

    assert_eq!(removed, 2);
    assert!(harness.history.sessions().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_publish_removes_uploaded_cover() {
    let harness = TestHarness::new();
    let library = library(&harness);
    library.backend().reject_creates().await;

    let result = library
        .save_story(draft("Never lands"), "user-1", Some(PNG.to_vec()), true)
        .await;

    assert!(matches!(result, Err(LibraryError::Backend(_))));
    assert_eq!(library.backend().cover_count().await, 0);
    assert_eq!(library.backend().story_count().await, 0);
}

#[tokio::test]
async fn test_failed_publish_keeps_local_creation() {
    let harness = TestHarness::new();
    let library = library(&harness);

    let local = library
        .save_story(draft("Stays home"), "user-1", Some(PNG.to_vec()), false)
        .await
        .unwrap();
    let cached = harness.history.image_path(&local.id).await.unwrap().unwrap();
    library.backend().reject_creates().await;

    assert!(library.publish(&local.id).await.is_err());

    assert_eq!(library.backend().cover_count().await, 0);
    assert_eq!(harness.history.creation(&local.id).await.unwrap(), Some(local.clone()));
    assert!(cached.exists());
}

#[tokio::test]
async fn test_missing_stories_flags_deleted_remote_stories() {
    let harness = TestHarness::new();
    let library = library(&harness);

    let kept = sample_story("doc-kept");
    library.backend().insert_story(kept.clone()).await;
    let gone = sample_story("doc-gone");
    let local = library
        .save_story(draft("Offline"), "user-1", None, false)
        .await
        .unwrap();

    for story in [&kept, &gone, &gone, &local] {
        harness.history.create_session(story, &NoCovers).await.unwrap();
    }
    let sessions = harness.history.sessions().await.unwrap();

    let missing = library.missing_stories(&sessions).await.unwrap();

    assert_eq!(missing.len(), 1);
    assert!(missing.contains("doc-gone"));
}

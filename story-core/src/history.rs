//! Local history store.
//!
//! Persists three collections in on-device key-value storage, each as a
//! single JSON blob under its own key:
//!
//! - `story_history`: every [`Session`] the player has started
//! - `local_creations`: stories that were never pushed to the remote database
//! - `story_images`: story id to locally cached cover image path
//!
//! Every operation reads the whole blob, modifies it and writes it back.
//! Concurrent writers are not coordinated; the last write wins.

use crate::covers::{self, CoverCache, CoverSource};
use crate::session::{PlayerAttributes, Session, TurnEntry};
use crate::storage::{FileStore, KeyValueStore, StorageError};
use crate::story::Story;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Key of the session list blob.
pub const SESSIONS_KEY: &str = "story_history";
/// Key of the local-only story list blob.
pub const CREATIONS_KEY: &str = "local_creations";
/// Key of the story id to image path map blob.
pub const IMAGES_KEY: &str = "story_images";

/// Errors from history store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Session not found: {0}")]
    SessionNotFound(String),
}

type ImageMap = BTreeMap<String, PathBuf>;

/// Session history, local creations and cached covers.
#[derive(Clone)]
pub struct HistoryStore {
    kv: Arc<dyn KeyValueStore>,
    covers: CoverCache,
}

impl HistoryStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, covers: CoverCache) -> Self {
        Self { kv, covers }
    }

    /// Open a file-backed store rooted at `data_dir`.
    pub fn open(data_dir: impl AsRef<Path>) -> Self {
        let dir = data_dir.as_ref();
        Self::new(
            Arc::new(FileStore::new(dir.join("store"))),
            CoverCache::new(dir.join("covers")),
        )
    }

    pub fn covers(&self) -> &CoverCache {
        &self.covers
    }

    /// The key-value store the collections live in.
    pub fn kv(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.kv)
    }

    async fn load<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T, StoreError> {
        match self.kv.get(key).await? {
            Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(&raw)?),
            _ => Ok(T::default()),
        }
    }

    async fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value)?;
        self.kv.set(key, &raw).await?;
        Ok(())
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// All sessions, most recently updated first.
    pub async fn sessions(&self) -> Result<Vec<Session>, StoreError> {
        let mut sessions: Vec<Session> = self.load(SESSIONS_KEY).await?;
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    /// Look up one session.
    pub async fn session(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let sessions: Vec<Session> = self.load(SESSIONS_KEY).await?;
        Ok(sessions.into_iter().find(|s| s.id == id))
    }

    /// Start a session for `story`: snapshot it, cache its cover and seed the
    /// turn log with the opening text.
    pub async fn create_session(
        &self,
        story: &Story,
        source: &dyn CoverSource,
    ) -> Result<Session, StoreError> {
        let mut session = Session::from_story(story);
        session.image_path = self.resolve_cover(story, source).await?;

        let mut sessions: Vec<Session> = self.load(SESSIONS_KEY).await?;
        sessions.push(session.clone());
        self.save(SESSIONS_KEY, &sessions).await?;

        debug!(session = %session.id, story = %story.id, "created session");
        Ok(session)
    }

    /// Find or download the cover for a story.
    ///
    /// A failed download is logged and treated as "no cover".
    async fn resolve_cover(
        &self,
        story: &Story,
        source: &dyn CoverSource,
    ) -> Result<Option<PathBuf>, StoreError> {
        if let Some(path) = self.image_path(&story.id).await? {
            if covers::exists(&path).await {
                return Ok(Some(path));
            }
        }

        let Some(file_id) = story.image_id.as_deref() else {
            return Ok(None);
        };

        match source.fetch_cover(file_id).await {
            Ok(bytes) => {
                let path = self.covers.store(&story.id, &bytes).await?;
                self.set_image_path(&story.id, &path).await?;
                Ok(Some(path))
            }
            Err(e) => {
                warn!(story = %story.id, file = file_id, error = %e, "cover download failed");
                Ok(None)
            }
        }
    }

    async fn modify_session<F>(&self, id: &str, f: F) -> Result<Session, StoreError>
    where
        F: FnOnce(&mut Session),
    {
        let mut sessions: Vec<Session> = self.load(SESSIONS_KEY).await?;
        let session = sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StoreError::SessionNotFound(id.to_string()))?;

        f(session);
        session.touch();
        let updated = session.clone();

        self.save(SESSIONS_KEY, &sessions).await?;
        Ok(updated)
    }

    /// Append entries to a session's turn log.
    pub async fn append_turns(
        &self,
        id: &str,
        entries: &[TurnEntry],
    ) -> Result<Session, StoreError> {
        self.modify_session(id, |s| s.turns.extend_from_slice(entries))
            .await
    }

    /// Replace a session's collected player attributes.
    pub async fn update_player(
        &self,
        id: &str,
        player: &PlayerAttributes,
    ) -> Result<Session, StoreError> {
        self.modify_session(id, |s| s.player = player.clone()).await
    }

    /// Replace a session's story snapshot.
    pub async fn update_story(&self, id: &str, story: &Story) -> Result<Session, StoreError> {
        self.modify_session(id, |s| s.story = story.clone()).await
    }

    /// Point every session of `old_id` at `story`, which replaces it under a
    /// new id. Sessions that showed the old cover get `cover` instead.
    /// Returns the number of sessions changed.
    pub async fn rekey_story(
        &self,
        old_id: &str,
        story: &Story,
        old_cover: Option<&Path>,
        cover: Option<&Path>,
    ) -> Result<usize, StoreError> {
        let mut sessions: Vec<Session> = self.load(SESSIONS_KEY).await?;
        let mut changed = 0;
        for session in sessions.iter_mut().filter(|s| s.story.id == old_id) {
            session.story.id = story.id.clone();
            session.story.is_local = story.is_local;
            session.story.image_id = story.image_id.clone();
            if old_cover.is_some() && session.image_path.as_deref() == old_cover {
                session.image_path = cover.map(Path::to_path_buf);
            }
            changed += 1;
        }
        if changed > 0 {
            self.save(SESSIONS_KEY, &sessions).await?;
        }

        debug!(old = old_id, new = %story.id, sessions = changed, "re-keyed story sessions");
        Ok(changed)
    }

    /// Delete a session.
    ///
    /// Its cached cover is removed too, unless another session still shows it
    /// or it belongs to a local creation. Returns whether anything was deleted.
    pub async fn delete_session(&self, id: &str) -> Result<bool, StoreError> {
        let mut sessions: Vec<Session> = self.load(SESSIONS_KEY).await?;
        let Some(index) = sessions.iter().position(|s| s.id == id) else {
            return Ok(false);
        };
        let removed = sessions.remove(index);
        self.save(SESSIONS_KEY, &sessions).await?;

        if let Some(path) = removed.image_path {
            let shared = sessions
                .iter()
                .any(|s| s.image_path.as_deref() == Some(path.as_path()));
            let owned_by_creation = self.creation(&removed.story.id).await?.is_some();

            if !shared && !owned_by_creation {
                self.covers.remove(&path).await?;
                self.forget_image(&removed.story.id).await?;
            }
        }

        debug!(session = id, "deleted session");
        Ok(true)
    }

    /// Delete everything held locally for a story: its sessions, its local
    /// creation and its cached cover. Returns the number of sessions removed.
    pub async fn delete_story(&self, story_id: &str) -> Result<usize, StoreError> {
        let sessions: Vec<Session> = self.load(SESSIONS_KEY).await?;
        let (removed, kept): (Vec<Session>, Vec<Session>) =
            sessions.into_iter().partition(|s| s.story.id == story_id);
        self.save(SESSIONS_KEY, &kept).await?;
        let count = removed.len();

        self.delete_creation(story_id).await?;

        let mut paths: Vec<PathBuf> = removed.into_iter().filter_map(|s| s.image_path).collect();
        if let Some(path) = self.image_path(story_id).await? {
            paths.push(path);
        }
        paths.sort();
        paths.dedup();
        for path in &paths {
            self.covers.remove(path).await?;
        }
        self.forget_image(story_id).await?;

        debug!(story = story_id, sessions = count, "deleted story locally");
        Ok(count)
    }

    // ========================================================================
    // Local creations
    // ========================================================================

    /// Stories that only exist on this device, newest first.
    pub async fn creations(&self) -> Result<Vec<Story>, StoreError> {
        let mut stories: Vec<Story> = self.load(CREATIONS_KEY).await?;
        stories.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(stories)
    }

    pub async fn creation(&self, id: &str) -> Result<Option<Story>, StoreError> {
        let stories: Vec<Story> = self.load(CREATIONS_KEY).await?;
        Ok(stories.into_iter().find(|s| s.id == id))
    }

    /// Insert or replace a local creation by id.
    pub async fn save_creation(&self, story: &Story) -> Result<(), StoreError> {
        let mut stories: Vec<Story> = self.load(CREATIONS_KEY).await?;
        match stories.iter_mut().find(|s| s.id == story.id) {
            Some(existing) => *existing = story.clone(),
            None => stories.push(story.clone()),
        }
        self.save(CREATIONS_KEY, &stories).await
    }

    /// Remove a local creation. Returns whether it existed.
    pub async fn delete_creation(&self, id: &str) -> Result<bool, StoreError> {
        let mut stories: Vec<Story> = self.load(CREATIONS_KEY).await?;
        let before = stories.len();
        stories.retain(|s| s.id != id);
        if stories.len() == before {
            return Ok(false);
        }
        self.save(CREATIONS_KEY, &stories).await?;
        Ok(true)
    }

    // ========================================================================
    // Image map
    // ========================================================================

    pub async fn image_path(&self, story_id: &str) -> Result<Option<PathBuf>, StoreError> {
        let map: ImageMap = self.load(IMAGES_KEY).await?;
        Ok(map.get(story_id).cloned())
    }

    pub async fn set_image_path(&self, story_id: &str, path: &Path) -> Result<(), StoreError> {
        let mut map: ImageMap = self.load(IMAGES_KEY).await?;
        map.insert(story_id.to_string(), path.to_path_buf());
        self.save(IMAGES_KEY, &map).await
    }

    /// Drop the map entry for a story. The file itself is left alone.
    pub async fn forget_image(&self, story_id: &str) -> Result<(), StoreError> {
        let mut map: ImageMap = self.load(IMAGES_KEY).await?;
        if map.remove(story_id).is_some() {
            self.save(IMAGES_KEY, &map).await?;
        }
        Ok(())
    }
}

//! Story library: remote stories and local creations side by side.

use crate::backend::{Backend, BackendError, StoryQuery};
use crate::covers;
use crate::history::{HistoryStore, StoreError};
use crate::session::Session;
use crate::story::{Story, StoryDraft, ValidationError};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from library operations.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid story: {0}")]
    Validation(#[from] ValidationError),

    #[error("Local story not found: {0}")]
    CreationNotFound(String),
}

/// Story management across the remote backend and the local store.
pub struct Library<B: Backend> {
    backend: B,
    history: HistoryStore,
}

impl<B: Backend> Library<B> {
    pub fn new(backend: B, history: HistoryStore) -> Self {
        Self { backend, history }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Every story the user owns, remote and local, newest first.
    pub async fn stories_for(&self, user_id: &str) -> Result<Vec<Story>, LibraryError> {
        let remote_query = StoryQuery::owned_by(user_id);
        let (remote, local) = futures::join!(
            self.all_remote(remote_query),
            self.history.creations()
        );
        Ok(merge_stories(remote?, local?))
    }

    async fn all_remote(&self, mut query: StoryQuery) -> Result<Vec<Story>, LibraryError> {
        let mut stories = Vec::new();
        loop {
            let page = self.backend.list_stories(&query).await?;
            stories.extend(page.items);
            match page.next_cursor {
                Some(cursor) => query.cursor = Some(cursor),
                None => break,
            }
        }
        Ok(stories)
    }

    /// Look a story up locally first, then remotely.
    pub async fn find_story(&self, id: &str) -> Result<Story, LibraryError> {
        if let Some(story) = self.history.creation(id).await? {
            return Ok(story);
        }
        Ok(self.backend.story(id).await?)
    }

    /// Ids of published stories behind `sessions` that the backend no longer has.
    pub async fn missing_stories(
        &self,
        sessions: &[Session],
    ) -> Result<HashSet<String>, LibraryError> {
        let mut ids: Vec<String> = sessions
            .iter()
            .filter(|s| !s.story.is_local)
            .map(|s| s.story.id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        if ids.is_empty() {
            return Ok(HashSet::new());
        }

        let found: HashSet<String> = self
            .backend
            .stories_by_ids(&ids)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();
        Ok(ids.into_iter().filter(|id| !found.contains(id)).collect())
    }

    /// Save a new story.
    ///
    /// Published stories go to the backend with their cover uploaded. Others
    /// are kept as local creations with the cover cached on disk.
    pub async fn save_story(
        &self,
        draft: StoryDraft,
        owner: &str,
        cover: Option<Vec<u8>>,
        publish: bool,
    ) -> Result<Story, LibraryError> {
        draft.validate()?;

        if publish {
            let mut story = draft.into_story(owner, "", false);
            if let Some(bytes) = cover {
                story.image_id = Some(self.backend.upload_cover("cover", bytes).await?);
            }
            let uploaded = story.image_id.clone();
            let created = self.create_remote(&story, uploaded.as_deref()).await?;
            debug!(story = %created.id, "published new story");
            return Ok(created);
        }

        let story = draft.into_story(owner, Story::new_local_id(), true);
        if let Some(bytes) = cover {
            let path = self.history.covers().store(&story.id, &bytes).await?;
            self.history.set_image_path(&story.id, &path).await?;
        }
        self.history.save_creation(&story).await?;
        debug!(story = %story.id, "saved local story");
        Ok(story)
    }

    /// Push a local creation to the backend.
    ///
    /// The cached cover is uploaded and re-keyed under the new remote id and
    /// the local creation is dropped.
    pub async fn publish(&self, local_id: &str) -> Result<Story, LibraryError> {
        let local = self
            .history
            .creation(local_id)
            .await?
            .ok_or_else(|| LibraryError::CreationNotFound(local_id.to_string()))?;

        let cached = self.history.image_path(local_id).await?;
        let mut story = local.clone();
        story.is_local = false;

        let mut uploaded = None;
        if let Some(path) = &cached {
            if covers::exists(path).await {
                let bytes = tokio::fs::read(path).await?;
                uploaded = Some(self.backend.upload_cover("cover", bytes).await?);
                story.image_id = uploaded.clone();
            }
        }

        let created = self.create_remote(&story, uploaded.as_deref()).await?;

        let mut moved = None;
        if let Some(path) = &cached {
            self.history.forget_image(local_id).await?;
            if covers::exists(path).await {
                let target = self.history.covers().rename(path, &created.id).await?;
                self.history.set_image_path(&created.id, &target).await?;
                moved = Some(target);
            }
        }
        self.history
            .rekey_story(local_id, &created, cached.as_deref(), moved.as_deref())
            .await?;
        self.history.delete_creation(local_id).await?;

        debug!(local = local_id, remote = %created.id, "published local story");
        Ok(created)
    }

    /// Create a remote document, removing the cover uploaded for it if that fails.
    async fn create_remote(
        &self,
        story: &Story,
        uploaded: Option<&str>,
    ) -> Result<Story, LibraryError> {
        match self.backend.create_story(story).await {
            Ok(created) => Ok(created),
            Err(e) => {
                if let Some(file_id) = uploaded {
                    if let Err(cleanup) = self.backend.delete_cover(file_id).await {
                        warn!(file = %file_id, error = %cleanup, "orphaned cover delete failed");
                    }
                }
                Err(e.into())
            }
        }
    }

    /// Update a story wherever it lives.
    pub async fn update_story(&self, story: &Story) -> Result<Story, LibraryError> {
        story.to_draft().validate()?;
        if story.is_local {
            self.history.save_creation(story).await?;
            Ok(story.clone())
        } else {
            Ok(self.backend.update_story(story).await?)
        }
    }

    /// Delete a story, every session of it and its cached cover.
    pub async fn delete_story(&self, story: &Story) -> Result<usize, LibraryError> {
        if !story.is_local {
            match self.backend.delete_story(&story.id).await {
                Ok(()) => {}
                Err(BackendError::NotFound(_)) => {
                    debug!(story = %story.id, "remote story already gone");
                }
                Err(e) => return Err(e.into()),
            }
            if let Some(file_id) = &story.image_id {
                if let Err(e) = self.backend.delete_cover(file_id).await {
                    warn!(story = %story.id, error = %e, "remote cover delete failed");
                }
            }
        }
        Ok(self.history.delete_story(&story.id).await?)
    }
}

/// Merge remote and local stories, newest first. Remote copies win on id clashes.
pub fn merge_stories(remote: Vec<Story>, local: Vec<Story>) -> Vec<Story> {
    let mut seen = HashSet::new();
    let mut merged: Vec<Story> = remote
        .into_iter()
        .chain(local)
        .filter(|s| seen.insert(s.id.clone()))
        .collect();
    merged.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    merged
}

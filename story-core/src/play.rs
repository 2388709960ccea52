//! PlaySession - the primary public API for playing a story.
//!
//! This module ties a [`Session`] record to the [`HistoryStore`] it is
//! persisted in and the [`Narrator`] that writes the story. The turn log is
//! persisted after every successful generation; a failed generation leaves
//! it exactly as it was.

use crate::covers::CoverSource;
use crate::generation::Narrator;
use crate::history::{HistoryStore, StoreError};
use crate::session::{Session, TurnEntry};
use crate::story::{AttributeStep, Story, ValidationError};
use thiserror::Error;
use tracing::debug;

/// Errors from PlaySession operations.
#[derive(Debug, Error)]
pub enum PlayError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Invalid answer: {0}")]
    Validation(#[from] ValidationError),

    #[error("This story does not ask for {0:?}")]
    AttributeNotRequested(AttributeStep),
}

/// A session being played.
pub struct PlaySession {
    history: HistoryStore,
    narrator: Narrator,
    session: Session,
}

impl PlaySession {
    /// Start playing a story in a fresh session.
    pub async fn start(
        history: HistoryStore,
        narrator: Narrator,
        story: &Story,
        covers: &dyn CoverSource,
    ) -> Result<Self, PlayError> {
        let session = history.create_session(story, covers).await?;
        Ok(Self {
            history,
            narrator,
            session,
        })
    }

    /// Continue a saved session.
    pub async fn resume(
        history: HistoryStore,
        narrator: Narrator,
        session_id: &str,
    ) -> Result<Self, PlayError> {
        let session = history
            .session(session_id)
            .await?
            .ok_or_else(|| PlayError::SessionNotFound(session_id.to_string()))?;
        Ok(Self {
            history,
            narrator,
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn id(&self) -> &str {
        &self.session.id
    }

    pub fn story(&self) -> &Story {
        &self.session.story
    }

    pub fn turns(&self) -> &[TurnEntry] {
        &self.session.turns
    }

    /// Attribute questions still to ask before play.
    pub fn pending_attributes(&self) -> Vec<AttributeStep> {
        self.session.pending_attributes()
    }

    /// Record the player's answer to an attribute question.
    pub async fn answer(&mut self, step: AttributeStep, value: &str) -> Result<(), PlayError> {
        if !self.session.story.attribute_steps().contains(&step) {
            return Err(PlayError::AttributeNotRequested(step));
        }

        let mut player = self.session.player.clone();
        player.set(step, value)?;

        let stored = self.history.update_player(&self.session.id, &player).await?;
        self.session.player = player;
        self.session.updated_at = stored.updated_at;
        Ok(())
    }

    /// Ask the narrator for the next passage.
    ///
    /// On success the player's action (if any) and the new passage are
    /// appended, persisted and returned. Returns `Ok(None)` when generation
    /// failed; the turn log is not touched in that case.
    pub async fn take_turn(
        &mut self,
        action: Option<&str>,
    ) -> Result<Option<Vec<TurnEntry>>, PlayError> {
        let action = action.map(str::trim).filter(|a| !a.is_empty());

        let Some(text) = self.narrator.continue_story(&self.session, action).await else {
            return Ok(None);
        };

        let mut entries = Vec::with_capacity(2);
        if let Some(action) = action {
            entries.push(TurnEntry::user(action));
        }
        entries.push(TurnEntry::ai(text).fresh());

        let stored = self.history.append_turns(&self.session.id, &entries).await?;
        self.session.turns.extend(entries.iter().cloned());
        self.session.updated_at = stored.updated_at;

        debug!(session = %self.session.id, turns = self.session.turns.len(), "turn complete");
        Ok(Some(entries))
    }

    /// The player has seen the new text.
    pub fn acknowledge(&mut self) {
        self.session.clear_new_flags();
    }

    /// Regenerate the running summary and store it in the story snapshot.
    /// Returns whether the summary changed.
    pub async fn refresh_summary(&mut self) -> Result<bool, PlayError> {
        let Some(summary) = self.narrator.summarize(&self.session).await else {
            return Ok(false);
        };

        let mut story = self.session.story.clone();
        story.summary = summary;
        let stored = self.history.update_story(&self.session.id, &story).await?;
        self.session.story = story;
        self.session.updated_at = stored.updated_at;
        Ok(true)
    }
}

//! Session records - one play-through of a story.
//!
//! A [`Session`] holds a snapshot of the story taken when play started, the
//! ordered turn log, the answers the player gave to attribute questions and
//! the sampling parameters used for generation.

use crate::story::{AttributeStep, Story, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Who wrote a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnKind {
    Ai,
    User,
}

/// One entry in the turn log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnEntry {
    #[serde(rename = "type")]
    pub kind: TurnKind,
    pub text: String,
    /// Display-only marker for freshly generated text. Never persisted.
    #[serde(skip)]
    pub is_new: bool,
}

impl TurnEntry {
    pub fn ai(text: impl Into<String>) -> Self {
        Self {
            kind: TurnKind::Ai,
            text: text.into(),
            is_new: false,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            kind: TurnKind::User,
            text: text.into(),
            is_new: false,
        }
    }

    /// Mark as freshly generated.
    pub fn fresh(mut self) -> Self {
        self.is_new = true;
        self
    }
}

/// Answers collected before play starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerAttributes {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
}

/// Oldest age accepted as an answer.
const MAX_AGE: u32 = 150;

impl PlayerAttributes {
    /// Whether the given step already has an answer.
    pub fn has(&self, step: AttributeStep) -> bool {
        match step {
            AttributeStep::Name => self.name.is_some(),
            AttributeStep::Age => self.age.is_some(),
            AttributeStep::Gender => self.gender.is_some(),
        }
    }

    /// Validate and record an answer.
    pub fn set(&mut self, step: AttributeStep, value: &str) -> Result<(), ValidationError> {
        let value = value.trim();
        match step {
            AttributeStep::Name => {
                if value.is_empty() {
                    return Err(ValidationError::new("name", "must not be empty"));
                }
                self.name = Some(value.to_string());
            }
            AttributeStep::Age => {
                let age: u32 = value
                    .parse()
                    .map_err(|_| ValidationError::new("age", "must be a whole number"))?;
                if age == 0 || age > MAX_AGE {
                    return Err(ValidationError::new(
                        "age",
                        format!("must be between 1 and {MAX_AGE}"),
                    ));
                }
                self.age = Some(age);
            }
            AttributeStep::Gender => {
                if value.is_empty() {
                    return Err(ValidationError::new("gender", "must not be empty"));
                }
                self.gender = Some(value.to_string());
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.age.is_none() && self.gender.is_none()
    }
}

/// Sampling parameters for story continuation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.9,
            top_p: 0.95,
            max_tokens: 400,
        }
    }
}

/// A play-through of a story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    /// Snapshot of the story taken when the session started.
    pub story: Story,
    #[serde(default)]
    pub turns: Vec<TurnEntry>,
    #[serde(default)]
    pub player: PlayerAttributes,
    /// Locally cached cover image.
    #[serde(default)]
    pub image_path: Option<PathBuf>,
    #[serde(default)]
    pub params: GenerationParams,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Start a new session from a story.
    ///
    /// The turn log is seeded with the opening text, if the story has one.
    pub fn from_story(story: &Story) -> Self {
        let now = Utc::now();
        let mut session = Self {
            id: uuid::Uuid::new_v4().to_string(),
            story: story.clone(),
            turns: Vec::new(),
            player: PlayerAttributes::default(),
            image_path: None,
            params: GenerationParams::default(),
            created_at: now,
            updated_at: now,
        };
        session.seed_opening();
        session
    }

    /// Put the opening text in an empty turn log.
    pub fn seed_opening(&mut self) {
        let opening = self.story.opening.trim();
        if self.turns.is_empty() && !opening.is_empty() {
            self.turns.push(TurnEntry::ai(opening));
        }
    }

    /// Attribute steps requested by the story that still lack an answer.
    pub fn pending_attributes(&self) -> Vec<AttributeStep> {
        self.story
            .attribute_steps()
            .into_iter()
            .filter(|step| !self.player.has(*step))
            .collect()
    }

    /// Record a modification.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Text of the most recent AI turn.
    pub fn last_ai_text(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.kind == TurnKind::Ai)
            .map(|t| t.text.as_str())
    }

    /// Clear every display-only `is_new` marker.
    pub fn clear_new_flags(&mut self) {
        for turn in &mut self.turns {
            turn.is_new = false;
        }
    }
}

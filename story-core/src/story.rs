//! Story premises.
//!
//! A [`Story`] is a reusable narrative template. It is either persisted in the
//! remote database or kept on-device only (`is_local`). [`StoryDraft`] is the
//! editable subset produced by the creation form and the AI-assisted flows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use story_macros::ResponseSchema;
use thiserror::Error;

/// Prefix for ids of stories that only exist on this device.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// A required form field was left empty or holds an invalid value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// A narrative premise that sessions are played from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Opening text, shown as the first AI turn of every new session.
    #[serde(default)]
    pub opening: String,
    /// Behaviour instructions for the narrator.
    #[serde(default)]
    pub instructions: String,
    /// Running summary of what has happened so far.
    #[serde(default)]
    pub summary: String,
    /// Plot-memory notes the narrator must stay consistent with.
    #[serde(default)]
    pub memory: String,
    #[serde(default)]
    pub ask_user_name: bool,
    #[serde(default)]
    pub ask_user_age: bool,
    #[serde(default)]
    pub ask_user_gender: bool,
    #[serde(default)]
    pub user_id: String,
    /// Remote cover image file id.
    #[serde(default)]
    pub image_id: Option<String>,
    #[serde(default)]
    pub is_local: bool,
    pub created_at: DateTime<Utc>,
}

impl Story {
    /// Generate a fresh id for a story that only lives on this device.
    pub fn new_local_id() -> String {
        format!("{LOCAL_ID_PREFIX}{}", uuid::Uuid::new_v4())
    }

    /// Player attributes this story asks for, in prompt order.
    pub fn attribute_steps(&self) -> Vec<AttributeStep> {
        let mut steps = Vec::new();
        if self.ask_user_name {
            steps.push(AttributeStep::Name);
        }
        if self.ask_user_age {
            steps.push(AttributeStep::Age);
        }
        if self.ask_user_gender {
            steps.push(AttributeStep::Gender);
        }
        steps
    }

    /// Extract the editable fields.
    pub fn to_draft(&self) -> StoryDraft {
        StoryDraft {
            title: self.title.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            opening: self.opening.clone(),
            instructions: self.instructions.clone(),
            summary: self.summary.clone(),
            memory: self.memory.clone(),
            ask_user_name: self.ask_user_name,
            ask_user_age: self.ask_user_age,
            ask_user_gender: self.ask_user_gender,
        }
    }
}

/// A player attribute a story may collect before play starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeStep {
    Name,
    Age,
    Gender,
}

impl AttributeStep {
    /// The question asked for this step.
    pub fn prompt(&self) -> &'static str {
        match self {
            AttributeStep::Name => "What is your name?",
            AttributeStep::Age => "How old are you?",
            AttributeStep::Gender => "What is your gender?",
        }
    }
}

/// Editable story fields, as produced by the creation form or the generator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ResponseSchema)]
pub struct StoryDraft {
    /// Short, evocative title for the story
    pub title: String,
    /// One or two sentence pitch shown in story lists
    pub description: String,
    /// Genre and mood tags, lowercase
    pub tags: Vec<String>,
    /// Opening paragraph that sets the scene and ends on a moment where the player can act
    pub opening: String,
    /// Instructions for the narrator: tone, style, rules of the world
    pub instructions: String,
    /// Brief summary of the premise
    pub summary: String,
    /// Key facts about characters, places and secrets to keep consistent
    pub memory: String,
    /// Whether the player should be asked for their name
    pub ask_user_name: bool,
    /// Whether the player should be asked for their age
    pub ask_user_age: bool,
    /// Whether the player should be asked for their gender
    pub ask_user_gender: bool,
}

impl StoryDraft {
    /// Check required fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::new("title", "must not be empty"));
        }
        if self.opening.trim().is_empty() {
            return Err(ValidationError::new("opening", "must not be empty"));
        }
        Ok(())
    }

    /// Stamp the draft into a full story.
    pub fn into_story(self, user_id: impl Into<String>, id: impl Into<String>, is_local: bool) -> Story {
        Story {
            id: id.into(),
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            tags: normalize_tags(self.tags),
            opening: self.opening.trim().to_string(),
            instructions: self.instructions.trim().to_string(),
            summary: self.summary.trim().to_string(),
            memory: self.memory.trim().to_string(),
            ask_user_name: self.ask_user_name,
            ask_user_age: self.ask_user_age,
            ask_user_gender: self.ask_user_gender,
            user_id: user_id.into(),
            image_id: None,
            is_local,
            created_at: Utc::now(),
        }
    }
}

/// Trim, lowercase and de-duplicate tags, dropping empty ones.
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

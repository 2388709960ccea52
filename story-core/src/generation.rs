//! AI narration.
//!
//! Builds flattened text prompts from a story and its turn log, sends them to
//! the generation endpoint and interprets the reply. Every public
//! [`Narrator`] operation returns `None` on failure after raising an alert;
//! callers treat `None` as "no update" and leave their state untouched.

use crate::alert::Notifier;
use crate::genre::Genre;
use crate::session::{GenerationParams, PlayerAttributes, Session, TurnEntry, TurnKind};
use crate::story::{Story, StoryDraft};
use async_trait::async_trait;
use gemini::Gemini;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Number of most recent turn entries included in a continuation prompt.
pub const HISTORY_WINDOW: usize = 20;

/// Output budget for structured story generation.
const DETAIL_MAX_TOKENS: u32 = 2048;

const CONTINUE_CONSTRAINT: &str = "Continue the story from where it left off. \
Write one or two paragraphs in second person and finish the paragraph: never stop \
mid-sentence. Do not decide the player's next action and do not repeat earlier text.";

/// System instruction for story drafting.
pub const DESIGNER_SYSTEM: &str = "You design premises for interactive text adventures.";

/// Errors from a single generation call.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("No API key configured - set GEMINI_API_KEY")]
    NoApiKey,

    #[error("Gemini API error: {0}")]
    Api(gemini::Error),

    #[error("Response was blocked: {0}")]
    Blocked(String),

    #[error("Response contained no text")]
    Empty,

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl From<gemini::Error> for GenerationError {
    fn from(e: gemini::Error) -> Self {
        match e {
            gemini::Error::NoApiKey => GenerationError::NoApiKey,
            other => GenerationError::Api(other),
        }
    }
}

/// One prompt to send.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub params: GenerationParams,
    pub system: Option<String>,
    /// When set, the reply must be JSON matching this schema.
    pub schema: Option<serde_json::Value>,
}

/// Turns a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError>;
}

/// [`TextGenerator`] backed by the Gemini API.
#[derive(Clone, Default)]
pub struct GeminiGenerator {
    client: Option<Gemini>,
}

impl GeminiGenerator {
    pub fn new(client: Gemini) -> Self {
        Self {
            client: Some(client),
        }
    }

    /// Build from `GEMINI_API_KEY`. A missing key is reported on first use.
    pub fn from_env() -> Self {
        Self {
            client: Gemini::from_env().ok(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.client = self.client.map(|c| c.with_model(model));
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.client.is_some()
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let client = self.client.as_ref().ok_or(GenerationError::NoApiKey)?;

        let mut api_request = gemini::Request::prompt(request.prompt)
            .with_temperature(request.params.temperature)
            .with_top_p(request.params.top_p)
            .with_max_tokens(request.params.max_tokens);
        if let Some(system) = request.system {
            api_request = api_request.with_system(system);
        }
        if let Some(schema) = request.schema {
            api_request = api_request.with_json_schema(schema);
        }

        let response = client.generate(api_request).await?;

        if let Some(reason) = &response.block_reason {
            return Err(GenerationError::Blocked(reason.clone()));
        }
        if response.is_blocked() {
            let reason = response
                .finish_reason()
                .map(|r| format!("{r:?}"))
                .unwrap_or_else(|| "unknown".to_string());
            return Err(GenerationError::Blocked(reason));
        }

        debug!(
            prompt_tokens = response.usage.prompt_tokens,
            output_tokens = response.usage.candidate_tokens,
            model_version = response.model_version.as_deref().unwrap_or("unknown"),
            "generation complete"
        );
        response.text().ok_or(GenerationError::Empty)
    }
}

/// Prompt construction and error reporting around a [`TextGenerator`].
#[derive(Clone)]
pub struct Narrator {
    generator: Arc<dyn TextGenerator>,
    notifier: Arc<dyn Notifier>,
}

impl Narrator {
    pub fn new(generator: Arc<dyn TextGenerator>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            generator,
            notifier,
        }
    }

    /// Generate the next passage of a session, optionally in response to a
    /// player action. Returns the trimmed text.
    pub async fn continue_story(&self, session: &Session, action: Option<&str>) -> Option<String> {
        let prompt = build_continuation_prompt(&session.story, &session.player, &session.turns, action);
        let request = GenerationRequest {
            prompt,
            params: session.params,
            system: None,
            schema: None,
        };
        self.run_text(request, "Story generation failed").await
    }

    /// Invent a full story draft from a free-text idea.
    pub async fn generate_details(&self, idea: &str) -> Option<StoryDraft> {
        self.run_draft(build_details_prompt(idea), None, "Story creation failed")
            .await
    }

    /// Invent a full story draft in the given genre.
    pub async fn quick_start(&self, genre: &Genre) -> Option<StoryDraft> {
        self.run_draft(build_quick_start_prompt(genre), Some(genre), "Quick start failed")
            .await
    }

    /// Condense the running summary and the turn log into a new summary.
    pub async fn summarize(&self, session: &Session) -> Option<String> {
        let request = GenerationRequest {
            prompt: build_summary_prompt(&session.story, &session.turns),
            params: GenerationParams {
                temperature: 0.3,
                top_p: 0.9,
                max_tokens: 300,
            },
            system: None,
            schema: None,
        };
        self.run_text(request, "Summary failed").await
    }

    async fn run_text(&self, request: GenerationRequest, title: &str) -> Option<String> {
        let result = self.generator.generate(request).await.and_then(|text| {
            let text = text.trim();
            if text.is_empty() {
                Err(GenerationError::Empty)
            } else {
                Ok(text.to_string())
            }
        });

        match result {
            Ok(text) => Some(text),
            Err(e) => {
                self.report(title, &e);
                None
            }
        }
    }

    async fn run_draft(&self, prompt: String, genre: Option<&Genre>, title: &str) -> Option<StoryDraft> {
        let request = GenerationRequest {
            prompt,
            params: GenerationParams {
                temperature: 1.0,
                top_p: 0.95,
                max_tokens: DETAIL_MAX_TOKENS,
            },
            system: Some(DESIGNER_SYSTEM.to_string()),
            schema: Some(StoryDraft::response_schema()),
        };

        let result = self
            .generator
            .generate(request)
            .await
            .and_then(|text| parse_draft(&text));

        match result {
            Ok(mut draft) => {
                if let Some(genre) = genre {
                    if draft.tags.is_empty() {
                        draft.tags = genre.tags.iter().map(|t| t.to_string()).collect();
                    }
                }
                Some(draft)
            }
            Err(e) => {
                self.report(title, &e);
                None
            }
        }
    }

    fn report(&self, title: &str, error: &GenerationError) {
        warn!(error = %error, "{title}");
        self.notifier.alert(title, &error.to_string());
    }
}

/// Build the single flattened prompt used to continue a story.
pub fn build_continuation_prompt(
    story: &Story,
    player: &PlayerAttributes,
    turns: &[TurnEntry],
    action: Option<&str>,
) -> String {
    let mut prompt = String::new();

    push_section(&mut prompt, "Instructions", &story.instructions);
    push_section(&mut prompt, "Story summary", &story.summary);
    push_section(&mut prompt, "Memory", &story.memory);
    push_section(&mut prompt, "Player", &describe_player(player));

    let start = turns.len().saturating_sub(HISTORY_WINDOW);
    let history = turns[start..]
        .iter()
        .map(|turn| match turn.kind {
            TurnKind::Ai => turn.text.trim().to_string(),
            TurnKind::User => format!("> {}", turn.text.trim()),
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    push_section(&mut prompt, "Story so far", &history);

    if let Some(action) = action {
        push_section(&mut prompt, "Player action", action);
    }

    prompt.push_str(CONTINUE_CONSTRAINT);
    prompt
}

/// Prompt asking for a story draft built around the player's idea.
pub fn build_details_prompt(idea: &str) -> String {
    format!(
        "Idea from the player:\n{}\n\n\
         Create a complete story around this idea. The opening must be written in \
         second person, set the scene in one or two paragraphs and end at a moment \
         where the player can act. The instructions tell the narrator how to run the \
         story. Only ask for the player's name, age or gender when the story uses them.",
        idea.trim()
    )
}

/// Prompt asking for an original story draft in a genre.
pub fn build_quick_start_prompt(genre: &Genre) -> String {
    format!(
        "Invent an original {} story. Draw on: {}.\n\n\
         The opening must be written in second person, set the scene in one or two \
         paragraphs and end at a moment where the player can act. The instructions \
         tell the narrator how to run the story. Only ask for the player's name, age \
         or gender when the story uses them.",
        genre.name, genre.hints
    )
}

/// Prompt asking for an updated running summary.
pub fn build_summary_prompt(story: &Story, turns: &[TurnEntry]) -> String {
    let mut prompt = String::new();
    push_section(&mut prompt, "Current summary", &story.summary);

    let log = turns
        .iter()
        .map(|turn| match turn.kind {
            TurnKind::Ai => turn.text.trim().to_string(),
            TurnKind::User => format!("> {}", turn.text.trim()),
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    push_section(&mut prompt, "Story so far", &log);

    prompt.push_str(
        "Write an updated summary of the story so far in at most one paragraph. \
         Keep names, places and unresolved threads. Output only the summary.",
    );
    prompt
}

/// Parse a structured reply into a draft.
///
/// Tolerates a Markdown code fence around the JSON.
pub fn parse_draft(text: &str) -> Result<StoryDraft, GenerationError> {
    let body = strip_code_fence(text.trim());
    let draft: StoryDraft =
        serde_json::from_str(body).map_err(|e| GenerationError::Malformed(e.to_string()))?;
    draft
        .validate()
        .map_err(|e| GenerationError::Malformed(e.to_string()))?;
    Ok(draft)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn describe_player(player: &PlayerAttributes) -> String {
    let mut lines = Vec::new();
    if let Some(name) = &player.name {
        lines.push(format!("Name: {name}"));
    }
    if let Some(age) = player.age {
        lines.push(format!("Age: {age}"));
    }
    if let Some(gender) = &player.gender {
        lines.push(format!("Gender: {gender}"));
    }
    lines.join("\n")
}

fn push_section(prompt: &mut String, heading: &str, body: &str) {
    let body = body.trim();
    if body.is_empty() {
        return;
    }
    prompt.push_str(&format!("## {heading}\n{body}\n\n"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genre::find_genre;

    fn story() -> Story {
        StoryDraft {
            title: "Salt Road".to_string(),
            opening: "The caravan halts.".to_string(),
            instructions: "Keep it tense.".to_string(),
            memory: "The guide is lying.".to_string(),
            ..Default::default()
        }
        .into_story("u", "s", false)
    }

    #[test]
    fn test_continuation_prompt_sections() {
        let player = PlayerAttributes {
            name: Some("Ines".to_string()),
            ..Default::default()
        };
        let turns = vec![TurnEntry::ai("The caravan halts."), TurnEntry::user("look around")];
        let prompt = build_continuation_prompt(&story(), &player, &turns, Some("draw my knife"));

        assert!(prompt.starts_with("## Instructions\nKeep it tense."));
        assert!(!prompt.contains("## Story summary"));
        assert!(prompt.contains("## Memory\nThe guide is lying."));
        assert!(prompt.contains("## Player\nName: Ines"));
        assert!(prompt.contains("The caravan halts.\n\n> look around"));
        assert!(prompt.contains("## Player action\ndraw my knife"));
        assert!(prompt.ends_with(CONTINUE_CONSTRAINT));
        assert!(prompt.contains("finish the paragraph"));
    }

    #[test]
    fn test_continuation_prompt_without_action() {
        let prompt = build_continuation_prompt(&story(), &PlayerAttributes::default(), &[], None);
        assert!(!prompt.contains("## Player action"));
        assert!(!prompt.contains("## Player\n"));
        assert!(!prompt.contains("## Story so far"));
    }

    #[test]
    fn test_history_window() {
        let turns: Vec<TurnEntry> = (0..30).map(|i| TurnEntry::ai(format!("passage {i}"))).collect();
        let prompt = build_continuation_prompt(&story(), &PlayerAttributes::default(), &turns, None);
        assert!(!prompt.contains("passage 9\n"));
        assert!(prompt.contains("passage 10"));
        assert!(prompt.contains("passage 29"));
    }

    #[test]
    fn test_parse_draft_with_fence() {
        let text = "```json\n{\"title\":\"A\",\"description\":\"\",\"tags\":[],\"opening\":\"B\",\"instructions\":\"\",\"summary\":\"\",\"memory\":\"\",\"ask_user_name\":true,\"ask_user_age\":false,\"ask_user_gender\":false}\n```";
        let draft = parse_draft(text).unwrap();
        assert_eq!(draft.title, "A");
        assert!(draft.ask_user_name);
    }

    #[test]
    fn test_parse_draft_rejects_garbage_and_invalid() {
        assert!(matches!(parse_draft("not json"), Err(GenerationError::Malformed(_))));
        let empty_title = r#"{"title":"","description":"","tags":[],"opening":"x","instructions":"","summary":"","memory":"","ask_user_name":false,"ask_user_age":false,"ask_user_gender":false}"#;
        assert!(matches!(parse_draft(empty_title), Err(GenerationError::Malformed(_))));
    }

    #[test]
    fn test_quick_start_prompt_mentions_genre() {
        let genre = find_genre("western").unwrap();
        let prompt = build_quick_start_prompt(genre);
        assert!(prompt.contains("original Western story"));
        assert!(prompt.contains("outlaws"));
    }

    #[test]
    fn test_summary_prompt() {
        let mut s = story();
        s.summary = "A caravan crosses the desert.".to_string();
        let prompt = build_summary_prompt(&s, &[TurnEntry::user("wait")]);
        assert!(prompt.contains("## Current summary\nA caravan crosses the desert."));
        assert!(prompt.contains("> wait"));
    }

    #[test]
    fn test_gemini_error_mapping() {
        assert!(matches!(
            GenerationError::from(gemini::Error::NoApiKey),
            GenerationError::NoApiKey
        ));
        assert!(matches!(
            GenerationError::from(gemini::Error::Network("x".into())),
            GenerationError::Api(_)
        ));
    }

    #[tokio::test]
    async fn test_generator_without_key() {
        let generator = GeminiGenerator::default();
        assert!(!generator.has_api_key());
        let err = generator
            .generate(GenerationRequest {
                prompt: "x".into(),
                params: GenerationParams::default(),
                system: None,
                schema: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::NoApiKey));
    }
}

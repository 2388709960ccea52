//! Testing utilities for the storyteller.
//!
//! This module provides tools for integration testing:
//! - `MockGenerator` for deterministic narration without API calls
//! - `MemoryBackend` standing in for the hosted database and storage
//! - `RecordingNotifier` to assert on alerts
//! - `TestHarness` wiring them to an in-memory history store

use crate::alert::Notifier;
use crate::backend::{Backend, BackendError, OAuthProvider, Page, StoryQuery, User};
use crate::covers::{CoverCache, CoverSource};
use crate::generation::{GenerationError, GenerationRequest, Narrator, TextGenerator};
use crate::history::HistoryStore;
use crate::play::{PlayError, PlaySession};
use crate::storage::MemoryStore;
use crate::story::{Story, StoryDraft};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;

/// A scripted generator reply.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return this text.
    Text(String),
    /// Fail as if the endpoint rejected the request.
    Fail(String),
    /// Fail as if no API key were configured.
    NoApiKey,
}

impl MockResponse {
    pub fn text(text: impl Into<String>) -> Self {
        MockResponse::Text(text.into())
    }

    pub fn fail(message: impl Into<String>) -> Self {
        MockResponse::Fail(message.into())
    }

    /// A structured reply encoding `draft` as JSON.
    pub fn draft(draft: &StoryDraft) -> Self {
        MockResponse::Text(serde_json::to_string(draft).unwrap_or_default())
    }
}

/// A generator that returns scripted replies in order.
///
/// Once the script runs out every call fails.
#[derive(Default)]
pub struct MockGenerator {
    responses: AsyncMutex<VecDeque<MockResponse>>,
    requests: AsyncMutex<Vec<GenerationRequest>>,
}

impl MockGenerator {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: AsyncMutex::new(responses.into()),
            requests: AsyncMutex::new(Vec::new()),
        }
    }

    /// Add a reply to the end of the script.
    pub async fn queue(&self, response: MockResponse) {
        self.responses.lock().await.push_back(response);
    }

    /// Every request received so far.
    pub async fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn last_prompt(&self) -> Option<String> {
        self.requests.lock().await.last().map(|r| r.prompt.clone())
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        self.requests.lock().await.push(request);
        match self.responses.lock().await.pop_front() {
            Some(MockResponse::Text(text)) => Ok(text),
            Some(MockResponse::Fail(message)) => Err(GenerationError::Api(gemini::Error::Api {
                status: 500,
                message,
            })),
            Some(MockResponse::NoApiKey) => Err(GenerationError::NoApiKey),
            None => Err(GenerationError::Empty),
        }
    }
}

/// Collects alerts instead of showing them.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    alerts: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(title, message)` pairs in the order raised.
    pub fn alerts(&self) -> Vec<(String, String)> {
        self.alerts.lock().map(|a| a.clone()).unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.alerts.lock().map(|a| a.len()).unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn alert(&self, title: &str, message: &str) {
        if let Ok(mut alerts) = self.alerts.lock() {
            alerts.push((title.to_string(), message.to_string()));
        }
    }
}

/// In-memory stand-in for the hosted backend.
#[derive(Default)]
pub struct MemoryBackend {
    stories: AsyncMutex<Vec<Story>>,
    covers: AsyncMutex<HashMap<String, Vec<u8>>>,
    user: AsyncMutex<Option<User>>,
    accounts: AsyncMutex<HashMap<String, (String, User)>>,
    next_id: AsyncMutex<u64>,
    reject_creates: AsyncMutex<bool>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account that `sign_in` will accept.
    pub async fn add_account(&self, email: &str, password: &str, user_id: &str) {
        let user = User {
            id: user_id.to_string(),
            name: email.split('@').next().unwrap_or_default().to_string(),
            email: email.to_string(),
        };
        self.accounts
            .lock()
            .await
            .insert(email.to_string(), (password.to_string(), user));
    }

    /// Insert a story as if it already existed remotely.
    pub async fn insert_story(&self, story: Story) {
        self.stories.lock().await.push(story);
    }

    /// Insert a cover file as if it already existed remotely.
    pub async fn insert_cover(&self, file_id: &str, bytes: Vec<u8>) {
        self.covers.lock().await.insert(file_id.to_string(), bytes);
    }

    pub async fn story_count(&self) -> usize {
        self.stories.lock().await.len()
    }

    pub async fn has_cover(&self, file_id: &str) -> bool {
        self.covers.lock().await.contains_key(file_id)
    }

    pub async fn cover_count(&self) -> usize {
        self.covers.lock().await.len()
    }

    /// Make every following `create_story` fail as a server error.
    pub async fn reject_creates(&self) {
        *self.reject_creates.lock().await = true;
    }

    async fn fresh_id(&self, prefix: &str) -> String {
        let mut next = self.next_id.lock().await;
        *next += 1;
        format!("{prefix}-{next}")
    }
}

#[async_trait]
impl CoverSource for MemoryBackend {
    async fn fetch_cover(&self, file_id: &str) -> Result<Vec<u8>, BackendError> {
        self.download_cover(file_id).await
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<User, BackendError> {
        let accounts = self.accounts.lock().await;
        match accounts.get(email) {
            Some((expected, user)) if expected == password => {
                *self.user.lock().await = Some(user.clone());
                Ok(user.clone())
            }
            _ => Err(BackendError::NotAuthenticated),
        }
    }

    fn oauth_url(
        &self,
        provider: OAuthProvider,
        success: &str,
        failure: &str,
    ) -> Result<String, BackendError> {
        Ok(format!(
            "memory://oauth2/{}?success={success}&failure={failure}",
            provider.slug()
        ))
    }

    async fn current_user(&self) -> Result<User, BackendError> {
        self.user
            .lock()
            .await
            .clone()
            .ok_or(BackendError::NotAuthenticated)
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        *self.user.lock().await = None;
        Ok(())
    }

    async fn list_stories(&self, query: &StoryQuery) -> Result<Page<Story>, BackendError> {
        let mut stories: Vec<Story> = self
            .stories
            .lock()
            .await
            .iter()
            .filter(|s| query.owner.as_ref().map_or(true, |o| &s.user_id == o))
            .cloned()
            .collect();
        stories.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let start = match &query.cursor {
            Some(cursor) => stories
                .iter()
                .position(|s| &s.id == cursor)
                .map(|i| i + 1)
                .ok_or_else(|| BackendError::NotFound(format!("cursor {cursor}")))?,
            None => 0,
        };

        let items: Vec<Story> = stories.into_iter().skip(start).take(query.limit).collect();
        let next_cursor = if items.len() >= query.limit {
            items.last().map(|s| s.id.clone())
        } else {
            None
        };
        Ok(Page { items, next_cursor })
    }

    async fn stories_by_ids(&self, ids: &[String]) -> Result<Vec<Story>, BackendError> {
        Ok(self
            .stories
            .lock()
            .await
            .iter()
            .filter(|s| ids.contains(&s.id))
            .cloned()
            .collect())
    }

    async fn story(&self, id: &str) -> Result<Story, BackendError> {
        self.stories
            .lock()
            .await
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("story {id}")))
    }

    async fn create_story(&self, story: &Story) -> Result<Story, BackendError> {
        if *self.reject_creates.lock().await {
            return Err(BackendError::Api {
                status: 500,
                message: "document rejected".to_string(),
            });
        }
        let mut created = story.clone();
        created.id = self.fresh_id("doc").await;
        created.is_local = false;
        self.stories.lock().await.push(created.clone());
        Ok(created)
    }

    async fn update_story(&self, story: &Story) -> Result<Story, BackendError> {
        let mut stories = self.stories.lock().await;
        let existing = stories
            .iter_mut()
            .find(|s| s.id == story.id)
            .ok_or_else(|| BackendError::NotFound(format!("story {}", story.id)))?;
        *existing = story.clone();
        Ok(story.clone())
    }

    async fn delete_story(&self, id: &str) -> Result<(), BackendError> {
        let mut stories = self.stories.lock().await;
        let before = stories.len();
        stories.retain(|s| s.id != id);
        if stories.len() == before {
            return Err(BackendError::NotFound(format!("story {id}")));
        }
        Ok(())
    }

    async fn upload_cover(&self, _file_name: &str, bytes: Vec<u8>) -> Result<String, BackendError> {
        let id = self.fresh_id("file").await;
        self.covers.lock().await.insert(id.clone(), bytes);
        Ok(id)
    }

    async fn download_cover(&self, file_id: &str) -> Result<Vec<u8>, BackendError> {
        self.covers
            .lock()
            .await
            .get(file_id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("cover {file_id}")))
    }

    async fn delete_cover(&self, file_id: &str) -> Result<(), BackendError> {
        self.covers.lock().await.remove(file_id);
        Ok(())
    }
}

/// Test harness wiring mocks to an in-memory history store.
pub struct TestHarness {
    pub generator: Arc<MockGenerator>,
    pub notifier: Arc<RecordingNotifier>,
    pub backend: Arc<MemoryBackend>,
    pub history: HistoryStore,
    pub narrator: Narrator,
    covers_dir: PathBuf,
}

impl TestHarness {
    /// Create a harness whose cover cache lives in a fresh temporary directory.
    pub fn new() -> Self {
        let covers_dir =
            std::env::temp_dir().join(format!("story-covers-{}", uuid::Uuid::new_v4()));
        Self::with_covers_dir(covers_dir)
    }

    pub fn with_covers_dir(covers_dir: PathBuf) -> Self {
        let generator = Arc::new(MockGenerator::default());
        let notifier = Arc::new(RecordingNotifier::new());
        let history = HistoryStore::new(
            Arc::new(MemoryStore::new()),
            CoverCache::new(covers_dir.clone()),
        );
        let narrator = Narrator::new(generator.clone(), notifier.clone());

        Self {
            generator,
            notifier,
            backend: Arc::new(MemoryBackend::new()),
            history,
            narrator,
            covers_dir,
        }
    }

    /// Queue a narrative reply.
    pub async fn expect_text(&self, text: impl Into<String>) -> &Self {
        self.generator.queue(MockResponse::text(text)).await;
        self
    }

    /// Queue a failed reply.
    pub async fn expect_failure(&self, message: impl Into<String>) -> &Self {
        self.generator.queue(MockResponse::fail(message)).await;
        self
    }

    /// Start a session for `story`, fetching covers from the memory backend.
    pub async fn start(&self, story: &Story) -> Result<PlaySession, PlayError> {
        PlaySession::start(
            self.history.clone(),
            self.narrator.clone(),
            story,
            self.backend.as_ref(),
        )
        .await
    }

    pub async fn resume(&self, session_id: &str) -> Result<PlaySession, PlayError> {
        PlaySession::resume(self.history.clone(), self.narrator.clone(), session_id).await
    }

    pub fn alert_count(&self) -> usize {
        self.notifier.count()
    }

    pub fn covers_dir(&self) -> &std::path::Path {
        &self.covers_dir
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.covers_dir);
    }
}

/// A ready-made story for tests.
pub fn sample_story(id: &str) -> Story {
    StoryDraft {
        title: "The Lantern Keeper".to_string(),
        description: "A lighthouse, a storm, a ship that should not be there.".to_string(),
        tags: vec!["mystery".to_string()],
        opening: "Rain hammers the lamp room as you climb the last stair.".to_string(),
        instructions: "Narrate in second person. Keep the tone eerie.".to_string(),
        summary: String::new(),
        memory: "The ship is a ghost of the wreck from 1893.".to_string(),
        ask_user_name: false,
        ask_user_age: false,
        ask_user_gender: false,
    }
    .into_story("user-1", id, false)
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert that no alert was raised.
#[track_caller]
pub fn assert_no_alerts(harness: &TestHarness) {
    let alerts = harness.notifier.alerts();
    assert!(alerts.is_empty(), "Expected no alerts, got {alerts:?}");
}

/// Assert the number of turn entries in a session.
#[track_caller]
pub fn assert_turn_count(play: &PlaySession, expected: usize) {
    assert_eq!(
        play.turns().len(),
        expected,
        "Expected {expected} turn entries, got {}",
        play.turns().len()
    );
}

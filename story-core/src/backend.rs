//! Remote backend client.
//!
//! A thin wrapper over the hosted document database, object storage and
//! session auth service. [`HttpBackend`] speaks the Appwrite REST dialect;
//! tests use [`crate::testing::MemoryBackend`].

use crate::covers::CoverSource;
use crate::storage::{KeyValueStore, StorageError};
use crate::story::Story;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, COOKIE, SET_COOKIE};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Default page size for story listings.
pub const DEFAULT_PAGE_SIZE: usize = 25;

/// Store key holding the signed-in session between runs.
pub const SESSION_KEY: &str = "backend_session";

/// Errors from backend operations.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Session storage error: {0}")]
    Storage(#[from] StorageError),
}

/// The signed-in account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// Supported OAuth identity providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
    Facebook,
}

impl OAuthProvider {
    pub fn slug(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Facebook => "facebook",
        }
    }
}

/// Filter and paging for story listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryQuery {
    /// Only stories owned by this user.
    pub owner: Option<String>,
    pub limit: usize,
    /// Id of the last story of the previous page.
    pub cursor: Option<String>,
}

impl Default for StoryQuery {
    fn default() -> Self {
        Self {
            owner: None,
            limit: DEFAULT_PAGE_SIZE,
            cursor: None,
        }
    }
}

impl StoryQuery {
    pub fn owned_by(owner: impl Into<String>) -> Self {
        Self {
            owner: Some(owner.into()),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub fn after(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }
}

/// One page of results.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor for the following page, `None` on the last page.
    pub next_cursor: Option<String>,
}

/// Hosted database, storage and auth.
#[async_trait]
pub trait Backend: CoverSource {
    async fn sign_in(&self, email: &str, password: &str) -> Result<User, BackendError>;

    /// URL that starts an OAuth sign-in in a browser.
    fn oauth_url(
        &self,
        provider: OAuthProvider,
        success: &str,
        failure: &str,
    ) -> Result<String, BackendError>;

    async fn current_user(&self) -> Result<User, BackendError>;

    async fn sign_out(&self) -> Result<(), BackendError>;

    /// Stories newest first.
    async fn list_stories(&self, query: &StoryQuery) -> Result<Page<Story>, BackendError>;

    async fn stories_by_ids(&self, ids: &[String]) -> Result<Vec<Story>, BackendError>;

    async fn story(&self, id: &str) -> Result<Story, BackendError>;

    /// Persist a new story; the returned copy carries the remote id.
    async fn create_story(&self, story: &Story) -> Result<Story, BackendError>;

    async fn update_story(&self, story: &Story) -> Result<Story, BackendError>;

    async fn delete_story(&self, id: &str) -> Result<(), BackendError>;

    /// Upload a cover image, returning its file id.
    async fn upload_cover(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, BackendError>;

    async fn download_cover(&self, file_id: &str) -> Result<Vec<u8>, BackendError>;

    async fn delete_cover(&self, file_id: &str) -> Result<(), BackendError>;
}

// ============================================================================
// HTTP implementation
// ============================================================================

/// Where the hosted backend lives and which resources to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub endpoint: String,
    pub project: String,
    pub database_id: String,
    pub collection_id: String,
    pub bucket_id: String,
    /// Server API key, for trusted callers. Regular clients sign in instead.
    pub api_key: Option<String>,
}

/// A signed-in session as kept in the store.
#[derive(Debug, Serialize, Deserialize)]
struct SavedSession {
    cookie: String,
}

/// REST client for an Appwrite-compatible backend.
///
/// The session cookie from `sign_in` lives in memory. With a session store
/// attached it is also saved there and [`HttpBackend::restore_session`] picks
/// it up on the next run.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    config: BackendConfig,
    cookie: Arc<RwLock<Option<String>>>,
    session_store: Option<Arc<dyn KeyValueStore>>,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: BackendConfig {
                endpoint: config.endpoint.trim_end_matches('/').to_string(),
                ..config
            },
            cookie: Arc::new(RwLock::new(None)),
            session_store: None,
        }
    }

    /// Keep the signed-in session in `store` across runs.
    pub fn with_session_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.session_store = Some(store);
        self
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Load a saved session cookie. Returns whether one was found.
    pub async fn restore_session(&self) -> Result<bool, BackendError> {
        let Some(store) = &self.session_store else {
            return Ok(false);
        };
        let Some(raw) = store.get(SESSION_KEY).await? else {
            return Ok(false);
        };
        let saved: SavedSession = match serde_json::from_str(&raw) {
            Ok(saved) => saved,
            Err(e) => {
                warn!(error = %e, "discarding unreadable saved session");
                store.remove(SESSION_KEY).await?;
                return Ok(false);
            }
        };
        *self.cookie.write().await = Some(saved.cookie);
        debug!("restored saved session");
        Ok(true)
    }

    async fn remember_session(&self, cookie: String) -> Result<(), BackendError> {
        if let Some(store) = &self.session_store {
            let raw = serde_json::to_string(&SavedSession {
                cookie: cookie.clone(),
            })
            .map_err(|e| BackendError::Parse(e.to_string()))?;
            store.set(SESSION_KEY, &raw).await?;
        }
        *self.cookie.write().await = Some(cookie);
        Ok(())
    }

    async fn forget_session(&self) -> Result<(), BackendError> {
        *self.cookie.write().await = None;
        if let Some(store) = &self.session_store {
            store.remove(SESSION_KEY).await?;
        }
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.endpoint)
    }

    fn documents_path(&self) -> String {
        format!(
            "/databases/{}/collections/{}/documents",
            self.config.database_id, self.config.collection_id
        )
    }

    fn files_path(&self) -> String {
        format!("/storage/buckets/{}/files", self.config.bucket_id)
    }

    async fn build_headers(&self, json_body: bool) -> Result<HeaderMap, BackendError> {
        let mut headers = HeaderMap::new();
        if json_body {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        headers.insert(
            "x-appwrite-project",
            HeaderValue::from_str(&self.config.project)
                .map_err(|e| BackendError::Config(format!("Invalid project id: {e}")))?,
        );
        if let Some(key) = &self.config.api_key {
            headers.insert(
                "x-appwrite-key",
                HeaderValue::from_str(key)
                    .map_err(|e| BackendError::Config(format!("Invalid API key: {e}")))?,
            );
        }
        if let Some(cookie) = self.cookie.read().await.as_deref() {
            headers.insert(
                COOKIE,
                HeaderValue::from_str(cookie)
                    .map_err(|e| BackendError::Config(format!("Invalid session cookie: {e}")))?,
            );
        }
        Ok(headers)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, BackendError> {
        let response = request
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = api_error_message(&body);
        Err(match status.as_u16() {
            401 => BackendError::NotAuthenticated,
            404 => BackendError::NotFound(message),
            code => BackendError::Api {
                status: code,
                message,
            },
        })
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, BackendError> {
        response
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))
    }
}

#[async_trait]
impl CoverSource for HttpBackend {
    async fn fetch_cover(&self, file_id: &str) -> Result<Vec<u8>, BackendError> {
        self.download_cover(file_id).await
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<User, BackendError> {
        let headers = self.build_headers(true).await?;
        let response = self
            .send(
                self.client
                    .post(self.url("/account/sessions/email"))
                    .headers(headers)
                    .json(&json!({ "email": email, "password": password })),
            )
            .await?;

        let Some(cookie) = session_cookie(response.headers()) else {
            return Err(BackendError::Parse(
                "sign-in response carried no session cookie".to_string(),
            ));
        };
        self.remember_session(cookie).await?;

        debug!("signed in with email");
        self.current_user().await
    }

    fn oauth_url(
        &self,
        provider: OAuthProvider,
        success: &str,
        failure: &str,
    ) -> Result<String, BackendError> {
        let base = self.url(&format!("/account/sessions/oauth2/{}", provider.slug()));
        reqwest::Url::parse_with_params(
            &base,
            &[
                ("project", self.config.project.as_str()),
                ("success", success),
                ("failure", failure),
            ],
        )
        .map(|url| url.to_string())
        .map_err(|e| BackendError::Config(format!("Invalid endpoint: {e}")))
    }

    async fn current_user(&self) -> Result<User, BackendError> {
        let headers = self.build_headers(false).await?;
        let response = self
            .send(self.client.get(self.url("/account")).headers(headers))
            .await?;
        Self::parse(response).await
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        let headers = self.build_headers(false).await?;
        let result = self
            .send(
                self.client
                    .delete(self.url("/account/sessions/current"))
                    .headers(headers),
            )
            .await;
        self.forget_session().await?;
        result.map(|_| ())
    }

    async fn list_stories(&self, query: &StoryQuery) -> Result<Page<Story>, BackendError> {
        let queries = story_queries(query);
        let params: Vec<(&str, &str)> = queries.iter().map(|q| ("queries[]", q.as_str())).collect();

        let headers = self.build_headers(false).await?;
        let response = self
            .send(
                self.client
                    .get(self.url(&self.documents_path()))
                    .headers(headers)
                    .query(&params),
            )
            .await?;

        let list: DocumentList = Self::parse(response).await?;
        let items: Vec<Story> = list.documents.into_iter().map(Story::from).collect();
        let next_cursor = if items.len() >= query.limit {
            items.last().map(|s| s.id.clone())
        } else {
            None
        };

        Ok(Page { items, next_cursor })
    }

    async fn stories_by_ids(&self, ids: &[String]) -> Result<Vec<Story>, BackendError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let queries = [
            json!({ "method": "equal", "attribute": "$id", "values": ids }).to_string(),
            json!({ "method": "limit", "values": [ids.len()] }).to_string(),
        ];
        let params: Vec<(&str, &str)> = queries.iter().map(|q| ("queries[]", q.as_str())).collect();

        let headers = self.build_headers(false).await?;
        let response = self
            .send(
                self.client
                    .get(self.url(&self.documents_path()))
                    .headers(headers)
                    .query(&params),
            )
            .await?;

        let list: DocumentList = Self::parse(response).await?;
        Ok(list.documents.into_iter().map(Story::from).collect())
    }

    async fn story(&self, id: &str) -> Result<Story, BackendError> {
        let headers = self.build_headers(false).await?;
        let response = self
            .send(
                self.client
                    .get(self.url(&format!("{}/{id}", self.documents_path())))
                    .headers(headers),
            )
            .await?;
        let doc: StoryDocument = Self::parse(response).await?;
        Ok(doc.into())
    }

    async fn create_story(&self, story: &Story) -> Result<Story, BackendError> {
        let headers = self.build_headers(true).await?;
        let body = json!({
            "documentId": "unique()",
            "data": StoryDocument::from(story),
        });
        let response = self
            .send(
                self.client
                    .post(self.url(&self.documents_path()))
                    .headers(headers)
                    .json(&body),
            )
            .await?;
        let doc: StoryDocument = Self::parse(response).await?;
        debug!(story = %doc.id, "created remote story");
        Ok(doc.into())
    }

    async fn update_story(&self, story: &Story) -> Result<Story, BackendError> {
        let headers = self.build_headers(true).await?;
        let body = json!({ "data": StoryDocument::from(story) });
        let response = self
            .send(
                self.client
                    .patch(self.url(&format!("{}/{}", self.documents_path(), story.id)))
                    .headers(headers)
                    .json(&body),
            )
            .await?;
        let doc: StoryDocument = Self::parse(response).await?;
        Ok(doc.into())
    }

    async fn delete_story(&self, id: &str) -> Result<(), BackendError> {
        let headers = self.build_headers(false).await?;
        self.send(
            self.client
                .delete(self.url(&format!("{}/{id}", self.documents_path())))
                .headers(headers),
        )
        .await?;
        debug!(story = id, "deleted remote story");
        Ok(())
    }

    async fn upload_cover(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, BackendError> {
        let headers = self.build_headers(false).await?;
        let form = reqwest::multipart::Form::new()
            .text("fileId", "unique()")
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string()),
            );
        let response = self
            .send(
                self.client
                    .post(self.url(&self.files_path()))
                    .headers(headers)
                    .multipart(form),
            )
            .await?;

        let file: FileDocument = Self::parse(response).await?;
        Ok(file.id)
    }

    async fn download_cover(&self, file_id: &str) -> Result<Vec<u8>, BackendError> {
        let headers = self.build_headers(false).await?;
        let response = self
            .send(
                self.client
                    .get(self.url(&format!("{}/{file_id}/download", self.files_path())))
                    .headers(headers),
            )
            .await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn delete_cover(&self, file_id: &str) -> Result<(), BackendError> {
        let headers = self.build_headers(false).await?;
        self.send(
            self.client
                .delete(self.url(&format!("{}/{file_id}", self.files_path())))
                .headers(headers),
        )
        .await?;
        Ok(())
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct DocumentList {
    #[serde(default)]
    documents: Vec<StoryDocument>,
}

#[derive(Debug, Deserialize)]
struct FileDocument {
    #[serde(rename = "$id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// A story as stored in the remote collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoryDocument {
    #[serde(rename = "$id", default, skip_serializing)]
    id: String,
    #[serde(rename = "$createdAt", default, skip_serializing)]
    created_at: Option<DateTime<Utc>>,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    opening: String,
    #[serde(default)]
    instructions: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    memory: String,
    #[serde(default)]
    ask_user_name: bool,
    #[serde(default)]
    ask_user_age: bool,
    #[serde(default)]
    ask_user_gender: bool,
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    image_id: Option<String>,
}

impl From<&Story> for StoryDocument {
    fn from(story: &Story) -> Self {
        Self {
            id: story.id.clone(),
            created_at: Some(story.created_at),
            title: story.title.clone(),
            description: story.description.clone(),
            tags: story.tags.clone(),
            opening: story.opening.clone(),
            instructions: story.instructions.clone(),
            summary: story.summary.clone(),
            memory: story.memory.clone(),
            ask_user_name: story.ask_user_name,
            ask_user_age: story.ask_user_age,
            ask_user_gender: story.ask_user_gender,
            user_id: story.user_id.clone(),
            image_id: story.image_id.clone(),
        }
    }
}

impl From<StoryDocument> for Story {
    fn from(doc: StoryDocument) -> Self {
        Story {
            id: doc.id,
            title: doc.title,
            description: doc.description,
            tags: doc.tags,
            opening: doc.opening,
            instructions: doc.instructions,
            summary: doc.summary,
            memory: doc.memory,
            ask_user_name: doc.ask_user_name,
            ask_user_age: doc.ask_user_age,
            ask_user_gender: doc.ask_user_gender,
            user_id: doc.user_id,
            image_id: doc.image_id,
            is_local: false,
            created_at: doc.created_at.unwrap_or_else(Utc::now),
        }
    }
}

/// Query strings for a story listing, newest first.
fn story_queries(query: &StoryQuery) -> Vec<String> {
    let mut queries = Vec::new();
    if let Some(owner) = &query.owner {
        queries.push(json!({ "method": "equal", "attribute": "user_id", "values": [owner] }).to_string());
    }
    queries.push(json!({ "method": "orderDesc", "attribute": "$createdAt" }).to_string());
    queries.push(json!({ "method": "limit", "values": [query.limit] }).to_string());
    if let Some(cursor) = &query.cursor {
        queries.push(json!({ "method": "cursorAfter", "values": [cursor] }).to_string());
    }
    queries
}

/// Collapse `Set-Cookie` headers into a single `Cookie` header value.
fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let pairs: Vec<&str> = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .map(str::trim)
        .filter(|pair| pair.contains('='))
        .collect();

    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BackendConfig {
        BackendConfig {
            endpoint: "https://cloud.example.com/v1/".to_string(),
            project: "proj".to_string(),
            database_id: "db".to_string(),
            collection_id: "stories".to_string(),
            bucket_id: "covers".to_string(),
            api_key: None,
        }
    }

    #[test]
    fn test_paths() {
        let backend = HttpBackend::new(config());
        assert_eq!(backend.config().endpoint, "https://cloud.example.com/v1");
        assert_eq!(
            backend.url(&backend.documents_path()),
            "https://cloud.example.com/v1/databases/db/collections/stories/documents"
        );
        assert_eq!(backend.files_path(), "/storage/buckets/covers/files");
    }

    #[tokio::test]
    async fn test_session_cookie_survives_restart() {
        use crate::storage::MemoryStore;

        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let first = HttpBackend::new(config()).with_session_store(Arc::clone(&store));
        first
            .remember_session("a_session_proj=token123".to_string())
            .await
            .unwrap();
        assert!(store.get(SESSION_KEY).await.unwrap().is_some());

        let second = HttpBackend::new(config()).with_session_store(Arc::clone(&store));
        assert!(second.build_headers(false).await.unwrap().get(COOKIE).is_none());
        assert!(second.restore_session().await.unwrap());
        let headers = second.build_headers(false).await.unwrap();
        assert_eq!(headers.get(COOKIE).unwrap(), "a_session_proj=token123");

        second.forget_session().await.unwrap();
        assert!(store.get(SESSION_KEY).await.unwrap().is_none());
        let third = HttpBackend::new(config()).with_session_store(store);
        assert!(!third.restore_session().await.unwrap());
    }

    #[tokio::test]
    async fn test_unreadable_saved_session_is_discarded() {
        use crate::storage::MemoryStore;

        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store.set(SESSION_KEY, "not json").await.unwrap();

        let backend = HttpBackend::new(config()).with_session_store(Arc::clone(&store));
        assert!(!backend.restore_session().await.unwrap());
        assert!(store.get(SESSION_KEY).await.unwrap().is_none());
        assert!(backend.build_headers(false).await.unwrap().get(COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_restore_without_store_is_a_no_op() {
        let backend = HttpBackend::new(config());
        assert!(!backend.restore_session().await.unwrap());
    }

    #[test]
    fn test_oauth_url() {
        let backend = HttpBackend::new(config());
        let url = backend
            .oauth_url(OAuthProvider::Google, "app://ok", "app://fail")
            .unwrap();
        assert!(url.starts_with("https://cloud.example.com/v1/account/sessions/oauth2/google?"));
        assert!(url.contains("project=proj"));
        assert!(url.contains("success=app%3A%2F%2Fok"));
    }

    #[test]
    fn test_story_queries() {
        let query = StoryQuery::owned_by("user-1").with_limit(10).after("doc-9");
        let queries = story_queries(&query);
        assert_eq!(queries.len(), 4);

        let equal: serde_json::Value = serde_json::from_str(&queries[0]).unwrap();
        assert_eq!(equal["attribute"], "user_id");
        assert_eq!(equal["values"][0], "user-1");

        let cursor: serde_json::Value = serde_json::from_str(&queries[3]).unwrap();
        assert_eq!(cursor["method"], "cursorAfter");
        assert_eq!(cursor["values"][0], "doc-9");
    }

    #[test]
    fn test_unfiltered_query() {
        let queries = story_queries(&StoryQuery::default());
        assert_eq!(queries.len(), 2);
        assert!(queries[0].contains("orderDesc"));
    }

    #[test]
    fn test_document_conversion() {
        let raw = json!({
            "$id": "doc-1",
            "$createdAt": "2024-03-01T12:00:00.000+00:00",
            "$permissions": [],
            "title": "Harbor Lights",
            "opening": "The tide is out.",
            "tags": ["mystery"],
            "ask_user_name": true,
            "user_id": "user-1",
            "image_id": "file-7"
        });
        let doc: StoryDocument = serde_json::from_value(raw).unwrap();
        let story: Story = doc.into();
        assert_eq!(story.id, "doc-1");
        assert!(!story.is_local);
        assert!(story.ask_user_name);
        assert_eq!(story.image_id.as_deref(), Some("file-7"));

        let data = serde_json::to_value(StoryDocument::from(&story)).unwrap();
        assert!(data.get("$id").is_none());
        assert!(data.get("is_local").is_none());
        assert_eq!(data["title"], "Harbor Lights");
    }

    #[test]
    fn test_session_cookie() {
        let mut headers = HeaderMap::new();
        headers.append(
            SET_COOKIE,
            HeaderValue::from_static("a_session_proj=abc123; expires=Fri, 01 Jan 2100 00:00:00 GMT; path=/; secure"),
        );
        headers.append(
            SET_COOKIE,
            HeaderValue::from_static("a_session_proj_legacy=abc123; path=/"),
        );
        assert_eq!(
            session_cookie(&headers).as_deref(),
            Some("a_session_proj=abc123; a_session_proj_legacy=abc123")
        );
        assert_eq!(session_cookie(&HeaderMap::new()), None);
    }

    #[test]
    fn test_api_error_message() {
        assert_eq!(
            api_error_message(r#"{"message":"Invalid credentials","code":401}"#),
            "Invalid credentials"
        );
        assert_eq!(api_error_message("oops"), "oops");
    }
}

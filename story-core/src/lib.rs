//! Interactive storytelling engine with an AI narrator.
//!
//! This crate provides:
//! - Story and session data model
//! - Gemini-backed narration, story drafting and quick start
//! - On-device history of sessions, local creations and cached covers
//! - A hosted backend for published stories and accounts
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use story_core::{GeminiGenerator, HistoryStore, LogNotifier, Narrator, NoCovers, PlaySession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let history = HistoryStore::open("./data");
//!     let narrator = Narrator::new(Arc::new(GeminiGenerator::from_env()), Arc::new(LogNotifier));
//!
//!     let genre = story_core::random_genre();
//!     let Some(draft) = narrator.quick_start(genre).await else { return Ok(()) };
//!     let story = draft.into_story("me", story_core::Story::new_local_id(), true);
//!
//!     let mut play = PlaySession::start(history, narrator, &story, &NoCovers).await?;
//!     if let Some(entries) = play.take_turn(Some("I open the door")).await? {
//!         println!("{}", entries.last().map(|e| e.text.as_str()).unwrap_or_default());
//!     }
//!     Ok(())
//! }
//! ```

pub mod alert;
pub mod backend;
pub mod config;
pub mod covers;
pub mod generation;
pub mod genre;
pub mod history;
pub mod library;
pub mod play;
pub mod session;
pub mod storage;
pub mod story;
pub mod testing;

// Re-export for convenience
pub use story_macros::ResponseSchema;

// Primary public API
pub use alert::{LogNotifier, Notifier};
pub use backend::{Backend, BackendConfig, BackendError, HttpBackend, OAuthProvider, User};
pub use config::Config;
pub use covers::{CoverCache, CoverSource, NoCovers};
pub use generation::{GeminiGenerator, GenerationError, Narrator, TextGenerator};
pub use genre::{find_genre, random_genre, Genre, GENRES};
pub use history::{HistoryStore, StoreError};
pub use library::{Library, LibraryError};
pub use play::{PlayError, PlaySession};
pub use session::{PlayerAttributes, Session, TurnEntry, TurnKind};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use story::{AttributeStep, Story, StoryDraft};
pub use testing::{MockGenerator, MockResponse, TestHarness};

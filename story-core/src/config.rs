//! Runtime configuration, loaded from environment variables.

use crate::backend::BackendConfig;
use std::path::PathBuf;

/// Runtime configuration for the storyteller.
///
/// Everything except the Gemini API key has a default, so local-only play
/// works without a backend configured.
#[derive(Debug, Clone)]
pub struct Config {
    /// `GEMINI_API_KEY`.
    pub gemini_api_key: Option<String>,

    /// Generation model override (`STORY_MODEL`).
    pub model: Option<String>,

    /// Root of the on-device store and cover cache (`STORY_DATA_DIR`).
    pub data_dir: PathBuf,

    /// Hosted backend settings (`STORY_BACKEND_*`, `STORY_*_ID`).
    pub backend: BackendConfig,

    /// `tracing` filter string (`STORY_LOG`), e.g. `"warn"` or `"story_core=debug"`.
    pub log_level: String,

    /// Emit log records as JSON lines (`STORY_LOG_JSON`).
    pub log_json: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            gemini_api_key: std::env::var("GEMINI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            model: std::env::var("STORY_MODEL").ok().filter(|m| !m.is_empty()),
            data_dir: std::env::var("STORY_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_data_dir()),
            backend: BackendConfig {
                endpoint: env_or("STORY_BACKEND_ENDPOINT", "https://cloud.appwrite.io/v1"),
                project: env_or("STORY_BACKEND_PROJECT", "storyteller"),
                database_id: env_or("STORY_DATABASE_ID", "main"),
                collection_id: env_or("STORY_COLLECTION_ID", "stories"),
                bucket_id: env_or("STORY_BUCKET_ID", "covers"),
                api_key: std::env::var("STORY_BACKEND_KEY").ok(),
            },
            log_level: env_or("STORY_LOG", "warn"),
            log_json: std::env::var("STORY_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("storyteller")
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_data_dir_is_namespaced() {
        assert!(default_data_dir().ends_with("storyteller"));
    }

    #[test]
    fn test_env_or_falls_back() {
        assert_eq!(env_or("STORY_TEST_SURELY_UNSET_VARIABLE", "fallback"), "fallback");
    }
}

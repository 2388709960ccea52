//! Locally cached cover images.

use crate::backend::BackendError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Somewhere cover bytes can be fetched from by remote file id.
#[async_trait]
pub trait CoverSource: Send + Sync {
    async fn fetch_cover(&self, file_id: &str) -> Result<Vec<u8>, BackendError>;
}

/// A source that never has covers. Used for offline play.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCovers;

#[async_trait]
impl CoverSource for NoCovers {
    async fn fetch_cover(&self, file_id: &str) -> Result<Vec<u8>, BackendError> {
        Err(BackendError::NotFound(format!("cover {file_id}")))
    }
}

/// Directory of cover image files named after their story id.
#[derive(Debug, Clone)]
pub struct CoverCache {
    dir: PathBuf,
}

impl CoverCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a cover for `story_id` with the given bytes would be written to.
    pub fn path_for(&self, story_id: &str, bytes: &[u8]) -> PathBuf {
        self.dir
            .join(format!("{}.{}", sanitize(story_id), sniff_extension(bytes)))
    }

    /// Write cover bytes for a story, replacing any previous cover of that
    /// story whatever its format.
    pub async fn store(&self, story_id: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(story_id, bytes);
        for ext in EXTENSIONS {
            let old = self.dir.join(format!("{}.{ext}", sanitize(story_id)));
            if old != path {
                self.remove(&old).await?;
            }
        }
        fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Delete a cached file. A missing file is fine.
    pub async fn remove(&self, path: &Path) -> std::io::Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Move a cached cover so it is named after a different story id.
    pub async fn rename(&self, path: &Path, story_id: &str) -> std::io::Result<PathBuf> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("img")
            .to_string();
        let target = self.dir.join(format!("{}.{ext}", sanitize(story_id)));
        fs::rename(path, &target).await?;
        Ok(target)
    }
}

/// Whether a cached file is still on disk.
pub async fn exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// Every extension [`sniff_extension`] can produce.
const EXTENSIONS: [&str; 5] = ["png", "jpg", "gif", "webp", "img"];

/// Pick a file extension from the image magic bytes.
fn sniff_extension(bytes: &[u8]) -> &'static str {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => "png",
        [0xFF, 0xD8, 0xFF, ..] => "jpg",
        [b'G', b'I', b'F', b'8', ..] => "gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "webp",
        _ => "img",
    }
}

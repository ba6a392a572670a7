use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::UserId;

#[async_trait]
pub trait ThumbnailStore: Send + Sync {
    async fn thumbnail_for(&self, user: UserId) -> Option<PathBuf>;
}

/// Thumbnails stored as `{user_id}_thumb.jpg` in one directory.
#[derive(Debug, Clone)]
pub struct FsThumbnailStore {
    dir: PathBuf,
}

impl FsThumbnailStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, user: UserId) -> PathBuf {
        self.dir.join(format!("{user}_thumb.jpg"))
    }
}

#[async_trait]
impl ThumbnailStore for FsThumbnailStore {
    async fn thumbnail_for(&self, user: UserId) -> Option<PathBuf> {
        let path = self.path_for(user);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(path),
            _ => None,
        }
    }
}

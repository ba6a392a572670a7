use std::path::{Path, PathBuf};

use tracing::warn;

use crate::domain::Token;

/// The local copy of one transfer's payload.
///
/// Named after the transfer token so two transfers never share a file.
/// Removal is explicit through [`ScratchFile::remove`]; a guard dropped
/// without it (panic, aborted task) removes the file synchronously.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    removed: bool,
}

impl ScratchFile {
    pub fn new(dir: &Path, token: Token, file_name: &str) -> Self {
        Self {
            path: dir.join(format!("{token}-{file_name}")),
            removed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn remove(mut self) {
        self.removed = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove scratch file"),
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if !self.removed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

//! Narrow interfaces to the chat platform and its upload identities.
//!
//! The relay never talks to a concrete chat SDK; it is driven through these
//! traits so the platform client, the privileged uploader and the thumbnail
//! storage stay outside of the transfer logic.

pub mod thumbnail;

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::domain::{AttachmentKind, ChatId, Identity, MessageId};

pub use thumbnail::{FsThumbnailStore, ThumbnailStore};

#[derive(Debug, Clone, Error)]
pub enum ChatError {
    /// Flood control: the platform asks us to wait before retrying.
    #[error("rate limited, retry after {0:?}")]
    RateLimited(Duration),

    #[error("message not found")]
    MessageNotFound,

    #[error("chat request failed: {0}")]
    Request(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub data: String,
}

impl Button {
    pub fn new(label: impl Into<String>, data: impl ToString) -> Self {
        Self {
            label: label.into(),
            data: data.to_string(),
        }
    }
}

/// Rows of inline buttons.
pub type Keyboard = Vec<Vec<Button>>;

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, ChatError>;

    async fn edit_message(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChatError>;

    async fn delete_message(&self, chat: ChatId, message: MessageId) -> Result<(), ChatError>;

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: &str,
        alert: bool,
    ) -> Result<(), ChatError>;
}

/// Receives byte counters from a running transfer. `bytes_total` of 0 means unknown.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn update(&self, bytes_done: u64, bytes_total: u64);
}

/// An attachment ready to be sent.
#[derive(Debug, Clone)]
pub struct OutgoingMedia<'a> {
    pub chat: ChatId,
    pub path: &'a Path,
    pub file_name: &'a str,
    pub caption: &'a str,
    pub kind: AttachmentKind,
    pub thumbnail: Option<&'a Path>,
}

/// One outbound identity able to upload attachments into a chat.
#[async_trait]
pub trait Transport: Send + Sync {
    fn identity(&self) -> Identity;

    /// Account-tier flag allowing uploads above the standard ceiling.
    async fn is_elevated_eligible(&self) -> bool;

    async fn send_media(
        &self,
        media: &OutgoingMedia<'_>,
        progress: &dyn ProgressSink,
    ) -> Result<(), ChatError>;
}

/// Run a chat operation, sleeping once through a flood-wait signal.
///
/// The retried attempt's result is returned as-is, so repeated rate limiting
/// surfaces to the caller instead of looping.
pub async fn with_flood_retry<T, F, Fut>(operation: &str, mut op: F) -> Result<T, ChatError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ChatError>>,
{
    match op().await {
        Err(ChatError::RateLimited(wait)) => {
            warn!(operation, wait_secs = wait.as_secs(), "flood wait, retrying once");
            tokio::time::sleep(wait).await;
            op().await
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_flood_retry_sleeps_then_retries_once() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let started = tokio::time::Instant::now();

        let result = with_flood_retry("edit", || async move {
            match calls.fetch_add(1, Ordering::SeqCst) {
                0 => Err(ChatError::RateLimited(Duration::from_secs(7))),
                _ => Ok(42),
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() >= Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flood_retry_is_bounded() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let result: Result<(), _> = with_flood_retry("edit", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ChatError::RateLimited(Duration::from_secs(1)))
        })
        .await;

        assert!(matches!(result, Err(ChatError::RateLimited(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_flood_retry_passes_other_errors_through() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let result: Result<(), _> = with_flood_retry("delete", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ChatError::MessageNotFound)
        })
        .await;

        assert!(matches!(result, Err(ChatError::MessageNotFound)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

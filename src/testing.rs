//! Recording fakes for the collaborator traits.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::chat::{ChatClient, ChatError, Keyboard, OutgoingMedia, ProgressSink, ThumbnailStore, Transport};
use crate::domain::{AttachmentKind, ChatId, Identity, MessageId, UserId};
use crate::video::{ExtractError, VideoExtractor, VideoInfo};

#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    Sent {
        chat: ChatId,
        id: MessageId,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Edited {
        chat: ChatId,
        id: MessageId,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Deleted {
        chat: ChatId,
        id: MessageId,
    },
    Answered {
        callback_id: String,
        text: String,
        alert: bool,
    },
}

#[derive(Default)]
pub struct RecordingChat {
    events: Mutex<Vec<ChatEvent>>,
    next_id: AtomicI32,
    edit_failures: Mutex<VecDeque<ChatError>>,
}

impl RecordingChat {
    pub fn events(&self) -> Vec<ChatEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn edits(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ChatEvent::Edited { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Text of the latest sent or edited message.
    pub fn last_text(&self) -> Option<String> {
        self.events().into_iter().rev().find_map(|e| match e {
            ChatEvent::Sent { text, .. } | ChatEvent::Edited { text, .. } => Some(text),
            _ => None,
        })
    }

    pub fn answers(&self) -> Vec<(String, bool)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ChatEvent::Answered { text, alert, .. } => Some((text, alert)),
                _ => None,
            })
            .collect()
    }

    /// Message id and callback data of the newest button whose label contains `label`.
    pub fn button(&self, label: &str) -> Option<(MessageId, String)> {
        self.events().into_iter().rev().find_map(|e| {
            let (id, keyboard) = match e {
                ChatEvent::Sent { id, keyboard: Some(k), .. }
                | ChatEvent::Edited { id, keyboard: Some(k), .. } => (id, k),
                _ => return None,
            };
            keyboard
                .into_iter()
                .flatten()
                .find(|b| b.label.contains(label))
                .map(|b| (id, b.data))
        })
    }

    /// The next edits fail with these errors, in order.
    pub fn fail_next_edits(&self, errors: Vec<ChatError>) {
        self.edit_failures.lock().unwrap().extend(errors);
    }

    fn record(&self, event: ChatEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl ChatClient for RecordingChat {
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, ChatError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.record(ChatEvent::Sent {
            chat,
            id,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(id)
    }

    async fn edit_message(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChatError> {
        if let Some(e) = self.edit_failures.lock().unwrap().pop_front() {
            return Err(e);
        }
        self.record(ChatEvent::Edited {
            chat,
            id: message,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(())
    }

    async fn delete_message(&self, chat: ChatId, message: MessageId) -> Result<(), ChatError> {
        self.record(ChatEvent::Deleted { chat, id: message });
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: &str,
        alert: bool,
    ) -> Result<(), ChatError> {
        self.record(ChatEvent::Answered {
            callback_id: callback_id.to_string(),
            text: text.to_string(),
            alert,
        });
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    samples: Mutex<Vec<(u64, u64)>>,
}

impl RecordingSink {
    pub fn samples(&self) -> Vec<(u64, u64)> {
        self.samples.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProgressSink for RecordingSink {
    async fn update(&self, bytes_done: u64, bytes_total: u64) {
        self.samples.lock().unwrap().push((bytes_done, bytes_total));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentMedia {
    pub chat: ChatId,
    pub file_name: String,
    pub caption: String,
    pub kind: AttachmentKind,
    pub thumbnail: Option<PathBuf>,
    pub size: u64,
}

pub struct FakeTransport {
    identity: Identity,
    eligible: bool,
    failure: Option<ChatError>,
    stall: bool,
    attempts: AtomicUsize,
    sent: Mutex<Vec<SentMedia>>,
}

impl FakeTransport {
    pub fn new(identity: Identity, eligible: bool) -> Self {
        Self {
            identity,
            eligible,
            failure: None,
            stall: false,
            attempts: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Every send fails with `error`.
    pub fn failing_with(mut self, error: ChatError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Every send hangs until dropped.
    pub fn stalling(mut self) -> Self {
        self.stall = true;
        self
    }

    pub fn sent(&self) -> Vec<SentMedia> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    fn identity(&self) -> Identity {
        self.identity
    }

    async fn is_elevated_eligible(&self) -> bool {
        self.eligible
    }

    async fn send_media(
        &self,
        media: &OutgoingMedia<'_>,
        progress: &dyn ProgressSink,
    ) -> Result<(), ChatError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.stall {
            std::future::pending::<()>().await;
        }
        if let Some(e) = &self.failure {
            return Err(e.clone());
        }

        let size = tokio::fs::metadata(media.path)
            .await
            .map_err(|e| ChatError::Request(e.to_string()))?
            .len();
        progress.update(size / 2, size).await;
        progress.update(size, size).await;

        self.sent.lock().unwrap().push(SentMedia {
            chat: media.chat,
            file_name: media.file_name.to_string(),
            caption: media.caption.to_string(),
            kind: media.kind,
            thumbnail: media.thumbnail.map(|p| p.to_path_buf()),
            size,
        });
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeThumbnails {
    by_user: HashMap<UserId, PathBuf>,
}

impl FakeThumbnails {
    pub fn with(user: UserId, path: PathBuf) -> Self {
        Self {
            by_user: HashMap::from([(user, path)]),
        }
    }
}

#[async_trait]
impl ThumbnailStore for FakeThumbnails {
    async fn thumbnail_for(&self, user: UserId) -> Option<PathBuf> {
        self.by_user.get(&user).cloned()
    }
}

/// Serves a fixed listing, or fails with the given reason.
pub struct FakeExtractor {
    info: Result<VideoInfo, String>,
}

impl FakeExtractor {
    pub fn new(info: VideoInfo) -> Self {
        Self { info: Ok(info) }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            info: Err(reason.to_string()),
        }
    }
}

#[async_trait]
impl VideoExtractor for FakeExtractor {
    async fn inspect(&self, _url: &str) -> Result<VideoInfo, ExtractError> {
        self.info.clone().map_err(ExtractError::Failed)
    }
}

//! Drives a link from the first message to the final status line.
//!
//! Inbound text and button presses land here. Everything that follows a
//! user's choice runs through [`TransferCoordinator::run_transfer`], which
//! owns the single exit path: the scratch file is removed, the registry
//! entry is released and exactly one final message is written, whatever
//! stage ended the transfer.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::fetcher::Fetcher;
use super::progress::ProgressReporter;
use super::registry::PendingRegistry;
use super::router::TransportRouter;
use super::scratch::ScratchFile;
use super::uploader::{UploadJob, Uploader};
use crate::api::HttpClient;
use crate::chat::{with_flood_retry, Button, ChatClient, Keyboard};
use crate::domain::{
    AttachmentKind, CallbackAction, ChatId, Identity, MessageId, RelayError, RenamePrompt,
    SourceKind, Token, TransferPhase, UserId, VideoSelection,
};
use crate::utils::{classify_url, human_bytes, resolve_file_name, UrlKind};
use crate::video::{VideoExtractor, VideoInfo};

const START_TEXT: &str = "Hello! 👋\n\nI'm a URL uploader: send me a direct download link or a YouTube link and I'll upload the file here.";

const HELP_TEXT: &str = "**Bot Usage Guide** 📘\n\n1. Send me a direct download link\n2. Send me a YouTube video/audio link\n3. Use the buttons to pick quick download or a custom name\n\nSend /cancel to abort a pending rename.";

const ABOUT_TEXT: &str = concat!(
    "**URL Uploader Bot** 🤖\n\n**Version**: ",
    env!("CARGO_PKG_VERSION"),
    "\n**Language**: Rust"
);

const INVALID_LINK_TEXT: &str = "❌ Please send a valid link.";
const RENAME_CANCELLED_TEXT: &str = "❌ **Rename Process Cancelled**";
const NOTHING_TO_CANCEL_TEXT: &str = "Nothing to cancel.";

#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub max_file_size: u64,
    pub chunk_size: usize,
    pub scratch_dir: PathBuf,
    pub progress_interval: Duration,
}

/// A pressed inline button.
#[derive(Debug, Clone)]
pub struct CallbackQuery {
    pub id: String,
    pub chat: ChatId,
    pub user: UserId,
    pub message_id: MessageId,
    pub data: String,
}

#[derive(Debug, Clone)]
enum TransferSource {
    Direct {
        url: String,
        original_name: Option<String>,
        known_size: Option<u64>,
    },
    Video {
        url: String,
        selection: VideoSelection,
    },
}

#[derive(Debug, Clone)]
struct TransferJob {
    token: Token,
    chat: ChatId,
    user: UserId,
    source: TransferSource,
    custom_name: Option<String>,
}

#[derive(Debug)]
struct Delivered {
    file_name: String,
    bytes: u64,
    kind: AttachmentKind,
    identity: Identity,
}

#[derive(Clone)]
pub struct TransferCoordinator {
    chat: Arc<dyn ChatClient>,
    registry: Arc<PendingRegistry>,
    http: HttpClient,
    fetcher: Fetcher,
    router: TransportRouter,
    uploader: Uploader,
    extractor: Arc<dyn VideoExtractor>,
    settings: Arc<RelaySettings>,
}

impl TransferCoordinator {
    pub fn new(
        chat: Arc<dyn ChatClient>,
        registry: Arc<PendingRegistry>,
        http: HttpClient,
        router: TransportRouter,
        uploader: Uploader,
        extractor: Arc<dyn VideoExtractor>,
        settings: RelaySettings,
    ) -> Self {
        let fetcher = Fetcher::new(http.clone(), settings.max_file_size, settings.chunk_size);
        Self {
            chat,
            registry,
            http,
            fetcher,
            router,
            uploader,
            extractor,
            settings: Arc::new(settings),
        }
    }

    pub fn registry(&self) -> &Arc<PendingRegistry> {
        &self.registry
    }

    /// Handle a plain text message.
    pub async fn on_text(&self, chat: ChatId, user: UserId, text: &str) {
        let text = text.trim();

        if let Some(command) = text.strip_prefix('/') {
            self.on_command(chat, command).await;
            return;
        }

        if self.registry.has_prompt(chat) {
            if classify_url(text).is_some() {
                debug!(chat, "link ignored while a rename prompt is open");
                self.send(chat, &RelayError::PromptActive.user_message(), None).await;
            } else {
                self.complete_rename(chat, user, text).await;
            }
            return;
        }

        match classify_url(text) {
            Some((UrlKind::Direct, url)) => self.present_direct(chat, url).await,
            Some((UrlKind::Video, url)) => self.present_video(chat, url).await,
            None => self.send(chat, INVALID_LINK_TEXT, None).await,
        }
    }

    async fn on_command(&self, chat: ChatId, command: &str) {
        let name = command
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .split('@')
            .next()
            .unwrap_or_default();

        match name {
            "start" => self.send(chat, START_TEXT, None).await,
            "help" => self.send(chat, HELP_TEXT, None).await,
            "about" => self.send(chat, ABOUT_TEXT, None).await,
            "cancel" => {
                if self.registry.discard_prompt(chat) {
                    info!(chat, "rename prompt cancelled");
                    self.send(chat, RENAME_CANCELLED_TEXT, None).await;
                } else {
                    self.send(chat, NOTHING_TO_CANCEL_TEXT, None).await;
                }
            }
            other => debug!(chat, command = other, "unknown command ignored"),
        }
    }

    async fn present_direct(&self, chat: ChatId, url: String) {
        let probe = self.http.probe(&url).await;

        if let Some(size) = probe.known_size() {
            if size > self.settings.max_file_size {
                let err = RelayError::SizeExceeded {
                    size,
                    limit: self.settings.max_file_size,
                };
                info!(chat, %url, size, "link rejected at classification");
                self.send(chat, &err.user_message(), None).await;
                return;
            }
        }

        let size_text = probe
            .known_size()
            .map(human_bytes)
            .unwrap_or_else(|| "Unknown".to_string());
        let mut text = format!(
            "📥 **Download Options**\n\n📁 **File**: `{}`\n📊 **Size**: {}\n\nChoose how to proceed:",
            probe.filename, size_text
        );
        if let Some(reason) = probe.failure.clone() {
            text.push_str("\n\n");
            text.push_str(&RelayError::ProbeFailure(reason).user_message());
        }
        let known_size = probe.known_size();
        let token = self.registry.create(url, Some(probe.filename), known_size);

        let keyboard = vec![
            vec![
                Button::new("⚡ Quick Download", CallbackAction::Quick(token)),
                Button::new("✏️ Custom Name", CallbackAction::Rename(token)),
            ],
            vec![Button::new("❌ Cancel", CallbackAction::Cancel(token))],
        ];
        info!(chat, %token, "selection offered");
        self.send(chat, &text, Some(&keyboard)).await;
    }

    async fn present_video(&self, chat: ChatId, url: String) {
        let Ok(message) = self
            .chat
            .send_message(chat, "🎥 **Processing video link...**", None)
            .await
        else {
            warn!(chat, "could not post video status message");
            return;
        };

        let info = match self.extractor.inspect(&url).await {
            Ok(info) => info,
            Err(e) => {
                warn!(chat, %url, error = %e, "video inspection failed");
                let err = RelayError::from(e);
                self.finish(chat, Some(message), &err.user_message()).await;
                return;
            }
        };

        let keyboard = video_keyboard(&url, &info);
        let text = format!(
            "**🎥 Video Detected!**\n\n📹 **Title:** `{}`\n👤 **Uploader:** `{}`\n⏱️ **Duration:** {} seconds\n🎯 **Choose Download Quality:**",
            info.title(),
            info.uploader.as_deref().unwrap_or("Unknown"),
            info.duration.unwrap_or(0.0).round() as u64,
        );
        self.edit(chat, message, &text, Some(&keyboard)).await;
    }

    /// Handle a button press.
    pub async fn on_callback(&self, query: CallbackQuery) {
        let action: CallbackAction = match query.data.parse() {
            Ok(action) => action,
            Err(e) => {
                warn!(chat = query.chat, data = %query.data, error = %e, "unparseable callback");
                self.answer(&query, "❌ Unknown action", true).await;
                return;
            }
        };
        debug!(chat = query.chat, ?action, "callback");

        match action {
            CallbackAction::Quick(token) => match self.registry.consume(token) {
                Ok(request) => {
                    self.answer(&query, "Starting download...", false).await;
                    let job = TransferJob {
                        token,
                        chat: query.chat,
                        user: query.user,
                        source: TransferSource::Direct {
                            url: request.url,
                            original_name: request.suggested_filename,
                            known_size: request.known_size,
                        },
                        custom_name: None,
                    };
                    self.run_transfer(job, Some(query.message_id)).await;
                }
                Err(e) => self.reject(&query, &e).await,
            },
            CallbackAction::Rename(token) => match self.registry.begin_rename(token, query.chat) {
                Ok(prompt) => {
                    self.answer(&query, "Send the new name", false).await;
                    self.edit(query.chat, query.message_id, &rename_prompt_text(&prompt), None)
                        .await;
                }
                Err(RelayError::PromptActive) => {
                    self.answer(&query, &RelayError::PromptActive.user_message(), true)
                        .await;
                }
                Err(e) => self.reject(&query, &e).await,
            },
            CallbackAction::Cancel(token) => {
                if self.registry.cancel_active(token) {
                    info!(%token, "transfer cancellation requested");
                    self.answer(&query, "Cancelling...", false).await;
                } else if self.registry.discard(token) {
                    info!(%token, "selection cancelled");
                    self.answer(&query, "Cancelled", false).await;
                    self.edit(query.chat, query.message_id, "❌ **Download Cancelled**", None)
                        .await;
                } else {
                    self.reject(&query, &RelayError::TokenNotFound).await;
                }
            }
            CallbackAction::VideoQuality { url, format_id } => {
                self.answer(&query, "Starting download...", false).await;
                self.start_video(&query, url, VideoSelection::Format(format_id))
                    .await;
            }
            CallbackAction::VideoAudio { url } => {
                self.answer(&query, "Starting download...", false).await;
                self.start_video(&query, url, VideoSelection::Audio).await;
            }
            CallbackAction::VideoRename { url } => {
                let prompt = RenamePrompt {
                    conversation_id: query.chat,
                    url,
                    source_kind: SourceKind::Video,
                    original_name: None,
                    known_size: None,
                };
                let text = rename_prompt_text(&prompt);
                match self.registry.open_prompt(prompt) {
                    Ok(()) => {
                        self.answer(&query, "Send the new name", false).await;
                        self.edit(query.chat, query.message_id, &text, None).await;
                    }
                    Err(e) => self.answer(&query, &e.user_message(), true).await,
                }
            }
            CallbackAction::Dismiss => {
                self.answer(&query, "Cancelled", false).await;
                if let Err(e) = self.chat.delete_message(query.chat, query.message_id).await {
                    debug!(chat = query.chat, error = %e, "dismissed message not deleted");
                }
            }
        }
    }

    async fn start_video(&self, query: &CallbackQuery, url: String, selection: VideoSelection) {
        let job = TransferJob {
            token: Token::new(),
            chat: query.chat,
            user: query.user,
            source: TransferSource::Video { url, selection },
            custom_name: None,
        };
        self.run_transfer(job, Some(query.message_id)).await;
    }

    async fn complete_rename(&self, chat: ChatId, user: UserId, name: &str) {
        let prompt = match self.registry.take_prompt(chat) {
            Ok(prompt) => prompt,
            Err(e) => {
                self.send(chat, &e.user_message(), None).await;
                return;
            }
        };
        info!(chat, "rename received");

        let source = match prompt.source_kind {
            SourceKind::Direct => TransferSource::Direct {
                url: prompt.url,
                original_name: prompt.original_name,
                known_size: prompt.known_size,
            },
            SourceKind::Video => TransferSource::Video {
                url: prompt.url,
                selection: VideoSelection::Best,
            },
        };
        let job = TransferJob {
            token: Token::new(),
            chat,
            user,
            source,
            custom_name: Some(name.to_string()),
        };
        self.run_transfer(job, None).await;
    }

    /// Run one transfer to its terminal state.
    async fn run_transfer(&self, job: TransferJob, status: Option<MessageId>) {
        let token = job.token;
        let cancel = self.registry.track(token);
        let keyboard = cancel_keyboard(token);

        let status = match status {
            Some(id) => {
                self.edit(job.chat, id, "⏳ **Preparing transfer...**", Some(&keyboard))
                    .await;
                Some(id)
            }
            None => self
                .chat
                .send_message(job.chat, "⏳ **Preparing transfer...**", Some(&keyboard))
                .await
                .map_err(|e| warn!(chat = job.chat, error = %e, "status message not sent"))
                .ok(),
        };

        let mut scratch = None;
        let outcome = self
            .pipeline(&job, status, &keyboard, &cancel, &mut scratch)
            .await;

        if let Some(scratch) = scratch {
            scratch.remove().await;
        }
        self.registry.release(token);

        let text = match &outcome {
            Ok(delivered) => {
                info!(
                    %token,
                    chat = job.chat,
                    file = %delivered.file_name,
                    bytes = delivered.bytes,
                    kind = ?delivered.kind,
                    identity = %delivered.identity,
                    "transfer complete"
                );
                format!(
                    "✅ **Upload Complete!**\n\n📁 **File**: `{}`\n📊 **Size**: {}",
                    delivered.file_name,
                    human_bytes(delivered.bytes)
                )
            }
            Err(RelayError::Cancelled) => {
                info!(%token, chat = job.chat, "transfer cancelled");
                RelayError::Cancelled.user_message()
            }
            Err(e) => {
                error!(%token, chat = job.chat, error = %e, "transfer failed");
                e.user_message()
            }
        };
        self.finish(job.chat, status, &text).await;
    }

    async fn pipeline(
        &self,
        job: &TransferJob,
        status: Option<MessageId>,
        keyboard: &Keyboard,
        cancel: &CancellationToken,
        scratch: &mut Option<ScratchFile>,
    ) -> Result<Delivered, RelayError> {
        let (url, original_name, known_size) = match &job.source {
            TransferSource::Direct {
                url,
                original_name,
                known_size,
            } => (url.clone(), original_name.clone(), *known_size),
            TransferSource::Video { url, selection } => {
                let media = tokio::select! {
                    _ = cancel.cancelled() => return Err(RelayError::Cancelled),
                    media = self.extractor.resolve(url, selection) => media?,
                };
                (media.url, Some(media.file_name), media.size)
            }
        };
        let file_name = resolve_file_name(job.custom_name.as_deref(), original_name.as_deref());

        if let Some(size) = known_size {
            if size > self.settings.max_file_size {
                return Err(RelayError::SizeExceeded {
                    size,
                    limit: self.settings.max_file_size,
                });
            }
            self.router.route(size).await?;
        }

        tokio::fs::create_dir_all(&self.settings.scratch_dir).await?;
        let path = scratch
            .insert(ScratchFile::new(&self.settings.scratch_dir, job.token, &file_name))
            .path()
            .to_path_buf();

        let download = self
            .reporter(job.chat, status, &file_name, TransferPhase::Download)
            .with_keyboard(keyboard.clone());
        let fetched = self.fetcher.fetch(&url, &path, &download, cancel).await?;

        let transport = self.router.route(fetched.bytes).await?;

        let upload = self
            .reporter(job.chat, status, &file_name, TransferPhase::Upload)
            .with_keyboard(keyboard.clone());
        let caption = format!("**Upload Complete!**\n\n📁 `{file_name}`");
        let upload_job = UploadJob {
            chat: job.chat,
            user: job.user,
            path: &fetched.path,
            file_name: &file_name,
            caption: &caption,
        };
        let kind = self
            .uploader
            .upload(transport.as_ref(), &upload_job, &upload, cancel)
            .await?;

        Ok(Delivered {
            file_name,
            bytes: fetched.bytes,
            kind,
            identity: transport.identity(),
        })
    }

    fn reporter(
        &self,
        chat: ChatId,
        status: Option<MessageId>,
        file_name: &str,
        phase: TransferPhase,
    ) -> ProgressReporter {
        ProgressReporter::new(
            Arc::clone(&self.chat),
            chat,
            status,
            file_name,
            phase,
            self.settings.progress_interval,
        )
    }

    /// Answer a stale or invalid press with an alert. The message it came
    /// from may be a live transfer's status and is left untouched.
    async fn reject(&self, query: &CallbackQuery, err: &RelayError) {
        debug!(chat = query.chat, error = %err, "callback rejected");
        self.answer(query, &err.user_message(), true).await;
    }

    /// Write the terminal message: edit the status message, or post a new one.
    async fn finish(&self, chat: ChatId, status: Option<MessageId>, text: &str) {
        if let Some(id) = status {
            let chat_client = &self.chat;
            let edited = with_flood_retry("final edit", move || {
                chat_client.edit_message(chat, id, text, None)
            })
            .await;
            match edited {
                Ok(()) => return,
                Err(e) => warn!(chat, message = id, error = %e, "final edit failed, sending instead"),
            }
        }
        self.send(chat, text, None).await;
    }

    async fn send(&self, chat: ChatId, text: &str, keyboard: Option<&Keyboard>) {
        let chat_client = &self.chat;
        let sent = with_flood_retry("send", move || {
            chat_client.send_message(chat, text, keyboard)
        })
        .await;
        if let Err(e) = sent {
            warn!(chat, error = %e, "message not sent");
        }
    }

    async fn edit(&self, chat: ChatId, message: MessageId, text: &str, keyboard: Option<&Keyboard>) {
        let chat_client = &self.chat;
        let edited = with_flood_retry("edit", move || {
            chat_client.edit_message(chat, message, text, keyboard)
        })
        .await;
        if let Err(e) = edited {
            warn!(chat, message, error = %e, "message not edited");
        }
    }

    async fn answer(&self, query: &CallbackQuery, text: &str, alert: bool) {
        if let Err(e) = self.chat.answer_callback(&query.id, text, alert).await {
            debug!(chat = query.chat, error = %e, "callback answer failed");
        }
    }
}

fn cancel_keyboard(token: Token) -> Keyboard {
    vec![vec![Button::new("❌ Cancel", CallbackAction::Cancel(token))]]
}

fn rename_prompt_text(prompt: &RenamePrompt) -> String {
    match &prompt.original_name {
        Some(name) => format!(
            "✏️ **Send the new file name**\n\n📁 **Current**: `{name}`\n\nThe extension is kept if you leave it out. Send /cancel to abort."
        ),
        None => "✏️ **Send the new file name**\n\nSend /cancel to abort.".to_string(),
    }
}

/// Two resolution buttons per row, then audio and rename, then dismiss.
fn video_keyboard(url: &str, info: &VideoInfo) -> Keyboard {
    let qualities: Vec<Button> = info
        .quality_options()
        .into_iter()
        .map(|(height, format_id)| {
            Button::new(
                format!("🎥 {height}p"),
                CallbackAction::VideoQuality {
                    url: url.to_string(),
                    format_id,
                },
            )
        })
        .collect();

    let mut keyboard: Keyboard = qualities.chunks(2).map(<[Button]>::to_vec).collect();
    keyboard.push(vec![
        Button::new(
            "🎵 Audio",
            CallbackAction::VideoAudio {
                url: url.to_string(),
            },
        ),
        Button::new(
            "✏️ Custom Name",
            CallbackAction::VideoRename {
                url: url.to_string(),
            },
        ),
    ]);
    keyboard.push(vec![Button::new("❌ Cancel", CallbackAction::Dismiss)]);
    keyboard
}

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::chat::{with_flood_retry, ChatError, OutgoingMedia, ProgressSink, ThumbnailStore, Transport};
use crate::domain::{AttachmentKind, ChatId, RelayError, UserId};

pub struct UploadJob<'a> {
    pub chat: ChatId,
    pub user: UserId,
    pub path: &'a Path,
    pub file_name: &'a str,
    pub caption: &'a str,
}

/// Sends a finished scratch file through the chosen transport.
///
/// The scratch file is left in place whatever the outcome; removing it is
/// the caller's job.
#[derive(Clone)]
pub struct Uploader {
    thumbnails: Arc<dyn ThumbnailStore>,
}

impl Uploader {
    pub fn new(thumbnails: Arc<dyn ThumbnailStore>) -> Self {
        Self { thumbnails }
    }

    pub async fn upload(
        &self,
        transport: &dyn Transport,
        job: &UploadJob<'_>,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<AttachmentKind, RelayError> {
        let kind = AttachmentKind::from_file_name(job.file_name);
        let thumbnail = if kind.accepts_thumbnail() {
            self.thumbnails.thumbnail_for(job.user).await
        } else {
            None
        };

        let media = OutgoingMedia {
            chat: job.chat,
            path: job.path,
            file_name: job.file_name,
            caption: job.caption,
            kind,
            thumbnail: thumbnail.as_deref(),
        };
        debug!(
            file = job.file_name,
            ?kind,
            identity = %transport.identity(),
            thumbnail = media.thumbnail.is_some(),
            "upload starting"
        );

        let media = &media;
        let send = with_flood_retry("upload", move || transport.send_media(media, progress));

        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(RelayError::Cancelled),
            result = send => result,
        };

        match result {
            Ok(()) => {
                info!(file = job.file_name, identity = %transport.identity(), "upload finished");
                Ok(kind)
            }
            Err(ChatError::RateLimited(wait)) => Err(RelayError::RateLimited(wait)),
            Err(e) => Err(RelayError::UploadFailure(e.to_string())),
        }
    }
}

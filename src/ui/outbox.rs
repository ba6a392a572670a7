use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::info;

use crate::chat::{ChatError, OutgoingMedia, ProgressSink, Transport};
use crate::domain::Identity;

const COPY_CHUNK: usize = 64 * 1024;

/// A transport identity that delivers attachments into a local folder,
/// one sub-folder per chat.
pub struct LocalOutbox {
    identity: Identity,
    premium: bool,
    dir: PathBuf,
}

impl LocalOutbox {
    pub fn new(identity: Identity, premium: bool, dir: impl Into<PathBuf>) -> Self {
        Self {
            identity,
            premium,
            dir: dir.into(),
        }
    }
}

fn io_error(e: std::io::Error) -> ChatError {
    ChatError::Request(e.to_string())
}

#[async_trait]
impl Transport for LocalOutbox {
    fn identity(&self) -> Identity {
        self.identity
    }

    async fn is_elevated_eligible(&self) -> bool {
        self.identity == Identity::Elevated && self.premium
    }

    async fn send_media(
        &self,
        media: &OutgoingMedia<'_>,
        progress: &dyn ProgressSink,
    ) -> Result<(), ChatError> {
        let chat_dir = self.dir.join(media.chat.to_string());
        tokio::fs::create_dir_all(&chat_dir).await.map_err(io_error)?;

        let mut source = tokio::fs::File::open(media.path).await.map_err(io_error)?;
        let total = source.metadata().await.map_err(io_error)?.len();
        let target = chat_dir.join(media.file_name);
        let mut dest = tokio::fs::File::create(&target).await.map_err(io_error)?;

        let mut buf = vec![0u8; COPY_CHUNK];
        let mut sent: u64 = 0;
        loop {
            let n = source.read(&mut buf).await.map_err(io_error)?;
            if n == 0 {
                break;
            }
            dest.write_all(&buf[..n]).await.map_err(io_error)?;
            sent += n as u64;
            progress.update(sent, total).await;
        }
        dest.flush().await.map_err(io_error)?;

        info!(
            identity = %self.identity,
            chat = media.chat,
            file = media.file_name,
            kind = ?media.kind,
            thumbnail = media.thumbnail.is_some(),
            bytes = sent,
            target = %target.display(),
            "attachment delivered"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AttachmentKind;
    use crate::testing::RecordingSink;

    #[tokio::test]
    async fn test_delivers_into_chat_folder() {
        let scratch = tempfile::tempdir().unwrap();
        let outbox_dir = tempfile::tempdir().unwrap();
        let path = scratch.path().join("token-song.mp3");
        tokio::fs::write(&path, vec![9u8; 150_000]).await.unwrap();

        let outbox = LocalOutbox::new(Identity::Standard, false, outbox_dir.path());
        let sink = RecordingSink::default();
        let media = OutgoingMedia {
            chat: 12,
            path: &path,
            file_name: "song.mp3",
            caption: "Upload Complete!",
            kind: AttachmentKind::Audio,
            thumbnail: None,
        };
        outbox.send_media(&media, &sink).await.unwrap();

        let delivered = outbox_dir.path().join("12").join("song.mp3");
        assert_eq!(tokio::fs::read(&delivered).await.unwrap().len(), 150_000);
        assert_eq!(sink.samples().last(), Some(&(150_000, 150_000)));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_eligibility_needs_elevated_and_premium() {
        let dir = tempfile::tempdir().unwrap();
        assert!(LocalOutbox::new(Identity::Elevated, true, dir.path()).is_elevated_eligible().await);
        assert!(!LocalOutbox::new(Identity::Elevated, false, dir.path()).is_elevated_eligible().await);
        assert!(!LocalOutbox::new(Identity::Standard, true, dir.path()).is_elevated_eligible().await);
    }
}

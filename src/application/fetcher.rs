use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::{self, HttpClient};
use crate::chat::ProgressSink;
use crate::domain::RelayError;

/// A fully written scratch file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Streams a URL to local scratch storage under a size ceiling.
#[derive(Clone)]
pub struct Fetcher {
    client: HttpClient,
    max_size: u64,
    chunk_size: usize,
}

impl Fetcher {
    pub fn new(client: HttpClient, max_size: u64, chunk_size: usize) -> Self {
        Self {
            client,
            max_size,
            chunk_size: chunk_size.max(1),
        }
    }

    pub async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<Fetched, RelayError> {
        if cancel.is_cancelled() {
            return Err(RelayError::Cancelled);
        }

        let (total, stream) = tokio::select! {
            _ = cancel.cancelled() => return Err(RelayError::Cancelled),
            started = self.client.download_file_stream(url) => started?,
        };

        if let Some(total) = total {
            if total > self.max_size {
                warn!(url, total, limit = self.max_size, "declared size over limit, not downloading");
                return Err(RelayError::SizeExceeded {
                    size: total,
                    limit: self.max_size,
                });
            }
        }

        let bytes = self.write_stream(stream, total, dest, progress, cancel).await?;
        debug!(url, bytes, path = %dest.display(), "download complete");

        Ok(Fetched {
            path: dest.to_path_buf(),
            bytes,
        })
    }

    /// Write `stream` to `dest`. On any failure the partial file is removed
    /// before the error is returned.
    pub(crate) async fn write_stream<S>(
        &self,
        stream: S,
        total: Option<u64>,
        dest: &Path,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<u64, RelayError>
    where
        S: Stream<Item = api::Result<Bytes>>,
    {
        let result = self.copy_to_file(stream, total, dest, progress, cancel).await;

        if result.is_err() {
            if let Err(e) = tokio::fs::remove_file(dest).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %dest.display(), error = %e, "failed to remove partial download");
                }
            }
        }
        result
    }

    async fn copy_to_file<S>(
        &self,
        stream: S,
        total: Option<u64>,
        dest: &Path,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<u64, RelayError>
    where
        S: Stream<Item = api::Result<Bytes>>,
    {
        futures::pin_mut!(stream);

        let file = tokio::fs::File::create(dest).await?;
        let mut writer = BufWriter::with_capacity(self.chunk_size, file);
        let mut downloaded: u64 = 0;
        let expected = total.unwrap_or(0);

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return Err(RelayError::Cancelled),
                next = stream.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    downloaded += chunk.len() as u64;
                    if downloaded > self.max_size {
                        return Err(RelayError::SizeExceeded {
                            size: downloaded,
                            limit: self.max_size,
                        });
                    }

                    writer.write_all(&chunk).await?;
                    progress.update(downloaded, expected).await;
                }
                Some(Err(e)) => {
                    if expected > 0 && downloaded < expected {
                        warn!(error = %e, downloaded, expected, "body ended early");
                        return Err(RelayError::TruncatedTransfer {
                            received: downloaded,
                            expected,
                        });
                    }
                    return Err(e.into());
                }
                None => break,
            }
        }

        writer.flush().await?;
        writer.get_mut().sync_all().await?;

        if expected > 0 && downloaded < expected {
            return Err(RelayError::TruncatedTransfer {
                received: downloaded,
                expected,
            });
        }

        Ok(downloaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::HttpConfig;
    use crate::testing::RecordingSink;

    fn fetcher(max_size: u64) -> Fetcher {
        let client = HttpClient::new(&HttpConfig::default()).unwrap();
        Fetcher::new(client, max_size, 64 * 1024)
    }

    fn chunks(parts: &[&'static str]) -> impl Stream<Item = api::Result<Bytes>> {
        futures::stream::iter(
            parts
                .iter()
                .map(|p| Ok(Bytes::from_static(p.as_bytes())))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn test_fetch_writes_file_and_reports_progress() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/video.mp4")
            .with_status(200)
            .with_body(vec![3u8; 10_000])
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("video.mp4");
        let sink = RecordingSink::default();

        let fetched = fetcher(1 << 20)
            .fetch(
                &format!("{}/video.mp4", server.url()),
                &dest,
                &sink,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(fetched.bytes, 10_000);
        assert_eq!(tokio::fs::read(&dest).await.unwrap().len(), 10_000);

        let samples = sink.samples();
        assert!(samples.windows(2).all(|w| w[0].0 <= w[1].0));
        assert_eq!(samples.last(), Some(&(10_000, 10_000)));
    }

    #[tokio::test]
    async fn test_declared_size_over_limit_writes_nothing() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/big.iso")
            .with_status(200)
            .with_body(vec![0u8; 4096])
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("big.iso");
        let sink = RecordingSink::default();

        let result = fetcher(1024)
            .fetch(
                &format!("{}/big.iso", server.url()),
                &dest,
                &sink,
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(
            result,
            Err(RelayError::SizeExceeded { size: 4096, limit: 1024 })
        ));
        assert!(!dest.exists());
        assert!(sink.samples().is_empty());
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/gone")
            .with_status(410)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("gone.bin");
        let result = fetcher(1024)
            .fetch(
                &format!("{}/gone", server.url()),
                &dest,
                &RecordingSink::default(),
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(result, Err(RelayError::Http(410))));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_short_stream_is_truncated_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("short.bin");

        let result = fetcher(1 << 20)
            .write_stream(
                chunks(&["hello ", "world"]),
                Some(100),
                &dest,
                &RecordingSink::default(),
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(
            result,
            Err(RelayError::TruncatedTransfer { received: 11, expected: 100 })
        ));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_undeclared_stream_over_limit_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("endless.bin");

        let result = fetcher(8)
            .write_stream(
                chunks(&["12345", "67890"]),
                None,
                &dest,
                &RecordingSink::default(),
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(result, Err(RelayError::SizeExceeded { size: 10, limit: 8 })));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_unknown_total_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("unknown.bin");
        let sink = RecordingSink::default();

        let bytes = fetcher(1 << 20)
            .write_stream(
                chunks(&["abc", "def"]),
                None,
                &dest,
                &sink,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(bytes, 6);
        assert_eq!(sink.samples(), vec![(3, 0), (6, 0)]);
    }

    #[tokio::test]
    async fn test_cancelled_download_removes_partial() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("cancelled.bin");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = fetcher(1 << 20)
            .write_stream(
                futures::stream::pending::<api::Result<Bytes>>(),
                Some(10),
                &dest,
                &RecordingSink::default(),
                &cancel,
            )
            .await;

        assert!(matches!(result, Err(RelayError::Cancelled)));
        assert!(!dest.exists());
    }
}

use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_LENGTH};
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};

use super::models::{HttpConfig, ProbeResult};
use crate::utils::{filename_from_content_disposition, filename_from_url, placeholder_filename};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("server returned HTTP {0}")]
    Status(u16),
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self { client })
    }

    /// Learn size and filename without fetching the body.
    ///
    /// Never fails: an unreachable or non-2xx resource yields size 0 and a
    /// filename derived from the URL.
    pub async fn probe(&self, url: &str) -> ProbeResult {
        let (size, disposition, failure) = match self.head(url).await {
            Ok((size, disposition)) => (size, disposition, None),
            Err(e) => {
                warn!(url, error = %e, "probe failed, size unknown");
                (None, None, Some(e.to_string()))
            }
        };

        let filename = disposition
            .as_deref()
            .and_then(filename_from_content_disposition)
            .or_else(|| filename_from_url(url))
            .unwrap_or_else(placeholder_filename);

        debug!(url, size = size.unwrap_or(0), %filename, "probe complete");
        ProbeResult {
            size: size.unwrap_or(0),
            filename,
            failure,
        }
    }

    async fn head(&self, url: &str) -> Result<(Option<u64>, Option<String>)> {
        let response = self.client.head(url).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status().as_u16()));
        }

        // Read the header directly: the body size hint of a HEAD response is always 0.
        let headers = response.headers();
        let size = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let disposition = headers
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok((size, disposition))
    }

    /// Start a download and hand back the declared length with the body stream.
    pub async fn download_file_stream(
        &self,
        download_url: &str,
    ) -> Result<(Option<u64>, BoxStream<'static, Result<bytes::Bytes>>)> {
        let response = self.client.get(download_url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }

        let total_size = response.content_length();
        let stream = response
            .bytes_stream()
            .map_err(ApiError::RequestError)
            .boxed();

        Ok((total_size, stream))
    }
}

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{ExtractError, VideoExtractor, VideoInfo};

/// Runs the `yt-dlp` executable in metadata-only mode.
pub struct YtDlpExtractor {
    binary: String,
    proxy: Option<String>,
    timeout: Duration,
}

impl YtDlpExtractor {
    pub fn new(binary: impl Into<String>, proxy: Option<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            proxy,
            timeout,
        }
    }

    fn args<'a>(&'a self, url: &'a str) -> Vec<&'a str> {
        let mut args = vec!["--dump-single-json", "--no-playlist", "--no-warnings"];
        if let Some(proxy) = &self.proxy {
            args.extend(["--proxy", proxy.as_str()]);
        }
        args.push(url);
        args
    }
}

#[async_trait]
impl VideoExtractor for YtDlpExtractor {
    async fn inspect(&self, url: &str) -> Result<VideoInfo, ExtractError> {
        debug!(url, binary = %self.binary, "running extractor");

        let output = Command::new(&self.binary)
            .args(self.args(url))
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(self.timeout, output)
            .await
            .map_err(|_| ExtractError::Timeout)??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(url, status = ?output.status, "extractor failed");
            return Err(ExtractError::Failed(describe_failure(&stderr)));
        }

        parse_info(&output.stdout)
    }
}

pub fn parse_info(json: &[u8]) -> Result<VideoInfo, ExtractError> {
    Ok(serde_json::from_slice(json)?)
}

/// Short reason for the common failure classes, else the last stderr line.
pub fn describe_failure(stderr: &str) -> String {
    if stderr.contains("Private video") {
        "Private video".to_string()
    } else if stderr.contains("Video unavailable") || stderr.contains("Unavailable video") {
        "Video unavailable".to_string()
    } else if stderr.contains("Geoblocked")
        || stderr.contains("geo restriction")
        || stderr.contains("not made this video available in your country")
    {
        "Video geoblocked".to_string()
    } else {
        stderr
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .unwrap_or("unknown error")
            .trim()
            .to_string()
    }
}

//! Video-hosting links: format listing and resolution to a direct media URL.

pub mod ytdlp;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::{RelayError, VideoSelection};

pub use ytdlp::YtDlpExtractor;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to run extractor: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("extractor timed out")]
    Timeout,

    #[error("{0}")]
    Failed(String),

    #[error("unreadable extractor output: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no downloadable format for this selection")]
    NoFormat,
}

impl From<ExtractError> for RelayError {
    fn from(e: ExtractError) -> Self {
        RelayError::Extraction(e.to_string())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VideoFormat {
    pub format_id: String,
    pub ext: Option<String>,
    pub height: Option<u32>,
    pub url: Option<String>,
    pub filesize: Option<u64>,
    pub filesize_approx: Option<u64>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub abr: Option<f64>,
}

impl VideoFormat {
    fn has_video(&self) -> bool {
        self.vcodec.as_deref().is_some_and(|c| c != "none")
    }

    fn has_audio(&self) -> bool {
        self.acodec.as_deref().is_some_and(|c| c != "none")
    }

    pub fn size(&self) -> Option<u64> {
        self.filesize.or(self.filesize_approx)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VideoInfo {
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub duration: Option<f64>,
    pub formats: Vec<VideoFormat>,
}

impl VideoInfo {
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or("video")
    }

    /// One `(height, format_id)` per distinct mp4 resolution, tallest first.
    pub fn quality_options(&self) -> Vec<(u32, String)> {
        let mut mp4: Vec<(u32, &str)> = self
            .formats
            .iter()
            .filter(|f| f.ext.as_deref() == Some("mp4"))
            .filter_map(|f| f.height.map(|h| (h, f.format_id.as_str())))
            .collect();
        mp4.sort_by(|a, b| b.0.cmp(&a.0));

        let mut options: Vec<(u32, String)> = Vec::new();
        for (height, id) in mp4 {
            if options.last().map_or(true, |(h, _)| *h != height) {
                options.push((height, id.to_string()));
            }
        }
        options
    }

    /// Pick the downloadable format for `selection`.
    pub fn select(&self, selection: &VideoSelection) -> Option<&VideoFormat> {
        let mut downloadable = self.formats.iter().filter(|f| f.url.is_some());
        match selection {
            VideoSelection::Format(id) => downloadable.find(|f| &f.format_id == id),
            VideoSelection::Audio => downloadable
                .filter(|f| f.has_audio() && !f.has_video())
                .max_by(|a, b| a.abr.unwrap_or(0.0).total_cmp(&b.abr.unwrap_or(0.0))),
            VideoSelection::Best => downloadable
                .filter(|f| f.has_audio() && f.has_video())
                .max_by_key(|f| f.height.unwrap_or(0)),
        }
    }
}

/// A direct media URL ready for the fetcher.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMedia {
    pub url: String,
    pub file_name: String,
    pub size: Option<u64>,
}

#[async_trait]
pub trait VideoExtractor: Send + Sync {
    async fn inspect(&self, url: &str) -> Result<VideoInfo, ExtractError>;

    async fn resolve(
        &self,
        url: &str,
        selection: &VideoSelection,
    ) -> Result<ResolvedMedia, ExtractError> {
        let info = self.inspect(url).await?;
        let format = info.select(selection).ok_or(ExtractError::NoFormat)?;
        let media_url = format.url.clone().ok_or(ExtractError::NoFormat)?;
        let ext = format.ext.as_deref().unwrap_or("mp4");

        Ok(ResolvedMedia {
            url: media_url,
            file_name: format!("{}.{}", info.title(), ext),
            size: format.size(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(id: &str, ext: &str, height: Option<u32>, vcodec: &str, acodec: &str) -> VideoFormat {
        VideoFormat {
            format_id: id.to_string(),
            ext: Some(ext.to_string()),
            height,
            url: Some(format!("https://media.example/{id}")),
            vcodec: Some(vcodec.to_string()),
            acodec: Some(acodec.to_string()),
            ..Default::default()
        }
    }

    fn info() -> VideoInfo {
        VideoInfo {
            title: Some("Clip".to_string()),
            formats: vec![
                format("18", "mp4", Some(360), "avc1", "mp4a"),
                format("22", "mp4", Some(720), "avc1", "mp4a"),
                format("136", "mp4", Some(720), "avc1", "none"),
                format("248", "webm", Some(1080), "vp9", "none"),
                VideoFormat {
                    abr: Some(128.0),
                    ..format("140", "m4a", None, "none", "mp4a")
                },
                VideoFormat {
                    abr: Some(50.0),
                    ..format("249", "webm", None, "none", "opus")
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_quality_options_unique_mp4_descending() {
        assert_eq!(
            info().quality_options(),
            vec![(720, "22".to_string()), (360, "18".to_string())]
        );
    }

    #[test]
    fn test_select() {
        let info = info();
        assert_eq!(info.select(&VideoSelection::Best).unwrap().format_id, "22");
        assert_eq!(info.select(&VideoSelection::Audio).unwrap().format_id, "140");
        assert_eq!(
            info.select(&VideoSelection::Format("248".to_string())).unwrap().format_id,
            "248"
        );
        assert!(info.select(&VideoSelection::Format("999".to_string())).is_none());
    }

    struct Fixed(VideoInfo);

    #[async_trait]
    impl VideoExtractor for Fixed {
        async fn inspect(&self, _url: &str) -> Result<VideoInfo, ExtractError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_resolve_names_file_after_title() {
        let resolved = Fixed(info())
            .resolve("https://youtu.be/x", &VideoSelection::Audio)
            .await
            .unwrap();
        assert_eq!(resolved.url, "https://media.example/140");
        assert_eq!(resolved.file_name, "Clip.m4a");

        let missing = Fixed(VideoInfo::default())
            .resolve("https://youtu.be/x", &VideoSelection::Best)
            .await;
        assert!(matches!(missing, Err(ExtractError::NoFormat)));
    }
}

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use uuid::Uuid;

pub type ChatId = i64;
pub type UserId = i64;
pub type MessageId = i32;

/// Opaque single-use identifier embedded in callback buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(Uuid);

impl Token {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Token {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for Token {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A classified direct-download URL waiting for the user's choice.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub token: Token,
    pub url: String,
    pub suggested_filename: Option<String>,
    pub known_size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Direct,
    Video,
}

#[derive(Debug, Clone)]
pub struct RenamePrompt {
    pub conversation_id: ChatId,
    pub url: String,
    pub source_kind: SourceKind,
    /// Probed name, used to carry the extension over to the custom name.
    pub original_name: Option<String>,
    pub known_size: Option<u64>,
}

/// Which rendition of a video-hosting link to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSelection {
    Best,
    Format(String),
    Audio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    Download,
    Upload,
}

impl TransferPhase {
    pub fn title(self) -> &'static str {
        match self {
            TransferPhase::Download => "Download Progress 📥",
            TransferPhase::Upload => "Upload Progress 📤",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Video,
    Audio,
    Document,
}

impl AttachmentKind {
    const VIDEO_EXTENSIONS: [&'static str; 5] = ["mp4", "avi", "mkv", "mov", "webm"];
    const AUDIO_EXTENSIONS: [&'static str; 5] = ["mp3", "wav", "flac", "ogg", "m4a"];

    pub fn from_file_name(file_name: &str) -> Self {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        if Self::VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            AttachmentKind::Video
        } else if Self::AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            AttachmentKind::Audio
        } else {
            AttachmentKind::Document
        }
    }

    pub fn accepts_thumbnail(self) -> bool {
        matches!(self, AttachmentKind::Video | AttachmentKind::Audio)
    }
}

/// The two outbound identities an upload can go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    Standard,
    Elevated,
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Standard => f.write_str("standard"),
            Identity::Elevated => f.write_str("elevated"),
        }
    }
}

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::model::Token;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallbackParseError {
    #[error("unknown callback action: {0}")]
    UnknownAction(String),

    #[error("callback '{0}' is missing a field")]
    MissingField(String),

    #[error("malformed token in callback: {0}")]
    BadToken(String),
}

/// Button payloads, parsed once at the boundary.
///
/// Direct links travel as `action|token`; video-hosting links carry the
/// URL itself as `ytdl*|url[|extra]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    Quick(Token),
    Rename(Token),
    Cancel(Token),
    VideoQuality { url: String, format_id: String },
    VideoAudio { url: String },
    VideoRename { url: String },
    Dismiss,
}

impl FromStr for CallbackAction {
    type Err = CallbackParseError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let (action, rest) = match data.split_once('|') {
            Some((action, rest)) => (action, Some(rest)),
            None => (data, None),
        };

        let missing = || CallbackParseError::MissingField(data.to_string());
        let token = |raw: Option<&str>| -> Result<Token, CallbackParseError> {
            let raw = raw.ok_or_else(missing)?;
            raw.parse()
                .map_err(|_| CallbackParseError::BadToken(raw.to_string()))
        };

        match action {
            "default" => Ok(CallbackAction::Quick(token(rest)?)),
            "rename" => Ok(CallbackAction::Rename(token(rest)?)),
            "cancel" => match rest {
                Some(_) => Ok(CallbackAction::Cancel(token(rest)?)),
                None => Ok(CallbackAction::Dismiss),
            },
            "ytdl_video_quality" => {
                // URLs may contain '|' in their query, so the format id is split from the right.
                let (url, format_id) = rest.and_then(|r| r.rsplit_once('|')).ok_or_else(missing)?;
                if url.is_empty() || format_id.is_empty() {
                    return Err(missing());
                }
                Ok(CallbackAction::VideoQuality {
                    url: url.to_string(),
                    format_id: format_id.to_string(),
                })
            }
            "ytdl_audio" => {
                let url = rest.filter(|r| !r.is_empty()).ok_or_else(missing)?;
                Ok(CallbackAction::VideoAudio {
                    url: url.to_string(),
                })
            }
            "ytdl" => {
                let (url, extra) = rest.and_then(|r| r.rsplit_once('|')).ok_or_else(missing)?;
                if extra != "rename" || url.is_empty() {
                    return Err(CallbackParseError::UnknownAction(data.to_string()));
                }
                Ok(CallbackAction::VideoRename {
                    url: url.to_string(),
                })
            }
            other => Err(CallbackParseError::UnknownAction(other.to_string())),
        }
    }
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackAction::Quick(token) => write!(f, "default|{token}"),
            CallbackAction::Rename(token) => write!(f, "rename|{token}"),
            CallbackAction::Cancel(token) => write!(f, "cancel|{token}"),
            CallbackAction::VideoQuality { url, format_id } => {
                write!(f, "ytdl_video_quality|{url}|{format_id}")
            }
            CallbackAction::VideoAudio { url } => write!(f, "ytdl_audio|{url}"),
            CallbackAction::VideoRename { url } => write!(f, "ytdl|{url}|rename"),
            CallbackAction::Dismiss => f.write_str("cancel"),
        }
    }
}

use std::time::Duration;

use thiserror::Error;

use crate::api::ApiError;
use crate::utils::human_bytes;

#[derive(Debug, Clone, Error)]
pub enum RelayError {
    #[error("probe failed: {0}")]
    ProbeFailure(String),

    #[error("payload of {size} bytes exceeds the {limit} byte limit")]
    SizeExceeded { size: u64, limit: u64 },

    #[error("server answered with HTTP {0}")]
    Http(u16),

    #[error("transfer truncated: {received} of {expected} bytes")]
    TruncatedTransfer { received: u64, expected: u64 },

    #[error("payload of {size} bytes exceeds {threshold} bytes and no eligible elevated identity is available")]
    Eligibility { size: u64, threshold: u64 },

    #[error("upload failed: {0}")]
    UploadFailure(String),

    #[error("rate limited for {0:?}")]
    RateLimited(Duration),

    #[error("token expired")]
    TokenExpired,

    #[error("token not found")]
    TokenNotFound,

    #[error("a rename prompt is already pending")]
    PromptActive,

    #[error("transfer cancelled")]
    Cancelled,

    #[error("video extraction failed: {0}")]
    Extraction(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<ApiError> for RelayError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Status(status) => RelayError::Http(status),
            ApiError::RequestError(e) => RelayError::Network(e.to_string()),
        }
    }
}

impl From<std::io::Error> for RelayError {
    fn from(e: std::io::Error) -> Self {
        RelayError::Io(e.to_string())
    }
}

impl RelayError {
    /// The single line shown to the user for this outcome.
    pub fn user_message(&self) -> String {
        match self {
            RelayError::ProbeFailure(reason) => {
                format!("⚠️ **Could not inspect the link**: {reason}")
            }
            RelayError::SizeExceeded { size, limit } => format!(
                "❌ **File size ({}) is too large!**\n\nMaximum allowed size is {}",
                human_bytes(*size),
                human_bytes(*limit)
            ),
            RelayError::Http(status) => format!("❌ **Download Failed**: HTTP {status}"),
            RelayError::TruncatedTransfer { received, expected } => {
                format!("❌ **Incomplete Download**: {received}/{expected} bytes")
            }
            RelayError::Eligibility { size, threshold } => format!(
                "❌ **Upload Not Possible**: the file is {} and only uploads up to {} are allowed without a premium uploader",
                human_bytes(*size),
                human_bytes(*threshold)
            ),
            RelayError::UploadFailure(reason) => format!("❌ **Upload Failed**: {reason}"),
            RelayError::RateLimited(wait) => format!(
                "❌ **Upload Failed**: the chat is rate limited, try again in {}s",
                wait.as_secs()
            ),
            RelayError::TokenExpired | RelayError::TokenNotFound => {
                "❌ Link expired. Please send the URL again.".to_string()
            }
            RelayError::PromptActive => {
                "✏️ A file name is still pending. Send the name or /cancel first.".to_string()
            }
            RelayError::Cancelled => "❌ **Transfer Cancelled**".to_string(),
            RelayError::Extraction(reason) => {
                format!("❌ **Failed to process video**: {reason}")
            }
            RelayError::Network(reason) => format!("❌ **Network Error**: {reason}"),
            RelayError::Io(reason) => format!("❌ **Storage Error**: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_categories() {
        assert_eq!(
            RelayError::Http(404).user_message(),
            "❌ **Download Failed**: HTTP 404"
        );
        assert_eq!(
            RelayError::TokenExpired.user_message(),
            RelayError::TokenNotFound.user_message()
        );
        let msg = RelayError::SizeExceeded {
            size: 5 * 1024 * 1024 * 1024,
            limit: 4 * 1024 * 1024 * 1024,
        }
        .user_message();
        assert!(msg.contains("5 GB"));
        assert!(msg.contains("4 GB"));
    }

    #[test]
    fn test_io_conversion() {
        let err: RelayError = std::io::Error::new(std::io::ErrorKind::Other, "disk full").into();
        assert!(matches!(err, RelayError::Io(ref m) if m == "disk full"));
    }
}

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

const GIB: u64 = 1024 * 1024 * 1024;

const MAX_FILE_SIZE: u64 = 4 * GIB;
const STANDARD_UPLOAD_LIMIT: u64 = 2 * GIB;
const DOWNLOAD_LOCATION: &str = "./DOWNLOADS";
const THUMB_LOCATION: &str = "./thumb";
const OUTBOX_DIR: &str = "./OUTBOX";
const CHUNK_SIZE_KIB: usize = 128;
const HTTP_TIMEOUT_SECS: u64 = 3600;
const PROGRESS_INTERVAL_SECS: u64 = 5;
const YTDLP_BIN: &str = "yt-dlp";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("STANDARD_UPLOAD_LIMIT ({standard}) must not exceed MAX_FILE_SIZE ({max})")]
    LimitOrder { standard: u64, max: u64 },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub max_file_size: u64,
    pub standard_upload_limit: u64,
    pub download_location: PathBuf,
    pub thumb_location: PathBuf,
    pub outbox_dir: PathBuf,
    /// Write buffer size in bytes.
    pub chunk_size: usize,
    pub http_timeout: Duration,
    pub http_proxy: Option<String>,
    pub progress_interval: Duration,
    /// `None` keeps pending tokens and prompts until used.
    pub pending_ttl: Option<Duration>,
    pub elevated_enabled: bool,
    pub elevated_premium: bool,
    pub ytdlp_bin: String,
}

impl Config {
    /// Read the process environment, after loading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let max_file_size = parse(&var, "MAX_FILE_SIZE")?.unwrap_or(MAX_FILE_SIZE);
        let standard_upload_limit =
            parse(&var, "STANDARD_UPLOAD_LIMIT")?.unwrap_or(STANDARD_UPLOAD_LIMIT);
        let chunk_kib: usize = parse(&var, "CHUNK_SIZE")?.unwrap_or(CHUNK_SIZE_KIB);
        let http_timeout: u64 = parse(&var, "HTTP_TIMEOUT_SECS")?.unwrap_or(HTTP_TIMEOUT_SECS);
        let progress_secs: u64 =
            parse(&var, "PROGRESS_INTERVAL_SECS")?.unwrap_or(PROGRESS_INTERVAL_SECS);
        let pending_ttl: Option<u64> = parse(&var, "PENDING_TTL_SECS")?;

        for (name, value) in [
            ("MAX_FILE_SIZE", max_file_size),
            ("STANDARD_UPLOAD_LIMIT", standard_upload_limit),
            ("CHUNK_SIZE", chunk_kib as u64),
            ("HTTP_TIMEOUT_SECS", http_timeout),
            ("PENDING_TTL_SECS", pending_ttl.unwrap_or(1)),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero(name));
            }
        }
        if standard_upload_limit > max_file_size {
            return Err(ConfigError::LimitOrder {
                standard: standard_upload_limit,
                max: max_file_size,
            });
        }

        Ok(Self {
            max_file_size,
            standard_upload_limit,
            download_location: var("DOWNLOAD_LOCATION")
                .unwrap_or_else(|| DOWNLOAD_LOCATION.to_string())
                .into(),
            thumb_location: var("THUMB_LOCATION")
                .unwrap_or_else(|| THUMB_LOCATION.to_string())
                .into(),
            outbox_dir: var("OUTBOX_DIR")
                .unwrap_or_else(|| OUTBOX_DIR.to_string())
                .into(),
            chunk_size: chunk_kib * 1024,
            http_timeout: Duration::from_secs(http_timeout),
            http_proxy: var("HTTP_PROXY"),
            progress_interval: Duration::from_secs(progress_secs),
            pending_ttl: pending_ttl.map(Duration::from_secs),
            elevated_enabled: parse_flag(&var, "ELEVATED_ENABLED")?,
            elevated_premium: parse_flag(&var, "ELEVATED_PREMIUM")?,
            ytdlp_bin: var("YTDLP_BIN").unwrap_or_else(|| YTDLP_BIN.to_string()),
        })
    }
}

fn parse<T, F>(var: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    var(name)
        .map(|raw| {
            raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name,
                value: raw.clone(),
            })
        })
        .transpose()
}

fn parse_flag<F>(var: &F, name: &'static str) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match var(name).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { name, value: v }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.max_file_size, 4 * GIB);
        assert_eq!(config.standard_upload_limit, 2 * GIB);
        assert_eq!(config.chunk_size, 128 * 1024);
        assert_eq!(config.http_timeout, Duration::from_secs(3600));
        assert_eq!(config.progress_interval, Duration::from_secs(5));
        assert_eq!(config.pending_ttl, None);
        assert_eq!(config.download_location, PathBuf::from("./DOWNLOADS"));
        assert!(!config.elevated_enabled);
        assert_eq!(config.ytdlp_bin, "yt-dlp");
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("MAX_FILE_SIZE", "1000"),
            ("STANDARD_UPLOAD_LIMIT", "500"),
            ("PENDING_TTL_SECS", "600"),
            ("ELEVATED_ENABLED", "true"),
            ("HTTP_PROXY", "socks5://localhost:1080"),
            ("DOWNLOAD_LOCATION", "/tmp/scratch"),
        ])
        .unwrap();
        assert_eq!(config.max_file_size, 1000);
        assert_eq!(config.standard_upload_limit, 500);
        assert_eq!(config.pending_ttl, Some(Duration::from_secs(600)));
        assert!(config.elevated_enabled);
        assert_eq!(config.http_proxy.as_deref(), Some("socks5://localhost:1080"));
        assert_eq!(config.download_location, PathBuf::from("/tmp/scratch"));
    }

    #[test]
    fn test_invalid_values_are_errors() {
        assert!(matches!(
            config(&[("MAX_FILE_SIZE", "lots")]),
            Err(ConfigError::Invalid { name: "MAX_FILE_SIZE", .. })
        ));
        assert!(matches!(
            config(&[("PENDING_TTL_SECS", "0")]),
            Err(ConfigError::Zero("PENDING_TTL_SECS"))
        ));
        assert!(matches!(
            config(&[("ELEVATED_PREMIUM", "maybe")]),
            Err(ConfigError::Invalid { name: "ELEVATED_PREMIUM", .. })
        ));
        assert!(matches!(
            config(&[("MAX_FILE_SIZE", "100"), ("STANDARD_UPLOAD_LIMIT", "200")]),
            Err(ConfigError::LimitOrder { .. })
        ));
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = config(&[("CHUNK_SIZE", "  "), ("HTTP_PROXY", "")]).unwrap();
        assert_eq!(config.chunk_size, 128 * 1024);
        assert_eq!(config.http_proxy, None);
    }
}

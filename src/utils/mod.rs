use std::sync::LazyLock;
use std::time::Duration;

use percent_encoding::percent_decode_str;
use regex::Regex;
use url::Url;
use uuid::Uuid;

static URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^(?:https?://[^\s<>"]+|www\.[^\s<>"]+)$"#).unwrap());

static VIDEO_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:https?://)?(?:www\.|m\.)?(?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/shorts/)([a-zA-Z0-9_-]+)",
    )
    .unwrap()
});

static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\-. ]").unwrap());

static DISPOSITION_EXTENDED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)filename\*\s*=\s*[^']*'[^']*'([^;]+)").unwrap());

static DISPOSITION_PLAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)filename\s*=\s*(?:"([^"]+)"|([^;]+))"#).unwrap());

const DEFAULT_EXTENSION: &str = "bin";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlKind {
    Direct,
    Video,
}

/// Classify a chat message as a link. `www.` links get an https scheme.
pub fn classify_url(text: &str) -> Option<(UrlKind, String)> {
    let text = text.trim();
    if !URL_REGEX.is_match(text) {
        return None;
    }

    let url = if text.starts_with("www.") {
        format!("https://{text}")
    } else {
        text.to_string()
    };

    if VIDEO_REGEX.is_match(&url) {
        Some((UrlKind::Video, url))
    } else {
        Some((UrlKind::Direct, url))
    }
}

/// Replace everything but word characters, `-`, `.` and spaces with `_`.
pub fn sanitize_filename(filename: &str) -> String {
    UNSAFE_FILENAME_CHARS
        .replace_all(filename.trim(), "_")
        .trim_matches(|c| c == '.' || c == ' ')
        .to_string()
}

pub fn filename_from_content_disposition(header: &str) -> Option<String> {
    if let Some(caps) = DISPOSITION_EXTENDED.captures(header) {
        let name = caps[1].trim();
        if !name.is_empty() {
            return Some(percent_decode(name));
        }
    }

    let caps = DISPOSITION_PLAIN.captures(header)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
}

/// Last non-empty path segment, without query or fragment.
pub fn filename_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(percent_decode)
}

pub fn placeholder_filename() -> String {
    format!("file_{}", &Uuid::new_v4().simple().to_string()[..8])
}

/// Final display name for a transfer.
///
/// A custom name without an extension inherits the original one, and a
/// name that still has no extension gets `.bin`.
pub fn resolve_file_name(custom: Option<&str>, original: Option<&str>) -> String {
    let original = original
        .map(sanitize_filename)
        .filter(|name| !name.is_empty());
    let custom = custom.map(sanitize_filename).filter(|name| !name.is_empty());

    let mut name = match (custom, &original) {
        (Some(custom), Some(original)) if !has_extension(&custom) => {
            match extension_of(original) {
                Some(ext) => format!("{custom}.{ext}"),
                None => custom,
            }
        }
        (Some(custom), _) => custom,
        (None, Some(original)) => original.clone(),
        (None, None) => placeholder_filename(),
    };

    if !has_extension(&name) {
        name.push('.');
        name.push_str(DEFAULT_EXTENSION);
    }
    name
}

fn extension_of(name: &str) -> Option<&str> {
    name.rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
}

fn has_extension(name: &str) -> bool {
    extension_of(name).is_some()
}

fn percent_decode(input: &str) -> String {
    percent_decode_str(input).decode_utf8_lossy().into_owned()
}

pub fn human_bytes(size: u64) -> String {
    const UNITS: [&str; 7] = ["B", "KB", "MB", "GB", "TB", "PB", "EB"];

    if size == 0 {
        return "0 B".to_string();
    }

    let mut value = size as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let text = format!("{value:.2}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{text} {}", UNITS[unit])
}

pub fn format_speed(bytes_per_sec: f64) -> String {
    if bytes_per_sec > 1024.0 * 1024.0 {
        format!("{:.2} MB/s", bytes_per_sec / (1024.0 * 1024.0))
    } else if bytes_per_sec > 1024.0 {
        format!("{:.2} KB/s", bytes_per_sec / 1024.0)
    } else {
        format!("{bytes_per_sec:.2} B/s")
    }
}

/// `H:MM:SS`, whole seconds.
pub fn format_eta(eta: Duration) -> String {
    let secs = eta.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

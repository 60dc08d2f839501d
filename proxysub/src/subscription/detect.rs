use std::borrow::Cow;

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use serde::de::IgnoredAny;

use super::SubscriptionFormat;

/// Unwraps a document carried as a single Base64 blob.
///
/// Line breaks are ignored and padding is required. The decoded text is
/// accepted only when it is UTF-8 made of printable characters and
/// whitespace; otherwise the input is returned untouched.
pub fn probe_base64(content: &str) -> Cow<'_, str> {
    let compact: String = content
        .chars()
        .filter(|c| !matches!(c, '\r' | '\n'))
        .collect();
    let compact = compact.trim();
    if compact.is_empty() {
        return Cow::Borrowed(content);
    }
    STANDARD
        .decode(compact)
        .or_else(|_| URL_SAFE.decode(compact))
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .filter(|text| {
            !text.trim().is_empty() && text.chars().all(|c| !c.is_control() || c.is_whitespace())
        })
        .map(Cow::Owned)
        .unwrap_or(Cow::Borrowed(content))
}

fn looks_like_json(text: &str) -> bool {
    text.starts_with('{')
        || (text.starts_with('[') && serde_json::from_str::<IgnoredAny>(text).is_ok())
}

fn looks_like_clash(text: &str) -> bool {
    let mut lines = text.lines().map(str::trim_end);
    let Some(_) = lines.position(|l| l.starts_with("proxies:")) else {
        return false;
    };
    let has_item = lines
        .map(str::trim_start)
        .find(|l| !l.is_empty() && !l.starts_with('#'))
        .filter(|l| l.starts_with("- name:") || l.starts_with("- {"))
        .is_some();
    has_item || text.contains("rules:") || text.to_ascii_lowercase().contains("yaml")
}

fn looks_like_surge(text: &str) -> bool {
    text.contains("[Proxy]") || text.contains("[Proxy Group]")
}

fn looks_like_quantumult(text: &str) -> bool {
    text.lines().any(|line| {
        let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
        let lower = compact.to_ascii_lowercase();
        lower.starts_with("shadowsocks=")
            || lower.starts_with("vmess=")
            || lower.starts_with("trojan=")
            || compact.contains("SERVER,")
    })
}

/// Picks the dialect for an already Base64-probed document. A known declared
/// type wins over anything the content suggests.
pub fn detect_format(content: &str, declared_type: &str) -> SubscriptionFormat {
    if let Some(format) = SubscriptionFormat::from_declared_type(declared_type) {
        return format;
    }
    let text = content.trim();
    if looks_like_json(text) {
        SubscriptionFormat::Json
    } else if looks_like_clash(text) {
        SubscriptionFormat::Clash
    } else if looks_like_surge(text) {
        SubscriptionFormat::Surge
    } else if looks_like_quantumult(text) {
        SubscriptionFormat::Quantumult
    } else {
        SubscriptionFormat::UriList(None)
    }
}

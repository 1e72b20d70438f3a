//! Canonical identity keys for task references.
//!
//! A magnet link, a `bt://` hash and the hash a `.torrent` file produces all
//! map to the same `bt://<hex>` key; URLs are compared only after unmasking
//! and escape normalization. Never compare raw reference strings.

use crate::core::torrent::magnet_to_infohash;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use url::Url;

pub fn link_normalize(url: &str) -> String {
    let url = url_unmask(url);
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("magnet:") {
        match magnet_to_infohash(&url) {
            Ok(hash) => format!("bt://{}", hash),
            Err(_) => url,
        }
    } else if lower.starts_with("ed2k://") {
        parse_ed2k_id(&url).unwrap_or(url)
    } else if lower.starts_with("bt://") {
        lower
    } else if lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("ftp://") {
        normalize_unicode_link(&url)
    } else {
        url
    }
}

/// Unwraps `thunder://`, `flashget://` and `qqdl://` links; anything else,
/// or a wrapper that does not decode, is returned unchanged.
pub fn url_unmask(url: &str) -> String {
    let trimmed = url.trim();
    let Some((scheme, payload)) = trimmed.split_once("://") else {
        return trimmed.to_string();
    };
    let scheme = scheme.to_ascii_lowercase();
    let payload = match scheme.as_str() {
        "thunder" | "qqdl" => payload.trim_end_matches('/'),
        "flashget" => payload.split('&').next().unwrap_or(payload).trim_end_matches('/'),
        _ => return trimmed.to_string(),
    };
    let Some(decoded) = decode_base64_text(payload) else {
        return trimmed.to_string();
    };
    let inner = match scheme.as_str() {
        "thunder" => decoded
            .strip_prefix("AA")
            .and_then(|s| s.strip_suffix("ZZ"))
            .map(str::to_string),
        "flashget" => decoded
            .strip_prefix("[FLASHGET]")
            .and_then(|s| s.strip_suffix("[FLASHGET]"))
            .map(str::to_string),
        _ => Some(decoded),
    };
    inner.unwrap_or_else(|| trimmed.to_string())
}

fn decode_base64_text(payload: &str) -> Option<String> {
    let bytes = STANDARD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload.trim_end_matches('=')))
        .ok()?;
    String::from_utf8(bytes).ok()
}

/// `ed2k://|file|NAME|SIZE|HASH|/` keyed by size and hash only.
pub fn parse_ed2k_id(raw: &str) -> Option<String> {
    let s = raw.get(7..)?.trim_start_matches('|');
    let parts: Vec<&str> = s.split('|').collect();
    if parts.len() < 4 || !parts[0].eq_ignore_ascii_case("file") {
        return None;
    }
    let size: u64 = parts[2].parse().ok()?;
    let hash = parts[3];
    if hash.len() != 32 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("ed2k://{}/{}", size, hash.to_ascii_lowercase()))
}

/// Percent-encodes non-ASCII text, upper-cases escapes and decodes escapes
/// of unreserved characters, so visually equal links compare equal.
pub fn normalize_unicode_link(url: &str) -> String {
    let parsed = match Url::parse(url) {
        Ok(u) => u.to_string(),
        Err(_) => url.to_string(),
    };
    normalize_escapes(&parsed)
}

fn normalize_escapes(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let escaped = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|h| u8::from_str_radix(h, 16).ok());
            if let Some(v) = escaped {
                if v.is_ascii_alphanumeric() || matches!(v, b'-' | b'.' | b'_' | b'~') {
                    out.push(v as char);
                } else {
                    out.push_str(&format!("%{:02X}", v));
                }
                i += 3;
                continue;
            }
        }
        let ch = s[i..].chars().next().unwrap_or('\u{fffd}');
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

//! Log-safe rendering of arbitrary values.
//!
//! Every value that reaches a log record passes through [`sanitize`]: control
//! characters become spaces and anything longer than the bound is cut and
//! tagged with a short digest of the untouched input, so identical truncated
//! values can still be correlated without the full value being stored.

use sha2::{Digest, Sha256};
use std::fmt::Display;

/// Rendered in place of an absent value.
pub const NULL_SENTINEL: &str = "[null]";

pub const CONTENT_HASH_LEN: usize = 8;

/// Characters appended to a truncated value: `...[hash:` + 8 hex + `]`.
pub const TRUNCATION_SUFFIX_LEN: usize = 3 + 6 + CONTENT_HASH_LEN + 1;

pub fn sanitize<T: Display + ?Sized>(value: Option<&T>, max_length: usize) -> String {
    match value {
        None => NULL_SENTINEL.to_string(),
        Some(v) => sanitize_text(&v.to_string(), max_length),
    }
}

pub fn sanitize_text(text: &str, max_length: usize) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();

    if cleaned.chars().count() <= max_length {
        return cleaned;
    }

    let head: String = cleaned.chars().take(max_length).collect();
    format!("{head}...[hash:{}]", content_hash(text))
}

/// First 8 hex characters of the SHA-256 of `text`.
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest[..CONTENT_HASH_LEN / 2]
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

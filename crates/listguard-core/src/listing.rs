//! Listings and queue entries.
//!
//! Titles and descriptions are stored in their on-disk form: whitespace runs
//! collapsed to single spaces, backslashes doubled and pipes escaped as `\|`.
//! That form is what every file record carries, so a listing read back from
//! disk compares equal to the one that was written.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::canonical::sha256_hex;
use crate::error::{GuardError, Result};

/// Content identifier of a marketplace listing: 64 hexadecimal characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ListingHash(String);

impl ListingHash {
    /// Validate a listing hash.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::InvalidHash`] unless `raw` is exactly 64 ASCII
    /// hex digits. Surrounding whitespace is ignored; case is preserved.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.len() == 64 && trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(GuardError::InvalidHash(raw.to_string()))
        }
    }

    /// Derive a hash for a listing that did not come from the marketplace.
    ///
    /// The digest covers `"{id}|{title}|{description}"`, so distinct test
    /// inputs never collide with each other or with real listing hashes.
    #[must_use]
    pub fn synthetic(id: &str, title: &str, description: &str) -> Self {
        Self(sha256_hex(format!("{id}|{title}|{description}").as_bytes()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against a raw hash string.
    #[must_use]
    pub fn matches(&self, raw: &str) -> bool {
        self.0.eq_ignore_ascii_case(raw.trim())
    }
}

impl fmt::Display for ListingHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ListingHash {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ListingHash {
    type Error = GuardError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ListingHash> for String {
    fn from(value: ListingHash) -> Self {
        value.0
    }
}

impl AsRef<str> for ListingHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Where a listing's hash came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingOrigin {
    /// Published on the marketplace; subject to the dedup cache.
    Marketplace,
    /// Built locally from an opaque id; bypasses the dedup cache.
    Synthetic,
}

/// A listing awaiting or undergoing moderation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub hash: ListingHash,
    pub title: String,
    pub description: String,
    pub origin: ListingOrigin,
}

impl Listing {
    /// A marketplace listing. `title` and `description` are given as plain
    /// text and sanitised for storage.
    #[must_use]
    pub fn new(hash: ListingHash, title: &str, description: &str) -> Self {
        Self {
            hash,
            title: sanitize(title),
            description: sanitize(description),
            origin: ListingOrigin::Marketplace,
        }
    }

    /// A synthetic listing whose hash is derived from `id` and the sanitised
    /// text.
    #[must_use]
    pub fn synthetic(id: &str, title: &str, description: &str) -> Self {
        let title = sanitize(title);
        let description = sanitize(description);
        Self {
            hash: ListingHash::synthetic(id, &title, &description),
            title,
            description,
            origin: ListingOrigin::Synthetic,
        }
    }

    /// Rebuild a listing from fields that are already in stored form.
    pub(crate) const fn from_stored(hash: ListingHash, title: String, description: String) -> Self {
        Self {
            hash,
            title,
            description,
            origin: ListingOrigin::Marketplace,
        }
    }

    /// Title with storage escapes removed, for display.
    #[must_use]
    pub fn display_title(&self) -> String {
        unescape(&self.title)
    }

    /// Description with storage escapes removed, for display.
    #[must_use]
    pub fn display_description(&self) -> String {
        unescape(&self.description)
    }
}

/// A listing in the pending queue, stamped with its enqueue time.
///
/// Entries read back from the queue file always report
/// [`ListingOrigin::Marketplace`]; the origin only matters at enqueue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub enqueued_at: NaiveDateTime,
    pub listing: Listing,
}

/// Collapse whitespace runs (including newlines) into single spaces.
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Escape `\` and `|` so the text can sit inside a pipe-delimited record.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '\\' | '|') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Reverse [`escape`]. A trailing lone backslash is kept as-is.
#[must_use]
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some(next) => out.push(next),
                None => out.push('\\'),
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// Storage form of free text: collapsed, then escaped.
#[must_use]
pub fn sanitize(text: &str) -> String {
    escape(&collapse_whitespace(text))
}

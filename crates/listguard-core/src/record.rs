//! Line codecs for the pipe-delimited record files.
//!
//! | File        | Line layout                                                          |
//! |-------------|----------------------------------------------------------------------|
//! | queue       | `[YYYY-mm-dd HH:MM:SS] \| hash \| title \| description`              |
//! | decisions   | `[dd-mm-YYYY] label \| hash \| title \| description \| source \| Counts: t\|f\|i` |
//! | vote queue  | `hash\|title\|description\|market\|KEEP or REMOVE`                   |
//! | actions     | `[YYYY-mm-dd HH:MM:SS] Proposal or Upvote or Downvote \| title \| hash` |
//!
//! Text fields are stored escaped (see [`crate::listing::escape`]) and are
//! split only on unescaped pipes. Lines written before escaping existed may
//! still carry bare pipes inside a title or description; parsers anchor on
//! the fixed fields at both ends and join whatever is left over.
//!
//! Files are UTF-8. A line that is not valid UTF-8 is decoded as Latin-1
//! instead of being dropped.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{GuardError, Result};
use crate::listing::{Listing, ListingHash, QueueEntry};
use crate::protocol::MarketAction;
use crate::quorum::{Label, Tally};

pub const QUEUE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DECISION_DATE_FORMAT: &str = "%d-%m-%Y";

/// Parse failure for a single line; the caller attaches path and line number.
pub type LineResult<T> = std::result::Result<T, String>;

/// Split on `|` characters that are not preceded by an escaping backslash.
#[must_use]
pub fn split_unescaped(line: &str) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, ch) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '|' => {
                fields.push(&line[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    fields.push(&line[start..]);
    fields
}

/// Decode one line, falling back to Latin-1 when it is not UTF-8.
#[must_use]
pub fn decode_line(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

/// Read the non-blank lines of a record file with 1-based line numbers.
/// A missing file reads as empty.
pub(crate) fn read_lines(path: &Path) -> Result<Vec<(usize, String)>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(GuardError::io(path, e)),
    };
    Ok(bytes
        .split(|&b| b == b'\n')
        .enumerate()
        .filter_map(|(i, raw)| {
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            let line = decode_line(raw);
            (!line.trim().is_empty()).then_some((i + 1, line))
        })
        .collect())
}

fn bracketed(field: &str) -> LineResult<(&str, &str)> {
    let field = field.trim_start();
    let inner = field
        .strip_prefix('[')
        .ok_or_else(|| format!("expected `[` at start of `{field}`"))?;
    let close = inner
        .find(']')
        .ok_or_else(|| format!("unterminated date in `{field}`"))?;
    Ok((&inner[..close], inner[close + 1..].trim()))
}

fn hash_field(field: &str) -> LineResult<ListingHash> {
    ListingHash::parse(field).map_err(|e| e.to_string())
}

// Queue -----------------------------------------------------------------------

#[must_use]
pub fn encode_queue_entry(entry: &QueueEntry) -> String {
    format!(
        "[{}] | {} | {} | {}",
        entry.enqueued_at.format(QUEUE_TIME_FORMAT),
        entry.listing.hash,
        entry.listing.title,
        entry.listing.description
    )
}

/// # Errors
///
/// Returns a reason if the line has fewer than four fields, a bad timestamp,
/// or an invalid hash.
pub fn parse_queue_line(line: &str) -> LineResult<QueueEntry> {
    let fields = split_unescaped(line);
    if fields.len() < 4 {
        return Err(format!("expected 4 fields, found {}", fields.len()));
    }
    let (stamp, rest) = bracketed(fields[0])?;
    if !rest.is_empty() {
        return Err(format!("unexpected text `{rest}` after timestamp"));
    }
    let enqueued_at = NaiveDateTime::parse_from_str(stamp.trim(), QUEUE_TIME_FORMAT)
        .map_err(|e| format!("bad timestamp `{stamp}`: {e}"))?;
    let hash = hash_field(fields[1])?;
    let title = fields[2].trim().to_string();
    let description = fields[3..].join("|").trim().to_string();
    Ok(QueueEntry {
        enqueued_at,
        listing: Listing::from_stored(hash, title, description),
    })
}

// Decisions -------------------------------------------------------------------

/// What produced a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    /// Full classifier quorum.
    Quorum,
    /// The listing had no title and was ignored without classification.
    EmptyTitle,
    /// Anything else found in an existing log.
    Other(String),
}

impl DecisionSource {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Quorum => "Multiple LLM calls",
            Self::EmptyTitle => "Empty title",
            Self::Other(text) => text,
        }
    }
}

impl fmt::Display for DecisionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for DecisionSource {
    fn from(value: &str) -> Self {
        match value.trim() {
            "Multiple LLM calls" => Self::Quorum,
            "Empty title" => Self::EmptyTitle,
            other => Self::Other(other.to_string()),
        }
    }
}

/// One classified listing. Immutable once logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub date: NaiveDate,
    pub label: Label,
    pub hash: ListingHash,
    pub title: String,
    pub description: String,
    pub source: DecisionSource,
    pub tally: Tally,
}

impl Decision {
    #[must_use]
    pub fn new(listing: &Listing, date: NaiveDate, tally: Tally, source: DecisionSource) -> Self {
        Self {
            date,
            label: tally.label(),
            hash: listing.hash.clone(),
            title: listing.title.clone(),
            description: listing.description.clone(),
            source,
            tally,
        }
    }

    /// The vote-queue entry this decision implies, if its label asks for one.
    #[must_use]
    pub fn vote_entry(&self, market_address: &str) -> Option<VoteQueueEntry> {
        self.label.action().map(|action| VoteQueueEntry {
            hash: self.hash.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            market_address: market_address.to_string(),
            action,
        })
    }
}

#[must_use]
pub fn encode_decision(decision: &Decision) -> String {
    format!(
        "[{}] {} | {} | {} | {} | {} | Counts: {}",
        decision.date.format(DECISION_DATE_FORMAT),
        decision.label,
        decision.hash,
        decision.title,
        decision.description,
        decision.source,
        decision.tally
    )
}

fn count(field: &str) -> LineResult<u32> {
    field
        .trim()
        .parse()
        .map_err(|e| format!("bad count `{}`: {e}", field.trim()))
}

/// # Errors
///
/// Returns a reason if the date, label, hash, or counts are malformed.
pub fn parse_decision_line(line: &str) -> LineResult<Decision> {
    let fields = split_unescaped(line);
    // head, hash, title, description, source, "Counts: t", f, i
    if fields.len() < 8 {
        return Err(format!("expected 8 fields, found {}", fields.len()));
    }
    let n = fields.len();
    let (date, label) = bracketed(fields[0])?;
    let date = NaiveDate::parse_from_str(date.trim(), DECISION_DATE_FORMAT)
        .map_err(|e| format!("bad date `{date}`: {e}"))?;
    let label = Label::from_str(label).map_err(|e| e.to_string())?;
    let first_count = fields[n - 3]
        .trim()
        .strip_prefix("Counts:")
        .ok_or_else(|| "missing `Counts:` field".to_string())?;
    let tally = Tally::new(count(first_count)?, count(fields[n - 2])?, count(fields[n - 1])?);

    Ok(Decision {
        date,
        label,
        hash: hash_field(fields[1])?,
        title: fields[2].trim().to_string(),
        description: fields[3..n - 4].join("|").trim().to_string(),
        source: DecisionSource::from(fields[n - 4]),
        tally,
    })
}

// Vote queue ------------------------------------------------------------------

/// A decision waiting to be broadcast as a proposal and votes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteQueueEntry {
    pub hash: ListingHash,
    pub title: String,
    pub description: String,
    pub market_address: String,
    pub action: MarketAction,
}

#[must_use]
pub fn encode_vote_entry(entry: &VoteQueueEntry) -> String {
    format!(
        "{}|{}|{}|{}|{}",
        entry.hash, entry.title, entry.description, entry.market_address, entry.action
    )
}

/// Parse a vote-queue line. An empty or `null` market field falls back to
/// `default_market`.
///
/// # Errors
///
/// Returns a reason if the line has fewer than five fields, an invalid hash,
/// or an unknown action.
pub fn parse_vote_line(line: &str, default_market: &str) -> LineResult<VoteQueueEntry> {
    let fields = split_unescaped(line);
    if fields.len() < 5 {
        return Err(format!("expected 5 fields, found {}", fields.len()));
    }
    let n = fields.len();
    let market = fields[n - 2].trim();
    let market_address = if market.is_empty() || market == "null" {
        default_market.to_string()
    } else {
        market.to_string()
    };
    Ok(VoteQueueEntry {
        hash: hash_field(fields[0])?,
        title: fields[1].trim().to_string(),
        description: fields[2..n - 2].join("|").trim().to_string(),
        market_address,
        action: MarketAction::from_str(fields[n - 1]).map_err(|e| e.to_string())?,
    })
}

/// Leading hash field of a vote-queue line, without validation.
#[must_use]
pub fn vote_line_hash(line: &str) -> &str {
    split_unescaped(line).first().map_or("", |f| f.trim())
}

// Action log ------------------------------------------------------------------

/// Marketplace actions worth an audit line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    Proposal,
    Upvote,
    Downvote,
}

impl ActionKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Proposal => "Proposal",
            Self::Upvote => "Upvote",
            Self::Downvote => "Downvote",
        }
    }

    /// The vote kind recorded for a broadcast `action`.
    #[must_use]
    pub const fn for_vote(action: MarketAction) -> Self {
        match action {
            MarketAction::Keep => Self::Upvote,
            MarketAction::Remove => Self::Downvote,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRecord {
    pub at: NaiveDateTime,
    pub kind: ActionKind,
    pub title: String,
    pub hash: ListingHash,
}

#[must_use]
pub fn encode_action(record: &ActionRecord) -> String {
    format!(
        "[{}] {} | {} | {}",
        record.at.format(QUEUE_TIME_FORMAT),
        record.kind.as_str(),
        record.title,
        record.hash
    )
}

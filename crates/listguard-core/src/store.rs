//! Durable queue store.
//!
//! Four line files make up the moderation state, plus an audit log:
//!
//! ```text
//! <data_dir>/
//!   queue.txt           pending listings, FIFO
//!   listing_cache.txt   every marketplace hash ever enqueued (never shrinks)
//!   results.txt         decision log (append-only)
//!   vote_queue.txt      decisions waiting for broadcast
//!   moderation.log      proposals and votes sent
//! ```
//!
//! # Invariants
//!
//! - Appends use `O_APPEND` + `write_all` + `flush`; earlier lines are never
//!   touched by an append.
//! - Removals rewrite the file through a sibling `.tmp` and `rename`. A crash
//!   before the rename leaves the old file in place, so an entry can be
//!   reprocessed but never duplicated.
//! - Removals copy surviving lines byte-for-byte, including lines that only
//!   decoded as Latin-1.
//! - Single process, single instance. There is no file locking.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use chrono::{Local, SubsecRound};
use tracing::{debug, warn};

use crate::error::{GuardError, Result};
use crate::listing::{Listing, ListingHash, ListingOrigin, QueueEntry};
use crate::record::{
    self, ActionRecord, Decision, LineResult, VoteQueueEntry, encode_action, encode_decision,
    encode_queue_entry, encode_vote_entry, parse_decision_line, parse_queue_line, parse_vote_line,
    read_lines, vote_line_hash,
};

pub const QUEUE_FILE: &str = "queue.txt";
pub const CACHE_FILE: &str = "listing_cache.txt";
pub const DECISION_FILE: &str = "results.txt";
pub const VOTE_QUEUE_FILE: &str = "vote_queue.txt";
pub const ACTION_LOG_FILE: &str = "moderation.log";

/// Storage operations the pipeline and broadcaster depend on.
///
/// Every method takes `&self`; implementations persist immediately.
pub trait QueueStore {
    /// Queue a listing. Marketplace listings are checked against and added to
    /// the dedup cache; synthetic listings skip it.
    ///
    /// # Errors
    ///
    /// [`GuardError::Duplicate`] if the hash is cached, or an I/O error.
    fn enqueue(&self, listing: &Listing) -> Result<QueueEntry>;

    /// # Errors
    ///
    /// I/O errors reading the cache.
    fn is_cached(&self, hash: &ListingHash) -> Result<bool>;

    /// The oldest queued entry without removing it.
    ///
    /// # Errors
    ///
    /// [`GuardError::Encoding`] if the head line is malformed; I/O errors.
    fn peek_front(&self) -> Result<Option<QueueEntry>>;

    /// Drop the oldest queued line. Returns `false` on an empty queue.
    ///
    /// # Errors
    ///
    /// I/O errors.
    fn pop_front(&self) -> Result<bool>;

    /// All well-formed queued entries in order; malformed lines are skipped.
    ///
    /// # Errors
    ///
    /// I/O errors.
    fn queue_entries(&self) -> Result<Vec<QueueEntry>>;

    /// Empty the pending queue. The dedup cache is left alone.
    ///
    /// # Errors
    ///
    /// I/O errors.
    fn clear_queue(&self) -> Result<usize>;

    /// Append a decision, and its vote-queue entry when the label calls for one.
    ///
    /// # Errors
    ///
    /// I/O errors.
    fn log_decision(&self, decision: &Decision) -> Result<Option<VoteQueueEntry>>;

    /// # Errors
    ///
    /// I/O errors.
    fn decisions(&self) -> Result<Vec<Decision>>;

    /// # Errors
    ///
    /// I/O errors.
    fn vote_queue(&self) -> Result<Vec<VoteQueueEntry>>;

    /// Remove every vote-queue line for `hash`; returns how many were removed.
    ///
    /// # Errors
    ///
    /// I/O errors.
    fn remove_from_vote_queue(&self, hash: &ListingHash) -> Result<usize>;

    /// # Errors
    ///
    /// I/O errors.
    fn record_action(&self, record: &ActionRecord) -> Result<()>;
}

/// Locations of the store files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub queue: PathBuf,
    pub cache: PathBuf,
    pub decisions: PathBuf,
    pub vote_queue: PathBuf,
    pub actions: PathBuf,
}

impl StorePaths {
    /// Default file names inside `dir`.
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            queue: dir.join(QUEUE_FILE),
            cache: dir.join(CACHE_FILE),
            decisions: dir.join(DECISION_FILE),
            vote_queue: dir.join(VOTE_QUEUE_FILE),
            actions: dir.join(ACTION_LOG_FILE),
        }
    }
}

/// [`QueueStore`] over plain line files.
#[derive(Debug, Clone)]
pub struct FileQueueStore {
    paths: StorePaths,
    market_address: String,
}

impl FileQueueStore {
    /// `market_address` is written into new vote-queue entries and fills in
    /// entries whose market field is empty or `null`.
    #[must_use]
    pub fn new(paths: StorePaths, market_address: impl Into<String>) -> Self {
        Self {
            paths,
            market_address: market_address.into(),
        }
    }

    #[must_use]
    pub const fn paths(&self) -> &StorePaths {
        &self.paths
    }

    #[must_use]
    pub fn market_address(&self) -> &str {
        &self.market_address
    }
}

impl QueueStore for FileQueueStore {
    fn enqueue(&self, listing: &Listing) -> Result<QueueEntry> {
        if listing.origin == ListingOrigin::Marketplace {
            if self.is_cached(&listing.hash)? {
                return Err(GuardError::Duplicate {
                    hash: listing.hash.to_string(),
                });
            }
            append_line(&self.paths.cache, listing.hash.as_str())?;
        }

        let entry = QueueEntry {
            enqueued_at: Local::now().naive_local().trunc_subsecs(0),
            listing: listing.clone(),
        };
        append_line(&self.paths.queue, &encode_queue_entry(&entry))?;
        debug!(hash = %listing.hash, title = %listing.title, "listing queued");
        Ok(entry)
    }

    fn is_cached(&self, hash: &ListingHash) -> Result<bool> {
        Ok(read_lines(&self.paths.cache)?
            .iter()
            .any(|(_, line)| hash.matches(line)))
    }

    fn peek_front(&self) -> Result<Option<QueueEntry>> {
        let Some((line_no, line)) = read_lines(&self.paths.queue)?.into_iter().next() else {
            return Ok(None);
        };
        parse_queue_line(&line)
            .map(Some)
            .map_err(|reason| GuardError::Encoding {
                path: self.paths.queue.clone(),
                line: line_no,
                reason,
            })
    }

    fn pop_front(&self) -> Result<bool> {
        let Some(bytes) = read_bytes(&self.paths.queue)? else {
            return Ok(false);
        };
        let mut offset = 0;
        for raw in bytes.split_inclusive(|&b| b == b'\n') {
            offset += raw.len();
            if !raw.trim_ascii().is_empty() {
                write_atomic(&self.paths.queue, &bytes[offset..])?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn queue_entries(&self) -> Result<Vec<QueueEntry>> {
        parse_all(&self.paths.queue, parse_queue_line)
    }

    fn clear_queue(&self) -> Result<usize> {
        let count = read_lines(&self.paths.queue)?.len();
        if count > 0 {
            write_atomic(&self.paths.queue, &[])?;
        }
        Ok(count)
    }

    fn log_decision(&self, decision: &Decision) -> Result<Option<VoteQueueEntry>> {
        append_line(&self.paths.decisions, &encode_decision(decision))?;
        let vote = decision.vote_entry(&self.market_address);
        if let Some(entry) = &vote {
            append_line(&self.paths.vote_queue, &encode_vote_entry(entry))?;
        }
        Ok(vote)
    }

    fn decisions(&self) -> Result<Vec<Decision>> {
        parse_all(&self.paths.decisions, parse_decision_line)
    }

    fn vote_queue(&self) -> Result<Vec<VoteQueueEntry>> {
        parse_all(&self.paths.vote_queue, |line| {
            parse_vote_line(line, &self.market_address)
        })
    }

    fn remove_from_vote_queue(&self, hash: &ListingHash) -> Result<usize> {
        let Some(bytes) = read_bytes(&self.paths.vote_queue)? else {
            return Ok(0);
        };
        let mut kept = Vec::with_capacity(bytes.len());
        let mut removed = 0;
        for raw in bytes.split_inclusive(|&b| b == b'\n') {
            if hash.matches(vote_line_hash(&record::decode_line(raw))) {
                removed += 1;
            } else {
                kept.extend_from_slice(raw);
            }
        }
        if removed > 0 {
            write_atomic(&self.paths.vote_queue, &kept)?;
        }
        Ok(removed)
    }

    fn record_action(&self, record: &ActionRecord) -> Result<()> {
        append_line(&self.paths.actions, &encode_action(record))
    }
}

fn parse_all<T>(path: &Path, parse: impl Fn(&str) -> LineResult<T>) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for (line_no, line) in read_lines(path)? {
        match parse(&line) {
            Ok(item) => out.push(item),
            Err(reason) => {
                let err = GuardError::Encoding {
                    path: path.to_path_buf(),
                    line: line_no,
                    reason,
                };
                warn!(error = %err, "skipping unreadable line");
            }
        }
    }
    Ok(out)
}

fn read_bytes(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(GuardError::io(path, e)),
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            fs::create_dir_all(dir).map_err(|e| GuardError::io(dir, e))
        }
        _ => Ok(()),
    }
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    ensure_parent(path)?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| GuardError::io(path, e))?;
    file.write_all(format!("{line}\n").as_bytes())
        .and_then(|()| file.flush())
        .map_err(|e| GuardError::io(path, e))
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Replace `path` with `bytes`. The temp file is synced before the rename so
/// the new contents are on disk before they become visible.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = tmp_path(path);
    {
        let mut file = File::create(&tmp).map_err(|e| GuardError::io(&tmp, e))?;
        file.write_all(bytes)
            .and_then(|()| file.sync_all())
            .map_err(|e| GuardError::io(&tmp, e))?;
    }
    fs::rename(&tmp, path).map_err(|e| GuardError::io(path, e))
}

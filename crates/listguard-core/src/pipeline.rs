//! Queue drain: classify the head listing, log the decision, pop it.
//!
//! The head entry is only removed after its decision is on disk. An
//! interrupted quorum logs nothing and leaves the entry at the head, so the
//! next run classifies it again from scratch.

use chrono::Local;
use serde::Serialize;
use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::error::{GuardError, Result};
use crate::quorum::{Classifier, Label, QuorumEngine, Tally};
use crate::record::{Decision, DecisionSource};
use crate::store::QueueStore;

/// What [`Moderator::process_next`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The queue was empty.
    Empty,
    /// The head listing was classified and removed.
    Decided(Decision),
    /// The head line was unreadable and was dropped.
    Skipped { reason: String },
}

/// Counts for one queue drain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueReport {
    pub processed: usize,
    pub upvoted: usize,
    pub downvoted: usize,
    pub ignored: usize,
    pub skipped: usize,
    pub interrupted: bool,
}

impl QueueReport {
    fn count(&mut self, decision: &Decision) {
        self.processed += 1;
        match decision.label {
            Label::Upvote => self.upvoted += 1,
            Label::Downvote => self.downvoted += 1,
            Label::Ignore => self.ignored += 1,
        }
    }
}

pub struct Moderator<'a, S: ?Sized, C> {
    store: &'a S,
    engine: QuorumEngine<C>,
    cancel: CancelToken,
}

impl<'a, S, C> Moderator<'a, S, C>
where
    S: QueueStore + ?Sized,
    C: Classifier,
{
    pub fn new(store: &'a S, classifier: C, cancel: CancelToken) -> Self {
        Self {
            store,
            engine: QuorumEngine::new(classifier, cancel.clone()),
            cancel,
        }
    }

    /// Classify and remove the head of the queue.
    ///
    /// A listing with an empty title is logged as `ignore` without calling
    /// the classifier.
    ///
    /// # Errors
    ///
    /// [`GuardError::Cancelled`] if interrupted mid-quorum (nothing is logged
    /// and the entry stays queued), and store I/O errors.
    pub fn process_next(&self) -> Result<Step> {
        let entry = match self.store.peek_front() {
            Ok(Some(entry)) => entry,
            Ok(None) => return Ok(Step::Empty),
            Err(err @ GuardError::Encoding { .. }) => {
                warn!(error = %err, "dropping unreadable queue head");
                self.store.pop_front()?;
                return Ok(Step::Skipped {
                    reason: err.to_string(),
                });
            }
            Err(err) => return Err(err),
        };
        let listing = &entry.listing;
        let today = Local::now().date_naive();

        let decision = if listing.title.trim().is_empty() {
            info!(hash = %listing.hash, "empty title; ignoring without classification");
            Decision::new(listing, today, Tally::all_ignored(), DecisionSource::EmptyTitle)
        } else {
            let (_, tally) = self
                .engine
                .classify(&listing.display_title(), &listing.display_description())?;
            Decision::new(listing, today, tally, DecisionSource::Quorum)
        };

        self.store.log_decision(&decision)?;
        self.store.pop_front()?;
        info!(
            hash = %decision.hash,
            title = %decision.title,
            label = %decision.label,
            counts = %decision.tally,
            "listing classified"
        );
        Ok(Step::Decided(decision))
    }

    /// Process entries until the queue is empty or the run is interrupted.
    ///
    /// # Errors
    ///
    /// Store I/O errors. Interruption is reported in the returned counts.
    pub fn process_queue(&self) -> Result<QueueReport> {
        let mut report = QueueReport::default();
        loop {
            if self.cancel.is_cancelled() {
                report.interrupted = true;
                break;
            }
            match self.process_next() {
                Ok(Step::Empty) => break,
                Ok(Step::Decided(decision)) => report.count(&decision),
                Ok(Step::Skipped { .. }) => report.skipped += 1,
                Err(GuardError::Cancelled) => {
                    report.interrupted = true;
                    break;
                }
                Err(err) => return Err(err),
            }
        }
        if report.interrupted {
            info!(processed = report.processed, "queue processing interrupted");
        }
        info!(
            processed = report.processed,
            upvoted = report.upvoted,
            downvoted = report.downvoted,
            ignored = report.ignored,
            skipped = report.skipped,
            "queue processing finished"
        );
        Ok(report)
    }
}

//! Broadcast orchestrator: drains the vote queue onto the marketplace.
//!
//! Per vote-queue entry:
//!
//! 1. Look up an existing proposal for the listing in the proposal inbox
//!    (oldest received wins).
//! 2. Otherwise build one with the first funded address as submitter and
//!    send it from the market address to itself.
//! 3. Sign and send one vote per funded address. A failure for one address
//!    does not stop the others.
//! 4. Remove the entry from the vote queue once every address was tried.
//!
//! An entry whose proposal could not be found or created stays queued for
//! the next run. Only a wallet with no funded address ends the run early.

use chrono::{Local, SubsecRound};
use serde::Serialize;
use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::error::{GuardError, Result};
use crate::node::{NodeClient, funded_addresses};
use crate::proposal::{build_proposal, proposal_message};
use crate::protocol::find_proposal;
use crate::record::{ActionKind, ActionRecord, VoteQueueEntry};
use crate::store::QueueStore;
use crate::vote::{build_vote, verify_vote};

/// Counts for one broadcast run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    /// Vote-queue entries at the start of the run.
    pub queued: usize,
    /// Funded addresses that voted.
    pub voters: usize,
    pub proposals_found: usize,
    pub proposals_created: usize,
    pub votes_sent: usize,
    pub votes_failed: usize,
    /// Entries removed from the vote queue.
    pub completed: usize,
    /// Entries left queued because no proposal was available.
    pub skipped: usize,
    pub interrupted: bool,
}

/// The proposal identifiers a set of votes refers to.
struct Target {
    proposal_hash: String,
    option_hash: String,
}

pub struct Broadcaster<'a, N: ?Sized, S: ?Sized> {
    node: &'a N,
    store: &'a S,
    cancel: CancelToken,
}

impl<'a, N, S> Broadcaster<'a, N, S>
where
    N: NodeClient + ?Sized,
    S: QueueStore + ?Sized,
{
    pub const fn new(node: &'a N, store: &'a S, cancel: CancelToken) -> Self {
        Self {
            node,
            store,
            cancel,
        }
    }

    /// Drain the vote queue.
    ///
    /// An empty vote queue returns immediately without contacting the node.
    /// `market_address` is the address funded addresses are filtered against;
    /// each entry is sent to its own market address.
    ///
    /// # Errors
    ///
    /// [`GuardError::NoFundedAddress`] if no address can vote, and store I/O
    /// errors. Per-entry and per-address failures are logged and counted.
    pub fn run(&self, market_address: &str) -> Result<BroadcastReport> {
        let entries = self.store.vote_queue()?;
        let mut report = BroadcastReport {
            queued: entries.len(),
            ..BroadcastReport::default()
        };
        if entries.is_empty() {
            info!("vote queue is empty; nothing to broadcast");
            return Ok(report);
        }

        let voters = match funded_addresses(self.node, market_address) {
            Ok(voters) if !voters.is_empty() => voters,
            Ok(_) => return Err(GuardError::NoFundedAddress),
            Err(err @ GuardError::Configuration(_)) => return Err(err),
            Err(err) => {
                warn!(error = %err, "could not list unspent outputs");
                return Err(GuardError::NoFundedAddress);
            }
        };
        report.voters = voters.len();
        info!(entries = entries.len(), voters = voters.len(), "broadcasting vote queue");

        for entry in &entries {
            if self.cancel.is_cancelled() {
                report.interrupted = true;
                info!("broadcast interrupted");
                break;
            }
            let Some(target) = self.resolve_target(entry, &voters[0], &mut report)? else {
                report.skipped += 1;
                continue;
            };
            self.cast_votes(entry, &target, &voters, &mut report)?;
            self.store.remove_from_vote_queue(&entry.hash)?;
            report.completed += 1;
            info!(hash = %entry.hash, title = %entry.title, "vote queue entry processed");
        }

        info!(
            completed = report.completed,
            skipped = report.skipped,
            votes_sent = report.votes_sent,
            votes_failed = report.votes_failed,
            "broadcast finished"
        );
        Ok(report)
    }

    /// Find or create the proposal for `entry`. `None` means skip the entry.
    fn resolve_target(
        &self,
        entry: &VoteQueueEntry,
        submitter: &str,
        report: &mut BroadcastReport,
    ) -> Result<Option<Target>> {
        let existing = self
            .node
            .proposal_inbox()
            .and_then(|inbox| find_proposal(&inbox, &entry.hash));
        let existing = match existing {
            Ok(found) => found,
            Err(err) => {
                warn!(hash = %entry.hash, title = %entry.title, error = %err, "proposal lookup failed; skipping");
                return Ok(None);
            }
        };

        if let Some(proposal) = existing {
            let Some(option_hash) = proposal.option_hash(entry.action) else {
                warn!(hash = %entry.hash, title = %entry.title, action = %entry.action, "existing proposal has no matching option; skipping");
                return Ok(None);
            };
            info!(hash = %entry.hash, proposal = %proposal.hash, "found existing proposal");
            report.proposals_found += 1;
            return Ok(Some(Target {
                option_hash: option_hash.to_string(),
                proposal_hash: proposal.hash,
            }));
        }

        let sent = build_proposal(&entry.hash, &entry.market_address, entry.action, submitter)
            .and_then(|proposal| {
                let message = proposal_message(&proposal)?;
                self.node
                    .send_message(&entry.market_address, &entry.market_address, &message)?;
                Ok(proposal)
            });
        let proposal = match sent {
            Ok(proposal) => proposal,
            Err(err) => {
                warn!(hash = %entry.hash, title = %entry.title, error = %err, "could not create proposal; skipping");
                return Ok(None);
            }
        };
        info!(hash = %entry.hash, proposal = %proposal.hash, submitter, "proposal sent");
        report.proposals_created += 1;
        self.record(ActionKind::Proposal, entry)?;

        let option_hash = proposal
            .option_hash(entry.action)
            .map(str::to_string)
            .ok_or_else(|| GuardError::Protocol("built proposal lacks an option".to_string()))?;
        Ok(Some(Target {
            proposal_hash: proposal.hash,
            option_hash,
        }))
    }

    fn cast_votes(
        &self,
        entry: &VoteQueueEntry,
        target: &Target,
        voters: &[String],
        report: &mut BroadcastReport,
    ) -> Result<()> {
        let mut logged = false;
        for voter in voters {
            let sent = build_vote(self.node, &target.proposal_hash, &target.option_hash, voter)
                .and_then(|vote| {
                    verify_vote(&vote)?;
                    let message = vote.to_message()?;
                    self.node.send_message(voter, &entry.market_address, &message)
                });
            match sent {
                Ok(reply) => {
                    report.votes_sent += 1;
                    info!(hash = %entry.hash, voter = %voter, reply = %reply.trim(), "vote sent");
                    if !logged {
                        self.record(ActionKind::for_vote(entry.action), entry)?;
                        logged = true;
                    }
                }
                Err(err) => {
                    report.votes_failed += 1;
                    warn!(hash = %entry.hash, title = %entry.title, voter = %voter, error = %err, "vote not sent");
                }
            }
        }
        Ok(())
    }

    fn record(&self, kind: ActionKind, entry: &VoteQueueEntry) -> Result<()> {
        self.store.record_action(&ActionRecord {
            at: Local::now().naive_local().trunc_subsecs(0),
            kind,
            title: entry.title.clone(),
            hash: entry.hash.clone(),
        })
    }
}

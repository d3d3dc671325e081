//! listguard-core library.
//!
//! Moderation pipeline for Particl marketplace listings: a durable queue
//! with dedup, a classifier quorum that turns noisy answers into a label, and
//! a proposal/vote builder that broadcasts decisions through a node.
//!
//! # Conventions
//!
//! - **Errors**: library functions return [`error::Result`]; see
//!   [`error::GuardError`] for which failures abort a run.
//! - **Logging**: `tracing` macros, with the listing hash and title as fields
//!   whenever an item is skipped.
//! - **Collaborators**: the node and the classifier are reached only through
//!   [`node::NodeClient`] and [`quorum::Classifier`].

pub mod broadcast;
pub mod cancel;
pub mod canonical;
pub mod config;
pub mod error;
pub mod listing;
pub mod market;
pub mod node;
pub mod pipeline;
pub mod proposal;
pub mod protocol;
pub mod quorum;
pub mod record;
pub mod scan;
pub mod store;
pub mod vote;

pub use broadcast::{BroadcastReport, Broadcaster};
pub use cancel::CancelToken;
pub use config::GuardConfig;
pub use error::{ErrorCode, GuardError, Result};
pub use listing::{Listing, ListingHash, ListingOrigin, QueueEntry};
pub use node::NodeClient;
pub use pipeline::{Moderator, QueueReport, Step};
pub use protocol::MarketAction;
pub use quorum::{Classifier, Label, QuorumEngine, Tally, Verdict};
pub use record::{Decision, DecisionSource, VoteQueueEntry};
pub use store::{FileQueueStore, QueueStore, StorePaths};

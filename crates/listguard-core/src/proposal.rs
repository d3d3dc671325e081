//! Proposal builder.
//!
//! A moderation proposal names a listing by its hash in both `title` and
//! `target`, and always offers the same two options. Its hash, and each
//! option hash, is the SHA-256 of a canonical field object, so anyone who
//! rebuilds the proposal from the same inputs gets the same identifiers.

use crate::canonical::CanonicalFields;
use crate::error::{GuardError, Result};
use crate::listing::ListingHash;
use crate::protocol::{
    Envelope, MSG_PROPOSAL_ADD, MarketAction, NETWORK, PROPOSAL_CATEGORY, PROPOSAL_OPTIONS,
    Proposal, ProposalOption,
};

const PROPOSAL_SCHEMA: &[&str] = &[
    "network",
    "proposalCategory",
    "proposalDescription",
    "proposalMarket",
    "proposalOptions",
    "proposalSubmitter",
    "proposalTarget",
    "proposalTitle",
];

const OPTION_SCHEMA: &[&str] = &[
    "network",
    "proposalOptionDescription",
    "proposalOptionId",
    "proposalOptionProposalHash",
];

/// Hash of the proposal's canonical field object.
///
/// # Errors
///
/// [`GuardError::Protocol`] if `market` or `submitter` is empty.
pub fn proposal_hash(
    listing: &ListingHash,
    market: &str,
    action: MarketAction,
    submitter: &str,
) -> Result<String> {
    CanonicalFields::new(PROPOSAL_SCHEMA)
        .set("network", NETWORK)
        .set("proposalCategory", PROPOSAL_CATEGORY)
        .set("proposalDescription", action.proposal_description())
        .set("proposalMarket", market)
        .set("proposalOptions", PROPOSAL_OPTIONS)
        .set("proposalSubmitter", submitter)
        .set("proposalTarget", listing.as_str())
        .set("proposalTitle", listing.as_str())
        .hash()
}

/// Hash of one option of the proposal identified by `proposal_hash`.
///
/// # Errors
///
/// [`GuardError::Protocol`] if `proposal_hash` is empty.
pub fn option_hash(proposal_hash: &str, option: MarketAction) -> Result<String> {
    CanonicalFields::new(OPTION_SCHEMA)
        .set("network", NETWORK)
        .set("proposalOptionDescription", option.as_str())
        .set("proposalOptionId", option.option_id())
        .set("proposalOptionProposalHash", proposal_hash)
        .hash()
}

/// Build the proposal that `submitter` would broadcast for `listing`.
///
/// `action` only shapes the description text; both options are always
/// present. Nothing is sent.
///
/// # Errors
///
/// [`GuardError::Protocol`] if `submitter` or `market` is empty.
pub fn build_proposal(
    listing: &ListingHash,
    market: &str,
    action: MarketAction,
    submitter: &str,
) -> Result<Proposal> {
    if submitter.trim().is_empty() {
        return Err(GuardError::Protocol(format!(
            "no submitter address for proposal on {listing}"
        )));
    }

    let hash = proposal_hash(listing, market, action, submitter)?;
    let options = MarketAction::ALL
        .iter()
        .map(|&option| {
            Ok(ProposalOption {
                option_id: option.option_id(),
                description: option.as_str().to_string(),
                hash: option_hash(&hash, option)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Proposal {
        kind: MSG_PROPOSAL_ADD.to_string(),
        submitter: submitter.to_string(),
        title: listing.to_string(),
        description: action.proposal_description(),
        options,
        category: PROPOSAL_CATEGORY.to_string(),
        target: listing.to_string(),
        hash,
    })
}

/// JSON message text for a proposal.
///
/// # Errors
///
/// [`GuardError::Protocol`] if encoding fails.
pub fn proposal_message(proposal: &Proposal) -> Result<String> {
    Envelope::new(proposal).to_message()
}

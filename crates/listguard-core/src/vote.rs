//! Vote builder.
//!
//! The node signs a scrambled form of the vote payload: the canonical JSON
//! `{"proposalHash":..,"proposalOptionHash":..,"address":..}` with every
//! character sorted by code point and joined with commas. Counterparties
//! verify against exactly this string.

use crate::canonical::CanonicalFields;
use crate::error::{GuardError, Result};
use crate::node::NodeClient;
use crate::protocol::{Envelope, MSG_VOTE, PROTOCOL_VERSION, Vote};

const SIGNING_SCHEMA: &[&str] = &["proposalHash", "proposalOptionHash", "address"];

/// Canonical JSON of the fields a vote signature covers.
///
/// # Errors
///
/// [`GuardError::Protocol`] if any field is empty.
pub fn signing_payload(proposal_hash: &str, option_hash: &str, address: &str) -> Result<String> {
    CanonicalFields::new(SIGNING_SCHEMA)
        .set("proposalHash", proposal_hash)
        .set("proposalOptionHash", option_hash)
        .set("address", address)
        .to_json()
}

/// Sort every character of `payload` and join them with `,`.
#[must_use]
pub fn scramble(payload: &str) -> String {
    let mut chars: Vec<char> = payload.chars().collect();
    chars.sort_unstable();
    let mut out = String::with_capacity(chars.len() * 2);
    for (i, ch) in chars.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Sign and assemble a vote from `voter`.
///
/// # Errors
///
/// [`GuardError::Protocol`] for empty inputs; [`GuardError::Signing`] if the
/// node fails to sign or returns an empty signature.
pub fn build_vote<N: NodeClient + ?Sized>(
    node: &N,
    proposal_hash: &str,
    option_hash: &str,
    voter: &str,
) -> Result<Envelope<Vote>> {
    let message = scramble(&signing_payload(proposal_hash, option_hash, voter)?);
    let signature = node
        .sign_message(voter, &message)
        .map_err(|e| GuardError::Signing {
            address: voter.to_string(),
            reason: e.to_string(),
        })?;
    let signature = signature.trim();
    if signature.is_empty() {
        return Err(GuardError::Signing {
            address: voter.to_string(),
            reason: "node returned an empty signature".to_string(),
        });
    }

    Ok(Envelope::new(Vote {
        kind: MSG_VOTE.to_string(),
        proposal_hash: proposal_hash.to_string(),
        proposal_option_hash: option_hash.to_string(),
        signature: signature.to_string(),
        voter: voter.to_string(),
    }))
}

/// Check a vote is complete before it is sent.
///
/// # Errors
///
/// [`GuardError::Protocol`] naming the first missing or wrong field.
pub fn verify_vote(vote: &Envelope<Vote>) -> Result<()> {
    if vote.version != PROTOCOL_VERSION {
        return Err(GuardError::Protocol(format!(
            "vote version `{}` is not {PROTOCOL_VERSION}",
            vote.version
        )));
    }
    let action = &vote.action;
    if action.kind != MSG_VOTE {
        return Err(GuardError::Protocol(format!(
            "vote action type `{}` is not {MSG_VOTE}",
            action.kind
        )));
    }
    let fields = [
        ("proposalHash", &action.proposal_hash),
        ("proposalOptionHash", &action.proposal_option_hash),
        ("signature", &action.signature),
        ("voter", &action.voter),
    ];
    match fields.iter().find(|(_, value)| value.trim().is_empty()) {
        Some((name, _)) => Err(GuardError::Protocol(format!("vote field `{name}` is empty"))),
        None => Ok(()),
    }
}

//! Marketplace message formats.
//!
//! Proposals and votes travel as JSON text inside SMSG messages, wrapped in a
//! `{"version": .., "action": {..}}` envelope. The JSON layout here is the wire
//! contract; the hashes inside it come from [`crate::canonical`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GuardError, Result};
use crate::listing::ListingHash;

pub const PROTOCOL_VERSION: &str = "3.3.1";
pub const NETWORK: &str = "PARTICL";
pub const PROPOSAL_CATEGORY: &str = "ITEM_VOTE";
pub const PROPOSAL_OPTIONS: &str = "0:KEEP:1:REMOVE:";

pub const MSG_PROPOSAL_ADD: &str = "MPA_PROPOSAL_ADD";
pub const MSG_VOTE: &str = "MPA_VOTE";
pub const MSG_LISTING_ADD: &str = "MPA_LISTING_ADD_03";

/// Public marketplace channel that proposals and votes are addressed to.
pub const DEFAULT_MARKET_ADDRESS: &str = "PZijh4WzjCWLbSgBkMUtLHZBaU6dSSmkqN";

/// The two options every moderation proposal carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarketAction {
    Keep,
    Remove,
}

impl MarketAction {
    pub const ALL: [Self; 2] = [Self::Keep, Self::Remove];

    /// Option description on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Keep => "KEEP",
            Self::Remove => "REMOVE",
        }
    }

    #[must_use]
    pub const fn option_id(self) -> u32 {
        match self {
            Self::Keep => 0,
            Self::Remove => 1,
        }
    }

    /// Proposal description text. The suffix is appended to the lowercase
    /// option name verbatim, so `KEEP` reads "keepd".
    #[must_use]
    pub fn proposal_description(self) -> String {
        format!(
            "This ListingItem should be {}d.",
            self.as_str().to_lowercase()
        )
    }
}

impl fmt::Display for MarketAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketAction {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "KEEP" => Ok(Self::Keep),
            "REMOVE" => Ok(Self::Remove),
            other => Err(GuardError::Protocol(format!(
                "unknown action `{other}`; expected KEEP or REMOVE"
            ))),
        }
    }
}

/// `{"version": .., "action": ..}` wrapper shared by every marketplace message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<A> {
    pub version: String,
    pub action: A,
}

impl<A: Serialize> Envelope<A> {
    #[must_use]
    pub fn new(action: A) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            action,
        }
    }

    /// Compact JSON text for `smsgsend`.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::Protocol`] if serialisation fails.
    pub fn to_message(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| GuardError::Protocol(format!("cannot encode message: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalOption {
    #[serde(rename = "optionId")]
    pub option_id: u32,
    pub description: String,
    pub hash: String,
}

/// `MPA_PROPOSAL_ADD` action body.
///
/// Discovery only needs `type`, `target`, `hash` and `options`; the other
/// fields default to empty when a peer's proposal omits them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub submitter: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub options: Vec<ProposalOption>,
    #[serde(default)]
    pub category: String,
    pub target: String,
    pub hash: String,
}

impl Proposal {
    /// Hash of the option matching `action`, if the proposal carries one.
    #[must_use]
    pub fn option_hash(&self, action: MarketAction) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.description.eq_ignore_ascii_case(action.as_str()))
            .map(|o| o.hash.as_str())
            .filter(|h| !h.is_empty())
    }
}

/// `MPA_VOTE` action body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    #[serde(rename = "type")]
    pub kind: String,
    pub proposal_hash: String,
    pub proposal_option_hash: String,
    pub signature: String,
    pub voter: String,
}

/// One entry of `smsginbox` output.
#[derive(Debug, Clone, Deserialize)]
pub struct InboxMessage {
    #[serde(default)]
    pub msgid: String,
    #[serde(default)]
    pub received: Value,
    #[serde(default)]
    pub text: String,
}

impl InboxMessage {
    /// Receive time in whole seconds. Fractions are truncated; missing or
    /// malformed values sort first.
    #[must_use]
    pub fn received_at(&self) -> f64 {
        let secs = match &self.received {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        secs.filter(|s| s.is_finite()).map_or(0.0, f64::trunc)
    }
}

#[derive(Debug, Deserialize)]
struct Inbox {
    #[serde(default)]
    messages: Vec<InboxMessage>,
}

/// Parse `smsginbox` output into its messages.
///
/// # Errors
///
/// Returns [`GuardError::Protocol`] if the output is not an inbox object.
pub fn parse_inbox(raw: &str) -> Result<Vec<InboxMessage>> {
    serde_json::from_str::<Inbox>(raw)
        .map(|inbox| inbox.messages)
        .map_err(|e| GuardError::Protocol(format!("unreadable inbox listing: {e}")))
}

/// Find the authoritative proposal for `target` in `smsginbox` output.
///
/// Messages that are not well-formed proposals are ignored. When several
/// proposals target the same listing, the earliest received wins; ties keep
/// inbox order.
///
/// # Errors
///
/// Returns [`GuardError::Protocol`] if the inbox itself cannot be parsed.
pub fn find_proposal(inbox: &str, target: &ListingHash) -> Result<Option<Proposal>> {
    let found = parse_inbox(inbox)?
        .into_iter()
        .filter_map(|msg| {
            let envelope: Envelope<Proposal> = serde_json::from_str(&msg.text).ok()?;
            let proposal = envelope.action;
            (proposal.kind == MSG_PROPOSAL_ADD && target.matches(&proposal.target))
                .then(|| (msg.received_at(), proposal))
        })
        .min_by(|(a, _), (b, _)| a.total_cmp(b))
        .map(|(_, proposal)| proposal);
    Ok(found)
}

//! Listing ingest from the node inbox.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{GuardError, Result};
use crate::listing::{Listing, ListingHash, collapse_whitespace};
use crate::node::NodeClient;
use crate::protocol::{MSG_LISTING_ADD, parse_inbox};
use crate::store::QueueStore;

/// Counts for one inbox scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Inbox messages examined.
    pub messages: usize,
    /// Messages that were not listings.
    pub other: usize,
    pub enqueued: usize,
    pub duplicates: usize,
    /// Listings missing a title or with a malformed hash.
    pub invalid: usize,
}

/// Listing fields pulled out of an `MPA_LISTING_ADD_03` message.
struct ListingAd<'a> {
    hash: &'a str,
    title: &'a str,
    short_description: &'a str,
    long_description: &'a str,
}

fn listing_ad(text: &Value) -> Option<ListingAd<'_>> {
    let action = text.get("action")?;
    if action.get("type")?.as_str()? != MSG_LISTING_ADD {
        return None;
    }
    let info = &action["item"]["information"];
    Some(ListingAd {
        hash: str_field(&action["hash"]),
        title: str_field(&info["title"]),
        short_description: str_field(&info["shortDescription"]),
        long_description: str_field(&info["longDescription"]),
    })
}

fn str_field(value: &Value) -> &str {
    value.as_str().unwrap_or_default()
}

/// Refresh the node's message buckets, then queue every new listing found in
/// the inbox.
///
/// # Errors
///
/// Node call failures and store I/O errors. Individual messages never fail
/// the scan.
pub fn scan_listings<N, S>(node: &N, store: &S) -> Result<ScanReport>
where
    N: NodeClient + ?Sized,
    S: QueueStore + ?Sized,
{
    node.scan_buckets()?;
    let messages = parse_inbox(&node.inbox()?)?;
    let mut report = ScanReport {
        messages: messages.len(),
        ..ScanReport::default()
    };

    for message in &messages {
        let text: Option<Value> = serde_json::from_str(&message.text).ok();
        let Some(ad) = text.as_ref().and_then(listing_ad) else {
            report.other += 1;
            continue;
        };
        if ad.title.trim().is_empty() {
            debug!(msgid = %message.msgid, "listing without title");
            report.invalid += 1;
            continue;
        }
        let hash = match ListingHash::parse(ad.hash) {
            Ok(hash) => hash,
            Err(err) => {
                warn!(msgid = %message.msgid, error = %err, "skipping listing");
                report.invalid += 1;
                continue;
            }
        };
        let description = format!(
            "{} {}",
            collapse_whitespace(ad.short_description),
            collapse_whitespace(ad.long_description)
        );
        let listing = Listing::new(hash, ad.title, &description);

        match store.enqueue(&listing) {
            Ok(_) => {
                report.enqueued += 1;
                info!(hash = %listing.hash, title = %listing.title, "listing queued");
            }
            Err(GuardError::Duplicate { hash }) => {
                debug!(%hash, "listing already cached");
                report.duplicates += 1;
            }
            Err(err) => return Err(err),
        }
    }

    info!(
        messages = report.messages,
        enqueued = report.enqueued,
        duplicates = report.duplicates,
        invalid = report.invalid,
        "inbox scan finished"
    );
    Ok(report)
}

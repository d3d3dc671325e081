use std::io::Write;

use anyhow::Result;
use listguard_core::scan::scan_listings;

use crate::context::Context;
use crate::output::{pretty_kv, pretty_section, render_mode};

/// Execute `lg scan`: queue new listings from the node inbox.
///
/// # Errors
///
/// Node call failures, an unconfigured node, and store I/O errors.
pub fn run_scan(ctx: &Context) -> Result<()> {
    let report = scan_listings(&ctx.node(), &ctx.store())?;
    render_mode(
        ctx.output,
        &report,
        |r, w| {
            writeln!(
                w,
                "messages {}  enqueued {}  duplicates {}  invalid {}  other {}",
                r.messages, r.enqueued, r.duplicates, r.invalid, r.other
            )
        },
        |r, w| {
            pretty_section(w, "Inbox scan")?;
            pretty_kv(w, "Messages", r.messages.to_string())?;
            pretty_kv(w, "Queued", r.enqueued.to_string())?;
            pretty_kv(w, "Already seen", r.duplicates.to_string())?;
            pretty_kv(w, "Invalid", r.invalid.to_string())?;
            pretty_kv(w, "Not listings", r.other.to_string())
        },
    )
}

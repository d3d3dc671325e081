use std::io::Write;

use anyhow::Result;
use listguard_core::QueueStore;
use listguard_core::listing::unescape;

use crate::context::Context;
use crate::output::{pretty_kv, pretty_rule, pretty_section, render_mode};

/// Execute `lg votes`: list decisions still waiting to be broadcast.
///
/// # Errors
///
/// Store I/O errors and unreadable vote-queue lines.
pub fn run_votes(ctx: &Context) -> Result<()> {
    let entries = ctx.store().vote_queue()?;
    render_mode(
        ctx.output,
        &entries,
        |entries, w| {
            for e in entries {
                writeln!(
                    w,
                    "{:<6}  {}  {}  {}",
                    e.action.as_str(),
                    e.hash,
                    e.market_address,
                    unescape(&e.title)
                )?;
            }
            Ok(())
        },
        |entries, w| {
            pretty_section(w, &format!("Vote queue ({} entries)", entries.len()))?;
            for e in entries {
                pretty_kv(w, "Title", unescape(&e.title))?;
                pretty_kv(w, "Hash", e.hash.as_str())?;
                pretty_kv(w, "Action", e.action.as_str())?;
                pretty_kv(w, "Market", &e.market_address)?;
                pretty_rule(w)?;
            }
            Ok(())
        },
    )
}

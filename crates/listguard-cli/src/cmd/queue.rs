use std::io::Write;

use anyhow::Result;
use clap::Subcommand;
use listguard_core::QueueStore;
use listguard_core::listing::unescape;
use listguard_core::record::QUEUE_TIME_FORMAT;
use serde::Serialize;

use crate::context::Context;
use crate::output::{pretty_kv, pretty_rule, pretty_section, render_mode};

#[derive(Subcommand, Debug)]
pub enum QueueCommand {
    #[command(about = "List queued listings, oldest first")]
    Show,
    #[command(about = "Remove every queued listing (the dedup cache is kept)")]
    Clear,
}

#[derive(Debug, Serialize)]
struct Cleared {
    cleared: usize,
}

/// Execute `lg queue show|clear`.
///
/// # Errors
///
/// Store I/O errors and unreadable queue lines.
pub fn run_queue(command: &QueueCommand, ctx: &Context) -> Result<()> {
    let store = ctx.store();
    match command {
        QueueCommand::Show => {
            let entries = store.queue_entries()?;
            render_mode(
                ctx.output,
                &entries,
                |entries, w| {
                    for e in entries {
                        writeln!(
                            w,
                            "{}  {}  {}",
                            e.enqueued_at.format(QUEUE_TIME_FORMAT),
                            e.listing.hash,
                            unescape(&e.listing.title)
                        )?;
                    }
                    Ok(())
                },
                |entries, w| {
                    pretty_section(w, &format!("Queue ({} listings)", entries.len()))?;
                    for e in entries {
                        pretty_kv(w, "Title", unescape(&e.listing.title))?;
                        pretty_kv(w, "Hash", e.listing.hash.as_str())?;
                        pretty_kv(w, "Queued at", e.enqueued_at.format(QUEUE_TIME_FORMAT).to_string())?;
                        pretty_rule(w)?;
                    }
                    Ok(())
                },
            )
        }
        QueueCommand::Clear => {
            let report = Cleared {
                cleared: store.clear_queue()?,
            };
            render_mode(
                ctx.output,
                &report,
                |r, w| writeln!(w, "cleared  {}", r.cleared),
                |r, w| pretty_kv(w, "Cleared", r.cleared.to_string()),
            )
        }
    }
}

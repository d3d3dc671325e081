use std::io::Write;

use anyhow::Result;
use listguard_core::{BroadcastReport, Broadcaster};

use crate::context::Context;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

/// Execute `lg broadcast`: turn the vote queue into proposals and votes.
///
/// # Errors
///
/// No funded address, an unconfigured node, and store I/O errors. Failures
/// for single entries or addresses are only counted.
pub fn run_broadcast(ctx: &Context) -> Result<()> {
    let report = broadcast(ctx)?;
    render_report(ctx.output, &report)
}

pub fn broadcast(ctx: &Context) -> Result<BroadcastReport> {
    let (node, store) = (ctx.node(), ctx.store());
    Ok(Broadcaster::new(&node, &store, ctx.cancel.clone()).run(ctx.market_address())?)
}

pub fn render_report(mode: OutputMode, report: &BroadcastReport) -> Result<()> {
    render_mode(
        mode,
        report,
        |r, w| {
            writeln!(
                w,
                "queued {}  completed {}  skipped {}  proposals {}+{}  votes {}/{}{}",
                r.queued,
                r.completed,
                r.skipped,
                r.proposals_found,
                r.proposals_created,
                r.votes_sent,
                r.votes_sent + r.votes_failed,
                if r.interrupted { "  interrupted" } else { "" }
            )
        },
        |r, w| {
            pretty_section(w, "Broadcast")?;
            pretty_kv(w, "Queued", r.queued.to_string())?;
            pretty_kv(w, "Voters", r.voters.to_string())?;
            pretty_kv(w, "Proposals found", r.proposals_found.to_string())?;
            pretty_kv(w, "Proposals sent", r.proposals_created.to_string())?;
            pretty_kv(w, "Votes sent", r.votes_sent.to_string())?;
            pretty_kv(w, "Votes failed", r.votes_failed.to_string())?;
            pretty_kv(w, "Completed", r.completed.to_string())?;
            pretty_kv(w, "Left queued", r.skipped.to_string())?;
            if r.interrupted {
                pretty_kv(w, "Status", "interrupted")?;
            }
            Ok(())
        },
    )
}

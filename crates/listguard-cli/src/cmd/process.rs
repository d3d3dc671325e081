use std::io::Write;

use anyhow::Result;
use listguard_core::{Moderator, QueueReport};

use crate::context::Context;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

/// Execute `lg process`: classify queued listings until the queue is empty
/// or the run is interrupted.
///
/// # Errors
///
/// An unusable rules file and store I/O errors.
pub fn run_process(ctx: &Context) -> Result<()> {
    let report = process_queue(ctx)?;
    render_report(ctx.output, &report)
}

pub fn process_queue(ctx: &Context) -> Result<QueueReport> {
    let store = ctx.store();
    let moderator = Moderator::new(&store, ctx.classifier()?, ctx.cancel.clone());
    Ok(moderator.process_queue()?)
}

pub fn render_report(mode: OutputMode, report: &QueueReport) -> Result<()> {
    render_mode(
        mode,
        report,
        |r, w| {
            writeln!(
                w,
                "processed {}  upvote {}  downvote {}  ignore {}  skipped {}{}",
                r.processed,
                r.upvoted,
                r.downvoted,
                r.ignored,
                r.skipped,
                if r.interrupted { "  interrupted" } else { "" }
            )
        },
        |r, w| {
            pretty_section(w, "Queue processing")?;
            pretty_kv(w, "Processed", r.processed.to_string())?;
            pretty_kv(w, "Upvote", r.upvoted.to_string())?;
            pretty_kv(w, "Downvote", r.downvoted.to_string())?;
            pretty_kv(w, "Ignore", r.ignored.to_string())?;
            pretty_kv(w, "Skipped", r.skipped.to_string())?;
            if r.interrupted {
                pretty_kv(w, "Status", "interrupted")?;
            }
            Ok(())
        },
    )
}

use std::io::Write;

use anyhow::Result;
use clap::Args;
use listguard_core::listing::unescape;
use listguard_core::record::DECISION_DATE_FORMAT;
use listguard_core::{Decision, Label, QueueStore};

use crate::context::Context;
use crate::output::{pretty_kv, pretty_rule, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct DecisionsArgs {
    /// Only show decisions with this label (upvote, downvote, ignore).
    #[arg(long)]
    pub label: Option<Label>,

    /// Only show the most recent N matching decisions.
    #[arg(long, value_name = "N")]
    pub last: Option<usize>,
}

/// Apply the label filter, then keep the last `last` entries.
fn select(decisions: Vec<Decision>, label: Option<Label>, last: Option<usize>) -> Vec<Decision> {
    let mut selected: Vec<_> = decisions
        .into_iter()
        .filter(|d| label.is_none_or(|l| d.label == l))
        .collect();
    if let Some(n) = last {
        let skip = selected.len().saturating_sub(n);
        selected.drain(..skip);
    }
    selected
}

/// Execute `lg decisions`.
///
/// # Errors
///
/// Store I/O errors and unreadable decision lines.
pub fn run_decisions(args: &DecisionsArgs, ctx: &Context) -> Result<()> {
    let decisions = select(ctx.store().decisions()?, args.label, args.last);
    render_mode(
        ctx.output,
        &decisions,
        |decisions, w| {
            for d in decisions {
                writeln!(
                    w,
                    "{}  {:<8}  {}  {}  {}",
                    d.date.format(DECISION_DATE_FORMAT),
                    d.label.as_str(),
                    d.tally,
                    d.hash,
                    unescape(&d.title)
                )?;
            }
            Ok(())
        },
        |decisions, w| {
            pretty_section(w, &format!("Decisions ({})", decisions.len()))?;
            for d in decisions {
                pretty_kv(w, "Title", unescape(&d.title))?;
                pretty_kv(w, "Hash", d.hash.as_str())?;
                pretty_kv(w, "Label", d.label.as_str())?;
                pretty_kv(w, "Counts", d.tally.to_string())?;
                pretty_kv(w, "Source", d.source.as_str())?;
                pretty_kv(w, "Date", d.date.format(DECISION_DATE_FORMAT).to_string())?;
                pretty_rule(w)?;
            }
            Ok(())
        },
    )
}

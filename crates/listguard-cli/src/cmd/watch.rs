use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Args;
use listguard_core::broadcast::BroadcastReport;
use listguard_core::scan::{ScanReport, scan_listings};
use listguard_core::{Broadcaster, CancelToken, GuardError, Moderator, QueueReport};
use serde::Serialize;
use tracing::{info, warn};

use crate::context::Context;
use crate::output::{pretty_kv, pretty_section, render_mode};

/// Granularity of the cancellable pause between cycles.
const PAUSE_STEP: Duration = Duration::from_millis(250);

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Seconds between cycles; defaults to `watch.interval_secs`.
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Run one cycle and exit.
    #[arg(long)]
    pub once: bool,
}

/// Outcome of one scan, process and broadcast pass. A stage that failed
/// without aborting the watch is `None`.
#[derive(Debug, Default, Serialize)]
struct Cycle {
    cycle: u64,
    scan: Option<ScanReport>,
    process: Option<QueueReport>,
    broadcast: Option<BroadcastReport>,
}

/// Configuration and local file errors stop the watch; anything else is
/// logged and retried next cycle.
const fn aborts_watch(err: &GuardError) -> bool {
    matches!(err, GuardError::Configuration(_) | GuardError::Io { .. })
}

fn stage<T>(name: &str, result: listguard_core::Result<T>) -> listguard_core::Result<Option<T>> {
    match result {
        Ok(report) => Ok(Some(report)),
        Err(err) if aborts_watch(&err) => Err(err),
        Err(err) => {
            warn!(stage = name, error = %err, code = %err.code(), "stage failed; continuing");
            Ok(None)
        }
    }
}

/// Sleep for `total`, waking early once `cancel` trips.
fn pause(total: Duration, cancel: &CancelToken) {
    let deadline = Instant::now() + total;
    while !cancel.is_cancelled() {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(PAUSE_STEP.min(deadline - now));
    }
}

/// Execute `lg watch`: scan, process and broadcast in a loop until
/// interrupted.
///
/// # Errors
///
/// Configuration problems and local file I/O errors.
pub fn run_watch(args: &WatchArgs, ctx: &Context) -> Result<()> {
    let interval = Duration::from_secs(args.interval.unwrap_or(ctx.config.watch.interval_secs));
    let (node, store) = (ctx.node(), ctx.store());
    let classifier = ctx.classifier()?;
    let cancel = &ctx.cancel;

    let mut count = 0;
    while !cancel.is_cancelled() {
        count += 1;
        info!(cycle = count, "starting cycle");
        let mut cycle = Cycle {
            cycle: count,
            ..Cycle::default()
        };

        cycle.scan = stage("scan", scan_listings(&node, &store))?;
        if !cancel.is_cancelled() {
            let moderator = Moderator::new(&store, &classifier, cancel.clone());
            cycle.process = stage("process", moderator.process_queue())?;
        }
        if !cancel.is_cancelled() {
            let broadcaster = Broadcaster::new(&node, &store, cancel.clone());
            cycle.broadcast = stage("broadcast", broadcaster.run(ctx.market_address()))?;
        }
        render_cycle(ctx, &cycle)?;

        if args.once {
            break;
        }
        info!(secs = interval.as_secs(), "cycle finished; waiting");
        pause(interval, cancel);
    }
    info!(cycles = count, "watch stopped");
    Ok(())
}

fn render_cycle(ctx: &Context, cycle: &Cycle) -> Result<()> {
    let or_failed = |value: Option<usize>| value.map_or_else(|| "failed".to_string(), |n| n.to_string());
    render_mode(
        ctx.output,
        cycle,
        |c, w| {
            writeln!(
                w,
                "cycle {}  queued {}  processed {}  broadcast {}",
                c.cycle,
                or_failed(c.scan.as_ref().map(|s| s.enqueued)),
                or_failed(c.process.as_ref().map(|p| p.processed)),
                or_failed(c.broadcast.as_ref().map(|b| b.completed)),
            )
        },
        |c, w| {
            pretty_section(w, &format!("Cycle {}", c.cycle))?;
            pretty_kv(w, "Listings queued", or_failed(c.scan.as_ref().map(|s| s.enqueued)))?;
            pretty_kv(w, "Classified", or_failed(c.process.as_ref().map(|p| p.processed)))?;
            pretty_kv(w, "Broadcast", or_failed(c.broadcast.as_ref().map(|b| b.completed)))
        },
    )
}

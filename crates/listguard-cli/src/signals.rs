//! SIGINT/SIGTERM handling.
//!
//! A background thread runs a current-thread tokio runtime that waits for
//! the first signal and trips the shared [`CancelToken`]. Work in progress
//! notices at its next checkpoint; a second SIGINT exits immediately.

use std::process;
use std::thread;

use anyhow::Context as _;
use listguard_core::CancelToken;
use tokio::runtime::{Builder, Runtime};
use tokio::signal;
use tracing::{info, warn};

/// Exit status used when a second interrupt forces the process down.
const FORCED_EXIT: i32 = 130;

/// Start the signal listener thread.
pub fn install(cancel: CancelToken) -> anyhow::Result<()> {
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build signal runtime")?;
    thread::Builder::new()
        .name("lg-signals".to_string())
        .spawn(move || listen(&runtime, &cancel))
        .context("failed to spawn signal listener")?;
    Ok(())
}

fn listen(runtime: &Runtime, cancel: &CancelToken) {
    runtime.block_on(wait_for_signal());
    cancel.cancel();
    info!("finishing the current step; press Ctrl-C again to abort");

    if runtime.block_on(signal::ctrl_c()).is_ok() {
        warn!("second interrupt, exiting");
        process::exit(FORCED_EXIT);
    }
}

/// Resolve on SIGINT or SIGTERM.
async fn wait_for_signal() {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = ctrl_c => match result {
            Ok(()) => info!("received SIGINT, stopping"),
            Err(err) => {
                warn!(error = %err, "SIGINT handler unavailable");
                std::future::pending::<()>().await;
            }
        },
        () = terminate => info!("received SIGTERM, stopping"),
    }
}

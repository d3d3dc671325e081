#![forbid(unsafe_code)]

mod classifier;
mod cmd;
mod context;
mod node_cli;
mod output;
mod signals;

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::{CommandFactory, Parser, Subcommand};
use listguard_core::config::{CONFIG_ENV, user_config_path};
use listguard_core::{CancelToken, GuardConfig};
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::context::Context;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "lg: quorum-voted moderation of marketplace listings",
    long_about = None
)]
struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Config file (default: $LISTGUARD_CONFIG, then the user config dir).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Write a config file",
        long_about = "Write a config file and create the data directory.",
        after_help = "EXAMPLES:\n    # Configure the node client and wallet\n    lg init --cli-path /opt/particl/particl-cli --wallet moderator\n\n    # Write to a specific file\n    lg --config ./listguard.toml init --data-dir ./data"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Market address setup",
        after_help = "EXAMPLES:\n    # Register the configured market address\n    lg market setup"
    )]
    Market {
        #[command(subcommand)]
        command: cmd::market::MarketCommand,
    },

    #[command(
        next_help_heading = "Queue",
        about = "Queue a listing for classification",
        after_help = "EXAMPLES:\n    # Queue a marketplace listing\n    lg enqueue 9f2c...e1 --title \"Brass lamp\" --description \"Old brass lamp\"\n\n    # Queue a test listing\n    lg enqueue --synthetic test-1 --title \"Brass lamp\""
    )]
    Enqueue(cmd::enqueue::EnqueueArgs),

    #[command(next_help_heading = "Queue", about = "Inspect or clear the listing queue")]
    Queue {
        #[command(subcommand)]
        command: cmd::queue::QueueCommand,
    },

    #[command(
        next_help_heading = "Queue",
        about = "Queue new listings from the node inbox",
        after_help = "EXAMPLES:\n    # Scan once\n    lg scan\n\n    # Emit machine-readable counts\n    lg scan --json"
    )]
    Scan,

    #[command(
        next_help_heading = "Moderation",
        about = "Classify queued listings",
        long_about = "Classify queued listings until the queue is empty. Each listing is \
                      sent to the classifier ten times; six matching answers decide it.",
        after_help = "EXAMPLES:\n    # Drain the queue\n    lg process"
    )]
    Process,

    #[command(
        next_help_heading = "Moderation",
        about = "Send proposals and votes for queued decisions",
        after_help = "EXAMPLES:\n    # Broadcast the vote queue\n    lg broadcast --json"
    )]
    Broadcast,

    #[command(
        next_help_heading = "Moderation",
        about = "Scan, process and broadcast in a loop",
        after_help = "EXAMPLES:\n    # Run every five minutes\n    lg watch --interval 300\n\n    # One cycle\n    lg watch --once"
    )]
    Watch(cmd::watch::WatchArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show the decision log",
        after_help = "EXAMPLES:\n    # Last ten downvotes\n    lg decisions --label downvote --last 10"
    )]
    Decisions(cmd::decisions::DecisionsArgs),

    #[command(next_help_heading = "Read", about = "Show decisions waiting to be broadcast")]
    Votes,

    #[command(
        next_help_heading = "Project Maintenance",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    lg completions bash"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("LISTGUARD_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "listguard_core=debug,lg=debug,info"
        } else {
            "listguard_core=info,lg=info,warn"
        })
    });

    let format = env::var("LISTGUARD_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

/// Where `lg init` writes: `--config`, else `$LISTGUARD_CONFIG`, else the
/// user config dir.
fn init_target(explicit: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    explicit
        .or_else(|| {
            env::var_os(CONFIG_ENV)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        })
        .or_else(user_config_path)
        .context("no user config directory on this platform; pass --config")
}

fn run(cli: Cli, output: OutputMode) -> anyhow::Result<()> {
    let command = match cli.command {
        Commands::Init(args) => {
            let target = init_target(cli.config)?;
            return cmd::init::run_init(&args, &target, output);
        }
        Commands::Completions(args) => {
            let mut command = Cli::command();
            return cmd::completions::run_completions(args.shell, &mut command);
        }
        other => other,
    };

    let (config, config_path) =
        GuardConfig::discover(cli.config.as_deref(), env::var_os(CONFIG_ENV))?;
    match &config_path {
        Some(path) => debug!(path = %path.display(), "config loaded"),
        None => debug!("no config file; using defaults"),
    }
    let ctx = Context {
        config,
        output,
        cancel: CancelToken::new(),
    };
    signals::install(ctx.cancel.clone())?;

    match command {
        Commands::Market { command } => cmd::market::run_market(&command, &ctx),
        Commands::Enqueue(args) => cmd::enqueue::run_enqueue(&args, &ctx),
        Commands::Queue { command } => cmd::queue::run_queue(&command, &ctx),
        Commands::Scan => cmd::scan::run_scan(&ctx),
        Commands::Process => cmd::process::run_process(&ctx),
        Commands::Broadcast => cmd::broadcast::run_broadcast(&ctx),
        Commands::Watch(args) => cmd::watch::run_watch(&args, &ctx),
        Commands::Decisions(args) => cmd::decisions::run_decisions(&args, &ctx),
        Commands::Votes => cmd::votes::run_votes(&ctx),
        Commands::Init(_) | Commands::Completions(_) => Ok(()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let output = resolve_output_mode(cli.json);
    match run(cli, output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if render_error(output, &CliError::from(&err)).is_err() {
                eprintln!("error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}

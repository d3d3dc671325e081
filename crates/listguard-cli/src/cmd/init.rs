use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};
use clap::Args;
use listguard_core::GuardConfig;
use serde::Serialize;

use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config file.
    #[arg(long)]
    pub force: bool,

    /// Directory for the queue, cache, decision log, vote queue and action log.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Path to the node's command-line client.
    #[arg(long)]
    pub cli_path: Option<PathBuf>,

    /// Wallet the node client should use.
    #[arg(long)]
    pub wallet: Option<String>,

    /// Market address votes and proposals are sent to.
    #[arg(long)]
    pub market_address: Option<String>,
}

#[derive(Debug, Serialize)]
struct InitReport {
    config_file: PathBuf,
    data_dir: PathBuf,
}

impl InitArgs {
    fn config(&self) -> GuardConfig {
        let mut config = GuardConfig::default();
        config.paths.data_dir.clone_from(&self.data_dir);
        config.node.cli_path.clone_from(&self.cli_path);
        config.node.wallet.clone_from(&self.wallet);
        if let Some(address) = &self.market_address {
            config.node.market_address.clone_from(address);
        }
        config
    }
}

/// Execute `lg init`: write a config file and create the data directory.
///
/// # Errors
///
/// Returns an error if the file exists and `--force` is not set, or if any
/// filesystem operation fails.
pub fn run_init(args: &InitArgs, target: &Path, output: OutputMode) -> Result<()> {
    if target.exists() && !args.force {
        bail!(
            "{} already exists. Use `lg init --force` to overwrite it.",
            target.display()
        );
    }

    let config = args.config();
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(target, config.to_toml()?)
        .with_context(|| format!("Failed to write {}", target.display()))?;

    let data_dir = config.data_dir();
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

    let report = InitReport {
        config_file: target.to_path_buf(),
        data_dir,
    };
    render_mode(
        output,
        &report,
        |r, w| {
            writeln!(w, "config  {}", r.config_file.display())?;
            writeln!(w, "data    {}", r.data_dir.display())
        },
        |r, w| {
            pretty_section(w, "Initialized listguard")?;
            pretty_kv(w, "Config file", r.config_file.display().to_string())?;
            pretty_kv(w, "Data directory", r.data_dir.display().to_string())
        },
    )
}

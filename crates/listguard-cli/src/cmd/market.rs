use std::io::Write;

use anyhow::Result;
use clap::Subcommand;
use listguard_core::market::{MarketSetup, ensure_market_key};
use serde::Serialize;

use crate::context::Context;
use crate::output::{pretty_kv, pretty_section, render_mode};

#[derive(Subcommand, Debug)]
pub enum MarketCommand {
    #[command(
        about = "Register the market address as a local SMSG key",
        long_about = "Make the configured market address a local SMSG key of the wallet, \
                      importing node.market_private_key first if the wallet does not own it."
    )]
    Setup,
}

#[derive(Debug, Serialize)]
struct SetupReport<'a> {
    market_address: &'a str,
    status: &'a str,
    setup: MarketSetup,
}

/// Execute `lg market setup`.
///
/// # Errors
///
/// An unconfigured node, a missing private key when one is needed, and node
/// call failures.
pub fn run_market(command: &MarketCommand, ctx: &Context) -> Result<()> {
    match command {
        MarketCommand::Setup => {
            let address = ctx.market_address();
            let setup = ensure_market_key(
                &ctx.node(),
                address,
                ctx.config.node.market_private_key.as_deref(),
            )?;
            let status = match setup {
                MarketSetup::AlreadyPresent => "already registered",
                MarketSetup::Added { imported_key: true } => "key imported and registered",
                MarketSetup::Added {
                    imported_key: false,
                } => "registered",
            };
            render_mode(
                ctx.output,
                &SetupReport {
                    market_address: address,
                    status,
                    setup,
                },
                |r, w| writeln!(w, "{}  {}", r.market_address, r.status),
                |r, w| {
                    pretty_section(w, "Market setup")?;
                    pretty_kv(w, "Address", r.market_address)?;
                    pretty_kv(w, "Status", r.status)
                },
            )
        }
    }
}

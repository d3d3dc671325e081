use std::io::Write;

use anyhow::{Result, bail};
use clap::{ArgGroup, Args};
use listguard_core::listing::unescape;
use listguard_core::{Listing, ListingHash, QueueStore};

use crate::context::Context;
use crate::output::{pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["hash", "synthetic"])))]
pub struct EnqueueArgs {
    /// Listing hash: 64 hexadecimal characters.
    pub hash: Option<String>,

    /// Queue a test listing whose hash is derived from this id, the title
    /// and the description. Synthetic listings skip the duplicate check.
    #[arg(long)]
    pub synthetic: Option<String>,

    #[arg(long)]
    pub title: String,

    #[arg(long, default_value = "")]
    pub description: String,
}

impl EnqueueArgs {
    fn listing(&self) -> Result<Listing> {
        match (&self.synthetic, &self.hash) {
            (Some(id), _) => Ok(Listing::synthetic(id, &self.title, &self.description)),
            (None, Some(hash)) => Ok(Listing::new(
                ListingHash::parse(hash)?,
                &self.title,
                &self.description,
            )),
            (None, None) => bail!("a listing hash or --synthetic id is required"),
        }
    }
}

/// Execute `lg enqueue`.
///
/// # Errors
///
/// Invalid or duplicate hashes and store I/O errors.
pub fn run_enqueue(args: &EnqueueArgs, ctx: &Context) -> Result<()> {
    let listing = args.listing()?;
    let entry = ctx.store().enqueue(&listing)?;
    render_mode(
        ctx.output,
        &entry,
        |e, w| writeln!(w, "{}  {}", e.listing.hash, unescape(&e.listing.title)),
        |e, w| {
            pretty_section(w, "Listing queued")?;
            pretty_kv(w, "Hash", e.listing.hash.as_str())?;
            pretty_kv(w, "Title", unescape(&e.listing.title))?;
            pretty_kv(w, "Queued at", e.enqueued_at.to_string())
        },
    )
}

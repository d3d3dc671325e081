//! Market key setup.
//!
//! The wallet has to hold the market address as a local SMSG key to read and
//! send marketplace messages. Setup is a no-op when the key is already there.

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{GuardError, Result};
use crate::node::NodeClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketSetup {
    AlreadyPresent,
    Added { imported_key: bool },
}

/// Make `address` a local SMSG key of the wallet.
///
/// If the wallet does not own the address, `private_key` is imported first.
///
/// # Errors
///
/// [`GuardError::Configuration`] if an import is needed and no key was
/// given; node call failures otherwise.
pub fn ensure_market_key<N: NodeClient + ?Sized>(
    node: &N,
    address: &str,
    private_key: Option<&str>,
) -> Result<MarketSetup> {
    if node.local_keys()?.contains(address) {
        info!(address, "market address already registered");
        return Ok(MarketSetup::AlreadyPresent);
    }

    let owned = match node.address_info(address) {
        Ok(info) => info.ismine,
        Err(err) => {
            warn!(address, error = %err, "address lookup failed; importing key");
            false
        }
    };
    if !owned {
        let key = private_key.filter(|k| !k.trim().is_empty()).ok_or_else(|| {
            GuardError::Configuration(format!(
                "node.market_private_key is required to import market address {address}"
            ))
        })?;
        node.import_private_key(key)?;
        info!(address, "market key imported");
    }

    node.add_local_address(address)?;
    node.scan_buckets()?;
    info!(address, "market address added to SMSG keys");
    Ok(MarketSetup::Added {
        imported_key: !owned,
    })
}

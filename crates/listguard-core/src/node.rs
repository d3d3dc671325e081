//! Particl node command interface.
//!
//! Everything the pipeline needs from the node goes through [`NodeClient`]:
//! one required method that runs a wallet-scoped command and returns its
//! stdout, plus typed wrappers for the commands actually used. Tests supply a
//! scripted fake; the CLI supplies a process-backed client.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{GuardError, Result};

/// One unspent output from `listunspent`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Utxo {
    pub address: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocalKey {
    #[serde(default)]
    pub address: String,
}

/// `smsglocalkeys` output.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocalKeys {
    #[serde(default)]
    pub wallet_keys: Vec<LocalKey>,
    #[serde(default)]
    pub smsg_keys: Vec<LocalKey>,
}

impl LocalKeys {
    #[must_use]
    pub fn contains(&self, address: &str) -> bool {
        self.wallet_keys
            .iter()
            .chain(&self.smsg_keys)
            .any(|k| k.address == address)
    }
}

/// The part of `getaddressinfo` output we read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressInfo {
    #[serde(default)]
    pub ismine: bool,
}

/// A wallet-scoped node command runner.
pub trait NodeClient {
    /// Run `method args..` against the configured wallet and return trimmed
    /// stdout.
    ///
    /// # Errors
    ///
    /// [`GuardError::ExternalCall`] on a non-zero exit or empty output;
    /// [`GuardError::Configuration`] if the node is not configured.
    fn call(&self, method: &str, args: &[&str]) -> Result<String>;

    /// # Errors
    ///
    /// Call failure or unparseable output.
    fn list_unspent(&self) -> Result<Vec<Utxo>> {
        parse_json("listunspent", &self.call("listunspent", &[])?)
    }

    /// Raw `smsginbox all "MPA_PROPOSAL_ADD"` output.
    ///
    /// # Errors
    ///
    /// Call failure.
    fn proposal_inbox(&self) -> Result<String> {
        self.call("smsginbox", &["all", crate::protocol::MSG_PROPOSAL_ADD])
    }

    /// Raw `smsginbox all` output.
    ///
    /// # Errors
    ///
    /// Call failure.
    fn inbox(&self) -> Result<String> {
        self.call("smsginbox", &["all"])
    }

    /// `smsgsend <from> <to> <message> false 2`; returns the node's reply.
    ///
    /// # Errors
    ///
    /// Call failure.
    fn send_message(&self, from: &str, to: &str, message: &str) -> Result<String> {
        self.call("smsgsend", &[from, to, message, "false", "2"])
    }

    /// # Errors
    ///
    /// Call failure.
    fn sign_message(&self, address: &str, payload: &str) -> Result<String> {
        self.call("signmessage", &[address, payload])
    }

    /// # Errors
    ///
    /// Call failure or unparseable output.
    fn local_keys(&self) -> Result<LocalKeys> {
        parse_json("smsglocalkeys", &self.call("smsglocalkeys", &[])?)
    }

    /// # Errors
    ///
    /// Call failure.
    fn scan_buckets(&self) -> Result<String> {
        self.call("smsgscanbuckets", &[])
    }

    /// # Errors
    ///
    /// Call failure.
    fn add_local_address(&self, address: &str) -> Result<String> {
        self.call("smsgaddlocaladdress", &[address])
    }

    /// # Errors
    ///
    /// Call failure or unparseable output.
    fn address_info(&self, address: &str) -> Result<AddressInfo> {
        parse_json("getaddressinfo", &self.call("getaddressinfo", &[address])?)
    }

    /// # Errors
    ///
    /// Call failure.
    fn import_private_key(&self, key: &str) -> Result<String> {
        self.call("importprivkey", &[key])
    }
}

impl<N: NodeClient + ?Sized> NodeClient for &N {
    fn call(&self, method: &str, args: &[&str]) -> Result<String> {
        (**self).call(method, args)
    }
}

fn parse_json<T: DeserializeOwned>(method: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| GuardError::external(method, format!("unparseable response: {e}")))
}

/// Addresses that can fund votes: positive balance, not the market address.
///
/// Each address appears once, in the order `listunspent` first reports it.
///
/// # Errors
///
/// Propagates `listunspent` failures.
pub fn funded_addresses<N: NodeClient + ?Sized>(node: &N, market: &str) -> Result<Vec<String>> {
    let mut addresses: Vec<String> = Vec::new();
    for utxo in node.list_unspent()? {
        if utxo.amount > 0.0 && utxo.address != market && !addresses.contains(&utxo.address) {
            addresses.push(utxo.address);
        }
    }
    debug!(count = addresses.len(), "funded addresses");
    Ok(addresses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Recorder {
        reply: String,
        calls: RefCell<Vec<String>>,
    }

    impl Recorder {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl NodeClient for Recorder {
        fn call(&self, method: &str, args: &[&str]) -> Result<String> {
            let mut line = vec![method];
            line.extend_from_slice(args);
            self.calls.borrow_mut().push(line.join(" "));
            Ok(self.reply.clone())
        }
    }

    #[test]
    fn wrappers_issue_expected_commands() {
        let node = Recorder::new("ok");
        node.proposal_inbox().expect("inbox");
        node.send_message("pFrom", "pTo", "{}").expect("send");
        node.sign_message("pAddr", "a,b").expect("sign");
        node.add_local_address("pMarket").expect("add");
        node.scan_buckets().expect("scan");
        assert_eq!(
            *node.calls.borrow(),
            vec![
                "smsginbox all MPA_PROPOSAL_ADD",
                "smsgsend pFrom pTo {} false 2",
                "signmessage pAddr a,b",
                "smsgaddlocaladdress pMarket",
                "smsgscanbuckets",
            ]
        );
    }

    #[test]
    fn funded_addresses_filter_and_dedupe() {
        let node = Recorder::new(
            r#"[
                {"address": "pA", "amount": 1.5, "txid": "t1"},
                {"address": "pMarket", "amount": 3.0},
                {"address": "pB", "amount": 0.0},
                {"address": "pC", "amount": 0.25},
                {"address": "pA", "amount": 2.0}
            ]"#,
        );
        let funded = funded_addresses(&node, "pMarket").expect("funded");
        assert_eq!(funded, vec!["pA".to_string(), "pC".to_string()]);
    }

    #[test]
    fn unparseable_output_is_an_external_error() {
        let node = Recorder::new("error: wallet not loaded");
        assert!(matches!(
            node.list_unspent(),
            Err(GuardError::ExternalCall { .. })
        ));
    }

    #[test]
    fn local_keys_checks_both_key_lists() {
        let node = Recorder::new(r#"{"wallet_keys": [], "smsg_keys": [{"address": "pMarket"}]}"#);
        let keys = node.local_keys().expect("keys");
        assert!(keys.contains("pMarket"));
        assert!(!keys.contains("pOther"));
        assert!(!node.address_info("pMarket").expect("info").ismine);
    }
}

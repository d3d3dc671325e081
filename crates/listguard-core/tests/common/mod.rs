//! Scripted stand-ins for the node and the classifier.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashSet;

use listguard_core::error::{GuardError, Result};
use listguard_core::{CancelToken, Classifier, FileQueueStore, NodeClient, StorePaths};
use serde_json::json;
use tempfile::TempDir;

pub const MARKET: &str = "PZijh4WzjCWLbSgBkMUtLHZBaU6dSSmkqN";

/// `"abc"` repeated out to 64 hex characters.
pub fn abc_hash() -> String {
    "abc".repeat(22)[..64].to_string()
}

pub fn temp_store() -> (TempDir, FileQueueStore) {
    let dir = TempDir::new().expect("tempdir");
    let store = FileQueueStore::new(StorePaths::in_dir(dir.path()), MARKET);
    (dir, store)
}

/// A message sent through `smsgsend`.
#[derive(Debug, Clone)]
pub struct Sent {
    pub from: String,
    pub to: String,
    pub message: serde_json::Value,
}

/// In-memory node with a fixed wallet and inbox.
#[derive(Default)]
pub struct FakeNode {
    pub unspent: String,
    pub proposal_inbox: String,
    pub inbox: String,
    pub fail_sign: HashSet<String>,
    pub fail_send_from: HashSet<String>,
    pub fail_inbox: bool,
    pub calls: RefCell<Vec<String>>,
    pub sent: RefCell<Vec<Sent>>,
    pub signed: RefCell<Vec<(String, String)>>,
}

impl FakeNode {
    /// A wallet holding coins on `addresses` plus the market address.
    pub fn with_funds(addresses: &[&str]) -> Self {
        let mut utxos: Vec<_> = addresses
            .iter()
            .map(|a| json!({"address": a, "amount": 1.0}))
            .collect();
        utxos.push(json!({"address": MARKET, "amount": 5.0}));
        Self {
            unspent: serde_json::Value::Array(utxos).to_string(),
            proposal_inbox: json!({"messages": []}).to_string(),
            inbox: json!({"messages": []}).to_string(),
            ..Self::default()
        }
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.borrow().clone()
    }
}

impl NodeClient for FakeNode {
    fn call(&self, method: &str, args: &[&str]) -> Result<String> {
        self.calls.borrow_mut().push(method.to_string());
        match method {
            "listunspent" => Ok(self.unspent.clone()),
            "smsginbox" if self.fail_inbox => Err(GuardError::ExternalCall {
                command: method.into(),
                reason: "exit status 1".into(),
            }),
            "smsginbox" if args.len() == 2 => Ok(self.proposal_inbox.clone()),
            "smsginbox" => Ok(self.inbox.clone()),
            "smsgscanbuckets" => Ok("Scan Buckets Completed.".into()),
            "signmessage" => {
                let (address, payload) = (args[0], args[1]);
                self.signed
                    .borrow_mut()
                    .push((address.to_string(), payload.to_string()));
                if self.fail_sign.contains(address) {
                    Err(GuardError::ExternalCall {
                        command: method.into(),
                        reason: "wallet locked".into(),
                    })
                } else {
                    Ok(format!("sig-{address}"))
                }
            }
            "smsgsend" => {
                let (from, to, text) = (args[0], args[1], args[2]);
                assert_eq!(&args[3..], ["false", "2"]);
                if self.fail_send_from.contains(from) {
                    return Err(GuardError::ExternalCall {
                        command: method.into(),
                        reason: "send failed".into(),
                    });
                }
                self.sent.borrow_mut().push(Sent {
                    from: from.into(),
                    to: to.into(),
                    message: serde_json::from_str(text).expect("sent text is JSON"),
                });
                Ok(r#"{"result": "Sent."}"#.into())
            }
            other => Err(GuardError::ExternalCall {
                command: other.into(),
                reason: "not scripted".into(),
            }),
        }
    }
}

/// Returns scripted answers in order; optionally trips a cancel token after
/// the n-th call.
pub struct ScriptedClassifier {
    answers: Vec<&'static str>,
    calls: Cell<usize>,
    cancel_after: Option<(usize, CancelToken)>,
    pub seen: RefCell<Vec<(String, String)>>,
}

impl ScriptedClassifier {
    pub fn new(answers: Vec<&'static str>) -> Self {
        Self {
            answers,
            calls: Cell::new(0),
            cancel_after: None,
            seen: RefCell::new(Vec::new()),
        }
    }

    pub fn cancelling_after(mut self, calls: usize, token: CancelToken) -> Self {
        self.cancel_after = Some((calls, token));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl Classifier for ScriptedClassifier {
    fn classify(&self, title: &str, description: &str) -> Result<String> {
        let n = self.calls.get();
        self.calls.set(n + 1);
        self.seen
            .borrow_mut()
            .push((title.to_string(), description.to_string()));
        if let Some((limit, token)) = &self.cancel_after {
            if n + 1 == *limit {
                token.cancel();
            }
        }
        let answer = self.answers[n % self.answers.len()];
        if answer == "<error>" {
            Err(GuardError::ExternalCall {
                command: "classifier".into(),
                reason: "model not loaded".into(),
            })
        } else {
            Ok(answer.to_string())
        }
    }
}

//! `NodeClient` backed by the node's command-line client.
//!
//! Every call runs `<cli_path> -rpcwallet=<wallet> <method> <args..>` and
//! returns trimmed stdout. Missing node settings only surface when a call is
//! actually made, so commands that never touch the node work unconfigured.

use std::process::Command;

use listguard_core::config::NodeConfig;
use listguard_core::error::{GuardError, Result};
use listguard_core::NodeClient;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ProcessNode {
    config: NodeConfig,
}

impl ProcessNode {
    pub fn from_config(config: &NodeConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn command(&self) -> Result<Command> {
        let (cli, wallet) = self.config.require()?;
        let mut command = Command::new(cli);
        command.arg(format!("-rpcwallet={wallet}"));
        Ok(command)
    }
}

impl NodeClient for ProcessNode {
    fn call(&self, method: &str, args: &[&str]) -> Result<String> {
        let mut command = self.command()?;
        command.arg(method).args(args);
        debug!(method, args = args.len(), "node call");

        let output = command.output().map_err(|e| GuardError::ExternalCall {
            command: method.to_string(),
            reason: format!("could not start node client: {e}"),
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GuardError::ExternalCall {
                command: method.to_string(),
                reason: format!("{}: {}", output.status, stderr.trim()),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if stdout.is_empty() {
            return Err(GuardError::ExternalCall {
                command: method.to_string(),
                reason: "empty response".to_string(),
            });
        }
        Ok(stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn unconfigured_node_fails_on_first_call() {
        let node = ProcessNode::from_config(&NodeConfig::default());
        let err = node.call("listunspent", &[]).expect_err("unconfigured");
        assert!(matches!(err, GuardError::Configuration(ref m) if m.contains("cli_path")));
    }

    #[test]
    fn blank_wallet_counts_as_missing() {
        let config = NodeConfig {
            cli_path: Some(PathBuf::from("particl-cli")),
            wallet: Some("   ".into()),
            ..NodeConfig::default()
        };
        let err = ProcessNode::from_config(&config)
            .call("listunspent", &[])
            .expect_err("no wallet");
        assert!(matches!(err, GuardError::Configuration(ref m) if m.contains("wallet")));
    }

    #[test]
    fn missing_binary_is_an_external_call_error() {
        let config = NodeConfig {
            cli_path: Some(PathBuf::from("/nonexistent/particl-cli")),
            wallet: Some("moderator".into()),
            ..NodeConfig::default()
        };
        let err = ProcessNode::from_config(&config)
            .call("smsginbox", &["all"])
            .expect_err("no binary");
        assert!(matches!(err, GuardError::ExternalCall { ref command, .. } if command == "smsginbox"));
    }

    #[cfg(unix)]
    #[test]
    fn stdout_is_trimmed_and_wallet_passed_first() {
        let config = NodeConfig {
            cli_path: Some(PathBuf::from("echo")),
            wallet: Some("moderator".into()),
            ..NodeConfig::default()
        };
        let out = ProcessNode::from_config(&config)
            .call("smsgscanbuckets", &["x"])
            .expect("echo");
        assert_eq!(out, "-rpcwallet=moderator smsgscanbuckets x");
    }
}

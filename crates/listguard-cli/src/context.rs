use listguard_core::{CancelToken, FileQueueStore, GuardConfig};

use crate::classifier::CommandClassifier;
use crate::node_cli::ProcessNode;
use crate::output::OutputMode;

/// Everything a command handler needs, built once per invocation.
pub struct Context {
    pub config: GuardConfig,
    pub output: OutputMode,
    pub cancel: CancelToken,
}

impl Context {
    pub fn store(&self) -> FileQueueStore {
        FileQueueStore::new(
            self.config.store_paths(),
            self.config.node.market_address.clone(),
        )
    }

    pub fn node(&self) -> ProcessNode {
        ProcessNode::from_config(&self.config.node)
    }

    pub fn classifier(&self) -> listguard_core::Result<CommandClassifier> {
        CommandClassifier::from_config(&self.config)
    }

    pub fn market_address(&self) -> &str {
        &self.config.node.market_address
    }
}

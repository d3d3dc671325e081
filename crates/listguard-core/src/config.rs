use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::{GuardError, Result};
use crate::protocol::DEFAULT_MARKET_ADDRESS;
use crate::store::{
    ACTION_LOG_FILE, CACHE_FILE, DECISION_FILE, QUEUE_FILE, StorePaths, VOTE_QUEUE_FILE,
};

/// Name of the environment variable that points at a config file.
pub const CONFIG_ENV: &str = "LISTGUARD_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardConfig {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Path to `particl-cli`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cli_path: Option<PathBuf>,
    /// Wallet passed as `-rpcwallet=`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet: Option<String>,
    #[serde(default = "default_market_address")]
    pub market_address: String,
    /// Only needed by `market setup` when the wallet does not own the address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_private_key: Option<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            cli_path: None,
            wallet: None,
            market_address: default_market_address(),
            market_private_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_classifier_program")]
    pub program: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// JSON rules file; relative paths resolve against the data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_file: Option<PathBuf>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            program: default_classifier_program(),
            model: default_model(),
            rules_file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(default = "default_queue_file")]
    pub queue_file: PathBuf,
    #[serde(default = "default_cache_file")]
    pub cache_file: PathBuf,
    #[serde(default = "default_decision_file")]
    pub decision_file: PathBuf,
    #[serde(default = "default_vote_queue_file")]
    pub vote_queue_file: PathBuf,
    #[serde(default = "default_action_log_file")]
    pub action_log_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            queue_file: default_queue_file(),
            cache_file: default_cache_file(),
            decision_file: default_decision_file(),
            vote_queue_file: default_vote_queue_file(),
            action_log_file: default_action_log_file(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

impl GuardConfig {
    /// Parse a config file.
    ///
    /// # Errors
    ///
    /// [`GuardError::Io`] if the file cannot be read, or
    /// [`GuardError::Configuration`] if it is not valid TOML for this schema.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| GuardError::io(path, e))?;
        toml::from_str(&content).map_err(|e| {
            GuardError::Configuration(format!("failed to parse {}: {e}", path.display()))
        })
    }

    /// Locate and load the effective config.
    ///
    /// Lookup order: `explicit` path, then the `LISTGUARD_CONFIG` value passed
    /// in as `env_path`, then `<user config dir>/listguard/config.toml`, then
    /// built-in defaults. An explicitly named file must exist; the user-dir
    /// file is optional. Returns the config and the file it came from.
    ///
    /// # Errors
    ///
    /// [`GuardError::Configuration`] if a named file is missing or invalid.
    pub fn discover(
        explicit: Option<&Path>,
        env_path: Option<OsString>,
    ) -> Result<(Self, Option<PathBuf>)> {
        let named = explicit
            .map(Path::to_path_buf)
            .or_else(|| env_path.filter(|v| !v.is_empty()).map(PathBuf::from));
        if let Some(path) = named {
            if !path.is_file() {
                return Err(GuardError::Configuration(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            return Ok((Self::load(&path)?, Some(path)));
        }

        match user_config_path() {
            Some(path) if path.is_file() => Ok((Self::load(&path)?, Some(path))),
            _ => Ok((Self::default(), None)),
        }
    }

    /// Serialise for `lg init`.
    ///
    /// # Errors
    ///
    /// [`GuardError::Configuration`] if encoding fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| GuardError::Configuration(format!("failed to encode config: {e}")))
    }

    /// Directory holding the store files.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.paths.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    /// Store file locations; relative names resolve against [`data_dir`](Self::data_dir).
    #[must_use]
    pub fn store_paths(&self) -> StorePaths {
        let dir = self.data_dir();
        StorePaths {
            queue: dir.join(&self.paths.queue_file),
            cache: dir.join(&self.paths.cache_file),
            decisions: dir.join(&self.paths.decision_file),
            vote_queue: dir.join(&self.paths.vote_queue_file),
            actions: dir.join(&self.paths.action_log_file),
        }
    }

    /// Rules file location, if one is configured.
    #[must_use]
    pub fn rules_path(&self) -> Option<PathBuf> {
        self.classifier
            .rules_file
            .as_ref()
            .map(|file| self.data_dir().join(file))
    }

    /// The node binary and wallet, which every node-backed command needs.
    ///
    /// # Errors
    ///
    /// [`GuardError::Configuration`] naming the first missing key.
    pub fn require_node(&self) -> Result<(&Path, &str)> {
        self.node.require()
    }
}

impl NodeConfig {
    /// The configured node binary and wallet.
    ///
    /// # Errors
    ///
    /// [`GuardError::Configuration`] naming the first missing or blank key.
    pub fn require(&self) -> Result<(&Path, &str)> {
        let cli = self
            .cli_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| GuardError::Configuration("node.cli_path is not set".to_string()))?;
        let wallet = self
            .wallet
            .as_deref()
            .filter(|w| !w.trim().is_empty())
            .ok_or_else(|| GuardError::Configuration("node.wallet is not set".to_string()))?;
        Ok((cli, wallet))
    }
}

/// `<user config dir>/listguard/config.toml`, where the platform has one.
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("listguard").join("config.toml"))
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir().map_or_else(|| PathBuf::from(".listguard"), |dir| dir.join("listguard"))
}

fn default_market_address() -> String {
    DEFAULT_MARKET_ADDRESS.to_string()
}

fn default_classifier_program() -> String {
    "ollama".to_string()
}

fn default_model() -> String {
    "gemma2:2b".to_string()
}

fn default_queue_file() -> PathBuf {
    PathBuf::from(QUEUE_FILE)
}

fn default_cache_file() -> PathBuf {
    PathBuf::from(CACHE_FILE)
}

fn default_decision_file() -> PathBuf {
    PathBuf::from(DECISION_FILE)
}

fn default_vote_queue_file() -> PathBuf {
    PathBuf::from(VOTE_QUEUE_FILE)
}

fn default_action_log_file() -> PathBuf {
    PathBuf::from(ACTION_LOG_FILE)
}

const fn default_interval_secs() -> u64 {
    60
}

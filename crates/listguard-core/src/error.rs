use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Machine-readable error codes for operators and scripted callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigMissing,
    DuplicateListing,
    InvalidListingHash,
    UndecodableLine,
    ExternalCallFailed,
    ProtocolViolation,
    NoFundedAddress,
    SigningFailed,
    Cancelled,
    FileIoFailed,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigMissing => "E1001",
            Self::DuplicateListing => "E2001",
            Self::InvalidListingHash => "E2002",
            Self::UndecodableLine => "E3001",
            Self::ExternalCallFailed => "E4001",
            Self::ProtocolViolation => "E4002",
            Self::NoFundedAddress => "E4003",
            Self::SigningFailed => "E4004",
            Self::Cancelled => "E5001",
            Self::FileIoFailed => "E5002",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigMissing => "Required configuration missing",
            Self::DuplicateListing => "Listing already queued",
            Self::InvalidListingHash => "Invalid listing hash",
            Self::UndecodableLine => "Unreadable record line",
            Self::ExternalCallFailed => "External call failed",
            Self::ProtocolViolation => "Proposal or vote data incomplete",
            Self::NoFundedAddress => "No funded address",
            Self::SigningFailed => "Message signing failed",
            Self::Cancelled => "Interrupted",
            Self::FileIoFailed => "Queue file I/O failed",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigMissing => {
                Some("Set the missing key in the config file (see `lg init`) and retry.")
            }
            Self::DuplicateListing | Self::UndecodableLine | Self::Cancelled => None,
            Self::InvalidListingHash => Some("Listing hashes are 64 hexadecimal characters."),
            Self::ExternalCallFailed => {
                Some("Check that the node is running and the wallet is loaded.")
            }
            Self::ProtocolViolation => Some("The entry stays queued and is retried next run."),
            Self::NoFundedAddress => {
                Some("Fund at least one non-market wallet address before broadcasting.")
            }
            Self::SigningFailed => Some("Verify the wallet is unlocked and owns the address."),
            Self::FileIoFailed => Some("Check disk space and write permissions."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors raised by the moderation pipeline and protocol builder.
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    /// A required path or config key is absent.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The listing hash is already in the dedup cache.
    #[error("listing {hash} already exists in cache")]
    Duplicate { hash: String },

    /// The listing hash is not 64 hexadecimal characters.
    #[error("invalid listing hash {0:?}: expected a 64-character hexadecimal string")]
    InvalidHash(String),

    /// A record line could not be decoded or parsed.
    #[error("unreadable line {line} in {}: {reason}", path.display())]
    Encoding {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// A node or classifier process failed or returned nothing.
    #[error("external call `{command}` failed: {reason}")]
    ExternalCall { command: String, reason: String },

    /// Proposal or vote data is missing a required field.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The wallet has no funded non-market address to vote from.
    #[error("no addresses with coins available to submit votes")]
    NoFundedAddress,

    /// The node returned no signature for a vote payload.
    #[error("failed to sign vote with {address}: {reason}")]
    Signing { address: String, reason: String },

    /// The cooperative cancellation flag was observed.
    #[error("operation interrupted")]
    Cancelled,

    /// Reading or writing one of the queue files failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl GuardError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn external(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ExternalCall {
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Configuration(_) => ErrorCode::ConfigMissing,
            Self::Duplicate { .. } => ErrorCode::DuplicateListing,
            Self::InvalidHash(_) => ErrorCode::InvalidListingHash,
            Self::Encoding { .. } => ErrorCode::UndecodableLine,
            Self::ExternalCall { .. } => ErrorCode::ExternalCallFailed,
            Self::Protocol(_) => ErrorCode::ProtocolViolation,
            Self::NoFundedAddress => ErrorCode::NoFundedAddress,
            Self::Signing { .. } => ErrorCode::SigningFailed,
            Self::Cancelled => ErrorCode::Cancelled,
            Self::Io { .. } => ErrorCode::FileIoFailed,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }

    /// Whether this error aborts a whole run rather than one listing or address.
    #[must_use]
    pub const fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::NoFundedAddress | Self::Io { .. }
        )
    }
}

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, GuardError>;

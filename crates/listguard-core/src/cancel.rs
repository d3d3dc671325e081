//! Cooperative cancellation shared between the CLI signal listener and the
//! processing loops.
//!
//! The flag is only observed between discrete units of work (one listing, one
//! classifier call, one vote-queue entry). External calls already in flight
//! are allowed to finish.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{GuardError, Result};

/// Cloneable handle to a single process-wide interrupt flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Return [`GuardError::Cancelled`] once cancellation was requested.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::Cancelled`] if [`cancel`](Self::cancel) was called
    /// on this token or any clone of it.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(GuardError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let observer = token.clone();
        assert!(observer.check().is_ok());

        token.cancel();
        assert!(observer.is_cancelled());
        assert!(matches!(observer.check(), Err(GuardError::Cancelled)));
    }
}

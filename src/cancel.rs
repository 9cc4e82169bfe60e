//! Cooperative cancellation for a replacement run.
//!
//! The `swapr` binary never cancels its token; it always runs to
//! completion. Cancellation is reached through the library API, by handing
//! a token to [`crate::run_replace`] or a [`crate::dispatcher::Dispatcher`]
//! and calling [`CancellationToken::cancel`] from another thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// A cooperative stop signal shared between the caller and running workers.
///
/// Cloning is cheap; all clones observe the same state. Workers check the
/// token before starting a file and again right before writing, so a
/// cancelled run never leaves a file half written.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    reason: Mutex<Option<String>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
    }

    /// Cancels and records why. The first reason given is kept.
    pub fn cancel_with_reason(&self, reason: impl Into<String>) {
        {
            let mut slot = self
                .inner
                .reason
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if slot.is_none() {
                *slot = Some(reason.into());
            }
        }
        self.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    pub fn reason(&self) -> Option<String> {
        self.inner
            .reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        token.cancel();
        assert!(clone.is_cancelled());
        assert_eq!(clone.reason(), None);
    }

    #[test]
    fn test_first_reason_wins() {
        let token = CancellationToken::new();
        token.cancel_with_reason("user interrupt");
        token.cancel_with_reason("later");
        assert!(token.is_cancelled());
        assert_eq!(token.reason().as_deref(), Some("user interrupt"));
    }
}

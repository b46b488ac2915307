//! Session cancellation
//!
//! A render session hands one token to its worker. Once the session is torn
//! down the token is cancelled, and any tile the worker finishes afterwards
//! is dropped instead of being delivered to an owner that no longer exists.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Shared one-way cancellation flag
///
/// Clones observe the same state. Cancellation is permanent; a new session
/// gets a new token.
///
/// # Example
///
/// ```
/// use stripview_scheduler::CancellationToken;
///
/// let token = CancellationToken::new();
/// let worker_token = token.clone();
///
/// token.cancel();
/// assert!(worker_token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token in the non-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel this token and every clone of it. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

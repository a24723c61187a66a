//! Cooperative cancellation flag.
//!
//! Cancellation is never preemptive: setting the flag only asks. The pipeline
//! checks it between files and the supervisor checks it on every poll tick,
//! so a request is honoured within one poll interval plus, if the backend
//! ignores SIGTERM, the kill grace period.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared, lock-free "please stop" flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once cancellation was requested.
    pub fn check(&self) -> Result<(), crate::error::ConvertError> {
        if self.is_cancelled() {
            Err(crate::error::ConvertError::Cancelled)
        } else {
            Ok(())
        }
    }
}

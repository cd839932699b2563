//! Cancellation signal accepted by async entry points
//!
//! Evaluation finishes before any async result is handed out, so there is
//! never pending work to interrupt. Providers accept the signal and never
//! read it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cloneable cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    cancelled: Arc<AtomicBool>,
}

impl CancellationSignal {
    /// A fresh, uncancelled signal
    pub fn new() -> Self {
        Self::default()
    }

    /// A signal that is never cancelled
    pub fn none() -> Self {
        Self::default()
    }

    /// Request cancellation; visible to every clone
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// True once any clone has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

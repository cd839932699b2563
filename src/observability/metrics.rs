//! Provider counters
//!
//! - Counters only, monotonic
//! - Relaxed atomics; exact values are not synchronized with evaluation

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by every provider built from one context
#[derive(Debug, Default)]
pub struct ProviderMetrics {
    queries_created: AtomicU64,
    queries_executed: AtomicU64,
    async_executions: AtomicU64,
    queries_rejected: AtomicU64,
    roots_rewritten: AtomicU64,
}

impl ProviderMetrics {
    /// All counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a query built by create-query
    pub fn increment_created(&self) {
        self.queries_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a synchronous execution
    pub fn increment_executed(&self) {
        self.queries_executed.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts an async execution
    pub fn increment_async(&self) {
        self.async_executions.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a tree refused by the guard
    pub fn increment_rejected(&self) {
        self.queries_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a root replaced by the rewriter
    pub fn increment_rewritten(&self) {
        self.roots_rewritten.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queries_created: self.queries_created.load(Ordering::Relaxed),
            queries_executed: self.queries_executed.load(Ordering::Relaxed),
            async_executions: self.async_executions.load(Ordering::Relaxed),
            queries_rejected: self.queries_rejected.load(Ordering::Relaxed),
            roots_rewritten: self.roots_rewritten.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of the provider counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queries_created: u64,
    pub queries_executed: u64,
    pub async_executions: u64,
    pub queries_rejected: u64,
    pub roots_rewritten: u64,
}

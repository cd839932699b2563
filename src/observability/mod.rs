//! Observability for query providers
//!
//! - Structured logging (JSON), injected per provider context
//! - Operation scopes with per-query correlation ids
//! - Provider counters
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on evaluation
//! 3. No background threads
//! 4. Deterministic output
//!
//! # Usage
//!
//! ```ignore
//! use memquery::observability::{MemoryLog, QueryScope, Severity};
//!
//! let log = MemoryLog::new();
//! let scope = QueryScope::begin(&log, "EXECUTE", &[]);
//! // ... do work ...
//! scope.complete(&[]);
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{JsonLogger, LogRecord, MemoryLog, NoopLog, QueryLog, Severity};
pub use metrics::{MetricsSnapshot, ProviderMetrics};
pub use scope::QueryScope;

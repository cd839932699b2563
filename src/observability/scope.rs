//! QueryScope for automatic begin/complete logging
//!
//! - Logs `{name}_BEGIN` on creation
//! - Logs `{name}_COMPLETE` or `{name}_FAILED` when finished
//! - Logs `{name}_INCOMPLETE` on drop if never finished
//!
//! Every record from one scope carries the same `query_id`.

use std::cell::Cell;

use uuid::Uuid;

use super::logger::{QueryLog, Severity};

/// A scope that logs the lifecycle of one provider operation
pub struct QueryScope<'a> {
    log: &'a dyn QueryLog,
    name: &'a str,
    query_id: String,
    finished: Cell<bool>,
}

impl<'a> QueryScope<'a> {
    /// Opens a scope and logs `{name}_BEGIN` at DEBUG
    pub fn begin(log: &'a dyn QueryLog, name: &'a str, fields: &[(&str, &str)]) -> Self {
        let query_id = Uuid::new_v4().to_string();
        if log.enabled(Severity::Debug) {
            let mut all: Vec<(&str, &str)> = vec![("query_id", query_id.as_str())];
            all.extend_from_slice(fields);
            log.log(Severity::Debug, &format!("{}_BEGIN", name), &all);
        }

        Self {
            log,
            name,
            query_id,
            finished: Cell::new(false),
        }
    }

    /// Returns the correlation id shared by this scope's records
    pub fn query_id(&self) -> &str {
        &self.query_id
    }

    /// Logs a TRACE record correlated with this scope
    pub fn trace(&self, event: &str, fields: &[(&str, &str)]) {
        if self.log.enabled(Severity::Trace) {
            let mut all: Vec<(&str, &str)> = vec![("query_id", self.query_id.as_str())];
            all.extend_from_slice(fields);
            self.log.log(Severity::Trace, event, &all);
        }
    }

    /// Marks the scope as completed; logs `{name}_COMPLETE` at DEBUG
    pub fn complete(self, fields: &[(&str, &str)]) {
        self.finished.set(true);
        let mut all: Vec<(&str, &str)> = vec![("query_id", self.query_id.as_str())];
        all.extend_from_slice(fields);
        self.log
            .log(Severity::Debug, &format!("{}_COMPLETE", self.name), &all);
    }

    /// Marks the scope as failed; logs `{name}_FAILED` at ERROR
    pub fn fail(self, code: &str, reason: &str) {
        self.finished.set(true);
        self.log.log(
            Severity::Error,
            &format!("{}_FAILED", self.name),
            &[
                ("code", code),
                ("query_id", self.query_id.as_str()),
                ("reason", reason),
            ],
        );
    }

    pub fn is_finished(&self) -> bool {
        self.finished.get()
    }
}

impl Drop for QueryScope<'_> {
    fn drop(&mut self) {
        if !self.finished.get() {
            self.log.log(
                Severity::Warn,
                &format!("{}_INCOMPLETE", self.name),
                &[
                    ("query_id", self.query_id.as_str()),
                    ("reason", "scope dropped without completion"),
                ],
            );
        }
    }
}

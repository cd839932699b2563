//! Observable provider events
//!
//! Events are explicit and typed. Scoped operations append `_BEGIN`,
//! `_COMPLETE`, `_FAILED` or `_INCOMPLETE` to their names.

use std::fmt;

/// Observable events in a query provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Untyped query construction
    CreateQuery,
    /// Typed query construction
    CreateQueryTyped,
    /// Synchronous execution
    Execute,
    /// Execution wrapped as an already-resolved future
    ExecuteAsync,
    /// One argument of a call whose root was substituted
    RootRewrite,
    /// The guard rejected a tree
    ExpressionRejected,
    /// A provider context was assembled
    ContextReady,
}

impl Event {
    /// Returns the event name
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::CreateQuery => "CREATE_QUERY",
            Event::CreateQueryTyped => "CREATE_QUERY_TYPED",
            Event::Execute => "EXECUTE",
            Event::ExecuteAsync => "EXECUTE_ASYNC",
            Event::RootRewrite => "ROOT_REWRITE",
            Event::ExpressionRejected => "EXPRESSION_REJECTED",
            Event::ContextReady => "CONTEXT_READY",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(Event::Execute.as_str(), "EXECUTE");
        assert_eq!(Event::ExecuteAsync.to_string(), "EXECUTE_ASYNC");
        assert_eq!(Event::RootRewrite.as_str(), "ROOT_REWRITE");
    }
}

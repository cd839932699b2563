//! Root substitution
//!
//! A query built against a placeholder root is rebound to the provider's
//! concrete source before evaluation. Only the outermost call's data-source
//! argument (or a bare root) is substituted; a tree whose root already sits
//! on a concrete source is returned unchanged, so rewriting twice is the same
//! as rewriting once.

use serde_json::Value;

use crate::expr::{Call, Expr, QueryRoot, SourceRef};
use crate::observability::{Event, QueryScope};

/// Returns the root the rewriter would substitute, if any
pub(crate) fn rewrite_target(expr: &Expr) -> Option<&QueryRoot> {
    match expr {
        Expr::Root(root) => Some(root),
        Expr::Call(call) => call.source().and_then(Expr::as_root),
        _ => None,
    }
}

/// Rebinds query roots to a concrete source expression
pub struct RootRewriter<'a> {
    source: &'a Expr,
    scope: Option<&'a QueryScope<'a>>,
}

impl<'a> RootRewriter<'a> {
    /// Rewrites placeholder roots to `source`
    pub fn new(source: &'a Expr) -> Self {
        Self {
            source,
            scope: None,
        }
    }

    /// Correlate per-argument TRACE records with an operation scope
    pub fn with_scope(mut self, scope: &'a QueryScope<'a>) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Returns the root that `rewrite` would substitute, if any
    pub fn target(expr: &Expr) -> Option<&QueryRoot> {
        rewrite_target(expr)
    }

    /// Rebuilds `expr` with its root bound to the source.
    ///
    /// Entity roots become the source expression. Raw-command roots become a
    /// source over `seeded`; without seeded rows the root is left in place
    /// and the engine rejects it as unbound.
    pub fn rewrite(&self, expr: &Expr, seeded: Option<&[Value]>) -> Expr {
        match expr {
            Expr::Root(root) => self.replacement(root, seeded),
            Expr::Call(call) => match call.source().and_then(Expr::as_root) {
                Some(root) => {
                    let mut args = Vec::with_capacity(call.args.len());
                    args.push(self.replacement(root, seeded));
                    args.extend(call.args.iter().skip(1).cloned());
                    for (index, arg) in args.iter().enumerate() {
                        self.trace_argument(&call.method.to_string(), index, arg);
                    }
                    Expr::Call(Call {
                        method: call.method.clone(),
                        args,
                    })
                }
                None => expr.clone(),
            },
            _ => expr.clone(),
        }
    }

    fn replacement(&self, root: &QueryRoot, seeded: Option<&[Value]>) -> Expr {
        match (root, seeded) {
            (QueryRoot::Entity { .. }, _) => self.source.clone(),
            (QueryRoot::RawCommand(command), Some(rows)) => {
                Expr::Source(SourceRef::new(command.sql.clone(), rows.to_vec()))
            }
            (QueryRoot::RawCommand(_), None) => Expr::Root(root.clone()),
        }
    }

    fn trace_argument(&self, method: &str, index: usize, arg: &Expr) {
        let Some(scope) = self.scope else {
            return;
        };
        let index = index.to_string();
        scope.trace(
            Event::RootRewrite.as_str(),
            &[
                ("method", method),
                ("argument", index.as_str()),
                ("expression", arg.to_string().as_str()),
            ],
        );
    }
}

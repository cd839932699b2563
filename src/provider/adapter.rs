//! Query provider adapter
//!
//! Turns trees built against placeholder roots into trees over a local
//! source and evaluates them with the local engine.
//!
//! Every entry point runs the same pipeline: guard → rewrite → evaluate (or
//! validate, for query creation) → wrap. Errors from any stage reach the
//! caller unchanged, including from the async entry point, which reports
//! them synchronously instead of through the returned future.

use std::sync::Arc;

use futures_util::future;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::{QueryError, QueryResult};
use crate::expr::{Expr, QueryRoot, ResultShape};
use crate::observability::{Event, QueryScope, Severity};

use super::cancel::CancellationSignal;
use super::context::ProviderContext;
use super::guard::ExpressionGuard;
use super::queryable::{AsyncQueryable, Completed, ErasedQueryable, LocalQueryable};
use super::rewrite::RootRewriter;

/// Provider bound to one local source
pub struct QueryProvider<T> {
    source: LocalQueryable<T>,
    context: Arc<ProviderContext>,
}

impl<T> Clone for QueryProvider<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            context: Arc::clone(&self.context),
        }
    }
}

impl<T> QueryProvider<T> {
    /// Creates a provider over `source` sharing `context`
    pub fn new(source: LocalQueryable<T>, context: Arc<ProviderContext>) -> Self {
        Self { source, context }
    }

    /// Starts a builder that checks both parts are present
    pub fn builder() -> QueryProviderBuilder<T> {
        QueryProviderBuilder::new()
    }

    /// The local collection placeholder roots are rebound to
    pub fn source(&self) -> &LocalQueryable<T> {
        &self.source
    }

    /// Rebinds the provider. Later operations read the new collection.
    pub fn set_source(&mut self, source: LocalQueryable<T>) {
        self.source = source;
    }

    /// Shared configuration, logging and metrics
    pub fn context(&self) -> &Arc<ProviderContext> {
        &self.context
    }

    /// Builds a wrapper for a tree whose element type is decided by its shape.
    ///
    /// A projection yields [`ErasedQueryable::Projected`]; anything else that
    /// is still a sequence keeps `T`. Scalar trees are not queryables.
    pub fn create_query(&self, expr: &Expr) -> QueryResult<ErasedQueryable<T>> {
        self.observe(Event::CreateQuery, expr, |scope| match expr.result_shape() {
            ResultShape::Projected => Ok(ErasedQueryable::Projected(
                self.build_queryable::<Value>(scope, expr)?,
            )),
            ResultShape::Sequence => Ok(ErasedQueryable::Same(self.build_queryable::<T>(scope, expr)?)),
            ResultShape::Scalar => Err(not_a_queryable(expr)),
        })
    }

    /// Builds a wrapper with element type `E`.
    ///
    /// Construction is lazy: the rewritten tree is validated, not evaluated.
    pub fn create_query_typed<E>(&self, expr: &Expr) -> QueryResult<AsyncQueryable<E>> {
        self.observe(Event::CreateQueryTyped, expr, |scope| {
            if expr.result_shape() == ResultShape::Scalar {
                return Err(not_a_queryable(expr));
            }
            self.build_queryable(scope, expr)
        })
    }

    /// Evaluates a tree and returns the result in engine form.
    ///
    /// Sequences come back as a JSON array.
    pub fn execute(&self, expr: &Expr) -> QueryResult<Value> {
        self.observe(Event::Execute, expr, |scope| {
            let value = self.evaluate(scope, expr)?;
            self.context.metrics().increment_executed();
            Ok(value)
        })
    }

    /// Evaluates a tree and converts the result to `R`
    pub fn execute_typed<R: DeserializeOwned>(&self, expr: &Expr) -> QueryResult<R> {
        self.observe(Event::Execute, expr, |scope| {
            let value = self.evaluate(scope, expr)?;
            let typed = serde_json::from_value(value)?;
            self.context.metrics().increment_executed();
            Ok(typed)
        })
    }

    /// Same evaluation as [`execute_typed`](Self::execute_typed), wrapped in
    /// an already-resolved future.
    ///
    /// The cancellation signal is accepted and not consulted.
    pub fn execute_async<R: DeserializeOwned>(
        &self,
        expr: &Expr,
        _cancel: &CancellationSignal,
    ) -> QueryResult<Completed<R>> {
        self.observe(Event::ExecuteAsync, expr, |scope| {
            let value = self.evaluate(scope, expr)?;
            let typed: R = serde_json::from_value(value)?;
            self.context.metrics().increment_async();
            Ok(future::ready(typed))
        })
    }

    fn build_queryable<E>(&self, scope: &QueryScope<'_>, expr: &Expr) -> QueryResult<AsyncQueryable<E>> {
        if let Expr::Root(root @ QueryRoot::RawCommand(_)) = expr {
            return Err(QueryError::unsupported(format!(
                "{} cannot be composed into a new query; enumerate it directly",
                root
            )));
        }

        let rewritten = self.prepare(scope, expr)?;
        self.context.engine().validate(&rewritten)?;
        self.context.metrics().increment_created();

        Ok(AsyncQueryable::new(
            LocalQueryable::from_expression(rewritten),
            Arc::clone(&self.context),
        ))
    }

    fn evaluate(&self, scope: &QueryScope<'_>, expr: &Expr) -> QueryResult<Value> {
        let rewritten = self.prepare(scope, expr)?;
        Ok(self.context.engine().evaluate(&rewritten)?.into_value())
    }

    /// Guard, then rewrite
    fn prepare(&self, scope: &QueryScope<'_>, expr: &Expr) -> QueryResult<Expr> {
        let context = self.context.as_ref();
        let guard = ExpressionGuard::new(context.capabilities(), context.commands());
        let outcome = match guard.check(expr) {
            Ok(outcome) => outcome,
            Err(err) => {
                context.metrics().increment_rejected();
                context.log().log(
                    Severity::Warn,
                    Event::ExpressionRejected.as_str(),
                    &[
                        ("query_id", scope.query_id()),
                        ("reason", err.to_string().as_str()),
                    ],
                );
                return Err(err);
            }
        };

        if RootRewriter::target(expr).is_some() {
            context.metrics().increment_rewritten();
        }
        Ok(RootRewriter::new(self.source.expression())
            .with_scope(scope)
            .rewrite(expr, outcome.seeded_root.as_deref()))
    }

    /// Runs `op` inside a logged scope
    fn observe<R>(
        &self,
        event: Event,
        expr: &Expr,
        op: impl FnOnce(&QueryScope<'_>) -> QueryResult<R>,
    ) -> QueryResult<R> {
        let log = self.context.log();
        let rendered = if log.enabled(Severity::Debug) {
            expr.to_string()
        } else {
            String::new()
        };
        let scope = QueryScope::begin(log, event.as_str(), &[("expression", rendered.as_str())]);

        match op(&scope) {
            Ok(value) => {
                scope.complete(&[]);
                Ok(value)
            }
            Err(err) => {
                scope.fail(err.code(), &err.to_string());
                Err(err)
            }
        }
    }
}

fn not_a_queryable(expr: &Expr) -> QueryError {
    QueryError::invalid_operation(format!(
        "{} produces a single value; expected a queryable",
        expr
    ))
}

/// Builder for [`QueryProvider`]
pub struct QueryProviderBuilder<T> {
    source: Option<LocalQueryable<T>>,
    context: Option<Arc<ProviderContext>>,
}

impl<T> Default for QueryProviderBuilder<T> {
    fn default() -> Self {
        Self {
            source: None,
            context: None,
        }
    }
}

impl<T> QueryProviderBuilder<T> {
    /// An empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the local collection
    pub fn source(mut self, source: LocalQueryable<T>) -> Self {
        self.source = Some(source);
        self
    }

    /// Sets the shared context
    pub fn context(mut self, context: Arc<ProviderContext>) -> Self {
        self.context = Some(context);
        self
    }

    /// Fails with `MissingArgument` if the source or context is absent
    pub fn build(self) -> QueryResult<QueryProvider<T>> {
        let source = self.source.ok_or(QueryError::MissingArgument("source"))?;
        let context = self.context.ok_or(QueryError::MissingArgument("context"))?;
        Ok(QueryProvider::new(source, context))
    }
}

//! Local and async-capable queryables
//!
//! `LocalQueryable` is a concrete synchronous collection. `AsyncQueryable`
//! wraps one and routes every composition, enumeration and terminal
//! operation through a [`QueryProvider`], so queries built against a
//! placeholder root evaluate against the local rows.
//!
//! Async operations return already-resolved futures and streams that are
//! never pending.

use std::marker::PhantomData;
use std::sync::Arc;
use std::vec;

use futures_util::stream::{self, Iter};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::engine::LocalEngine;
use crate::errors::{QueryError, QueryResult};
use crate::expr::{CommandParameter, Expr, Method, ResultShape, SourceRef};

use super::adapter::QueryProvider;
use super::cancel::CancellationSignal;
use super::context::ProviderContext;

/// An already-resolved future
pub type Completed<R> = futures_util::future::Ready<R>;

/// Row types that cross the engine boundary by serde conversion
pub trait Element: Serialize + DeserializeOwned {}

impl<T: Serialize + DeserializeOwned> Element for T {}

/// Converts engine rows to typed elements
pub(crate) fn convert_rows<E: DeserializeOwned>(rows: Vec<Value>) -> QueryResult<Vec<E>> {
    Ok(rows
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<_>, _>>()?)
}

/// A concrete, synchronously evaluable queryable of `T`.
///
/// Clones share the underlying rows. Rows added with [`extend`] or swapped
/// with [`replace`] are seen by every wrapper built over the collection,
/// including wrappers composed before the change.
///
/// [`extend`]: LocalQueryable::extend
/// [`replace`]: LocalQueryable::replace
pub struct LocalQueryable<T> {
    expression: Expr,
    _element: PhantomData<fn() -> T>,
}

impl<T> Clone for LocalQueryable<T> {
    fn clone(&self) -> Self {
        Self::from_expression(self.expression.clone())
    }
}

impl<T> std::fmt::Debug for LocalQueryable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LocalQueryable({})", self.expression)
    }
}

impl<T> LocalQueryable<T> {
    /// A collection over rows already in engine form
    pub fn from_values(name: impl Into<String>, rows: Vec<Value>) -> Self {
        Self::from_expression(Expr::Source(SourceRef::new(name, rows)))
    }

    pub(crate) fn from_expression(expression: Expr) -> Self {
        Self {
            expression,
            _element: PhantomData,
        }
    }

    /// The tree that evaluates to this collection
    pub fn expression(&self) -> &Expr {
        &self.expression
    }

    /// The collection at the base of this queryable's tree
    pub fn source_ref(&self) -> Option<&SourceRef> {
        let mut node = &self.expression;
        loop {
            match node {
                Expr::Source(source) => return Some(source),
                Expr::Call(call) => node = call.source()?,
                _ => return None,
            }
        }
    }

    fn backing(&self) -> QueryResult<&SourceRef> {
        self.source_ref().ok_or_else(|| {
            QueryError::invalid_operation(format!(
                "{} is not backed by a local collection",
                self.expression
            ))
        })
    }

    /// Appends rows already in engine form
    pub fn extend_values(&self, rows: Vec<Value>) -> QueryResult<()> {
        self.backing()?.extend(rows);
        Ok(())
    }

    /// Replaces every row with rows already in engine form
    pub fn replace_values(&self, rows: Vec<Value>) -> QueryResult<()> {
        self.backing()?.replace(rows);
        Ok(())
    }
}

impl<T: Element> LocalQueryable<T> {
    /// A collection over typed rows, converted with serde
    pub fn from_rows(name: impl Into<String>, rows: impl IntoIterator<Item = T>) -> QueryResult<Self> {
        Ok(Self::from_values(name, to_values(rows)?))
    }

    /// Evaluates the collection synchronously
    pub fn to_vec(&self) -> QueryResult<Vec<T>> {
        let rows = LocalEngine::new().evaluate(&self.expression)?.into_rows()?;
        convert_rows(rows)
    }

    /// Appends typed rows to the underlying collection.
    ///
    /// Nothing is added if any row fails to convert.
    pub fn extend(&self, rows: impl IntoIterator<Item = T>) -> QueryResult<()> {
        let source = self.backing()?;
        source.extend(to_values(rows)?);
        Ok(())
    }

    /// Replaces the underlying collection's rows
    pub fn replace(&self, rows: impl IntoIterator<Item = T>) -> QueryResult<()> {
        let source = self.backing()?;
        source.replace(to_values(rows)?);
        Ok(())
    }
}

fn to_values<T: Serialize>(rows: impl IntoIterator<Item = T>) -> QueryResult<Vec<Value>> {
    Ok(rows
        .into_iter()
        .map(|row| serde_json::to_value(&row))
        .collect::<Result<Vec<_>, _>>()?)
}

/// An async-capable queryable of `E`.
///
/// Owns one local source (through its provider) for its whole lifetime.
pub struct AsyncQueryable<E> {
    expression: Expr,
    provider: QueryProvider<E>,
}

impl<E> Clone for AsyncQueryable<E> {
    fn clone(&self) -> Self {
        Self {
            expression: self.expression.clone(),
            provider: self.provider.clone(),
        }
    }
}

impl<E> std::fmt::Debug for AsyncQueryable<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AsyncQueryable({})", self.expression)
    }
}

impl<E> AsyncQueryable<E> {
    /// Wraps a local collection; the wrapper's tree is the collection's own
    pub fn new(source: LocalQueryable<E>, context: Arc<ProviderContext>) -> Self {
        Self {
            expression: source.expression().clone(),
            provider: QueryProvider::new(source, context),
        }
    }

    /// A wrapper whose tree is an entity placeholder bound to `source`
    pub fn for_root(
        entity: impl Into<String>,
        source: LocalQueryable<E>,
        context: Arc<ProviderContext>,
    ) -> Self {
        Self {
            expression: Expr::entity_root(entity),
            provider: QueryProvider::new(source, context),
        }
    }

    /// A wrapper whose tree is a raw-command root.
    ///
    /// Rows come from the context's seeded command results.
    pub fn from_raw_command(
        sql: impl Into<String>,
        parameters: Vec<CommandParameter>,
        source: LocalQueryable<E>,
        context: Arc<ProviderContext>,
    ) -> Self {
        Self {
            expression: Expr::raw_command(sql, parameters),
            provider: QueryProvider::new(source, context),
        }
    }

    /// The tree evaluated on enumeration
    pub fn expression(&self) -> &Expr {
        &self.expression
    }

    /// The provider bound to this wrapper's source
    pub fn provider(&self) -> &QueryProvider<E> {
        &self.provider
    }

    /// How the wrapped tree dispatches
    pub fn shape(&self) -> ResultShape {
        self.expression.result_shape()
    }

    /// Rebinds the wrapper to a different local collection.
    ///
    /// A wrapper whose tree is the old collection itself now enumerates the
    /// new one. Placeholder trees pick the new collection up on rewrite.
    /// Trees already bound by composition keep their collection.
    pub fn set_source(&mut self, source: LocalQueryable<E>) {
        let is_collection = matches!(self.expression, Expr::Source(_));
        if is_collection && &self.expression == self.provider.source().expression() {
            self.expression = source.expression().clone();
        }
        self.provider.set_source(source);
    }

    /// Same tree and source, different element type
    pub(crate) fn retype<U>(self) -> AsyncQueryable<U> {
        let source = LocalQueryable::from_expression(self.provider.source().expression().clone());
        AsyncQueryable {
            expression: self.expression,
            provider: QueryProvider::new(source, self.provider.context().clone()),
        }
    }
}

impl<E: Element> AsyncQueryable<E> {
    /// Wraps typed rows
    pub fn from_rows(
        name: impl Into<String>,
        rows: impl IntoIterator<Item = E>,
        context: Arc<ProviderContext>,
    ) -> QueryResult<Self> {
        Ok(Self::new(LocalQueryable::from_rows(name, rows)?, context))
    }

    fn compose<U: Element>(&self, method: Method, operands: Vec<Expr>) -> QueryResult<AsyncQueryable<U>> {
        let mut args = Vec::with_capacity(operands.len() + 1);
        args.push(self.expression.clone());
        args.extend(operands);
        self.provider.create_query_typed::<U>(&Expr::call(method, args))
    }

    /// Keeps the elements matching `predicate`
    pub fn filter(&self, predicate: Expr) -> QueryResult<Self> {
        self.compose(Method::Where, vec![predicate])
    }

    /// Projects each element; the result's element type is `U`
    pub fn select<U: Element>(&self, selector: Expr) -> QueryResult<AsyncQueryable<U>> {
        self.compose(Method::Select, vec![selector])
    }

    /// Sorts ascending by `key`, stable
    pub fn order_by(&self, key: Expr) -> QueryResult<Self> {
        self.compose(Method::OrderBy, vec![key])
    }

    /// Sorts descending by `key`, stable
    pub fn order_by_descending(&self, key: Expr) -> QueryResult<Self> {
        self.compose(Method::OrderByDescending, vec![key])
    }

    /// Secondary ascending key for a preceding sort
    pub fn then_by(&self, key: Expr) -> QueryResult<Self> {
        self.compose(Method::ThenBy, vec![key])
    }

    /// Secondary descending key for a preceding sort
    pub fn then_by_descending(&self, key: Expr) -> QueryResult<Self> {
        self.compose(Method::ThenByDescending, vec![key])
    }

    /// Drops the first `count` elements
    pub fn skip(&self, count: usize) -> QueryResult<Self> {
        self.compose(Method::Skip, vec![Expr::constant(count as u64)])
    }

    /// Keeps at most `count` elements
    pub fn take(&self, count: usize) -> QueryResult<Self> {
        self.compose(Method::Take, vec![Expr::constant(count as u64)])
    }

    /// Drops repeated elements, keeping first occurrences
    pub fn distinct(&self) -> QueryResult<Self> {
        self.compose(Method::Distinct, vec![])
    }

    /// Reverses element order
    pub fn reverse(&self) -> QueryResult<Self> {
        self.compose(Method::Reverse, vec![])
    }

    /// Applies a provider-specific operator such as `AsNoTracking`
    pub fn extension(&self, name: impl Into<String>, args: Vec<Expr>) -> QueryResult<Self> {
        self.compose(Method::Extension(name.into()), args)
    }

    /// Materializes every element
    pub fn to_vec(&self) -> QueryResult<Vec<E>> {
        self.provider.execute_typed(&self.expression)
    }

    /// A stream over the materialized elements.
    ///
    /// Evaluation happens before the stream is returned. Each call evaluates
    /// again and starts from the first element.
    pub fn to_stream(&self) -> QueryResult<Iter<vec::IntoIter<E>>> {
        Ok(stream::iter(self.to_vec()?))
    }

    fn terminal<R: DeserializeOwned>(&self, method: Method, operand: Option<Expr>) -> QueryResult<R> {
        self.provider.execute_typed(&self.terminal_call(method, operand))
    }

    fn terminal_async<R: DeserializeOwned>(
        &self,
        method: Method,
        operand: Option<Expr>,
        cancel: &CancellationSignal,
    ) -> QueryResult<Completed<R>> {
        self.provider
            .execute_async(&self.terminal_call(method, operand), cancel)
    }

    fn terminal_call(&self, method: Method, operand: Option<Expr>) -> Expr {
        let mut args = vec![self.expression.clone()];
        args.extend(operand);
        Expr::call(method, args)
    }

    /// Number of elements
    pub fn count(&self) -> QueryResult<usize> {
        self.terminal(Method::Count, None)
    }

    /// Number of elements as a 64-bit count
    pub fn long_count(&self) -> QueryResult<i64> {
        self.terminal(Method::LongCount, None)
    }

    /// True when the sequence has at least one element
    pub fn any(&self) -> QueryResult<bool> {
        self.terminal(Method::Any, None)
    }

    /// True when every element matches; true for an empty sequence
    pub fn all(&self, predicate: Expr) -> QueryResult<bool> {
        self.terminal(Method::All, Some(predicate))
    }

    /// True when some element equals `element` in engine form
    pub fn contains(&self, element: &E) -> QueryResult<bool> {
        let needle = Expr::Constant(serde_json::to_value(element)?);
        self.terminal(Method::Contains, Some(needle))
    }

    /// Fails with `InvalidOperation` on an empty sequence
    pub fn first(&self) -> QueryResult<E> {
        self.terminal(Method::First, None)
    }

    /// First element, or `None` for an empty sequence
    pub fn first_or_default(&self) -> QueryResult<Option<E>> {
        self.terminal(Method::FirstOrDefault, None)
    }

    /// Fails with `InvalidOperation` unless exactly one element exists
    pub fn single(&self) -> QueryResult<E> {
        self.terminal(Method::Single, None)
    }

    /// The only element, or `None` when empty; fails on more than one
    pub fn single_or_default(&self) -> QueryResult<Option<E>> {
        self.terminal(Method::SingleOrDefault, None)
    }

    /// Fails with `InvalidOperation` on an empty sequence
    pub fn last(&self) -> QueryResult<E> {
        self.terminal(Method::Last, None)
    }

    /// Last element, or `None` for an empty sequence
    pub fn last_or_default(&self) -> QueryResult<Option<E>> {
        self.terminal(Method::LastOrDefault, None)
    }

    /// Element at a zero-based position; fails when out of range
    pub fn element_at(&self, index: usize) -> QueryResult<E> {
        self.terminal(Method::ElementAt, Some(Expr::constant(index as u64)))
    }

    /// Sum of the selected values; 0 for an empty sequence
    pub fn sum<R: DeserializeOwned>(&self, selector: Expr) -> QueryResult<R> {
        self.terminal(Method::Sum, Some(selector))
    }

    /// Smallest selected value; fails on an empty sequence
    pub fn min<R: DeserializeOwned>(&self, selector: Expr) -> QueryResult<R> {
        self.terminal(Method::Min, Some(selector))
    }

    /// Largest selected value; fails on an empty sequence
    pub fn max<R: DeserializeOwned>(&self, selector: Expr) -> QueryResult<R> {
        self.terminal(Method::Max, Some(selector))
    }

    /// `None` when every selected value is null
    pub fn average(&self, selector: Expr) -> QueryResult<Option<f64>> {
        self.terminal(Method::Average, Some(selector))
    }

    /// Async form of [`to_vec`](Self::to_vec)
    pub fn to_list_async(&self, cancel: &CancellationSignal) -> QueryResult<Completed<Vec<E>>> {
        self.provider.execute_async(&self.expression, cancel)
    }

    /// Async form of [`count`](Self::count)
    pub fn count_async(&self, cancel: &CancellationSignal) -> QueryResult<Completed<usize>> {
        self.terminal_async(Method::Count, None, cancel)
    }

    /// Async form of [`any`](Self::any)
    pub fn any_async(&self, cancel: &CancellationSignal) -> QueryResult<Completed<bool>> {
        self.terminal_async(Method::Any, None, cancel)
    }

    /// Async form of [`first`](Self::first)
    pub fn first_async(&self, cancel: &CancellationSignal) -> QueryResult<Completed<E>> {
        self.terminal_async(Method::First, None, cancel)
    }

    /// Async form of [`first_or_default`](Self::first_or_default)
    pub fn first_or_default_async(
        &self,
        cancel: &CancellationSignal,
    ) -> QueryResult<Completed<Option<E>>> {
        self.terminal_async(Method::FirstOrDefault, None, cancel)
    }

    /// Async form of [`single`](Self::single)
    pub fn single_async(&self, cancel: &CancellationSignal) -> QueryResult<Completed<E>> {
        self.terminal_async(Method::Single, None, cancel)
    }

    /// Async form of [`last_or_default`](Self::last_or_default)
    pub fn last_or_default_async(
        &self,
        cancel: &CancellationSignal,
    ) -> QueryResult<Completed<Option<E>>> {
        self.terminal_async(Method::LastOrDefault, None, cancel)
    }

    /// Async form of [`element_at`](Self::element_at)
    pub fn element_at_async(
        &self,
        index: usize,
        cancel: &CancellationSignal,
    ) -> QueryResult<Completed<E>> {
        self.terminal_async(Method::ElementAt, Some(Expr::constant(index as u64)), cancel)
    }

    /// Async form of [`sum`](Self::sum)
    pub fn sum_async<R: DeserializeOwned>(
        &self,
        selector: Expr,
        cancel: &CancellationSignal,
    ) -> QueryResult<Completed<R>> {
        self.terminal_async(Method::Sum, Some(selector), cancel)
    }

    /// Async form of [`min`](Self::min)
    pub fn min_async<R: DeserializeOwned>(
        &self,
        selector: Expr,
        cancel: &CancellationSignal,
    ) -> QueryResult<Completed<R>> {
        self.terminal_async(Method::Min, Some(selector), cancel)
    }

    /// Async form of [`max`](Self::max)
    pub fn max_async<R: DeserializeOwned>(
        &self,
        selector: Expr,
        cancel: &CancellationSignal,
    ) -> QueryResult<Completed<R>> {
        self.terminal_async(Method::Max, Some(selector), cancel)
    }

    /// Async form of [`average`](Self::average)
    pub fn average_async(
        &self,
        selector: Expr,
        cancel: &CancellationSignal,
    ) -> QueryResult<Completed<Option<f64>>> {
        self.terminal_async(Method::Average, Some(selector), cancel)
    }
}

/// Result of untyped query creation, tagged by element type
#[derive(Debug, Clone)]
pub enum ErasedQueryable<T> {
    /// Element type unchanged
    Same(AsyncQueryable<T>),
    /// Element type changed by a projection; rows stay in engine form
    Projected(AsyncQueryable<Value>),
}

impl<T> ErasedQueryable<T> {
    /// The wrapped tree
    pub fn expression(&self) -> &Expr {
        match self {
            ErasedQueryable::Same(query) => query.expression(),
            ErasedQueryable::Projected(query) => query.expression(),
        }
    }

    pub fn shape(&self) -> ResultShape {
        match self {
            ErasedQueryable::Same(_) => ResultShape::Sequence,
            ErasedQueryable::Projected(_) => ResultShape::Projected,
        }
    }

    /// Re-types the wrapper. Rows are converted to `U` when enumerated, so a
    /// mismatched type surfaces as a conversion error at that point.
    pub fn into_typed<U: Element>(self) -> AsyncQueryable<U> {
        match self {
            ErasedQueryable::Same(query) => query.retype(),
            ErasedQueryable::Projected(query) => query.retype(),
        }
    }

    /// Materializes the rows in engine form
    pub fn to_values(&self) -> QueryResult<Vec<Value>> {
        match self {
            ErasedQueryable::Same(query) => query.provider().execute_typed(query.expression()),
            ErasedQueryable::Projected(query) => query.to_vec(),
        }
    }
}

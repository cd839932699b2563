//! memquery - in-memory query provider for async-queried data sources
//!
//! Queries composed against a placeholder root (an entity set or a raw
//! command) are rebound to local collections and evaluated synchronously.
//! Async entry points return already-resolved futures and streams.
//!
//! ```ignore
//! use memquery::{lambda, AsyncQueryable, ProviderContext};
//!
//! let users = AsyncQueryable::from_rows("users", rows, ProviderContext::with_defaults())?;
//! let names: Vec<String> = users
//!     .filter(lambda("x", |x| x.field("id").equals(2)))?
//!     .select(lambda("x", |x| x.field("name")))?
//!     .to_vec()?;
//! ```

pub mod config;
pub mod engine;
pub mod errors;
pub mod expr;
pub mod observability;
pub mod provider;

pub use config::{EngineConfig, LogTarget};
pub use errors::{QueryError, QueryResult};
pub use expr::{lambda, CommandParameter, Expr, Method, ResultShape};
pub use provider::{
    AsyncQueryable, CancellationSignal, Completed, ErasedQueryable, LocalQueryable,
    ProviderContext, QueryProvider, RawCommandResults, SeededCommandResults,
};

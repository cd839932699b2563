//! Query provider
//!
//! Adapts query trees built against placeholder roots so they evaluate
//! against in-memory collections, with async-shaped results.
//!
//! # Pipeline
//!
//! ```text
//! AsyncQueryable ──► QueryProvider ──► ExpressionGuard ──► RootRewriter ──► LocalEngine
//!                         │
//!                         └──► ProviderContext (config, seeded commands, log, metrics)
//! ```

mod adapter;
mod cancel;
mod commands;
mod context;
mod guard;
mod queryable;
mod rewrite;

pub use adapter::{QueryProvider, QueryProviderBuilder};
pub use cancel::CancellationSignal;
pub use commands::{NoCommandResults, RawCommandResults, SeededCommandResults};
pub use context::{ProviderContext, ProviderContextBuilder};
pub use guard::{EngineCapabilities, ExpressionGuard, GuardOutcome};
pub use queryable::{AsyncQueryable, Completed, Element, ErasedQueryable, LocalQueryable};
pub use rewrite::RootRewriter;

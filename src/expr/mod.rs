//! Query expression model
//!
//! Callers describe queries as immutable trees of operator calls over a data
//! source. A freshly built tree names its origin with a query-root placeholder;
//! the provider later binds that placeholder to a concrete in-memory source.
//!
//! # Node kinds
//!
//! - Operator calls: a `Method` and ordered arguments, argument 0 is the source
//! - Roots: entity placeholders and raw-command roots
//! - Sources: concrete row snapshots the local engine can evaluate
//! - Scalars: constants, parameters, field access, operators, lambdas

mod ast;
mod render;
mod shape;

pub use ast::{
    lambda, BinaryOp, Call, CommandParameter, Expr, Lambda, Method, Operand, QueryRoot,
    RawCommand, SourceRef,
};
pub use shape::ResultShape;

//! Result types for local evaluation

use serde_json::Value;

use crate::errors::{QueryError, QueryResult};

/// What the local engine produced for a tree
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluated {
    /// Rows in result order
    Sequence(Vec<Value>),
    /// A single value
    Scalar(Value),
}

impl Evaluated {
    /// Returns true if the result is a sequence
    pub fn is_sequence(&self) -> bool {
        matches!(self, Evaluated::Sequence(_))
    }

    /// Returns the number of rows, or `None` for scalars
    pub fn len(&self) -> Option<usize> {
        match self {
            Evaluated::Sequence(rows) => Some(rows.len()),
            Evaluated::Scalar(_) => None,
        }
    }

    /// Materializes the result as a single JSON value; sequences become arrays
    pub fn into_value(self) -> Value {
        match self {
            Evaluated::Sequence(rows) => Value::Array(rows),
            Evaluated::Scalar(value) => value,
        }
    }

    /// Returns the rows, failing for scalar results
    pub fn into_rows(self) -> QueryResult<Vec<Value>> {
        match self {
            Evaluated::Sequence(rows) => Ok(rows),
            Evaluated::Scalar(value) => Err(QueryError::invalid_operation(format!(
                "expected a sequence, got scalar {}",
                value
            ))),
        }
    }
}

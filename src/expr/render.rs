//! Deterministic textual rendering of expression trees
//!
//! Used for log fields and error messages. Sources render by name only, never
//! by content.

use std::fmt;

use super::ast::{Expr, QueryRoot};

impl fmt::Display for QueryRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryRoot::Entity { entity } => write!(f, "Root({})", entity),
            QueryRoot::RawCommand(cmd) => {
                write!(f, "RawCommand({:?}", cmd.sql)?;
                for param in &cmd.parameters {
                    if param.name.is_empty() {
                        write!(f, ", {}", param.value)?;
                    } else {
                        write!(f, ", {}={}", param.name, param.value)?;
                    }
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Call(call) => {
                write!(f, "{}(", call.method)?;
                for (i, arg) in call.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Expr::Root(root) => write!(f, "{}", root),
            Expr::Source(source) => write!(f, "Source({})", source.name),
            Expr::Constant(value) => write!(f, "{}", value),
            Expr::Param(name) => write!(f, "{}", name),
            Expr::Member { target, field } => write!(f, "{}.{}", target, field),
            Expr::Binary { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Expr::Not(inner) => write!(f, "!({})", inner),
            Expr::Object(fields) => {
                write!(f, "new {{ ")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} = {}", name, value)?;
                }
                write!(f, " }}")
            }
            Expr::Lambda(lambda) => write!(f, "{} => {}", lambda.param, lambda.body),
        }
    }
}

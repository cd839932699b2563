//! Expression guard
//!
//! Runs before any rewrite or evaluation. Rejects trees the local engine
//! cannot honor instead of letting them evaluate to an empty or wrong result:
//!
//! - raw-command roots with no seeded result
//! - provider-specific operators outside the pass-through set
//!
//! The guard has no side effects.

use std::collections::HashSet;

use serde_json::Value;

use crate::config::EngineConfig;
use crate::errors::{QueryError, QueryResult};
use crate::expr::{Expr, Method, QueryRoot};

use super::commands::RawCommandResults;
use super::rewrite::rewrite_target;

/// What the local engine can evaluate beyond the core operator set
#[derive(Debug, Clone)]
pub struct EngineCapabilities {
    /// Lowercased pass-through operator names
    passthrough: HashSet<String>,
}

impl EngineCapabilities {
    /// Capabilities with the config's pass-through operators
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            passthrough: config
                .passthrough_extensions
                .iter()
                .map(|name| name.to_lowercase())
                .collect(),
        }
    }

    /// Returns true if the operator is evaluated as identity
    pub fn allows_extension(&self, name: &str) -> bool {
        self.passthrough.contains(&name.to_lowercase())
    }
}

impl Default for EngineCapabilities {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// Result of a successful check
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GuardOutcome {
    /// Seeded rows for the raw-command root the rewriter will substitute
    pub seeded_root: Option<Vec<Value>>,
}

/// Validates a tree against the engine's capabilities and seeded commands
pub struct ExpressionGuard<'a> {
    capabilities: &'a EngineCapabilities,
    commands: &'a dyn RawCommandResults,
}

impl<'a> ExpressionGuard<'a> {
    /// A guard checking against `capabilities` and seeded `commands`
    pub fn new(capabilities: &'a EngineCapabilities, commands: &'a dyn RawCommandResults) -> Self {
        Self {
            capabilities,
            commands,
        }
    }

    /// Walks the whole tree; fails with `UnsupportedExpression` on the first
    /// node the engine cannot honor
    pub fn check(&self, expr: &Expr) -> QueryResult<GuardOutcome> {
        expr.visit(&mut |node: &Expr| match node {
            Expr::Root(QueryRoot::RawCommand(command)) => self
                .commands
                .lookup(&command.sql, &command.parameters)
                .map(|_| ())
                .ok_or_else(|| unseeded(&command.sql)),
            Expr::Call(call) => match &call.method {
                Method::Extension(name) if !self.capabilities.allows_extension(name) => {
                    Err(QueryError::unsupported(format!(
                        "operator '{}' is not supported by the local engine",
                        name
                    )))
                }
                _ => Ok(()),
            },
            _ => Ok(()),
        })?;

        let seeded_root = match rewrite_target(expr) {
            Some(QueryRoot::RawCommand(command)) => Some(
                self.commands
                    .lookup(&command.sql, &command.parameters)
                    .ok_or_else(|| unseeded(&command.sql))?,
            ),
            _ => None,
        };
        Ok(GuardOutcome { seeded_root })
    }
}

fn unseeded(sql: &str) -> QueryError {
    QueryError::unsupported(format!("raw command '{}' has no seeded result", sql))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{lambda, CommandParameter};
    use crate::provider::commands::SeededCommandResults;
    use serde_json::json;

    fn seeded() -> SeededCommandResults {
        SeededCommandResults::new().with_result(
            "sp_NoParams",
            vec![],
            vec![json!("e1"), json!("e2")],
        )
    }

    #[test]
    fn test_entity_tree_passes() {
        let caps = EngineCapabilities::default();
        let commands = seeded();
        let guard = ExpressionGuard::new(&caps, &commands);

        let expr = Expr::call(
            Method::Where,
            vec![
                Expr::entity_root("users"),
                lambda("x", |x| x.field("id").equals(2)),
            ],
        );
        assert_eq!(guard.check(&expr).unwrap(), GuardOutcome::default());
    }

    #[test]
    fn test_seeded_raw_root_resolves_rows() {
        let caps = EngineCapabilities::default();
        let commands = seeded();
        let guard = ExpressionGuard::new(&caps, &commands);

        let outcome = guard
            .check(&Expr::raw_command("sp_NoParams", vec![]))
            .unwrap();
        assert_eq!(outcome.seeded_root, Some(vec![json!("e1"), json!("e2")]));
    }

    #[test]
    fn test_unseeded_raw_root_rejected() {
        let caps = EngineCapabilities::default();
        let commands = seeded();
        let guard = ExpressionGuard::new(&caps, &commands);

        let err = guard
            .check(&Expr::raw_command(
                "sp_Unknown",
                vec![CommandParameter::positional(1)],
            ))
            .unwrap_err();
        assert!(err.is_unsupported());
        assert!(err.to_string().contains("sp_Unknown"));
    }

    #[test]
    fn test_nested_unseeded_raw_root_rejected() {
        let caps = EngineCapabilities::default();
        let commands = seeded();
        let guard = ExpressionGuard::new(&caps, &commands);

        let expr = Expr::call(
            Method::Take,
            vec![
                Expr::call(
                    Method::Distinct,
                    vec![Expr::raw_command("sp_Unknown", vec![])],
                ),
                Expr::constant(1),
            ],
        );
        assert!(guard.check(&expr).unwrap_err().is_unsupported());
    }

    #[test]
    fn test_extensions_checked_case_insensitively() {
        let caps = EngineCapabilities::default();
        let commands = seeded();
        let guard = ExpressionGuard::new(&caps, &commands);

        let allowed = Expr::call(
            Method::Extension("asnotracking".to_string()),
            vec![Expr::entity_root("users")],
        );
        assert!(guard.check(&allowed).is_ok());

        let rejected = Expr::call(
            Method::Extension("FromSqlInterpolated".to_string()),
            vec![Expr::entity_root("users")],
        );
        assert!(guard.check(&rejected).unwrap_err().is_unsupported());
    }

    #[test]
    fn test_capabilities_from_config() {
        let config = EngineConfig::default().with_passthrough("WithHint");
        let caps = EngineCapabilities::from_config(&config);
        assert!(caps.allows_extension("withhint"));
        assert!(caps.allows_extension("Include"));
        assert!(!caps.allows_extension("Load"));
    }
}

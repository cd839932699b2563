//! Seeded results for raw-command roots
//!
//! A raw command is opaque to the local engine. Its rows come from results
//! seeded ahead of time; a command with no matching seed is unsupported.

use serde::Serialize;
use serde_json::Value;

use crate::engine::ValueOrdering;
use crate::errors::QueryResult;
use crate::expr::CommandParameter;

/// Source of rows for raw-command roots
pub trait RawCommandResults: Send + Sync {
    /// Returns the seeded rows for a command, or `None` if nothing matches
    fn lookup(&self, sql: &str, parameters: &[CommandParameter]) -> Option<Vec<Value>>;
}

/// No command has seeded results
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCommandResults;

impl RawCommandResults for NoCommandResults {
    fn lookup(&self, _: &str, _: &[CommandParameter]) -> Option<Vec<Value>> {
        None
    }
}

#[derive(Debug, Clone)]
struct SeededEntry {
    /// `None` matches every command
    sql: Option<String>,
    parameters: Vec<CommandParameter>,
    rows: Vec<Value>,
}

impl SeededEntry {
    fn matches(&self, sql: &str, parameters: &[CommandParameter]) -> bool {
        let Some(seeded_sql) = &self.sql else {
            return true;
        };
        if !sql.to_lowercase().contains(&seeded_sql.to_lowercase()) {
            return false;
        }
        self.parameters
            .iter()
            .all(|seeded| parameters.iter().any(|given| parameter_matches(seeded, given)))
    }
}

/// Named parameters match by case-insensitive name and value; positional
/// parameters match by value alone
fn parameter_matches(seeded: &CommandParameter, given: &CommandParameter) -> bool {
    let name_matches = seeded.name.is_empty() || seeded.name.eq_ignore_ascii_case(&given.name);
    name_matches && ValueOrdering::equals(&seeded.value, &given.value)
}

/// In-memory seeded command results.
///
/// Entries are consulted newest first, so a later seed for the same command
/// replaces an earlier one.
#[derive(Debug, Default, Clone)]
pub struct SeededCommandResults {
    entries: Vec<SeededEntry>,
}

impl SeededCommandResults {
    /// No seeded entries
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed rows returned for any command
    pub fn with_any_result(mut self, rows: Vec<Value>) -> Self {
        self.entries.push(SeededEntry {
            sql: None,
            parameters: Vec::new(),
            rows,
        });
        self
    }

    /// Seed rows for commands containing `sql` and carrying `parameters`
    pub fn with_result(
        mut self,
        sql: impl Into<String>,
        parameters: Vec<CommandParameter>,
        rows: Vec<Value>,
    ) -> Self {
        self.entries.push(SeededEntry {
            sql: Some(sql.into()),
            parameters,
            rows,
        });
        self
    }

    /// Seed typed rows, converted with serde
    pub fn with_typed_result<R: Serialize>(
        self,
        sql: impl Into<String>,
        parameters: Vec<CommandParameter>,
        rows: &[R],
    ) -> QueryResult<Self> {
        let rows = rows
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.with_result(sql, parameters, rows))
    }

    /// Number of seeded entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is seeded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl RawCommandResults for SeededCommandResults {
    fn lookup(&self, sql: &str, parameters: &[CommandParameter]) -> Option<Vec<Value>> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.matches(sql, parameters))
            .map(|entry| entry.rows.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unseeded_command_is_none() {
        let results = SeededCommandResults::new();
        assert!(results.lookup("sp_Unknown", &[]).is_none());
        assert!(NoCommandResults.lookup("sp_Unknown", &[]).is_none());
    }

    #[test]
    fn test_catch_all_matches_any_command() {
        let results = SeededCommandResults::new().with_any_result(vec![json!({"id": 1})]);
        assert_eq!(
            results.lookup("SELECT * FROM anything", &[]),
            Some(vec![json!({"id": 1})])
        );
    }

    #[test]
    fn test_sql_matches_case_insensitive_substring() {
        let results =
            SeededCommandResults::new().with_result("sp_NoParams", vec![], vec![json!(1)]);
        assert!(results.lookup("EXEC SP_NOPARAMS", &[]).is_some());
        assert!(results.lookup("sp_Other", &[]).is_none());
    }

    #[test]
    fn test_named_parameters_must_match() {
        let results = SeededCommandResults::new().with_result(
            "sp_WithParams",
            vec![CommandParameter::named("@Id", 5)],
            vec![json!("five")],
        );

        assert!(results
            .lookup("sp_WithParams", &[CommandParameter::named("@id", 5)])
            .is_some());
        assert!(results
            .lookup("sp_WithParams", &[CommandParameter::named("@id", 6)])
            .is_none());
        assert!(results.lookup("sp_WithParams", &[]).is_none());
    }

    #[test]
    fn test_positional_parameters_match_by_value() {
        let results = SeededCommandResults::new().with_result(
            "sp_Positional",
            vec![CommandParameter::positional("abc")],
            vec![json!(1)],
        );
        assert!(results
            .lookup(
                "sp_Positional",
                &[CommandParameter::positional(1), CommandParameter::positional("abc")]
            )
            .is_some());
    }

    #[test]
    fn test_latest_seed_wins() {
        let results = SeededCommandResults::new()
            .with_result("sp_Items", vec![], vec![json!("old")])
            .with_result("sp_Items", vec![], vec![json!("new")]);
        assert_eq!(results.lookup("sp_Items", &[]), Some(vec![json!("new")]));
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_typed_seed() {
        #[derive(Serialize)]
        struct Row {
            id: u32,
        }

        let results = SeededCommandResults::new()
            .with_typed_result("sp_Rows", vec![], &[Row { id: 7 }])
            .unwrap();
        assert_eq!(results.lookup("sp_Rows", &[]), Some(vec![json!({"id": 7})]));
    }
}

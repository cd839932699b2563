//! Engine configuration
//!
//! Every field has a default, so an empty JSON object is a valid config.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::QueryResult;
use crate::observability::{JsonLogger, NoopLog, QueryLog, Severity};

/// Where provider log records are written
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    /// Records are discarded
    #[default]
    None,
    Stdout,
    Stderr,
    /// Appended to a file, created if missing
    File(PathBuf),
}

/// Configuration shared by every provider built from one context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Provider-specific operators the engine evaluates as identity
    /// (default: the common tracking, include and tagging operators)
    #[serde(default = "default_passthrough_extensions")]
    pub passthrough_extensions: Vec<String>,

    /// Minimum severity written by the configured logger (default: info)
    #[serde(default = "default_log_level")]
    pub log_level: Severity,

    /// Log destination (default: none)
    #[serde(default)]
    pub log_target: LogTarget,
}

fn default_passthrough_extensions() -> Vec<String> {
    [
        "AsNoTracking",
        "AsTracking",
        "AsNoTrackingWithIdentityResolution",
        "Include",
        "ThenInclude",
        "IgnoreQueryFilters",
        "TagWith",
        "AsSplitQuery",
        "AsSingleQuery",
    ]
    .iter()
    .map(|name| name.to_string())
    .collect()
}

fn default_log_level() -> Severity {
    Severity::Info
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            passthrough_extensions: default_passthrough_extensions(),
            log_level: default_log_level(),
            log_target: LogTarget::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a config from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> QueryResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Add an operator to the pass-through list
    pub fn with_passthrough(mut self, name: impl Into<String>) -> Self {
        self.passthrough_extensions.push(name.into());
        self
    }

    /// Sets the minimum severity written by the logger
    pub fn with_log_level(mut self, level: Severity) -> Self {
        self.log_level = level;
        self
    }

    /// Sets where log lines go
    pub fn with_log_target(mut self, target: LogTarget) -> Self {
        self.log_target = target;
        self
    }

    /// Builds the logger described by `log_target` and `log_level`
    pub fn build_logger(&self) -> QueryResult<Arc<dyn QueryLog>> {
        let log: Arc<dyn QueryLog> = match &self.log_target {
            LogTarget::None => Arc::new(NoopLog),
            LogTarget::Stdout => Arc::new(JsonLogger::stdout(self.log_level)),
            LogTarget::Stderr => Arc::new(JsonLogger::stderr(self.log_level)),
            LogTarget::File(path) => Arc::new(JsonLogger::file(path, self.log_level)?),
        };
        Ok(log)
    }
}

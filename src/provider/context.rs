//! Provider context
//!
//! Everything a provider needs besides its source: configuration, the
//! derived capability set, seeded raw-command results, the injected logger,
//! counters and the engine. One context is shared by every provider and
//! wrapper derived from it.

use std::fmt;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::engine::LocalEngine;
use crate::errors::QueryResult;
use crate::observability::{Event, NoopLog, ProviderMetrics, QueryLog, Severity};

use super::commands::{NoCommandResults, RawCommandResults};
use super::guard::EngineCapabilities;

/// Shared, immutable provider state
pub struct ProviderContext {
    config: EngineConfig,
    capabilities: EngineCapabilities,
    commands: Arc<dyn RawCommandResults>,
    log: Arc<dyn QueryLog>,
    metrics: ProviderMetrics,
    engine: LocalEngine,
}

impl ProviderContext {
    /// Starts a builder with default config, no seeds and no logging
    pub fn builder() -> ProviderContextBuilder {
        ProviderContextBuilder::new()
    }

    /// Default config, no seeded commands, no logging
    pub fn with_defaults() -> Arc<Self> {
        Arc::new(Self::assemble(
            EngineConfig::default(),
            Arc::new(NoCommandResults),
            Arc::new(NoopLog),
        ))
    }

    fn assemble(
        config: EngineConfig,
        commands: Arc<dyn RawCommandResults>,
        log: Arc<dyn QueryLog>,
    ) -> Self {
        Self {
            capabilities: EngineCapabilities::from_config(&config),
            config,
            commands,
            log,
            metrics: ProviderMetrics::new(),
            engine: LocalEngine::new(),
        }
    }

    /// Config the context was built from
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Operators accepted by the guard
    pub fn capabilities(&self) -> &EngineCapabilities {
        &self.capabilities
    }

    /// Seeded raw-command results
    pub fn commands(&self) -> &dyn RawCommandResults {
        self.commands.as_ref()
    }

    /// Sink for operation events
    pub fn log(&self) -> &dyn QueryLog {
        self.log.as_ref()
    }

    /// Counters shared by every provider on this context
    pub fn metrics(&self) -> &ProviderMetrics {
        &self.metrics
    }

    /// Evaluator for rewritten trees
    pub fn engine(&self) -> &LocalEngine {
        &self.engine
    }
}

impl fmt::Debug for ProviderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderContext")
            .field("config", &self.config)
            .field("metrics", &self.metrics.snapshot())
            .finish()
    }
}

/// Builder for [`ProviderContext`]
#[derive(Default)]
pub struct ProviderContextBuilder {
    config: Option<EngineConfig>,
    commands: Option<Arc<dyn RawCommandResults>>,
    log: Option<Arc<dyn QueryLog>>,
}

impl ProviderContextBuilder {
    /// A builder with every part unset
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the default config
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Seeded results for raw-command roots
    pub fn commands(mut self, commands: impl RawCommandResults + 'static) -> Self {
        self.commands = Some(Arc::new(commands));
        self
    }

    /// Overrides the logger described by the config
    pub fn log(mut self, log: Arc<dyn QueryLog>) -> Self {
        self.log = Some(log);
        self
    }

    /// Assembles the context.
    ///
    /// Without an explicit logger, one is built from the config's log target,
    /// which fails if a log file cannot be opened.
    pub fn build(self) -> QueryResult<Arc<ProviderContext>> {
        let config = self.config.unwrap_or_default();
        let log = match self.log {
            Some(log) => log,
            None => config.build_logger()?,
        };
        let commands = self
            .commands
            .unwrap_or_else(|| Arc::new(NoCommandResults));

        let passthrough = config.passthrough_extensions.len().to_string();
        log.log(
            Severity::Info,
            Event::ContextReady.as_str(),
            &[
                ("log_level", config.log_level.as_str()),
                ("passthrough_extensions", passthrough.as_str()),
            ],
        );

        Ok(Arc::new(ProviderContext::assemble(config, commands, log)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::MemoryLog;
    use crate::provider::commands::SeededCommandResults;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let context = ProviderContext::with_defaults();
        assert!(context.capabilities().allows_extension("Include"));
        assert!(context.commands().lookup("sp_Any", &[]).is_none());
        assert!(!context.log().enabled(Severity::Error));
    }

    #[test]
    fn test_builder_wires_collaborators() {
        let log = Arc::new(MemoryLog::new());
        let context = ProviderContext::builder()
            .config(EngineConfig::default().with_passthrough("WithHint"))
            .commands(SeededCommandResults::new().with_any_result(vec![json!(1)]))
            .log(log.clone())
            .build()
            .unwrap();

        assert!(context.capabilities().allows_extension("WithHint"));
        assert_eq!(context.commands().lookup("sp_Any", &[]), Some(vec![json!(1)]));
        assert!(log.contains_event("CONTEXT_READY"));
    }

    #[test]
    fn test_builder_logger_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context.log");
        let config = EngineConfig::default()
            .with_log_target(crate::config::LogTarget::File(path.clone()));

        ProviderContext::builder().config(config).build().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("CONTEXT_READY"));
    }
}

//! Structured JSON logging for query providers
//!
//! Loggers are injected into each provider context; there is no process-wide
//! logger.
//!
//! - One log line = one event
//! - Deterministic key ordering: `event`, `severity`, then fields sorted by key
//! - Synchronous, no buffering

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Per-argument rewrite detail
    Trace = 0,
    /// Operation begin/complete
    Debug = 1,
    /// Normal operations
    Info = 2,
    /// Recoverable issues
    Warn = 3,
    /// Operation failures
    Error = 4,
}

impl Severity {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Logging capability injected into query providers
pub trait QueryLog: Send + Sync {
    /// Record one event with its fields
    fn log(&self, severity: Severity, event: &str, fields: &[(&str, &str)]);

    /// Returns false when records at `severity` would be dropped.
    ///
    /// Callers use this to skip rendering expensive fields.
    fn enabled(&self, _severity: Severity) -> bool {
        true
    }
}

/// Discards every record
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLog;

impl QueryLog for NoopLog {
    fn log(&self, _: Severity, _: &str, _: &[(&str, &str)]) {}

    fn enabled(&self, _: Severity) -> bool {
        false
    }
}

/// Writes one JSON object per line to a sink
pub struct JsonLogger {
    min_severity: Severity,
    sink: Mutex<Box<dyn Write + Send>>,
}

impl JsonLogger {
    /// Log to an arbitrary writer
    pub fn with_writer(writer: impl Write + Send + 'static, min_severity: Severity) -> Self {
        Self {
            min_severity,
            sink: Mutex::new(Box::new(writer)),
        }
    }

    /// Log to stdout
    pub fn stdout(min_severity: Severity) -> Self {
        Self::with_writer(io::stdout(), min_severity)
    }

    /// Log to stderr
    pub fn stderr(min_severity: Severity) -> Self {
        Self::with_writer(io::stderr(), min_severity)
    }

    /// Append to a file, creating it if needed
    pub fn file(path: impl AsRef<Path>, min_severity: Severity) -> io::Result<Self> {
        let file: File = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::with_writer(file, min_severity))
    }

    /// Renders a single log line, including the trailing newline
    pub fn render(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
        let mut output = String::with_capacity(128);

        output.push_str("{\"event\":\"");
        escape_json_string(&mut output, event);
        output.push_str("\",\"severity\":\"");
        output.push_str(severity.as_str());
        output.push('"');

        let mut sorted: Vec<_> = fields.iter().collect();
        sorted.sort_by_key(|(k, _)| *k);

        for (key, value) in sorted {
            output.push_str(",\"");
            escape_json_string(&mut output, key);
            output.push_str("\":\"");
            escape_json_string(&mut output, value);
            output.push('"');
        }

        output.push_str("}\n");
        output
    }
}

impl QueryLog for JsonLogger {
    fn log(&self, severity: Severity, event: &str, fields: &[(&str, &str)]) {
        if !self.enabled(severity) {
            return;
        }
        let line = Self::render(severity, event, fields);
        // Logging failures never fail a query
        if let Ok(mut sink) = self.sink.lock() {
            let _ = sink.write_all(line.as_bytes());
            let _ = sink.flush();
        }
    }

    fn enabled(&self, severity: Severity) -> bool {
        severity >= self.min_severity
    }
}

impl fmt::Debug for JsonLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonLogger")
            .field("min_severity", &self.min_severity)
            .finish()
    }
}

/// One captured log record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub severity: Severity,
    pub event: String,
    pub fields: Vec<(String, String)>,
}

impl LogRecord {
    /// Returns the value of a field, if present
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Captures records in memory, for assertions in tests
#[derive(Debug, Default)]
pub struct MemoryLog {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryLog {
    /// An empty capture
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every captured record, in order
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Returns the captured event names, in order
    pub fn events(&self) -> Vec<String> {
        self.records().into_iter().map(|r| r.event).collect()
    }

    /// Returns true if an event with this name was captured
    pub fn contains_event(&self, event: &str) -> bool {
        self.records().iter().any(|r| r.event == event)
    }
}

impl QueryLog for MemoryLog {
    fn log(&self, severity: Severity, event: &str, fields: &[(&str, &str)]) {
        if let Ok(mut records) = self.records.lock() {
            records.push(LogRecord {
                severity,
                event: event.to_string(),
                fields: fields
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            });
        }
    }
}

/// Escape special characters for JSON strings
fn escape_json_string(output: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '"' => output.push_str("\\\""),
            '\\' => output.push_str("\\\\"),
            '\n' => output.push_str("\\n"),
            '\r' => output.push_str("\\r"),
            '\t' => output.push_str("\\t"),
            c if c.is_control() => {
                output.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => output.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// Shared buffer so tests can read what the logger wrote
    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Trace < Severity::Debug);
        assert!(Severity::Debug < Severity::Info);
        assert!(Severity::Info < Severity::Warn);
        assert!(Severity::Warn < Severity::Error);
    }

    #[test]
    fn test_severity_from_config_string() {
        let s: Severity = serde_json::from_str("\"warn\"").unwrap();
        assert_eq!(s, Severity::Warn);
    }

    #[test]
    fn test_render_is_json() {
        let output = JsonLogger::render(Severity::Info, "TEST_EVENT", &[("key1", "value1")]);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["event"], "TEST_EVENT");
        assert_eq!(parsed["severity"], "INFO");
        assert_eq!(parsed["key1"], "value1");
    }

    #[test]
    fn test_render_deterministic_ordering() {
        let output1 = JsonLogger::render(
            Severity::Info,
            "TEST",
            &[("zebra", "1"), ("apple", "2"), ("mango", "3")],
        );
        let output2 = JsonLogger::render(
            Severity::Info,
            "TEST",
            &[("apple", "2"), ("mango", "3"), ("zebra", "1")],
        );
        assert_eq!(output1, output2);

        let apple_pos = output1.find("apple").unwrap();
        let zebra_pos = output1.find("zebra").unwrap();
        assert!(apple_pos < zebra_pos);
    }

    #[test]
    fn test_render_escapes_special_chars() {
        let output = JsonLogger::render(
            Severity::Info,
            "TEST",
            &[("expression", "Where(RawCommand(\"sp\"), x => x.ok)\n")],
        );
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["expression"], "Where(RawCommand(\"sp\"), x => x.ok)\n");
        assert_eq!(output.chars().filter(|c| *c == '\n').count(), 1);
    }

    #[test]
    fn test_min_severity_filters() {
        let buffer = SharedBuffer::default();
        let logger = JsonLogger::with_writer(buffer.clone(), Severity::Info);

        logger.log(Severity::Debug, "DROPPED", &[]);
        logger.log(Severity::Warn, "KEPT", &[]);

        let contents = buffer.contents();
        assert!(!contents.contains("DROPPED"));
        assert!(contents.contains("KEPT"));
        assert!(!logger.enabled(Severity::Trace));
    }

    #[test]
    fn test_file_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queries.log");

        let logger = JsonLogger::file(&path, Severity::Trace).unwrap();
        logger.log(Severity::Info, "FIRST", &[]);
        logger.log(Severity::Info, "SECOND", &[]);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn test_memory_log_captures() {
        let log = MemoryLog::new();
        log.log(Severity::Debug, "EXECUTE_BEGIN", &[("query_id", "q1")]);

        let records = log.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].field("query_id"), Some("q1"));
        assert!(log.contains_event("EXECUTE_BEGIN"));
    }
}

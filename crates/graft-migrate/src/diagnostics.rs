//! Diagnostics and the logging sink
//!
//! The engine never prompts. It produces [`Diagnostic`]s with a severity and a
//! path, hands each one to a [`DiagnosticSink`] owned by the host, and keeps a
//! copy in the pass report.

use crate::error::{DiagnosticKind, MigrationError, Severity};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One logged condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Classification
    pub kind: DiagnosticKind,
    /// Severity
    pub severity: Severity,
    /// Human-readable message
    pub message: String,
    /// Access path at which it was raised
    pub path: String,
}

impl Diagnostic {
    /// Create a warning
    #[inline]
    #[must_use]
    pub fn warning(kind: DiagnosticKind, message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Warning,
            message: message.into(),
            path: path.into(),
        }
    }

    /// Create an error
    #[inline]
    #[must_use]
    pub fn error(kind: DiagnosticKind, message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Error,
            message: message.into(),
            path: path.into(),
        }
    }
}

impl From<&MigrationError> for Diagnostic {
    fn from(err: &MigrationError) -> Self {
        Self {
            kind: err.kind(),
            severity: err.severity(),
            message: err.to_string(),
            path: err.path().to_string(),
        }
    }
}

/// Host-side logging channel
pub trait DiagnosticSink {
    /// Data may have been dropped; the pass continued
    fn warn(&mut self, message: &str, path: &str);

    /// Something is broken outside the engine, or the pass aborted
    fn error(&mut self, message: &str, path: &str);

    /// Dispatch by severity
    fn emit(&mut self, diagnostic: &Diagnostic) {
        match diagnostic.severity {
            Severity::Warning => self.warn(&diagnostic.message, &diagnostic.path),
            Severity::Error => self.error(&diagnostic.message, &diagnostic.path),
        }
    }
}

/// Sink that forwards to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn warn(&mut self, message: &str, path: &str) {
        tracing::warn!(path, "{message}");
    }

    fn error(&mut self, message: &str, path: &str) {
        tracing::error!(path, "{message}");
    }
}

/// Sink that keeps diagnostics in memory
///
/// Clones share the same buffer, so a host can keep one handle and give
/// another to the pass.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<(Severity, String, String)>>>,
}

impl MemorySink {
    /// Create empty sink
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of `(severity, message, path)` entries
    #[must_use]
    pub fn entries(&self) -> Vec<(Severity, String, String)> {
        self.entries.lock().clone()
    }

    /// Number of warnings received
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|(s, _, _)| *s == Severity::Warning)
            .count()
    }

    /// Number of errors received
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|(s, _, _)| *s == Severity::Error)
            .count()
    }
}

impl DiagnosticSink for MemorySink {
    fn warn(&mut self, message: &str, path: &str) {
        self.entries
            .lock()
            .push((Severity::Warning, message.to_string(), path.to_string()));
    }

    fn error(&mut self, message: &str, path: &str) {
        self.entries
            .lock()
            .push((Severity::Error, message.to_string(), path.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_heap::ObjectId;

    #[test]
    fn memory_sink_shares_buffer() {
        let sink = MemorySink::new();
        let mut handle = sink.clone();
        handle.warn("dropped", "S{0}");
        handle.error("broken", "S");
        assert_eq!(sink.warning_count(), 1);
        assert_eq!(sink.error_count(), 1);
        assert_eq!(sink.entries()[0].2, "S{0}");
    }

    #[test]
    fn emit_routes_by_severity() {
        let mut sink = MemorySink::new();
        sink.emit(&Diagnostic::error(DiagnosticKind::Heap, "x", "p"));
        sink.emit(&Diagnostic::warning(DiagnosticKind::NullKey, "y", "q"));
        assert_eq!(sink.error_count(), 1);
        assert_eq!(sink.warning_count(), 1);
    }

    #[test]
    fn diagnostic_from_error() {
        let err = MigrationError::NullKey {
            container: ObjectId(3),
            path: "Index{2}".into(),
        };
        let diagnostic = Diagnostic::from(&err);
        assert_eq!(diagnostic.kind, DiagnosticKind::NullKey);
        assert_eq!(diagnostic.severity, Severity::Warning);
        assert_eq!(diagnostic.path, "Index{2}");
    }
}

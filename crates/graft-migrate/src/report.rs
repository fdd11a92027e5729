//! Pass summary

use crate::diagnostics::Diagnostic;
use crate::error::{DiagnosticKind, Severity};
use serde::{Deserialize, Serialize};

/// Outcome of one migration pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    /// Distinct old instances visited (identity cache size)
    pub objects_migrated: usize,
    /// Instances kept and edited in place
    pub edited_in_place: usize,
    /// Items (fields, elements, entries) processed by populate steps
    pub items_processed: usize,
    /// Root creation tasks run
    pub create_tasks: usize,
    /// Populate tasks run
    pub populate_tasks: usize,
    /// Late-populate tasks run
    pub late_tasks: usize,
    /// Sequences migrated by block copy
    pub block_copies: usize,
    /// Old instances whose finalizer was suppressed
    pub finalizers_suppressed: usize,
    /// Everything logged during the pass, in order
    pub diagnostics: Vec<Diagnostic>,
}

impl PassReport {
    /// Number of diagnostics of a kind
    #[must_use]
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics.iter().filter(|d| d.kind == kind).count()
    }

    /// Number of warnings
    #[must_use]
    pub fn warnings(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    /// Number of errors
    #[must_use]
    pub fn errors(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    /// Whether anything was logged at error severity
    #[inline]
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.errors() > 0
    }

    /// One-line summary
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "migrated {} objects ({} in place), {} items, {} block copies, {} warnings, {} errors",
            self.objects_migrated,
            self.edited_in_place,
            self.items_processed,
            self.block_copies,
            self.warnings(),
            self.errors()
        )
    }
}

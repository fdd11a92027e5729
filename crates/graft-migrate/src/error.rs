//! Error types for the migration engine
//!
//! Every variant except [`MigrationError::IdentityCacheConflict`] is
//! recoverable: the pass logs it at the smallest scope (one item or one
//! container) and keeps going. A conflict in the identity cache means a
//! strategy broke the one-new-instance-per-old-instance invariant, and the pass
//! aborts.

use crate::identity::CacheConflict;
use graft_heap::{HeapError, ObjectId};
use serde::{Deserialize, Serialize};

/// Errors raised while migrating a heap
#[derive(Debug, Clone, thiserror::Error)]
pub enum MigrationError {
    /// A container changed size behind the pass's back
    #[error(
        "container {container} changed size during migration: expected {expected} items, found {actual} (at {path})"
    )]
    ThreadInterference {
        /// Container being refilled
        container: ObjectId,
        /// Count the pass expected
        expected: usize,
        /// Count actually observed
        actual: usize,
        /// Access path
        path: String,
    },

    /// Two distinct old keys are equal under the new type's semantics
    #[error("key collision in container {container}: {key} is already present, entry dropped (at {path})")]
    KeyCollision {
        /// Container being refilled
        container: ObjectId,
        /// Canonical form of the colliding key
        key: String,
        /// Access path
        path: String,
    },

    /// A key resolved to null after migration
    #[error("key resolved to null in container {container}, entry skipped (at {path})")]
    NullKey {
        /// Container being refilled
        container: ObjectId,
        /// Access path
        path: String,
    },

    /// Type metadata needed for migration was missing
    #[error("unresolved type '{type_name}': {reason} (at {path})")]
    UnresolvedType {
        /// Name of the type that could not be resolved
        type_name: String,
        /// What was missing
        reason: String,
        /// Access path
        path: String,
    },

    /// The same old instance was mapped to two different new instances
    #[error("identity cache conflict: {conflict} (at {path})")]
    IdentityCacheConflict {
        /// Conflicting mapping
        #[source]
        conflict: CacheConflict,
        /// Access path
        path: String,
    },

    /// Heap access failed
    #[error("heap error: {source} (at {path})")]
    Heap {
        /// Underlying heap error
        #[source]
        source: HeapError,
        /// Access path
        path: String,
    },
}

impl MigrationError {
    /// Whether the pass must abort
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::IdentityCacheConflict { .. })
    }

    /// Classification used for diagnostics
    #[must_use]
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            Self::ThreadInterference { .. } => DiagnosticKind::ThreadInterference,
            Self::KeyCollision { .. } => DiagnosticKind::KeyCollision,
            Self::NullKey { .. } => DiagnosticKind::NullKey,
            Self::UnresolvedType { .. } => DiagnosticKind::UnresolvedType,
            Self::IdentityCacheConflict { .. } => DiagnosticKind::IdentityCacheConflict,
            Self::Heap { .. } => DiagnosticKind::Heap,
        }
    }

    /// Severity the error is logged at
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::KeyCollision { .. } | Self::NullKey { .. } | Self::UnresolvedType { .. } => {
                Severity::Warning
            }
            Self::ThreadInterference { .. }
            | Self::IdentityCacheConflict { .. }
            | Self::Heap { .. } => Severity::Error,
        }
    }

    /// Access path recorded with the error
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::ThreadInterference { path, .. }
            | Self::KeyCollision { path, .. }
            | Self::NullKey { path, .. }
            | Self::UnresolvedType { path, .. }
            | Self::IdentityCacheConflict { path, .. }
            | Self::Heap { path, .. } => path,
        }
    }

    /// Wrap a heap error with the path it occurred at
    #[inline]
    #[must_use]
    pub fn heap(source: HeapError, path: impl Into<String>) -> Self {
        Self::Heap {
            source,
            path: path.into(),
        }
    }

    /// Create unresolved type error
    #[inline]
    #[must_use]
    pub fn unresolved_type(
        type_name: impl Into<String>,
        reason: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self::UnresolvedType {
            type_name: type_name.into(),
            reason: reason.into(),
            path: path.into(),
        }
    }
}

impl From<HeapError> for MigrationError {
    /// Path is left empty; the context fills it in when the error is logged
    fn from(source: HeapError) -> Self {
        Self::heap(source, String::new())
    }
}

/// Diagnostic classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// Container size diverged during the single-threaded pass
    ThreadInterference,
    /// Keys collided under new equality
    KeyCollision,
    /// Key resolved to null
    NullKey,
    /// Type metadata missing
    UnresolvedType,
    /// Identity cache invariant violated
    IdentityCacheConflict,
    /// Heap access failure
    Heap,
    /// Stale compiled type metadata was discarded
    StaleTypeMetadata,
    /// A non-swappable root could not keep its instance
    RootNotRepointed,
    /// A field value no longer fits the field's type and was reset
    FieldTypeChanged,
    /// A container element, key or value no longer fits the container's type
    /// and was reset
    ElementTypeChanged,
}

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Data may have been dropped, pass continued
    Warning,
    /// Something is wrong outside the engine, or the pass aborted
    Error,
}

/// Result type alias for migration operations
pub type MigrationResult<T> = Result<T, MigrationError>;

//! Error types for the heap model

use crate::object::ObjectId;
use crate::types::TypeId;

/// Errors raised by heap and type registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeapError {
    /// Object slot is empty (never allocated or already collected)
    #[error("dangling object reference: {0}")]
    Dangling(ObjectId),

    /// Type id not present in the registry
    #[error("unknown type id: {0}")]
    UnknownType(TypeId),

    /// A type with the same name already exists in this generation
    #[error("type '{name}' already registered in generation {generation}")]
    DuplicateType {
        /// Logical type name
        name: String,
        /// Generation the duplicate was registered in
        generation: u32,
    },

    /// Object body does not have the shape the operation needs
    #[error("object {id} is a {found}, expected a {expected}")]
    BodyMismatch {
        /// Offending object
        id: ObjectId,
        /// Body kind the operation needed
        expected: &'static str,
        /// Body kind actually found
        found: &'static str,
    },

    /// Named field does not exist on the record type
    #[error("type '{type_name}' has no field '{field}'")]
    NoSuchField {
        /// Record type name
        type_name: String,
        /// Requested field
        field: String,
    },

    /// Static slot lookup failed
    #[error("no static slot named '{0}'")]
    NoSuchStatic(String),
}

/// Result type alias for heap operations
pub type HeapResult<T> = Result<T, HeapError>;

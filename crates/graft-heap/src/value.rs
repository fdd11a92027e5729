//! Slot values

use crate::object::ObjectId;
use crate::types::{PrimitiveKind, TypeId, TypeKind, TypeRegistry};
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// Contents of a field, element or static slot
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null reference
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// Immutable shared string
    Str(Arc<str>),
    /// Strong reference to a heap object
    Ref(ObjectId),
    /// Runtime type handle
    Type(TypeId),
}

impl Value {
    /// Create a string value
    #[inline]
    #[must_use]
    pub fn str(s: &str) -> Self {
        Self::Str(Arc::from(s))
    }

    /// Referenced object, if any
    #[inline]
    #[must_use]
    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Self::Ref(id) => Some(*id),
            _ => None,
        }
    }

    /// Integer payload, if any
    #[inline]
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// String payload, if any
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this is the null reference
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Default value of a slot of the given type
    ///
    /// Scalars default to zero, everything else to null.
    #[must_use]
    pub fn default_for(types: &TypeRegistry, ty: TypeId) -> Self {
        match types.get(ty).map(|d| &d.kind) {
            Ok(TypeKind::Primitive(PrimitiveKind::Bool)) => Self::Bool(false),
            Ok(TypeKind::Primitive(PrimitiveKind::Int)) => Self::Int(0),
            Ok(TypeKind::Primitive(PrimitiveKind::Float)) => Self::Float(0.0),
            _ => Self::Null,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Ref(id) => write!(f, "{id}"),
            Self::Type(ty) => write!(f, "type {ty}"),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::str(s)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Self::Ref(id)
    }
}

//! Heap objects

use crate::error::HeapResult;
use crate::store::KeyedStore;
use crate::types::{MapFlavor, SetFlavor, TypeId, TypeKind, TypeRegistry};
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::{self, Display, Formatter};

/// Identity of a heap object (arena slot)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub usize);

impl ObjectId {
    /// Arena position
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Storage of an object, shaped by its type kind
#[derive(Debug, Clone)]
pub enum ObjectBody {
    /// Record fields in layout order
    Record(Vec<Value>),
    /// Array, list or stack elements (stacks bottom to top)
    Sequence(Vec<Value>),
    /// FIFO queue, front first
    Queue(VecDeque<Value>),
    /// Map or set
    Keyed(KeyedStore),
    /// Expiring reference target
    Weak(Option<ObjectId>),
    /// Identity-keyed side table
    SideTable(IndexMap<ObjectId, Value>),
}

impl ObjectBody {
    /// Empty body for a type
    ///
    /// Records get their field defaults; containers start empty.
    ///
    /// # Errors
    /// Returns an error if `ty` (or a field type) is not registered
    pub fn empty_for(types: &TypeRegistry, ty: TypeId) -> HeapResult<Self> {
        let descriptor = types.get(ty)?;
        Ok(match &descriptor.kind {
            TypeKind::Primitive(_) => Self::Record(Vec::new()),
            TypeKind::Record { fields, .. } => Self::Record(
                fields
                    .iter()
                    .map(|f| Value::default_for(types, f.ty))
                    .collect(),
            ),
            TypeKind::Sequence { .. } => Self::Sequence(Vec::new()),
            TypeKind::Queue { .. } => Self::Queue(VecDeque::new()),
            TypeKind::Map { flavor, .. } => Self::Keyed(match flavor {
                MapFlavor::Sorted => KeyedStore::sorted(),
                MapFlavor::Hashed | MapFlavor::Concurrent => KeyedStore::hashed(),
            }),
            TypeKind::Set { flavor, .. } => Self::Keyed(match flavor {
                SetFlavor::Sorted => KeyedStore::sorted(),
                SetFlavor::Hashed => KeyedStore::hashed(),
            }),
            TypeKind::WeakRef { .. } => Self::Weak(None),
            TypeKind::SideTable { .. } => Self::SideTable(IndexMap::new()),
        })
    }

    /// Short label used in errors
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Record(_) => "record",
            Self::Sequence(_) => "sequence",
            Self::Queue(_) => "queue",
            Self::Keyed(_) => "keyed collection",
            Self::Weak(_) => "weak reference",
            Self::SideTable(_) => "side table",
        }
    }
}

/// A live heap object
#[derive(Debug, Clone)]
pub struct Object {
    /// Current type tag
    pub ty: TypeId,
    /// Contents
    pub body: ObjectBody,
    /// Finalizer will not run for this instance
    pub finalizer_suppressed: bool,
}

impl Object {
    /// Create an object
    #[inline]
    #[must_use]
    pub fn new(ty: TypeId, body: ObjectBody) -> Self {
        Self {
            ty,
            body,
            finalizer_suppressed: false,
        }
    }
}

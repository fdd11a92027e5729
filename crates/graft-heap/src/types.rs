//! Generational type definitions
//!
//! Every heap object is tagged with a [`TypeId`] into a [`TypeRegistry`]. A hot
//! reload registers a second *generation* of descriptors next to the first; the
//! logical name (`"Player"`, `"Map<PlayerId, Player>"`) is what ties the two
//! generations together.

use crate::error::{HeapError, HeapResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

/// Index of a type descriptor in a [`TypeRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeId(pub usize);

impl TypeId {
    /// Built-in boolean type
    pub const BOOL: Self = Self(0);
    /// Built-in 64-bit integer type
    pub const INT: Self = Self(1);
    /// Built-in 64-bit float type
    pub const FLOAT: Self = Self(2);
    /// Built-in string type
    pub const STR: Self = Self(3);
    /// Built-in dynamically typed slot
    pub const ANY: Self = Self(4);

    /// Position in the registry
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for TypeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Primitive kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    /// `true` / `false`
    Bool,
    /// Signed 64-bit integer
    Int,
    /// 64-bit float
    Float,
    /// Immutable string
    Str,
    /// Any value, including references
    Any,
}

/// Ordering discipline of a sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SequenceOrder {
    /// Fixed-length array
    Array,
    /// Growable list
    List,
    /// LIFO stack, stored bottom to top
    Stack,
}

/// Storage flavor of a key-unique mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapFlavor {
    /// Hash map, insertion ordered iteration
    Hashed,
    /// Ordered by key
    Sorted,
    /// Thread-safe hash map
    Concurrent,
}

/// Storage flavor of a uniqueness-constrained set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SetFlavor {
    /// Hash set, insertion ordered iteration
    Hashed,
    /// Ordered by element
    Sorted,
}

/// Field of a record type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Declared type
    pub ty: TypeId,
    /// Names this field had in earlier generations
    pub former_names: Vec<String>,
    /// Keyed containers stored here may legitimately hold null keys
    pub null_keys_expected: bool,
}

impl FieldDef {
    /// Create a field
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, ty: TypeId) -> Self {
        Self {
            name: name.into(),
            ty,
            former_names: Vec::new(),
            null_keys_expected: false,
        }
    }

    /// Record a previous name of this field
    #[inline]
    #[must_use]
    pub fn renamed_from(mut self, former: impl Into<String>) -> Self {
        self.former_names.push(former.into());
        self
    }

    /// Annotate that keyed containers in this field accept null keys
    #[inline]
    #[must_use]
    pub fn expecting_null_keys(mut self) -> Self {
        self.null_keys_expected = true;
        self
    }

    /// Whether `name` refers to this field now or in an earlier generation
    #[must_use]
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.former_names.iter().any(|n| n == name)
    }
}

/// Structural kind of a type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    /// Built-in scalar
    Primitive(PrimitiveKind),

    /// Class-like record of named fields
    Record {
        /// Fields in layout order
        fields: Vec<FieldDef>,
        /// Fields that define equality and hashing; empty means identity
        key_fields: Vec<String>,
    },

    /// Array, list or stack
    Sequence {
        /// Element type
        element: TypeId,
        /// Ordering discipline
        order: SequenceOrder,
    },

    /// FIFO queue
    Queue {
        /// Element type
        element: TypeId,
    },

    /// Key-unique mapping
    Map {
        /// Key type
        key: TypeId,
        /// Value type
        value: TypeId,
        /// Storage flavor
        flavor: MapFlavor,
    },

    /// Uniqueness-constrained set
    Set {
        /// Element type
        element: TypeId,
        /// Storage flavor
        flavor: SetFlavor,
    },

    /// Non-owning reference that may expire
    WeakRef {
        /// Referent type
        target: TypeId,
    },

    /// Identity-keyed side table that does not keep its keys alive
    SideTable {
        /// Key type (always compared by identity)
        key: TypeId,
        /// Value type
        value: TypeId,
    },
}

impl TypeKind {
    /// Short label used in diagnostics
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Primitive(_) => "primitive",
            Self::Record { .. } => "record",
            Self::Sequence { .. } => "sequence",
            Self::Queue { .. } => "queue",
            Self::Map { .. } => "map",
            Self::Set { .. } => "set",
            Self::WeakRef { .. } => "weak reference",
            Self::SideTable { .. } => "side table",
        }
    }
}

/// Type descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// Logical name shared across generations
    pub name: String,
    /// Compilation generation (0 is reserved for built-ins)
    pub generation: u32,
    /// Structure
    pub kind: TypeKind,
    /// Instances own a resource released by a finalizer
    pub has_finalizer: bool,
    /// Compiled metadata cache that must not survive a type swap
    pub transient: bool,
}

impl TypeDescriptor {
    /// Create descriptor
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, generation: u32, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            generation,
            kind,
            has_finalizer: false,
            transient: false,
        }
    }

    /// Record type with the given fields and no key semantics
    #[must_use]
    pub fn record(name: impl Into<String>, generation: u32, fields: Vec<FieldDef>) -> Self {
        Self::new(
            name,
            generation,
            TypeKind::Record {
                fields,
                key_fields: Vec::new(),
            },
        )
    }

    /// Use the named fields for equality and hashing
    ///
    /// Has no effect on non-record kinds.
    #[must_use]
    pub fn keyed_by(mut self, names: &[&str]) -> Self {
        if let TypeKind::Record { key_fields, .. } = &mut self.kind {
            *key_fields = names.iter().map(|n| (*n).to_string()).collect();
        }
        self
    }

    /// Mark instances as finalizable
    #[inline]
    #[must_use]
    pub fn with_finalizer(mut self) -> Self {
        self.has_finalizer = true;
        self
    }

    /// Mark as a transient metadata cache
    #[inline]
    #[must_use]
    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    /// Record fields (empty for other kinds)
    #[must_use]
    pub fn fields(&self) -> &[FieldDef] {
        match &self.kind {
            TypeKind::Record { fields, .. } => fields,
            _ => &[],
        }
    }

    /// Position of a field by current name
    #[must_use]
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields().iter().position(|f| f.name == name)
    }

    /// Key field names (empty means identity semantics)
    #[must_use]
    pub fn key_fields(&self) -> &[String] {
        match &self.kind {
            TypeKind::Record { key_fields, .. } => key_fields,
            _ => &[],
        }
    }

    /// Whether membership in this container depends on hashing/equality
    #[must_use]
    pub fn is_keyed_collection(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Map { .. } | TypeKind::Set { .. } | TypeKind::SideTable { .. }
        )
    }
}

/// Registry of all type descriptors, across generations
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: Vec<TypeDescriptor>,
    by_name: HashMap<(String, u32), TypeId>,
}

impl TypeRegistry {
    /// Create a registry holding only the built-in primitives
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            types: Vec::new(),
            by_name: HashMap::new(),
        };
        for (name, kind) in [
            ("Bool", PrimitiveKind::Bool),
            ("Int", PrimitiveKind::Int),
            ("Float", PrimitiveKind::Float),
            ("Str", PrimitiveKind::Str),
            ("Any", PrimitiveKind::Any),
        ] {
            registry.push(TypeDescriptor::new(name, 0, TypeKind::Primitive(kind)));
        }
        registry
    }

    fn push(&mut self, descriptor: TypeDescriptor) -> TypeId {
        let id = TypeId(self.types.len());
        self.by_name
            .insert((descriptor.name.clone(), descriptor.generation), id);
        self.types.push(descriptor);
        id
    }

    /// Register a new descriptor
    ///
    /// # Errors
    /// Returns [`HeapError::DuplicateType`] if the name is taken in that generation
    pub fn register(&mut self, descriptor: TypeDescriptor) -> HeapResult<TypeId> {
        let key = (descriptor.name.clone(), descriptor.generation);
        if self.by_name.contains_key(&key) {
            return Err(HeapError::DuplicateType {
                name: key.0,
                generation: key.1,
            });
        }
        Ok(self.push(descriptor))
    }

    /// Register a descriptor, or return the existing one with the same name and generation
    pub fn intern(&mut self, descriptor: TypeDescriptor) -> TypeId {
        match self.find(&descriptor.name, descriptor.generation) {
            Some(id) => id,
            None => self.push(descriptor),
        }
    }

    /// Look up a descriptor
    ///
    /// # Errors
    /// Returns [`HeapError::UnknownType`] for ids not issued by this registry
    pub fn get(&self, id: TypeId) -> HeapResult<&TypeDescriptor> {
        self.types.get(id.index()).ok_or(HeapError::UnknownType(id))
    }

    /// Find a type by logical name and generation
    #[must_use]
    pub fn find(&self, name: &str, generation: u32) -> Option<TypeId> {
        self.by_name.get(&(name.to_string(), generation)).copied()
    }

    /// Display name of a type, or its id when unknown
    #[must_use]
    pub fn name_of(&self, id: TypeId) -> String {
        self.get(id)
            .map_or_else(|_| id.to_string(), |d| d.name.clone())
    }

    /// Blittable types can be bulk-copied: primitive scalars only
    #[must_use]
    pub fn is_blittable(&self, id: TypeId) -> bool {
        matches!(
            self.get(id).map(|d| &d.kind),
            Ok(TypeKind::Primitive(kind)) if *kind != PrimitiveKind::Any
        )
    }

    /// Intern an array/list/stack type
    pub fn sequence_of(&mut self, element: TypeId, order: SequenceOrder, generation: u32) -> TypeId {
        let element_name = self.name_of(element);
        let name = match order {
            SequenceOrder::Array => format!("{element_name}[]"),
            SequenceOrder::List => format!("List<{element_name}>"),
            SequenceOrder::Stack => format!("Stack<{element_name}>"),
        };
        self.intern(TypeDescriptor::new(
            name,
            generation,
            TypeKind::Sequence { element, order },
        ))
    }

    /// Intern a FIFO queue type
    pub fn queue_of(&mut self, element: TypeId, generation: u32) -> TypeId {
        let name = format!("Queue<{}>", self.name_of(element));
        self.intern(TypeDescriptor::new(name, generation, TypeKind::Queue { element }))
    }

    /// Intern a map type
    pub fn map_of(&mut self, key: TypeId, value: TypeId, flavor: MapFlavor, generation: u32) -> TypeId {
        let prefix = match flavor {
            MapFlavor::Hashed => "Map",
            MapFlavor::Sorted => "SortedMap",
            MapFlavor::Concurrent => "ConcurrentMap",
        };
        let name = format!("{prefix}<{}, {}>", self.name_of(key), self.name_of(value));
        self.intern(TypeDescriptor::new(
            name,
            generation,
            TypeKind::Map { key, value, flavor },
        ))
    }

    /// Intern a set type
    pub fn set_of(&mut self, element: TypeId, flavor: SetFlavor, generation: u32) -> TypeId {
        let prefix = match flavor {
            SetFlavor::Hashed => "Set",
            SetFlavor::Sorted => "SortedSet",
        };
        let name = format!("{prefix}<{}>", self.name_of(element));
        self.intern(TypeDescriptor::new(
            name,
            generation,
            TypeKind::Set { element, flavor },
        ))
    }

    /// Intern an expiring reference type
    pub fn weak_of(&mut self, target: TypeId, generation: u32) -> TypeId {
        let name = format!("Weak<{}>", self.name_of(target));
        self.intern(TypeDescriptor::new(name, generation, TypeKind::WeakRef { target }))
    }

    /// Intern an identity-keyed side table type
    pub fn side_table_of(&mut self, key: TypeId, value: TypeId, generation: u32) -> TypeId {
        let name = format!("SideTable<{}, {}>", self.name_of(key), self.name_of(value));
        self.intern(TypeDescriptor::new(
            name,
            generation,
            TypeKind::SideTable { key, value },
        ))
    }

    /// Iterate over all `(id, descriptor)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &TypeDescriptor)> {
        self.types
            .iter()
            .enumerate()
            .map(|(i, d)| (TypeId(i), d))
    }

    /// Number of registered types, built-ins included
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Always false: built-ins are registered on construction
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

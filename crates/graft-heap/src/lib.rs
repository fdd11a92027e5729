//! Graft Heap
//!
//! Managed heap model that the live migration engine rewrites.
//!
//! # Core Concepts
//!
//! - [`TypeRegistry`]: type descriptors for every compiled generation
//! - [`Heap`]: arena of [`Object`]s plus named [`StaticSlot`] roots
//! - [`Value`]: contents of a field, element or static slot
//! - [`KeyedStore`]: map/set storage indexed by a [`KeyForm`] computed at insertion
//!
//! # Example
//!
//! ```rust
//! use graft_heap::{FieldDef, Heap, TypeDescriptor, TypeId, TypeRegistry, Value};
//!
//! let mut types = TypeRegistry::new();
//! let player = types
//!     .register(TypeDescriptor::record("Player", 1, vec![FieldDef::new("score", TypeId::INT)]))
//!     .unwrap();
//!
//! let mut heap = Heap::new();
//! let p = heap.alloc_record(player, vec![Value::Int(10)]);
//! heap.add_static("Game.player", Value::Ref(p), true);
//!
//! assert_eq!(heap.field(&types, p, "score").unwrap(), &Value::Int(10));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod heap;
pub mod key;
pub mod object;
pub mod store;
pub mod types;
pub mod value;

pub use error::{HeapError, HeapResult};
pub use heap::{Heap, StaticSlot, DEFAULT_KEY_DEPTH};
pub use key::KeyForm;
pub use object::{Object, ObjectBody, ObjectId};
pub use store::{KeyedEntry, KeyedStore};
pub use types::{
    FieldDef, MapFlavor, PrimitiveKind, SequenceOrder, SetFlavor, TypeDescriptor, TypeId,
    TypeKind, TypeRegistry,
};
pub use value::Value;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

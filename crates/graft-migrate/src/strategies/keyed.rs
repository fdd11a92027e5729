//! Maps, sets and identity-keyed side tables
//!
//! Membership in these containers depends on key hashing and equality, and
//! a key's equality can depend on fields that are only filled in when the
//! key object itself is populated. Refilling therefore happens in two steps:
//!
//! 1. `populate` upgrades every key and value so that each one is queued,
//!    but inserts nothing.
//! 2. `late_populate` runs after every populate task has drained. Keys are
//!    fully formed by then, and the container is refilled.
//!
//! Keys that become equal under the new type's semantics collide. The first
//! one wins and the others are dropped with a warning.

use crate::context::MigrationContext;
use crate::error::{DiagnosticKind, MigrationError, MigrationResult};
use crate::path::PathSegment;
use crate::strategy::{Allocation, MigrationStrategy, MigrationTask};
use graft_heap::{Heap, HeapResult, ObjectId, TypeDescriptor, TypeId, TypeKind, TypeRegistry, Value};
use std::fmt;
use std::marker::PhantomData;

/// One entry of a keyed container
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedItem {
    /// Key (or set element)
    pub key: Value,
    /// Associated value; `None` for sets
    pub value: Option<Value>,
}

/// Storage access for one family of keyed containers
pub trait KeyedAdapter: Send + Sync + fmt::Debug + 'static {
    /// Strategy name
    const NAME: &'static str;

    /// Whether null keys can be stored when the owning field allows them
    const ACCEPTS_NULL_KEYS: bool;

    /// Whether this adapter stores instances of `kind`
    fn handles(kind: &TypeKind) -> bool;

    /// Current item count, if the container can report one reliably
    ///
    /// # Errors
    /// Returns an error if `id` is dangling or has another body
    fn count(heap: &Heap, id: ObjectId) -> HeapResult<Option<usize>>;

    /// Snapshot of the live items
    ///
    /// # Errors
    /// Returns an error if `id` is dangling or has another body
    fn items(heap: &Heap, id: ObjectId) -> HeapResult<Vec<KeyedItem>>;

    /// Make the empty container canonicalise keys at `max_depth`
    ///
    /// # Errors
    /// Returns an error if `id` is dangling or has another body
    fn prepare(
        _heap: &mut Heap,
        _types: &TypeRegistry,
        _id: ObjectId,
        _max_depth: usize,
    ) -> HeapResult<()> {
        Ok(())
    }

    /// Insert an item; `false` if an equal key is already present
    ///
    /// # Errors
    /// Returns an error if `id` is dangling or has another body
    fn add(heap: &mut Heap, types: &TypeRegistry, id: ObjectId, item: KeyedItem) -> HeapResult<bool>;
}

fn keyed_prepare(heap: &mut Heap, types: &TypeRegistry, id: ObjectId, max_depth: usize) -> HeapResult<()> {
    heap.set_key_depth(types, id, max_depth)?;
    Ok(())
}

/// Hashed, sorted and concurrent maps
#[derive(Debug, Clone, Copy, Default)]
pub struct MapAdapter;

impl KeyedAdapter for MapAdapter {
    const NAME: &'static str = "map";
    const ACCEPTS_NULL_KEYS: bool = true;

    fn handles(kind: &TypeKind) -> bool {
        matches!(kind, TypeKind::Map { .. })
    }

    fn count(heap: &Heap, id: ObjectId) -> HeapResult<Option<usize>> {
        Ok(Some(heap.keyed(id)?.len()))
    }

    fn items(heap: &Heap, id: ObjectId) -> HeapResult<Vec<KeyedItem>> {
        Ok(heap
            .keyed(id)?
            .entries()
            .map(|e| KeyedItem {
                key: e.key.clone(),
                value: Some(e.value.clone()),
            })
            .collect())
    }

    fn prepare(heap: &mut Heap, types: &TypeRegistry, id: ObjectId, max_depth: usize) -> HeapResult<()> {
        keyed_prepare(heap, types, id, max_depth)
    }

    fn add(heap: &mut Heap, types: &TypeRegistry, id: ObjectId, item: KeyedItem) -> HeapResult<bool> {
        heap.map_insert(types, id, item.key, item.value.unwrap_or(Value::Null))
    }
}

/// Hashed and sorted sets
#[derive(Debug, Clone, Copy, Default)]
pub struct SetAdapter;

impl KeyedAdapter for SetAdapter {
    const NAME: &'static str = "set";
    const ACCEPTS_NULL_KEYS: bool = true;

    fn handles(kind: &TypeKind) -> bool {
        matches!(kind, TypeKind::Set { .. })
    }

    fn count(heap: &Heap, id: ObjectId) -> HeapResult<Option<usize>> {
        Ok(Some(heap.keyed(id)?.len()))
    }

    fn items(heap: &Heap, id: ObjectId) -> HeapResult<Vec<KeyedItem>> {
        Ok(heap
            .keyed(id)?
            .entries()
            .map(|e| KeyedItem {
                key: e.key.clone(),
                value: None,
            })
            .collect())
    }

    fn prepare(heap: &mut Heap, types: &TypeRegistry, id: ObjectId, max_depth: usize) -> HeapResult<()> {
        keyed_prepare(heap, types, id, max_depth)
    }

    fn add(heap: &mut Heap, types: &TypeRegistry, id: ObjectId, item: KeyedItem) -> HeapResult<bool> {
        heap.set_insert(types, id, item.key)
    }
}

/// Identity-keyed side tables that do not keep their keys alive
///
/// Entries whose key was collected are not migrated. The table cannot
/// report a reliable count while keys may expire, so it is not checked for
/// interference.
#[derive(Debug, Clone, Copy, Default)]
pub struct SideTableAdapter;

impl KeyedAdapter for SideTableAdapter {
    const NAME: &'static str = "side-table";
    const ACCEPTS_NULL_KEYS: bool = false;

    fn handles(kind: &TypeKind) -> bool {
        matches!(kind, TypeKind::SideTable { .. })
    }

    fn count(_heap: &Heap, _id: ObjectId) -> HeapResult<Option<usize>> {
        Ok(None)
    }

    fn items(heap: &Heap, id: ObjectId) -> HeapResult<Vec<KeyedItem>> {
        Ok(heap
            .side_table_entries(id)?
            .into_iter()
            .map(|(key, value)| KeyedItem {
                key: Value::Ref(key),
                value: Some(value),
            })
            .collect())
    }

    fn add(heap: &mut Heap, _types: &TypeRegistry, id: ObjectId, item: KeyedItem) -> HeapResult<bool> {
        match item.key {
            Value::Ref(key) => heap.side_table_add(id, key, item.value.unwrap_or(Value::Null)),
            _ => Ok(false),
        }
    }
}

/// Two-phase strategy shared by every keyed container
pub struct KeyedCollectionStrategy<A> {
    _adapter: PhantomData<fn() -> A>,
}

impl<A: KeyedAdapter> KeyedCollectionStrategy<A> {
    /// Create new keyed collection strategy
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            _adapter: PhantomData,
        }
    }
}

impl<A: KeyedAdapter> Default for KeyedCollectionStrategy<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: KeyedAdapter> fmt::Debug for KeyedCollectionStrategy<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedCollectionStrategy")
            .field("adapter", &A::NAME)
            .finish()
    }
}

/// Declared key and value types of a keyed container
fn slot_types(kind: &TypeKind) -> (TypeId, TypeId) {
    match *kind {
        TypeKind::Map { key, value, .. } | TypeKind::SideTable { key, value } => (key, value),
        TypeKind::Set { element, .. } => (element, TypeId::ANY),
        _ => (TypeId::ANY, TypeId::ANY),
    }
}

/// Running state of one refill
struct Refill {
    container: ObjectId,
    key_type: TypeId,
    value_type: TypeId,
    accepts_null: bool,
    max_depth: usize,
    expected: Option<usize>,
    check_count: bool,
    log_once: bool,
    collisions: usize,
}

impl<A: KeyedAdapter> KeyedCollectionStrategy<A> {
    fn refill_entry(
        cx: &mut MigrationContext<'_>,
        state: &mut Refill,
        item: &KeyedItem,
    ) -> MigrationResult<()> {
        let key = cx.upgrade_or_null(&item.key)?;
        let key = cx.fit(state.key_type, key, DiagnosticKind::ElementTypeChanged, "key");
        if key.is_null() && !state.accepts_null {
            let err = MigrationError::NullKey {
                container: state.container,
                path: cx.path(),
            };
            cx.report_error(&err);
            return Ok(());
        }
        let value = match &item.value {
            Some(value) => Some(cx.traced(PathSegment::EntryValue, |cx| -> MigrationResult<Value> {
                let value = cx.upgrade_or_null(value)?;
                Ok(cx.fit(state.value_type, value, DiagnosticKind::ElementTypeChanged, "value"))
            })?),
            None => None,
        };

        let types = cx.types();
        let entry = KeyedItem {
            key: key.clone(),
            value,
        };
        if A::add(cx.heap_mut(), types, state.container, entry)? {
            state.expected = state.expected.map(|n| n + 1);
        } else {
            state.collisions += 1;
            if state.collisions == 1 || !state.log_once {
                let err = MigrationError::KeyCollision {
                    container: state.container,
                    key: cx.heap().key_form(types, &key, state.max_depth).to_string(),
                    path: cx.path(),
                };
                cx.report_error(&err);
            }
        }

        if state.check_count {
            if let Some(expected) = state.expected {
                let actual = A::count(cx.heap(), state.container)?.unwrap_or(expected);
                if actual != expected {
                    return Err(MigrationError::ThreadInterference {
                        container: state.container,
                        expected,
                        actual,
                        path: cx.path(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl<A: KeyedAdapter> MigrationStrategy for KeyedCollectionStrategy<A> {
    fn name(&self) -> &'static str {
        A::NAME
    }

    fn should_handle(&self, ty: &TypeDescriptor) -> bool {
        A::handles(&ty.kind)
    }

    fn create_empty(
        &self,
        cx: &mut MigrationContext<'_>,
        old: ObjectId,
        in_place: bool,
    ) -> MigrationResult<Allocation> {
        if in_place {
            return cx.reuse_in_place(old);
        }
        cx.allocate_successor(old, A::handles)
    }

    fn populate(&self, cx: &mut MigrationContext<'_>, task: &MigrationTask) -> MigrationResult<usize> {
        let items = A::items(cx.heap(), task.old)?;
        for (i, item) in items.iter().enumerate() {
            cx.traced(PathSegment::Entry(i), |cx| -> MigrationResult<()> {
                cx.upgrade_or_null(&item.key)?;
                if let Some(value) = &item.value {
                    cx.traced(PathSegment::EntryValue, |cx| cx.upgrade_or_null(value))?;
                }
                Ok(())
            })?;
        }
        cx.enqueue_late(task);
        Ok(items.len())
    }

    fn late_populate(&self, cx: &mut MigrationContext<'_>, task: &MigrationTask) -> MigrationResult<usize> {
        let items = A::items(cx.heap(), task.old)?;
        let types = cx.types();
        if task.is_in_place() {
            let ty = cx.heap().type_of(task.new)?;
            cx.heap_mut().reset(types, task.new, ty)?;
        }
        let max_depth = cx.config().max_key_depth;
        A::prepare(cx.heap_mut(), types, task.new, max_depth)?;
        let (key_type, value_type) = slot_types(&cx.descriptor(cx.heap().type_of(task.new)?)?.kind);

        let mut state = Refill {
            container: task.new,
            key_type,
            value_type,
            accepts_null: A::ACCEPTS_NULL_KEYS && cx.tolerates_null_keys(task.old),
            max_depth,
            expected: A::count(cx.heap(), task.new)?,
            check_count: cx.config().check_thread_interference,
            log_once: cx.config().log_collisions_once,
            collisions: 0,
        };
        for (i, item) in items.iter().enumerate() {
            cx.traced(PathSegment::Entry(i), |cx| Self::refill_entry(cx, &mut state, item))?;
        }

        if state.collisions > 0 {
            tracing::debug!(
                container = %task.new,
                collisions = state.collisions,
                "dropped colliding entries"
            );
        }
        Ok(items.len())
    }
}

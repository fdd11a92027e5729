//! Object arena and static roots

use crate::error::{HeapError, HeapResult};
use crate::key::KeyForm;
use crate::object::{Object, ObjectBody, ObjectId};
use crate::store::{KeyedEntry, KeyedStore};
use crate::types::{TypeId, TypeRegistry};
use crate::value::Value;
use indexmap::IndexMap;
use std::collections::VecDeque;

/// Default depth limit when canonicalising structurally keyed records
pub const DEFAULT_KEY_DEPTH: usize = 8;

/// Named global slot that roots part of the object graph
#[derive(Debug, Clone, PartialEq)]
pub struct StaticSlot {
    /// Slot name, used as the root of diagnostic paths
    pub name: String,
    /// Current value
    pub value: Value,
    /// Whether the slot can be re-pointed at a new instance
    ///
    /// Objects held by a non-swappable slot are edited in place.
    pub swappable: bool,
}

/// Arena of live objects plus the static roots
#[derive(Debug, Clone, Default)]
pub struct Heap {
    objects: Vec<Option<Object>>,
    statics: Vec<StaticSlot>,
}

impl Heap {
    /// Create an empty heap
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an object with an explicit body
    pub fn alloc(&mut self, ty: TypeId, body: ObjectBody) -> ObjectId {
        let id = ObjectId(self.objects.len());
        self.objects.push(Some(Object::new(ty, body)));
        id
    }

    /// Allocate a default-initialised object of `ty`
    ///
    /// # Errors
    /// Returns an error if the type is unknown
    pub fn alloc_default(&mut self, types: &TypeRegistry, ty: TypeId) -> HeapResult<ObjectId> {
        let body = ObjectBody::empty_for(types, ty)?;
        Ok(self.alloc(ty, body))
    }

    /// Allocate a record with the given field values
    pub fn alloc_record(&mut self, ty: TypeId, fields: Vec<Value>) -> ObjectId {
        self.alloc(ty, ObjectBody::Record(fields))
    }

    /// Borrow a live object
    ///
    /// # Errors
    /// Returns [`HeapError::Dangling`] for empty slots
    pub fn get(&self, id: ObjectId) -> HeapResult<&Object> {
        self.objects
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(HeapError::Dangling(id))
    }

    /// Mutably borrow a live object
    ///
    /// # Errors
    /// Returns [`HeapError::Dangling`] for empty slots
    pub fn get_mut(&mut self, id: ObjectId) -> HeapResult<&mut Object> {
        self.objects
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(HeapError::Dangling(id))
    }

    /// Type tag of a live object
    ///
    /// # Errors
    /// Returns [`HeapError::Dangling`] for empty slots
    pub fn type_of(&self, id: ObjectId) -> HeapResult<TypeId> {
        Ok(self.get(id)?.ty)
    }

    /// Change the type tag of an object without touching its body
    ///
    /// # Errors
    /// Returns [`HeapError::Dangling`] for empty slots
    pub fn retag(&mut self, id: ObjectId, ty: TypeId) -> HeapResult<()> {
        self.get_mut(id)?.ty = ty;
        Ok(())
    }

    /// Replace the body with an empty body of `ty` and retag
    ///
    /// # Errors
    /// Returns an error if the object is dangling or the type unknown
    pub fn reset(&mut self, types: &TypeRegistry, id: ObjectId, ty: TypeId) -> HeapResult<()> {
        let body = ObjectBody::empty_for(types, ty)?;
        let object = self.get_mut(id)?;
        object.ty = ty;
        object.body = body;
        Ok(())
    }

    /// Whether the slot holds a live object
    #[inline]
    #[must_use]
    pub fn is_alive(&self, id: ObjectId) -> bool {
        matches!(self.objects.get(id.index()), Some(Some(_)))
    }

    /// Reclaim an object, as the collector would once it is unreachable
    ///
    /// Expiring references to it observe expiry afterwards.
    pub fn collect(&mut self, id: ObjectId) -> Option<Object> {
        self.objects.get_mut(id.index()).and_then(Option::take)
    }

    /// Number of live objects
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.objects.iter().filter(|o| o.is_some()).count()
    }

    /// Ids of all live objects
    pub fn live_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.objects
            .iter()
            .enumerate()
            .filter(|(_, o)| o.is_some())
            .map(|(i, _)| ObjectId(i))
    }

    /// Prevent the finalizer of `id` from running
    ///
    /// # Errors
    /// Returns [`HeapError::Dangling`] for empty slots
    pub fn suppress_finalizer(&mut self, id: ObjectId) -> HeapResult<()> {
        self.get_mut(id)?.finalizer_suppressed = true;
        Ok(())
    }

    // Records

    /// Field values of a record, in layout order
    ///
    /// # Errors
    /// Returns an error if `id` is dangling or not a record
    pub fn record_fields(&self, id: ObjectId) -> HeapResult<&[Value]> {
        match &self.get(id)?.body {
            ObjectBody::Record(values) => Ok(values),
            other => Err(mismatch(id, "record", other)),
        }
    }

    /// Replace all field values of a record
    ///
    /// # Errors
    /// Returns an error if `id` is dangling or not a record
    pub fn set_record_fields(&mut self, id: ObjectId, values: Vec<Value>) -> HeapResult<()> {
        match &mut self.get_mut(id)?.body {
            ObjectBody::Record(slot) => {
                *slot = values;
                Ok(())
            }
            other => Err(mismatch(id, "record", other)),
        }
    }

    /// Read a named field
    ///
    /// # Errors
    /// Returns an error if `id` is not a record or has no such field
    pub fn field(&self, types: &TypeRegistry, id: ObjectId, name: &str) -> HeapResult<&Value> {
        let ty = self.type_of(id)?;
        let index = field_position(types, ty, name)?;
        self.record_fields(id)?
            .get(index)
            .ok_or_else(|| no_such_field(types, ty, name))
    }

    /// Write a named field
    ///
    /// # Errors
    /// Returns an error if `id` is not a record or has no such field
    pub fn set_field(
        &mut self,
        types: &TypeRegistry,
        id: ObjectId,
        name: &str,
        value: Value,
    ) -> HeapResult<()> {
        let ty = self.type_of(id)?;
        let index = field_position(types, ty, name)?;
        match &mut self.get_mut(id)?.body {
            ObjectBody::Record(values) => match values.get_mut(index) {
                Some(slot) => {
                    *slot = value;
                    Ok(())
                }
                None => Err(no_such_field(types, ty, name)),
            },
            other => Err(mismatch(id, "record", other)),
        }
    }

    // Sequences and queues

    /// Elements of an array, list or stack
    ///
    /// # Errors
    /// Returns an error if `id` is dangling or not a sequence
    pub fn sequence(&self, id: ObjectId) -> HeapResult<&[Value]> {
        match &self.get(id)?.body {
            ObjectBody::Sequence(items) => Ok(items),
            other => Err(mismatch(id, "sequence", other)),
        }
    }

    /// Mutable elements of an array, list or stack
    ///
    /// # Errors
    /// Returns an error if `id` is dangling or not a sequence
    pub fn sequence_mut(&mut self, id: ObjectId) -> HeapResult<&mut Vec<Value>> {
        match &mut self.get_mut(id)?.body {
            ObjectBody::Sequence(items) => Ok(items),
            other => Err(mismatch(id, "sequence", other)),
        }
    }

    /// Queue contents, front first
    ///
    /// # Errors
    /// Returns an error if `id` is dangling or not a queue
    pub fn queue(&self, id: ObjectId) -> HeapResult<&VecDeque<Value>> {
        match &self.get(id)?.body {
            ObjectBody::Queue(items) => Ok(items),
            other => Err(mismatch(id, "queue", other)),
        }
    }

    /// Mutable queue contents
    ///
    /// # Errors
    /// Returns an error if `id` is dangling or not a queue
    pub fn queue_mut(&mut self, id: ObjectId) -> HeapResult<&mut VecDeque<Value>> {
        match &mut self.get_mut(id)?.body {
            ObjectBody::Queue(items) => Ok(items),
            other => Err(mismatch(id, "queue", other)),
        }
    }

    // Keyed collections

    /// Store of a map or set
    ///
    /// # Errors
    /// Returns an error if `id` is dangling or not keyed
    pub fn keyed(&self, id: ObjectId) -> HeapResult<&KeyedStore> {
        match &self.get(id)?.body {
            ObjectBody::Keyed(store) => Ok(store),
            other => Err(mismatch(id, "keyed collection", other)),
        }
    }

    /// Mutable store of a map or set
    ///
    /// # Errors
    /// Returns an error if `id` is dangling or not keyed
    pub fn keyed_mut(&mut self, id: ObjectId) -> HeapResult<&mut KeyedStore> {
        match &mut self.get_mut(id)?.body {
            ObjectBody::Keyed(store) => Ok(store),
            other => Err(mismatch(id, "keyed collection", other)),
        }
    }

    /// Canonical form of `value` given the current heap state
    #[must_use]
    pub fn key_form(&self, types: &TypeRegistry, value: &Value, max_depth: usize) -> KeyForm {
        match value {
            Value::Null => KeyForm::Null,
            Value::Bool(b) => KeyForm::Bool(*b),
            Value::Int(n) => KeyForm::Int(*n),
            Value::Float(x) => KeyForm::Float(x.to_bits()),
            Value::Str(s) => KeyForm::Str(s.to_string()),
            Value::Type(ty) => KeyForm::Type(*ty),
            Value::Ref(id) => self.object_key_form(types, *id, max_depth),
        }
    }

    fn object_key_form(&self, types: &TypeRegistry, id: ObjectId, depth: usize) -> KeyForm {
        let Ok(object) = self.get(id) else {
            return KeyForm::Identity(id);
        };
        let Ok(descriptor) = types.get(object.ty) else {
            return KeyForm::Identity(id);
        };
        let ObjectBody::Record(values) = &object.body else {
            return KeyForm::Identity(id);
        };
        if descriptor.key_fields().is_empty() || depth == 0 {
            return KeyForm::Identity(id);
        }
        let parts = descriptor
            .key_fields()
            .iter()
            .map(|name| {
                descriptor
                    .field_index(name)
                    .and_then(|i| values.get(i))
                    .map_or(KeyForm::Null, |v| self.key_form(types, v, depth - 1))
            })
            .collect();
        KeyForm::Composite(descriptor.name.clone(), parts)
    }

    /// Insert into a map; `false` if an equal key is present
    ///
    /// # Errors
    /// Returns an error if `id` is dangling or not keyed
    pub fn map_insert(
        &mut self,
        types: &TypeRegistry,
        id: ObjectId,
        key: Value,
        value: Value,
    ) -> HeapResult<bool> {
        let form = self.key_form(types, &key, self.keyed(id)?.key_depth());
        Ok(self.keyed_mut(id)?.insert(form, KeyedEntry { key, value }))
    }

    /// Look up a map value by key equality as of now
    ///
    /// # Errors
    /// Returns an error if `id` is dangling or not keyed
    pub fn map_get(&self, types: &TypeRegistry, id: ObjectId, key: &Value) -> HeapResult<Option<&Value>> {
        let store = self.keyed(id)?;
        let form = self.key_form(types, key, store.key_depth());
        Ok(store.get(&form).map(|e| &e.value))
    }

    /// Canonicalise the keys of a map or set at `depth` from now on
    ///
    /// Present entries are re-filed under their new forms in iteration order.
    /// Returns the number of entries dropped because their new forms collided.
    ///
    /// # Errors
    /// Returns an error if `id` is dangling or not keyed
    pub fn set_key_depth(&mut self, types: &TypeRegistry, id: ObjectId, depth: usize) -> HeapResult<usize> {
        let store = self.keyed(id)?;
        if store.key_depth() == depth {
            return Ok(0);
        }
        let refiled: Vec<(KeyForm, KeyedEntry)> = store
            .entries()
            .map(|e| (self.key_form(types, &e.key, depth), e.clone()))
            .collect();

        let store = self.keyed_mut(id)?;
        store.clear_with_key_depth(depth);
        let mut dropped = 0;
        for (form, entry) in refiled {
            if !store.insert(form, entry) {
                dropped += 1;
            }
        }
        Ok(dropped)
    }

    /// Insert into a set; `false` if an equal element is present
    ///
    /// # Errors
    /// Returns an error if `id` is dangling or not keyed
    pub fn set_insert(&mut self, types: &TypeRegistry, id: ObjectId, item: Value) -> HeapResult<bool> {
        self.map_insert(types, id, item, Value::Null)
    }

    /// Set membership by equality as of now
    ///
    /// # Errors
    /// Returns an error if `id` is dangling or not keyed
    pub fn set_contains(&self, types: &TypeRegistry, id: ObjectId, item: &Value) -> HeapResult<bool> {
        Ok(self.map_get(types, id, item)?.is_some())
    }

    // Expiring references

    /// Live referent of an expiring reference
    ///
    /// Returns `None` when unset or when the referent has been collected.
    ///
    /// # Errors
    /// Returns an error if `id` is dangling or not a weak reference
    pub fn weak_target(&self, id: ObjectId) -> HeapResult<Option<ObjectId>> {
        match &self.get(id)?.body {
            ObjectBody::Weak(target) => Ok(target.filter(|t| self.is_alive(*t))),
            other => Err(mismatch(id, "weak reference", other)),
        }
    }

    /// Point an expiring reference at `target`
    ///
    /// # Errors
    /// Returns an error if `id` is dangling or not a weak reference
    pub fn set_weak_target(&mut self, id: ObjectId, target: Option<ObjectId>) -> HeapResult<()> {
        match &mut self.get_mut(id)?.body {
            ObjectBody::Weak(slot) => {
                *slot = target;
                Ok(())
            }
            other => Err(mismatch(id, "weak reference", other)),
        }
    }

    // Side tables

    /// Entries of a side table whose key is still alive
    ///
    /// # Errors
    /// Returns an error if `id` is dangling or not a side table
    pub fn side_table_entries(&self, id: ObjectId) -> HeapResult<Vec<(ObjectId, Value)>> {
        match &self.get(id)?.body {
            ObjectBody::SideTable(entries) => Ok(entries
                .iter()
                .filter(|(k, _)| self.is_alive(**k))
                .map(|(k, v)| (*k, v.clone()))
                .collect()),
            other => Err(mismatch(id, "side table", other)),
        }
    }

    /// Mutable side table storage
    ///
    /// # Errors
    /// Returns an error if `id` is dangling or not a side table
    pub fn side_table_mut(&mut self, id: ObjectId) -> HeapResult<&mut IndexMap<ObjectId, Value>> {
        match &mut self.get_mut(id)?.body {
            ObjectBody::SideTable(entries) => Ok(entries),
            other => Err(mismatch(id, "side table", other)),
        }
    }

    /// Attach a value to `key`; `false` if the key already has one
    ///
    /// # Errors
    /// Returns an error if `id` is dangling or not a side table
    pub fn side_table_add(&mut self, id: ObjectId, key: ObjectId, value: Value) -> HeapResult<bool> {
        let entries = self.side_table_mut(id)?;
        if entries.contains_key(&key) {
            return Ok(false);
        }
        entries.insert(key, value);
        Ok(true)
    }

    // Statics

    /// Add a static root slot, returning its index
    pub fn add_static(&mut self, name: impl Into<String>, value: Value, swappable: bool) -> usize {
        self.statics.push(StaticSlot {
            name: name.into(),
            value,
            swappable,
        });
        self.statics.len() - 1
    }

    /// All static slots
    #[inline]
    #[must_use]
    pub fn statics(&self) -> &[StaticSlot] {
        &self.statics
    }

    /// Value of a static slot by name
    ///
    /// # Errors
    /// Returns [`HeapError::NoSuchStatic`] if no slot has that name
    pub fn static_value(&self, name: &str) -> HeapResult<&Value> {
        self.statics
            .iter()
            .find(|s| s.name == name)
            .map(|s| &s.value)
            .ok_or_else(|| HeapError::NoSuchStatic(name.to_string()))
    }

    /// Overwrite a static slot by index
    ///
    /// # Errors
    /// Returns [`HeapError::NoSuchStatic`] for an out-of-range index
    pub fn set_static(&mut self, index: usize, value: Value) -> HeapResult<()> {
        let slot = self
            .statics
            .get_mut(index)
            .ok_or_else(|| HeapError::NoSuchStatic(format!("#{index}")))?;
        slot.value = value;
        Ok(())
    }
}

fn mismatch(id: ObjectId, expected: &'static str, found: &ObjectBody) -> HeapError {
    HeapError::BodyMismatch {
        id,
        expected,
        found: found.label(),
    }
}

fn no_such_field(types: &TypeRegistry, ty: TypeId, field: &str) -> HeapError {
    HeapError::NoSuchField {
        type_name: types.name_of(ty),
        field: field.to_string(),
    }
}

fn field_position(types: &TypeRegistry, ty: TypeId, name: &str) -> HeapResult<usize> {
    types
        .get(ty)?
        .field_index(name)
        .ok_or_else(|| no_such_field(types, ty, name))
}

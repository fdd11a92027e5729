//! Storage for key-unique mappings and sets

use crate::heap::DEFAULT_KEY_DEPTH;
use crate::key::KeyForm;
use crate::value::Value;
use indexmap::IndexMap;
use std::collections::BTreeMap;

/// One entry of a keyed store
///
/// Sets store [`Value::Null`] as the value.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedEntry {
    /// Key as stored
    pub key: Value,
    /// Associated value
    pub value: Value,
}

#[derive(Debug, Clone)]
enum Index {
    Hashed(IndexMap<KeyForm, KeyedEntry>),
    Sorted(BTreeMap<KeyForm, KeyedEntry>),
}

/// Key-unique store indexed by [`KeyForm`]
///
/// Insertion never overwrites: a second insert under an equal form is rejected,
/// which is how key collisions surface.
///
/// The store remembers the depth its forms were computed with, so inserts
/// and lookups through the heap always canonicalise keys the same way.
#[derive(Debug, Clone)]
pub struct KeyedStore {
    index: Index,
    key_depth: usize,
}

impl KeyedStore {
    /// Hash-ordered store (iteration follows insertion order)
    #[inline]
    #[must_use]
    pub fn hashed() -> Self {
        Self {
            index: Index::Hashed(IndexMap::new()),
            key_depth: DEFAULT_KEY_DEPTH,
        }
    }

    /// Key-ordered store
    #[inline]
    #[must_use]
    pub fn sorted() -> Self {
        Self {
            index: Index::Sorted(BTreeMap::new()),
            key_depth: DEFAULT_KEY_DEPTH,
        }
    }

    /// Set the depth keys are canonicalised with
    #[inline]
    #[must_use]
    pub fn with_key_depth(mut self, depth: usize) -> Self {
        self.key_depth = depth;
        self
    }

    /// Depth keys are canonicalised with
    #[inline]
    #[must_use]
    pub fn key_depth(&self) -> usize {
        self.key_depth
    }

    /// Whether entries iterate in key order
    #[inline]
    #[must_use]
    pub fn is_sorted(&self) -> bool {
        matches!(self.index, Index::Sorted(_))
    }

    /// Insert unless an entry with an equal form exists
    ///
    /// Returns `false` on collision.
    pub fn insert(&mut self, form: KeyForm, entry: KeyedEntry) -> bool {
        match &mut self.index {
            Index::Hashed(map) => {
                if map.contains_key(&form) {
                    return false;
                }
                map.insert(form, entry);
            }
            Index::Sorted(map) => {
                if map.contains_key(&form) {
                    return false;
                }
                map.insert(form, entry);
            }
        }
        true
    }

    /// Entry filed under `form`
    #[must_use]
    pub fn get(&self, form: &KeyForm) -> Option<&KeyedEntry> {
        match &self.index {
            Index::Hashed(map) => map.get(form),
            Index::Sorted(map) => map.get(form),
        }
    }

    /// Remove the entry filed under `form`
    pub fn remove(&mut self, form: &KeyForm) -> Option<KeyedEntry> {
        match &mut self.index {
            Index::Hashed(map) => map.shift_remove(form),
            Index::Sorted(map) => map.remove(form),
        }
    }

    /// Remove every entry and canonicalise future keys at `depth`
    pub fn clear_with_key_depth(&mut self, depth: usize) {
        self.clear();
        self.key_depth = depth;
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        match &mut self.index {
            Index::Hashed(map) => map.clear(),
            Index::Sorted(map) => map.clear(),
        }
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.index {
            Index::Hashed(map) => map.len(),
            Index::Sorted(map) => map.len(),
        }
    }

    /// Whether the store is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries in iteration order
    pub fn entries(&self) -> Box<dyn Iterator<Item = &KeyedEntry> + '_> {
        match &self.index {
            Index::Hashed(map) => Box::new(map.values()),
            Index::Sorted(map) => Box::new(map.values()),
        }
    }

    /// Forms in iteration order
    pub fn forms(&self) -> Box<dyn Iterator<Item = &KeyForm> + '_> {
        match &self.index {
            Index::Hashed(map) => Box::new(map.keys()),
            Index::Sorted(map) => Box::new(map.keys()),
        }
    }
}

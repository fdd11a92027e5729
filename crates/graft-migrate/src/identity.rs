//! Identity cache: old instance → new instance for one pass

use graft_heap::ObjectId;
use std::collections::HashMap;

/// Attempt to map an old instance to a second, different new instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{old} is already mapped to {existing}, refusing to map it to {attempted}")]
pub struct CacheConflict {
    /// Old instance
    pub old: ObjectId,
    /// New instance already recorded
    pub existing: ObjectId,
    /// New instance the caller tried to record
    pub attempted: ObjectId,
}

/// Write-once mapping from old-instance identity to its replacement
///
/// Created empty at pass start, grows monotonically, dropped with the pass.
#[derive(Debug, Default)]
pub struct IdentityCache {
    map: HashMap<ObjectId, ObjectId>,
}

impl IdentityCache {
    /// Create empty cache
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `old → new`
    ///
    /// Recording the same pair again is a no-op and returns `Ok(false)`.
    ///
    /// # Errors
    /// Returns [`CacheConflict`] if `old` already maps to a different instance
    pub fn record(&mut self, old: ObjectId, new: ObjectId) -> Result<bool, CacheConflict> {
        match self.map.get(&old) {
            Some(existing) if *existing == new => Ok(false),
            Some(existing) => Err(CacheConflict {
                old,
                existing: *existing,
                attempted: new,
            }),
            None => {
                self.map.insert(old, new);
                Ok(true)
            }
        }
    }

    /// Replacement recorded for `old`
    #[inline]
    #[must_use]
    pub fn get(&self, old: ObjectId) -> Option<ObjectId> {
        self.map.get(&old).copied()
    }

    /// Whether `old` has been visited
    #[inline]
    #[must_use]
    pub fn contains(&self, old: ObjectId) -> bool {
        self.map.contains_key(&old)
    }

    /// Number of recorded pairs
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if cache is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Number of pairs where the instance was kept (edited in place)
    #[must_use]
    pub fn in_place_count(&self) -> usize {
        self.map.iter().filter(|(old, new)| old == new).count()
    }

    /// Iterate over `(old, new)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, ObjectId)> + '_ {
        self.map.iter().map(|(old, new)| (*old, *new))
    }
}

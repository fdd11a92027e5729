//! Type-evolution resolver
//!
//! The hot-reload driver decides which new type replaces each old type. The
//! engine only consumes that decision through [`TypeResolver`].

use graft_heap::{TypeId, TypeRegistry};
use std::collections::{HashMap, HashSet};

/// Maps an old type to the type that replaces it
pub trait TypeResolver {
    /// Successor of `old`; `None` when the type has no equivalent
    fn resolve(&self, old: TypeId) -> Option<TypeId>;
}

impl<F> TypeResolver for F
where
    F: Fn(TypeId) -> Option<TypeId>,
{
    fn resolve(&self, old: TypeId) -> Option<TypeId> {
        self(old)
    }
}

/// Explicit old → new table
///
/// Types without an entry resolve to themselves (their layout did not change);
/// types marked [`retired`](Self::retire) resolve to nothing.
#[derive(Debug, Clone, Default)]
pub struct EvolutionMap {
    successors: HashMap<TypeId, TypeId>,
    retired: HashSet<TypeId>,
}

impl EvolutionMap {
    /// Map where every type resolves to itself
    #[inline]
    #[must_use]
    pub fn identity() -> Self {
        Self::default()
    }

    /// Map every type of `from` generation to the same-named type of `to`
    ///
    /// Names without a counterpart in `to` keep resolving to themselves.
    #[must_use]
    pub fn by_name(types: &TypeRegistry, from: u32, to: u32) -> Self {
        let mut map = Self::identity();
        for (id, descriptor) in types.iter().filter(|(_, d)| d.generation == from) {
            if let Some(successor) = types.find(&descriptor.name, to) {
                map.insert(id, successor);
            }
        }
        map
    }

    /// Declare `new` as the successor of `old`
    pub fn insert(&mut self, old: TypeId, new: TypeId) -> &mut Self {
        self.retired.remove(&old);
        self.successors.insert(old, new);
        self
    }

    /// Declare that `old` has no equivalent in the new generation
    pub fn retire(&mut self, old: TypeId) -> &mut Self {
        self.successors.remove(&old);
        self.retired.insert(old);
        self
    }

    /// Number of explicit successor entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.successors.len()
    }

    /// Whether there are no explicit entries
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.successors.is_empty() && self.retired.is_empty()
    }
}

impl TypeResolver for EvolutionMap {
    fn resolve(&self, old: TypeId) -> Option<TypeId> {
        if self.retired.contains(&old) {
            return None;
        }
        Some(self.successors.get(&old).copied().unwrap_or(old))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_heap::{SequenceOrder, TypeDescriptor};

    #[test]
    fn identity_resolves_to_self() {
        let map = EvolutionMap::identity();
        assert_eq!(map.resolve(TypeId(42)), Some(TypeId(42)));
        assert!(map.is_empty());
    }

    #[test]
    fn by_name_pairs_generations() {
        let mut types = TypeRegistry::new();
        let old = types.register(TypeDescriptor::record("Node", 1, vec![])).unwrap();
        let new = types.register(TypeDescriptor::record("Node", 2, vec![])).unwrap();
        let only_old = types.register(TypeDescriptor::record("Gone", 1, vec![])).unwrap();
        let old_list = types.sequence_of(old, SequenceOrder::List, 1);
        let new_list = types.sequence_of(new, SequenceOrder::List, 2);

        let map = EvolutionMap::by_name(&types, 1, 2);
        assert_eq!(map.resolve(old), Some(new));
        assert_eq!(map.resolve(old_list), Some(new_list));
        assert_eq!(map.resolve(only_old), Some(only_old));
        assert_eq!(map.resolve(TypeId::INT), Some(TypeId::INT));
    }

    #[test]
    fn retire_and_reinsert() {
        let mut map = EvolutionMap::identity();
        map.retire(TypeId(7));
        assert_eq!(map.resolve(TypeId(7)), None);
        map.insert(TypeId(7), TypeId(8));
        assert_eq!(map.resolve(TypeId(7)), Some(TypeId(8)));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn closures_are_resolvers() {
        let shift = |old: TypeId| Some(TypeId(old.0 + 1));
        assert_eq!(TypeResolver::resolve(&shift, TypeId(1)), Some(TypeId(2)));
    }
}

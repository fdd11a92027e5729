//! Strategy registry
//!
//! Provides [`StrategyRegistry`], the ordered list the dispatcher consults.
//! The first strategy whose [`should_handle`](MigrationStrategy::should_handle)
//! accepts a type wins, so specific strategies go before general ones.

use crate::strategies::{
    KeyedCollectionStrategy, MapAdapter, QueueStrategy, RecordStrategy, SequenceStrategy,
    SetAdapter, SideTableAdapter, TransientStrategy, WeakRefStrategy,
};
use crate::strategy::{MigrationStrategy, StrategySlot};
use graft_heap::TypeDescriptor;

/// Ordered collection of migration strategies
#[derive(Debug, Default)]
pub struct StrategyRegistry {
    strategies: Vec<Box<dyn MigrationStrategy>>,
}

impl StrategyRegistry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Create registry with the built-in strategies
    ///
    /// Transient caches come first, then containers, and the field-by-field
    /// record strategy last as the fallback.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(TransientStrategy::new());
        registry.register(SequenceStrategy);
        registry.register(QueueStrategy);
        registry.register(WeakRefStrategy);
        registry.register(KeyedCollectionStrategy::<MapAdapter>::new());
        registry.register(KeyedCollectionStrategy::<SetAdapter>::new());
        registry.register(KeyedCollectionStrategy::<SideTableAdapter>::new());
        registry.register(RecordStrategy::new());
        registry
    }

    /// Append a strategy (lowest priority so far)
    pub fn register(&mut self, strategy: impl MigrationStrategy + 'static) {
        self.strategies.push(Box::new(strategy));
    }

    /// Insert a strategy ahead of every registered one
    pub fn register_priority(&mut self, strategy: impl MigrationStrategy + 'static) {
        self.strategies.insert(0, Box::new(strategy));
    }

    /// First strategy that handles `ty`
    #[must_use]
    pub fn resolve(&self, ty: &TypeDescriptor) -> Option<StrategySlot> {
        self.strategies
            .iter()
            .position(|s| s.should_handle(ty))
            .map(StrategySlot)
    }

    /// Strategy at `slot`
    #[inline]
    #[must_use]
    pub fn get(&self, slot: StrategySlot) -> Option<&dyn MigrationStrategy> {
        self.strategies.get(slot.0).map(Box::as_ref)
    }

    /// Check if a strategy with this name is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.strategies.iter().any(|s| s.name() == name)
    }

    /// Registered strategy names, in priority order
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Get number of registered strategies
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Iterate over strategies in priority order
    pub fn iter(&self) -> impl Iterator<Item = &dyn MigrationStrategy> {
        self.strategies.iter().map(Box::as_ref)
    }
}

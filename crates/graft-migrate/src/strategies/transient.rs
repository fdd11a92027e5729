//! Transient type-metadata caches
//!
//! Compiled metadata (reflection caches, serializer plans) describes the old
//! type layout and is only valid for the generation that built it. Such
//! objects are replaced by empty instances instead of being migrated, and the
//! pass summarises how many were dropped.

use crate::context::MigrationContext;
use crate::error::{DiagnosticKind, MigrationResult};
use crate::strategy::{Allocation, MigrationStrategy, MigrationTask};
use graft_heap::{ObjectId, TypeDescriptor};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Clears instances of types marked transient
#[derive(Debug, Default)]
pub struct TransientStrategy {
    cleared: AtomicUsize,
}

impl TransientStrategy {
    /// Create new transient strategy
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Instances cleared since the current pass started
    #[must_use]
    pub fn cleared(&self) -> usize {
        self.cleared.load(Ordering::Relaxed)
    }
}

impl MigrationStrategy for TransientStrategy {
    fn name(&self) -> &'static str {
        "transient"
    }

    fn should_handle(&self, ty: &TypeDescriptor) -> bool {
        ty.transient
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
        cx.allocate_successor(old, |_| true)
    }

    fn populate(&self, cx: &mut MigrationContext<'_>, task: &MigrationTask) -> MigrationResult<usize> {
        if task.is_in_place() {
            let types = cx.types();
            let ty = cx.heap().type_of(task.new)?;
            cx.heap_mut().reset(types, task.new, ty)?;
        }
        self.cleared.fetch_add(1, Ordering::Relaxed);
        Ok(0)
    }

    fn on_pass_start(&self) {
        self.cleared.store(0, Ordering::Relaxed);
    }

    fn on_pass_complete(&self, cx: &mut MigrationContext<'_>) {
        let cleared = self.cleared.swap(0, Ordering::Relaxed);
        if cleared > 0 {
            cx.warn(
                DiagnosticKind::StaleTypeMetadata,
                format!(
                    "{cleared} stale type-metadata objects were encountered and cleared; \
                     did dynamic serialization run during migration?"
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_heap::FieldDef;

    #[test]
    fn handles_only_transient_types() {
        let strategy = TransientStrategy::new();
        let plain = TypeDescriptor::record("Plan", 1, vec![FieldDef::new("n", graft_heap::TypeId::INT)]);
        assert!(!strategy.should_handle(&plain));
        assert!(strategy.should_handle(&plain.transient()));
    }

    #[test]
    fn pass_start_resets_counter() {
        let strategy = TransientStrategy::new();
        strategy.cleared.store(3, Ordering::Relaxed);
        strategy.on_pass_start();
        assert_eq!(strategy.cleared(), 0);
    }
}

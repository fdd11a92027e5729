//! Expiring (weak) references

use crate::context::MigrationContext;
use crate::error::MigrationResult;
use crate::path::PathSegment;
use crate::strategy::{Allocation, MigrationStrategy, MigrationTask};
use graft_heap::{ObjectId, TypeDescriptor, TypeKind, Value};

/// Re-points expiring references at the upgraded referent
///
/// A referent that has already been collected leaves the new reference
/// expired. That is the normal outcome for a weak reference, not an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeakRefStrategy;

impl WeakRefStrategy {
    /// Create new weak reference strategy
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl MigrationStrategy for WeakRefStrategy {
    fn name(&self) -> &'static str {
        "weak-ref"
    }

    fn should_handle(&self, ty: &TypeDescriptor) -> bool {
        matches!(ty.kind, TypeKind::WeakRef { .. })
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
        cx.allocate_successor(old, |kind| matches!(kind, TypeKind::WeakRef { .. }))
    }

    fn populate(&self, cx: &mut MigrationContext<'_>, task: &MigrationTask) -> MigrationResult<usize> {
        let target = match cx.heap().weak_target(task.old)? {
            Some(referent) => cx
                .traced(PathSegment::Target, |cx| cx.upgrade_or_null(&Value::Ref(referent)))?
                .as_object(),
            None => None,
        };
        cx.heap_mut().set_weak_target(task.new, target)?;
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_heap::TypeId;

    #[test]
    fn handles_weak_references_only() {
        let strategy = WeakRefStrategy::new();
        let weak = TypeDescriptor::new("Weak<any>", 1, TypeKind::WeakRef { target: TypeId::ANY });
        assert!(strategy.should_handle(&weak));
        assert!(!strategy.should_handle(&TypeDescriptor::record("R", 1, vec![])));
    }
}

//! FIFO queues

use crate::context::MigrationContext;
use crate::error::{DiagnosticKind, MigrationResult};
use crate::path::PathSegment;
use crate::strategy::{Allocation, MigrationStrategy, MigrationTask};
use graft_heap::{ObjectId, TypeDescriptor, TypeId, TypeKind, Value};

/// Migrates queues, keeping dequeue order
///
/// Items are snapshotted front to back and re-enqueued in that order, so
/// the first item dequeued after migration is the first one before it. An
/// in-place queue is drained before refilling.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueStrategy;

impl QueueStrategy {
    /// Create new queue strategy
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl MigrationStrategy for QueueStrategy {
    fn name(&self) -> &'static str {
        "queue"
    }

    fn should_handle(&self, ty: &TypeDescriptor) -> bool {
        matches!(ty.kind, TypeKind::Queue { .. })
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
        cx.allocate_successor(old, |kind| matches!(kind, TypeKind::Queue { .. }))
    }

    fn populate(&self, cx: &mut MigrationContext<'_>, task: &MigrationTask) -> MigrationResult<usize> {
        let items: Vec<_> = cx.heap().queue(task.old)?.iter().cloned().collect();
        let element = match cx.descriptor(cx.heap().type_of(task.new)?)?.kind {
            TypeKind::Queue { element } => element,
            _ => TypeId::ANY,
        };

        let mut upgraded = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let value = cx.traced(PathSegment::Index(i), |cx| -> MigrationResult<Value> {
                let value = cx.upgrade_or_null(item)?;
                Ok(cx.fit(element, value, DiagnosticKind::ElementTypeChanged, "element"))
            })?;
            upgraded.push(value);
        }

        let queue = cx.heap_mut().queue_mut(task.new)?;
        queue.clear();
        queue.extend(upgraded);
        Ok(items.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_queues_only() {
        let strategy = QueueStrategy::new();
        let queue = TypeDescriptor::new("Queue<int>", 1, TypeKind::Queue { element: TypeId::INT });
        assert!(strategy.should_handle(&queue));
        assert!(!strategy.should_handle(&TypeDescriptor::record("R", 1, vec![])));
        assert_eq!(strategy.name(), "queue");
    }
}

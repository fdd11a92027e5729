//! Arrays, lists and stacks

use crate::context::MigrationContext;
use crate::error::{DiagnosticKind, MigrationResult};
use crate::path::PathSegment;
use crate::strategy::{Allocation, MigrationStrategy, MigrationTask};
use graft_heap::{ObjectId, TypeDescriptor, TypeId, TypeKind, Value};

/// Migrates ordered sequences element by element
///
/// Sequences store their items bottom to top, so copying positions one to
/// one preserves both list order and stack (LIFO) order. When the element
/// type is a blittable primitive that did not change, the buffer is copied
/// as a block instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceStrategy;

impl SequenceStrategy {
    /// Create new sequence strategy
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn can_block_copy(cx: &MigrationContext<'_>, task: &MigrationTask) -> MigrationResult<bool> {
        if !cx.config().blit_fast_path {
            return Ok(false);
        }
        let old_element = element_of(cx.descriptor(task.old_type)?);
        let new_element = element_of(cx.descriptor(cx.heap().type_of(task.new)?)?);
        Ok(match (old_element, new_element) {
            (Some(old), Some(new)) => old == new && cx.types().is_blittable(old),
            _ => false,
        })
    }
}

fn element_of(ty: &TypeDescriptor) -> Option<TypeId> {
    match ty.kind {
        TypeKind::Sequence { element, .. } => Some(element),
        _ => None,
    }
}

impl MigrationStrategy for SequenceStrategy {
    fn name(&self) -> &'static str {
        "sequence"
    }

    fn should_handle(&self, ty: &TypeDescriptor) -> bool {
        matches!(ty.kind, TypeKind::Sequence { .. })
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
        cx.allocate_successor(old, |kind| matches!(kind, TypeKind::Sequence { .. }))
    }

    fn populate(&self, cx: &mut MigrationContext<'_>, task: &MigrationTask) -> MigrationResult<usize> {
        let items = cx.heap().sequence(task.old)?.to_vec();
        let count = items.len();

        if Self::can_block_copy(cx, task)? {
            if !task.is_in_place() {
                *cx.heap_mut().sequence_mut(task.new)? = items;
            }
            cx.note_block_copy();
            return Ok(count);
        }

        let element = element_of(cx.descriptor(cx.heap().type_of(task.new)?)?).unwrap_or(TypeId::ANY);
        let mut upgraded = Vec::with_capacity(count);
        for (i, item) in items.iter().enumerate() {
            let value = cx.traced(PathSegment::Index(i), |cx| -> MigrationResult<Value> {
                let value = cx.upgrade_or_null(item)?;
                Ok(cx.fit(element, value, DiagnosticKind::ElementTypeChanged, "element"))
            })?;
            upgraded.push(value);
        }
        *cx.heap_mut().sequence_mut(task.new)? = upgraded;
        Ok(count)
    }
}

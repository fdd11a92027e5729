//! Built-in migration strategies
//!
//! One strategy per family of containers plus the record fallback. Keyed
//! collections share one two-phase strategy parameterised by a
//! [`KeyedAdapter`].

mod keyed;
mod queue;
mod record;
mod sequence;
mod transient;
mod weak;

pub use keyed::{KeyedAdapter, KeyedCollectionStrategy, KeyedItem, MapAdapter, SetAdapter, SideTableAdapter};
pub use queue::QueueStrategy;
pub use record::{FieldPlan, FieldSource, PlannedField, RecordStrategy};
pub use sequence::SequenceStrategy;
pub use transient::TransientStrategy;
pub use weak::WeakRefStrategy;

use graft_heap::{PrimitiveKind, TypeId, TypeKind, TypeRegistry, Value};

/// Coerce a migrated value to a declared type; `None` if it cannot hold it
///
/// Ints widen to floats, `any` takes every value and reference-typed slots
/// accept null.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn coerce(types: &TypeRegistry, ty: TypeId, value: Value) -> Option<Value> {
    let Ok(descriptor) = types.get(ty) else {
        return Some(value);
    };
    match (&descriptor.kind, value) {
        (TypeKind::Primitive(PrimitiveKind::Any), v) => Some(v),
        (TypeKind::Primitive(PrimitiveKind::Bool), v @ Value::Bool(_))
        | (TypeKind::Primitive(PrimitiveKind::Int), v @ Value::Int(_))
        | (TypeKind::Primitive(PrimitiveKind::Float), v @ Value::Float(_))
        | (TypeKind::Primitive(PrimitiveKind::Str), v @ (Value::Str(_) | Value::Null)) => Some(v),
        (TypeKind::Primitive(PrimitiveKind::Float), Value::Int(n)) => Some(Value::Float(n as f64)),
        (TypeKind::Primitive(_), _) => None,
        (_, v @ (Value::Null | Value::Ref(_) | Value::Type(_))) => Some(v),
        (_, _) => None,
    }
}

//! Testing utilities for the Graft workspace
//!
//! Two-generation schema fixtures and heap builders.

#![allow(missing_docs)]

use graft_heap::{
    FieldDef, Heap, MapFlavor, ObjectBody, ObjectId, SequenceOrder, SetFlavor, TypeDescriptor,
    TypeId, TypeRegistry, Value,
};
use std::collections::VecDeque;

pub const OLD: u32 = 1;
pub const NEW: u32 = 2;

/// A type and its successor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generations {
    pub old: TypeId,
    pub new: TypeId,
}

/// Register a record type in both generations
pub fn record_pair(
    types: &mut TypeRegistry,
    old: TypeDescriptor,
    new: TypeDescriptor,
) -> Generations {
    Generations {
        old: types.register(old).unwrap(),
        new: types.register(new).unwrap(),
    }
}

/// `Node { label: str, next: any }`, unchanged across generations
pub fn node_types(types: &mut TypeRegistry) -> Generations {
    let fields = || {
        vec![
            FieldDef::new("label", TypeId::STR),
            FieldDef::new("next", TypeId::ANY),
        ]
    };
    record_pair(
        types,
        TypeDescriptor::record("Node", OLD, fields()),
        TypeDescriptor::record("Node", NEW, fields()),
    )
}

/// `Key { id: int }` keyed by `id`, becoming `Key { ident: int }` keyed by `ident`
pub fn key_types(types: &mut TypeRegistry) -> Generations {
    record_pair(
        types,
        TypeDescriptor::record("Key", OLD, vec![FieldDef::new("id", TypeId::INT)]).keyed_by(&["id"]),
        TypeDescriptor::record(
            "Key",
            NEW,
            vec![FieldDef::new("ident", TypeId::INT).renamed_from("id")],
        )
        .keyed_by(&["ident"]),
    )
}

/// `Tag { name: str, version: int }` keyed by both fields, becoming keyed by
/// `name` only, so tags differing only in version collide
pub fn tag_types(types: &mut TypeRegistry) -> Generations {
    let fields = || {
        vec![
            FieldDef::new("name", TypeId::STR),
            FieldDef::new("version", TypeId::INT),
        ]
    };
    record_pair(
        types,
        TypeDescriptor::record("Tag", OLD, fields()).keyed_by(&["name", "version"]),
        TypeDescriptor::record("Tag", NEW, fields()).keyed_by(&["name"]),
    )
}

/// Sequence type in both generations
pub fn sequence_types(
    types: &mut TypeRegistry,
    element: Generations,
    order: SequenceOrder,
) -> Generations {
    Generations {
        old: types.sequence_of(element.old, order, OLD),
        new: types.sequence_of(element.new, order, NEW),
    }
}

/// Map type in both generations
pub fn map_types(
    types: &mut TypeRegistry,
    key: Generations,
    value: Generations,
    flavor: MapFlavor,
) -> Generations {
    Generations {
        old: types.map_of(key.old, value.old, flavor, OLD),
        new: types.map_of(key.new, value.new, flavor, NEW),
    }
}

/// Set type in both generations
pub fn set_types(types: &mut TypeRegistry, element: Generations, flavor: SetFlavor) -> Generations {
    Generations {
        old: types.set_of(element.old, flavor, OLD),
        new: types.set_of(element.new, flavor, NEW),
    }
}

/// Queue type in both generations
pub fn queue_types(types: &mut TypeRegistry, element: Generations) -> Generations {
    Generations {
        old: types.queue_of(element.old, OLD),
        new: types.queue_of(element.new, NEW),
    }
}

/// Expiring reference type in both generations
pub fn weak_types(types: &mut TypeRegistry, target: Generations) -> Generations {
    Generations {
        old: types.weak_of(target.old, OLD),
        new: types.weak_of(target.new, NEW),
    }
}

/// Side table type in both generations
pub fn side_table_types(
    types: &mut TypeRegistry,
    key: Generations,
    value: Generations,
) -> Generations {
    Generations {
        old: types.side_table_of(key.old, value.old, OLD),
        new: types.side_table_of(key.new, value.new, NEW),
    }
}

/// A primitive type, which is its own successor
pub fn primitive(ty: TypeId) -> Generations {
    Generations { old: ty, new: ty }
}

pub fn node(heap: &mut Heap, ty: TypeId, label: &str, next: Value) -> ObjectId {
    heap.alloc_record(ty, vec![Value::str(label), next])
}

/// Nodes `0 → 1 → … → n-1 → 0`
pub fn ring(heap: &mut Heap, ty: TypeId, n: usize) -> Vec<ObjectId> {
    let ids: Vec<ObjectId> = (0..n)
        .map(|i| node(heap, ty, &format!("n{i}"), Value::Null))
        .collect();
    for (i, id) in ids.iter().enumerate() {
        let next = ids[(i + 1) % n];
        heap.set_record_fields(*id, vec![Value::str(&format!("n{i}")), Value::Ref(next)])
            .unwrap();
    }
    ids
}

pub fn sequence(heap: &mut Heap, ty: TypeId, items: Vec<Value>) -> ObjectId {
    heap.alloc(ty, ObjectBody::Sequence(items))
}

pub fn queue(heap: &mut Heap, ty: TypeId, items: Vec<Value>) -> ObjectId {
    heap.alloc(ty, ObjectBody::Queue(items.into_iter().collect::<VecDeque<_>>()))
}

pub fn map(
    heap: &mut Heap,
    types: &TypeRegistry,
    ty: TypeId,
    entries: Vec<(Value, Value)>,
) -> ObjectId {
    let id = heap.alloc_default(types, ty).unwrap();
    for (key, value) in entries {
        assert!(heap.map_insert(types, id, key, value).unwrap(), "duplicate fixture key");
    }
    id
}

pub fn set(heap: &mut Heap, types: &TypeRegistry, ty: TypeId, items: Vec<Value>) -> ObjectId {
    let id = heap.alloc_default(types, ty).unwrap();
    for item in items {
        assert!(heap.set_insert(types, id, item).unwrap(), "duplicate fixture element");
    }
    id
}

pub fn weak(heap: &mut Heap, ty: TypeId, target: Option<ObjectId>) -> ObjectId {
    heap.alloc(ty, ObjectBody::Weak(target))
}

pub fn side_table(
    heap: &mut Heap,
    types: &TypeRegistry,
    ty: TypeId,
    entries: Vec<(ObjectId, Value)>,
) -> ObjectId {
    let id = heap.alloc_default(types, ty).unwrap();
    for (key, value) in entries {
        heap.side_table_add(id, key, value).unwrap();
    }
    id
}

/// Follow a reference field
pub fn deref(heap: &Heap, types: &TypeRegistry, id: ObjectId, field: &str) -> ObjectId {
    heap.field(types, id, field)
        .unwrap()
        .as_object()
        .unwrap_or_else(|| panic!("field {field} of {id} is not a reference"))
}

/// Object held by a static slot
pub fn root(heap: &Heap, name: &str) -> ObjectId {
    heap.static_value(name)
        .unwrap()
        .as_object()
        .unwrap_or_else(|| panic!("static {name} is not a reference"))
}

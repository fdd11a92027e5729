//! Whole-pass properties: identity, cycles and reachability.

use graft_heap::{Heap, ObjectId, SequenceOrder, TypeRegistry, Value};
use graft_migrate::{EvolutionMap, MigrationConfig, MigrationPass, PassReport, StrategyRegistry};
use graft_test_utils::{deref, node, node_types, ring, root, sequence, sequence_types, NEW, OLD};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};

fn migrate(heap: &mut Heap, types: &TypeRegistry) -> PassReport {
    let resolver = EvolutionMap::by_name(types, OLD, NEW);
    let registry = StrategyRegistry::with_defaults();
    MigrationPass::new(heap, types, &resolver, &registry)
        .with_config(MigrationConfig::new().with_tracing(false))
        .run()
        .expect("pass completes")
}

/// Cycle safety: `A → B → A` becomes `A' → B' → A'`.
#[test]
fn two_node_cycle_is_preserved() {
    let mut types = TypeRegistry::new();
    let nodes = node_types(&mut types);

    let mut heap = Heap::new();
    let ids = ring(&mut heap, nodes.old, 2);
    heap.add_static("Graph.head", Value::Ref(ids[0]), true);

    let report = migrate(&mut heap, &types);

    let a = root(&heap, "Graph.head");
    let b = deref(&heap, &types, a, "next");
    assert_ne!(a, ids[0]);
    assert_ne!(b, ids[1]);
    assert_eq!(deref(&heap, &types, b, "next"), a);
    assert_eq!(heap.type_of(b).unwrap(), nodes.new);
    assert_eq!(report.objects_migrated, 2);
}

#[test]
fn self_reference_points_at_the_new_instance() {
    let mut types = TypeRegistry::new();
    let nodes = node_types(&mut types);

    let mut heap = Heap::new();
    let ids = ring(&mut heap, nodes.old, 1);
    heap.add_static("Graph.loop", Value::Ref(ids[0]), true);

    migrate(&mut heap, &types);

    let migrated = root(&heap, "Graph.loop");
    assert_eq!(deref(&heap, &types, migrated, "next"), migrated);
}

/// Identity preservation: a node listed twice maps to one new node.
#[test]
fn shared_node_appears_twice_as_one_instance() {
    let mut types = TypeRegistry::new();
    let nodes = node_types(&mut types);
    let lists = sequence_types(&mut types, nodes, SequenceOrder::List);

    let mut heap = Heap::new();
    let shared = node(&mut heap, nodes.old, "shared", Value::Null);
    let list = sequence(&mut heap, lists.old, vec![Value::Ref(shared), Value::Ref(shared)]);
    heap.add_static("World.pair", Value::Ref(list), true);

    let report = migrate(&mut heap, &types);

    let items = heap.sequence(root(&heap, "World.pair")).unwrap().to_vec();
    assert_eq!(items[0], items[1]);
    assert_ne!(items[0], Value::Ref(shared));
    assert_eq!(report.objects_migrated, 2);
}

/// Two static slots holding the same object end up holding the same new one.
#[test]
fn roots_sharing_an_object_stay_shared() {
    let mut types = TypeRegistry::new();
    let nodes = node_types(&mut types);

    let mut heap = Heap::new();
    let n = node(&mut heap, nodes.old, "both", Value::Null);
    heap.add_static("A.node", Value::Ref(n), true);
    heap.add_static("B.node", Value::Ref(n), true);

    migrate(&mut heap, &types);

    assert_eq!(root(&heap, "A.node"), root(&heap, "B.node"));
}

/// A pinned root shares its in-place instance with swappable roots.
#[test]
fn pinned_root_wins_the_instance() {
    let mut types = TypeRegistry::new();
    let nodes = node_types(&mut types);

    let mut heap = Heap::new();
    let n = node(&mut heap, nodes.old, "pinned", Value::Null);
    heap.add_static("Free.node", Value::Ref(n), true);
    heap.add_static("Pinned.node", Value::Ref(n), false);

    let report = migrate(&mut heap, &types);

    assert_eq!(root(&heap, "Pinned.node"), n);
    assert_eq!(root(&heap, "Free.node"), n);
    assert_eq!(heap.type_of(n).unwrap(), nodes.new);
    assert_eq!(report.edited_in_place, 1);
    assert!(report.diagnostics.is_empty());
}

/// A replacement the host built itself is adopted and only populated.
#[test]
fn adopted_instance_is_populated_not_recreated() {
    let mut types = TypeRegistry::new();
    let nodes = node_types(&mut types);

    let mut heap = Heap::new();
    let old = node(&mut heap, nodes.old, "prebuilt", Value::Null);
    heap.add_static("Host.node", Value::Ref(old), true);
    let prebuilt = heap.alloc_default(&types, nodes.new).unwrap();

    let resolver = EvolutionMap::by_name(&types, OLD, NEW);
    let registry = StrategyRegistry::with_defaults();
    let mut pass = MigrationPass::new(&mut heap, &types, &resolver, &registry)
        .with_config(MigrationConfig::new().with_tracing(false));
    pass.adopt(old, prebuilt).unwrap();
    pass.adopt(old, prebuilt).unwrap();
    let report = pass.run().unwrap();

    assert_eq!(root(&heap, "Host.node"), prebuilt);
    assert_eq!(heap.field(&types, prebuilt, "label").unwrap(), &Value::str("prebuilt"));
    assert_eq!(report.objects_migrated, 1);
}

/// Values held outside the statics are migrated on request.
#[test]
fn host_upgrade_is_idempotent() {
    let mut types = TypeRegistry::new();
    let nodes = node_types(&mut types);

    let mut heap = Heap::new();
    let old = node(&mut heap, nodes.old, "local", Value::Null);

    let resolver = EvolutionMap::by_name(&types, OLD, NEW);
    let registry = StrategyRegistry::with_defaults();
    let mut pass = MigrationPass::new(&mut heap, &types, &resolver, &registry)
        .with_config(MigrationConfig::new().with_tracing(false));
    let first = pass.upgrade(&Value::Ref(old)).unwrap();
    let second = pass.upgrade(&Value::Ref(old)).unwrap();
    assert_eq!(pass.upgrade(&Value::Int(7)).unwrap(), Value::Int(7));
    pass.run().unwrap();

    assert_eq!(first, second);
    let new = first.as_object().unwrap();
    assert_eq!(heap.field(&types, new, "label").unwrap(), &Value::str("local"));
}

/// Build nodes where `edges[i]` is the index `node i` points at, if any
fn graph(heap: &mut Heap, ty: graft_heap::TypeId, edges: &[Option<usize>]) -> Vec<ObjectId> {
    let ids: Vec<ObjectId> = (0..edges.len())
        .map(|i| node(heap, ty, &format!("n{i}"), Value::Null))
        .collect();
    for (i, edge) in edges.iter().enumerate() {
        let next = edge.map_or(Value::Null, |j| Value::Ref(ids[j % ids.len()]));
        heap.set_record_fields(ids[i], vec![Value::str(&format!("n{i}")), next])
            .unwrap();
    }
    ids
}

fn next_of(heap: &Heap, types: &TypeRegistry, id: ObjectId) -> Option<ObjectId> {
    heap.field(types, id, "next").unwrap().as_object()
}

proptest! {
    /// Identity preservation and cycle safety over arbitrary linked graphs
    #[test]
    fn prop_linked_graphs_migrate_one_to_one(
        edges in prop::collection::vec(prop::option::of(0usize..16), 1..16)
    ) {
        let mut types = TypeRegistry::new();
        let nodes = node_types(&mut types);
        let mut heap = Heap::new();
        let ids = graph(&mut heap, nodes.old, &edges);
        heap.add_static("Graph.head", Value::Ref(ids[0]), true);

        let report = migrate(&mut heap, &types);

        // Walk old and new chains in lockstep
        let mut mapping: HashMap<ObjectId, ObjectId> = HashMap::new();
        let mut old = Some(ids[0]);
        let mut new = Some(root(&heap, "Graph.head"));
        while let (Some(o), Some(n)) = (old, new) {
            if let Some(seen) = mapping.get(&o) {
                prop_assert_eq!(*seen, n);
                break;
            }
            prop_assert_ne!(o, n);
            prop_assert_eq!(heap.type_of(n).unwrap(), nodes.new);
            prop_assert_eq!(
                heap.field(&types, n, "label").unwrap(),
                heap.field(&types, o, "label").unwrap()
            );
            mapping.insert(o, n);
            old = next_of(&heap, &types, o);
            new = next_of(&heap, &types, n);
        }
        prop_assert_eq!(old.is_some(), new.is_some());

        let distinct: HashSet<ObjectId> = mapping.values().copied().collect();
        prop_assert_eq!(distinct.len(), mapping.len());
        prop_assert_eq!(report.objects_migrated, mapping.len());
        prop_assert!(report.diagnostics.is_empty());
    }
}

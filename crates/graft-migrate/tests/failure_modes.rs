//! Recoverable and fatal failures.
//!
//! Recoverable problems are logged at the smallest scope and the pass keeps
//! going; only an identity-cache conflict aborts it.

use graft_heap::{
    FieldDef, Heap, HeapResult, MapFlavor, ObjectId, SetFlavor, TypeDescriptor, TypeId, TypeKind,
    TypeRegistry, Value,
};
use graft_migrate::{
    Allocation, DiagnosticKind, EvolutionMap, KeyedAdapter, KeyedCollectionStrategy, KeyedItem,
    MapAdapter, MemorySink, MigrationConfig, MigrationContext, MigrationError, MigrationPass,
    MigrationResult, MigrationStrategy, MigrationTask, PassReport, Severity, StrategyRegistry,
};
use graft_test_utils::{
    key_types, map, map_types, node, node_types, primitive, record_pair, root, set, set_types,
    tag_types, NEW, OLD,
};
use pretty_assertions::assert_eq;

fn run(
    heap: &mut Heap,
    types: &TypeRegistry,
    resolver: &EvolutionMap,
    registry: &StrategyRegistry,
    config: MigrationConfig,
) -> MigrationResult<PassReport> {
    MigrationPass::new(heap, types, resolver, registry)
        .with_config(config.with_tracing(false))
        .run()
}

fn migrate_with(heap: &mut Heap, types: &TypeRegistry, config: MigrationConfig) -> PassReport {
    let resolver = EvolutionMap::by_name(types, OLD, NEW);
    let registry = StrategyRegistry::with_defaults();
    run(heap, types, &resolver, &registry, config).expect("pass completes")
}

fn migrate(heap: &mut Heap, types: &TypeRegistry) -> PassReport {
    migrate_with(heap, types, MigrationConfig::new())
}

fn tag(heap: &mut Heap, ty: TypeId, name: &str, version: i64) -> Value {
    Value::Ref(heap.alloc_record(ty, vec![Value::str(name), Value::Int(version)]))
}

/// Two tags that differed only by version become equal once equality is by
/// name alone: one survives and the other is reported.
#[test]
fn colliding_keys_keep_the_first_entry() {
    let mut types = TypeRegistry::new();
    let tags = tag_types(&mut types);
    let sets = set_types(&mut types, tags, SetFlavor::Hashed);

    let mut heap = Heap::new();
    let items = vec![tag(&mut heap, tags.old, "a", 1), tag(&mut heap, tags.old, "a", 2)];
    let s = set(&mut heap, &types, sets.old, items);
    heap.add_static("Labels.all", Value::Ref(s), true);

    let report = migrate(&mut heap, &types);

    let migrated = root(&heap, "Labels.all");
    assert_eq!(heap.keyed(migrated).unwrap().len(), 1);
    assert_eq!(report.count(DiagnosticKind::KeyCollision), 1);
    let collision = report
        .diagnostics
        .iter()
        .find(|d| d.kind == DiagnosticKind::KeyCollision)
        .unwrap();
    assert_eq!(collision.severity, Severity::Warning);
    assert!(collision.path.starts_with("Labels.all"), "{}", collision.path);
}

#[test]
fn collisions_are_logged_once_per_container_by_default() {
    let mut types = TypeRegistry::new();
    let tags = tag_types(&mut types);
    let sets = set_types(&mut types, tags, SetFlavor::Sorted);

    let build = |heap: &mut Heap, types: &TypeRegistry| {
        let items = (1..=3).map(|v| tag(heap, tags.old, "same", v)).collect();
        let s = set(heap, types, sets.old, items);
        heap.add_static("Labels.dupes", Value::Ref(s), true);
    };

    let mut heap = Heap::new();
    build(&mut heap, &types);
    let once = migrate(&mut heap, &types);
    assert_eq!(once.count(DiagnosticKind::KeyCollision), 1);
    assert_eq!(heap.keyed(root(&heap, "Labels.dupes")).unwrap().len(), 1);

    let mut heap = Heap::new();
    build(&mut heap, &types);
    let every = migrate_with(
        &mut heap,
        &types,
        MigrationConfig::new().with_collisions_logged_once(false),
    );
    assert_eq!(every.count(DiagnosticKind::KeyCollision), 2);
}

/// A key whose type was retired upgrades to null and its entry is skipped.
#[test]
fn null_key_is_skipped_with_a_warning() {
    let mut types = TypeRegistry::new();
    let keys = key_types(&mut types);
    let maps = map_types(&mut types, keys, primitive(TypeId::INT), MapFlavor::Hashed);

    let mut heap = Heap::new();
    let key = heap.alloc_record(keys.old, vec![Value::Int(1)]);
    let m = map(&mut heap, &types, maps.old, vec![(Value::Ref(key), Value::Int(5))]);
    heap.add_static("Index.lost", Value::Ref(m), true);

    let mut resolver = EvolutionMap::by_name(&types, OLD, NEW);
    resolver.retire(keys.old);
    let registry = StrategyRegistry::with_defaults();
    let report = run(&mut heap, &types, &resolver, &registry, MigrationConfig::new()).unwrap();

    assert!(heap.keyed(root(&heap, "Index.lost")).unwrap().is_empty());
    assert_eq!(report.count(DiagnosticKind::NullKey), 1);
    // The key's failure is logged once even though it is visited twice
    assert_eq!(report.count(DiagnosticKind::UnresolvedType), 1);
}

/// A field that declares it expects null keys lets its map keep them.
#[test]
fn null_keys_kept_when_the_owning_field_expects_them() {
    let mut types = TypeRegistry::new();
    let keys = key_types(&mut types);
    let maps = map_types(&mut types, keys, primitive(TypeId::INT), MapFlavor::Hashed);
    let holders = record_pair(
        &mut types,
        TypeDescriptor::record("Holder", OLD, vec![FieldDef::new("index", maps.old)]),
        TypeDescriptor::record(
            "Holder",
            NEW,
            vec![FieldDef::new("index", maps.new).expecting_null_keys()],
        ),
    );

    let mut heap = Heap::new();
    let key = heap.alloc_record(keys.old, vec![Value::Int(1)]);
    let m = map(&mut heap, &types, maps.old, vec![(Value::Ref(key), Value::Int(5))]);
    let holder = heap.alloc_record(holders.old, vec![Value::Ref(m)]);
    heap.add_static("App.holder", Value::Ref(holder), true);

    let mut resolver = EvolutionMap::by_name(&types, OLD, NEW);
    resolver.retire(keys.old);
    let registry = StrategyRegistry::with_defaults();
    let report = run(&mut heap, &types, &resolver, &registry, MigrationConfig::new()).unwrap();

    let holder = root(&heap, "App.holder");
    let index = heap.field(&types, holder, "index").unwrap().as_object().unwrap();
    assert_eq!(heap.map_get(&types, index, &Value::Null).unwrap(), Some(&Value::Int(5)));
    assert_eq!(report.count(DiagnosticKind::NullKey), 0);
}

/// A root whose type has no successor keeps its old instance.
#[test]
fn retired_root_type_keeps_old_instance() {
    let mut types = TypeRegistry::new();
    let gadget = types
        .register(TypeDescriptor::record("Gadget", OLD, vec![FieldDef::new("n", TypeId::INT)]))
        .unwrap();
    let nodes = node_types(&mut types);

    let mut heap = Heap::new();
    let g = heap.alloc_record(gadget, vec![Value::Int(3)]);
    let n = node(&mut heap, nodes.old, "fine", Value::Null);
    heap.add_static("Toys.gadget", Value::Ref(g), true);
    heap.add_static("Toys.node", Value::Ref(n), true);

    let mut resolver = EvolutionMap::by_name(&types, OLD, NEW);
    resolver.retire(gadget);
    let registry = StrategyRegistry::with_defaults();
    let sink = MemorySink::new();
    let report = MigrationPass::new(&mut heap, &types, &resolver, &registry)
        .with_config(MigrationConfig::new().with_tracing(false))
        .with_sink(sink.clone())
        .run()
        .unwrap();

    assert_eq!(root(&heap, "Toys.gadget"), g);
    assert_eq!(heap.type_of(root(&heap, "Toys.node")).unwrap(), nodes.new);
    assert_eq!(report.count(DiagnosticKind::UnresolvedType), 1);
    assert_eq!(sink.warning_count(), 1);
    assert_eq!(sink.error_count(), 0);
    let (_, message, path) = &sink.entries()[0];
    assert!(message.contains("Gadget"), "{message}");
    assert_eq!(path, "Toys.gadget");
}

/// A retired type handle stored in a field becomes null.
#[test]
fn retired_type_handle_becomes_null() {
    let mut types = TypeRegistry::new();
    let gadget = types
        .register(TypeDescriptor::record("Gadget", OLD, vec![]))
        .unwrap();
    let nodes = node_types(&mut types);

    let mut heap = Heap::new();
    let n = node(&mut heap, nodes.old, "typed", Value::Type(gadget));
    heap.add_static("Reflect.sample", Value::Ref(n), true);

    let mut resolver = EvolutionMap::by_name(&types, OLD, NEW);
    resolver.retire(gadget);
    let registry = StrategyRegistry::with_defaults();
    let report = run(&mut heap, &types, &resolver, &registry, MigrationConfig::new()).unwrap();

    let sample = root(&heap, "Reflect.sample");
    assert_eq!(heap.field(&types, sample, "next").unwrap(), &Value::Null);
    assert_eq!(heap.field(&types, sample, "label").unwrap(), &Value::str("typed"));
    assert_eq!(report.count(DiagnosticKind::UnresolvedType), 1);
}

/// A strategy that maps one old instance to two new ones aborts the pass.
#[derive(Debug)]
struct Duplicating;

impl MigrationStrategy for Duplicating {
    fn name(&self) -> &'static str {
        "duplicating"
    }

    fn should_handle(&self, ty: &TypeDescriptor) -> bool {
        ty.name == "Node"
    }

    fn create_empty(
        &self,
        cx: &mut MigrationContext<'_>,
        old: ObjectId,
        _in_place: bool,
    ) -> MigrationResult<Allocation> {
        cx.allocate_successor(old, |_| true)
    }

    fn schedule_upgrade(
        &self,
        cx: &mut MigrationContext<'_>,
        old: ObjectId,
        allocation: Allocation,
    ) -> MigrationResult<()> {
        cx.record_mapping(old, allocation.instance())?;
        let second = cx.allocate_successor(old, |_| true)?.instance();
        cx.record_mapping(old, second)
    }

    fn populate(&self, _cx: &mut MigrationContext<'_>, _task: &MigrationTask) -> MigrationResult<usize> {
        Ok(0)
    }
}

#[test]
fn identity_cache_conflict_is_fatal() {
    let mut types = TypeRegistry::new();
    let nodes = node_types(&mut types);

    let mut heap = Heap::new();
    let n = node(&mut heap, nodes.old, "twice", Value::Null);
    heap.add_static("World.twice", Value::Ref(n), true);

    let resolver = EvolutionMap::by_name(&types, OLD, NEW);
    let mut registry = StrategyRegistry::with_defaults();
    registry.register_priority(Duplicating);
    let sink = MemorySink::new();
    let err = MigrationPass::new(&mut heap, &types, &resolver, &registry)
        .with_config(MigrationConfig::new().with_tracing(false))
        .with_sink(sink.clone())
        .run()
        .unwrap_err();

    assert!(err.is_fatal());
    assert!(matches!(err, MigrationError::IdentityCacheConflict { .. }));
    assert_eq!(err.path(), "World.twice");
    assert_eq!(sink.error_count(), 1);
}

/// Map storage whose every insert is accompanied by a foreign one, as if
/// another thread were writing to the container.
#[derive(Debug)]
struct Leaky;

impl KeyedAdapter for Leaky {
    const NAME: &'static str = "leaky-map";
    const ACCEPTS_NULL_KEYS: bool = true;

    fn handles(kind: &TypeKind) -> bool {
        matches!(kind, TypeKind::Map { .. })
    }

    fn count(heap: &Heap, id: ObjectId) -> HeapResult<Option<usize>> {
        MapAdapter::count(heap, id)
    }

    fn items(heap: &Heap, id: ObjectId) -> HeapResult<Vec<KeyedItem>> {
        MapAdapter::items(heap, id)
    }

    fn prepare(heap: &mut Heap, types: &TypeRegistry, id: ObjectId, max_depth: usize) -> HeapResult<()> {
        MapAdapter::prepare(heap, types, id, max_depth)
    }

    fn add(heap: &mut Heap, types: &TypeRegistry, id: ObjectId, item: KeyedItem) -> HeapResult<bool> {
        let intruder = KeyedItem {
            key: Value::str("intruder"),
            value: Some(Value::Int(-1)),
        };
        MapAdapter::add(heap, types, id, intruder)?;
        MapAdapter::add(heap, types, id, item)
    }
}

fn leaky_map(heap: &mut Heap, types: &mut TypeRegistry) -> ObjectId {
    let maps = map_types(
        types,
        primitive(TypeId::INT),
        primitive(TypeId::INT),
        MapFlavor::Concurrent,
    );
    let m = map(
        heap,
        types,
        maps.old,
        vec![(Value::Int(1), Value::Int(10)), (Value::Int(2), Value::Int(20))],
    );
    heap.add_static("Shared.counts", Value::Ref(m), true);
    m
}

#[test]
fn size_change_during_refill_is_thread_interference() {
    let mut types = TypeRegistry::new();
    let mut heap = Heap::new();
    leaky_map(&mut heap, &mut types);

    let resolver = EvolutionMap::by_name(&types, OLD, NEW);
    let mut registry = StrategyRegistry::with_defaults();
    registry.register_priority(KeyedCollectionStrategy::<Leaky>::new());
    let report = run(&mut heap, &types, &resolver, &registry, MigrationConfig::new()).unwrap();

    assert_eq!(report.count(DiagnosticKind::ThreadInterference), 1);
    assert!(report.has_errors());
    let interference = report
        .diagnostics
        .iter()
        .find(|d| d.kind == DiagnosticKind::ThreadInterference)
        .unwrap();
    assert_eq!(interference.severity, Severity::Error);
    assert!(interference.path.starts_with("Shared.counts"), "{}", interference.path);
}

#[test]
fn interference_check_can_be_disabled() {
    let mut types = TypeRegistry::new();
    let mut heap = Heap::new();
    leaky_map(&mut heap, &mut types);

    let resolver = EvolutionMap::by_name(&types, OLD, NEW);
    let mut registry = StrategyRegistry::with_defaults();
    registry.register_priority(KeyedCollectionStrategy::<Leaky>::new());
    let report = run(
        &mut heap,
        &types,
        &resolver,
        &registry,
        MigrationConfig::new().with_interference_check(false),
    )
    .unwrap();

    assert_eq!(report.count(DiagnosticKind::ThreadInterference), 0);
    let migrated = root(&heap, "Shared.counts");
    assert_eq!(heap.map_get(&types, migrated, &Value::Int(2)).unwrap(), Some(&Value::Int(20)));
}

/// A field whose type changed incompatibly falls back to its default.
#[test]
fn incompatible_field_value_is_reset_to_default() {
    let mut types = TypeRegistry::new();
    let scores = record_pair(
        &mut types,
        TypeDescriptor::record("Score", OLD, vec![FieldDef::new("points", TypeId::STR)]),
        TypeDescriptor::record("Score", NEW, vec![FieldDef::new("points", TypeId::INT)]),
    );

    let mut heap = Heap::new();
    let s = heap.alloc_record(scores.old, vec![Value::str("many")]);
    heap.add_static("Board.score", Value::Ref(s), true);

    let report = migrate(&mut heap, &types);

    let migrated = root(&heap, "Board.score");
    assert_eq!(heap.field(&types, migrated, "points").unwrap(), &Value::Int(0));
    assert_eq!(report.count(DiagnosticKind::FieldTypeChanged), 1);
    let warning = &report.diagnostics[0];
    assert_eq!(warning.path, "Board.score.points");
}

/// Stale compiled metadata is cleared and summarised in one warning.
#[test]
fn transient_objects_are_cleared_and_summarised() {
    let mut types = TypeRegistry::new();
    let plans = record_pair(
        &mut types,
        TypeDescriptor::record("SerializerPlan", OLD, vec![FieldDef::new("steps", TypeId::INT)])
            .transient(),
        TypeDescriptor::record("SerializerPlan", NEW, vec![FieldDef::new("steps", TypeId::INT)])
            .transient(),
    );

    let mut heap = Heap::new();
    let a = heap.alloc_record(plans.old, vec![Value::Int(4)]);
    let b = heap.alloc_record(plans.old, vec![Value::Int(9)]);
    heap.add_static("Json.plan", Value::Ref(a), true);
    heap.add_static("Xml.plan", Value::Ref(b), false);

    let report = migrate(&mut heap, &types);

    let fresh = root(&heap, "Json.plan");
    assert_ne!(fresh, a);
    assert_eq!(heap.field(&types, fresh, "steps").unwrap(), &Value::Int(0));
    assert_eq!(heap.field(&types, b, "steps").unwrap(), &Value::Int(0));
    assert_eq!(heap.type_of(b).unwrap(), plans.new);

    assert_eq!(report.count(DiagnosticKind::StaleTypeMetadata), 1);
    let summary = report
        .diagnostics
        .iter()
        .find(|d| d.kind == DiagnosticKind::StaleTypeMetadata)
        .unwrap();
    assert!(summary.message.starts_with("2 stale"), "{}", summary.message);
}

/// Old instances with a finalizer never run it once a replacement exists.
#[test]
fn finalizers_of_replaced_instances_are_suppressed() {
    let mut types = TypeRegistry::new();
    let handles = record_pair(
        &mut types,
        TypeDescriptor::record("FileHandle", OLD, vec![FieldDef::new("fd", TypeId::INT)])
            .with_finalizer(),
        TypeDescriptor::record("FileHandle", NEW, vec![FieldDef::new("fd", TypeId::INT)])
            .with_finalizer(),
    );

    let mut heap = Heap::new();
    let swapped = heap.alloc_record(handles.old, vec![Value::Int(3)]);
    let pinned = heap.alloc_record(handles.old, vec![Value::Int(4)]);
    heap.add_static("Io.log", Value::Ref(swapped), true);
    heap.add_static("Io.stdin", Value::Ref(pinned), false);

    let report = migrate(&mut heap, &types);

    assert!(heap.get(swapped).unwrap().finalizer_suppressed);
    assert!(!heap.get(pinned).unwrap().finalizer_suppressed);
    assert!(!heap.get(root(&heap, "Io.log")).unwrap().finalizer_suppressed);
    assert_eq!(report.finalizers_suppressed, 1);
}

/// An object the host already upgraded cannot be claimed in place by a
/// pinned slot afterwards.
#[test]
fn pinned_slot_after_host_upgrade_is_reported() {
    let mut types = TypeRegistry::new();
    let nodes = node_types(&mut types);

    let mut heap = Heap::new();
    let n = node(&mut heap, nodes.old, "early", Value::Null);
    heap.add_static("Pinned.node", Value::Ref(n), false);

    let resolver = EvolutionMap::by_name(&types, OLD, NEW);
    let registry = StrategyRegistry::with_defaults();
    let mut pass = MigrationPass::new(&mut heap, &types, &resolver, &registry)
        .with_config(MigrationConfig::new().with_tracing(false));
    let upgraded = pass.upgrade_object(n).unwrap();
    assert_ne!(upgraded, n);
    let report = pass.run().unwrap();

    assert_eq!(report.count(DiagnosticKind::RootNotRepointed), 1);
    assert_eq!(root(&heap, "Pinned.node"), n);
    assert_eq!(heap.field(&types, upgraded, "label").unwrap(), &Value::str("early"));
}

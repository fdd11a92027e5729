//! Demo world
//!
//! A small game world written against generation 1 of its types, reloaded
//! into generation 2. Every built-in strategy has something to migrate.
//!
//! Generation 2 changes:
//! - `Player.hp` is renamed to `health` and a `level` field is added
//! - `Item.name` is renamed to `title` and `weight` widens from int to float
//! - items are keyed by title alone, so two potions of different weight collide

use anyhow::Result;
use graft_heap::{
    FieldDef, Heap, MapFlavor, ObjectBody, ObjectId, SequenceOrder, TypeDescriptor, TypeId,
    TypeRegistry, Value,
};
use graft_migrate::{
    DiagnosticSink, EvolutionMap, MigrationConfig, MigrationPass, PassReport, StrategyRegistry,
};

const OLD: u32 = 1;
const NEW: u32 = 2;

/// Type ids of the generation-1 schema
#[derive(Debug, Clone, Copy)]
struct Schema {
    player: TypeId,
    item: TypeId,
    cache: TypeId,
    players: TypeId,
    inventory: TypeId,
    events: TypeId,
    focus: TypeId,
    scores: TypeId,
    heights: TypeId,
}

/// A heap, its types and the reload decision
#[derive(Debug)]
pub struct Scenario {
    /// Live objects, generation 1 until [`run`](Self::run) is called
    pub heap: Heap,
    /// Both generations of the schema
    pub types: TypeRegistry,
    /// Generation 1 → generation 2
    pub resolver: EvolutionMap,
}

fn register_types(types: &mut TypeRegistry) -> Result<Schema> {
    let player = types.register(TypeDescriptor::record(
        "Player",
        OLD,
        vec![
            FieldDef::new("name", TypeId::STR),
            FieldDef::new("hp", TypeId::INT),
            FieldDef::new("friend", TypeId::ANY),
        ],
    ))?;
    let new_player = types.register(TypeDescriptor::record(
        "Player",
        NEW,
        vec![
            FieldDef::new("name", TypeId::STR),
            FieldDef::new("health", TypeId::INT).renamed_from("hp"),
            FieldDef::new("friend", TypeId::ANY),
            FieldDef::new("level", TypeId::INT),
        ],
    ))?;

    let item = types.register(
        TypeDescriptor::record(
            "Item",
            OLD,
            vec![
                FieldDef::new("name", TypeId::STR),
                FieldDef::new("weight", TypeId::INT),
            ],
        )
        .keyed_by(&["name", "weight"]),
    )?;
    let new_item = types.register(
        TypeDescriptor::record(
            "Item",
            NEW,
            vec![
                FieldDef::new("title", TypeId::STR).renamed_from("name"),
                FieldDef::new("weight", TypeId::FLOAT),
            ],
        )
        .keyed_by(&["title"]),
    )?;

    let cache_fields = || vec![FieldDef::new("entries", TypeId::INT)];
    let cache =
        types.register(TypeDescriptor::record("ReflectionCache", OLD, cache_fields()).transient())?;
    types.register(TypeDescriptor::record("ReflectionCache", NEW, cache_fields()).transient())?;

    let players = types.sequence_of(player, SequenceOrder::List, OLD);
    types.sequence_of(new_player, SequenceOrder::List, NEW);
    let inventory = types.map_of(item, TypeId::INT, MapFlavor::Hashed, OLD);
    types.map_of(new_item, TypeId::INT, MapFlavor::Hashed, NEW);
    let focus = types.weak_of(player, OLD);
    types.weak_of(new_player, NEW);
    let scores = types.side_table_of(player, TypeId::INT, OLD);
    types.side_table_of(new_player, TypeId::INT, NEW);

    // Unchanged element types still get a generation-2 container type
    let events = types.queue_of(TypeId::STR, OLD);
    types.queue_of(TypeId::STR, NEW);
    let heights = types.sequence_of(TypeId::FLOAT, SequenceOrder::Array, OLD);
    types.sequence_of(TypeId::FLOAT, SequenceOrder::Array, NEW);

    Ok(Schema {
        player,
        item,
        cache,
        players,
        inventory,
        events,
        focus,
        scores,
        heights,
    })
}

impl Scenario {
    /// Build a world of `players` players (at least one) linked in a
    /// friendship ring
    ///
    /// # Errors
    /// Returns an error if the schema cannot be registered or a container
    /// cannot be filled
    pub fn world(players: usize) -> Result<Self> {
        let players = players.max(1);
        let mut types = TypeRegistry::new();
        let schema = register_types(&mut types)?;
        let mut heap = Heap::new();

        let ids: Vec<ObjectId> = (0..players)
            .map(|i| {
                let hp = i64::try_from(i).unwrap_or(i64::MAX).saturating_mul(10) + 50;
                heap.alloc_record(
                    schema.player,
                    vec![Value::str(&format!("player{i}")), Value::Int(hp), Value::Null],
                )
            })
            .collect();
        for (i, id) in ids.iter().enumerate() {
            let friend = ids[(i + 1) % ids.len()];
            heap.set_field(&types, *id, "friend", Value::Ref(friend))?;
        }
        let list = heap.alloc(
            schema.players,
            ObjectBody::Sequence(ids.iter().map(|id| Value::Ref(*id)).collect()),
        );

        let inventory = heap.alloc_default(&types, schema.inventory)?;
        for (name, weight, count) in [("sword", 12, 1), ("potion", 1, 5), ("potion", 2, 3)] {
            let item = heap.alloc_record(schema.item, vec![Value::str(name), Value::Int(weight)]);
            heap.map_insert(&types, inventory, Value::Ref(item), Value::Int(count))?;
        }

        let events = heap.alloc(
            schema.events,
            ObjectBody::Queue(
                ["spawn", "join", "loot"]
                    .iter()
                    .map(|e| Value::str(e))
                    .collect(),
            ),
        );
        let focus = heap.alloc(schema.focus, ObjectBody::Weak(Some(ids[0])));

        let scores = heap.alloc_default(&types, schema.scores)?;
        for (i, id) in ids.iter().enumerate() {
            heap.side_table_add(scores, *id, Value::Int(i64::try_from(i).unwrap_or(0)))?;
        }
        let departed = heap.alloc_record(
            schema.player,
            vec![Value::str("departed"), Value::Int(0), Value::Null],
        );
        heap.side_table_add(scores, departed, Value::Int(-1))?;
        heap.collect(departed);

        let heights = heap.alloc(
            schema.heights,
            ObjectBody::Sequence(vec![Value::Float(1.5), Value::Float(1.8), Value::Float(2.0)]),
        );
        let cache = heap.alloc_record(schema.cache, vec![Value::Int(42)]);

        heap.add_static("World.players", Value::Ref(list), true);
        heap.add_static("World.inventory", Value::Ref(inventory), false);
        heap.add_static("World.events", Value::Ref(events), true);
        heap.add_static("World.focus", Value::Ref(focus), true);
        heap.add_static("World.scores", Value::Ref(scores), true);
        heap.add_static("World.heights", Value::Ref(heights), true);
        heap.add_static("Serde.cache", Value::Ref(cache), true);
        heap.add_static("World.player_type", Value::Type(schema.player), true);

        let resolver = EvolutionMap::by_name(&types, OLD, NEW);
        Ok(Self {
            heap,
            types,
            resolver,
        })
    }

    /// Migrate the world to generation 2
    ///
    /// # Errors
    /// Returns the pass's fatal error, if any
    pub fn run(
        &mut self,
        config: MigrationConfig,
        sink: impl DiagnosticSink,
    ) -> Result<PassReport> {
        let registry = StrategyRegistry::with_defaults();
        let report = MigrationPass::new(&mut self.heap, &self.types, &self.resolver, &registry)
            .with_config(config)
            .with_sink(sink)
            .run()?;
        Ok(report)
    }

    /// Object held by a static slot
    #[must_use]
    pub fn root(&self, name: &str) -> Option<ObjectId> {
        self.heap.static_value(name).ok().and_then(Value::as_object)
    }
}

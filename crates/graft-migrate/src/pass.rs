//! Pass driver
//!
//! A [`MigrationPass`] walks the heap from its static roots and replaces
//! every reachable old-generation object with its new-generation equivalent.
//!
//! # Phases
//! 1. **Create**: one task per static slot holding a reference. Slots that
//!    cannot be re-pointed are processed first and edited in place.
//! 2. **Populate**: contents are moved into the skeletons, creating further
//!    skeletons on demand.
//! 3. **Late populate**: hash and equality containers are refilled once
//!    every key is fully populated.

use crate::config::MigrationConfig;
use crate::context::{MigrationContext, PendingTask, RootTask};
use crate::diagnostics::DiagnosticSink;
use crate::error::{DiagnosticKind, MigrationError, MigrationResult};
use crate::path::{PathSegment, TracePath};
use crate::registry::StrategyRegistry;
use crate::report::PassReport;
use crate::resolver::TypeResolver;
use crate::strategy::{MigrationTask, Phase};
use graft_heap::{Heap, ObjectId, TypeRegistry, Value};

/// Root name used for values migrated through [`MigrationPass::upgrade`]
const HOST_ROOT: &str = "<host>";

/// One migration pass over a heap
///
/// # Example
///
/// ```rust
/// use graft_heap::{FieldDef, Heap, TypeDescriptor, TypeId, TypeRegistry, Value};
/// use graft_migrate::{EvolutionMap, MigrationPass, StrategyRegistry};
///
/// let mut types = TypeRegistry::new();
/// let v1 = types
///     .register(TypeDescriptor::record("Player", 1, vec![FieldDef::new("hp", TypeId::INT)]))
///     .unwrap();
/// let v2 = types
///     .register(TypeDescriptor::record(
///         "Player",
///         2,
///         vec![FieldDef::new("health", TypeId::INT).renamed_from("hp")],
///     ))
///     .unwrap();
///
/// let mut heap = Heap::new();
/// let player = heap.alloc_record(v1, vec![Value::Int(40)]);
/// heap.add_static("Game.player", Value::Ref(player), true);
///
/// let resolver = EvolutionMap::by_name(&types, 1, 2);
/// let registry = StrategyRegistry::with_defaults();
/// let report = MigrationPass::new(&mut heap, &types, &resolver, &registry)
///     .run()
///     .unwrap();
///
/// let migrated = heap.static_value("Game.player").unwrap().as_object().unwrap();
/// assert_eq!(heap.type_of(migrated).unwrap(), v2);
/// assert_eq!(heap.field(&types, migrated, "health").unwrap(), &Value::Int(40));
/// assert_eq!(report.objects_migrated, 1);
/// ```
#[derive(Debug)]
pub struct MigrationPass<'a> {
    cx: MigrationContext<'a>,
}

impl<'a> MigrationPass<'a> {
    /// Start a pass; every registered strategy is told a new pass began
    pub fn new(
        heap: &'a mut Heap,
        types: &'a TypeRegistry,
        resolver: &'a dyn TypeResolver,
        registry: &'a StrategyRegistry,
    ) -> Self {
        for strategy in registry.iter() {
            strategy.on_pass_start();
        }
        Self {
            cx: MigrationContext::new(heap, types, resolver, registry),
        }
    }

    /// Set configuration
    #[inline]
    #[must_use]
    pub fn with_config(mut self, config: MigrationConfig) -> Self {
        self.cx.set_config(config);
        self
    }

    /// Send diagnostics to a host sink
    #[inline]
    #[must_use]
    pub fn with_sink(mut self, sink: impl DiagnosticSink + 'a) -> Self {
        self.cx.set_sink(Box::new(sink));
        self
    }

    /// Migrate a value held outside the static roots
    ///
    /// Idempotent within the pass: the same old object always yields the
    /// same new one. Population happens when [`run`](Self::run) drains the
    /// queues.
    ///
    /// # Errors
    /// Returns the error raised while creating the skeleton
    pub fn upgrade(&mut self, value: &Value) -> MigrationResult<Value> {
        self.cx.reset_path(TracePath::named(HOST_ROOT));
        self.cx.upgrade_value(value)
    }

    /// Migrate an object held outside the static roots
    ///
    /// # Errors
    /// Returns the error raised while creating the skeleton
    pub fn upgrade_object(&mut self, old: ObjectId) -> MigrationResult<ObjectId> {
        self.cx.reset_path(TracePath::named(HOST_ROOT));
        let upgraded = self.cx.upgrade_object(old, false)?;
        upgraded.as_object().ok_or_else(|| {
            MigrationError::unresolved_type(
                old.to_string(),
                "strategy produced no instance",
                HOST_ROOT,
            )
        })
    }

    /// Register an instance the host constructed itself as the replacement
    /// of `old`; only the population step runs for it
    ///
    /// # Errors
    /// Returns [`MigrationError::IdentityCacheConflict`] if `old` is already
    /// mapped to another instance
    pub fn adopt(&mut self, old: ObjectId, new: ObjectId) -> MigrationResult<()> {
        self.cx.reset_path(TracePath::named(HOST_ROOT));
        self.cx.adopt(old, new)
    }

    /// Run the pass to completion
    ///
    /// Recoverable problems are logged and recorded in the report.
    ///
    /// # Errors
    /// Returns the first fatal error ([`MigrationError::IdentityCacheConflict`]);
    /// the heap is left partially migrated
    pub fn run(mut self) -> MigrationResult<PassReport> {
        let span = tracing::info_span!("migration_pass");
        let _guard = span.enter();

        self.seed_roots();
        while let Some(pending) = self.cx.next_task() {
            let outcome = match pending {
                PendingTask::Root(root) => self.run_root(&root),
                PendingTask::Task(task) => self.run_task(&task),
            };
            if let Err(err) = outcome {
                self.cx.report_error(&err);
                tracing::error!(error = %err, "migration pass aborted");
                return Err(err);
            }
        }

        self.cx.reset_path(TracePath::root());
        let registry = self.cx.registry();
        for strategy in registry.iter() {
            strategy.on_pass_complete(&mut self.cx);
        }

        let report = self.cx.finish();
        tracing::info!(
            objects = report.objects_migrated,
            in_place = report.edited_in_place,
            items = report.items_processed,
            warnings = report.warnings(),
            errors = report.errors(),
            "migration pass complete"
        );
        Ok(report)
    }

    /// Queue a Create task for every static slot holding a reference, and
    /// remap type handles held directly by statics
    fn seed_roots(&mut self) {
        let mut roots = Vec::new();
        let mut handles = Vec::new();
        for (slot, entry) in self.cx.heap().statics().iter().enumerate() {
            match entry.value {
                Value::Ref(old) => roots.push(RootTask {
                    slot,
                    name: entry.name.clone(),
                    old,
                    in_place: !entry.swappable,
                }),
                Value::Type(_) => handles.push((slot, entry.name.clone(), entry.value.clone(), entry.swappable)),
                _ => {}
            }
        }

        // Non-swappable roots claim their instances before anything else can
        roots.sort_by_key(|root| !root.in_place);
        for root in roots {
            self.cx.enqueue_root(root);
        }

        for (slot, name, value, swappable) in handles {
            self.cx.reset_path(TracePath::named(name));
            match self.cx.upgrade_value(&value) {
                Ok(remapped) if swappable => {
                    if let Err(err) = self.cx.heap_mut().set_static(slot, remapped) {
                        self.cx.report_error(&MigrationError::from(err));
                    }
                }
                Ok(remapped) if remapped != value => self.cx.warn(
                    DiagnosticKind::RootNotRepointed,
                    format!("static slot cannot be re-pointed; type handle {value} stays in place"),
                ),
                Ok(_) => {}
                Err(err) => self.cx.report_error(&err),
            }
        }
    }

    fn run_root(&mut self, root: &RootTask) -> MigrationResult<()> {
        self.cx.reset_path(TracePath::new(vec![PathSegment::Root(root.name.clone())]));
        self.cx.report_mut().create_tasks += 1;
        tracing::debug!(root = %root.name, old = %root.old, in_place = root.in_place, "create");

        let upgraded = match self.cx.upgrade_object(root.old, root.in_place) {
            Ok(value) => value,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                // Root keeps the old instance
                self.cx.report_error(&err);
                return Ok(());
            }
        };

        if !root.in_place {
            if let Err(err) = self.cx.heap_mut().set_static(root.slot, upgraded) {
                self.cx.report_error(&MigrationError::from(err));
            }
        } else if upgraded != Value::Ref(root.old) {
            self.cx.warn(
                DiagnosticKind::RootNotRepointed,
                format!(
                    "static slot cannot be re-pointed; {} was migrated to {upgraded} but the slot keeps the old instance",
                    root.old
                ),
            );
        }
        Ok(())
    }

    fn run_task(&mut self, task: &MigrationTask) -> MigrationResult<()> {
        self.cx.reset_path(task.path.clone());
        let strategy = match self.cx.strategy(task.strategy) {
            Ok(strategy) => strategy,
            Err(err) => return self.cx.recover(err),
        };
        tracing::debug!(
            phase = %task.phase,
            strategy = strategy.name(),
            old = %task.old,
            new = %task.new,
            "task"
        );

        let result = match task.phase {
            Phase::Create => Ok(0),
            Phase::Populate => {
                self.cx.report_mut().populate_tasks += 1;
                match self.retag_in_place(task) {
                    Ok(()) => strategy.populate(&mut self.cx, task),
                    Err(err) => Err(err),
                }
            }
            Phase::LatePopulate => {
                self.cx.report_mut().late_tasks += 1;
                strategy.late_populate(&mut self.cx, task)
            }
        };

        match result {
            Ok(items) => {
                self.cx.report_mut().items_processed += items;
                Ok(())
            }
            Err(err) => self.cx.recover(err),
        }
    }

    /// Switch an in-place instance to its new type before it is populated
    fn retag_in_place(&mut self, task: &MigrationTask) -> MigrationResult<()> {
        if !task.is_in_place() || self.cx.heap().type_of(task.new)? != task.old_type {
            return Ok(());
        }
        let new_type = self.cx.resolve_type(task.old_type)?;
        self.cx.heap_mut().retag(task.new, new_type)?;
        Ok(())
    }
}

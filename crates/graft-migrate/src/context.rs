//! Per-pass migration state
//!
//! [`MigrationContext`] is what strategies see: the heap, the type registry,
//! the identity cache, the path tracer and the task queues of one pass.

use crate::config::MigrationConfig;
use crate::diagnostics::{Diagnostic, DiagnosticSink, TracingSink};
use crate::error::{DiagnosticKind, MigrationError, MigrationResult};
use crate::identity::IdentityCache;
use crate::path::{PathSegment, PathTracer, TracePath};
use crate::registry::StrategyRegistry;
use crate::report::PassReport;
use crate::resolver::TypeResolver;
use crate::strategies::coerce;
use crate::strategy::{Allocation, MigrationStrategy, MigrationTask, Phase, StrategySlot};
use graft_heap::{Heap, ObjectId, TypeDescriptor, TypeId, TypeKind, TypeRegistry, Value};
use std::collections::{HashMap, HashSet, VecDeque};

/// Root slot waiting for its skeleton
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RootTask {
    pub(crate) slot: usize,
    pub(crate) name: String,
    pub(crate) old: ObjectId,
    pub(crate) in_place: bool,
}

/// Next unit of work, by queue priority
#[derive(Debug, Clone)]
pub(crate) enum PendingTask {
    Root(RootTask),
    Task(MigrationTask),
}

#[derive(Debug, Default)]
struct TaskQueues {
    create: VecDeque<RootTask>,
    populate: VecDeque<MigrationTask>,
    late: VecDeque<MigrationTask>,
}

/// State shared by every strategy during one pass
pub struct MigrationContext<'a> {
    heap: &'a mut Heap,
    types: &'a TypeRegistry,
    resolver: &'a dyn TypeResolver,
    registry: &'a StrategyRegistry,
    config: MigrationConfig,
    cache: IdentityCache,
    tracer: PathTracer,
    queues: TaskQueues,
    report: PassReport,
    sink: Option<Box<dyn DiagnosticSink + 'a>>,
    slots: HashMap<TypeId, StrategySlot>,
    failed: HashSet<ObjectId>,
    null_key_tolerant: HashSet<ObjectId>,
}

impl<'a> MigrationContext<'a> {
    pub(crate) fn new(
        heap: &'a mut Heap,
        types: &'a TypeRegistry,
        resolver: &'a dyn TypeResolver,
        registry: &'a StrategyRegistry,
    ) -> Self {
        Self {
            heap,
            types,
            resolver,
            registry,
            config: MigrationConfig::default(),
            cache: IdentityCache::new(),
            tracer: PathTracer::new(),
            queues: TaskQueues::default(),
            report: PassReport::default(),
            sink: None,
            slots: HashMap::new(),
            failed: HashSet::new(),
            null_key_tolerant: HashSet::new(),
        }
    }

    // Accessors

    /// The heap being migrated
    #[inline]
    #[must_use]
    pub fn heap(&self) -> &Heap {
        &*self.heap
    }

    /// Mutable heap access
    #[inline]
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut *self.heap
    }

    /// Type descriptors of every generation
    #[inline]
    #[must_use]
    pub fn types(&self) -> &'a TypeRegistry {
        self.types
    }

    /// Registered strategies
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &'a StrategyRegistry {
        self.registry
    }

    /// Pass configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Old → new mapping built so far
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &IdentityCache {
        &self.cache
    }

    /// Path at which the current item was reached
    #[inline]
    #[must_use]
    pub fn current_path(&self) -> &TracePath {
        self.tracer.current()
    }

    /// Current path, rendered
    #[must_use]
    pub fn path(&self) -> String {
        self.tracer.render()
    }

    pub(crate) fn set_config(&mut self, config: MigrationConfig) {
        self.config = config;
    }

    pub(crate) fn set_sink(&mut self, sink: Box<dyn DiagnosticSink + 'a>) {
        self.sink = Some(sink);
    }

    pub(crate) fn reset_path(&mut self, path: TracePath) {
        self.tracer.reset_to(path);
    }

    pub(crate) fn report_mut(&mut self) -> &mut PassReport {
        &mut self.report
    }

    /// Run `f` with `segment` pushed onto the access path
    pub fn traced<T>(&mut self, segment: PathSegment, f: impl FnOnce(&mut Self) -> T) -> T {
        self.tracer.push(segment);
        let out = f(self);
        self.tracer.pop();
        out
    }

    // Types

    /// Descriptor of a type
    ///
    /// # Errors
    /// Returns [`MigrationError::UnresolvedType`] if the type is not registered
    pub fn descriptor(&self, ty: TypeId) -> MigrationResult<&'a TypeDescriptor> {
        let types = self.types;
        types
            .get(ty)
            .map_err(|_| MigrationError::unresolved_type(ty.to_string(), "type is not registered", self.path()))
    }

    /// New-generation type that replaces `old`
    ///
    /// # Errors
    /// Returns [`MigrationError::UnresolvedType`] if the resolver has no successor
    pub fn resolve_type(&self, old: TypeId) -> MigrationResult<TypeId> {
        self.resolver.resolve(old).ok_or_else(|| {
            MigrationError::unresolved_type(
                self.types.name_of(old),
                "no successor type in the new generation",
                self.path(),
            )
        })
    }

    /// Keep `old` as its own replacement
    ///
    /// The type tag is switched when the instance is populated; until then
    /// the body is still read with the old layout.
    ///
    /// # Errors
    /// Returns an error if the type has no successor
    pub fn reuse_in_place(&mut self, old: ObjectId) -> MigrationResult<Allocation> {
        let old_ty = self.heap.type_of(old)?;
        self.resolve_type(old_ty)?;
        Ok(Allocation::InPlace(old))
    }

    /// Allocate an empty instance of `old`'s successor type
    ///
    /// `accepts` checks that the successor still has the shape the calling
    /// strategy knows how to fill.
    ///
    /// # Errors
    /// Returns [`MigrationError::UnresolvedType`] if there is no successor or
    /// it has another shape
    pub fn allocate_successor(
        &mut self,
        old: ObjectId,
        accepts: impl Fn(&TypeKind) -> bool,
    ) -> MigrationResult<Allocation> {
        let old_ty = self.heap.type_of(old)?;
        let new_ty = self.resolve_type(old_ty)?;
        let descriptor = self.descriptor(new_ty)?;
        if !accepts(&descriptor.kind) {
            return Err(MigrationError::unresolved_type(
                descriptor.name.clone(),
                format!(
                    "successor is a {} but {} is a {}",
                    descriptor.kind.label(),
                    self.types.name_of(old_ty),
                    self.descriptor(old_ty)?.kind.label()
                ),
                self.path(),
            ));
        }
        let new = self.heap.alloc_default(self.types, new_ty)?;
        Ok(Allocation::Fresh(new))
    }

    pub(crate) fn strategy_slot(&mut self, ty: TypeId) -> MigrationResult<StrategySlot> {
        if let Some(slot) = self.slots.get(&ty) {
            return Ok(*slot);
        }
        let descriptor = self.descriptor(ty)?;
        let slot = self.registry.resolve(descriptor).ok_or_else(|| {
            MigrationError::unresolved_type(
                descriptor.name.clone(),
                "no migration strategy handles this type",
                self.path(),
            )
        })?;
        self.slots.insert(ty, slot);
        Ok(slot)
    }

    // Upgrading references

    /// Upgrade a field, element, key or value
    ///
    /// Primitives are copied, references go through the identity cache and
    /// type handles are remapped through the resolver.
    ///
    /// # Errors
    /// Propagates failures of the referenced object's strategy
    pub fn upgrade_value(&mut self, value: &Value) -> MigrationResult<Value> {
        match value {
            Value::Ref(id) => self.upgrade_object(*id, false),
            Value::Type(ty) => Ok(Value::Type(self.resolve_type(*ty)?)),
            other => Ok(other.clone()),
        }
    }

    /// Upgrade a value, replacing it with null if that fails
    ///
    /// Recoverable failures are logged once per old instance. Fatal ones
    /// still propagate.
    ///
    /// # Errors
    /// Returns [`MigrationError::IdentityCacheConflict`] only
    pub fn upgrade_or_null(&mut self, value: &Value) -> MigrationResult<Value> {
        let target = value.as_object();
        if target.is_some_and(|id| self.failed.contains(&id)) {
            return Ok(Value::Null);
        }
        match self.upgrade_value(value) {
            Ok(upgraded) => Ok(upgraded),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                if let Some(id) = target {
                    self.failed.insert(id);
                }
                self.report_error(&err);
                Ok(Value::Null)
            }
        }
    }

    /// Replacement of `old`, created on first visit
    ///
    /// # Errors
    /// Returns an error if no strategy handles the type or allocation fails
    pub fn upgrade_object(&mut self, old: ObjectId, in_place: bool) -> MigrationResult<Value> {
        if let Some(new) = self.cache.get(old) {
            return Ok(Value::Ref(new));
        }
        let old_ty = self.heap.type_of(old)?;
        let slot = self.strategy_slot(old_ty)?;
        let strategy = self.strategy(slot)?;
        let allocation = strategy.create_empty(self, old, in_place)?;
        strategy.schedule_upgrade(self, old, allocation)?;
        Ok(Value::Ref(allocation.instance()))
    }

    /// Register `new` as the replacement the host already built for `old`
    ///
    /// # Errors
    /// Returns [`MigrationError::IdentityCacheConflict`] if `old` is mapped elsewhere
    pub fn adopt(&mut self, old: ObjectId, new: ObjectId) -> MigrationResult<()> {
        if self.cache.get(old) == Some(new) {
            return Ok(());
        }
        let old_ty = self.heap.type_of(old)?;
        let slot = self.strategy_slot(old_ty)?;
        let strategy = self.strategy(slot)?;
        strategy.schedule_upgrade(self, old, Allocation::Prebuilt(new))
    }

    pub(crate) fn strategy(&self, slot: StrategySlot) -> MigrationResult<&'a dyn MigrationStrategy> {
        let registry = self.registry;
        registry.get(slot).ok_or_else(|| {
            MigrationError::unresolved_type(
                format!("strategy #{}", slot.0),
                "strategy slot is not registered",
                self.path(),
            )
        })
    }

    // Bookkeeping used by `schedule_upgrade`

    /// Record `old → new` in the identity cache
    ///
    /// # Errors
    /// Returns [`MigrationError::IdentityCacheConflict`] if `old` already maps
    /// to another instance
    pub fn record_mapping(&mut self, old: ObjectId, new: ObjectId) -> MigrationResult<()> {
        self.cache
            .record(old, new)
            .map(|_| ())
            .map_err(|conflict| MigrationError::IdentityCacheConflict {
                conflict,
                path: self.tracer.render(),
            })
    }

    /// Stop the old instance's finalizer from running, if it has one
    ///
    /// # Errors
    /// Returns an error if `old` is dangling or its type unknown
    pub fn suppress_finalizer(&mut self, old: ObjectId) -> MigrationResult<()> {
        let ty = self.heap.type_of(old)?;
        if self.descriptor(ty)?.has_finalizer {
            self.heap.suppress_finalizer(old)?;
            self.report.finalizers_suppressed += 1;
        }
        Ok(())
    }

    /// Queue the populate step for `old → new` at the current path
    ///
    /// # Errors
    /// Returns an error if `old` is dangling or no strategy handles its type
    pub fn enqueue_populate(&mut self, old: ObjectId, new: ObjectId) -> MigrationResult<()> {
        let old_type = self.heap.type_of(old)?;
        let strategy = self.strategy_slot(old_type)?;
        self.queues.populate.push_back(MigrationTask {
            old,
            new,
            old_type,
            phase: Phase::Populate,
            strategy,
            path: self.tracer.current().clone(),
        });
        Ok(())
    }

    /// Queue a late-populate step for the container `task` is working on
    pub fn enqueue_late(&mut self, task: &MigrationTask) {
        self.queues.late.push_back(task.in_phase(Phase::LatePopulate));
    }

    pub(crate) fn enqueue_root(&mut self, root: RootTask) {
        self.queues.create.push_back(root);
    }

    pub(crate) fn next_task(&mut self) -> Option<PendingTask> {
        if let Some(root) = self.queues.create.pop_front() {
            return Some(PendingTask::Root(root));
        }
        self.queues
            .populate
            .pop_front()
            .or_else(|| self.queues.late.pop_front())
            .map(PendingTask::Task)
    }

    /// Number of tasks still queued
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queues.create.len() + self.queues.populate.len() + self.queues.late.len()
    }

    /// Count one sequence copied by the block-copy fast path
    pub fn note_block_copy(&mut self) {
        self.report.block_copies += 1;
    }

    // Null-key tolerance

    /// Accept null keys when refilling `container` (an old instance)
    pub fn tolerate_null_keys(&mut self, container: ObjectId) {
        self.null_key_tolerant.insert(container);
    }

    /// Whether `container` was declared to tolerate null keys
    #[must_use]
    pub fn tolerates_null_keys(&self, container: ObjectId) -> bool {
        self.null_key_tolerant.contains(&container)
    }

    /// Fit a migrated value to the declared type of the slot receiving it
    ///
    /// A value that does not fit is replaced by the type's default and
    /// logged as `kind`.
    pub fn fit(&mut self, ty: TypeId, value: Value, kind: DiagnosticKind, slot: &str) -> Value {
        let types = self.types;
        let label = value.to_string();
        match coerce(types, ty, value) {
            Some(value) => value,
            None => {
                self.warn(
                    kind,
                    format!(
                        "value {label} does not fit {slot} of type {}; default used",
                        types.name_of(ty)
                    ),
                );
                Value::default_for(types, ty)
            }
        }
    }

    // Diagnostics

    /// Log a warning at the current path
    pub fn warn(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        let diagnostic = Diagnostic::warning(kind, message, self.tracer.render());
        self.emit(diagnostic);
    }

    /// Log a migration error
    ///
    /// Errors raised without a path take the current one.
    pub fn report_error(&mut self, err: &MigrationError) {
        let mut diagnostic = Diagnostic::from(err);
        if diagnostic.path.is_empty() {
            diagnostic.path = self.tracer.render();
        }
        self.emit(diagnostic);
    }

    /// Log a recoverable error and carry on, or hand back a fatal one
    ///
    /// # Errors
    /// Returns `err` when it is fatal
    pub fn recover(&mut self, err: MigrationError) -> MigrationResult<()> {
        if err.is_fatal() {
            return Err(err);
        }
        self.report_error(&err);
        Ok(())
    }

    fn emit(&mut self, diagnostic: Diagnostic) {
        if self.config.forward_to_tracing {
            TracingSink.emit(&diagnostic);
        }
        if let Some(sink) = self.sink.as_mut() {
            sink.emit(&diagnostic);
        }
        self.report.diagnostics.push(diagnostic);
    }

    pub(crate) fn finish(self) -> PassReport {
        let mut report = self.report;
        report.objects_migrated = self.cache.len();
        report.edited_in_place = self.cache.in_place_count();
        report
    }
}

impl std::fmt::Debug for MigrationContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationContext")
            .field("config", &self.config)
            .field("migrated", &self.cache.len())
            .field("pending", &self.pending())
            .field("path", &self.tracer.render())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MemorySink;
    use crate::resolver::EvolutionMap;
    use graft_heap::FieldDef;

    fn fixture() -> (TypeRegistry, TypeId, TypeId, Heap) {
        let mut types = TypeRegistry::new();
        let old = types
            .register(TypeDescriptor::record("Node", 1, vec![FieldDef::new("n", TypeId::INT)]).with_finalizer())
            .unwrap();
        let new = types
            .register(TypeDescriptor::record("Node", 2, vec![FieldDef::new("n", TypeId::INT)]))
            .unwrap();
        (types, old, new, Heap::new())
    }

    #[test]
    fn upgrade_object_is_memoised() {
        let (types, old_ty, _, mut heap) = fixture();
        let a = heap.alloc_record(old_ty, vec![Value::Int(1)]);
        let resolver = EvolutionMap::by_name(&types, 1, 2);
        let registry = StrategyRegistry::with_defaults();
        let mut cx = MigrationContext::new(&mut heap, &types, &resolver, &registry);

        let first = cx.upgrade_object(a, false).unwrap();
        let second = cx.upgrade_object(a, false).unwrap();
        assert_eq!(first, second);
        assert_ne!(first, Value::Ref(a));
        assert_eq!(cx.cache().len(), 1);
        assert_eq!(cx.pending(), 1);
        assert!(cx.heap().get(a).unwrap().finalizer_suppressed);
    }

    #[test]
    fn primitives_are_copied_and_type_handles_remapped() {
        let (types, old_ty, new_ty, mut heap) = fixture();
        let resolver = EvolutionMap::by_name(&types, 1, 2);
        let registry = StrategyRegistry::with_defaults();
        let mut cx = MigrationContext::new(&mut heap, &types, &resolver, &registry);

        assert_eq!(cx.upgrade_value(&Value::Int(3)).unwrap(), Value::Int(3));
        assert_eq!(cx.upgrade_value(&Value::Type(old_ty)).unwrap(), Value::Type(new_ty));
        assert!(cx.cache().is_empty());
    }

    #[test]
    fn failures_become_null_and_log_once() {
        let (types, old_ty, _, mut heap) = fixture();
        let a = heap.alloc_record(old_ty, vec![Value::Int(1)]);
        let mut resolver = EvolutionMap::identity();
        resolver.retire(old_ty);
        let registry = StrategyRegistry::with_defaults();
        let sink = MemorySink::new();
        let mut cx = MigrationContext::new(&mut heap, &types, &resolver, &registry);
        cx.set_sink(Box::new(sink.clone()));

        assert_eq!(cx.upgrade_or_null(&Value::Ref(a)).unwrap(), Value::Null);
        assert_eq!(cx.upgrade_or_null(&Value::Ref(a)).unwrap(), Value::Null);
        assert_eq!(sink.warning_count(), 1);
        assert!(!cx.cache().contains(a));
    }

    #[test]
    fn conflicting_mapping_is_fatal() {
        let (types, _, _, mut heap) = fixture();
        let resolver = EvolutionMap::identity();
        let registry = StrategyRegistry::with_defaults();
        let mut cx = MigrationContext::new(&mut heap, &types, &resolver, &registry);

        cx.record_mapping(ObjectId(1), ObjectId(2)).unwrap();
        cx.record_mapping(ObjectId(1), ObjectId(2)).unwrap();
        let err = cx
            .traced(PathSegment::Root("S".into()), |cx| cx.record_mapping(ObjectId(1), ObjectId(3)))
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.path(), "S");
    }

    #[test]
    fn heap_errors_take_current_path() {
        let (types, _, _, mut heap) = fixture();
        let resolver = EvolutionMap::identity();
        let registry = StrategyRegistry::with_defaults();
        let sink = MemorySink::new();
        let mut cx = MigrationContext::new(&mut heap, &types, &resolver, &registry);
        cx.set_sink(Box::new(sink.clone()));

        cx.traced(PathSegment::Root("Game.state".into()), |cx| {
            let err = cx.upgrade_value(&Value::Ref(ObjectId(40))).unwrap_err();
            cx.recover(err).unwrap();
        });
        assert_eq!(sink.entries()[0].2, "Game.state");
    }
}

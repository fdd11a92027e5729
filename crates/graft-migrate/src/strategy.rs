//! Migration strategy contract and core types
//!
//! Provides the [`MigrationStrategy`] trait: the unit of pluggable behaviour
//! that knows how to migrate one family of types without the pass driver
//! knowing anything about their internals.

use crate::context::MigrationContext;
use crate::error::MigrationResult;
use crate::path::TracePath;
use graft_heap::{ObjectId, TypeDescriptor, TypeId};
use std::fmt::{self, Display, Formatter};

/// Migration strategy for one family of types
///
/// # Contract
/// - `create_empty` only allocates; it must not read referenced objects.
/// - `populate` runs later, from the driver's queue, after the skeletons of
///   everything reachable from the container can be created on demand.
/// - A strategy never records an instance for `old` other than the one it
///   returned from `create_empty`.
pub trait MigrationStrategy: Send + Sync + fmt::Debug {
    /// Strategy name (for logs and registry lookups)
    fn name(&self) -> &'static str;

    /// Whether this strategy migrates instances of `ty`
    fn should_handle(&self, ty: &TypeDescriptor) -> bool;

    /// Allocate a structurally compatible, empty replacement for `old`
    ///
    /// With `in_place` set the old instance must be reused, because the slot
    /// that holds it cannot be re-pointed.
    ///
    /// # Errors
    /// Returns an error if the type has no usable successor
    fn create_empty(
        &self,
        cx: &mut MigrationContext<'_>,
        old: ObjectId,
        in_place: bool,
    ) -> MigrationResult<Allocation>;

    /// Record the pair and schedule follow-up work
    ///
    /// The default records `old → new` in the identity cache, suppresses the
    /// old instance's finalizer when a distinct replacement exists (so a
    /// resource is not released twice) and queues [`Phase::Populate`].
    ///
    /// # Errors
    /// Returns [`crate::MigrationError::IdentityCacheConflict`] if `old` is
    /// already mapped to a different instance
    fn schedule_upgrade(
        &self,
        cx: &mut MigrationContext<'_>,
        old: ObjectId,
        allocation: Allocation,
    ) -> MigrationResult<()> {
        let new = allocation.instance();
        cx.record_mapping(old, new)?;
        if !allocation.is_in_place() {
            cx.suppress_finalizer(old)?;
        }
        cx.enqueue_populate(old, new)
    }

    /// Move contents from `task.old` into `task.new`
    ///
    /// Returns the number of items processed.
    ///
    /// # Errors
    /// Recoverable errors are logged by the driver; fatal ones abort the pass
    fn populate(&self, cx: &mut MigrationContext<'_>, task: &MigrationTask) -> MigrationResult<usize>;

    /// Deferred step run after every populate task has drained
    ///
    /// # Errors
    /// Same policy as [`populate`](Self::populate)
    fn late_populate(&self, cx: &mut MigrationContext<'_>, task: &MigrationTask) -> MigrationResult<usize> {
        let _ = (cx, task);
        Ok(0)
    }

    /// Called once before any instance is migrated
    ///
    /// Strategies drop caches derived from compiled type metadata here.
    fn on_pass_start(&self) {}

    /// Called once after every queue has drained
    fn on_pass_complete(&self, cx: &mut MigrationContext<'_>) {
        let _ = cx;
    }
}

/// Result of [`MigrationStrategy::create_empty`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allocation {
    /// A new instance was allocated
    Fresh(ObjectId),
    /// The old instance is reused and will be edited in place
    InPlace(ObjectId),
    /// The instance was constructed elsewhere; only population still runs
    Prebuilt(ObjectId),
}

impl Allocation {
    /// The instance that replaces the old one
    #[inline]
    #[must_use]
    pub fn instance(self) -> ObjectId {
        match self {
            Self::Fresh(id) | Self::InPlace(id) | Self::Prebuilt(id) => id,
        }
    }

    /// Whether the old instance is kept
    #[inline]
    #[must_use]
    pub fn is_in_place(self) -> bool {
        matches!(self, Self::InPlace(_))
    }
}

/// Queue a task belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Allocate skeletons for roots
    Create,
    /// Transfer contents
    Populate,
    /// Insert into hash/equality containers once keys are stable
    LatePopulate,
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Populate => write!(f, "populate"),
            Self::LatePopulate => write!(f, "late-populate"),
        }
    }
}

/// Position of a strategy in the [`crate::StrategyRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StrategySlot(pub usize);

/// Deferred unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationTask {
    /// Instance being migrated
    pub old: ObjectId,
    /// Its replacement (equal to `old` when edited in place)
    pub new: ObjectId,
    /// Type of `old` when the task was scheduled
    pub old_type: TypeId,
    /// Queue
    pub phase: Phase,
    /// Strategy that runs the task
    pub strategy: StrategySlot,
    /// Access path at which the instance was reached
    pub path: TracePath,
}

impl MigrationTask {
    /// Whether the container is edited in place
    #[inline]
    #[must_use]
    pub fn is_in_place(&self) -> bool {
        self.old == self.new
    }

    /// Same task, moved to another phase
    #[must_use]
    pub fn in_phase(&self, phase: Phase) -> Self {
        Self {
            phase,
            ..self.clone()
        }
    }
}

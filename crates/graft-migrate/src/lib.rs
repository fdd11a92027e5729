//! Graft Migrate
//!
//! Live object-graph migration for hot reload: after new type definitions
//! are loaded, every reachable instance of an old type is replaced by an
//! equivalent instance of its new type, preserving object identity, cycles
//! and container membership.
//!
//! # Core Concepts
//!
//! - [`MigrationPass`]: the driver; runs Create, Populate and Late-populate queues
//! - [`MigrationStrategy`]: pluggable per-type-family migration
//! - [`StrategyRegistry`]: ordered dispatcher, first matching strategy wins
//! - [`IdentityCache`]: old → new mapping that makes cycles and sharing safe
//! - [`PathTracer`]: breadcrumb carried by every diagnostic
//! - [`TypeResolver`]: the host's decision of which new type replaces an old one
//!
//! # Built-in strategies
//!
//! - [`SequenceStrategy`]: arrays, lists and stacks, with a block-copy fast path
//! - [`QueueStrategy`]: FIFO queues
//! - [`WeakRefStrategy`]: expiring references
//! - [`KeyedCollectionStrategy`]: maps, sets and side tables, refilled late
//! - [`TransientStrategy`]: compiled-metadata caches, cleared
//! - [`RecordStrategy`]: field-by-field fallback
//!
//! # Example
//!
//! ```rust,ignore
//! let report = MigrationPass::new(&mut heap, &types, &resolver, &registry)
//!     .with_config(MigrationConfig::from_toml_str(&config_text)?)
//!     .with_sink(MemorySink::new())
//!     .run()?;
//! println!("{}", report.summary());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod config;
mod context;
mod diagnostics;
mod error;
mod identity;
mod pass;
mod path;
mod registry;
mod report;
mod resolver;
mod strategies;
mod strategy;

// Re-exports
pub use config::{ConfigError, MigrationConfig};
pub use context::MigrationContext;
pub use diagnostics::{Diagnostic, DiagnosticSink, MemorySink, TracingSink};
pub use error::{DiagnosticKind, MigrationError, MigrationResult, Severity};
pub use identity::{CacheConflict, IdentityCache};
pub use pass::MigrationPass;
pub use path::{PathSegment, PathTracer, TracePath};
pub use registry::StrategyRegistry;
pub use report::PassReport;
pub use resolver::{EvolutionMap, TypeResolver};
pub use strategies::{
    FieldPlan, FieldSource, KeyedAdapter, KeyedCollectionStrategy, KeyedItem, MapAdapter,
    PlannedField, QueueStrategy, RecordStrategy, SequenceStrategy, SetAdapter,
    SideTableAdapter, TransientStrategy, WeakRefStrategy,
};
pub use strategy::{Allocation, MigrationStrategy, MigrationTask, Phase, StrategySlot};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

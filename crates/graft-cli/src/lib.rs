//! Graft CLI
//!
//! Runs a migration pass over a demo world and prints the pass report.
//! Configuration is read from a TOML file; logging goes through
//! `tracing-subscriber` and honours `RUST_LOG`.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod scenario;

pub use scenario::Scenario;

use anyhow::{Context, Result};
use graft_migrate::{MemorySink, MigrationConfig, PassReport};
use std::path::Path;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Load a pass configuration, or the defaults when no path is given
///
/// # Errors
/// Returns an error if the file cannot be read or is not a valid configuration
pub fn load_config(path: Option<&Path>) -> Result<MigrationConfig> {
    let Some(path) = path else {
        return Ok(MigrationConfig::default());
    };
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read config file {}", path.display()))?;
    MigrationConfig::from_toml_str(&source)
        .with_context(|| format!("cannot load config file {}", path.display()))
}

/// Default configuration rendered as TOML
///
/// # Errors
/// Returns an error if rendering fails
pub fn default_config_toml() -> Result<String> {
    Ok(MigrationConfig::default().to_toml_string()?)
}

/// Build the demo world with `players` players and migrate it
///
/// # Errors
/// Returns an error if the world cannot be built or the pass aborts
pub fn run_demo(players: usize, config: MigrationConfig) -> Result<PassReport> {
    let mut scenario = Scenario::world(players)?;
    tracing::info!(
        players,
        objects = scenario.heap.live_count(),
        "demo world built"
    );
    scenario.run(config, MemorySink::new())
}

/// Render a report for the terminal
#[must_use]
pub fn render_text(report: &PassReport) -> String {
    let mut out = String::new();
    out.push_str("Migration Report\n");
    out.push_str("================\n");
    out.push_str(&report.summary());
    out.push('\n');
    out.push_str(&format!(
        "tasks: {} create, {} populate, {} late\n",
        report.create_tasks, report.populate_tasks, report.late_tasks
    ));
    out.push_str(&format!("finalizers suppressed: {}\n", report.finalizers_suppressed));
    for diagnostic in &report.diagnostics {
        out.push_str(&format!(
            "  [{:?}] {}: {}\n",
            diagnostic.severity, diagnostic.path, diagnostic.message
        ));
    }
    out
}

/// Render a report as pretty-printed JSON
///
/// # Errors
/// Returns an error if serialization fails
pub fn render_json(report: &PassReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

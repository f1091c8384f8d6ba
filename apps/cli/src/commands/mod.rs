//! Command implementations for the Conduit CLI.

pub mod canary;
pub mod run;
pub mod select;
pub mod validate;

pub use canary::CanaryCommand;
pub use select::SelectArgs;

use anyhow::Context;
use conduit_orchestrator::TaskGraph;
use std::path::Path;

/// Reads a task graph from a JSON file.
pub fn load_graph(path: &Path) -> anyhow::Result<TaskGraph> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read task graph {}", path.display()))?;
    TaskGraph::from_json(&content)
        .with_context(|| format!("Failed to parse task graph {}", path.display()))
}

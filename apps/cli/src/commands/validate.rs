//! Task graph validation command.
//!
//! Reports structural problems, or the execution rounds of a valid graph.

use super::load_graph;
use colored::Colorize;
use conduit_orchestrator::{execution_levels, validate};
use serde::Serialize;
use std::path::Path;

/// Execute the validate command.
pub fn execute(path: &Path, json: bool) -> anyhow::Result<()> {
    let graph = load_graph(path)?;
    let report = validate(&graph);
    let levels = execution_levels(&graph).unwrap_or_default();

    if json {
        #[derive(Serialize)]
        struct JsonOutput<'a> {
            graph_id: &'a str,
            tasks: usize,
            valid: bool,
            errors: &'a [String],
            levels: &'a [Vec<String>],
        }

        let output = JsonOutput {
            graph_id: &graph.id,
            tasks: graph.len(),
            valid: report.valid,
            errors: &report.errors,
            levels: &levels,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", "conduit validate".bold().cyan());
        println!();
        println!("  Graph: {} ({} tasks)", graph.id.bold(), graph.len());
        println!();

        if report.valid {
            println!("  {} Graph is valid", "✓".green().bold());
            println!();
            for (round, tasks) in levels.iter().enumerate() {
                println!("  Round {}: {}", round + 1, tasks.join(", ").dimmed());
            }
        } else {
            println!("  {} Graph is invalid", "✗".red().bold());
            println!();
            for error in &report.errors {
                println!("    {}: {}", "Error".red(), error);
            }
        }
        println!();
    }

    // Exit with error code if the graph is invalid
    if !report.valid {
        std::process::exit(1);
    }

    Ok(())
}

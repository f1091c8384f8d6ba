//! Model selection command.

use crate::config::CliConfig;
use anyhow::Context;
use clap::Args;
use colored::Colorize;
use conduit_models::{ModelSelection, SelectionContext, SelectionStatistics};
use serde::Serialize;

/// Arguments for `conduit select`.
#[derive(Args, Debug)]
pub struct SelectArgs {
    /// Role to select a model for
    #[arg(long)]
    pub role: String,

    /// Required capability (repeatable)
    #[arg(long = "capability")]
    pub capabilities: Vec<String>,

    /// Requesting user
    #[arg(long)]
    pub user: Option<String>,

    /// Requesting project
    #[arg(long)]
    pub project: Option<String>,

    /// Mark the request as critical
    #[arg(long)]
    pub critical: bool,

    /// Number of selections to perform
    #[arg(long, default_value_t = 1)]
    pub repeat: u32,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

impl SelectArgs {
    fn context(&self) -> SelectionContext {
        let mut context = SelectionContext::for_role(self.role.clone());
        if !self.capabilities.is_empty() {
            context = context.with_capabilities(self.capabilities.iter().cloned());
        }
        if let Some(user) = &self.user {
            context = context.with_user(user.clone());
        }
        if let Some(project) = &self.project {
            context = context.with_project(project.clone());
        }
        if self.critical {
            context = context.critical();
        }
        context
    }
}

/// Execute the select command.
pub async fn execute(config: &CliConfig, args: SelectArgs) -> anyhow::Result<()> {
    let selector = config.models.build_selector().context("Failed to build model selector")?;
    let context = args.context();

    let mut selections = Vec::new();
    for _ in 0..args.repeat.max(1) {
        selections.push(selector.select_model(&context).await);
    }
    let statistics = selector.statistics();

    if args.json {
        #[derive(Serialize)]
        struct JsonOutput<'a> {
            request: &'a SelectionContext,
            selections: &'a [Option<ModelSelection>],
            statistics: SelectionStatistics,
        }

        let output = JsonOutput { request: &context, selections: &selections, statistics };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", "conduit select".bold().cyan());
    println!();

    match selections.first().and_then(Option::as_ref) {
        Some(selection) => print_selection(selection),
        None => {
            println!("  {} No model available for role '{}'", "✗".red().bold(), args.role);
            println!();
        }
    }

    if selections.len() > 1 {
        println!("{}", "Statistics:".bold());
        println!("  Selections: {}", statistics.total_selections);
        println!("  Stable:     {}", statistics.stable_selections);
        println!("  Canary:     {}", statistics.canary_selections);
        println!("  Canary %:   {:.1}", statistics.canary_percentage);
        println!();
    }

    if selections.iter().all(Option::is_none) {
        std::process::exit(1);
    }

    Ok(())
}

fn print_selection(selection: &ModelSelection) {
    println!("  {} {}", "✓".green().bold(), selection.model.id.bold());
    println!("    Provider:   {}", selection.model.provider);
    println!("    Reason:     {}", selection.reason);
    println!("    Confidence: {:.2}", selection.confidence);
    println!(
        "    Population: {:?}{}",
        selection.metadata.population,
        selection.metadata.bucket.map(|b| format!(" (bucket {})", b)).unwrap_or_default()
    );
    println!(
        "    Canary:     {}",
        if selection.metadata.canary_enabled { "eligible".green() } else { "off".dimmed() }
    );
    println!();
}

//! Canary rollout inspection commands.

use crate::config::CliConfig;
use clap::Subcommand;
use colored::Colorize;
use conduit_models::{CanaryConfig, bucket_for};
use serde::Serialize;

/// Canary subcommands.
#[derive(Subcommand, Debug)]
pub enum CanaryCommand {
    /// Show the configured rollout
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the deterministic bucket for a user and project
    Bucket {
        /// Requesting user
        #[arg(long)]
        user: Option<String>,

        /// Requesting project
        #[arg(long)]
        project: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Execute a canary subcommand.
pub fn execute(config: &CliConfig, command: CanaryCommand) -> anyhow::Result<()> {
    let canary = &config.models.canary;
    match command {
        CanaryCommand::Show { json } => show(canary, json),
        CanaryCommand::Bucket { user, project, json } => bucket(canary, user.as_deref(), project.as_deref(), json),
    }
}

fn show(canary: &CanaryConfig, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(canary)?);
        return Ok(());
    }

    println!("{}", "Canary rollout".bold().cyan());
    println!();
    let state = if canary.enabled { "enabled".green() } else { "disabled".dimmed() };
    println!("  State:               {}", state);
    println!("  Percentage:          {}", canary.percentage);
    println!("  Critical tasks only: {}", canary.critical_tasks_only);
    let excluded: Vec<&str> = canary.exclude_roles.iter().map(String::as_str).collect();
    println!(
        "  Excluded roles:      {}",
        if excluded.is_empty() { "none".to_string() } else { excluded.join(", ") }
    );
    println!();
    Ok(())
}

fn bucket(canary: &CanaryConfig, user: Option<&str>, project: Option<&str>, json: bool) -> anyhow::Result<()> {
    let bucket = bucket_for(user, project);
    let in_canary = canary.enabled && bucket.is_some_and(|b| f64::from(b) < canary.percentage);

    if json {
        #[derive(Serialize)]
        struct JsonOutput<'a> {
            user: Option<&'a str>,
            project: Option<&'a str>,
            bucket: Option<u8>,
            canary: bool,
        }

        let output = JsonOutput { user, project, bucket, canary: in_canary };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    match bucket {
        Some(value) => {
            println!("  Bucket:     {}", value.to_string().bold());
            let population = if in_canary { "canary".yellow() } else { "stable".green() };
            println!("  Population: {}", population);
        }
        None => {
            println!("  {} No user or project given; requests stay in the stable population", "ℹ".cyan());
        }
    }
    Ok(())
}

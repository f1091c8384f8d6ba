//! Task graph execution command.
//!
//! Submits a graph to an in-process executor and follows the job until it finishes.

use super::load_graph;
use crate::config::CliConfig;
use anyhow::Context;
use colored::Colorize;
use comfy_table::{Cell, Color as ComfyColor, Table};
use conduit_orchestrator::{
    Agent, AgentRegistry, EchoAgent, GraphExecutor, Job, JobStatus, RoutedAgent, StatusReport,
};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Longest output preview shown in the results table.
const PREVIEW_LEN: usize = 60;

/// Builds an executor with the built-in agents.
///
/// `echo` is always available; every role that has a configured model gets a routed
/// agent registered under the role name.
pub async fn build_executor(config: &CliConfig) -> anyhow::Result<GraphExecutor> {
    let agents = Arc::new(AgentRegistry::new());
    agents.register_agent(Arc::new(EchoAgent::new("echo", "Echoes inputs and dependency outputs"))).await;

    let selector = Arc::new(config.models.build_selector().context("Failed to build model selector")?);
    let roles: BTreeSet<&str> = config.models.models.iter().map(|m| m.role.as_str()).collect();
    for role in roles {
        let selector = Arc::clone(&selector);
        agents
            .register_factory(role, move || Arc::new(RoutedAgent::new(role, role, selector)) as Arc<dyn Agent>)
            .await;
    }

    Ok(GraphExecutor::new(agents).with_config(config.executor.clone()))
}

/// Execute the run command.
pub async fn execute(config: &CliConfig, path: &Path, json: bool, poll_ms: u64) -> anyhow::Result<()> {
    let graph = load_graph(path)?;
    let executor = build_executor(config).await?;

    let submission = executor.submit(graph).await.context("Failed to submit task graph")?;
    let job_id = submission.job_id.clone();

    if !json {
        println!("{}", "conduit run".bold().cyan());
        println!();
        println!("  Job: {}", job_id.bold());
        if submission.estimated_duration_ms > 0 {
            println!("  Estimated duration: {}", format_ms(submission.estimated_duration_ms).dimmed());
        }
        println!();
    }

    let poll = Duration::from_millis(poll_ms.max(1));
    let mut last_line = String::new();
    let job = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                let status = executor.cancel(&job_id).await?;
                if !json {
                    println!("  {} Cancellation requested (job is {})", "⚠".yellow(), status);
                }
            }
            () = tokio::time::sleep(poll) => {}
        }

        let report = executor.report(&job_id).await?;
        if !json {
            let line = progress_line(&report);
            if line != last_line {
                println!("  {}", line);
                last_line = line;
            }
        }
        if report.status.is_terminal() {
            break executor.status(&job_id).await?;
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&job)?);
    } else {
        print_summary(&job);
    }

    // Exit with error code unless every task completed
    if job.status != JobStatus::Completed {
        std::process::exit(1);
    }

    Ok(())
}

fn progress_line(report: &StatusReport) -> String {
    let mut line = format!(
        "[{}/{}] {}",
        report.progress.completed_count, report.progress.total_count, report.status
    );
    if let Some(task_id) = &report.progress.current_task_id {
        line.push_str(&format!(" (running {})", task_id));
    }
    if let Some(remaining) = report.estimated_remaining_ms {
        line.push_str(&format!(" ETA {}", format_ms(remaining)));
    }
    line
}

fn print_summary(job: &Job) {
    println!();
    match job.status {
        JobStatus::Completed => {
            println!("  {} Job completed in {}", "✓".green().bold(), format_ms(job.elapsed_ms(job.start_time)));
        }
        JobStatus::Cancelled => println!("  {} Job cancelled", "⚠".yellow().bold()),
        _ => {
            println!("  {} Job {}", "✗".red().bold(), job.status);
            if let Some(task_id) = &job.failed_task_id {
                println!("    Task:  {}", task_id);
            }
            if let Some(error) = &job.error {
                println!("    {}: {}", "Error".red(), error);
            }
        }
    }

    if let Some(results) = &job.results {
        let mut table = Table::new();
        table.set_header(vec!["Task", "Status", "Duration", "Outputs"]);
        for (task_id, outcome) in results {
            let preview = outcome.outputs.as_ref().map(ToString::to_string).unwrap_or_default();
            table.add_row(vec![
                Cell::new(task_id),
                Cell::new("ok").fg(ComfyColor::Green),
                Cell::new(format_ms(outcome.metrics.duration_ms)),
                Cell::new(truncate(&preview, PREVIEW_LEN)),
            ]);
        }
        println!();
        println!("{table}");
    }
    println!();
}

fn format_ms(ms: u64) -> String {
    if ms < 1000 { format!("{}ms", ms) } else { format!("{:.1}s", ms as f64 / 1000.0) }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_orchestrator::JobProgress;

    #[test]
    fn test_format_ms() {
        assert_eq!(format_ms(250), "250ms");
        assert_eq!(format_ms(1500), "1.5s");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
    }

    #[test]
    fn test_progress_line() {
        let report = StatusReport {
            job_id: "j".to_string(),
            status: JobStatus::Running,
            progress: JobProgress { completed_count: 1, total_count: 3, current_task_id: Some("b".to_string()) },
            elapsed_ms: 100,
            estimated_remaining_ms: Some(200),
            error: None,
            failed_task_id: None,
        };
        assert_eq!(progress_line(&report), "[1/3] running (running b) ETA 200ms");
    }

    #[tokio::test]
    async fn test_build_executor_registers_roles() {
        let config: CliConfig = toml::from_str(
            r#"
[[models]]
id = "p1"
name = "P1"
provider = "anthropic"
role = "planner"
"#,
        )
        .unwrap();

        let executor = build_executor(&config).await.unwrap();
        assert!(executor.agents().is_registered("echo").await);
        assert!(executor.agents().is_registered("planner").await);
        assert_eq!(executor.agents().count().await, 2);
    }
}

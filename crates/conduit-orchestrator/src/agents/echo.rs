//! Echo agent implementation.
//!
//! Returns its inputs and the outputs of its dependencies. Two inputs shape the run:
//! `delay_ms` sleeps before answering and `fail` (a boolean or a message) makes the
//! agent report a failure.

use async_trait::async_trait;
use conduit_abstraction::{Agent, AgentContext, AgentError, AgentMetrics, AgentResult};
use serde_json::{Value, json};
use std::time::{Duration, Instant};
use tracing::debug;

/// An agent that echoes what it was given.
#[derive(Debug, Clone)]
pub struct EchoAgent {
    /// The agent's unique ID.
    id: String,
    /// The agent's description.
    description: String,
}

impl EchoAgent {
    /// Creates a new `EchoAgent` with the given ID and description.
    ///
    /// # Arguments
    /// * `id` - The agent ID
    /// * `description` - The agent description
    #[must_use]
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self { id: id.into(), description: description.into() }
    }
}

#[async_trait]
impl Agent for EchoAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn execute(&self, context: &AgentContext) -> Result<AgentResult, AgentError> {
        let started = Instant::now();
        debug!(agent_id = %self.id, task_id = %context.task_id, "EchoAgent executing");

        if let Some(delay) = context.inputs.get("delay_ms") {
            let delay_ms = delay
                .as_u64()
                .ok_or_else(|| AgentError::InvalidInput("delay_ms must be a non-negative integer".to_string()))?;
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        match context.inputs.get("fail") {
            Some(Value::Bool(true)) => {
                return Ok(AgentResult::failure(format!("task '{}' failed on request", context.task_id)));
            }
            Some(Value::String(message)) => return Ok(AgentResult::failure(message.clone())),
            _ => {}
        }

        let outputs = json!({
            "agent": self.id,
            "task_id": context.task_id,
            "task_type": context.task_type,
            "inputs": context.inputs,
            "dependencies": context.dependency_outputs,
        });

        Ok(AgentResult::success(outputs).with_metrics(AgentMetrics {
            duration_ms: started.elapsed().as_millis() as u64,
            ..AgentMetrics::default()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_returns_inputs_and_dependencies() {
        let agent = EchoAgent::new("echo", "Echo agent");
        let mut context = AgentContext::new("job", "b", "analysis", json!({"query": "x"}));
        context.dependency_outputs.insert("a".to_string(), json!({"value": 1}));

        let result = agent.execute(&context).await.unwrap();
        assert!(result.success);
        let outputs = result.outputs.unwrap();
        assert_eq!(outputs["inputs"]["query"], "x");
        assert_eq!(outputs["dependencies"]["a"]["value"], 1);
        assert_eq!(outputs["task_type"], "analysis");
    }

    #[tokio::test]
    async fn test_echo_fail_input() {
        let agent = EchoAgent::new("echo", "Echo agent");

        let flagged = AgentContext::new("job", "a", "t", json!({"fail": true}));
        let result = agent.execute(&flagged).await.unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("'a'"));

        let message = AgentContext::new("job", "a", "t", json!({"fail": "disk full"}));
        let result = agent.execute(&message).await.unwrap();
        assert_eq!(result.error.as_deref(), Some("disk full"));
    }

    #[tokio::test]
    async fn test_echo_rejects_bad_delay() {
        let agent = EchoAgent::new("echo", "Echo agent");
        let context = AgentContext::new("job", "a", "t", json!({"delay_ms": "soon"}));
        assert!(matches!(agent.execute(&context).await, Err(AgentError::InvalidInput(_))));
    }
}

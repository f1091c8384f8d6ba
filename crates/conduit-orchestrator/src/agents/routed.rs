//! Model-routed agent implementation.
//!
//! Asks the model selector which backing model should serve its role for the calling
//! user and project, and reports the decision as its output.

use async_trait::async_trait;
use conduit_abstraction::{Agent, AgentContext, AgentError, AgentMetrics, AgentResult};
use conduit_models::{ModelSelector, SelectionContext};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// An agent that routes its role through a [`ModelSelector`].
#[derive(Debug, Clone)]
pub struct RoutedAgent {
    id: String,
    description: String,
    role: String,
    selector: Arc<ModelSelector>,
}

impl RoutedAgent {
    /// Creates a routed agent for `role`.
    #[must_use]
    pub fn new(id: impl Into<String>, role: impl Into<String>, selector: Arc<ModelSelector>) -> Self {
        let role = role.into();
        Self { id: id.into(), description: format!("Routes '{}' tasks to a selected model", role), role, selector }
    }

    /// Role this agent selects models for.
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Builds a selection request from the task's inputs and constraints.
    fn selection_context(&self, context: &AgentContext) -> Result<SelectionContext, AgentError> {
        let mut selection = SelectionContext::for_role(self.role.clone());

        if let Some(user_id) = context.lookup("user_id").and_then(Value::as_str) {
            selection = selection.with_user(user_id);
        }
        if let Some(project_id) = context.lookup("project_id").and_then(Value::as_str) {
            selection = selection.with_project(project_id);
        }
        if context.lookup("is_critical").and_then(Value::as_bool).unwrap_or(false) {
            selection = selection.critical();
        }
        if let Some(capabilities) = context.lookup("capabilities") {
            let list = capabilities
                .as_array()
                .and_then(|items| items.iter().map(|v| v.as_str().map(str::to_string)).collect::<Option<Vec<_>>>())
                .ok_or_else(|| AgentError::InvalidInput("capabilities must be a list of strings".to_string()))?;
            selection = selection.with_capabilities(list);
        }

        Ok(selection)
    }
}

#[async_trait]
impl Agent for RoutedAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn execute(&self, context: &AgentContext) -> Result<AgentResult, AgentError> {
        let started = Instant::now();
        let request = self.selection_context(context)?;

        let Some(selection) = self.selector.select_model(&request).await else {
            warn!(agent_id = %self.id, role = %self.role, task_id = %context.task_id, "No model available");
            return Err(AgentError::NoModelAvailable { role: self.role.clone() });
        };

        debug!(
            agent_id = %self.id,
            task_id = %context.task_id,
            model_id = %selection.model.id,
            reason = %selection.reason,
            "Model selected"
        );

        let outputs = json!({
            "role": self.role,
            "model_id": selection.model.id,
            "provider": selection.model.provider,
            "reason": selection.reason,
            "confidence": selection.confidence,
            "population": selection.metadata.population,
            "bucket": selection.metadata.bucket,
            "canary_enabled": selection.metadata.canary_enabled,
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
    use conduit_models::{CanaryConfig, InMemoryModelRegistry, ModelConfig, ModelStatus};

    fn selector(canary_percentage: f64) -> Arc<ModelSelector> {
        let registry = InMemoryModelRegistry::with_models([
            ModelConfig::new("planner-stable", "anthropic", "planner").with_capabilities(["text"]),
            ModelConfig::new("planner-canary", "anthropic", "planner")
                .with_capabilities(["text"])
                .with_status(ModelStatus::Canary),
        ]);
        let config = CanaryConfig { enabled: true, percentage: canary_percentage, ..CanaryConfig::default() };
        Arc::new(ModelSelector::new(Arc::new(registry)).with_canary_config(config).unwrap())
    }

    #[tokio::test]
    async fn test_routed_agent_reports_selection() {
        let agent = RoutedAgent::new("planner", "planner", selector(0.0));
        let mut context = AgentContext::new("job", "plan", "planning", json!({}));
        context.constraints = Some(json!({"user_id": "u1", "project_id": "p1"}));

        let result = agent.execute(&context).await.unwrap();
        let outputs = result.outputs.unwrap();
        assert_eq!(outputs["model_id"], "planner-stable");
        assert_eq!(outputs["population"], "stable");
        assert!(outputs["bucket"].is_u64());
    }

    #[tokio::test]
    async fn test_routed_agent_full_canary() {
        let agent = RoutedAgent::new("planner", "planner", selector(100.0));
        let context = AgentContext::new("job", "plan", "planning", json!({"user_id": "u1"}));

        let outputs = agent.execute(&context).await.unwrap().outputs.unwrap();
        assert_eq!(outputs["model_id"], "planner-canary");
        assert_eq!(outputs["reason"], "canary");
    }

    #[tokio::test]
    async fn test_routed_agent_without_model() {
        let agent = RoutedAgent::new("designer", "designer", selector(0.0));
        let context = AgentContext::new("job", "draw", "design", json!({}));

        let err = agent.execute(&context).await.unwrap_err();
        assert_eq!(err, AgentError::NoModelAvailable { role: "designer".to_string() });
    }

    #[tokio::test]
    async fn test_routed_agent_bad_capabilities() {
        let agent = RoutedAgent::new("planner", "planner", selector(0.0));
        let context = AgentContext::new("job", "plan", "planning", json!({"capabilities": "text"}));
        assert!(matches!(agent.execute(&context).await, Err(AgentError::InvalidInput(_))));
    }
}

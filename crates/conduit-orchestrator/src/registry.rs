//! Agent registry.
//!
//! Maps the `agent_ref` named by a task to the agent instance that executes it. Agents
//! are built once at registration time and shared across jobs.

use conduit_abstraction::Agent;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Metadata about a registered agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentMetadata {
    /// Key tasks use to reference the agent.
    pub agent_ref: String,
    /// The agent's own id.
    pub id: String,
    /// The agent's description.
    pub description: String,
}

/// Registry for managing agents.
pub struct AgentRegistry {
    /// Map of agent reference to agent instance.
    agents: Arc<RwLock<HashMap<String, Arc<dyn Agent>>>>,
}

impl fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agent_count", &self.agents.try_read().map(|a| a.len()).unwrap_or(0))
            .finish_non_exhaustive()
    }
}

impl AgentRegistry {
    /// Creates a new empty agent registry.
    #[must_use]
    pub fn new() -> Self {
        Self { agents: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Registers an agent under its own id.
    ///
    /// # Arguments
    /// * `agent` - The agent to register
    ///
    /// # Returns
    /// Returns `true` if the agent was newly registered, `false` if it replaced an existing agent.
    pub async fn register_agent(&self, agent: Arc<dyn Agent>) -> bool {
        let agent_ref = agent.id().to_string();
        self.register_as(agent_ref, agent).await
    }

    /// Registers an agent under an explicit reference.
    ///
    /// # Arguments
    /// * `agent_ref` - The key tasks will use
    /// * `agent` - The agent to register
    ///
    /// # Returns
    /// Returns `true` if the reference was new, `false` if it replaced an existing agent.
    pub async fn register_as(&self, agent_ref: impl Into<String>, agent: Arc<dyn Agent>) -> bool {
        let agent_ref = agent_ref.into();

        debug!(agent_ref = %agent_ref, agent_id = %agent.id(), "Registering agent");

        let mut agents = self.agents.write().await;
        let was_new = agents.insert(agent_ref.clone(), agent).is_none();

        if !was_new {
            warn!(agent_ref = %agent_ref, "Agent replaced in registry");
        }

        was_new
    }

    /// Builds an agent from `factory` and registers it under `agent_ref`.
    ///
    /// The factory runs exactly once, here; executions reuse the built instance.
    pub async fn register_factory<F>(&self, agent_ref: impl Into<String>, factory: F) -> bool
    where
        F: FnOnce() -> Arc<dyn Agent>,
    {
        self.register_as(agent_ref, factory()).await
    }

    /// Resolves an agent reference.
    ///
    /// # Arguments
    /// * `agent_ref` - The reference to look up
    ///
    /// # Returns
    /// Returns `Some(Arc<dyn Agent>)` if found, `None` otherwise.
    pub async fn get_agent(&self, agent_ref: &str) -> Option<Arc<dyn Agent>> {
        let agents = self.agents.read().await;
        agents.get(agent_ref).cloned()
    }

    /// Lists all registered agents, sorted by reference.
    pub async fn list_agents(&self) -> Vec<AgentMetadata> {
        let agents = self.agents.read().await;
        let mut list: Vec<AgentMetadata> = agents
            .iter()
            .map(|(agent_ref, agent)| AgentMetadata {
                agent_ref: agent_ref.clone(),
                id: agent.id().to_string(),
                description: agent.description().to_string(),
            })
            .collect();
        list.sort_by(|a, b| a.agent_ref.cmp(&b.agent_ref));
        list
    }

    /// Unregisters an agent.
    ///
    /// # Returns
    /// Returns `true` if the agent was found and removed, `false` otherwise.
    pub async fn unregister_agent(&self, agent_ref: &str) -> bool {
        debug!(agent_ref = %agent_ref, "Unregistering agent");

        let mut agents = self.agents.write().await;
        let removed = agents.remove(agent_ref).is_some();

        if !removed {
            warn!(agent_ref = %agent_ref, "Attempted to unregister non-existent agent");
        }

        removed
    }

    /// Checks if an agent reference is registered.
    pub async fn is_registered(&self, agent_ref: &str) -> bool {
        let agents = self.agents.read().await;
        agents.contains_key(agent_ref)
    }

    /// Returns the number of registered agents.
    pub async fn count(&self) -> usize {
        let agents = self.agents.read().await;
        agents.len()
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::EchoAgent;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_register_agent() {
        let registry = AgentRegistry::new();
        let was_new = registry.register_agent(Arc::new(EchoAgent::new("echo", "Echo"))).await;
        assert!(was_new);
        assert_eq!(registry.count().await, 1);
        assert!(registry.is_registered("echo").await);
    }

    #[tokio::test]
    async fn test_register_duplicate_agent() {
        let registry = AgentRegistry::new();
        assert!(registry.register_agent(Arc::new(EchoAgent::new("echo", "First"))).await);
        assert!(!registry.register_agent(Arc::new(EchoAgent::new("echo", "Second"))).await);
        assert_eq!(registry.count().await, 1);

        let agents = registry.list_agents().await;
        assert_eq!(agents[0].description, "Second");
    }

    #[tokio::test]
    async fn test_register_as_alias() {
        let registry = AgentRegistry::new();
        registry.register_as("analyst", Arc::new(EchoAgent::new("echo", "Echo"))).await;

        let agent = registry.get_agent("analyst").await.unwrap();
        assert_eq!(agent.id(), "echo");
        assert!(registry.get_agent("echo").await.is_none());
    }

    #[tokio::test]
    async fn test_factory_runs_once() {
        let registry = AgentRegistry::new();
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);

        registry
            .register_factory("worker", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Arc::new(EchoAgent::new("worker", "Worker")) as Arc<dyn Agent>
            })
            .await;

        for _ in 0..3 {
            assert!(registry.get_agent("worker").await.is_some());
        }
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_list_and_unregister() {
        let registry = AgentRegistry::new();
        registry.register_agent(Arc::new(EchoAgent::new("b", "B"))).await;
        registry.register_agent(Arc::new(EchoAgent::new("a", "A"))).await;

        let refs: Vec<String> = registry.list_agents().await.into_iter().map(|m| m.agent_ref).collect();
        assert_eq!(refs, vec!["a".to_string(), "b".to_string()]);

        assert!(registry.unregister_agent("a").await);
        assert!(!registry.unregister_agent("a").await);
        assert_eq!(registry.count().await, 1);
    }
}

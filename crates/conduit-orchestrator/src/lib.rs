//! Task graph orchestration for Conduit.
//!
//! A caller submits a [`TaskGraph`]; the [`validator`] checks it, the
//! [`GraphExecutor`] records a job in the [`JobStore`] and drives the graph round by
//! round through agents resolved from the [`AgentRegistry`].

pub mod agents;
pub mod error;
pub mod executor;
pub mod graph;
pub mod job;
pub mod progress;
pub mod registry;
pub mod store;
pub mod validator;

pub use agents::{EchoAgent, RoutedAgent};
pub use executor::{ExecutorConfig, GraphExecutor};
pub use graph::{Complexity, GraphMetadata, RiskLevel, Task, TaskGraph};
pub use job::{Job, JobProgress, JobStatus, JobTransition, StatusReport, Submission, TaskOutcome};
pub use progress::{ExecutionEvent, ProgressMetrics, ProgressReporter};
pub use registry::{AgentMetadata, AgentRegistry};
pub use store::{InMemoryJobStore, JobStore};
pub use validator::{ValidationReport, execution_levels, validate};

pub use error::{OrchestrationError, Result};

// Agent contract, re-exported for implementors.
pub use conduit_abstraction::{
    Agent, AgentContext, AgentError, AgentMetrics, AgentResult, Artifact,
};

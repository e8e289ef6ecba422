use crate::config::Config;
use crate::core::callbacks::EventHandler;
use crate::domain::WorkflowRunner;
use crate::utils::error::{QuerentError, Result};
use crate::utils::validation::validate_non_empty_string;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Lifecycle of a registered workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Registered,
    Starting,
    Running,
    Stopping,
    Stopped,
    Completed,
    Failed,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Registered => "registered",
            WorkflowStatus::Starting => "starting",
            WorkflowStatus::Running => "running",
            WorkflowStatus::Stopping => "stopping",
            WorkflowStatus::Stopped => "stopped",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
        }
    }

    pub fn can_transition_to(&self, next: WorkflowStatus) -> bool {
        use WorkflowStatus::*;
        matches!(
            (self, next),
            (Registered | Completed | Failed | Stopped, Starting)
                | (Starting, Running | Failed)
                | (Running, Completed | Failed | Stopping)
                | (Stopping, Stopped)
        )
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self,
            WorkflowStatus::Starting | WorkflowStatus::Running | WorkflowStatus::Stopping
        )
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered unit of work: identity, configuration and the runner that does it.
#[derive(Clone)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub config: Option<Config>,
    pub arguments: Vec<serde_json::Value>,
    pub runner: Arc<dyn WorkflowRunner>,
    /// Overrides the manager's event handler for this workflow's own events.
    pub event_handler: Option<EventHandler>,
}

impl Workflow {
    pub fn builder(id: impl Into<String>) -> WorkflowBuilder {
        WorkflowBuilder::new(id)
    }
}

impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("config", &self.config)
            .field("arguments", &self.arguments)
            .finish_non_exhaustive()
    }
}

pub struct WorkflowBuilder {
    id: String,
    name: Option<String>,
    config: Option<Config>,
    arguments: Vec<serde_json::Value>,
    runner: Option<Arc<dyn WorkflowRunner>>,
    event_handler: Option<EventHandler>,
}

impl WorkflowBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            config: None,
            arguments: Vec::new(),
            runner: None,
            event_handler: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn add_argument(mut self, argument: serde_json::Value) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn runner<R: WorkflowRunner + 'static>(mut self, runner: R) -> Self {
        self.runner = Some(Arc::new(runner));
        self
    }

    pub fn event_handler(mut self, handler: EventHandler) -> Self {
        self.event_handler = Some(handler);
        self
    }

    pub fn build(self) -> Result<Workflow> {
        validate_non_empty_string("workflow.id", &self.id)?;
        let runner = self.runner.ok_or_else(|| QuerentError::MissingConfigError {
            field: "runner".to_string(),
        })?;

        Ok(Workflow {
            name: self.name.unwrap_or_else(|| self.id.clone()),
            id: self.id,
            config: self.config,
            arguments: self.arguments,
            runner,
            event_handler: self.event_handler,
        })
    }
}

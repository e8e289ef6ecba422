use crate::config::Config;
use crate::core::callbacks::EventHandler;
use crate::core::channel::ChannelHandler;
use crate::core::context::WorkflowContext;
use crate::core::executor::WorkflowExecutor;
use crate::core::workflow::{Workflow, WorkflowStatus};
use crate::domain::{ChannelInterface, EventType, MessageState, MessageType};
use crate::utils::error::{QuerentError, Result};
use crate::utils::monitor::{SystemMonitor, SystemStats};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;

pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ManagerSettings {
    /// Upper bound on registered workflows; `None` means unbounded.
    pub max_workflows: Option<usize>,
    pub stop_timeout: Duration,
    pub event_handler: EventHandler,
    pub monitoring: bool,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            max_workflows: None,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            event_handler: EventHandler::default(),
            monitoring: false,
        }
    }
}

impl ManagerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_workflows: config.max_workflows(),
            stop_timeout: config.workflow.stop_timeout(),
            event_handler: EventHandler::default(),
            monitoring: config.monitoring_enabled(),
        }
    }

    pub fn with_event_handler(mut self, event_handler: EventHandler) -> Self {
        self.event_handler = event_handler;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowMetrics {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub system: Option<SystemStats>,
}

struct WorkflowEntry {
    workflow: Workflow,
    status: WorkflowStatus,
    channel: ChannelHandler,
    run_id: u64,
    handle: Option<JoinHandle<Result<serde_json::Value>>>,
    abort: Option<AbortHandle>,
}

type Transition = (WorkflowStatus, WorkflowStatus);

/// State shared between the manager and the tasks driving each run.
struct Registry {
    workflows: Mutex<HashMap<String, WorkflowEntry>>,
    events: EventHandler,
}

impl Registry {
    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, WorkflowEntry>>> {
        self.workflows
            .lock()
            .map_err(|_| QuerentError::internal("Workflow registry lock poisoned"))
    }

    fn emit_transition(&self, id: &str, (from, to): Transition) {
        tracing::info!("🔁 Workflow {}: {} -> {}", id, from, to);
        let payload = serde_json::json!({
            "workflow_id": id,
            "from": from.as_str(),
            "to": to.as_str(),
        });
        self.events.emit(EventType::StateTransition, payload.to_string());
    }

    fn set_status(&self, id: &str, next: WorkflowStatus) -> Result<()> {
        let from = {
            let mut workflows = self.lock()?;
            let entry = entry_mut(&mut workflows, id)?;
            move_to(id, entry, next)?
        };
        self.emit_transition(id, (from, next));
        Ok(())
    }

    /// Records how a run ended unless it was stopped or superseded in the meantime.
    fn finish_run(&self, id: &str, run_id: u64, outcome: &Result<serde_json::Value>) {
        let next = if outcome.is_ok() {
            WorkflowStatus::Completed
        } else {
            WorkflowStatus::Failed
        };

        let transition = match self.lock() {
            Ok(mut workflows) => match workflows.get_mut(id) {
                Some(entry)
                    if entry.run_id == run_id && entry.status == WorkflowStatus::Running =>
                {
                    entry.status = next;
                    Some((WorkflowStatus::Running, next))
                }
                _ => None,
            },
            Err(e) => {
                tracing::error!("❌ Unable to record end of workflow {}: {}", id, e);
                None
            }
        };

        if let Some(transition) = transition {
            if let Err(e) = outcome {
                tracing::error!("❌ Workflow {} failed: {}", id, e);
            }
            self.emit_transition(id, transition);
        }
    }
}

fn entry_mut<'a>(
    workflows: &'a mut HashMap<String, WorkflowEntry>,
    id: &str,
) -> Result<&'a mut WorkflowEntry> {
    workflows
        .get_mut(id)
        .ok_or_else(|| QuerentError::WorkflowNotFound { id: id.to_string() })
}

fn move_to(id: &str, entry: &mut WorkflowEntry, next: WorkflowStatus) -> Result<WorkflowStatus> {
    let from = entry.status;
    if !from.can_transition_to(next) {
        return Err(QuerentError::InvalidTransition {
            id: id.to_string(),
            from: from.to_string(),
            to: next.to_string(),
        });
    }
    entry.status = next;
    Ok(from)
}

/// Registers workflows and drives their lifecycle.
pub struct WorkflowManager {
    registry: Arc<Registry>,
    settings: ManagerSettings,
    executor: OnceCell<WorkflowExecutor>,
    monitor: SystemMonitor,
}

impl WorkflowManager {
    pub fn new() -> Self {
        Self::with_settings(ManagerSettings::default())
    }

    pub fn with_settings(settings: ManagerSettings) -> Self {
        Self {
            registry: Arc::new(Registry {
                workflows: Mutex::new(HashMap::new()),
                events: settings.event_handler.clone(),
            }),
            monitor: SystemMonitor::new(settings.monitoring),
            executor: OnceCell::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    fn executor(&self) -> Result<&WorkflowExecutor> {
        self.executor.get_or_try_init(WorkflowExecutor::new)
    }

    pub fn add_workflow(&self, workflow: Workflow) -> Result<()> {
        let mut workflows = self.registry.lock()?;
        if workflows.contains_key(&workflow.id) {
            return Err(QuerentError::DuplicateWorkflow {
                id: workflow.id.clone(),
            });
        }
        if let Some(limit) = self.settings.max_workflows {
            if workflows.len() >= limit {
                return Err(QuerentError::CapacityExceeded { limit });
            }
        }

        tracing::info!("➕ Registered workflow {} ({})", workflow.id, workflow.name);
        workflows.insert(
            workflow.id.clone(),
            WorkflowEntry {
                workflow,
                status: WorkflowStatus::Registered,
                channel: ChannelHandler::new(),
                run_id: 0,
                handle: None,
                abort: None,
            },
        );
        Ok(())
    }

    pub fn remove_workflow(&self, id: &str) -> Result<()> {
        let mut workflows = self.registry.lock()?;
        let entry = entry_mut(&mut workflows, id)?;
        if entry.status.is_active() {
            return Err(QuerentError::InvalidTransition {
                id: id.to_string(),
                from: entry.status.to_string(),
                to: "removed".to_string(),
            });
        }
        workflows.remove(id);
        tracing::info!("➖ Removed workflow {}", id);
        Ok(())
    }

    pub fn get_workflow(&self, id: &str) -> Option<Workflow> {
        let workflows = self.registry.lock().ok()?;
        workflows.get(id).map(|entry| entry.workflow.clone())
    }

    /// All registered workflows, ordered by id.
    pub fn get_workflows(&self) -> Vec<Workflow> {
        let Ok(workflows) = self.registry.lock() else {
            return Vec::new();
        };
        let mut all: Vec<Workflow> = workflows.values().map(|e| e.workflow.clone()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn status(&self, id: &str) -> Option<WorkflowStatus> {
        let workflows = self.registry.lock().ok()?;
        workflows.get(id).map(|entry| entry.status)
    }

    /// Launches a run in the background; use [`WorkflowManager::wait_workflow`] for its result.
    pub async fn start_workflow(&self, id: &str) -> Result<()> {
        let executor = self.executor()?.clone();

        let mut workflows = self.registry.lock()?;
        let entry = entry_mut(&mut workflows, id)?;
        let from = move_to(id, entry, WorkflowStatus::Starting)?;
        move_to(id, entry, WorkflowStatus::Running)?;
        entry.run_id += 1;
        // Fresh queues per run.
        entry.channel = ChannelHandler::new();

        // Emitted under the lock so they precede whatever the run reports.
        self.registry.emit_transition(id, (from, WorkflowStatus::Starting));
        self.registry.emit_transition(id, (WorkflowStatus::Starting, WorkflowStatus::Running));

        let workflow = entry.workflow.clone();
        let context = WorkflowContext::new(
            id,
            workflow.config.clone(),
            workflow.arguments.clone(),
            entry.channel.clone(),
            workflow
                .event_handler
                .clone()
                .unwrap_or_else(|| self.registry.events.clone()),
        );
        let (max_retries, retry_interval) = workflow
            .config
            .as_ref()
            .map(|c| (c.workflow.max_retries(), c.workflow.retry_interval()))
            .unwrap_or((0, Duration::ZERO));

        let registry = self.registry.clone();
        let workflow_id = id.to_string();
        let run_id = entry.run_id;
        let handle = tokio::spawn(async move {
            let outcome =
                run_attempts(&executor, &workflow, context, max_retries, retry_interval).await;
            registry.finish_run(&workflow_id, run_id, &outcome);
            outcome
        });

        // A stop can only observe `Running` once both handles are in place.
        entry.abort = Some(handle.abort_handle());
        entry.handle = Some(handle);
        Ok(())
    }

    /// Waits for the current run and returns what the runner produced.
    pub async fn wait_workflow(&self, id: &str) -> Result<serde_json::Value> {
        let handle = {
            let mut workflows = self.registry.lock()?;
            entry_mut(&mut workflows, id)?.handle.take()
        };
        let handle = handle.ok_or_else(|| QuerentError::NoActiveRun { id: id.to_string() })?;

        match handle.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => Err(QuerentError::WorkflowFailed {
                id: id.to_string(),
                message: "run was cancelled".to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Starts every workflow that can start and waits for all of them.
    pub async fn start_workflows(&self) -> Result<()> {
        let startable: Vec<String> = {
            let workflows = self.registry.lock()?;
            let mut ids: Vec<String> = workflows
                .iter()
                .filter(|(_, e)| e.status.can_transition_to(WorkflowStatus::Starting))
                .map(|(id, _)| id.clone())
                .collect();
            ids.sort();
            ids
        };

        self.monitor.log_phase("Workflows starting");
        let mut started = Vec::with_capacity(startable.len());
        let mut first_error = None;
        for id in startable {
            match self.start_workflow(&id).await {
                Ok(()) => started.push(id),
                Err(e) => {
                    tracing::error!("❌ Failed to start workflow {}: {}", id, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        for id in started {
            match self.wait_workflow(&id).await {
                Ok(_) => tracing::info!("✅ Workflow {} completed", id),
                Err(QuerentError::NoActiveRun { .. }) => {}
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        self.monitor.log_phase("Workflows finished");

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Stops a running workflow. Stopping anything that isn't running is a no-op.
    pub async fn stop_workflow(&self, id: &str) -> Result<()> {
        let (workflow, channel, handle, abort) = {
            let mut workflows = self.registry.lock()?;
            let entry = entry_mut(&mut workflows, id)?;
            if entry.status != WorkflowStatus::Running {
                tracing::debug!("Workflow {} is {}, nothing to stop", id, entry.status);
                return Ok(());
            }
            entry.status = WorkflowStatus::Stopping;
            (
                entry.workflow.clone(),
                entry.channel.clone(),
                entry.handle.take(),
                entry.abort.take(),
            )
        };
        self.registry
            .emit_transition(id, (WorkflowStatus::Running, WorkflowStatus::Stopping));

        if let Err(e) = channel.send_to_workflow(MessageState::new(MessageType::Stop, "")) {
            tracing::warn!("⚠️ Could not deliver stop message to {}: {}", id, e);
        }

        let stop_timeout = self.settings.stop_timeout;
        match tokio::time::timeout(stop_timeout, workflow.runner.stop()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("❌ Workflow {} stop hook failed: {}", id, e),
            Err(_) => tracing::warn!("⚠️ Workflow {} stop hook timed out", id),
        }

        match handle {
            Some(mut handle) => {
                if tokio::time::timeout(stop_timeout, &mut handle).await.is_err() {
                    tracing::warn!("⚠️ Workflow {} did not wind down, aborting", id);
                    handle.abort();
                }
            }
            // Somebody is waiting on the run; all we have left is the abort handle.
            None => {
                if let Some(abort) = abort {
                    let deadline = Instant::now() + stop_timeout;
                    while !abort.is_finished() && Instant::now() < deadline {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                    abort.abort();
                }
            }
        }

        self.registry.set_status(id, WorkflowStatus::Stopped)
    }

    pub async fn stop_workflows(&self) -> Result<()> {
        let running: Vec<String> = {
            let workflows = self.registry.lock()?;
            workflows
                .iter()
                .filter(|(_, e)| e.status == WorkflowStatus::Running)
                .map(|(id, _)| id.clone())
                .collect()
        };

        for id in running {
            self.stop_workflow(&id).await?;
        }
        Ok(())
    }

    pub async fn restart_workflow(&self, id: &str) -> Result<()> {
        self.stop_workflow(id).await?;
        self.start_workflow(id).await
    }

    /// Queues a message for the workflow's current run.
    pub fn send_message(&self, id: &str, message: MessageState) -> Result<()> {
        let channel = {
            let mut workflows = self.registry.lock()?;
            entry_mut(&mut workflows, id)?.channel.clone()
        };
        channel.send_to_workflow(message)
    }

    /// Takes the next message the workflow sent to the host, if any.
    pub fn receive_message(&self, id: &str) -> Result<Option<MessageState>> {
        let channel = {
            let mut workflows = self.registry.lock()?;
            entry_mut(&mut workflows, id)?.channel.clone()
        };
        Ok(channel.receive_in_host())
    }

    pub fn metrics(&self) -> WorkflowMetrics {
        let mut by_status = BTreeMap::new();
        let total = match self.registry.lock() {
            Ok(workflows) => {
                for entry in workflows.values() {
                    *by_status.entry(entry.status.to_string()).or_insert(0) += 1;
                }
                workflows.len()
            }
            Err(_) => 0,
        };

        WorkflowMetrics {
            total,
            by_status,
            system: self.monitor.snapshot(),
        }
    }
}

impl Default for WorkflowManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WorkflowManager {
    fn drop(&mut self) {
        if let Ok(mut workflows) = self.registry.lock() {
            for entry in workflows.values_mut() {
                if let Some(abort) = entry.abort.take() {
                    abort.abort();
                }
            }
        }
    }
}

async fn run_attempts(
    executor: &WorkflowExecutor,
    workflow: &Workflow,
    context: WorkflowContext,
    max_retries: u32,
    retry_interval: Duration,
) -> Result<serde_json::Value> {
    let mut attempt = 0;
    loop {
        let runner = workflow.runner.clone();
        let attempt_context = context.clone();
        match executor
            .call_async(async move { runner.start(attempt_context).await })
            .await
        {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_retries && e.is_retryable() => {
                attempt += 1;
                tracing::warn!(
                    "⚠️ Workflow {} attempt {} failed: {}; retrying in {:?}",
                    workflow.id,
                    attempt,
                    e,
                    retry_interval
                );
                tokio::time::sleep(retry_interval).await;
            }
            Err(e) => {
                return Err(QuerentError::WorkflowFailed {
                    id: workflow.id.clone(),
                    message: e.to_string(),
                })
            }
        }
    }
}

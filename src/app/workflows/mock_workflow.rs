use super::{START_DELAY, STOP_DELAY};
use crate::config::{Config, WorkflowConfig};
use crate::core::context::WorkflowContext;
use crate::domain::{EventType, MessageState, MessageType, WorkflowRunner};
use crate::utils::error::{QuerentError, Result};
use async_trait::async_trait;
use std::io::Write;
use std::time::Duration;

pub const START_HEADER: &str = "Mock workflow started with configuration:";
pub const STOPPED_LINE: &str = "Mock workflow stopped.";

/// Runner that pretends to work: waits, ticks and reports progress as events.
#[derive(Debug, Clone)]
pub struct MockWorkflow {
    start_delay: Duration,
    stop_delay: Duration,
    ticks: u32,
    tick_interval: Duration,
}

#[derive(Debug, Default)]
struct RunState {
    paused: bool,
    ticks_done: u32,
}

impl Default for MockWorkflow {
    fn default() -> Self {
        Self {
            start_delay: START_DELAY,
            stop_delay: STOP_DELAY,
            ticks: 0,
            tick_interval: Duration::from_millis(100),
        }
    }
}

impl MockWorkflow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `ticks`, `tick_ms`, `start_delay_ms` and `stop_delay_ms` from the workflow options.
    pub fn from_workflow_config(config: &WorkflowConfig) -> Result<Self> {
        let mut workflow = Self::default();
        if let Some(ticks) = option::<u32>(config, "ticks")? {
            workflow.ticks = ticks;
        }
        if let Some(ms) = option::<u64>(config, "tick_ms")? {
            workflow.tick_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = option::<u64>(config, "start_delay_ms")? {
            workflow.start_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = option::<u64>(config, "stop_delay_ms")? {
            workflow.stop_delay = Duration::from_millis(ms);
        }
        Ok(workflow)
    }

    pub fn with_delays(mut self, start_delay: Duration, stop_delay: Duration) -> Self {
        self.start_delay = start_delay;
        self.stop_delay = stop_delay;
        self
    }

    pub fn with_ticks(mut self, ticks: u32, tick_interval: Duration) -> Self {
        self.ticks = ticks;
        self.tick_interval = tick_interval;
        self
    }

    /// Waits `duration` while serving host messages. `false` means the run should end.
    async fn idle(
        &self,
        context: &WorkflowContext,
        duration: Duration,
        state: &mut RunState,
    ) -> bool {
        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);

        loop {
            if state.paused {
                match context.next_message().await {
                    Some(message) => {
                        if !self.on_message(context, message, state) {
                            return false;
                        }
                    }
                    None => return false,
                }
                continue;
            }

            tokio::select! {
                _ = &mut sleep => return true,
                message = context.next_message() => match message {
                    Some(message) => {
                        if !self.on_message(context, message, state) {
                            return false;
                        }
                    }
                    None => return false,
                },
            }
        }
    }

    fn on_message(
        &self,
        context: &WorkflowContext,
        message: MessageState,
        state: &mut RunState,
    ) -> bool {
        tracing::debug!("Workflow {} got {}", context.workflow_id, message.message_type);
        match message.message_type {
            MessageType::Stop => return false,
            MessageType::Pause => state.paused = true,
            MessageType::Resume => state.paused = false,
            MessageType::Status | MessageType::Metrics => {
                let payload = serde_json::json!({
                    "workflow_id": context.workflow_id,
                    "paused": state.paused,
                    "ticks_done": state.ticks_done,
                    "ticks_total": self.ticks,
                });
                let reply = MessageState::new(message.message_type, payload.to_string());
                if let Err(e) = context.reply(reply) {
                    tracing::warn!("⚠️ Could not answer {}: {}", message.message_type, e);
                }
            }
            MessageType::Start | MessageType::Restart => {}
        }
        true
    }
}

fn option<T: std::str::FromStr>(config: &WorkflowConfig, key: &str) -> Result<Option<T>> {
    match config.config.get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| QuerentError::InvalidConfigValueError {
                field: format!("workflow.config.{}", key),
                value: raw.clone(),
                reason: "Expected a non-negative integer".to_string(),
            }),
        None => Ok(None),
    }
}

#[async_trait]
impl WorkflowRunner for MockWorkflow {
    async fn start(&self, context: WorkflowContext) -> Result<serde_json::Value> {
        tracing::info!(
            "🚀 Mock workflow {} starting with {} argument(s)",
            context.workflow_id,
            context.arguments().len()
        );
        let mut state = RunState::default();

        if !self.idle(&context, self.start_delay, &mut state).await {
            tracing::info!("Mock workflow {} stopped during start-up", context.workflow_id);
            return Ok(serde_json::Value::Bool(true));
        }

        while state.ticks_done < self.ticks {
            if !self.idle(&context, self.tick_interval, &mut state).await {
                tracing::info!(
                    "Mock workflow {} stopped after {} tick(s)",
                    context.workflow_id,
                    state.ticks_done
                );
                return Ok(serde_json::Value::Bool(true));
            }
            state.ticks_done += 1;
            let payload = serde_json::json!({
                "workflow_id": context.workflow_id,
                "tick": state.ticks_done,
                "of": self.ticks,
            });
            context.emit(EventType::TokenProcessed, payload.to_string());
        }

        tracing::info!("✅ Mock workflow {} finished", context.workflow_id);
        Ok(serde_json::Value::Bool(true))
    }

    async fn stop(&self) -> Result<()> {
        tokio::time::sleep(self.stop_delay).await;
        Ok(())
    }
}

/// Mock that only announces itself on stdout.
#[derive(Debug, Clone, Default)]
pub struct MockQuerentWorkflow {
    config: Option<Config>,
}

impl MockQuerentWorkflow {
    pub fn new(config: Option<Config>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> Option<&Config> {
        self.config.as_ref()
    }

    pub fn start(&self) -> Result<()> {
        let stdout = std::io::stdout();
        self.write_start(&mut stdout.lock())?;
        Ok(())
    }

    pub fn stop(&self) -> Result<()> {
        let stdout = std::io::stdout();
        self.write_stop(&mut stdout.lock())?;
        Ok(())
    }

    pub fn write_start<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        writeln!(out, "{}", START_HEADER)?;
        match &self.config {
            Some(config) => writeln!(out, "{}", config),
            None => writeln!(out, "None"),
        }
    }

    pub fn write_stop<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        writeln!(out, "{}", STOPPED_LINE)
    }
}

#[async_trait]
impl WorkflowRunner for MockQuerentWorkflow {
    async fn start(&self, _context: WorkflowContext) -> Result<serde_json::Value> {
        MockQuerentWorkflow::start(self)?;
        Ok(serde_json::Value::Null)
    }

    async fn stop(&self) -> Result<()> {
        MockQuerentWorkflow::stop(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::callbacks::EventHandler;
    use crate::core::channel::ChannelHandler;
    use crate::domain::ChannelInterface;

    fn context_with_events(id: &str) -> (WorkflowContext, crate::core::callbacks::EventReceiver) {
        let (events, rx) = EventHandler::channel(64);
        let context = WorkflowContext::new(id, None, Vec::new(), ChannelHandler::new(), events);
        (context, rx)
    }

    fn quick() -> MockWorkflow {
        MockWorkflow::new().with_delays(Duration::ZERO, Duration::ZERO)
    }

    #[test]
    fn test_start_output_without_config() {
        let mut out = Vec::new();
        MockQuerentWorkflow::new(None).write_start(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Mock workflow started with configuration:\nNone\n"
        );
    }

    #[test]
    fn test_start_output_with_config() {
        let config = Config::default();
        let mut out = Vec::new();
        MockQuerentWorkflow::new(Some(config.clone()))
            .write_start(&mut out)
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(START_HEADER));
        assert_eq!(lines.next(), Some(config.to_string().as_str()));
    }

    #[test]
    fn test_stop_output_is_fixed() {
        let mut out = Vec::new();
        let workflow = MockQuerentWorkflow::default();
        workflow.write_stop(&mut out).unwrap();
        workflow.write_stop(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Mock workflow stopped.\nMock workflow stopped.\n"
        );
    }

    #[test]
    fn test_from_workflow_config() {
        let mut config = WorkflowConfig::default();
        config.config.insert("ticks".to_string(), "3".to_string());
        config.config.insert("tick_ms".to_string(), "10".to_string());
        let workflow = MockWorkflow::from_workflow_config(&config).unwrap();
        assert_eq!(workflow.ticks, 3);
        assert_eq!(workflow.tick_interval, Duration::from_millis(10));
        assert_eq!(workflow.start_delay, START_DELAY);

        config.config.insert("ticks".to_string(), "many".to_string());
        let err = MockWorkflow::from_workflow_config(&config).unwrap_err();
        assert!(matches!(
            err,
            QuerentError::InvalidConfigValueError { ref field, .. } if field == "workflow.config.ticks"
        ));
    }

    #[tokio::test]
    async fn test_ticks_emit_progress_events() {
        let (context, mut rx) = context_with_events("ticker");
        let runner = quick().with_ticks(3, Duration::from_millis(1));

        let output = runner.start(context).await.unwrap();
        assert_eq!(output, serde_json::Value::Bool(true));

        for expected in 1..=3 {
            let (event_type, state) = rx.recv().await.unwrap();
            assert_eq!(event_type, EventType::TokenProcessed);
            let payload: serde_json::Value = serde_json::from_str(&state.payload).unwrap();
            assert_eq!(payload["tick"], expected);
        }
    }

    #[tokio::test]
    async fn test_stop_message_ends_run_early() {
        let (context, mut rx) = context_with_events("stopper");
        let runner = quick().with_ticks(1_000, Duration::from_millis(5));
        context
            .channel()
            .send_to_workflow(MessageState::new(MessageType::Stop, ""))
            .unwrap();

        let output = tokio::time::timeout(Duration::from_secs(2), runner.start(context))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(output, serde_json::Value::Bool(true));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_status_is_answered_while_paused() {
        let (context, _rx) = context_with_events("pauser");
        let channel = context.channel().clone();
        let runner = quick().with_ticks(2, Duration::from_millis(1));

        channel
            .send_to_workflow(MessageState::new(MessageType::Pause, ""))
            .unwrap();
        channel
            .send_to_workflow(MessageState::new(MessageType::Status, ""))
            .unwrap();
        let run = tokio::spawn(async move { runner.start(context).await });

        let reply = tokio::time::timeout(Duration::from_secs(2), channel.next_for_host())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply.message_type, MessageType::Status);
        let status: serde_json::Value = serde_json::from_str(&reply.payload).unwrap();
        assert_eq!(status["paused"], true);
        assert!(!run.is_finished());

        channel
            .send_to_workflow(MessageState::new(MessageType::Resume, ""))
            .unwrap();
        let output = tokio::time::timeout(Duration::from_secs(2), run)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(output, serde_json::Value::Bool(true));
    }
}

use crate::config::Config;
use crate::core::callbacks::EventHandler;
use crate::core::channel::ChannelHandler;
use crate::domain::{ChannelInterface, EventType, MessageState};
use crate::utils::error::Result;

/// Everything a running workflow gets from the manager.
#[derive(Debug, Clone)]
pub struct WorkflowContext {
    pub workflow_id: String,
    config: Option<Config>,
    arguments: Vec<serde_json::Value>,
    channel: ChannelHandler,
    events: EventHandler,
}

impl WorkflowContext {
    pub fn new(
        workflow_id: impl Into<String>,
        config: Option<Config>,
        arguments: Vec<serde_json::Value>,
        channel: ChannelHandler,
        events: EventHandler,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            config,
            arguments,
            channel,
            events,
        }
    }

    pub fn config(&self) -> Option<&Config> {
        self.config.as_ref()
    }

    pub fn arguments(&self) -> &[serde_json::Value] {
        &self.arguments
    }

    pub fn channel(&self) -> &ChannelHandler {
        &self.channel
    }

    pub fn events(&self) -> &EventHandler {
        &self.events
    }

    pub fn emit(&self, event_type: EventType, payload: impl Into<String>) {
        self.events.emit(event_type, payload);
    }

    pub async fn next_message(&self) -> Option<MessageState> {
        self.channel.next_for_workflow().await
    }

    pub fn reply(&self, message: MessageState) -> Result<()> {
        self.channel.send_to_host(message)
    }
}

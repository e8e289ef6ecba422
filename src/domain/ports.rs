use crate::core::context::WorkflowContext;
use crate::domain::model::{EventState, EventType, MessageState};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Receives named events from a running workflow.
pub trait EventCallbackInterface: Send {
    fn handle_event(&mut self, event_type: EventType, event_data: EventState);
}

impl<F> EventCallbackInterface for F
where
    F: FnMut(EventType, EventState) + Send,
{
    fn handle_event(&mut self, event_type: EventType, event_data: EventState) {
        self(event_type, event_data)
    }
}

/// Two one-way queues between the host and a workflow. Receives never block.
pub trait ChannelInterface: Send + Sync {
    fn send_to_workflow(&self, message: MessageState) -> Result<()>;
    fn receive_in_workflow(&self) -> Option<MessageState>;
    fn send_to_host(&self, message: MessageState) -> Result<()>;
    fn receive_in_host(&self) -> Option<MessageState>;
}

#[async_trait]
pub trait WorkflowRunner: Send + Sync {
    /// Runs the workflow to completion and returns its output.
    async fn start(&self, context: WorkflowContext) -> Result<serde_json::Value>;

    async fn stop(&self) -> Result<()>;
}

use crate::domain::{ChannelInterface, MessageState};
use crate::utils::error::{QuerentError, Result};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

struct Queue {
    sender: mpsc::UnboundedSender<MessageState>,
    receiver: Mutex<mpsc::UnboundedReceiver<MessageState>>,
}

impl Queue {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
        }
    }

    fn send(&self, message: MessageState) -> Result<()> {
        self.sender
            .send(message)
            .map_err(|e| QuerentError::ChannelClosed(e.to_string()))
    }

    /// Empty queue or a receiver already held by an awaiting task both read as `None`.
    fn try_receive(&self) -> Option<MessageState> {
        let mut receiver = self.receiver.try_lock().ok()?;
        receiver.try_recv().ok()
    }

    async fn receive(&self) -> Option<MessageState> {
        self.receiver.lock().await.recv().await
    }
}

/// Host/workflow message channel. Clones share the same queues.
#[derive(Clone)]
pub struct ChannelHandler {
    to_workflow: Arc<Queue>,
    to_host: Arc<Queue>,
}

impl ChannelHandler {
    pub fn new() -> Self {
        Self {
            to_workflow: Arc::new(Queue::new()),
            to_host: Arc::new(Queue::new()),
        }
    }

    /// Waits for the next message addressed to the workflow.
    pub async fn next_for_workflow(&self) -> Option<MessageState> {
        self.to_workflow.receive().await
    }

    /// Waits for the next message addressed to the host.
    pub async fn next_for_host(&self) -> Option<MessageState> {
        self.to_host.receive().await
    }
}

impl Default for ChannelHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChannelHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelHandler").finish_non_exhaustive()
    }
}

impl ChannelInterface for ChannelHandler {
    fn send_to_workflow(&self, message: MessageState) -> Result<()> {
        tracing::trace!("host -> workflow: {}", message.message_type);
        self.to_workflow.send(message)
    }

    fn receive_in_workflow(&self) -> Option<MessageState> {
        self.to_workflow.try_receive()
    }

    fn send_to_host(&self, message: MessageState) -> Result<()> {
        tracing::trace!("workflow -> host: {}", message.message_type);
        self.to_host.send(message)
    }

    fn receive_in_host(&self) -> Option<MessageState> {
        self.to_host.try_receive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MessageType;
    use std::time::Duration;

    #[test]
    fn test_empty_channel_returns_none() {
        let channel = ChannelHandler::new();
        assert!(channel.receive_in_workflow().is_none());
        assert!(channel.receive_in_host().is_none());
    }

    #[test]
    fn test_directions_are_independent_and_fifo() {
        let channel = ChannelHandler::new();
        channel
            .send_to_workflow(MessageState::new(MessageType::Pause, "1"))
            .unwrap();
        channel
            .send_to_workflow(MessageState::new(MessageType::Resume, "2"))
            .unwrap();
        channel
            .send_to_host(MessageState::new(MessageType::Status, "running"))
            .unwrap();

        let peer = channel.clone();
        assert_eq!(
            peer.receive_in_workflow().unwrap().message_type,
            MessageType::Pause
        );
        assert_eq!(
            channel.receive_in_workflow().unwrap().message_type,
            MessageType::Resume
        );
        assert!(channel.receive_in_workflow().is_none());
        assert_eq!(peer.receive_in_host().unwrap().payload, "running");
    }

    #[tokio::test]
    async fn test_next_for_workflow_waits_for_message() {
        let channel = ChannelHandler::new();
        let sender = channel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            sender
                .send_to_workflow(MessageState::new(MessageType::Stop, ""))
                .unwrap();
        });

        let message = tokio::time::timeout(Duration::from_secs(2), channel.next_for_workflow())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.message_type, MessageType::Stop);
    }
}

use crate::domain::{EventCallbackInterface, EventState, EventType};
use crate::utils::error::{QuerentError, Result};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub type EventSender = mpsc::Sender<(EventType, EventState)>;
pub type EventReceiver = mpsc::Receiver<(EventType, EventState)>;

/// Cloneable sink that forwards events into an mpsc channel.
///
/// Without a sender the handler only logs what it sees.
#[derive(Clone, Debug, Default)]
pub struct EventHandler {
    event_sender: Option<EventSender>,
}

impl EventHandler {
    pub fn new(event_sender: Option<EventSender>) -> Self {
        Self { event_sender }
    }

    /// Creates a handler together with the receiving end of its channel.
    pub fn channel(buffer: usize) -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self::new(Some(tx)), rx)
    }

    pub fn is_connected(&self) -> bool {
        self.event_sender
            .as_ref()
            .map(|sender| !sender.is_closed())
            .unwrap_or(false)
    }

    /// Stamps and forwards an event without waiting for channel capacity.
    pub fn emit(&self, event_type: EventType, payload: impl Into<String>) {
        let state = EventState::new(event_type, payload);
        self.forward(event_type, state);
    }

    /// Forwards an event, waiting until the channel has room.
    pub async fn send_event(&self, event_type: EventType, event_data: EventState) -> Result<()> {
        match &self.event_sender {
            Some(sender) => sender
                .send((event_type, event_data))
                .await
                .map_err(|_| QuerentError::ChannelClosed("event receiver dropped".to_string())),
            None => {
                tracing::debug!("Event {} (no subscriber): {}", event_type, event_data.payload);
                Ok(())
            }
        }
    }

    fn forward(&self, event_type: EventType, event_data: EventState) {
        match &self.event_sender {
            Some(sender) => {
                if let Err(e) = sender.try_send((event_type, event_data)) {
                    tracing::warn!("⚠️ Dropping {} event: {}", event_type, e);
                }
            }
            None => {
                tracing::debug!("Event {} (no subscriber): {}", event_type, event_data.payload);
            }
        }
    }
}

impl EventCallbackInterface for EventHandler {
    fn handle_event(&mut self, event_type: EventType, event_data: EventState) {
        self.forward(event_type, event_data);
    }
}

/// Routes events to the callbacks registered for their type.
#[derive(Default)]
pub struct EventDispatcher {
    by_type: HashMap<EventType, Vec<Box<dyn EventCallbackInterface>>>,
    catch_all: Vec<Box<dyn EventCallbackInterface>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<C>(&mut self, event_type: EventType, callback: C) -> &mut Self
    where
        C: EventCallbackInterface + 'static,
    {
        self.by_type
            .entry(event_type)
            .or_default()
            .push(Box::new(callback));
        self
    }

    /// Registers a callback that sees every event.
    pub fn register_all<C>(&mut self, callback: C) -> &mut Self
    where
        C: EventCallbackInterface + 'static,
    {
        self.catch_all.push(Box::new(callback));
        self
    }

    /// Runs every matching callback and returns how many ran.
    pub fn dispatch(&mut self, event_type: EventType, event_data: EventState) -> usize {
        let mut invoked = 0;

        if let Some(callbacks) = self.by_type.get_mut(&event_type) {
            for callback in callbacks.iter_mut() {
                callback.handle_event(event_type, event_data.clone());
                invoked += 1;
            }
        }
        for callback in self.catch_all.iter_mut() {
            callback.handle_event(event_type, event_data.clone());
            invoked += 1;
        }

        if invoked == 0 {
            tracing::trace!("No callback registered for {}", event_type);
        }
        invoked
    }

    /// Drains `receiver` until every sender is gone; resolves to the number of events seen.
    pub fn spawn(mut self, mut receiver: EventReceiver) -> JoinHandle<usize> {
        tokio::spawn(async move {
            let mut seen = 0;
            while let Some((event_type, event_data)) = receiver.recv().await {
                self.dispatch(event_type, event_data);
                seen += 1;
            }
            tracing::debug!("Event stream closed after {} events", seen);
            seen
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_event_handler_forwards_to_channel() {
        let (mut handler, mut rx) = EventHandler::channel(4);
        handler.handle_event(
            EventType::ChatCompleted,
            EventState::new(EventType::ChatCompleted, "hello"),
        );
        handler.emit(EventType::TokenProcessed, "token");

        let (first, state) = rx.recv().await.unwrap();
        assert_eq!(first, EventType::ChatCompleted);
        assert_eq!(state.payload, "hello");
        let (second, _) = rx.recv().await.unwrap();
        assert_eq!(second, EventType::TokenProcessed);
    }

    #[tokio::test]
    async fn test_event_handler_drops_when_full() {
        let (handler, mut rx) = EventHandler::channel(1);
        handler.emit(EventType::TokenProcessed, "kept");
        handler.emit(EventType::TokenProcessed, "dropped");

        assert_eq!(rx.recv().await.unwrap().1.payload, "kept");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disconnected_handler_is_silent() {
        let handler = EventHandler::default();
        assert!(!handler.is_connected());
        handler.emit(EventType::ChatCompleted, "nobody listens");
        assert!(handler
            .send_event(
                EventType::ChatCompleted,
                EventState::new(EventType::ChatCompleted, "")
            )
            .await
            .is_ok());
    }

    #[test]
    fn test_dispatcher_routes_by_type() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new();

        let chat = seen.clone();
        dispatcher.register(EventType::ChatCompleted, move |_: EventType, state: EventState| {
            chat.lock().unwrap().push(format!("chat:{}", state.payload));
        });
        let all = seen.clone();
        dispatcher.register_all(move |event_type: EventType, _: EventState| {
            all.lock().unwrap().push(format!("all:{}", event_type));
        });

        let ran = dispatcher.dispatch(
            EventType::ChatCompleted,
            EventState::new(EventType::ChatCompleted, "hi"),
        );
        assert_eq!(ran, 2);
        let ran = dispatcher.dispatch(
            EventType::RdfGraphUpdate,
            EventState::new(EventType::RdfGraphUpdate, ""),
        );
        assert_eq!(ran, 1);

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec!["chat:hi", "all:chat_completed", "all:rdf_graph_update"]
        );
    }

    #[tokio::test]
    async fn test_spawned_dispatcher_drains_until_closed() {
        let (handler, rx) = EventHandler::channel(8);
        let counter = Arc::new(Mutex::new(0));
        let mut dispatcher = EventDispatcher::new();
        let seen = counter.clone();
        dispatcher.register(EventType::TokenProcessed, move |_: EventType, _: EventState| {
            *seen.lock().unwrap() += 1;
        });
        let task = dispatcher.spawn(rx);

        for i in 0..3 {
            handler.emit(EventType::TokenProcessed, i.to_string());
        }
        handler.emit(EventType::ChatCompleted, "unrouted");
        drop(handler);

        assert_eq!(task.await.unwrap(), 4);
        assert_eq!(*counter.lock().unwrap(), 3);
    }
}

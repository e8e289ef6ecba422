use crate::utils::error::{QuerentError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kinds of events a running workflow reports back to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    StateTransition,
    RdfGraphUpdate,
    TokenProcessed,
    ChatCompleted,
    ContextualGraphUpdated,
    SemanticGraphUpdated,
}

impl EventType {
    pub const ALL: [EventType; 6] = [
        EventType::StateTransition,
        EventType::RdfGraphUpdate,
        EventType::TokenProcessed,
        EventType::ChatCompleted,
        EventType::ContextualGraphUpdated,
        EventType::SemanticGraphUpdated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::StateTransition => "state_transition",
            EventType::RdfGraphUpdate => "rdf_graph_update",
            EventType::TokenProcessed => "token_processed",
            EventType::ChatCompleted => "chat_completed",
            EventType::ContextualGraphUpdated => "contextual_graph_updated",
            EventType::SemanticGraphUpdated => "semantic_graph_updated",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = QuerentError;

    fn from_str(label: &str) -> Result<Self> {
        EventType::ALL
            .into_iter()
            .find(|event_type| event_type.as_str() == label)
            .ok_or_else(|| QuerentError::InvalidEventType {
                label: label.to_string(),
            })
    }
}

/// A single event: what happened, when (unix seconds) and its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventState {
    pub event_type: EventType,
    pub timestamp: f64,
    pub payload: String,
}

impl EventState {
    pub fn new(event_type: EventType, payload: impl Into<String>) -> Self {
        Self {
            event_type,
            timestamp: unix_timestamp(),
            payload: payload.into(),
        }
    }

    /// Reads an event out of a mapping with `event_type`, `timestamp` and `payload` keys.
    pub fn from_mapping(value: &serde_json::Value) -> Result<Self> {
        let event_type = required_str(value, "event_type")?.parse()?;
        let timestamp = required_timestamp(value)?;
        let payload = required_str(value, "payload")?.to_string();

        Ok(Self {
            event_type,
            timestamp,
            payload,
        })
    }
}

/// Control messages exchanged between the host and a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Start,
    Stop,
    Pause,
    Resume,
    Restart,
    Status,
    Metrics,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Start => "start",
            MessageType::Stop => "stop",
            MessageType::Pause => "pause",
            MessageType::Resume => "resume",
            MessageType::Restart => "restart",
            MessageType::Status => "status",
            MessageType::Metrics => "metrics",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = QuerentError;

    fn from_str(label: &str) -> Result<Self> {
        match label {
            "start" => Ok(MessageType::Start),
            "stop" => Ok(MessageType::Stop),
            "pause" => Ok(MessageType::Pause),
            "resume" => Ok(MessageType::Resume),
            "restart" => Ok(MessageType::Restart),
            "status" => Ok(MessageType::Status),
            "metrics" => Ok(MessageType::Metrics),
            _ => Err(QuerentError::InvalidMessageType {
                label: label.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageState {
    pub message_type: MessageType,
    pub timestamp: f64,
    pub payload: String,
}

impl MessageState {
    pub fn new(message_type: MessageType, payload: impl Into<String>) -> Self {
        Self {
            message_type,
            timestamp: unix_timestamp(),
            payload: payload.into(),
        }
    }

    pub fn from_mapping(value: &serde_json::Value) -> Result<Self> {
        let message_type = required_str(value, "message_type")?.parse()?;
        let timestamp = required_timestamp(value)?;
        let payload = required_str(value, "payload")?.to_string();

        Ok(Self {
            message_type,
            timestamp,
            payload,
        })
    }
}

fn unix_timestamp() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

fn required<'a>(value: &'a serde_json::Value, field: &str) -> Result<&'a serde_json::Value> {
    value
        .get(field)
        .ok_or_else(|| QuerentError::MissingEventField {
            field: field.to_string(),
        })
}

fn required_str<'a>(value: &'a serde_json::Value, field: &str) -> Result<&'a str> {
    required(value, field)?
        .as_str()
        .ok_or_else(|| QuerentError::InvalidConfigValueError {
            field: field.to_string(),
            value: value[field].to_string(),
            reason: "Expected a string".to_string(),
        })
}

fn required_timestamp(value: &serde_json::Value) -> Result<f64> {
    let raw = required(value, "timestamp")?;
    raw.as_f64()
        .ok_or_else(|| QuerentError::InvalidConfigValueError {
            field: "timestamp".to_string(),
            value: raw.to_string(),
            reason: "Expected a number".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_type_labels() {
        for event_type in EventType::ALL {
            assert_eq!(event_type.as_str().parse::<EventType>().unwrap(), event_type);
        }
        assert_eq!(
            "state_transition".parse::<EventType>().unwrap(),
            EventType::StateTransition
        );
        assert!(matches!(
            "graph_exploded".parse::<EventType>(),
            Err(QuerentError::InvalidEventType { .. })
        ));
    }

    #[test]
    fn test_event_type_serde_uses_snake_case() {
        let encoded = serde_json::to_string(&EventType::ChatCompleted).unwrap();
        assert_eq!(encoded, "\"chat_completed\"");
    }

    #[test]
    fn test_event_state_from_mapping() {
        let state = EventState::from_mapping(&json!({
            "event_type": "state_transition",
            "timestamp": 123.45,
            "payload": "TestPayload"
        }))
        .unwrap();

        assert_eq!(state.event_type, EventType::StateTransition);
        assert_eq!(state.timestamp, 123.45);
        assert_eq!(state.payload, "TestPayload");
    }

    #[test]
    fn test_event_state_accepts_integer_timestamp() {
        let state = EventState::from_mapping(&json!({
            "event_type": "token_processed",
            "timestamp": 100,
            "payload": ""
        }))
        .unwrap();
        assert_eq!(state.timestamp, 100.0);
    }

    #[test]
    fn test_event_state_missing_field() {
        let err = EventState::from_mapping(&json!({
            "event_type": "state_transition",
            "timestamp": 1.0
        }))
        .unwrap_err();

        match err {
            QuerentError::MissingEventField { field } => assert_eq!(field, "payload"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_message_state_from_mapping() {
        let message = MessageState::from_mapping(&json!({
            "message_type": "pause",
            "timestamp": 1.5,
            "payload": "{}"
        }))
        .unwrap();
        assert_eq!(message.message_type, MessageType::Pause);

        assert!(matches!(
            "reboot".parse::<MessageType>(),
            Err(QuerentError::InvalidMessageType { .. })
        ));
    }

    #[test]
    fn test_new_event_is_timestamped() {
        let state = EventState::new(EventType::ChatCompleted, "done");
        assert!(state.timestamp > 1_600_000_000.0);
    }
}

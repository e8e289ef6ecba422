use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuerentError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid event type: {label}")]
    InvalidEventType { label: String },

    #[error("Invalid message type: {label}")]
    InvalidMessageType { label: String },

    #[error("Event data is missing field '{field}'")]
    MissingEventField { field: String },

    #[error("Workflow not found: {id}")]
    WorkflowNotFound { id: String },

    #[error("Workflow with the same ID already exists: {id}")]
    DuplicateWorkflow { id: String },

    #[error("Workflow limit reached: at most {limit} workflow(s) supported")]
    CapacityExceeded { limit: usize },

    #[error("Workflow {id} cannot move from {from} to {to}")]
    InvalidTransition { id: String, from: String, to: String },

    #[error("Workflow {id} failed: {message}")]
    WorkflowFailed { id: String, message: String },

    #[error("Workflow {id} has no run to wait for")]
    NoActiveRun { id: String },

    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Event,
    Workflow,
    Runtime,
    Io,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl QuerentError {
    pub fn internal(message: impl Into<String>) -> Self {
        QuerentError::Internal(message.into())
    }

    /// Builds an error out of a task panic payload.
    pub fn panic(error: Box<dyn std::any::Any + Send>) -> Self {
        if let Some(reason) = error.downcast_ref::<&str>() {
            QuerentError::Internal(format!("Unexpected panic. Reason: {}", reason))
        } else if let Some(reason) = error.downcast_ref::<String>() {
            QuerentError::Internal(format!("Unexpected panic. Reason: {}", reason))
        } else {
            QuerentError::Internal("Unexpected panic without reason".to_string())
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            QuerentError::ConfigValidationError { .. }
            | QuerentError::InvalidConfigValueError { .. }
            | QuerentError::MissingConfigError { .. } => ErrorCategory::Configuration,
            QuerentError::InvalidEventType { .. }
            | QuerentError::InvalidMessageType { .. }
            | QuerentError::MissingEventField { .. }
            | QuerentError::SerializationError(_) => ErrorCategory::Event,
            QuerentError::WorkflowNotFound { .. }
            | QuerentError::DuplicateWorkflow { .. }
            | QuerentError::CapacityExceeded { .. }
            | QuerentError::InvalidTransition { .. }
            | QuerentError::WorkflowFailed { .. }
            | QuerentError::NoActiveRun { .. } => ErrorCategory::Workflow,
            QuerentError::ChannelClosed(_)
            | QuerentError::Timeout(_)
            | QuerentError::Internal(_) => ErrorCategory::Runtime,
            QuerentError::IoError(_) => ErrorCategory::Io,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            QuerentError::InvalidTransition { .. } | QuerentError::NoActiveRun { .. } => {
                ErrorSeverity::Low
            }
            QuerentError::Timeout(_) | QuerentError::WorkflowFailed { .. } => ErrorSeverity::Medium,
            QuerentError::Internal(_) | QuerentError::ChannelClosed(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            QuerentError::Timeout(_)
                | QuerentError::WorkflowFailed { .. }
                | QuerentError::IoError(_)
        )
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Event => format!("Malformed event or message: {}", self),
            ErrorCategory::Workflow => format!("Workflow problem: {}", self),
            ErrorCategory::Runtime => format!("Runtime failure: {}", self),
            ErrorCategory::Io => format!("File system problem: {}", self),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            QuerentError::ConfigValidationError { .. }
            | QuerentError::InvalidConfigValueError { .. } => {
                "Fix the highlighted configuration value and try again"
            }
            QuerentError::MissingConfigError { .. } => "Add the missing configuration entry",
            QuerentError::InvalidEventType { .. } | QuerentError::InvalidMessageType { .. } => {
                "Use one of the documented snake_case labels"
            }
            QuerentError::MissingEventField { .. } => {
                "Event data must carry event_type, timestamp and payload"
            }
            QuerentError::WorkflowNotFound { .. } => "Register the workflow before using it",
            QuerentError::DuplicateWorkflow { .. } => "Use a unique workflow id",
            QuerentError::CapacityExceeded { .. } => {
                "Remove a workflow or raise resource.max_workers_allowed"
            }
            QuerentError::InvalidTransition { .. } => "Wait for the workflow to settle first",
            QuerentError::WorkflowFailed { .. } => "Inspect the workflow logs and restart it",
            QuerentError::NoActiveRun { .. } => "Start the workflow before waiting on it",
            QuerentError::Timeout(_) => "Increase workflow.stop_timeout_ms",
            QuerentError::IoError(_) => "Check that the path exists and is readable",
            QuerentError::SerializationError(_) => "Check the JSON payload shape",
            QuerentError::ChannelClosed(_) | QuerentError::Internal(_) => {
                "Restart the process; report the problem if it persists"
            }
        }
    }
}

impl From<tokio::task::JoinError> for QuerentError {
    fn from(v: tokio::task::JoinError) -> Self {
        if v.is_panic() {
            QuerentError::panic(v.into_panic())
        } else {
            QuerentError::Internal(v.to_string())
        }
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for QuerentError {
    fn from(v: tokio::sync::oneshot::error::RecvError) -> Self {
        QuerentError::ChannelClosed(v.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for QuerentError {
    fn from(v: tokio::time::error::Elapsed) -> Self {
        QuerentError::Timeout(v.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for QuerentError {
    fn from(v: tokio::sync::mpsc::error::SendError<T>) -> Self {
        QuerentError::ChannelClosed(v.to_string())
    }
}

pub type Result<T> = std::result::Result<T, QuerentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let err = QuerentError::DuplicateWorkflow {
            id: "wf".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Workflow);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert!(!err.is_retryable());

        let err = QuerentError::Timeout("stop".to_string());
        assert_eq!(err.category(), ErrorCategory::Runtime);
        assert!(err.is_retryable());
        assert!(err.user_friendly_message().starts_with("Runtime failure"));
    }

    #[test]
    fn test_panic_payload_is_preserved() {
        let err = QuerentError::panic(Box::new("boom"));
        assert_eq!(err.to_string(), "Internal error: Unexpected panic. Reason: boom");

        let err = QuerentError::panic(Box::new(42_u8));
        assert_eq!(err.to_string(), "Internal error: Unexpected panic without reason");
    }
}

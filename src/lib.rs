pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use app::{MockQuerentWorkflow, MockWorkflow};
pub use config::{Config, ConfigBuilder};
pub use core::{
    EventDispatcher, EventHandler, ManagerSettings, Workflow, WorkflowBuilder, WorkflowContext,
    WorkflowManager, WorkflowStatus,
};
pub use domain::{EventCallbackInterface, EventState, EventType, MessageState, MessageType};
pub use utils::error::{QuerentError, Result};

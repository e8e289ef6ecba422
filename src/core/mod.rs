pub mod callbacks;
pub mod channel;
pub mod context;
pub mod executor;
pub mod manager;
pub mod runtime;
pub mod workflow;

pub use callbacks::{EventDispatcher, EventHandler, EventReceiver, EventSender};
pub use channel::ChannelHandler;
pub use context::WorkflowContext;
pub use executor::WorkflowExecutor;
pub use manager::{ManagerSettings, WorkflowManager, WorkflowMetrics};
pub use runtime::tokio_runtime;
pub use workflow::{Workflow, WorkflowBuilder, WorkflowStatus};
pub use crate::utils::error::Result;

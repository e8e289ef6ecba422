// Domain layer: event and message models plus the ports workflows and callbacks plug into.

pub mod model;
pub mod ports;

pub use model::{EventState, EventType, MessageState, MessageType};
pub use ports::{ChannelInterface, EventCallbackInterface, WorkflowRunner};

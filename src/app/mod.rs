pub mod workflows;

pub use workflows::{MockQuerentWorkflow, MockWorkflow};

use crate::core::runtime::tokio_runtime;
use crate::utils::error::{QuerentError, Result};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

type BoxedCall = Pin<Box<dyn Future<Output = Result<serde_json::Value>> + Send>>;

struct ScheduledCall {
    call: BoxedCall,
    reply: oneshot::Sender<Result<serde_json::Value>>,
}

impl fmt::Debug for ScheduledCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScheduledCall<hidden>")
    }
}

/// Dispatch loop that runs workflow calls and hands their results back over oneshot channels.
///
/// Dropping the future returned by [`WorkflowExecutor::call_async`] cancels the call.
#[derive(Clone, Debug)]
pub struct WorkflowExecutor {
    sender: mpsc::Sender<ScheduledCall>,
}

impl WorkflowExecutor {
    /// Starts the loop on the current runtime, or on the shared one outside of any runtime.
    pub fn new() -> Result<Self> {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => tokio_runtime()?.handle().clone(),
        };

        let (sender, mut receiver) = mpsc::channel::<ScheduledCall>(capacity.max(1));
        tracing::trace!("New workflow executor (capacity {})", capacity);

        let spawner = handle.clone();
        handle.spawn(async move {
            while let Some(task) = receiver.recv().await {
                tracing::trace!("New task");
                spawner.spawn(Self::run(task));
            }
            tracing::trace!("Workflow executor loop closed");
        });

        Ok(Self { sender })
    }

    async fn run(task: ScheduledCall) {
        let ScheduledCall { call, mut reply } = task;

        // Panics stay inside the inner task and come back as a JoinError.
        let mut inner = tokio::spawn(call);
        tokio::select! {
            joined = &mut inner => {
                let outcome = joined.map_err(QuerentError::from).and_then(|result| result);
                if reply.send(outcome).is_err() {
                    tracing::debug!("Caller went away before the result was ready");
                }
            }
            _ = reply.closed() => {
                tracing::debug!("Caller dropped, cancelling workflow call");
                inner.abort();
            }
        }
    }

    pub async fn call_async<F>(&self, call: F) -> Result<serde_json::Value>
    where
        F: Future<Output = Result<serde_json::Value>> + Send + 'static,
    {
        let (reply, result) = oneshot::channel();

        self.sender
            .send(ScheduledCall {
                call: Box::pin(call),
                reply,
            })
            .await
            .map_err(|err| {
                QuerentError::internal(format!("Unable to schedule workflow call: {}", err))
            })?;

        result.await?
    }
}

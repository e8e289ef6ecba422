pub mod mock_workflow;

pub use mock_workflow::{MockQuerentWorkflow, MockWorkflow};

use crate::config::Config;
use std::time::Duration;

pub const START_DELAY: Duration = Duration::from_secs(1);
pub const STOP_DELAY: Duration = Duration::from_millis(500);

/// Placeholder start: waits [`START_DELAY`] and reports success whatever the config.
pub async fn start(config: Option<&Config>) -> bool {
    match config {
        Some(config) => tracing::debug!("Starting workflow {}", config.workflow.id),
        None => tracing::debug!("Starting workflow without configuration"),
    }
    tokio::time::sleep(START_DELAY).await;
    true
}

/// Placeholder stop: waits [`STOP_DELAY`] and returns.
pub async fn stop() {
    tokio::time::sleep(STOP_DELAY).await;
    tracing::debug!("Workflow stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_start_succeeds_for_any_config() {
        let begin = Instant::now();
        assert!(start(None).await);
        assert!(begin.elapsed() >= START_DELAY);

        let config = Config::default();
        assert!(start(Some(&config)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_waits_half_a_second() {
        let begin = Instant::now();
        stop().await;
        assert!(begin.elapsed() >= STOP_DELAY);
        assert!(begin.elapsed() < START_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_stubs_do_not_serialize() {
        let begin = Instant::now();
        let (a, b, _) = tokio::join!(start(None), start(None), stop());
        assert!(a && b);
        assert!(begin.elapsed() < START_DELAY * 2);
    }
}

use super::flow::XOAuthFlowManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{error, info};

/// Background task purging expired OAuth states
pub struct StateJanitor {
    manager: Arc<XOAuthFlowManager>,
    interval: Duration,
}

impl StateJanitor {
    pub fn new(manager: Arc<XOAuthFlowManager>) -> Self {
        let interval = manager.config().state_cleanup_interval();
        Self { manager, interval }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run forever, sweeping once per interval
    pub async fn start(self) {
        let mut interval = time::interval(self.interval);
        info!("OAuth state janitor started, sweeping every {:?}", self.interval);

        loop {
            interval.tick().await;
            self.sweep().await;
        }
    }

    pub async fn sweep(&self) -> u64 {
        match self.manager.cleanup_expired_states().await {
            Ok(purged) => purged,
            Err(e) => {
                error!("Error in OAuth state janitor: {}", e);
                0
            }
        }
    }
}

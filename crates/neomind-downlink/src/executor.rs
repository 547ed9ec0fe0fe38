//! Bounded pool running completion callbacks off the transport tasks.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::error::{TransportError, TransportResult};

/// Runs callbacks on blocking threads, at most `size` at a time.
#[derive(Debug)]
pub struct CallbackExecutor {
    permits: Arc<Semaphore>,
    size: usize,
}

impl CallbackExecutor {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Queue `job`. Fails with [`TransportError::Rejected`] after shutdown.
    ///
    /// Panics inside `job` are caught and logged.
    pub fn submit<F>(&self, endpoint: &str, job: F) -> TransportResult<JoinHandle<()>>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.permits.is_closed() {
            return Err(TransportError::Rejected);
        }
        let permits = self.permits.clone();
        let endpoint = endpoint.to_string();
        Ok(tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                tracing::warn!("[{}] Callback dropped. Executor already down", endpoint);
                return;
            };
            let outcome = tokio::task::spawn_blocking(move || catch_unwind(AssertUnwindSafe(job))).await;
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(_)) => tracing::error!("[{}] Callback panicked", endpoint),
                Err(e) => tracing::error!("[{}] Callback task failed: {}", endpoint, e),
            }
        }))
    }

    /// Stop accepting work. Queued jobs that have not started are dropped.
    pub fn shutdown(&self) {
        self.permits.close();
    }

    pub fn is_shutdown(&self) -> bool {
        self.permits.is_closed()
    }
}

impl Default for CallbackExecutor {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_POOL_SIZE)
    }
}

//! Admission check for sleeping devices.

use std::sync::Arc;

use crate::client::{ClientContext, LwM2mClient};

#[derive(Clone)]
pub struct SleepAwareGate {
    context: Arc<dyn ClientContext>,
}

impl SleepAwareGate {
    pub fn new(context: Arc<dyn ClientContext>) -> Self {
        Self { context }
    }

    /// `false` when the device is asleep; the request is then dropped.
    pub fn admit(&self, client: &LwM2mClient) -> bool {
        if self.context.is_downlink_allowed(client) {
            return true;
        }
        tracing::trace!(
            "[{}] ignore downlink request cause client is sleeping.",
            client.endpoint()
        );
        false
    }
}

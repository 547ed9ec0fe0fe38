//! Transport failure classification.

use std::sync::Arc;

use crate::client::{ClientContext, LwM2mClient};
use crate::error::TransportError;

/// Effect a transport failure has on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Timeout or sleeping client: the device is now considered asleep.
    Sleeping,
    /// Any other failure; sleep state is left alone.
    Generic,
}

impl ErrorClass {
    pub fn of(error: &TransportError) -> Self {
        if error.is_sleep_indicator() {
            Self::Sleeping
        } else {
            Self::Generic
        }
    }
}

/// Applies the sleep-state effect of transport failures.
#[derive(Clone)]
pub struct ErrorClassifier {
    context: Arc<dyn ClientContext>,
}

impl ErrorClassifier {
    pub fn new(context: Arc<dyn ClientContext>) -> Self {
        Self { context }
    }

    pub fn classify(&self, client: &LwM2mClient, error: &TransportError) -> ErrorClass {
        let class = ErrorClass::of(error);
        match class {
            ErrorClass::Sleeping => {
                tracing::trace!(
                    "[{}] Received {}, client is probably sleeping",
                    client.endpoint(),
                    error.kind()
                );
                self.context.asleep(client);
            }
            ErrorClass::Generic => {
                tracing::trace!("[{}] Received {}", client.endpoint(), error.kind());
            }
        }
        class
    }
}

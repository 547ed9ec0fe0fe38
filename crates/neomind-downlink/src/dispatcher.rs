//! Submission of built requests and delivery of their outcome.
//!
//! Dispatch never waits for the device: each exchange runs on its own task
//! and its terminal callback is handed to the [`CallbackExecutor`].

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;

use crate::callback::{DownlinkCallback, DownlinkReply};
use crate::classifier::ErrorClassifier;
use crate::client::{ClientContext, LwM2mClient};
use crate::command::Command;
use crate::error::TransportError;
use crate::exchange::{ExchangeId, PendingExchanges};
use crate::executor::CallbackExecutor;
use crate::gate::SleepAwareGate;
use crate::request::{DownlinkRequest, DownlinkResponse};
use crate::transport::DownlinkTransport;

pub struct DownlinkDispatcher {
    transport: Arc<dyn DownlinkTransport>,
    context: Arc<dyn ClientContext>,
    gate: SleepAwareGate,
    classifier: ErrorClassifier,
    executor: Arc<CallbackExecutor>,
    exchanges: Arc<PendingExchanges>,
    log_requests: bool,
}

impl DownlinkDispatcher {
    pub fn new(
        transport: Arc<dyn DownlinkTransport>,
        context: Arc<dyn ClientContext>,
        executor: Arc<CallbackExecutor>,
        log_requests: bool,
    ) -> Self {
        Self {
            transport,
            gate: SleepAwareGate::new(context.clone()),
            classifier: ErrorClassifier::new(context.clone()),
            context,
            executor,
            exchanges: Arc::new(PendingExchanges::new()),
            log_requests,
        }
    }

    pub fn exchanges(&self) -> &PendingExchanges {
        &self.exchanges
    }

    /// Submit `request` for `command`.
    ///
    /// Returns the exchange id, or `None` when the request was dropped
    /// because the device sleeps or `on_sent` declined it.
    pub fn dispatch(
        &self,
        client: Arc<LwM2mClient>,
        command: Command,
        request: DownlinkRequest,
        timeout: Duration,
        callback: Arc<dyn DownlinkCallback>,
    ) -> Option<ExchangeId> {
        if !self.gate.admit(&client) {
            return None;
        }
        let registration = client.registration();
        if self.log_requests {
            tracing::debug!(
                "[{}][{}] Sending request: {}",
                registration.id,
                registration.socket_address,
                request
            );
        }
        if !callback.on_sent(&request) {
            tracing::trace!("[{}] Request {} declined by caller", client.endpoint(), request.kind());
            return None;
        }

        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let id = self
            .exchanges
            .register(client.endpoint(), request.kind(), timeout_ms);

        let exchange = Exchange {
            id,
            client,
            command,
            callback,
            context: self.context.clone(),
            classifier: self.classifier.clone(),
            executor: self.executor.clone(),
            exchanges: self.exchanges.clone(),
        };
        let transport = self.transport.clone();
        tokio::spawn(async move {
            let sent = AssertUnwindSafe(transport.send(
                exchange.client.registration(),
                request.clone(),
                timeout,
            ))
            .catch_unwind();
            let result = match tokio::time::timeout(timeout, sent).await {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => {
                    tracing::error!(
                        "[{}] Transport panicked while sending {}",
                        exchange.client.endpoint(),
                        request.kind()
                    );
                    Err(TransportError::Other(anyhow::anyhow!(
                        "transport panicked while sending {}",
                        request.kind()
                    )))
                }
                Err(_) => Err(TransportError::Timeout(timeout_ms)),
            };
            exchange.complete(request, result);
        });
        Some(id)
    }
}

/// State carried by one in-flight exchange.
struct Exchange {
    id: ExchangeId,
    client: Arc<LwM2mClient>,
    command: Command,
    callback: Arc<dyn DownlinkCallback>,
    context: Arc<dyn ClientContext>,
    classifier: ErrorClassifier,
    executor: Arc<CallbackExecutor>,
    exchanges: Arc<PendingExchanges>,
}

impl Exchange {
    fn complete(self, request: DownlinkRequest, result: Result<DownlinkResponse, TransportError>) {
        let Some(pending) = self.exchanges.complete(&self.id) else {
            tracing::trace!(
                "[{}] Exchange {} already completed",
                self.client.endpoint(),
                self.id
            );
            return;
        };
        tracing::trace!(
            "[{}] {} completed after {}ms",
            self.client.endpoint(),
            pending.kind,
            pending.elapsed().num_milliseconds()
        );
        match result {
            Ok(response) => self.on_response(request, response),
            Err(error) => self.on_failure(error),
        }
    }

    fn on_response(self, request: DownlinkRequest, response: DownlinkResponse) {
        let endpoint = self.client.endpoint().to_string();
        let Exchange {
            client,
            command,
            callback,
            context,
            executor,
            ..
        } = self;
        let submitted = executor.submit(&endpoint, move || {
            let code = response.code;
            let delivered = catch_unwind(AssertUnwindSafe(|| {
                deliver_response(callback.as_ref(), &command, request, response)
            }));
            if delivered.is_err() {
                tracing::error!(
                    "[{}] failed to process successful response [{}]",
                    client.endpoint(),
                    code
                );
            }
            context.awake(&client);
        });
        if submitted.is_err() {
            tracing::warn!("[{}] Can not handle downlink response. Executor already down", endpoint);
        }
    }

    fn on_failure(self, error: TransportError) {
        let endpoint = self.client.endpoint().to_string();
        tracing::trace!("[{}] Received downlink error: {}.", endpoint, error);
        self.client.update_last_uplink_time();
        let Exchange {
            client,
            command,
            callback,
            classifier,
            executor,
            ..
        } = self;
        let submitted = executor.submit(&endpoint, move || {
            classifier.classify(&client, &error);
            callback.on_error(&command, &error);
        });
        if submitted.is_err() {
            tracing::warn!("[{}] Can not handle downlink error. Executor already down", endpoint);
        }
    }
}

/// Route a response to the callback. A failed composite write is a
/// validation error carrying the device's message.
fn deliver_response(
    callback: &dyn DownlinkCallback,
    command: &Command,
    request: DownlinkRequest,
    response: DownlinkResponse,
) {
    if matches!(request, DownlinkRequest::WriteComposite { .. }) && !response.is_success() {
        let message = response
            .error_message
            .clone()
            .unwrap_or_else(|| response.code.to_string());
        callback.on_validation_error(command, &message);
        return;
    }
    callback.on_success(command, DownlinkReply::Response { request, response });
}

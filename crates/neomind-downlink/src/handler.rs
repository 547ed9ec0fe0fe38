//! Downlink entry points.
//!
//! [`DownlinkHandler::handle`] takes any [`Command`]; the `send_*` methods
//! are typed shorthands for each variant. All of them return once the
//! request is submitted; the outcome arrives through the callback.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use crate::builder::{LocalCommand, Outbound, RequestBuilder};
use crate::callback::{DownlinkCallback, DownlinkReply};
use crate::client::{ClientContext, LwM2mClient};
use crate::command::{
    Command, CompositeCommand, CreateCommand, ExecuteCommand, TargetCommand,
    WriteAttributesCommand, WriteCommand, WriteCompositeCommand,
};
use crate::config::DownlinkConfig;
use crate::dispatcher::DownlinkDispatcher;
use crate::error::DownlinkResult;
use crate::exchange::PendingExchanges;
use crate::executor::CallbackExecutor;
use crate::model::ModelProvider;
use crate::observation::ObservationRegistry;
use crate::transport::{DownlinkTransport, ObservationService};

pub struct DownlinkHandler {
    config: DownlinkConfig,
    builder: RequestBuilder,
    observations: ObservationRegistry,
    dispatcher: DownlinkDispatcher,
    executor: Arc<CallbackExecutor>,
}

impl DownlinkHandler {
    pub fn new(
        config: DownlinkConfig,
        transport: Arc<dyn DownlinkTransport>,
        observations: Arc<dyn ObservationService>,
        models: Arc<dyn ModelProvider>,
        context: Arc<dyn ClientContext>,
    ) -> Self {
        let executor = Arc::new(CallbackExecutor::new(config.downlink_pool_size));
        let dispatcher =
            DownlinkDispatcher::new(transport, context, executor.clone(), config.log_requests);
        tracing::info!(
            "Downlink handler started with {} callback workers",
            executor.size()
        );
        Self {
            config,
            builder: RequestBuilder::new(models),
            observations: ObservationRegistry::new(observations),
            dispatcher,
            executor,
        }
    }

    pub fn config(&self) -> &DownlinkConfig {
        &self.config
    }

    pub fn exchanges(&self) -> &PendingExchanges {
        self.dispatcher.exchanges()
    }

    /// Build and submit `command`, reporting the outcome to `callback`.
    pub async fn handle(
        &self,
        client: &Arc<LwM2mClient>,
        command: Command,
        callback: Arc<dyn DownlinkCallback>,
    ) {
        let outbound = match self.builder.build(client, &command) {
            Ok(outbound) => outbound,
            Err(e) => {
                callback.on_validation_error(&command, &e.to_string());
                return;
            }
        };
        match outbound {
            Outbound::Request(request) => {
                let timeout = Duration::from_millis(
                    command.timeout_ms().unwrap_or(self.config.timeout_ms),
                );
                self.dispatcher
                    .dispatch(client.clone(), command, request, timeout, callback);
            }
            Outbound::Local(local) => match self.run_local(client, local).await {
                Ok(reply) => callback.on_success(&command, reply),
                Err(e) => callback.on_validation_error(&command, &e.to_string()),
            },
        }
    }

    async fn run_local(
        &self,
        client: &LwM2mClient,
        local: LocalCommand,
    ) -> DownlinkResult<DownlinkReply> {
        let reply = match local {
            LocalCommand::ListObservations => {
                DownlinkReply::Observations(self.observations.list_all(client).await)
            }
            LocalCommand::Cancel(path) => {
                DownlinkReply::Cancelled(self.observations.cancel(client, &path).await?)
            }
            LocalCommand::CancelComposite(paths) => {
                DownlinkReply::Cancelled(self.observations.cancel_composite(client, &paths).await?)
            }
            LocalCommand::CancelAll => DownlinkReply::Cancelled(self.observations.cancel_all(client).await),
            LocalCommand::DiscoverAll => DownlinkReply::Links(
                client
                    .registration()
                    .sorted_object_links()
                    .iter()
                    .map(|link| link.to_core_link_format())
                    .collect(),
            ),
        };
        Ok(reply)
    }

    /// Descriptors of the device's active observations.
    pub async fn list_active_observations(&self, client: &LwM2mClient) -> BTreeSet<String> {
        self.observations.list_all(client).await
    }

    /// Stop the callback pool. Outcomes of in-flight exchanges are dropped.
    pub fn shutdown(&self) {
        tracing::info!("Downlink handler shutting down");
        self.executor.shutdown();
    }

    pub async fn send_observe_all(&self, client: &Arc<LwM2mClient>, callback: Arc<dyn DownlinkCallback>) {
        self.handle(client, Command::ObserveAll, callback).await
    }

    pub async fn send_cancel_observe_all(
        &self,
        client: &Arc<LwM2mClient>,
        callback: Arc<dyn DownlinkCallback>,
    ) {
        self.handle(client, Command::CancelObserveAll, callback).await
    }

    pub async fn send_discover_all(&self, client: &Arc<LwM2mClient>, callback: Arc<dyn DownlinkCallback>) {
        self.handle(client, Command::DiscoverAll, callback).await
    }
}

macro_rules! send_methods {
    ($($name:ident => $variant:ident($ty:ty)),* $(,)?) => {
        impl DownlinkHandler {
            $(
                pub async fn $name(
                    &self,
                    client: &Arc<LwM2mClient>,
                    command: $ty,
                    callback: Arc<dyn DownlinkCallback>,
                ) {
                    self.handle(client, Command::$variant(command), callback).await
                }
            )*
        }
    };
}

send_methods! {
    send_read => Read(TargetCommand),
    send_read_composite => ReadComposite(CompositeCommand),
    send_observe => Observe(TargetCommand),
    send_observe_composite => ObserveComposite(CompositeCommand),
    send_cancel_observe => CancelObserve(TargetCommand),
    send_cancel_observe_composite => CancelObserveComposite(CompositeCommand),
    send_discover => Discover(TargetCommand),
    send_execute => Execute(ExecuteCommand),
    send_delete => Delete(TargetCommand),
    send_write_replace => WriteReplace(WriteCommand),
    send_write_update => WriteUpdate(WriteCommand),
    send_write_composite => WriteComposite(WriteCompositeCommand),
    send_write_attributes => WriteAttributes(WriteAttributesCommand),
    send_create => Create(CreateCommand),
}

//! Shared fakes for downlink integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use neomind_downlink::{
    ClientContext, Command, ContentFormat, DefaultClientContext, DownlinkCallback, DownlinkConfig,
    DownlinkHandler, DownlinkReply, DownlinkRequest, DownlinkResponse, DownlinkTransport, Link,
    LwM2mClient, LwM2mPath, LwM2mVersion, ObjectModel, Observation, ObservationService,
    Operations, ProfileModelProvider, Registration, ResourceModel, ResourceType, TransportError,
    TransportResult, builtin_models,
};

/// What the fake transport does with the next request.
#[derive(Debug, Clone)]
pub enum Outcome {
    Respond(DownlinkResponse),
    Fail(String),
    /// Never answer; the dispatcher's timeout fires.
    Hang,
}

pub struct FakeTransport {
    outcome: Mutex<Outcome>,
    sent: Mutex<Vec<DownlinkRequest>>,
}

impl FakeTransport {
    pub fn new(outcome: Outcome) -> Self {
        Self {
            outcome: Mutex::new(outcome),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn set_outcome(&self, outcome: Outcome) {
        *self.outcome.lock().unwrap() = outcome;
    }

    pub fn sent(&self) -> Vec<DownlinkRequest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl DownlinkTransport for FakeTransport {
    async fn send(
        &self,
        _registration: &Registration,
        request: DownlinkRequest,
        _timeout: Duration,
    ) -> TransportResult<DownlinkResponse> {
        self.sent.lock().unwrap().push(request);
        let outcome = self.outcome.lock().unwrap().clone();
        match outcome {
            Outcome::Respond(response) => Ok(response),
            Outcome::Fail(message) => Err(TransportError::Send(message)),
            Outcome::Hang => std::future::pending().await,
        }
    }
}

/// Observation registry backed by a list.
#[derive(Default)]
pub struct FakeObservations {
    active: Mutex<Vec<Observation>>,
}

impl FakeObservations {
    pub fn with(observations: Vec<Observation>) -> Self {
        Self {
            active: Mutex::new(observations),
        }
    }

    pub fn active(&self) -> Vec<Observation> {
        self.active.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObservationService for FakeObservations {
    async fn observations(&self, _registration: &Registration) -> Vec<Observation> {
        self.active()
    }

    async fn cancel_observations(&self, _registration: &Registration, path: &LwM2mPath) -> usize {
        let mut active = self.active.lock().unwrap();
        let before = active.len();
        active.retain(|o| *o != Observation::Single(*path));
        before - active.len()
    }

    async fn cancel_all_observations(&self, _registration: &Registration) -> usize {
        let mut active = self.active.lock().unwrap();
        let count = active.len();
        active.clear();
        count
    }

    async fn cancel_composite_observations(
        &self,
        _registration: &Registration,
        paths: &[LwM2mPath],
    ) -> usize {
        let mut active = self.active.lock().unwrap();
        let before = active.len();
        active.retain(|o| !o.is_composite_over(paths));
        before - active.len()
    }
}

/// Liveness context that never blocks downlinks, so tests can watch
/// the sleep state change in both directions.
#[derive(Default)]
pub struct OpenContext;

impl ClientContext for OpenContext {
    fn is_downlink_allowed(&self, _client: &LwM2mClient) -> bool {
        true
    }

    fn awake(&self, client: &LwM2mClient) {
        DefaultClientContext.awake(client);
    }

    fn asleep(&self, client: &LwM2mClient) {
        DefaultClientContext.asleep(client);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Sent(String),
    Success(DownlinkReply),
    Validation(String),
    Error(String),
}

/// Callback forwarding every event to a channel.
pub struct RecordingCallback {
    accept: bool,
    events: mpsc::UnboundedSender<Event>,
}

impl RecordingCallback {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Event>) {
        Self::with_accept(true)
    }

    pub fn with_accept(accept: bool) -> (Arc<Self>, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { accept, events: tx }), rx)
    }
}

impl DownlinkCallback for RecordingCallback {
    fn on_sent(&self, request: &DownlinkRequest) -> bool {
        let _ = self.events.send(Event::Sent(request.kind().to_string()));
        self.accept
    }

    fn on_success(&self, _command: &Command, reply: DownlinkReply) {
        let _ = self.events.send(Event::Success(reply));
    }

    fn on_validation_error(&self, _command: &Command, message: &str) {
        let _ = self.events.send(Event::Validation(message.to_string()));
    }

    fn on_error(&self, _command: &Command, error: &TransportError) {
        let _ = self.events.send(Event::Error(error.kind().to_string()));
    }
}

/// Next event, failing the test after two seconds.
pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("no event within 2s")
        .expect("callback dropped")
}

/// True when no event arrives for a short while. A channel closed because
/// the handler dropped the callback counts as quiet.
pub async fn stays_quiet(rx: &mut mpsc::UnboundedReceiver<Event>) -> bool {
    !matches!(
        tokio::time::timeout(Duration::from_millis(200), rx.recv()).await,
        Ok(Some(_))
    )
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

pub fn models() -> Arc<ProfileModelProvider> {
    let provider = ProfileModelProvider::new();
    for model in builtin_models() {
        provider.register(model.clone());
    }
    provider.register(
        ObjectModel::new(3303, "Temperature", true)
            .with_resource(ResourceModel::new(
                5700,
                "Sensor Value",
                Operations::R,
                false,
                ResourceType::Float,
            ))
            .with_resource(ResourceModel::new(
                5750,
                "Application Type",
                Operations::RW,
                false,
                ResourceType::String,
            )),
    );
    Arc::new(provider)
}

pub fn client() -> Arc<LwM2mClient> {
    Arc::new(LwM2mClient::new(
        Registration::new("sensor-1", LwM2mVersion::V1_1)
            .with_socket_address("10.0.0.7:5683")
            .with_formats(
                [ContentFormat::Tlv, ContentFormat::SenmlJson]
                    .into_iter()
                    .collect(),
            )
            .with_object(1, "1.0")
            .with_object(3, "1.0")
            .with_object(5, "1.0")
            .with_object(3303, "1.0")
            .with_link(Link::new(LwM2mPath::object_instance(3303, 0)))
            .with_link(Link::new(LwM2mPath::object_instance(1, 0)))
            .with_link(Link::new(LwM2mPath::object_instance(3, 0)).with_attribute("ver", "1.1")),
    ))
}

pub fn config() -> DownlinkConfig {
    DownlinkConfig {
        downlink_pool_size: 2,
        timeout_ms: 5_000,
        log_requests: true,
    }
}

pub struct Harness {
    pub handler: DownlinkHandler,
    pub transport: Arc<FakeTransport>,
    pub observations: Arc<FakeObservations>,
}

/// Route crate logs to the test output. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("neomind_downlink=trace")
        .with_test_writer()
        .try_init();
}

pub fn harness_with(
    outcome: Outcome,
    observations: Vec<Observation>,
    context: Arc<dyn ClientContext>,
) -> Harness {
    init_tracing();
    let transport = Arc::new(FakeTransport::new(outcome));
    let observations = Arc::new(FakeObservations::with(observations));
    let handler = DownlinkHandler::new(
        config(),
        transport.clone(),
        observations.clone(),
        models(),
        context,
    );
    Harness {
        handler,
        transport,
        observations,
    }
}

pub fn harness(outcome: Outcome) -> Harness {
    harness_with(outcome, Vec::new(), Arc::new(DefaultClientContext))
}

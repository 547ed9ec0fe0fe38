//! Downlink handler tests.
//!
//! Drives commands through the handler against a fake transport and checks
//! which callbacks fire, what was sent and how device liveness changes.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;

use common::*;
use neomind_downlink::{
    Command, CompositeCommand, ContentFormat, CreateCommand, DefaultClientContext,
    DownlinkCallback, DownlinkHandler, DownlinkReply, DownlinkRequest, DownlinkResponse,
    DownlinkTransport, Liveness, LwM2mNode, LwM2mPath, LwM2mVersion, Registration, Resource,
    ResourceValue, ResponseCode, TargetCommand, TransportError, TransportResult, WriteCommand,
    WriteCompositeCommand, WriteMode,
};

fn read(path: &str) -> Command {
    Command::Read(TargetCommand::new(path.parse::<LwM2mPath>().unwrap()))
}

#[tokio::test]
async fn test_read_reports_success() {
    let h = harness(Outcome::Respond(DownlinkResponse::new(ResponseCode::Content)));
    let client = client();
    let (callback, mut rx) = RecordingCallback::new();

    h.handler.handle(&client, read("/3/0/9"), callback).await;

    assert_eq!(next_event(&mut rx).await, Event::Sent("ReadRequest".into()));
    match next_event(&mut rx).await {
        Event::Success(DownlinkReply::Response { request, response }) => {
            assert_eq!(
                request,
                DownlinkRequest::Read {
                    format: ContentFormat::SenmlJson,
                    path: LwM2mPath::resource(3, 0, 9),
                }
            );
            assert_eq!(response.code, ResponseCode::Content);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(eventually(|| h.handler.exchanges().in_flight() == 0).await);
}

#[tokio::test]
async fn test_v1_0_complex_paths_use_tlv() {
    let h = harness(Outcome::Respond(DownlinkResponse::new(ResponseCode::Content)));
    let client = Arc::new(neomind_downlink::LwM2mClient::new(
        Registration::new("legacy", LwM2mVersion::V1_0)
            .with_formats([ContentFormat::SenmlJson].into_iter().collect())
            .with_object(3, "1.0"),
    ));

    for path in ["/3", "/3/0"] {
        let (callback, mut rx) = RecordingCallback::new();
        h.handler.handle(&client, read(path), callback).await;
        assert_eq!(next_event(&mut rx).await, Event::Sent("ReadRequest".into()));
        assert!(matches!(next_event(&mut rx).await, Event::Success(_)));
    }

    for request in h.transport.sent() {
        assert_eq!(request.content_format(), Some(ContentFormat::Tlv));
    }
}

#[tokio::test]
async fn test_complex_read_without_capable_format_fails_validation() {
    let h = harness(Outcome::Respond(DownlinkResponse::new(ResponseCode::Content)));
    let client = Arc::new(neomind_downlink::LwM2mClient::new(
        Registration::new("tiny", LwM2mVersion::V1_1)
            .with_formats([ContentFormat::Cbor, ContentFormat::Opaque].into_iter().collect())
            .with_object(3, "1.0"),
    ));
    let (callback, mut rx) = RecordingCallback::new();

    h.handler.handle(&client, read("/3/0"), callback).await;

    match next_event(&mut rx).await {
        Event::Validation(message) => assert!(message.contains("Can't send complex requests")),
        other => panic!("unexpected {:?}", other),
    }
    assert!(h.transport.sent().is_empty());
}

#[tokio::test]
async fn test_write_float_negotiates_senml_json() {
    let h = harness(Outcome::Respond(DownlinkResponse::new(ResponseCode::Changed)));
    let client = client();
    let (callback, mut rx) = RecordingCallback::new();

    h.handler
        .send_write_replace(
            &client,
            WriteCommand::new("/3303/0/5700".parse::<LwM2mPath>().unwrap(), json!(23.5)),
            callback,
        )
        .await;

    assert_eq!(next_event(&mut rx).await, Event::Sent("WriteRequest".into()));
    assert!(matches!(next_event(&mut rx).await, Event::Success(_)));

    let sent = h.transport.sent();
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        DownlinkRequest::Write {
            mode,
            format,
            node: LwM2mNode::Resource(resource),
            ..
        } => {
            assert_eq!(*mode, WriteMode::Replace);
            assert_eq!(*format, ContentFormat::SenmlJson);
            assert_eq!(resource.single_value(), Some(&ResourceValue::Float(23.5)));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_write_update_carries_both_resources() {
    let h = harness(Outcome::Respond(DownlinkResponse::new(ResponseCode::Changed)));
    let client = client();
    let (callback, mut rx) = RecordingCallback::new();

    h.handler
        .send_write_update(
            &client,
            WriteCommand::new(
                "/3/0".parse::<LwM2mPath>().unwrap(),
                json!({"14": "+5", "15": "+9"}),
            ),
            callback,
        )
        .await;

    assert_eq!(next_event(&mut rx).await, Event::Sent("WriteRequest".into()));
    assert!(matches!(next_event(&mut rx).await, Event::Success(_)));

    match &h.transport.sent()[0] {
        DownlinkRequest::Write {
            mode: WriteMode::Update,
            node: LwM2mNode::ObjectInstance(instance),
            ..
        } => {
            assert_eq!(instance.resources.len(), 2);
            assert_eq!(
                instance.resource(14).and_then(Resource::single_value),
                Some(&ResourceValue::String("+5".into()))
            );
            assert_eq!(
                instance.resource(15).and_then(Resource::single_value),
                Some(&ResourceValue::String("+9".into()))
            );
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_create_on_single_instance_object_is_rejected() {
    let h = harness(Outcome::Respond(DownlinkResponse::new(ResponseCode::Created)));
    let client = client();

    for value in [json!({"14": "+5"}), json!({}), json!(1)] {
        let (callback, mut rx) = RecordingCallback::new();
        h.handler
            .send_create(
                &client,
                CreateCommand::new(LwM2mPath::object(3)).with_value(value),
                callback,
            )
            .await;
        assert!(matches!(next_event(&mut rx).await, Event::Validation(_)));
    }
    assert!(h.transport.sent().is_empty());
}

#[tokio::test]
async fn test_sleeping_device_is_skipped_until_awake() {
    let h = harness(Outcome::Respond(DownlinkResponse::new(ResponseCode::Content)));
    let client = client();
    client.set_liveness(Liveness::Asleep);

    let (callback, mut rx) = RecordingCallback::new();
    h.handler.handle(&client, read("/3/0/9"), callback).await;
    assert!(stays_quiet(&mut rx).await);
    assert!(h.transport.sent().is_empty());

    client.set_liveness(Liveness::Awake);
    let (callback, mut rx) = RecordingCallback::new();
    h.handler.handle(&client, read("/3/0/9"), callback).await;
    assert_eq!(next_event(&mut rx).await, Event::Sent("ReadRequest".into()));
    assert!(matches!(next_event(&mut rx).await, Event::Success(_)));
}

#[tokio::test]
async fn test_timeout_marks_asleep_until_next_success() {
    let h = harness_with(Outcome::Hang, Vec::new(), Arc::new(OpenContext));
    let client = client();

    let (callback, mut rx) = RecordingCallback::new();
    let command = Command::Read(TargetCommand::new(LwM2mPath::resource(3, 0, 9)).with_timeout(50));
    h.handler.handle(&client, command, callback).await;

    assert_eq!(next_event(&mut rx).await, Event::Sent("ReadRequest".into()));
    assert_eq!(next_event(&mut rx).await, Event::Error("Timeout".into()));
    assert!(stays_quiet(&mut rx).await);
    assert_eq!(client.liveness(), Liveness::Asleep);

    h.transport
        .set_outcome(Outcome::Respond(DownlinkResponse::new(ResponseCode::Content)));
    let (callback, mut rx) = RecordingCallback::new();
    h.handler.handle(&client, read("/3/0/9"), callback).await;
    assert_eq!(next_event(&mut rx).await, Event::Sent("ReadRequest".into()));
    assert!(matches!(next_event(&mut rx).await, Event::Success(_)));
    assert!(eventually(|| client.liveness() == Liveness::Awake).await);
}

#[tokio::test]
async fn test_generic_failure_keeps_liveness() {
    let h = harness_with(
        Outcome::Fail("connection reset".into()),
        Vec::new(),
        Arc::new(OpenContext),
    );
    let client = client();
    let (callback, mut rx) = RecordingCallback::new();

    h.handler.handle(&client, read("/3/0/9"), callback).await;

    assert_eq!(next_event(&mut rx).await, Event::Sent("ReadRequest".into()));
    assert_eq!(next_event(&mut rx).await, Event::Error("Send".into()));
    assert_eq!(client.liveness(), Liveness::Awake);
}

#[tokio::test]
async fn test_failed_composite_write_is_a_validation_error() {
    let h = harness(Outcome::Respond(DownlinkResponse::error(
        ResponseCode::BadRequest,
        "resource 14 is read-only",
    )));
    let client = client();
    let (callback, mut rx) = RecordingCallback::new();

    let mut nodes = std::collections::BTreeMap::new();
    nodes.insert(
        LwM2mPath::resource(3, 0, 14),
        LwM2mNode::Resource(Resource::Single {
            id: 14,
            value: ResourceValue::String("+5".into()),
        }),
    );
    let command = WriteCompositeCommand {
        nodes,
        timeout_ms: None,
    };
    h.handler.send_write_composite(&client, command, callback).await;

    assert_eq!(next_event(&mut rx).await, Event::Sent("WriteCompositeRequest".into()));
    assert_eq!(
        next_event(&mut rx).await,
        Event::Validation("resource 14 is read-only".into())
    );
}

#[tokio::test]
async fn test_declined_request_is_not_sent() {
    let h = harness(Outcome::Respond(DownlinkResponse::new(ResponseCode::Content)));
    let client = client();
    let (callback, mut rx) = RecordingCallback::with_accept(false);

    h.handler.handle(&client, read("/3/0/9"), callback).await;

    assert_eq!(next_event(&mut rx).await, Event::Sent("ReadRequest".into()));
    assert!(stays_quiet(&mut rx).await);
    assert!(h.transport.sent().is_empty());
    assert_eq!(h.handler.exchanges().in_flight(), 0);
}

#[tokio::test]
async fn test_outcomes_after_shutdown_are_dropped() {
    let h = harness(Outcome::Respond(DownlinkResponse::new(ResponseCode::Content)));
    let client = client();
    h.handler.shutdown();

    let (callback, mut rx) = RecordingCallback::new();
    h.handler.handle(&client, read("/3/0/9"), callback).await;

    assert_eq!(next_event(&mut rx).await, Event::Sent("ReadRequest".into()));
    assert!(stays_quiet(&mut rx).await);
}

#[tokio::test]
async fn test_read_composite_uses_composite_format() {
    let h = harness(Outcome::Respond(DownlinkResponse::new(ResponseCode::Content)));
    let client = client();
    let (callback, mut rx) = RecordingCallback::new();

    let paths = vec![LwM2mPath::resource(3, 0, 9), LwM2mPath::resource(3303, 0, 5700)];
    h.handler
        .send_read_composite(&client, CompositeCommand::new(paths.clone()), callback)
        .await;

    assert_eq!(next_event(&mut rx).await, Event::Sent("ReadCompositeRequest".into()));
    assert!(matches!(next_event(&mut rx).await, Event::Success(_)));
    assert_eq!(
        h.transport.sent()[0],
        DownlinkRequest::ReadComposite {
            request_format: ContentFormat::SenmlJson,
            response_format: ContentFormat::SenmlJson,
            paths,
        }
    );
}

#[tokio::test]
async fn test_discover_all_lists_sorted_links() {
    let h = harness(Outcome::Hang);
    let client = client();
    let (callback, mut rx) = RecordingCallback::new();

    h.handler.send_discover_all(&client, callback).await;

    assert_eq!(
        next_event(&mut rx).await,
        Event::Success(DownlinkReply::Links(vec![
            "</1/0>".to_string(),
            "</3/0>;ver=1.1".to_string(),
            "</3303/0>".to_string(),
        ]))
    );
    assert!(h.transport.sent().is_empty());
}

#[tokio::test]
async fn test_unknown_object_is_a_validation_error() {
    let h = harness_with(
        Outcome::Respond(DownlinkResponse::new(ResponseCode::Content)),
        Vec::new(),
        Arc::new(DefaultClientContext),
    );
    let client = client();
    let (callback, mut rx) = RecordingCallback::new();

    h.handler.handle(&client, read("/19/0/0"), callback).await;

    assert_eq!(
        next_event(&mut rx).await,
        Event::Validation(
            "Specified object id 19 absent in the list supported objects of the client".into()
        )
    );
}

/// Transport whose send always panics.
struct PanickingTransport;

#[async_trait]
impl DownlinkTransport for PanickingTransport {
    async fn send(
        &self,
        _registration: &Registration,
        _request: DownlinkRequest,
        _timeout: Duration,
    ) -> TransportResult<DownlinkResponse> {
        panic!("codec failure")
    }
}

#[tokio::test]
async fn test_transport_panic_reports_one_error() {
    init_tracing();
    let handler = DownlinkHandler::new(
        config(),
        Arc::new(PanickingTransport),
        Arc::new(FakeObservations::default()),
        models(),
        Arc::new(DefaultClientContext),
    );
    let client = client();
    let (callback, mut rx) = RecordingCallback::new();

    handler.handle(&client, read("/3/0/9"), callback).await;

    assert_eq!(next_event(&mut rx).await, Event::Sent("ReadRequest".into()));
    assert_eq!(next_event(&mut rx).await, Event::Error("Other".into()));
    assert!(stays_quiet(&mut rx).await);
    assert_eq!(handler.exchanges().in_flight(), 0);
    assert_eq!(client.liveness(), Liveness::Awake);
}

/// Callback whose success handler panics.
struct PanickingCallback {
    events: mpsc::UnboundedSender<Event>,
}

impl DownlinkCallback for PanickingCallback {
    fn on_sent(&self, request: &DownlinkRequest) -> bool {
        let _ = self.events.send(Event::Sent(request.kind().to_string()));
        true
    }

    fn on_success(&self, _command: &Command, _reply: DownlinkReply) {
        panic!("caller bug")
    }

    fn on_validation_error(&self, _command: &Command, message: &str) {
        let _ = self.events.send(Event::Validation(message.to_string()));
    }

    fn on_error(&self, _command: &Command, error: &TransportError) {
        let _ = self.events.send(Event::Error(error.kind().to_string()));
    }
}

#[tokio::test]
async fn test_panicking_success_callback_still_wakes_device() {
    let h = harness_with(
        Outcome::Respond(DownlinkResponse::new(ResponseCode::Content)),
        Vec::new(),
        Arc::new(OpenContext),
    );
    let client = client();
    client.set_liveness(Liveness::Asleep);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let callback = Arc::new(PanickingCallback { events: tx });
    h.handler.handle(&client, read("/3/0/9"), callback).await;

    assert_eq!(next_event(&mut rx).await, Event::Sent("ReadRequest".into()));
    assert!(eventually(|| client.liveness() == Liveness::Awake).await);

    // The pool keeps serving after the panic.
    let (callback, mut rx) = RecordingCallback::new();
    h.handler.handle(&client, read("/3/0/9"), callback).await;
    assert_eq!(next_event(&mut rx).await, Event::Sent("ReadRequest".into()));
    assert!(matches!(next_event(&mut rx).await, Event::Success(_)));
}

use std::sync::{Arc, Mutex};
use std::time::Duration;

use electrobun_common::{RpcError, ViewId};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::*;
use crate::transport::{InboundSource, StreamTransport, TransportManager};

enum ControllerOps {}
impl RpcSchema for ControllerOps {}

enum ViewOps {}
impl RpcSchema for ViewOps {}

struct Ping;
impl RequestDef for Ping {
    type Schema = ViewOps;
    const NAME: &'static str = "ping";
    type Params = ();
    type Response = String;
}

struct Add;
impl RequestDef for Add {
    type Schema = ViewOps;
    const NAME: &'static str = "add";
    type Params = (i64, i64);
    type Response = i64;
}

struct Slow;
impl RequestDef for Slow {
    type Schema = ViewOps;
    const NAME: &'static str = "slow";
    type Params = u64;
    type Response = String;
}

struct Unhandled;
impl RequestDef for Unhandled {
    type Schema = ViewOps;
    const NAME: &'static str = "unhandled";
    type Params = ();
    type Response = ();
}

struct GetTitle;
impl RequestDef for GetTitle {
    type Schema = ControllerOps;
    const NAME: &'static str = "getTitle";
    type Params = ();
    type Response = String;
}

struct Log;
impl MessageDef for Log {
    type Schema = ControllerOps;
    const NAME: &'static str = "log";
    type Payload = String;
}

type ControllerRpc = Rpc<ControllerOps, ViewOps>;
type ViewRpc = Rpc<ViewOps, ControllerOps>;

const MAX_REQUEST_TIME: Duration = Duration::from_secs(2);

fn linked_transports() -> (Arc<TransportManager>, Arc<TransportManager>) {
    let (controller_out, view_in) = tokio::io::duplex(64 * 1024);
    let (view_out, controller_in) = tokio::io::duplex(64 * 1024);
    let controller = StreamTransport::new("controller", controller_out, InboundSource::reader(controller_in));
    let view = StreamTransport::new("view", view_out, InboundSource::reader(view_in));
    (
        Arc::new(TransportManager::new(ViewId(1), Arc::new(controller), None)),
        Arc::new(TransportManager::new(ViewId(1), Arc::new(view), None)),
    )
}

fn linked_pair() -> (ControllerRpc, ViewRpc) {
    let (controller, view) = linked_transports();
    (
        Rpc::bind(controller, MAX_REQUEST_TIME),
        Rpc::bind(view, MAX_REQUEST_TIME),
    )
}

#[tokio::test]
async fn ping_pong() {
    let (controller, view) = linked_pair();
    view.handle_request::<Ping, _, _, String>(|()| async { Ok("pong".to_string()) });

    let reply = controller.request::<Ping>(()).await.unwrap();
    assert_eq!(reply, "pong");
    assert_eq!(controller.pending_requests(), 0);
}

#[tokio::test]
async fn both_directions_share_one_channel() {
    let (controller, view) = linked_pair();
    view.handle_request::<Add, _, _, String>(|(a, b)| async move { Ok(a + b) });
    controller.handle_request::<GetTitle, _, _, String>(|()| async { Ok("Home".to_string()) });

    let (sum, title) = tokio::join!(
        controller.request::<Add>((2, 40)),
        view.request::<GetTitle>(())
    );
    assert_eq!(sum.unwrap(), 42);
    assert_eq!(title.unwrap(), "Home");
}

#[tokio::test]
async fn concurrent_requests_correlate_by_id() {
    let (controller, view) = linked_pair();
    view.handle_request::<Add, _, _, String>(|(a, b)| async move {
        // Finish out of order.
        tokio::time::sleep(Duration::from_millis((10 - a as u64 % 10) * 3)).await;
        Ok(a + b)
    });

    let calls = (0..20).map(|i| {
        let controller = controller.clone();
        async move { controller.request::<Add>((i, 1000)).await }
    });
    let results = futures_util::future::join_all(calls).await;
    for (i, r) in results.into_iter().enumerate() {
        assert_eq!(r.unwrap(), i as i64 + 1000);
    }
}

#[tokio::test]
async fn missing_handler_yields_error_response() {
    let (controller, _view) = linked_pair();

    let err = controller.request::<Unhandled>(()).await.unwrap_err();
    match err {
        RpcError::Remote(msg) => assert_eq!(msg, "no handler registered for request 'unhandled'"),
        other => panic!("expected remote error, got {other:?}"),
    }
    assert_eq!(controller.pending_requests(), 0);
}

#[tokio::test]
async fn handler_error_is_reported_to_caller() {
    let (controller, view) = linked_pair();
    view.handle_request::<Add, _, _, String>(|(_, b)| async move {
        if b == 0 {
            Err("refusing zero".to_string())
        } else {
            Ok(b)
        }
    });

    let err = controller.request::<Add>((1, 0)).await.unwrap_err();
    assert!(matches!(err, RpcError::Remote(ref m) if m == "refusing zero"));
    assert_eq!(controller.request::<Add>((1, 5)).await.unwrap(), 5);
}

#[tokio::test]
async fn undecodable_params_are_reported() {
    let (controller, view) = linked_pair();
    view.handle_request::<Add, _, _, String>(|(a, b)| async move { Ok(a + b) });

    let err = controller
        .request_raw("add", json!({"not": "a tuple"}))
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::Remote(ref m) if m.starts_with("invalid payload for 'add'")));
}

#[tokio::test]
async fn timeout_rejects_and_late_response_is_discarded() {
    let (controller, view) = linked_pair();
    view.handle_request::<Slow, _, _, String>(|ms| async move {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok("done".to_string())
    });
    view.handle_request::<Ping, _, _, String>(|()| async { Ok("pong".to_string()) });

    let err = controller
        .request_with_timeout::<Slow>(300, Duration::from_millis(50))
        .await
        .unwrap_err();
    match err {
        RpcError::Timeout { name, after } => {
            assert_eq!(name, "slow");
            assert_eq!(after, Duration::from_millis(50));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(controller.pending_requests(), 0);

    // Let the late response arrive; it must not disturb the next request.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(controller.request::<Ping>(()).await.unwrap(), "pong");
    assert_eq!(controller.pending_requests(), 0);
}

#[tokio::test]
async fn timeout_during_stalled_write_keeps_channel_framed() {
    let (controller_out, view_in) = tokio::io::duplex(4096);
    let (view_out, controller_in) = tokio::io::duplex(4096);
    let controller = StreamTransport::new("controller", controller_out, InboundSource::reader(controller_in));
    let view = StreamTransport::new("view", view_out, InboundSource::reader(view_in));
    let controller: Rpc<Untyped, Untyped> = Rpc::bind(
        Arc::new(TransportManager::new(ViewId(1), Arc::new(controller), None)),
        MAX_REQUEST_TIME,
    );
    let view = Arc::new(TransportManager::new(ViewId(1), Arc::new(view), None));

    // The view is not reading yet, so the request cannot even be written.
    let err = controller
        .request_raw_with_timeout("big", json!("x".repeat(20_000)), Duration::from_millis(50))
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::Timeout { .. }));

    let view: Rpc<Untyped, Untyped> = Rpc::bind(view, MAX_REQUEST_TIME);
    let (tx, mut rx) = mpsc::unbounded_channel();
    view.on_message_raw("after", move |payload| {
        let _ = tx.send(payload);
    });

    controller.send_raw("after", json!("ok")).await;
    let payload = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("message after the timed-out request should arrive");
    assert_eq!(payload, Some(json!("ok")));
}

#[tokio::test]
async fn fire_and_forget_reaches_wildcard_then_named_handler() {
    let (controller, view) = linked_pair();
    let seen: Arc<Mutex<Vec<String>>> = Arc::default();

    let wildcard_seen = Arc::clone(&seen);
    controller.on_any_message(move |name, payload| {
        wildcard_seen
            .lock()
            .unwrap()
            .push(format!("any:{name}:{payload}"));
    });
    let (tx, mut rx) = mpsc::unbounded_channel();
    let named_seen = Arc::clone(&seen);
    controller.on_message::<Log, _>(move |line| {
        named_seen.lock().unwrap().push(format!("log:{line}"));
        let _ = tx.send(());
    });

    view.send::<Log>("hello".to_string()).await;
    rx.recv().await.unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec!["any:log:\"hello\"".to_string(), "log:hello".to_string()]
    );
    assert_eq!(view.pending_requests(), 0);
    assert_eq!(controller.pending_requests(), 0);
}

#[tokio::test]
async fn wildcard_sees_messages_without_named_handler() {
    let (controller, view) = linked_pair();
    let (tx, mut rx) = mpsc::unbounded_channel::<(String, Value)>();
    controller.on_any_message(move |name, payload| {
        let _ = tx.send((name.to_string(), payload.clone()));
    });

    view.send_raw("did-navigate", json!({"url": "https://example.com"}))
        .await;

    let (name, payload) = rx.recv().await.unwrap();
    assert_eq!(name, "did-navigate");
    assert_eq!(payload["url"], "https://example.com");
}

#[tokio::test]
async fn messages_arrive_in_send_order() {
    let (controller, view) = linked_pair();
    let (tx, mut rx) = mpsc::unbounded_channel();
    controller.on_message::<Log, _>(move |line| {
        let _ = tx.send(line);
    });

    for i in 0..200 {
        view.send::<Log>(format!("line {i}")).await;
    }
    for i in 0..200 {
        assert_eq!(rx.recv().await.unwrap(), format!("line {i}"));
    }
}

#[tokio::test]
async fn channel_close_rejects_pending_requests() {
    let (controller_t, view_t) = linked_transports();
    let controller: ControllerRpc = Rpc::bind(controller_t, Duration::from_secs(30));
    let view: ViewRpc = Rpc::bind(Arc::clone(&view_t), Duration::from_secs(30));
    view.handle_request::<Slow, _, _, String>(|ms| async move {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok("done".to_string())
    });

    let request = tokio::spawn({
        let controller = controller.clone();
        async move { controller.request::<Slow>(10_000).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(controller.pending_requests(), 1);

    view_t.close().await;

    let err = tokio::time::timeout(Duration::from_secs(2), request)
        .await
        .expect("request should settle promptly")
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, RpcError::ChannelClosed));
    assert_eq!(controller.pending_requests(), 0);

    let err = controller.request::<Ping>(()).await.unwrap_err();
    assert!(matches!(err, RpcError::ChannelClosed));
}

#[tokio::test]
async fn raw_and_typed_surfaces_interoperate() {
    let (controller, view) = linked_pair();
    view.handle_request_raw("echo", |params: Value| async move { Ok::<_, String>(params) });

    let value = controller
        .request_raw("echo", json!({"a": [1, 2, 3]}))
        .await
        .unwrap();
    assert_eq!(value, json!({"a": [1, 2, 3]}));
}

#[tokio::test]
async fn reregistering_replaces_handler() {
    let (controller, view) = linked_pair();
    view.handle_request::<Ping, _, _, String>(|()| async { Ok("first".to_string()) });
    view.handle_request::<Ping, _, _, String>(|()| async { Ok("second".to_string()) });

    assert_eq!(controller.request::<Ping>(()).await.unwrap(), "second");
}

//! End-to-end scenarios across both endpoints.
//!
//! Each test wires a caller-side [`Channel`] to a callee-side
//! [`Responder`] (or to a raw peer port, when the test needs to control
//! response timing and order by hand).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::{Value, json};

use webext_channel::protocol::{Message, ResultPayload};
use webext_channel::tabs::{self, OpenTabParams};
use webext_channel::transport::{self, ws, WsServer};
use webext_channel::{CallId, Channel, Error, Responder, Result, TabHost, TabId, Where};

// ============================================================================
// Fixtures
// ============================================================================

/// Installs the test log subscriber; honors `RUST_LOG`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Tab host that records the last creation request.
struct RecordingHost {
    tab_id: TabId,
    called: AtomicBool,
    last: Mutex<Option<(String, bool)>>,
}

impl RecordingHost {
    fn new(tab_id: u32) -> Arc<Self> {
        Arc::new(Self {
            tab_id: TabId::new(tab_id),
            called: AtomicBool::new(false),
            last: Mutex::new(None),
        })
    }
}

#[async_trait::async_trait]
impl TabHost for RecordingHost {
    async fn create_tab(&self, url: &str, active: bool) -> Result<TabId> {
        self.called.store(true, Ordering::SeqCst);
        *self.last.lock() = Some((url.to_string(), active));
        Ok(self.tab_id)
    }
}

/// Connected channel plus the raw peer port, for hand-driven responses.
fn channel_with_raw_peer() -> (Channel, transport::Port) {
    let (listener, connector) = transport::listen();
    let channel = Channel::new(listener);
    let peer = connector.connect().expect("connect");
    (channel, peer)
}

fn success_response(kind: &str, id: CallId, result: Value) -> Message {
    Message::response(kind, id, &ResultPayload::success(result)).expect("response")
}

// ============================================================================
// Scenario A: full open-tab round trip
// ============================================================================

#[tokio::test]
async fn scenario_a_open_tab_resolves_with_tab_id() {
    init_tracing();

    let (listener, connector) = transport::listen();
    let channel = Channel::new(listener);

    let host = RecordingHost::new(42);
    let mut responder = Responder::new();
    tabs::register_open_tab(&mut responder, Arc::clone(&host) as Arc<dyn TabHost>);
    responder.serve(connector.connect().expect("connect"));

    channel.connect().await.expect("handshake");

    let tab_id = tabs::open_tab(&channel, "https://example.com", Where::Tab)
        .await
        .expect("open tab");

    assert_eq!(tab_id, TabId::new(42));
    assert!(host.called.load(Ordering::SeqCst));

    let (url, active) = host.last.lock().clone().expect("recorded");
    assert_eq!(url, "https://example.com/");
    assert!(active, "`tab` placement opens focused");

    assert_eq!(channel.pending_count(), 0);
}

#[tokio::test]
async fn background_placement_opens_inactive_tab() {
    let (listener, connector) = transport::listen();
    let channel = Channel::new(listener);

    let host = RecordingHost::new(7);
    let mut responder = Responder::new();
    tabs::register_open_tab(&mut responder, Arc::clone(&host) as Arc<dyn TabHost>);
    responder.serve(connector.connect().expect("connect"));

    channel.connect().await.expect("handshake");

    tabs::open_tab(&channel, "https://example.com", Where::TabShifted)
        .await
        .expect("open tab");

    let (_, active) = host.last.lock().clone().expect("recorded");
    assert!(!active, "`tabshifted` placement opens in background");
}

// ============================================================================
// Scenario B: out-of-order responses
// ============================================================================

#[tokio::test]
async fn scenario_b_out_of_order_responses_route_by_id() {
    let (channel, mut peer) = channel_with_raw_peer();
    channel.connect().await.expect("handshake");

    let first = {
        let channel = channel.clone();
        tokio::spawn(async move { channel.post_message("query", json!("first")).await })
    };
    let second = {
        let channel = channel.clone();
        tokio::spawn(async move { channel.post_message("query", json!("second")).await })
    };

    let request_a = peer.recv().await.expect("request a");
    let request_b = peer.recv().await.expect("request b");
    assert_ne!(request_a.id, request_b.id);

    // Answer in reverse arrival order; each future must still get its own
    // payload.
    peer.send(success_response(
        "query",
        request_b.id,
        json!({"echo": request_b.value.clone()}),
    ))
    .expect("send");
    peer.send(success_response(
        "query",
        request_a.id,
        json!({"echo": request_a.value.clone()}),
    ))
    .expect("send");

    let first = first.await.expect("join").expect("first call");
    let second = second.await.expect("join").expect("second call");

    assert_eq!(first, json!({"echo": "first"}));
    assert_eq!(second, json!({"echo": "second"}));
}

// ============================================================================
// Scenario C: handler failure propagates as data
// ============================================================================

#[tokio::test]
async fn scenario_c_handler_failure_rejects_with_its_message() {
    let (listener, connector) = transport::listen();
    let channel = Channel::new(listener);

    let mut responder = Responder::new();
    responder.register("fetch", |_| async move {
        Err::<Value, _>(Error::handler("bad url"))
    });
    responder.serve(connector.connect().expect("connect"));

    channel.connect().await.expect("handshake");

    let err = channel
        .post_message("fetch", json!({"url": "https://example.com"}))
        .await
        .unwrap_err();

    assert!(matches!(&err, Error::Handler { message } if message == "bad url"));
    assert_eq!(err.to_string(), "bad url");
}

// ============================================================================
// Pending-call properties
// ============================================================================

#[tokio::test]
async fn concurrent_calls_get_pairwise_distinct_ids() {
    let (channel, mut peer) = channel_with_raw_peer();
    channel.connect().await.expect("handshake");

    const CALLS: usize = 10;
    let mut tasks = Vec::with_capacity(CALLS);
    for n in 0..CALLS {
        let channel = channel.clone();
        tasks.push(tokio::spawn(async move {
            channel.post_message("query", json!(n)).await
        }));
    }

    let mut ids = Vec::with_capacity(CALLS);
    for _ in 0..CALLS {
        ids.push(peer.recv().await.expect("request").id);
    }

    let mut deduped = ids.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(deduped.len(), CALLS, "ids must be pairwise distinct");
    assert_eq!(channel.pending_count(), CALLS);

    channel.destroy();
    for task in tasks {
        let err = task.await.expect("join").unwrap_err();
        assert!(matches!(err, Error::ChannelDestroyed));
    }
}

#[tokio::test]
async fn unknown_request_type_fails_instead_of_hanging() {
    let (listener, connector) = transport::listen();
    let channel = Channel::new(listener);
    Responder::new().serve(connector.connect().expect("connect"));

    channel.connect().await.expect("handshake");

    let err = channel.post_message("mystery", json!(null)).await.unwrap_err();
    assert!(matches!(&err, Error::Handler { message } if message == "Unknown request type: mystery"));
}

#[tokio::test]
async fn bad_where_value_fails_without_side_effect() {
    let (listener, connector) = transport::listen();
    let channel = Channel::new(listener);

    let host = RecordingHost::new(1);
    let mut responder = Responder::new();
    tabs::register_open_tab(&mut responder, Arc::clone(&host) as Arc<dyn TabHost>);
    responder.serve(connector.connect().expect("connect"));

    channel.connect().await.expect("handshake");

    // Bypass the typed helper to put an out-of-range discriminator on the
    // wire.
    let params = OpenTabParams {
        url: "https://example.com".to_string(),
        target: "tabsfoo".to_string(),
    };
    let err = channel.post_message(tabs::OPEN_TAB, params).await.unwrap_err();

    assert!(err.to_string().contains("unexpected where type: tabsfoo"));
    assert!(!host.called.load(Ordering::SeqCst), "no tab may be created");
}

#[tokio::test]
async fn oversized_tab_id_result_is_a_protocol_error() {
    let (channel, mut peer) = channel_with_raw_peer();
    channel.connect().await.expect("handshake");

    let call = {
        let channel = channel.clone();
        tokio::spawn(
            async move { tabs::open_tab(&channel, "https://example.com", Where::Tab).await },
        )
    };

    // A foreign responder answers with an id no real tab can have.
    let request = peer.recv().await.expect("request");
    peer.send(success_response(
        tabs::OPEN_TAB,
        request.id,
        json!(u64::from(u32::MAX) + 1),
    ))
    .expect("send");

    let err = call.await.expect("join").unwrap_err();
    assert!(matches!(err, Error::Protocol { .. }));
    assert!(err.to_string().contains("not a tab id"));
}

// ============================================================================
// WebSocket bridge
// ============================================================================

#[tokio::test]
async fn open_tab_over_websocket_bridge() {
    init_tracing();

    let server = WsServer::bind("127.0.0.1".parse().expect("ip"), 0)
        .await
        .expect("bind");
    let url = server.ws_url();

    // Callee endpoint, as it would run in the background script's process.
    let host = RecordingHost::new(42);
    let callee_host = Arc::clone(&host);
    let callee = tokio::spawn(async move {
        let port = ws::connect(&url).await.expect("client connect");
        let mut responder = Responder::new();
        tabs::register_open_tab(&mut responder, callee_host as Arc<dyn TabHost>);
        responder.serve(port).await.expect("serve");
    });

    let port = server.accept().await.expect("accept");
    let channel = Channel::from_port(port);
    channel.connect().await.expect("ready immediately");

    let tab_id = tabs::open_tab(&channel, "https://example.com", Where::Tab)
        .await
        .expect("open tab");
    assert_eq!(tab_id, TabId::new(42));

    channel.destroy();
    callee.await.expect("callee task");
}

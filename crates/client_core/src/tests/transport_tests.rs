use super::*;
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::{net::TcpListener, time::timeout};

use crate::config::ClientSettings;

#[derive(Debug, Deserialize)]
struct WsQuery {
    namespace: String,
}

#[derive(Clone)]
struct ServerState {
    connections: Arc<AtomicUsize>,
    close_after_send: bool,
    acks: Arc<tokio::sync::Mutex<Vec<Envelope>>>,
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<ServerState>,
    Query(q): Query<WsQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_socket(state, socket, q.namespace))
}

async fn serve_socket(state: ServerState, mut socket: WebSocket, namespace: String) {
    let connection = state.connections.fetch_add(1, Ordering::SeqCst) + 1;
    let frames = [
        json!({"namespace": "/other", "event": "serial_comm", "data": {"data": "foreign"}}),
        json!("not an envelope"),
        json!({
            "namespace": namespace,
            "event": "serial_comm",
            "data": {"data": format!("connection {connection}")},
            "ack_id": connection,
        }),
    ];
    for frame in frames {
        let text = match frame {
            serde_json::Value::String(raw) => raw,
            other => other.to_string(),
        };
        if socket.send(WsMessage::Text(text)).await.is_err() {
            return;
        }
    }
    if state.close_after_send {
        let _ = socket.send(WsMessage::Close(None)).await;
        return;
    }
    while let Some(Ok(msg)) = socket.recv().await {
        if let WsMessage::Text(text) = msg {
            if let Ok(envelope) = serde_json::from_str::<Envelope>(&text) {
                state.acks.lock().await.push(envelope);
            }
        }
    }
}

async fn spawn_ws_server(close_after_send: bool) -> (String, ServerState) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let state = ServerState {
        connections: Arc::new(AtomicUsize::new(0)),
        close_after_send,
        acks: Arc::new(tokio::sync::Mutex::new(Vec::new())),
    };
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), state)
}

fn settings_for(server_url: String) -> ClientSettings {
    ClientSettings {
        server_url,
        reconnect_initial_delay_ms: 10,
        reconnect_max_delay_ms: 50,
        ..ClientSettings::default()
    }
}

async fn next(transport: &mut WsTransport) -> TransportFrame {
    timeout(Duration::from_secs(5), transport.next_frame())
        .await
        .expect("frame in time")
        .expect("transport open")
}

#[test]
fn ws_url_rewrites_scheme_and_appends_namespace() {
    let url = ws_url("http://127.0.0.1:5000", &Namespace::default()).expect("url");
    assert_eq!(url.as_str(), "ws://127.0.0.1:5000/ws?namespace=%2Frti");

    let url = ws_url("https://adcp.example/app/", &Namespace::default()).expect("url");
    assert_eq!(url.as_str(), "wss://adcp.example/app/ws?namespace=%2Frti");
}

#[test]
fn ws_url_rejects_other_schemes() {
    let err = ws_url("ftp://adcp.example", &Namespace::default()).expect_err("must fail");
    assert!(matches!(err, ClientError::InvalidUrl { .. }));
}

#[test]
fn backoff_doubles_up_to_max_and_resets() {
    let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(300));
    assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    assert_eq!(backoff.next_delay(), Duration::from_millis(200));
    assert_eq!(backoff.next_delay(), Duration::from_millis(300));
    assert_eq!(backoff.next_delay(), Duration::from_millis(300));
    backoff.reset();
    assert_eq!(backoff.next_delay(), Duration::from_millis(100));
}

#[tokio::test]
async fn delivers_only_frames_for_its_namespace() {
    let (server_url, _state) = spawn_ws_server(false).await;
    let mut transport = WsTransport::new(&settings_for(server_url)).expect("transport");
    transport.connect().await.expect("connect");

    assert!(matches!(next(&mut transport).await, TransportFrame::Connected));
    match next(&mut transport).await {
        TransportFrame::Event(event) => {
            assert_eq!(event.tag, "serial_comm");
            assert_eq!(event.payload, json!({"data": "connection 1"}));
        }
        other => panic!("unexpected frame: {other:?}"),
    }
    transport.disconnect().await;
    assert!(transport.next_frame().await.is_none());
}

#[tokio::test]
async fn acknowledgements_are_written_back() {
    let (server_url, state) = spawn_ws_server(false).await;
    let mut transport = WsTransport::new(&settings_for(server_url)).expect("transport");
    transport.connect().await.expect("connect");
    assert!(matches!(next(&mut transport).await, TransportFrame::Connected));

    let TransportFrame::Event(mut event) = next(&mut transport).await else {
        panic!("expected event");
    };
    let ack = event.ack.take().expect("ack requested");
    assert_eq!(ack.ack_id(), 1);
    ack.send(json!({"received": true})).expect("queue ack");

    // The ack is flushed while the transport waits for the next frame.
    let _ = timeout(Duration::from_millis(300), transport.next_frame()).await;

    let acks = state.acks.lock().await.clone();
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].event, "ack");
    assert_eq!(acks[0].ack_id, Some(1));
    assert_eq!(acks[0].data, json!({"received": true}));
}

#[tokio::test]
async fn reconnects_after_server_close() {
    let (server_url, state) = spawn_ws_server(true).await;
    let mut transport = WsTransport::new(&settings_for(server_url)).expect("transport");
    transport.connect().await.expect("connect");

    assert!(matches!(next(&mut transport).await, TransportFrame::Connected));
    assert!(matches!(next(&mut transport).await, TransportFrame::Event(_)));
    assert!(matches!(
        next(&mut transport).await,
        TransportFrame::Disconnected {
            reconnecting: true,
            ..
        }
    ));
    assert!(matches!(next(&mut transport).await, TransportFrame::Connected));
    match next(&mut transport).await {
        TransportFrame::Event(event) => {
            assert_eq!(event.payload, json!({"data": "connection 2"}));
        }
        other => panic!("unexpected frame: {other:?}"),
    }
    assert!(state.connections.load(Ordering::SeqCst) >= 2);
    transport.disconnect().await;
}

#[tokio::test]
async fn connect_fails_when_nothing_listens() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let mut transport =
        WsTransport::new(&settings_for(format!("http://{addr}"))).expect("transport");
    let err = transport.connect().await.expect_err("must fail");
    assert!(matches!(err, ClientError::Connect { .. }));
}

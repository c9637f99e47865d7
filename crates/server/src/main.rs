use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use shared::{
    domain::Namespace,
    error::{ApiError, ErrorCode},
    protocol::{Envelope, EventTag, StatusReport, ACK_EVENT},
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

mod app_state;
mod config;

use app_state::AppState;
use config::load_settings;

#[derive(Debug, Deserialize)]
struct WsQuery {
    #[serde(default)]
    namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmitRequest {
    namespace: Option<String>,
    event: String,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    ack_id: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings()?;
    let (events, _) = broadcast::channel(settings.event_buffer.max(1));
    let state = Arc::new(AppState {
        namespace: settings.namespace.clone(),
        events,
    });

    if let Some(interval) = settings.heartbeat_interval() {
        tokio::spawn(heartbeat_loop(Arc::clone(&state), interval));
    }

    let app = build_router(state);
    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, namespace = %settings.namespace, "telemetry relay listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/emit", post(emit))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

fn status_report(namespace: &Namespace, count: i64) -> serde_json::Result<Envelope> {
    Envelope::tagged(
        namespace.clone(),
        EventTag::StatusReport,
        &StatusReport {
            count,
            data: "Server generated event".into(),
        },
    )
}

/// Debug heartbeat so clients can see the channel is alive.
async fn heartbeat_loop(state: Arc<AppState>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    let mut count = 0i64;
    loop {
        ticker.tick().await;
        count += 1;
        match status_report(&state.namespace, count) {
            Ok(envelope) => {
                let _ = state.events.send(envelope);
            }
            Err(err) => warn!(%err, "failed to encode status report"),
        }
    }
}

async fn emit(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EmitRequest>,
) -> Result<StatusCode, (StatusCode, Json<ApiError>)> {
    let namespace = match req.namespace {
        Some(raw) => Namespace::parse(raw)
            .map_err(|err| (StatusCode::BAD_REQUEST, Json(ApiError::from(err))))?,
        None => state.namespace.clone(),
    };
    if req.event.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(ErrorCode::Validation, "event name is required")),
        ));
    }
    if req.event == ACK_EVENT {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(
                ErrorCode::Validation,
                format!("{ACK_EVENT} is reserved for client acknowledgements"),
            )),
        ));
    }
    if EventTag::lookup(&req.event).is_some_and(EventTag::is_lifecycle) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(
                ErrorCode::Validation,
                format!("{} is a client lifecycle event", req.event),
            )),
        ));
    }

    let mut envelope = Envelope::new(namespace, req.event, req.data);
    envelope.ack_id = req.ack_id;
    let receivers = state.events.send(envelope).unwrap_or(0);
    debug!(receivers, "event relayed");
    Ok(StatusCode::ACCEPTED)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(q): Query<WsQuery>,
) -> Result<impl IntoResponse, (StatusCode, Json<ApiError>)> {
    let namespace = match q.namespace {
        Some(raw) => Namespace::parse(raw)
            .map_err(|err| (StatusCode::BAD_REQUEST, Json(ApiError::from(err))))?,
        None => state.namespace.clone(),
    };
    Ok(ws.on_upgrade(move |socket| ws_connection(state, socket, namespace)))
}

async fn ws_connection(state: Arc<AppState>, socket: WebSocket, namespace: Namespace) {
    let (mut sender, mut receiver) = socket.split();
    let mut events_rx = state.events.subscribe();
    info!(%namespace, "client subscribed");

    let send_namespace = namespace.clone();
    let send_task = tokio::spawn(async move {
        loop {
            let envelope = match events_rx.recv().await {
                Ok(envelope) => envelope,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "slow client skipped events");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            if envelope.namespace != send_namespace {
                continue;
            }
            let text = match serde_json::to_string(&envelope) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        let Message::Text(text) = msg else {
            continue;
        };
        match serde_json::from_str::<Envelope>(&text) {
            Ok(envelope) if envelope.event == ACK_EVENT => {
                info!(%namespace, ack_id = ?envelope.ack_id, "client acknowledged event");
            }
            Ok(envelope) => {
                debug!(%namespace, event = %envelope.event, "ignoring client event");
            }
            Err(err) => debug!(%err, "ignoring malformed client frame"),
        }
    }

    send_task.abort();
    info!(%namespace, "client unsubscribed");
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;

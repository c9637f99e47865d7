//! Channel transport capability and its websocket implementation.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use shared::{domain::Namespace, protocol::Envelope};
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use crate::{config::ClientSettings, error::ClientError, event::Event};

#[derive(Debug)]
pub enum TransportFrame {
    Connected,
    Disconnected { reason: String, reconnecting: bool },
    Event(Event),
}

/// Bidirectional, auto-reconnecting named-event channel bound to one namespace.
#[async_trait]
pub trait ChannelTransport: Send {
    fn namespace(&self) -> &Namespace;

    async fn connect(&mut self) -> Result<(), ClientError>;

    /// Next frame in arrival order; `None` once the transport has shut down.
    async fn next_frame(&mut self) -> Option<TransportFrame>;

    async fn disconnect(&mut self);
}

pub fn ws_url(server_url: &str, namespace: &Namespace) -> Result<Url, ClientError> {
    let invalid = |reason: &str| ClientError::InvalidUrl {
        url: server_url.to_string(),
        reason: reason.to_string(),
    };
    let mut url = Url::parse(server_url).map_err(|err| invalid(&err.to_string()))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        _ => return Err(invalid("scheme must be http, https, ws or wss")),
    };
    url.set_scheme(scheme)
        .map_err(|_| invalid("scheme cannot be rewritten"))?;
    let path = format!("{}/ws", url.path().trim_end_matches('/'));
    url.set_path(&path);
    url.set_query(None);
    url.query_pairs_mut()
        .append_pair("namespace", namespace.as_str());
    Ok(url)
}

#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let initial = initial.max(Duration::from_millis(1));
        Self {
            initial,
            max: max.max(initial),
            current: initial,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum Step {
    Ack(Envelope),
    Incoming(Option<Result<Message, tokio_tungstenite::tungstenite::Error>>),
}

pub struct WsTransport {
    url: Url,
    namespace: Namespace,
    backoff: Backoff,
    stream: Option<WsStream>,
    announce_connected: bool,
    closed: bool,
    ack_tx: mpsc::UnboundedSender<Envelope>,
    ack_rx: mpsc::UnboundedReceiver<Envelope>,
}

impl WsTransport {
    pub fn new(settings: &ClientSettings) -> Result<Self, ClientError> {
        let url = ws_url(&settings.server_url, &settings.namespace)?;
        let (ack_tx, ack_rx) = mpsc::unbounded_channel();
        Ok(Self {
            url,
            namespace: settings.namespace.clone(),
            backoff: Backoff::new(
                Duration::from_millis(settings.reconnect_initial_delay_ms),
                Duration::from_millis(settings.reconnect_max_delay_ms),
            ),
            stream: None,
            announce_connected: false,
            closed: false,
            ack_tx,
            ack_rx,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn open(&self) -> Result<WsStream, ClientError> {
        let (stream, _) =
            connect_async(self.url.as_str())
                .await
                .map_err(|err| ClientError::Connect {
                    url: self.url.to_string(),
                    message: err.to_string(),
                })?;
        Ok(stream)
    }

    fn dropped(&mut self, reason: String) -> TransportFrame {
        self.stream = None;
        warn!(namespace = %self.namespace, %reason, "websocket dropped; reconnecting");
        TransportFrame::Disconnected {
            reason,
            reconnecting: true,
        }
    }

    fn decode(&self, text: &str) -> Option<Event> {
        let envelope = match serde_json::from_str::<Envelope>(text) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(%err, "skipping malformed frame");
                return None;
            }
        };
        if envelope.namespace != self.namespace {
            debug!(
                namespace = %envelope.namespace,
                event = %envelope.event,
                "skipping frame for another namespace"
            );
            return None;
        }
        Some(Event::from_envelope(envelope, &self.ack_tx))
    }
}

#[async_trait]
impl ChannelTransport for WsTransport {
    fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    async fn connect(&mut self) -> Result<(), ClientError> {
        let stream = self.open().await?;
        info!(url = %self.url, "websocket connected");
        self.stream = Some(stream);
        self.closed = false;
        self.announce_connected = true;
        self.backoff.reset();
        Ok(())
    }

    async fn next_frame(&mut self) -> Option<TransportFrame> {
        loop {
            if self.closed {
                return None;
            }
            if self.announce_connected {
                self.announce_connected = false;
                return Some(TransportFrame::Connected);
            }

            let Some(stream) = self.stream.as_mut() else {
                let delay = self.backoff.next_delay();
                tokio::time::sleep(delay).await;
                match self.open().await {
                    Ok(stream) => {
                        info!(url = %self.url, "websocket reconnected");
                        self.stream = Some(stream);
                        self.backoff.reset();
                        return Some(TransportFrame::Connected);
                    }
                    Err(err) => {
                        warn!(%err, waited_ms = delay.as_millis() as u64, "reconnect attempt failed");
                        continue;
                    }
                }
            };

            let step = tokio::select! {
                Some(ack) = self.ack_rx.recv() => Step::Ack(ack),
                msg = stream.next() => Step::Incoming(msg),
            };

            match step {
                Step::Ack(ack) => {
                    let text = match serde_json::to_string(&ack) {
                        Ok(text) => text,
                        Err(err) => {
                            warn!(%err, "failed to encode acknowledgement");
                            continue;
                        }
                    };
                    let sent = match self.stream.as_mut() {
                        Some(stream) => stream.send(Message::Text(text)).await,
                        None => continue,
                    };
                    if let Err(err) = sent {
                        return Some(self.dropped(format!("acknowledgement send failed: {err}")));
                    }
                }
                Step::Incoming(Some(Ok(Message::Text(text)))) => {
                    if let Some(event) = self.decode(&text) {
                        return Some(TransportFrame::Event(event));
                    }
                }
                Step::Incoming(Some(Ok(Message::Close(_)))) => {
                    return Some(self.dropped("server closed the connection".into()));
                }
                Step::Incoming(Some(Ok(_))) => {}
                Step::Incoming(Some(Err(err))) => {
                    return Some(self.dropped(format!("websocket receive failed: {err}")));
                }
                Step::Incoming(None) => {
                    return Some(self.dropped("websocket stream ended".into()));
                }
            }
        }
    }

    async fn disconnect(&mut self) {
        self.closed = true;
        self.announce_connected = false;
        if let Some(mut stream) = self.stream.take() {
            if let Err(err) = stream.close(None).await {
                debug!(%err, "websocket close handshake failed");
            }
        }
        info!(namespace = %self.namespace, "websocket disconnected");
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;

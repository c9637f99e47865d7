use shared::protocol::EventTag;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("event tag {0:?} is not part of the telemetry protocol")]
    UnsupportedTag(String),
    #[error("a handler is already registered for {0}")]
    DuplicateHandler(EventTag),
    #[error("invalid {tag} payload: {source}")]
    InvalidPayload {
        tag: EventTag,
        #[source]
        source: serde_json::Error,
    },
    #[error("{tag} handler failed: {message}")]
    HandlerFailure { tag: EventTag, message: String },
    #[error("plot update received before the plot was initialized")]
    OutOfOrderUpdate,
    #[error("plot init carries {x_len} x values but {y_len} y values")]
    PlotLengthMismatch { x_len: usize, y_len: usize },
    #[error("transport dropped: {0}")]
    TransportDrop(String),
    #[error("failed to connect websocket {url}: {message}")]
    Connect { url: String, message: String },
    #[error("invalid server url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl ClientError {
    pub fn handler(tag: EventTag, message: impl Into<String>) -> Self {
        Self::HandlerFailure {
            tag,
            message: message.into(),
        }
    }
}

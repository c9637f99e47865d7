//! Client-side view of a received event and its optional acknowledgement.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::{
    domain::Namespace,
    protocol::{Envelope, EventTag},
};
use tokio::sync::mpsc;

use crate::error::ClientError;

#[derive(Debug)]
pub struct Event {
    pub tag: String,
    pub payload: Value,
    pub ack: Option<Acknowledgement>,
    pub received_at: DateTime<Utc>,
}

impl Event {
    pub fn new(tag: impl Into<String>, payload: Value) -> Self {
        Self {
            tag: tag.into(),
            payload,
            ack: None,
            received_at: Utc::now(),
        }
    }

    pub fn lifecycle(tag: EventTag) -> Self {
        Self::new(tag.as_str(), Value::Null)
    }

    /// Builds an event from a wire envelope. When the server asked for an
    /// acknowledgement, the returned event carries a handle that writes back
    /// through `ack_tx`.
    pub fn from_envelope(envelope: Envelope, ack_tx: &mpsc::UnboundedSender<Envelope>) -> Self {
        let ack = envelope.ack_id.map(|ack_id| Acknowledgement {
            namespace: envelope.namespace.clone(),
            ack_id,
            tx: ack_tx.clone(),
        });
        Self {
            tag: envelope.event,
            payload: envelope.data,
            ack,
            received_at: Utc::now(),
        }
    }

    pub fn known_tag(&self) -> Option<EventTag> {
        EventTag::lookup(&self.tag)
    }

    pub fn decode<T: DeserializeOwned>(&self, tag: EventTag) -> Result<T, ClientError> {
        serde_json::from_value(self.payload.clone())
            .map_err(|source| ClientError::InvalidPayload { tag, source })
    }
}

/// Capability to acknowledge receipt of one event back over the channel.
#[derive(Debug)]
pub struct Acknowledgement {
    namespace: Namespace,
    ack_id: u64,
    tx: mpsc::UnboundedSender<Envelope>,
}

impl Acknowledgement {
    pub fn ack_id(&self) -> u64 {
        self.ack_id
    }

    pub fn send(self, data: Value) -> Result<(), ClientError> {
        self.tx
            .send(Envelope::ack(self.namespace, self.ack_id, data))
            .map_err(|_| ClientError::TransportDrop("acknowledgement channel closed".into()))
    }
}

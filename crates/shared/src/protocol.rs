use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::{EnsembleNumber, Namespace, PlotValue};

/// Event name used for acknowledgement frames sent back to the server.
pub const ACK_EVENT: &str = "ack";

/// Closed set of event tags a telemetry client may receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventTag {
    Connect,
    Disconnect,
    StatusReport,
    SerialComm,
    AdcpEns,
    InitPlots,
    UpdateVoltPlot,
}

impl EventTag {
    pub const ALL: [EventTag; 7] = [
        EventTag::Connect,
        EventTag::Disconnect,
        EventTag::StatusReport,
        EventTag::SerialComm,
        EventTag::AdcpEns,
        EventTag::InitPlots,
        EventTag::UpdateVoltPlot,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventTag::Connect => "connect",
            EventTag::Disconnect => "disconnect",
            EventTag::StatusReport => "status_report",
            EventTag::SerialComm => "serial_comm",
            EventTag::AdcpEns => "adcp_ens",
            EventTag::InitPlots => "init_plots",
            EventTag::UpdateVoltPlot => "update_volt_plot",
        }
    }

    /// Lifecycle tags are produced locally by the transport, never by the server.
    pub fn is_lifecycle(self) -> bool {
        matches!(self, EventTag::Connect | EventTag::Disconnect)
    }

    pub fn lookup(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| tag.as_str() == raw)
    }
}

impl fmt::Display for EventTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown event tag: {0}")]
pub struct UnknownEventTag(pub String);

impl FromStr for EventTag {
    type Err = UnknownEventTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lookup(s).ok_or_else(|| UnknownEventTag(s.to_string()))
    }
}

/// One named message as carried on the wire, in either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub namespace: Namespace,
    pub event: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack_id: Option<u64>,
}

impl Envelope {
    pub fn new(namespace: Namespace, event: impl Into<String>, data: Value) -> Self {
        Self {
            namespace,
            event: event.into(),
            data,
            ack_id: None,
        }
    }

    pub fn tagged<T: Serialize>(
        namespace: Namespace,
        tag: EventTag,
        payload: &T,
    ) -> serde_json::Result<Self> {
        Ok(Self::new(namespace, tag.as_str(), serde_json::to_value(payload)?))
    }

    pub fn with_ack_id(mut self, ack_id: u64) -> Self {
        self.ack_id = Some(ack_id);
        self
    }

    pub fn ack(namespace: Namespace, ack_id: u64, data: Value) -> Self {
        Self::new(namespace, ACK_EVENT, data).with_ack_id(ack_id)
    }

    pub fn tag(&self) -> Option<EventTag> {
        EventTag::lookup(&self.event)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub count: i64,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialComm {
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdcpEns {
    pub adcp_ens_num: EnsembleNumber,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitPlots {
    pub x: Vec<PlotValue>,
    pub y: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateVoltPlot {
    pub x: PlotValue,
    pub y: f64,
}

//! State slices projected from incoming telemetry events.
//!
//! Each projection is the only writer of its slice. Changes are announced on a
//! broadcast channel so renderers can refresh on their own schedule; nobody
//! listening is not an error.

use chrono::{DateTime, Utc};
use shared::{
    domain::{EnsembleNumber, PlotPoint},
    protocol::{AdcpEns, SerialComm, StatusReport},
};
use tokio::sync::broadcast;
use tracing::trace;

use crate::event::Acknowledgement;

pub mod plot;

pub use plot::{PlotOptions, PlotProjection};

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionUpdate {
    Console {
        text: String,
    },
    Ensemble {
        ensemble_label: String,
        status_label: String,
    },
    PlotSeeded {
        points: Vec<PlotPoint>,
    },
    PlotAppended {
        point: PlotPoint,
    },
}

pub(crate) fn publish(updates: &broadcast::Sender<ProjectionUpdate>, update: ProjectionUpdate) {
    let _ = updates.send(update);
}

/// Latest serial-communication log content.
#[derive(Debug)]
pub struct ConsoleState {
    text: String,
    updated_at: Option<DateTime<Utc>>,
    updates: broadcast::Sender<ProjectionUpdate>,
}

impl ConsoleState {
    fn new(updates: broadcast::Sender<ProjectionUpdate>) -> Self {
        Self {
            text: String::new(),
            updated_at: None,
            updates,
        }
    }

    /// Replaces the buffer; content is pre-rendered upstream and kept verbatim.
    pub fn apply(&mut self, payload: SerialComm, at: DateTime<Utc>) {
        self.text = payload.data;
        self.updated_at = Some(at);
        publish(
            &self.updates,
            ProjectionUpdate::Console {
                text: self.text.clone(),
            },
        );
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

/// Current ensemble number, mirrored into the header and status-bar labels.
#[derive(Debug)]
pub struct EnsembleState {
    number: Option<EnsembleNumber>,
    ensemble_label: String,
    status_label: String,
    updates: broadcast::Sender<ProjectionUpdate>,
}

impl EnsembleState {
    fn new(updates: broadcast::Sender<ProjectionUpdate>) -> Self {
        Self {
            number: None,
            ensemble_label: String::new(),
            status_label: String::new(),
            updates,
        }
    }

    pub fn apply(&mut self, payload: AdcpEns) {
        let label = payload.adcp_ens_num.to_string();
        self.ensemble_label = label.clone();
        self.status_label = label;
        self.number = Some(payload.adcp_ens_num);
        publish(
            &self.updates,
            ProjectionUpdate::Ensemble {
                ensemble_label: self.ensemble_label.clone(),
                status_label: self.status_label.clone(),
            },
        );
    }

    pub fn number(&self) -> Option<&EnsembleNumber> {
        self.number.as_ref()
    }

    pub fn labels(&self) -> (&str, &str) {
        (&self.ensemble_label, &self.status_label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionSnapshot {
    pub console: String,
    pub ensemble_number: Option<EnsembleNumber>,
    pub ensemble_label: String,
    pub status_label: String,
    pub plot: Vec<PlotPoint>,
    pub plot_initialized: bool,
}

#[derive(Debug)]
pub struct Projections {
    pub console: ConsoleState,
    pub ensemble: EnsembleState,
    pub plot: PlotProjection,
    updates: broadcast::Sender<ProjectionUpdate>,
}

impl Projections {
    pub fn new(plot_options: PlotOptions, update_buffer: usize) -> Self {
        let (updates, _) = broadcast::channel(update_buffer.max(1));
        Self {
            console: ConsoleState::new(updates.clone()),
            ensemble: EnsembleState::new(updates.clone()),
            plot: PlotProjection::new(plot_options, updates.clone()),
            updates,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProjectionUpdate> {
        self.updates.subscribe()
    }

    /// Reserved hook: status reports mutate nothing and are never acknowledged.
    pub fn apply_status_report(&self, report: &StatusReport, ack: Option<Acknowledgement>) {
        trace!(
            count = report.count,
            ack_requested = ack.is_some(),
            "status report received"
        );
    }

    pub fn snapshot(&self) -> ProjectionSnapshot {
        let (ensemble_label, status_label) = self.ensemble.labels();
        ProjectionSnapshot {
            console: self.console.text().to_string(),
            ensemble_number: self.ensemble.number().cloned(),
            ensemble_label: ensemble_label.to_string(),
            status_label: status_label.to_string(),
            plot: self.plot.points().to_vec(),
            plot_initialized: self.plot.is_initialized(),
        }
    }
}

impl Default for Projections {
    fn default() -> Self {
        Self::new(PlotOptions::default(), 256)
    }
}

#[cfg(test)]
#[path = "../tests/projection_tests.rs"]
mod tests;

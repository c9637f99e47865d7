use serde::Deserialize;
use shared::domain::{PlotPoint, PlotValue};
use tokio::sync::broadcast;
use tracing::debug;

use super::{publish, ProjectionUpdate};
use crate::error::ClientError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PlotOptions {
    /// Announce the connect-time `(0, 0)` placeholder to renderers instead of
    /// waiting for the first server-sent seed.
    pub render_placeholder_seed: bool,
    /// The series never holds more than this many points; the oldest go first.
    pub max_points: Option<usize>,
}

/// Voltage time series. Two phases: seed with `init`, then `append`.
#[derive(Debug)]
pub struct PlotProjection {
    series: Vec<PlotPoint>,
    initialized: bool,
    placeholder: bool,
    options: PlotOptions,
    updates: broadcast::Sender<ProjectionUpdate>,
}

impl PlotProjection {
    pub(crate) fn new(options: PlotOptions, updates: broadcast::Sender<ProjectionUpdate>) -> Self {
        Self {
            series: Vec::new(),
            initialized: false,
            placeholder: false,
            options,
            updates,
        }
    }

    /// Replaces the whole series with the given points.
    pub fn init(&mut self, xs: Vec<PlotValue>, ys: Vec<f64>) -> Result<(), ClientError> {
        if xs.len() != ys.len() {
            return Err(ClientError::PlotLengthMismatch {
                x_len: xs.len(),
                y_len: ys.len(),
            });
        }
        self.series = xs
            .into_iter()
            .zip(ys)
            .map(|(x, y)| PlotPoint { x, y })
            .collect();
        self.enforce_cap();
        self.initialized = true;
        self.placeholder = false;
        publish(
            &self.updates,
            ProjectionUpdate::PlotSeeded {
                points: self.series.clone(),
            },
        );
        Ok(())
    }

    /// Seeds `(0, 0)` when nothing has seeded the plot yet. Returns whether
    /// the seed was applied; an initialized series is left alone so a
    /// reconnect never wipes collected samples.
    pub fn seed_placeholder(&mut self) -> bool {
        if self.initialized {
            return false;
        }
        self.series = vec![PlotPoint::origin()];
        self.initialized = true;
        self.placeholder = true;
        if self.options.render_placeholder_seed {
            publish(
                &self.updates,
                ProjectionUpdate::PlotSeeded {
                    points: self.series.clone(),
                },
            );
        }
        true
    }

    pub fn append(&mut self, x: PlotValue, y: f64) -> Result<(), ClientError> {
        if !self.initialized {
            return Err(ClientError::OutOfOrderUpdate);
        }
        let point = PlotPoint { x, y };
        self.series.push(point.clone());
        let evicted = self.enforce_cap();
        if self.placeholder && !self.options.render_placeholder_seed {
            debug!("plot sample held back until the first server seed");
            return Ok(());
        }
        // Renderers rebuild from the full series once samples fall off the front.
        let update = if evicted > 0 {
            ProjectionUpdate::PlotSeeded {
                points: self.series.clone(),
            }
        } else {
            ProjectionUpdate::PlotAppended { point }
        };
        publish(&self.updates, update);
        Ok(())
    }

    /// Drops the oldest points beyond `max_points`, returning how many went.
    fn enforce_cap(&mut self) -> usize {
        let Some(max) = self.options.max_points else {
            return 0;
        };
        let overflow = self.series.len().saturating_sub(max.max(1));
        if overflow > 0 {
            self.series.drain(..overflow);
        }
        overflow
    }

    pub fn points(&self) -> &[PlotPoint] {
        &self.series
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }
}

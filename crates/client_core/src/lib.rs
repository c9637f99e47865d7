use shared::protocol::EventTag;
use tokio::sync::{broadcast, watch};
use tracing::info;

pub mod config;
pub mod error;
pub mod event;
mod handlers;
pub mod projection;
pub mod router;
pub mod transport;

pub use config::{load_settings, ClientSettings};
pub use error::ClientError;
pub use event::{Acknowledgement, Event};
pub use handlers::register_telemetry_handlers;
pub use projection::{PlotOptions, ProjectionSnapshot, ProjectionUpdate, Projections};
pub use router::{ConnectionState, DispatchOutcome, EventRouter};
pub use transport::{ChannelTransport, TransportFrame, WsTransport};

/// Display client: one channel, the standard handlers, and the projections
/// they feed.
pub struct TelemetryClient {
    settings: ClientSettings,
    router: EventRouter,
}

impl TelemetryClient {
    pub fn new(settings: ClientSettings) -> Result<Self, ClientError> {
        let projections = Projections::new(settings.plot.clone(), settings.update_buffer);
        let mut router = EventRouter::new(projections);
        register_telemetry_handlers(&mut router)?;
        Ok(Self { settings, router })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn subscribe_updates(&self) -> broadcast::Receiver<ProjectionUpdate> {
        self.router.projections().subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        self.router.state()
    }

    pub fn snapshot(&self) -> ProjectionSnapshot {
        self.router.projections().snapshot()
    }

    pub fn dispatch(&mut self, event: Event) -> DispatchOutcome {
        self.router.dispatch(event)
    }

    pub async fn run_with<T>(
        &mut self,
        transport: &mut T,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), ClientError>
    where
        T: ChannelTransport + ?Sized,
    {
        self.router.connect(transport).await?;
        self.router.run(transport, shutdown).await;
        Ok(())
    }

    /// Connects over websocket to the configured server and dispatches until
    /// shutdown.
    pub async fn run(&mut self, shutdown: watch::Receiver<bool>) -> Result<(), ClientError> {
        let mut transport = WsTransport::new(&self.settings)?;
        info!(
            url = %transport.url(),
            tags = ?EventTag::ALL.map(EventTag::as_str),
            "starting telemetry client"
        );
        self.run_with(&mut transport, shutdown).await
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

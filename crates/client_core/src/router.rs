//! Routes incoming named events to exactly one handler each and tracks the
//! connection lifecycle.
//!
//! Dispatch is strictly sequential: `run` awaits one frame, hands it to its
//! handler synchronously and only then awaits the next. Handlers therefore
//! never overlap and the projections need no locking.

use std::{
    collections::HashMap,
    panic::{catch_unwind, AssertUnwindSafe},
};

use shared::protocol::EventTag;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    error::ClientError,
    event::Event,
    projection::Projections,
    transport::{ChannelTransport, TransportFrame},
};

pub type Handler = Box<dyn FnMut(&mut Projections, Event) -> Result<(), ClientError> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug)]
pub enum DispatchOutcome {
    Handled(EventTag),
    /// Unknown or unregistered tag; nothing changed.
    Ignored,
    Failed(ClientError),
}

impl DispatchOutcome {
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Handled(_))
    }
}

pub struct EventRouter {
    handlers: HashMap<EventTag, Handler>,
    projections: Projections,
    state: ConnectionState,
}

impl EventRouter {
    pub fn new(projections: Projections) -> Self {
        Self {
            handlers: HashMap::new(),
            projections,
            state: ConnectionState::Disconnected,
        }
    }

    /// Registers the handler for `tag`. Tags outside the protocol and second
    /// registrations for the same tag are rejected.
    pub fn on<F>(&mut self, tag: &str, handler: F) -> Result<(), ClientError>
    where
        F: FnMut(&mut Projections, Event) -> Result<(), ClientError> + Send + 'static,
    {
        let tag = EventTag::lookup(tag).ok_or_else(|| ClientError::UnsupportedTag(tag.into()))?;
        if self.handlers.contains_key(&tag) {
            return Err(ClientError::DuplicateHandler(tag));
        }
        self.handlers.insert(tag, Box::new(handler));
        Ok(())
    }

    pub fn is_registered(&self, tag: EventTag) -> bool {
        self.handlers.contains_key(&tag)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn projections(&self) -> &Projections {
        &self.projections
    }

    pub fn dispatch(&mut self, event: Event) -> DispatchOutcome {
        let Some(tag) = event.known_tag() else {
            debug!(tag = %event.tag, "ignoring unknown event");
            return DispatchOutcome::Ignored;
        };
        let Some(handler) = self.handlers.get_mut(&tag) else {
            debug!(%tag, "no handler registered");
            return DispatchOutcome::Ignored;
        };

        let projections = &mut self.projections;
        let result = match catch_unwind(AssertUnwindSafe(|| handler(projections, event))) {
            Ok(result) => result,
            Err(panic) => Err(ClientError::handler(tag, panic_message(panic.as_ref()))),
        };
        match result {
            Ok(()) => DispatchOutcome::Handled(tag),
            Err(err) => {
                warn!(%tag, error = %err, "event handler failed; continuing");
                DispatchOutcome::Failed(err)
            }
        }
    }

    /// Applies one transport frame: lifecycle frames move the state machine
    /// and fire `connect`/`disconnect`, event frames go to `dispatch`.
    pub fn handle_frame(&mut self, frame: TransportFrame) -> DispatchOutcome {
        match frame {
            TransportFrame::Connected => {
                self.state = ConnectionState::Connected;
                info!("channel connected");
                self.dispatch(Event::lifecycle(EventTag::Connect))
            }
            TransportFrame::Disconnected {
                reason,
                reconnecting,
            } => {
                self.state = ConnectionState::Disconnected;
                info!(%reason, reconnecting, "channel disconnected");
                let outcome = self.dispatch(Event::lifecycle(EventTag::Disconnect));
                if reconnecting {
                    self.state = ConnectionState::Connecting;
                }
                outcome
            }
            TransportFrame::Event(event) => {
                if event.known_tag().is_some_and(EventTag::is_lifecycle) {
                    warn!(tag = %event.tag, "ignoring lifecycle tag sent by the server");
                    return DispatchOutcome::Ignored;
                }
                self.dispatch(event)
            }
        }
    }

    pub async fn connect<T>(&mut self, transport: &mut T) -> Result<(), ClientError>
    where
        T: ChannelTransport + ?Sized,
    {
        self.state = ConnectionState::Connecting;
        info!(namespace = %transport.namespace(), "connecting channel");
        if let Err(err) = transport.connect().await {
            self.state = ConnectionState::Disconnected;
            return Err(err);
        }
        Ok(())
    }

    /// Dispatches frames until the transport ends or `shutdown` flips to
    /// `true` (or its sender is dropped), then disconnects the transport.
    pub async fn run<T>(&mut self, transport: &mut T, mut shutdown: watch::Receiver<bool>)
    where
        T: ChannelTransport + ?Sized,
    {
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                frame = transport.next_frame() => match frame {
                    Some(frame) => {
                        self.handle_frame(frame);
                    }
                    None => break,
                },
            }
        }
        transport.disconnect().await;
        self.state = ConnectionState::Disconnected;
        info!("event router stopped");
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
#[path = "tests/router_tests.rs"]
mod tests;

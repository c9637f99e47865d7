use shared::{domain::Namespace, protocol::Envelope};
use tokio::sync::broadcast;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) namespace: Namespace,
    pub(crate) events: broadcast::Sender<Envelope>,
}

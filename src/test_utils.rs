use crate::messages::ServerToClient;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Everything currently queued for one connection, oldest first.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<Arc<ServerToClient>>) -> Vec<ServerToClient> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push((*msg).clone());
    }
    out
}

use crate::lobby::{LobbyError, LobbyRegistry};
use crate::messages::{CoordinatorMessage, Membership, ServerToClient};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Owns the lobby registry. Every create, join, relay and disconnect is one
/// message here and runs to completion before the next one is looked at.
pub async fn lobby_coordinator(mut rx: mpsc::UnboundedReceiver<CoordinatorMessage>) {
    let mut registry = LobbyRegistry::new();

    info!("Lobby coordinator started");

    while let Some(msg) = rx.recv().await {
        handle_coordinator_message(&mut registry, msg);
    }

    debug!("Lobby coordinator stopped with {} lobbies open", registry.len());
}

fn handle_coordinator_message(registry: &mut LobbyRegistry, msg: CoordinatorMessage) {
    match msg {
        CoordinatorMessage::CreateLobby {
            handle,
            name,
            version,
            previous,
            request_tx,
        } => {
            let client_id = handle.client_id;
            let lobby_code = registry.create(handle, &name, &version);
            leave_previous(registry, previous, client_id);
            let _ = request_tx.send(lobby_code);
        }

        CoordinatorMessage::JoinLobby {
            handle,
            name,
            lobby_code,
            version,
            previous,
            request_tx,
        } => {
            let client_id = handle.client_id;
            // A connection holds at most one slot per lobby, whatever name it
            // has identified with since.
            let result = match &previous {
                Some(current) if current.code == lobby_code => {
                    Err(LobbyError::AlreadyConnected(current.name.clone()))
                }
                _ => registry.join(handle, &name, &lobby_code, &version),
            };
            match &result {
                Ok(()) => leave_previous(registry, previous, client_id),
                Err(e) => debug!("{} could not join {}: {}", name, lobby_code, e),
            }
            let _ = request_tx.send(result);
        }

        CoordinatorMessage::Turn {
            client_id,
            membership,
            payload,
        } => {
            let turn = ServerToClient::turn(payload, &membership.name);
            if !registry.broadcast(&membership.code, turn, &[client_id]) {
                warn!(
                    "Turn from {} for missing lobby {}",
                    membership.name, membership.code
                );
            }
        }

        CoordinatorMessage::ClientDisconnected {
            client_id,
            membership,
        } => {
            registry.disconnect(&membership.code, &membership.name, client_id);
        }
    }
}

fn leave_previous(registry: &mut LobbyRegistry, previous: Option<Membership>, client_id: Uuid) {
    if let Some(previous) = previous {
        debug!("{} switching away from lobby {}", previous.name, previous.code);
        registry.disconnect(&previous.code, &previous.name, client_id);
    }
}

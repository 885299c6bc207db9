use serde_json::{Map, Value};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::lobby::{LobbyError, MemberHandle};

/// The lobby a connection currently belongs to, and the name it holds there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub code: String,
    pub name: String,
}

#[derive(Debug)]
pub enum CoordinatorMessage {
    /// A client wants to create a new lobby
    CreateLobby {
        handle: MemberHandle,
        name: String,
        version: String,
        /// Lobby to leave once the new one exists
        previous: Option<Membership>,
        request_tx: oneshot::Sender<String>,
    },
    /// A client wants to join an existing lobby
    JoinLobby {
        handle: MemberHandle,
        name: String,
        lobby_code: String,
        version: String,
        /// Lobby to leave if the join succeeds
        previous: Option<Membership>,
        request_tx: oneshot::Sender<Result<(), LobbyError>>,
    },

    /// Relay a turn to everyone else in the sender's lobby
    Turn {
        client_id: Uuid,
        membership: Membership,
        payload: Map<String, Value>,
    },

    /// Client disconnected, tombstone its slot
    ClientDisconnected {
        client_id: Uuid,
        membership: Membership,
    },
}

use crate::messages::ServerToClient;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Two players per lobby, no spectators.
pub const LOBBY_CAPACITY: usize = 2;

/// Outbound side of one connection, as seen by the lobbies it belongs to.
#[derive(Debug, Clone)]
pub struct MemberHandle {
    pub client_id: Uuid,
    pub tx: mpsc::UnboundedSender<Arc<ServerToClient>>,
}

impl MemberHandle {
    pub fn new(client_id: Uuid, tx: mpsc::UnboundedSender<Arc<ServerToClient>>) -> Self {
        Self { client_id, tx }
    }

    pub fn send(&self, response: Arc<ServerToClient>) {
        // A closed channel means the connection is already tearing down;
        // its own disconnect will reach the coordinator shortly.
        let _ = self.tx.send(response);
    }
}

#[derive(Debug, Clone)]
pub enum Member {
    Active(MemberHandle),
    Departed,
}

impl Member {
    pub fn is_active(&self) -> bool {
        matches!(self, Member::Active(_))
    }
}

#[derive(Debug)]
pub struct Lobby {
    pub code: String,
    pub version: String,
    pub capacity: usize,
    members: HashMap<String, Member>,
}

impl Lobby {
    pub fn new(code: String, version: String) -> Self {
        Self {
            code,
            version,
            capacity: LOBBY_CAPACITY,
            members: HashMap::new(),
        }
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    #[cfg(test)]
    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.get(name)
    }

    pub fn is_active_member(&self, name: &str) -> bool {
        self.members.get(name).is_some_and(Member::is_active)
    }

    /// Full for newcomers only: a name that already has a slot can always reclaim it.
    pub fn has_room_for(&self, name: &str) -> bool {
        self.members.contains_key(name) || self.members.len() < self.capacity
    }

    pub fn is_abandoned(&self) -> bool {
        self.members.values().all(|m| !m.is_active())
    }

    /// Places `handle` under `name`, replacing a tombstone if there is one.
    /// The newcomer first hears about everyone already present, then the whole
    /// lobby (newcomer included) hears about the newcomer.
    pub fn connect(&mut self, name: &str, handle: MemberHandle) {
        for (present, member) in &self.members {
            if member.is_active() && present != name {
                handle.send(Arc::new(ServerToClient::Connect {
                    name: present.clone(),
                }));
            }
        }
        self.members.insert(name.to_string(), Member::Active(handle));
        self.broadcast(ServerToClient::Connect {
            name: name.to_string(),
        });
    }

    /// Tombstones `name` if it is still held by `client_id`.
    /// Returns false when the slot belongs to someone else or is already departed.
    pub fn depart(&mut self, name: &str, client_id: Uuid) -> bool {
        let Some(Member::Active(handle)) = self.members.get(name) else {
            return false;
        };
        if handle.client_id != client_id {
            return false;
        }
        self.members.insert(name.to_string(), Member::Departed);
        self.broadcast(ServerToClient::Disconnect {
            name: name.to_string(),
        });
        true
    }

    fn broadcast_filtered<F>(&self, response: ServerToClient, filter: F)
    where
        F: Fn(&MemberHandle) -> bool,
    {
        let message = Arc::new(response);
        for member in self.members.values() {
            if let Member::Active(handle) = member {
                if filter(handle) {
                    handle.send(message.clone());
                }
            }
        }
    }

    pub fn broadcast(&self, response: ServerToClient) {
        self.broadcast_filtered(response, |_| true);
    }

    pub fn broadcast_except(&self, excluding: &[Uuid], response: ServerToClient) {
        self.broadcast_filtered(response, |h| !excluding.contains(&h.client_id));
    }
}

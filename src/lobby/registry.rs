use super::{
    error::LobbyError,
    lobby::{Lobby, MemberHandle},
};
use crate::messages::ServerToClient;
use rand::Rng;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const CODE_LENGTH: usize = 4;

/// Every active lobby, keyed by code.
///
/// Methods take `&mut self`, so whoever owns the registry decides the order in
/// which compound operations run. In the server that is the coordinator task,
/// which applies one request at a time.
#[derive(Debug, Default)]
pub struct LobbyRegistry {
    lobbies: HashMap<String, Lobby>,
}

impl LobbyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn get(&self, code: &str) -> Option<&Lobby> {
        self.lobbies.get(code)
    }

    #[cfg(test)]
    pub fn contains(&self, code: &str) -> bool {
        self.lobbies.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.lobbies.len()
    }

    pub fn generate_code(&self) -> String {
        self.generate_code_with(&mut rand::rng())
    }

    /// Draws codes until one is not in use.
    pub fn generate_code_with<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        loop {
            let code: String = (0..CODE_LENGTH)
                .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
                .collect();
            if !self.lobbies.contains_key(&code) {
                return code;
            }
        }
    }

    pub fn create(&mut self, handle: MemberHandle, name: &str, version: &str) -> String {
        let code = self.generate_code();
        let mut lobby = Lobby::new(code.clone(), version.to_string());
        lobby.connect(name, handle);
        lobby.broadcast(ServerToClient::Code { code: code.clone() });
        self.lobbies.insert(code.clone(), lobby);

        info!("Lobby {} created by {} (version {})", code, name, version);
        code
    }

    pub fn join(
        &mut self,
        handle: MemberHandle,
        name: &str,
        code: &str,
        version: &str,
    ) -> Result<(), LobbyError> {
        let lobby = self
            .lobbies
            .get_mut(code)
            .ok_or_else(|| LobbyError::NotFound(code.to_string()))?;

        if lobby.version != version {
            return Err(LobbyError::VersionMismatch {
                expected: lobby.version.clone(),
            });
        }
        if lobby.is_active_member(name) {
            return Err(LobbyError::AlreadyConnected(name.to_string()));
        }
        if !lobby.has_room_for(name) {
            return Err(LobbyError::LobbyFull(code.to_string()));
        }

        lobby.connect(name, handle);
        info!(
            "{} joined lobby {} ({}/{})",
            name,
            code,
            lobby.member_count(),
            lobby.capacity
        );
        Ok(())
    }

    /// Returns false if the lobby no longer exists.
    pub fn broadcast(&self, code: &str, response: ServerToClient, excluding: &[Uuid]) -> bool {
        match self.lobbies.get(code) {
            Some(lobby) => {
                lobby.broadcast_except(excluding, response);
                true
            }
            None => false,
        }
    }

    pub fn disconnect(&mut self, code: &str, name: &str, client_id: Uuid) {
        let Some(lobby) = self.lobbies.get_mut(code) else {
            debug!("Disconnect of {} from unknown lobby {}", name, code);
            return;
        };

        if !lobby.depart(name, client_id) {
            debug!("{} no longer holds a slot in lobby {}", name, code);
            return;
        }
        info!("{} left lobby {}", name, code);

        if lobby.is_abandoned() {
            info!("Deleting lobby {}", lobby.code);
            self.lobbies.remove(code);
        }
    }
}

use crate::messages::{ErrorType, ServerToClient};

/// Reasons a lobby join can be refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    #[error("lobby {0} does not exist")]
    NotFound(String),

    /// Carries the version the lobby was created with.
    #[error("lobby expects game version {expected}")]
    VersionMismatch { expected: String },

    #[error("{0} is already connected to this lobby")]
    AlreadyConnected(String),

    #[error("lobby {0} is full")]
    LobbyFull(String),
}

impl LobbyError {
    pub fn error_type(&self) -> ErrorType {
        match self {
            LobbyError::NotFound(_) => ErrorType::LobbyDoesntExist,
            LobbyError::VersionMismatch { .. } => ErrorType::MismatchedVersion,
            LobbyError::AlreadyConnected(_) => ErrorType::AlreadyConnected,
            LobbyError::LobbyFull(_) => ErrorType::LobbyFull,
        }
    }

    pub fn to_response(&self) -> ServerToClient {
        match self {
            LobbyError::VersionMismatch { expected } => {
                ServerToClient::error_with_message(self.error_type(), expected.clone())
            }
            _ => ServerToClient::error(self.error_type()),
        }
    }
}

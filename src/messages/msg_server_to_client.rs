use serde::Serialize;
use serde_json::{Map, Value};

/// Machine-readable error kinds sent in the `type` field of an error frame.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Unidentified,
    UnknownAction,
    NotInLobby,
    LobbyDoesntExist,
    MismatchedVersion,
    AlreadyConnected,
    LobbyFull,
}

// Server to Client Actions
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "action")]
pub enum ServerToClient {
    // Connection responses
    #[serde(rename = "message")]
    Message { message: String },
    #[serde(rename = "error")]
    Error {
        #[serde(rename = "type")]
        kind: ErrorType,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    // Lobby responses
    #[serde(rename = "code")]
    Code { code: String },
    #[serde(rename = "connect")]
    Connect { name: String },
    #[serde(rename = "disconnect")]
    Disconnect { name: String },

    // Relayed game payload, already stamped with the sender's name
    #[serde(rename = "turn")]
    Turn(Map<String, Value>),
}

impl ServerToClient {
    // Simple, safe JSON conversion - no unwrapping!
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"action":"error","type":"unknown_action","message":"Serialization failed"}"#
                .to_string()
        })
    }

    // Helper constructors for common responses
    pub fn greeting(name: &str, game_version: &str) -> Self {
        Self::Message {
            message: format!("Hi {} using {}", name, game_version),
        }
    }

    pub fn error(kind: ErrorType) -> Self {
        Self::Error {
            kind,
            message: None,
        }
    }

    pub fn error_with_message(kind: ErrorType, message: impl Into<String>) -> Self {
        Self::Error {
            kind,
            message: Some(message.into()),
        }
    }

    pub fn turn(mut payload: Map<String, Value>, sender: &str) -> Self {
        payload.remove("action");
        payload.insert("name".to_string(), Value::String(sender.to_string()));
        Self::Turn(payload)
    }
}

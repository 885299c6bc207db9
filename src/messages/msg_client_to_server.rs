use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "action")]
pub enum ClientToServer {
    // Connection actions
    #[serde(rename = "identify")]
    Identify { name: String, game_version: String },

    // Lobby actions
    #[serde(rename = "create")]
    Create {},
    #[serde(rename = "join")]
    Join { code: String },

    // Everything except the action tag, relayed untouched
    #[serde(rename = "turn")]
    Turn(Map<String, Value>),
}

impl ClientToServer {
    pub const ACTIONS: [&'static str; 4] = ["identify", "create", "join", "turn"];

    pub fn is_known_action(action: &str) -> bool {
        Self::ACTIONS.contains(&action)
    }
}

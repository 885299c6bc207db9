use crate::framing::{FrameError, LineReader};
use crate::lobby::MemberHandle;
use crate::messages::{ClientToServer, CoordinatorMessage, ErrorType, Membership, ServerToClient};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

// Core client identity, set by `identify`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientProfile {
    pub name: String,
    pub game_version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unidentified,
    Identified,
    InLobby,
}

/// Anything that ends a connection instead of producing an error frame.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("frame is not valid JSON: {0}")]
    MalformedJson(#[source] serde_json::Error),

    #[error("frame is not a JSON object")]
    NotAnObject,

    #[error("malformed {action} message: {source}")]
    MalformedAction {
        action: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("lobby coordinator is gone")]
    CoordinatorUnavailable,
}

/// A decoded frame. Unrecognised actions are not fatal, so they get their own arm.
#[derive(Debug, PartialEq)]
pub enum Frame {
    Action(ClientToServer),
    UnknownAction,
}

pub fn decode_frame(text: &str) -> Result<Frame, ClientError> {
    let value: Value = serde_json::from_str(text).map_err(ClientError::MalformedJson)?;
    if !value.is_object() {
        return Err(ClientError::NotAnObject);
    }

    let action = value.get("action").and_then(Value::as_str).map(str::to_owned);
    match action {
        Some(action) if ClientToServer::is_known_action(&action) => serde_json::from_value(value)
            .map(Frame::Action)
            .map_err(|source| ClientError::MalformedAction { action, source }),
        _ => Ok(Frame::UnknownAction),
    }
}

#[derive(Debug)]
pub struct Client {
    pub id: Uuid,
    pub profile: Option<ClientProfile>,
    pub current_lobby: Option<Membership>,
    coordinator_tx: mpsc::UnboundedSender<CoordinatorMessage>,
    response_tx: mpsc::UnboundedSender<Arc<ServerToClient>>,
}

impl Client {
    pub fn new(
        coordinator_tx: mpsc::UnboundedSender<CoordinatorMessage>,
        response_tx: mpsc::UnboundedSender<Arc<ServerToClient>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            profile: None,
            current_lobby: None,
            coordinator_tx,
            response_tx,
        }
    }

    pub fn state(&self) -> ConnectionState {
        match (&self.profile, &self.current_lobby) {
            (_, Some(_)) => ConnectionState::InLobby,
            (Some(_), None) => ConnectionState::Identified,
            (None, None) => ConnectionState::Unidentified,
        }
    }

    fn member_handle(&self) -> MemberHandle {
        MemberHandle::new(self.id, self.response_tx.clone())
    }

    pub fn send(&self, response: ServerToClient) {
        let _ = self.response_tx.send(Arc::new(response));
    }

    pub fn send_error(&self, kind: ErrorType) {
        self.send(ServerToClient::error(kind));
    }

    fn send_to_coordinator(&self, message: CoordinatorMessage) -> Result<(), ClientError> {
        self.coordinator_tx
            .send(message)
            .map_err(|_| ClientError::CoordinatorUnavailable)
    }

    pub async fn handle_frame(&mut self, text: &str) -> Result<(), ClientError> {
        debug!("Client {} sent {}", self.id, text);
        match decode_frame(text)? {
            Frame::Action(action) => self.handle_action(action).await,
            Frame::UnknownAction => {
                self.send_error(ErrorType::UnknownAction);
                Ok(())
            }
        }
    }

    /// Handle individual client actions using message passing
    pub async fn handle_action(&mut self, action: ClientToServer) -> Result<(), ClientError> {
        match action {
            ClientToServer::Identify { name, game_version } => {
                debug!("Client {} identified as {} ({})", self.id, name, game_version);
                self.send(ServerToClient::greeting(&name, &game_version));
                self.profile = Some(ClientProfile { name, game_version });
            }
            ClientToServer::Create {} => {
                let Some(profile) = self.profile.clone() else {
                    self.send_error(ErrorType::Unidentified);
                    return Ok(());
                };

                let (tx, rx) = oneshot::channel();
                self.send_to_coordinator(CoordinatorMessage::CreateLobby {
                    handle: self.member_handle(),
                    name: profile.name.clone(),
                    version: profile.game_version,
                    previous: self.current_lobby.clone(),
                    request_tx: tx,
                })?;
                let code = rx.await.map_err(|_| ClientError::CoordinatorUnavailable)?;

                info!("Client {} created lobby {}", self.id, code);
                self.current_lobby = Some(Membership {
                    code,
                    name: profile.name,
                });
            }
            ClientToServer::Join { code } => {
                let Some(profile) = self.profile.clone() else {
                    self.send_error(ErrorType::Unidentified);
                    return Ok(());
                };

                let (tx, rx) = oneshot::channel();
                self.send_to_coordinator(CoordinatorMessage::JoinLobby {
                    handle: self.member_handle(),
                    name: profile.name.clone(),
                    lobby_code: code.clone(),
                    version: profile.game_version,
                    previous: self.current_lobby.clone(),
                    request_tx: tx,
                })?;

                match rx.await.map_err(|_| ClientError::CoordinatorUnavailable)? {
                    Ok(()) => {
                        info!("Client {} joined lobby {}", self.id, code);
                        self.current_lobby = Some(Membership {
                            code,
                            name: profile.name,
                        });
                    }
                    Err(e) => {
                        debug!("Client {} join refused: {}", self.id, e);
                        self.send(e.to_response());
                    }
                }
            }
            ClientToServer::Turn(payload) => {
                if self.profile.is_none() {
                    self.send_error(ErrorType::Unidentified);
                    return Ok(());
                }
                let Some(membership) = self.current_lobby.clone() else {
                    self.send_error(ErrorType::NotInLobby);
                    return Ok(());
                };
                self.send_to_coordinator(CoordinatorMessage::Turn {
                    client_id: self.id,
                    membership,
                    payload,
                })?;
            }
        }
        Ok(())
    }

    /// Gives up any lobby slot. Safe to call more than once.
    pub fn disconnect(&mut self) {
        if let Some(membership) = self.current_lobby.take() {
            info!(
                "Client {} leaving lobby {} as {}",
                self.id, membership.code, membership.name
            );
            let _ = self.send_to_coordinator(CoordinatorMessage::ClientDisconnected {
                client_id: self.id,
                membership,
            });
        }
    }
}

/// Simple client handler using message passing
pub async fn handle_client(
    socket_reader: OwnedReadHalf,
    socket_writer: OwnedWriteHalf,
    addr: SocketAddr,
    coordinator_tx: mpsc::UnboundedSender<CoordinatorMessage>,
) {
    // Create channels for this client
    let (response_tx, response_rx) = mpsc::unbounded_channel::<Arc<ServerToClient>>();

    let mut client = Client::new(coordinator_tx, response_tx);

    info!("Client {} connected from {}", client.id, addr);

    // Spawn task to handle writing to the client socket
    let write_task = tokio::spawn(handle_client_writer(socket_writer, response_rx));

    let mut frames = LineReader::new(socket_reader);

    loop {
        let result = match frames.next_frame().await {
            Ok(Some(text)) => client.handle_frame(&text).await,
            Ok(None) => {
                info!("Client {} disconnected ({:?})", client.id, client.state());
                break;
            }
            Err(e) => Err(e.into()),
        };

        if let Err(e) = result {
            warn!("Dropping client {} ({}): {}", client.id, addr, e);
            break;
        }
    }

    // Cleanup on disconnect
    client.disconnect();
    let client_id = client.id;
    drop(client);

    // The writer drains whatever is queued and stops once the lobby has
    // released its copy of our sender.
    if let Err(e) = write_task.await {
        error!("Writer for client {} failed: {}", client_id, e);
    }

    debug!("Client {} cleanup complete", client_id);
}

/// Handle writing messages to the client socket
async fn handle_client_writer(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<Arc<ServerToClient>>,
) {
    while let Some(message) = rx.recv().await {
        let message_with_newline = format!("{}\n", message.to_json());
        if let Err(e) = writer.write_all(message_with_newline.as_bytes()).await {
            error!("Failed to write to client: {}", e);
            break;
        }
    }
    let _ = writer.shutdown().await;
}

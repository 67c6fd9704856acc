use std::{sync::Arc, time::Duration};

use tokio::sync::broadcast::{self, error::RecvError};

use crate::{common::AnyResult, player::AudioPlayer};

/// Why the voice connection dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The signalling websocket closed with the given close code.
    WebSocketClose { code: u16 },
    /// The gateway adapter could not deliver the join payload.
    AdapterUnavailable,
    /// The voice server endpoint went away.
    EndpointRemoved,
    /// Disconnected on purpose by the client.
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Signalling,
    Connecting,
    Ready,
    Disconnected(DisconnectReason),
    Destroyed,
}

impl ConnectionState {
    pub fn is_destroyed(&self) -> bool {
        matches!(self, Self::Destroyed)
    }

    /// Signalling or Connecting: the connection is working towards Ready.
    pub fn is_establishing(&self) -> bool {
        matches!(self, Self::Signalling | Self::Connecting)
    }
}

/// State of the UDP/websocket transport underneath a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    OpeningWs,
    Identifying,
    UdpHandshaking,
    SelectingProtocol,
    Ready,
    Resuming,
    Closed,
}

/// The transport a connection is currently using. Replaced on every rejoin.
pub trait NetworkLink: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<NetworkStatus>;
    /// Stops the transport's periodic keep-alive timer.
    fn clear_keep_alive(&self);
}

/// One state change of the voice connection.
#[derive(Clone)]
pub struct ConnectionTransition {
    pub old: ConnectionState,
    pub new: ConnectionState,
    /// Transport bound to the connection after this change, if any.
    pub network: Option<Arc<dyn NetworkLink>>,
}

impl std::fmt::Debug for ConnectionTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionTransition")
            .field("old", &self.old)
            .field("new", &self.new)
            .field("network", &self.network.is_some())
            .finish()
    }
}

/// The live voice connection of a room.
///
/// `destroy` must be idempotent. `rejoin_attempts` counts rejoins since the
/// connection was last Ready.
pub trait VoiceConnection: Send + Sync {
    fn state(&self) -> ConnectionState;
    fn rejoin_attempts(&self) -> u32;
    fn rejoin(&self) -> bool;
    fn destroy(&self);
    fn subscribe(&self) -> broadcast::Receiver<ConnectionTransition>;
    /// Routes the player's audio into this connection.
    fn attach_player(&self, player: Arc<dyn AudioPlayer>);
}

/// Waits until the connection reports Ready, for at most `timeout`.
pub async fn wait_for_ready(connection: &dyn VoiceConnection, timeout: Duration) -> AnyResult<()> {
    let mut rx = connection.subscribe();
    if connection.state() == ConnectionState::Ready {
        return Ok(());
    }

    let wait = async {
        loop {
            match rx.recv().await {
                Ok(t) if t.new == ConnectionState::Ready => return Ok(()),
                Ok(t) if t.new.is_destroyed() => return Err("connection destroyed".into()),
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => {
                    if connection.state() == ConnectionState::Ready {
                        return Ok(());
                    }
                }
                Err(RecvError::Closed) => return Err("connection event stream closed".into()),
            }
        }
    };

    match tokio::time::timeout(timeout, wait).await {
        Ok(result) => result,
        Err(_) => Err(format!("timed out after {:?} waiting for Ready", timeout).into()),
    }
}

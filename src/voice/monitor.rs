use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    common::{Latch, RoomId},
    configs::ConnectionConfig,
    session::SessionController,
    voice::{
        connection::{
            ConnectionState, ConnectionTransition, DisconnectReason, VoiceConnection,
            wait_for_ready,
        },
        keepalive::KeepAliveWatch,
    },
};

/// Reacts to voice connection state changes: bounded rejoin on transient
/// disconnects, immediate stop on terminal closes, and a readiness deadline
/// whenever the connection starts (re)negotiating.
pub struct ConnectionMonitor {
    room_id: RoomId,
    connection: Arc<dyn VoiceConnection>,
    config: ConnectionConfig,
    reconnecting: Latch,
    rejoin_task: Mutex<Option<JoinHandle<()>>>,
    ready_task: Mutex<Option<JoinHandle<()>>>,
    keep_alive: KeepAliveWatch,
}

impl ConnectionMonitor {
    pub fn new(
        room_id: RoomId,
        connection: Arc<dyn VoiceConnection>,
        config: ConnectionConfig,
    ) -> Self {
        Self {
            keep_alive: KeepAliveWatch::new(room_id.clone()),
            room_id,
            connection,
            config,
            reconnecting: Latch::new(),
            rejoin_task: Mutex::new(None),
            ready_task: Mutex::new(None),
        }
    }

    /// True while a readiness wait is in flight.
    pub fn is_reconnecting(&self) -> bool {
        self.reconnecting.is_held()
    }

    pub fn has_pending_rejoin(&self) -> bool {
        self.rejoin_task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    pub async fn handle_transition(
        &self,
        session: &Arc<SessionController>,
        transition: ConnectionTransition,
    ) {
        debug!(
            "[{}] Connection {:?} -> {:?}",
            self.room_id, transition.old, transition.new
        );
        self.keep_alive.rebind(transition.network.clone());

        match transition.new {
            ConnectionState::Disconnected(reason) => self.on_disconnected(session, reason).await,
            state if state.is_establishing() => self.await_ready(),
            ConnectionState::Destroyed => {
                self.cancel_rejoin();
                session.on_connection_destroyed().await;
            }
            _ => {}
        }
    }

    async fn on_disconnected(&self, session: &Arc<SessionController>, reason: DisconnectReason) {
        match reason {
            DisconnectReason::WebSocketClose { code } if self.config.is_terminal_close(code) => {
                info!(
                    "[{}] Voice channel closed remotely (code {}), stopping",
                    self.room_id, code
                );
                self.cancel_rejoin();
                session.stop().await;
            }
            _ => {
                let attempts = self.connection.rejoin_attempts();
                if attempts < self.config.max_rejoin_attempts {
                    let delay = self.config.rejoin_delay(attempts);
                    debug!(
                        "[{}] Disconnected ({:?}); rejoin attempt {} in {:?}",
                        self.room_id,
                        reason,
                        attempts + 1,
                        delay
                    );
                    self.schedule_rejoin(delay);
                } else {
                    warn!(
                        "[{}] Max rejoin attempts reached ({}), destroying connection",
                        self.room_id, attempts
                    );
                    self.destroy_connection();
                }
            }
        }
    }

    fn schedule_rejoin(&self, delay: std::time::Duration) {
        let connection = self.connection.clone();
        let room_id = self.room_id.clone();

        let mut slot = self.rejoin_task.lock();
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        *slot = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if connection.state().is_destroyed() {
                return;
            }
            if !connection.rejoin() {
                warn!("[{}] Rejoin request was rejected", room_id);
            }
        }));
    }

    fn cancel_rejoin(&self) {
        if let Some(task) = self.rejoin_task.lock().take() {
            task.abort();
        }
    }

    /// Arms the readiness deadline unless one is already running.
    fn await_ready(&self) {
        let Some(guard) = self.reconnecting.try_acquire() else {
            return;
        };

        let connection = self.connection.clone();
        let timeout = self.config.ready_timeout();
        let room_id = self.room_id.clone();

        *self.ready_task.lock() = Some(tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = wait_for_ready(&*connection, timeout).await {
                warn!("[{}] Connection did not become ready: {}", room_id, e);
                if !connection.state().is_destroyed() {
                    connection.destroy();
                }
            }
        }));
    }

    /// Destroys the connection unless it already is.
    pub fn destroy_connection(&self) {
        if !self.connection.state().is_destroyed() {
            self.connection.destroy();
        }
    }

    pub fn shutdown(&self) {
        self.cancel_rejoin();
        if let Some(task) = self.ready_task.lock().take() {
            task.abort();
        }
        self.keep_alive.shutdown();
    }
}

use std::sync::{Arc, atomic::Ordering};

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use super::SessionController;
use crate::{
    display::{Notice, post_notice},
    player::PlayerEvent,
    voice::ConnectionTransition,
};

impl SessionController {
    /// Spawns the connection and player event loops.
    ///
    /// Both receivers are subscribed before any task runs, so no transition
    /// emitted after construction is missed. The loops hold only a weak
    /// reference and end when the session is torn down or dropped.
    pub(super) fn spawn_event_loops(
        self: &Arc<Self>,
        mut connection_events: broadcast::Receiver<ConnectionTransition>,
        mut player_events: broadcast::Receiver<PlayerEvent>,
    ) {
        let weak = Arc::downgrade(self);
        let cancel = self.cancel.clone();
        let room_id = self.room_id.clone();
        tokio::spawn(async move {
            loop {
                let transition = tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = connection_events.recv() => match event {
                        Ok(transition) => transition,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("[{}] Missed {} connection events", room_id, skipped);
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    },
                };
                let Some(session) = weak.upgrade() else {
                    break;
                };
                session.monitor.handle_transition(&session, transition).await;
            }
            debug!("[{}] Connection event loop finished", room_id);
        });

        let weak = Arc::downgrade(self);
        let cancel = self.cancel.clone();
        let room_id = self.room_id.clone();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = player_events.recv() => match event {
                        Ok(event) => event,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("[{}] Missed {} player events", room_id, skipped);
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    },
                };
                let Some(session) = weak.upgrade() else {
                    break;
                };
                session.engine.handle_event(&session, event).await;
            }
            debug!("[{}] Player event loop finished", room_id);
        });
    }

    /// Empties the session and schedules its teardown.
    ///
    /// Idempotent until the next `enqueue`. The timer is armed before the
    /// first suspension point, so an `enqueue` that lands while the display
    /// is being deleted always finds it and cancels it.
    pub async fn stop(self: &Arc<Self>) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("[{}] Stopping playback", self.room_id);

        {
            let mut queue = self.queue.lock();
            queue.set_loop(false);
            queue.clear();
        }
        self.engine.stop_playback();
        self.schedule_teardown();
        self.close_display().await;

        if !self.is_stopped() {
            debug!("[{}] Resumed while stopping", self.room_id);
            return;
        }
        if !self.config.player.pruning {
            post_notice(self.channel.clone(), Notice::QueueEnded);
        }
    }

    fn schedule_teardown(self: &Arc<Self>) {
        let mut slot = self.teardown.lock();
        if slot.is_some() || self.is_torn_down() || !self.is_stopped() {
            return;
        }

        let stay = self.config.player.stay_time();
        debug!("[{}] Teardown in {:?}", self.room_id, stay);

        let weak = Arc::downgrade(self);
        *slot = Some(tokio::spawn(async move {
            tokio::time::sleep(stay).await;
            let Some(session) = weak.upgrade() else {
                return;
            };
            {
                let mut slot = session.teardown.lock();
                if slot.take().is_none() || !session.is_stopped() {
                    return;
                }
                if session.torn_down.swap(true, Ordering::AcqRel) {
                    return;
                }
            }
            info!("[{}] Idle for {:?}, leaving", session.room_id, stay);
            session.finish_teardown();
        }));
    }

    /// Stops and tears down right away once the connection is gone.
    pub async fn on_connection_destroyed(self: &Arc<Self>) {
        self.stop().await;

        {
            let mut slot = self.teardown.lock();
            if let Some(timer) = slot.take() {
                timer.abort();
            }
            if self.torn_down.swap(true, Ordering::AcqRel) {
                return;
            }
        }
        info!("[{}] Connection destroyed, tearing down", self.room_id);
        self.finish_teardown();
    }

    fn finish_teardown(&self) {
        self.monitor.destroy_connection();
        if !self.store.evict(&self.room_id, self) {
            debug!("[{}] Session was already replaced in the registry", self.room_id);
        }
        if !self.config.player.pruning {
            post_notice(self.channel.clone(), Notice::LeftChannel);
        }
        self.monitor.shutdown();
        self.cancel_collector();
        self.cancel.cancel();
    }
}

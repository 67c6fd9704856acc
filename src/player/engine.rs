use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::{
    common::{Latch, RoomId},
    player::state::{AudioPlayer, PlayerEvent, PlayerStatus},
    session::SessionController,
    track::{Track, TrackInfo},
};

/// Drives the player: advances the queue when a track ends or fails and
/// announces playback when it actually starts.
///
/// `current` is the track of the running play attempt. It is taken exactly
/// once when that attempt ends, so a player that reports both an error and
/// an Idle transition for the same track only rotates the queue once.
pub struct PlaybackEngine {
    room_id: RoomId,
    player: Arc<dyn AudioPlayer>,
    advancing: Latch,
    current: Mutex<Option<Track>>,
}

impl PlaybackEngine {
    pub fn new(room_id: RoomId, player: Arc<dyn AudioPlayer>) -> Self {
        Self {
            room_id,
            player,
            advancing: Latch::new(),
            current: Mutex::new(None),
        }
    }

    pub fn status(&self) -> PlayerStatus {
        self.player.status()
    }

    pub fn is_advancing(&self) -> bool {
        self.advancing.is_held()
    }

    pub fn current(&self) -> Option<Track> {
        self.current.lock().clone()
    }

    pub fn current_info(&self) -> Option<TrackInfo> {
        self.current.lock().as_ref().map(|t| t.info().clone())
    }

    pub async fn handle_event(&self, session: &Arc<SessionController>, event: PlayerEvent) {
        match event {
            PlayerEvent::StateChange { old, new } => {
                debug!("[{}] Player {:?} -> {:?}", self.room_id, old, new);
                match (old, new) {
                    (old, PlayerStatus::Idle) if old != PlayerStatus::Idle => {
                        self.on_idle(session).await
                    }
                    (PlayerStatus::Buffering, PlayerStatus::Playing) => self.on_playing(session),
                    _ => {}
                }
            }
            PlayerEvent::Error { message } => self.on_error(session, message).await,
        }
    }

    async fn on_idle(&self, session: &Arc<SessionController>) {
        if self.player.status() != PlayerStatus::Idle {
            debug!("[{}] Ignoring stale Idle transition", self.room_id);
            return;
        }

        if self.finish_current(session).is_some() && session.queue_len() == 0 {
            session.stop().await;
            return;
        }

        self.process_queue(session).await;
    }

    fn on_playing(&self, session: &Arc<SessionController>) {
        let Some(track) = self.current() else {
            return;
        };
        let session = session.clone();
        tokio::spawn(async move {
            session.show_now_playing(track).await;
        });
    }

    async fn on_error(&self, session: &Arc<SessionController>, message: String) {
        match self.current() {
            Some(track) => error!(
                "[{}] Player error while playing '{}': {}",
                self.room_id,
                track.title(),
                message
            ),
            None => error!("[{}] Player error: {}", self.room_id, message),
        }

        self.finish_current(session);
        self.process_queue(session).await;
    }

    /// Ends the running play attempt and applies rotate-or-drop to it.
    fn finish_current(&self, session: &SessionController) -> Option<Track> {
        let finished = self.current.lock().take()?;

        let mut queue = session.queue.lock();
        if queue.front().map(Track::id) == Some(finished.id()) {
            let looping = queue.loop_enabled();
            queue.rotate_on_advance(looping);
        } else {
            debug!(
                "[{}] '{}' is no longer at the front, nothing to rotate",
                self.room_id,
                finished.title()
            );
        }
        Some(finished)
    }

    /// Starts the front track if nothing is playing or being prepared.
    ///
    /// Returns immediately while another advancement holds the guard or the
    /// player is busy. Tracks whose resource cannot be created are dropped
    /// and the next one is tried right away.
    pub async fn process_queue(&self, session: &Arc<SessionController>) {
        loop {
            let Some(guard) = self.advancing.try_acquire() else {
                return;
            };
            if self.player.status() != PlayerStatus::Idle || self.current.lock().is_some() {
                return;
            }

            let next = session.queue.lock().front().cloned();
            let Some(next) = next else {
                drop(guard);
                session.stop().await;
                return;
            };

            match next.make_resource().await {
                Ok(resource) => {
                    if session.is_stopped() {
                        debug!(
                            "[{}] Stopped while preparing '{}', discarding",
                            self.room_id,
                            next.title()
                        );
                        return;
                    }
                    if session.queue.lock().front().map(Track::id) != Some(next.id()) {
                        continue;
                    }

                    *self.current.lock() = Some(next.clone());
                    self.player.play(resource);
                    self.player
                        .set_volume_logarithmic(session.queue.lock().volume_factor());
                    info!("[{}] Starting '{}'", self.room_id, next.title());
                    return;
                }
                Err(e) => {
                    warn!(
                        "[{}] Failed to prepare '{}' ({}): {}",
                        self.room_id,
                        next.title(),
                        next.url(),
                        e
                    );
                    let mut queue = session.queue.lock();
                    if queue.front().map(Track::id) == Some(next.id()) {
                        queue.drop_front();
                    }
                }
            }
        }
    }

    /// Forces the current track to end; the Idle transition advances.
    pub fn skip(&self) -> bool {
        self.player.stop()
    }

    pub fn pause(&self) -> bool {
        self.player.pause()
    }

    pub fn resume(&self) -> bool {
        self.player.unpause()
    }

    pub fn apply_volume(&self, factor: f32) {
        if self.current.lock().is_some() {
            self.player.set_volume_logarithmic(factor);
        }
    }

    /// Abandons the running play attempt without rotating the queue.
    pub fn stop_playback(&self) {
        self.current.lock().take();
        self.player.stop();
    }
}

//! The per-room playback session: queue, connection monitor, playback
//! engine, now-playing display and idle teardown.

mod display;
mod lifecycle;
pub mod registry;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use registry::{SessionRegistry, SessionStore};

use crate::{
    commands::PermissionCheck,
    common::{CommandError, RoomId, UserId},
    configs::Config,
    display::{DisplayMessage, DisplayRenderer, Notice, TextChannel, post_ephemeral},
    player::{AudioPlayer, PlaybackEngine, PlayerStatus},
    queue::QueueState,
    track::{Track, TrackInfo},
    voice::{ConnectionMonitor, VoiceConnection},
};

/// Collaborators a session is built from.
#[derive(Clone)]
pub struct SessionParts {
    pub connection: Arc<dyn VoiceConnection>,
    pub player: Arc<dyn AudioPlayer>,
    pub channel: Arc<dyn TextChannel>,
    pub renderer: Arc<dyn DisplayRenderer>,
    pub permissions: Arc<dyn PermissionCheck>,
}

/// One room's playback session.
///
/// Created by the first play request for a room and registered in the
/// session store. `stop()` empties it and arms the teardown timer; the timer
/// or a destroyed connection tears it down, after which it is no longer in
/// the store and every control returns `CommandError::NoSession`.
pub struct SessionController {
    room_id: RoomId,
    config: Arc<Config>,
    store: Arc<dyn SessionStore>,
    pub(crate) queue: Mutex<QueueState>,
    engine: PlaybackEngine,
    monitor: ConnectionMonitor,
    channel: Arc<dyn TextChannel>,
    renderer: Arc<dyn DisplayRenderer>,
    permissions: Arc<dyn PermissionCheck>,
    display: tokio::sync::Mutex<Option<Arc<dyn DisplayMessage>>>,
    collector: Mutex<Option<CancellationToken>>,
    stopped: AtomicBool,
    torn_down: AtomicBool,
    teardown: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl SessionController {
    pub fn new(
        room_id: RoomId,
        parts: SessionParts,
        config: Arc<Config>,
        store: Arc<dyn SessionStore>,
    ) -> Arc<Self> {
        parts.connection.attach_player(parts.player.clone());
        let connection_events = parts.connection.subscribe();
        let player_events = parts.player.subscribe();

        let session = Arc::new(Self {
            queue: Mutex::new(QueueState::new(config.player.initial_volume())),
            engine: PlaybackEngine::new(room_id.clone(), parts.player),
            monitor: ConnectionMonitor::new(
                room_id.clone(),
                parts.connection,
                config.connection.clone(),
            ),
            channel: parts.channel,
            renderer: parts.renderer,
            permissions: parts.permissions,
            display: tokio::sync::Mutex::new(None),
            collector: Mutex::new(None),
            stopped: AtomicBool::new(false),
            torn_down: AtomicBool::new(false),
            teardown: Mutex::new(None),
            cancel: CancellationToken::new(),
            room_id,
            config,
            store,
        });
        session.spawn_event_loops(connection_events, player_events);
        session
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn monitor(&self) -> &ConnectionMonitor {
        &self.monitor
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    pub fn has_pending_teardown(&self) -> bool {
        self.teardown.lock().is_some()
    }

    pub fn queue_snapshot(&self) -> Vec<TrackInfo> {
        self.queue.lock().snapshot()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn now_playing(&self) -> Option<TrackInfo> {
        self.engine.current_info()
    }

    pub fn player_status(&self) -> PlayerStatus {
        self.engine.status()
    }

    pub fn volume(&self) -> u8 {
        self.queue.lock().volume()
    }

    pub fn muted(&self) -> bool {
        self.queue.lock().muted()
    }

    pub fn loop_enabled(&self) -> bool {
        self.queue.lock().loop_enabled()
    }

    pub fn can_control(&self, user: UserId) -> bool {
        self.permissions.can_control(user)
    }

    /// Appends tracks and starts playback if the player is idle.
    ///
    /// Cancels a pending teardown and clears the stopped flag. Fails with
    /// `NoSession` once the session has been torn down.
    pub async fn enqueue(self: &Arc<Self>, tracks: Vec<Track>) -> Result<(), CommandError> {
        {
            let mut teardown = self.teardown.lock();
            if self.is_torn_down() {
                return Err(CommandError::NoSession(self.room_id.clone()));
            }
            if let Some(timer) = teardown.take() {
                debug!("[{}] New tracks queued, teardown cancelled", self.room_id);
                timer.abort();
            }
            self.stopped.store(false, Ordering::Release);
            self.queue.lock().enqueue(tracks);
        }

        self.edit_display().await;
        self.process_queue().await;
        Ok(())
    }

    pub async fn process_queue(self: &Arc<Self>) {
        self.engine.process_queue(self).await;
    }

    /// Ends the current track; the queue advances on the resulting Idle.
    pub fn skip(&self) -> bool {
        self.engine.skip()
    }

    pub fn pause(&self) -> bool {
        self.engine.pause()
    }

    pub fn resume(&self) -> bool {
        self.engine.resume()
    }

    pub fn set_loop(&self, enabled: bool) {
        self.queue.lock().set_loop(enabled);
    }

    /// Returns the new loop flag.
    pub fn toggle_loop(&self) -> bool {
        let mut queue = self.queue.lock();
        let enabled = !queue.loop_enabled();
        queue.set_loop(enabled);
        enabled
    }

    pub fn set_volume(&self, percent: u8) -> u8 {
        let (volume, factor) = {
            let mut queue = self.queue.lock();
            (queue.set_volume(percent), queue.volume_factor())
        };
        self.engine.apply_volume(factor);
        volume
    }

    /// Returns the volume before and after the change.
    pub fn adjust_volume(&self, delta: i32) -> (u8, u8) {
        let (before, after, factor) = {
            let mut queue = self.queue.lock();
            let before = queue.volume();
            let after = queue.adjust_volume(delta);
            (before, after, queue.volume_factor())
        };
        if before != after {
            self.engine.apply_volume(factor);
        }
        (before, after)
    }

    pub fn set_muted(&self, muted: bool) {
        let factor = {
            let mut queue = self.queue.lock();
            queue.set_muted(muted);
            queue.volume_factor()
        };
        self.engine.apply_volume(factor);
    }

    /// Returns the new mute flag.
    pub fn toggle_mute(&self) -> bool {
        let muted = !self.muted();
        self.set_muted(muted);
        muted
    }

    /// Shuffles everything behind the current track and refreshes the display.
    pub async fn shuffle(&self) {
        self.queue.lock().shuffle();
        self.edit_display().await;
    }

    /// Posts short-lived feedback to the session's channel.
    pub fn notify(&self, notice: Notice) {
        post_ephemeral(
            self.channel.clone(),
            notice,
            self.config.controls.feedback_ttl(),
        );
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        debug!("[{}] Dropping session", self.room_id);
        self.cancel.cancel();
        if let Some(timer) = self.teardown.get_mut().take() {
            timer.abort();
        }
    }
}

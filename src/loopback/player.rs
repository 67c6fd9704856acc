use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::{
    player::{AudioPlayer, PlayerEvent, PlayerStatus},
    track::{AudioResource, TrackInfo},
};

/// Player that never produces audio. `play` moves it to Buffering; tests move
/// it further with `begin_playback`, `finish` and `fail`.
pub struct LoopbackPlayer {
    status: Mutex<PlayerStatus>,
    started: Mutex<Vec<TrackInfo>>,
    volume: Mutex<Option<f32>>,
    events: broadcast::Sender<PlayerEvent>,
}

impl LoopbackPlayer {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            status: Mutex::new(PlayerStatus::Idle),
            started: Mutex::new(Vec::new()),
            volume: Mutex::new(None),
            events,
        })
    }

    /// Moves to `new`, notifying subscribers. No-op if already there.
    pub fn transition(&self, new: PlayerStatus) -> bool {
        let old = std::mem::replace(&mut *self.status.lock(), new);
        if old == new {
            return false;
        }
        let _ = self.events.send(PlayerEvent::StateChange { old, new });
        true
    }

    /// The buffered resource starts producing audio.
    pub fn begin_playback(&self) -> bool {
        self.transition(PlayerStatus::Playing)
    }

    /// The current resource ran out.
    pub fn finish(&self) -> bool {
        self.transition(PlayerStatus::Idle)
    }

    /// Reports an error and drops back to Idle, like a failing decoder.
    pub fn fail(&self, message: &str) {
        let _ = self.events.send(PlayerEvent::Error {
            message: message.to_string(),
        });
        self.transition(PlayerStatus::Idle);
    }

    pub fn started_titles(&self) -> Vec<String> {
        self.started.lock().iter().map(|t| t.title.clone()).collect()
    }

    /// Last factor passed to `set_volume_logarithmic`.
    pub fn volume_factor(&self) -> Option<f32> {
        *self.volume.lock()
    }
}

impl AudioPlayer for LoopbackPlayer {
    fn status(&self) -> PlayerStatus {
        *self.status.lock()
    }

    fn play(&self, resource: AudioResource) {
        self.started.lock().push(resource.metadata().clone());
        self.transition(PlayerStatus::Buffering);
    }

    fn pause(&self) -> bool {
        match self.status() {
            PlayerStatus::Playing | PlayerStatus::Buffering => {
                self.transition(PlayerStatus::Paused)
            }
            _ => false,
        }
    }

    fn unpause(&self) -> bool {
        match self.status() {
            PlayerStatus::Paused | PlayerStatus::AutoPaused => {
                self.transition(PlayerStatus::Playing)
            }
            _ => false,
        }
    }

    fn stop(&self) -> bool {
        self.transition(PlayerStatus::Idle)
    }

    fn set_volume_logarithmic(&self, factor: f32) {
        *self.volume.lock() = Some(factor.clamp(0.0, 1.0));
    }

    fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }
}

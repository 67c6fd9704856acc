use serde::Serialize;
use tokio::sync::broadcast;

use crate::track::AudioResource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PlayerStatus {
    Idle,
    Buffering,
    Playing,
    Paused,
    /// Paused by the player itself because nothing is subscribed.
    AutoPaused,
}

#[derive(Debug, Clone)]
pub enum PlayerEvent {
    StateChange {
        old: PlayerStatus,
        new: PlayerStatus,
    },
    Error {
        message: String,
    },
}

/// The audio pipeline feeding a voice connection.
pub trait AudioPlayer: Send + Sync {
    fn status(&self) -> PlayerStatus;
    fn play(&self, resource: AudioResource);
    fn pause(&self) -> bool;
    fn unpause(&self) -> bool;
    /// Forces the player back to Idle. Returns false if it already was.
    fn stop(&self) -> bool;
    /// Takes a factor in `0.0..=1.0` on the logarithmic scale.
    fn set_volume_logarithmic(&self, factor: f32);
    fn subscribe(&self) -> broadcast::Receiver<PlayerEvent>;
}

//! The mutable track list of a session and its playback flags.
//!
//! The front of the queue is always the track being prepared or played.
//! Nothing here is async; the session controller serialises access behind a
//! short-lived lock and owns the scheduling side effects (advancing,
//! cancelling the teardown timer).

use std::collections::VecDeque;

use rand::{Rng, seq::SliceRandom};

use crate::track::{Track, TrackInfo};

pub const MAX_VOLUME: u8 = 100;

#[derive(Debug, Clone)]
pub struct QueueState {
    tracks: VecDeque<Track>,
    loop_enabled: bool,
    volume: u8,
    muted: bool,
}

impl QueueState {
    pub fn new(volume: u8) -> Self {
        Self {
            tracks: VecDeque::new(),
            loop_enabled: false,
            volume: volume.min(MAX_VOLUME),
            muted: false,
        }
    }

    pub fn enqueue<I: IntoIterator<Item = Track>>(&mut self, tracks: I) {
        self.tracks.extend(tracks);
    }

    pub fn front(&self) -> Option<&Track> {
        self.tracks.front()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    pub fn snapshot(&self) -> Vec<TrackInfo> {
        self.tracks.iter().map(|t| t.info().clone()).collect()
    }

    /// Shuffles everything behind the front track. No-op below three tracks.
    pub fn shuffle(&mut self) {
        self.shuffle_with(&mut rand::thread_rng());
    }

    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.tracks.len() < 3 {
            return;
        }
        self.tracks.make_contiguous()[1..].shuffle(rng);
    }

    /// Applies the end-of-track policy to the front track: requeue it at the
    /// tail when looping, drop it otherwise. Returns the finished track.
    pub fn rotate_on_advance(&mut self, loop_enabled: bool) -> Option<Track> {
        let finished = self.tracks.pop_front()?;
        if loop_enabled {
            self.tracks.push_back(finished.clone());
        }
        Some(finished)
    }

    /// Removes the front track unconditionally.
    pub fn drop_front(&mut self) -> Option<Track> {
        self.tracks.pop_front()
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    pub fn loop_enabled(&self) -> bool {
        self.loop_enabled
    }

    pub fn set_loop(&mut self, enabled: bool) {
        self.loop_enabled = enabled;
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn set_volume(&mut self, percent: u8) -> u8 {
        self.volume = percent.min(MAX_VOLUME);
        self.volume
    }

    /// Moves the volume by `delta` percent, clamped to `0..=100`.
    pub fn adjust_volume(&mut self, delta: i32) -> u8 {
        let next = (i32::from(self.volume) + delta).clamp(0, i32::from(MAX_VOLUME));
        self.volume = next as u8;
        self.volume
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// Factor handed to the player's logarithmic volume control.
    pub fn volume_factor(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            f32::from(self.volume) / 100.0
        }
    }
}

use std::sync::{
    Arc,
    atomic::{AtomicU32, AtomicUsize, Ordering},
};

use parking_lot::Mutex;
use tokio::{sync::broadcast, time::Instant};

use crate::{
    player::AudioPlayer,
    voice::{ConnectionState, ConnectionTransition, NetworkLink, NetworkStatus, VoiceConnection},
};

pub struct LoopbackConnection {
    state: Mutex<ConnectionState>,
    network: Mutex<Option<Arc<LoopbackNetwork>>>,
    rejoin_attempts: AtomicU32,
    rejoin_times: Mutex<Vec<Instant>>,
    destroy_calls: AtomicUsize,
    player: Mutex<Option<Arc<dyn AudioPlayer>>>,
    events: broadcast::Sender<ConnectionTransition>,
}

impl LoopbackConnection {
    /// A connection that is already Ready.
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            state: Mutex::new(ConnectionState::Ready),
            network: Mutex::new(None),
            rejoin_attempts: AtomicU32::new(0),
            rejoin_times: Mutex::new(Vec::new()),
            destroy_calls: AtomicUsize::new(0),
            player: Mutex::new(None),
            events,
        })
    }

    /// Moves to `new` and notifies subscribers, carrying the current network.
    pub fn transition(&self, new: ConnectionState) {
        let old = std::mem::replace(&mut *self.state.lock(), new);
        if new == ConnectionState::Ready {
            self.rejoin_attempts.store(0, Ordering::Release);
        }
        let network = self
            .network
            .lock()
            .clone()
            .map(|network| network as Arc<dyn NetworkLink>);
        let _ = self.events.send(ConnectionTransition { old, new, network });
    }

    pub fn set_network(&self, network: Option<Arc<LoopbackNetwork>>) {
        *self.network.lock() = network;
    }

    pub fn rejoin_times(&self) -> Vec<Instant> {
        self.rejoin_times.lock().clone()
    }

    /// How many times `destroy` was called, including no-op calls.
    pub fn destroy_count(&self) -> usize {
        self.destroy_calls.load(Ordering::Acquire)
    }

    pub fn has_player(&self) -> bool {
        self.player.lock().is_some()
    }
}

impl VoiceConnection for LoopbackConnection {
    fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    fn rejoin_attempts(&self) -> u32 {
        self.rejoin_attempts.load(Ordering::Acquire)
    }

    fn rejoin(&self) -> bool {
        if self.state().is_destroyed() {
            return false;
        }
        self.rejoin_attempts.fetch_add(1, Ordering::AcqRel);
        self.rejoin_times.lock().push(Instant::now());
        true
    }

    fn destroy(&self) {
        self.destroy_calls.fetch_add(1, Ordering::AcqRel);
        if !self.state().is_destroyed() {
            self.transition(ConnectionState::Destroyed);
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<ConnectionTransition> {
        self.events.subscribe()
    }

    fn attach_player(&self, player: Arc<dyn AudioPlayer>) {
        *self.player.lock() = Some(player);
    }
}

pub struct LoopbackNetwork {
    events: broadcast::Sender<NetworkStatus>,
    clears: AtomicUsize,
}

impl LoopbackNetwork {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            events,
            clears: AtomicUsize::new(0),
        })
    }

    pub fn emit(&self, status: NetworkStatus) {
        let _ = self.events.send(status);
    }

    /// Number of live subscribers.
    pub fn listener_count(&self) -> usize {
        self.events.receiver_count()
    }

    pub fn keep_alive_clears(&self) -> usize {
        self.clears.load(Ordering::Acquire)
    }
}

impl NetworkLink for LoopbackNetwork {
    fn subscribe(&self) -> broadcast::Receiver<NetworkStatus> {
        self.events.subscribe()
    }

    fn clear_keep_alive(&self) {
        self.clears.fetch_add(1, Ordering::AcqRel);
    }
}

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::{
    sync::broadcast::error::RecvError,
    task::JoinHandle,
};
use tracing::{debug, trace};

use crate::{common::RoomId, voice::connection::NetworkLink};

struct Binding {
    network: Arc<dyn NetworkLink>,
    task: JoinHandle<()>,
}

/// Keeps one keep-alive listener bound to the connection's current transport.
///
/// Every transport state change clears the transport's keep-alive timer.
/// When the connection moves to a new transport the old listener is aborted,
/// so no periodic timers survive a reconnect.
pub struct KeepAliveWatch {
    room_id: RoomId,
    binding: Mutex<Option<Binding>>,
}

impl KeepAliveWatch {
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            binding: Mutex::new(None),
        }
    }

    pub fn rebind(&self, network: Option<Arc<dyn NetworkLink>>) {
        let mut binding = self.binding.lock();

        let unchanged = match (binding.as_ref(), network.as_ref()) {
            (Some(current), Some(next)) => {
                std::ptr::addr_eq(Arc::as_ptr(&current.network), Arc::as_ptr(next))
            }
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return;
        }

        if let Some(old) = binding.take() {
            debug!("[{}] Detaching keep-alive listener", self.room_id);
            old.task.abort();
        }

        *binding = network.map(|network| {
            let mut rx = network.subscribe();
            let link = network.clone();
            let room_id = self.room_id.clone();
            let task = tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(status) => {
                            trace!("[{}] Network state -> {:?}", room_id, status);
                            link.clear_keep_alive();
                        }
                        Err(RecvError::Lagged(_)) => link.clear_keep_alive(),
                        Err(RecvError::Closed) => break,
                    }
                }
            });
            Binding { network, task }
        });
    }

    pub fn is_bound(&self) -> bool {
        self.binding.lock().is_some()
    }

    pub fn shutdown(&self) {
        if let Some(old) = self.binding.lock().take() {
            old.task.abort();
        }
    }
}

impl Drop for KeepAliveWatch {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{loopback::LoopbackNetwork, voice::NetworkStatus};

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn listener_follows_the_current_network() {
        let watch = KeepAliveWatch::new(RoomId::from("room"));
        let first = LoopbackNetwork::new();
        let second = LoopbackNetwork::new();

        watch.rebind(Some(first.clone()));
        assert_eq!(first.listener_count(), 1);
        first.emit(NetworkStatus::UdpHandshaking);
        settle().await;
        assert_eq!(first.keep_alive_clears(), 1);

        watch.rebind(Some(second.clone()));
        settle().await;
        assert_eq!(first.listener_count(), 0);
        assert_eq!(second.listener_count(), 1);

        first.emit(NetworkStatus::Closed);
        second.emit(NetworkStatus::Ready);
        settle().await;
        assert_eq!(first.keep_alive_clears(), 1);
        assert_eq!(second.keep_alive_clears(), 1);
    }

    #[tokio::test]
    async fn same_network_is_not_resubscribed() {
        let watch = KeepAliveWatch::new(RoomId::from("room"));
        let network = LoopbackNetwork::new();

        watch.rebind(Some(network.clone()));
        watch.rebind(Some(network.clone()));
        settle().await;
        assert_eq!(network.listener_count(), 1);

        watch.rebind(None);
        settle().await;
        assert_eq!(network.listener_count(), 0);
        assert!(!watch.is_bound());
    }
}

pub mod connection;
pub mod keepalive;
pub mod monitor;

pub use connection::{
    ConnectionState, ConnectionTransition, DisconnectReason, NetworkLink, NetworkStatus,
    VoiceConnection, wait_for_ready,
};
pub use keepalive::KeepAliveWatch;
pub use monitor::ConnectionMonitor;

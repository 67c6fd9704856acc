//! In-memory collaborators that record every call.
//!
//! They drive the tests and the demo binary: state changes are triggered by
//! hand (`transition`, `begin_playback`, `react_as`) and observed through
//! the recording accessors.

mod channel;
mod connection;
mod factory;
mod player;
mod rig;

pub use channel::{LoopbackChannel, LoopbackMessage};
pub use connection::{LoopbackConnection, LoopbackNetwork};
pub use factory::{LoopbackFactory, LoopbackStream};
pub use player::LoopbackPlayer;
pub use rig::LoopbackRig;

pub use crate::commands::AllowAll;

//! Per-room voice playback sessions: a track queue with loop, shuffle and
//! volume controls, reconnect handling for the voice connection, and a
//! reaction control surface on a "now playing" message.

pub mod commands;
pub mod common;
pub mod configs;
pub mod display;
pub mod loopback;
pub mod player;
pub mod queue;
pub mod session;
pub mod track;
pub mod voice;

pub mod engine;
pub mod state;

pub use engine::PlaybackEngine;
pub use state::*;

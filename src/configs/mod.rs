pub mod base;
pub mod connection;
pub mod controls;
pub mod logging;
pub mod player;

pub use base::*;
pub use connection::*;
pub use controls::*;
pub use logging::*;
pub use player::*;

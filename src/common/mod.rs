pub mod errors;
pub mod latch;
pub mod logger;
pub mod types;

pub use errors::*;
pub use latch::{Latch, LatchGuard};
pub use types::*;

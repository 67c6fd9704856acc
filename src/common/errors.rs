use thiserror::Error;

use crate::common::types::{AnyError, RoomId};

/// Failure to turn a track into a playable resource.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),
    #[error("failed to decode {url}: {reason}")]
    Decode { url: String, reason: String },
    #[error(transparent)]
    Other(#[from] AnyError),
}

/// Why a control command was refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("there is nothing playing in {0}")]
    NoSession(RoomId),
    #[error("you must be in the same voice channel to control playback")]
    PermissionDenied,
    #[error("the player is not in a state that allows this")]
    InvalidState,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} is empty")]
    Empty(String),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
